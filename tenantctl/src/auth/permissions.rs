//! Permission checking and access control.
//!
//! Authorization is role-based: each role carries `{resource}:{access}`
//! permission strings, and the auth extractor aggregates them onto the
//! [`CurrentUser`] for the request. Platform operators (`is_admin`) pass
//! every check. Handlers call [`require`] (or [`has_permission`] when they
//! combine checks, e.g. with a self-service path) before touching the
//! repository layer.

use crate::api::models::users::CurrentUser;
use crate::errors::Error;
use crate::types::{AccountId, Access, Operation, Resource};

/// Check whether a user may perform an operation on a resource kind.
///
/// A `write` grant also satisfies operations that only need `read`.
pub fn has_permission(user: &CurrentUser, resource: Resource, operation: Operation) -> bool {
    if user.is_admin {
        return true;
    }

    let required = operation.required_access();
    user.permissions
        .iter()
        .any(|p| p.resource == resource && (p.access == required || p.access == Access::Write))
}

/// Require a permission, failing with a 403 when the user lacks it.
pub fn require(user: &CurrentUser, resource: Resource, operation: Operation) -> Result<(), Error> {
    if has_permission(user, resource, operation) {
        Ok(())
    } else {
        Err(Error::PermissionDenied {
            action: operation,
            resource,
        })
    }
}

/// Require that the target account is the user's own account.
///
/// Platform operators may act on any account; everyone else is confined to
/// theirs regardless of role grants.
pub fn require_same_account(user: &CurrentUser, account_id: AccountId, resource: Resource, operation: Operation) -> Result<(), Error> {
    if user.is_admin || user.account_id == account_id {
        Ok(())
    } else {
        Err(Error::PermissionDenied {
            action: operation,
            resource,
        })
    }
}

/// Require a platform operator. Role grants never satisfy this check; it
/// guards platform-level operations like creating and suspending accounts.
pub fn require_admin(user: &CurrentUser, resource: Resource, operation: Operation) -> Result<(), Error> {
    if user.is_admin {
        Ok(())
    } else {
        Err(Error::PermissionDenied {
            action: operation,
            resource,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Permission;
    use uuid::Uuid;

    fn member_with(permissions: Vec<Permission>) -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            username: "member".to_string(),
            email: "member@example.com".to_string(),
            is_admin: false,
            display_name: None,
            permissions,
        }
    }

    fn platform_admin() -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            username: "root".to_string(),
            email: "root@example.com".to_string(),
            is_admin: true,
            display_name: None,
            permissions: vec![],
        }
    }

    #[test]
    fn test_admin_passes_every_check() {
        let admin = platform_admin();
        for resource in Resource::ALL {
            assert!(has_permission(&admin, resource, Operation::Read));
            assert!(has_permission(&admin, resource, Operation::Create));
            assert!(has_permission(&admin, resource, Operation::Update));
            assert!(has_permission(&admin, resource, Operation::Delete));
        }
    }

    #[test]
    fn test_read_grant_does_not_allow_writes() {
        let user = member_with(vec![Permission::new(Resource::Users, Access::Read)]);

        assert!(has_permission(&user, Resource::Users, Operation::Read));
        assert!(!has_permission(&user, Resource::Users, Operation::Create));
        assert!(!has_permission(&user, Resource::Users, Operation::Update));
        assert!(!has_permission(&user, Resource::Users, Operation::Delete));
    }

    #[test]
    fn test_write_grant_implies_read() {
        let user = member_with(vec![Permission::new(Resource::Webhooks, Access::Write)]);

        assert!(has_permission(&user, Resource::Webhooks, Operation::Read));
        assert!(has_permission(&user, Resource::Webhooks, Operation::Create));
        assert!(has_permission(&user, Resource::Webhooks, Operation::Delete));
    }

    #[test]
    fn test_grants_are_scoped_to_their_resource() {
        let user = member_with(vec![Permission::new(Resource::Users, Access::Write)]);

        assert!(!has_permission(&user, Resource::Roles, Operation::Read));
        assert!(!has_permission(&user, Resource::ApiKeys, Operation::Create));
    }

    #[test]
    fn test_require_reports_the_denied_operation() {
        let user = member_with(vec![]);

        let err = require(&user, Resource::Media, Operation::Delete).unwrap_err();
        assert!(matches!(
            err,
            Error::PermissionDenied {
                action: Operation::Delete,
                resource: Resource::Media,
            }
        ));
    }

    #[test]
    fn test_require_admin_ignores_role_grants() {
        let user = member_with(vec![Permission::new(Resource::Accounts, Access::Write)]);
        assert!(require_admin(&user, Resource::Accounts, Operation::Create).is_err());

        let admin = platform_admin();
        assert!(require_admin(&admin, Resource::Accounts, Operation::Create).is_ok());
    }

    #[test]
    fn test_same_account_check() {
        let user = member_with(vec![Permission::new(Resource::Users, Access::Write)]);
        let own_account = user.account_id;
        let other_account = Uuid::new_v4();

        assert!(require_same_account(&user, own_account, Resource::Users, Operation::Read).is_ok());
        assert!(require_same_account(&user, other_account, Resource::Users, Operation::Read).is_err());

        // Platform operators cross account boundaries freely
        let admin = platform_admin();
        assert!(require_same_account(&admin, other_account, Resource::Users, Operation::Read).is_ok());
    }
}
