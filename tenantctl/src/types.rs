//! Common type definitions and the permission vocabulary.
//!
//! This module defines:
//! - Type aliases for entity IDs (AccountId, UserId, etc.)
//! - The resource/access vocabulary behind role permission strings
//! - Path parameter helpers (`current` keyword routes)
//!
//! # ID Types
//!
//! All entity IDs are UUIDs wrapped in type aliases for better readability:
//!
//! - [`AccountId`]: Tenant account identifier
//! - [`UserId`]: User identifier
//! - [`RoleId`]: Role identifier
//! - [`ApiKeyId`]: API key identifier
//! - [`MediaId`]: Media file identifier
//! - [`WebhookId`]: Webhook endpoint identifier
//!
//! # Permission strings
//!
//! Role permissions are stored as `{resource}:{access}` strings, e.g. `users:write`
//! or `audit_logs:read`. [`Permission`] is the typed form; its `FromStr` impl
//! validates strings arriving on role create/update before they are persisted.
//!
//! # Utility Functions
//!
//! - [`abbrev_uuid`]: Abbreviate UUIDs to first 8 chars for logging

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// Type aliases for IDs
pub type AccountId = Uuid;
pub type UserId = Uuid;
pub type RoleId = Uuid;
pub type ApiKeyId = Uuid;
pub type ApiRequestId = Uuid;
pub type AuditLogId = Uuid;
pub type AuditExportId = Uuid;
pub type MediaId = Uuid;
pub type WebhookId = Uuid;
pub type DeliveryId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

// Common types for path parameters
#[derive(Debug, Clone, Deserialize)]
pub enum CurrentKeyword {
    #[serde(rename = "current")]
    Current,
}

/// Designed to allow routes like /users/current/api-keys and /users/{user_id}/api-keys
/// to hit the same handler.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UserIdOrCurrent {
    Current(CurrentKeyword),
    Id(UserId),
}

/// Operations performed against a resource, used for authorization checks and
/// audit/error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl Operation {
    /// The access level a role permission string must grant for this operation.
    pub fn required_access(&self) -> Access {
        match self {
            Operation::Read => Access::Read,
            Operation::Create | Operation::Update | Operation::Delete => Access::Write,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Create => write!(f, "create"),
            Operation::Read => write!(f, "read"),
            Operation::Update => write!(f, "update"),
            Operation::Delete => write!(f, "delete"),
        }
    }
}

/// Access level granted by a role permission string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Read,
    Write,
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Read => write!(f, "read"),
            Access::Write => write!(f, "write"),
        }
    }
}

// Resources that can be operated on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Accounts,
    Users,
    Roles,
    ApiKeys,
    Requests,
    AuditLogs,
    AuditExports,
    Media,
    Webhooks,
}

impl Resource {
    /// All resources, in the order they appear in role permission listings.
    pub const ALL: [Resource; 9] = [
        Resource::Accounts,
        Resource::Users,
        Resource::Roles,
        Resource::ApiKeys,
        Resource::Requests,
        Resource::AuditLogs,
        Resource::AuditExports,
        Resource::Media,
        Resource::Webhooks,
    ];
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resource::Accounts => "accounts",
            Resource::Users => "users",
            Resource::Roles => "roles",
            Resource::ApiKeys => "api_keys",
            Resource::Requests => "requests",
            Resource::AuditLogs => "audit_logs",
            Resource::AuditExports => "audit_exports",
            Resource::Media => "media",
            Resource::Webhooks => "webhooks",
        };
        write!(f, "{name}")
    }
}

/// A typed `{resource}:{access}` permission, the unit stored on roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Permission {
    pub resource: Resource,
    pub access: Access,
}

impl Permission {
    pub fn new(resource: Resource, access: Access) -> Self {
        Self { resource, access }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource, self.access)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid permission string: {0}")]
pub struct ParsePermissionError(pub String);

impl FromStr for Permission {
    type Err = ParsePermissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (resource, access) = s.split_once(':').ok_or_else(|| ParsePermissionError(s.to_string()))?;

        let resource = Resource::ALL
            .iter()
            .find(|r| r.to_string() == resource)
            .copied()
            .ok_or_else(|| ParsePermissionError(s.to_string()))?;

        let access = match access {
            "read" => Access::Read,
            "write" => Access::Write,
            _ => return Err(ParsePermissionError(s.to_string())),
        };

        Ok(Permission { resource, access })
    }
}
