use crate::api::models::pagination::PaginatedResponse;
use crate::{
    api::models::{
        media::{ListMediaQuery, MediaResponse},
        users::CurrentUser,
    },
    auth::permissions,
    db::handlers::{media::MediaFilter, Accounts, AuditLogs, Media, Repository},
    db::models::{audit::AuditLogCreateDBRequest, media::{MediaCreateDBRequest, MediaDBResponse}},
    errors::{Error, Result},
    types::{AccountId, MediaId, Operation, Resource},
    webhooks::{events::WebhookEventType, publisher},
    AppState,
};
use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};

/// Fetch a media record, hiding other accounts' files from non-admins.
async fn fetch_scoped_media(
    db: &mut sqlx::PgConnection,
    current_user: &CurrentUser,
    media_id: MediaId,
) -> Result<MediaDBResponse> {
    let not_found = || Error::NotFound {
        resource: "Media".to_string(),
        id: media_id.to_string(),
    };

    let media = Media::new(db).get_by_id(media_id).await?.ok_or_else(not_found)?;
    if !current_user.is_admin && media.account_id != current_user.account_id {
        return Err(not_found());
    }
    Ok(media)
}

/// Upload a file for an account.
///
/// The upload is a single synchronous request; the file is stored complete
/// with a derived checksum, there is no processing lifecycle.
#[utoipa::path(
    post,
    path = "/accounts/{account_id}/media",
    tag = "media",
    summary = "Upload media",
    description = "Upload a file for an account under a 'file' multipart form field",
    request_body(
        content_type = "multipart/form-data",
        description = "File upload; the part's filename and content type are stored with it"
    ),
    params(
        ("account_id" = uuid::Uuid, Path, description = "Account ID")
    ),
    responses(
        (status = 201, description = "File uploaded successfully", body = MediaResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Account not found"),
        (status = 422, description = "File too large or content type not allowed"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("session_token" = []),
        ("api_key" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn upload_media(
    State(state): State<AppState>,
    Path(account_id): Path<AccountId>,
    current_user: CurrentUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<MediaResponse>)> {
    permissions::require_same_account(&current_user, account_id, Resource::Media, Operation::Create)?;
    permissions::require(&current_user, Resource::Media, Operation::Create)?;

    let max_upload_bytes = state.config.media.max_upload_bytes;

    let mut filename: Option<String> = None;
    let mut content_type: Option<String> = None;
    let mut data: Vec<u8> = Vec::new();

    while let Some(mut field) = multipart.next_field().await.map_err(|e| Error::BadRequest {
        message: format!("Failed to parse multipart data: {e}"),
    })? {
        if field.name() != Some("file") {
            // Unknown fields are ignored
            continue;
        }

        filename = Some(field.file_name().unwrap_or("upload").to_string());
        content_type = field.content_type().map(|s| s.to_string());

        while let Some(chunk) = field.chunk().await.map_err(|e| Error::BadRequest {
            message: format!("Failed to read file chunk: {e}"),
        })? {
            // The cap is enforced per chunk, before the whole body is read
            if data.len() + chunk.len() > max_upload_bytes {
                return Err(Error::Validation {
                    message: format!("File exceeds the maximum upload size of {max_upload_bytes} bytes"),
                });
            }
            data.extend_from_slice(&chunk);
        }
    }

    let filename = filename.ok_or_else(|| Error::BadRequest {
        message: "Missing required field: 'file'".to_string(),
    })?;
    if data.is_empty() {
        return Err(Error::BadRequest {
            message: "File cannot be empty".to_string(),
        });
    }

    let content_type = match content_type {
        Some(explicit) => explicit,
        None => mime_guess::from_path(&filename).first_or_octet_stream().to_string(),
    };

    if let Some(allowed) = &state.config.media.allowed_content_types {
        if !allowed.iter().any(|ct| ct == &content_type) {
            return Err(Error::Validation {
                message: format!("Content type '{content_type}' is not allowed"),
            });
        }
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    Accounts::new(&mut tx).get_by_id(account_id).await?.ok_or_else(|| Error::NotFound {
        resource: "Account".to_string(),
        id: account_id.to_string(),
    })?;

    let media = Media::new(&mut tx)
        .create(&MediaCreateDBRequest {
            account_id,
            uploaded_by: current_user.id,
            filename,
            content_type,
            data,
        })
        .await?;

    AuditLogs::new(&mut tx)
        .record(&AuditLogCreateDBRequest {
            account_id: Some(account_id),
            actor_id: Some(current_user.id),
            actor_email: Some(current_user.email.clone()),
            action: WebhookEventType::MediaUploaded.to_string(),
            resource_type: "media".to_string(),
            resource_id: Some(media.id.to_string()),
            details: serde_json::json!({
                "filename": media.filename,
                "content_type": media.content_type,
                "size_bytes": media.size_bytes,
            }),
        })
        .await?;

    publisher::publish_event(
        &mut tx,
        account_id,
        WebhookEventType::MediaUploaded,
        serde_json::json!({
            "media_id": media.id,
            "filename": media.filename,
            "content_type": media.content_type,
            "size_bytes": media.size_bytes,
        }),
    )
    .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok((StatusCode::CREATED, Json(MediaResponse::from(media))))
}

/// List an account's media, newest first. Content is never included.
#[utoipa::path(
    get,
    path = "/accounts/{account_id}/media",
    tag = "media",
    summary = "List media",
    params(
        ("account_id" = uuid::Uuid, Path, description = "Account ID"),
        ListMediaQuery
    ),
    responses(
        (status = 200, description = "Paginated list of media metadata", body = PaginatedResponse<MediaResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Account not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("session_token" = []),
        ("api_key" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_media(
    State(state): State<AppState>,
    Path(account_id): Path<AccountId>,
    Query(query): Query<ListMediaQuery>,
    current_user: CurrentUser,
) -> Result<Json<PaginatedResponse<MediaResponse>>> {
    permissions::require_same_account(&current_user, account_id, Resource::Media, Operation::Read)?;
    permissions::require(&current_user, Resource::Media, Operation::Read)?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    Accounts::new(&mut pool_conn)
        .get_by_id(account_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Account".to_string(),
            id: account_id.to_string(),
        })?;

    let (skip, limit) = query.pagination.params();
    let mut filter = MediaFilter::new(skip, limit);
    filter.account_id = Some(account_id);

    let mut repo = Media::new(&mut pool_conn);
    let media = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    let data = media.into_iter().map(MediaResponse::from).collect();
    Ok(Json(PaginatedResponse::new(data, total_count, skip, limit)))
}

/// Get a media record's metadata.
#[utoipa::path(
    get,
    path = "/media/{id}",
    tag = "media",
    summary = "Get media",
    params(
        ("id" = uuid::Uuid, Path, description = "Media ID")
    ),
    responses(
        (status = 200, description = "Media metadata", body = MediaResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Media not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("session_token" = []),
        ("api_key" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_media(
    State(state): State<AppState>,
    Path(media_id): Path<MediaId>,
    current_user: CurrentUser,
) -> Result<Json<MediaResponse>> {
    permissions::require(&current_user, Resource::Media, Operation::Read)?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let media = fetch_scoped_media(&mut pool_conn, &current_user, media_id).await?;

    Ok(Json(MediaResponse::from(media)))
}

/// Download a file's content with its original content type.
#[utoipa::path(
    get,
    path = "/media/{id}/download",
    tag = "media",
    summary = "Download media",
    description = "Download the stored file content with its original content type",
    params(
        ("id" = uuid::Uuid, Path, description = "Media ID")
    ),
    responses(
        (status = 200, description = "File content"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Media not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("session_token" = []),
        ("api_key" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn download_media(
    State(state): State<AppState>,
    Path(media_id): Path<MediaId>,
    current_user: CurrentUser,
) -> Result<Response> {
    permissions::require(&current_user, Resource::Media, Operation::Read)?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let media = fetch_scoped_media(&mut pool_conn, &current_user, media_id).await?;

    let data = Media::new(&mut pool_conn)
        .get_data(media_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Media".to_string(),
            id: media_id.to_string(),
        })?;

    // Quotes and line breaks cannot appear inside a quoted header value
    let safe_name = media.filename.replace(['"', '\n', '\r'], "_");
    let headers = [
        (header::CONTENT_TYPE, media.content_type),
        (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{safe_name}\"")),
    ];

    Ok((headers, bytes::Bytes::from(data)).into_response())
}

/// Delete a file. The record and content survive under a deletion mark, but
/// they are unreachable through the API.
#[utoipa::path(
    delete,
    path = "/media/{id}",
    tag = "media",
    summary = "Delete media",
    params(
        ("id" = uuid::Uuid, Path, description = "Media ID")
    ),
    responses(
        (status = 204, description = "Media deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Media not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("session_token" = []),
        ("api_key" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn delete_media(
    State(state): State<AppState>,
    Path(media_id): Path<MediaId>,
    current_user: CurrentUser,
) -> Result<StatusCode> {
    permissions::require(&current_user, Resource::Media, Operation::Delete)?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let media = fetch_scoped_media(&mut tx, &current_user, media_id).await?;

    let deleted = Media::new(&mut tx).delete(media.id).await?;
    if !deleted {
        return Err(Error::NotFound {
            resource: "Media".to_string(),
            id: media_id.to_string(),
        });
    }

    AuditLogs::new(&mut tx)
        .record(&AuditLogCreateDBRequest {
            account_id: Some(media.account_id),
            actor_id: Some(current_user.id),
            actor_email: Some(current_user.email.clone()),
            action: WebhookEventType::MediaDeleted.to_string(),
            resource_type: "media".to_string(),
            resource_id: Some(media.id.to_string()),
            details: serde_json::json!({"filename": media.filename}),
        })
        .await?;

    publisher::publish_event(
        &mut tx,
        media.account_id,
        WebhookEventType::MediaDeleted,
        serde_json::json!({"media_id": media.id, "filename": media.filename}),
    )
    .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(StatusCode::NO_CONTENT)
}
