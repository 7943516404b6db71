use std::path::PathBuf;

use crate::{
    AppState,
    db::NewMedia,
    dtos::{MediaListResponseDto, MediaResponseDto, RequestQueryDto, Response},
    error::{ErrorMessage, HttpError},
    handler::{pagination_dto, service_failure},
    middleware::JWTAuthMiddleware,
    ranking::Pagination,
    service::media,
};
use axum::{
    Extension, Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
};
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

/// Multipart framing on top of the file itself
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Router for `/media`
///
/// All routes are protected by the auth middleware (applied in routes.rs).
pub fn media_handler(app_state: AppState) -> Router<AppState> {
    let body_limit = app_state.env.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route(
            "/",
            get(get_my_media)
                .post(upload_media)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/{id}", delete(delete_media))
}

fn stored_path(upload_dir: &str, filename: &str) -> PathBuf {
    PathBuf::from(upload_dir).join(filename)
}

/// Upload one file in the `file` field; it is stored under a random name and
/// served from `/uploads/{filename}`
#[instrument(skip(app_state, jwt, multipart), fields(user_id = %jwt.user.id))]
pub async fn upload_media(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HttpError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::error!("Failed to read multipart data: {}", e);
        HttpError::bad_request(e.to_string())
    })? {
        if field.name() != Some("file") {
            continue;
        }
        let original_name = field.file_name().unwrap_or("upload").to_string();
        let mime_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field.bytes().await.map_err(|e| {
            tracing::error!("Failed to read file bytes: {}", e);
            HttpError::bad_request(e.to_string())
        })?;
        upload = Some((original_name, mime_type, data));
        break;
    }

    let (original_name, mime_type, data) = upload.ok_or_else(|| {
        tracing::error!("Upload without a file field");
        HttpError::bad_request("A file field is required".to_string())
    })?;

    let extension = media::check_upload(&mime_type, data.len(), app_state.env.max_upload_bytes)
        .map_err(service_failure("upload_media"))?;

    let filename = format!("{}.{}", Uuid::new_v4(), extension);
    let path = stored_path(&app_state.env.upload_dir, &filename);
    tokio::fs::write(&path, &data).await.map_err(|e| {
        tracing::error!("Failed to store upload at {}: {}", path.display(), e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    let record = NewMedia {
        url: format!("/uploads/{}", filename),
        filename,
        original_name,
        mime_type,
        size_bytes: data.len() as i64,
    };

    let created = match media::record_upload(&app_state.db_client, &jwt.user, record).await {
        Ok(created) => created,
        Err(e) => {
            // No row points at the file, so it must not stay on disk
            if let Err(io_err) = tokio::fs::remove_file(&path).await {
                tracing::warn!("Failed to remove orphan upload {}: {}", path.display(), io_err);
            }
            return Err(service_failure("upload_media")(e));
        }
    };

    tracing::info!("upload_media successful");
    Ok((
        StatusCode::CREATED,
        Json(MediaResponseDto {
            status: "success".to_string(),
            data: created,
        }),
    ))
}

#[instrument(skip(app_state, jwt), fields(user_id = %jwt.user.id))]
pub async fn get_my_media(
    Query(query_params): Query<RequestQueryDto>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    query_params.validate().map_err(|e| {
        tracing::error!("Invalid get_my_media input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let pagination = Pagination::new(query_params.page, query_params.limit);
    let (items, total) = media::list_media(&app_state.db_client, &jwt.user, pagination)
        .await
        .map_err(service_failure("get_my_media"))?;

    Ok(Json(MediaListResponseDto {
        status: "success".to_string(),
        data: items,
        pagination: pagination_dto(pagination, total),
    }))
}

/// Removes the row, then the stored file
#[instrument(skip(app_state, jwt), fields(user_id = %jwt.user.id))]
pub async fn delete_media(
    Path(media_id): Path<Uuid>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let removed = media::delete_media(&app_state.db_client, &jwt.user, media_id)
        .await
        .map_err(service_failure("delete_media"))?;

    let path = stored_path(&app_state.env.upload_dir, &removed.filename);
    if let Err(e) = tokio::fs::remove_file(&path).await {
        tracing::warn!("Failed to remove stored file {}: {}", path.display(), e);
    }

    tracing::info!("delete_media successful");
    Ok(Json(Response {
        status: "success",
        message: "Media deleted".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_files_live_in_the_upload_dir() {
        let path = stored_path("./uploads", "abc.png");
        assert_eq!(path, PathBuf::from("./uploads/abc.png"));
    }
}
