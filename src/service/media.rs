//! Uploaded file metadata and ownership.

use uuid::Uuid;

use super::{ServiceError, ServiceResult};
use crate::db::{DBClient, MediaExt, NewMedia};
use crate::models::{Media, User};
use crate::permission::{can_moderate, ensure};
use crate::ranking::Pagination;

/// Accepted upload types and the extension stored files get
const ALLOWED_TYPES: [(&str, &str); 5] = [
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
    ("application/pdf", "pdf"),
];

/// Checks type and size of an upload, returning the file extension to store it under
pub fn check_upload(mime_type: &str, size: usize, max_bytes: usize) -> ServiceResult<&'static str> {
    if size == 0 {
        return Err(ServiceError::validation("Uploaded file is empty"));
    }
    if size > max_bytes {
        return Err(ServiceError::validation(format!(
            "File exceeds the maximum size of {} bytes",
            max_bytes
        )));
    }

    ALLOWED_TYPES
        .iter()
        .find(|(allowed, _)| *allowed == mime_type)
        .map(|(_, extension)| *extension)
        .ok_or_else(|| {
            ServiceError::validation(format!("Unsupported file type: {}", mime_type))
        })
}

pub async fn record_upload(db: &DBClient, actor: &User, media: NewMedia) -> ServiceResult<Media> {
    ensure(actor.is_active)?;

    let media = db
        .create_media(actor.id, media)
        .await
        .map_err(|e| ServiceError::from_db(e, "Media"))?;
    tracing::info!("Media {} uploaded by {}", media.id, actor.id);
    Ok(media)
}

pub async fn list_media(
    db: &DBClient,
    user: &User,
    pagination: Pagination,
) -> ServiceResult<(Vec<Media>, i64)> {
    let media = db.get_user_media(user.id, pagination).await?;
    let total = db.get_user_media_count(user.id).await?;
    Ok((media, total))
}

/// Owners delete their files, editors any. Returns the removed row so the
/// caller can drop the stored file.
pub async fn delete_media(db: &DBClient, actor: &User, media_id: Uuid) -> ServiceResult<Media> {
    let media = db
        .get_media(media_id)
        .await
        .map_err(|e| ServiceError::from_db(e, "Media"))?;
    ensure(actor.is_active && (media.user_id == actor.id || can_moderate(actor)))?;

    db.delete_media(media.id)
        .await
        .map_err(|e| ServiceError::from_db(e, "Media"))?;
    Ok(media)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_known_types_within_limit() {
        assert_eq!(check_upload("image/png", 1024, 2048).unwrap(), "png");
        assert_eq!(check_upload("image/jpeg", 2048, 2048).unwrap(), "jpg");
    }

    #[test]
    fn rejects_oversized_empty_and_unknown_files() {
        assert!(matches!(
            check_upload("image/png", 4096, 2048),
            Err(ServiceError::Validation(_))
        ));
        assert!(check_upload("image/png", 0, 2048).is_err());
        assert!(check_upload("text/html", 10, 2048).is_err());
    }
}
