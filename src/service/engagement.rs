//! Likes, bookmarks, comments and the notifications they produce.

use uuid::Uuid;

use super::{ServiceError, ServiceResult};
use crate::db::{ArticleExt, CommentExt, DBClient, EngagementExt, NotificationExt};
use crate::dtos::{CommentDto, NotificationDto};
use crate::models::{Article, NotificationType, User};
use crate::permission::{can_delete_comment, can_edit_comment, can_view_unpublished, ensure};
use crate::ranking::Pagination;

/// Engagement only targets published articles
async fn published_article(db: &DBClient, slug: &str) -> ServiceResult<Article> {
    let article = db
        .get_article_by_slug(slug)
        .await
        .map_err(|e| ServiceError::from_db(e, "Article"))?;

    if !article.is_published() {
        return Err(ServiceError::NotFound("Article".to_string()));
    }
    Ok(article)
}

fn should_notify(recipient_id: Uuid, actor_id: Uuid) -> bool {
    recipient_id != actor_id
}

/// Best effort: failures are logged and never fail the triggering action
pub async fn notify(
    db: &DBClient,
    recipient_id: Uuid,
    actor_id: Uuid,
    kind: NotificationType,
    article_id: Option<Uuid>,
) {
    if !should_notify(recipient_id, actor_id) {
        return;
    }

    if let Err(e) = db
        .create_notification(recipient_id, actor_id, kind, article_id)
        .await
    {
        tracing::error!(
            "Failed to create {:?} notification for {}: {}",
            kind,
            recipient_id,
            e
        );
    }
}

/// Returns the article's like count after the like
pub async fn like_article(db: &DBClient, actor: &User, slug: &str) -> ServiceResult<i64> {
    ensure(actor.is_active)?;
    let article = published_article(db, slug).await?;

    db.create_like(actor.id, article.id)
        .await
        .map_err(|e| ServiceError::from_db(e, "Like"))?;

    notify(
        db,
        article.author_id,
        actor.id,
        NotificationType::Like,
        Some(article.id),
    )
    .await;

    Ok(db.get_likes_count(article.id).await?)
}

/// Unliking an article that was not liked succeeds
pub async fn unlike_article(db: &DBClient, actor: &User, slug: &str) -> ServiceResult<i64> {
    let article = db
        .get_article_by_slug(slug)
        .await
        .map_err(|e| ServiceError::from_db(e, "Article"))?;

    db.delete_like(actor.id, article.id).await?;
    Ok(db.get_likes_count(article.id).await?)
}

pub async fn bookmark_article(db: &DBClient, actor: &User, slug: &str) -> ServiceResult<()> {
    ensure(actor.is_active)?;
    let article = published_article(db, slug).await?;

    db.create_bookmark(actor.id, article.id)
        .await
        .map_err(|e| ServiceError::from_db(e, "Bookmark"))
}

pub async fn unbookmark_article(db: &DBClient, actor: &User, slug: &str) -> ServiceResult<()> {
    let article = db
        .get_article_by_slug(slug)
        .await
        .map_err(|e| ServiceError::from_db(e, "Article"))?;

    Ok(db.delete_bookmark(actor.id, article.id).await?)
}

fn comment_body(content: &str) -> ServiceResult<&str> {
    let content = content.trim();
    if content.is_empty() {
        return Err(ServiceError::validation("Comment cannot be empty"));
    }
    Ok(content)
}

pub async fn list_comments(
    db: &DBClient,
    viewer: Option<&User>,
    slug: &str,
    pagination: Pagination,
    sort: &str,
) -> ServiceResult<(Vec<CommentDto>, i64)> {
    let article = db
        .get_article_by_slug(slug)
        .await
        .map_err(|e| ServiceError::from_db(e, "Article"))?;

    if !article.is_published()
        && !can_view_unpublished(viewer, article.author_id)
    {
        return Err(ServiceError::NotFound("Article".to_string()));
    }

    let comments = db.get_comments(article.id, pagination, sort).await?;
    let total = db.get_article_comment_count(article.id).await?;

    Ok((comments, total))
}

pub async fn add_comment(
    db: &DBClient,
    actor: &User,
    slug: &str,
    content: &str,
) -> ServiceResult<CommentDto> {
    ensure(actor.is_active)?;
    let content = comment_body(content)?;
    let article = published_article(db, slug).await?;

    let comment = db
        .create_comment(actor.id, article.id, content)
        .await
        .map_err(|e| ServiceError::from_db(e, "Comment"))?;

    notify(
        db,
        article.author_id,
        actor.id,
        NotificationType::Comment,
        Some(article.id),
    )
    .await;

    Ok(comment)
}

pub async fn edit_comment(
    db: &DBClient,
    actor: &User,
    comment_id: Uuid,
    content: &str,
) -> ServiceResult<CommentDto> {
    let content = comment_body(content)?;
    let comment = db
        .get_comment(comment_id)
        .await
        .map_err(|e| ServiceError::from_db(e, "Comment"))?;
    ensure(can_edit_comment(actor, comment.user_id))?;

    db.edit_comment(comment.id, content)
        .await
        .map_err(|e| ServiceError::from_db(e, "Comment"))
}

pub async fn delete_comment(db: &DBClient, actor: &User, comment_id: Uuid) -> ServiceResult<()> {
    let comment = db
        .get_comment(comment_id)
        .await
        .map_err(|e| ServiceError::from_db(e, "Comment"))?;
    ensure(can_delete_comment(actor, comment.user_id))?;

    db.soft_delete_comment(comment.id)
        .await
        .map_err(|e| ServiceError::from_db(e, "Comment"))
}

/// Page of notifications, the matching total and the overall unread count
pub async fn list_notifications(
    db: &DBClient,
    user: &User,
    unread_only: bool,
    pagination: Pagination,
) -> ServiceResult<(Vec<NotificationDto>, i64, i64)> {
    let notifications = db
        .get_notifications(user.id, unread_only, pagination)
        .await?;
    let total = db.count_notifications(user.id, unread_only).await?;
    let unread = if unread_only {
        total
    } else {
        db.count_notifications(user.id, true).await?
    };

    Ok((notifications, total, unread))
}

pub async fn unread_count(db: &DBClient, user: &User) -> ServiceResult<i64> {
    Ok(db.count_notifications(user.id, true).await?)
}

/// NotFound when the notification is missing or belongs to someone else
pub async fn mark_as_read(db: &DBClient, user: &User, notification_id: Uuid) -> ServiceResult<()> {
    db.mark_notification_read(user.id, notification_id)
        .await
        .map_err(|e| ServiceError::from_db(e, "Notification"))
}

pub async fn mark_all_as_read(db: &DBClient, user: &User) -> ServiceResult<u64> {
    Ok(db.mark_all_notifications_read(user.id).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures;
    use crate::models::ArticleStatus;
    use sqlx::PgPool;

    #[test]
    fn self_actions_do_not_notify() {
        let user = Uuid::new_v4();
        assert!(!should_notify(user, user));
        assert!(should_notify(user, Uuid::new_v4()));
    }

    #[test]
    fn blank_comments_are_rejected() {
        assert!(matches!(comment_body("   \n"), Err(ServiceError::Validation(_))));
        assert_eq!(comment_body("  nice post ").unwrap(), "nice post");
    }

    #[test]
    fn duplicate_like_is_a_conflict() {
        use crate::service::tests::{Violation, db_error};

        let err = ServiceError::from_db(db_error(Violation::Unique), "Like");
        assert!(matches!(err, ServiceError::Conflict(ref m) if m == "Like already exists"));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn liking_twice_is_a_conflict_and_counts_once(pool: PgPool) {
        let db = DBClient::new(pool);
        let author = fixtures::user(&db, "author").await;
        let reader = fixtures::user(&db, "reader").await;
        let article =
            fixtures::article(&db, &author, "liked", ArticleStatus::Published, &[]).await;

        assert_eq!(like_article(&db, &reader, "liked").await.unwrap(), 1);

        let second = like_article(&db, &reader, "liked").await;
        assert!(matches!(second, Err(ServiceError::Conflict(_))));
        assert_eq!(db.get_likes_count(article.id).await.unwrap(), 1);
        assert_eq!(db.count_notifications(author.id, true).await.unwrap(), 1);

        assert_eq!(unlike_article(&db, &reader, "liked").await.unwrap(), 0);
        assert_eq!(unlike_article(&db, &reader, "liked").await.unwrap(), 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn drafts_cannot_be_liked(pool: PgPool) {
        let db = DBClient::new(pool);
        let author = fixtures::user(&db, "author").await;
        let reader = fixtures::user(&db, "reader").await;
        fixtures::article(&db, &author, "unfinished", ArticleStatus::Draft, &[]).await;

        let result = like_article(&db, &reader, "unfinished").await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }
}
