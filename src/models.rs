use chrono::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User role for role-based access control (RBAC)
///
/// The four roles form a fixed total order: reader < author < editor < admin.
/// Stored in PostgreSQL as the `user_role` ENUM, lowercase.
///
/// Comparisons between roles must go through `rank()` (or
/// `permission::has_permission`), never through the declaration order.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Reader,
    Author,
    Editor,
    Admin,
}

impl UserRole {
    /// Numeric rank of the role in the hierarchy (reader = 1 ... admin = 4)
    pub fn rank(&self) -> u8 {
        match self {
            UserRole::Reader => 1,
            UserRole::Author => 2,
            UserRole::Editor => 3,
            UserRole::Admin => 4,
        }
    }

    pub fn to_str(&self) -> &str {
        match self {
            UserRole::Reader => "reader",
            UserRole::Author => "author",
            UserRole::Editor => "editor",
            UserRole::Admin => "admin",
        }
    }
}

/// User model representing the users table
///
/// Exactly one authentication path is active per account:
/// - `password`: argon2 hash for local accounts
/// - `external_id`: identity reference from an external provider
///
/// The database enforces this with a CHECK constraint.
/// Soft-deleted users keep their row (`deleted_at` is set) so articles and
/// comments they wrote stay referentially valid.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password: Option<String>,
    pub external_id: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub is_verified: bool,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Publication state of an article
///
/// Allowed transitions:
/// - draft -> published (publish)
/// - published -> draft (unpublish)
/// - draft | published -> archived (archive)
///
/// Archived is terminal.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "article_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    Draft,
    Published,
    Archived,
}

impl ArticleStatus {
    pub fn to_str(&self) -> &str {
        match self {
            ArticleStatus::Draft => "draft",
            ArticleStatus::Published => "published",
            ArticleStatus::Archived => "archived",
        }
    }

    /// Whether an explicit transition from `self` to `target` is modeled.
    /// Re-applying the current state is accepted as a no-op.
    pub fn can_transition_to(&self, target: ArticleStatus) -> bool {
        match (self, target) {
            (ArticleStatus::Archived, ArticleStatus::Archived) => true,
            (ArticleStatus::Archived, _) => false,
            _ => true,
        }
    }
}

/// Average characters per word used by the reading-time estimate
const AVERAGE_WORD_LENGTH: usize = 5;
/// Reading speed in words per minute
const WORDS_PER_MINUTE: usize = 200;

/// Estimated reading time in whole minutes, never less than one.
///
/// Words are estimated from the content length divided by an average word
/// length of 5; the estimate is divided by 200 words per minute.
pub fn reading_time_minutes(content: &str) -> i32 {
    let word_estimate = content.len() / AVERAGE_WORD_LENGTH;
    let minutes = word_estimate / WORDS_PER_MINUTE;
    minutes.max(1) as i32
}

/// Article model representing the articles table
///
/// `published_at` is only non-null while the article is published.
/// `reading_time_minutes` is recomputed from `content` on every save.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct Article {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: String,
    pub status: ArticleStatus,
    pub published_at: Option<DateTime<Utc>>,
    pub view_count: i64,
    pub reading_time_minutes: i32,
    pub is_staff_pick: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Article {
    pub fn is_published(&self) -> bool {
        self.status == ArticleStatus::Published && self.published_at.is_some()
    }
}

/// Category node; `parent_id` links categories into a tree
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone, PartialEq)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
    pub display_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone, PartialEq)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub usage_count: i32,
    pub created_at: DateTime<Utc>,
}

/// Comment on an article, soft-deleted like articles
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct Comment {
    pub id: Uuid,
    pub article_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Uploaded file owned by a user
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct Media {
    pub id: Uuid,
    pub user_id: Uuid,
    pub filename: String,
    pub original_name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

/// Directed follow edge: `follower_id` follows `following_id`
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct UserFollow {
    pub follower_id: Uuid,
    pub following_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "notification_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Like,
    Comment,
    Follow,
    Article,
}

/// Notification for `user_id`, triggered by `actor_id`
///
/// Immutable once created apart from `is_read`, which only goes from false to true.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub actor_id: Uuid,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub article_id: Option<Uuid>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reading_time_has_one_minute_floor() {
        assert_eq!(reading_time_minutes(""), 1);
        assert_eq!(reading_time_minutes(&"a".repeat(1000)), 1);
    }

    #[test]
    fn reading_time_uses_character_heuristic() {
        // 300_000 chars / 5 = 60_000 words / 200 wpm = 300 minutes
        assert_eq!(reading_time_minutes(&"a".repeat(300_000)), 300);
        assert_eq!(reading_time_minutes(&"a".repeat(2_999)), 2);
    }

    #[test]
    fn role_ranks_are_strictly_increasing() {
        let roles = [
            UserRole::Reader,
            UserRole::Author,
            UserRole::Editor,
            UserRole::Admin,
        ];
        for pair in roles.windows(2) {
            assert!(pair[0].rank() < pair[1].rank());
        }
    }

    #[test]
    fn archived_is_terminal() {
        assert!(!ArticleStatus::Archived.can_transition_to(ArticleStatus::Published));
        assert!(!ArticleStatus::Archived.can_transition_to(ArticleStatus::Draft));
        assert!(ArticleStatus::Draft.can_transition_to(ArticleStatus::Published));
        assert!(ArticleStatus::Published.can_transition_to(ArticleStatus::Draft));
        assert!(ArticleStatus::Published.can_transition_to(ArticleStatus::Archived));
    }

    #[test]
    fn notification_kind_serializes_as_type() {
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            actor_id: Uuid::new_v4(),
            kind: NotificationType::Follow,
            article_id: None,
            is_read: false,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&notification).unwrap();
        assert_eq!(json["type"], "follow");
    }
}
