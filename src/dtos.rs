use crate::models::{ArticleStatus, Category, Media, NotificationType, User, UserRole};
use crate::ranking::ArticleSort;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

// DTOs (Data Transfer Objects) define the structure of data exchanged with clients
// They are separate from database models to control exactly what data is exposed

// ============================================================================
// Authentication DTOs
// ============================================================================

/// Registration request from client
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct RegisterUserDto {
    #[validate(length(min = 3, max = 50, message = "Username must be 3-50 characters"))]
    pub username: String,

    #[validate(
        length(min = 1, message = "Email is required"),
        email(message = "Email is invalid")
    )]
    pub email: String,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,

    #[validate(
        length(min = 1, message = "Confirm Password is required"),
        must_match(other = "password", message = "passwords do not match")
    )]
    #[serde(rename = "confirmPassword")]
    pub password_confirm: String,
}

/// Login request - accepts email or username
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct LoginUserDto {
    #[validate(length(min = 1, message = "Email or username is required"))]
    pub identifier: String,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserLoginResponseDto {
    pub status: String,
    pub access_token: String,
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponseDto {
    pub status: String,
    pub access_token: String,
}

/// Generic success response
#[derive(Serialize, Deserialize)]
pub struct Response {
    pub status: &'static str,
    pub message: String,
}

// ============================================================================
// Pagination & Query DTOs
// ============================================================================

#[derive(Serialize, Deserialize, Validate, Debug)]
pub struct RequestQueryDto {
    #[validate(range(min = 1))]
    pub page: Option<i64>,

    #[validate(range(min = 1, max = 50))]
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaginationDto {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    #[serde(rename = "totalPages")]
    pub total_pages: i64,
}

// ============================================================================
// User DTOs
// ============================================================================

/// Filtered user data sent to clients (no password hash, no external id)
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterUserDto {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: String,
    pub is_active: bool,
    pub is_verified: bool,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FilterUserDto {
    pub fn filter_user(user: &User) -> Self {
        FilterUserDto {
            id: user.id.to_string(),
            username: user.username.to_owned(),
            email: user.email.to_owned(),
            role: user.role.to_str().to_string(),
            is_active: user.is_active,
            is_verified: user.is_verified,
            bio: user.bio.clone(),
            avatar_url: user.avatar_url.clone(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }

    pub fn filter_users(users: &[User]) -> Vec<FilterUserDto> {
        users.iter().map(FilterUserDto::filter_user).collect()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserData {
    pub user: FilterUserDto,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponseDto {
    pub status: String,
    pub data: UserData,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserListResponseDto {
    pub status: String,
    pub users: Vec<FilterUserDto>,
    pub results: i64,
}

/// Public profile with social counts
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDto {
    pub id: Uuid,
    pub username: String,
    pub role: UserRole,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub followers_count: i64,
    pub following_count: i64,
    pub articles_count: i64,
    #[sqlx(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_following: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponseDto {
    pub status: String,
    pub data: ProfileDto,
}

/// Compact user entry in follower/following lists
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserSummaryDto {
    pub id: Uuid,
    pub username: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub followed_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct UserSummaryListResponse {
    pub status: String,
    pub data: Vec<UserSummaryDto>,
    pub pagination: PaginationDto,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct UpdateProfileDto {
    #[validate(length(max = 500, message = "Bio must not exceed 500 characters"))]
    pub bio: Option<String>,

    #[validate(url(message = "Avatar must be a valid URL"))]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RoleUpdateDto {
    pub role: UserRole,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StatusUpdateDto {
    pub is_active: bool,
}

#[derive(Debug, Validate, Default, Clone, Serialize, Deserialize)]
pub struct UserPasswordUpdateDto {
    #[validate(length(min = 6, message = "new password must be at least 6 characters"))]
    pub new_password: String,

    #[validate(
        length(
            min = 6,
            message = "new password confirm must be at least 6 characters"
        ),
        must_match(other = "new_password", message = "new passwords do not match")
    )]
    pub new_password_confirm: String,

    #[validate(length(min = 6, message = "Old password must be at least 6 characters"))]
    pub old_password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FollowStatusDto {
    pub status: String,
    pub following: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetInterestsDto {
    #[validate(length(max = 50, message = "At most 50 interests are allowed"))]
    pub category_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct CategoryListResponseDto {
    pub status: String,
    pub data: Vec<Category>,
}

// ============================================================================
// Article DTOs
// ============================================================================

/// Article creation request
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct InputArticleDto {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: String,

    #[validate(length(min = 1, message = "Content is required."))]
    pub content: String,

    #[validate(length(max = 500, message = "Excerpt must not exceed 500 characters"))]
    pub excerpt: Option<String>,

    #[validate(length(min = 1, max = 255))]
    pub slug: Option<String>,

    #[serde(default)]
    #[validate(length(max = 10, message = "At most 10 categories are allowed"))]
    pub category_ids: Vec<Uuid>,

    #[serde(default)]
    #[validate(
        length(max = 10, message = "At most 10 tags are allowed"),
        custom(function = "validate_tag_names")
    )]
    pub tags: Vec<String>,
}

/// Partial article update; absent fields are left untouched
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct UpdateArticleDto {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: Option<String>,

    #[validate(length(min = 1, message = "Content cannot be empty."))]
    pub content: Option<String>,

    #[validate(length(max = 500, message = "Excerpt must not exceed 500 characters"))]
    pub excerpt: Option<String>,

    #[validate(length(min = 1, max = 255))]
    pub slug: Option<String>,

    #[validate(length(max = 10, message = "At most 10 categories are allowed"))]
    pub category_ids: Option<Vec<Uuid>>,

    #[validate(
        length(max = 10, message = "At most 10 tags are allowed"),
        custom(function = "validate_tag_names")
    )]
    pub tags: Option<Vec<String>>,
}

pub const MAX_TAG_NAME_CHARS: usize = 50;

/// Every tag name must fit the tags table once trimmed
fn validate_tag_names(tags: &[String]) -> Result<(), validator::ValidationError> {
    if tags
        .iter()
        .all(|tag| tag.trim().chars().count() <= MAX_TAG_NAME_CHARS)
    {
        Ok(())
    } else {
        Err(validator::ValidationError::new("tag_too_long")
            .with_message("Each tag must be at most 50 characters".into()))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StaffPickDto {
    pub is_staff_pick: bool,
}

/// Query parameters for the filtered article list
#[derive(Debug, Deserialize, Validate)]
pub struct ArticlesQueryParams {
    #[validate(range(min = 1))]
    pub page: Option<i64>,

    #[validate(range(min = 1, max = 50))]
    pub limit: Option<i64>,

    pub sort: Option<ArticleSort>,
    pub status: Option<ArticleStatus>,
    pub author_id: Option<Uuid>,
    pub category_id: Option<Uuid>,

    #[validate(length(min = 1))]
    pub tag: Option<String>,

    pub published_from: Option<DateTime<Utc>>,
    pub published_to: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SearchQueryParams {
    #[validate(length(min = 1, max = 200))]
    pub q: String,

    #[validate(range(min = 1))]
    pub page: Option<i64>,

    #[validate(range(min = 1, max = 50))]
    pub limit: Option<i64>,

    pub sort: Option<ArticleSort>,
    pub author_id: Option<Uuid>,
    pub category_id: Option<Uuid>,

    #[validate(length(min = 1))]
    pub tag: Option<String>,
}

/// Top-N listings (trending, recent, related)
#[derive(Debug, Deserialize, Validate)]
pub struct TopQueryParams {
    #[validate(range(min = 1, max = 50))]
    pub limit: Option<i64>,
}

/// Paged listings that only take a sort (staff picks, feed, bookmarks)
#[derive(Debug, Deserialize, Validate)]
pub struct SortedPageQuery {
    #[validate(range(min = 1))]
    pub page: Option<i64>,

    #[validate(range(min = 1, max = 50))]
    pub limit: Option<i64>,

    pub sort: Option<ArticleSort>,
}

/// Article row as selected for listings, with engagement counts
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ArticleCardRow {
    pub id: Uuid,
    pub author_id: Uuid,
    pub author_username: String,
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub status: ArticleStatus,
    pub published_at: Option<DateTime<Utc>>,
    pub view_count: i64,
    pub reading_time_minutes: i32,
    pub is_staff_pick: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub likes_count: i64,
    pub comments_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ArticleCategoryRow {
    pub article_id: Uuid,
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ArticleTagRow {
    pub article_id: Uuid,
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaxonomyRef {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

/// Article as returned to clients
///
/// `content` is only present on single-article reads; `liked` and
/// `bookmarked` only for an authenticated viewer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleDto {
    #[serde(flatten)]
    pub card: ArticleCardRow,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub categories: Vec<TaxonomyRef>,
    pub tags: Vec<TaxonomyRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bookmarked: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ArticlesPaginationResponseDto {
    pub status: String,
    pub data: Vec<ArticleDto>,
    pub pagination: Option<PaginationDto>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ArticleResponseDto {
    pub status: String,
    pub data: ArticleDto,
}

// ============================================================================
// Category & Tag DTOs
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct InputCategoryDto {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(length(min = 1, max = 120))]
    pub slug: Option<String>,

    #[validate(length(max = 1000))]
    pub description: Option<String>,

    pub parent_id: Option<Uuid>,
    pub display_order: Option<i32>,
    pub is_active: Option<bool>,
}

/// Partial category update. `detach` moves the category to the root.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCategoryDto {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    #[validate(length(min = 1, max = 120))]
    pub slug: Option<String>,

    #[validate(length(max = 1000))]
    pub description: Option<String>,

    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub detach: bool,
    pub display_order: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CategoriesQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

/// Category with its children, for the tree endpoint
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CategoryNode {
    #[serde(flatten)]
    pub category: Category,
    pub children: Vec<CategoryNode>,
}

#[derive(Debug, Serialize)]
pub struct CategoryTreeResponseDto {
    pub status: String,
    pub data: Vec<CategoryNode>,
}

#[derive(Debug, Serialize)]
pub struct CategoryResponseDto {
    pub status: String,
    pub data: Category,
}

#[derive(Debug, Deserialize, Validate)]
pub struct InputTagDto {
    #[validate(length(min = 1, max = 50, message = "Tag name must be 1-50 characters"))]
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct TagListResponseDto {
    pub status: String,
    pub data: Vec<crate::models::Tag>,
    pub pagination: PaginationDto,
}

#[derive(Debug, Serialize)]
pub struct TagResponseDto {
    pub status: String,
    pub data: crate::models::Tag,
}

// ============================================================================
// Comment DTOs
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct InputCommentRequest {
    #[validate(length(
        min = 1,
        max = 1000,
        message = "Content must be between 1 and 1000 characters"
    ))]
    pub content: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct GetCommentsQuery {
    #[validate(range(min = 1, message = "Page must be greater than 0"))]
    pub page: Option<i64>,

    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<i64>,

    #[validate(custom(function = "validate_sort"))]
    pub sort: Option<String>, // created_at_desc or created_at_asc
}

/// Custom validator for the comment sort parameter
fn validate_sort(sort: &str) -> Result<(), validator::ValidationError> {
    if sort == "created_at_desc" || sort == "created_at_asc" {
        Ok(())
    } else {
        Err(validator::ValidationError::new("invalid_sort"))
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct CommentDto {
    pub id: Uuid,
    #[serde(rename = "articleId")]
    pub article_id: Uuid,
    #[serde(rename = "userId")]
    pub user_id: Uuid,
    #[serde(rename = "userUsername")]
    pub user_username: String,
    pub content: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct CommentListResponse {
    pub status: String,
    pub data: Vec<CommentDto>,
    pub pagination: PaginationDto,
}

#[derive(Debug, Serialize)]
pub struct SingleCommentResponse {
    pub status: String,
    pub data: CommentDto,
}

// ============================================================================
// Engagement & Notification DTOs
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeStatusDto {
    pub status: String,
    pub liked: bool,
    pub likes_count: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BookmarkStatusDto {
    pub status: String,
    pub bookmarked: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct NotificationsQuery {
    #[validate(range(min = 1))]
    pub page: Option<i64>,

    #[validate(range(min = 1, max = 50))]
    pub limit: Option<i64>,

    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct NotificationDto {
    pub id: Uuid,
    pub actor_id: Uuid,
    pub actor_username: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub article_id: Option<Uuid>,
    pub article_slug: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationListResponse {
    pub status: String,
    pub data: Vec<NotificationDto>,
    pub pagination: PaginationDto,
    pub unread_count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCountDto {
    pub status: String,
    pub unread_count: i64,
}

// ============================================================================
// Media DTOs
// ============================================================================

#[derive(Debug, Serialize)]
pub struct MediaResponseDto {
    pub status: String,
    pub data: Media,
}

#[derive(Debug, Serialize)]
pub struct MediaListResponseDto {
    pub status: String,
    pub data: Vec<Media>,
    pub pagination: PaginationDto,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_requires_matching_passwords() {
        let dto = RegisterUserDto {
            username: "writer".to_string(),
            email: "writer@example.com".to_string(),
            password: "secret123".to_string(),
            password_confirm: "secret124".to_string(),
        };
        assert!(dto.validate().is_err());

        let dto = RegisterUserDto {
            password_confirm: "secret123".to_string(),
            ..dto
        };
        assert!(dto.validate().is_ok());
    }

    #[test]
    fn overlong_tag_names_are_rejected() {
        let long_tag = "x".repeat(MAX_TAG_NAME_CHARS + 1);

        let dto = UpdateArticleDto {
            title: None,
            content: None,
            excerpt: None,
            slug: None,
            category_ids: None,
            tags: Some(vec!["rust".to_string(), long_tag.clone()]),
        };
        assert!(dto.validate().is_err());

        let dto = UpdateArticleDto {
            tags: Some(vec![format!("  {}  ", "y".repeat(MAX_TAG_NAME_CHARS))]),
            ..dto
        };
        assert!(dto.validate().is_ok());

        let dto = UpdateArticleDto { tags: None, ..dto };
        assert!(dto.validate().is_ok());
    }

    #[test]
    fn comment_sort_is_restricted() {
        let query = GetCommentsQuery {
            page: Some(1),
            limit: Some(10),
            sort: Some("likes".to_string()),
        };
        assert!(query.validate().is_err());

        let query = GetCommentsQuery {
            sort: Some("created_at_asc".to_string()),
            ..query
        };
        assert!(query.validate().is_ok());
    }

    #[test]
    fn article_input_limits_tags() {
        let dto = InputArticleDto {
            title: "Title".to_string(),
            content: "Body".to_string(),
            excerpt: None,
            slug: None,
            category_ids: vec![],
            tags: (0..11).map(|i| format!("tag{}", i)).collect(),
        };
        assert!(dto.validate().is_err());
    }

    #[test]
    fn article_query_parses_sort_and_status() {
        let params: ArticlesQueryParams =
            serde_json::from_str(r#"{"sort": "alphabetical", "status": "draft"}"#).unwrap();
        assert_eq!(params.sort, Some(ArticleSort::Alphabetical));
        assert_eq!(params.status, Some(ArticleStatus::Draft));
    }
}
