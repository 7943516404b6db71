use super::DBClient;
use crate::dtos::ProfileDto;
use crate::models::{User, UserRole};
use crate::ranking::Pagination;
use uuid::Uuid;

/// Column list shared by every query returning a `User`
const USER_COLUMNS: &str = "id, username, email, password, external_id, role, is_active, is_verified, bio, avatar_url, created_at, updated_at, deleted_at";

/// User database operations trait
///
/// Soft-deleted users are invisible to every lookup here.
pub trait UserExt {
    /// Get single user by ID, username or email
    /// Returns Option - Some(user) if found, None if not found
    async fn get_user(
        &self,
        user_id: Option<Uuid>,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, sqlx::Error>;

    /// Get paginated list of all users, newest first
    async fn get_users(&self, pagination: Pagination) -> Result<Vec<User>, sqlx::Error>;

    /// Get total count of all users
    async fn get_user_count(&self) -> Result<i64, sqlx::Error>;

    /// Create a local account with a password hash
    async fn save_user<T: Into<String> + Send>(
        &self,
        username: T,
        email: T,
        password: T,
    ) -> Result<User, sqlx::Error>;

    /// Update bio and avatar; `None` keeps the current value
    async fn update_user_profile(
        &self,
        user_id: Uuid,
        bio: Option<&str>,
        avatar_url: Option<&str>,
    ) -> Result<User, sqlx::Error>;

    async fn update_user_role(&self, user_id: Uuid, role: UserRole) -> Result<User, sqlx::Error>;

    async fn update_user_status(&self, user_id: Uuid, is_active: bool)
    -> Result<User, sqlx::Error>;

    async fn update_user_password(
        &self,
        user_id: Uuid,
        password: String,
    ) -> Result<User, sqlx::Error>;

    /// Soft delete: the row stays so authored content keeps its author
    async fn soft_delete_user(&self, user_id: Uuid) -> Result<(), sqlx::Error>;

    /// Public profile with follower, following and published-article counts
    async fn get_profile(&self, username: &str) -> Result<ProfileDto, sqlx::Error>;
}

impl UserExt for DBClient {
    async fn get_user(
        &self,
        user_id: Option<Uuid>,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, sqlx::Error> {
        let mut user: Option<User> = None;

        if let Some(user_id) = user_id {
            let query = format!(
                "SELECT {} FROM users WHERE id = $1 AND deleted_at IS NULL",
                USER_COLUMNS
            );
            user = sqlx::query_as(&query)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        } else if let Some(username) = username {
            let query = format!(
                "SELECT {} FROM users WHERE username = $1 AND deleted_at IS NULL",
                USER_COLUMNS
            );
            user = sqlx::query_as(&query)
                .bind(username)
                .fetch_optional(&self.pool)
                .await?;
        } else if let Some(email) = email {
            let query = format!(
                "SELECT {} FROM users WHERE email = $1 AND deleted_at IS NULL",
                USER_COLUMNS
            );
            user = sqlx::query_as(&query)
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        }

        Ok(user)
    }

    async fn get_users(&self, pagination: Pagination) -> Result<Vec<User>, sqlx::Error> {

        let query = format!(
            "SELECT {} FROM users WHERE deleted_at IS NULL ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2",
            USER_COLUMNS
        );
        let users = sqlx::query_as(&query)
            .bind(pagination.limit)
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(users)
    }

    async fn get_user_count(&self) -> Result<i64, sqlx::Error> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE deleted_at IS NULL")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn save_user<T: Into<String> + Send>(
        &self,
        username: T,
        email: T,
        password: T,
    ) -> Result<User, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (username, email, password) VALUES ($1, $2, $3) RETURNING {}",
            USER_COLUMNS
        );
        let user = sqlx::query_as(&query)
            .bind(username.into())
            .bind(email.into())
            .bind(password.into())
            .fetch_one(&self.pool)
            .await?;

        Ok(user)
    }

    async fn update_user_profile(
        &self,
        user_id: Uuid,
        bio: Option<&str>,
        avatar_url: Option<&str>,
    ) -> Result<User, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE users
            SET bio = COALESCE($1, bio), avatar_url = COALESCE($2, avatar_url), updated_at = NOW()
            WHERE id = $3 AND deleted_at IS NULL
            RETURNING {}
            "#,
            USER_COLUMNS
        );
        let user = sqlx::query_as(&query)
            .bind(bio)
            .bind(avatar_url)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(user)
    }

    async fn update_user_role(&self, user_id: Uuid, role: UserRole) -> Result<User, sqlx::Error> {
        let query = format!(
            "UPDATE users SET role = $1, updated_at = NOW() WHERE id = $2 AND deleted_at IS NULL RETURNING {}",
            USER_COLUMNS
        );
        let user = sqlx::query_as(&query)
            .bind(role)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(user)
    }

    async fn update_user_status(
        &self,
        user_id: Uuid,
        is_active: bool,
    ) -> Result<User, sqlx::Error> {
        let query = format!(
            "UPDATE users SET is_active = $1, updated_at = NOW() WHERE id = $2 AND deleted_at IS NULL RETURNING {}",
            USER_COLUMNS
        );
        let user = sqlx::query_as(&query)
            .bind(is_active)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(user)
    }

    async fn update_user_password(
        &self,
        user_id: Uuid,
        password: String,
    ) -> Result<User, sqlx::Error> {
        let query = format!(
            "UPDATE users SET password = $1, updated_at = NOW() WHERE id = $2 AND deleted_at IS NULL RETURNING {}",
            USER_COLUMNS
        );
        let user = sqlx::query_as(&query)
            .bind(password)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(user)
    }

    async fn soft_delete_user(&self, user_id: Uuid) -> Result<(), sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET deleted_at = NOW(), is_active = FALSE, updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }

    async fn get_profile(&self, username: &str) -> Result<ProfileDto, sqlx::Error> {
        let profile = sqlx::query_as(
            r#"
            SELECT
                u.id, u.username, u.role, u.bio, u.avatar_url, u.created_at,
                (SELECT COUNT(*) FROM user_follows f WHERE f.following_id = u.id) AS followers_count,
                (SELECT COUNT(*) FROM user_follows f WHERE f.follower_id = u.id) AS following_count,
                (SELECT COUNT(*) FROM articles a
                    WHERE a.author_id = u.id AND a.status = 'published' AND a.deleted_at IS NULL) AS articles_count
            FROM users u
            WHERE u.username = $1 AND u.deleted_at IS NULL
            "#,
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await?;

        Ok(profile)
    }
}
