//! Follow graph and category interests.

use uuid::Uuid;

use super::engagement::notify;
use super::{ServiceError, ServiceResult, dedup_ids};
use crate::db::{DBClient, SocialExt, UserExt};
use crate::dtos::UserSummaryDto;
use crate::models::{Category, NotificationType, User};
use crate::permission::ensure;
use crate::ranking::Pagination;

async fn find_user(db: &DBClient, username: &str) -> ServiceResult<User> {
    db.get_user(None, Some(username), None)
        .await?
        .ok_or_else(|| ServiceError::NotFound("User".to_string()))
}

fn check_not_self(follower_id: Uuid, following_id: Uuid) -> ServiceResult<()> {
    if follower_id == following_id {
        return Err(ServiceError::validation("You cannot follow yourself"));
    }
    Ok(())
}

pub async fn follow(db: &DBClient, actor: &User, username: &str) -> ServiceResult<()> {
    ensure(actor.is_active)?;
    let target = find_user(db, username).await?;
    check_not_self(actor.id, target.id)?;

    db.follow_user(actor.id, target.id).await.map_err(|e| match e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            ServiceError::Conflict("You are already following this user".to_string())
        }
        other => ServiceError::from_db(other, "User"),
    })?;

    notify(db, target.id, actor.id, NotificationType::Follow, None).await;
    tracing::info!("User {} followed {}", actor.id, target.id);
    Ok(())
}

/// Unfollowing someone not followed succeeds
pub async fn unfollow(db: &DBClient, actor: &User, username: &str) -> ServiceResult<()> {
    let target = find_user(db, username).await?;
    db.unfollow_user(actor.id, target.id).await?;
    Ok(())
}

pub async fn followers(
    db: &DBClient,
    username: &str,
    pagination: Pagination,
) -> ServiceResult<(Vec<UserSummaryDto>, i64)> {
    let user = find_user(db, username).await?;
    let users = db.get_followers(user.id, pagination).await?;
    let total = db.get_follower_count(user.id).await?;
    Ok((users, total))
}

pub async fn following(
    db: &DBClient,
    username: &str,
    pagination: Pagination,
) -> ServiceResult<(Vec<UserSummaryDto>, i64)> {
    let user = find_user(db, username).await?;
    let users = db.get_following(user.id, pagination).await?;
    let total = db.get_following_count(user.id).await?;
    Ok((users, total))
}

pub async fn get_interests(db: &DBClient, user: &User) -> ServiceResult<Vec<Category>> {
    Ok(db.get_interests(user.id).await?)
}

/// Replace the user's interests; on any failure the previous set stays.
/// An unknown category id is reported as NotFound.
pub async fn set_interests(
    db: &DBClient,
    user: &User,
    category_ids: Vec<Uuid>,
) -> ServiceResult<Vec<Category>> {
    let category_ids = dedup_ids(category_ids);

    db.set_interests(user.id, &category_ids)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                ServiceError::NotFound("Category".to_string())
            }
            other => ServiceError::from_db(other, "Interest"),
        })?;

    tracing::info!("User {} set {} interests", user.id, category_ids.len());
    get_interests(db, user).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_follow_is_a_validation_error() {
        let id = Uuid::new_v4();
        assert!(matches!(check_not_self(id, id), Err(ServiceError::Validation(_))));
        assert!(check_not_self(id, Uuid::new_v4()).is_ok());
    }
}
