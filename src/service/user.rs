//! Profiles and admin user management.

use uuid::Uuid;

use super::{ServiceError, ServiceResult};
use crate::db::{DBClient, SocialExt, UserExt};
use crate::dtos::{ProfileDto, UpdateProfileDto};
use crate::models::{User, UserRole};
use crate::permission::{can_manage_users, ensure};
use crate::ranking::Pagination;

fn user_error(err: sqlx::Error) -> ServiceError {
    ServiceError::from_db(err, "User")
}

/// Public profile; `is_following` is set for an authenticated viewer
pub async fn profile(
    db: &DBClient,
    viewer: Option<&User>,
    username: &str,
) -> ServiceResult<ProfileDto> {
    let mut profile = db.get_profile(username).await.map_err(user_error)?;

    if let Some(viewer) = viewer {
        if viewer.id != profile.id {
            profile.is_following = Some(db.is_following(viewer.id, profile.id).await?);
        }
    }

    Ok(profile)
}

pub async fn update_profile(
    db: &DBClient,
    user: &User,
    input: UpdateProfileDto,
) -> ServiceResult<User> {
    let bio = input.bio.as_deref().map(str::trim);
    let avatar_url = input.avatar_url.as_deref().map(str::trim);

    db.update_user_profile(user.id, bio, avatar_url)
        .await
        .map_err(user_error)
}

pub async fn list_users(
    db: &DBClient,
    actor: &User,
    pagination: Pagination,
) -> ServiceResult<(Vec<User>, i64)> {
    ensure(can_manage_users(actor))?;

    let users = db.get_users(pagination).await?;
    let total = db.get_user_count().await?;
    Ok((users, total))
}

/// Admins manage other accounts, never their own
fn check_other_account(actor: &User, user_id: Uuid) -> ServiceResult<()> {
    ensure(can_manage_users(actor))?;
    if actor.id == user_id {
        return Err(ServiceError::validation(
            "Administrators cannot change their own account this way",
        ));
    }
    Ok(())
}

pub async fn change_role(
    db: &DBClient,
    actor: &User,
    user_id: Uuid,
    role: UserRole,
) -> ServiceResult<User> {
    check_other_account(actor, user_id)?;

    let user = db.update_user_role(user_id, role).await.map_err(user_error)?;
    tracing::info!("User {} role set to {} by {}", user.id, role.to_str(), actor.id);
    Ok(user)
}

pub async fn set_active(
    db: &DBClient,
    actor: &User,
    user_id: Uuid,
    is_active: bool,
) -> ServiceResult<User> {
    check_other_account(actor, user_id)?;

    let user = db
        .update_user_status(user_id, is_active)
        .await
        .map_err(user_error)?;
    tracing::info!("User {} active={} set by {}", user.id, is_active, actor.id);
    Ok(user)
}

pub async fn delete_user(db: &DBClient, actor: &User, user_id: Uuid) -> ServiceResult<()> {
    check_other_account(actor, user_id)?;

    db.soft_delete_user(user_id).await.map_err(user_error)?;
    tracing::info!("User {} deleted by {}", user_id, actor.id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::tests::user_with;

    #[test]
    fn only_admins_manage_other_accounts() {
        let admin = user_with(UserRole::Admin, true);
        let editor = user_with(UserRole::Editor, true);

        assert!(check_other_account(&admin, editor.id).is_ok());
        assert!(matches!(
            check_other_account(&editor, admin.id),
            Err(ServiceError::Forbidden)
        ));
        assert!(matches!(
            check_other_account(&admin, admin.id),
            Err(ServiceError::Validation(_))
        ));
    }
}
