//! Role hierarchy and the authorization rules derived from it.
//!
//! Roles are totally ordered (reader < author < editor < admin); every rule
//! here is a rank comparison plus, where relevant, an ownership check.

use uuid::Uuid;

use crate::models::{User, UserRole};
use crate::service::ServiceError;

/// True iff `actual` ranks at least as high as `required`
pub fn has_permission(actual: UserRole, required: UserRole) -> bool {
    actual.rank() >= required.rank()
}

/// Active author or above
pub fn can_create_article(actor: &User) -> bool {
    actor.is_active && has_permission(actor.role, UserRole::Author)
}

/// Active and either the article's author or editor and above
pub fn can_modify_article(actor: &User, author_id: Uuid) -> bool {
    actor.is_active && (actor.id == author_id || has_permission(actor.role, UserRole::Editor))
}

/// Only the author of a comment may rewrite it
pub fn can_edit_comment(actor: &User, comment_author_id: Uuid) -> bool {
    actor.is_active && actor.id == comment_author_id
}

/// Comment authors remove their own comments; editors moderate any
pub fn can_delete_comment(actor: &User, comment_author_id: Uuid) -> bool {
    actor.is_active
        && (actor.id == comment_author_id || has_permission(actor.role, UserRole::Editor))
}

/// Publishing, staff picks, categories and tags
pub fn can_moderate(actor: &User) -> bool {
    actor.is_active && has_permission(actor.role, UserRole::Editor)
}

/// Deleting users and changing roles is reserved to active admins
pub fn can_manage_users(actor: &User) -> bool {
    actor.is_active && actor.role == UserRole::Admin
}

/// Whether `viewer` may see an article that is not published
pub fn can_view_unpublished(viewer: Option<&User>, author_id: Uuid) -> bool {
    match viewer {
        Some(user) => user.id == author_id || has_permission(user.role, UserRole::Editor),
        None => false,
    }
}

/// Turns a failed check into `ServiceError::Forbidden`
pub fn ensure(allowed: bool) -> Result<(), ServiceError> {
    if allowed {
        Ok(())
    } else {
        Err(ServiceError::Forbidden)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Utc;

    pub(crate) fn user_with(role: UserRole, is_active: bool) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            username: format!("user-{}", role.to_str()),
            email: format!("{}@example.com", role.to_str()),
            password: Some("hash".to_string()),
            external_id: None,
            role,
            is_active,
            is_verified: true,
            bio: None,
            avatar_url: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn hierarchy_is_a_total_order() {
        assert!(has_permission(UserRole::Editor, UserRole::Author));
        assert!(!has_permission(UserRole::Reader, UserRole::Author));
        assert!(!has_permission(UserRole::Author, UserRole::Editor));
        assert!(has_permission(UserRole::Admin, UserRole::Admin));
        assert!(has_permission(UserRole::Reader, UserRole::Reader));
    }

    #[test]
    fn article_creation_requires_active_author() {
        assert!(!can_create_article(&user_with(UserRole::Reader, true)));
        assert!(can_create_article(&user_with(UserRole::Author, true)));
        assert!(can_create_article(&user_with(UserRole::Admin, true)));
        assert!(!can_create_article(&user_with(UserRole::Author, false)));
    }

    #[test]
    fn authors_modify_only_their_own_articles() {
        let author = user_with(UserRole::Author, true);
        let other_author = Uuid::new_v4();

        assert!(can_modify_article(&author, author.id));
        assert!(!can_modify_article(&author, other_author));
        assert!(can_modify_article(&user_with(UserRole::Editor, true), other_author));

        let inactive = user_with(UserRole::Editor, false);
        assert!(!can_modify_article(&inactive, inactive.id));
    }

    #[test]
    fn comments_are_edited_by_owner_and_deleted_by_moderators() {
        let reader = user_with(UserRole::Reader, true);
        let editor = user_with(UserRole::Editor, true);

        assert!(can_edit_comment(&reader, reader.id));
        assert!(!can_edit_comment(&editor, reader.id));
        assert!(can_delete_comment(&reader, reader.id));
        assert!(can_delete_comment(&editor, reader.id));
        assert!(!can_delete_comment(&user_with(UserRole::Author, true), reader.id));
    }

    #[test]
    fn moderation_requires_editor() {
        assert!(!can_moderate(&user_with(UserRole::Author, true)));
        assert!(can_moderate(&user_with(UserRole::Editor, true)));
        assert!(can_moderate(&user_with(UserRole::Admin, true)));
        assert!(!can_moderate(&user_with(UserRole::Admin, false)));
    }

    #[test]
    fn user_management_is_admin_only() {
        assert!(!can_manage_users(&user_with(UserRole::Editor, true)));
        assert!(can_manage_users(&user_with(UserRole::Admin, true)));
        assert!(!can_manage_users(&user_with(UserRole::Admin, false)));
    }

    #[test]
    fn unpublished_articles_are_hidden_from_strangers() {
        let author = user_with(UserRole::Author, true);
        let reader = user_with(UserRole::Reader, true);
        let editor = user_with(UserRole::Editor, true);

        assert!(can_view_unpublished(Some(&author), author.id));
        assert!(!can_view_unpublished(Some(&reader), author.id));
        assert!(can_view_unpublished(Some(&editor), author.id));
        assert!(!can_view_unpublished(None, author.id));
    }

    #[test]
    fn ensure_maps_to_forbidden() {
        assert!(ensure(true).is_ok());
        assert!(matches!(ensure(false), Err(ServiceError::Forbidden)));
    }
}
