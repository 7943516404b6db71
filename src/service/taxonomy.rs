//! Categories (a tree, edited by editors) and tags.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use super::{ServiceError, ServiceResult};
use crate::db::{CategoryChanges, CategoryExt, CategoryUpdate, DBClient, NewCategory, TagExt};
use crate::dtos::{CategoryNode, InputCategoryDto, InputTagDto, UpdateCategoryDto};
use crate::models::{Category, Tag, User};
use crate::permission::{can_moderate, ensure};
use crate::ranking::Pagination;
use crate::utils::slug::slugify;

fn category_error(err: sqlx::Error) -> ServiceError {
    ServiceError::from_db(err, "Category")
}

fn category_slug(requested: Option<&str>, name: &str) -> ServiceResult<String> {
    let slug = slugify(requested.unwrap_or(name));
    if slug.is_empty() {
        return Err(ServiceError::validation(
            "Category slug must contain at least one letter or digit",
        ));
    }
    Ok(slug)
}

/// Nest categories under their parents, siblings by `display_order` then name.
/// Categories whose parent is absent from the input become roots.
pub fn build_tree(categories: Vec<Category>) -> Vec<CategoryNode> {
    let ids: HashSet<Uuid> = categories.iter().map(|c| c.id).collect();

    let mut children: HashMap<Option<Uuid>, Vec<Category>> = HashMap::new();
    for category in categories {
        let parent = category.parent_id.filter(|parent_id| ids.contains(parent_id));
        children.entry(parent).or_default().push(category);
    }
    for siblings in children.values_mut() {
        siblings.sort_by(|a, b| {
            a.display_order
                .cmp(&b.display_order)
                .then_with(|| a.name.cmp(&b.name))
        });
    }

    attach(None, &mut children)
}

fn attach(
    parent: Option<Uuid>,
    children: &mut HashMap<Option<Uuid>, Vec<Category>>,
) -> Vec<CategoryNode> {
    let siblings = children.remove(&parent).unwrap_or_default();

    siblings
        .into_iter()
        .map(|category| {
            let nested = attach(Some(category.id), children);
            CategoryNode {
                category,
                children: nested,
            }
        })
        .collect()
}

pub async fn list_categories(db: &DBClient, include_inactive: bool) -> ServiceResult<Vec<Category>> {
    Ok(db.get_categories(include_inactive).await?)
}

pub async fn category_tree(
    db: &DBClient,
    include_inactive: bool,
) -> ServiceResult<Vec<CategoryNode>> {
    let categories = db.get_categories(include_inactive).await?;
    Ok(build_tree(categories))
}

/// Looks a category up by id, or by slug when `key` is not a UUID
pub async fn get_category(db: &DBClient, key: &str) -> ServiceResult<Category> {
    match Uuid::parse_str(key) {
        Ok(category_id) => db.get_category(category_id).await,
        Err(_) => db.get_category_by_slug(key).await,
    }
    .map_err(category_error)
}

pub async fn create_category(
    db: &DBClient,
    actor: &User,
    input: InputCategoryDto,
) -> ServiceResult<Category> {
    ensure(can_moderate(actor))?;

    if let Some(parent_id) = input.parent_id {
        db.get_category(parent_id)
            .await
            .map_err(|e| ServiceError::from_db(e, "Parent category"))?;
    }

    let name = input.name.trim().to_string();
    let category = NewCategory {
        slug: category_slug(input.slug.as_deref(), &name)?,
        name,
        description: input.description,
        parent_id: input.parent_id,
        display_order: input.display_order.unwrap_or(0),
        is_active: input.is_active.unwrap_or(true),
    };

    let created = db.create_category(category).await.map_err(category_error)?;
    tracing::info!("Category {} created by {}", created.id, actor.id);
    Ok(created)
}

pub async fn update_category(
    db: &DBClient,
    actor: &User,
    category_id: Uuid,
    input: UpdateCategoryDto,
) -> ServiceResult<Category> {
    ensure(can_moderate(actor))?;
    db.get_category(category_id).await.map_err(category_error)?;

    let parent_id = if input.detach {
        Some(None)
    } else if let Some(parent_id) = input.parent_id {
        if parent_id == category_id {
            return Err(ServiceError::validation(
                "A category cannot be its own parent",
            ));
        }
        db.get_category(parent_id)
            .await
            .map_err(|e| ServiceError::from_db(e, "Parent category"))?;
        Some(Some(parent_id))
    } else {
        None
    };

    let name = input.name.map(|n| n.trim().to_string());
    let slug = match input.slug.as_deref() {
        Some(requested) => Some(category_slug(Some(requested), requested)?),
        None => None,
    };

    let changes = CategoryChanges {
        name,
        slug,
        description: input.description,
        parent_id,
        display_order: input.display_order,
        is_active: input.is_active,
    };

    let updated = match db
        .update_category(category_id, changes)
        .await
        .map_err(category_error)?
    {
        CategoryUpdate::Updated(category) => category,
        CategoryUpdate::Cycle => {
            return Err(ServiceError::validation(
                "A category cannot be moved under one of its descendants",
            ));
        }
    };
    tracing::info!("Category {} updated by {}", updated.id, actor.id);
    Ok(updated)
}

pub async fn delete_category(db: &DBClient, actor: &User, category_id: Uuid) -> ServiceResult<()> {
    ensure(can_moderate(actor))?;
    db.delete_category(category_id)
        .await
        .map_err(category_error)?;
    tracing::info!("Category {} deleted by {}", category_id, actor.id);
    Ok(())
}

pub async fn list_tags(db: &DBClient, pagination: Pagination) -> ServiceResult<(Vec<Tag>, i64)> {
    let tags = db.get_tags(pagination).await?;
    let total = db.get_tag_count().await?;
    Ok((tags, total))
}

pub async fn get_tag(db: &DBClient, slug: &str) -> ServiceResult<Tag> {
    db.get_tag_by_slug(slug)
        .await
        .map_err(|e| ServiceError::from_db(e, "Tag"))
}

pub async fn create_tag(db: &DBClient, actor: &User, input: InputTagDto) -> ServiceResult<Tag> {
    ensure(can_moderate(actor))?;

    let name = input.name.trim();
    let slug = slugify(name);
    if slug.is_empty() {
        return Err(ServiceError::validation(
            "Tag name must contain at least one letter or digit",
        ));
    }

    db.create_tag(name, &slug)
        .await
        .map_err(|e| ServiceError::from_db(e, "Tag"))
}

pub async fn delete_tag(db: &DBClient, actor: &User, slug: &str) -> ServiceResult<()> {
    ensure(can_moderate(actor))?;
    let tag = get_tag(db, slug).await?;
    db.delete_tag(tag.id)
        .await
        .map_err(|e| ServiceError::from_db(e, "Tag"))?;
    tracing::info!("Tag {} deleted by {}", tag.slug, actor.id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{UserExt, fixtures};
    use crate::models::UserRole;
    use chrono::Utc;
    use sqlx::PgPool;

    fn category(name: &str, parent_id: Option<Uuid>, display_order: i32) -> Category {
        let now = Utc::now();
        Category {
            id: Uuid::new_v4(),
            name: name.to_string(),
            slug: slugify(name),
            description: None,
            parent_id,
            display_order,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn tree_nests_children_in_display_order() {
        let tech = category("Tech", None, 1);
        let life = category("Life", None, 0);
        let rust = category("Rust", Some(tech.id), 2);
        let go = category("Go", Some(tech.id), 1);
        let tech_id = tech.id;

        let tree = build_tree(vec![rust, tech, go, life]);

        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].category.name, "Life");
        assert_eq!(tree[1].category.id, tech_id);
        let names: Vec<&str> = tree[1]
            .children
            .iter()
            .map(|n| n.category.name.as_str())
            .collect();
        assert_eq!(names, vec!["Go", "Rust"]);
    }

    #[test]
    fn orphans_become_roots() {
        let orphan = category("Orphan", Some(Uuid::new_v4()), 0);
        let tree = build_tree(vec![orphan]);
        assert_eq!(tree.len(), 1);
        assert!(tree[0].children.is_empty());
    }

    #[test]
    fn category_slug_falls_back_to_name() {
        assert_eq!(category_slug(None, "Web Development").unwrap(), "web-development");
        assert_eq!(category_slug(Some("web"), "Web Development").unwrap(), "web");
        assert!(category_slug(None, "***").is_err());
    }

    fn reparent(parent_id: Uuid) -> UpdateCategoryDto {
        UpdateCategoryDto {
            name: None,
            slug: None,
            description: None,
            parent_id: Some(parent_id),
            detach: false,
            display_order: None,
            is_active: None,
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn moving_a_category_under_its_descendant_is_rejected(pool: PgPool) {
        let db = DBClient::new(pool);
        let editor = fixtures::user(&db, "editor").await;
        let editor = db.update_user_role(editor.id, UserRole::Editor).await.unwrap();
        let tech = fixtures::category(&db, "Tech").await;
        let rust = fixtures::category(&db, "Rust").await;

        let moved = update_category(&db, &editor, rust.id, reparent(tech.id))
            .await
            .unwrap();
        assert_eq!(moved.parent_id, Some(tech.id));

        let result = update_category(&db, &editor, tech.id, reparent(rust.id)).await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));

        let result = update_category(&db, &editor, tech.id, reparent(tech.id)).await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));

        let tree = category_tree(&db, false).await.unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].children[0].category.id, rust.id);
    }
}
