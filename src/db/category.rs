use super::DBClient;
use crate::models::Category;
use uuid::Uuid;

const CATEGORY_COLUMNS: &str =
    "id, name, slug, description, parent_id, display_order, is_active, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
    pub display_order: i32,
    pub is_active: bool,
}

/// Partial update. `parent_id: Some(None)` moves the category to the root.
#[derive(Debug, Clone, Default)]
pub struct CategoryChanges {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub parent_id: Option<Option<Uuid>>,
    pub display_order: Option<i32>,
    pub is_active: Option<bool>,
}

/// Outcome of `update_category`
#[derive(Debug)]
pub enum CategoryUpdate {
    Updated(Category),
    /// The requested parent is the category itself or one of its descendants
    Cycle,
}

/// Category database operations trait
pub trait CategoryExt {
    /// All categories ordered for display
    async fn get_categories(&self, include_inactive: bool) -> Result<Vec<Category>, sqlx::Error>;

    async fn get_category(&self, category_id: Uuid) -> Result<Category, sqlx::Error>;

    async fn get_category_by_slug(&self, slug: &str) -> Result<Category, sqlx::Error>;

    async fn create_category(&self, category: NewCategory) -> Result<Category, sqlx::Error>;

    /// Re-parenting takes a table lock, so the ancestry check and the write
    /// see the same tree.
    async fn update_category(
        &self,
        category_id: Uuid,
        changes: CategoryChanges,
    ) -> Result<CategoryUpdate, sqlx::Error>;

    /// Children are detached to the root by the foreign key
    async fn delete_category(&self, category_id: Uuid) -> Result<(), sqlx::Error>;
}

impl CategoryExt for DBClient {
    async fn get_categories(&self, include_inactive: bool) -> Result<Vec<Category>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM categories WHERE ($1 OR is_active) ORDER BY display_order, name",
            CATEGORY_COLUMNS
        );
        sqlx::query_as(&query)
            .bind(include_inactive)
            .fetch_all(&self.pool)
            .await
    }

    async fn get_category(&self, category_id: Uuid) -> Result<Category, sqlx::Error> {
        let query = format!("SELECT {} FROM categories WHERE id = $1", CATEGORY_COLUMNS);
        sqlx::query_as(&query)
            .bind(category_id)
            .fetch_one(&self.pool)
            .await
    }

    async fn get_category_by_slug(&self, slug: &str) -> Result<Category, sqlx::Error> {
        let query = format!("SELECT {} FROM categories WHERE slug = $1", CATEGORY_COLUMNS);
        sqlx::query_as(&query)
            .bind(slug)
            .fetch_one(&self.pool)
            .await
    }

    async fn create_category(&self, category: NewCategory) -> Result<Category, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO categories (name, slug, description, parent_id, display_order, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            CATEGORY_COLUMNS
        );
        sqlx::query_as(&query)
            .bind(category.name)
            .bind(category.slug)
            .bind(category.description)
            .bind(category.parent_id)
            .bind(category.display_order)
            .bind(category.is_active)
            .fetch_one(&self.pool)
            .await
    }

    async fn update_category(
        &self,
        category_id: Uuid,
        changes: CategoryChanges,
    ) -> Result<CategoryUpdate, sqlx::Error> {
        let (set_parent, parent_id) = match changes.parent_id {
            Some(parent_id) => (true, parent_id),
            None => (false, None),
        };

        let mut tx = self.pool.begin().await?;

        if let Some(new_parent) = parent_id {
            // Conflicts with itself, so concurrent moves run one after another
            sqlx::query("LOCK TABLE categories IN SHARE ROW EXCLUSIVE MODE")
                .execute(&mut *tx)
                .await?;

            let is_descendant: bool = sqlx::query_scalar(
                r#"
                WITH RECURSIVE ancestors (id, parent_id) AS (
                    SELECT id, parent_id FROM categories WHERE id = $1
                    UNION
                    SELECT c.id, c.parent_id
                    FROM categories c
                    JOIN ancestors a ON c.id = a.parent_id
                )
                SELECT EXISTS (SELECT 1 FROM ancestors WHERE id = $2)
                "#,
            )
            .bind(new_parent)
            .bind(category_id)
            .fetch_one(&mut *tx)
            .await?;

            if is_descendant {
                return Ok(CategoryUpdate::Cycle);
            }
        }

        let query = format!(
            r#"
            UPDATE categories
            SET name = COALESCE($1, name),
                slug = COALESCE($2, slug),
                description = COALESCE($3, description),
                parent_id = CASE WHEN $4 THEN $5 ELSE parent_id END,
                display_order = COALESCE($6, display_order),
                is_active = COALESCE($7, is_active),
                updated_at = NOW()
            WHERE id = $8
            RETURNING {}
            "#,
            CATEGORY_COLUMNS
        );
        let category: Category = sqlx::query_as(&query)
            .bind(changes.name)
            .bind(changes.slug)
            .bind(changes.description)
            .bind(set_parent)
            .bind(parent_id)
            .bind(changes.display_order)
            .bind(changes.is_active)
            .bind(category_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(CategoryUpdate::Updated(category))
    }

    async fn delete_category(&self, category_id: Uuid) -> Result<(), sqlx::Error> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(category_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::PgPool;

    fn new_category(name: &str, parent_id: Option<Uuid>) -> NewCategory {
        NewCategory {
            name: name.to_string(),
            slug: name.to_lowercase(),
            description: None,
            parent_id,
            display_order: 0,
            is_active: true,
        }
    }

    fn move_under(parent_id: Uuid) -> CategoryChanges {
        CategoryChanges {
            parent_id: Some(Some(parent_id)),
            ..Default::default()
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn moving_under_a_descendant_is_rejected(pool: PgPool) {
        let db = DBClient::new(pool);
        let root = db.create_category(new_category("Tech", None)).await.unwrap();
        let child = db
            .create_category(new_category("Rust", Some(root.id)))
            .await
            .unwrap();
        let grandchild = db
            .create_category(new_category("Async", Some(child.id)))
            .await
            .unwrap();

        let outcome = db
            .update_category(root.id, move_under(grandchild.id))
            .await
            .unwrap();
        assert!(matches!(outcome, CategoryUpdate::Cycle));
        assert_eq!(db.get_category(root.id).await.unwrap().parent_id, None);

        let outcome = db
            .update_category(grandchild.id, move_under(root.id))
            .await
            .unwrap();
        match outcome {
            CategoryUpdate::Updated(category) => assert_eq!(category.parent_id, Some(root.id)),
            CategoryUpdate::Cycle => panic!("moving toward the root must be allowed"),
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn concurrent_swaps_cannot_form_a_loop(pool: PgPool) {
        let db = DBClient::new(pool);
        let a = db.create_category(new_category("Alpha", None)).await.unwrap();
        let b = db.create_category(new_category("Beta", None)).await.unwrap();

        let (first, second) = tokio::join!(
            db.update_category(a.id, move_under(b.id)),
            db.update_category(b.id, move_under(a.id)),
        );
        let outcomes = [first.unwrap(), second.unwrap()];
        let updated = outcomes
            .iter()
            .filter(|outcome| matches!(outcome, CategoryUpdate::Updated(_)))
            .count();
        assert_eq!(updated, 1);

        let a = db.get_category(a.id).await.unwrap();
        let b = db.get_category(b.id).await.unwrap();
        assert!(a.parent_id.is_none() || b.parent_id.is_none());
    }
}
