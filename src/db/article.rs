use std::collections::HashSet;

use sqlx::{PgConnection, Postgres, QueryBuilder};
use uuid::Uuid;

use super::DBClient;
use crate::dtos::{ArticleCardRow, ArticleCategoryRow, ArticleTagRow};
use crate::models::{Article, ArticleStatus};
use crate::ranking::ArticleQuery;

const ARTICLE_COLUMNS: &str = "id, author_id, title, slug, content, excerpt, status, published_at, view_count, reading_time_minutes, is_staff_pick, created_at, updated_at, deleted_at";

/// Listing projection: article without content, plus author and engagement counts
const ARTICLE_CARD_SELECT: &str = r#"
    SELECT
        a.id, a.author_id, u.username AS author_username, a.title, a.slug, a.excerpt,
        a.status, a.published_at, a.view_count, a.reading_time_minutes, a.is_staff_pick,
        a.created_at, a.updated_at,
        (SELECT COUNT(*) FROM likes l WHERE l.article_id = a.id) AS likes_count,
        (SELECT COUNT(*) FROM comments c WHERE c.article_id = a.id AND c.deleted_at IS NULL) AS comments_count
    FROM articles a
    JOIN users u ON u.id = a.author_id
    WHERE TRUE"#;

/// Values computed by the service before an article is written
#[derive(Debug, Clone)]
pub struct ArticleDraft {
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: String,
    pub reading_time_minutes: i32,
}

/// Partial update; `None` leaves the column untouched
#[derive(Debug, Clone, Default)]
pub struct ArticleChanges {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub reading_time_minutes: Option<i32>,
    pub category_ids: Option<Vec<Uuid>>,
    pub tags: Option<Vec<(String, String)>>,
}

/// Article database operations trait
///
/// Lookups never return soft-deleted rows. Writes touching several tables
/// (article + categories + tags + tag usage counts) run in one transaction.
pub trait ArticleExt {
    async fn get_article_by_slug(&self, slug: &str) -> Result<Article, sqlx::Error>;

    /// True when any article, deleted or not, already owns `slug`
    async fn slug_exists(&self, slug: &str) -> Result<bool, sqlx::Error>;

    /// Insert an article with its categories and `(name, slug)` tags
    async fn create_article(
        &self,
        author_id: Uuid,
        draft: ArticleDraft,
        category_ids: &[Uuid],
        tags: &[(String, String)],
    ) -> Result<Article, sqlx::Error>;

    async fn update_article(
        &self,
        article_id: Uuid,
        changes: ArticleChanges,
    ) -> Result<Article, sqlx::Error>;

    /// Soft delete; releases the article's tags so usage counts stay exact
    async fn soft_delete_article(&self, article_id: Uuid) -> Result<(), sqlx::Error>;

    /// Apply a status transition and keep `published_at` consistent with it.
    /// `None` when the article is gone or no longer in status `from`.
    async fn set_article_status(
        &self,
        article_id: Uuid,
        from: ArticleStatus,
        to: ArticleStatus,
    ) -> Result<Option<Article>, sqlx::Error>;

    async fn set_staff_pick(&self, article_id: Uuid, is_staff_pick: bool)
    -> Result<Article, sqlx::Error>;

    /// Atomic `view_count + 1`, returns the new value
    async fn increment_view_count(&self, article_id: Uuid) -> Result<i64, sqlx::Error>;

    async fn list_articles(&self, query: &ArticleQuery) -> Result<Vec<ArticleCardRow>, sqlx::Error>;

    async fn count_articles(&self, query: &ArticleQuery) -> Result<i64, sqlx::Error>;

    async fn get_article_card(&self, article_id: Uuid) -> Result<ArticleCardRow, sqlx::Error>;

    async fn get_article_categories(
        &self,
        article_ids: &[Uuid],
    ) -> Result<Vec<ArticleCategoryRow>, sqlx::Error>;

    async fn get_article_tags(&self, article_ids: &[Uuid]) -> Result<Vec<ArticleTagRow>, sqlx::Error>;

    /// Category ids and tag ids of one article, used to find related articles
    async fn get_article_taxonomy_ids(
        &self,
        article_id: Uuid,
    ) -> Result<(Vec<Uuid>, Vec<Uuid>), sqlx::Error>;

    /// Which of `article_ids` the user liked and bookmarked
    async fn get_viewer_flags(
        &self,
        user_id: Uuid,
        article_ids: &[Uuid],
    ) -> Result<(HashSet<Uuid>, HashSet<Uuid>), sqlx::Error>;
}

impl ArticleExt for DBClient {
    async fn get_article_by_slug(&self, slug: &str) -> Result<Article, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM articles WHERE slug = $1 AND deleted_at IS NULL",
            ARTICLE_COLUMNS
        );
        sqlx::query_as(&query)
            .bind(slug)
            .fetch_one(&self.pool)
            .await
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM articles WHERE slug = $1)")
            .bind(slug)
            .fetch_one(&self.pool)
            .await
    }

    async fn create_article(
        &self,
        author_id: Uuid,
        draft: ArticleDraft,
        category_ids: &[Uuid],
        tags: &[(String, String)],
    ) -> Result<Article, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let query = format!(
            r#"
            INSERT INTO articles (author_id, title, slug, content, excerpt, reading_time_minutes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            ARTICLE_COLUMNS
        );
        let article: Article = sqlx::query_as(&query)
            .bind(author_id)
            .bind(&draft.title)
            .bind(&draft.slug)
            .bind(&draft.content)
            .bind(&draft.excerpt)
            .bind(draft.reading_time_minutes)
            .fetch_one(&mut *tx)
            .await?;

        replace_categories(&mut tx, article.id, category_ids).await?;
        sync_tags(&mut tx, article.id, tags).await?;

        tx.commit().await?;
        Ok(article)
    }

    async fn update_article(
        &self,
        article_id: Uuid,
        changes: ArticleChanges,
    ) -> Result<Article, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let query = format!(
            r#"
            UPDATE articles
            SET title = COALESCE($1, title),
                slug = COALESCE($2, slug),
                content = COALESCE($3, content),
                excerpt = COALESCE($4, excerpt),
                reading_time_minutes = COALESCE($5, reading_time_minutes),
                updated_at = NOW()
            WHERE id = $6 AND deleted_at IS NULL
            RETURNING {}
            "#,
            ARTICLE_COLUMNS
        );
        let article: Article = sqlx::query_as(&query)
            .bind(changes.title)
            .bind(changes.slug)
            .bind(changes.content)
            .bind(changes.excerpt)
            .bind(changes.reading_time_minutes)
            .bind(article_id)
            .fetch_one(&mut *tx)
            .await?;

        if let Some(category_ids) = &changes.category_ids {
            replace_categories(&mut tx, article_id, category_ids).await?;
        }
        if let Some(tags) = &changes.tags {
            sync_tags(&mut tx, article_id, tags).await?;
        }

        tx.commit().await?;
        Ok(article)
    }

    async fn soft_delete_article(&self, article_id: Uuid) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE articles SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(article_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        sync_tags(&mut tx, article_id, &[]).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn set_article_status(
        &self,
        article_id: Uuid,
        from: ArticleStatus,
        to: ArticleStatus,
    ) -> Result<Option<Article>, sqlx::Error> {
        // Publishing keeps the first publication date on re-publish of an
        // already published article; every other status clears it.
        let query = format!(
            r#"
            UPDATE articles
            SET status = $1,
                published_at = CASE
                    WHEN $1 = 'published'::article_status THEN COALESCE(published_at, NOW())
                    ELSE NULL
                END,
                updated_at = NOW()
            WHERE id = $2 AND status = $3 AND deleted_at IS NULL
            RETURNING {}
            "#,
            ARTICLE_COLUMNS
        );
        sqlx::query_as(&query)
            .bind(to)
            .bind(article_id)
            .bind(from)
            .fetch_optional(&self.pool)
            .await
    }

    async fn set_staff_pick(
        &self,
        article_id: Uuid,
        is_staff_pick: bool,
    ) -> Result<Article, sqlx::Error> {
        let query = format!(
            "UPDATE articles SET is_staff_pick = $1, updated_at = NOW() WHERE id = $2 AND deleted_at IS NULL RETURNING {}",
            ARTICLE_COLUMNS
        );
        sqlx::query_as(&query)
            .bind(is_staff_pick)
            .bind(article_id)
            .fetch_one(&self.pool)
            .await
    }

    async fn increment_view_count(&self, article_id: Uuid) -> Result<i64, sqlx::Error> {
        // Single UPDATE so concurrent reads never lose an increment
        sqlx::query_scalar(
            "UPDATE articles SET view_count = view_count + 1 WHERE id = $1 AND deleted_at IS NULL RETURNING view_count",
        )
        .bind(article_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn list_articles(&self, query: &ArticleQuery) -> Result<Vec<ArticleCardRow>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new(ARTICLE_CARD_SELECT);
        query.push_predicates(&mut qb);
        query.push_ordering(&mut qb);
        query.push_pagination(&mut qb);

        qb.build_query_as::<ArticleCardRow>()
            .fetch_all(&self.pool)
            .await
    }

    async fn count_articles(&self, query: &ArticleQuery) -> Result<i64, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM articles a WHERE TRUE");
        query.push_predicates(&mut qb);

        qb.build_query_scalar::<i64>().fetch_one(&self.pool).await
    }

    async fn get_article_card(&self, article_id: Uuid) -> Result<ArticleCardRow, sqlx::Error> {
        let query = format!("{} AND a.id = $1 AND a.deleted_at IS NULL", ARTICLE_CARD_SELECT);
        sqlx::query_as(&query)
            .bind(article_id)
            .fetch_one(&self.pool)
            .await
    }

    async fn get_article_categories(
        &self,
        article_ids: &[Uuid],
    ) -> Result<Vec<ArticleCategoryRow>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT ac.article_id, c.id, c.name, c.slug
            FROM article_categories ac
            JOIN categories c ON c.id = ac.category_id
            WHERE ac.article_id = ANY($1)
            ORDER BY c.display_order, c.name
            "#,
        )
        .bind(article_ids)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_article_tags(&self, article_ids: &[Uuid]) -> Result<Vec<ArticleTagRow>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT art.article_id, t.id, t.name, t.slug
            FROM article_tags art
            JOIN tags t ON t.id = art.tag_id
            WHERE art.article_id = ANY($1)
            ORDER BY t.name
            "#,
        )
        .bind(article_ids)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_article_taxonomy_ids(
        &self,
        article_id: Uuid,
    ) -> Result<(Vec<Uuid>, Vec<Uuid>), sqlx::Error> {
        let category_ids: Vec<Uuid> =
            sqlx::query_scalar("SELECT category_id FROM article_categories WHERE article_id = $1")
                .bind(article_id)
                .fetch_all(&self.pool)
                .await?;

        let tag_ids: Vec<Uuid> =
            sqlx::query_scalar("SELECT tag_id FROM article_tags WHERE article_id = $1")
                .bind(article_id)
                .fetch_all(&self.pool)
                .await?;

        Ok((category_ids, tag_ids))
    }

    async fn get_viewer_flags(
        &self,
        user_id: Uuid,
        article_ids: &[Uuid],
    ) -> Result<(HashSet<Uuid>, HashSet<Uuid>), sqlx::Error> {
        let liked: Vec<Uuid> = sqlx::query_scalar(
            "SELECT article_id FROM likes WHERE user_id = $1 AND article_id = ANY($2)",
        )
        .bind(user_id)
        .bind(article_ids)
        .fetch_all(&self.pool)
        .await?;

        let bookmarked: Vec<Uuid> = sqlx::query_scalar(
            "SELECT article_id FROM bookmarks WHERE user_id = $1 AND article_id = ANY($2)",
        )
        .bind(user_id)
        .bind(article_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok((liked.into_iter().collect(), bookmarked.into_iter().collect()))
    }
}

/// Replace the article's category set
async fn replace_categories(
    conn: &mut PgConnection,
    article_id: Uuid,
    category_ids: &[Uuid],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM article_categories WHERE article_id = $1")
        .bind(article_id)
        .execute(&mut *conn)
        .await?;

    if category_ids.is_empty() {
        return Ok(());
    }

    // Unknown category ids fail with a foreign key violation
    sqlx::query(
        r#"
        INSERT INTO article_categories (article_id, category_id)
        SELECT $1, UNNEST($2::uuid[])
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(article_id)
    .bind(category_ids)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Make the article's tag set equal to `tags`, creating missing tags and
/// adjusting `usage_count` only for links actually added or removed
async fn sync_tags(
    conn: &mut PgConnection,
    article_id: Uuid,
    tags: &[(String, String)],
) -> Result<(), sqlx::Error> {
    let mut wanted: Vec<Uuid> = Vec::with_capacity(tags.len());
    for (name, slug) in tags {
        let tag_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO tags (name, slug) VALUES ($1, $2)
            ON CONFLICT (slug) DO UPDATE SET slug = EXCLUDED.slug
            RETURNING id
            "#,
        )
        .bind(name)
        .bind(slug)
        .fetch_one(&mut *conn)
        .await?;

        if !wanted.contains(&tag_id) {
            wanted.push(tag_id);
        }
    }

    let existing: Vec<Uuid> =
        sqlx::query_scalar("SELECT tag_id FROM article_tags WHERE article_id = $1")
            .bind(article_id)
            .fetch_all(&mut *conn)
            .await?;

    let removed: Vec<Uuid> = existing
        .iter()
        .filter(|id| !wanted.contains(id))
        .copied()
        .collect();
    let added: Vec<Uuid> = wanted
        .iter()
        .filter(|id| !existing.contains(id))
        .copied()
        .collect();

    if !removed.is_empty() {
        sqlx::query("DELETE FROM article_tags WHERE article_id = $1 AND tag_id = ANY($2)")
            .bind(article_id)
            .bind(&removed)
            .execute(&mut *conn)
            .await?;

        sqlx::query(
            "UPDATE tags SET usage_count = GREATEST(usage_count - 1, 0) WHERE id = ANY($1)",
        )
        .bind(&removed)
        .execute(&mut *conn)
        .await?;
    }

    if !added.is_empty() {
        sqlx::query(
            "INSERT INTO article_tags (article_id, tag_id) SELECT $1, UNNEST($2::uuid[])",
        )
        .bind(article_id)
        .bind(&added)
        .execute(&mut *conn)
        .await?;

        sqlx::query("UPDATE tags SET usage_count = usage_count + 1 WHERE id = ANY($1)")
            .bind(&added)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures;
    use sqlx::PgPool;

    #[sqlx::test(migrations = "./migrations")]
    async fn view_count_only_goes_up(pool: PgPool) {
        let db = DBClient::new(pool);
        let author = fixtures::user(&db, "author").await;
        let article =
            fixtures::article(&db, &author, "counted", ArticleStatus::Published, &[]).await;
        assert_eq!(article.view_count, 0);

        let mut previous = 0;
        for _ in 0..3 {
            let current = db.increment_view_count(article.id).await.unwrap();
            assert_eq!(current, previous + 1);
            previous = current;
        }
        assert_eq!(db.get_article_by_slug("counted").await.unwrap().view_count, 3);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn status_change_requires_the_expected_current_status(pool: PgPool) {
        let db = DBClient::new(pool);
        let author = fixtures::user(&db, "author").await;
        let article = fixtures::article(&db, &author, "guarded", ArticleStatus::Draft, &[]).await;

        let published = db
            .set_article_status(article.id, ArticleStatus::Draft, ArticleStatus::Published)
            .await
            .unwrap()
            .unwrap();
        assert!(published.published_at.is_some());

        let archived = db
            .set_article_status(article.id, ArticleStatus::Published, ArticleStatus::Archived)
            .await
            .unwrap()
            .unwrap();
        assert!(archived.published_at.is_none());

        // A publish decided on the earlier read must not resurrect it
        let stale = db
            .set_article_status(article.id, ArticleStatus::Published, ArticleStatus::Published)
            .await
            .unwrap();
        assert!(stale.is_none());

        let current = db.get_article_by_slug("guarded").await.unwrap();
        assert_eq!(current.status, ArticleStatus::Archived);
        assert!(current.published_at.is_none());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn related_skips_the_article_itself_and_drafts(pool: PgPool) {
        let db = DBClient::new(pool);
        let author = fixtures::user(&db, "author").await;
        let rust = fixtures::category(&db, "Rust").await;
        let life = fixtures::category(&db, "Life").await;

        let origin =
            fixtures::article(&db, &author, "origin", ArticleStatus::Published, &[rust.id]).await;
        let sibling =
            fixtures::article(&db, &author, "sibling", ArticleStatus::Published, &[rust.id]).await;
        fixtures::article(&db, &author, "draft", ArticleStatus::Draft, &[rust.id]).await;
        fixtures::article(&db, &author, "archived", ArticleStatus::Archived, &[rust.id]).await;
        fixtures::article(&db, &author, "elsewhere", ArticleStatus::Published, &[life.id]).await;

        let (category_ids, tag_ids) = db.get_article_taxonomy_ids(origin.id).await.unwrap();
        assert_eq!(category_ids, vec![rust.id]);

        let query = ArticleQuery::related(origin.id, category_ids, tag_ids, None);
        let ids: Vec<Uuid> = db
            .list_articles(&query)
            .await
            .unwrap()
            .into_iter()
            .map(|card| card.id)
            .collect();
        assert_eq!(ids, vec![sibling.id]);
    }
}
