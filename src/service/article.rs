//! Article authoring, lifecycle and every article listing.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use super::{ServiceError, ServiceResult, dedup_ids};
use crate::db::{
    ArticleChanges, ArticleDraft, ArticleExt, DBClient, NotificationExt, SocialExt,
};
use crate::dtos::{
    ArticleCardRow, ArticleCategoryRow, ArticleDto, ArticleTagRow, ArticlesQueryParams,
    InputArticleDto, SearchQueryParams, TaxonomyRef, UpdateArticleDto,
};
use crate::models::{Article, ArticleStatus, User, UserRole, reading_time_minutes};
use crate::permission::{
    can_create_article, can_moderate, can_modify_article, can_view_unpublished, ensure,
    has_permission,
};
use crate::ranking::{ArticleFilter, ArticleQuery, ArticleSort, Pagination};
use crate::utils::content::{derive_excerpt, sanitize_html};
use crate::utils::slug::{slugify, with_suffix};

/// One page of articles plus the total row count of the listing
#[derive(Debug)]
pub struct ArticlePage {
    pub items: Vec<ArticleDto>,
    pub total: i64,
    pub pagination: Pagination,
}

fn article_error(err: sqlx::Error) -> ServiceError {
    match err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            ServiceError::Conflict("Article slug already exists".to_string())
        }
        other => ServiceError::from_db(other, "Article"),
    }
}

async fn load_article(db: &DBClient, slug: &str) -> ServiceResult<Article> {
    db.get_article_by_slug(slug).await.map_err(article_error)
}

/// Trimmed, de-duplicated `(name, slug)` pairs; names without any
/// alphanumeric character are dropped
pub fn normalize_tags(tags: &[String]) -> Vec<(String, String)> {
    let mut normalized: Vec<(String, String)> = Vec::new();
    for name in tags {
        let name = name.trim();
        let slug = slugify(name);
        if slug.is_empty() || normalized.iter().any(|(_, s)| *s == slug) {
            continue;
        }
        normalized.push((name.to_string(), slug));
    }
    normalized
}

fn explicit_slug(requested: &str) -> ServiceResult<String> {
    let slug = slugify(requested);
    if slug.is_empty() {
        return Err(ServiceError::validation(
            "Slug must contain at least one letter or digit",
        ));
    }
    Ok(slug)
}

async fn generate_slug(db: &DBClient, title: &str) -> ServiceResult<String> {
    let base = slugify(title);
    let base = if base.is_empty() {
        "article".to_string()
    } else {
        base
    };

    if db.slug_exists(&base).await? {
        Ok(with_suffix(&base))
    } else {
        Ok(base)
    }
}

fn clean_content(content: &str) -> ServiceResult<String> {
    let content = sanitize_html(content);
    if content.trim().is_empty() {
        return Err(ServiceError::validation("Content cannot be empty"));
    }
    Ok(content)
}

pub async fn create_article(
    db: &DBClient,
    actor: &User,
    input: InputArticleDto,
) -> ServiceResult<ArticleDto> {
    ensure(can_create_article(actor))?;

    let content = clean_content(&input.content)?;
    let excerpt = match input.excerpt.as_deref().map(str::trim) {
        Some(excerpt) if !excerpt.is_empty() => excerpt.to_string(),
        _ => derive_excerpt(&content),
    };
    let slug = match input.slug.as_deref() {
        Some(requested) => explicit_slug(requested)?,
        None => generate_slug(db, &input.title).await?,
    };

    let draft = ArticleDraft {
        title: input.title.trim().to_string(),
        slug,
        reading_time_minutes: reading_time_minutes(&content),
        content,
        excerpt,
    };
    let category_ids = dedup_ids(input.category_ids);
    let tags = normalize_tags(&input.tags);

    let article = db
        .create_article(actor.id, draft, &category_ids, &tags)
        .await
        .map_err(article_error)?;

    tracing::info!("Article {} created by {}", article.id, actor.id);
    article_detail(db, Some(actor), article).await
}

pub async fn update_article(
    db: &DBClient,
    actor: &User,
    slug: &str,
    input: UpdateArticleDto,
) -> ServiceResult<ArticleDto> {
    let article = load_article(db, slug).await?;
    ensure(can_modify_article(actor, article.author_id))?;

    let content = match input.content.as_deref() {
        Some(content) => Some(clean_content(content)?),
        None => None,
    };
    let excerpt = match (input.excerpt.as_deref().map(str::trim), &content) {
        (Some(excerpt), _) if !excerpt.is_empty() => Some(excerpt.to_string()),
        (_, Some(content)) => Some(derive_excerpt(content)),
        _ => None,
    };
    let new_slug = match input.slug.as_deref() {
        Some(requested) => {
            let requested = explicit_slug(requested)?;
            (requested != article.slug).then_some(requested)
        }
        None => None,
    };

    let changes = ArticleChanges {
        title: input.title.map(|t| t.trim().to_string()),
        slug: new_slug,
        reading_time_minutes: content.as_deref().map(reading_time_minutes),
        content,
        excerpt,
        category_ids: input.category_ids.map(dedup_ids),
        tags: input.tags.as_deref().map(normalize_tags),
    };

    let updated = db
        .update_article(article.id, changes)
        .await
        .map_err(article_error)?;

    tracing::info!("Article {} updated by {}", updated.id, actor.id);
    article_detail(db, Some(actor), updated).await
}

pub async fn delete_article(db: &DBClient, actor: &User, slug: &str) -> ServiceResult<()> {
    let article = load_article(db, slug).await?;
    ensure(can_modify_article(actor, article.author_id))?;

    db.soft_delete_article(article.id)
        .await
        .map_err(article_error)?;

    tracing::info!("Article {} deleted by {}", article.id, actor.id);
    Ok(())
}

/// Publish, unpublish or archive. Re-applying the current status is a no-op;
/// leaving `archived` is rejected.
pub async fn change_status(
    db: &DBClient,
    actor: &User,
    slug: &str,
    target: ArticleStatus,
) -> ServiceResult<ArticleDto> {
    ensure(can_moderate(actor))?;
    let article = load_article(db, slug).await?;

    if !article.status.can_transition_to(target) {
        return Err(ServiceError::validation(format!(
            "Cannot change status from {} to {}",
            article.status.to_str(),
            target.to_str()
        )));
    }
    if article.status == target {
        return article_detail(db, Some(actor), article).await;
    }

    // Guarded on the status read above, so a concurrent transition wins
    let updated = db
        .set_article_status(article.id, article.status, target)
        .await
        .map_err(article_error)?
        .ok_or_else(|| {
            ServiceError::Conflict("Article status changed, reload and retry".to_string())
        })?;

    tracing::info!(
        "Article {} moved from {} to {} by {}",
        updated.id,
        article.status.to_str(),
        target.to_str(),
        actor.id
    );

    if target == ArticleStatus::Published {
        match db.notify_followers(updated.author_id, updated.id).await {
            Ok(count) => tracing::info!("Notified {} followers of article {}", count, updated.id),
            Err(e) => tracing::error!("Failed to notify followers of article {}: {}", updated.id, e),
        }
    }

    article_detail(db, Some(actor), updated).await
}

pub async fn set_staff_pick(
    db: &DBClient,
    actor: &User,
    slug: &str,
    is_staff_pick: bool,
) -> ServiceResult<ArticleDto> {
    ensure(can_moderate(actor))?;
    let article = load_article(db, slug).await?;

    let updated = db
        .set_staff_pick(article.id, is_staff_pick)
        .await
        .map_err(article_error)?;

    article_detail(db, Some(actor), updated).await
}

/// Published articles are public and count a view per read. Drafts and
/// archived articles only exist for their author and editors.
pub async fn read_article(
    db: &DBClient,
    viewer: Option<&User>,
    slug: &str,
) -> ServiceResult<ArticleDto> {
    let article = load_article(db, slug).await?;

    if article.is_published() {
        db.increment_view_count(article.id)
            .await
            .map_err(article_error)?;
    } else if !can_view_unpublished(viewer, article.author_id) {
        return Err(ServiceError::NotFound("Article".to_string()));
    }

    article_detail(db, viewer, article).await
}

/// Turns list query parameters into a filter, enforcing who may list
/// non-published articles. Defaults to published only.
pub fn resolve_list_filter(
    viewer: Option<&User>,
    params: &ArticlesQueryParams,
) -> ServiceResult<ArticleFilter> {
    let status = params.status.unwrap_or(ArticleStatus::Published);

    if status != ArticleStatus::Published {
        let allowed = match viewer {
            Some(user) => {
                has_permission(user.role, UserRole::Editor) || params.author_id == Some(user.id)
            }
            None => false,
        };
        ensure(allowed)?;
    }

    Ok(ArticleFilter {
        status: Some(status),
        author_id: params.author_id,
        published_from: params.published_from,
        published_to: params.published_to,
        category_id: params.category_id,
        tag_slug: params.tag.as_deref().map(slugify),
        ..Default::default()
    })
}

pub async fn list_articles(
    db: &DBClient,
    viewer: Option<&User>,
    params: &ArticlesQueryParams,
) -> ServiceResult<ArticlePage> {
    let filter = resolve_list_filter(viewer, params)?;
    let query = ArticleQuery::list(
        filter,
        params.sort.unwrap_or_default(),
        Pagination::new(params.page, params.limit),
    );
    run_paged(db, viewer, &query).await
}

pub async fn search_articles(
    db: &DBClient,
    viewer: Option<&User>,
    params: &SearchQueryParams,
) -> ServiceResult<ArticlePage> {
    let filter = ArticleFilter {
        author_id: params.author_id,
        category_id: params.category_id,
        tag_slug: params.tag.as_deref().map(slugify),
        ..ArticleFilter::published()
    };
    let query = ArticleQuery::search(
        &params.q,
        filter,
        params.sort.unwrap_or_default(),
        Pagination::new(params.page, params.limit),
    );
    if query.filter.search.is_none() {
        return Err(ServiceError::validation("Search query cannot be empty"));
    }
    run_paged(db, viewer, &query).await
}

pub async fn trending(
    db: &DBClient,
    viewer: Option<&User>,
    limit: Option<i64>,
) -> ServiceResult<Vec<ArticleDto>> {
    run_top(db, viewer, &ArticleQuery::trending(limit)).await
}

pub async fn recent(
    db: &DBClient,
    viewer: Option<&User>,
    limit: Option<i64>,
) -> ServiceResult<Vec<ArticleDto>> {
    run_top(db, viewer, &ArticleQuery::recent(limit)).await
}

pub async fn staff_picks(
    db: &DBClient,
    viewer: Option<&User>,
    sort: ArticleSort,
    pagination: Pagination,
) -> ServiceResult<ArticlePage> {
    run_paged(db, viewer, &ArticleQuery::staff_picks(sort, pagination)).await
}

/// Articles sharing a category or tag with the article at `slug`
pub async fn related(
    db: &DBClient,
    viewer: Option<&User>,
    slug: &str,
    limit: Option<i64>,
) -> ServiceResult<Vec<ArticleDto>> {
    let article = load_article(db, slug).await?;
    if !article.is_published()
        && !can_view_unpublished(viewer, article.author_id)
    {
        return Err(ServiceError::NotFound("Article".to_string()));
    }

    let (category_ids, tag_ids) = db
        .get_article_taxonomy_ids(article.id)
        .await
        .map_err(article_error)?;

    let query = ArticleQuery::related(article.id, category_ids, tag_ids, limit);
    run_top(db, viewer, &query).await
}

/// Published articles from followed authors or in the viewer's interests
pub async fn feed(
    db: &DBClient,
    viewer: &User,
    sort: ArticleSort,
    pagination: Pagination,
) -> ServiceResult<ArticlePage> {
    let following_ids = dedup_ids(db.get_following_ids(viewer.id).await?);
    let interest_ids = dedup_ids(db.get_interest_ids(viewer.id).await?);

    let query = ArticleQuery::feed(following_ids, interest_ids, sort, pagination);
    run_paged(db, Some(viewer), &query).await
}

pub async fn bookmarked_articles(
    db: &DBClient,
    viewer: &User,
    sort: ArticleSort,
    pagination: Pagination,
) -> ServiceResult<ArticlePage> {
    let query = ArticleQuery::bookmarks(viewer.id, sort, pagination);
    run_paged(db, Some(viewer), &query).await
}

async fn run_top(
    db: &DBClient,
    viewer: Option<&User>,
    query: &ArticleQuery,
) -> ServiceResult<Vec<ArticleDto>> {
    let cards = db.list_articles(query).await?;
    enrich(db, viewer, cards).await
}

async fn run_paged(
    db: &DBClient,
    viewer: Option<&User>,
    query: &ArticleQuery,
) -> ServiceResult<ArticlePage> {
    let cards = db.list_articles(query).await?;
    let total = db.count_articles(query).await?;

    Ok(ArticlePage {
        items: enrich(db, viewer, cards).await?,
        total,
        pagination: query.pagination,
    })
}

/// Single article with content, categories, tags and viewer flags
async fn article_detail(
    db: &DBClient,
    viewer: Option<&User>,
    article: Article,
) -> ServiceResult<ArticleDto> {
    let card = db
        .get_article_card(article.id)
        .await
        .map_err(article_error)?;

    let mut enriched = enrich(db, viewer, vec![card]).await?;
    let mut detail = enriched
        .pop()
        .ok_or_else(|| ServiceError::NotFound("Article".to_string()))?;
    detail.content = Some(article.content);
    Ok(detail)
}

async fn enrich(
    db: &DBClient,
    viewer: Option<&User>,
    cards: Vec<ArticleCardRow>,
) -> ServiceResult<Vec<ArticleDto>> {
    if cards.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<Uuid> = cards.iter().map(|card| card.id).collect();
    let categories = db.get_article_categories(&ids).await?;
    let tags = db.get_article_tags(&ids).await?;
    let flags = match viewer {
        Some(user) => Some(db.get_viewer_flags(user.id, &ids).await?),
        None => None,
    };

    Ok(assemble(cards, categories, tags, flags))
}

/// Attach categories, tags and viewer flags to each card, keeping card order
fn assemble(
    cards: Vec<ArticleCardRow>,
    categories: Vec<ArticleCategoryRow>,
    tags: Vec<ArticleTagRow>,
    flags: Option<(HashSet<Uuid>, HashSet<Uuid>)>,
) -> Vec<ArticleDto> {
    let mut categories_by_article: HashMap<Uuid, Vec<TaxonomyRef>> = HashMap::new();
    for row in categories {
        categories_by_article
            .entry(row.article_id)
            .or_default()
            .push(TaxonomyRef {
                id: row.id,
                name: row.name,
                slug: row.slug,
            });
    }

    let mut tags_by_article: HashMap<Uuid, Vec<TaxonomyRef>> = HashMap::new();
    for row in tags {
        tags_by_article
            .entry(row.article_id)
            .or_default()
            .push(TaxonomyRef {
                id: row.id,
                name: row.name,
                slug: row.slug,
            });
    }

    cards
        .into_iter()
        .map(|card| {
            let (liked, bookmarked) = match &flags {
                Some((liked, bookmarked)) => (
                    Some(liked.contains(&card.id)),
                    Some(bookmarked.contains(&card.id)),
                ),
                None => (None, None),
            };

            ArticleDto {
                categories: categories_by_article.remove(&card.id).unwrap_or_default(),
                tags: tags_by_article.remove(&card.id).unwrap_or_default(),
                content: None,
                liked,
                bookmarked,
                card,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{UserExt, fixtures};
    use crate::permission::tests::user_with;
    use chrono::Utc;
    use sqlx::PgPool;

    fn params(status: Option<ArticleStatus>, author_id: Option<Uuid>) -> ArticlesQueryParams {
        ArticlesQueryParams {
            page: None,
            limit: None,
            sort: None,
            status,
            author_id,
            category_id: None,
            tag: None,
            published_from: None,
            published_to: None,
        }
    }

    fn card(id: Uuid) -> ArticleCardRow {
        let now = Utc::now();
        ArticleCardRow {
            id,
            author_id: Uuid::new_v4(),
            author_username: "writer".to_string(),
            title: "Title".to_string(),
            slug: format!("title-{}", id.simple()),
            excerpt: String::new(),
            status: ArticleStatus::Published,
            published_at: Some(now),
            view_count: 0,
            reading_time_minutes: 1,
            is_staff_pick: false,
            created_at: now,
            updated_at: now,
            likes_count: 0,
            comments_count: 0,
        }
    }

    #[test]
    fn list_defaults_to_published() {
        let filter = resolve_list_filter(None, &params(None, None)).unwrap();
        assert_eq!(filter.status, Some(ArticleStatus::Published));
    }

    #[test]
    fn anonymous_viewers_cannot_list_drafts() {
        let result = resolve_list_filter(None, &params(Some(ArticleStatus::Draft), None));
        assert!(matches!(result, Err(ServiceError::Forbidden)));
    }

    #[test]
    fn authors_list_only_their_own_drafts() {
        let author = user_with(UserRole::Author, true);

        let own = resolve_list_filter(
            Some(&author),
            &params(Some(ArticleStatus::Draft), Some(author.id)),
        )
        .unwrap();
        assert_eq!(own.author_id, Some(author.id));
        assert_eq!(own.status, Some(ArticleStatus::Draft));

        let others = resolve_list_filter(
            Some(&author),
            &params(Some(ArticleStatus::Draft), Some(Uuid::new_v4())),
        );
        assert!(matches!(others, Err(ServiceError::Forbidden)));

        let everyone = resolve_list_filter(Some(&author), &params(Some(ArticleStatus::Archived), None));
        assert!(matches!(everyone, Err(ServiceError::Forbidden)));
    }

    #[test]
    fn editors_list_any_status() {
        let editor = user_with(UserRole::Editor, true);
        let filter =
            resolve_list_filter(Some(&editor), &params(Some(ArticleStatus::Archived), None)).unwrap();
        assert_eq!(filter.status, Some(ArticleStatus::Archived));
        assert_eq!(filter.author_id, None);
    }

    #[test]
    fn tag_filter_is_slugified() {
        let mut query = params(None, None);
        query.tag = Some("Web Dev".to_string());
        let filter = resolve_list_filter(None, &query).unwrap();
        assert_eq!(filter.tag_slug.as_deref(), Some("web-dev"));
    }

    #[test]
    fn tags_are_trimmed_and_deduplicated_by_slug() {
        let tags = vec![
            " Rust ".to_string(),
            "rust".to_string(),
            "Web Dev".to_string(),
            "!!!".to_string(),
        ];
        assert_eq!(
            normalize_tags(&tags),
            vec![
                ("Rust".to_string(), "rust".to_string()),
                ("Web Dev".to_string(), "web-dev".to_string()),
            ]
        );
    }

    #[test]
    fn explicit_slug_needs_alphanumerics() {
        assert_eq!(explicit_slug("My Post").unwrap(), "my-post");
        assert!(matches!(explicit_slug("--"), Err(ServiceError::Validation(_))));
    }

    #[test]
    fn scripts_are_not_content() {
        assert!(matches!(
            clean_content("<script>alert(1)</script>"),
            Err(ServiceError::Validation(_))
        ));
        assert_eq!(clean_content("<p>hello</p>").unwrap(), "<p>hello</p>");
    }

    #[test]
    fn assemble_groups_taxonomy_and_keeps_order() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let category_id = Uuid::new_v4();

        let categories = vec![ArticleCategoryRow {
            article_id: second,
            id: category_id,
            name: "Rust".to_string(),
            slug: "rust".to_string(),
        }];
        let tags = vec![ArticleTagRow {
            article_id: first,
            id: Uuid::new_v4(),
            name: "axum".to_string(),
            slug: "axum".to_string(),
        }];

        let items = assemble(vec![card(first), card(second)], categories, tags, None);

        assert_eq!(items[0].card.id, first);
        assert_eq!(items[0].tags.len(), 1);
        assert!(items[0].categories.is_empty());
        assert_eq!(items[1].categories[0].id, category_id);
        assert_eq!(items[1].liked, None);
    }

    #[test]
    fn assemble_sets_viewer_flags() {
        let liked_id = Uuid::new_v4();
        let other_id = Uuid::new_v4();
        let flags = (HashSet::from([liked_id]), HashSet::from([other_id]));

        let items = assemble(
            vec![card(liked_id), card(other_id)],
            vec![],
            vec![],
            Some(flags),
        );

        assert_eq!(items[0].liked, Some(true));
        assert_eq!(items[0].bookmarked, Some(false));
        assert_eq!(items[1].liked, Some(false));
        assert_eq!(items[1].bookmarked, Some(true));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn reading_returns_the_incremented_view_count(pool: PgPool) {
        let db = DBClient::new(pool);
        let author = fixtures::user(&db, "author").await;
        fixtures::article(&db, &author, "popular", ArticleStatus::Published, &[]).await;

        let first = read_article(&db, None, "popular").await.unwrap();
        assert_eq!(first.card.view_count, 1);
        let second = read_article(&db, None, "popular").await.unwrap();
        assert_eq!(second.card.view_count, 2);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn drafts_are_hidden_and_not_counted(pool: PgPool) {
        let db = DBClient::new(pool);
        let author = fixtures::user(&db, "author").await;
        let article = fixtures::article(&db, &author, "secret", ArticleStatus::Draft, &[]).await;

        let anonymous = read_article(&db, None, "secret").await;
        assert!(matches!(anonymous, Err(ServiceError::NotFound(_))));

        let own = read_article(&db, Some(&author), "secret").await.unwrap();
        assert_eq!(own.card.view_count, 0);
        assert_eq!(db.get_article_by_slug("secret").await.unwrap().view_count, 0);
        assert_eq!(own.card.id, article.id);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn archived_articles_stay_archived(pool: PgPool) {
        let db = DBClient::new(pool);
        let author = fixtures::user(&db, "author").await;
        let editor = fixtures::user(&db, "editor").await;
        let editor = db.update_user_role(editor.id, UserRole::Editor).await.unwrap();
        fixtures::article(&db, &author, "retired", ArticleStatus::Archived, &[]).await;

        let result = change_status(&db, &editor, "retired", ArticleStatus::Published).await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));

        let current = db.get_article_by_slug("retired").await.unwrap();
        assert_eq!(current.status, ArticleStatus::Archived);
        assert!(current.published_at.is_none());
    }
}
