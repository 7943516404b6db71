//! Article selection and ordering.
//!
//! Every listing endpoint (filtered list, trending, recent, staff picks,
//! related, personalized feed, search) is expressed as an `ArticleQuery`
//! descriptor. The repository renders the descriptor into a parameterized
//! `QueryBuilder`; user input only ever reaches SQL through `push_bind`.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::models::ArticleStatus;

pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 50;
/// Highest page whose offset still fits in an i64
pub const MAX_PAGE: i64 = i64::MAX / MAX_LIMIT;

/// Sort order exposed to clients through the `sort` query parameter
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ArticleSort {
    #[default]
    Newest,
    Oldest,
    Popular,
    Alphabetical,
    /// Most recently published first; used by recent and related listings
    #[serde(skip)]
    RecentlyPublished,
}

impl ArticleSort {
    /// ORDER BY clause, always ending on the primary key so pages are stable
    pub fn order_by(&self) -> &'static str {
        match self {
            ArticleSort::Newest => "a.created_at DESC, a.id DESC",
            ArticleSort::Oldest => "a.created_at ASC, a.id ASC",
            ArticleSort::Popular => "a.view_count DESC, a.id DESC",
            ArticleSort::Alphabetical => "a.title ASC, a.id ASC",
            ArticleSort::RecentlyPublished => "a.published_at DESC NULLS LAST, a.id DESC",
        }
    }
}

/// Limit/offset window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Pagination {
    /// Clamps page to 1..=MAX_PAGE and limit to 1..=MAX_LIMIT
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        Pagination {
            page: page.unwrap_or(1).clamp(1, MAX_PAGE),
            limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
        }
    }

    /// First page of `limit` rows, for top-N listings
    pub fn top(limit: Option<i64>) -> Self {
        Pagination::new(Some(1), limit)
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn total_pages(&self, total: i64) -> i64 {
        (total + self.limit - 1) / self.limit
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Pagination::new(None, None)
    }
}

/// Restrict to articles sharing a category or a tag with a reference article
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedScope {
    pub category_ids: Vec<Uuid>,
    pub tag_ids: Vec<Uuid>,
}

/// Restrict to followed authors or interesting categories
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedScope {
    pub following_ids: Vec<Uuid>,
    pub interest_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArticleFilter {
    pub status: Option<ArticleStatus>,
    pub author_id: Option<Uuid>,
    pub published_from: Option<DateTime<Utc>>,
    pub published_to: Option<DateTime<Utc>>,
    pub category_id: Option<Uuid>,
    pub tag_slug: Option<String>,
    pub staff_pick: Option<bool>,
    pub search: Option<String>,
    pub exclude_id: Option<Uuid>,
    pub bookmarked_by: Option<Uuid>,
    pub related: Option<RelatedScope>,
    pub feed: Option<FeedScope>,
}

impl ArticleFilter {
    pub fn published() -> Self {
        ArticleFilter {
            status: Some(ArticleStatus::Published),
            ..Default::default()
        }
    }
}

/// Fully-described article listing: filter, order and window
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleQuery {
    pub filter: ArticleFilter,
    pub sort: ArticleSort,
    pub pagination: Pagination,
}

impl ArticleQuery {
    pub fn list(filter: ArticleFilter, sort: ArticleSort, pagination: Pagination) -> Self {
        ArticleQuery {
            filter,
            sort,
            pagination,
        }
    }

    /// Published articles by view count
    pub fn trending(limit: Option<i64>) -> Self {
        ArticleQuery::list(
            ArticleFilter::published(),
            ArticleSort::Popular,
            Pagination::top(limit),
        )
    }

    /// Published articles, most recently published first
    pub fn recent(limit: Option<i64>) -> Self {
        ArticleQuery::list(
            ArticleFilter::published(),
            ArticleSort::RecentlyPublished,
            Pagination::top(limit),
        )
    }

    pub fn staff_picks(sort: ArticleSort, pagination: Pagination) -> Self {
        ArticleQuery::list(
            ArticleFilter {
                staff_pick: Some(true),
                ..ArticleFilter::published()
            },
            sort,
            pagination,
        )
    }

    /// Published articles sharing at least one category or tag with
    /// `article_id`, never the article itself.
    ///
    /// With no categories and no tags the relation filter is dropped and
    /// the result is every other published article.
    pub fn related(
        article_id: Uuid,
        category_ids: Vec<Uuid>,
        tag_ids: Vec<Uuid>,
        limit: Option<i64>,
    ) -> Self {
        let related = if category_ids.is_empty() && tag_ids.is_empty() {
            None
        } else {
            Some(RelatedScope {
                category_ids,
                tag_ids,
            })
        };

        ArticleQuery::list(
            ArticleFilter {
                exclude_id: Some(article_id),
                related,
                ..ArticleFilter::published()
            },
            ArticleSort::RecentlyPublished,
            Pagination::top(limit),
        )
    }

    /// Published articles by followed authors or in interesting categories.
    ///
    /// A viewer who follows nobody and has no interests gets the plain
    /// published listing.
    pub fn feed(
        following_ids: Vec<Uuid>,
        interest_ids: Vec<Uuid>,
        sort: ArticleSort,
        pagination: Pagination,
    ) -> Self {
        let feed = if following_ids.is_empty() && interest_ids.is_empty() {
            None
        } else {
            Some(FeedScope {
                following_ids,
                interest_ids,
            })
        };

        ArticleQuery::list(
            ArticleFilter {
                feed,
                ..ArticleFilter::published()
            },
            sort,
            pagination,
        )
    }

    /// Published articles bookmarked by `user_id`
    pub fn bookmarks(user_id: Uuid, sort: ArticleSort, pagination: Pagination) -> Self {
        ArticleQuery::list(
            ArticleFilter {
                bookmarked_by: Some(user_id),
                ..ArticleFilter::published()
            },
            sort,
            pagination,
        )
    }

    /// Case-insensitive substring match on title, excerpt and content,
    /// combined with the other filters
    pub fn search(
        query: &str,
        filter: ArticleFilter,
        sort: ArticleSort,
        pagination: Pagination,
    ) -> Self {
        ArticleQuery::list(
            ArticleFilter {
                search: Some(query.trim().to_string()).filter(|q| !q.is_empty()),
                ..filter
            },
            sort,
            pagination,
        )
    }

    /// Appends `AND ...` predicates. The builder must already contain a
    /// `WHERE` clause over `articles a`.
    pub fn push_predicates(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        let filter = &self.filter;

        qb.push(" AND a.deleted_at IS NULL");

        if let Some(status) = filter.status {
            qb.push(" AND a.status = ").push_bind(status);
        }
        if let Some(author_id) = filter.author_id {
            qb.push(" AND a.author_id = ").push_bind(author_id);
        }
        if let Some(from) = filter.published_from {
            qb.push(" AND a.published_at >= ").push_bind(from);
        }
        if let Some(to) = filter.published_to {
            qb.push(" AND a.published_at <= ").push_bind(to);
        }
        if let Some(staff_pick) = filter.staff_pick {
            qb.push(" AND a.is_staff_pick = ").push_bind(staff_pick);
        }
        if let Some(exclude_id) = filter.exclude_id {
            qb.push(" AND a.id <> ").push_bind(exclude_id);
        }
        if let Some(user_id) = filter.bookmarked_by {
            qb.push(
                " AND EXISTS (SELECT 1 FROM bookmarks b WHERE b.article_id = a.id AND b.user_id = ",
            )
            .push_bind(user_id)
            .push(")");
        }
        if let Some(category_id) = filter.category_id {
            qb.push(
                " AND EXISTS (SELECT 1 FROM article_categories ac WHERE ac.article_id = a.id AND ac.category_id = ",
            )
            .push_bind(category_id)
            .push(")");
        }
        if let Some(tag_slug) = &filter.tag_slug {
            qb.push(
                " AND EXISTS (SELECT 1 FROM article_tags art JOIN tags t ON t.id = art.tag_id WHERE art.article_id = a.id AND t.slug = ",
            )
            .push_bind(tag_slug.clone())
            .push(")");
        }
        if let Some(search) = &filter.search {
            let pattern = format!("%{}%", escape_like(search));
            qb.push(" AND (a.title ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR a.excerpt ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR a.content ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(related) = &filter.related {
            qb.push(
                " AND (EXISTS (SELECT 1 FROM article_categories ac WHERE ac.article_id = a.id AND ac.category_id = ANY(",
            )
            .push_bind(related.category_ids.clone())
            .push(
                ")) OR EXISTS (SELECT 1 FROM article_tags art WHERE art.article_id = a.id AND art.tag_id = ANY(",
            )
            .push_bind(related.tag_ids.clone())
            .push(")))");
        }
        if let Some(feed) = &filter.feed {
            qb.push(" AND (a.author_id = ANY(")
                .push_bind(feed.following_ids.clone())
                .push(
                    ") OR EXISTS (SELECT 1 FROM article_categories ac WHERE ac.article_id = a.id AND ac.category_id = ANY(",
                )
                .push_bind(feed.interest_ids.clone())
                .push(")))");
        }
    }

    pub fn push_ordering(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" ORDER BY ").push(self.sort.order_by());
    }

    pub fn push_pagination(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" LIMIT ")
            .push_bind(self.pagination.limit)
            .push(" OFFSET ")
            .push_bind(self.pagination.offset());
    }
}

/// Escapes LIKE wildcards so the query matches literally
pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(query: &ArticleQuery) -> String {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT a.id FROM articles a WHERE TRUE");
        query.push_predicates(&mut qb);
        query.push_ordering(&mut qb);
        query.push_pagination(&mut qb);
        qb.sql().to_string()
    }

    #[test]
    fn empty_feed_is_the_published_listing() {
        let pagination = Pagination::new(Some(2), Some(20));
        let feed = ArticleQuery::feed(vec![], vec![], ArticleSort::Popular, pagination);
        let list = ArticleQuery::list(ArticleFilter::published(), ArticleSort::Popular, pagination);

        assert_eq!(feed, list);
        assert_eq!(render(&feed), render(&list));
    }

    #[test]
    fn feed_unions_authors_and_interests() {
        let author = Uuid::new_v4();
        let feed = ArticleQuery::feed(
            vec![author],
            vec![],
            ArticleSort::Newest,
            Pagination::default(),
        );
        let sql = render(&feed);

        assert!(sql.contains("a.status = $1"));
        assert!(sql.contains("(a.author_id = ANY($2) OR EXISTS"));
        assert!(sql.contains("ac.category_id = ANY($3)"));
    }

    #[test]
    fn related_excludes_self_and_unpublished() {
        let article_id = Uuid::new_v4();
        let query = ArticleQuery::related(article_id, vec![Uuid::new_v4()], vec![], Some(5));

        assert_eq!(query.filter.status, Some(ArticleStatus::Published));
        assert_eq!(query.filter.exclude_id, Some(article_id));
        assert_eq!(query.sort, ArticleSort::RecentlyPublished);
        assert_eq!(query.pagination.limit, 5);

        let sql = render(&query);
        assert!(sql.contains("a.id <> "));
        assert!(sql.contains("art.tag_id = ANY("));
    }

    #[test]
    fn related_without_categories_or_tags_drops_relation_filter() {
        let article_id = Uuid::new_v4();
        let query = ArticleQuery::related(article_id, vec![], vec![], None);

        assert!(query.filter.related.is_none());
        assert_eq!(query.filter.exclude_id, Some(article_id));
        assert!(!render(&query).contains("EXISTS"));
    }

    #[test]
    fn trending_and_recent_are_top_n() {
        let trending = ArticleQuery::trending(Some(3));
        assert_eq!(trending.sort, ArticleSort::Popular);
        assert_eq!(trending.pagination.offset(), 0);
        assert!(render(&trending).contains("ORDER BY a.view_count DESC"));

        let recent = ArticleQuery::recent(None);
        assert_eq!(recent.pagination.limit, DEFAULT_LIMIT);
        assert!(render(&recent).contains("ORDER BY a.published_at DESC"));
    }

    #[test]
    fn staff_picks_are_published_and_flagged() {
        let query = ArticleQuery::staff_picks(ArticleSort::Alphabetical, Pagination::default());
        assert_eq!(query.filter.staff_pick, Some(true));
        assert_eq!(query.filter.status, Some(ArticleStatus::Published));
        assert!(render(&query).contains("ORDER BY a.title ASC"));
    }

    #[test]
    fn search_binds_escaped_pattern() {
        let query = ArticleQuery::search(
            "  100%_rust ",
            ArticleFilter::published(),
            ArticleSort::Newest,
            Pagination::default(),
        );
        assert_eq!(query.filter.search.as_deref(), Some("100%_rust"));

        let sql = render(&query);
        assert!(sql.contains("a.title ILIKE $2 OR a.excerpt ILIKE $3 OR a.content ILIKE $4"));
        assert!(!sql.contains("rust"));
        assert_eq!(escape_like("100%_rust"), "100\\%\\_rust");
    }

    #[test]
    fn blank_search_is_ignored() {
        let query = ArticleQuery::search(
            "   ",
            ArticleFilter::published(),
            ArticleSort::Newest,
            Pagination::default(),
        );
        assert!(query.filter.search.is_none());
    }

    #[test]
    fn bookmarks_are_scoped_to_the_user() {
        let user_id = Uuid::new_v4();
        let query = ArticleQuery::bookmarks(user_id, ArticleSort::Newest, Pagination::default());
        assert_eq!(query.filter.bookmarked_by, Some(user_id));
        assert!(render(&query).contains("b.user_id = $2"));
    }

    #[test]
    fn soft_deleted_rows_are_always_excluded() {
        let query = ArticleQuery::list(
            ArticleFilter::default(),
            ArticleSort::Oldest,
            Pagination::default(),
        );
        let sql = render(&query);
        assert!(sql.contains("a.deleted_at IS NULL"));
        assert!(sql.ends_with("LIMIT $1 OFFSET $2"));
    }

    #[test]
    fn pagination_is_clamped() {
        let pagination = Pagination::new(Some(0), Some(500));
        assert_eq!(pagination.page, 1);
        assert_eq!(pagination.limit, MAX_LIMIT);

        let pagination = Pagination::new(Some(3), Some(10));
        assert_eq!(pagination.offset(), 20);
        assert_eq!(pagination.total_pages(21), 3);
        assert_eq!(pagination.total_pages(0), 0);
    }

    #[test]
    fn huge_page_numbers_do_not_overflow() {
        let pagination = Pagination::new(Some(i64::MAX), Some(MAX_LIMIT));
        assert_eq!(pagination.page, MAX_PAGE);
        assert!(pagination.offset() >= 0);

        let pagination = Pagination::new(Some(i64::MAX), Some(10));
        assert!(pagination.offset() > 0);
    }

    #[test]
    fn sort_parses_from_query_values() {
        let sort: ArticleSort = serde_json::from_str("\"popular\"").unwrap();
        assert_eq!(sort, ArticleSort::Popular);
        assert!(serde_json::from_str::<ArticleSort>("\"recentlypublished\"").is_err());
    }
}
