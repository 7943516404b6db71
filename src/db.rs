use sqlx::{Pool, Postgres};

mod user;
pub use user::UserExt;

mod article;
pub use article::{ArticleChanges, ArticleDraft, ArticleExt};

mod category;
pub use category::{CategoryChanges, CategoryExt, CategoryUpdate, NewCategory};

mod tag;
pub use tag::TagExt;

mod comment;
pub use comment::CommentExt;

mod social;
pub use social::SocialExt;

mod engagement;
pub use engagement::EngagementExt;

mod notification;
pub use notification::NotificationExt;

mod media;
pub use media::{MediaExt, NewMedia};

#[derive(Debug, Clone)]
pub struct DBClient {
    pool: Pool<Postgres>,
}
impl DBClient {
    pub fn new(pool: Pool<Postgres>) -> Self {
        DBClient { pool }
    }
}

/// Rows for database-backed tests
#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::models::{Article, ArticleStatus, Category, User};
    use uuid::Uuid;

    pub(crate) async fn user(db: &DBClient, username: &str) -> User {
        db.save_user(
            username.to_string(),
            format!("{}@example.com", username),
            "not-a-real-hash".to_string(),
        )
        .await
        .unwrap()
    }

    pub(crate) async fn category(db: &DBClient, name: &str) -> Category {
        db.create_category(NewCategory {
            name: name.to_string(),
            slug: name.to_lowercase(),
            description: None,
            parent_id: None,
            display_order: 0,
            is_active: true,
        })
        .await
        .unwrap()
    }

    pub(crate) async fn article(
        db: &DBClient,
        author: &User,
        slug: &str,
        status: ArticleStatus,
        category_ids: &[Uuid],
    ) -> Article {
        let draft = ArticleDraft {
            title: slug.to_string(),
            slug: slug.to_string(),
            content: "<p>body</p>".to_string(),
            excerpt: "body".to_string(),
            reading_time_minutes: 1,
        };
        let article = db
            .create_article(author.id, draft, category_ids, &[])
            .await
            .unwrap();
        if status == ArticleStatus::Draft {
            return article;
        }
        db.set_article_status(article.id, ArticleStatus::Draft, status)
            .await
            .unwrap()
            .unwrap()
    }
}
