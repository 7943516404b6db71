use axum::extract::{Path, Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post, put};
use axum::{Extension, Router, middleware};
use tracing::instrument;
use validator::Validate;

use crate::AppState;
use crate::dtos::{
    ArticleDto, ArticleResponseDto, ArticlesPaginationResponseDto, ArticlesQueryParams,
    BookmarkStatusDto, CommentListResponse, GetCommentsQuery, InputArticleDto,
    InputCommentRequest, LikeStatusDto, Response, SearchQueryParams, SingleCommentResponse,
    SortedPageQuery, StaffPickDto, TopQueryParams, UpdateArticleDto,
};
use crate::error::HttpError;
use crate::handler::{pagination_dto, service_failure};
use crate::middleware::{JWTAuthMiddleware, Viewer, auth, optional_auth, require_role};
use crate::models::{ArticleStatus, UserRole};
use crate::ranking::Pagination;
use crate::service::article::{self, ArticlePage};
use crate::service::engagement;

/// Router for `/articles`
///
/// Reads go through `optional_auth` so signed-in viewers see their like and
/// bookmark flags and their own drafts; writes need a token.
pub fn articles_handler(app_state: AppState) -> Router<AppState> {
    let require_auth = middleware::from_fn_with_state(app_state.clone(), auth);
    let viewer = middleware::from_fn_with_state(app_state, optional_auth);
    let editor = middleware::from_fn(|req: Request, next: Next| {
        require_role(req, next, UserRole::Editor)
    });

    Router::new()
        .route("/", get(get_articles).route_layer(viewer.clone()))
        .route(
            "/",
            post(create_article)
                .route_layer(middleware::from_fn(|req, next| {
                    require_role(req, next, UserRole::Author)
                }))
                .route_layer(require_auth.clone()),
        )
        .route("/trending", get(get_trending).route_layer(viewer.clone()))
        .route("/recent", get(get_recent).route_layer(viewer.clone()))
        .route(
            "/staff-picks",
            get(get_staff_picks).route_layer(viewer.clone()),
        )
        .route("/search", get(search_articles).route_layer(viewer.clone()))
        .route("/feed", get(get_feed).route_layer(require_auth.clone()))
        .route("/{slug}", get(get_article).route_layer(viewer.clone()))
        .route(
            "/{slug}",
            put(update_article)
                .patch(update_article)
                .delete(delete_article)
                .route_layer(require_auth.clone()),
        )
        .route(
            "/{slug}/related",
            get(get_related).route_layer(viewer.clone()),
        )
        .route(
            "/{slug}/publish",
            post(publish_article)
                .route_layer(editor.clone())
                .route_layer(require_auth.clone()),
        )
        .route(
            "/{slug}/unpublish",
            post(unpublish_article)
                .route_layer(editor.clone())
                .route_layer(require_auth.clone()),
        )
        .route(
            "/{slug}/archive",
            post(archive_article)
                .route_layer(editor.clone())
                .route_layer(require_auth.clone()),
        )
        .route(
            "/{slug}/staff-pick",
            put(set_staff_pick)
                .route_layer(editor)
                .route_layer(require_auth.clone()),
        )
        .route(
            "/{slug}/like",
            post(like_article)
                .delete(unlike_article)
                .route_layer(require_auth.clone()),
        )
        .route(
            "/{slug}/bookmark",
            post(bookmark_article)
                .delete(unbookmark_article)
                .route_layer(require_auth.clone()),
        )
        .route("/{slug}/comments", get(get_comments).route_layer(viewer))
        .route(
            "/{slug}/comments",
            post(create_comment).route_layer(require_auth),
        )
}

fn page_response(page: ArticlePage) -> Json<ArticlesPaginationResponseDto> {
    Json(ArticlesPaginationResponseDto {
        status: "success".to_string(),
        pagination: Some(pagination_dto(page.pagination, page.total)),
        data: page.items,
    })
}

fn list_response(items: Vec<ArticleDto>) -> Json<ArticlesPaginationResponseDto> {
    Json(ArticlesPaginationResponseDto {
        status: "success".to_string(),
        data: items,
        pagination: None,
    })
}

fn article_response(article: ArticleDto) -> Json<ArticleResponseDto> {
    Json(ArticleResponseDto {
        status: "success".to_string(),
        data: article,
    })
}

/// Filtered, sorted and paginated listing; only published articles unless the
/// viewer may see others
#[instrument(skip(app_state, viewer))]
pub async fn get_articles(
    Query(params): Query<ArticlesQueryParams>,
    State(app_state): State<AppState>,
    Extension(Viewer(viewer)): Extension<Viewer>,
) -> Result<impl IntoResponse, HttpError> {
    params.validate().map_err(|e| {
        tracing::error!("Invalid get_articles input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let page = article::list_articles(&app_state.db_client, viewer.as_ref(), &params)
        .await
        .map_err(service_failure("get_articles"))?;

    Ok(page_response(page))
}

#[instrument(skip(app_state, viewer))]
pub async fn get_trending(
    Query(params): Query<TopQueryParams>,
    State(app_state): State<AppState>,
    Extension(Viewer(viewer)): Extension<Viewer>,
) -> Result<impl IntoResponse, HttpError> {
    params.validate().map_err(|e| {
        tracing::error!("Invalid get_trending input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let items = article::trending(&app_state.db_client, viewer.as_ref(), params.limit)
        .await
        .map_err(service_failure("get_trending"))?;

    Ok(list_response(items))
}

#[instrument(skip(app_state, viewer))]
pub async fn get_recent(
    Query(params): Query<TopQueryParams>,
    State(app_state): State<AppState>,
    Extension(Viewer(viewer)): Extension<Viewer>,
) -> Result<impl IntoResponse, HttpError> {
    params.validate().map_err(|e| {
        tracing::error!("Invalid get_recent input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let items = article::recent(&app_state.db_client, viewer.as_ref(), params.limit)
        .await
        .map_err(service_failure("get_recent"))?;

    Ok(list_response(items))
}

#[instrument(skip(app_state, viewer))]
pub async fn get_staff_picks(
    Query(params): Query<SortedPageQuery>,
    State(app_state): State<AppState>,
    Extension(Viewer(viewer)): Extension<Viewer>,
) -> Result<impl IntoResponse, HttpError> {
    params.validate().map_err(|e| {
        tracing::error!("Invalid get_staff_picks input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let page = article::staff_picks(
        &app_state.db_client,
        viewer.as_ref(),
        params.sort.unwrap_or_default(),
        Pagination::new(params.page, params.limit),
    )
    .await
    .map_err(service_failure("get_staff_picks"))?;

    Ok(page_response(page))
}

/// Full-text search over title, excerpt and content of published articles
#[instrument(skip(app_state, viewer), fields(q = %params.q))]
pub async fn search_articles(
    Query(params): Query<SearchQueryParams>,
    State(app_state): State<AppState>,
    Extension(Viewer(viewer)): Extension<Viewer>,
) -> Result<impl IntoResponse, HttpError> {
    params.validate().map_err(|e| {
        tracing::error!("Invalid search input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let page = article::search_articles(&app_state.db_client, viewer.as_ref(), &params)
        .await
        .map_err(service_failure("search_articles"))?;

    tracing::info!("search_articles returned {} of {}", page.items.len(), page.total);
    Ok(page_response(page))
}

/// Personalized feed: followed authors and categories of interest
#[instrument(skip(app_state, jwt), fields(user_id = %jwt.user.id))]
pub async fn get_feed(
    Query(params): Query<SortedPageQuery>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    params.validate().map_err(|e| {
        tracing::error!("Invalid get_feed input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let page = article::feed(
        &app_state.db_client,
        &jwt.user,
        params.sort.unwrap_or_default(),
        Pagination::new(params.page, params.limit),
    )
    .await
    .map_err(service_failure("get_feed"))?;

    Ok(page_response(page))
}

#[instrument(skip(app_state, jwt, body), fields(author = %jwt.user.username))]
pub async fn create_article(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Json(body): Json<InputArticleDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid create_article input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let created = article::create_article(&app_state.db_client, &jwt.user, body)
        .await
        .map_err(service_failure("create_article"))?;

    tracing::info!("create_article successful");
    Ok((StatusCode::CREATED, article_response(created)))
}

/// Single article; reading a published one counts a view
#[instrument(skip(app_state, viewer))]
pub async fn get_article(
    Path(slug): Path<String>,
    State(app_state): State<AppState>,
    Extension(Viewer(viewer)): Extension<Viewer>,
) -> Result<impl IntoResponse, HttpError> {
    let found = article::read_article(&app_state.db_client, viewer.as_ref(), &slug)
        .await
        .map_err(service_failure("get_article"))?;

    Ok(article_response(found))
}

#[instrument(skip(app_state, jwt, body), fields(user_id = %jwt.user.id))]
pub async fn update_article(
    Path(slug): Path<String>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Json(body): Json<UpdateArticleDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid update_article input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let updated = article::update_article(&app_state.db_client, &jwt.user, &slug, body)
        .await
        .map_err(service_failure("update_article"))?;

    tracing::info!("update_article successful");
    Ok(article_response(updated))
}

#[instrument(skip(app_state, jwt), fields(user_id = %jwt.user.id))]
pub async fn delete_article(
    Path(slug): Path<String>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    article::delete_article(&app_state.db_client, &jwt.user, &slug)
        .await
        .map_err(service_failure("delete_article"))?;

    tracing::info!("delete_article successful");
    Ok(Json(Response {
        status: "success",
        message: "Article deleted".to_string(),
    }))
}

async fn move_to(
    app_state: &AppState,
    jwt: &JWTAuthMiddleware,
    slug: &str,
    target: ArticleStatus,
) -> Result<Json<ArticleResponseDto>, HttpError> {
    let moved = article::change_status(&app_state.db_client, &jwt.user, slug, target)
        .await
        .map_err(service_failure("change_status"))?;
    Ok(article_response(moved))
}

#[instrument(skip(app_state, jwt), fields(editor = %jwt.user.id))]
pub async fn publish_article(
    Path(slug): Path<String>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    move_to(&app_state, &jwt, &slug, ArticleStatus::Published).await
}

#[instrument(skip(app_state, jwt), fields(editor = %jwt.user.id))]
pub async fn unpublish_article(
    Path(slug): Path<String>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    move_to(&app_state, &jwt, &slug, ArticleStatus::Draft).await
}

#[instrument(skip(app_state, jwt), fields(editor = %jwt.user.id))]
pub async fn archive_article(
    Path(slug): Path<String>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    move_to(&app_state, &jwt, &slug, ArticleStatus::Archived).await
}

#[instrument(skip(app_state, jwt, body), fields(editor = %jwt.user.id))]
pub async fn set_staff_pick(
    Path(slug): Path<String>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Json(body): Json<StaffPickDto>,
) -> Result<impl IntoResponse, HttpError> {
    let updated =
        article::set_staff_pick(&app_state.db_client, &jwt.user, &slug, body.is_staff_pick)
            .await
            .map_err(service_failure("set_staff_pick"))?;

    Ok(article_response(updated))
}

#[instrument(skip(app_state, viewer))]
pub async fn get_related(
    Path(slug): Path<String>,
    Query(params): Query<TopQueryParams>,
    State(app_state): State<AppState>,
    Extension(Viewer(viewer)): Extension<Viewer>,
) -> Result<impl IntoResponse, HttpError> {
    params.validate().map_err(|e| {
        tracing::error!("Invalid get_related input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let items = article::related(&app_state.db_client, viewer.as_ref(), &slug, params.limit)
        .await
        .map_err(service_failure("get_related"))?;

    Ok(list_response(items))
}

#[instrument(skip(app_state, jwt), fields(user_id = %jwt.user.id))]
pub async fn like_article(
    Path(slug): Path<String>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let likes_count = engagement::like_article(&app_state.db_client, &jwt.user, &slug)
        .await
        .map_err(service_failure("like_article"))?;

    Ok(Json(LikeStatusDto {
        status: "success".to_string(),
        liked: true,
        likes_count,
    }))
}

#[instrument(skip(app_state, jwt), fields(user_id = %jwt.user.id))]
pub async fn unlike_article(
    Path(slug): Path<String>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let likes_count = engagement::unlike_article(&app_state.db_client, &jwt.user, &slug)
        .await
        .map_err(service_failure("unlike_article"))?;

    Ok(Json(LikeStatusDto {
        status: "success".to_string(),
        liked: false,
        likes_count,
    }))
}

#[instrument(skip(app_state, jwt), fields(user_id = %jwt.user.id))]
pub async fn bookmark_article(
    Path(slug): Path<String>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    engagement::bookmark_article(&app_state.db_client, &jwt.user, &slug)
        .await
        .map_err(service_failure("bookmark_article"))?;

    Ok(Json(BookmarkStatusDto {
        status: "success".to_string(),
        bookmarked: true,
    }))
}

#[instrument(skip(app_state, jwt), fields(user_id = %jwt.user.id))]
pub async fn unbookmark_article(
    Path(slug): Path<String>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    engagement::unbookmark_article(&app_state.db_client, &jwt.user, &slug)
        .await
        .map_err(service_failure("unbookmark_article"))?;

    Ok(Json(BookmarkStatusDto {
        status: "success".to_string(),
        bookmarked: false,
    }))
}

/// Comments of an article; `sort` is `created_at_desc` (default) or `created_at_asc`
#[instrument(skip(app_state, viewer))]
pub async fn get_comments(
    Path(slug): Path<String>,
    Query(params): Query<GetCommentsQuery>,
    State(app_state): State<AppState>,
    Extension(Viewer(viewer)): Extension<Viewer>,
) -> Result<impl IntoResponse, HttpError> {
    params.validate().map_err(|e| {
        tracing::error!("Invalid get_comments input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let pagination = Pagination::new(params.page, params.limit);
    let sort = params.sort.as_deref().unwrap_or("created_at_desc");

    let (comments, total) =
        engagement::list_comments(&app_state.db_client, viewer.as_ref(), &slug, pagination, sort)
            .await
            .map_err(service_failure("get_comments"))?;

    Ok(Json(CommentListResponse {
        status: "success".to_string(),
        data: comments,
        pagination: pagination_dto(pagination, total),
    }))
}

#[instrument(skip(app_state, jwt, body), fields(user_id = %jwt.user.id))]
pub async fn create_comment(
    Path(slug): Path<String>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Json(body): Json<InputCommentRequest>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid create_comment input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let comment = engagement::add_comment(&app_state.db_client, &jwt.user, &slug, &body.content)
        .await
        .map_err(service_failure("create_comment"))?;

    tracing::info!("create_comment successful");
    Ok((
        StatusCode::CREATED,
        Json(SingleCommentResponse {
            status: "success".to_string(),
            data: comment,
        }),
    ))
}
