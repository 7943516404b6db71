use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, patch, post};
use axum::{Extension, Router, middleware};
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use crate::dtos::{
    CategoriesQuery, CategoryListResponseDto, CategoryResponseDto, CategoryTreeResponseDto,
    InputCategoryDto, Response, UpdateCategoryDto,
};
use crate::error::HttpError;
use crate::handler::service_failure;
use crate::middleware::{JWTAuthMiddleware, auth, require_role};
use crate::models::UserRole;
use crate::service::taxonomy;

/// Router for `/categories`; reads are public, writes need an editor
pub fn categories_handler(app_state: AppState) -> Router<AppState> {
    let require_auth = middleware::from_fn_with_state(app_state, auth);

    Router::new()
        .route("/", get(get_categories))
        .route(
            "/",
            post(create_category)
                .route_layer(middleware::from_fn(|req, next| {
                    require_role(req, next, UserRole::Editor)
                }))
                .route_layer(require_auth.clone()),
        )
        .route("/tree", get(get_category_tree))
        .route("/{id}", get(get_category))
        .route(
            "/{id}",
            patch(update_category)
                .delete(delete_category)
                .route_layer(middleware::from_fn(|req, next| {
                    require_role(req, next, UserRole::Editor)
                }))
                .route_layer(require_auth),
        )
}

/// Flat list ordered by display order then name
///
/// Query params: ?include_inactive=true
#[instrument(skip(app_state))]
pub async fn get_categories(
    Query(params): Query<CategoriesQuery>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let categories = taxonomy::list_categories(&app_state.db_client, params.include_inactive)
        .await
        .map_err(service_failure("get_categories"))?;

    Ok(Json(CategoryListResponseDto {
        status: "success".to_string(),
        data: categories,
    }))
}

#[instrument(skip(app_state))]
pub async fn get_category_tree(
    Query(params): Query<CategoriesQuery>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let tree = taxonomy::category_tree(&app_state.db_client, params.include_inactive)
        .await
        .map_err(service_failure("get_category_tree"))?;

    Ok(Json(CategoryTreeResponseDto {
        status: "success".to_string(),
        data: tree,
    }))
}

/// `{id}` may also be the category slug
#[instrument(skip(app_state))]
pub async fn get_category(
    Path(key): Path<String>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let category = taxonomy::get_category(&app_state.db_client, &key)
        .await
        .map_err(service_failure("get_category"))?;

    Ok(Json(CategoryResponseDto {
        status: "success".to_string(),
        data: category,
    }))
}

#[instrument(skip(app_state, jwt, body), fields(name = %body.name))]
pub async fn create_category(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Json(body): Json<InputCategoryDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid create_category input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let category = taxonomy::create_category(&app_state.db_client, &jwt.user, body)
        .await
        .map_err(service_failure("create_category"))?;

    Ok((
        StatusCode::CREATED,
        Json(CategoryResponseDto {
            status: "success".to_string(),
            data: category,
        }),
    ))
}

/// Partial update; `parent_id` moves the category (cycles are rejected),
/// `detach: true` makes it a root
#[instrument(skip(app_state, jwt, body), fields(editor = %jwt.user.id))]
pub async fn update_category(
    Path(category_id): Path<Uuid>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Json(body): Json<UpdateCategoryDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid update_category input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let category = taxonomy::update_category(&app_state.db_client, &jwt.user, category_id, body)
        .await
        .map_err(service_failure("update_category"))?;

    Ok(Json(CategoryResponseDto {
        status: "success".to_string(),
        data: category,
    }))
}

#[instrument(skip(app_state, jwt), fields(editor = %jwt.user.id))]
pub async fn delete_category(
    Path(category_id): Path<Uuid>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    taxonomy::delete_category(&app_state.db_client, &jwt.user, category_id)
        .await
        .map_err(service_failure("delete_category"))?;

    tracing::info!("delete_category successful");
    Ok(Json(Response {
        status: "success",
        message: "Category deleted".to_string(),
    }))
}
