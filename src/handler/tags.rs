use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{delete, get, post};
use axum::{Extension, Router, middleware};
use tracing::instrument;
use validator::Validate;

use crate::AppState;
use crate::dtos::{InputTagDto, RequestQueryDto, Response, TagListResponseDto, TagResponseDto};
use crate::error::HttpError;
use crate::handler::{pagination_dto, service_failure};
use crate::middleware::{JWTAuthMiddleware, auth, require_role};
use crate::models::UserRole;
use crate::ranking::Pagination;
use crate::service::taxonomy;

/// Router for `/tags`. Tags are mostly created implicitly by articles; the
/// explicit create and delete routes are for editors.
pub fn tags_handler(app_state: AppState) -> Router<AppState> {
    let require_auth = middleware::from_fn_with_state(app_state, auth);

    Router::new()
        .route("/", get(get_tags))
        .route(
            "/",
            post(create_tag)
                .route_layer(middleware::from_fn(|req, next| {
                    require_role(req, next, UserRole::Editor)
                }))
                .route_layer(require_auth.clone()),
        )
        .route("/{slug}", get(get_tag))
        .route(
            "/{slug}",
            delete(delete_tag)
                .route_layer(middleware::from_fn(|req, next| {
                    require_role(req, next, UserRole::Editor)
                }))
                .route_layer(require_auth),
        )
}

/// Most used first
#[instrument(skip(app_state))]
pub async fn get_tags(
    Query(query_params): Query<RequestQueryDto>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    query_params.validate().map_err(|e| {
        tracing::error!("Invalid get_tags input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let pagination = Pagination::new(query_params.page, query_params.limit);
    let (tags, total) = taxonomy::list_tags(&app_state.db_client, pagination)
        .await
        .map_err(service_failure("get_tags"))?;

    Ok(Json(TagListResponseDto {
        status: "success".to_string(),
        data: tags,
        pagination: pagination_dto(pagination, total),
    }))
}

#[instrument(skip(app_state))]
pub async fn get_tag(
    Path(slug): Path<String>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let tag = taxonomy::get_tag(&app_state.db_client, &slug)
        .await
        .map_err(service_failure("get_tag"))?;

    Ok(Json(TagResponseDto {
        status: "success".to_string(),
        data: tag,
    }))
}

#[instrument(skip(app_state, jwt, body), fields(name = %body.name))]
pub async fn create_tag(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Json(body): Json<InputTagDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid create_tag input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let tag = taxonomy::create_tag(&app_state.db_client, &jwt.user, body)
        .await
        .map_err(service_failure("create_tag"))?;

    tracing::info!("create_tag successful");
    Ok((
        StatusCode::CREATED,
        Json(TagResponseDto {
            status: "success".to_string(),
            data: tag,
        }),
    ))
}

#[instrument(skip(app_state, jwt), fields(editor = %jwt.user.id))]
pub async fn delete_tag(
    Path(slug): Path<String>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    taxonomy::delete_tag(&app_state.db_client, &jwt.user, &slug)
        .await
        .map_err(service_failure("delete_tag"))?;

    Ok(Json(Response {
        status: "success",
        message: "Tag deleted".to_string(),
    }))
}
