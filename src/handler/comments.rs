use crate::{
    AppState,
    dtos::{InputCommentRequest, Response, SingleCommentResponse},
    error::HttpError,
    handler::service_failure,
    middleware::{JWTAuthMiddleware, auth},
    service::engagement,
};
use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    middleware,
    response::IntoResponse,
    routing::patch,
};
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

/// Router for `/comments`; listing and creation live under `/articles/{slug}/comments`
pub fn comments_handler(app_state: AppState) -> Router<AppState> {
    Router::new().route(
        "/{id}",
        patch(edit_comment)
            .delete(delete_comment)
            .route_layer(middleware::from_fn_with_state(app_state, auth)),
    )
}

/// Only the author of a comment may edit it
#[instrument(skip(app_state, jwt, body), fields(user_id = %jwt.user.id))]
pub async fn edit_comment(
    Path(comment_id): Path<Uuid>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Json(body): Json<InputCommentRequest>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid edit_comment input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let comment = engagement::edit_comment(&app_state.db_client, &jwt.user, comment_id, &body.content)
        .await
        .map_err(service_failure("edit_comment"))?;

    tracing::info!("edit_comment successful");
    Ok(Json(SingleCommentResponse {
        status: "success".to_string(),
        data: comment,
    }))
}

/// The author or an editor may delete a comment
#[instrument(skip(app_state, jwt), fields(user_id = %jwt.user.id))]
pub async fn delete_comment(
    Path(comment_id): Path<Uuid>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    engagement::delete_comment(&app_state.db_client, &jwt.user, comment_id)
        .await
        .map_err(service_failure("delete_comment"))?;

    tracing::info!("delete_comment successful");
    Ok(Json(Response {
        status: "success",
        message: "Comment deleted".to_string(),
    }))
}
