use crate::{
    AppState,
    dtos::{NotificationListResponse, NotificationsQuery, Response, UnreadCountDto},
    error::HttpError,
    handler::{pagination_dto, service_failure},
    middleware::JWTAuthMiddleware,
    ranking::Pagination,
    service::engagement,
};
use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
};
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

/// Router for `/notifications`
///
/// All routes are protected by the auth middleware (applied in routes.rs).
pub fn notifications_handler() -> Router<AppState> {
    Router::new()
        .route("/", get(get_notifications))
        .route("/unread-count", get(get_unread_count))
        .route("/read-all", post(mark_all_read))
        .route("/{id}/read", post(mark_read))
}

/// Newest first. Query params: ?page=1&limit=20&unread_only=true
#[instrument(skip(app_state, jwt), fields(user_id = %jwt.user.id))]
pub async fn get_notifications(
    Query(query_params): Query<NotificationsQuery>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    query_params.validate().map_err(|e| {
        tracing::error!("Invalid get_notifications input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let pagination = Pagination::new(query_params.page, query_params.limit);
    let (notifications, total, unread_count) = engagement::list_notifications(
        &app_state.db_client,
        &jwt.user,
        query_params.unread_only,
        pagination,
    )
    .await
    .map_err(service_failure("get_notifications"))?;

    Ok(Json(NotificationListResponse {
        status: "success".to_string(),
        data: notifications,
        pagination: pagination_dto(pagination, total),
        unread_count,
    }))
}

#[instrument(skip(app_state, jwt), fields(user_id = %jwt.user.id))]
pub async fn get_unread_count(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let unread_count = engagement::unread_count(&app_state.db_client, &jwt.user)
        .await
        .map_err(service_failure("get_unread_count"))?;

    Ok(Json(UnreadCountDto {
        status: "success".to_string(),
        unread_count,
    }))
}

#[instrument(skip(app_state, jwt), fields(user_id = %jwt.user.id))]
pub async fn mark_read(
    Path(notification_id): Path<Uuid>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    engagement::mark_as_read(&app_state.db_client, &jwt.user, notification_id)
        .await
        .map_err(service_failure("mark_read"))?;

    Ok(Json(Response {
        status: "success",
        message: "Notification marked as read".to_string(),
    }))
}

#[instrument(skip(app_state, jwt), fields(user_id = %jwt.user.id))]
pub async fn mark_all_read(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let updated = engagement::mark_all_as_read(&app_state.db_client, &jwt.user)
        .await
        .map_err(service_failure("mark_all_read"))?;

    tracing::info!("Marked {} notifications as read", updated);
    Ok(Json(Response {
        status: "success",
        message: format!("{} notifications marked as read", updated),
    }))
}
