use crate::{
    AppState,
    db::UserExt,
    dtos::{
        ArticlesPaginationResponseDto, CategoryListResponseDto, FilterUserDto, FollowStatusDto,
        ProfileResponseDto, RequestQueryDto, Response, RoleUpdateDto, SetInterestsDto,
        SortedPageQuery, StatusUpdateDto, UpdateProfileDto, UserData, UserListResponseDto,
        UserPasswordUpdateDto, UserResponseDto, UserSummaryListResponse,
    },
    error::{ErrorMessage, HttpError},
    handler::{pagination_dto, service_failure},
    middleware::{JWTAuthMiddleware, Viewer, auth, optional_auth, require_role},
    models::{User, UserRole},
    ranking::Pagination,
    service::{article, social, user as user_service},
    utils::password,
};
use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    middleware,
    response::IntoResponse,
    routing::{delete, get, patch, post, put},
};
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

/// Router for `/users`
///
/// `/me/*` and follow actions need a token; profiles and follow lists are public.
pub fn users_handler(app_state: AppState) -> Router<AppState> {
    let require_auth = middleware::from_fn_with_state(app_state.clone(), auth);
    let viewer = middleware::from_fn_with_state(app_state, optional_auth);

    Router::new()
        .route(
            "/me",
            get(get_me)
                .patch(update_me)
                .route_layer(require_auth.clone()),
        )
        .route(
            "/me/password",
            put(update_user_password).route_layer(require_auth.clone()),
        )
        .route(
            "/me/interests",
            get(get_interests)
                .put(set_interests)
                .route_layer(require_auth.clone()),
        )
        .route(
            "/me/bookmarks",
            get(get_bookmarks).route_layer(require_auth.clone()),
        )
        .route("/{username}", get(get_profile).route_layer(viewer))
        .route("/{username}/followers", get(get_followers))
        .route("/{username}/following", get(get_following))
        .route(
            "/{username}/follow",
            post(follow).delete(unfollow).route_layer(require_auth),
        )
}

/// Router for `/admin/users`; every route requires an active admin
pub fn admin_users_handler(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(get_users))
        .route("/{id}/role", patch(update_user_role))
        .route("/{id}/status", patch(update_user_status))
        .route("/{id}", delete(delete_user))
        .route_layer(middleware::from_fn(|req, next| {
            require_role(req, next, UserRole::Admin)
        }))
        .route_layer(middleware::from_fn_with_state(app_state, auth))
}

fn user_response(user: &User) -> Json<UserResponseDto> {
    Json(UserResponseDto {
        status: "success".to_string(),
        data: UserData {
            user: FilterUserDto::filter_user(user),
        },
    })
}

/// Current user's account, without the password hash
#[instrument(skip(jwt), fields(username = %jwt.user.username))]
pub async fn get_me(
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    tracing::info!("get_me successful");
    Ok(user_response(&jwt.user))
}

#[instrument(skip(app_state, jwt, body), fields(user_id = %jwt.user.id))]
pub async fn update_me(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Json(body): Json<UpdateProfileDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid update_me input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let user = user_service::update_profile(&app_state.db_client, &jwt.user, body)
        .await
        .map_err(service_failure("update_me"))?;

    tracing::info!("update_me successful");
    Ok(user_response(&user))
}

/// Change password (requires the old one); revokes the refresh token
#[instrument(skip(app_state, jwt, body), fields(user_id = %jwt.user.id))]
pub async fn update_user_password(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Json(body): Json<UserPasswordUpdateDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid update_user_password input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let user = jwt.user;
    let stored_hash = user.password.as_deref().ok_or_else(|| {
        tracing::error!("Password change on an account without password");
        HttpError::bad_request("This account has no password to change".to_string())
    })?;

    let password_match = password::compare(&body.old_password, stored_hash).map_err(|e| {
        tracing::error!("Password compare error: {}", e);
        HttpError::server_error(e.to_string())
    })?;
    if !password_match {
        tracing::error!("Old password is incorrect");
        return Err(HttpError::bad_request(
            "Old password is incorrect".to_string(),
        ));
    }

    let hash_password = password::hash(&body.new_password).map_err(|e| {
        tracing::error!("Password hashing error: {}", e);
        HttpError::server_error(e.to_string())
    })?;

    app_state
        .db_client
        .update_user_password(user.id, hash_password)
        .await
        .map_err(|e| {
            tracing::error!("DB error, updating user password: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    // Existing sessions must log in again
    app_state
        .redis_client
        .delete_refresh_token(&user.id.to_string())
        .await
        .map_err(|e| {
            tracing::error!("RedisDB error, deleting refresh token: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    tracing::info!("update_user_password successful");
    Ok(Json(Response {
        status: "success",
        message: "Password updated Successfully".to_string(),
    }))
}

#[instrument(skip(app_state, jwt), fields(user_id = %jwt.user.id))]
pub async fn get_interests(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let categories = social::get_interests(&app_state.db_client, &jwt.user)
        .await
        .map_err(service_failure("get_interests"))?;

    Ok(Json(CategoryListResponseDto {
        status: "success".to_string(),
        data: categories,
    }))
}

/// Replaces the whole interest set
#[instrument(skip(app_state, jwt, body), fields(user_id = %jwt.user.id))]
pub async fn set_interests(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Json(body): Json<SetInterestsDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid set_interests input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let categories = social::set_interests(&app_state.db_client, &jwt.user, body.category_ids)
        .await
        .map_err(service_failure("set_interests"))?;

    tracing::info!("set_interests successful");
    Ok(Json(CategoryListResponseDto {
        status: "success".to_string(),
        data: categories,
    }))
}

#[instrument(skip(app_state, jwt), fields(user_id = %jwt.user.id))]
pub async fn get_bookmarks(
    Query(query_params): Query<SortedPageQuery>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    query_params.validate().map_err(|e| {
        tracing::error!("Invalid get_bookmarks input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let page = article::bookmarked_articles(
        &app_state.db_client,
        &jwt.user,
        query_params.sort.unwrap_or_default(),
        Pagination::new(query_params.page, query_params.limit),
    )
    .await
    .map_err(service_failure("get_bookmarks"))?;

    Ok(Json(ArticlesPaginationResponseDto {
        status: "success".to_string(),
        pagination: Some(pagination_dto(page.pagination, page.total)),
        data: page.items,
    }))
}

/// Public profile with follower, following and article counts
#[instrument(skip(app_state, viewer))]
pub async fn get_profile(
    Path(username): Path<String>,
    State(app_state): State<AppState>,
    Extension(Viewer(viewer)): Extension<Viewer>,
) -> Result<impl IntoResponse, HttpError> {
    let profile = user_service::profile(&app_state.db_client, viewer.as_ref(), &username)
        .await
        .map_err(service_failure("get_profile"))?;

    Ok(Json(ProfileResponseDto {
        status: "success".to_string(),
        data: profile,
    }))
}

#[instrument(skip(app_state))]
pub async fn get_followers(
    Path(username): Path<String>,
    Query(query_params): Query<RequestQueryDto>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    query_params.validate().map_err(|e| {
        tracing::error!("Invalid get_followers input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let pagination = Pagination::new(query_params.page, query_params.limit);
    let (users, total) = social::followers(&app_state.db_client, &username, pagination)
        .await
        .map_err(service_failure("get_followers"))?;

    Ok(Json(UserSummaryListResponse {
        status: "success".to_string(),
        data: users,
        pagination: pagination_dto(pagination, total),
    }))
}

#[instrument(skip(app_state))]
pub async fn get_following(
    Path(username): Path<String>,
    Query(query_params): Query<RequestQueryDto>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    query_params.validate().map_err(|e| {
        tracing::error!("Invalid get_following input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let pagination = Pagination::new(query_params.page, query_params.limit);
    let (users, total) = social::following(&app_state.db_client, &username, pagination)
        .await
        .map_err(service_failure("get_following"))?;

    Ok(Json(UserSummaryListResponse {
        status: "success".to_string(),
        data: users,
        pagination: pagination_dto(pagination, total),
    }))
}

#[instrument(skip(app_state, jwt), fields(follower = %jwt.user.username))]
pub async fn follow(
    Path(username): Path<String>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    social::follow(&app_state.db_client, &jwt.user, &username)
        .await
        .map_err(service_failure("follow"))?;

    tracing::info!("follow successful");
    Ok(Json(FollowStatusDto {
        status: "success".to_string(),
        following: true,
    }))
}

#[instrument(skip(app_state, jwt), fields(follower = %jwt.user.username))]
pub async fn unfollow(
    Path(username): Path<String>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    social::unfollow(&app_state.db_client, &jwt.user, &username)
        .await
        .map_err(service_failure("unfollow"))?;

    tracing::info!("unfollow successful");
    Ok(Json(FollowStatusDto {
        status: "success".to_string(),
        following: false,
    }))
}

/// Paginated list of all users (admin only)
///
/// Query params: ?page=1&limit=10
#[instrument(skip(app_state, jwt))]
pub async fn get_users(
    Query(query_params): Query<RequestQueryDto>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    query_params.validate().map_err(|e| {
        tracing::error!("Invalid get_users input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let pagination = Pagination::new(query_params.page, query_params.limit);
    let (users, total) = user_service::list_users(&app_state.db_client, &jwt.user, pagination)
        .await
        .map_err(service_failure("get_users"))?;

    tracing::info!("get_users successful");
    Ok(Json(UserListResponseDto {
        status: "success".to_string(),
        users: FilterUserDto::filter_users(&users),
        results: total,
    }))
}

#[instrument(skip(app_state, jwt, body), fields(admin = %jwt.user.id))]
pub async fn update_user_role(
    Path(user_id): Path<Uuid>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Json(body): Json<RoleUpdateDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid update_user_role input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let user = user_service::change_role(&app_state.db_client, &jwt.user, user_id, body.role)
        .await
        .map_err(service_failure("update_user_role"))?;

    Ok(user_response(&user))
}

/// Activate or deactivate an account
#[instrument(skip(app_state, jwt, body), fields(admin = %jwt.user.id))]
pub async fn update_user_status(
    Path(user_id): Path<Uuid>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Json(body): Json<StatusUpdateDto>,
) -> Result<impl IntoResponse, HttpError> {
    let user = user_service::set_active(&app_state.db_client, &jwt.user, user_id, body.is_active)
        .await
        .map_err(service_failure("update_user_status"))?;

    // A deactivated account loses its refresh token
    if !user.is_active {
        if let Err(e) = app_state
            .redis_client
            .delete_refresh_token(&user.id.to_string())
            .await
        {
            tracing::warn!("Failed to revoke refresh token of {}: {}", user.id, e);
        }
    }

    Ok(user_response(&user))
}

#[instrument(skip(app_state, jwt), fields(admin = %jwt.user.id))]
pub async fn delete_user(
    Path(user_id): Path<Uuid>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    user_service::delete_user(&app_state.db_client, &jwt.user, user_id)
        .await
        .map_err(service_failure("delete_user"))?;

    if let Err(e) = app_state
        .redis_client
        .delete_refresh_token(&user_id.to_string())
        .await
    {
        tracing::warn!("Failed to revoke refresh token of {}: {}", user_id, e);
    }

    tracing::info!("delete_user successful");
    Ok(Json(Response {
        status: "success",
        message: "User deleted".to_string(),
    }))
}
