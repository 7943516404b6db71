use crate::{
    AppState,
    db::UserExt,
    dtos::{LoginUserDto, RefreshResponseDto, RegisterUserDto, Response, UserLoginResponseDto},
    error::{ErrorMessage, HttpError},
    handler::cookie_headers,
    middleware::{JWTAuthMiddleware, auth},
    redisdb::{MAX_IDENTIFIER_IP_ATTEMPTS, MAX_IP_ATTEMPTS},
    utils::{password, token},
};
use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::post,
};
use axum_client_ip::ClientIp;
use axum_extra::extract::cookie::{Cookie, CookieJar};
use tracing::instrument;
use validator::Validate;

/// Router for authentication endpoints
pub fn auth_handler(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route(
            "/logout",
            post(logout).route_layer(middleware::from_fn_with_state(app_state, auth)),
        )
}

fn session_cookie(name: &'static str, value: String) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(true)
        .build()
}

/// Register new user account; new accounts start with the `reader` role
#[instrument(skip(app_state, body), fields(username = %body.username, email = %body.email))]
pub async fn register(
    State(app_state): State<AppState>,
    Json(body): Json<RegisterUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid register input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let hash_password = password::hash(&body.password).map_err(|e| {
        tracing::error!("Password hashing error: {}", e);
        HttpError::server_error(e.to_string())
    })?;

    let result = app_state
        .db_client
        .save_user(body.username.trim(), body.email.trim(), hash_password.as_str())
        .await;

    match result {
        Ok(user) => {
            tracing::info!(user_id = %user.id, "Register Successful");
            Ok((
                StatusCode::CREATED,
                Json(Response {
                    status: "success",
                    message: "Registration successful! You can now log in.".to_string(),
                }),
            ))
        }
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            tracing::error!("DB error, saving user, unique_violation: {}", db_err);
            Err(HttpError::unique_constraint_violation(
                ErrorMessage::EmailOrUsernameExist.to_string(),
            ))
        }
        Err(e) => {
            tracing::error!("DB error, saving user: {}", e);
            Err(HttpError::server_error(
                ErrorMessage::ServerError.to_string(),
            ))
        }
    }
}

/// Login with attempt limits (100 per IP per day, 10 per identifier+IP per hour)
#[instrument(skip(app_state, body), fields(identifier = %body.identifier))]
pub async fn login(
    ClientIp(ip): ClientIp,
    State(app_state): State<AppState>,
    Json(body): Json<LoginUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    let ip = ip.to_string();

    let ip_attempts = app_state
        .redis_client
        .get_ip_attempts(&ip)
        .await
        .map_err(|e| {
            tracing::error!("RedisDB error, getting ip attempts: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;
    if ip_attempts >= MAX_IP_ATTEMPTS {
        tracing::warn!(ip = %ip, "Login attempts per IP exceeded the limit");
        return Err(HttpError::too_many_requests(
            ErrorMessage::TooManyRequests.to_string(),
        ));
    }

    let identifier_ip_attempts = app_state
        .redis_client
        .get_identifier_ip_attempts(&body.identifier, &ip)
        .await
        .map_err(|e| {
            tracing::error!("RedisDB error, getting identifier+ip attempts: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;
    if identifier_ip_attempts >= MAX_IDENTIFIER_IP_ATTEMPTS {
        tracing::warn!(ip = %ip, "Login attempts per identifier exceeded the limit");
        return Err(HttpError::too_many_requests(
            ErrorMessage::TooManyRequests.to_string(),
        ));
    }

    match authenticate_process(&app_state, &body).await {
        Ok(response) => {
            if let Err(e) = app_state
                .redis_client
                .delete_identifier_ip_attempts(&body.identifier, &ip)
                .await
            {
                tracing::warn!("Failed to clear login attempts: {:?}", e);
            }
            tracing::info!(identifier = %body.identifier, ip = %ip, "Login Successful");
            Ok(response)
        }
        Err(err) => {
            if let Err(e) = app_state
                .redis_client
                .increment_attempts(&body.identifier, &ip)
                .await
            {
                tracing::warn!("Failed to increment login attempts: {:?}", e);
            }
            Err(err)
        }
    }
}

/// Check credentials, then issue access and refresh tokens as cookies
async fn authenticate_process(
    app_state: &AppState,
    body: &LoginUserDto,
) -> Result<axum::response::Response, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid login input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    // Identifier containing '@' is an email
    let result = if body.identifier.contains('@') {
        app_state
            .db_client
            .get_user(None, None, Some(&body.identifier))
            .await
    } else {
        app_state
            .db_client
            .get_user(None, Some(&body.identifier), None)
            .await
    }
    .map_err(|e| {
        tracing::error!("DB error, getting user: {}", e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    let user = result.ok_or_else(|| {
        tracing::error!("User not found");
        HttpError::unauthorized(ErrorMessage::WrongCredentials.to_string())
    })?;

    // Accounts created through an external provider have no local password
    let stored_hash = user.password.as_deref().ok_or_else(|| {
        tracing::error!(user_id = %user.id, "Password login on an account without password");
        HttpError::unauthorized(ErrorMessage::WrongCredentials.to_string())
    })?;

    let password_matched = password::compare(&body.password, stored_hash).map_err(|e| {
        tracing::error!("Password error: {}", e);
        HttpError::unauthorized(ErrorMessage::WrongCredentials.to_string())
    })?;
    if !password_matched {
        tracing::error!("password mismatch");
        return Err(HttpError::unauthorized(
            ErrorMessage::WrongCredentials.to_string(),
        ));
    }

    if !user.is_active {
        tracing::warn!(user_id = %user.id, "Login on an inactive account");
        return Err(HttpError::forbidden(
            ErrorMessage::AccountInactive.to_string(),
        ));
    }

    let user_id = user.id.to_string();
    let access_token = token::create_token(
        &user_id,
        app_state.env.jwt_secret.as_bytes(),
        app_state.env.jwt_maxage,
    )
    .map_err(|e| {
        tracing::error!("Access token creation error: {}", e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    let refresh_token = token::create_token(
        &user_id,
        app_state.env.jwt_secret.as_bytes(),
        app_state.env.refresh_token_maxage,
    )
    .map_err(|e| {
        tracing::error!("Refresh token creation error: {}", e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    // Stored so logout and password changes can revoke it
    app_state
        .redis_client
        .save_refresh_token(
            &user_id,
            &refresh_token,
            app_state.env.refresh_token_maxage,
        )
        .await
        .map_err(|e| {
            tracing::error!(user_id = %user.id, "RedisDB error, saving refresh token: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let headers = cookie_headers(&[
        session_cookie("access_token", access_token.clone()),
        session_cookie("refresh_token", refresh_token),
    ])?;

    let mut response = Json(UserLoginResponseDto {
        status: "success".to_string(),
        access_token,
        username: user.username,
    })
    .into_response();
    response.headers_mut().extend(headers);
    Ok(response)
}

/// Issue a new access token from the refresh token cookie
#[instrument(skip(app_state, cookie_jar))]
pub async fn refresh(
    cookie_jar: CookieJar,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let token = cookie_jar
        .get("refresh_token")
        .map(|cookie| cookie.value().to_string())
        .ok_or_else(|| {
            tracing::error!("Refresh token not provided");
            HttpError::unauthorized(ErrorMessage::TokenNotProvided.to_string())
        })?;

    let user_id = token::decode_token(&token, app_state.env.jwt_secret.as_bytes()).map_err(|e| {
        tracing::error!("Invalid refresh token: {}", e);
        HttpError::unauthorized(ErrorMessage::InvalidToken.to_string())
    })?;

    // A revoked token is missing from redis or replaced by a newer one
    let stored_refresh_token = app_state
        .redis_client
        .get_refresh_token(&user_id)
        .await
        .map_err(|e| {
            tracing::error!("RedisDB error, getting refresh token: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;
    if stored_refresh_token.as_deref() != Some(token.as_str()) {
        tracing::error!("Refresh token mismatch or not found in Redis");
        return Err(HttpError::unauthorized(
            ErrorMessage::InvalidToken.to_string(),
        ));
    }

    let access_token = token::create_token(
        &user_id,
        app_state.env.jwt_secret.as_bytes(),
        app_state.env.jwt_maxage,
    )
    .map_err(|e| {
        tracing::error!("Access token creation error: {}", e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    let headers = cookie_headers(&[session_cookie("access_token", access_token.clone())])?;

    let mut response = Json(RefreshResponseDto {
        status: "access_token recreated".to_string(),
        access_token,
    })
    .into_response();
    response.headers_mut().extend(headers);
    tracing::info!("Access token refreshed successfully");
    Ok(response)
}

/// Revoke the refresh token and expire both cookies
#[instrument(skip(app_state, jwt), fields(user_id = %jwt.user.id))]
pub async fn logout(
    Extension(jwt): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    app_state
        .redis_client
        .delete_refresh_token(&jwt.user.id.to_string())
        .await
        .map_err(|e| {
            tracing::error!("RedisDB error, deleting refresh token: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let expired = |name: &'static str| {
        Cookie::build((name, ""))
            .path("/")
            .max_age(time::Duration::ZERO)
            .http_only(true)
            .build()
    };
    let headers = cookie_headers(&[expired("access_token"), expired("refresh_token")])?;

    let mut response = Json(Response {
        status: "success",
        message: "Logout successful".to_string(),
    })
    .into_response();
    response.headers_mut().extend(headers);
    tracing::info!("logout successful");
    Ok(response)
}
