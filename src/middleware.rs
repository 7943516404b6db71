use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::IntoResponse,
};
use axum_client_ip::ClientIp;
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};

use crate::{
    AppState,
    db::UserExt,
    error::{ErrorMessage, HttpError},
    models::{User, UserRole},
    permission::has_permission,
    utils::token,
};

/// Middleware extension that stores authenticated user information
///
/// Inserted into the request extensions by `auth`. Handlers extract it with
/// `Extension(auth): Extension<JWTAuthMiddleware>`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JWTAuthMiddleware {
    pub user: User,
}

/// Viewer of a public route: `None` for anonymous requests
///
/// Inserted by `optional_auth`; an invalid or expired token is treated as anonymous.
#[derive(Debug, Clone)]
pub struct Viewer(pub Option<User>);

/// Token from the `access_token` cookie, else from `Authorization: Bearer <token>`
fn extract_token(cookie_jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    cookie_jar
        .get("access_token")
        .map(|cookie| cookie.value().to_string())
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|auth_header| auth_header.to_str().ok())
                .and_then(|auth_value| auth_value.strip_prefix("Bearer "))
                .map(|token| token.to_owned())
        })
}

/// Decode the token and load its user; soft-deleted users no longer authenticate
async fn resolve_user(app_state: &AppState, token: String) -> Result<User, HttpError> {
    let token_details = token::decode_token(token, app_state.env.jwt_secret.as_bytes())
        .map_err(|_| HttpError::unauthorized(ErrorMessage::InvalidToken.to_string()))?;

    let user_id = uuid::Uuid::parse_str(&token_details)
        .map_err(|_| HttpError::unauthorized(ErrorMessage::InvalidToken.to_string()))?;

    let user = app_state
        .db_client
        .get_user(Some(user_id), None, None)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting user for token: {}", e);
            HttpError::unauthorized(ErrorMessage::UserNoLongerExist.to_string())
        })?;

    user.ok_or_else(|| HttpError::unauthorized(ErrorMessage::UserNoLongerExist.to_string()))
}

/// Authentication middleware that validates JWT tokens
///
/// # Errors
/// Returns 401 Unauthorized if:
/// - No token is provided
/// - Token is invalid or expired
/// - User no longer exists in database
pub async fn auth(
    cookie_jar: CookieJar,
    State(app_state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, HttpError> {
    let token = extract_token(&cookie_jar, req.headers())
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::TokenNotProvided.to_string()))?;

    let user = resolve_user(&app_state, token).await?;

    req.extensions_mut().insert(JWTAuthMiddleware { user });
    Ok(next.run(req).await)
}

/// Like `auth`, but never rejects: inserts a `Viewer` with or without a user
pub async fn optional_auth(
    cookie_jar: CookieJar,
    State(app_state): State<AppState>,
    mut req: Request,
    next: Next,
) -> impl IntoResponse {
    let user = match extract_token(&cookie_jar, req.headers()) {
        Some(token) => match resolve_user(&app_state, token).await {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::debug!("Ignoring unusable token on public route: {}", e);
                None
            }
        },
        None => None,
    };

    req.extensions_mut().insert(Viewer(user));
    next.run(req).await
}

/// Role guard: the authenticated user must be active and rank at least `minimum`
///
/// Must run after `auth`.
///
/// # Errors
/// Returns 401 if user is not authenticated
/// Returns 403 if the account is inactive or the role ranks below `minimum`
pub async fn require_role(
    req: Request,
    next: Next,
    minimum: UserRole,
) -> Result<impl IntoResponse, HttpError> {
    let user = req
        .extensions()
        .get::<JWTAuthMiddleware>()
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::UserNotAuthenticated.to_string()))?;

    if !user.user.is_active {
        return Err(HttpError::forbidden(
            ErrorMessage::AccountInactive.to_string(),
        ));
    }

    if !has_permission(user.user.role, minimum) {
        return Err(HttpError::forbidden(
            ErrorMessage::PermissionDenied.to_string(),
        ));
    }

    Ok(next.run(req).await)
}

/// Fixed-window limiter per client IP, backed by redis
///
/// Fails open: if redis is unreachable the request goes through.
pub async fn rate_limit(
    ClientIp(ip): ClientIp,
    State(app_state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<impl IntoResponse, HttpError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0);

    match app_state
        .redis_client
        .hit_rate_window(&ip.to_string(), now)
        .await
    {
        Ok(count) if count > app_state.env.rate_limit_per_minute => {
            tracing::warn!(ip = %ip, count, "Rate limit exceeded");
            return Err(HttpError::too_many_requests(
                ErrorMessage::TooManyRequests.to_string(),
            ));
        }
        Ok(_) => {}
        Err(e) => tracing::warn!("Rate limiter unavailable, allowing request: {}", e),
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use axum_extra::extract::cookie::Cookie;

    #[test]
    fn bearer_header_is_used_without_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc.def.ghi"),
        );

        let token = extract_token(&CookieJar::new(), &headers);
        assert_eq!(token.as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn cookie_takes_precedence_over_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer from-header"),
        );
        let jar = CookieJar::new().add(Cookie::new("access_token", "from-cookie"));

        assert_eq!(
            extract_token(&jar, &headers).as_deref(),
            Some("from-cookie")
        );
    }

    #[test]
    fn other_schemes_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic Zm9vOmJhcg=="));
        assert!(extract_token(&CookieJar::new(), &headers).is_none());
    }
}
