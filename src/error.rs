use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error response structure sent to clients
///
/// Example JSON response:
/// ```json
/// {
///   "status": "fail",
///   "message": "Article not found"
/// }
/// ```
///
/// `HttpError` is what handlers return; this is only the wire format, so
/// internal details never leak into it.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => write!(f, "{}", s),
            Err(_) => Err(fmt::Error),
        }
    }
}

/// Canned error messages shared across handlers and middleware
///
/// PartialEq allows comparing variants in tests.
#[derive(Debug, PartialEq)]
pub enum ErrorMessage {
    // Password validation errors
    EmptyPassword,
    ExceededMaxPasswordLength(usize),
    InvalidHashFormat,
    HashingError,

    // Authentication errors
    InvalidToken,
    TokenNotProvided,
    UserNotAuthenticated,
    WrongCredentials,

    // Authorization errors
    PermissionDenied,
    AccountInactive,

    // User management errors
    UserNoLongerExist,
    EmailOrUsernameExist,

    // Rate limiting
    TooManyRequests,

    //Else
    ServerError,
}

impl fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            ErrorMessage::UserNoLongerExist => {
                "User belonging to this token no longer exists".to_string()
            }
            ErrorMessage::EmailOrUsernameExist => {
                "A user with this email or username already exists".to_string()
            }
            ErrorMessage::EmptyPassword => "Password cannot be empty".to_string(),
            ErrorMessage::HashingError => "Error while hashing password".to_string(),
            ErrorMessage::InvalidHashFormat => "Invalid password hash format".to_string(),
            ErrorMessage::ExceededMaxPasswordLength(max_length) => {
                format!("Password must not be more than {} characters", max_length)
            }
            ErrorMessage::InvalidToken => "Token is invalid or expired".to_string(),
            ErrorMessage::TokenNotProvided => {
                "You are not logged in, please provide a token".to_string()
            }
            ErrorMessage::WrongCredentials => "Email or password is wrong".to_string(),
            ErrorMessage::PermissionDenied => {
                "You are not allowed to perform this action".to_string()
            }
            ErrorMessage::AccountInactive => "This account has been deactivated".to_string(),
            ErrorMessage::UserNotAuthenticated => {
                "Authentication required. Please log in.".to_string()
            }
            ErrorMessage::TooManyRequests => {
                "Too many requests. Please slow down and try again later".to_string()
            }
            ErrorMessage::ServerError => "Server Error. Please try again later".to_string(),
        };
        write!(f, "{}", message)
    }
}

/// Internal HTTP error type used by handlers and middleware
///
/// Bundles the client-facing message with its status code so the two can't
/// drift apart. Axum turns it into a response through `IntoResponse`.
#[derive(Debug, Clone)]
pub struct HttpError {
    pub message: String,
    pub status: StatusCode,
}

impl HttpError {
    pub fn new(message: impl Into<String>, status: StatusCode) -> Self {
        HttpError {
            message: message.into(),
            status,
        }
    }

    /// 500 Internal Server Error: storage failures, unexpected states
    pub fn server_error(message: impl Into<String>) -> Self {
        HttpError {
            message: message.into(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 400 Bad Request: invalid input, rejected state transitions
    pub fn bad_request(message: impl Into<String>) -> Self {
        HttpError {
            message: message.into(),
            status: StatusCode::BAD_REQUEST,
        }
    }

    /// 409 Conflict: unique constraint violations (slug, email, duplicate like, ...)
    pub fn unique_constraint_violation(message: impl Into<String>) -> Self {
        HttpError {
            message: message.into(),
            status: StatusCode::CONFLICT,
        }
    }

    /// 401 Unauthorized
    ///
    /// Note: despite the name, 401 means "unauthenticated", not "unauthorized"
    pub fn unauthorized(message: impl Into<String>) -> Self {
        HttpError {
            message: message.into(),
            status: StatusCode::UNAUTHORIZED,
        }
    }

    /// 403 Forbidden: authenticated, but the role or ownership check failed
    pub fn forbidden(message: impl Into<String>) -> Self {
        HttpError {
            message: message.into(),
            status: StatusCode::FORBIDDEN,
        }
    }

    /// 404 Not Found: missing or soft-deleted resource
    pub fn not_found(message: impl Into<String>) -> Self {
        HttpError {
            message: message.into(),
            status: StatusCode::NOT_FOUND,
        }
    }

    /// 429 Too Many Requests
    pub fn too_many_requests(message: impl Into<String>) -> Self {
        HttpError {
            message: message.into(),
            status: StatusCode::TOO_MANY_REQUESTS,
        }
    }

    /// Body is `{"status": "fail", "message": "..."}`
    pub fn into_http_response(self) -> Response {
        let json_response = Json(ErrorResponse {
            status: "fail".to_string(),
            message: self.message.clone(),
        });

        (self.status, json_response).into_response()
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HttpError: message: {}, status: {}",
            self.message, self.status
        )
    }
}

impl std::error::Error for HttpError {}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        self.into_http_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_response_displays_as_json() {
        let response = ErrorResponse {
            status: "fail".to_string(),
            message: "Article not found".to_string(),
        };
        assert_eq!(
            response.to_string(),
            r#"{"status":"fail","message":"Article not found"}"#
        );
    }

    #[test]
    fn http_error_keeps_status() {
        let response = HttpError::forbidden(ErrorMessage::PermissionDenied.to_string())
            .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = HttpError::too_many_requests("slow down").into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
