pub mod articles;
pub mod auth;
pub mod categories;
pub mod comments;
pub mod media;
pub mod notifications;
pub mod tags;
pub mod users;

use axum::http::{HeaderMap, HeaderValue, header};
use axum_extra::extract::cookie::Cookie;

use crate::{
    dtos::PaginationDto,
    error::{ErrorMessage, HttpError},
    ranking::Pagination,
    service::ServiceError,
};

/// Logs a failed service call under `action` and maps it to its HTTP error
pub(crate) fn service_failure(action: &'static str) -> impl Fn(ServiceError) -> HttpError {
    move |e| {
        match &e {
            ServiceError::Internal(_) => tracing::error!("{} failed: {}", action, e),
            _ => tracing::warn!("{} rejected: {}", action, e),
        }
        HttpError::from(e)
    }
}

pub(crate) fn pagination_dto(pagination: Pagination, total: i64) -> PaginationDto {
    PaginationDto {
        page: pagination.page,
        limit: pagination.limit,
        total,
        total_pages: pagination.total_pages(total),
    }
}

/// One `Set-Cookie` header per cookie
pub(crate) fn cookie_headers(cookies: &[Cookie<'_>]) -> Result<HeaderMap, HttpError> {
    let mut headers = HeaderMap::new();
    for cookie in cookies {
        let value = HeaderValue::from_str(&cookie.to_string()).map_err(|e| {
            tracing::error!("Invalid cookie header value: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;
        headers.append(header::SET_COOKIE, value);
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn pagination_counts_partial_pages() {
        let dto = pagination_dto(Pagination::new(Some(2), Some(10)), 21);
        assert_eq!(dto.page, 2);
        assert_eq!(dto.total_pages, 3);
    }

    #[test]
    fn service_errors_keep_their_status() {
        let to_http = service_failure("test");
        assert_eq!(
            to_http(ServiceError::NotFound("Article".to_string())).status,
            StatusCode::NOT_FOUND
        );
        assert_eq!(to_http(ServiceError::Forbidden).status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn each_cookie_gets_its_own_header() {
        let cookies = [
            Cookie::new("access_token", "a"),
            Cookie::new("refresh_token", "r"),
        ];
        let headers = cookie_headers(&cookies).unwrap();
        assert_eq!(headers.get_all(header::SET_COOKIE).iter().count(), 2);
    }
}
