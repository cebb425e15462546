use crate::error::AppError;
use actix_web::{
    http::{header, StatusCode},
    HttpResponse,
};
use error_types::{reason_phrase, ErrorResponse};

/// Map a domain error to its HTTP status and JSON body.
pub fn map_error(err: &AppError) -> (StatusCode, ErrorResponse) {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    if status.is_server_error() {
        tracing::error!(error = %err, code = err.code(), "request failed");
    }

    let response = ErrorResponse::new(
        reason_phrase(status.as_u16()),
        &err.public_message(),
        status.as_u16(),
        err.error_type(),
        err.code(),
    );

    (status, response)
}

pub fn into_response(err: &AppError) -> HttpResponse {
    let (status, body) = map_error(err);
    let mut builder = HttpResponse::build(status);
    if err.is_retryable() {
        builder.insert_header((header::RETRY_AFTER, "1"));
    }
    builder.json(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthFailure;

    #[test]
    fn test_map_validation_error() {
        let err = AppError::validation("MESSAGE_EMPTY", "message text must not be empty");
        let (status, body) = map_error(&err);

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "Bad Request");
        assert_eq!(body.error_type, "validation_error");
        assert_eq!(body.code, "MESSAGE_EMPTY");
        assert_eq!(body.message, "message text must not be empty");
    }

    #[test]
    fn test_map_unauthorized() {
        let (status, body) = map_error(&AppError::Unauthorized(AuthFailure::InvalidCredentials));
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.message, "Credentials not valid.");
    }

    #[test]
    fn test_map_storage_error() {
        let (status, body) = map_error(&AppError::Storage("pool closed".into()));
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.error_type, "storage_error");
        assert_eq!(body.code, "STORAGE_UNAVAILABLE");
    }

    #[test]
    fn test_retryable_errors_carry_retry_after() {
        let res = into_response(&AppError::Storage("pool closed".into()));
        assert_eq!(res.headers().get(header::RETRY_AFTER).unwrap(), "1");

        let res = into_response(&AppError::NotFound("user not found".into()));
        assert!(res.headers().get(header::RETRY_AFTER).is_none());
    }
}
