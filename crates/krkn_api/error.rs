use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use krkn_core::errors::Error as CoreError;
use serde::Serialize;
use tracing::error;

/// Boundary wrapper: `krkn_core::errors::Error` is foreign to this
/// crate, so it needs a local newtype to carry `actix_web::ResponseError`
/// (spec §7 "Propagation policy" — handlers classify at the boundary,
/// never leaking raw store/RPC text).
#[derive(Debug)]
pub struct ApiError(pub CoreError);

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        ApiError(e)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            CoreError::BadRequest(_) | CoreError::BadField { .. } | CoreError::InvalidValue { .. } => StatusCode::BAD_REQUEST,
            CoreError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            CoreError::Forbidden(_) => StatusCode::FORBIDDEN,
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::Conflict(_) => StatusCode::CONFLICT,
            CoreError::Internal(_) | CoreError::ErrorWithRequeue(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let category = match &self.0 {
            CoreError::BadRequest(_) => "bad_request",
            CoreError::BadField { .. } => "bad_field",
            CoreError::InvalidValue { .. } => "invalid_value",
            CoreError::Unauthorized(_) => "unauthorized",
            CoreError::Forbidden(_) => "forbidden",
            CoreError::NotFound(_) => "not_found",
            CoreError::Conflict(_) => "conflict",
            CoreError::Internal(_) | CoreError::ErrorWithRequeue(_) => "internal",
        };

        let message = if self.status_code() == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self.0, "internal error");
            "an internal error occurred".to_string()
        } else {
            self.0.to_string()
        };

        HttpResponse::build(self.status_code()).json(ErrorBody { error: category, message })
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_not_found_to_404() {
        let err = ApiError(CoreError::NotFound("missing".into()));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn maps_internal_to_500_without_leaking_the_message() {
        let err = ApiError(CoreError::Internal(krkn_core::errors::StdError::DecodingError("raw secret".into())));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        let response = err.error_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn maps_forbidden_to_403() {
        let err = ApiError(CoreError::Forbidden("admin role required".into()));
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }
}
