//! HTTP error response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use areaflow_domain::error::AreaflowError;

/// JSON error body returned by API endpoints.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Maps [`AreaflowError`] and request-shape problems to an HTTP response.
#[derive(Debug)]
pub enum ApiError {
    Domain(AreaflowError),
    /// A path segment that should hold an id does not parse.
    InvalidId { entity: &'static str, value: String },
}

impl From<AreaflowError> for ApiError {
    fn from(err: AreaflowError) -> Self {
        Self::Domain(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::InvalidId { entity, value } => (
                StatusCode::BAD_REQUEST,
                format!("invalid {entity} id {value:?}"),
            ),
            Self::Domain(AreaflowError::Validation(err)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
            }
            Self::Domain(AreaflowError::NotFound(err)) => (StatusCode::NOT_FOUND, err.to_string()),
            Self::Domain(AreaflowError::Publish(err)) => {
                tracing::error!(error = %err, "event publication failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "event publication failed".to_string(),
                )
            }
            Self::Domain(AreaflowError::Storage(err)) => {
                tracing::error!(error = %err, "storage error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use areaflow_domain::error::{NotFoundError, ValidationError};
    use areaflow_domain::execution::ExecutionStatus;

    fn status_of(err: impl Into<ApiError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn should_map_domain_errors_to_status_codes() {
        let not_found = AreaflowError::from(NotFoundError::new("Execution", "x"));
        let transition = AreaflowError::from(ValidationError::InvalidTransition {
            from: ExecutionStatus::Ok,
            to: ExecutionStatus::Canceled,
        });
        let storage = AreaflowError::storage(std::io::Error::other("disk"));
        let publish = AreaflowError::publish(std::io::Error::other("broker"));

        assert_eq!(status_of(not_found), StatusCode::NOT_FOUND);
        assert_eq!(status_of(transition), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status_of(storage), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(status_of(publish), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn should_reject_malformed_id_as_bad_request() {
        let invalid = ApiError::InvalidId {
            entity: "Execution",
            value: "nope".to_string(),
        };
        assert_eq!(status_of(invalid), StatusCode::BAD_REQUEST);
    }
}
