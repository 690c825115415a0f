use axum::{http::StatusCode, response::Json};
use tracing::error;

use crate::error::Error;
use crate::models::ErrorResponse;

/// Error half of every handler result
pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn status_for(e: &Error) -> StatusCode {
    match e {
        Error::StoreLookupFailed { .. } => StatusCode::NOT_FOUND,
        Error::InvalidDescriptorInput { .. } | Error::InvalidInput { .. } | Error::Serialization(_) => {
            StatusCode::BAD_REQUEST
        }
        Error::DispatchFailed { .. } | Error::Http(_) | Error::ProviderApi(_) => StatusCode::BAD_GATEWAY,
        Error::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        Error::CredentialsUnavailable(_)
        | Error::DiscoveryPartialFailure { .. }
        | Error::Config(_)
        | Error::Command(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Logs the failure and turns it into a JSON error body
pub fn api_error(context: &str, e: &Error) -> ApiError {
    error!("{}: {}", context, e);
    (
        status_for(e),
        Json(ErrorResponse {
            error: context.to_string(),
            message: Some(e.to_string()),
        }),
    )
}

pub fn bad_request(error: &str, message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: error.to_string(),
            message: Some(message.into()),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProviderKind;

    #[test]
    fn lookup_and_input_errors_are_client_errors() {
        let missing = Error::StoreLookupFailed {
            provider: ProviderKind::Eks,
            cluster_name: "c1".into(),
            field: "region_name",
        };
        assert_eq!(status_for(&missing), StatusCode::NOT_FOUND);

        let invalid = Error::InvalidDescriptorInput {
            field: "desired_capacity",
            value: "abc".into(),
        };
        assert_eq!(status_for(&invalid), StatusCode::BAD_REQUEST);

        let expiration = Error::InvalidInput {
            field: "expiration_time",
            value: "9999999999".into(),
        };
        assert_eq!(status_for(&expiration), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&Error::command("boom")), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
