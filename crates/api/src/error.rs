//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use engine::{EngineError, ErrorKind};
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request from the client.
    #[error("{0}")]
    BadRequest(String),
    /// Engine operation failed.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl ApiError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, ErrorKind::InvalidRequest.as_str()),
            ApiError::Engine(err) => (engine_status(err), err.kind().as_str()),
        }
    }
}

fn engine_status(err: &EngineError) -> StatusCode {
    match err {
        EngineError::HoldExpired(_) => StatusCode::GONE,
        EngineError::PaymentDeclined { .. } => StatusCode::PAYMENT_REQUIRED,
        EngineError::InsufficientInventory { .. }
        | EngineError::HoldNotActive { .. }
        | EngineError::AlreadyRedeemed(_)
        | EngineError::NotPurchased { .. }
        | EngineError::PartialExpiry { .. }
        | EngineError::TierAlreadyExists(_) => StatusCode::CONFLICT,
        EngineError::TierNotFound(_)
        | EngineError::TicketNotFound(_)
        | EngineError::HoldNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::InvalidArgument(_) | EngineError::Capacity { .. } => StatusCode::BAD_REQUEST,
        EngineError::PaymentService(_) | EngineError::Notification(_) => StatusCode::BAD_GATEWAY,
        EngineError::TierHalted(_) | EngineError::StoreUnavailable(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        EngineError::InvariantViolation { .. } | EngineError::Domain(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        if status.is_server_error() {
            tracing::error!(error = %self, kind, "request failed");
        }

        let body = serde_json::json!({ "error": self.to_string(), "kind": kind });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use common::{HoldId, TierId};

    use super::*;

    #[test]
    fn contention_maps_to_conflict() {
        let err = ApiError::from(EngineError::InsufficientInventory {
            tier_id: TierId::new("ga"),
            requested: 1,
            available: 0,
        });
        assert_eq!(err.status_and_kind(), (StatusCode::CONFLICT, "contention"));
    }

    #[test]
    fn expiry_and_decline_have_dedicated_codes() {
        let expired = ApiError::from(EngineError::HoldExpired(HoldId::new()));
        assert_eq!(expired.status_and_kind().0, StatusCode::GONE);

        let declined = ApiError::from(EngineError::PaymentDeclined {
            hold_id: HoldId::new(),
            reason: "no funds".to_string(),
        });
        assert_eq!(
            declined.status_and_kind(),
            (StatusCode::PAYMENT_REQUIRED, "integration")
        );
    }

    #[test]
    fn outage_is_service_unavailable() {
        let err = ApiError::from(EngineError::StoreUnavailable("down".to_string()));
        assert_eq!(
            err.status_and_kind(),
            (StatusCode::SERVICE_UNAVAILABLE, "infrastructure")
        );
    }
}
