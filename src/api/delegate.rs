// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::rejection::JsonRejection, extract::State, Json};

use crate::{
    blockchain::delegation::{DelegateRequest, DelegateResponse, DelegationError},
    error::{ApiError, ErrorBody},
    state::AppState,
};

const MISSING_FIELDS: &str = "Missing required fields: to, data, or authorization.";
const RELAY_FAILED: &str = "Failed to relay transaction.";

impl From<DelegationError> for ApiError {
    fn from(err: DelegationError) -> Self {
        match err {
            DelegationError::InvalidAuthorization(_) => {
                ApiError::bad_request(err.to_string()).with_error("Invalid authorization.")
            }
            other => ApiError::internal(other.to_string()).with_error(RELAY_FAILED),
        }
    }
}

/// Relay an EIP-7702 delegation transaction paid for by the relayer key.
#[utoipa::path(
    post,
    path = "/api/relay/delegate",
    request_body = DelegateRequest,
    tag = "Relay",
    responses(
        (status = 200, description = "Transaction submitted", body = DelegateResponse),
        (status = 400, description = "Malformed request", body = ErrorBody),
        (status = 500, description = "Submission failed", body = ErrorBody)
    )
)]
pub async fn delegate(
    State(state): State<AppState>,
    payload: Result<Json<DelegateRequest>, JsonRejection>,
) -> Result<Json<DelegateResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        ApiError::bad_request(rejection.body_text()).with_error(MISSING_FIELDS)
    })?;

    let response = state.delegation.delegate(&request).await.map_err(|e| {
        tracing::error!(to = %request.to, error = %e, "Delegation relay failed");
        ApiError::from(e)
    })?;
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use alloy::primitives::{Address, Bytes, B256, U256};
    use axum::http::StatusCode;

    use super::*;
    use crate::blockchain::delegation::testing::RecordingSender;
    use crate::blockchain::delegation::AuthorizationPayload;

    fn request(y_parity: u8) -> DelegateRequest {
        DelegateRequest {
            to: Address::repeat_byte(0x0b),
            data: Bytes::from(vec![0xde, 0xad]),
            authorization: AuthorizationPayload {
                address: Address::repeat_byte(0x41),
                chain_id: 84532,
                nonce: 0,
                r: U256::from(1),
                s: U256::from(2),
                v: None,
                y_parity: Some(y_parity),
            },
        }
    }

    fn state(sender: Arc<RecordingSender>) -> AppState {
        AppState::new(sender)
    }

    #[tokio::test]
    async fn relays_request_and_returns_hash() {
        let sender = Arc::new(RecordingSender::default());
        let Json(response) = delegate(State(state(sender.clone())), Ok(Json(request(1))))
            .await
            .expect("delegation succeeds");

        assert_eq!(response.tx_hash, B256::repeat_byte(0xab));
        assert_eq!(sender.requests.lock().unwrap()[0], request(1));
    }

    #[tokio::test]
    async fn invalid_authorization_is_a_bad_request() {
        let sender = Arc::new(RecordingSender::default());
        let err = delegate(State(state(sender.clone())), Ok(Json(request(5))))
            .await
            .unwrap_err();

        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(sender.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn submission_failure_is_reported_as_relay_failure() {
        let sender = Arc::new(RecordingSender::default());
        *sender.fail_with.lock().unwrap() = Some("insufficient funds".to_string());

        let err = delegate(State(state(sender)), Ok(Json(request(0))))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.error, RELAY_FAILED);
        assert!(err.message.contains("insufficient funds"));
    }
}
