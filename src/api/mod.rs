// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::{HeaderName, Request},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    blockchain::delegation::{AuthorizationPayload, DelegateRequest, DelegateResponse},
    error::ErrorBody,
    state::AppState,
};

pub mod delegate;
pub mod health;

const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn router(state: AppState) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    let api_routes = Router::new()
        .route("/ping", get(health::ping))
        .route("/relay/delegate", post(delegate::delegate))
        .with_state(state);

    Router::new()
        .route("/health", get(health::health))
        .nest("/api", api_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(health::health, health::ping, delegate::delegate),
    components(
        schemas(
            DelegateRequest,
            DelegateResponse,
            AuthorizationPayload,
            ErrorBody,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Health", description = "Liveness checks"),
        (name = "Relay", description = "EIP-7702 delegation relay")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::StatusCode,
    };
    use tower::ServiceExt;

    use super::*;
    use crate::blockchain::delegation::testing::RecordingSender;

    fn app() -> Router {
        router(AppState::new(Arc::new(RecordingSender::default())))
    }

    #[tokio::test]
    async fn router_builds_with_all_routes() {
        let app = router(AppState::new(Arc::new(RecordingSender::default())));
        // Ensure the router can be converted into a service without panicking.
        let _ = app.into_make_service();
    }

    #[tokio::test]
    async fn ping_answers_with_request_id() {
        let response = app()
            .oneshot(Request::get("/api/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"Hello world");
    }

    #[tokio::test]
    async fn delegate_without_authorization_is_rejected() {
        let request = Request::post("/api/relay/delegate")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"to":"0x0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b","data":"0x"}"#))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            body["error"],
            "Missing required fields: to, data, or authorization."
        );
        assert!(body["message"].as_str().is_some());
    }

    #[test]
    fn openapi_lists_relay_endpoint() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/relay/delegate"));
        assert!(doc.paths.paths.contains_key("/health"));
    }
}
