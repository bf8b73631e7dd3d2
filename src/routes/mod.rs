pub mod associations;
pub mod events;
pub mod notifications;
pub mod posts;
pub mod public;
pub mod search;
pub mod users;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Every route, with tracing and permissive CORS for the mobile and web
/// clients.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(public::router())
        .merge(associations::router())
        .merge(events::router())
        .merge(posts::router())
        .merge(users::router())
        .merge(notifications::router())
        .merge(search::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    async fn call(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn index_is_public() {
        let (pool, _tmp) = crate::db::test_pool();
        let app = app(crate::build_state(pool, crate::config::Config::default()));

        let (status, body) = call(app, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "agora");
    }

    #[tokio::test]
    async fn protected_route_without_token_gets_envelope() {
        let (pool, _tmp) = crate::db::test_pool();
        let app = app(crate::build_state(pool, crate::config::Config::default()));

        let (status, body) = call(app, "/association").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["kind"], "unauthenticated");
        assert_eq!(body["error"], "Authentication required");
    }
}
