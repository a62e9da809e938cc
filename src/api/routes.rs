use crate::{api::health, observability::HealthChecker};
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub health_checker: Arc<HealthChecker>,
}

/// Ops listener: probes and, when enabled, Prometheus metrics
pub fn create_router(health_checker: Arc<HealthChecker>, metrics_enabled: bool) -> Router {
    let state = AppState { health_checker };

    let mut router = Router::new()
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness));

    if metrics_enabled {
        router = router.route("/metrics", get(health::metrics));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    fn router(metrics_enabled: bool) -> Router {
        create_router(Arc::new(HealthChecker::new(None)), metrics_enabled)
    }

    #[tokio::test]
    async fn test_probes_respond() {
        let response = router(true)
            .oneshot(Request::builder().uri("/health/live").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router(true)
            .oneshot(Request::builder().uri("/health/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_metrics_route_follows_config() {
        let response = router(true)
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router(false)
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
