/// HTTP Server
///
/// Exposes the scrape/probe surface named in spec §6: `/metrics` for
/// Prometheus and `/healthz` for a readiness probe. Same `Router` + CORS
/// layering shape the teacher used for its API server, trimmed to two routes.
use std::net::SocketAddr;

use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use tower_http::cors::{Any, CorsLayer};

use crate::health::{self, HealthStatus};
use crate::metrics::gather_metrics;

async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        gather_metrics(),
    )
}

async fn healthz_handler() -> impl IntoResponse {
    match health::check(chrono::Utc::now().timestamp()) {
        HealthStatus::Ok => (StatusCode::OK, "ok".to_string()),
        HealthStatus::Unhealthy(reason) => (StatusCode::SERVICE_UNAVAILABLE, reason),
    }
}

pub async fn serve(port: u16) -> std::io::Result<()> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "health/metrics server listening");
    axum::serve(listener, app).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn healthz_reports_unhealthy_when_nothing_observed() {
        let response = healthz_handler().await.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn metrics_handler_returns_prometheus_text() {
        crate::metrics::init_metrics();
        let response = metrics_handler().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
