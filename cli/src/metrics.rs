use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use prometheus_client::encoding::text::encode;
use prometheus_client::registry::Registry;
use tracing::{error, info};

const CONTENT_TYPE_OPENMETRICS: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

/// Serves the Prometheus `/metrics` endpoint until the process exits.
pub async fn serve(listen_addr: SocketAddr, registry: Arc<Registry>) {
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(registry);

    let listener = match tokio::net::TcpListener::bind(listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(%listen_addr, error = %e, "Failed to bind metrics endpoint");
            return;
        }
    };

    info!(%listen_addr, "Serving metrics");

    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "Metrics endpoint terminated");
    }
}

async fn metrics_handler(State(registry): State<Arc<Registry>>) -> impl IntoResponse {
    let mut buf = String::new();

    match encode(&mut buf, &registry) {
        Ok(()) => ([(CONTENT_TYPE, CONTENT_TYPE_OPENMETRICS)], buf).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            ([(CONTENT_TYPE, "text/plain")], String::new()).into_response()
        }
    }
}
