use std::net::SocketAddr;

use axum::{http::StatusCode, routing::get, Router};
use log::{error, info};

pub fn router() -> Router {
    Router::new()
        .route("/", get(|| async { "Bot is alive" }))
        .route("/healthz", get(|| async { (StatusCode::OK, "ok") }))
}

/// Serves the reachability endpoint in the background. A bind failure is
/// logged and leaves the bot running.
pub fn spawn(addr: SocketAddr) {
    tokio::spawn(async move {
        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(err) => {
                error!("Keep-alive endpoint could not bind {addr}: {err}");
                return;
            }
        };
        info!("Keep-alive endpoint listening on {addr}");
        if let Err(err) = axum::serve(listener, router()).await {
            error!("Keep-alive endpoint stopped: {err}");
        }
    });
}
