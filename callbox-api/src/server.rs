use anyhow::{Context, Result};
use axum::{
    extract::Extension,
    middleware,
    routing::{get, post},
    Router,
};
use callbox_core::GateContext;
use std::net::SocketAddr;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing;

use crate::admin;
use crate::handlers;
use crate::network;
use crate::pages;

pub fn router(ctx: GateContext) -> Router {
    Router::new()
        .route("/", get(pages::index))
        .route("/status", get(pages::status))
        .route("/health", get(handlers::health))
        .route(
            "/webhook/voice",
            get(handlers::voice_webhook).post(handlers::voice_webhook),
        )
        .route(
            "/webhook/sms",
            get(handlers::sms_webhook).post(handlers::sms_webhook),
        )
        .route(
            "/admin/snooze",
            post(admin::set_snooze).route_layer(middleware::from_fn(network::local_only)),
        )
        .route("/admin/test-sms", post(admin::test_sms))
        .route("/admin/call-logs", get(admin::call_logs))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(Extension(ctx)),
        )
}

pub async fn run(ctx: GateContext) -> Result<()> {
    let host = ctx.config.server.host.clone();
    let port = ctx.config.server.port;
    let app = router(ctx);

    let listener = tokio::net::TcpListener::bind((host.as_str(), port))
        .await
        .with_context(|| format!("failed to bind {}:{}", host, port))?;
    tracing::info!("Starting API server on {}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
