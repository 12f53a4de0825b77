mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::Extension,
    routing::{get, patch, post},
    Router,
};

use crate::api::{DynAPI, API};
use crate::error::{unexpected_error, Error};
use crate::server::handlers::{bids, members, requests, tracking, ws};

pub fn router(api: DynAPI) -> Router {
    Router::new()
        .route("/members", post(members::create))
        .route("/members/:id", get(members::find))
        .route("/requests", post(requests::create).get(requests::list))
        .route("/requests/:id", get(requests::find))
        .route("/requests/:id/status", patch(requests::update_status))
        .route("/requests/:id/reassign", patch(requests::reassign))
        .route(
            "/requests/:id/bids",
            post(bids::create).get(bids::list_for_request),
        )
        .route("/requests/:id/bids/:driver_id/accept", patch(bids::accept))
        .route(
            "/requests/:id/tracking",
            post(tracking::record).get(tracking::history),
        )
        .route("/requests/:id/tracking/latest", get(tracking::latest))
        .route("/drivers/:id/bids", get(bids::list_for_driver))
        .route("/ws", get(ws::connect))
        .layer(Extension(api))
}

pub async fn serve<T: API + Sync + Send + 'static>(api: T, addr: SocketAddr) -> Result<(), Error> {
    let api = Arc::new(api) as DynAPI;
    let app = router(api.clone());

    tracing::info!("listening on {}", addr);

    let result = axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await;

    api.hub().shutdown().await;

    result.map_err(|err| {
        tracing::error!(?err, "server failed");
        unexpected_error()
    })
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(?err, "unable to listen for shutdown signal");
        futures::future::pending::<()>().await;
    }

    tracing::info!("shutting down");
}
