//! HTTP server setup.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::api::routes;
use crate::app::{AppContext, NewsError, Result};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub ctx: Arc<AppContext>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self {
            ctx,
            start_time: Instant::now(),
        }
    }
}

pub struct ApiServer {
    addr: String,
    state: AppState,
}

impl ApiServer {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        let addr = ctx.config.server.addr();
        Self {
            addr,
            state: AppState::new(ctx),
        }
    }

    /// Build the router with all middleware and routes.
    pub fn build_router(&self) -> Router {
        routes::create_router(self.state.clone()).layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
    }

    /// Serve until `shutdown` completes.
    pub async fn run<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = self
            .addr
            .parse()
            .map_err(|e| NewsError::Configuration(format!("Invalid address {}: {}", self.addr, e)))?;

        let listener = TcpListener::bind(addr).await?;
        tracing::info!("API server listening on http://{}", addr);

        axum::serve(listener, self.build_router())
            .with_graceful_shutdown(async move {
                shutdown.await;
                tracing::info!("API server shutting down...");
            })
            .await?;

        Ok(())
    }
}
