//! Admin API.
//!
//! # Data Flow
//! ```text
//! GET /admin/* (separate listener)
//!     → auth.rs (Bearer api_key)
//!     → handlers.rs (status | routes | sessions) → JSON
//! ```

pub mod auth;
pub mod handlers;

use std::sync::Arc;
use std::time::Instant;

use axum::{middleware, routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::Routes;
use crate::http::Services;

/// State shared by the admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub routes: Arc<Routes>,
    pub services: Arc<Services>,
    pub api_key: Arc<str>,
    pub started_at: Instant,
}

impl AdminState {
    pub fn new(routes: Arc<Routes>, services: Arc<Services>, api_key: &str) -> Self {
        Self {
            routes,
            services,
            api_key: Arc::from(api_key),
            started_at: Instant::now(),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/routes", get(get_routes))
        .route("/admin/sessions", get(get_sessions))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ))
        .with_state(state)
}

/// Serve the admin API until `shutdown` fires.
pub async fn run_admin(
    listener: TcpListener,
    state: AdminState,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    tracing::info!(address = %listener.local_addr()?, "Admin API listening");
    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;
    tracing::info!("Admin API stopped");
    Ok(())
}
