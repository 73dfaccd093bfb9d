//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, dispatch fallback)
//!     → request.rs (request ID)
//!     → routing::RouteTable::dispatch (handler factory + params)
//!     → context.rs (Context: params, cookies, session registry)
//!     → handler.rs (init → prepare → method → render → finish)
//!     → Reply (status, body, Set-Cookie) → Send to client
//! ```

pub mod context;
pub mod handler;
pub mod request;
pub mod server;

pub use context::{Context, Reply, Services, COOKIE_STORE, FILESYSTEM_STORE};
pub use handler::{run_lifecycle, Handler, HandlerError, HandlerFactory, HandlerResult};
pub use request::{UuidRequestId, X_REQUEST_ID};
pub use server::{AppState, HttpServer, Routes, StartupError};
