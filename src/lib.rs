//! waypost: pattern-routed request dispatch with signed cookie sessions.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server ──▶ routing::RouteTable ──▶ http::handler
//!                       (axum,          (first match wins,      (fresh handler,
//!                        request id)     params + query)         lifecycle stages)
//!                                                                     │
//!                                                                     ▼
//!                                                         session::Registry
//!                                                       ┌────────┴────────┐
//!                                                  CookieStore     FilesystemStore
//!                                                       └──── SecureCodec ─┘
//!     Client Response
//!     ◀────────────── Reply + Set-Cookie
//!
//!     memory::SessionManager ── GcTask (periodic sweep)
//!     admin (bearer-auth JSON API), config, observability, lifecycle
//! ```

// Core subsystems
pub mod http;
pub mod routing;
pub mod session;

// Alternate session track
pub mod memory;

// Demo application
pub mod demo;

// Cross-cutting concerns
pub mod admin;
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::schema::AppConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
