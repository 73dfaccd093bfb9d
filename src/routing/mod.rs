//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Registration (at startup):
//!     pattern "/users/:id([0-9]+)"
//!     → matcher.rs (split, substitute captures, anchor, compile)
//!     → router.rs (append in registration order)
//!
//! Incoming Request (path, raw query)
//!     → router.rs (scan routes in order)
//!     → matcher.rs (full-path match, positional captures)
//!     → Return: RouteMatch { route, params, merged query } or None
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Deterministic: same input always matches same route
//! - First match wins (registration order, never specificity)
//! - A bad pattern is a startup failure, not a runtime one

pub mod matcher;
pub mod router;

pub use matcher::{RegistrationError, RoutePattern};
pub use router::{Route, RouteMatch, RouteTable};
