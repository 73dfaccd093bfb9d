//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Build stores and routes → Start listeners
//!
//! Shutdown (shutdown.rs):
//!     Ctrl-C / SIGTERM → Shutdown::trigger
//!         → HTTP server stops accepting and drains
//!         → Admin server exits
//!         → Session sweep (GcTask) exits
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
