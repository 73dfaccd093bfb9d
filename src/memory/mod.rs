//! In-memory session track.
//!
//! # Data Flow
//! ```text
//! Request cookie (WaypostSessionId)
//!     → SessionManager::session_id / start_session (manager.rs)
//!     → set_val / get_val under one RwLock
//!
//! Background (gc.rs):
//!     GcTask ticks every max_lifetime → SessionManager::gc → evict idle records
//! ```
//!
//! # Design Decisions
//! - Records live only in this process; nothing is replicated
//! - Time is read through a `Clock` (clock.rs) so sweeps can be tested without sleeping
//! - The sweep is an owned task with explicit start/stop

pub mod clock;
pub mod gc;
pub mod manager;

pub use clock::{Clock, ManualClock, SystemClock};
pub use gc::GcTask;
pub use manager::{SessionManager, SessionSummary, DEFAULT_COOKIE_NAME};
