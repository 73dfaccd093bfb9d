//! Named, cookie-backed sessions.
//!
//! # Data Flow
//! ```text
//! Request cookies (cookie.rs)
//!     → Registry::get(store, name) (registry.rs)
//!         → Store::new_session (cookie_store.rs | filesystem.rs)
//!             → SecureCodec::decode (codec.rs)
//!     → handler reads/writes Session values and flashes (state.rs)
//!     → Registry::save
//!         → Store::save → Set-Cookie on the response
//! ```
//!
//! # Design Decisions
//! - Payloads are signed with HMAC-SHA256 and optionally sealed with AES-256-GCM
//! - Several key pairs may be configured; the first encodes, all decode
//! - A session whose `max_age <= 0` is deleted on save
//! - Decode failures never fail the request: the client gets a fresh session

pub mod codec;
pub mod cookie;
pub mod cookie_store;
pub mod error;
pub mod filesystem;
pub mod id;
pub mod options;
pub mod registry;
pub mod state;
pub mod store;
pub mod value;

pub use codec::{CodecError, CodecSet, KeyPair, SecureCodec};
pub use cookie::{RequestCookies, ResponseCookies};
pub use cookie_store::CookieStore;
pub use error::{MultiError, SessionError};
pub use filesystem::FilesystemStore;
pub use options::Options;
pub use registry::{Registry, Resolved, SessionRef};
pub use state::Session;
pub use store::Store;
pub use value::{Value, Values};
