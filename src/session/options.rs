//! Cookie attributes for a session.

use serde::{Deserialize, Serialize};

/// Default store lifetime: 30 days.
pub const DEFAULT_MAX_AGE: i64 = 86400 * 30;

/// Cookie attributes applied when a session is saved.
///
/// Stores hold a default `Options` and copy it into every session they create,
/// so changing a store's defaults never reaches sessions that already exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Cookie `Domain`. Empty means host-only.
    pub domain: String,

    /// Cookie `Path`.
    pub path: String,

    /// Lifetime in seconds.
    ///
    /// `0` omits `Max-Age` (browser-session cookie), `< 0` deletes the cookie
    /// immediately, `> 0` sets `Max-Age`. Saving a session whose `max_age` is
    /// `<= 0` deletes it.
    pub max_age: i64,

    /// Cookie `Secure` flag.
    pub secure: bool,

    /// Cookie `HttpOnly` flag.
    pub http_only: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            domain: String::new(),
            path: "/".to_string(),
            max_age: 0,
            secure: false,
            http_only: false,
        }
    }
}

impl Options {
    /// Defaults used by the bundled stores.
    pub fn store_defaults() -> Self {
        Self {
            max_age: DEFAULT_MAX_AGE,
            ..Self::default()
        }
    }

    /// True when saving with these options deletes the session.
    pub fn is_deletion(&self) -> bool {
        self.max_age <= 0
    }
}
