//! Server-held session table keyed by session ID.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use parking_lot::RwLock;
use rand::RngCore;
use serde::Serialize;

use crate::memory::clock::{Clock, SystemClock};
use crate::observability::metrics;
use crate::session::cookie::{new_cookie, RequestCookies, ResponseCookies};
use crate::session::options::Options;
use crate::session::value::Value;

/// Default cookie carrying the in-memory session ID.
pub const DEFAULT_COOKIE_NAME: &str = "WaypostSessionId";

/// Bytes of randomness behind each session ID.
const ID_BYTES: usize = 32;

#[derive(Debug, Clone)]
struct MemorySession {
    last_accessed: SystemTime,
    values: BTreeMap<String, Value>,
}

/// Public view of one record, for the admin API.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub idle_secs: u64,
    pub keys: usize,
}

/// Owns every in-memory session. One read/write lock guards the table.
///
/// Records idle for longer than `max_lifetime` are removed by [`gc`]. Run
/// it periodically with [`SessionManager::start_gc`].
///
/// [`gc`]: SessionManager::gc
pub struct SessionManager<C: Clock = SystemClock> {
    cookie_name: String,
    max_lifetime: Duration,
    sessions: RwLock<HashMap<String, MemorySession>>,
    clock: C,
}

impl SessionManager<SystemClock> {
    pub fn new(cookie_name: impl Into<String>, max_lifetime: Duration) -> Self {
        Self::with_clock(cookie_name, max_lifetime, SystemClock)
    }
}

impl<C: Clock> SessionManager<C> {
    pub fn with_clock(cookie_name: impl Into<String>, max_lifetime: Duration, clock: C) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            max_lifetime,
            sessions: RwLock::new(HashMap::new()),
            clock,
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn max_lifetime(&self) -> Duration {
        self.max_lifetime
    }

    /// Create a session and queue its ID cookie. The cookie lives as long as
    /// the manager's `max_lifetime`.
    pub fn start_session(&self, response: &mut ResponseCookies) -> String {
        let id = self.generate_id();
        let record = MemorySession {
            last_accessed: self.clock.now(),
            values: BTreeMap::new(),
        };

        let count = {
            let mut sessions = self.sessions.write();
            sessions.insert(id.clone(), record);
            sessions.len()
        };
        metrics::record_memory_sessions(count);

        let options = Options {
            max_age: i64::try_from(self.max_lifetime.as_secs()).unwrap_or(i64::MAX),
            http_only: true,
            ..Options::default()
        };
        response.set(new_cookie(&self.cookie_name, &id, &options));

        tracing::debug!(session = %short(&id), "Started in-memory session");
        id
    }

    /// The session ID carried by the request, if it names a live session.
    pub fn session_id(&self, cookies: &RequestCookies) -> Option<String> {
        let id = cookies.get(&self.cookie_name)?;
        self.sessions
            .read()
            .contains_key(id)
            .then(|| id.to_string())
    }

    /// Set one key on session `id`, creating the record when it does not
    /// exist. Other keys are left untouched.
    pub fn set_val(&self, id: &str, key: impl Into<String>, value: impl Into<Value>) {
        let now = self.clock.now();
        let mut sessions = self.sessions.write();
        let record = sessions
            .entry(id.to_string())
            .or_insert_with(|| MemorySession {
                last_accessed: now,
                values: BTreeMap::new(),
            });
        record.values.insert(key.into(), value.into());
        record.last_accessed = now;
    }

    pub fn get_val(&self, id: &str, key: &str) -> Option<Value> {
        self.sessions
            .read()
            .get(id)
            .and_then(|record| record.values.get(key).cloned())
    }

    pub fn last_access_time(&self, id: &str) -> Option<SystemTime> {
        self.sessions.read().get(id).map(|record| record.last_accessed)
    }

    /// Mark session `id` as used now. Returns false for unknown IDs.
    pub fn update_last_access(&self, id: &str) -> bool {
        let now = self.clock.now();
        match self.sessions.write().get_mut(id) {
            Some(record) => {
                record.last_accessed = now;
                true
            }
            None => false,
        }
    }

    /// Drop session `id` and queue a cookie that expires it on the client.
    pub fn end_session(&self, id: &str, response: &mut ResponseCookies) -> bool {
        let (removed, count) = {
            let mut sessions = self.sessions.write();
            (sessions.remove(id).is_some(), sessions.len())
        };
        metrics::record_memory_sessions(count);

        let options = Options {
            max_age: -1,
            http_only: true,
            ..Options::default()
        };
        response.set(new_cookie(&self.cookie_name, "", &options));
        removed
    }

    /// Remove every session idle for longer than `max_lifetime`. Returns the
    /// number evicted.
    pub fn gc(&self) -> usize {
        let now = self.clock.now();
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, record| {
            now.duration_since(record.last_accessed)
                .map(|idle| idle <= self.max_lifetime)
                .unwrap_or(true)
        });
        let evicted = before - sessions.len();
        let remaining = sessions.len();
        drop(sessions);

        metrics::record_memory_sessions(remaining);
        if evicted > 0 {
            metrics::record_memory_evictions(evicted);
        }
        tracing::debug!(evicted, remaining, "In-memory session sweep");
        evicted
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// A summary of every live session, IDs truncated.
    pub fn summaries(&self) -> Vec<SessionSummary> {
        let now = self.clock.now();
        let mut list: Vec<SessionSummary> = self
            .sessions
            .read()
            .iter()
            .map(|(id, record)| SessionSummary {
                id: short(id).to_string(),
                idle_secs: now
                    .duration_since(record.last_accessed)
                    .map(|d| d.as_secs())
                    .unwrap_or(0),
                keys: record.values.len(),
            })
            .collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        list
    }

    /// 32 random bytes, URL-safe base64. If the OS random source fails the
    /// ID falls back to the current time in nanoseconds, which is guessable.
    fn generate_id(&self) -> String {
        let mut bytes = [0u8; ID_BYTES];
        match rand::rngs::OsRng.try_fill_bytes(&mut bytes) {
            Ok(()) => URL_SAFE_NO_PAD.encode(bytes),
            Err(e) => {
                tracing::warn!(error = %e, "OS random source failed; using timestamp session id");
                let nanos = self
                    .clock
                    .now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_nanos())
                    .unwrap_or(0);
                nanos.to_string()
            }
        }
    }
}

impl<C: Clock> std::fmt::Debug for SessionManager<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("cookie_name", &self.cookie_name)
            .field("max_lifetime", &self.max_lifetime)
            .field("sessions", &self.len())
            .finish()
    }
}

fn short(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
