//! Per-request session registry.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::observability::metrics;
use crate::session::cookie::{is_cookie_name_valid, RequestCookies, ResponseCookies};
use crate::session::error::{MultiError, SessionError};
use crate::session::state::Session;
use crate::session::store::Store;

/// Shared handle to a registered session.
pub type SessionRef = Arc<Mutex<Session>>;

/// Result of [`Registry::get`].
#[derive(Debug, Clone)]
pub struct Resolved {
    pub session: SessionRef,
    /// The error raised when the session was first created, if any. The
    /// session is still usable and starts out empty.
    pub error: Option<Arc<SessionError>>,
}

struct Entry {
    session: SessionRef,
    error: Option<Arc<SessionError>>,
}

/// Caches the sessions touched while handling one request so every lookup
/// by name returns the same instance, then saves them together.
pub struct Registry {
    cookies: RequestCookies,
    sessions: BTreeMap<String, Entry>,
}

impl Registry {
    pub fn new(cookies: RequestCookies) -> Self {
        Self {
            cookies,
            sessions: BTreeMap::new(),
        }
    }

    /// The request cookies the registry resolves sessions from.
    pub fn cookies(&self) -> &RequestCookies {
        &self.cookies
    }

    /// Return the session `name`, creating it through `store` on first use.
    ///
    /// Later calls with the same name return the cached session and the
    /// cached creation error. The session is rebound to `store` on each call.
    pub fn get(&mut self, store: Arc<dyn Store>, name: &str) -> Result<Resolved, SessionError> {
        if !is_cookie_name_valid(name) {
            return Err(SessionError::InvalidName(name.to_string()));
        }

        if let Some(entry) = self.sessions.get(name) {
            entry.session.lock().store = Some(store);
            return Ok(Resolved {
                session: entry.session.clone(),
                error: entry.error.clone(),
            });
        }

        let (mut session, error) = store.new_session(&self.cookies, name);
        session.name = name.to_string();
        session.store = Some(store);

        let entry = Entry {
            session: Arc::new(Mutex::new(session)),
            error: error.map(Arc::new),
        };
        let resolved = Resolved {
            session: entry.session.clone(),
            error: entry.error.clone(),
        };
        self.sessions.insert(name.to_string(), entry);
        Ok(resolved)
    }

    /// Names of the sessions resolved so far.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sessions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Save every registered session. A failure does not stop the others;
    /// all failures are returned together.
    ///
    /// Session locks are not reentrant. A session whose guard is still held
    /// by the caller is reported as [`SessionError::Locked`] and skipped.
    pub fn save(&self, response: &mut ResponseCookies) -> Result<(), MultiError> {
        let mut errors = MultiError::new();

        for (name, entry) in &self.sessions {
            let Some(mut session) = entry.session.try_lock() else {
                tracing::warn!(session = %name, "Session still locked at save");
                errors.push(SessionError::Locked(name.clone()));
                continue;
            };
            let Some(store) = session.store.clone() else {
                errors.push(SessionError::MissingStore(name.clone()));
                continue;
            };

            match store.save(&self.cookies, response, &mut session) {
                Ok(()) => metrics::record_session_save(store.kind(), "ok"),
                Err(e) => {
                    metrics::record_session_save(store.kind(), "error");
                    tracing::warn!(session = %name, store = store.kind(), error = %e, "Session save failed");
                    errors.push(SessionError::Save {
                        name: name.clone(),
                        source: Box::new(e),
                    });
                }
            }
        }

        errors.into_result()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("sessions", &self.sessions.keys().collect::<Vec<_>>())
            .finish()
    }
}
