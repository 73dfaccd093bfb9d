//! The store abstraction shared by cookie and filesystem persistence.

use std::fmt;

use crate::session::cookie::{RequestCookies, ResponseCookies};
use crate::session::error::SessionError;
use crate::session::state::Session;

/// Persistence policy for sessions.
///
/// Implementations must be safe to share between request workers.
pub trait Store: Send + Sync + fmt::Debug {
    /// Short label used in logs and metrics.
    fn kind(&self) -> &'static str;

    /// Create the session `name` for this request.
    ///
    /// A session is always returned. When the request carries a cookie named
    /// `name` it is decoded; on success the session has `is_new == false`. On
    /// any failure a fresh session (`is_new == true`) is returned together
    /// with the error, so the caller can carry on treating the client as new.
    fn new_session(&self, cookies: &RequestCookies, name: &str) -> (Session, Option<SessionError>);

    /// Persist `session` and queue its cookie on `response`.
    ///
    /// When `session.options.max_age <= 0` the session is deleted instead:
    /// backing state is purged and an expiring cookie with an empty value is
    /// queued.
    fn save(
        &self,
        cookies: &RequestCookies,
        response: &mut ResponseCookies,
        session: &mut Session,
    ) -> Result<(), SessionError>;
}
