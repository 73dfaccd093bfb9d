//! Store that keeps the whole session payload in a signed cookie.

use crate::observability::metrics;
use crate::session::codec::{CodecError, CodecSet, KeyPair};
use crate::session::cookie::{new_cookie, RequestCookies, ResponseCookies};
use crate::session::error::SessionError;
use crate::session::options::Options;
use crate::session::state::Session;
use crate::session::store::Store;
use crate::session::value::Values;

/// Session values are serialized, signed (and optionally encrypted) into the
/// cookie value itself. Nothing is kept on the server.
///
/// Browsers cap a cookie at about 4 KB. The store does not enforce that
/// limit; keeping payloads small is the caller's job.
#[derive(Debug)]
pub struct CookieStore {
    codecs: CodecSet,
    options: Options,
}

impl CookieStore {
    /// Build a store from key pairs, newest first. Only the first pair is used
    /// to encode; every pair is tried when decoding.
    pub fn new(keys: &[KeyPair]) -> Result<Self, CodecError> {
        let mut store = Self {
            codecs: CodecSet::from_pairs(keys)?,
            options: Options::default(),
        };
        store.set_max_age(Options::store_defaults().max_age);
        Ok(store)
    }

    /// Replace the default options. The codec max-age follows
    /// `options.max_age`.
    pub fn with_options(mut self, options: Options) -> Self {
        let max_age = options.max_age;
        self.options = options;
        self.set_max_age(max_age);
        self
    }

    /// Default options copied into each new session.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Mutable access to the defaults. Sessions created earlier are unaffected.
    pub fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }

    /// Set the cookie max-age and the maximum token age accepted on decode.
    pub fn set_max_age(&mut self, max_age: i64) {
        self.options.max_age = max_age;
        self.codecs.set_max_age(max_age);
    }
}

impl Store for CookieStore {
    fn kind(&self) -> &'static str {
        "cookie"
    }

    fn new_session(&self, cookies: &RequestCookies, name: &str) -> (Session, Option<SessionError>) {
        let mut session = Session::new(None, name);
        session.options = self.options.clone();

        let Some(token) = cookies.get(name) else {
            return (session, None);
        };

        match self.codecs.decode::<Values>(name, token) {
            Ok(values) => {
                session.values = values;
                session.is_new = false;
                (session, None)
            }
            Err(e) => {
                tracing::debug!(session = %name, error = %e, "Discarding undecodable session cookie");
                metrics::record_session_decode_failure(e.kind());
                (session, Some(e.into()))
            }
        }
    }

    fn save(
        &self,
        _cookies: &RequestCookies,
        response: &mut ResponseCookies,
        session: &mut Session,
    ) -> Result<(), SessionError> {
        if session.options.is_deletion() {
            response.set(new_cookie(session.name(), "", &session.options));
            return Ok(());
        }

        let encoded = self.codecs.encode(session.name(), &session.values)?;
        response.set(new_cookie(session.name(), &encoded, &session.options));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn store() -> CookieStore {
        CookieStore::new(&[KeyPair::generate(true)]).unwrap()
    }

    #[test]
    fn test_defaults() {
        let store = store();
        assert_eq!(store.options().path, "/");
        assert_eq!(store.options().max_age, 86400 * 30);
    }

    #[test]
    fn test_options_are_copied_per_session() {
        let mut store = store();
        let cookies = RequestCookies::default();

        let (mut first, err) = store.new_session(&cookies, "hello world");
        assert!(err.is_none());
        first.options.path = "/foo".to_string();

        assert_eq!(store.options().path, "/");
        let (second, _) = store.new_session(&cookies, "hello world");
        assert_eq!(second.options.path, "/");

        store.options_mut().path = "/bar".to_string();
        assert_eq!(first.options.path, "/foo");
        assert_eq!(second.options.path, "/");
    }

    #[test]
    fn test_save_then_load() {
        let store = store();
        let (mut session, _) = store.new_session(&RequestCookies::default(), "sess");
        assert!(session.is_new);
        session.insert("user", "ana");
        session.insert("visits", 3i64);

        let mut response = ResponseCookies::new();
        store
            .save(&RequestCookies::default(), &mut response, &mut session)
            .unwrap();
        let cookie = response.get("sess").unwrap();
        assert!(!cookie.value().is_empty());

        let request = RequestCookies::from_pairs([("sess", cookie.value())]);
        let (loaded, err) = store.new_session(&request, "sess");
        assert!(err.is_none());
        assert!(!loaded.is_new);
        assert_eq!(loaded.get("user").and_then(|v| v.as_str()), Some("ana"));
        assert_eq!(loaded.get("visits").and_then(|v| v.as_i64()), Some(3));
    }

    #[test]
    fn test_non_finite_float_fails_to_save() {
        let store = store();
        let (mut session, _) = store.new_session(&RequestCookies::default(), "sess");
        session.insert("ratio", f64::NAN);

        let mut response = ResponseCookies::new();
        let err = store
            .save(&RequestCookies::default(), &mut response, &mut session)
            .unwrap_err();
        assert!(matches!(err.codec(), Some(CodecError::Encode(_))));
        assert!(response.get("sess").is_none());
    }

    #[test]
    fn test_bad_cookie_yields_fresh_session_and_error() {
        let store = store();
        let request = RequestCookies::from_pairs([("sess", "garbage")]);
        let (session, err) = store.new_session(&request, "sess");
        assert!(session.is_new);
        assert!(session.values.is_empty());
        assert!(err.unwrap().codec().is_some());
    }

    #[test]
    fn test_other_keys_cannot_read_cookie() {
        let a = store();
        let b = store();
        let (mut session, _) = a.new_session(&RequestCookies::default(), "sess");
        session.insert("k", "v");
        let mut response = ResponseCookies::new();
        a.save(&RequestCookies::default(), &mut response, &mut session)
            .unwrap();

        let request = RequestCookies::from_pairs([("sess", response.get("sess").unwrap().value())]);
        let (loaded, err) = b.new_session(&request, "sess");
        assert!(loaded.is_new);
        assert_eq!(err.unwrap().codec(), Some(&CodecError::Integrity));
    }

    #[test]
    fn test_negative_max_age_deletes_cookie() {
        let store = store();
        let (mut session, _) = store.new_session(&RequestCookies::default(), "sess");
        session.insert("k", "v");
        session.options.max_age = -1;

        let mut response = ResponseCookies::new();
        store
            .save(&RequestCookies::default(), &mut response, &mut session)
            .unwrap();
        let cookie = response.get("sess").unwrap();
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(cookie::time::Duration::ZERO));
    }

    #[test]
    fn test_session_save_through_bound_store() {
        let store: Arc<dyn Store> = Arc::new(store());
        let (mut session, _) = store.new_session(&RequestCookies::default(), "sess");
        session.store = Some(store.clone());
        session.insert("k", "v");

        let mut response = ResponseCookies::new();
        session
            .save(&RequestCookies::default(), &mut response)
            .unwrap();
        assert_eq!(response.len(), 1);
    }
}
