//! Per-request context handed to handlers.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::header::{CONTENT_TYPE, HeaderName};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::http::handler::HandlerError;
use crate::memory::SessionManager;
use crate::session::cookie::{RequestCookies, ResponseCookies};
use crate::session::error::{MultiError, SessionError};
use crate::session::registry::{Registry, Resolved};
use crate::session::store::Store;

/// Key of the cookie store in [`Services::stores`].
pub const COOKIE_STORE: &str = "cookie";

/// Key of the filesystem store in [`Services::stores`].
pub const FILESYSTEM_STORE: &str = "filesystem";

/// Process-wide collaborators shared by every request.
#[derive(Debug, Default)]
pub struct Services {
    pub stores: HashMap<String, Arc<dyn Store>>,
    pub memory: Option<Arc<SessionManager>>,
}

impl Services {
    pub fn store(&self, key: &str) -> Option<Arc<dyn Store>> {
        self.stores.get(key).cloned()
    }
}

/// Everything a handler sees about one request, plus the reply it builds.
pub struct Context {
    pub method: Method,
    pub path: String,
    /// Route parameters by name.
    pub params: BTreeMap<String, String>,
    /// Route parameters followed by the request's own query pairs.
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub request_id: String,
    pub reply: Reply,
    sessions: Registry,
    services: Arc<Services>,
}

impl Context {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        method: Method,
        path: String,
        params: BTreeMap<String, String>,
        query: Vec<(String, String)>,
        headers: HeaderMap,
        body: Bytes,
        request_id: String,
        services: Arc<Services>,
    ) -> Self {
        let cookies = RequestCookies::from_headers(&headers);
        Self {
            method,
            path,
            params,
            query,
            headers,
            body,
            request_id,
            reply: Reply::default(),
            sessions: Registry::new(cookies),
            services,
        }
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// First value for `name` in the merged query.
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn cookies(&self) -> &RequestCookies {
        self.sessions.cookies()
    }

    pub fn services(&self) -> &Arc<Services> {
        &self.services
    }

    /// The in-memory session manager, if enabled.
    pub fn memory(&self) -> Option<Arc<SessionManager>> {
        self.services.memory.clone()
    }

    /// Resolve session `name` through the store configured under
    /// `store_key`. Repeated calls return the same session.
    pub fn session(&mut self, store_key: &str, name: &str) -> Result<Resolved, SessionError> {
        let store = self
            .services
            .store(store_key)
            .ok_or_else(|| SessionError::UnknownStore(store_key.to_string()))?;
        self.sessions.get(store, name)
    }

    /// Save every session resolved so far; cookies go on the reply.
    ///
    /// Drop any session guard before calling this. A session that is still
    /// locked is not saved and comes back as an error.
    pub fn save_sessions(&mut self) -> Result<(), MultiError> {
        self.sessions.save(&mut self.reply.cookies)
    }

    /// Names of the sessions touched by this request.
    pub fn session_names(&self) -> Vec<String> {
        self.sessions.names().map(str::to_string).collect()
    }

    #[cfg(test)]
    pub(crate) fn for_test(method: Method, path: &str, services: Arc<Services>) -> Self {
        Self::new(
            method,
            path.to_string(),
            BTreeMap::new(),
            Vec::new(),
            HeaderMap::new(),
            Bytes::new(),
            "test".to_string(),
            services,
        )
    }
}

/// The response a handler builds.
#[derive(Debug)]
pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    pub cookies: ResponseCookies,
}

impl Default for Reply {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
            cookies: ResponseCookies::new(),
        }
    }
}

impl Reply {
    /// Replace the body with plain text.
    pub fn text(&mut self, body: impl Into<String>) {
        self.body = body.into().into_bytes();
        self.headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
    }

    /// Replace the body with `value` as JSON.
    pub fn json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), HandlerError> {
        self.body = serde_json::to_vec(value).map_err(|e| HandlerError::Internal(e.to_string()))?;
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(())
    }

    pub fn set_header(&mut self, name: HeaderName, value: &str) -> Result<(), HandlerError> {
        let value = HeaderValue::from_str(value).map_err(|e| HandlerError::Internal(e.to_string()))?;
        self.headers.insert(name, value);
        Ok(())
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        self.cookies.apply_to(response.headers_mut());
        response
    }
}

#[cfg(test)]
mod tests {
    use axum::http::header::SET_COOKIE;

    use super::*;
    use crate::session::codec::KeyPair;
    use crate::session::cookie_store::CookieStore;

    fn services() -> Arc<Services> {
        let mut stores: HashMap<String, Arc<dyn Store>> = HashMap::new();
        stores.insert(
            COOKIE_STORE.to_string(),
            Arc::new(CookieStore::new(&[KeyPair::generate(false)]).unwrap()),
        );
        Arc::new(Services {
            stores,
            memory: None,
        })
    }

    #[test]
    fn test_session_lookup_and_save() {
        let mut ctx = Context::for_test(Method::GET, "/", services());
        let first = ctx.session(COOKIE_STORE, "app").unwrap();
        first.session.lock().insert("k", "v");
        let again = ctx.session(COOKIE_STORE, "app").unwrap();
        assert!(Arc::ptr_eq(&first.session, &again.session));

        ctx.save_sessions().unwrap();
        assert!(ctx.reply.cookies.get("app").is_some());
        assert_eq!(ctx.session_names(), vec!["app".to_string()]);
    }

    #[test]
    fn test_unknown_store() {
        let mut ctx = Context::for_test(Method::GET, "/", services());
        let err = ctx.session("redis", "app").unwrap_err();
        assert!(matches!(err, SessionError::UnknownStore(_)));
    }

    #[test]
    fn test_reply_into_response_sets_cookies() {
        let mut ctx = Context::for_test(Method::GET, "/", services());
        ctx.session(COOKIE_STORE, "app").unwrap();
        ctx.save_sessions().unwrap();
        ctx.reply.text("hello");

        let response = ctx.reply.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get_all(SET_COOKIE).iter().count(), 1);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
    }

    #[test]
    fn test_query_lookup_prefers_first_value() {
        let mut ctx = Context::for_test(Method::GET, "/", services());
        ctx.query = vec![
            ("id".to_string(), "route".to_string()),
            ("id".to_string(), "query".to_string()),
        ];
        assert_eq!(ctx.query_value("id"), Some("route"));
        assert_eq!(ctx.query_value("missing"), None);
    }
}
