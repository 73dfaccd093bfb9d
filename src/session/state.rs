//! Named session state and flash messages.

use std::fmt;
use std::sync::Arc;

use crate::session::cookie::{RequestCookies, ResponseCookies};
use crate::session::error::SessionError;
use crate::session::options::Options;
use crate::session::store::Store;
use crate::session::value::{Value, Values};

/// Key used by [`Session::add_flash`] and [`Session::flashes`].
pub const DEFAULT_FLASH_KEY: &str = "_flash";

/// A named session.
pub struct Session {
    /// Backing ID for stores that keep the payload outside the cookie. Empty
    /// until the first save.
    pub id: String,

    /// The payload.
    pub values: Values,

    /// Cookie attributes, copied from the store when the session was created.
    pub options: Options,

    /// True until the session has been loaded from a valid cookie.
    pub is_new: bool,

    pub(crate) name: String,
    pub(crate) store: Option<Arc<dyn Store>>,
}

impl Session {
    /// Create an empty session bound to `store`.
    pub fn new(store: Option<Arc<dyn Store>>, name: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            values: Values::new(),
            options: Options::default(),
            is_new: true,
            name: name.into(),
            store,
        }
    }

    /// The name the session was registered under (its cookie name).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The store this session saves through.
    pub fn store(&self) -> Option<&Arc<dyn Store>> {
        self.store.as_ref()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// Append a flash message under the default key.
    pub fn add_flash(&mut self, value: impl Into<Value>) {
        self.add_flash_to(DEFAULT_FLASH_KEY, value);
    }

    /// Append a flash message under `key`.
    ///
    /// A non-list value already stored under `key` becomes the first entry of
    /// the list.
    pub fn add_flash_to(&mut self, key: &str, value: impl Into<Value>) {
        let mut flashes = match self.values.remove(key) {
            Some(Value::List(items)) => items,
            Some(other) => vec![other],
            None => Vec::new(),
        };
        flashes.push(value.into());
        self.values.insert(key.to_string(), Value::List(flashes));
    }

    /// Take the flash messages under the default key.
    pub fn flashes(&mut self) -> Vec<Value> {
        self.flashes_for(DEFAULT_FLASH_KEY)
    }

    /// Take the flash messages under `key`. They are removed from the session;
    /// a second call returns an empty list.
    pub fn flashes_for(&mut self, key: &str) -> Vec<Value> {
        match self.values.remove(key) {
            Some(Value::List(items)) => items,
            Some(other) => vec![other],
            None => Vec::new(),
        }
    }

    /// Save through the bound store.
    pub fn save(
        &mut self,
        cookies: &RequestCookies,
        response: &mut ResponseCookies,
    ) -> Result<(), SessionError> {
        let store = self
            .store
            .clone()
            .ok_or_else(|| SessionError::MissingStore(self.name.clone()))?;
        store.save(cookies, response, self)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("is_new", &self.is_new)
            .field("options", &self.options)
            .field("values", &self.values.len())
            .field("store", &self.store.as_ref().map(|s| s.kind()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flash_is_read_once() {
        let mut session = Session::new(None, "s");
        session.add_flash("x");

        assert_eq!(session.flashes(), vec![Value::from("x")]);
        assert!(session.flashes().is_empty());
    }

    #[test]
    fn test_flashes_are_per_key() {
        let mut session = Session::new(None, "s");
        session.add_flash_to("user_id", 1);
        session.add_flash_to("name", "hyl");
        session.add_flash_to("name", "again");

        assert_eq!(
            session.flashes_for("name"),
            vec![Value::from("hyl"), Value::from("again")]
        );
        assert!(session.flashes_for("name").is_empty());
        assert_eq!(session.flashes_for("user_id"), vec![Value::from(1)]);
        assert!(session.flashes().is_empty());
    }

    #[test]
    fn test_flash_wraps_scalar_value() {
        let mut session = Session::new(None, "s");
        session.insert("notice", "plain");
        session.add_flash_to("notice", "queued");

        assert_eq!(
            session.flashes_for("notice"),
            vec![Value::from("plain"), Value::from("queued")]
        );
    }

    #[test]
    fn test_save_without_store() {
        let mut session = Session::new(None, "orphan");
        let err = session
            .save(&RequestCookies::default(), &mut ResponseCookies::new())
            .unwrap_err();
        assert!(matches!(err, SessionError::MissingStore(name) if name == "orphan"));
    }
}
