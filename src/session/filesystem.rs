//! Store that keeps session payloads in files and only the ID in the cookie.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::observability::metrics;
use crate::session::codec::{CodecError, CodecSet, KeyPair};
use crate::session::cookie::{new_cookie, RequestCookies, ResponseCookies};
use crate::session::error::SessionError;
use crate::session::id;
use crate::session::options::Options;
use crate::session::state::Session;
use crate::session::store::Store;
use crate::session::value::Values;

/// Prefix of every session file name.
pub const FILE_PREFIX: &str = "session_";

/// Serializes file access across every filesystem store in the process.
static FILE_LOCK: Mutex<()> = parking_lot::const_mutex(());

/// Session payloads are encoded with the store's codecs and written to
/// `<directory>/session_<ID>`. The cookie carries only the encoded ID.
#[derive(Debug)]
pub struct FilesystemStore {
    codecs: CodecSet,
    options: Options,
    directory: PathBuf,
}

impl FilesystemStore {
    /// Build a store writing into `directory`. An empty path selects the
    /// system temporary directory.
    pub fn new(directory: impl Into<PathBuf>, keys: &[KeyPair]) -> Result<Self, CodecError> {
        let mut directory = directory.into();
        if directory.as_os_str().is_empty() {
            directory = std::env::temp_dir();
        }
        let mut store = Self {
            codecs: CodecSet::from_pairs(keys)?,
            options: Options::default(),
            directory,
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

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }

    /// Set the cookie max-age and the maximum token age accepted on decode.
    pub fn set_max_age(&mut self, max_age: i64) {
        self.options.max_age = max_age;
        self.codecs.set_max_age(max_age);
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of the file backing session `id`.
    pub fn file_path(&self, id: &str) -> PathBuf {
        self.directory.join(format!("{}{}", FILE_PREFIX, id))
    }

    fn load(&self, session: &mut Session) -> Result<(), SessionError> {
        let path = self.file_path(&session.id);
        let contents = {
            let _guard = FILE_LOCK.lock();
            fs::read_to_string(&path).map_err(|source| SessionError::Persistence {
                path: path.clone(),
                source,
            })?
        };
        session.values = self.codecs.decode::<Values>(session.name(), &contents)?;
        Ok(())
    }

    fn write(&self, session: &Session) -> Result<(), SessionError> {
        let encoded = self.codecs.encode(session.name(), &session.values)?;
        let path = self.file_path(&session.id);

        let _guard = FILE_LOCK.lock();
        write_private(&path, encoded.as_bytes())
            .map_err(|source| SessionError::Persistence { path, source })
    }

    fn erase(&self, session: &Session) -> Result<(), SessionError> {
        let path = self.file_path(&session.id);
        let _guard = FILE_LOCK.lock();
        fs::remove_file(&path).map_err(|source| SessionError::Persistence { path, source })
    }
}

impl Store for FilesystemStore {
    fn kind(&self) -> &'static str {
        "filesystem"
    }

    fn new_session(&self, cookies: &RequestCookies, name: &str) -> (Session, Option<SessionError>) {
        let mut session = Session::new(None, name);
        session.options = self.options.clone();

        let Some(token) = cookies.get(name) else {
            return (session, None);
        };

        let loaded = self
            .codecs
            .decode::<String>(name, token)
            .map_err(SessionError::from)
            .and_then(|id| {
                if !id::is_valid_id(&id) {
                    return Err(CodecError::Format("malformed session id".to_string()).into());
                }
                session.id = id;
                self.load(&mut session)
            });

        match loaded {
            Ok(()) => {
                session.is_new = false;
                (session, None)
            }
            Err(e) => {
                tracing::debug!(session = %name, error = %e, "Starting fresh filesystem session");
                if let Some(codec) = e.codec() {
                    metrics::record_session_decode_failure(codec.kind());
                }
                // Keep the ID so the next save overwrites the stale file.
                session.values = Values::new();
                (session, Some(e))
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
            if session.id.is_empty() {
                return Ok(());
            }
            return self.erase(session);
        }

        if session.id.is_empty() {
            session.id = id::generate_id();
        }
        self.write(session)?;

        let encoded = self.codecs.encode(session.name(), &session.id)?;
        response.set(new_cookie(session.name(), &encoded, &session.options));
        Ok(())
    }
}

/// Create or truncate `path` with owner-only permissions and write `data`.
fn write_private(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut open = fs::OpenOptions::new();
    open.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        open.mode(0o600);
    }
    let mut file = open.open(path)?;
    file.write_all(data)?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &Path) -> FilesystemStore {
        FilesystemStore::new(dir, &[KeyPair::generate(false)]).unwrap()
    }

    fn save(store: &FilesystemStore, session: &mut Session) -> ResponseCookies {
        let mut response = ResponseCookies::new();
        store
            .save(&RequestCookies::default(), &mut response, session)
            .unwrap();
        response
    }

    #[test]
    fn test_empty_directory_selects_temp_dir() {
        let store = FilesystemStore::new("", &[KeyPair::generate(false)]).unwrap();
        assert_eq!(store.directory(), std::env::temp_dir().as_path());
    }

    #[test]
    fn test_save_writes_prefixed_file_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        let (mut session, err) = store.new_session(&RequestCookies::default(), "fs");
        assert!(err.is_none());
        assert!(session.id.is_empty());
        session.insert("cart", 2i64);

        let response = save(&store, &mut session);
        assert!(!session.id.is_empty());
        let path = store.file_path(&session.id);
        assert!(path.exists());
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("session_"));

        let token = response.get("fs").unwrap().value().to_string();
        let request = RequestCookies::from_pairs([("fs", token)]);
        let (loaded, err) = store.new_session(&request, "fs");
        assert!(err.is_none());
        assert!(!loaded.is_new);
        assert_eq!(loaded.id, session.id);
        assert_eq!(loaded.get("cart").and_then(|v| v.as_i64()), Some(2));
    }

    #[test]
    fn test_id_is_stable_across_saves() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let (mut session, _) = store.new_session(&RequestCookies::default(), "fs");
        save(&store, &mut session);
        let first = session.id.clone();
        session.insert("k", "v");
        save(&store, &mut session);
        assert_eq!(session.id, first);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_session_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let (mut session, _) = store.new_session(&RequestCookies::default(), "fs");
        save(&store, &mut session);

        let mode = fs::metadata(store.file_path(&session.id))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_delete_removes_file_and_expires_cookie() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let (mut session, _) = store.new_session(&RequestCookies::default(), "fs");
        session.insert("k", "v");
        save(&store, &mut session);
        let path = store.file_path(&session.id);
        assert!(path.exists());

        session.options.max_age = -1;
        let response = save(&store, &mut session);
        assert!(!path.exists());
        let cookie = response.get("fs").unwrap();
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(cookie::time::Duration::ZERO));
    }

    #[test]
    fn test_delete_missing_file_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let (mut session, _) = store.new_session(&RequestCookies::default(), "fs");
        session.id = id::generate_id();
        session.options.max_age = -1;

        let mut response = ResponseCookies::new();
        let err = store
            .save(&RequestCookies::default(), &mut response, &mut session)
            .unwrap_err();
        assert!(matches!(err, SessionError::Persistence { .. }));
        assert_eq!(response.len(), 1);
    }

    #[test]
    fn test_missing_file_yields_fresh_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let (mut session, _) = store.new_session(&RequestCookies::default(), "fs");
        let response = save(&store, &mut session);
        fs::remove_file(store.file_path(&session.id)).unwrap();

        let request = RequestCookies::from_pairs([("fs", response.get("fs").unwrap().value())]);
        let (loaded, err) = store.new_session(&request, "fs");
        assert!(loaded.is_new);
        assert!(matches!(err, Some(SessionError::Persistence { .. })));
    }

    #[test]
    fn test_options_are_copied_per_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let (mut first, _) = store.new_session(&RequestCookies::default(), "hello world");
        first.options.path = "/foo".to_string();

        let (second, _) = store.new_session(&RequestCookies::default(), "hello world");
        assert_eq!(store.options().path, "/");
        assert_eq!(second.options.path, "/");
    }
}
