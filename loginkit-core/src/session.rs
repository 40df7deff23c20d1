//! The process-wide session and its durable record.

use std::str::FromStr;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::{
    error::LoginKitError,
    primitives::LedgerAddress,
    storage::{
        keys::{ALL_KEYS, USER_KEY},
        KeyValueStore,
    },
};

/// The authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, uniffi::Record)]
pub struct SessionUser {
    /// Ledger address the session is bound to, `0x`-prefixed hex.
    pub address: String,
}

/// What the rest of the application sees of the login state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, uniffi::Record)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Whether a user is logged in.
    pub is_authenticated: bool,
    /// The user, present exactly when authenticated.
    pub user: Option<SessionUser>,
}

impl Session {
    /// The logged-out state.
    #[must_use]
    pub const fn logged_out() -> Self {
        Self {
            is_authenticated: false,
            user: None,
        }
    }

    /// A session bound to `address`.
    #[must_use]
    pub fn authenticated(address: &LedgerAddress) -> Self {
        Self {
            is_authenticated: true,
            user: Some(SessionUser {
                address: address.to_string(),
            }),
        }
    }

    /// The bound address, if authenticated.
    #[must_use]
    pub fn address(&self) -> Option<&str> {
        self.user.as_ref().map(|user| user.address.as_str())
    }
}

/// Holds the current [`Session`] in memory and mirrors it to the durable store.
///
/// `persist` is the only writer of the user record and writes it in a single atomic
/// store operation, so a reader sees either the previous session or the new one.
pub struct SessionStore {
    store: Arc<dyn KeyValueStore>,
    current: RwLock<Session>,
}

impl SessionStore {
    /// Loads the stored session, falling back to logged out.
    pub fn init(store: Arc<dyn KeyValueStore>) -> Self {
        let session = read_stored(store.as_ref());
        Self {
            store,
            current: RwLock::new(session),
        }
    }

    /// Re-reads the stored session. Absent or malformed records give the logged-out
    /// state.
    pub fn load(&self) -> Session {
        let session = read_stored(self.store.as_ref());
        self.replace(session.clone());
        session
    }

    /// Records `address` as the logged-in user.
    ///
    /// # Errors
    /// `Storage` if the write fails; the in-memory session is unchanged then.
    pub fn persist(&self, address: &LedgerAddress) -> Result<Session, LoginKitError> {
        let session = Session::authenticated(address);
        let record = serde_json::to_string(&SessionUser {
            address: address.to_string(),
        })?;
        self.store.write_atomic(USER_KEY.to_string(), record)?;
        self.replace(session.clone());
        log::info!("session established for {address}");
        Ok(session)
    }

    /// Logs out: removes the user record together with any pending nonce and epoch.
    ///
    /// The in-memory session is logged out even when a delete fails.
    ///
    /// # Errors
    /// The first storage error encountered. Every key is still attempted.
    pub fn clear(&self) -> Result<(), LoginKitError> {
        self.replace(Session::logged_out());
        let mut first_error = None;
        for key in ALL_KEYS {
            if let Err(err) = self.store.delete(key.to_string()) {
                log::error!("failed to delete {key}: {err}");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), |err| Err(err.into()))
    }

    /// The current session.
    pub fn current(&self) -> Session {
        match self.current.read() {
            Ok(session) => session.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn replace(&self, session: Session) {
        match self.current.write() {
            Ok(mut current) => *current = session,
            Err(poisoned) => *poisoned.into_inner() = session,
        }
    }
}

fn read_stored(store: &dyn KeyValueStore) -> Session {
    let raw = match store.read(USER_KEY.to_string()) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Session::logged_out(),
        Err(err) => {
            log::warn!("could not read stored session: {err}");
            return Session::logged_out();
        }
    };

    let address = serde_json::from_str::<SessionUser>(&raw)
        .map_err(|e| e.to_string())
        .and_then(|user| LedgerAddress::from_str(&user.address));
    match address {
        Ok(address) => Session::authenticated(&address),
        Err(reason) => {
            log::warn!("ignoring malformed stored session: {reason}");
            Session::logged_out()
        }
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::storage::{keys::NONCE_KEY, MemoryStore};

    const ADDRESS: &str = "0x42dd208590e5958a16488cbc771dd324a4a5b0cd34eafaaf28e4ad351d36684f";

    fn address() -> LedgerAddress {
        LedgerAddress::from_str(ADDRESS).unwrap()
    }

    #[test]
    fn test_persist_then_reload() {
        let store = Arc::new(MemoryStore::new());
        let sessions = SessionStore::init(store.clone());
        assert_eq!(sessions.current(), Session::logged_out());

        let session = sessions.persist(&address()).unwrap();
        assert_eq!(session.address(), Some(ADDRESS));
        assert_eq!(
            store.read(USER_KEY.to_string()).unwrap().as_deref(),
            Some(format!(r#"{{"address":"{ADDRESS}"}}"#).as_str())
        );

        let reloaded = SessionStore::init(store);
        assert_eq!(reloaded.current(), session);
    }

    #[test_case("not json" ; "not json")]
    #[test_case(r#"{"name":"x"}"# ; "missing address")]
    #[test_case(r#"{"address":"0xTEST"}"# ; "bad address")]
    fn test_malformed_record_loads_logged_out(raw: &str) {
        let store = Arc::new(MemoryStore::new());
        store
            .write_atomic(USER_KEY.to_string(), raw.to_string())
            .unwrap();
        assert_eq!(SessionStore::init(store).load(), Session::logged_out());
    }

    #[test]
    fn test_clear_removes_every_key() {
        let store = Arc::new(MemoryStore::new());
        let sessions = SessionStore::init(store.clone());
        sessions.persist(&address()).unwrap();
        store
            .write_atomic(NONCE_KEY.to_string(), "n".to_string())
            .unwrap();

        sessions.clear().unwrap();
        assert!(store.is_empty().unwrap());
        assert_eq!(sessions.load(), Session::logged_out());
    }

    #[test]
    fn test_session_json_shape() {
        let json = serde_json::to_value(Session::authenticated(&address())).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "isAuthenticated": true, "user": { "address": ADDRESS } })
        );
    }
}
