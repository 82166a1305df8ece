//! Keychain-backed session persistence for CLI profiles.

#[cfg(test)]
use std::collections::HashMap;
use std::path::PathBuf;
#[cfg(test)]
use std::sync::{Mutex, OnceLock};

#[cfg(not(test))]
use keyring::Entry;

use deepflect_core::storage::{FileStore, KeyValueStore};
use deepflect_core::util::normalize_text_option;
use deepflect_core::{ClientConfig, Error, Result, SessionManager};

/// Points the session at a JSON file instead of the OS keychain.
pub const SESSION_FILE_ENV: &str = "DEEPFLECT_SESSION_FILE";

#[cfg(not(test))]
const KEYRING_SERVICE_NAME: &str = "deepflect-cli";

/// Stores each session value as its own keychain entry, namespaced by
/// profile so profiles never share credentials.
#[derive(Debug, Clone)]
pub struct KeychainStore {
    profile_name: String,
}

impl KeychainStore {
    pub fn new(profile_name: &str) -> Self {
        Self {
            profile_name: profile_name.to_string(),
        }
    }

    fn username(&self, key: &str) -> String {
        format!("{}:{key}", self.profile_name)
    }

    #[cfg(test)]
    fn test_store() -> &'static Mutex<HashMap<String, String>> {
        static STORE: OnceLock<Mutex<HashMap<String, String>>> = OnceLock::new();
        STORE.get_or_init(|| Mutex::new(HashMap::new()))
    }

    #[cfg(not(test))]
    fn entry(&self, key: &str) -> Result<Entry> {
        Entry::new(KEYRING_SERVICE_NAME, &self.username(key))
            .map_err(|error| Error::Storage(error.to_string()))
    }
}

impl KeyValueStore for KeychainStore {
    #[cfg(not(test))]
    fn get(&self, key: &str) -> Result<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(Error::Storage(error.to_string())),
        }
    }

    #[cfg(test)]
    fn get(&self, key: &str) -> Result<Option<String>> {
        let guard = Self::test_store()
            .lock()
            .map_err(|error| Error::Storage(error.to_string()))?;
        Ok(guard.get(&self.username(key)).cloned())
    }

    #[cfg(not(test))]
    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entry(key)?
            .set_password(value)
            .map_err(|error| Error::Storage(error.to_string()))
    }

    #[cfg(test)]
    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut guard = Self::test_store()
            .lock()
            .map_err(|error| Error::Storage(error.to_string()))?;
        guard.insert(self.username(key), value.to_string());
        Ok(())
    }

    #[cfg(not(test))]
    fn remove(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(Error::Storage(error.to_string())),
        }
    }

    #[cfg(test)]
    fn remove(&self, key: &str) -> Result<()> {
        let mut guard = Self::test_store()
            .lock()
            .map_err(|error| Error::Storage(error.to_string()))?;
        guard.remove(&self.username(key));
        Ok(())
    }
}

/// Where a profile's session lives.
#[derive(Debug, Clone)]
pub enum SessionStore {
    Keychain(KeychainStore),
    File(FileStore),
}

impl SessionStore {
    /// A session file, when given, replaces the keychain for every profile.
    pub fn for_profile(profile_name: &str, session_file: Option<PathBuf>) -> Self {
        match session_file {
            Some(path) => Self::File(FileStore::new(path)),
            None => Self::Keychain(KeychainStore::new(profile_name)),
        }
    }

    pub fn from_env(profile_name: &str) -> Self {
        let session_file = normalize_text_option(std::env::var(SESSION_FILE_ENV).ok());
        Self::for_profile(profile_name, session_file.map(PathBuf::from))
    }
}

impl KeyValueStore for SessionStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match self {
            Self::Keychain(store) => store.get(key),
            Self::File(store) => store.get(key),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        match self {
            Self::Keychain(store) => store.set(key, value),
            Self::File(store) => store.set(key, value),
        }
    }

    fn remove(&self, key: &str) -> Result<()> {
        match self {
            Self::Keychain(store) => store.remove(key),
            Self::File(store) => store.remove(key),
        }
    }
}

/// Session for a profile, restored from the keychain or the session file.
pub fn session_for_profile(
    profile_name: &str,
    config: ClientConfig,
) -> Result<SessionManager<SessionStore>> {
    SessionManager::new(config, SessionStore::from_env(profile_name))
}

#[cfg(test)]
mod tests {
    use deepflect_core::storage::{TokenGrant, TokenStore};

    use super::*;

    #[test]
    fn profiles_do_not_share_values() {
        let work = KeychainStore::new("auth-test-work");
        let home = KeychainStore::new("auth-test-home");
        work.set("auth_token", "work-token").unwrap();

        assert_eq!(work.get("auth_token").unwrap().as_deref(), Some("work-token"));
        assert_eq!(home.get("auth_token").unwrap(), None);

        work.remove("auth_token").unwrap();
        work.remove("auth_token").unwrap();
        assert_eq!(work.get("auth_token").unwrap(), None);
    }

    #[test]
    fn token_store_round_trips_through_keychain() {
        let tokens = TokenStore::new(KeychainStore::new("auth-test-tokens"));
        tokens
            .save_grant(&TokenGrant {
                access_token: Some("access".to_string()),
                refresh_token: Some("refresh".to_string()),
                ..TokenGrant::default()
            })
            .unwrap();
        assert!(tokens.snapshot().unwrap().is_signed_in());

        tokens.clear().unwrap();
        assert!(!tokens.snapshot().unwrap().is_signed_in());
    }

    #[test]
    fn session_file_replaces_keychain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = SessionStore::for_profile("auth-test-file", Some(path.clone()));
        assert!(matches!(store, SessionStore::File(_)));
        store.set("auth_token", "file-token").unwrap();

        assert!(std::fs::read_to_string(&path).unwrap().contains("file-token"));
        assert_eq!(
            KeychainStore::new("auth-test-file").get("auth_token").unwrap(),
            None
        );

        let reopened = SessionStore::for_profile("auth-test-file", Some(path));
        assert_eq!(reopened.get("auth_token").unwrap().as_deref(), Some("file-token"));
    }

    #[test]
    fn keychain_is_the_default_store() {
        let store = SessionStore::for_profile("auth-test-default", None);
        assert!(matches!(store, SessionStore::Keychain(_)));
    }
}
