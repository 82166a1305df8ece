use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

use super::KeyValueStore;
use crate::error::Result;
use crate::util::sanitize_token;

pub const ACCESS_TOKEN_KEY: &str = "auth_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const ACCESS_EXPIRES_KEY: &str = "access_expires_at";
pub const REFRESH_EXPIRES_KEY: &str = "refresh_expires_at";

const ALL_KEYS: [&str; 4] = [
    ACCESS_TOKEN_KEY,
    REFRESH_TOKEN_KEY,
    ACCESS_EXPIRES_KEY,
    REFRESH_EXPIRES_KEY,
];

/// Token payload returned by the login and refresh endpoints.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenGrant {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub access_token_expires_at: Option<String>,
    #[serde(default)]
    pub refresh_token_expires_at: Option<String>,
}

impl fmt::Debug for TokenGrant {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("TokenGrant")
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("access_token_expires_at", &self.access_token_expires_at)
            .field("refresh_token_expires_at", &self.refresh_token_expires_at)
            .finish()
    }
}

/// Point-in-time view of the persisted session.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct StoredSession {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub access_expires_at: Option<DateTime<Utc>>,
    pub refresh_expires_at: Option<DateTime<Utc>>,
}

impl StoredSession {
    pub const fn is_signed_in(&self) -> bool {
        self.access_token.is_some()
    }
}

impl fmt::Debug for StoredSession {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("StoredSession")
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("access_expires_at", &self.access_expires_at)
            .field("refresh_expires_at", &self.refresh_expires_at)
            .finish()
    }
}

/// Typed accessors for the four persisted session values.
#[derive(Debug, Clone)]
pub struct TokenStore<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> TokenStore<S> {
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    pub const fn inner(&self) -> &S {
        &self.store
    }

    pub fn access_token(&self) -> Result<Option<String>> {
        self.read_token(ACCESS_TOKEN_KEY)
    }

    pub fn refresh_token(&self) -> Result<Option<String>> {
        self.read_token(REFRESH_TOKEN_KEY)
    }

    pub fn access_expires_at(&self) -> Result<Option<DateTime<Utc>>> {
        self.read_instant(ACCESS_EXPIRES_KEY)
    }

    pub fn refresh_expires_at(&self) -> Result<Option<DateTime<Utc>>> {
        self.read_instant(REFRESH_EXPIRES_KEY)
    }

    pub fn snapshot(&self) -> Result<StoredSession> {
        Ok(StoredSession {
            access_token: self.access_token()?,
            refresh_token: self.refresh_token()?,
            access_expires_at: self.access_expires_at()?,
            refresh_expires_at: self.refresh_expires_at()?,
        })
    }

    /// Persists whichever tokens the grant carries; an absent token keeps its
    /// previous value. A stored token's expiry always belongs to that token,
    /// so a new token without an expiry drops the old one.
    pub fn save_grant(&self, grant: &TokenGrant) -> Result<()> {
        self.save_token(
            ACCESS_TOKEN_KEY,
            ACCESS_EXPIRES_KEY,
            grant.access_token.as_deref(),
            grant.access_token_expires_at.as_deref(),
        )?;
        self.save_token(
            REFRESH_TOKEN_KEY,
            REFRESH_EXPIRES_KEY,
            grant.refresh_token.as_deref(),
            grant.refresh_token_expires_at.as_deref(),
        )
    }

    fn save_token(
        &self,
        token_key: &str,
        expiry_key: &str,
        token: Option<&str>,
        expiry: Option<&str>,
    ) -> Result<()> {
        let Some(token) = token.map(sanitize_token).filter(|token| !token.is_empty()) else {
            return Ok(());
        };
        self.store.set(token_key, &token)?;
        match non_blank(expiry) {
            Some(expiry) => self.store.set(expiry_key, expiry),
            None => self.store.remove(expiry_key),
        }
    }

    /// Removes all four keys, attempting every removal even if one fails.
    pub fn clear(&self) -> Result<()> {
        let mut first_error = None;
        for key in ALL_KEYS {
            if let Err(error) = self.store.remove(key) {
                tracing::warn!("Failed to remove '{}' from session store: {}", key, error);
                first_error.get_or_insert(error);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn read_token(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .store
            .get(key)?
            .map(|raw| sanitize_token(&raw))
            .filter(|token| !token.is_empty()))
    }

    fn read_instant(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        let Some(raw) = self.store.get(key)? else {
            return Ok(None);
        };
        let parsed = parse_expiry(&raw);
        if parsed.is_none() {
            tracing::debug!("Ignoring unparseable '{}' value", key);
        }
        Ok(parsed)
    }
}

/// Parses an ISO-8601 instant. Values without an offset are taken as UTC.
pub fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::storage::MemoryStore;

    fn grant() -> TokenGrant {
        TokenGrant {
            access_token: Some(" t1 ".to_string()),
            refresh_token: Some("r1,\n".to_string()),
            access_token_expires_at: Some("2030-01-01T00:00:00Z".to_string()),
            refresh_token_expires_at: Some("2030-01-08T00:00:00Z".to_string()),
        }
    }

    #[test]
    fn save_grant_sanitizes_and_stores_all_four_values() {
        let tokens = TokenStore::new(MemoryStore::new());
        tokens.save_grant(&grant()).unwrap();

        let snapshot = tokens.snapshot().unwrap();
        assert_eq!(snapshot.access_token.as_deref(), Some("t1"));
        assert_eq!(snapshot.refresh_token.as_deref(), Some("r1"));
        assert_eq!(
            snapshot.access_expires_at,
            Some(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(
            snapshot.refresh_expires_at,
            Some(Utc.with_ymd_and_hms(2030, 1, 8, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn save_grant_keeps_absent_tokens_and_drops_stale_expiry() {
        let tokens = TokenStore::new(MemoryStore::new());
        tokens.save_grant(&grant()).unwrap();
        tokens
            .save_grant(&TokenGrant {
                access_token: Some("t2".to_string()),
                ..TokenGrant::default()
            })
            .unwrap();

        let snapshot = tokens.snapshot().unwrap();
        assert_eq!(snapshot.access_token.as_deref(), Some("t2"));
        assert_eq!(snapshot.access_expires_at, None);
        assert_eq!(snapshot.refresh_token.as_deref(), Some("r1"));
        assert!(snapshot.refresh_expires_at.is_some());
    }

    #[test]
    fn reads_sanitize_values_written_by_other_clients() {
        let store = MemoryStore::new();
        store.set(ACCESS_TOKEN_KEY, "a b,c").unwrap();
        store.set(REFRESH_TOKEN_KEY, " , ").unwrap();

        let tokens = TokenStore::new(store);
        assert_eq!(tokens.access_token().unwrap().as_deref(), Some("abc"));
        assert_eq!(tokens.refresh_token().unwrap(), None);
    }

    #[test]
    fn clear_removes_every_key() {
        let tokens = TokenStore::new(MemoryStore::new());
        tokens.save_grant(&grant()).unwrap();
        tokens.clear().unwrap();
        assert_eq!(tokens.snapshot().unwrap(), StoredSession::default());
    }

    #[test]
    fn parse_expiry_accepts_offsets_and_naive_values() {
        let expected = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_expiry("2030-01-01T09:00:00+09:00"), Some(expected));
        assert_eq!(parse_expiry("2030-01-01T00:00:00"), Some(expected));
        assert_eq!(parse_expiry("2030-01-01T00:00:00.000"), Some(expected));
        assert_eq!(parse_expiry("not a date"), None);
        assert_eq!(parse_expiry(""), None);
    }

    #[test]
    fn debug_output_redacts_tokens() {
        let rendered = format!("{:?}", grant());
        assert!(!rendered.contains("t1"));
        assert!(rendered.contains("[REDACTED]"));

        let tokens = TokenStore::new(MemoryStore::new());
        tokens.save_grant(&grant()).unwrap();
        let rendered = format!("{:?}", tokens.snapshot().unwrap());
        assert!(!rendered.contains("r1"));
    }
}
