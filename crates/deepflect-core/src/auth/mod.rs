//! Account API client and session lifecycle.
//!
//! `SessionManager` owns the persisted access/refresh tokens: it stores them
//! on login, refreshes them proactively inside the skew window or after a
//! 401, and tears the session down on logout and account deletion. Refreshes
//! are single-flight: callers that observed the same session generation share
//! one refresh request.

mod validation;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

pub use validation::{
    validate_email, validate_login, validate_password, validate_password_confirmation,
    validate_sign_up, MIN_PASSWORD_LENGTH,
};

use crate::client::AuthorizedClient;
use crate::config::ClientConfig;
use crate::error::{server_error, Error, Result};
use crate::storage::{KeyValueStore, StoredSession, TokenGrant, TokenStore};
use crate::util::sanitize_token;

const REGISTER_ROUTE: &str = "/api/v1/auth/register";
const LOGIN_ROUTE: &str = "/api/v1/auth/login";
const USER_ROUTE: &str = "/api/v1/auth/user";
const REFRESH_ROUTE: &str = "/api/v1/auth/refresh";
const LOGOUT_ROUTE: &str = "/api/v1/auth/logout";
const QUIT_ROUTE: &str = "/api/v1/auth/quit";
const PASSWORD_RESET_ROUTE: &str = "/api/v1/auth/password-reset";

pub(crate) const LOGIN_REQUIRED: &str = "Login required";
pub(crate) const SESSION_EXPIRED: &str = "Your session has expired; please log in again";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub email: String,
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Serialize)]
struct PasswordResetRequest<'a> {
    email: &'a str,
}

/// Process-wide session context.
///
/// Cheap to clone; clones share the token store, HTTP client and refresh gate.
#[derive(Clone)]
pub struct SessionManager<S: KeyValueStore> {
    inner: Arc<SessionInner<S>>,
}

struct SessionInner<S: KeyValueStore> {
    config: ClientConfig,
    http: Client,
    tokens: TokenStore<S>,
    refresh_gate: Mutex<()>,
    generation: AtomicU64,
}

impl<S: KeyValueStore> SessionManager<S> {
    pub fn new(config: ClientConfig, store: S) -> Result<Self> {
        let http = Client::builder().build()?;
        Ok(Self::with_http_client(config, store, http))
    }

    pub fn with_http_client(config: ClientConfig, store: S, http: Client) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                config,
                http,
                tokens: TokenStore::new(store),
                refresh_gate: Mutex::new(()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn tokens(&self) -> &TokenStore<S> {
        &self.inner.tokens
    }

    pub(crate) fn http(&self) -> &Client {
        &self.inner.http
    }

    /// Reads the persisted session as it stands right now.
    pub fn snapshot(&self) -> Result<StoredSession> {
        self.tokens().snapshot()
    }

    /// Counter bumped every time the stored tokens change.
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::Acquire)
    }

    /// Request wrapper that attaches this session's bearer token.
    pub fn authorized(&self) -> AuthorizedClient<S> {
        AuthorizedClient::new(self.clone())
    }

    pub async fn register(&self, email: &str, password: &str) -> Result<()> {
        validate_email(email)?;
        validate_password(password)?;

        let response = self
            .http()
            .post(self.config().endpoint(REGISTER_ROUTE))
            .json(&Credentials {
                email: email.trim(),
                password,
            })
            .send()
            .await?;
        ensure_success(response, "Registration failed").await?;
        tracing::info!("Registered account");
        Ok(())
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<StoredSession> {
        validate_login(email, password)?;

        let response = self
            .http()
            .post(self.config().endpoint(LOGIN_ROUTE))
            .json(&Credentials {
                email: email.trim(),
                password,
            })
            .send()
            .await?;
        let response = ensure_success(response, "Login failed").await?;
        let grant = response.json::<TokenGrant>().await?;
        self.store_grant(&grant, "Login")?;
        tracing::info!("Signed in");
        self.snapshot()
    }

    pub async fn send_password_reset(&self, email: &str) -> Result<()> {
        let email = email.trim();
        if email.is_empty() {
            return Err(Error::Validation("Email is required".to_string()));
        }

        let response = self
            .http()
            .post(self.config().endpoint(PASSWORD_RESET_ROUTE))
            .json(&PasswordResetRequest { email })
            .send()
            .await?;
        ensure_success(response, "Failed to send the password reset email").await?;
        Ok(())
    }

    pub async fn get_user(&self) -> Result<UserInfo> {
        if self.tokens().access_token()?.is_none() {
            return Err(Error::Session(LOGIN_REQUIRED.to_string()));
        }

        let url = self.config().endpoint(USER_ROUTE);
        let response = self.authorized().send(|http| Ok(http.get(&url))).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<UserInfo>().await?);
        }
        match status {
            StatusCode::UNAUTHORIZED => Err(Error::Session(SESSION_EXPIRED.to_string())),
            StatusCode::FORBIDDEN => Err(Error::Forbidden(
                "The server refused access to account details".to_string(),
            )),
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(server_error(status, &body, "Failed to load account details"))
            }
        }
    }

    /// True when the access token is inside the skew window and the refresh
    /// token can still be used.
    pub fn refresh_due_at(&self, now: DateTime<Utc>) -> Result<bool> {
        let Some(access_expires_at) = self.tokens().access_expires_at()? else {
            return Ok(false);
        };
        if let Some(refresh_expires_at) = self.tokens().refresh_expires_at()? {
            if now >= refresh_expires_at {
                return Ok(false);
            }
        }
        let skew = chrono::Duration::from_std(self.config().refresh_skew)
            .unwrap_or_else(|_| chrono::Duration::zero());
        Ok(now >= access_expires_at - skew)
    }

    /// Best-effort proactive refresh; never fails.
    pub async fn ensure_fresh_access_token(&self) {
        self.ensure_fresh_access_token_at(Utc::now()).await;
    }

    pub async fn ensure_fresh_access_token_at(&self, now: DateTime<Utc>) {
        let observed = self.generation();
        match self.refresh_due_at(now) {
            Ok(true) => {}
            Ok(false) => return,
            Err(error) => {
                tracing::warn!("Could not read session expiry: {}", error);
                return;
            }
        }

        tracing::debug!("Access token is about to expire; refreshing");
        if let Err(error) = self.refresh_if_stale(observed).await {
            tracing::warn!("Proactive token refresh failed: {}", error);
        }
    }

    /// Exchanges the stored refresh token for a new token pair.
    pub async fn refresh(&self) -> Result<()> {
        let _gate = self.inner.refresh_gate.lock().await;
        self.refresh_locked().await
    }

    /// Refreshes unless another caller already did so after `observed`.
    pub(crate) async fn refresh_if_stale(&self, observed: u64) -> Result<()> {
        let _gate = self.inner.refresh_gate.lock().await;
        if self.generation() != observed {
            tracing::debug!("Session changed while waiting; reusing current tokens");
            return Ok(());
        }
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> Result<()> {
        let Some(refresh_token) = self.tokens().refresh_token()? else {
            return Err(Error::Session(
                "No refresh token stored; please log in again".to_string(),
            ));
        };

        // The backend accepts the refresh token as bearer credential and in the body.
        let response = self
            .http()
            .post(self.config().endpoint(REFRESH_ROUTE))
            .bearer_auth(&refresh_token)
            .json(&RefreshRequest {
                refresh_token: &refresh_token,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = server_error(status, &body, "Token refresh failed").user_message();
            if status == StatusCode::UNAUTHORIZED {
                tracing::warn!("Refresh token rejected; clearing stored session");
                self.teardown()?;
            }
            return Err(Error::Session(message));
        }

        let grant = response.json::<TokenGrant>().await?;
        self.store_grant(&grant, "Refresh")?;
        tracing::debug!("Session tokens refreshed");
        Ok(())
    }

    /// Notifies the server and clears local credentials.
    ///
    /// The token store is cleared even when the server call fails; that
    /// failure is still returned so the caller can mention it.
    pub async fn logout(&self) -> Result<()> {
        let notified = self.notify_logout().await;
        if let Err(error) = &notified {
            tracing::warn!("Logout notification failed: {}", error);
        }
        let cleared = self.teardown();
        notified.and(cleared)
    }

    async fn notify_logout(&self) -> Result<()> {
        if self.tokens().access_token()?.is_none() {
            tracing::debug!("No access token stored; skipping logout request");
            return Ok(());
        }

        let url = self.config().endpoint(LOGOUT_ROUTE);
        let response = self
            .authorized()
            .send_reactive(|http| Ok(http.post(&url)))
            .await?;
        let status = response.status();
        if status.is_success() || status == StatusCode::UNAUTHORIZED {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(server_error(status, &body, "Logout failed"))
    }

    /// Deletes the account.
    ///
    /// Tokens are cleared on success and when the session turns out to be
    /// unrecoverable (401 after the refresh attempt). Any other failure keeps
    /// them so the user can retry.
    pub async fn delete_account(&self) -> Result<()> {
        if self.tokens().access_token()?.is_none() {
            return Err(Error::Session(LOGIN_REQUIRED.to_string()));
        }

        let url = self.config().endpoint(QUIT_ROUTE);
        let response = self.authorized().send(|http| Ok(http.delete(&url))).await?;
        let status = response.status();
        if status.is_success() {
            self.teardown()?;
            tracing::info!("Account deleted");
            return Ok(());
        }
        match status {
            StatusCode::UNAUTHORIZED => {
                self.teardown()?;
                Err(Error::Session(SESSION_EXPIRED.to_string()))
            }
            StatusCode::FORBIDDEN => Err(Error::Forbidden(
                "The server refused the account deletion request".to_string(),
            )),
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(server_error(status, &body, "Account deletion failed"))
            }
        }
    }

    fn store_grant(&self, grant: &TokenGrant, context: &str) -> Result<()> {
        let has_access_token = grant
            .access_token
            .as_deref()
            .is_some_and(|token| !sanitize_token(token).is_empty());
        if !has_access_token {
            return Err(Error::InvalidPayload(format!(
                "{context} response did not include an access token"
            )));
        }
        self.tokens().save_grant(grant)?;
        self.bump_generation();
        Ok(())
    }

    fn teardown(&self) -> Result<()> {
        let cleared = self.tokens().clear();
        self.bump_generation();
        cleared
    }

    fn bump_generation(&self) {
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
    }
}

async fn ensure_success(response: Response, fallback: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(server_error(status, &body, fallback))
}
