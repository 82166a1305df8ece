//! Bearer-authenticated request wrapper with a single refresh-and-retry.

use reqwest::{Client, RequestBuilder, Response, StatusCode};

use crate::auth::SessionManager;
use crate::error::Result;
use crate::storage::KeyValueStore;

/// Sends requests on behalf of a session.
///
/// Requests are described by a builder closure because a request body (for
/// example a multipart upload) can only be sent once; the closure runs again
/// for the retry. Only a 401 is retried, and only once.
#[derive(Clone)]
pub struct AuthorizedClient<S: KeyValueStore> {
    session: SessionManager<S>,
}

impl<S: KeyValueStore> AuthorizedClient<S> {
    pub const fn new(session: SessionManager<S>) -> Self {
        Self { session }
    }

    pub const fn session(&self) -> &SessionManager<S> {
        &self.session
    }

    /// Refreshes a soon-to-expire token first, then sends with retry.
    pub async fn send<F>(&self, build: F) -> Result<Response>
    where
        F: Fn(&Client) -> Result<RequestBuilder>,
    {
        self.session.ensure_fresh_access_token().await;
        self.send_reactive(build).await
    }

    /// Sends without the proactive expiry check; a 401 still triggers one
    /// refresh and one retry.
    ///
    /// When the refresh fails the original 401 response is returned.
    pub async fn send_reactive<F>(&self, build: F) -> Result<Response>
    where
        F: Fn(&Client) -> Result<RequestBuilder>,
    {
        let observed = self.session.generation();
        let response = self.dispatch(&build).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        tracing::debug!("Request was rejected with 401; refreshing session");
        if let Err(error) = self.session.refresh_if_stale(observed).await {
            tracing::warn!("Session refresh after 401 failed: {}", error);
            return Ok(response);
        }

        self.dispatch(&build).await
    }

    async fn dispatch<F>(&self, build: &F) -> Result<Response>
    where
        F: Fn(&Client) -> Result<RequestBuilder>,
    {
        let mut request = build(self.session.http())?;
        if let Some(token) = self.session.tokens().access_token()? {
            request = request.bearer_auth(token);
        }
        Ok(request.send().await?)
    }
}
