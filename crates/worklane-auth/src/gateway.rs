//! The credential contract consumed by the HTTP client
//!
//! `AuthGateway` decouples the request pipeline from credential mechanics:
//! the pipeline decides *when* to read, refresh, or drop tokens; this trait
//! owns *how*. `HttpGateway` is the production implementation over the
//! token store and the refresh endpoint; tests substitute scripted gateways.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::store::TokenStore;
use crate::token::{self, TokenSet};

/// Window before expiry in which `valid_token` refreshes proactively.
///
/// Wide enough that a token handed out now survives the request it is
/// attached to, including retries.
const REFRESH_AHEAD: Duration = Duration::from_secs(60);

/// Abstraction over credential reads, refresh, and invalidation.
///
/// The client's refresh coordinator promises to call `refresh_token` at most
/// once per refresh episode regardless of how many requests are queued
/// behind it; implementations on their side must tolerate being called from
/// several client instances.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn AuthGateway>`).
pub trait AuthGateway: Send + Sync {
    /// Non-blocking local read of the current access token.
    ///
    /// Used when attaching credentials to an outgoing request. Absence is
    /// not an error: the request may still be satisfied by cookie
    /// credentials, or fail with 401 and take the refresh path.
    fn token_no_refresh(&self) -> Pin<Box<dyn Future<Output = Option<String>> + Send + '_>>;

    /// Access token guaranteed usable for at least a short window,
    /// refreshing first when the stored one is expired or about to expire.
    ///
    /// For callers that need a working token up front (socket connects,
    /// long-running exports); the request pipeline itself reacts to 401s
    /// instead of calling this.
    fn valid_token(&self) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>>;

    /// Spend the refresh token for a new pair, persist it, and return the
    /// new access token.
    fn refresh_token(&self) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>>;

    /// Invalidate the local credential cache.
    fn clear_tokens(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// Production gateway: file-backed token store + refresh endpoint over HTTP.
pub struct HttpGateway {
    http: reqwest::Client,
    base_url: String,
    store: Arc<TokenStore>,
    /// Serializes refresh flights. The winner rotates the pair; a
    /// `valid_token` caller that lost the race re-reads the store after
    /// acquiring the guard and skips the network call.
    refresh_guard: Mutex<()>,
}

impl HttpGateway {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, store: Arc<TokenStore>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            store,
            refresh_guard: Mutex::new(()),
        }
    }

    /// The token store backing this gateway.
    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    /// Spend the stored refresh token at the refresh endpoint and persist
    /// the rotated pair. Caller must hold `refresh_guard`.
    ///
    /// Failures do not touch the stored pair; deciding to clear credentials
    /// belongs to the caller (the refresh coordinator clears on a failed
    /// episode, a `valid_token` caller does not).
    async fn rotate(&self) -> Result<String> {
        let Some(tokens) = self.store.get().await else {
            return Err(Error::NoCredentials(
                "no stored session to refresh".into(),
            ));
        };

        debug!("rotating access token");
        match token::refresh_access_token(&self.http, &self.base_url, &tokens.refresh_token).await {
            Ok(response) => {
                let rotated = TokenSet::from_response(response);
                let access = rotated.access_token.clone();
                self.store.set(rotated).await?;
                info!("access token rotated");
                Ok(access)
            }
            Err(e) => {
                warn!(error = %e, permanent = e.is_permanent(), "token rotation failed");
                Err(e)
            }
        }
    }
}

impl AuthGateway for HttpGateway {
    fn token_no_refresh(&self) -> Pin<Box<dyn Future<Output = Option<String>> + Send + '_>> {
        Box::pin(async { self.store.get().await.map(|t| t.access_token) })
    }

    fn valid_token(&self) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>> {
        Box::pin(async {
            match self.store.get().await {
                Some(tokens) if !tokens.expires_within(REFRESH_AHEAD) => {
                    return Ok(tokens.access_token);
                }
                Some(_) => {}
                None => {
                    return Err(Error::NoCredentials("not signed in".into()));
                }
            }

            let _flight = self.refresh_guard.lock().await;
            // A concurrent flight may have rotated the pair while we waited
            // on the guard; re-read before spending the refresh token.
            if let Some(tokens) = self.store.get().await {
                if !tokens.expires_within(REFRESH_AHEAD) {
                    return Ok(tokens.access_token);
                }
            }
            self.rotate().await
        })
    }

    fn refresh_token(&self) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>> {
        Box::pin(async {
            let _flight = self.refresh_guard.lock().await;
            self.rotate().await
        })
    }

    fn clear_tokens(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async {
            if let Err(e) = self.store.clear().await {
                warn!(error = %e, "failed to clear token store");
            }
        })
    }
}
