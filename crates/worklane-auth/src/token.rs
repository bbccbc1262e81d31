//! Token types and the refresh wire call
//!
//! A session is a pair of tokens: a short-lived access token attached to
//! ordinary API requests, and a longer-lived refresh token spent here to
//! obtain the next pair. `refresh_access_token` POSTs the refresh token to
//! the platform's auth endpoint; the caller persists the rotated pair via
//! `TokenStore`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Refresh endpoint path, relative to the API base URL.
pub const REFRESH_PATH: &str = "/auth/refresh";

/// A stored access/refresh token pair.
///
/// `expires_at` is a unix timestamp in milliseconds (absolute, not a delta),
/// computed at storage time from the wire response's `expires_in` seconds
/// plus the current time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSet {
    /// Bearer token attached to ordinary API requests
    pub access_token: String,
    /// Spent at the refresh endpoint for the next pair
    pub refresh_token: String,
    /// Access token expiration as unix timestamp in milliseconds
    pub expires_at: u64,
}

impl TokenSet {
    /// Build a stored pair from a wire response received just now.
    pub fn from_response(response: RefreshResponse) -> Self {
        let now_millis = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at: now_millis + response.expires_in * 1000,
        }
    }

    /// Whether the access token is already expired or expires within `window`.
    pub fn expires_within(&self, window: Duration) -> bool {
        let now_millis = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        self.expires_at <= now_millis + window.as_millis() as u64
    }
}

/// Response from the refresh endpoint.
///
/// The API speaks camelCase on the wire. `expires_in` is a delta in seconds
/// from the response time; `TokenSet::from_response` converts it to an
/// absolute timestamp.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Seconds until the access token expires (delta, not absolute)
    pub expires_in: u64,
}

/// Spend a refresh token at `{base_url}/auth/refresh` for a new pair.
///
/// A 401/403 from the refresh endpoint means the refresh token itself is
/// revoked or expired; that rejection is permanent and the session is
/// over. Any other failure (transport, 5xx, malformed body) leaves the
/// stored pair untouched so a later attempt can still succeed.
pub async fn refresh_access_token(
    client: &reqwest::Client,
    base_url: &str,
    refresh: &str,
) -> Result<RefreshResponse> {
    let response = client
        .post(format!("{base_url}{REFRESH_PATH}"))
        .json(&serde_json::json!({ "refreshToken": refresh }))
        .send()
        .await
        .map_err(|e| Error::Http(format!("refresh request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));

        // 401/403 means the refresh token is revoked or expired
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(Error::RefreshRejected(format!(
                "refresh endpoint returned {status}: {body}"
            )));
        }

        return Err(Error::Http(format!(
            "refresh endpoint returned {status}: {body}"
        )));
    }

    response
        .json::<RefreshResponse>()
        .await
        .map_err(|e| Error::Http(format!("invalid refresh response: {e}")))
}
