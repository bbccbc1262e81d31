//! Token persistence
//!
//! A native client has no browser cookie jar, so the session's token pair
//! lives in a JSON file. All writes use atomic temp-file + rename to prevent
//! corruption on crash. A tokio Mutex serializes rotation writes against
//! concurrent readers.
//!
//! The token file is the single source of truth across process restarts;
//! `HttpGateway` reads it at attach and refresh time.

use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::token::TokenSet;

/// Thread-safe token file manager holding at most one session's pair.
///
/// The Mutex serializes all access. Reads clone the in-memory state, so
/// attach-time reads don't block on a rotation that is mid-write.
#[derive(Debug)]
pub struct TokenStore {
    path: PathBuf,
    state: Mutex<Option<TokenSet>>,
}

impl TokenStore {
    /// Load the token file at `path`.
    ///
    /// A missing file is a fresh install, not an error: the store starts
    /// empty and requests go out without a bearer token until a sign-in
    /// seeds it. A file that exists but doesn't parse is surfaced, since
    /// silently discarding it would log the user out.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading token file: {e}")))?;
            let tokens: Option<TokenSet> = serde_json::from_str(&contents)
                .map_err(|e| Error::CredentialParse(format!("parsing token file: {e}")))?;
            info!(path = %path.display(), signed_in = tokens.is_some(), "loaded token store");
            tokens
        } else {
            info!(path = %path.display(), "token file not found, starting signed out");
            // Create the empty file so future loads don't need the cold-start path
            write_atomic(&path, &None).await?;
            None
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Create a store seeded with `tokens`, persisting them to `path`.
    ///
    /// Skips the load step, so anything already at `path` is overwritten.
    /// Callers that must preserve an on-disk session go through
    /// [`TokenStore::load`] and call [`TokenStore::set`] only when the load
    /// comes back signed out.
    pub async fn seeded(path: PathBuf, tokens: TokenSet) -> Result<Self> {
        write_atomic(&path, &Some(tokens.clone())).await?;
        Ok(Self {
            path,
            state: Mutex::new(Some(tokens)),
        })
    }

    /// Clone of the current token pair, if signed in.
    pub async fn get(&self) -> Option<TokenSet> {
        let state = self.state.lock().await;
        state.clone()
    }

    /// Replace the stored pair and persist to disk.
    pub async fn set(&self, tokens: TokenSet) -> Result<()> {
        let mut state = self.state.lock().await;
        *state = Some(tokens);
        debug!("stored rotated token pair");
        write_atomic(&self.path, &state).await
    }

    /// Drop the pair from memory and disk. Idempotent.
    pub async fn clear(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.is_none() {
            return Ok(());
        }
        *state = None;
        debug!("cleared token store");
        write_atomic(&self.path, &state).await
    }

    /// Whether a token pair is currently stored.
    pub async fn is_signed_in(&self) -> bool {
        let state = self.state.lock().await;
        state.is_some()
    }
}

/// Write the token state to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target. This prevents corruption if the process crashes mid-write.
/// Sets file permissions to 0600 (owner read/write only) since the file
/// contains live session tokens.
async fn write_atomic(path: &Path, state: &Option<TokenSet>) -> Result<()> {
    let json = serde_json::to_string_pretty(state)
        .map_err(|e| Error::CredentialParse(format!("serializing tokens: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("token path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".tokens.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp token file: {e}")))?;

    // Set 0600 permissions (unix only)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting token file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp token file: {e}")))?;

    debug!(path = %path.display(), "persisted token state");
    Ok(())
}
