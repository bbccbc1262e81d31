//! Single-flight token refresh
//!
//! At most one refresh runs at any instant. The first caller to hit an
//! expired session starts an episode; everyone who arrives while it is in
//! flight joins the same queue. The episode runs on its own task, so a
//! caller whose future is dropped mid-wait never wedges the queue: the
//! episode settles regardless and every queued sender is drained in
//! arrival order with the same outcome.
//!
//! A failed episode ends the session: local credentials are cleared and
//! the session-expired hook fires, both exactly once per episode.

use std::sync::Arc;

use tokio::sync::{Mutex, oneshot};
use tracing::{debug, info, warn};
use worklane_auth::AuthGateway;

use crate::error::{Error, Result};
use crate::metrics;

/// Invoked once per failed refresh episode, after credentials are cleared.
/// Applications use it to route to their login flow.
pub type SessionExpiredHook = Arc<dyn Fn() + Send + Sync>;

/// One queued caller. `Err` carries the refresh failure message; every
/// sender of an episode receives the same one.
type Waiter = oneshot::Sender<std::result::Result<String, String>>;

enum RefreshState {
    Idle,
    Refreshing { waiters: Vec<Waiter> },
}

/// Coordinates refresh episodes for one client. Cloning is cheap and all
/// clones share the same state.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    gateway: Arc<dyn AuthGateway>,
    state: Mutex<RefreshState>,
    on_session_expired: Option<SessionExpiredHook>,
}

impl RefreshCoordinator {
    pub fn new(
        gateway: Arc<dyn AuthGateway>,
        on_session_expired: Option<SessionExpiredHook>,
    ) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                gateway,
                state: Mutex::new(RefreshState::Idle),
                on_session_expired,
            }),
        }
    }

    /// Obtain a freshly rotated access token.
    ///
    /// If no episode is in flight this caller starts one; otherwise it
    /// waits for the in-flight episode's outcome. Exactly one gateway
    /// refresh call happens per episode, no matter how many callers join.
    pub async fn refresh(&self) -> Result<String> {
        let rx = {
            let mut state = self.inner.state.lock().await;
            match &mut *state {
                RefreshState::Refreshing { waiters } => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    debug!(queued = waiters.len(), "refresh in flight, joining queue");
                    rx
                }
                RefreshState::Idle => {
                    let (tx, rx) = oneshot::channel();
                    *state = RefreshState::Refreshing { waiters: vec![tx] };
                    let inner = Arc::clone(&self.inner);
                    tokio::spawn(async move { inner.run_episode().await });
                    rx
                }
            }
        };

        match rx.await {
            Ok(Ok(token)) => Ok(token),
            Ok(Err(message)) => Err(Error::RefreshFailed(message)),
            Err(_) => Err(Error::RefreshFailed(
                "refresh episode ended without settling".to_string(),
            )),
        }
    }
}

impl CoordinatorInner {
    /// One episode: a single gateway call, then drain the queue.
    async fn run_episode(&self) {
        info!("refreshing access token");
        let outcome = match self.gateway.refresh_token().await {
            Ok(token) => {
                metrics::record_refresh("success");
                Ok(token)
            }
            Err(e) => {
                warn!(error = %e, "token refresh failed, ending session");
                metrics::record_refresh("failure");
                self.gateway.clear_tokens().await;
                if let Some(hook) = &self.on_session_expired {
                    hook();
                }
                Err(e.to_string())
            }
        };

        // Take the queue and return to Idle in one critical section, so a
        // caller arriving after the settle starts a clean episode instead
        // of joining this finished one.
        let waiters = {
            let mut state = self.state.lock().await;
            match std::mem::replace(&mut *state, RefreshState::Idle) {
                RefreshState::Refreshing { waiters } => waiters,
                RefreshState::Idle => Vec::new(),
            }
        };

        info!(
            released = waiters.len(),
            ok = outcome.is_ok(),
            "refresh episode settled"
        );
        metrics::record_waiters_drained(waiters.len());
        for tx in waiters {
            // A caller that went away mid-wait misses its slot; the rest
            // of the queue still settles.
            let _ = tx.send(outcome.clone());
        }
    }
}
