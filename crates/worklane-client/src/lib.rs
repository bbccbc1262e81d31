//! HTTP client for the Worklane API
//!
//! Wraps reqwest with the platform's session pipeline. Every request is
//! tagged, gets the cached access token attached, and failed responses are
//! classified into a small taxonomy. An expired session (401) triggers a
//! single-flight token refresh: one gateway call no matter how many
//! requests hit the wall together, every queued request released in
//! arrival order with the rotated token, and each replayed exactly once.
//! A failed refresh ends the session, clears local credentials, and fires
//! the session-expired hook exactly once.
//!
//! Request lifecycle:
//! 1. [`tag`] decides auth endpoint vs ordinary and the criticality label
//! 2. the cached token is attached (auth endpoints are left alone)
//! 3. the transport issues the request with the configured timeout
//! 4. [`classify`] maps a failure onto the error taxonomy
//! 5. a 401 on an ordinary, not-yet-retried request enters [`coordinator`]
//! 6. the episode settles and the request replays once with its token
//!
//! ```no_run
//! use std::path::Path;
//! use worklane_client::{Client, ClientConfig};
//!
//! # async fn run() -> worklane_client::Result<()> {
//! let config = ClientConfig::load(Path::new("client.toml"))
//!     .map_err(|e| worklane_client::Error::Config(e.to_string()))?;
//! let client = Client::from_config(config).await?;
//! let projects = client.get("/projects").await?;
//! println!("{}", projects.text());
//! # Ok(())
//! # }
//! ```

pub mod classify;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod metrics;
pub mod tag;

pub use classify::FailureClass;
pub use client::{ApiRequest, ApiResponse, Client, ClientBuilder};
pub use config::ClientConfig;
pub use coordinator::{RefreshCoordinator, SessionExpiredHook};
pub use error::{Error, Result};
pub use tag::{Criticality, EndpointKind, RequestTag};
