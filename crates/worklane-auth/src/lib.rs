//! Credential management for the Worklane API client
//!
//! Owns everything the request pipeline consumes around credentials: the
//! access/refresh token pair and its expiry math, the wire call against the
//! platform's refresh endpoint, file-backed token persistence, and the
//! `AuthGateway` contract the HTTP client is written against. This crate
//! has no dependency on the client and can be tested and used on its own.
//!
//! Session flow:
//! 1. Sign-in (outside this crate) seeds the pair via `TokenStore::set()`
//! 2. The client's request tagger reads `AuthGateway::token_no_refresh()`
//! 3. On an unauthenticated response the refresh coordinator calls
//!    `AuthGateway::refresh_token()`
//! 4. `HttpGateway` posts to `/auth/refresh` and persists the rotated pair
//! 5. When the refresh token itself is rejected, `clear_tokens()` wipes the
//!    store and the session is over

pub mod error;
pub mod gateway;
pub mod store;
pub mod token;

pub use error::{Error, Result};
pub use gateway::{AuthGateway, HttpGateway};
pub use store::TokenStore;
pub use token::{REFRESH_PATH, RefreshResponse, TokenSet, refresh_access_token};
