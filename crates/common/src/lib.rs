//! Shared types for the Worklane client workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
