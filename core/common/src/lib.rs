//! Common utilities and types shared across driveup modules.
//!
//! This module provides the error taxonomy and the credential type that the
//! auth and storage crates exchange.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::Credential;
