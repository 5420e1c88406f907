//! Core domain types for the Stash bookmark service.
//!
//! This crate defines what every other crate shares:
//! - API key generation and hashing
//! - Account and bookmark input shapes with their checks
//! - Configuration types

pub mod account;
pub mod api_key;
pub mod config;
pub mod error;

pub use account::{NewAccount, NewBookmark, is_valid_email};
pub use api_key::{API_KEY_HEX_LEN, ApiKey, hash_api_key};
pub use error::{Error, Result};
