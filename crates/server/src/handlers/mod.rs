//! HTTP request handlers.

pub mod accounts;
pub mod bookmarks;
pub mod common;
pub mod health;

pub use accounts::*;
pub use bookmarks::*;
pub use common::*;
pub use health::*;
