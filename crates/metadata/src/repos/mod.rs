//! Repository traits for metadata operations.

pub mod accounts;
pub mod bookmarks;

pub use accounts::AccountRepo;
pub use bookmarks::BookmarkRepo;
