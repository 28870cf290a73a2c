//! Update notification

pub mod cache;
pub mod check;

pub use cache::VersionCache;
pub use check::{check_for_update, is_newer};
