//! User facing output

pub mod format;
pub mod reporter;
pub mod summary;

use crate::deploy::messages::Report;

pub use reporter::TerminalReporter;

/// Receives everything a deployment wants the user to see
pub trait Reporter: Send + Sync {
    fn report(&self, report: &Report);

    /// Show `summary` and ask whether to go ahead. Called from a blocking thread.
    fn confirm(&self, summary: &str) -> bool;
}
