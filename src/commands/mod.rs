//! CLI command implementations.

pub mod history;
pub mod run;

pub use history::HistoryCommand;
pub use run::{AmazonSessions, RunCommand, RunSummary, SessionFactory};
