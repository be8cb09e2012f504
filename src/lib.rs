//! amz-used-watch - Amazon used/open-box listing watcher
//!
//! Scrapes warehouse-deal search results, keeps a price history per
//! listing, and notifies on new listings and significant price drops.

pub mod amazon;
pub mod commands;
pub mod config;
pub mod engine;
pub mod filters;
pub mod format;
pub mod history;
pub mod notify;
pub mod scrape;
pub mod sources;

pub use amazon::models::{ListingPage, ObservedRecord};
pub use amazon::regions::Region;
pub use config::Config;
pub use engine::{diff_and_notify, Decision, NotificationEvent, NotifyReason};
pub use history::{HistoryEntry, HistoryStore};
