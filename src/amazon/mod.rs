//! Amazon-specific page fetcher, extractor and data models.

pub mod client;
pub mod models;
pub mod parser;
pub mod regions;
pub mod selectors;

pub use client::AmazonClient;
pub use models::{ListingPage, ObservedRecord};
pub use parser::Parser;
pub use regions::Region;
