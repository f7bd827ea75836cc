pub mod auth;
pub mod cache;
pub mod config;
pub mod filter;
pub mod network;
pub mod normalize;
pub mod parser;
pub mod refresh;
pub mod scheduler;
pub mod scraper;
pub mod types;
pub mod utils;

pub use cache::SnapshotCache;
pub use config::Config;
pub use refresh::{RefreshOutcome, RosterService, RosterSource};
pub use scheduler::Scheduler;
pub use scraper::{PortalScraper, ScraperError};
pub use types::{Entry, Snapshot};
