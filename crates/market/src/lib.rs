//! Helpboard marketplace
//!
//! User directory, task lifecycle, notifications and the session service
//! tying them together over a shared [`helpboard_storage::Storage`].

#![warn(missing_docs)]

pub mod config;
pub mod directory;
pub mod error;
pub mod notifications;
pub mod payment;
pub mod seed;
pub mod service;
pub mod tasks;

pub use config::MarketConfig;
pub use directory::UserDirectory;
pub use error::{MarketError, Result};
pub use notifications::NotificationCenter;
pub use payment::CardDetails;
pub use service::{HelperCandidate, MarketEvent, Marketplace};
pub use tasks::{TaskStore, RATING_RANGE};
