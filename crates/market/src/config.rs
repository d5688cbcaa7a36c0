//! Marketplace configuration.

use std::path::PathBuf;
use helpboard_core::UserId;
use serde::{Deserialize, Serialize};

/// Configuration for a marketplace session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Directory file-backed storage lives in
    pub data_dir: PathBuf,
    /// User the session falls back to on logout or unknown current user
    pub default_user: UserId,
    /// Elder half of the demo identity pair
    pub demo_elder: UserId,
    /// Student half of the demo identity pair
    pub demo_student: UserId,
    /// Seed demo users and tasks when storage is empty or unreadable
    pub seed_demo_data: bool,
    /// Buffer size of the marketplace event channel
    pub event_capacity: usize,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".helpboard"),
            default_user: UserId::from("elder1"),
            demo_elder: UserId::from("elder1"),
            demo_student: UserId::from("student1"),
            seed_demo_data: true,
            event_capacity: 64,
        }
    }
}
