//! Season bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::PlayerId;

/// One scoring period of a league. The newest season has no end time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Season {
    pub season_number: u32,

    pub start_time: DateTime<Utc>,

    /// Set when the season is closed by a rollover.
    pub end_time: Option<DateTime<Utc>>,

    /// Top finishers by rating at close, best first. Empty if nobody
    /// qualified for the leaderboard.
    pub leaders: Vec<PlayerId>,
}

impl Season {
    /// Open season number `season_number` starting now.
    pub fn open(season_number: u32) -> Self {
        Self {
            season_number,
            start_time: Utc::now(),
            end_time: None,
            leaders: Vec::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// Close this season, recording the final leaders.
    pub fn close(&mut self, leaders: Vec<PlayerId>) {
        self.end_time = Some(Utc::now());
        self.leaders = leaders;
    }
}
