//! League member model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{GameId, PlayerId};

/// Rating every player starts a season with.
pub const BASE_RATING: i64 = 1000;

/// A registered league member.
///
/// Rating, wins, losses and `accepted` are mutated only by the match
/// ledger when a match is accepted; commands never write them directly.
/// `accepted == wins + losses` holds after every accepted match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    /// Chat-platform user id.
    pub player_id: PlayerId,

    /// Display name, presentation only.
    pub display_name: String,

    /// League points. No floor; may go negative.
    pub rating: i64,

    pub wins: u32,
    pub losses: u32,

    /// Number of accepted matches this player took part in.
    pub accepted: u32,

    /// Matches this player still owes a confirmation on, oldest first.
    pub pending: Vec<GameId>,

    /// Last deck the player declared on a confirmation.
    pub current_deck: Option<String>,

    /// Season podium badges.
    pub gold_badges: u32,
    pub silver_badges: u32,
    pub bronze_badges: u32,

    pub registered_at: DateTime<Utc>,
}

impl Player {
    /// Create a new member at the base rating.
    pub fn new(player_id: PlayerId, display_name: String) -> Self {
        Self {
            player_id,
            display_name,
            rating: BASE_RATING,
            wins: 0,
            losses: 0,
            accepted: 0,
            pending: Vec::new(),
            current_deck: None,
            gold_badges: 0,
            silver_badges: 0,
            bronze_badges: 0,
            registered_at: Utc::now(),
        }
    }

    /// Win rate over accepted matches, 0.0 when no matches played.
    pub fn win_rate(&self) -> f64 {
        if self.accepted == 0 {
            0.0
        } else {
            self.wins as f64 / self.accepted as f64
        }
    }

    /// The most recently created match still awaiting this player.
    pub fn latest_pending(&self) -> Option<&GameId> {
        self.pending.last()
    }

    /// Zero out season-scoped fields, keeping identity, badges, and
    /// deck history.
    pub fn reset_scores(&mut self, base_rating: i64) {
        self.rating = base_rating;
        self.wins = 0;
        self.losses = 0;
        self.accepted = 0;
    }
}
