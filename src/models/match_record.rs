//! Match record and lifecycle states.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{GameId, PlayerId};

/// Number of players in a pod.
pub const POD_SIZE: usize = 4;

/// Lifecycle state of a match.
///
/// `Accepted` is terminal; `Disputed` can move back toward acceptance
/// through re-confirmation or an admin override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Pending,
    Disputed,
    Accepted,
}

/// One seat in a match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub player_id: PlayerId,

    /// Deck declared when the player confirmed, if any.
    pub declared_deck: Option<String>,

    pub confirmed: bool,
}

impl Participant {
    pub fn new(player_id: PlayerId) -> Self {
        Self {
            player_id,
            declared_deck: None,
            confirmed: false,
        }
    }
}

/// A reported match. Created `Pending` with all seats unconfirmed; the
/// winner is fixed at creation and confirms like everyone else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    pub game_id: GameId,

    pub status: MatchStatus,

    /// Reported winner; always one of the participants.
    pub winner_id: PlayerId,

    /// Set once the winner confirms their deck.
    pub winning_deck: Option<String>,

    /// Exactly four entries, reporter first.
    pub participants: Vec<Participant>,

    pub created_at: DateTime<Utc>,
}

impl MatchRecord {
    /// Create a pending match. `player_ids` is the full pod, winner
    /// included.
    pub fn new(game_id: GameId, winner_id: PlayerId, player_ids: &[PlayerId]) -> Self {
        Self {
            game_id,
            status: MatchStatus::Pending,
            winner_id,
            winning_deck: None,
            participants: player_ids.iter().map(|&id| Participant::new(id)).collect(),
            created_at: Utc::now(),
        }
    }

    pub fn participant(&self, player_id: PlayerId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.player_id == player_id)
    }

    pub fn participant_mut(&mut self, player_id: PlayerId) -> Option<&mut Participant> {
        self.participants
            .iter_mut()
            .find(|p| p.player_id == player_id)
    }

    pub fn is_participant(&self, player_id: PlayerId) -> bool {
        self.participant(player_id).is_some()
    }

    pub fn all_confirmed(&self) -> bool {
        self.participants.iter().all(|p| p.confirmed)
    }

    /// Ids of the three non-winning seats.
    pub fn loser_ids(&self) -> Vec<PlayerId> {
        self.participants
            .iter()
            .map(|p| p.player_id)
            .filter(|&id| id != self.winner_id)
            .collect()
    }

    /// Deck a given player declared in this match, if confirmed with one.
    pub fn deck_of(&self, player_id: PlayerId) -> Option<&str> {
        self.participant(player_id)
            .and_then(|p| p.declared_deck.as_deref())
    }
}
