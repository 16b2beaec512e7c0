//! League error taxonomy.
//!
//! Every variant except `Storage` is locally recoverable: the caller
//! surfaces a message and no match or player state has changed. A
//! storage failure propagates unchanged; swallowing one would let
//! pending sets drift out of step with match status.

use thiserror::Error;

use crate::models::PlayerId;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum LeagueError {
    #[error("player {player_id} is not registered in this league")]
    UnregisteredParticipant { player_id: PlayerId },

    #[error("player {player_id} is already registered")]
    AlreadyRegistered { player_id: PlayerId },

    #[error("player {player_id} is not a participant of match {game_id}")]
    NotAParticipant { player_id: PlayerId, game_id: String },

    #[error("match {game_id} does not exist")]
    MatchNotFound { game_id: String },

    #[error("player {player_id} has no pending matches")]
    NoPendingMatches { player_id: PlayerId },

    #[error("you have already confirmed match {game_id}")]
    AlreadyConfirmed { game_id: String },

    #[error("match {game_id} is already accepted")]
    MatchAlreadyAccepted { game_id: String },

    #[error("accepted match {game_id} cannot be overridden")]
    CannotOverrideAccepted { game_id: String },

    #[error("accepted match {game_id} cannot be denied")]
    CannotDenyAccepted { game_id: String },

    #[error("a pod needs exactly 4 distinct players, got {got}")]
    InvalidParticipantCount { got: usize },

    #[error("no deck declared; set a current deck or pass one with the confirmation")]
    DeckRequired,

    #[error("only a league admin or the match winner may do that")]
    NotAuthorized,

    #[error("deck {name} is not registered")]
    DeckNotFound { name: String },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl LeagueError {
    /// Soft errors report a user mistake and are safe to retry.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, LeagueError::Storage(_))
    }
}
