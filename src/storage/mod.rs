//! Persistence seam for league data.
//!
//! The core never talks to a database directly; it goes through the
//! [`LeagueStore`] trait so the document backend can be swapped. The
//! bundled implementation keeps JSONL files under a data directory,
//! one subdirectory per league.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Deck, GameId, LeagueId, MatchRecord, Player, PlayerId, Season};

mod jsonl;

pub use jsonl::JsonlStore;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

/// Per-league tunables persisted alongside the roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeagueSettings {
    /// Minimum accepted matches to appear on the player leaderboard.
    #[serde(default = "default_player_threshold")]
    pub player_match_threshold: u32,

    /// Minimum entries for a deck to appear in meta statistics.
    #[serde(default = "default_deck_threshold")]
    pub deck_match_threshold: u32,
}

fn default_player_threshold() -> u32 {
    10
}

fn default_deck_threshold() -> u32 {
    10
}

impl Default for LeagueSettings {
    fn default() -> Self {
        Self {
            player_match_threshold: default_player_threshold(),
            deck_match_threshold: default_deck_threshold(),
        }
    }
}

/// Document CRUD over league data.
///
/// Single-document writes must be atomic with respect to each other;
/// cross-document atomicity is the ledger's job (it holds the match
/// and league locks across its critical sections).
#[async_trait]
pub trait LeagueStore: Send + Sync {
    async fn load_player(
        &self,
        league: &LeagueId,
        player_id: PlayerId,
    ) -> Result<Option<Player>, StorageError>;

    async fn save_player(&self, league: &LeagueId, player: &Player) -> Result<(), StorageError>;

    /// Returns false if the player did not exist.
    async fn delete_player(
        &self,
        league: &LeagueId,
        player_id: PlayerId,
    ) -> Result<bool, StorageError>;

    async fn list_players(&self, league: &LeagueId) -> Result<Vec<Player>, StorageError>;

    async fn load_match(
        &self,
        league: &LeagueId,
        game_id: &GameId,
    ) -> Result<Option<MatchRecord>, StorageError>;

    async fn save_match(&self, league: &LeagueId, record: &MatchRecord)
        -> Result<(), StorageError>;

    /// Returns false if the match did not exist.
    async fn delete_match(
        &self,
        league: &LeagueId,
        game_id: &GameId,
    ) -> Result<bool, StorageError>;

    async fn list_matches(&self, league: &LeagueId) -> Result<Vec<MatchRecord>, StorageError>;

    /// Decks are shared across leagues.
    async fn save_deck(&self, deck: &Deck) -> Result<(), StorageError>;

    /// Returns false if no deck with that primary name exists.
    async fn delete_deck(&self, name: &str) -> Result<bool, StorageError>;

    async fn list_decks(&self) -> Result<Vec<Deck>, StorageError>;

    async fn save_season(&self, league: &LeagueId, season: &Season) -> Result<(), StorageError>;

    async fn list_seasons(&self, league: &LeagueId) -> Result<Vec<Season>, StorageError>;

    async fn load_settings(&self, league: &LeagueId) -> Result<LeagueSettings, StorageError>;

    async fn save_settings(
        &self,
        league: &LeagueId,
        settings: &LeagueSettings,
    ) -> Result<(), StorageError>;
}
