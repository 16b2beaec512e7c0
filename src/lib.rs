//! # Pod League
//!
//! A rating and match-tracking service for four-player commander pods.
//!
//! ## Architecture
//!
//! - **models**: Core data structures (players, matches, decks, seasons)
//! - **ledger**: Match lifecycle state machine and season rollover
//! - **rating**: Zero-sum rating transfer computation
//! - **catalog**: Deck registry with canonical-alias resolution
//! - **roster**: Per-league player records and leaderboards
//! - **stats**: Derived deck and player statistics
//! - **storage**: Per-league JSONL document store
//! - **api**: REST API endpoints
//! - **config**: Configuration loading and validation

pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod ledger;
pub mod models;
pub mod rating;
pub mod roster;
pub mod stats;
pub mod storage;

pub use error::LeagueError;
pub use models::*;
