//! Deterministic identifier generation using SHA256 hashing.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Stable external identity of a league member (chat-platform user id).
pub type PlayerId = u64;

/// Number of characters in a game id.
const GAME_ID_LEN: usize = 4;

/// How many seed decrements to try before salting the hash with an
/// attempt counter. Keeps allocation from looping forever if a dense
/// run of ids is already taken.
const MAX_SEED_RETRIES: u64 = 64;

/// Namespace for one league's data. Leagues never share players,
/// matches, or seasons; decks are catalogued globally.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeagueId(String);

impl LeagueId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LeagueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for LeagueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LeagueId({})", self.0)
    }
}

impl From<&str> for LeagueId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Short opaque match identifier, unique within a league.
///
/// Derived from a seed (the report timestamp) so that ids are short
/// enough to type into a chat command while still being deterministic
/// for a given seed and set of existing ids.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GameId(String);

impl GameId {
    /// Wrap an existing id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Allocate a fresh id from `seed`.
    ///
    /// The candidate is the first four hex characters of SHA256(seed).
    /// On collision (`exists` returns true) the seed is decremented and
    /// the derivation retried. After `MAX_SEED_RETRIES` collisions the
    /// attempt counter is mixed into the hash so the probe sequence
    /// diverges from the exhausted run instead of cycling.
    pub fn allocate<F>(seed: u64, exists: F) -> Self
    where
        F: Fn(&str) -> bool,
    {
        let mut seed = seed;
        let mut attempt: u64 = 0;
        loop {
            let candidate = Self::derive(seed, attempt / MAX_SEED_RETRIES);
            if !exists(&candidate) {
                return Self(candidate);
            }
            seed = seed.wrapping_sub(1);
            attempt += 1;
        }
    }

    fn derive(seed: u64, salt: u64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(seed.to_be_bytes());
        if salt > 0 {
            hasher.update(b"|");
            hasher.update(salt.to_be_bytes());
        }
        let digest = hasher.finalize();
        hex::encode(digest)[..GAME_ID_LEN].to_string()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GameId({})", self.0)
    }
}

impl From<&str> for GameId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
