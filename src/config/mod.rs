//! Configuration loading and validation.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Rating transfer curve parameters.
///
/// A loser's point loss is `round(max_swing / (1 + curve_base^(-diff)) +
/// floor)` where `diff` is their rating minus the average of the other
/// three seats. The historical sources disagree on the exact constants,
/// so they are configuration rather than code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Width of the logistic band; losses span [floor, floor + max_swing].
    #[serde(default = "default_max_swing")]
    pub max_swing: f64,

    /// Base of the logistic exponent; controls curve steepness.
    #[serde(default = "default_curve_base")]
    pub curve_base: f64,

    /// Minimum points a loser can drop.
    #[serde(default = "default_floor")]
    pub floor: f64,

    /// Rating assigned at registration and on season reset.
    #[serde(default = "default_base_rating")]
    pub base_rating: i64,
}

fn default_max_swing() -> f64 {
    12.0
}

fn default_curve_base() -> f64 {
    1.0065
}

fn default_floor() -> f64 {
    4.0
}

fn default_base_rating() -> i64 {
    1000
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            max_swing: default_max_swing(),
            curve_base: default_curve_base(),
            floor: default_floor(),
            base_rating: default_base_rating(),
        }
    }
}

/// Defaults applied to leagues that have not tuned their settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeagueDefaults {
    /// Minimum accepted matches to rank on the leaderboard.
    #[serde(default = "default_match_threshold")]
    pub player_match_threshold: u32,

    /// Minimum entries before a deck shows in meta stats.
    #[serde(default = "default_match_threshold")]
    pub deck_match_threshold: u32,

    /// How long the chat layer should wait on an interactive deck
    /// re-confirmation before abandoning the attempt.
    #[serde(default = "default_confirm_timeout")]
    pub confirm_timeout_seconds: u64,
}

fn default_match_threshold() -> u32 {
    10
}

fn default_confirm_timeout() -> u64 {
    60
}

impl Default for LeagueDefaults {
    fn default() -> Self {
        Self {
            player_match_threshold: default_match_threshold(),
            deck_match_threshold: default_match_threshold(),
            confirm_timeout_seconds: default_confirm_timeout(),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "*".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub league: LeagueDefaults,

    #[serde(default)]
    pub server: ServerConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            scoring: ScoringConfig::default(),
            league: LeagueDefaults::default(),
            server: ServerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scoring.max_swing <= 0.0 {
            return Err(ConfigError::ValidationError(
                "scoring.max_swing must be positive".to_string(),
            ));
        }

        if self.scoring.curve_base <= 1.0 {
            return Err(ConfigError::ValidationError(
                "scoring.curve_base must be greater than 1".to_string(),
            ));
        }

        if self.scoring.floor < 0.0 {
            return Err(ConfigError::ValidationError(
                "scoring.floor must not be negative".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "Server port must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
