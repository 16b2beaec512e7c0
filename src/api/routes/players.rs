use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::state::AppState;
use crate::api::ApiError;
use crate::models::{LeagueId, MatchRecord, Player, PlayerId};
use crate::roster::LeaderboardSort;
use crate::stats::{self, PlayerDeckRow};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub player_id: PlayerId,
    pub display_name: String,
}

pub async fn register_player(
    State(state): State<AppState>,
    Path(league): Path<String>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<Player>, ApiError> {
    let league = LeagueId::new(league);
    let player = state
        .ledger
        .roster()
        .register(
            &league,
            req.player_id,
            &req.display_name,
            state.ledger.base_rating(),
        )
        .await?;
    Ok(Json(player))
}

#[derive(Debug, Serialize)]
pub struct PlayerListResponse {
    pub players: Vec<Player>,
}

pub async fn list_players(
    State(state): State<AppState>,
    Path(league): Path<String>,
) -> Result<Json<PlayerListResponse>, ApiError> {
    let league = LeagueId::new(league);
    let mut players = state.ledger.roster().list(&league).await?;
    players.sort_by(|a, b| a.display_name.cmp(&b.display_name));
    Ok(Json(PlayerListResponse { players }))
}

#[derive(Debug, Serialize)]
pub struct PlayerDetailResponse {
    #[serde(flatten)]
    pub player: Player,
    /// Matches still awaiting this player's confirmation.
    pub pending_matches: Vec<MatchRecord>,
    /// Per-deck record over accepted matches.
    pub decks: Vec<PlayerDeckRow>,
}

pub async fn get_player(
    State(state): State<AppState>,
    Path((league, player_id)): Path<(String, PlayerId)>,
) -> Result<Json<PlayerDetailResponse>, ApiError> {
    let league = LeagueId::new(league);
    let player = state.ledger.roster().require(&league, player_id).await?;
    let pending_matches = state.ledger.pending_for(&league, player_id).await?;
    let accepted = state
        .ledger
        .find_matches(&league, &Default::default(), 0)
        .await?;
    let decks = stats::player_deck_stats(&accepted, player_id);
    Ok(Json(PlayerDetailResponse {
        player,
        pending_matches,
        decks,
    }))
}

#[derive(Debug, Serialize)]
pub struct UnregisterResponse {
    pub removed: bool,
}

pub async fn unregister_player(
    State(state): State<AppState>,
    Path((league, player_id)): Path<(String, PlayerId)>,
) -> Result<Json<UnregisterResponse>, ApiError> {
    let league = LeagueId::new(league);
    state.ledger.roster().unregister(&league, player_id).await?;
    Ok(Json(UnregisterResponse { removed: true }))
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardParams {
    pub sort: Option<String>,
    pub limit: Option<usize>,
    /// Override the league's accepted-match threshold.
    pub min_games: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct LeaderboardResponse {
    pub sort: String,
    pub min_games: u32,
    pub players: Vec<Player>,
}

pub async fn leaderboard(
    State(state): State<AppState>,
    Path(league): Path<String>,
    Query(params): Query<LeaderboardParams>,
) -> Result<Json<LeaderboardResponse>, ApiError> {
    let league = LeagueId::new(league);
    let sort: LeaderboardSort = params
        .sort
        .as_deref()
        .unwrap_or("points")
        .parse()
        .map_err(ApiError::BadRequest)?;

    let min_games = match params.min_games {
        Some(t) => t,
        None => {
            state
                .ledger
                .settings(&league)
                .await?
                .player_match_threshold
        }
    };

    let players = state
        .ledger
        .roster()
        .leaderboard(&league, sort, min_games, params.limit.unwrap_or(0))
        .await?;

    Ok(Json(LeaderboardResponse {
        sort: params.sort.unwrap_or_else(|| "points".to_string()),
        min_games,
        players,
    }))
}
