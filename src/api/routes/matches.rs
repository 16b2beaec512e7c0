use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::state::AppState;
use crate::api::ApiError;
use crate::ledger::{ConfirmOutcome, MatchFilter};
use crate::models::{GameId, LeagueId, MatchRecord, MatchStatus, PlayerId};

#[derive(Debug, Deserialize)]
pub struct ReportMatchRequest {
    pub winner_id: PlayerId,
    /// The three non-winning participants.
    pub other_participant_ids: Vec<PlayerId>,
}

#[derive(Debug, Serialize)]
pub struct ReportMatchResponse {
    pub game_id: GameId,
}

pub async fn report_match(
    State(state): State<AppState>,
    Path(league): Path<String>,
    Json(req): Json<ReportMatchRequest>,
) -> Result<Json<ReportMatchResponse>, ApiError> {
    let league = LeagueId::new(league);
    let game_id = state
        .ledger
        .report_match(&league, req.winner_id, &req.other_participant_ids)
        .await?;
    Ok(Json(ReportMatchResponse { game_id }))
}

#[derive(Debug, Deserialize)]
pub struct ListMatchesParams {
    pub status: Option<MatchStatus>,
    pub player: Option<PlayerId>,
    pub deck: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct MatchListResponse {
    pub matches: Vec<MatchRecord>,
}

pub async fn list_matches(
    State(state): State<AppState>,
    Path(league): Path<String>,
    Query(params): Query<ListMatchesParams>,
) -> Result<Json<MatchListResponse>, ApiError> {
    let league = LeagueId::new(league);
    let filter = MatchFilter {
        status: params.status,
        player: params.player,
        deck: params.deck,
    };
    let matches = state
        .ledger
        .find_matches(&league, &filter, params.limit.unwrap_or(50))
        .await?;
    Ok(Json(MatchListResponse { matches }))
}

pub async fn get_match(
    State(state): State<AppState>,
    Path((league, game_id)): Path<(String, String)>,
) -> Result<Json<MatchRecord>, ApiError> {
    let league = LeagueId::new(league);
    let game_id = GameId::new(game_id);
    let record = state
        .ledger
        .get_match(&league, &game_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Match not found: {}", game_id)))?;
    Ok(Json(record))
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub player_id: PlayerId,
    pub deck: Option<String>,
}

pub async fn confirm_match(
    State(state): State<AppState>,
    Path((league, game_id)): Path<(String, String)>,
    Json(req): Json<ConfirmRequest>,
) -> Result<Json<ConfirmOutcome>, ApiError> {
    let league = LeagueId::new(league);
    let game_id = GameId::new(game_id);
    let outcome = state
        .ledger
        .confirm(&league, Some(&game_id), req.player_id, req.deck.as_deref())
        .await?;
    Ok(Json(outcome))
}

/// Confirm the caller's most recent pending match.
pub async fn confirm_latest(
    State(state): State<AppState>,
    Path(league): Path<String>,
    Json(req): Json<ConfirmRequest>,
) -> Result<Json<ConfirmOutcome>, ApiError> {
    let league = LeagueId::new(league);
    let outcome = state
        .ledger
        .confirm(&league, None, req.player_id, req.deck.as_deref())
        .await?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
pub struct DenyRequest {
    pub player_id: PlayerId,
}

pub async fn deny_match(
    State(state): State<AppState>,
    Path((league, game_id)): Path<(String, String)>,
    Json(req): Json<DenyRequest>,
) -> Result<Json<ConfirmOutcome>, ApiError> {
    let league = LeagueId::new(league);
    let game_id = GameId::new(game_id);
    let outcome = state.ledger.deny(&league, &game_id, req.player_id).await?;
    Ok(Json(outcome))
}

pub async fn accept_match(
    State(state): State<AppState>,
    Path((league, game_id)): Path<(String, String)>,
) -> Result<Json<ConfirmOutcome>, ApiError> {
    let league = LeagueId::new(league);
    let game_id = GameId::new(game_id);
    let outcome = state.ledger.admin_accept(&league, &game_id).await?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
pub struct RemoveMatchParams {
    pub requested_by: PlayerId,
    #[serde(default)]
    pub admin: bool,
}

#[derive(Debug, Serialize)]
pub struct RemoveMatchResponse {
    pub removed: bool,
}

pub async fn remove_match(
    State(state): State<AppState>,
    Path((league, game_id)): Path<(String, String)>,
    Query(params): Query<RemoveMatchParams>,
) -> Result<Json<RemoveMatchResponse>, ApiError> {
    let league = LeagueId::new(league);
    let game_id = GameId::new(game_id);
    state
        .ledger
        .admin_remove(&league, &game_id, params.requested_by, params.admin)
        .await?;
    Ok(Json(RemoveMatchResponse { removed: true }))
}
