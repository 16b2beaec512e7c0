use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::state::AppState;
use crate::api::ApiError;
use crate::ledger::SeasonSummary;
use crate::models::{LeagueId, Season};
use crate::storage::LeagueSettings;

#[derive(Debug, Serialize)]
pub struct SeasonListResponse {
    pub seasons: Vec<Season>,
}

pub async fn list_seasons(
    State(state): State<AppState>,
    Path(league): Path<String>,
) -> Result<Json<SeasonListResponse>, ApiError> {
    let league = LeagueId::new(league);
    let seasons = state.ledger.seasons(&league).await?;
    Ok(Json(SeasonListResponse { seasons }))
}

pub async fn reset_season(
    State(state): State<AppState>,
    Path(league): Path<String>,
) -> Result<Json<SeasonSummary>, ApiError> {
    let league = LeagueId::new(league);
    let summary = state.ledger.reset_season(&league).await?;
    Ok(Json(summary))
}

pub async fn get_settings(
    State(state): State<AppState>,
    Path(league): Path<String>,
) -> Result<Json<LeagueSettings>, ApiError> {
    let league = LeagueId::new(league);
    let settings = state.ledger.settings(&league).await?;
    Ok(Json(settings))
}

#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    pub player_match_threshold: Option<u32>,
    pub deck_match_threshold: Option<u32>,
}

pub async fn update_settings(
    State(state): State<AppState>,
    Path(league): Path<String>,
    Json(req): Json<UpdateSettingsRequest>,
) -> Result<Json<LeagueSettings>, ApiError> {
    let league = LeagueId::new(league);
    let settings = state
        .ledger
        .update_settings(&league, req.player_match_threshold, req.deck_match_threshold)
        .await?;
    Ok(Json(settings))
}
