use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::state::AppState;
use crate::api::ApiError;
use crate::ledger::MatchFilter;
use crate::models::{Deck, LeagueId, MatchStatus};
use crate::stats::{self, DeckMetaRow};

#[derive(Debug, Serialize)]
pub struct DeckListResponse {
    pub decks: Vec<Deck>,
}

pub async fn list_decks(
    State(state): State<AppState>,
) -> Result<Json<DeckListResponse>, ApiError> {
    let decks = state.ledger.catalog().list().await?;
    Ok(Json(DeckListResponse { decks }))
}

#[derive(Debug, Deserialize)]
pub struct AddDeckRequest {
    pub name: String,
    #[serde(default)]
    pub color_identity: String,
    #[serde(default)]
    pub commanders: Vec<String>,
    pub link: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AddDeckResponse {
    pub deck: Deck,
    pub created: bool,
}

pub async fn add_deck(
    State(state): State<AppState>,
    Json(req): Json<AddDeckRequest>,
) -> Result<Json<AddDeckResponse>, ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("deck name must not be empty".to_string()));
    }

    let mut deck = Deck::new(req.name.trim(), &req.color_identity).with_commanders(req.commanders);
    if let Some(link) = req.link {
        deck = deck.with_link(link);
    }

    let created = state.ledger.catalog().add_deck(deck.clone()).await?;
    let deck = state
        .ledger
        .catalog()
        .resolve(&deck.name)
        .await
        .unwrap_or(deck);
    Ok(Json(AddDeckResponse { deck, created }))
}

#[derive(Debug, Deserialize)]
pub struct AddAliasesRequest {
    pub aliases: Vec<String>,
}

pub async fn add_aliases(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<AddAliasesRequest>,
) -> Result<Json<Deck>, ApiError> {
    let deck = state
        .ledger
        .catalog()
        .add_aliases(&name, &req.aliases)
        .await?;
    Ok(Json(deck))
}

#[derive(Debug, Serialize)]
pub struct RemoveDeckResponse {
    pub removed: bool,
}

pub async fn remove_deck(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<RemoveDeckResponse>, ApiError> {
    let removed = state.ledger.catalog().remove_deck(&name).await?;
    if !removed {
        return Err(ApiError::NotFound(format!("Deck not found: {}", name)));
    }
    Ok(Json(RemoveDeckResponse { removed }))
}

#[derive(Debug, Deserialize)]
pub struct DeckMetaParams {
    /// Override the league's deck-entry threshold.
    pub min_entries: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct DeckMetaResponse {
    pub min_entries: u32,
    pub decks: Vec<DeckMetaRow>,
}

/// League-wide deck meta over accepted matches.
pub async fn deck_meta(
    State(state): State<AppState>,
    Path(league): Path<String>,
    Query(params): Query<DeckMetaParams>,
) -> Result<Json<DeckMetaResponse>, ApiError> {
    let league = LeagueId::new(league);
    let min_entries = match params.min_entries {
        Some(t) => t,
        None => state.ledger.settings(&league).await?.deck_match_threshold,
    };

    let filter = MatchFilter {
        status: Some(MatchStatus::Accepted),
        ..Default::default()
    };
    let matches = state.ledger.find_matches(&league, &filter, 0).await?;
    let decks = stats::deck_meta(&matches, min_entries);

    Ok(Json(DeckMetaResponse { min_entries, decks }))
}
