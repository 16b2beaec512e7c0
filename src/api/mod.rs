//! REST API endpoints.
//!
//! Axum-based HTTP API over the match ledger: reporting and confirming
//! matches, rosters, the deck catalog, and derived statistics.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::LeagueError;

pub mod routes;
pub mod state;

use state::AppState;

/// API error types.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<LeagueError> for ApiError {
    fn from(err: LeagueError) -> Self {
        let message = err.to_string();
        match err {
            LeagueError::MatchNotFound { .. }
            | LeagueError::DeckNotFound { .. }
            | LeagueError::UnregisteredParticipant { .. } => ApiError::NotFound(message),

            LeagueError::AlreadyRegistered { .. }
            | LeagueError::AlreadyConfirmed { .. }
            | LeagueError::MatchAlreadyAccepted { .. }
            | LeagueError::CannotOverrideAccepted { .. }
            | LeagueError::CannotDenyAccepted { .. } => ApiError::Conflict(message),

            LeagueError::InvalidParticipantCount { .. }
            | LeagueError::NotAParticipant { .. }
            | LeagueError::NoPendingMatches { .. }
            | LeagueError::DeckRequired => ApiError::BadRequest(message),

            LeagueError::NotAuthorized => ApiError::Forbidden(message),

            LeagueError::Storage(_) => ApiError::Internal(message),
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Assemble the full API router.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health))
        .route(
            "/api/decks",
            get(routes::decks::list_decks).post(routes::decks::add_deck),
        )
        .route("/api/decks/:name", delete(routes::decks::remove_deck))
        .route("/api/decks/:name/aliases", post(routes::decks::add_aliases))
        .route(
            "/api/leagues/:league/players",
            get(routes::players::list_players).post(routes::players::register_player),
        )
        .route(
            "/api/leagues/:league/players/:player_id",
            get(routes::players::get_player).delete(routes::players::unregister_player),
        )
        .route(
            "/api/leagues/:league/leaderboard",
            get(routes::players::leaderboard),
        )
        .route(
            "/api/leagues/:league/matches",
            get(routes::matches::list_matches).post(routes::matches::report_match),
        )
        .route(
            "/api/leagues/:league/matches/:game_id",
            get(routes::matches::get_match).delete(routes::matches::remove_match),
        )
        .route(
            "/api/leagues/:league/matches/:game_id/confirm",
            post(routes::matches::confirm_match),
        )
        .route(
            "/api/leagues/:league/matches/:game_id/deny",
            post(routes::matches::deny_match),
        )
        .route(
            "/api/leagues/:league/matches/:game_id/accept",
            post(routes::matches::accept_match),
        )
        .route(
            "/api/leagues/:league/confirm",
            post(routes::matches::confirm_latest),
        )
        .route("/api/leagues/:league/meta", get(routes::decks::deck_meta))
        .route(
            "/api/leagues/:league/seasons",
            get(routes::seasons::list_seasons),
        )
        .route(
            "/api/leagues/:league/seasons/reset",
            post(routes::seasons::reset_season),
        )
        .route(
            "/api/leagues/:league/settings",
            get(routes::seasons::get_settings).patch(routes::seasons::update_settings),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
