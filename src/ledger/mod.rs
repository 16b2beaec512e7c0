//! Match ledger: lifecycle state machine for reported pod results.
//!
//! A reported match starts `Pending` with all four seats unconfirmed.
//! Each participant confirms (declaring a deck) or denies; when the
//! last confirmation lands the match transitions to `Accepted` and the
//! rating engine runs exactly once. `Accepted` is terminal.
//!
//! Commands arrive as independent tasks, so every mutating operation
//! holds a per-game async mutex for its whole read-check-mutate
//! sequence, and the acceptance transition re-checks the status inside
//! that critical section. Season rollovers take the league gate in
//! write mode while match operations hold it in read mode, so a reset
//! cannot interleave with an in-flight acceptance.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::catalog::DeckCatalog;
use crate::config::ScoringConfig;
use crate::error::LeagueError;
use crate::models::{
    GameId, LeagueId, MatchRecord, MatchStatus, Player, PlayerId, Season, POD_SIZE,
};
use crate::rating::{RatingDelta, RatingEngine};
use crate::roster::{LeaderboardSort, LeagueRoster};
use crate::storage::{LeagueSettings, LeagueStore};

/// Result of a confirm or admin-accept call.
#[derive(Debug, Clone, Serialize)]
pub struct ConfirmOutcome {
    pub game_id: GameId,
    pub status: MatchStatus,
    /// Present only on the call that completed acceptance.
    pub delta: Option<Vec<RatingDelta>>,
}

/// Read-side filter for match queries.
#[derive(Debug, Clone, Default)]
pub struct MatchFilter {
    pub status: Option<MatchStatus>,
    pub player: Option<PlayerId>,
    pub deck: Option<String>,
}

/// Result of a season rollover.
#[derive(Debug, Clone, Serialize)]
pub struct SeasonSummary {
    pub closed_season: u32,
    pub next_season: u32,
    /// Podium at close, best first.
    pub leaders: Vec<Player>,
}

/// Owns match records and drives their state machine.
pub struct MatchLedger {
    store: Arc<dyn LeagueStore>,
    roster: LeagueRoster,
    catalog: Arc<DeckCatalog>,
    rating: RatingEngine,
    base_rating: i64,
    match_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    report_locks: Mutex<HashMap<LeagueId, Arc<Mutex<()>>>>,
    season_gates: Mutex<HashMap<LeagueId, Arc<RwLock<()>>>>,
}

impl MatchLedger {
    pub fn new(
        store: Arc<dyn LeagueStore>,
        catalog: Arc<DeckCatalog>,
        scoring: ScoringConfig,
    ) -> Self {
        let base_rating = scoring.base_rating;
        Self {
            roster: LeagueRoster::new(store.clone()),
            rating: RatingEngine::new(scoring),
            store,
            catalog,
            base_rating,
            match_locks: Mutex::new(HashMap::new()),
            report_locks: Mutex::new(HashMap::new()),
            season_gates: Mutex::new(HashMap::new()),
        }
    }

    pub fn roster(&self) -> &LeagueRoster {
        &self.roster
    }

    pub fn catalog(&self) -> &DeckCatalog {
        &self.catalog
    }

    pub fn base_rating(&self) -> i64 {
        self.base_rating
    }

    /// Locks are created on first use and swept on each acquisition:
    /// an entry whose only reference is the map itself has no task
    /// holding or awaiting it and can be dropped, so the maps stay
    /// proportional to in-flight operations rather than to history.
    async fn match_lock(&self, league: &LeagueId, game_id: &GameId) -> Arc<Mutex<()>> {
        let key = format!("{}/{}", league, game_id);
        let mut locks = self.match_locks.lock().await;
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Serializes id allocation per league, so two simultaneous
    /// reports cannot derive the same id from the same snapshot.
    async fn report_lock(&self, league: &LeagueId) -> Arc<Mutex<()>> {
        let mut locks = self.report_locks.lock().await;
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks
            .entry(league.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn season_gate(&self, league: &LeagueId) -> Arc<RwLock<()>> {
        let mut gates = self.season_gates.lock().await;
        gates.retain(|_, gate| Arc::strong_count(gate) > 1);
        gates
            .entry(league.clone())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    #[cfg(test)]
    async fn match_lock_count(&self) -> usize {
        self.match_locks.lock().await.len()
    }

    /// Log a new match. `other_participant_ids` are the three losers;
    /// the winner reports. All four must be registered and distinct.
    pub async fn report_match(
        &self,
        league: &LeagueId,
        winner_id: PlayerId,
        other_participant_ids: &[PlayerId],
    ) -> Result<GameId, LeagueError> {
        let mut pod = vec![winner_id];
        pod.extend_from_slice(other_participant_ids);

        let distinct: HashSet<PlayerId> = pod.iter().copied().collect();
        if pod.len() != POD_SIZE || distinct.len() != POD_SIZE {
            return Err(LeagueError::InvalidParticipantCount { got: pod.len() });
        }
        for &player_id in &pod {
            self.roster.require(league, player_id).await?;
        }

        // Two reports landing in the same millisecond derive the same
        // seed; the lock makes the second see the first's saved id and
        // step past it.
        let lock = self.report_lock(league).await;
        let _guard = lock.lock().await;

        let existing: HashSet<String> = self
            .store
            .list_matches(league)
            .await?
            .into_iter()
            .map(|m| m.game_id.as_str().to_string())
            .collect();
        let seed = Utc::now().timestamp_millis() as u64;
        let game_id = GameId::allocate(seed, |candidate| existing.contains(candidate));

        let record = MatchRecord::new(game_id.clone(), winner_id, &pod);
        self.store.save_match(league, &record).await?;
        self.roster.push_pending(league, &pod, &game_id).await?;

        info!(%league, %game_id, winner_id, "match reported");
        Ok(game_id)
    }

    /// Confirm a match for one participant.
    ///
    /// With no `game_id` the caller's most recent pending match is
    /// targeted. `deck_name` resolves through the catalog; an
    /// unrecognized name is kept verbatim (soft failure), and a blank
    /// one falls back to the player's current deck.
    pub async fn confirm(
        &self,
        league: &LeagueId,
        game_id: Option<&GameId>,
        player_id: PlayerId,
        deck_name: Option<&str>,
    ) -> Result<ConfirmOutcome, LeagueError> {
        let player = self.roster.require(league, player_id).await?;
        let game_id = match game_id {
            Some(id) => id.clone(),
            None => player
                .latest_pending()
                .cloned()
                .ok_or(LeagueError::NoPendingMatches { player_id })?,
        };

        let gate = self.season_gate(league).await;
        let _gate = gate.read().await;
        let lock = self.match_lock(league, &game_id).await;
        let _guard = lock.lock().await;

        let mut record = self.load_required(league, &game_id).await?;
        if record.status == MatchStatus::Accepted {
            return Err(LeagueError::MatchAlreadyAccepted {
                game_id: game_id.as_str().to_string(),
            });
        }

        let seat = record
            .participant(player_id)
            .ok_or_else(|| LeagueError::NotAParticipant {
                player_id,
                game_id: game_id.as_str().to_string(),
            })?;
        if seat.confirmed {
            return Err(LeagueError::AlreadyConfirmed {
                game_id: game_id.as_str().to_string(),
            });
        }

        let deck = self.resolve_deck(deck_name, &player).await?;

        let is_winner = record.winner_id == player_id;
        if let Some(seat) = record.participant_mut(player_id) {
            seat.confirmed = true;
            seat.declared_deck = Some(deck.clone());
        }
        if is_winner {
            record.winning_deck = Some(deck.clone());
        }
        // A retracted vote that gets re-cast moves the dispute back
        // toward acceptance.
        if record.status == MatchStatus::Disputed {
            record.status = MatchStatus::Pending;
        }

        let delta = self.finalize_if_complete(league, &mut record).await?;

        // Only after the confirmation is persisted; a failed save must
        // not leave the player's current deck pointing at it.
        self.roster
            .update(league, player_id, |p| p.current_deck = Some(deck.clone()))
            .await?;
        debug!(%league, %game_id, player_id, accepted = delta.is_some(), "confirmation recorded");

        Ok(ConfirmOutcome {
            status: record.status,
            game_id,
            delta,
        })
    }

    /// Dispute a match. The denier's confirmation is retracted; an
    /// already-disputed match is left as is.
    pub async fn deny(
        &self,
        league: &LeagueId,
        game_id: &GameId,
        player_id: PlayerId,
    ) -> Result<ConfirmOutcome, LeagueError> {
        self.roster.require(league, player_id).await?;

        let gate = self.season_gate(league).await;
        let _gate = gate.read().await;
        let lock = self.match_lock(league, game_id).await;
        let _guard = lock.lock().await;

        let mut record = self.load_required(league, game_id).await?;
        if record.status == MatchStatus::Accepted {
            return Err(LeagueError::CannotDenyAccepted {
                game_id: game_id.as_str().to_string(),
            });
        }
        if !record.is_participant(player_id) {
            return Err(LeagueError::NotAParticipant {
                player_id,
                game_id: game_id.as_str().to_string(),
            });
        }

        if record.status == MatchStatus::Pending {
            record.status = MatchStatus::Disputed;
            if let Some(seat) = record.participant_mut(player_id) {
                seat.confirmed = false;
            }
            self.store.save_match(league, &record).await?;
            warn!(%league, %game_id, player_id, "match disputed");
        }

        Ok(ConfirmOutcome {
            status: record.status,
            game_id: game_id.clone(),
            delta: None,
        })
    }

    /// Admin override: force every seat confirmed and run acceptance.
    /// Used when a match is known good but a participant is
    /// unavailable.
    pub async fn admin_accept(
        &self,
        league: &LeagueId,
        game_id: &GameId,
    ) -> Result<ConfirmOutcome, LeagueError> {
        let gate = self.season_gate(league).await;
        let _gate = gate.read().await;
        let lock = self.match_lock(league, game_id).await;
        let _guard = lock.lock().await;

        let mut record = self.load_required(league, game_id).await?;
        if record.status == MatchStatus::Accepted {
            return Err(LeagueError::MatchAlreadyAccepted {
                game_id: game_id.as_str().to_string(),
            });
        }

        for seat in &mut record.participants {
            seat.confirmed = true;
        }
        if record.status == MatchStatus::Disputed {
            record.status = MatchStatus::Pending;
        }

        let delta = self.finalize_if_complete(league, &mut record).await?;
        info!(%league, %game_id, "match force-accepted");

        Ok(ConfirmOutcome {
            status: record.status,
            game_id: game_id.clone(),
            delta,
        })
    }

    /// Remove a non-accepted match. Only the reporting winner or an
    /// admin may remove; accepted matches are immutable history.
    pub async fn admin_remove(
        &self,
        league: &LeagueId,
        game_id: &GameId,
        requested_by: PlayerId,
        is_admin: bool,
    ) -> Result<(), LeagueError> {
        let gate = self.season_gate(league).await;
        let _gate = gate.read().await;
        let lock = self.match_lock(league, game_id).await;
        let _guard = lock.lock().await;

        let record = self.load_required(league, game_id).await?;
        if record.status == MatchStatus::Accepted {
            return Err(LeagueError::CannotOverrideAccepted {
                game_id: game_id.as_str().to_string(),
            });
        }
        if !is_admin && record.winner_id != requested_by {
            return Err(LeagueError::NotAuthorized);
        }

        self.roster.pull_pending(league, game_id).await?;
        self.store.delete_match(league, game_id).await?;
        info!(%league, %game_id, requested_by, "match removed");
        Ok(())
    }

    pub async fn get_match(
        &self,
        league: &LeagueId,
        game_id: &GameId,
    ) -> Result<Option<MatchRecord>, LeagueError> {
        Ok(self.store.load_match(league, game_id).await?)
    }

    /// Matches passing `filter`, most recent first.
    pub async fn find_matches(
        &self,
        league: &LeagueId,
        filter: &MatchFilter,
        limit: usize,
    ) -> Result<Vec<MatchRecord>, LeagueError> {
        let mut matches: Vec<MatchRecord> = self
            .store
            .list_matches(league)
            .await?
            .into_iter()
            .filter(|m| filter.status.map_or(true, |s| m.status == s))
            .filter(|m| filter.player.map_or(true, |p| m.is_participant(p)))
            .filter(|m| {
                filter.deck.as_deref().map_or(true, |d| {
                    m.participants
                        .iter()
                        .any(|p| p.declared_deck.as_deref() == Some(d))
                })
            })
            .collect();

        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if limit > 0 {
            matches.truncate(limit);
        }
        Ok(matches)
    }

    /// Matches still awaiting this player's confirmation.
    pub async fn pending_for(
        &self,
        league: &LeagueId,
        player_id: PlayerId,
    ) -> Result<Vec<MatchRecord>, LeagueError> {
        let player = self.roster.require(league, player_id).await?;
        let mut out = Vec::with_capacity(player.pending.len());
        for game_id in &player.pending {
            if let Some(record) = self.store.load_match(league, game_id).await? {
                out.push(record);
            }
        }
        Ok(out)
    }

    pub async fn settings(&self, league: &LeagueId) -> Result<LeagueSettings, LeagueError> {
        Ok(self.store.load_settings(league).await?)
    }

    pub async fn update_settings(
        &self,
        league: &LeagueId,
        player_match_threshold: Option<u32>,
        deck_match_threshold: Option<u32>,
    ) -> Result<LeagueSettings, LeagueError> {
        let mut settings = self.store.load_settings(league).await?;
        if let Some(t) = player_match_threshold {
            settings.player_match_threshold = t;
        }
        if let Some(t) = deck_match_threshold {
            settings.deck_match_threshold = t;
        }
        self.store.save_settings(league, &settings).await?;
        Ok(settings)
    }

    pub async fn seasons(&self, league: &LeagueId) -> Result<Vec<Season>, LeagueError> {
        let mut seasons = self.store.list_seasons(league).await?;
        seasons.sort_by_key(|s| s.season_number);
        Ok(seasons)
    }

    /// Close the current season and open the next: records the podium,
    /// awards badges, and resets every member to the base rating.
    ///
    /// Takes the league gate in write mode so no match can be accepted
    /// mid-reset.
    pub async fn reset_season(&self, league: &LeagueId) -> Result<SeasonSummary, LeagueError> {
        let gate = self.season_gate(league).await;
        let _gate = gate.write().await;

        let settings = self.store.load_settings(league).await?;
        let leaders = self
            .roster
            .leaderboard(
                league,
                LeaderboardSort::Points,
                settings.player_match_threshold,
                3,
            )
            .await?;

        let mut current = self
            .seasons(league)
            .await?
            .into_iter()
            .rev()
            .find(|s| s.is_open())
            .unwrap_or_else(|| Season::open(1));

        current.close(leaders.iter().map(|p| p.player_id).collect());
        self.store.save_season(league, &current).await?;

        for (rank, leader) in leaders.iter().enumerate() {
            self.roster
                .update(league, leader.player_id, |p| match rank {
                    0 => p.gold_badges += 1,
                    1 => p.silver_badges += 1,
                    _ => p.bronze_badges += 1,
                })
                .await?;
        }

        self.roster.reset_scores(league, self.base_rating).await?;

        let next = Season::open(current.season_number + 1);
        self.store.save_season(league, &next).await?;

        info!(
            %league,
            closed = current.season_number,
            next = next.season_number,
            "season rolled over"
        );

        Ok(SeasonSummary {
            closed_season: current.season_number,
            next_season: next.season_number,
            leaders,
        })
    }

    async fn load_required(
        &self,
        league: &LeagueId,
        game_id: &GameId,
    ) -> Result<MatchRecord, LeagueError> {
        self.store
            .load_match(league, game_id)
            .await?
            .ok_or_else(|| LeagueError::MatchNotFound {
                game_id: game_id.as_str().to_string(),
            })
    }

    /// Pick the deck name a confirmation stores: the resolved catalog
    /// name, the raw string when unrecognized, or the player's current
    /// deck when none was given.
    async fn resolve_deck(
        &self,
        deck_name: Option<&str>,
        player: &Player,
    ) -> Result<String, LeagueError> {
        let declared = deck_name.map(str::trim).filter(|s| !s.is_empty());
        match declared {
            Some(name) => match self.catalog.resolve(name).await {
                Some(deck) => Ok(deck.name),
                None => {
                    warn!(deck = name, "deck not recognized, storing raw name");
                    Ok(name.to_string())
                }
            },
            None => player
                .current_deck
                .clone()
                .ok_or(LeagueError::DeckRequired),
        }
    }

    /// The acceptance transition. Runs inside the caller's per-game
    /// critical section; the `status != Accepted` guard here is what
    /// makes rating application exactly-once. Saves the record in
    /// every branch.
    async fn finalize_if_complete(
        &self,
        league: &LeagueId,
        record: &mut MatchRecord,
    ) -> Result<Option<Vec<RatingDelta>>, LeagueError> {
        if record.status == MatchStatus::Accepted || !record.all_confirmed() {
            self.store.save_match(league, record).await?;
            return Ok(None);
        }

        // Ratings are read before any of the four are mutated, and the
        // deltas computed before the record is marked accepted so a
        // failure here leaves the match pending.
        let mut ratings: HashMap<PlayerId, i64> = HashMap::with_capacity(POD_SIZE);
        for seat in &record.participants {
            let player = self.roster.require(league, seat.player_id).await?;
            ratings.insert(player.player_id, player.rating);
        }
        let deltas = self.rating.compute(record, &ratings)?;

        record.status = MatchStatus::Accepted;
        self.store.save_match(league, record).await?;
        for delta in &deltas {
            let is_winner = delta.player_id == record.winner_id;
            self.roster
                .update(league, delta.player_id, |p| {
                    p.rating += delta.change;
                    p.accepted += 1;
                    if is_winner {
                        p.wins += 1;
                    } else {
                        p.losses += 1;
                    }
                })
                .await?;
        }

        self.roster.pull_pending(league, &record.game_id).await?;
        info!(%league, game_id = %record.game_id, winner_id = record.winner_id, "match accepted");
        Ok(Some(deltas))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Deck;
    use crate::storage::{JsonlStore, StorageError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::TempDir;

    fn league() -> LeagueId {
        LeagueId::new("test-league")
    }

    async fn ledger(temp: &TempDir) -> Arc<MatchLedger> {
        let store: Arc<dyn LeagueStore> = Arc::new(JsonlStore::new(temp.path().to_path_buf()));
        let catalog = Arc::new(DeckCatalog::load(store.clone()).await.unwrap());
        Arc::new(MatchLedger::new(store, catalog, ScoringConfig::default()))
    }

    async fn register_pod(ledger: &MatchLedger) {
        for id in 1..=4u64 {
            ledger
                .roster()
                .register(&league(), id, &format!("P{}", id), 1000)
                .await
                .unwrap();
        }
    }

    async fn report(ledger: &MatchLedger) -> GameId {
        ledger.report_match(&league(), 1, &[2, 3, 4]).await.unwrap()
    }

    #[tokio::test]
    async fn test_report_creates_pending_match() {
        let temp = TempDir::new().unwrap();
        let ledger = ledger(&temp).await;
        register_pod(&ledger).await;

        let game_id = report(&ledger).await;
        let record = ledger.get_match(&league(), &game_id).await.unwrap().unwrap();
        assert_eq!(record.status, MatchStatus::Pending);
        assert_eq!(record.winner_id, 1);
        assert_eq!(record.participants.len(), 4);

        for id in 1..=4 {
            let p = ledger.roster().require(&league(), id).await.unwrap();
            assert!(p.pending.contains(&game_id));
        }
    }

    #[tokio::test]
    async fn test_report_with_too_few_participants() {
        // A three-player report is rejected before any id is allocated.
        let temp = TempDir::new().unwrap();
        let ledger = ledger(&temp).await;
        register_pod(&ledger).await;

        let err = ledger.report_match(&league(), 1, &[2, 3]).await.unwrap_err();
        assert!(matches!(err, LeagueError::InvalidParticipantCount { got: 3 }));
        assert!(ledger
            .find_matches(&league(), &MatchFilter::default(), 0)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_report_with_duplicate_participants() {
        let temp = TempDir::new().unwrap();
        let ledger = ledger(&temp).await;
        register_pod(&ledger).await;

        let err = ledger.report_match(&league(), 1, &[2, 2, 3]).await.unwrap_err();
        assert!(matches!(err, LeagueError::InvalidParticipantCount { .. }));
    }

    #[tokio::test]
    async fn test_report_with_unregistered_participant() {
        let temp = TempDir::new().unwrap();
        let ledger = ledger(&temp).await;
        register_pod(&ledger).await;

        let err = ledger.report_match(&league(), 1, &[2, 3, 99]).await.unwrap_err();
        assert!(matches!(
            err,
            LeagueError::UnregisteredParticipant { player_id: 99 }
        ));
    }

    #[tokio::test]
    async fn test_full_confirmation_applies_ratings_once() {
        // Four even players: each loser drops 10, the winner nets +30.
        let temp = TempDir::new().unwrap();
        let ledger = ledger(&temp).await;
        register_pod(&ledger).await;
        let game_id = report(&ledger).await;

        for id in [1u64, 2, 3] {
            let outcome = ledger
                .confirm(&league(), Some(&game_id), id, Some("Rogue"))
                .await
                .unwrap();
            assert_eq!(outcome.status, MatchStatus::Pending);
            assert!(outcome.delta.is_none());
        }

        let outcome = ledger
            .confirm(&league(), Some(&game_id), 4, Some("Rogue"))
            .await
            .unwrap();
        assert_eq!(outcome.status, MatchStatus::Accepted);
        let delta = outcome.delta.unwrap();
        assert_eq!(delta.iter().map(|d| d.change).sum::<i64>(), 0);

        let winner = ledger.roster().require(&league(), 1).await.unwrap();
        assert_eq!(winner.rating, 1030);
        assert_eq!(winner.wins, 1);
        assert_eq!(winner.accepted, 1);
        assert!(winner.pending.is_empty());

        for id in [2u64, 3, 4] {
            let loser = ledger.roster().require(&league(), id).await.unwrap();
            assert_eq!(loser.rating, 990);
            assert_eq!(loser.losses, 1);
            assert_eq!(loser.accepted, loser.wins + loser.losses);
        }

        let record = ledger.get_match(&league(), &game_id).await.unwrap().unwrap();
        assert_eq!(record.status, MatchStatus::Accepted);
        assert_eq!(record.winning_deck.as_deref(), Some("Rogue"));
    }

    #[tokio::test]
    async fn test_confirm_after_acceptance_fails_without_mutation() {
        let temp = TempDir::new().unwrap();
        let ledger = ledger(&temp).await;
        register_pod(&ledger).await;
        let game_id = report(&ledger).await;

        for id in 1..=4u64 {
            ledger
                .confirm(&league(), Some(&game_id), id, Some("Rogue"))
                .await
                .unwrap();
        }

        let err = ledger
            .confirm(&league(), Some(&game_id), 4, Some("Rogue"))
            .await
            .unwrap_err();
        assert!(matches!(err, LeagueError::MatchAlreadyAccepted { .. }));

        // Ratings unchanged by the repeat call.
        let winner = ledger.roster().require(&league(), 1).await.unwrap();
        assert_eq!(winner.rating, 1030);
        assert_eq!(winner.wins, 1);
    }

    #[tokio::test]
    async fn test_double_confirm_same_seat_is_soft() {
        let temp = TempDir::new().unwrap();
        let ledger = ledger(&temp).await;
        register_pod(&ledger).await;
        let game_id = report(&ledger).await;

        ledger
            .confirm(&league(), Some(&game_id), 2, Some("Rogue"))
            .await
            .unwrap();
        let err = ledger
            .confirm(&league(), Some(&game_id), 2, Some("Rogue"))
            .await
            .unwrap_err();
        assert!(matches!(err, LeagueError::AlreadyConfirmed { .. }));
    }

    #[tokio::test]
    async fn test_confirm_by_non_participant() {
        let temp = TempDir::new().unwrap();
        let ledger = ledger(&temp).await;
        register_pod(&ledger).await;
        ledger
            .roster()
            .register(&league(), 5, "P5", 1000)
            .await
            .unwrap();
        let game_id = report(&ledger).await;

        let err = ledger
            .confirm(&league(), Some(&game_id), 5, Some("Rogue"))
            .await
            .unwrap_err();
        assert!(matches!(err, LeagueError::NotAParticipant { player_id: 5, .. }));
    }

    #[tokio::test]
    async fn test_confirm_defaults_to_latest_pending() {
        let temp = TempDir::new().unwrap();
        let ledger = ledger(&temp).await;
        register_pod(&ledger).await;
        let first = report(&ledger).await;
        let second = ledger.report_match(&league(), 2, &[1, 3, 4]).await.unwrap();

        let outcome = ledger.confirm(&league(), None, 1, Some("Rogue")).await.unwrap();
        assert_eq!(outcome.game_id, second);
        assert_ne!(outcome.game_id, first);
    }

    #[tokio::test]
    async fn test_confirm_without_deck_uses_current_then_fails() {
        let temp = TempDir::new().unwrap();
        let ledger = ledger(&temp).await;
        register_pod(&ledger).await;
        let game_id = report(&ledger).await;

        // No declared deck anywhere: rejected, state untouched.
        let err = ledger
            .confirm(&league(), Some(&game_id), 2, None)
            .await
            .unwrap_err();
        assert!(matches!(err, LeagueError::DeckRequired));
        let record = ledger.get_match(&league(), &game_id).await.unwrap().unwrap();
        assert!(!record.participant(2).unwrap().confirmed);

        // With a current deck the blank confirmation goes through.
        ledger
            .roster()
            .update(&league(), 2, |p| p.current_deck = Some("Rogue".to_string()))
            .await
            .unwrap();
        let outcome = ledger.confirm(&league(), Some(&game_id), 2, None).await.unwrap();
        assert_eq!(outcome.status, MatchStatus::Pending);
        let record = ledger.get_match(&league(), &game_id).await.unwrap().unwrap();
        assert_eq!(record.deck_of(2), Some("Rogue"));
    }

    #[tokio::test]
    async fn test_unrecognized_deck_stored_verbatim() {
        let temp = TempDir::new().unwrap();
        let ledger = ledger(&temp).await;
        register_pod(&ledger).await;
        let game_id = report(&ledger).await;

        ledger
            .confirm(&league(), Some(&game_id), 2, Some("My Homebrew Pile"))
            .await
            .unwrap();
        let record = ledger.get_match(&league(), &game_id).await.unwrap().unwrap();
        assert_eq!(record.deck_of(2), Some("My Homebrew Pile"));
    }

    #[tokio::test]
    async fn test_deny_then_admin_accept() {
        // Two confirms, a denial, then an admin override completes it.
        let temp = TempDir::new().unwrap();
        let ledger = ledger(&temp).await;
        register_pod(&ledger).await;
        let game_id = report(&ledger).await;

        ledger
            .confirm(&league(), Some(&game_id), 1, Some("Rogue"))
            .await
            .unwrap();
        ledger
            .confirm(&league(), Some(&game_id), 2, Some("Rogue"))
            .await
            .unwrap();
        let outcome = ledger.deny(&league(), &game_id, 3).await.unwrap();
        assert_eq!(outcome.status, MatchStatus::Disputed);

        let record = ledger.get_match(&league(), &game_id).await.unwrap().unwrap();
        assert!(record.participant(1).unwrap().confirmed);
        assert!(record.participant(2).unwrap().confirmed);
        assert!(!record.participant(3).unwrap().confirmed);

        let outcome = ledger.admin_accept(&league(), &game_id).await.unwrap();
        assert_eq!(outcome.status, MatchStatus::Accepted);
        let delta = outcome.delta.unwrap();
        assert_eq!(delta.iter().map(|d| d.change).sum::<i64>(), 0);

        let winner = ledger.roster().require(&league(), 1).await.unwrap();
        assert_eq!(winner.rating, 1030);
    }

    #[tokio::test]
    async fn test_deny_is_idempotent_and_accepted_is_terminal() {
        let temp = TempDir::new().unwrap();
        let ledger = ledger(&temp).await;
        register_pod(&ledger).await;
        let game_id = report(&ledger).await;

        ledger.deny(&league(), &game_id, 2).await.unwrap();
        let outcome = ledger.deny(&league(), &game_id, 3).await.unwrap();
        assert_eq!(outcome.status, MatchStatus::Disputed);

        ledger.admin_accept(&league(), &game_id).await.unwrap();
        let err = ledger.deny(&league(), &game_id, 2).await.unwrap_err();
        assert!(matches!(err, LeagueError::CannotDenyAccepted { .. }));
    }

    #[tokio::test]
    async fn test_reconfirm_recovers_dispute() {
        let temp = TempDir::new().unwrap();
        let ledger = ledger(&temp).await;
        register_pod(&ledger).await;
        let game_id = report(&ledger).await;

        ledger.deny(&league(), &game_id, 3).await.unwrap();
        let outcome = ledger
            .confirm(&league(), Some(&game_id), 3, Some("Rogue"))
            .await
            .unwrap();
        assert_eq!(outcome.status, MatchStatus::Pending);
    }

    #[tokio::test]
    async fn test_remove_pending_match() {
        let temp = TempDir::new().unwrap();
        let ledger = ledger(&temp).await;
        register_pod(&ledger).await;
        let game_id = report(&ledger).await;

        // A loser cannot remove someone else's report.
        let err = ledger
            .admin_remove(&league(), &game_id, 2, false)
            .await
            .unwrap_err();
        assert!(matches!(err, LeagueError::NotAuthorized));

        // The reporting winner can.
        ledger.admin_remove(&league(), &game_id, 1, false).await.unwrap();
        assert!(ledger.get_match(&league(), &game_id).await.unwrap().is_none());
        for id in 1..=4 {
            assert!(ledger
                .roster()
                .require(&league(), id)
                .await
                .unwrap()
                .pending
                .is_empty());
        }
    }

    #[tokio::test]
    async fn test_remove_accepted_match_rejected() {
        let temp = TempDir::new().unwrap();
        let ledger = ledger(&temp).await;
        register_pod(&ledger).await;
        let game_id = report(&ledger).await;
        ledger.admin_accept(&league(), &game_id).await.unwrap();

        let err = ledger
            .admin_remove(&league(), &game_id, 1, true)
            .await
            .unwrap_err();
        assert!(matches!(err, LeagueError::CannotOverrideAccepted { .. }));
        assert!(ledger.get_match(&league(), &game_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_admin_accept_twice_fails() {
        let temp = TempDir::new().unwrap();
        let ledger = ledger(&temp).await;
        register_pod(&ledger).await;
        let game_id = report(&ledger).await;

        ledger.admin_accept(&league(), &game_id).await.unwrap();
        let err = ledger.admin_accept(&league(), &game_id).await.unwrap_err();
        assert!(matches!(err, LeagueError::MatchAlreadyAccepted { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_final_confirmations_apply_once() {
        // The final confirmation fired twice concurrently.
        let temp = TempDir::new().unwrap();
        let ledger = ledger(&temp).await;
        register_pod(&ledger).await;
        let game_id = report(&ledger).await;

        for id in [1u64, 2, 3] {
            ledger
                .confirm(&league(), Some(&game_id), id, Some("Rogue"))
                .await
                .unwrap();
        }

        let a = {
            let ledger = ledger.clone();
            let game_id = game_id.clone();
            tokio::spawn(async move {
                ledger
                    .confirm(&league(), Some(&game_id), 4, Some("Rogue"))
                    .await
            })
        };
        let b = {
            let ledger = ledger.clone();
            let game_id = game_id.clone();
            tokio::spawn(async move {
                ledger
                    .confirm(&league(), Some(&game_id), 4, Some("Rogue"))
                    .await
            })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        let deltas: Vec<_> = results
            .iter()
            .filter_map(|r| r.as_ref().ok())
            .filter_map(|o| o.delta.as_ref())
            .collect();
        let losers = results
            .iter()
            .filter(|r| {
                matches!(
                    r,
                    Err(LeagueError::MatchAlreadyAccepted { .. })
                        | Err(LeagueError::AlreadyConfirmed { .. })
                )
            })
            .count();

        assert_eq!(deltas.len(), 1, "exactly one caller gets the delta");
        assert_eq!(losers, 1, "the other observes terminal state");

        let winner = ledger.roster().require(&league(), 1).await.unwrap();
        assert_eq!(winner.rating, 1030, "ratings applied exactly once");
    }

    #[tokio::test]
    async fn test_find_matches_filters_and_orders() {
        let temp = TempDir::new().unwrap();
        let ledger = ledger(&temp).await;
        register_pod(&ledger).await;
        let first = report(&ledger).await;
        let second = ledger.report_match(&league(), 2, &[1, 3, 4]).await.unwrap();
        ledger.admin_accept(&league(), &first).await.unwrap();

        let all = ledger
            .find_matches(&league(), &MatchFilter::default(), 0)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].game_id, second, "most recent first");

        let accepted = ledger
            .find_matches(
                &league(),
                &MatchFilter {
                    status: Some(MatchStatus::Accepted),
                    ..Default::default()
                },
                0,
            )
            .await
            .unwrap();
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].game_id, first);
    }

    #[tokio::test]
    async fn test_season_rollover() {
        let temp = TempDir::new().unwrap();
        let ledger = ledger(&temp).await;
        register_pod(&ledger).await;
        ledger
            .update_settings(&league(), Some(0), None)
            .await
            .unwrap();

        let game_id = report(&ledger).await;
        ledger.admin_accept(&league(), &game_id).await.unwrap();

        let summary = ledger.reset_season(&league()).await.unwrap();
        assert_eq!(summary.closed_season, 1);
        assert_eq!(summary.next_season, 2);
        assert_eq!(summary.leaders[0].player_id, 1);

        let winner = ledger.roster().require(&league(), 1).await.unwrap();
        assert_eq!(winner.rating, 1000);
        assert_eq!(winner.wins, 0);
        assert_eq!(winner.gold_badges, 1);

        let seasons = ledger.seasons(&league()).await.unwrap();
        assert_eq!(seasons.len(), 2);
        assert!(!seasons[0].is_open());
        assert!(seasons[1].is_open());
        assert_eq!(seasons[0].leaders[0], 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_reports_get_distinct_ids() {
        let temp = TempDir::new().unwrap();
        let ledger = ledger(&temp).await;
        register_pod(&ledger).await;

        for round in 0..10 {
            let a = {
                let ledger = ledger.clone();
                tokio::spawn(async move { ledger.report_match(&league(), 1, &[2, 3, 4]).await })
            };
            let b = {
                let ledger = ledger.clone();
                tokio::spawn(async move { ledger.report_match(&league(), 2, &[1, 3, 4]).await })
            };
            let first = a.await.unwrap().unwrap();
            let second = b.await.unwrap().unwrap();
            assert_ne!(first, second, "id collision on round {}", round);

            let record = ledger.get_match(&league(), &first).await.unwrap().unwrap();
            assert_eq!(record.winner_id, 1);
            let record = ledger.get_match(&league(), &second).await.unwrap().unwrap();
            assert_eq!(record.winner_id, 2);
        }

        let all = ledger
            .find_matches(&league(), &MatchFilter::default(), 0)
            .await
            .unwrap();
        assert_eq!(all.len(), 20, "every report kept its own record");
    }

    #[tokio::test]
    async fn test_lock_maps_stay_bounded() {
        let temp = TempDir::new().unwrap();
        let ledger = ledger(&temp).await;
        register_pod(&ledger).await;

        for _ in 0..5 {
            let game_id = report(&ledger).await;
            ledger.admin_accept(&league(), &game_id).await.unwrap();
        }

        // Settled matches leave no lock behind once the next
        // acquisition sweeps.
        assert!(ledger.match_lock_count().await <= 1);
    }

    /// Store wrapper that fails the next match save on demand.
    struct FailingSaveStore {
        inner: JsonlStore,
        fail_next_match_save: AtomicBool,
    }

    impl FailingSaveStore {
        fn new(data_dir: std::path::PathBuf) -> Self {
            Self {
                inner: JsonlStore::new(data_dir),
                fail_next_match_save: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl LeagueStore for FailingSaveStore {
        async fn load_player(
            &self,
            league: &LeagueId,
            player_id: PlayerId,
        ) -> Result<Option<Player>, StorageError> {
            self.inner.load_player(league, player_id).await
        }

        async fn save_player(
            &self,
            league: &LeagueId,
            player: &Player,
        ) -> Result<(), StorageError> {
            self.inner.save_player(league, player).await
        }

        async fn delete_player(
            &self,
            league: &LeagueId,
            player_id: PlayerId,
        ) -> Result<bool, StorageError> {
            self.inner.delete_player(league, player_id).await
        }

        async fn list_players(&self, league: &LeagueId) -> Result<Vec<Player>, StorageError> {
            self.inner.list_players(league).await
        }

        async fn load_match(
            &self,
            league: &LeagueId,
            game_id: &GameId,
        ) -> Result<Option<MatchRecord>, StorageError> {
            self.inner.load_match(league, game_id).await
        }

        async fn save_match(
            &self,
            league: &LeagueId,
            record: &MatchRecord,
        ) -> Result<(), StorageError> {
            if self.fail_next_match_save.swap(false, Ordering::SeqCst) {
                return Err(StorageError::Io(std::io::Error::other("disk full")));
            }
            self.inner.save_match(league, record).await
        }

        async fn delete_match(
            &self,
            league: &LeagueId,
            game_id: &GameId,
        ) -> Result<bool, StorageError> {
            self.inner.delete_match(league, game_id).await
        }

        async fn list_matches(&self, league: &LeagueId) -> Result<Vec<MatchRecord>, StorageError> {
            self.inner.list_matches(league).await
        }

        async fn save_deck(&self, deck: &Deck) -> Result<(), StorageError> {
            self.inner.save_deck(deck).await
        }

        async fn delete_deck(&self, name: &str) -> Result<bool, StorageError> {
            self.inner.delete_deck(name).await
        }

        async fn list_decks(&self) -> Result<Vec<Deck>, StorageError> {
            self.inner.list_decks().await
        }

        async fn save_season(
            &self,
            league: &LeagueId,
            season: &Season,
        ) -> Result<(), StorageError> {
            self.inner.save_season(league, season).await
        }

        async fn list_seasons(&self, league: &LeagueId) -> Result<Vec<Season>, StorageError> {
            self.inner.list_seasons(league).await
        }

        async fn load_settings(&self, league: &LeagueId) -> Result<LeagueSettings, StorageError> {
            self.inner.load_settings(league).await
        }

        async fn save_settings(
            &self,
            league: &LeagueId,
            settings: &LeagueSettings,
        ) -> Result<(), StorageError> {
            self.inner.save_settings(league, settings).await
        }
    }

    #[tokio::test]
    async fn test_failed_save_leaves_current_deck_untouched() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(FailingSaveStore::new(temp.path().to_path_buf()));
        let dyn_store: Arc<dyn LeagueStore> = store.clone();
        let catalog = Arc::new(DeckCatalog::load(dyn_store.clone()).await.unwrap());
        let ledger = MatchLedger::new(dyn_store, catalog, ScoringConfig::default());
        register_pod(&ledger).await;
        let game_id = report(&ledger).await;

        store.fail_next_match_save.store(true, Ordering::SeqCst);
        let err = ledger
            .confirm(&league(), Some(&game_id), 2, Some("Rogue"))
            .await
            .unwrap_err();
        assert!(matches!(err, LeagueError::Storage(_)));

        let record = ledger.get_match(&league(), &game_id).await.unwrap().unwrap();
        assert!(!record.participant(2).unwrap().confirmed);
        let player = ledger.roster().require(&league(), 2).await.unwrap();
        assert!(player.current_deck.is_none());

        // The retry goes through and sets both.
        ledger
            .confirm(&league(), Some(&game_id), 2, Some("Rogue"))
            .await
            .unwrap();
        let player = ledger.roster().require(&league(), 2).await.unwrap();
        assert_eq!(player.current_deck.as_deref(), Some("Rogue"));
    }

    #[tokio::test]
    async fn test_monotone_counters_across_operations() {
        let temp = TempDir::new().unwrap();
        let ledger = ledger(&temp).await;
        register_pod(&ledger).await;

        for winner in [1u64, 2, 3] {
            let others: Vec<PlayerId> = (1..=4).filter(|&id| id != winner).collect();
            let game_id = ledger.report_match(&league(), winner, &others).await.unwrap();
            ledger.admin_accept(&league(), &game_id).await.unwrap();

            for id in 1..=4 {
                let p = ledger.roster().require(&league(), id).await.unwrap();
                assert_eq!(p.accepted, p.wins + p.losses);
            }
        }
    }
}
