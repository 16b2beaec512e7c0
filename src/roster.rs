//! League roster.
//!
//! Aggregate store for per-player state. No business rules live here:
//! ratings and counters are written only through the ledger and rating
//! engine, and this layer just gives them a uniform seam over the
//! document store.

use std::str::FromStr;
use std::sync::Arc;

use tracing::info;

use crate::error::LeagueError;
use crate::models::{GameId, LeagueId, Player, PlayerId};
use crate::storage::LeagueStore;

/// Sort keys for the player leaderboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderboardSort {
    Points,
    Wins,
    Accepted,
    WinRate,
}

impl FromStr for LeaderboardSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "points" | "rating" => Ok(Self::Points),
            "wins" => Ok(Self::Wins),
            "accepted" | "games" => Ok(Self::Accepted),
            "winrate" => Ok(Self::WinRate),
            other => Err(format!("unknown leaderboard sort: {}", other)),
        }
    }
}

/// Per-player aggregate state for one or more leagues.
#[derive(Clone)]
pub struct LeagueRoster {
    store: Arc<dyn LeagueStore>,
}

impl LeagueRoster {
    pub fn new(store: Arc<dyn LeagueStore>) -> Self {
        Self { store }
    }

    /// Register a new member at the base rating.
    pub async fn register(
        &self,
        league: &LeagueId,
        player_id: PlayerId,
        display_name: &str,
        base_rating: i64,
    ) -> Result<Player, LeagueError> {
        if self.store.load_player(league, player_id).await?.is_some() {
            return Err(LeagueError::AlreadyRegistered { player_id });
        }
        let mut player = Player::new(player_id, display_name.to_string());
        player.rating = base_rating;
        self.store.save_player(league, &player).await?;
        info!(%league, player_id, "registered player");
        Ok(player)
    }

    /// Remove a member entirely. Match history is untouched.
    pub async fn unregister(
        &self,
        league: &LeagueId,
        player_id: PlayerId,
    ) -> Result<(), LeagueError> {
        if !self.store.delete_player(league, player_id).await? {
            return Err(LeagueError::UnregisteredParticipant { player_id });
        }
        info!(%league, player_id, "unregistered player");
        Ok(())
    }

    pub async fn get(
        &self,
        league: &LeagueId,
        player_id: PlayerId,
    ) -> Result<Option<Player>, LeagueError> {
        Ok(self.store.load_player(league, player_id).await?)
    }

    /// Load a player or fail with `UnregisteredParticipant`.
    pub async fn require(
        &self,
        league: &LeagueId,
        player_id: PlayerId,
    ) -> Result<Player, LeagueError> {
        self.get(league, player_id)
            .await?
            .ok_or(LeagueError::UnregisteredParticipant { player_id })
    }

    pub async fn save(&self, league: &LeagueId, player: &Player) -> Result<(), LeagueError> {
        Ok(self.store.save_player(league, player).await?)
    }

    /// Read-modify-write a single player document.
    pub async fn update<F>(
        &self,
        league: &LeagueId,
        player_id: PlayerId,
        mutate: F,
    ) -> Result<Player, LeagueError>
    where
        F: FnOnce(&mut Player),
    {
        let mut player = self.require(league, player_id).await?;
        mutate(&mut player);
        self.save(league, &player).await?;
        Ok(player)
    }

    /// Add a match to each listed player's pending set.
    pub async fn push_pending(
        &self,
        league: &LeagueId,
        player_ids: &[PlayerId],
        game_id: &GameId,
    ) -> Result<(), LeagueError> {
        for &player_id in player_ids {
            self.update(league, player_id, |p| {
                if !p.pending.contains(game_id) {
                    p.pending.push(game_id.clone());
                }
            })
            .await?;
        }
        Ok(())
    }

    /// Drop a match from every player's pending set.
    pub async fn pull_pending(
        &self,
        league: &LeagueId,
        game_id: &GameId,
    ) -> Result<(), LeagueError> {
        for player in self.store.list_players(league).await? {
            if player.pending.contains(game_id) {
                self.update(league, player.player_id, |p| {
                    p.pending.retain(|g| g != game_id);
                })
                .await?;
            }
        }
        Ok(())
    }

    pub async fn list(&self, league: &LeagueId) -> Result<Vec<Player>, LeagueError> {
        Ok(self.store.list_players(league).await?)
    }

    /// Ranked members, best first. Players below `min_games` accepted
    /// matches are filtered out.
    pub async fn leaderboard(
        &self,
        league: &LeagueId,
        sort: LeaderboardSort,
        min_games: u32,
        limit: usize,
    ) -> Result<Vec<Player>, LeagueError> {
        let mut players: Vec<Player> = self
            .store
            .list_players(league)
            .await?
            .into_iter()
            .filter(|p| p.accepted >= min_games)
            .collect();

        match sort {
            LeaderboardSort::Points => players.sort_by(|a, b| b.rating.cmp(&a.rating)),
            LeaderboardSort::Wins => players.sort_by(|a, b| b.wins.cmp(&a.wins)),
            LeaderboardSort::Accepted => players.sort_by(|a, b| b.accepted.cmp(&a.accepted)),
            LeaderboardSort::WinRate => players.sort_by(|a, b| {
                b.win_rate()
                    .partial_cmp(&a.win_rate())
                    .unwrap_or(std::cmp::Ordering::Equal)
            }),
        }

        if limit > 0 {
            players.truncate(limit);
        }
        Ok(players)
    }

    /// Reset every member's season-scoped fields to the base rating.
    pub async fn reset_scores(&self, league: &LeagueId, base_rating: i64) -> Result<u32, LeagueError> {
        let mut count = 0;
        for player in self.store.list_players(league).await? {
            self.update(league, player.player_id, |p| p.reset_scores(base_rating))
                .await?;
            count += 1;
        }
        info!(%league, count, "reset scores");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BASE_RATING;
    use crate::storage::JsonlStore;
    use tempfile::TempDir;

    fn league() -> LeagueId {
        LeagueId::new("test-league")
    }

    async fn roster(temp: &TempDir) -> LeagueRoster {
        LeagueRoster::new(Arc::new(JsonlStore::new(temp.path().to_path_buf())))
    }

    #[tokio::test]
    async fn test_register_and_require() {
        let temp = TempDir::new().unwrap();
        let roster = roster(&temp).await;

        let p = roster
            .register(&league(), 1, "Anna", BASE_RATING)
            .await
            .unwrap();
        assert_eq!(p.rating, BASE_RATING);

        let loaded = roster.require(&league(), 1).await.unwrap();
        assert_eq!(loaded.display_name, "Anna");
    }

    #[tokio::test]
    async fn test_double_register_fails() {
        let temp = TempDir::new().unwrap();
        let roster = roster(&temp).await;

        roster.register(&league(), 1, "Anna", 1000).await.unwrap();
        let err = roster.register(&league(), 1, "Anna", 1000).await.unwrap_err();
        assert!(matches!(err, LeagueError::AlreadyRegistered { player_id: 1 }));
    }

    #[tokio::test]
    async fn test_require_unregistered() {
        let temp = TempDir::new().unwrap();
        let roster = roster(&temp).await;
        let err = roster.require(&league(), 9).await.unwrap_err();
        assert!(matches!(
            err,
            LeagueError::UnregisteredParticipant { player_id: 9 }
        ));
    }

    #[tokio::test]
    async fn test_pending_push_and_pull() {
        let temp = TempDir::new().unwrap();
        let roster = roster(&temp).await;
        for id in 1..=4 {
            roster
                .register(&league(), id, &format!("P{}", id), 1000)
                .await
                .unwrap();
        }

        let game = GameId::from("ab12");
        roster
            .push_pending(&league(), &[1, 2, 3, 4], &game)
            .await
            .unwrap();
        for id in 1..=4 {
            assert!(roster
                .require(&league(), id)
                .await
                .unwrap()
                .pending
                .contains(&game));
        }

        // Push is idempotent.
        roster.push_pending(&league(), &[1], &game).await.unwrap();
        assert_eq!(roster.require(&league(), 1).await.unwrap().pending.len(), 1);

        roster.pull_pending(&league(), &game).await.unwrap();
        for id in 1..=4 {
            assert!(roster
                .require(&league(), id)
                .await
                .unwrap()
                .pending
                .is_empty());
        }
    }

    #[tokio::test]
    async fn test_leaderboard_sort_and_threshold() {
        let temp = TempDir::new().unwrap();
        let roster = roster(&temp).await;
        for (id, rating, wins, accepted) in
            [(1, 1100, 4, 10), (2, 1250, 2, 10), (3, 900, 9, 9), (4, 1000, 1, 2)]
        {
            roster
                .register(&league(), id, &format!("P{}", id), 1000)
                .await
                .unwrap();
            roster
                .update(&league(), id, |p| {
                    p.rating = rating;
                    p.wins = wins;
                    p.losses = accepted - wins;
                    p.accepted = accepted;
                })
                .await
                .unwrap();
        }

        let by_points = roster
            .leaderboard(&league(), LeaderboardSort::Points, 10, 0)
            .await
            .unwrap();
        // Players 3 and 4 are below the 10-game threshold.
        assert_eq!(
            by_points.iter().map(|p| p.player_id).collect::<Vec<_>>(),
            vec![2, 1]
        );

        let by_winrate = roster
            .leaderboard(&league(), LeaderboardSort::WinRate, 0, 2)
            .await
            .unwrap();
        assert_eq!(by_winrate[0].player_id, 3);
        assert_eq!(by_winrate.len(), 2);
    }

    #[tokio::test]
    async fn test_reset_scores() {
        let temp = TempDir::new().unwrap();
        let roster = roster(&temp).await;
        roster.register(&league(), 1, "Anna", 1000).await.unwrap();
        roster
            .update(&league(), 1, |p| {
                p.rating = 1300;
                p.wins = 4;
                p.losses = 2;
                p.accepted = 6;
            })
            .await
            .unwrap();

        let count = roster.reset_scores(&league(), 1000).await.unwrap();
        assert_eq!(count, 1);
        let p = roster.require(&league(), 1).await.unwrap();
        assert_eq!(p.rating, 1000);
        assert_eq!(p.accepted, 0);
    }

    #[test]
    fn test_sort_key_parsing() {
        assert_eq!(
            "points".parse::<LeaderboardSort>().unwrap(),
            LeaderboardSort::Points
        );
        assert_eq!(
            "WinRate".parse::<LeaderboardSort>().unwrap(),
            LeaderboardSort::WinRate
        );
        assert!("elo".parse::<LeaderboardSort>().is_err());
    }
}
