//! Rating engine.
//!
//! Computes the point transfer among the four seats of an accepted
//! match. Pure: callers pass the ratings read before any mutation and
//! apply the returned deltas themselves.

use serde::Serialize;
use std::collections::HashMap;

use crate::config::ScoringConfig;
use crate::error::LeagueError;
use crate::models::{MatchRecord, PlayerId, POD_SIZE};

/// One player's rating change from a single accepted match.
#[derive(Debug, Clone, Serialize)]
pub struct RatingDelta {
    pub player_id: PlayerId,
    pub change: i64,
}

/// Computes rating transfers for accepted matches.
#[derive(Debug, Clone, Default)]
pub struct RatingEngine {
    config: ScoringConfig,
}

impl RatingEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Compute the deltas for `record` given the pre-acceptance
    /// `ratings` of all four participants.
    ///
    /// Each loser drops a logistic function of how far their rating
    /// sits above or below the average of the other three seats: an
    /// underdog loses near the floor, a favorite near the ceiling. The
    /// winner gains the exact sum of the losses, so the pod is
    /// zero-sum by construction. Losers appear in seat order, winner
    /// last.
    pub fn compute(
        &self,
        record: &MatchRecord,
        ratings: &HashMap<PlayerId, i64>,
    ) -> Result<Vec<RatingDelta>, LeagueError> {
        if record.participants.len() != POD_SIZE {
            return Err(LeagueError::InvalidParticipantCount {
                got: record.participants.len(),
            });
        }

        let rating_of = |id: PlayerId| -> Result<f64, LeagueError> {
            ratings
                .get(&id)
                .copied()
                .map(|r| r as f64)
                .ok_or(LeagueError::UnregisteredParticipant { player_id: id })
        };

        let winner_rating = rating_of(record.winner_id)?;
        let loser_ids = record.loser_ids();

        let mut deltas = Vec::with_capacity(POD_SIZE);
        let mut gains: i64 = 0;

        for &loser in &loser_ids {
            // Average of everyone this loser faced: the other two
            // losers plus the winner.
            let mut others = winner_rating;
            for &peer in &loser_ids {
                if peer != loser {
                    others += rating_of(peer)?;
                }
            }
            let avg_opponent = others / (POD_SIZE - 1) as f64;
            let score_diff = rating_of(loser)? - avg_opponent;
            let loss = self.loss_for(score_diff);

            gains += loss;
            deltas.push(RatingDelta {
                player_id: loser,
                change: -loss,
            });
        }

        deltas.push(RatingDelta {
            player_id: record.winner_id,
            change: gains,
        });

        Ok(deltas)
    }

    fn loss_for(&self, score_diff: f64) -> i64 {
        let c = &self.config;
        (c.max_swing / (1.0 + c.curve_base.powf(-score_diff)) + c.floor).round() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GameId;

    fn engine() -> RatingEngine {
        RatingEngine::new(ScoringConfig::default())
    }

    fn record() -> MatchRecord {
        MatchRecord::new(GameId::from("ab12"), 1, &[1, 2, 3, 4])
    }

    fn ratings(values: [(PlayerId, i64); 4]) -> HashMap<PlayerId, i64> {
        values.into_iter().collect()
    }

    #[test]
    fn test_even_pod_transfers_ten_each() {
        // All at 1000: diff 0, loss = round(12/2 + 4) = 10 per loser.
        let deltas = engine()
            .compute(&record(), &ratings([(1, 1000), (2, 1000), (3, 1000), (4, 1000)]))
            .unwrap();

        assert_eq!(deltas.len(), 4);
        for d in &deltas[..3] {
            assert_eq!(d.change, -10);
        }
        assert_eq!(deltas[3].player_id, 1);
        assert_eq!(deltas[3].change, 30);
    }

    #[test]
    fn test_zero_sum() {
        let deltas = engine()
            .compute(&record(), &ratings([(1, 870), (2, 1432), (3, 995), (4, 1011)]))
            .unwrap();
        let total: i64 = deltas.iter().map(|d| d.change).sum();
        assert_eq!(total, 0);
    }

    #[test]
    fn test_underdog_loses_near_floor() {
        // Player 2 is far below the other three.
        let deltas = engine()
            .compute(&record(), &ratings([(1, 1500), (2, 200), (3, 1500), (4, 1500)]))
            .unwrap();
        let underdog = deltas.iter().find(|d| d.player_id == 2).unwrap();
        assert_eq!(underdog.change, -4);
    }

    #[test]
    fn test_favorite_loses_near_ceiling() {
        let deltas = engine()
            .compute(&record(), &ratings([(1, 800), (2, 2500), (3, 800), (4, 800)]))
            .unwrap();
        let favorite = deltas.iter().find(|d| d.player_id == 2).unwrap();
        assert_eq!(favorite.change, -16);
    }

    #[test]
    fn test_losses_bounded_for_any_spread() {
        let engine = engine();
        for spread in [-5000i64, -100, 0, 100, 5000] {
            let deltas = engine
                .compute(
                    &record(),
                    &ratings([(1, 1000), (2, 1000 + spread), (3, 1000), (4, 1000)]),
                )
                .unwrap();
            let loser = deltas.iter().find(|d| d.player_id == 2).unwrap();
            assert!((-16..=-4).contains(&loser.change), "got {}", loser.change);
        }
    }

    #[test]
    fn test_missing_rating_is_an_error() {
        let err = engine()
            .compute(&record(), &ratings([(1, 1000), (2, 1000), (3, 1000), (9, 1000)]))
            .unwrap_err();
        assert!(matches!(
            err,
            LeagueError::UnregisteredParticipant { player_id: 4 }
        ));
    }

    #[test]
    fn test_deltas_use_pre_mutation_ratings_only() {
        // Symmetric losers must receive identical losses regardless of
        // the order they are processed in.
        let deltas = engine()
            .compute(&record(), &ratings([(1, 1100), (2, 950), (3, 950), (4, 950)]))
            .unwrap();
        let l2 = deltas.iter().find(|d| d.player_id == 2).unwrap().change;
        let l3 = deltas.iter().find(|d| d.player_id == 3).unwrap().change;
        let l4 = deltas.iter().find(|d| d.player_id == 4).unwrap().change;
        assert_eq!(l2, l3);
        assert_eq!(l3, l4);
    }

    #[test]
    fn test_custom_constants() {
        let engine = RatingEngine::new(ScoringConfig {
            max_swing: 6.0,
            curve_base: 1.01,
            floor: 2.0,
            base_rating: 1000,
        });
        let deltas = engine
            .compute(&record(), &ratings([(1, 1000), (2, 1000), (3, 1000), (4, 1000)]))
            .unwrap();
        // round(6/2 + 2) = 5 per loser.
        assert_eq!(deltas[0].change, -5);
        assert_eq!(deltas[3].change, 15);
    }
}
