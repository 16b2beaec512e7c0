//! Aggregate statistics over accepted matches.
//!
//! Pure functions over match slices; callers fetch the records and
//! apply thresholds from league settings. Only accepted matches count,
//! and only seats that declared a deck contribute to deck rows.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::models::{MatchRecord, MatchStatus, PlayerId};

/// One deck's standing in the league meta.
#[derive(Debug, Clone, Serialize)]
pub struct DeckMetaRow {
    pub deck: String,
    /// Seats played with this deck across accepted matches.
    pub entries: u32,
    pub wins: u32,
    pub losses: u32,
    /// Wins over entries, 0.0 when unplayed.
    pub win_rate: f64,
    /// Entries over all declared seats in the sample.
    pub meta_share: f64,
    /// Distinct pilots.
    pub unique_players: u32,
}

/// One deck's record in a single player's hands.
#[derive(Debug, Clone, Serialize)]
pub struct PlayerDeckRow {
    pub deck: String,
    pub entries: u32,
    pub wins: u32,
    pub losses: u32,
    pub win_rate: f64,
}

fn rate(wins: u32, entries: u32) -> f64 {
    if entries == 0 {
        0.0
    } else {
        f64::from(wins) / f64::from(entries)
    }
}

/// League-wide deck meta. Decks with fewer than `min_entries` seats are
/// dropped; rows come back most-played first, ties by name.
pub fn deck_meta(matches: &[MatchRecord], min_entries: u32) -> Vec<DeckMetaRow> {
    struct Tally {
        entries: u32,
        wins: u32,
        pilots: HashSet<PlayerId>,
    }

    let mut tallies: BTreeMap<String, Tally> = BTreeMap::new();
    let mut total_entries: u32 = 0;

    for record in matches.iter().filter(|m| m.status == MatchStatus::Accepted) {
        for seat in &record.participants {
            let Some(deck) = seat.declared_deck.as_deref() else {
                continue;
            };
            total_entries += 1;
            let tally = tallies.entry(deck.to_string()).or_insert(Tally {
                entries: 0,
                wins: 0,
                pilots: HashSet::new(),
            });
            tally.entries += 1;
            tally.pilots.insert(seat.player_id);
            if seat.player_id == record.winner_id {
                tally.wins += 1;
            }
        }
    }

    let mut rows: Vec<DeckMetaRow> = tallies
        .into_iter()
        .filter(|(_, t)| t.entries >= min_entries)
        .map(|(deck, t)| DeckMetaRow {
            deck,
            entries: t.entries,
            wins: t.wins,
            losses: t.entries - t.wins,
            win_rate: rate(t.wins, t.entries),
            meta_share: rate(t.entries, total_entries),
            unique_players: t.pilots.len() as u32,
        })
        .collect();

    rows.sort_by(|a, b| b.entries.cmp(&a.entries).then_with(|| a.deck.cmp(&b.deck)));
    rows
}

/// One player's per-deck record, most-played first.
pub fn player_deck_stats(matches: &[MatchRecord], player_id: PlayerId) -> Vec<PlayerDeckRow> {
    let mut tallies: BTreeMap<String, (u32, u32)> = BTreeMap::new();

    for record in matches.iter().filter(|m| m.status == MatchStatus::Accepted) {
        let Some(deck) = record.deck_of(player_id) else {
            continue;
        };
        let entry = tallies.entry(deck.to_string()).or_insert((0, 0));
        entry.0 += 1;
        if record.winner_id == player_id {
            entry.1 += 1;
        }
    }

    let mut rows: Vec<PlayerDeckRow> = tallies
        .into_iter()
        .map(|(deck, (entries, wins))| PlayerDeckRow {
            deck,
            entries,
            wins,
            losses: entries - wins,
            win_rate: rate(wins, entries),
        })
        .collect();

    rows.sort_by(|a, b| b.entries.cmp(&a.entries).then_with(|| a.deck.cmp(&b.deck)));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GameId;
    use pretty_assertions::assert_eq;

    fn accepted(id: &str, winner: PlayerId, decks: [(PlayerId, &str); 4]) -> MatchRecord {
        let pod: Vec<PlayerId> = decks.iter().map(|(p, _)| *p).collect();
        let mut m = MatchRecord::new(GameId::from(id), winner, &pod);
        m.status = MatchStatus::Accepted;
        for (player_id, deck) in decks {
            let seat = m.participant_mut(player_id).unwrap();
            seat.confirmed = true;
            seat.declared_deck = Some(deck.to_string());
        }
        m
    }

    fn sample() -> Vec<MatchRecord> {
        vec![
            accepted("aa01", 1, [(1, "Breya"), (2, "Meren"), (3, "Rogue"), (4, "Rogue")]),
            accepted("aa02", 2, [(1, "Breya"), (2, "Meren"), (3, "Rogue"), (4, "Godo")]),
            accepted("aa03", 1, [(1, "Meren"), (2, "Breya"), (3, "Godo"), (4, "Rogue")]),
        ]
    }

    #[test]
    fn test_deck_meta_counts_and_shares() {
        let rows = deck_meta(&sample(), 0);

        let rogue = rows.iter().find(|r| r.deck == "Rogue").unwrap();
        assert_eq!(rogue.entries, 4);
        assert_eq!(rogue.wins, 0);
        assert_eq!(rogue.unique_players, 2);
        assert!((rogue.meta_share - 4.0 / 12.0).abs() < 1e-9);

        let breya = rows.iter().find(|r| r.deck == "Breya").unwrap();
        assert_eq!(breya.entries, 3);
        assert_eq!(breya.wins, 1);
        assert_eq!(breya.losses, 2);

        let meren = rows.iter().find(|r| r.deck == "Meren").unwrap();
        assert_eq!(meren.wins, 2);
        assert!((meren.win_rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_deck_meta_threshold_drops_fringe_decks() {
        let rows = deck_meta(&sample(), 3);
        let names: Vec<&str> = rows.iter().map(|r| r.deck.as_str()).collect();
        assert_eq!(names, vec!["Rogue", "Breya", "Meren"]);
    }

    #[test]
    fn test_deck_meta_ignores_unaccepted_matches() {
        let mut matches = sample();
        matches[0].status = MatchStatus::Pending;
        let rows = deck_meta(&matches, 0);
        let breya = rows.iter().find(|r| r.deck == "Breya").unwrap();
        assert_eq!(breya.entries, 2);
    }

    #[test]
    fn test_deck_meta_skips_undeclared_seats() {
        let mut matches = sample();
        matches[1].participant_mut(4).unwrap().declared_deck = None;
        let rows = deck_meta(&matches, 0);
        assert!(rows.iter().find(|r| r.deck == "Godo").unwrap().entries == 1);
        let total: u32 = rows.iter().map(|r| r.entries).sum();
        assert_eq!(total, 11);
    }

    #[test]
    fn test_player_deck_stats() {
        let rows = player_deck_stats(&sample(), 1);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].deck, "Breya");
        assert_eq!(rows[0].entries, 2);
        assert_eq!(rows[0].wins, 1);
        assert_eq!(rows[1].deck, "Meren");
        assert_eq!(rows[1].wins, 1);
        assert!((rows[1].win_rate - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_player_deck_stats_empty_for_stranger() {
        assert!(player_deck_stats(&sample(), 99).is_empty());
    }

    #[test]
    fn test_empty_input() {
        assert!(deck_meta(&[], 0).is_empty());
        assert!(player_deck_stats(&[], 1).is_empty());
    }
}
