pub mod decks;
pub mod matches;
pub mod players;
pub mod seasons;
