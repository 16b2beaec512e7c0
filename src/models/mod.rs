//! Core data models for the pod league tracker.

mod deck;
mod ids;
mod match_record;
mod player;
mod season;

pub use deck::*;
pub use ids::*;
pub use match_record::*;
pub use player::*;
pub use season::*;
