//! Registered deck model and name canonicalization.

use serde::{Deserialize, Serialize};

/// Reserved pseudo-deck for unregistered brews; always resolvable.
pub const ROGUE_DECK_NAME: &str = "Rogue";

/// A deck registered in the global catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deck {
    /// Primary display name.
    pub name: String,

    /// Free-text names that resolve to this deck, primary name included.
    pub aliases: Vec<String>,

    /// Canonical folds of `aliases`, kept in step by the catalog.
    pub canonical_aliases: Vec<String>,

    /// WUBRG color identity, letters sorted.
    pub color_identity: String,

    /// Commander card names.
    pub commanders: Vec<String>,

    /// Reference decklist URL.
    pub link: Option<String>,
}

impl Deck {
    pub fn new(name: impl Into<String>, color_identity: &str) -> Self {
        let name = name.into();
        Self {
            canonical_aliases: vec![canonical_deck_name(&name)],
            aliases: vec![name.clone()],
            name,
            color_identity: sort_color_identity(color_identity),
            commanders: Vec::new(),
            link: None,
        }
    }

    pub fn with_commanders(mut self, commanders: Vec<String>) -> Self {
        self.commanders = commanders;
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    /// The sentinel deck returned for "rogue" lookups.
    pub fn rogue() -> Self {
        Self::new(ROGUE_DECK_NAME, "")
    }

    pub fn is_rogue(&self) -> bool {
        self.name == ROGUE_DECK_NAME
    }

    /// Shortest registered alias, for narrow table columns.
    pub fn short_name(&self) -> &str {
        self.aliases
            .iter()
            .min_by_key(|a| a.len())
            .map(|a| a.as_str())
            .unwrap_or(&self.name)
    }
}

/// Fold a deck name to its canonical lookup key: lower-cased, letters
/// only, characters sorted. "Chain Veil Teferi" and "Teferi Chain
/// Veil" share a key, which is the point; unrelated anagrams colliding
/// is the accepted cost.
pub fn canonical_deck_name(name: &str) -> String {
    let mut letters: Vec<char> = name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase())
        .collect();
    letters.sort_unstable();
    letters.into_iter().collect()
}

/// Normalize a color identity string ("WUb" -> "buw").
pub fn sort_color_identity(color: &str) -> String {
    let mut letters: Vec<char> = color.to_lowercase().chars().collect();
    letters.sort_unstable();
    letters.into_iter().collect()
}
