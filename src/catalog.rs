//! Deck catalog.
//!
//! Canonicalizes free-text deck names against a registered alias index
//! so "Teferi Chain Veil" and "Chain Veil Teferi" land on the same
//! deck. The index is rebuilt from the store on load and kept in step
//! by the mutators.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::LeagueError;
use crate::models::{canonical_deck_name, Deck};
use crate::storage::LeagueStore;

/// Global deck registry with canonical-alias lookup.
pub struct DeckCatalog {
    store: Arc<dyn LeagueStore>,
    index: RwLock<HashMap<String, Deck>>,
}

impl DeckCatalog {
    /// Build the catalog by indexing every stored deck.
    pub async fn load(store: Arc<dyn LeagueStore>) -> Result<Self, LeagueError> {
        let decks = store.list_decks().await?;
        let mut index = HashMap::new();
        for deck in &decks {
            Self::index_deck(&mut index, deck);
        }
        debug!("Indexed {} decks ({} aliases)", decks.len(), index.len());
        Ok(Self {
            store,
            index: RwLock::new(index),
        })
    }

    fn index_deck(index: &mut HashMap<String, Deck>, deck: &Deck) {
        for canonical in &deck.canonical_aliases {
            if !canonical.is_empty() {
                index.insert(canonical.clone(), deck.clone());
            }
        }
    }

    /// Resolve a free-text name to a registered deck.
    ///
    /// "rogue" (any case) always resolves to the Rogue sentinel, before
    /// the index is consulted. Returns None for unrecognized names; the
    /// caller decides whether that is soft (store the raw string) or an
    /// error.
    pub async fn resolve(&self, input_name: &str) -> Option<Deck> {
        if input_name.trim().eq_ignore_ascii_case("rogue") {
            return Some(Deck::rogue());
        }
        let key = canonical_deck_name(input_name);
        if key.is_empty() {
            return None;
        }
        self.index.read().await.get(&key).cloned()
    }

    /// Register a deck, or replace its metadata if the primary name is
    /// already taken. Aliases accumulated on the old record survive a
    /// re-add. Returns true when the deck was newly created.
    pub async fn add_deck(&self, deck: Deck) -> Result<bool, LeagueError> {
        let mut deck = deck;
        let existing = {
            let index = self.index.read().await;
            deck.canonical_aliases
                .iter()
                .find_map(|c| index.get(c))
                .filter(|d| d.name == deck.name)
                .cloned()
        };

        let created = match existing {
            Some(old) => {
                for (alias, canonical) in old.aliases.iter().zip(old.canonical_aliases.iter()) {
                    if !deck.canonical_aliases.contains(canonical) {
                        deck.aliases.push(alias.clone());
                        deck.canonical_aliases.push(canonical.clone());
                    }
                }
                false
            }
            None => true,
        };

        self.store.save_deck(&deck).await?;
        Self::index_deck(&mut *self.index.write().await, &deck);
        info!(deck = %deck.name, created, "registered deck");
        Ok(created)
    }

    /// Attach new aliases to the deck an existing alias resolves to.
    pub async fn add_aliases(
        &self,
        existing_alias: &str,
        new_aliases: &[String],
    ) -> Result<Deck, LeagueError> {
        let mut deck =
            self.resolve(existing_alias)
                .await
                .ok_or_else(|| LeagueError::DeckNotFound {
                    name: existing_alias.to_string(),
                })?;

        for alias in new_aliases {
            let canonical = canonical_deck_name(alias);
            if canonical.is_empty() || deck.canonical_aliases.contains(&canonical) {
                continue;
            }
            deck.aliases.push(alias.clone());
            deck.canonical_aliases.push(canonical);
        }

        self.store.save_deck(&deck).await?;
        Self::index_deck(&mut *self.index.write().await, &deck);
        Ok(deck)
    }

    /// Remove a deck by primary name. Returns false if unknown.
    pub async fn remove_deck(&self, name: &str) -> Result<bool, LeagueError> {
        let removed = self.store.delete_deck(name).await?;
        if removed {
            let mut index = self.index.write().await;
            index.retain(|_, d| d.name != name);
        }
        Ok(removed)
    }

    /// All registered decks, sorted by name.
    pub async fn list(&self) -> Result<Vec<Deck>, LeagueError> {
        let mut decks = self.store.list_decks().await?;
        decks.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(decks)
    }
}
