//! JSONL (JSON Lines) backed league store.
//!
//! JSONL is the source of truth for all league data. Each line is a
//! valid JSON object representing one entity; each league owns a
//! subdirectory, the deck catalog lives at the top level.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::models::{Deck, GameId, LeagueId, MatchRecord, Player, PlayerId, Season};

use super::{LeagueSettings, LeagueStore, StorageError};

/// League-scoped entity files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LeagueFile {
    Members,
    Matches,
    Seasons,
}

impl LeagueFile {
    fn filename(&self) -> &'static str {
        match self {
            LeagueFile::Members => "members.jsonl",
            LeagueFile::Matches => "matches.jsonl",
            LeagueFile::Seasons => "seasons.jsonl",
        }
    }
}

/// Typed JSONL file with whole-file replace-by-key updates.
struct JsonlFile<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: Serialize + DeserializeOwned> JsonlFile<T> {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    fn ensure_dir(&self) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Read all entities, skipping unparseable lines.
    fn read_all(&self) -> Result<Vec<T>, StorageError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut entities = Vec::new();
        let mut line_num = 0;

        for line in reader.lines() {
            line_num += 1;
            let line = line?;

            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str(&line) {
                Ok(entity) => entities.push(entity),
                Err(e) => {
                    warn!("Failed to parse line {} in {:?}: {}", line_num, self.path, e);
                }
            }
        }

        debug!("Read {} entities from {:?}", entities.len(), self.path);
        Ok(entities)
    }

    /// Write entities, replacing the entire file. Goes through a
    /// sibling temp file and a rename, so a concurrent `read_all`
    /// never observes a half-written file.
    fn write_all(&self, entities: &[T]) -> Result<(), StorageError> {
        self.ensure_dir()?;

        let tmp = self.path.with_extension("jsonl.tmp");
        let file = File::create(&tmp)?;
        let mut writer = BufWriter::new(file);

        for entity in entities {
            let json = serde_json::to_string(entity)?;
            writeln!(writer, "{}", json)?;
        }

        writer.flush()?;
        fs::rename(&tmp, &self.path)?;
        debug!("Wrote {} entities to {:?}", entities.len(), self.path);
        Ok(())
    }

    /// Insert or replace the entity matching `matches`. Returns true
    /// when a new entity was appended rather than replaced.
    fn upsert<F>(&self, entity: T, matches: F) -> Result<bool, StorageError>
    where
        F: Fn(&T) -> bool,
    {
        let mut all = self.read_all()?;
        let created = match all.iter_mut().find(|e| matches(e)) {
            Some(slot) => {
                *slot = entity;
                false
            }
            None => {
                all.push(entity);
                true
            }
        };
        self.write_all(&all)?;
        Ok(created)
    }

    /// Remove entities matching `matches`; returns true if any removed.
    fn remove<F>(&self, matches: F) -> Result<bool, StorageError>
    where
        F: Fn(&T) -> bool,
    {
        let mut all = self.read_all()?;
        let before = all.len();
        all.retain(|e| !matches(e));
        if all.len() == before {
            return Ok(false);
        }
        self.write_all(&all)?;
        Ok(true)
    }
}

/// Filesystem-backed [`LeagueStore`].
///
/// Updates are whole-file read-modify-write cycles, so each mutation
/// holds a per-path async mutex for the duration. Without it two
/// concurrent upserts to the same file would each read the old
/// contents and the later rename would drop the earlier write.
#[derive(Debug, Clone)]
pub struct JsonlStore {
    data_dir: PathBuf,
    file_locks: Arc<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>>,
}

impl JsonlStore {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            file_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn file_lock(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.file_locks.lock().await;
        locks
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn league_dir(&self, league: &LeagueId) -> Result<PathBuf, StorageError> {
        let id = league.as_str();
        if id.is_empty() || id.contains(['/', '\\']) || id.contains("..") {
            return Err(StorageError::InvalidPath(id.to_string()));
        }
        Ok(self.data_dir.join("leagues").join(id))
    }

    fn league_file<T: Serialize + DeserializeOwned>(
        &self,
        league: &LeagueId,
        file: LeagueFile,
    ) -> Result<JsonlFile<T>, StorageError> {
        Ok(JsonlFile::new(self.league_dir(league)?.join(file.filename())))
    }

    fn decks_file(&self) -> JsonlFile<Deck> {
        JsonlFile::new(self.data_dir.join("decks.jsonl"))
    }

    fn settings_path(&self, league: &LeagueId) -> Result<PathBuf, StorageError> {
        Ok(self.league_dir(league)?.join("settings.json"))
    }
}

#[async_trait]
impl LeagueStore for JsonlStore {
    async fn load_player(
        &self,
        league: &LeagueId,
        player_id: PlayerId,
    ) -> Result<Option<Player>, StorageError> {
        let file: JsonlFile<Player> = self.league_file(league, LeagueFile::Members)?;
        Ok(file
            .read_all()?
            .into_iter()
            .find(|p| p.player_id == player_id))
    }

    async fn save_player(&self, league: &LeagueId, player: &Player) -> Result<(), StorageError> {
        let file: JsonlFile<Player> = self.league_file(league, LeagueFile::Members)?;
        let lock = self.file_lock(&file.path).await;
        let _guard = lock.lock().await;
        file.upsert(player.clone(), |p| p.player_id == player.player_id)?;
        Ok(())
    }

    async fn delete_player(
        &self,
        league: &LeagueId,
        player_id: PlayerId,
    ) -> Result<bool, StorageError> {
        let file: JsonlFile<Player> = self.league_file(league, LeagueFile::Members)?;
        let lock = self.file_lock(&file.path).await;
        let _guard = lock.lock().await;
        file.remove(|p| p.player_id == player_id)
    }

    async fn list_players(&self, league: &LeagueId) -> Result<Vec<Player>, StorageError> {
        let file: JsonlFile<Player> = self.league_file(league, LeagueFile::Members)?;
        file.read_all()
    }

    async fn load_match(
        &self,
        league: &LeagueId,
        game_id: &GameId,
    ) -> Result<Option<MatchRecord>, StorageError> {
        let file: JsonlFile<MatchRecord> = self.league_file(league, LeagueFile::Matches)?;
        Ok(file.read_all()?.into_iter().find(|m| &m.game_id == game_id))
    }

    async fn save_match(
        &self,
        league: &LeagueId,
        record: &MatchRecord,
    ) -> Result<(), StorageError> {
        let file: JsonlFile<MatchRecord> = self.league_file(league, LeagueFile::Matches)?;
        let lock = self.file_lock(&file.path).await;
        let _guard = lock.lock().await;
        file.upsert(record.clone(), |m| m.game_id == record.game_id)?;
        Ok(())
    }

    async fn delete_match(
        &self,
        league: &LeagueId,
        game_id: &GameId,
    ) -> Result<bool, StorageError> {
        let file: JsonlFile<MatchRecord> = self.league_file(league, LeagueFile::Matches)?;
        let lock = self.file_lock(&file.path).await;
        let _guard = lock.lock().await;
        file.remove(|m| &m.game_id == game_id)
    }

    async fn list_matches(&self, league: &LeagueId) -> Result<Vec<MatchRecord>, StorageError> {
        let file: JsonlFile<MatchRecord> = self.league_file(league, LeagueFile::Matches)?;
        file.read_all()
    }

    async fn save_deck(&self, deck: &Deck) -> Result<(), StorageError> {
        let file = self.decks_file();
        let lock = self.file_lock(&file.path).await;
        let _guard = lock.lock().await;
        file.upsert(deck.clone(), |d| d.name == deck.name)?;
        Ok(())
    }

    async fn delete_deck(&self, name: &str) -> Result<bool, StorageError> {
        let file = self.decks_file();
        let lock = self.file_lock(&file.path).await;
        let _guard = lock.lock().await;
        file.remove(|d| d.name == name)
    }

    async fn list_decks(&self) -> Result<Vec<Deck>, StorageError> {
        self.decks_file().read_all()
    }

    async fn save_season(&self, league: &LeagueId, season: &Season) -> Result<(), StorageError> {
        let file: JsonlFile<Season> = self.league_file(league, LeagueFile::Seasons)?;
        let lock = self.file_lock(&file.path).await;
        let _guard = lock.lock().await;
        file.upsert(season.clone(), |s| s.season_number == season.season_number)?;
        Ok(())
    }

    async fn list_seasons(&self, league: &LeagueId) -> Result<Vec<Season>, StorageError> {
        let file: JsonlFile<Season> = self.league_file(league, LeagueFile::Seasons)?;
        file.read_all()
    }

    async fn load_settings(&self, league: &LeagueId) -> Result<LeagueSettings, StorageError> {
        let path = self.settings_path(league)?;
        if !path.exists() {
            return Ok(LeagueSettings::default());
        }
        let contents = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    async fn save_settings(
        &self,
        league: &LeagueId,
        settings: &LeagueSettings,
    ) -> Result<(), StorageError> {
        let path = self.settings_path(league)?;
        let lock = self.file_lock(&path).await;
        let _guard = lock.lock().await;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        write_atomic(&path, &serde_json::to_string_pretty(settings)?)?;
        Ok(())
    }
}

/// Write via a sibling temp file and rename, so readers never observe
/// a half-written settings document.
fn write_atomic(path: &Path, contents: &str) -> Result<(), StorageError> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
