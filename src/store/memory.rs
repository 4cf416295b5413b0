//! In-memory entity store
//!
//! Keeps authors and scores in ordered maps behind a lock. Ids come from a
//! single sequence shared by both tables. Optional seed data is read from a
//! TOML file when the store is opened.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use super::model::{Author, AuthorSummary, NewAuthor, ScoreSummary, UserScore};
use super::{EntityStore, StoreError, StoreSession};
use crate::config::StoreConfig;

#[derive(Debug, Clone, Deserialize)]
struct AuthorRow {
    id: i64,
    first_name: String,
    last_name: String,
    nationality: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ScoreRow {
    id: i64,
    score: i64,
    author_id: i64,
}

/// Layout of the seed file
#[derive(Debug, Default, Deserialize)]
struct SeedFile {
    #[serde(default)]
    authors: Vec<AuthorRow>,
    #[serde(default)]
    scores: Vec<ScoreRow>,
}

#[derive(Debug, Default)]
struct Tables {
    authors: BTreeMap<i64, AuthorRow>,
    scores: BTreeMap<i64, ScoreRow>,
}

impl Tables {
    fn author(&self, row: &AuthorRow) -> Author {
        let score = self
            .scores
            .values()
            .find(|s| s.author_id == row.id)
            .map(|s| ScoreSummary {
                id: s.id,
                score: s.score,
            });
        Author {
            id: row.id,
            first_name: row.first_name.clone(),
            last_name: row.last_name.clone(),
            nationality: row.nationality.clone(),
            score,
        }
    }
}

#[derive(Debug)]
struct Shared {
    tables: RwLock<Tables>,
    next_id: AtomicI64,
    open_sessions: AtomicUsize,
    latency: Duration,
}

impl Shared {
    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))
    }

    fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
    }
}

/// In-memory [`EntityStore`]
#[derive(Debug, Clone)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    /// Empty store without latency
    pub fn new() -> Self {
        Self::with_tables(Tables::default(), Duration::ZERO)
    }

    /// Open the store described by the configuration.
    ///
    /// Blocking: reads the seed file and applies the configured latency.
    pub fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        let latency = Duration::from_millis(config.latency_ms);
        let tables = match &config.seed_file {
            Some(path) => load_seed(path)?,
            None => Tables::default(),
        };
        let store = Self::with_tables(tables, latency);
        store.shared.simulate_latency();
        Ok(store)
    }

    /// Store pre-filled from a TOML document (same layout as the seed file)
    #[cfg(test)]
    pub fn from_toml(document: &str) -> Result<Self, StoreError> {
        let tables = parse_seed(document, "<inline>")?;
        Ok(Self::with_tables(tables, Duration::ZERO))
    }

    fn with_tables(tables: Tables, latency: Duration) -> Self {
        let max_id = tables
            .authors
            .keys()
            .chain(tables.scores.keys())
            .copied()
            .max()
            .unwrap_or(0);
        Self {
            shared: Arc::new(Shared {
                tables: RwLock::new(tables),
                next_id: AtomicI64::new(max_id + 1),
                open_sessions: AtomicUsize::new(0),
                latency,
            }),
        }
    }

    /// Sessions opened and not yet dropped
    #[cfg(test)]
    pub fn open_sessions(&self) -> usize {
        self.shared.open_sessions.load(Ordering::SeqCst)
    }

    pub fn author_count(&self) -> usize {
        self.shared.read().map_or(0, |t| t.authors.len())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityStore for MemoryStore {
    fn open_session(&self) -> Result<Box<dyn StoreSession>, StoreError> {
        self.shared.simulate_latency();
        self.shared.open_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySession {
            shared: Arc::clone(&self.shared),
            staged: Vec::new(),
        }))
    }
}

struct MemorySession {
    shared: Arc<Shared>,
    staged: Vec<AuthorRow>,
}

impl StoreSession for MemorySession {
    fn find_author(&mut self, id: i64) -> Result<Option<Author>, StoreError> {
        self.shared.simulate_latency();
        let tables = self.shared.read()?;
        let row = self
            .staged
            .iter()
            .find(|r| r.id == id)
            .or_else(|| tables.authors.get(&id));
        Ok(row.map(|r| tables.author(r)))
    }

    fn find_score(&mut self, id: i64) -> Result<Option<UserScore>, StoreError> {
        self.shared.simulate_latency();
        let tables = self.shared.read()?;
        let Some(row) = tables.scores.get(&id) else {
            return Ok(None);
        };
        let author = tables.authors.get(&row.author_id).ok_or_else(|| {
            StoreError::Unavailable(format!(
                "score {} references missing author {}",
                row.id, row.author_id
            ))
        })?;
        Ok(Some(UserScore {
            id: row.id,
            score: row.score,
            author: AuthorSummary::from(&tables.author(author)),
        }))
    }

    fn persist_author(&mut self, author: NewAuthor) -> Result<Author, StoreError> {
        self.shared.simulate_latency();
        validate(&author)?;

        let row = AuthorRow {
            id: self.shared.next_id.fetch_add(1, Ordering::SeqCst),
            first_name: author.first_name,
            last_name: author.last_name,
            nationality: author.nationality,
        };
        let persisted = Author {
            id: row.id,
            first_name: row.first_name.clone(),
            last_name: row.last_name.clone(),
            nationality: row.nationality.clone(),
            score: None,
        };
        self.staged.push(row);
        Ok(persisted)
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        let mut tables = self.shared.write()?;
        for row in self.staged.drain(..) {
            tables.authors.insert(row.id, row);
        }
        Ok(())
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.shared.open_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

fn validate(author: &NewAuthor) -> Result<(), StoreError> {
    let missing: Vec<&str> = [
        ("first_name", &author.first_name),
        ("last_name", &author.last_name),
        ("nationality", &author.nationality),
    ]
    .into_iter()
    .filter(|(_, value)| value.trim().is_empty())
    .map(|(name, _)| name)
    .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(StoreError::Validation(format!(
            "author is missing required field(s): {}",
            missing.join(", ")
        )))
    }
}

fn load_seed(path: &str) -> Result<Tables, StoreError> {
    let document = std::fs::read_to_string(path).map_err(|e| StoreError::Seed {
        path: path.to_string(),
        source: Box::new(e),
    })?;
    parse_seed(&document, path)
}

fn parse_seed(document: &str, path: &str) -> Result<Tables, StoreError> {
    let seed_error = |message: String| StoreError::Seed {
        path: path.to_string(),
        source: message.into(),
    };

    let seed: SeedFile = toml::from_str(document).map_err(|e| StoreError::Seed {
        path: path.to_string(),
        source: Box::new(e),
    })?;

    let mut tables = Tables::default();
    for author in seed.authors {
        if tables.authors.insert(author.id, author.clone()).is_some() {
            return Err(seed_error(format!("duplicate author id {}", author.id)));
        }
    }
    for score in seed.scores {
        if !tables.authors.contains_key(&score.author_id) {
            return Err(seed_error(format!(
                "score {} references unknown author {}",
                score.id, score.author_id
            )));
        }
        if tables.scores.values().any(|s| s.author_id == score.author_id) {
            return Err(seed_error(format!(
                "author {} already has a score",
                score.author_id
            )));
        }
        if tables.scores.insert(score.id, score.clone()).is_some() {
            return Err(seed_error(format!("duplicate score id {}", score.id)));
        }
    }
    Ok(tables)
}
