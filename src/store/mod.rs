//! Entity store module
//!
//! The store is consumed through two traits: [`EntityStore`] is the
//! process-wide factory created once at startup, [`StoreSession`] is a
//! per-request unit of work released when dropped. Every method here
//! blocks and must only be called from inside a blocking-bridge offload.

mod memory;
mod model;

pub use memory::MemoryStore;
pub use model::{Author, NewAuthor, UserScore};

use crate::failure::Failure;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("failed to load seed data from {path}")]
    Seed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl From<StoreError> for Failure {
    fn from(err: StoreError) -> Self {
        let failure = Self::internal(err.to_string());
        match &err {
            StoreError::Seed { source, .. } => failure.with_cause(source),
            _ => failure,
        }
    }
}

/// Shared, read-only store factory
pub trait EntityStore: Send + Sync + 'static {
    /// Open a session scoped to one request
    fn open_session(&self) -> Result<Box<dyn StoreSession>, StoreError>;
}

/// Unit of work against the store.
///
/// Writes become visible to other sessions only after [`commit`]; a session
/// dropped without committing discards them.
///
/// [`commit`]: StoreSession::commit
pub trait StoreSession: Send {
    fn find_author(&mut self, id: i64) -> Result<Option<Author>, StoreError>;

    fn find_score(&mut self, id: i64) -> Result<Option<UserScore>, StoreError>;

    /// Validate and stage a new author, returning it with its generated id
    fn persist_author(&mut self, author: NewAuthor) -> Result<Author, StoreError>;

    fn commit(&mut self) -> Result<(), StoreError>;
}
