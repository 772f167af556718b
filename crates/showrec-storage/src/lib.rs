//! Canonical-show store contract plus in-memory and Postgres adapters.

use showrec_core::{CanonicalShow, ShowFilter};
use thiserror::Error;
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::MemoryShowStore;
pub use postgres::{PartialDateColumns, PgShowStore};

pub const CRATE_NAME: &str = "showrec-storage";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("show {0} not found")]
    NotFound(Uuid),
    #[error("show {0} already exists")]
    DuplicateId(Uuid),
    #[error("external id {external_id} already belongs to show {existing}")]
    DuplicateExternalId { external_id: u32, existing: Uuid },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Lazily evaluated result sequence of a store query.
pub struct ShowCursor<'a> {
    inner: Box<dyn Iterator<Item = CanonicalShow> + Send + 'a>,
}

impl<'a> ShowCursor<'a> {
    pub fn new(inner: impl Iterator<Item = CanonicalShow> + Send + 'a) -> Self {
        Self {
            inner: Box::new(inner),
        }
    }
}

impl Iterator for ShowCursor<'_> {
    type Item = CanonicalShow;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

/// The shared canonical-show store. Callers serialize writes for the same show.
pub trait ShowStore {
    fn find(&self, filter: &ShowFilter) -> Result<ShowCursor<'_>, StoreError>;

    fn get(&self, id: Uuid) -> Result<Option<CanonicalShow>, StoreError>;

    fn insert(&mut self, show: CanonicalShow) -> Result<(), StoreError>;

    fn update(&mut self, show: CanonicalShow) -> Result<(), StoreError>;

    fn all(&self) -> Result<ShowCursor<'_>, StoreError> {
        self.find(&ShowFilter::True)
    }
}
