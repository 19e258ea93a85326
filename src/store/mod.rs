//! The store capability consumed by the engine, and its adapters.
//!
//! The engine needs exactly two things from a store: list every record, and
//! set one field on one record only if that field is absent. Adapters are
//! passed in as `Arc<dyn Store>`, so a test can swap in [`MemoryStore`].

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::error::Result;
use crate::identifier::VectorId;
use crate::model::{Assign, Record};
use async_trait::async_trait;

#[async_trait]
pub trait Store: Send + Sync {
    /// Every record in the store, with its key and fields.
    ///
    /// Adapters page internally; the caller gets the full set.
    async fn enumerate(&self) -> Result<Vec<Record>>;

    /// Set `field = value` on the record with `key`, unless `field` is
    /// already present.
    ///
    /// Returns [`Assign::AlreadyPresent`] when another writer got there
    /// first. Any other failure is `Err`.
    async fn conditional_assign(&self, key: &str, field: &str, value: VectorId) -> Result<Assign>;
}
