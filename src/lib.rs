//! # idfill
//!
//! Backfills a stable, key-derived vector id onto every record of a
//! key-value store. Records that already carry the field are never touched,
//! so a run can be repeated or interrupted at any point.
//!
//! The pieces, leaf first: [`identifier`] maps a key to its id, [`store`]
//! is the capability the engine needs from a backend, [`engine`] decides and
//! writes per record and fans batches out, [`report`] folds the outcomes.

pub mod config;
pub mod engine;
pub mod error;
pub mod identifier;
pub mod model;
pub mod report;
pub mod store;
pub mod telemetry;
