//! # Folio Core
//!
//! Storage-agnostic logic for folio: content models, the collection
//! dispatch table, store and asset-store traits, and the recycle-bin
//! lifecycle (soft delete, restore, purge).
//!
//! This crate contains no sqlx, HTTP client, or filesystem I/O. The
//! `folio` crate supplies the SQLite store and the hosted asset store.

pub mod asset;
pub mod collection;
pub mod content;
pub mod lifecycle;
pub mod models;
pub mod store;
