//! Cord Store - persistent, crash-safe coordination state.
//!
//! A single SQLite file holds two relations, `nodes` and `dependencies`,
//! in WAL journal mode so readers run concurrently with the serialized
//! writer. Every mutation is one transaction; every component recovers its
//! view by re-reading this store.

mod store;

pub use store::Store;
