//! On-device storage for WellTrack.
//!
//! Records live in a single SQLite table as JSON payloads, with `dirty` and
//! tombstone flags that tell the sync layer what changed locally. Reads go
//! through a bounded LRU cache that is invalidated on every write.

mod cache;
mod dao;
mod error;
mod store;

pub use cache::LruCache;
pub use dao::{EntityDao, SqliteDao};
pub use error::{StorageError, StorageResult};
pub use store::{LocalStore, DEFAULT_CACHE_CAPACITY};
