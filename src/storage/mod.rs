//! In-Memory Backend Storage
//!
//! A reference backend for the native connection seam: named databases of
//! typed values with TTLs, pub/sub channels and a background expiry sweeper.
//!
//! ```text
//!              ┌──────────────────────────┐
//!              │      StorageEngine       │
//!              │  databases + channels    │
//!              └────────────┬─────────────┘
//!                           │ Arc<Database>
//!          ┌────────────────┼────────────────┐
//!          ▼                ▼                ▼
//!     Database "0"     Database "1"      Database ...
//!     (16 shards)      (16 shards)
//!                           ▲
//!              ┌────────────┴─────────────┐
//!              │      ExpirySweeper       │
//!              │  (background tokio task) │
//!              └──────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use fastonosql::storage::{StorageEngine, StoredValue};
//! use bytes::Bytes;
//! use std::time::Duration;
//!
//! let engine = StorageEngine::new();
//! let db = engine.default_database().unwrap();
//!
//! db.set(Bytes::from("name"), StoredValue::String(Bytes::from("alex")), None);
//! db.set(
//!     Bytes::from("session"),
//!     StoredValue::String(Bytes::from("token")),
//!     Some(Duration::from_secs(3600)),
//! );
//! assert_eq!(db.len(), 2);
//! ```

pub mod database;
pub mod engine;
pub mod expiry;

// Re-export commonly used types
pub use database::{Database, DatabaseStats, Entry, GlobPattern, StorageError, StoredValue};
pub use engine::{StorageEngine, DEFAULT_DATABASE};
pub use expiry::{start_expiry_sweeper, ExpiryConfig, ExpirySweeper};
