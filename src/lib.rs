//! # FastoNoSQL - Command Translation and Dispatch
//!
//! The core of a multi-backend NoSQL console. It turns console text into
//! backend commands and typed keys back into console text, for Redis,
//! Memcached, SSDB, LevelDB, RocksDB, LMDB, UnQLite, UpscaleDB and ForestDB.
//!
//! ## Features
//!
//! - **Command tables**: every backend has an ordered table of commands with
//!   their arity, summary and handler; multi-word names like `CONFIG GET`
//!   win over shorter prefixes
//! - **Translators**: build the right create/load/ttl/delete/rename command
//!   for a typed key, or report why the backend cannot
//! - **Native seam**: handlers run against a [`NativeConnection`]; an
//!   in-memory implementation stands in for the real client libraries
//! - **Drivers**: one worker task per connection, batches run in order,
//!   optional periodic server info logging
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            Driver                                │
//! │                                                                  │
//! │  ┌─────────────┐    ┌────────────────┐    ┌──────────────────┐   │
//! │  │  Tokenizer  │───>│ CommandHandler │───>│ CommandTranslator│   │
//! │  │ (protocol)  │    │  (commands)    │    │  + command table │   │
//! │  └─────────────┘    └────────────────┘    └────────┬─────────┘   │
//! │                                                    │             │
//! │                                                    ▼             │
//! │                     ┌─────────────────────────────────────────┐  │
//! │                     │ NativeConnection (MemoryConnection)     │  │
//! │                     └────────────────────┬────────────────────┘  │
//! │                                          ▼                       │
//! │                     ┌─────────────────────────────────────────┐  │
//! │                     │ StorageEngine + ExpirySweeper           │  │
//! │                     └─────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use fastonosql::commands::CommandTranslator;
//! use fastonosql::db::{create_translator, ConnectionType};
//! use fastonosql::types::{NDbKValue, NKey, Value};
//!
//! let translator = create_translator(ConnectionType::Redis);
//!
//! let key = NDbKValue::new(NKey::new("colors"), Value::string_array(["red", "green"]));
//! assert_eq!(translator.create_key_command(&key).unwrap(), "LPUSH colors red green");
//!
//! let loaded = translator.is_load_key_command(b"LRANGE colors 0 -1");
//! assert_eq!(loaded.unwrap().readable(), "colors");
//! ```
//!
//! ## Module Overview
//!
//! - [`protocol`]: command line tokenizer and the RESP request encoder
//! - [`types`]: keys, TTLs, typed values and the result tree
//! - [`commands`]: command tables, translators and the shared handlers
//! - [`db`]: one module per backend
//! - [`connection`]: the native seam and per-connection drivers
//! - [`storage`]: the in-memory engine behind [`MemoryConnection`]
//! - [`config`]: connection settings

pub mod commands;
pub mod config;
pub mod connection;
pub mod db;
pub mod error;
pub mod protocol;
pub mod storage;
pub mod types;

pub use commands::{CommandHandler, CommandTranslator};
pub use config::ConnectionSettings;
pub use connection::{Driver, MemoryConnection, NativeConnection};
pub use db::{create_translator, ConnectionType};
pub use error::{Error, Result};
pub use storage::{start_expiry_sweeper, StorageEngine};

/// Version reported by `INFO server`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
