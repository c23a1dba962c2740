//! Connections
//!
//! - [`native`]: the [`NativeConnection`] seam handlers call into, and the
//!   in-memory [`MemoryConnection`] behind it
//! - [`driver`]: one worker task per connection, fed through a [`Driver`]
//!   handle
//!
//! ## Example
//!
//! ```no_run
//! use fastonosql::config::ConnectionSettings;
//! use fastonosql::connection::{Driver, MemoryConnection};
//! use fastonosql::db::ConnectionType;
//! use fastonosql::storage::StorageEngine;
//! use std::sync::Arc;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let engine = Arc::new(StorageEngine::new());
//! let conn = MemoryConnection::new(engine, ConnectionType::LevelDb)?;
//! let settings = ConnectionSettings::new(ConnectionType::LevelDb, "/local/kv");
//! let (driver, _worker) = Driver::start(settings, Box::new(conn), None);
//!
//! let out = driver.execute("SET a 1\nGET a").await?;
//! println!("{}", out);
//! # Ok(())
//! # }
//! ```

pub mod driver;
pub mod native;

pub use driver::{Driver, DriverError, DriverResult, DriverStats};
pub use native::{MemoryConnection, NativeConnection, NativeError, NativeResult};
