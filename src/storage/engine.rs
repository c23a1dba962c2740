//! In-Memory Storage Engine
//!
//! The shared state behind [`MemoryConnection`](crate::connection::MemoryConnection):
//! a set of named databases plus pub/sub channels.
//!
//! ## Layout
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     StorageEngine                        │
//! │                                                          │
//! │  databases: RwLock<BTreeMap<name, Arc<Database>>>        │
//! │     "0" ──> Database (sharded)                           │
//! │     "1" ──> Database (sharded)                           │
//! │                                                          │
//! │  channels:  Mutex<HashMap<channel, broadcast::Sender>>   │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Connections hold an `Arc<Database>` for their selected database, so a
//! removed database stays alive until the last connection drops it.

use crate::storage::database::Database;
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::broadcast;

/// Name of the database every engine starts with.
pub const DEFAULT_DATABASE: &str = "0";

/// Buffered messages per pub/sub channel.
const CHANNEL_CAPACITY: usize = 128;

/// Shared in-memory backend state.
///
/// # Example
///
/// ```
/// use fastonosql::storage::StorageEngine;
///
/// let engine = StorageEngine::new();
/// assert!(engine.create_database("sessions"));
/// assert_eq!(engine.database_names(), vec!["0".to_string(), "sessions".to_string()]);
/// ```
pub struct StorageEngine {
    databases: RwLock<BTreeMap<String, Arc<Database>>>,
    channels: Mutex<HashMap<Bytes, broadcast::Sender<Bytes>>>,
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEngine")
            .field("databases", &self.database_names())
            .finish()
    }
}

impl Default for StorageEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine {
    /// Creates an engine holding only the default database.
    pub fn new() -> Self {
        Self::with_databases([DEFAULT_DATABASE])
    }

    /// Creates an engine with the given databases.
    pub fn with_databases<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let databases = names
            .into_iter()
            .map(Into::into)
            .map(|name: String| (name.clone(), Arc::new(Database::new(name))))
            .collect();

        Self {
            databases: RwLock::new(databases),
            channels: Mutex::new(HashMap::new()),
        }
    }

    pub fn database(&self, name: &str) -> Option<Arc<Database>> {
        self.databases.read().unwrap().get(name).cloned()
    }

    /// Returns the first database in name order.
    pub fn default_database(&self) -> Option<Arc<Database>> {
        self.databases.read().unwrap().values().next().cloned()
    }

    /// Creates a database. Returns false if it already exists.
    pub fn create_database(&self, name: &str) -> bool {
        let mut databases = self.databases.write().unwrap();
        if databases.contains_key(name) {
            return false;
        }
        databases.insert(name.to_string(), Arc::new(Database::new(name)));
        true
    }

    /// Removes a database. Returns false if it does not exist.
    pub fn remove_database(&self, name: &str) -> bool {
        self.databases.write().unwrap().remove(name).is_some()
    }

    pub fn database_names(&self) -> Vec<String> {
        self.databases.read().unwrap().keys().cloned().collect()
    }

    /// Every database, in name order.
    pub fn databases(&self) -> Vec<Arc<Database>> {
        self.databases.read().unwrap().values().cloned().collect()
    }

    /// Total live keys over all databases.
    pub fn total_keys(&self) -> u64 {
        self.databases().iter().map(|db| db.len()).sum()
    }

    /// Sweeps expired keys from every database.
    pub fn cleanup_expired(&self) -> u64 {
        self.databases().iter().map(|db| db.cleanup_expired()).sum()
    }

    /// Sends a message to a channel. Returns the number of receivers.
    pub fn publish(&self, channel: &Bytes, message: Bytes) -> u64 {
        let channels = self.channels.lock().unwrap();
        match channels.get(channel) {
            Some(sender) => sender.send(message).map_or(0, |n| n as u64),
            None => 0,
        }
    }

    /// Subscribes to a channel, creating it if needed.
    pub fn subscribe(&self, channel: Bytes) -> broadcast::Receiver<Bytes> {
        let mut channels = self.channels.lock().unwrap();
        channels
            .entry(channel)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Number of active subscribers on a channel.
    pub fn subscribers(&self, channel: &Bytes) -> u64 {
        let channels = self.channels.lock().unwrap();
        channels
            .get(channel)
            .map_or(0, |sender| sender.receiver_count() as u64)
    }

    /// Channels with at least one subscriber.
    pub fn active_channels(&self) -> Vec<Bytes> {
        let mut channels = self.channels.lock().unwrap();
        channels.retain(|_, sender| sender.receiver_count() > 0);
        let mut names: Vec<Bytes> = channels.keys().cloned().collect();
        names.sort();
        names
    }
}
