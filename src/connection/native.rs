//! Native Connection Seam
//!
//! Handlers never talk to a backend directly; they call a
//! [`NativeConnection`]. Real client libraries plug in behind this trait.
//! [`MemoryConnection`] implements it over the shared in-memory
//! [`StorageEngine`] and enforces the capabilities of the backend it stands
//! in for.
//!
//! A native connection is not thread safe. It is owned by exactly one
//! driver worker (see `driver`).

use crate::db::ConnectionType;
use crate::storage::{Database, StorageEngine, StorageError, StoredValue};
use crate::types::{KeyString, NKey, Ttl, Value, ValueType};
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::broadcast;

/// Failures reported by a native connection.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NativeError {
    #[error("not connected")]
    NotConnected,

    #[error("not supported {0} command for {1}")]
    NotSupported(&'static str, &'static str),

    #[error("database '{0}' does not exist")]
    NoSuchDatabase(String),

    #[error("database '{0}' already exists")]
    DatabaseExists(String),

    #[error("unknown config parameter '{0}'")]
    UnknownParameter(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type NativeResult<T> = Result<T, NativeError>;

/// Operations a backend client exposes to the command handlers.
///
/// Typed collection, TTL and pub/sub operations have default bodies that
/// report the operation as unsupported, so scalar-only clients implement
/// just the core.
pub trait NativeConnection: Send {
    fn connection_type(&self) -> ConnectionType;

    fn is_connected(&self) -> bool;

    /// Closes the connection; later calls fail with `NotConnected`.
    fn quit(&mut self);

    /// Server information as `(section, [(field, value)])`.
    fn info(&mut self, section: Option<&str>) -> NativeResult<Vec<(String, Vec<(String, String)>)>>;

    fn config_get(&mut self, parameter: &str) -> NativeResult<Vec<(String, String)>>;

    fn config_set(&mut self, parameter: &str, value: &str) -> NativeResult<()>;

    fn current_database(&self) -> String;

    /// Names of every database on the backend.
    fn database_names(&mut self) -> NativeResult<Vec<String>>;

    fn select(&mut self, name: &str) -> NativeResult<()>;

    fn create_database(&mut self, name: &str) -> NativeResult<()>;

    fn remove_database(&mut self, name: &str) -> NativeResult<()>;

    fn flushdb(&mut self) -> NativeResult<()>;

    fn dbkcount(&mut self) -> NativeResult<u64>;

    fn keys(&mut self, pattern: &str) -> NativeResult<Vec<Bytes>>;

    fn keys_range(&mut self, start: &[u8], end: &[u8], limit: u64) -> NativeResult<Vec<Bytes>>;

    fn scan(&mut self, cursor: u64, pattern: &str, count: u64) -> NativeResult<(u64, Vec<Bytes>)>;

    /// Stores a value under `key.key`, applying `key.ttl`.
    fn set(&mut self, key: &NKey, value: &Value) -> NativeResult<()>;

    /// Stores only if absent; returns true if stored.
    fn set_nx(&mut self, key: &NKey, value: &Value) -> NativeResult<bool>;

    fn get(&mut self, key: &KeyString) -> NativeResult<Option<Value>>;

    fn exists(&mut self, key: &KeyString) -> NativeResult<bool>;

    fn value_type(&mut self, key: &KeyString) -> NativeResult<Option<ValueType>>;

    /// Deletes keys; returns how many existed.
    fn delete(&mut self, keys: &[KeyString]) -> NativeResult<u64>;

    fn rename(&mut self, key: &KeyString, new_key: &KeyString) -> NativeResult<()>;

    fn incr_by(&mut self, key: &KeyString, delta: i64) -> NativeResult<i64>;

    fn incr_by_float(&mut self, _key: &KeyString, _delta: f64) -> NativeResult<f64> {
        Err(self.unsupported("incrbyfloat"))
    }

    /// Appends or prepends to a string value; returns the new length.
    fn append(&mut self, key: &KeyString, data: &[u8], prepend: bool) -> NativeResult<usize>;

    /// Sets or clears the expiry; returns false if the key is missing.
    fn set_ttl(&mut self, _key: &KeyString, _ttl: Ttl) -> NativeResult<bool> {
        Err(self.unsupported("change ttl"))
    }

    fn set_pttl(&mut self, _key: &KeyString, _ms: u64) -> NativeResult<bool> {
        Err(self.unsupported("change ttl"))
    }

    /// Remaining seconds; `-2` missing, `-1` persistent.
    fn ttl(&mut self, _key: &KeyString) -> NativeResult<i64> {
        Err(self.unsupported("load ttl"))
    }

    fn pttl(&mut self, _key: &KeyString) -> NativeResult<i64> {
        Err(self.unsupported("load ttl"))
    }

    /// Pushes items onto a list; returns the new length.
    fn push(&mut self, _key: &KeyString, _items: &[Bytes], _front: bool) -> NativeResult<usize> {
        Err(self.unsupported("list"))
    }

    fn list_range(&mut self, _key: &KeyString, _start: i64, _stop: i64) -> NativeResult<Vec<Bytes>> {
        Err(self.unsupported("list"))
    }

    fn set_add(&mut self, _key: &KeyString, _members: &[Bytes]) -> NativeResult<usize> {
        Err(self.unsupported("set"))
    }

    fn set_members(&mut self, _key: &KeyString) -> NativeResult<Vec<Bytes>> {
        Err(self.unsupported("set"))
    }

    fn zset_add(&mut self, _key: &KeyString, _members: &[(Bytes, f64)]) -> NativeResult<usize> {
        Err(self.unsupported("zset"))
    }

    fn zset_range(
        &mut self,
        _key: &KeyString,
        _start: i64,
        _stop: i64,
    ) -> NativeResult<Vec<(Bytes, f64)>> {
        Err(self.unsupported("zset"))
    }

    fn hash_set(&mut self, _key: &KeyString, _entries: &[(Bytes, Bytes)]) -> NativeResult<usize> {
        Err(self.unsupported("hash"))
    }

    fn hash_get(&mut self, _key: &KeyString, _field: &[u8]) -> NativeResult<Option<Bytes>> {
        Err(self.unsupported("hash"))
    }

    fn hash_get_all(&mut self, _key: &KeyString) -> NativeResult<Vec<(Bytes, Bytes)>> {
        Err(self.unsupported("hash"))
    }

    /// Returns the number of receivers.
    fn publish(&mut self, _channel: &KeyString, _message: &[u8]) -> NativeResult<u64> {
        Err(self.unsupported("publish"))
    }

    /// Returns the number of channels this connection listens to.
    fn subscribe(&mut self, _channel: &KeyString) -> NativeResult<u64> {
        Err(self.unsupported("subscribe"))
    }

    /// Drains messages received on subscribed channels.
    fn poll_messages(&mut self) -> Vec<(Bytes, Bytes)> {
        Vec::new()
    }

    fn unsupported(&self, operation: &'static str) -> NativeError {
        NativeError::NotSupported(operation, self.connection_type().db_name())
    }
}

/// Resolves a possibly negative range against a length, Redis style.
fn resolve_range(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len {
        None
    } else {
        Some((start as usize, stop as usize))
    }
}

/// An in-process backend connection over a [`StorageEngine`].
///
/// # Example
///
/// ```
/// use fastonosql::connection::{MemoryConnection, NativeConnection};
/// use fastonosql::db::ConnectionType;
/// use fastonosql::storage::StorageEngine;
/// use fastonosql::types::{KeyString, NKey, Value};
/// use std::sync::Arc;
///
/// let engine = Arc::new(StorageEngine::new());
/// let mut conn = MemoryConnection::new(engine, ConnectionType::Lmdb).unwrap();
///
/// conn.set(&NKey::new("k"), &Value::string("v")).unwrap();
/// assert_eq!(conn.get(&KeyString::from("k")).unwrap(), Some(Value::string("v")));
/// ```
pub struct MemoryConnection {
    engine: Arc<StorageEngine>,
    ty: ConnectionType,
    db: Arc<Database>,
    connected: bool,
    config: BTreeMap<String, String>,
    subscriptions: Vec<(Bytes, broadcast::Receiver<Bytes>)>,
    connected_at: Instant,
    commands: u64,
}

impl std::fmt::Debug for MemoryConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryConnection")
            .field("type", &self.ty)
            .field("database", &self.db.name())
            .field("connected", &self.connected)
            .finish()
    }
}

impl MemoryConnection {
    /// Opens a connection on the engine's first database.
    pub fn new(engine: Arc<StorageEngine>, ty: ConnectionType) -> NativeResult<Self> {
        let db = engine
            .default_database()
            .ok_or_else(|| NativeError::NoSuchDatabase(crate::storage::DEFAULT_DATABASE.into()))?;

        let config = BTreeMap::from([
            ("maxmemory".to_string(), "0".to_string()),
            ("timeout".to_string(), "0".to_string()),
        ]);

        Ok(Self {
            engine,
            ty,
            db,
            connected: true,
            config,
            subscriptions: Vec::new(),
            connected_at: Instant::now(),
            commands: 0,
        })
    }

    pub fn engine(&self) -> &Arc<StorageEngine> {
        &self.engine
    }

    fn check(&mut self) -> NativeResult<&Database> {
        if !self.connected {
            return Err(NativeError::NotConnected);
        }
        self.commands += 1;
        Ok(self.db.as_ref())
    }

    fn require_ttl(&self, operation: &'static str) -> NativeResult<()> {
        if self.ty.capabilities().ttl {
            Ok(())
        } else {
            Err(self.unsupported(operation))
        }
    }

    fn require_collections(&self, operation: &'static str) -> NativeResult<()> {
        if self.ty.capabilities().collections {
            Ok(())
        } else {
            Err(self.unsupported(operation))
        }
    }

    fn require_pubsub(&self, operation: &'static str) -> NativeResult<()> {
        if self.ty.capabilities().pubsub {
            Ok(())
        } else {
            Err(self.unsupported(operation))
        }
    }
}

fn ttl_duration(ttl: Ttl) -> Option<Duration> {
    match ttl {
        Ttl::Persistent => None,
        Ttl::Seconds(s) => Some(Duration::from_secs(s)),
    }
}

impl NativeConnection for MemoryConnection {
    fn connection_type(&self) -> ConnectionType {
        self.ty
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn quit(&mut self) {
        self.connected = false;
        self.subscriptions.clear();
    }

    fn info(&mut self, section: Option<&str>) -> NativeResult<Vec<(String, Vec<(String, String)>)>> {
        self.check()?;
        let stats = self.db.stats();
        let mut sections = vec![
            (
                "server".to_string(),
                vec![
                    ("backend".to_string(), self.ty.db_name().to_string()),
                    ("version".to_string(), crate::VERSION.to_string()),
                    (
                        "uptime_in_seconds".to_string(),
                        self.connected_at.elapsed().as_secs().to_string(),
                    ),
                ],
            ),
            (
                "stats".to_string(),
                vec![
                    ("total_commands_processed".to_string(), self.commands.to_string()),
                    ("reads".to_string(), stats.reads.to_string()),
                    ("writes".to_string(), stats.writes.to_string()),
                    ("deletes".to_string(), stats.deletes.to_string()),
                    ("expired_keys".to_string(), stats.expired.to_string()),
                ],
            ),
            (
                "keyspace".to_string(),
                self.engine
                    .databases()
                    .iter()
                    .map(|db| (format!("db{}", db.name()), format!("keys={}", db.len())))
                    .collect(),
            ),
            (
                "memory".to_string(),
                vec![("used_memory".to_string(), stats.used_memory.to_string())],
            ),
        ];

        if let Some(section) = section {
            sections.retain(|(name, _)| name.eq_ignore_ascii_case(section));
        }
        Ok(sections)
    }

    fn config_get(&mut self, parameter: &str) -> NativeResult<Vec<(String, String)>> {
        self.check()?;
        let pattern = crate::storage::GlobPattern::new(parameter);
        Ok(self
            .config
            .iter()
            .filter(|(name, _)| pattern.matches(name.as_bytes()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect())
    }

    fn config_set(&mut self, parameter: &str, value: &str) -> NativeResult<()> {
        self.check()?;
        match self.config.get_mut(parameter) {
            Some(current) => {
                *current = value.to_string();
                Ok(())
            }
            None => Err(NativeError::UnknownParameter(parameter.to_string())),
        }
    }

    fn current_database(&self) -> String {
        self.db.name().to_string()
    }

    fn database_names(&mut self) -> NativeResult<Vec<String>> {
        self.check()?;
        Ok(self.engine.database_names())
    }

    fn select(&mut self, name: &str) -> NativeResult<()> {
        self.check()?;
        self.db = self
            .engine
            .database(name)
            .ok_or_else(|| NativeError::NoSuchDatabase(name.to_string()))?;
        Ok(())
    }

    fn create_database(&mut self, name: &str) -> NativeResult<()> {
        self.check()?;
        if self.engine.create_database(name) {
            Ok(())
        } else {
            Err(NativeError::DatabaseExists(name.to_string()))
        }
    }

    fn remove_database(&mut self, name: &str) -> NativeResult<()> {
        self.check()?;
        if self.engine.remove_database(name) {
            Ok(())
        } else {
            Err(NativeError::NoSuchDatabase(name.to_string()))
        }
    }

    fn flushdb(&mut self) -> NativeResult<()> {
        self.check()?.flush();
        Ok(())
    }

    fn dbkcount(&mut self) -> NativeResult<u64> {
        Ok(self.check()?.len())
    }

    fn keys(&mut self, pattern: &str) -> NativeResult<Vec<Bytes>> {
        Ok(self.check()?.keys(pattern))
    }

    fn keys_range(&mut self, start: &[u8], end: &[u8], limit: u64) -> NativeResult<Vec<Bytes>> {
        Ok(self.check()?.keys_range(start, end, limit as usize))
    }

    fn scan(&mut self, cursor: u64, pattern: &str, count: u64) -> NativeResult<(u64, Vec<Bytes>)> {
        Ok(self.check()?.scan(cursor, pattern, count as usize))
    }

    fn set(&mut self, key: &NKey, value: &Value) -> NativeResult<()> {
        if !matches!(value.value_type(), ValueType::String | ValueType::Integer | ValueType::Double | ValueType::Status) {
            self.require_collections("create key")?;
        }
        if !key.ttl.is_persistent() {
            self.require_ttl("change ttl")?;
        }
        let stored = StoredValue::from_value(value).ok_or(StorageError::NoSuchKey)?;
        self.check()?
            .set(key.key.data().clone(), stored, ttl_duration(key.ttl));
        Ok(())
    }

    fn set_nx(&mut self, key: &NKey, value: &Value) -> NativeResult<bool> {
        let stored = StoredValue::from_value(value).ok_or(StorageError::NoSuchKey)?;
        Ok(self
            .check()?
            .set_nx(key.key.data().clone(), stored, ttl_duration(key.ttl)))
    }

    fn get(&mut self, key: &KeyString) -> NativeResult<Option<Value>> {
        Ok(self.check()?.get(key.as_bytes()).map(|v| v.to_value()))
    }

    fn exists(&mut self, key: &KeyString) -> NativeResult<bool> {
        Ok(self.check()?.exists(key.as_bytes()))
    }

    fn value_type(&mut self, key: &KeyString) -> NativeResult<Option<ValueType>> {
        Ok(self.check()?.key_type(key.as_bytes()))
    }

    fn delete(&mut self, keys: &[KeyString]) -> NativeResult<u64> {
        let db = self.check()?;
        Ok(keys.iter().filter(|k| db.delete(k.as_bytes())).count() as u64)
    }

    fn rename(&mut self, key: &KeyString, new_key: &KeyString) -> NativeResult<()> {
        self.check()?.rename(key.as_bytes(), new_key.data().clone())?;
        Ok(())
    }

    fn incr_by(&mut self, key: &KeyString, delta: i64) -> NativeResult<i64> {
        Ok(self.check()?.incr_by(key.data(), delta)?)
    }

    fn incr_by_float(&mut self, key: &KeyString, delta: f64) -> NativeResult<f64> {
        Ok(self.check()?.incr_by_float(key.data(), delta)?)
    }

    fn append(&mut self, key: &KeyString, data: &[u8], prepend: bool) -> NativeResult<usize> {
        Ok(self.check()?.append(key.data(), data, prepend)?)
    }

    fn set_ttl(&mut self, key: &KeyString, ttl: Ttl) -> NativeResult<bool> {
        self.require_ttl("change ttl")?;
        let db = self.check()?;
        Ok(match ttl {
            Ttl::Persistent => db.persist(key.as_bytes()),
            Ttl::Seconds(s) => db.expire(key.as_bytes(), Duration::from_secs(s)),
        })
    }

    fn set_pttl(&mut self, key: &KeyString, ms: u64) -> NativeResult<bool> {
        self.require_ttl("change ttl")?;
        Ok(self.check()?.expire(key.as_bytes(), Duration::from_millis(ms)))
    }

    fn ttl(&mut self, key: &KeyString) -> NativeResult<i64> {
        self.require_ttl("load ttl")?;
        Ok(self.check()?.ttl(key.as_bytes()))
    }

    fn pttl(&mut self, key: &KeyString) -> NativeResult<i64> {
        self.require_ttl("load ttl")?;
        Ok(self.check()?.pttl(key.as_bytes()))
    }

    fn push(&mut self, key: &KeyString, items: &[Bytes], front: bool) -> NativeResult<usize> {
        self.require_collections("list")?;
        let db = self.check()?;
        Ok(db.modify(key.data(), Some(|| StoredValue::List(VecDeque::new())), |value| {
            let StoredValue::List(list) = value else {
                return Err(StorageError::WrongType);
            };
            for item in items {
                if front {
                    list.push_front(item.clone());
                } else {
                    list.push_back(item.clone());
                }
            }
            Ok(list.len())
        })?)
    }

    fn list_range(&mut self, key: &KeyString, start: i64, stop: i64) -> NativeResult<Vec<Bytes>> {
        self.require_collections("list")?;
        match self.check()?.get(key.as_bytes()) {
            None => Ok(Vec::new()),
            Some(StoredValue::List(list)) => Ok(resolve_range(list.len(), start, stop)
                .map(|(s, e)| list.range(s..=e).cloned().collect())
                .unwrap_or_default()),
            Some(_) => Err(StorageError::WrongType.into()),
        }
    }

    fn set_add(&mut self, key: &KeyString, members: &[Bytes]) -> NativeResult<usize> {
        self.require_collections("set")?;
        let db = self.check()?;
        Ok(db.modify(key.data(), Some(|| StoredValue::Set(BTreeSet::new())), |value| {
            let StoredValue::Set(set) = value else {
                return Err(StorageError::WrongType);
            };
            Ok(members.iter().filter(|m| set.insert((*m).clone())).count())
        })?)
    }

    fn set_members(&mut self, key: &KeyString) -> NativeResult<Vec<Bytes>> {
        self.require_collections("set")?;
        match self.check()?.get(key.as_bytes()) {
            None => Ok(Vec::new()),
            Some(StoredValue::Set(set)) => Ok(set.into_iter().collect()),
            Some(_) => Err(StorageError::WrongType.into()),
        }
    }

    fn zset_add(&mut self, key: &KeyString, members: &[(Bytes, f64)]) -> NativeResult<usize> {
        self.require_collections("zset")?;
        let db = self.check()?;
        Ok(db.modify(key.data(), Some(|| StoredValue::ZSet(Vec::new())), |value| {
            let StoredValue::ZSet(zset) = value else {
                return Err(StorageError::WrongType);
            };
            Ok(members
                .iter()
                .filter(|(m, score)| crate::storage::database::zset_insert(zset, m.clone(), *score))
                .count())
        })?)
    }

    fn zset_range(&mut self, key: &KeyString, start: i64, stop: i64) -> NativeResult<Vec<(Bytes, f64)>> {
        self.require_collections("zset")?;
        match self.check()?.get(key.as_bytes()) {
            None => Ok(Vec::new()),
            Some(StoredValue::ZSet(zset)) => Ok(resolve_range(zset.len(), start, stop)
                .map(|(s, e)| zset[s..=e].to_vec())
                .unwrap_or_default()),
            Some(_) => Err(StorageError::WrongType.into()),
        }
    }

    fn hash_set(&mut self, key: &KeyString, entries: &[(Bytes, Bytes)]) -> NativeResult<usize> {
        self.require_collections("hash")?;
        let db = self.check()?;
        Ok(db.modify(key.data(), Some(|| StoredValue::Hash(BTreeMap::new())), |value| {
            let StoredValue::Hash(hash) = value else {
                return Err(StorageError::WrongType);
            };
            Ok(entries
                .iter()
                .filter(|(f, v)| hash.insert(f.clone(), v.clone()).is_none())
                .count())
        })?)
    }

    fn hash_get(&mut self, key: &KeyString, field: &[u8]) -> NativeResult<Option<Bytes>> {
        self.require_collections("hash")?;
        match self.check()?.get(key.as_bytes()) {
            None => Ok(None),
            Some(StoredValue::Hash(hash)) => Ok(hash.get(field).cloned()),
            Some(_) => Err(StorageError::WrongType.into()),
        }
    }

    fn hash_get_all(&mut self, key: &KeyString) -> NativeResult<Vec<(Bytes, Bytes)>> {
        self.require_collections("hash")?;
        match self.check()?.get(key.as_bytes()) {
            None => Ok(Vec::new()),
            Some(StoredValue::Hash(hash)) => Ok(hash.into_iter().collect()),
            Some(_) => Err(StorageError::WrongType.into()),
        }
    }

    fn publish(&mut self, channel: &KeyString, message: &[u8]) -> NativeResult<u64> {
        self.require_pubsub("publish")?;
        self.check()?;
        Ok(self
            .engine
            .publish(channel.data(), Bytes::copy_from_slice(message)))
    }

    fn subscribe(&mut self, channel: &KeyString) -> NativeResult<u64> {
        self.require_pubsub("subscribe")?;
        self.check()?;
        if !self.subscriptions.iter().any(|(name, _)| name == channel.data()) {
            let rx = self.engine.subscribe(channel.data().clone());
            self.subscriptions.push((channel.data().clone(), rx));
        }
        Ok(self.subscriptions.len() as u64)
    }

    fn poll_messages(&mut self) -> Vec<(Bytes, Bytes)> {
        let mut messages = Vec::new();
        for (channel, rx) in &mut self.subscriptions {
            while let Ok(message) = rx.try_recv() {
                messages.push((channel.clone(), message));
            }
        }
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection(ty: ConnectionType) -> MemoryConnection {
        let engine = Arc::new(StorageEngine::with_databases(ty.default_databases()));
        MemoryConnection::new(engine, ty).unwrap()
    }

    #[test]
    fn test_resolve_range() {
        assert_eq!(resolve_range(5, 0, -1), Some((0, 4)));
        assert_eq!(resolve_range(5, -2, -1), Some((3, 4)));
        assert_eq!(resolve_range(5, 1, 100), Some((1, 4)));
        assert_eq!(resolve_range(5, 3, 1), None);
        assert_eq!(resolve_range(0, 0, -1), None);
    }

    #[test]
    fn test_scalar_backend_rejects_ttl() {
        let mut conn = connection(ConnectionType::Lmdb);
        let key = KeyString::from("k");
        conn.set(&NKey::new("k"), &Value::string("v")).unwrap();

        assert_eq!(
            conn.set_ttl(&key, Ttl::Seconds(10)),
            Err(NativeError::NotSupported("change ttl", "LMDB"))
        );
        assert!(conn.ttl(&key).is_err());
        assert!(conn.push(&key, &[Bytes::from("x")], true).is_err());
        assert!(conn.publish(&key, b"hi").is_err());
    }

    #[test]
    fn test_collections() {
        let mut conn = connection(ConnectionType::Redis);
        let key = KeyString::from("list");
        assert_eq!(conn.push(&key, &[Bytes::from("a"), Bytes::from("b")], true), Ok(2));
        assert_eq!(
            conn.list_range(&key, 0, -1),
            Ok(vec![Bytes::from("b"), Bytes::from("a")])
        );
        assert!(matches!(
            conn.set_members(&key),
            Err(NativeError::Storage(StorageError::WrongType))
        ));

        let hash = KeyString::from("h");
        assert_eq!(conn.hash_set(&hash, &[(Bytes::from("f"), Bytes::from("v"))]), Ok(1));
        assert_eq!(conn.hash_get(&hash, b"f"), Ok(Some(Bytes::from("v"))));
    }

    #[test]
    fn test_select_and_databases() {
        let mut conn = connection(ConnectionType::Redis);
        conn.set(&NKey::new("k"), &Value::string("v")).unwrap();
        conn.select("1").unwrap();
        assert_eq!(conn.current_database(), "1");
        assert_eq!(conn.get(&KeyString::from("k")), Ok(None));
        assert!(matches!(conn.select("99"), Err(NativeError::NoSuchDatabase(_))));
    }

    #[test]
    fn test_quit() {
        let mut conn = connection(ConnectionType::Memcached);
        conn.quit();
        assert!(!conn.is_connected());
        assert_eq!(conn.dbkcount(), Err(NativeError::NotConnected));
    }

    #[test]
    fn test_pubsub_roundtrip() {
        let engine = Arc::new(StorageEngine::new());
        let mut listener = MemoryConnection::new(Arc::clone(&engine), ConnectionType::Redis).unwrap();
        let mut sender = MemoryConnection::new(engine, ConnectionType::Redis).unwrap();
        let channel = KeyString::from("news");

        assert_eq!(listener.subscribe(&channel), Ok(1));
        assert_eq!(sender.publish(&channel, b"hello"), Ok(1));
        assert_eq!(
            listener.poll_messages(),
            vec![(Bytes::from("news"), Bytes::from("hello"))]
        );
    }
}
