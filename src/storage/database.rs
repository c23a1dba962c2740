//! Sharded In-Memory Database
//!
//! One named database of the in-memory backend. Keys are spread over
//! independent shards, each behind its own `RwLock`, and may carry an expiry.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Database                             │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Expired entries are removed lazily on access and actively by the
//! background sweeper (see `expiry`).

use crate::types::{Value, ValueType};
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Number of shards per database.
const NUM_SHARDS: usize = 16;

/// Errors raised by typed operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StorageError {
    #[error("Operation against a key holding the wrong kind of value")]
    WrongType,

    #[error("value is not an integer or out of range")]
    NotInteger,

    #[error("value is not a valid float")]
    NotFloat,

    #[error("no such key")]
    NoSuchKey,
}

/// A stored value.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredValue {
    String(Bytes),
    List(VecDeque<Bytes>),
    Set(BTreeSet<Bytes>),
    /// Kept sorted by score, then member
    ZSet(Vec<(Bytes, f64)>),
    Hash(BTreeMap<Bytes, Bytes>),
}

fn scalar_bytes(value: &Value) -> Bytes {
    match value {
        Value::String(b) => b.clone(),
        Value::Status(s) => Bytes::from(s.clone()),
        Value::Integer(n) => Bytes::from(n.to_string()),
        Value::Double(d) => Bytes::from(d.to_string()),
        other => Bytes::from(other.for_command_line()),
    }
}

impl StoredValue {
    /// Converts a typed value for storage; `None` for null.
    pub fn from_value(value: &Value) -> Option<Self> {
        let stored = match value {
            Value::Null => return None,
            Value::Array(items) => StoredValue::List(items.iter().map(scalar_bytes).collect()),
            Value::Set(members) => StoredValue::Set(members.iter().cloned().collect()),
            Value::ZSet(members) => {
                let mut zset = Vec::new();
                for (member, score) in members {
                    zset_insert(&mut zset, member.clone(), *score);
                }
                StoredValue::ZSet(zset)
            }
            Value::Hash(entries) => StoredValue::Hash(entries.iter().cloned().collect()),
            scalar => StoredValue::String(scalar_bytes(scalar)),
        };
        Some(stored)
    }

    pub fn to_value(&self) -> Value {
        match self {
            StoredValue::String(b) => Value::String(b.clone()),
            StoredValue::List(items) => Value::string_array(items.iter().cloned()),
            StoredValue::Set(members) => Value::Set(members.iter().cloned().collect()),
            StoredValue::ZSet(members) => Value::ZSet(members.clone()),
            StoredValue::Hash(entries) => Value::Hash(
                entries
                    .iter()
                    .map(|(f, v)| (f.clone(), v.clone()))
                    .collect(),
            ),
        }
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            StoredValue::String(_) => ValueType::String,
            StoredValue::List(_) => ValueType::Array,
            StoredValue::Set(_) => ValueType::Set,
            StoredValue::ZSet(_) => ValueType::ZSet,
            StoredValue::Hash(_) => ValueType::Hash,
        }
    }

    /// Approximate payload size in bytes.
    fn size(&self) -> usize {
        match self {
            StoredValue::String(b) => b.len(),
            StoredValue::List(items) => items.iter().map(Bytes::len).sum(),
            StoredValue::Set(members) => members.iter().map(Bytes::len).sum(),
            StoredValue::ZSet(members) => members.iter().map(|(m, _)| m.len() + 8).sum(),
            StoredValue::Hash(entries) => entries.iter().map(|(f, v)| f.len() + v.len()).sum(),
        }
    }
}

/// Inserts or updates a member, keeping score order. Returns true if new.
pub(crate) fn zset_insert(zset: &mut Vec<(Bytes, f64)>, member: Bytes, score: f64) -> bool {
    let existed = match zset.iter().position(|(m, _)| *m == member) {
        Some(pos) => {
            zset.remove(pos);
            true
        }
        None => false,
    };
    let pos = zset
        .iter()
        .position(|(m, s)| *s > score || (*s == score && *m > member))
        .unwrap_or(zset.len());
    zset.insert(pos, (member, score));
    !existed
}

/// A stored value with optional expiry time.
#[derive(Debug, Clone)]
pub struct Entry {
    pub value: StoredValue,
    /// When this entry expires (None = never expires)
    pub expires_at: Option<Instant>,
}

impl Entry {
    pub fn new(value: StoredValue, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        }
    }

    #[inline]
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .map(|exp| Instant::now() >= exp)
            .unwrap_or(false)
    }

    /// Remaining TTL in milliseconds, or None if no expiry.
    pub fn ttl_ms(&self) -> Option<u64> {
        self.expires_at
            .map(|exp| exp.saturating_duration_since(Instant::now()).as_millis() as u64)
    }
}

#[derive(Debug)]
struct Shard {
    data: RwLock<HashMap<Bytes, Entry>>,
}

/// Operation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DatabaseStats {
    pub keys: u64,
    pub reads: u64,
    pub writes: u64,
    pub deletes: u64,
    pub expired: u64,
    pub used_memory: u64,
}

/// One named database.
pub struct Database {
    name: String,
    shards: Vec<Shard>,
    read_count: AtomicU64,
    write_count: AtomicU64,
    del_count: AtomicU64,
    expired_count: AtomicU64,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name)
            .field("shards", &self.shards.len())
            .finish()
    }
}

impl Database {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shards: (0..NUM_SHARDS)
                .map(|_| Shard {
                    data: RwLock::new(HashMap::new()),
                })
                .collect(),
            read_count: AtomicU64::new(0),
            write_count: AtomicU64::new(0),
            del_count: AtomicU64::new(0),
            expired_count: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    fn shard(&self, key: &[u8]) -> &Shard {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % NUM_SHARDS]
    }

    /// Stores a value, replacing any previous one. Returns true if the key is new.
    pub fn set(&self, key: Bytes, value: StoredValue, ttl: Option<Duration>) -> bool {
        self.write_count.fetch_add(1, Ordering::Relaxed);

        let mut data = self.shard(&key).data.write().unwrap();
        let previous = data.insert(key, Entry::new(value, ttl));
        previous.map_or(true, |e| e.is_expired())
    }

    /// Stores a value only if the key is absent. Returns true if stored.
    pub fn set_nx(&self, key: Bytes, value: StoredValue, ttl: Option<Duration>) -> bool {
        let mut data = self.shard(&key).data.write().unwrap();
        if data.get(&key).is_some_and(|e| !e.is_expired()) {
            return false;
        }
        self.write_count.fetch_add(1, Ordering::Relaxed);
        data.insert(key, Entry::new(value, ttl));
        true
    }

    /// Returns the live entry for a key, removing it if it has expired.
    pub fn get_entry(&self, key: &[u8]) -> Option<Entry> {
        self.read_count.fetch_add(1, Ordering::Relaxed);
        let shard = self.shard(key);

        {
            let data = shard.data.read().unwrap();
            match data.get(key) {
                Some(entry) if !entry.is_expired() => return Some(entry.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        let mut data = shard.data.write().unwrap();
        if data.get(key).is_some_and(Entry::is_expired) {
            data.remove(key);
            self.expired_count.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        data.get(key).cloned()
    }

    pub fn get(&self, key: &[u8]) -> Option<StoredValue> {
        self.get_entry(key).map(|e| e.value)
    }

    pub fn exists(&self, key: &[u8]) -> bool {
        let data = self.shard(key).data.read().unwrap();
        data.get(key).is_some_and(|e| !e.is_expired())
    }

    /// Deletes a key. Returns true if a live key was removed.
    pub fn delete(&self, key: &[u8]) -> bool {
        self.del_count.fetch_add(1, Ordering::Relaxed);
        let mut data = self.shard(key).data.write().unwrap();
        data.remove(key).is_some_and(|e| !e.is_expired())
    }

    pub fn delete_many(&self, keys: &[Bytes]) -> u64 {
        keys.iter().filter(|k| self.delete(k)).count() as u64
    }

    /// Moves a value (and its expiry) to a new key.
    pub fn rename(&self, key: &[u8], new_key: Bytes) -> Result<(), StorageError> {
        let entry = {
            let mut data = self.shard(key).data.write().unwrap();
            match data.remove(key) {
                Some(entry) if !entry.is_expired() => entry,
                _ => return Err(StorageError::NoSuchKey),
            }
        };
        let mut data = self.shard(&new_key).data.write().unwrap();
        data.insert(new_key, entry);
        Ok(())
    }

    /// Sets an expiry on an existing key. Returns false if the key is missing.
    pub fn expire(&self, key: &[u8], ttl: Duration) -> bool {
        self.update_entry(key, |entry| entry.expires_at = Some(Instant::now() + ttl))
    }

    /// Removes the expiry from a key. Returns false if the key is missing.
    pub fn persist(&self, key: &[u8]) -> bool {
        self.update_entry(key, |entry| entry.expires_at = None)
    }

    fn update_entry(&self, key: &[u8], f: impl FnOnce(&mut Entry)) -> bool {
        let mut data = self.shard(key).data.write().unwrap();
        match data.get_mut(key) {
            Some(entry) if !entry.is_expired() => {
                f(entry);
                true
            }
            _ => false,
        }
    }

    /// Remaining TTL in milliseconds: `-2` missing, `-1` no expiry.
    pub fn pttl(&self, key: &[u8]) -> i64 {
        match self.get_entry(key) {
            None => -2,
            Some(entry) => entry.ttl_ms().map_or(-1, |ms| ms as i64),
        }
    }

    /// Remaining TTL in seconds: `-2` missing, `-1` no expiry.
    pub fn ttl(&self, key: &[u8]) -> i64 {
        match self.pttl(key) {
            ms if ms < 0 => ms,
            ms => ms / 1000,
        }
    }

    /// Runs `f` on the live value of `key`.
    ///
    /// When the key is absent and `default` is given, the default value is
    /// created first; otherwise `NoSuchKey` is returned.
    pub fn modify<R>(
        &self,
        key: &Bytes,
        default: Option<fn() -> StoredValue>,
        f: impl FnOnce(&mut StoredValue) -> Result<R, StorageError>,
    ) -> Result<R, StorageError> {
        self.write_count.fetch_add(1, Ordering::Relaxed);
        let mut data = self.shard(key).data.write().unwrap();

        if data.get(key).is_some_and(Entry::is_expired) {
            data.remove(key);
            self.expired_count.fetch_add(1, Ordering::Relaxed);
        }

        if !data.contains_key(key) {
            let Some(default) = default else {
                return Err(StorageError::NoSuchKey);
            };
            data.insert(key.clone(), Entry::new(default(), None));
        }

        match data.get_mut(key) {
            Some(entry) => f(&mut entry.value),
            None => Err(StorageError::NoSuchKey),
        }
    }

    /// Adds `delta` to an integer string value, creating it at 0.
    pub fn incr_by(&self, key: &Bytes, delta: i64) -> Result<i64, StorageError> {
        self.modify(key, Some(|| StoredValue::String(Bytes::from_static(b"0"))), |value| {
            let StoredValue::String(current) = value else {
                return Err(StorageError::WrongType);
            };
            let n: i64 = std::str::from_utf8(current)
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or(StorageError::NotInteger)?;
            let n = n.checked_add(delta).ok_or(StorageError::NotInteger)?;
            *current = Bytes::from(n.to_string());
            Ok(n)
        })
    }

    /// Adds `delta` to a float string value, creating it at 0.
    pub fn incr_by_float(&self, key: &Bytes, delta: f64) -> Result<f64, StorageError> {
        self.modify(key, Some(|| StoredValue::String(Bytes::from_static(b"0"))), |value| {
            let StoredValue::String(current) = value else {
                return Err(StorageError::WrongType);
            };
            let n: f64 = std::str::from_utf8(current)
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or(StorageError::NotFloat)?;
            let n = n + delta;
            if !n.is_finite() {
                return Err(StorageError::NotFloat);
            }
            *current = Bytes::from(n.to_string());
            Ok(n)
        })
    }

    /// Appends (or prepends) to a string value, creating it if missing.
    /// Returns the new length.
    pub fn append(&self, key: &Bytes, data: &[u8], prepend: bool) -> Result<usize, StorageError> {
        self.modify(key, Some(|| StoredValue::String(Bytes::new())), |value| {
            let StoredValue::String(current) = value else {
                return Err(StorageError::WrongType);
            };
            let mut joined = Vec::with_capacity(current.len() + data.len());
            if prepend {
                joined.extend_from_slice(data);
                joined.extend_from_slice(current);
            } else {
                joined.extend_from_slice(current);
                joined.extend_from_slice(data);
            }
            *current = Bytes::from(joined);
            Ok(current.len())
        })
    }

    /// All live keys matching a glob pattern, sorted.
    pub fn keys(&self, pattern: &str) -> Vec<Bytes> {
        let pattern = GlobPattern::new(pattern);
        let mut keys = self.collect_keys(|key| pattern.matches(key));
        keys.sort();
        keys
    }

    /// Live keys in `[start, end]` in byte order, at most `limit` of them.
    pub fn keys_range(&self, start: &[u8], end: &[u8], limit: usize) -> Vec<Bytes> {
        let mut keys = self.collect_keys(|key| key >= start && key <= end);
        keys.sort();
        keys.truncate(limit);
        keys
    }

    /// Cursor based iteration over sorted keys.
    ///
    /// Examines `count` keys from position `cursor` and returns those matching
    /// `pattern` with the next cursor (0 when iteration is complete).
    pub fn scan(&self, cursor: u64, pattern: &str, count: usize) -> (u64, Vec<Bytes>) {
        let all = self.keys("*");
        let start = cursor as usize;
        if start >= all.len() {
            return (0, Vec::new());
        }

        let end = (start + count.max(1)).min(all.len());
        let pattern = GlobPattern::new(pattern);
        let page = all[start..end]
            .iter()
            .filter(|key| pattern.matches(key))
            .cloned()
            .collect();

        let next = if end >= all.len() { 0 } else { end as u64 };
        (next, page)
    }

    fn collect_keys(&self, mut keep: impl FnMut(&[u8]) -> bool) -> Vec<Bytes> {
        let mut result = Vec::new();
        for shard in &self.shards {
            let data = shard.data.read().unwrap();
            for (key, entry) in data.iter() {
                if !entry.is_expired() && keep(key) {
                    result.push(key.clone());
                }
            }
        }
        result
    }

    pub fn key_type(&self, key: &[u8]) -> Option<ValueType> {
        self.get_entry(key).map(|e| e.value.value_type())
    }

    /// Removes every key.
    pub fn flush(&self) {
        for shard in &self.shards {
            shard.data.write().unwrap().clear();
        }
    }

    /// Number of live keys.
    pub fn len(&self) -> u64 {
        self.shards
            .iter()
            .map(|shard| {
                let data = shard.data.read().unwrap();
                data.values().filter(|e| !e.is_expired()).count() as u64
            })
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes expired entries from every shard. Returns how many were removed.
    pub fn cleanup_expired(&self) -> u64 {
        let mut cleaned = 0u64;
        for shard in &self.shards {
            let mut data = shard.data.write().unwrap();
            let before = data.len();
            data.retain(|_, entry| !entry.is_expired());
            cleaned += (before - data.len()) as u64;
        }
        if cleaned > 0 {
            self.expired_count.fetch_add(cleaned, Ordering::Relaxed);
        }
        cleaned
    }

    pub fn stats(&self) -> DatabaseStats {
        let mut keys = 0u64;
        let mut used_memory = 0u64;
        for shard in &self.shards {
            let data = shard.data.read().unwrap();
            for (key, entry) in data.iter().filter(|(_, e)| !e.is_expired()) {
                keys += 1;
                used_memory += (key.len() + entry.value.size() + 48) as u64;
            }
        }

        DatabaseStats {
            keys,
            reads: self.read_count.load(Ordering::Relaxed),
            writes: self.write_count.load(Ordering::Relaxed),
            deletes: self.del_count.load(Ordering::Relaxed),
            expired: self.expired_count.load(Ordering::Relaxed),
            used_memory,
        }
    }
}

/// Glob matcher used by KEYS and SCAN MATCH.
///
/// Supports `*`, `?`, `[abc]`, `[^a-z]` and `\` escapes over raw bytes.
pub struct GlobPattern {
    pattern: Vec<u8>,
}

impl GlobPattern {
    pub fn new(pattern: &str) -> Self {
        Self {
            pattern: pattern.as_bytes().to_vec(),
        }
    }

    pub fn matches(&self, text: &[u8]) -> bool {
        Self::matches_at(&self.pattern, text)
    }

    fn matches_at(pattern: &[u8], text: &[u8]) -> bool {
        let Some(&first) = pattern.first() else {
            return text.is_empty();
        };

        match first {
            b'*' => (0..=text.len()).any(|i| Self::matches_at(&pattern[1..], &text[i..])),
            b'?' => !text.is_empty() && Self::matches_at(&pattern[1..], &text[1..]),
            b'[' => {
                let Some(&c) = text.first() else {
                    return false;
                };
                let negate = pattern.get(1) == Some(&b'^');
                let mut i = if negate { 2 } else { 1 };
                let mut matched = false;

                while i < pattern.len() && pattern[i] != b']' {
                    if i + 2 < pattern.len() && pattern[i + 1] == b'-' && pattern[i + 2] != b']' {
                        matched |= c >= pattern[i] && c <= pattern[i + 2];
                        i += 3;
                    } else {
                        matched |= pattern[i] == c;
                        i += 1;
                    }
                }

                i < pattern.len() && matched != negate && Self::matches_at(&pattern[i + 1..], &text[1..])
            }
            b'\\' if pattern.len() > 1 => {
                text.first() == Some(&pattern[1]) && Self::matches_at(&pattern[2..], &text[1..])
            }
            literal => text.first() == Some(&literal) && Self::matches_at(&pattern[1..], &text[1..]),
        }
    }
}
