//! Backends
//!
//! One module per supported backend. Each holds the backend's ordered
//! command table, its [`CommandTranslator`] and any handlers only that
//! backend needs.
//!
//! ## Capabilities
//!
//! | backend   | ttl | pub/sub | collections |
//! |-----------|-----|---------|-------------|
//! | Redis     |  ✓  |    ✓    |      ✓      |
//! | Memcached |  ✓  |         |             |
//! | SSDB      |  ✓  |         |      ✓      |
//! | LevelDB, RocksDB, LMDB, UnQLite, UpscaleDB, ForestDB | | | |
//!
//! Unsupported operations fail the same way for every input, so a client
//! can tell from the connection type alone what will work.

pub mod forestdb;
mod kv;
pub mod leveldb;
pub mod lmdb;
pub mod memcached;
pub mod redis;
pub mod rocksdb;
pub mod ssdb;
pub mod unqlite;
pub mod upscaledb;

use crate::commands::{CommandHolder, CommandTranslator};
use std::sync::Arc;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Supported backends.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumString, Display, EnumIter, AsRefStr,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ConnectionType {
    Redis,
    Memcached,
    Ssdb,
    LevelDb,
    RocksDb,
    Lmdb,
    UnqLite,
    UpscaleDb,
    ForestDb,
}

/// What a backend can do beyond plain key/value access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub ttl: bool,
    pub pubsub: bool,
    pub collections: bool,
}

impl ConnectionType {
    /// Human readable backend name used in messages.
    pub const fn db_name(&self) -> &'static str {
        match self {
            ConnectionType::Redis => "Redis",
            ConnectionType::Memcached => "Memcached",
            ConnectionType::Ssdb => "SSDB",
            ConnectionType::LevelDb => "LevelDB",
            ConnectionType::RocksDb => "RocksDB",
            ConnectionType::Lmdb => "LMDB",
            ConnectionType::UnqLite => "UnQLite",
            ConnectionType::UpscaleDb => "UpscaleDB",
            ConnectionType::ForestDb => "ForestDB",
        }
    }

    pub const fn capabilities(&self) -> Capabilities {
        match self {
            ConnectionType::Redis => Capabilities {
                ttl: true,
                pubsub: true,
                collections: true,
            },
            ConnectionType::Memcached => Capabilities {
                ttl: true,
                pubsub: false,
                collections: false,
            },
            ConnectionType::Ssdb => Capabilities {
                ttl: true,
                pubsub: false,
                collections: true,
            },
            ConnectionType::LevelDb
            | ConnectionType::RocksDb
            | ConnectionType::Lmdb
            | ConnectionType::UnqLite
            | ConnectionType::UpscaleDb
            | ConnectionType::ForestDb => Capabilities {
                ttl: false,
                pubsub: false,
                collections: false,
            },
        }
    }

    /// Extension of the per-connection info log file.
    pub const fn logging_extension(&self) -> &'static str {
        match self {
            ConnectionType::Redis => ".red",
            ConnectionType::Memcached => ".mem",
            ConnectionType::Ssdb => ".ssdb",
            ConnectionType::LevelDb => ".leveldb",
            ConnectionType::RocksDb => ".rocksdb",
            ConnectionType::Lmdb => ".lmdb",
            ConnectionType::UnqLite => ".unq",
            ConnectionType::UpscaleDb => ".upscaledb",
            ConnectionType::ForestDb => ".forestdb",
        }
    }

    /// Databases a fresh in-memory backend of this type starts with.
    pub fn default_databases(&self) -> Vec<String> {
        match self {
            ConnectionType::Redis => (0..16).map(|i| i.to_string()).collect(),
            _ => vec![crate::storage::DEFAULT_DATABASE.to_string()],
        }
    }
}

/// The ordered command table of a backend.
pub fn command_table(ty: ConnectionType) -> &'static [CommandHolder] {
    match ty {
        ConnectionType::Redis => redis::COMMANDS,
        ConnectionType::Memcached => memcached::COMMANDS,
        ConnectionType::Ssdb => ssdb::COMMANDS,
        ConnectionType::LevelDb => leveldb::COMMANDS,
        ConnectionType::RocksDb => rocksdb::COMMANDS,
        ConnectionType::Lmdb => lmdb::COMMANDS,
        ConnectionType::UnqLite => unqlite::COMMANDS,
        ConnectionType::UpscaleDb => upscaledb::COMMANDS,
        ConnectionType::ForestDb => forestdb::COMMANDS,
    }
}

/// Creates the translator for a backend.
pub fn create_translator(ty: ConnectionType) -> Arc<dyn CommandTranslator> {
    match ty {
        ConnectionType::Redis => Arc::new(redis::Translator),
        ConnectionType::Memcached => Arc::new(memcached::Translator),
        ConnectionType::Ssdb => Arc::new(ssdb::Translator),
        ConnectionType::LevelDb => Arc::new(leveldb::Translator),
        ConnectionType::RocksDb => Arc::new(rocksdb::Translator),
        ConnectionType::Lmdb => Arc::new(lmdb::Translator),
        ConnectionType::UnqLite => Arc::new(unqlite::Translator),
        ConnectionType::UpscaleDb => Arc::new(upscaledb::Translator),
        ConnectionType::ForestDb => Arc::new(forestdb::Translator),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Arity;
    use crate::error::Error;
    use bytes::Bytes;
    use std::collections::HashSet;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    fn command_line(name: &str, argc: usize) -> Vec<Bytes> {
        let mut argv: Vec<Bytes> = name
            .split(' ')
            .map(|w| Bytes::copy_from_slice(w.as_bytes()))
            .collect();
        argv.extend((0..argc).map(|i| Bytes::from(format!("arg{}", i))));
        argv
    }

    #[test]
    fn test_connection_type_parsing() {
        assert_eq!(ConnectionType::from_str("redis"), Ok(ConnectionType::Redis));
        assert_eq!(ConnectionType::from_str("RocksDB"), Ok(ConnectionType::RocksDb));
        assert_eq!(ConnectionType::Lmdb.to_string(), "lmdb");
        assert!(ConnectionType::from_str("mongo").is_err());
        assert_eq!(ConnectionType::iter().count(), 9);
    }

    #[test]
    fn test_table_names_unique() {
        for ty in ConnectionType::iter() {
            let mut seen = HashSet::new();
            for cmd in command_table(ty) {
                assert!(
                    seen.insert(cmd.name().to_ascii_uppercase()),
                    "{} has duplicate {}",
                    ty,
                    cmd.name()
                );
            }
        }
    }

    #[test]
    fn test_min_arity_accepted_below_rejected() {
        for ty in ConnectionType::iter() {
            let translator = create_translator(ty);
            for cmd in command_table(ty) {
                let min = cmd.info.arity.min();
                let (found, off) = translator
                    .find_command(&command_line(cmd.name(), min))
                    .unwrap_or_else(|e| panic!("{} {}: {}", ty, cmd.name(), e));
                assert_eq!(found.name(), cmd.name());
                assert_eq!(off, cmd.info.name_len());

                if min > 0 {
                    let err = translator
                        .find_command(&command_line(cmd.name(), min - 1))
                        .unwrap_err();
                    assert!(
                        matches!(err, Error::InvalidArity { .. }),
                        "{} {}: {}",
                        ty,
                        cmd.name(),
                        err
                    );
                }
            }
        }
    }

    #[test]
    fn test_max_arity() {
        for ty in ConnectionType::iter() {
            let translator = create_translator(ty);
            for cmd in command_table(ty) {
                match cmd.info.arity {
                    Arity::AtLeast(min) => {
                        assert!(translator.find_command(&command_line(cmd.name(), min + 7)).is_ok());
                    }
                    arity => {
                        let max = arity.max().unwrap_or_default();
                        let result = translator.find_command(&command_line(cmd.name(), max + 1));
                        assert!(
                            matches!(result, Err(Error::InvalidArity { .. })),
                            "{} {} accepted {} args",
                            ty,
                            cmd.name(),
                            max + 1
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_unknown_command_everywhere() {
        let argv = command_line("UNKNOWNCMD", 3);
        for ty in ConnectionType::iter() {
            let err = create_translator(ty).find_command(&argv).unwrap_err();
            assert!(matches!(err, Error::UnknownSequence(_)));
            assert!(err.to_string().contains("UNKNOWNCMD"));
        }
    }

    #[test]
    fn test_translator_matches_type() {
        for ty in ConnectionType::iter() {
            let translator = create_translator(ty);
            assert_eq!(translator.connection_type(), ty);
            assert_eq!(translator.db_name(), ty.db_name());
            assert_eq!(translator.commands().len(), command_table(ty).len());
        }
    }

    #[test]
    fn test_capability_errors_are_unconditional() {
        use crate::types::{NKey, Ttl};

        for ty in ConnectionType::iter() {
            let translator = create_translator(ty);
            let caps = ty.capabilities();
            for key in ["a", "binary\u{1}", "with space"] {
                let key = NKey::new(key);
                for ttl in [Ttl::Persistent, Ttl::Seconds(10)] {
                    assert_eq!(translator.change_key_ttl_command(&key, ttl).is_ok(), caps.ttl);
                }
                assert_eq!(translator.load_key_ttl_command(&key).is_ok(), caps.ttl);
            }
        }
    }
}
