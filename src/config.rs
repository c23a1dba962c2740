//! Connection Settings
//!
//! What a driver needs to know about one connection: the backend, a
//! connection path naming it, the delimiter used when printing results and
//! how often server info is logged.
//!
//! Settings round trip through a single line of text:
//!
//! ```text
//! <type>,<path>,<logging interval ms>
//! redis,/local/cache,1000
//! ```

use crate::db::ConnectionType;
use crate::error::Error;
use crc::{Crc, CRC_64_REDIS};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

const PATH_HASH: Crc<u64> = Crc::<u64>::new(&CRC_64_REDIS);

/// Default delimiter between printed results.
pub const DEFAULT_DELIMITER: &str = "\n";

/// Settings of one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub connection_type: ConnectionType,
    /// Slash separated name of the connection, e.g. `/local/cache`
    pub path: String,
    pub delimiter: String,
    /// Milliseconds between info log entries; 0 disables logging
    pub logging_interval: u64,
}

impl ConnectionSettings {
    pub fn new(connection_type: ConnectionType, path: impl Into<String>) -> Self {
        Self {
            connection_type,
            path: path.into(),
            delimiter: DEFAULT_DELIMITER.to_string(),
            logging_interval: 0,
        }
    }

    pub fn with_logging_interval(mut self, ms: u64) -> Self {
        self.logging_interval = ms;
        self
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    pub fn is_logging_enabled(&self) -> bool {
        self.logging_interval != 0
    }

    pub fn logging_interval(&self) -> Option<Duration> {
        self.is_logging_enabled()
            .then(|| Duration::from_millis(self.logging_interval))
    }

    /// Stable identifier of the connection path, in decimal.
    pub fn hash(&self) -> String {
        PATH_HASH.checksum(self.path.as_bytes()).to_string()
    }

    /// File the driver appends server info to.
    pub fn logging_path(&self, dir: impl AsRef<Path>) -> PathBuf {
        dir.as_ref().join(format!(
            "{}{}",
            self.hash(),
            self.connection_type.logging_extension()
        ))
    }
}

impl fmt::Display for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.connection_type, self.path, self.logging_interval)
    }
}

impl FromStr for ConnectionSettings {
    type Err = Error;

    /// Parses `type,path,interval`. The path may itself contain commas.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidSettings(s.to_string());

        let (ty, rest) = s.split_once(',').ok_or_else(invalid)?;
        let (path, interval) = rest.rsplit_once(',').ok_or_else(invalid)?;

        let connection_type = ConnectionType::from_str(ty.trim())
            .map_err(|_| Error::UnknownConnectionType(ty.trim().to_string()))?;
        let logging_interval = interval.trim().parse().map_err(|_| invalid())?;
        if path.is_empty() {
            return Err(invalid());
        }

        Ok(Self::new(connection_type, path).with_logging_interval(logging_interval))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_text_round_trip() {
        let settings = ConnectionSettings::new(ConnectionType::Redis, "/local/cache")
            .with_logging_interval(1000);
        let text = settings.to_string();
        assert_eq!(text, "redis,/local/cache,1000");

        let parsed: ConnectionSettings = assert_ok!(text.parse());
        assert_eq!(parsed, settings);
    }

    #[test]
    fn test_path_with_commas() {
        let parsed: ConnectionSettings = assert_ok!("lmdb,/a,b,0".parse());
        assert_eq!(parsed.path, "/a,b");
        assert!(!parsed.is_logging_enabled());
        assert_eq!(parsed.logging_interval(), None);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            "mongo,/x,0".parse::<ConnectionSettings>(),
            Err(Error::UnknownConnectionType("mongo".into()))
        );
        assert_err!("redis".parse::<ConnectionSettings>());
        assert_err!("redis,/x,soon".parse::<ConnectionSettings>());
        assert_err!("redis,,5".parse::<ConnectionSettings>());
    }

    #[test]
    fn test_hash_is_stable_crc64() {
        let a = ConnectionSettings::new(ConnectionType::Redis, "/local/cache");
        let b = ConnectionSettings::new(ConnectionType::Memcached, "/local/cache");
        assert_eq!(a.hash(), b.hash());
        assert_eq!(a.hash(), PATH_HASH.checksum(b"/local/cache").to_string());
        assert_ne!(a.hash(), ConnectionSettings::new(ConnectionType::Redis, "/other").hash());

        // CRC-64/REDIS check value
        assert_eq!(PATH_HASH.checksum(b"123456789"), 0xe9c6_d914_c4b8_d9ca);
    }

    #[test]
    fn test_logging_path() {
        let settings = ConnectionSettings::new(ConnectionType::Memcached, "/m");
        let path = settings.logging_path("/tmp/logs");
        assert_eq!(path, PathBuf::from(format!("/tmp/logs/{}.mem", settings.hash())));
    }
}
