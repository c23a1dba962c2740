//! Connection Driver
//!
//! A native connection is not thread safe, so each one is moved into its
//! own worker task. Callers talk to the worker through a [`Driver`] handle:
//!
//! ```text
//!  Driver::execute("SET a 1\nGET a")
//!        │ mpsc
//!        ▼
//! ┌──────────────────────────────────────┐
//! │ worker task                          │
//! │                                      │
//! │  ┌────────────┐    ┌──────────────┐  │
//! │  │ recv batch │───>│CommandHandler│  │
//! │  └────────────┘    └──────┬───────┘  │
//! │                           │          │
//! │  ┌────────────┐           ▼          │
//! │  │ info tick  │     NativeConnection │
//! │  └─────┬──────┘                      │
//! │        ▼                             │
//! │   <hash><ext> log file               │
//! └──────────────────────────────────────┘
//!        │ oneshot
//!        ▼
//!   Result<FastoObject>
//! ```
//!
//! Batches are executed strictly in the order they were submitted. When the
//! settings enable logging and a logging directory is given, the worker
//! appends the backend's `INFO` output to a per-connection file on every
//! interval tick.

use crate::commands::api::format_info;
use crate::commands::CommandHandler;
use crate::config::ConnectionSettings;
use crate::connection::NativeConnection;
use crate::error::Error;
use crate::types::{FastoObject, Value};
use bytes::Bytes;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Pending batches a driver queues before `execute` waits.
const REQUEST_QUEUE_SIZE: usize = 64;

/// Ticker period when info logging is off; the branch is disabled anyway.
const IDLE_TICK: Duration = Duration::from_secs(3600);

/// Errors returned by a [`Driver`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DriverError {
    #[error(transparent)]
    Command(#[from] Error),

    #[error("Connection worker has stopped.")]
    Closed,
}

pub type DriverResult<T> = Result<T, DriverError>;

/// Counters shared between a worker and its handles.
#[derive(Debug, Default)]
pub struct DriverStats {
    /// Batches received
    pub batches: AtomicU64,
    /// Command lines executed successfully
    pub commands_processed: AtomicU64,
    /// Batches that stopped on an error
    pub commands_failed: AtomicU64,
    /// Bytes of command text received
    pub bytes_received: AtomicU64,
    /// Info entries written to the log file
    pub info_logged: AtomicU64,
}

impl DriverStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn batch_received(&self, len: usize) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(len as u64, Ordering::Relaxed);
    }

    fn commands_processed(&self, count: usize) {
        self.commands_processed
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    fn command_failed(&self) {
        self.commands_failed.fetch_add(1, Ordering::Relaxed);
    }

    fn info_logged(&self) {
        self.info_logged.fetch_add(1, Ordering::Relaxed);
    }
}

struct Request {
    buffer: Bytes,
    reply: oneshot::Sender<Result<FastoObject, Error>>,
}

/// Handle to a connection worker.
///
/// Dropping every handle stops the worker once queued batches are done.
#[derive(Debug, Clone)]
pub struct Driver {
    tx: mpsc::Sender<Request>,
    stats: Arc<DriverStats>,
    settings: Arc<ConnectionSettings>,
}

impl Driver {
    /// Moves `conn` into a new worker task on the current runtime.
    ///
    /// `logging_dir` is where the info log is written when the settings
    /// enable it.
    pub fn start(
        settings: ConnectionSettings,
        conn: Box<dyn NativeConnection>,
        logging_dir: Option<PathBuf>,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(REQUEST_QUEUE_SIZE);
        let stats = Arc::new(DriverStats::new());
        let settings = Arc::new(settings);

        let worker = Worker {
            handler: CommandHandler::new(settings.connection_type)
                .with_delimiter(settings.delimiter.clone()),
            conn,
            stats: Arc::clone(&stats),
            log_file: logging_dir.map(|dir| settings.logging_path(dir)),
            settings: Arc::clone(&settings),
        };

        info!(
            backend = %settings.connection_type,
            path = %settings.path,
            "Connection worker started"
        );
        let handle = tokio::spawn(worker.run(rx));

        (Self { tx, stats, settings }, handle)
    }

    /// Executes a (possibly multi-line) batch and waits for the result.
    pub async fn execute(&self, buffer: impl Into<Bytes>) -> DriverResult<FastoObject> {
        let (reply, rx) = oneshot::channel();
        let request = Request {
            buffer: buffer.into(),
            reply,
        };
        self.tx.send(request).await.map_err(|_| DriverError::Closed)?;
        Ok(rx.await.map_err(|_| DriverError::Closed)??)
    }

    pub fn stats(&self) -> &Arc<DriverStats> {
        &self.stats
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

struct Worker {
    handler: CommandHandler,
    conn: Box<dyn NativeConnection>,
    stats: Arc<DriverStats>,
    settings: Arc<ConnectionSettings>,
    log_file: Option<PathBuf>,
}

impl Worker {
    async fn run(mut self, mut rx: mpsc::Receiver<Request>) {
        let period = self.settings.logging_interval();
        let logging = period.is_some() && self.log_file.is_some();
        let mut ticker = tokio::time::interval(period.unwrap_or(IDLE_TICK));

        loop {
            tokio::select! {
                request = rx.recv() => {
                    let Some(request) = request else { break };
                    let result = self.execute(&request.buffer);
                    // The caller may have given up waiting.
                    let _ = request.reply.send(result);
                    if !self.conn.is_connected() {
                        break;
                    }
                }
                _ = ticker.tick(), if logging => {
                    self.log_info().await;
                }
            }
        }

        if self.conn.is_connected() {
            self.conn.quit();
        }
        info!(path = %self.settings.path, "Connection worker stopped");
    }

    fn execute(&mut self, buffer: &[u8]) -> Result<FastoObject, Error> {
        self.stats.batch_received(buffer.len());
        debug!(command = %String::from_utf8_lossy(buffer), "Executing batch");

        match self.handler.execute_batch(self.conn.as_mut(), buffer) {
            Ok(mut out) => {
                self.stats.commands_processed(out.children().len());
                for (channel, message) in self.conn.poll_messages() {
                    out.add_child(Value::Array(vec![
                        Value::string("message"),
                        Value::String(channel),
                        Value::String(message),
                    ]));
                }
                Ok(out)
            }
            Err(e) => {
                self.stats.command_failed();
                warn!(error = %e, "Batch failed");
                Err(e)
            }
        }
    }

    async fn log_info(&mut self) {
        let Some(path) = &self.log_file else {
            return;
        };
        let sections = match self.conn.info(None) {
            Ok(sections) => sections,
            Err(e) => {
                warn!(error = %e, "Failed to load server info");
                return;
            }
        };

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let entry = format!("{}\n{}\n", timestamp, format_info(&sections));

        let written = async {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await?;
            file.write_all(entry.as_bytes()).await?;
            file.flush().await
        }
        .await;

        match written {
            Ok(()) => self.stats.info_logged(),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to write info log"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::MemoryConnection;
    use crate::db::ConnectionType;
    use crate::storage::StorageEngine;
    use tokio_test::assert_ok;

    fn start(ty: ConnectionType, settings: ConnectionSettings, dir: Option<PathBuf>) -> Driver {
        let engine = Arc::new(StorageEngine::with_databases(ty.default_databases()));
        let conn = MemoryConnection::new(engine, ty).unwrap();
        Driver::start(settings, Box::new(conn), dir).0
    }

    #[tokio::test]
    async fn test_execute_in_order() {
        let driver = start(
            ConnectionType::Redis,
            ConnectionSettings::new(ConnectionType::Redis, "/test"),
            None,
        );

        let out = assert_ok!(driver.execute("SET a 1\nINCR a\nINCR a").await);
        assert_eq!(out.last_value(), Some(&Value::Integer(3)));

        let out = assert_ok!(driver.execute("GET a").await);
        assert_eq!(out.last_value(), Some(&Value::string("3")));

        assert_eq!(driver.stats().batches.load(Ordering::Relaxed), 2);
        assert_eq!(driver.stats().commands_processed.load(Ordering::Relaxed), 4);
    }

    #[tokio::test]
    async fn test_errors_are_returned() {
        let driver = start(
            ConnectionType::Memcached,
            ConnectionSettings::new(ConnectionType::Memcached, "/test"),
            None,
        );

        let err = driver.execute("LPUSH a b").await.unwrap_err();
        assert!(matches!(err, DriverError::Command(Error::UnknownSequence(_))));
        assert_eq!(driver.stats().commands_failed.load(Ordering::Relaxed), 1);

        // The worker keeps serving after a failed batch.
        assert_ok!(driver.execute("SET a 0 0 1").await);
    }

    #[tokio::test]
    async fn test_quit_stops_worker() {
        let engine = Arc::new(StorageEngine::new());
        let conn = MemoryConnection::new(engine, ConnectionType::LevelDb).unwrap();
        let (driver, handle) = Driver::start(
            ConnectionSettings::new(ConnectionType::LevelDb, "/test"),
            Box::new(conn),
            None,
        );

        let out = assert_ok!(driver.execute("QUIT").await);
        assert_eq!(out.last_value(), Some(&Value::ok()));
        assert_ok!(handle.await);

        assert_eq!(driver.execute("GET a").await, Err(DriverError::Closed));
    }

    #[tokio::test]
    async fn test_subscribed_messages_are_delivered() {
        let ty = ConnectionType::Redis;
        let engine = Arc::new(StorageEngine::with_databases(ty.default_databases()));
        let settings = ConnectionSettings::new(ty, "/test");
        let listener = Driver::start(
            settings.clone(),
            Box::new(MemoryConnection::new(Arc::clone(&engine), ty).unwrap()),
            None,
        )
        .0;
        let publisher = Driver::start(
            settings,
            Box::new(MemoryConnection::new(engine, ty).unwrap()),
            None,
        )
        .0;

        assert_ok!(listener.execute("SUBSCRIBE news").await);
        let out = assert_ok!(publisher.execute("PUBLISH news hello").await);
        assert_eq!(out.last_value(), Some(&Value::Integer(1)));

        let out = assert_ok!(listener.execute("PING").await);
        assert_eq!(
            out.last_value(),
            Some(&Value::Array(vec![
                Value::string("message"),
                Value::string("news"),
                Value::string("hello"),
            ]))
        );
    }

    #[tokio::test]
    async fn test_info_logging() {
        let dir = std::env::temp_dir().join(format!("fastonosql-driver-{}", std::process::id()));
        assert_ok!(tokio::fs::create_dir_all(&dir).await);

        let settings =
            ConnectionSettings::new(ConnectionType::Ssdb, "/logged").with_logging_interval(10);
        let log_path = settings.logging_path(&dir);
        let _ = tokio::fs::remove_file(&log_path).await;

        let driver = start(ConnectionType::Ssdb, settings, Some(dir.clone()));
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(driver.stats().info_logged.load(Ordering::Relaxed) >= 1);
        let text = assert_ok!(tokio::fs::read_to_string(&log_path).await);
        assert!(text.contains("# Server"));

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
