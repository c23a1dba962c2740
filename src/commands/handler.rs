//! Command Handler
//!
//! Runs raw console text against a native connection.
//!
//! ```text
//! "SET a 1\nGET a"
//!       │ parse_commands
//!       ▼
//! ["SET a 1", "GET a"]
//!       │ per line: split_args → find_command → arity check
//!       ▼
//! CommandHolder::execute(conn, args, node)
//!       │
//!       ▼
//! FastoObject (one child per line, in input order)
//! ```

use crate::commands::translator::CommandTranslator;
use crate::connection::NativeConnection;
use crate::db::{create_translator, ConnectionType};
use crate::error::Result;
use crate::protocol::parse_commands;
use crate::types::FastoObject;
use std::sync::Arc;

/// Executes command lines for one backend.
///
/// Cloning is cheap; the translator is shared.
#[derive(Clone)]
pub struct CommandHandler {
    translator: Arc<dyn CommandTranslator>,
    delimiter: String,
}

impl std::fmt::Debug for CommandHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandHandler")
            .field("backend", &self.translator.db_name())
            .field("delimiter", &self.delimiter)
            .finish()
    }
}

impl CommandHandler {
    pub fn new(connection_type: ConnectionType) -> Self {
        Self::with_translator(create_translator(connection_type))
    }

    pub fn with_translator(translator: Arc<dyn CommandTranslator>) -> Self {
        Self {
            translator,
            delimiter: "\n".to_string(),
        }
    }

    /// Sets the delimiter used when rendering results.
    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    pub fn translator(&self) -> &Arc<dyn CommandTranslator> {
        &self.translator
    }

    /// Executes a single command line, appending its result to `out`.
    pub fn execute_line(
        &self,
        conn: &mut dyn NativeConnection,
        line: &[u8],
        out: &mut FastoObject,
    ) -> Result<()> {
        let resolved = self.translator.test_command_line(line)?;
        resolved.holder.execute(conn, resolved.args(), out)
    }

    /// Executes every line of `buffer` in order.
    ///
    /// Stops at the first failing line; results of earlier lines are lost
    /// with it, as a batch either completes or reports why it did not.
    pub fn execute_batch(
        &self,
        conn: &mut dyn NativeConnection,
        buffer: &[u8],
    ) -> Result<FastoObject> {
        let mut root = FastoObject::with_delimiter(self.delimiter.clone());
        for line in parse_commands(buffer) {
            self.execute_line(conn, &line, &mut root)?;
        }
        Ok(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::MemoryConnection;
    use crate::error::Error;
    use crate::storage::StorageEngine;
    use crate::types::Value;
    use tokio_test::{assert_err, assert_ok};

    fn connection(ty: ConnectionType) -> MemoryConnection {
        let engine = Arc::new(StorageEngine::with_databases(ty.default_databases()));
        MemoryConnection::new(engine, ty).unwrap()
    }

    #[test]
    fn test_batch_runs_in_order() {
        let handler = CommandHandler::new(ConnectionType::Redis);
        let mut conn = connection(ConnectionType::Redis);

        let out = assert_ok!(handler.execute_batch(&mut conn, b"SET a 1\r\nINCR a\n\nGET a\n"));
        let values: Vec<_> = out.children().iter().filter_map(FastoObject::value).collect();
        assert_eq!(
            values,
            vec![&Value::ok(), &Value::Integer(2), &Value::string("2")]
        );
    }

    #[test]
    fn test_batch_stops_at_first_error() {
        let handler = CommandHandler::new(ConnectionType::Redis);
        let mut conn = connection(ConnectionType::Redis);

        let err = assert_err!(handler.execute_batch(&mut conn, b"SET a 1\nBOGUS x\nSET b 2"));
        assert!(matches!(err, Error::UnknownSequence(_)));

        let out = assert_ok!(handler.execute_batch(&mut conn, b"EXISTS a b"));
        assert_eq!(out.last_value(), Some(&Value::Integer(1)));
    }

    #[test]
    fn test_arity_checked_before_handler() {
        let handler = CommandHandler::new(ConnectionType::Memcached);
        let mut conn = connection(ConnectionType::Memcached);
        let mut out = FastoObject::root();

        let err = assert_err!(handler.execute_line(&mut conn, b"SET k 0 0", &mut out));
        assert!(matches!(err, Error::InvalidArity { got: 3, .. }));
        assert!(out.children().is_empty());
    }

    #[test]
    fn test_delimiter() {
        let handler = CommandHandler::new(ConnectionType::LevelDb).with_delimiter(" | ");
        let mut conn = connection(ConnectionType::LevelDb);
        let out = assert_ok!(handler.execute_batch(&mut conn, b"SET a x\nGET a"));
        assert_eq!(out.delimiter(), " | ");
        assert_eq!(out.children().len(), 2);
    }
}
