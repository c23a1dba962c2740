//! FastoNoSQL shell
//!
//! Opens one in-memory connection of the chosen backend type and runs
//! command lines from `-c` or stdin through its driver.

use fastonosql::commands::CommandTranslator;
use fastonosql::config::ConnectionSettings;
use fastonosql::connection::{Driver, DriverError, MemoryConnection};
use fastonosql::db::{create_translator, ConnectionType};
use fastonosql::storage::{start_expiry_sweeper, StorageEngine};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Shell configuration
struct Config {
    /// Backend the connection stands in for
    connection_type: ConnectionType,
    /// Connection path, used for the log file name
    path: String,
    /// Directory for the info log; logging is off without it
    logging_dir: Option<PathBuf>,
    /// Info logging interval in milliseconds
    interval: u64,
    /// Delimiter printed between results
    delimiter: String,
    /// Command text to run instead of reading stdin
    command: Option<String>,
    /// Print the command table and exit
    list_commands: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connection_type: ConnectionType::Redis,
            path: "/local".to_string(),
            logging_dir: None,
            interval: 0,
            delimiter: "\n".to_string(),
            command: None,
            list_commands: false,
        }
    }
}

impl Config {
    /// Parse configuration from command-line arguments
    fn from_args() -> Self {
        let mut config = Config::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            let value = || {
                args.get(i + 1).cloned().unwrap_or_else(|| {
                    eprintln!("Error: {} requires a value", args[i]);
                    std::process::exit(1);
                })
            };

            match args[i].as_str() {
                "--type" | "-t" => {
                    let ty = value();
                    config.connection_type = ConnectionType::from_str(&ty).unwrap_or_else(|_| {
                        eprintln!("Error: unknown connection type '{}'", ty);
                        std::process::exit(1);
                    });
                    i += 2;
                }
                "--path" | "-p" => {
                    config.path = value();
                    i += 2;
                }
                "--logging-dir" => {
                    config.logging_dir = Some(PathBuf::from(value()));
                    i += 2;
                }
                "--interval" => {
                    config.interval = value().parse().unwrap_or_else(|_| {
                        eprintln!("Error: invalid interval");
                        std::process::exit(1);
                    });
                    i += 2;
                }
                "--delimiter" | "-d" => {
                    config.delimiter = value();
                    i += 2;
                }
                "-c" => {
                    config.command = Some(value());
                    i += 2;
                }
                "--list-commands" => {
                    config.list_commands = true;
                    i += 1;
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("fastonosql version {}", fastonosql::VERSION);
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        config
    }

    fn settings(&self) -> ConnectionSettings {
        ConnectionSettings::new(self.connection_type, self.path.clone())
            .with_delimiter(self.delimiter.clone())
            .with_logging_interval(self.interval)
    }
}

fn print_help() {
    println!(
        r#"
FastoNoSQL shell

USAGE:
    fastonosql [OPTIONS]

OPTIONS:
    -t, --type <TYPE>          Backend: redis, memcached, ssdb, leveldb, rocksdb,
                               lmdb, unqlite, upscaledb, forestdb (default: redis)
    -p, --path <PATH>          Connection path (default: /local)
        --logging-dir <DIR>    Write periodic server info to DIR
        --interval <MS>        Info logging interval in ms, 0 disables (default: 0)
    -d, --delimiter <TEXT>     Printed between results (default: newline)
    -c <COMMANDS>              Run the given command lines and exit
        --list-commands        Print the backend's command table and exit
    -v, --version              Print version information
    -h, --help                 Print this help message

EXAMPLES:
    fastonosql -t memcached -c 'SET a 0 0 1'
    echo 'LPUSH l a b' | fastonosql
    fastonosql -t lmdb --logging-dir /tmp --interval 1000
"#
    );
}

fn print_commands(ty: ConnectionType) {
    let translator = create_translator(ty);
    for info in translator.commands() {
        println!("{:<12} {:<40} {}", info.name, info.params, info.summary);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_args();

    if config.list_commands {
        print_commands(config.connection_type);
        return Ok(());
    }

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let ty = config.connection_type;
    let engine = Arc::new(StorageEngine::with_databases(ty.default_databases()));
    let _sweeper = start_expiry_sweeper(Arc::clone(&engine));

    let conn = MemoryConnection::new(engine, ty)?;
    let (driver, worker) = Driver::start(config.settings(), Box::new(conn), config.logging_dir.clone());
    info!(backend = %ty, path = %config.path, "Connected");

    if let Some(command) = &config.command {
        run(&driver, command.clone()).await;
    } else {
        tokio::select! {
            result = read_stdin(&driver) => result?,
            _ = signal::ctrl_c() => info!("Interrupted"),
        }
    }

    drop(driver);
    worker.await?;
    Ok(())
}

/// Runs stdin lines one by one until EOF or the connection closes.
async fn read_stdin(driver: &Driver) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        if !run(driver, line).await {
            break;
        }
    }
    Ok(())
}

/// Prints the result of one batch. Returns false once the worker is gone.
async fn run(driver: &Driver, text: String) -> bool {
    match driver.execute(text).await {
        Ok(out) => {
            let rendered = out.to_string();
            if !rendered.is_empty() {
                println!("{}", rendered);
            }
            !driver.is_closed()
        }
        Err(DriverError::Closed) => {
            warn!("Connection closed");
            false
        }
        Err(e) => {
            eprintln!("(error) {}", e);
            true
        }
    }
}
