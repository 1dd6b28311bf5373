//! rowsync CLI - connect one database client and expose its schema and rows.

use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use rowsync::{
    ClientImpl, ConnectionConfig, DatabaseClient, Engine, PortOrSocket, Row, SyncError,
};
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "rowsync")]
#[command(about = "Engine-neutral MySQL and PostgreSQL client for table synchronization")]
#[command(version)]
struct Cli {
    /// Path to YAML connection file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database engine: mysql or postgres (overrides the file)
    #[arg(long)]
    engine: Option<String>,

    /// Database host (overrides the file)
    #[arg(long)]
    host: Option<String>,

    /// TCP port, or the path of a local socket (overrides the file)
    #[arg(long)]
    port: Option<String>,

    /// Database name (overrides the file)
    #[arg(long)]
    database: Option<String>,

    /// Username (overrides the file)
    #[arg(long)]
    user: Option<String>,

    /// Password (overrides the file)
    #[arg(long)]
    password: Option<String>,

    /// SSL mode: disable, require, verify-ca, verify-full (overrides the file)
    #[arg(long)]
    ssl_mode: Option<String>,

    /// Start a read-only transaction
    #[arg(long)]
    readonly: bool,

    /// Read from one consistent snapshot for the whole session
    #[arg(long)]
    snapshot: bool,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the populated schema as JSON
    Schema,

    /// Print a range of rows in primary key order, tab-separated
    Rows {
        /// Table to read
        #[arg(long)]
        table: String,

        /// Start after this key (one value per primary key column)
        #[arg(long)]
        prev_key: Vec<String>,

        /// Read at most this many rows
        #[arg(long, conflicts_with = "last_key", required_unless_present = "last_key")]
        count: Option<usize>,

        /// Read up to and including this key (one value per primary key column)
        #[arg(long)]
        last_key: Vec<String>,
    },

    /// Test the database connection
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), SyncError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let config = load_config(&cli)?;
    let mut client = ClientImpl::connect(&config).await?;

    match &cli.command {
        Commands::Schema => {
            println!("{}", serde_json::to_string_pretty(client.database())?);
        }

        Commands::Rows {
            table,
            prev_key,
            count,
            last_key,
        } => {
            let table = client
                .database()
                .table(table)
                .cloned()
                .ok_or_else(|| SyncError::Schema(format!("Unknown table '{}'", table)))?;
            let prev_key = key_values(prev_key);

            let mut out = BufWriter::new(std::io::stdout());
            let mut rows = 0usize;
            let handler = |row: &dyn Row| -> rowsync::Result<()> {
                write_row(&mut out, row)?;
                rows += 1;
                Ok(())
            };
            match count {
                Some(count) => {
                    client
                        .retrieve_rows(&table, &prev_key, *count, handler)
                        .await?
                }
                None => {
                    client
                        .retrieve_rows_until(&table, &prev_key, &key_values(last_key), handler)
                        .await?
                }
            }
            out.flush()?;
            info!("Retrieved {} rows from {}", rows, table.name);
        }

        Commands::HealthCheck => {
            let database = client.database();
            if cli.output_json {
                let result = serde_json::json!({
                    "engine": client.engine().name(),
                    "target": config.display_target(),
                    "tables": database.len(),
                    "transaction": client.transaction(),
                    "healthy": true,
                });
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!("  Engine: {}", client.engine());
                println!("  Target: {}", config.display_target());
                println!("  Tables: {}", database.len());
                println!("  Transaction: {}", client.transaction());
                println!("\n  Overall: HEALTHY");
            }
        }
    }

    client.commit_transaction().await?;
    client.close().await
}

/// File values first, then command-line overrides.
fn load_config(cli: &Cli) -> Result<ConnectionConfig, SyncError> {
    let mut config = match &cli.config {
        Some(path) => {
            let config = ConnectionConfig::load(path)?;
            info!("Loaded configuration from {:?}", path);
            config
        }
        None => {
            let engine = cli.engine.as_deref().ok_or_else(|| {
                SyncError::Config("--engine is required without --config".to_string())
            })?;
            ConnectionConfig::new(Engine::parse(engine)?, String::new())
        }
    };

    if let Some(engine) = &cli.engine {
        config.engine = Engine::parse(engine)?;
    }
    if let Some(host) = &cli.host {
        config.host = host.clone();
    }
    if let Some(port) = &cli.port {
        config.port = PortOrSocket::parse(port)?;
    }
    if let Some(database) = &cli.database {
        config.database = database.clone();
    }
    if let Some(user) = &cli.user {
        config.user = user.clone();
    }
    if let Some(password) = &cli.password {
        config.password = password.clone();
    }
    if let Some(ssl_mode) = &cli.ssl_mode {
        config.ssl_mode = ssl_mode.clone();
    }
    config.readonly |= cli.readonly;
    config.snapshot |= cli.snapshot;

    config.validate()?;
    Ok(config)
}

fn key_values(values: &[String]) -> Vec<Vec<u8>> {
    values.iter().map(|v| v.as_bytes().to_vec()).collect()
}

/// One line per row: cells separated by tabs, `\N` for NULL, and tab,
/// newline and backslash inside cells backslash-escaped.
fn write_row(out: &mut impl Write, row: &dyn Row) -> std::io::Result<()> {
    for column in 0..row.n_columns() {
        if column > 0 {
            out.write_all(b"\t")?;
        }
        if row.null_at(column) {
            out.write_all(b"\\N")?;
            continue;
        }
        for &b in row.result_at(column) {
            match b {
                b'\t' => out.write_all(b"\\t")?,
                b'\n' => out.write_all(b"\\n")?,
                b'\\' => out.write_all(b"\\\\")?,
                _ => out.write_all(&[b])?,
            }
        }
    }
    out.write_all(b"\n")
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // stdout carries command output
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowsync::OwnedRow;

    #[test]
    fn test_write_row_escapes_and_marks_nulls() {
        let row = OwnedRow::new(vec![
            Some(b"7".to_vec()),
            None,
            Some(b"a\tb\nc\\d".to_vec()),
        ]);
        let mut out = Vec::new();
        write_row(&mut out, &row).unwrap();
        assert_eq!(out, b"7\t\\N\ta\\tb\\nc\\\\d\n".to_vec());
    }

    #[test]
    fn test_overrides_apply_on_top_of_defaults() {
        let cli = Cli::parse_from([
            "rowsync",
            "--engine",
            "pg",
            "--database",
            "shop",
            "--port",
            "/var/run/postgresql",
            "--snapshot",
            "health-check",
        ]);
        let config = load_config(&cli).unwrap();
        assert_eq!(config.engine, Engine::Postgres);
        assert_eq!(config.database, "shop");
        assert_eq!(
            config.port,
            PortOrSocket::Socket("/var/run/postgresql".to_string())
        );
        assert!(config.snapshot);
        assert!(!config.readonly);
    }

    #[test]
    fn test_engine_required_without_config_file() {
        let cli = Cli::parse_from(["rowsync", "--database", "shop", "schema"]);
        assert!(matches!(load_config(&cli), Err(SyncError::Config(_))));
    }
}
