// crates/labelcache-cli/src/main.rs
// ============================================================================
// Module: Label Cache CLI Entry Point
// Description: Command dispatcher for the address-label cache.
// Purpose: Inspect the local cache, look up addresses, and run refreshes.
// Dependencies: clap, labelcache, labelcache-config, labelcache-core,
//               labelcache-store-sqlite, serde_json, thiserror, time
// ============================================================================

//! ## Overview
//! `labelcache` opens the configured `SQLite` cache and either reports its
//! state, looks up one address, or refreshes every configured chain from the
//! remote query service. Read commands never need an API key and never
//! create a missing store; `refresh` creates the store on first use and
//! resolves the key from the config or the environment.
//!
//! Progress from `refresh` goes to stderr as `[level] message` lines, or as
//! JSON lines with `--log-format json`.

// ============================================================================
// SECTION: Modules
// ============================================================================

#[cfg(test)]
mod main_tests;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use labelcache::LabelCache;
use labelcache::LogSink;
use labelcache::ProgressSink;
use labelcache::StderrSink;
use labelcache_config::LabelCacheConfig;
use labelcache_core::Address;
use labelcache_core::ChainId;
use labelcache_core::RecordStore;
use labelcache_core::Timestamp;
use labelcache_store_sqlite::SqliteRecordStore;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "labelcache", version, disable_help_subcommand = true)]
struct Cli {
    /// Path to `labelcache.toml` (overrides `LABELCACHE_CONFIG`).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Progress output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Progress output formats.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    /// `[level] message` lines.
    Text,
    /// One JSON object per line.
    Json,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Print journal mode, refreshed chains, record counts, and maintenance times.
    Status,
    /// Look up one address on one chain.
    Lookup(LookupCommand),
    /// Refresh every configured chain from the remote query service.
    Refresh,
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Arguments for `lookup`.
#[derive(Args, Debug)]
struct LookupCommand {
    /// Chain identifier.
    #[arg(long, value_name = "CHAIN_ID")]
    chain: u64,
    /// Address, with or without `0x`, any case.
    #[arg(value_name = "ADDRESS")]
    address: String,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate the configuration file and exit.
    Validate,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper carrying the user-facing message.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run(cli: Cli) -> CliResult<ExitCode> {
    let config = LabelCacheConfig::load(cli.config.as_deref())
        .map_err(|err| CliError::new(format!("Failed to load config: {err}")))?;
    match cli.command {
        Commands::Status => command_status(&config),
        Commands::Lookup(command) => command_lookup(&config, &command),
        Commands::Refresh => command_refresh(&config, cli.log_format),
        Commands::Config {
            command: ConfigCommand::Validate,
        } => command_config_validate(&config),
    }
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Opens the existing store named by `config` for the read commands.
fn open_store(config: &LabelCacheConfig) -> CliResult<SqliteRecordStore> {
    SqliteRecordStore::open_existing(&config.store_config())
        .map_err(|err| CliError::new(format!("Failed to open: {err}")))
}

/// Prints the cache status.
fn command_status(config: &LabelCacheConfig) -> CliResult<ExitCode> {
    let store = open_store(config)?;
    for line in status_lines(&store)? {
        write_stdout_line(&line).map_err(|err| CliError::new(output_error("stdout", &err)))?;
    }
    Ok(ExitCode::SUCCESS)
}

/// Renders the status report for `store`.
fn status_lines(store: &SqliteRecordStore) -> CliResult<Vec<String>> {
    let journal_mode = store
        .journal_mode()
        .map_err(|err| CliError::new(format!("Failed to get journal mode: {err}")))?;
    let chains =
        store.chains().map_err(|err| CliError::new(format!("Failed to get chains: {err}")))?;
    let mut lines = vec![
        format!("Database connection established, journal mode: {journal_mode}"),
        format!("Chains: {}", chains.len()),
    ];
    for chain in chains {
        let maintained = store.get_maintenance_time(chain).map_err(|err| {
            CliError::new(format!("Failed to get maintenance time: {err}, chain id: {chain}"))
        })?;
        let records = store.count_records(chain).map_err(|err| {
            CliError::new(format!("Failed to get address records: {err}, chain id: {chain}"))
        })?;
        lines.push(String::new());
        lines.push(format!("[{chain}]"));
        lines.push(format!("AddressRecords: {records}"));
        lines.push(format!("Maintenance   : {}", format_maintenance(maintained)));
    }
    Ok(lines)
}

/// Prints one record as JSON, failing when it is absent.
fn command_lookup(config: &LabelCacheConfig, command: &LookupCommand) -> CliResult<ExitCode> {
    let store = open_store(config)?;
    let chain = ChainId::new(command.chain);
    let address = Address::parse(&command.address)
        .map_err(|err| CliError::new(format!("Invalid address {:?}: {err}", command.address)))?;
    let record = store
        .get_record(chain, &address)
        .map_err(|err| CliError::new(format!("Failed to get address record: {err}")))?;
    let Some(record) = record else {
        write_stderr_line(&format!("No record for {address} on chain id: {chain}"))
            .map_err(|err| CliError::new(output_error("stderr", &err)))?;
        return Ok(ExitCode::FAILURE);
    };
    let rendered = serde_json::to_string_pretty(&record)
        .map_err(|err| CliError::new(format!("Failed to render record: {err}")))?;
    write_stdout_line(&rendered).map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Runs a synchronous refresh with stderr progress.
fn command_refresh(config: &LabelCacheConfig, format: LogFormat) -> CliResult<ExitCode> {
    let cache =
        LabelCache::from_config(config).map_err(|err| CliError::new(format!("Failed to open: {err}")))?;
    let journal_mode = cache
        .journal_mode()
        .map_err(|err| CliError::new(format!("Failed to get journal mode: {err}")))?;
    write_stderr_line(&format!("Database connection established, journal mode: {journal_mode}"))
        .map_err(|err| CliError::new(output_error("stderr", &err)))?;

    let sink = progress_sink(format);
    let outcome = cache.refresh_sync(sink.as_ref());
    match outcome {
        Ok(report) => {
            write_stderr_line(&format!("Refresh done, chains: {}", report.chains.len()))
                .map_err(|err| CliError::new(output_error("stderr", &err)))?;
            Ok(ExitCode::SUCCESS)
        }
        Err(_) => Ok(ExitCode::FAILURE),
    }
}

/// Validates configuration; loading already did the work.
fn command_config_validate(config: &LabelCacheConfig) -> CliResult<ExitCode> {
    write_stdout_line(&format!("Config is valid, chains: {}", config.chains.len()))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds the progress sink for `format`.
fn progress_sink(format: LogFormat) -> Box<dyn ProgressSink> {
    match format {
        LogFormat::Text => Box::new(StderrSink),
        LogFormat::Json => Box::new(LogSink::new(std::io::stderr())),
    }
}

/// Renders a maintenance marker as RFC 3339, or `never` when absent.
fn format_maintenance(maintained: Option<Timestamp>) -> String {
    let Some(at) = maintained else {
        return "never".to_string();
    };
    OffsetDateTime::from_unix_timestamp(at.as_unix_seconds())
        .ok()
        .and_then(|moment| moment.format(&Rfc3339).ok())
        .unwrap_or_else(|| format!("{} (unix seconds)", at.as_unix_seconds()))
}

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("Failed to write to {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
