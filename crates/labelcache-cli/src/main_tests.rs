// crates/labelcache-cli/src/main_tests.rs
// ============================================================================
// Module: CLI Main Helpers Tests
// Description: Unit tests for argument parsing and status rendering.
// Purpose: Pin the command surface and the status report layout.
// Dependencies: labelcache-cli main helpers
// ============================================================================

//! ## Overview
//! Validates clap parsing of the command surface, maintenance-time rendering,
//! the status report over a scratch database, and read-only store opening.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use clap::Parser;
use labelcache_config::LabelCacheConfig;
use labelcache_core::Address;
use labelcache_core::AddressRecord;
use labelcache_core::ChainId;
use labelcache_core::RecordStore;
use labelcache_core::Timestamp;
use labelcache_store_sqlite::SqliteRecordStore;
use labelcache_store_sqlite::SqliteStoreConfig;

use super::Cli;
use super::Commands;
use super::ConfigCommand;
use super::LogFormat;
use super::format_maintenance;
use super::open_store;
use super::status_lines;

// ============================================================================
// SECTION: Argument Parsing
// ============================================================================

#[test]
fn parses_lookup_with_global_flags() {
    let cli = Cli::try_parse_from([
        "labelcache",
        "lookup",
        "--chain",
        "56",
        "0xAbC0000000000000000000000000000000000001",
        "--config",
        "custom.toml",
        "--log-format",
        "json",
    ])
    .unwrap();
    assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("custom.toml")));
    assert_eq!(cli.log_format, LogFormat::Json);
    let Commands::Lookup(lookup) = cli.command else {
        panic!("expected lookup command");
    };
    assert_eq!(lookup.chain, 56);
    assert_eq!(lookup.address, "0xAbC0000000000000000000000000000000000001");
}

#[test]
fn parses_config_validate_and_defaults_to_text() {
    let cli = Cli::try_parse_from(["labelcache", "config", "validate"]).unwrap();
    assert_eq!(cli.log_format, LogFormat::Text);
    assert!(matches!(
        cli.command,
        Commands::Config {
            command: ConfigCommand::Validate
        }
    ));
}

#[test]
fn rejects_unknown_log_format() {
    assert!(Cli::try_parse_from(["labelcache", "refresh", "--log-format", "xml"]).is_err());
}

#[test]
fn lookup_requires_chain() {
    assert!(Cli::try_parse_from(["labelcache", "lookup", "0x00"]).is_err());
}

// ============================================================================
// SECTION: Rendering
// ============================================================================

#[test]
fn maintenance_renders_rfc3339_or_never() {
    assert_eq!(format_maintenance(None), "never");
    assert_eq!(format_maintenance(Some(Timestamp::from_unix_seconds(0))), "1970-01-01T00:00:00Z");
    assert_eq!(
        format_maintenance(Some(Timestamp::from_unix_seconds(1_700_000_000))),
        "2023-11-14T22:13:20Z"
    );
}

#[test]
fn status_lists_refreshed_chains_with_counts() {
    let temp = tempfile::tempdir().unwrap();
    let store =
        SqliteRecordStore::new(SqliteStoreConfig::new(temp.path().join("addressInf0.db"))).unwrap();
    let mut bytes = [0_u8; 20];
    bytes[19] = 1;
    store
        .upsert_records(&[AddressRecord {
            chain: ChainId::new(56),
            address: Address::from_bytes(bytes),
            name: "binance 14".to_string(),
            label: "binance".to_string(),
            label_type: "cex".to_string(),
            label_subtype: "hot_wallet".to_string(),
        }])
        .unwrap();
    store.set_maintenance_time(ChainId::new(56), Timestamp::from_unix_seconds(0)).unwrap();

    let lines = status_lines(&store).unwrap();
    assert_eq!(
        lines,
        vec![
            "Database connection established, journal mode: wal".to_string(),
            "Chains: 1".to_string(),
            String::new(),
            "[56]".to_string(),
            "AddressRecords: 1".to_string(),
            "Maintenance   : 1970-01-01T00:00:00Z".to_string(),
        ]
    );
}

#[test]
fn read_commands_do_not_create_a_missing_store() {
    let temp = tempfile::tempdir().unwrap();
    let missing_dir = temp.path().join("typo");
    let mut config = LabelCacheConfig::default();
    config.store.path = missing_dir.join("addressInf0.db");

    let err = open_store(&config).unwrap_err();

    assert!(err.to_string().starts_with("Failed to open: "), "unexpected error: {err}");
    assert!(!missing_dir.exists());
}

#[test]
fn read_commands_open_a_store_created_by_refresh() {
    let temp = tempfile::tempdir().unwrap();
    let mut config = LabelCacheConfig::default();
    config.store.path = temp.path().join("addressInf0.db");
    drop(SqliteRecordStore::new(config.store_config()).unwrap());

    let store = open_store(&config).unwrap();
    assert_eq!(status_lines(&store).unwrap()[1], "Chains: 0");
}
