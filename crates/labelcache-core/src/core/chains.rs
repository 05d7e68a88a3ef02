// crates/labelcache-core/src/core/chains.rs
// ============================================================================
// Module: Label Cache Chain Catalog
// Description: Configured chains and the label query run for each.
// Purpose: Provide the fixed, ordered list of chains a refresh processes.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Each [`ChainQuery`] binds a chain id to the SQL text submitted to the remote
//! query engine. The default catalog covers ethereum, bsc, and base over the
//! `<schema>.core.dim_labels` table with contract-like subtypes filtered out.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::ChainId;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Label subtypes excluded from every chain query.
pub const EXCLUDED_LABEL_SUBTYPES: &[&str] =
    &["general_contract", "deposit_wallet", "pool", "token_contract", "nf_token_contract"];

/// Ethereum mainnet chain id.
pub const ETHEREUM_CHAIN_ID: ChainId = ChainId::new(1);
/// BNB Smart Chain chain id.
pub const BSC_CHAIN_ID: ChainId = ChainId::new(56);
/// Base chain id.
pub const BASE_CHAIN_ID: ChainId = ChainId::new(8453);

// ============================================================================
// SECTION: Types
// ============================================================================

/// Chain plus the query used to refresh it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainQuery {
    /// Chain identifier.
    pub chain: ChainId,
    /// Human-readable chain name.
    pub name: String,
    /// SQL text submitted to the remote engine.
    pub sql: String,
}

impl ChainQuery {
    /// Creates a chain query.
    #[must_use]
    pub fn new(chain: ChainId, name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            chain,
            name: name.into(),
            sql: sql.into(),
        }
    }
}

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// Builds the label query for a `dim_labels` schema.
///
/// `excluded_names` adds an `ADDRESS_NAME NOT IN (...)` clause when non-empty.
#[must_use]
pub fn dim_labels_sql(schema: &str, excluded_names: &[&str]) -> String {
    let mut sql = format!(
        "SELECT * FROM {schema}.core.dim_labels WHERE LABEL_SUBTYPE NOT IN ({})",
        quoted_list(EXCLUDED_LABEL_SUBTYPES)
    );
    if !excluded_names.is_empty() {
        sql.push_str(" AND ADDRESS_NAME NOT IN (");
        sql.push_str(&quoted_list(excluded_names));
        sql.push(')');
    }
    sql.push(';');
    sql
}

/// Returns the default chain catalog in ascending chain order.
#[must_use]
pub fn default_chain_queries() -> Vec<ChainQuery> {
    vec![
        ChainQuery::new(ETHEREUM_CHAIN_ID, "ethereum", dim_labels_sql("ethereum", &["coinbase"])),
        ChainQuery::new(BSC_CHAIN_ID, "bsc", dim_labels_sql("bsc", &[])),
        ChainQuery::new(BASE_CHAIN_ID, "base", dim_labels_sql("base", &[])),
    ]
}

/// Renders `'a', 'b'` from a list of literals.
fn quoted_list(values: &[&str]) -> String {
    values.iter().map(|value| format!("'{value}'")).collect::<Vec<_>>().join(", ")
}
