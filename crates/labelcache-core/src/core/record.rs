// crates/labelcache-core/src/core/record.rs
// ============================================================================
// Module: Label Cache Records
// Description: Cached address records, raw remote rows, and reconciliation.
// Purpose: Turn remote result rows into canonical, deduplicated store records.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! [`LabelRow`] mirrors one row of the remote label table with every column
//! optional. [`reconcile_rows`] converts a chain's accumulated rows into
//! [`AddressRecord`] values keyed by canonical address.
//!
//! Label precedence: a non-empty `label` wins, then a non-empty
//! `project_name`, otherwise the label is empty.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::Address;
use crate::core::identifiers::AddressError;
use crate::core::identifiers::ChainId;

// ============================================================================
// SECTION: Records
// ============================================================================

/// Cached label metadata for one address on one chain.
///
/// # Invariants
/// - `(chain, address)` is the unique key.
/// - Non-key fields are overwritten together on upsert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRecord {
    /// Chain the address belongs to.
    pub chain: ChainId,
    /// Canonical account address.
    pub address: Address,
    /// Display name of the address.
    pub name: String,
    /// Derived label.
    pub label: String,
    /// Label category.
    pub label_type: String,
    /// Label sub-category.
    pub label_subtype: String,
}

/// Raw result row returned by the remote label query.
///
/// Missing and `null` columns deserialize as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelRow {
    /// Address text as returned by the remote service.
    pub address: Option<String>,
    /// Display name column.
    pub address_name: Option<String>,
    /// Label category column.
    pub label_type: Option<String>,
    /// Label sub-category column.
    pub label_subtype: Option<String>,
    /// Primary label column.
    pub label: Option<String>,
    /// Project name column, used as the label fallback.
    pub project_name: Option<String>,
}

/// Row rejected during reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    /// Address text as received (empty when absent).
    pub address: String,
    /// Reason the address was rejected.
    pub reason: AddressError,
}

/// Result of reconciling one chain's rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Records ready for upsert, one per canonical address.
    pub records: Vec<AddressRecord>,
    /// Rows dropped because their address was invalid.
    pub skipped: Vec<SkippedRow>,
}

// ============================================================================
// SECTION: Reconciliation
// ============================================================================

/// Picks the label for a record from the `label` and `project_name` columns.
#[must_use]
pub fn derive_label(label: Option<&str>, project_name: Option<&str>) -> String {
    match (label, project_name) {
        (Some(label), _) if !label.is_empty() => label.to_string(),
        (_, Some(project)) if !project.is_empty() => project.to_string(),
        _ => String::new(),
    }
}

impl LabelRow {
    /// Converts the row into a record for `chain`.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError`] when the address column is missing or invalid.
    pub fn into_record(self, chain: ChainId) -> Result<AddressRecord, AddressError> {
        let address = Address::parse(self.address.as_deref().unwrap_or_default())?;
        let label = derive_label(self.label.as_deref(), self.project_name.as_deref());
        Ok(AddressRecord {
            chain,
            address,
            name: self.address_name.unwrap_or_default(),
            label,
            label_type: self.label_type.unwrap_or_default(),
            label_subtype: self.label_subtype.unwrap_or_default(),
        })
    }
}

/// Reconciles accumulated rows into a deduplicated record batch.
///
/// Later rows overwrite earlier rows with the same canonical address.
#[must_use]
pub fn reconcile_rows(chain: ChainId, rows: Vec<LabelRow>) -> Reconciliation {
    let mut by_address: BTreeMap<Address, AddressRecord> = BTreeMap::new();
    let mut skipped = Vec::new();
    for row in rows {
        let raw = row.address.clone().unwrap_or_default();
        match row.into_record(chain) {
            Ok(record) => {
                by_address.insert(record.address, record);
            }
            Err(reason) => skipped.push(SkippedRow {
                address: raw,
                reason,
            }),
        }
    }
    Reconciliation {
        records: by_address.into_values().collect(),
        skipped,
    }
}
