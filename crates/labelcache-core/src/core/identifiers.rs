// crates/labelcache-core/src/core/identifiers.rs
// ============================================================================
// Module: Label Cache Identifiers
// Description: Chain identifiers, canonical addresses, and remote job handles.
// Purpose: Provide strongly typed keys with stable string forms.
// Dependencies: hex, serde, thiserror
// ============================================================================

//! ## Overview
//! Identifiers used as store keys and remote call context. [`Address`] is the
//! only validated identifier: it accepts upper, lower, or mixed case hex with
//! or without a `0x` prefix and always renders in canonical lowercase form.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Number of bytes in an account address.
pub const ADDRESS_BYTES: usize = 20;

/// Number of hex digits in an account address.
const ADDRESS_HEX_DIGITS: usize = ADDRESS_BYTES * 2;

// ============================================================================
// SECTION: Chain Identifier
// ============================================================================

/// Numeric chain identifier (EIP-155 chain id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(u64);

impl ChainId {
    /// Creates a new chain identifier.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw chain id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for ChainId {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Address
// ============================================================================

/// Errors raised when parsing an account address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// Input does not contain exactly 40 hex digits.
    #[error("address must have 40 hex digits, got {actual}")]
    InvalidLength {
        /// Number of digits found after the optional prefix.
        actual: usize,
    },
    /// Input contains non-hex characters.
    #[error("address contains non-hex characters")]
    InvalidHex,
}

/// Canonical 20-byte account address.
///
/// # Invariants
/// - Always exactly 20 bytes.
/// - Renders as `0x` followed by 40 lowercase hex digits.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; ADDRESS_BYTES]);

impl Address {
    /// Creates an address from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; ADDRESS_BYTES]) -> Self {
        Self(bytes)
    }

    /// Parses an address from hex text with an optional `0x` prefix.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError`] when the input is not 40 hex digits.
    pub fn parse(input: &str) -> Result<Self, AddressError> {
        let trimmed = input.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if digits.len() != ADDRESS_HEX_DIGITS {
            return Err(AddressError::InvalidLength {
                actual: digits.len(),
            });
        }
        let mut bytes = [0_u8; ADDRESS_BYTES];
        hex::decode_to_slice(digits, &mut bytes).map_err(|_| AddressError::InvalidHex)?;
        Ok(Self(bytes))
    }

    /// Returns the raw address bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; ADDRESS_BYTES] {
        &self.0
    }

    /// Returns the canonical `0x`-prefixed lowercase form.
    #[must_use]
    pub fn to_canonical(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_canonical())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Address").field(&self.to_canonical()).finish()
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.to_canonical()
    }
}

// ============================================================================
// SECTION: Job Handle
// ============================================================================

/// Opaque remote query-run handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobHandle(String);

impl JobHandle {
    /// Creates a new job handle.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the handle as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true when the handle carries no usable identifier.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for JobHandle {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for JobHandle {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
