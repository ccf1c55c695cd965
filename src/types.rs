/// Core Chain Data Model
///
/// Header/Transaction/Block/Receipt mirror the shapes returned by an
/// Ethereum-compatible JSON-RPC node, trimmed to the fields this pipeline
/// actually needs. Addresses and hashes are normalized to lowercase hex on
/// ingress so that every later comparison is a plain string (or byte) equality.
use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Lowercase, `0x`-prefixed 32-byte hash.
pub type Hash32 = String;

/// Lowercase, `0x`-prefixed 20-byte address.
pub type Address = String;

/// Normalize a hex string (address or hash) to lowercase with a `0x` prefix.
///
/// Accepts input with or without the prefix and in any case.
pub fn normalize_hex(input: &str) -> String {
    let trimmed = input.trim();
    let body = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    format!("0x{}", body.to_lowercase())
}

/// Parse a normalized `0x`-prefixed hex string into raw bytes.
pub fn parse_hex_bytes(input: &str) -> Result<Vec<u8>, AppError> {
    let body = input.strip_prefix("0x").unwrap_or(input);
    hex::decode(body).map_err(|e| AppError::Decode(format!("invalid hex '{input}': {e}")))
}

/// Parse an integer that may arrive hex-prefixed (`0x...`) or as a plain
/// decimal string, per spec §3/§4.6. Empty/missing values are treated as 0.
pub fn parse_integer(input: &str) -> Result<BigUint, AppError> {
    if input.is_empty() {
        return Ok(BigUint::zero());
    }
    if let Some(body) = input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")) {
        if body.is_empty() {
            return Ok(BigUint::zero());
        }
        return BigUint::parse_bytes(body.as_bytes(), 16)
            .ok_or_else(|| AppError::Decode(format!("invalid hex integer '{input}'")));
    }
    BigUint::parse_bytes(input.as_bytes(), 10)
        .ok_or_else(|| AppError::Decode(format!("invalid decimal integer '{input}'")))
}

/// Format a wei amount as a decimal ETH string with exactly 18 fractional
/// digits, truncating (never rounding) per spec §9.
pub fn wei_to_eth(wei: &BigUint) -> String {
    let base = BigUint::from(10u32).pow(18);
    let whole = wei / &base;
    let frac = wei % &base;
    format!("{}.{:0>18}", whole, frac.to_str_radix(10))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Empty for synthetic polled headers (no subscribed hash observed yet).
    pub hash: Hash32,
    pub parent_hash: Hash32,
    pub number: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub hash: Hash32,
    pub from: Address,
    pub to: Option<Address>,
    /// Canonical decimal wei string.
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub number: u64,
    pub hash: Hash32,
    pub parent_hash: Hash32,
    pub timestamp: u64,
    pub txs: Vec<Transaction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    Reverted,
    Success,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub status: ReceiptStatus,
    pub gas_used: u64,
    /// Canonical decimal wei string.
    pub effective_gas_price: String,
}

/// Durable record of the last fully processed finalized height.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckpointState {
    pub last_finalized: u64,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Default for CheckpointState {
    fn default() -> Self {
        CheckpointState {
            last_finalized: 0,
            updated_at: chrono::DateTime::<chrono::Utc>::UNIX_EPOCH,
        }
    }
}
