//! Checksummed binary persistence of a parsed order stream, replacing the
//! unguarded pickle round-trip of the original tooling with an integrity
//! check over the cached payload (spec §5, cache section).

#![cfg(feature = "bincode")]

use super::error::EngineError;
use super::types::Order;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

const CHECKSUM_LEN: usize = 32;

fn bincode_config() -> bincode::config::Configuration {
    bincode::config::standard()
}

/// Serializes `orders` and writes them to `path` as a 32-byte SHA-256
/// checksum of the payload followed by the bincode-encoded payload itself.
pub fn save_orders_to_cache(path: &Path, orders: &[Order]) -> Result<(), EngineError> {
    let payload = bincode::serde::encode_to_vec(orders, bincode_config())
        .map_err(|e| EngineError::Cache(e.to_string()))?;

    let checksum = Sha256::digest(&payload);

    let mut bytes = Vec::with_capacity(CHECKSUM_LEN + payload.len());
    bytes.extend_from_slice(&checksum);
    bytes.extend_from_slice(&payload);

    fs::write(path, bytes)?;
    Ok(())
}

/// Reads a cache written by [`save_orders_to_cache`], verifying its
/// checksum before decoding.
///
/// Fatal if the file is too short to contain a checksum header, or if the
/// recomputed checksum does not match the stored one — a silently
/// corrupted cache must never be mistaken for a valid order stream.
pub fn read_orders_from_cache(path: &Path) -> Result<Vec<Order>, EngineError> {
    let bytes = fs::read(path)?;
    if bytes.len() < CHECKSUM_LEN {
        return Err(EngineError::TruncatedCache);
    }

    let (expected, payload) = bytes.split_at(CHECKSUM_LEN);
    let actual = Sha256::digest(payload);

    if expected != actual.as_slice() {
        return Err(EngineError::ChecksumMismatch {
            expected: hex_encode(expected),
            actual: hex_encode(&actual),
        });
    }

    let (orders, _) = bincode::serde::decode_from_slice(payload, bincode_config())
        .map_err(|e| EngineError::Cache(e.to_string()))?;
    Ok(orders)
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(s, "{b:02x}").expect("writing to a String never fails");
    }
    s
}
