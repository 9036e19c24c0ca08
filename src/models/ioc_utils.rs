// src/models/ioc_utils.rs

use alloy_primitives::Address;
use anyhow::{bail, Result};

/// Normalize a domain observable before sending it to a vendor
pub fn normalize_domain(value: &str) -> Result<String> {
    let trimmed = value.trim().trim_end_matches('.');

    if trimmed.is_empty() {
        bail!("Empty domain name");
    }

    if trimmed.contains(' ') || trimmed.contains('/') || trimmed.contains('@') {
        bail!("Not a domain name: {}", value);
    }

    Ok(trimmed.to_lowercase())
}

/// Parse a wallet observable as a 20-byte Ethereum address.
///
/// The `0x` prefix is optional and any letter case is accepted: the value is
/// hex-decoded, not checksum-validated.
pub fn parse_wallet_address(value: &str) -> Result<Address> {
    let trimmed = value.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        bail!("Wallet address must be 40 hex characters: {}", value);
    }

    let bytes = hex::decode(digits)?;
    Ok(Address::from_slice(&bytes))
}

/// EIP-55 mixed-case rendering of an address
pub fn checksum_address(address: &Address) -> String {
    address.to_checksum(None)
}
