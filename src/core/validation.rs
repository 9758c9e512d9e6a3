//! Form input validation: everything the user types is checked here before a
//! contract call is built.

use chrono::{DateTime, NaiveDate, Utc};
use ethers::types::{Address, U256};
use ethers::utils::{parse_ether, to_checksum};
use once_cell::sync::Lazy;
use regex::Regex;
use sha3::{Digest, Keccak256};
use std::str::FromStr;

use crate::core::errors::DappError;

static ADDRESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("hardcoded regex compiles"));

static AMOUNT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:\d+(?:\.\d{1,18})?|\.\d{1,18})$").expect("hardcoded regex compiles")
});

fn invalid(msg: &str) -> DappError {
    DappError::ValidationError(msg.to_string())
}

fn check_address(address: &str) -> Result<Address, DappError> {
    if !ADDRESS_RE.is_match(address) {
        return Err(invalid("Invalid address format. Must be 0x... (42 chars)"));
    }
    // EIP-55: if mixed-case, enforce checksum. All-lower or all-upper acceptable for compatibility.
    let body = &address[2..];
    let is_all_lower = !body.chars().any(|c| c.is_ascii_uppercase());
    let is_all_upper = !body.chars().any(|c| c.is_ascii_lowercase());
    if !(is_all_lower || is_all_upper) && !is_eip55_checksum_valid(address) {
        return Err(invalid("Invalid checksum. Did you mistype the address?"));
    }
    Address::from_str(address).map_err(|_| invalid("Address validation failed"))
}

fn is_eip55_checksum_valid(addr: &str) -> bool {
    let body = &addr[2..];
    let lower = body.to_lowercase();
    let mut keccak = Keccak256::new();
    keccak.update(lower.as_bytes());
    let hash = keccak.finalize();
    for (i, ch) in body.chars().enumerate() {
        let nibble = (hash[i / 2] >> (4 * (1 - (i % 2)))) & 0x0f;
        match ch {
            'a'..='f' if nibble >= 8 => return false,
            'A'..='F' if nibble < 8 => return false,
            _ => {}
        }
    }
    true
}

/// Validates a recipient address and returns it parsed. The checksummed text form
/// is available through [`checksummed`].
pub fn validate_recipient_address(input: &str) -> Result<Address, DappError> {
    let address = input.trim();
    if address.is_empty() {
        return Err(invalid("Please enter recipient address"));
    }
    check_address(address)
}

/// Validates a user supplied contract address (custom contract override).
pub fn validate_contract_address(input: &str) -> Result<Address, DappError> {
    let address = input.trim();
    if address.is_empty() {
        return Err(invalid("Invalid address: must be valid Ethereum address (0x...)"));
    }
    check_address(address)
        .map_err(|_| invalid("Invalid address: must be valid Ethereum address (0x...)"))
}

/// EIP-55 text form of an address.
pub fn checksummed(address: &Address) -> String {
    to_checksum(address, None)
}

/// Parses an ETH amount ("0.01", "1", ".5") into wei. Zero is rejected.
pub fn parse_eth_amount(input: &str) -> Result<U256, DappError> {
    let amount = input.trim();
    if amount.is_empty() {
        return Err(invalid("Please enter ETH amount"));
    }
    if amount.starts_with('-') {
        return Err(invalid("Invalid ETH amount. Must be greater than 0"));
    }
    if !AMOUNT_RE.is_match(amount) {
        return Err(invalid("Invalid ETH amount format"));
    }
    let normalized =
        if amount.starts_with('.') { format!("0{}", amount) } else { amount.to_string() };
    let wei = parse_ether(normalized).map_err(|_| invalid("Invalid ETH amount format"))?;
    if wei.is_zero() {
        return Err(invalid("Invalid ETH amount. Must be greater than 0"));
    }
    Ok(wei)
}

/// Parses `YYYY-MM-DD` as UTC midnight and returns the unix timestamp. The date
/// must lie strictly after `now`.
pub fn parse_unlock_date(input: &str, now: DateTime<Utc>) -> Result<u64, DappError> {
    let date = input.trim();
    if date.is_empty() {
        return Err(invalid("Please select unlock date"));
    }
    let day = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| invalid("Invalid date format"))?;
    let midnight = day.and_hms_opt(0, 0, 0).ok_or_else(|| invalid("Invalid date format"))?;
    let timestamp = midnight.and_utc().timestamp();
    if timestamp <= now.timestamp() {
        return Err(invalid("Unlock date must be in the future"));
    }
    Ok(timestamp as u64)
}

/// Optional free-text message stored on chain.
pub fn normalize_message(input: &str) -> String {
    input.trim().to_string()
}

/// Proof-of-action motivations need a description of the required action.
pub fn require_action_description(input: &str) -> Result<String, DappError> {
    let action = input.trim();
    if action.is_empty() {
        return Err(invalid("Please describe the required action"));
    }
    Ok(action.to_string())
}

/// Claiming a proof-of-action motivation needs a description of what was done.
pub fn require_proof(input: &str) -> Result<String, DappError> {
    let proof = input.trim();
    if proof.is_empty() {
        return Err(invalid("Please provide a description of what you did."));
    }
    Ok(proof.to_string())
}
