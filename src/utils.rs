// src/utils.rs
use ethers::types::{Address, U256};
use ethers::utils::format_ether;

/// Cuts `message` to `max_chars` characters, appending `...` when anything was dropped.
pub fn truncate_message(message: &str, max_chars: usize) -> String {
    let mut chars = message.char_indices();
    match chars.nth(max_chars) {
        Some((cut, _)) => format!("{}...", &message[..cut]),
        None => message.to_string(),
    }
}

/// `0x1234...abcd` form used in status lines.
pub fn short_address(address: &Address) -> String {
    let full = crate::core::validation::checksummed(address);
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}

/// Wei to an ETH string without trailing zeros ("0.5", "12", "0").
pub fn format_eth(wei: U256) -> String {
    let formatted = format_ether(wei);
    match formatted.split_once('.') {
        Some((int, frac)) => {
            let frac = frac.trim_end_matches('0');
            if frac.is_empty() {
                int.to_string()
            } else {
                format!("{}.{}", int, frac)
            }
        }
        None => formatted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_message() {
        assert_eq!(truncate_message("short", 60), "short");
        assert_eq!(truncate_message("abcdef", 3), "abc...");
        assert_eq!(truncate_message("abc", 3), "abc");
        // multi-byte characters are never split
        assert_eq!(truncate_message("ééééé", 2), "éé...");
    }

    #[test]
    fn test_short_address() {
        let addr: Address = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".parse().unwrap();
        assert_eq!(short_address(&addr), "0x5aAe...eAed");
    }

    #[test]
    fn test_format_eth() {
        assert_eq!(format_eth(U256::from(500_000_000_000_000_000u64)), "0.5");
        assert_eq!(format_eth(U256::exp10(18) * U256::from(12u64)), "12");
        assert_eq!(format_eth(U256::zero()), "0");
    }
}
