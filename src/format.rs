//! Display-only formatting for addresses, balances and hashes

const EXPLORER_BASE: &str = "https://stellar.expert/explorer";

/// Shorten an address to `first6...last4`; short inputs pass through.
pub fn format_address(address: &str) -> String {
    if address.chars().count() <= 12 {
        return address.to_string();
    }
    let chars: Vec<char> = address.chars().collect();
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Shorten a transaction hash to `first8...last6` for status lines
pub fn short_hash(hash: &str) -> String {
    if hash.len() <= 14 || !hash.is_ascii() {
        return hash.to_string();
    }
    format!("{}...{}", &hash[..8], &hash[hash.len() - 6..])
}

/// en-US balance rendering: thousands separators, 2 to 7 fraction digits.
///
/// Unparsable input renders as `0.00`.
pub fn format_balance(balance: &str) -> String {
    let value = match balance.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => return "0.00".to_string(),
    };

    let fixed = format!("{:.7}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));

    let mut frac = frac_part.trim_end_matches('0').to_string();
    while frac.len() < 2 {
        frac.push('0');
    }

    let negative = value < 0.0 && fixed.bytes().any(|b| b != b'0' && b != b'.');
    format!(
        "{}{}.{}",
        if negative { "-" } else { "" },
        group_thousands(int_part),
        frac
    )
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Block explorer link for a submitted transaction
pub fn explorer_url(network: &str, hash: &str) -> String {
    format!("{}/{}/tx/{}", EXPLORER_BASE, network, hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_address() {
        assert_eq!(
            format_address("GAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAWHF"),
            "GAAAAA...AWHF"
        );
        assert_eq!(format_address("GABCDEF12345"), "GABCDEF12345");
        assert_eq!(format_address(""), "");
    }

    #[test]
    fn test_format_balance() {
        assert_eq!(format_balance("10000.5"), "10,000.50");
        assert_eq!(format_balance("0"), "0.00");
        assert_eq!(format_balance("1.23456789"), "1.2345679");
        assert_eq!(format_balance("1234567.1"), "1,234,567.10");
        assert_eq!(format_balance("999.125"), "999.125");
        assert_eq!(format_balance("-42"), "-42.00");
        assert_eq!(format_balance("garbage"), "0.00");
    }

    #[test]
    fn test_short_hash_and_explorer() {
        let hash = "a1b2c3d4e5f60718293a4b5c6d7e8f90";
        assert_eq!(short_hash(hash), "a1b2c3d4...7e8f90");
        assert_eq!(short_hash("abc"), "abc");
        assert_eq!(
            explorer_url("testnet", "abc"),
            "https://stellar.expert/explorer/testnet/tx/abc"
        );
    }
}
