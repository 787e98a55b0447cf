use crate::errors::MarketDataError;

/// Longest ticker any supported provider lists.
const MAX_SYMBOL_LEN: usize = 20;

/// Canonical form of a user-supplied ticker: trimmed and upper-cased.
///
/// Cache keys, coalescer keys and provider lookups all use this form so
/// `btc`, ` BTC ` and `BTC` share one entry.
pub fn normalize_symbol(raw: &str) -> Result<String, MarketDataError> {
    let symbol = raw.trim().to_ascii_uppercase();

    if symbol.is_empty() {
        return Err(MarketDataError::InvalidSymbol("symbol is empty".to_string()));
    }
    if symbol.len() > MAX_SYMBOL_LEN {
        return Err(MarketDataError::InvalidSymbol(format!(
            "symbol '{}' is longer than {} characters",
            symbol, MAX_SYMBOL_LEN
        )));
    }
    if !symbol
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(MarketDataError::InvalidSymbol(format!(
            "symbol '{}' contains unsupported characters",
            symbol
        )));
    }

    Ok(symbol)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(normalize_symbol(" btc ").unwrap(), "BTC");
        assert_eq!(normalize_symbol("Eth").unwrap(), "ETH");
        assert_eq!(normalize_symbol("usdc.e").unwrap(), "USDC.E");
    }

    #[test]
    fn test_normalize_symbol_rejects_garbage() {
        assert!(matches!(
            normalize_symbol("   "),
            Err(MarketDataError::InvalidSymbol(_))
        ));
        assert!(normalize_symbol("BTC/USD").is_err());
        assert!(normalize_symbol(&"X".repeat(21)).is_err());
    }
}
