use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Current market state of one cryptocurrency, quoted in USD.
///
/// Immutable once fetched; the cache hands out clones.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSnapshot {
    /// Canonical ticker (BTC, ETH, ...)
    pub symbol: String,

    /// Display name
    pub name: String,

    /// Last traded price in USD
    pub price: Decimal,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<Decimal>,

    #[serde(rename = "volume24h", skip_serializing_if = "Option::is_none")]
    pub volume_24h: Option<Decimal>,

    #[serde(rename = "percentChange24h", skip_serializing_if = "Option::is_none")]
    pub percent_change_24h: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap_rank: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub circulating_supply: Option<Decimal>,

    /// Provider that produced the snapshot (COINGECKO, COINPAPRIKA, ...)
    pub source: String,

    pub last_updated: DateTime<Utc>,
}

impl MarketSnapshot {
    /// Create a snapshot with only the required fields set.
    pub fn new(
        symbol: impl Into<String>,
        name: impl Into<String>,
        price: Decimal,
        source: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            price,
            market_cap: None,
            volume_24h: None,
            percent_change_24h: None,
            market_cap_rank: None,
            circulating_supply: None,
            source: source.into(),
            last_updated: Utc::now(),
        }
    }

    /// One-line human readable summary, used as AI prompt context.
    pub fn summary(&self) -> String {
        let mut parts = vec![format!(
            "{} ({}) trades at ${}",
            self.name,
            self.symbol,
            self.price.round_dp(6).normalize()
        )];
        if let Some(change) = self.percent_change_24h {
            parts.push(format!("24h change {}%", change.round_dp(2)));
        }
        if let Some(cap) = self.market_cap {
            parts.push(format!("market cap ${}", cap.round_dp(0)));
        }
        if let Some(rank) = self.market_cap_rank {
            parts.push(format!("rank #{}", rank));
        }
        if let Some(volume) = self.volume_24h {
            parts.push(format!("24h volume ${}", volume.round_dp(0)));
        }
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let mut snapshot = MarketSnapshot::new("BTC", "Bitcoin", dec!(65000.5), "COINGECKO");
        snapshot.percent_change_24h = Some(dec!(-1.25));
        snapshot.market_cap_rank = Some(1);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["symbol"], "BTC");
        assert_eq!(json["price"], 65000.5);
        assert_eq!(json["percentChange24h"], -1.25);
        assert_eq!(json["marketCapRank"], 1);
        assert!(json.get("marketCap").is_none());
        assert!(json.get("lastUpdated").is_some());
    }

    #[test]
    fn test_summary_includes_known_fields() {
        let mut snapshot = MarketSnapshot::new("ETH", "Ethereum", dec!(3200), "COINPAPRIKA");
        snapshot.percent_change_24h = Some(dec!(2.456));
        snapshot.market_cap_rank = Some(2);

        let summary = snapshot.summary();
        assert!(summary.starts_with("Ethereum (ETH) trades at $3200"));
        assert!(summary.contains("24h change 2.46%"));
        assert!(summary.contains("rank #2"));
        assert!(!summary.contains("market cap"));
    }
}
