//! Static coin catalog used for similarity ranking and recommendations.
//!
//! Each profile is a small feature vector: category, market-cap tier and
//! technology tags, plus the qualitative labels shown to users.

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Category {
    #[serde(rename = "Layer 1 Blockchain")]
    Layer1,
    #[serde(rename = "DeFi Protocol")]
    DeFi,
    #[serde(rename = "Layer 2 Solution")]
    Layer2,
    #[serde(rename = "Oracle Network")]
    Oracle,
    #[serde(rename = "Meme Coin")]
    Meme,
    #[serde(rename = "Privacy Coin")]
    Privacy,
    #[serde(rename = "Enterprise Solution")]
    Enterprise,
    #[serde(rename = "Gaming & NFT")]
    Gaming,
    #[serde(rename = "AI & Data")]
    AiData,
    Other,
}

impl Category {
    pub fn label(&self) -> &'static str {
        match self {
            Category::Layer1 => "Layer 1 Blockchain",
            Category::DeFi => "DeFi Protocol",
            Category::Layer2 => "Layer 2 Solution",
            Category::Oracle => "Oracle Network",
            Category::Meme => "Meme Coin",
            Category::Privacy => "Privacy Coin",
            Category::Enterprise => "Enterprise Solution",
            Category::Gaming => "Gaming & NFT",
            Category::AiData => "AI & Data",
            Category::Other => "Other",
        }
    }

    /// Whether two distinct categories belong to the same ecosystem.
    pub fn is_related(&self, other: &Category) -> bool {
        use Category::*;
        matches!(
            (self, other),
            (Layer1, DeFi)
                | (DeFi, Layer1)
                | (DeFi, Layer2)
                | (Layer2, DeFi)
                | (Layer1, Layer2)
                | (Layer2, Layer1)
        )
    }

    fn default_risk(&self) -> &'static str {
        match self {
            Category::Layer1 | Category::Layer2 | Category::Enterprise => "Medium",
            Category::DeFi | Category::Oracle | Category::AiData => "Medium-High",
            Category::Privacy | Category::Gaming => "High",
            Category::Meme | Category::Other => "Very High",
        }
    }

    fn default_investment_type(&self) -> &'static str {
        match self {
            Category::Layer1 => "Platform/Growth",
            Category::DeFi => "DeFi/Yield",
            Category::Layer2 | Category::Oracle | Category::Enterprise => "Utility",
            Category::Privacy => "Alternative",
            Category::Gaming => "Speculative Growth",
            Category::AiData => "Thematic Growth",
            Category::Meme | Category::Other => "Speculative",
        }
    }
}

/// Market-cap bracket, 1 (mega cap) to 5 (micro cap).
pub type Tier = u8;

pub const MIN_TIER: Tier = 1;
pub const MAX_TIER: Tier = 5;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinProfile {
    pub symbol: String,
    pub name: String,
    pub category: Category,
    pub market_cap_tier: Tier,
    pub tags: &'static [&'static str],
    pub risk_level: &'static str,
    pub investment_type: &'static str,
    pub description: &'static str,
}

impl CoinProfile {
    /// Profile for a symbol the catalog does not know.
    pub fn unlisted(symbol: &str) -> CoinProfile {
        CoinProfile {
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            category: Category::Other,
            market_cap_tier: MAX_TIER,
            tags: &[],
            risk_level: Category::Other.default_risk(),
            investment_type: Category::Other.default_investment_type(),
            description: "Cryptocurrency with unique features and use cases",
        }
    }

    pub fn is_listed(&self) -> bool {
        self.category != Category::Other
    }
}

struct Entry {
    symbol: &'static str,
    name: &'static str,
    category: Category,
    tier: Tier,
    tags: &'static [&'static str],
    description: &'static str,
    /// (risk level, investment type) when they differ from the category defaults.
    labels: Option<(&'static str, &'static str)>,
}

const fn coin(
    symbol: &'static str,
    name: &'static str,
    category: Category,
    tier: Tier,
    tags: &'static [&'static str],
    description: &'static str,
) -> Entry {
    Entry {
        symbol,
        name,
        category,
        tier,
        tags,
        description,
        labels: None,
    }
}

impl Entry {
    const fn labelled(mut self, risk_level: &'static str, investment_type: &'static str) -> Entry {
        self.labels = Some((risk_level, investment_type));
        self
    }

    fn to_profile(&self) -> CoinProfile {
        let (risk_level, investment_type) = self.labels.unwrap_or((
            self.category.default_risk(),
            self.category.default_investment_type(),
        ));
        CoinProfile {
            symbol: self.symbol.to_string(),
            name: self.name.to_string(),
            category: self.category,
            market_cap_tier: self.tier,
            tags: self.tags,
            risk_level,
            investment_type,
            description: self.description,
        }
    }
}

#[rustfmt::skip]
static CATALOG: &[Entry] = &[
    // Layer 1
    coin("BTC", "Bitcoin", Category::Layer1, 1, &["pow", "store-of-value", "payments"],
        "Digital gold, store of value, first cryptocurrency")
        .labelled("Medium", "Store of Value"),
    coin("ETH", "Ethereum", Category::Layer1, 1, &["pos", "smart-contracts", "evm", "defi"],
        "Smart contract platform, DeFi ecosystem foundation")
        .labelled("Medium", "Platform/Utility"),
    coin("BNB", "BNB", Category::Layer1, 2, &["pos", "smart-contracts", "evm", "exchange"],
        "Exchange-backed smart contract chain"),
    coin("SOL", "Solana", Category::Layer1, 2, &["pos", "smart-contracts", "high-throughput"],
        "High-performance blockchain, low transaction costs")
        .labelled("Medium-High", "Platform/Growth"),
    coin("ADA", "Cardano", Category::Layer1, 2, &["pos", "smart-contracts", "research"],
        "Proof-of-stake blockchain, academic research focus")
        .labelled("Medium-High", "Platform/Growth"),
    coin("DOT", "Polkadot", Category::Layer1, 3, &["pos", "interoperability", "parachains"],
        "Interoperability focused, parachain ecosystem")
        .labelled("Medium-High", "Platform/Growth"),
    coin("AVAX", "Avalanche", Category::Layer1, 3, &["pos", "smart-contracts", "evm", "subnets"],
        "Avalanche consensus, subnet architecture")
        .labelled("High", "Platform/Growth"),
    coin("NEAR", "NEAR Protocol", Category::Layer1, 3, &["pos", "smart-contracts", "sharding"],
        "Sharded smart contract platform focused on usability"),
    coin("ATOM", "Cosmos", Category::Layer1, 3, &["pos", "interoperability", "app-chains"],
        "Hub of interoperable application chains"),
    coin("ALGO", "Algorand", Category::Layer1, 4, &["pos", "smart-contracts", "payments"],
        "Pure proof-of-stake chain with fast finality"),
    coin("LTC", "Litecoin", Category::Layer1, 3, &["pow", "payments"],
        "Lightweight Bitcoin fork for everyday payments"),
    // DeFi
    coin("UNI", "Uniswap", Category::DeFi, 3, &["dex", "amm", "governance", "evm"],
        "Leading decentralized exchange token")
        .labelled("High", "DeFi/Yield"),
    coin("AAVE", "Aave", Category::DeFi, 4, &["lending", "governance", "evm"],
        "Decentralized lending and borrowing protocol")
        .labelled("High", "DeFi/Yield"),
    coin("MKR", "Maker", Category::DeFi, 4, &["stablecoin", "lending", "governance", "evm"],
        "Governance token behind the DAI stablecoin"),
    coin("COMP", "Compound", Category::DeFi, 5, &["lending", "governance", "evm"],
        "Algorithmic money market protocol"),
    coin("SNX", "Synthetix", Category::DeFi, 5, &["derivatives", "governance", "evm"],
        "Synthetic asset and derivatives liquidity protocol"),
    coin("CRV", "Curve DAO", Category::DeFi, 5, &["dex", "amm", "stablecoin", "evm"],
        "Stablecoin-focused automated market maker"),
    // Layer 2
    coin("MATIC", "Polygon", Category::Layer2, 3, &["scaling", "evm", "zk"],
        "Ethereum Layer 2 scaling solution")
        .labelled("High", "Utility"),
    coin("ARB", "Arbitrum", Category::Layer2, 4, &["scaling", "evm", "rollup"],
        "Optimistic rollup scaling Ethereum"),
    coin("OP", "Optimism", Category::Layer2, 4, &["scaling", "evm", "rollup"],
        "Optimistic rollup and Superchain ecosystem"),
    coin("IMX", "Immutable", Category::Layer2, 4, &["scaling", "zk", "nft", "gaming"],
        "Zero-knowledge scaling for NFTs and games"),
    coin("LRC", "Loopring", Category::Layer2, 5, &["scaling", "zk", "dex"],
        "zkRollup exchange and payment protocol"),
    // Oracles
    coin("LINK", "Chainlink", Category::Oracle, 3, &["oracle", "data-feeds", "interoperability"],
        "Decentralized oracle network")
        .labelled("High", "Utility"),
    coin("BAND", "Band Protocol", Category::Oracle, 5, &["oracle", "data-feeds"],
        "Cross-chain data oracle platform"),
    coin("API3", "API3", Category::Oracle, 5, &["oracle", "data-feeds"],
        "First-party oracles operated by API providers"),
    // Meme
    coin("DOGE", "Dogecoin", Category::Meme, 2, &["pow", "payments", "community"],
        "Community-driven meme coin and payment token"),
    coin("SHIB", "Shiba Inu", Category::Meme, 3, &["community", "evm"],
        "Community meme token with its own ecosystem"),
    coin("PEPE", "Pepe", Category::Meme, 4, &["community", "evm"],
        "Frog-themed meme token"),
    coin("FLOKI", "Floki", Category::Meme, 5, &["community", "evm"],
        "Meme token with utility ambitions"),
    // Privacy
    coin("XMR", "Monero", Category::Privacy, 4, &["pow", "privacy", "payments"],
        "Private-by-default digital cash"),
    coin("ZEC", "Zcash", Category::Privacy, 5, &["pow", "privacy", "zk"],
        "Optional shielded transactions using zero-knowledge proofs"),
    coin("DASH", "Dash", Category::Privacy, 5, &["pow", "privacy", "payments"],
        "Payments-focused coin with optional privacy"),
    // Enterprise
    coin("XRP", "XRP", Category::Enterprise, 2, &["payments", "cross-border"],
        "Cross-border settlement network"),
    coin("XLM", "Stellar", Category::Enterprise, 3, &["payments", "cross-border"],
        "Open network for payments and asset issuance"),
    coin("HBAR", "Hedera", Category::Enterprise, 4, &["hashgraph", "smart-contracts"],
        "Enterprise-governed hashgraph network"),
    coin("VET", "VeChain", Category::Enterprise, 4, &["supply-chain", "smart-contracts"],
        "Supply chain and enterprise data platform"),
    // Gaming & NFT
    coin("SAND", "The Sandbox", Category::Gaming, 4, &["metaverse", "nft", "gaming"],
        "User-generated metaverse and game platform"),
    coin("MANA", "Decentraland", Category::Gaming, 4, &["metaverse", "nft"],
        "Virtual world owned by its users"),
    coin("AXS", "Axie Infinity", Category::Gaming, 4, &["gaming", "nft", "play-to-earn"],
        "Play-to-earn creature battling game"),
    // AI & Data
    coin("FET", "Fetch.ai", Category::AiData, 4, &["ai", "agents"],
        "Autonomous economic agents and AI marketplace"),
    coin("RNDR", "Render", Category::AiData, 4, &["gpu", "ai", "compute"],
        "Distributed GPU rendering network"),
    coin("GRT", "The Graph", Category::AiData, 4, &["indexing", "data-feeds"],
        "Indexing protocol for blockchain data"),
    coin("OCEAN", "Ocean Protocol", Category::AiData, 5, &["data-marketplace", "ai"],
        "Marketplace for data sharing and monetization"),
];

/// All cataloged coins, in catalog order.
pub fn all() -> impl Iterator<Item = CoinProfile> {
    CATALOG.iter().map(Entry::to_profile)
}

/// Profile for `symbol` (already normalized), if cataloged.
pub fn lookup(symbol: &str) -> Option<CoinProfile> {
    CATALOG
        .iter()
        .find(|e| e.symbol == symbol)
        .map(Entry::to_profile)
}

/// Cataloged profile, or an `Other` profile for unknown symbols.
pub fn lookup_or_unlisted(symbol: &str) -> CoinProfile {
    lookup(symbol).unwrap_or_else(|| CoinProfile::unlisted(symbol))
}
