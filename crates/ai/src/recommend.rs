//! Rule-based investment recommendations.
//!
//! Selection, allocation bands and warnings are deterministic functions of
//! the request. No market data or text generation is involved.

use serde::{Deserialize, Serialize};

use crate::catalog;
use crate::error::AiError;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RecommendationRequest {
    pub risk_tolerance: Option<String>,
    pub investment_type: Option<String>,
    /// Amount the user intends to invest, in USD.
    pub budget_range: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RiskTolerance {
    Low,
    Medium,
    High,
    /// Anything else; gets a small, conservative default basket.
    Unspecified,
}

impl RiskTolerance {
    pub fn parse(value: &str) -> RiskTolerance {
        match value.trim().to_lowercase().as_str() {
            "low" | "conservative" => RiskTolerance::Low,
            "medium" | "moderate" | "balanced" => RiskTolerance::Medium,
            "high" | "aggressive" => RiskTolerance::High,
            _ => RiskTolerance::Unspecified,
        }
    }

    fn symbols(&self) -> &'static [&'static str] {
        match self {
            RiskTolerance::Low => &["BTC", "ETH"],
            RiskTolerance::Medium => &["BTC", "ETH", "ADA", "SOL", "DOT"],
            RiskTolerance::High => &[
                "BTC", "ETH", "ADA", "SOL", "DOT", "AVAX", "MATIC", "LINK", "UNI", "AAVE",
            ],
            RiskTolerance::Unspecified => &["BTC", "ETH", "ADA"],
        }
    }

    /// Allocation band as (low %, high %) of the crypto budget.
    fn allocation(&self, symbol: &str) -> (u32, u32) {
        let core = matches!(symbol, "BTC" | "ETH");
        match self {
            RiskTolerance::Low if symbol == "BTC" => (60, 70),
            RiskTolerance::Low => (30, 40),
            RiskTolerance::Medium if core => (20, 30),
            RiskTolerance::Medium => (5, 15),
            RiskTolerance::High if core => (15, 25),
            RiskTolerance::High => (5, 10),
            RiskTolerance::Unspecified => (5, 10),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RecommendedCoin {
    pub symbol: String,
    pub name: String,
    pub reason: String,
    pub risk_level: &'static str,
    pub investment_type: &'static str,
    pub allocation_suggestion: String,
    /// Dollar range for the allocation band when a budget was given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allocation_amount: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Recommendation {
    pub risk_tolerance: String,
    pub investment_type: String,
    pub budget_range: Option<f64>,
    pub recommended_cryptocurrencies: Vec<RecommendedCoin>,
    pub investment_strategy: String,
    pub risk_warnings: Vec<String>,
}

/// Build recommendations for a request.
///
/// Both `risk_tolerance` and `investment_type` must be present and
/// non-blank. A non-positive budget is rejected.
pub fn recommend(request: &RecommendationRequest) -> Result<Recommendation, AiError> {
    let (risk_tolerance, investment_type) = match (
        non_blank(request.risk_tolerance.as_deref()),
        non_blank(request.investment_type.as_deref()),
    ) {
        (Some(risk), Some(kind)) => (risk, kind),
        _ => {
            return Err(AiError::invalid_input(
                "Risk tolerance and investment type are required",
            ))
        }
    };
    if let Some(budget) = request.budget_range {
        if !budget.is_finite() || budget <= 0.0 {
            return Err(AiError::invalid_input("Budget range must be a positive amount"));
        }
    }

    let tolerance = RiskTolerance::parse(risk_tolerance);
    let recommended_cryptocurrencies = tolerance
        .symbols()
        .iter()
        .map(|symbol| recommended_coin(symbol, tolerance, request.budget_range))
        .collect();

    Ok(Recommendation {
        risk_tolerance: risk_tolerance.to_string(),
        investment_type: investment_type.to_string(),
        budget_range: request.budget_range,
        recommended_cryptocurrencies,
        investment_strategy: investment_strategy(
            tolerance,
            risk_tolerance,
            investment_type,
            request.budget_range,
        ),
        risk_warnings: risk_warnings(tolerance),
    })
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn recommended_coin(symbol: &str, tolerance: RiskTolerance, budget: Option<f64>) -> RecommendedCoin {
    let profile = catalog::lookup_or_unlisted(symbol);
    let (low, high) = tolerance.allocation(symbol);
    RecommendedCoin {
        symbol: profile.symbol,
        name: profile.name,
        reason: reason(symbol).to_string(),
        risk_level: profile.risk_level,
        investment_type: profile.investment_type,
        allocation_suggestion: format!("{}-{}%", low, high),
        allocation_amount: budget.map(|b| {
            format!(
                "${:.2} - ${:.2}",
                b * f64::from(low) / 100.0,
                b * f64::from(high) / 100.0
            )
        }),
    }
}

fn reason(symbol: &str) -> &'static str {
    match symbol {
        "BTC" => "Digital gold, store of value, suitable for all risk profiles",
        "ETH" => "Smart contract leader, strong ecosystem, moderate risk",
        "ADA" => "Academic approach, proof-of-stake, growing ecosystem",
        "SOL" => "High performance, growing DeFi ecosystem, higher risk/reward",
        "DOT" => "Interoperability focus, parachain ecosystem, moderate risk",
        _ => "Fits your risk profile and investment strategy",
    }
}

fn investment_strategy(
    tolerance: RiskTolerance,
    risk_tolerance: &str,
    investment_type: &str,
    budget: Option<f64>,
) -> String {
    let mut lines = vec![
        "**Personalized Investment Strategy**".to_string(),
        String::new(),
        format!("**Risk Profile:** {}", risk_tolerance),
        format!("**Investment Type:** {}", investment_type),
    ];
    if let Some(budget) = budget {
        lines.push(format!("**Budget Range:** ${:.2}", budget));
    }
    lines.push(String::new());

    let (title, bullets): (&str, &[&str]) = match tolerance {
        RiskTolerance::Low => (
            "Conservative Strategy",
            &[
                "Focus on established cryptocurrencies (BTC, ETH)",
                "Dollar-cost averaging for reduced volatility",
                "Long-term holding approach",
                "Limit exposure to 5-10% of total portfolio",
            ],
        ),
        RiskTolerance::Medium => (
            "Balanced Strategy",
            &[
                "Mix of established and emerging cryptocurrencies",
                "Diversification across different sectors",
                "Regular portfolio rebalancing",
                "Moderate position sizing",
            ],
        ),
        RiskTolerance::High => (
            "Aggressive Strategy",
            &[
                "Include smaller cap and emerging tokens",
                "Active trading and position management",
                "Higher allocation to crypto assets",
                "Stay informed about market developments",
            ],
        ),
        RiskTolerance::Unspecified => (
            "Starter Strategy",
            &[
                "Start with a small basket of large, liquid assets",
                "Define your risk tolerance before adding positions",
            ],
        ),
    };
    lines.push(format!("**{}:**", title));
    lines.extend(bullets.iter().map(|b| format!("• {}", b)));

    lines.push(String::new());
    lines.push("**Risk Management:**".to_string());
    lines.extend(
        [
            "Never invest more than you can afford to lose",
            "Use stop-loss orders to limit downside",
            "Diversify across different asset classes",
            "Keep up with regulatory developments",
        ]
        .iter()
        .map(|b| format!("• {}", b)),
    );
    lines.join("\n")
}

fn risk_warnings(tolerance: RiskTolerance) -> Vec<String> {
    let mut warnings = vec![
        "Cryptocurrency investments are highly volatile and risky",
        "Past performance does not guarantee future results",
        "Regulatory changes can significantly impact cryptocurrency values",
        "Only invest what you can afford to lose completely",
        "Consider consulting with a qualified financial advisor",
    ];
    if tolerance == RiskTolerance::High {
        warnings.extend([
            "High-risk investments can lead to significant losses",
            "Smaller cap cryptocurrencies are extremely volatile",
            "Consider position sizing and risk management strategies",
        ]);
    }
    warnings.into_iter().map(String::from).collect()
}
