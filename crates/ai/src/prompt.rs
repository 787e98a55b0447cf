//! Prompt builders and the template analyses used when generation fails.

use cryptoinsight_market_data::MarketSnapshot;

use crate::catalog::CoinProfile;
use crate::classifier::QuestionType;
use crate::similarity::SimilarCoin;

const RESPONSE_REQUIREMENTS: &str = "\
**RESPONSE REQUIREMENTS:**
1. Provide a comprehensive, well-structured answer
2. Reference specific data from the context when relevant
3. Include appropriate disclaimers for financial advice
4. Encourage further research and learning
5. Keep the tone professional yet accessible";

fn persona(question_type: QuestionType) -> &'static str {
    match question_type {
        QuestionType::Investment => {
            "You are a professional cryptocurrency investment advisor. Provide balanced, \
             educational investment guidance. ALWAYS include risk disclaimers and encourage \
             personal research."
        }
        QuestionType::PricePrediction => {
            "You are a cryptocurrency market analyst. Provide data-driven price analysis based \
             on current market conditions. Focus on technical and fundamental factors. AVOID \
             guarantees about future prices."
        }
        QuestionType::TechnicalAnalysis => {
            "You are a cryptocurrency technical analyst. Provide detailed technical analysis \
             based on price action, volume, and market indicators."
        }
        QuestionType::FundamentalAnalysis => {
            "You are a cryptocurrency fundamental analyst. Focus on technology, team, use \
             cases, adoption, and long-term value proposition."
        }
        QuestionType::RiskAssessment => {
            "You are a cryptocurrency risk analyst. Provide comprehensive risk analysis \
             including market, technical, and regulatory risks."
        }
        QuestionType::Comparison => {
            "You are a cryptocurrency analyst comparing assets. Contrast technology, \
             adoption and risk objectively without declaring a winner."
        }
        QuestionType::Educational => {
            "You are a professional cryptocurrency educator. Explain concepts clearly for \
             readers of any knowledge level, with practical examples."
        }
        QuestionType::General => {
            "You are a knowledgeable cryptocurrency expert. Provide accurate, educational, and \
             helpful information while encouraging users to do their own research."
        }
    }
}

/// Prompt for a question about one symbol.
///
/// `snapshot` is `None` when market data could not be loaded; the model is
/// told so instead of being given stale or invented numbers.
pub fn symbol_question(
    symbol: &str,
    question: &str,
    question_type: QuestionType,
    snapshot: Option<&MarketSnapshot>,
) -> String {
    let context = match snapshot {
        Some(snapshot) => snapshot.summary(),
        None => format!("Live market data for {} is currently unavailable.", symbol),
    };
    format!(
        "{persona}\n\n**QUESTION TYPE:** {question_type}\n**SYMBOL:** {symbol}\n\
         **QUESTION:** {question}\n\n**CONTEXT DATA:**\n{context}\n\n{RESPONSE_REQUIREMENTS}\n",
        persona = persona(question_type),
    )
}

/// Prompt for a question not tied to a symbol.
pub fn general_question(question: &str, question_type: QuestionType) -> String {
    format!(
        "{persona}\n\n**QUESTION TYPE:** {question_type}\n**QUESTION:** {question}\n\n\
         {RESPONSE_REQUIREMENTS}\n",
        persona = persona(question_type),
    )
}

pub fn similar_analysis(target: &CoinProfile, similar: &[SimilarCoin]) -> String {
    let listed = similar
        .iter()
        .map(|c| format!("- {} ({}, score {:.2})", c.symbol, c.category, c.similarity_score))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "{persona}\n\nExplain briefly why the following cryptocurrencies are similar to \
         {symbol} ({name}, {category}) and how they differ in risk and use case.\n\n{listed}\n\n\
         {RESPONSE_REQUIREMENTS}\n",
        persona = persona(QuestionType::Comparison),
        symbol = target.symbol,
        name = target.name,
        category = target.category.label(),
    )
}

pub fn comparison(profiles: &[CoinProfile]) -> String {
    let listed = profiles
        .iter()
        .map(|p| format!("- {}: {} ({})", p.symbol, p.description, p.category.label()))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "{persona}\n\nCompare these cryptocurrencies on technology, market position, and risk \
         profile.\n\n{listed}\n\n{RESPONSE_REQUIREMENTS}\n",
        persona = persona(QuestionType::Comparison),
    )
}

// ============================================================================
// Template fallbacks
// ============================================================================

pub fn fallback_similar_analysis(target: &CoinProfile, similar: &[SimilarCoin]) -> String {
    let mut lines = vec![format!(
        "**{} ({})** is a {} with {} risk.",
        target.symbol,
        target.name,
        target.category.label(),
        target.risk_level
    )];
    if similar.is_empty() {
        lines.push("No comparable cryptocurrencies were found in the catalog.".to_string());
    } else {
        lines.push(String::new());
        lines.push("**Closest matches:**".to_string());
        lines.extend(similar.iter().map(|c| {
            format!(
                "• **{}** ({:.2}): {}, {} risk",
                c.symbol, c.similarity_score, c.category, c.risk_level
            )
        }));
    }
    lines.push(String::new());
    lines.push("This analysis is for educational purposes only.".to_string());
    lines.join("\n")
}

pub fn fallback_comparison(profiles: &[CoinProfile]) -> String {
    let symbols = profiles
        .iter()
        .map(|p| p.symbol.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let mut lines = vec![
        "**Cryptocurrency Comparison Analysis**".to_string(),
        String::new(),
        format!("**Comparing:** {}", symbols),
        String::new(),
        "**Analysis Overview:**".to_string(),
        "• Each cryptocurrency has unique characteristics and use cases".to_string(),
        "• Market positioning and technology differ significantly".to_string(),
        "• Risk profiles vary based on market cap, adoption, and development activity".to_string(),
        "• Consider your investment goals and risk tolerance".to_string(),
        String::new(),
        "**Key Considerations:**".to_string(),
    ];
    lines.extend(
        profiles
            .iter()
            .map(|p| format!("• **{}** - {}", p.symbol, p.description)),
    );
    lines.extend(
        [
            "",
            "**Important Notes:**",
            "• This analysis is for educational purposes only",
            "• Always conduct your own research",
            "• Cryptocurrency investments carry significant risks",
            "• Past performance doesn't guarantee future results",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use rust_decimal_macros::dec;

    #[test]
    fn test_symbol_prompt_includes_market_context() {
        let snapshot = MarketSnapshot::new("BTC", "Bitcoin", dec!(65000), "TEST");
        let prompt = symbol_question(
            "BTC",
            "Should I buy?",
            QuestionType::Investment,
            Some(&snapshot),
        );
        assert!(prompt.contains("investment advisor"));
        assert!(prompt.contains("INVESTMENT"));
        assert!(prompt.contains("$65000"));
        assert!(prompt.contains("Should I buy?"));
    }

    #[test]
    fn test_symbol_prompt_without_market_data() {
        let prompt = symbol_question("SOL", "Explain", QuestionType::Educational, None);
        assert!(prompt.contains("Live market data for SOL is currently unavailable"));
    }

    #[test]
    fn test_fallback_comparison_lists_every_symbol() {
        let profiles: Vec<_> = ["BTC", "ETH", "ZZZ"]
            .iter()
            .map(|s| catalog::lookup_or_unlisted(s))
            .collect();
        let text = fallback_comparison(&profiles);
        assert!(text.contains("**Comparing:** BTC, ETH, ZZZ"));
        assert!(text.contains("Digital gold"));
        assert!(text.contains("**ZZZ** - Cryptocurrency with unique features"));
    }

    #[test]
    fn test_fallback_similar_analysis_handles_empty() {
        let btc = catalog::lookup("BTC").unwrap();
        let text = fallback_similar_analysis(&btc, &[]);
        assert!(text.contains("No comparable cryptocurrencies"));
    }
}
