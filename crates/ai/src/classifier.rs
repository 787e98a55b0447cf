//! Keyword-based question classification.
//!
//! Rules are evaluated top to bottom and the first rule with a keyword
//! contained in the lowercased question wins. Questions that match nothing
//! are [`QuestionType::General`].

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionType {
    Investment,
    PricePrediction,
    TechnicalAnalysis,
    FundamentalAnalysis,
    Comparison,
    RiskAssessment,
    Educational,
    General,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Investment => "INVESTMENT",
            QuestionType::PricePrediction => "PRICE_PREDICTION",
            QuestionType::TechnicalAnalysis => "TECHNICAL_ANALYSIS",
            QuestionType::FundamentalAnalysis => "FUNDAMENTAL_ANALYSIS",
            QuestionType::Comparison => "COMPARISON",
            QuestionType::RiskAssessment => "RISK_ASSESSMENT",
            QuestionType::Educational => "EDUCATIONAL",
            QuestionType::General => "GENERAL",
        }
    }
}

impl std::fmt::Display for QuestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classification rule: any keyword match selects `question_type`.
#[derive(Clone, Copy, Debug)]
pub struct Rule {
    pub question_type: QuestionType,
    pub keywords: &'static [&'static str],
}

/// Default rule table, in priority order.
pub const DEFAULT_RULES: &[Rule] = &[
    Rule {
        question_type: QuestionType::Investment,
        keywords: &["buy", "invest", "should i", "worth"],
    },
    Rule {
        question_type: QuestionType::PricePrediction,
        keywords: &["price", "predict", "forecast", "will"],
    },
    Rule {
        question_type: QuestionType::TechnicalAnalysis,
        keywords: &["technical", "chart", "support", "resistance"],
    },
    Rule {
        question_type: QuestionType::FundamentalAnalysis,
        keywords: &["technology", "team", "roadmap", "use case"],
    },
    Rule {
        question_type: QuestionType::Comparison,
        keywords: &["compare", "better", "vs", "versus"],
    },
    Rule {
        question_type: QuestionType::RiskAssessment,
        keywords: &["risk", "safe", "dangerous", "volatile"],
    },
    Rule {
        question_type: QuestionType::Educational,
        keywords: &["what is", "how does", "explain", "learn"],
    },
];

/// Ordered rule table with a `General` fallback.
#[derive(Clone, Copy, Debug)]
pub struct QuestionClassifier {
    rules: &'static [Rule],
}

impl QuestionClassifier {
    pub fn new(rules: &'static [Rule]) -> Self {
        Self { rules }
    }

    pub fn classify(&self, question: &str) -> QuestionType {
        let lower = question.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.keywords.iter().any(|kw| lower.contains(kw)))
            .map(|rule| rule.question_type)
            .unwrap_or(QuestionType::General)
    }
}

impl Default for QuestionClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_RULES)
    }
}

/// Canonical form of a question for cache keys: lowercase, single spaces,
/// no trailing punctuation.
pub fn normalize_question(question: &str) -> String {
    let collapsed = question
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    collapsed
        .trim_end_matches(|c: char| matches!(c, '?' | '!' | '.') || c.is_whitespace())
        .to_string()
}
