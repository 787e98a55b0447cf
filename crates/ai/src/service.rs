//! AI insight façade.
//!
//! Answers, similarity rankings and generated analyses go through the same
//! cache → single-flight → admission path as market data, using their own
//! cache stores and the `AI` token bucket.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cryptoinsight_market_data::{
    normalize_symbol, Admission, CacheStats, CacheStore, ErrorKind, MarketDataService,
    RateLimiter, RequestCoalescer, ResourceClass,
};
use log::{debug, info, warn};
use serde::Serialize;

use crate::backend::AnswerBackend;
use crate::catalog::{self, CoinProfile};
use crate::classifier::{normalize_question, QuestionClassifier, QuestionType};
use crate::error::AiError;
use crate::prompt;
use crate::recommend::{self, Recommendation, RecommendationRequest};
use crate::similarity::{
    rank, rounded_score, Relationship, SimilarCoin, SimilarityStrategy,
    WeightedFeatureSimilarity,
};

pub const MAX_SIMILAR_LIMIT: usize = 20;
pub const MIN_COMPARE_SYMBOLS: usize = 2;
pub const MAX_COMPARE_SYMBOLS: usize = 5;

#[derive(Clone, Debug)]
pub struct AiConfig {
    /// How long a generated answer or analysis stays cached.
    pub answer_ttl: Duration,
    /// How long a similarity ranking stays cached.
    pub similarity_ttl: Duration,
    /// Bound on one generation, including the market lookup for context.
    pub generation_timeout: Duration,
    /// LRU bound per cache store, 0 for unbounded.
    pub max_entries: usize,
    /// How a generation obtains an `AI` token.
    pub admission: Admission,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            answer_ttl: Duration::from_secs(30 * 60),
            similarity_ttl: Duration::from_secs(5 * 60),
            generation_timeout: Duration::from_secs(60),
            max_entries: 2000,
            admission: Admission::Immediate,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionAnswer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    pub question: String,
    pub question_type: QuestionType,
    pub answer: String,
    /// Whether the answer was already cached when the request arrived.
    pub cached: bool,
    pub timestamp: DateTime<Utc>,
}

/// Where an analysis text came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisSource {
    Ai,
    Fallback,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SimilarOptions {
    pub limit: usize,
    pub include_analysis: bool,
    pub include_market_data: bool,
}

impl Default for SimilarOptions {
    fn default() -> Self {
        Self {
            limit: 5,
            include_analysis: true,
            include_market_data: false,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct SimilarResponse {
    pub symbol: String,
    pub name: String,
    pub category: &'static str,
    pub similar_cryptocurrencies: Vec<SimilarCoin>,
    pub count: usize,
    pub strategy: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison_analysis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_source: Option<AnalysisSource>,
    pub cached: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ComparisonPair {
    pub pair: [String; 2],
    pub similarity_score: f64,
    pub relationship: Relationship,
}

#[derive(Clone, Debug, Serialize)]
pub struct ComparisonInsights {
    pub portfolio_diversification: &'static str,
    pub risk_assessment: &'static str,
    pub market_correlation: &'static str,
    pub recommendation: &'static str,
}

impl Default for ComparisonInsights {
    fn default() -> Self {
        Self {
            portfolio_diversification: "Consider different categories for better diversification",
            risk_assessment: "Mixed risk profile - some high-risk, some established assets",
            market_correlation: "Some assets may move together during market events",
            recommendation: "Research each asset individually and consider your risk tolerance",
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Comparison {
    pub symbols: Vec<String>,
    pub comparison_type: &'static str,
    pub analysis: String,
    pub analysis_source: AnalysisSource,
    pub similarity_matrix: Vec<ComparisonPair>,
    pub insights: ComparisonInsights,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
pub struct AiHealth {
    pub status: &'static str,
    pub backend: &'static str,
    pub similarity_strategy: &'static str,
    pub features: Vec<&'static str>,
    pub version: &'static str,
    pub timestamp: DateTime<Utc>,
}

pub struct AiInsightService {
    backend: Arc<dyn AnswerBackend>,
    market: Arc<MarketDataService>,
    limiter: Arc<RateLimiter>,
    classifier: QuestionClassifier,
    strategy: Arc<dyn SimilarityStrategy>,
    answers: RequestCoalescer<String, AiError>,
    similar: RequestCoalescer<Vec<SimilarCoin>, AiError>,
    config: AiConfig,
}

impl AiInsightService {
    /// The service shares the market service's rate limiter and draws from
    /// its `AI` bucket.
    pub fn new(
        backend: Arc<dyn AnswerBackend>,
        market: Arc<MarketDataService>,
        config: AiConfig,
    ) -> Self {
        let answers = Arc::new(CacheStore::new("ai_answers", config.max_entries));
        let similar = Arc::new(CacheStore::new("similarity", config.max_entries));
        Self {
            limiter: Arc::clone(market.limiter()),
            answers: RequestCoalescer::new(answers, config.answer_ttl, config.generation_timeout),
            similar: RequestCoalescer::new(
                similar,
                config.similarity_ttl,
                config.generation_timeout,
            ),
            classifier: QuestionClassifier::default(),
            strategy: Arc::new(WeightedFeatureSimilarity::default()),
            backend,
            market,
            config,
        }
    }

    /// Replace the similarity strategy.
    pub fn with_strategy(mut self, strategy: Arc<dyn SimilarityStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Answer a question about one symbol, with its market snapshot as
    /// context.
    ///
    /// An unknown symbol fails with `NotFound`. Any other market data
    /// failure only removes the context from the prompt.
    pub async fn answer_symbol_question(
        &self,
        symbol: &str,
        question: &str,
    ) -> Result<QuestionAnswer, AiError> {
        let question = require_question(question)?;
        let symbol = normalize_symbol(symbol)?;
        let question_type = self.classifier.classify(&question);
        let key = answer_key(Some(&symbol), &question, question_type);
        let cached = self.answers.cache().peek(&key).is_some();

        let market = Arc::clone(&self.market);
        let limiter = Arc::clone(&self.limiter);
        let backend = Arc::clone(&self.backend);
        let admission = self.config.admission;
        let (fetch_symbol, fetch_question) = (symbol.clone(), question.clone());

        let answer = self
            .answers
            .get_or_fetch(&key, move || async move {
                let snapshot = match market.get_snapshot(&fetch_symbol).await {
                    Ok(snapshot) => Some(snapshot),
                    Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::InvalidRequest) => {
                        return Err(AiError::from(e))
                    }
                    Err(e) => {
                        warn!(
                            "Answering {} question without market context: {}",
                            fetch_symbol, e
                        );
                        None
                    }
                };
                admit(&limiter, admission).await?;
                let prompt = prompt::symbol_question(
                    &fetch_symbol,
                    &fetch_question,
                    question_type,
                    snapshot.as_ref(),
                );
                backend.generate(&prompt).await
            })
            .await?;

        info!("Answered {} question about {}", question_type, symbol);
        Ok(QuestionAnswer {
            symbol: Some(symbol),
            question,
            question_type,
            answer,
            cached,
            timestamp: Utc::now(),
        })
    }

    /// Answer a question that is not about a particular symbol.
    pub async fn answer_general_question(&self, question: &str) -> Result<QuestionAnswer, AiError> {
        let question = require_question(question)?;
        let question_type = self.classifier.classify(&question);
        let key = answer_key(None, &question, question_type);
        let cached = self.answers.cache().peek(&key).is_some();

        let answer = self
            .generate(&key, prompt::general_question(&question, question_type))
            .await?;

        info!("Answered general {} question", question_type);
        Ok(QuestionAnswer {
            symbol: None,
            question,
            question_type,
            answer,
            cached,
            timestamp: Utc::now(),
        })
    }

    /// Coins most similar to `symbol`, optionally with a generated analysis
    /// and live market data per coin.
    ///
    /// Market data is best effort per coin. A failed analysis falls back to
    /// a template and is marked as such.
    pub async fn similar(
        &self,
        symbol: &str,
        options: SimilarOptions,
    ) -> Result<SimilarResponse, AiError> {
        if !(1..=MAX_SIMILAR_LIMIT).contains(&options.limit) {
            return Err(AiError::invalid_input(format!(
                "Limit must be between 1 and {}",
                MAX_SIMILAR_LIMIT
            )));
        }
        let symbol = normalize_symbol(symbol)?;
        let target = catalog::lookup(&symbol).ok_or_else(|| AiError::UnknownSymbol(symbol.clone()))?;

        let key = format!("{}:{}:{}", symbol, options.limit, self.strategy.name());
        let cached = self.similar.cache().peek(&key).is_some();
        let strategy = Arc::clone(&self.strategy);
        let rank_target = target.clone();
        let limit = options.limit;
        let mut ranked = self
            .similar
            .get_or_fetch(&key, move || async move {
                Ok(rank(strategy.as_ref(), &rank_target, catalog::all(), limit))
            })
            .await?;

        let symbols: Vec<String> = ranked.iter().map(|c| c.symbol.clone()).collect();
        let analysis_key = format!("similar|{}", key);
        let market_data = async {
            if options.include_market_data {
                Some(self.market.get_batch(&symbols).await)
            } else {
                None
            }
        };
        let analysis = async {
            if options.include_analysis {
                Some(
                    self.analysis(
                        &analysis_key,
                        prompt::similar_analysis(&target, &ranked),
                        || prompt::fallback_similar_analysis(&target, &ranked),
                    )
                    .await,
                )
            } else {
                None
            }
        };
        let (market_data, analysis) = futures::join!(market_data, analysis);

        if let Some(results) = market_data {
            for (coin, (_, result)) in ranked.iter_mut().zip(results) {
                match result {
                    Ok(snapshot) => coin.market_data = Some(snapshot),
                    Err(e) => debug!("No market data for similar coin {}: {}", coin.symbol, e),
                }
            }
        }
        let (comparison_analysis, analysis_source) = match analysis {
            Some((text, source)) => (Some(text), Some(source)),
            None => (None, None),
        };

        Ok(SimilarResponse {
            count: ranked.len(),
            symbol: target.symbol,
            name: target.name,
            category: target.category.label(),
            similar_cryptocurrencies: ranked,
            strategy: self.strategy.name(),
            comparison_analysis,
            analysis_source,
            cached,
            timestamp: Utc::now(),
        })
    }

    /// Pairwise comparison of 2 to 5 symbols.
    ///
    /// The bound applies to the list as sent; duplicates are then dropped and
    /// at least two distinct symbols must remain. Symbols outside the catalog
    /// are compared as uncategorized coins.
    pub async fn compare(&self, symbols: &[String]) -> Result<Comparison, AiError> {
        if !(MIN_COMPARE_SYMBOLS..=MAX_COMPARE_SYMBOLS).contains(&symbols.len()) {
            return Err(AiError::invalid_input(format!(
                "Between {} and {} symbols are required",
                MIN_COMPARE_SYMBOLS, MAX_COMPARE_SYMBOLS
            )));
        }
        let mut normalized: Vec<String> = Vec::with_capacity(symbols.len());
        for raw in symbols {
            let symbol = normalize_symbol(raw)?;
            if !normalized.contains(&symbol) {
                normalized.push(symbol);
            }
        }
        if normalized.len() < MIN_COMPARE_SYMBOLS {
            return Err(AiError::invalid_input(format!(
                "At least {} distinct symbols are required",
                MIN_COMPARE_SYMBOLS
            )));
        }

        let profiles: Vec<CoinProfile> = normalized
            .iter()
            .map(|s| catalog::lookup_or_unlisted(s))
            .collect();

        let mut similarity_matrix = Vec::new();
        for (i, a) in profiles.iter().enumerate() {
            for b in &profiles[i + 1..] {
                similarity_matrix.push(ComparisonPair {
                    pair: [a.symbol.clone(), b.symbol.clone()],
                    similarity_score: rounded_score(self.strategy.as_ref(), a, b),
                    relationship: Relationship::between(a, b),
                });
            }
        }

        let key = format!("compare|{}", normalized.join(","));
        let (analysis, analysis_source) = self
            .analysis(&key, prompt::comparison(&profiles), || {
                prompt::fallback_comparison(&profiles)
            })
            .await;

        Ok(Comparison {
            symbols: normalized,
            comparison_type: "AI-Powered Analysis",
            analysis,
            analysis_source,
            similarity_matrix,
            insights: ComparisonInsights::default(),
            timestamp: Utc::now(),
        })
    }

    pub fn recommend(&self, request: &RecommendationRequest) -> Result<Recommendation, AiError> {
        let recommendation = recommend::recommend(request)?;
        info!(
            "Recommended {} coins for risk tolerance '{}'",
            recommendation.recommended_cryptocurrencies.len(),
            recommendation.risk_tolerance
        );
        Ok(recommendation)
    }

    pub fn health(&self) -> AiHealth {
        AiHealth {
            status: "operational",
            backend: self.backend.id(),
            similarity_strategy: self.strategy.name(),
            features: vec![
                "Enhanced Q&A",
                "Similar Coin Recommendations",
                "Cryptocurrency Comparison",
                "Investment Recommendations",
                "Intelligent Question Analysis",
                "Cached Responses",
            ],
            version: "2.0",
            timestamp: Utc::now(),
        }
    }

    /// Per-store statistics, keyed by store name.
    pub fn cache_stats(&self) -> Vec<(&'static str, CacheStats)> {
        [self.answers.cache().name(), self.similar.cache().name()]
            .into_iter()
            .zip([self.answers.cache().stats(), self.similar.cache().stats()])
            .collect()
    }

    pub fn pending_fetches(&self) -> usize {
        self.answers.pending_count() + self.similar.pending_count()
    }

    pub fn clear_caches(&self) -> usize {
        let removed = self.answers.cache().clear() + self.similar.cache().clear();
        info!("Cleared {} AI cache entries", removed);
        removed
    }

    pub fn purge_expired(&self) -> usize {
        self.answers.cache().purge_expired() + self.similar.cache().purge_expired()
    }

    async fn generate(&self, key: &str, prompt: String) -> Result<String, AiError> {
        let limiter = Arc::clone(&self.limiter);
        let backend = Arc::clone(&self.backend);
        let admission = self.config.admission;
        self.answers
            .get_or_fetch(key, move || async move {
                admit(&limiter, admission).await?;
                backend.generate(&prompt).await
            })
            .await
    }

    async fn analysis(
        &self,
        key: &str,
        prompt: String,
        fallback: impl FnOnce() -> String,
    ) -> (String, AnalysisSource) {
        match self.generate(key, prompt).await {
            Ok(text) => (text, AnalysisSource::Ai),
            Err(e) => {
                warn!("Analysis '{}' failed, using template: {}", key, e);
                (fallback(), AnalysisSource::Fallback)
            }
        }
    }
}

async fn admit(limiter: &RateLimiter, admission: Admission) -> Result<(), AiError> {
    match admission {
        Admission::Immediate => limiter.check(ResourceClass::Ai)?,
        Admission::Wait(timeout) => limiter.wait(ResourceClass::Ai, timeout).await?,
    }
    Ok(())
}

fn require_question(question: &str) -> Result<String, AiError> {
    let trimmed = question.trim();
    if trimmed.is_empty() {
        return Err(AiError::invalid_input("Question is required"));
    }
    Ok(trimmed.to_string())
}

fn answer_key(symbol: Option<&str>, question: &str, question_type: QuestionType) -> String {
    format!(
        "{}|{}|{}",
        symbol.unwrap_or("*"),
        normalize_question(question),
        question_type
    )
}
