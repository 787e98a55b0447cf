//! CryptoInsight AI - question answering and coin insights.
//!
//! This crate answers free-form questions through a text-generation backend
//! and provides deterministic similarity rankings, comparisons and
//! recommendations from a static coin catalog. Generated text goes through
//! the same cache, single-flight and rate-limit primitives as market data.
//!
//! # Architecture
//!
//! - `service`: [`AiInsightService`], the façade used by the HTTP layer
//! - `backend`: [`AnswerBackend`] trait and the Ollama implementation
//! - `classifier`: ordered keyword rules mapping questions to a [`QuestionType`]
//! - `catalog`: static [`CoinProfile`] feature vectors
//! - `similarity`: pluggable [`SimilarityStrategy`] and ranking
//! - `recommend`: rule-based investment recommendations
//! - `prompt`: prompt builders and template fallbacks
//!
//! # Example
//!
//! ```ignore
//! use cryptoinsight_ai::{AiConfig, AiInsightService, OllamaBackend, OllamaConfig};
//!
//! let backend = Arc::new(OllamaBackend::new(OllamaConfig::default())?);
//! let service = AiInsightService::new(backend, market_service, AiConfig::default());
//!
//! let answer = service.answer_symbol_question("BTC", "Is it a good hedge?").await?;
//! println!("{}: {}", answer.question_type, answer.answer);
//! ```

pub mod backend;
pub mod catalog;
pub mod classifier;
pub mod error;
pub mod prompt;
pub mod recommend;
pub mod service;
pub mod similarity;

pub use backend::{AnswerBackend, OllamaBackend, OllamaConfig};
pub use catalog::{Category, CoinProfile};
pub use classifier::{QuestionClassifier, QuestionType};
pub use error::AiError;
pub use recommend::{Recommendation, RecommendationRequest};
pub use service::{
    AiConfig, AiHealth, AiInsightService, AnalysisSource, Comparison, QuestionAnswer,
    SimilarOptions, SimilarResponse, MAX_SIMILAR_LIMIT,
};
pub use similarity::{SimilarCoin, SimilarityStrategy, WeightedFeatureSimilarity};
