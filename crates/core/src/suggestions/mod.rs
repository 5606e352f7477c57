//! Historical-pattern suggestion and quantity-prediction engine.
//!
//! Observes profile-cutting decisions, learns (product, size, profile,
//! measurement) → ratio associations, and predicts cut quantities for new
//! orders with a blended frequency/recency/context confidence score.

mod engine;
mod scoring;
mod types;

pub use engine::SuggestionEngine;
pub use scoring::{ScoreCalculator, ScoringWeights};
pub use types::*;

use crate::errors::SuggestionError;

/// Result type for suggestion operations that can fail.
pub type SuggestionResult<T> = Result<T, SuggestionError>;

/// Default scoring weights (out of 100 combined).
pub const DEFAULT_WEIGHTS: ScoringWeights =
    ScoringWeights { frequency: 40.0, recency: 30.0, context: 30.0 };

/// Days after which a pattern's recency score halves.
pub const RECENCY_HALF_LIFE_DAYS: f64 = 90.0;

/// Cache tag invalidated after every successful learn.
pub const SUGGESTION_CACHE_TAG: &str = "suggestion-patterns";

/// Minimum similarity for surfacing profile alternatives.
pub const SIMILARITY_THRESHOLD: f64 = 0.5;

/// Alternatives attached per profile suggestion.
pub const MAX_ALTERNATIVES: usize = 3;
