pub mod config;
pub mod domain;
pub mod errors;
pub mod keys;
pub mod store;
pub mod suggestions;

pub use config::{AppConfig, ConfigError, ConfigOverrides, EngineConfig, LoadOptions, LogFormat};
pub use domain::pattern::{
    ConfidenceBand, LearnInput, Pattern, PatternMetadata, PatternStatistics, PatternUpdate,
    RatioSample, SEED_CONFIDENCE,
};
pub use errors::{CacheError, StoreError, SuggestionError};
pub use store::{HistoricalCut, NoopCache, OrderHistory, PatternStore, SuggestionCache};
pub use suggestions::{
    CombinationProfile, CombinationSuggestion, ConfidenceScore, ContextQuery, LearnOutcome,
    ProductSuggestion,
    ProfileAlternative, ProfileSuggestion, QuantityPrediction, RatioSource, ScoreCalculator,
    ScoringWeights, SizeSuggestion, SmartApplyProfile, SmartApplyResult, SuggestionEngine,
    SuggestionResult,
};
