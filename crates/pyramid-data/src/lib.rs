//! Scoring-and-segmentation pipeline.
//!
//! Loads ledger records, aggregates them into per-customer recency,
//! frequency and monetary features, scores and ranks customers, and assigns
//! the ten pyramid tiers.

pub mod aggregator;
pub mod analysis;
pub mod reader;
pub mod scorer;

pub use aggregator::{aggregate, aggregate_transactions, FeatureAggregator};
pub use analysis::{analyze, AnalysisMetadata, PyramidAnalysis};
pub use scorer::{find_customers, score_and_segment, segment_distribution, PyramidScorer, ScoredTable};

pub use pyramid_core as core;
