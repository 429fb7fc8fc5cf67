//! End-to-end segmentation pipeline.
//!
//! Runs aggregation, scoring and the segment distribution in sequence,
//! returning a [`PyramidAnalysis`] with the tables and run metadata.

use chrono::Utc;
use pyramid_core::error::Result;
use pyramid_core::models::{CutoffStrategy, SegmentCount};
use pyramid_core::settings::PyramidConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::aggregator::{aggregate_transactions, FeatureAggregator};
use crate::scorer::{PyramidScorer, ScoredTable};

// ── Public types ──────────────────────────────────────────────────────────────

/// Metadata produced alongside the analysis result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    /// ISO-8601 timestamp when this result was generated.
    pub generated_at: String,
    /// Records handed to the pipeline.
    pub records_read: usize,
    /// Transactions left after null filtering and duplicate removal.
    pub transactions_kept: usize,
    /// Distinct customers scored.
    pub customers: usize,
    /// Cutoff strategy used for the tiers.
    pub cutoff_strategy: CutoffStrategy,
    /// Wall-clock seconds spent cleaning and aggregating.
    pub aggregate_time_seconds: f64,
    /// Wall-clock seconds spent scoring and segmenting.
    pub score_time_seconds: f64,
}

/// The complete output of [`analyze`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PyramidAnalysis {
    /// Scored customers in rank order.
    pub scored: ScoredTable,
    /// Customers per non-empty segment.
    pub distribution: Vec<SegmentCount>,
    /// Metadata about this run.
    pub metadata: AnalysisMetadata,
}

// ── Public function ───────────────────────────────────────────────────────────

/// Run the full segmentation pipeline over raw ledger `records`.
///
/// 1. Validate the schema and clean the records.
/// 2. Aggregate per-customer recency, frequency and monetary value.
/// 3. Score, rank and assign tiers.
/// 4. Count customers per segment.
///
/// Fails on a missing column, an uncoercible value, or when no customer
/// survives cleaning.
pub fn analyze(records: &[Value], config: &PyramidConfig) -> Result<PyramidAnalysis> {
    // ── Step 1–2: Aggregate ───────────────────────────────────────────────────
    let aggregate_start = std::time::Instant::now();
    let aggregator =
        FeatureAggregator::new(config.schema.clone()).drop_duplicates(config.drop_duplicates);
    let transactions = aggregator.clean(records)?;
    let features = aggregate_transactions(&transactions);
    let aggregate_time = aggregate_start.elapsed().as_secs_f64();

    // ── Step 3: Score ─────────────────────────────────────────────────────────
    let score_start = std::time::Instant::now();
    let scored = PyramidScorer::new(config.cutoff_strategy).score_and_segment(&features)?;
    let score_time = score_start.elapsed().as_secs_f64();

    // ── Step 4: Distribution ──────────────────────────────────────────────────
    let distribution = scored.distribution();

    info!(
        "Segmented {} customers from {} transactions ({} records read)",
        scored.len(),
        transactions.len(),
        records.len()
    );

    let metadata = AnalysisMetadata {
        generated_at: Utc::now().to_rfc3339(),
        records_read: records.len(),
        transactions_kept: transactions.len(),
        customers: scored.len(),
        cutoff_strategy: config.cutoff_strategy,
        aggregate_time_seconds: aggregate_time,
        score_time_seconds: score_time,
    };

    Ok(PyramidAnalysis {
        scored,
        distribution,
        metadata,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pyramid_core::error::PyramidError;
    use pyramid_core::models::Segment;
    use serde_json::json;

    fn ledger(customers: usize) -> Vec<Value> {
        let mut records = Vec::new();
        for c in 0..customers {
            for t in 0..=(c % 3) {
                records.push(json!({
                    "customer_id": format!("cust-{c}"),
                    "transaction_date": format!("2024-03-{:02}", 1 + (c + t) % 28),
                    "amount": 10.0 * (c + 1) as f64,
                }));
            }
        }
        records
    }

    #[test]
    fn test_analyze_counts_add_up() {
        let records = ledger(40);
        let result = analyze(&records, &PyramidConfig::default()).unwrap();

        assert_eq!(result.metadata.records_read, records.len());
        assert_eq!(result.metadata.customers, 40);
        assert_eq!(result.scored.len(), 40);

        let total: usize = result.distribution.iter().map(|d| d.no_of_customers).sum();
        assert_eq!(total, 40);

        let frequency: u64 = result.scored.iter().map(|r| r.features.frequency).sum();
        assert_eq!(frequency as usize, result.metadata.transactions_kept);
    }

    #[test]
    fn test_analyze_respects_strategy() {
        let config = PyramidConfig {
            cutoff_strategy: CutoffStrategy::Decile,
            ..Default::default()
        };
        let result = analyze(&ledger(20), &config).unwrap();
        assert_eq!(result.metadata.cutoff_strategy, CutoffStrategy::Decile);
        assert_eq!(result.distribution.len(), 10);
        assert!(result.distribution.iter().all(|d| d.no_of_customers == 2));
    }

    #[test]
    fn test_analyze_drops_duplicates_per_config() {
        let record = json!({"customer_id": "A", "transaction_date": "2024-01-01", "amount": 5});
        let records = vec![record.clone(), record];

        let kept_once = analyze(&records, &PyramidConfig::default()).unwrap();
        assert_eq!(kept_once.metadata.transactions_kept, 1);

        let config = PyramidConfig {
            drop_duplicates: false,
            ..Default::default()
        };
        let kept_both = analyze(&records, &config).unwrap();
        assert_eq!(kept_both.metadata.transactions_kept, 2);
    }

    #[test]
    fn test_analyze_empty_ledger_is_insufficient_data() {
        assert!(matches!(
            analyze(&[], &PyramidConfig::default()),
            Err(PyramidError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_analyze_all_records_filtered_is_insufficient_data() {
        let records = vec![json!({"customer_id": null, "transaction_date": "2024-01-01", "amount": 1})];
        assert!(matches!(
            analyze(&records, &PyramidConfig::default()),
            Err(PyramidError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_analysis_serializes_to_json() {
        let result = analyze(&ledger(3), &PyramidConfig::default()).unwrap();
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["scored"].as_array().unwrap().len(), 3);
        assert_eq!(value["distribution"][0]["segment"], Segment::Residual.label());
        assert_eq!(value["metadata"]["cutoff_strategy"], "fixed_proportion");
    }
}
