//! Composite pyramid score, ranking and tier assignment.
//!
//! Tier boundaries are relative: they come from each customer's rank within
//! the scored population, so adding or removing customers can move anyone.

use pyramid_core::error::{PyramidError, Result};
use pyramid_core::models::{CustomerFeatures, CutoffStrategy, ScoredCustomer, Segment, SegmentCount};
use serde::{Deserialize, Serialize};
use tracing::debug;

// ── Constants ─────────────────────────────────────────────────────────────────

/// Weight of `recency` (days since last purchase) in the composite score.
///
/// Positive: a customer silent for longer scores higher. This matches the
/// established behaviour of the pyramid score and is kept as is.
pub const RECENCY_WEIGHT: f64 = 0.15;
/// Weight of `frequency` in the composite score.
pub const FREQUENCY_WEIGHT: f64 = 0.28;
/// Weight of `monetary_value` in the composite score.
pub const MONETARY_WEIGHT: f64 = 0.57;

/// Share of the population in each tier, from the top of the pyramid down.
pub const PYRAMID_PROPORTIONS: [f64; 10] = [0.005, 0.015, 0.03, 0.05, 0.10, 0.15, 0.20, 0.15, 0.10, 0.20];

// ── Scoring primitives ────────────────────────────────────────────────────────

/// `0.15·recency + 0.28·frequency + 0.57·monetary_value`.
pub fn pyramid_score(features: &CustomerFeatures) -> f64 {
    RECENCY_WEIGHT * features.recency as f64
        + FREQUENCY_WEIGHT * features.frequency as f64
        + MONETARY_WEIGHT * features.monetary_value
}

/// Cumulative rank cutoffs for a population of `n` customers.
///
/// Each tier's share is floored on its own before summing, so the final
/// cutoff can fall short of `n`; the last tier absorbs the remainder.
pub fn cumulative_cutoffs(n: usize) -> [usize; 10] {
    let mut cutoffs = [0usize; 10];
    let mut running = 0usize;
    for (slot, proportion) in cutoffs.iter_mut().zip(PYRAMID_PROPORTIONS) {
        running += (proportion * n as f64).floor() as usize;
        *slot = running;
    }
    cutoffs
}

/// Tier index for the 0-based `rank` (0 = highest score) among `n` customers.
fn tier_index(rank: usize, n: usize, strategy: CutoffStrategy, cutoffs: &[usize; 10]) -> usize {
    match strategy {
        CutoffStrategy::FixedProportion => cutoffs[..9]
            .iter()
            .position(|&cutoff| rank < cutoff)
            .unwrap_or(9),
        CutoffStrategy::Decile => (rank * 10 / n).min(9),
    }
}

// ── ScoredTable ───────────────────────────────────────────────────────────────

/// Scored and segmented customers, ordered by descending pyramid score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoredTable {
    rows: Vec<ScoredCustomer>,
}

impl ScoredTable {
    /// Rows in rank order.
    pub fn rows(&self) -> &[ScoredCustomer] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<ScoredCustomer> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScoredCustomer> {
        self.rows.iter()
    }

    /// Row for `customer_id`, if scored.
    pub fn get(&self, customer_id: &str) -> Option<&ScoredCustomer> {
        self.rows.iter().find(|r| r.customer_id() == customer_id)
    }

    /// Segment of `customer_id`, if scored.
    pub fn segment_of(&self, customer_id: &str) -> Option<Segment> {
        self.get(customer_id).map(|r| r.segment)
    }

    /// Customer count per segment in pyramid order. Empty segments are left
    /// out.
    pub fn distribution(&self) -> Vec<SegmentCount> {
        let mut counts = [0usize; 10];
        for row in &self.rows {
            counts[row.segment.index()] += 1;
        }
        Segment::ALL
            .into_iter()
            .zip(counts)
            .filter(|(_, count)| *count > 0)
            .map(|(segment, no_of_customers)| SegmentCount {
                segment,
                no_of_customers,
            })
            .collect()
    }

    /// Members of `segment` in rank order; empty when the segment has none.
    pub fn find_customers(&self, segment: Segment) -> Vec<ScoredCustomer> {
        self.rows
            .iter()
            .filter(|r| r.segment == segment)
            .cloned()
            .collect()
    }

    /// Members of the segment labelled `label`. An unknown label matches no
    /// rows rather than failing.
    pub fn find_customers_by_label(&self, label: &str) -> Vec<ScoredCustomer> {
        match label.parse::<Segment>() {
            Ok(segment) => self.find_customers(segment),
            Err(_) => Vec::new(),
        }
    }
}

impl<'a> IntoIterator for &'a ScoredTable {
    type Item = &'a ScoredCustomer;
    type IntoIter = std::slice::Iter<'a, ScoredCustomer>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

// ── PyramidScorer ─────────────────────────────────────────────────────────────

/// Scores feature rows and cuts the ranking into the ten pyramid tiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct PyramidScorer {
    strategy: CutoffStrategy,
}

impl PyramidScorer {
    pub fn new(strategy: CutoffStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> CutoffStrategy {
        self.strategy
    }

    /// Score, rank and segment `features`.
    ///
    /// Ranking is a stable descending sort on the score, so equal scores keep
    /// the order of `features` (customer id order when it comes straight from
    /// the aggregator).
    pub fn score_and_segment(&self, features: &[CustomerFeatures]) -> Result<ScoredTable> {
        let n = features.len();
        if n == 0 {
            return Err(PyramidError::InsufficientData(
                "cannot rank an empty customer set".to_string(),
            ));
        }

        let mut scored: Vec<(f64, &CustomerFeatures)> =
            features.iter().map(|f| (pyramid_score(f), f)).collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        let cutoffs = cumulative_cutoffs(n);
        debug!(
            "Segmenting {} customers with {} cutoffs {:?}",
            n, self.strategy, cutoffs
        );

        let rows = scored
            .into_iter()
            .enumerate()
            .map(|(rank, (score, f))| {
                let tier = tier_index(rank, n, self.strategy, &cutoffs);
                ScoredCustomer {
                    features: f.clone(),
                    pyramid_score: score,
                    segment: Segment::from_index(tier).unwrap_or(Segment::Residual),
                }
            })
            .collect();

        Ok(ScoredTable { rows })
    }
}

// ── Public functions ──────────────────────────────────────────────────────────

/// Score and segment with the fixed-proportion pyramid cutoffs.
pub fn score_and_segment(features: &[CustomerFeatures]) -> Result<ScoredTable> {
    PyramidScorer::default().score_and_segment(features)
}

/// Customer count per non-empty segment.
pub fn segment_distribution(scored: &ScoredTable) -> Vec<SegmentCount> {
    scored.distribution()
}

/// Members of `segment`; empty when it has none.
pub fn find_customers(scored: &ScoredTable, segment: Segment) -> Vec<ScoredCustomer> {
    scored.find_customers(segment)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn features(id: &str, recency: i64, frequency: u64, monetary: f64) -> CustomerFeatures {
        CustomerFeatures {
            customer_id: id.to_string(),
            recency,
            frequency,
            monetary_value: monetary,
        }
    }

    /// `n` customers with strictly decreasing monetary value, so customer
    /// `c000` ranks first.
    fn population(n: usize) -> Vec<CustomerFeatures> {
        (0..n)
            .map(|i| features(&format!("c{:03}", i), 0, 1, (n - i) as f64 * 10.0))
            .collect()
    }

    fn count(dist: &[SegmentCount], segment: Segment) -> usize {
        dist.iter()
            .find(|d| d.segment == segment)
            .map(|d| d.no_of_customers)
            .unwrap_or(0)
    }

    // ── pyramid_score ─────────────────────────────────────────────────────────

    #[test]
    fn test_pyramid_score_weights() {
        let f = features("A", 10, 4, 100.0);
        // 1.5 + 1.12 + 57
        assert!((pyramid_score(&f) - 59.62).abs() < 1e-9);
    }

    #[test]
    fn test_higher_recency_raises_score() {
        let recent = features("A", 0, 1, 100.0);
        let lapsed = features("B", 30, 1, 100.0);
        assert!(pyramid_score(&lapsed) > pyramid_score(&recent));
    }

    // ── cumulative_cutoffs ────────────────────────────────────────────────────

    #[test]
    fn test_cutoffs_floor_each_share() {
        assert_eq!(cumulative_cutoffs(100), [0, 1, 4, 9, 19, 34, 54, 69, 79, 99]);
        assert_eq!(cumulative_cutoffs(10), [0, 0, 0, 0, 1, 2, 4, 5, 6, 8]);
        assert_eq!(
            cumulative_cutoffs(1000),
            [5, 20, 50, 100, 200, 350, 550, 700, 800, 1000]
        );
    }

    #[test]
    fn test_cutoffs_tiny_population_are_zero() {
        assert_eq!(cumulative_cutoffs(3), [0; 10]);
        assert_eq!(cumulative_cutoffs(0), [0; 10]);
    }

    #[test]
    fn test_cutoffs_non_decreasing() {
        for n in [1, 2, 7, 13, 57, 99, 100, 101, 333, 1234] {
            let c = cumulative_cutoffs(n);
            assert!(c.windows(2).all(|w| w[0] <= w[1]), "n = {n}: {c:?}");
            assert!(c[9] <= n);
        }
    }

    // ── score_and_segment ─────────────────────────────────────────────────────

    #[test]
    fn test_empty_features_is_insufficient_data() {
        assert!(matches!(
            score_and_segment(&[]),
            Err(PyramidError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_rows_sorted_by_score_descending() {
        let input = vec![
            features("low", 0, 1, 10.0),
            features("high", 0, 1, 500.0),
            features("mid", 0, 1, 100.0),
        ];
        let table = score_and_segment(&input).unwrap();
        let scores: Vec<f64> = table.iter().map(|r| r.pyramid_score).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(table.rows()[0].customer_id(), "high");
    }

    #[test]
    fn test_three_customers_all_land_in_last_tier() {
        let input = vec![
            features("A", 334, 1, 100.0),
            features("B", 183, 1, 150.0),
            features("C", 0, 1, 200.0),
        ];
        let table = score_and_segment(&input).unwrap();
        let dist = table.distribution();
        let total: usize = dist.iter().map(|d| d.no_of_customers).sum();
        assert_eq!(total, 3);
        assert_eq!(count(&dist, Segment::Residual), 3);
    }

    #[test]
    fn test_hundred_customers_distribution() {
        let table = score_and_segment(&population(100)).unwrap();
        let dist = table.distribution();

        assert_eq!(count(&dist, Segment::Platinum), 0);
        assert!(dist.iter().all(|d| d.segment != Segment::Platinum));
        assert_eq!(count(&dist, Segment::Gold), 1);
        assert_eq!(count(&dist, Segment::Silver), 3);
        assert_eq!(count(&dist, Segment::Bronze), 5);
        assert_eq!(count(&dist, Segment::Prime), 10);
        assert_eq!(count(&dist, Segment::Core), 15);
        assert_eq!(count(&dist, Segment::EntryLevel), 20);
        assert_eq!(count(&dist, Segment::LowContribution), 15);
        assert_eq!(count(&dist, Segment::MinimalValue), 10);
        // 20 by share plus the one customer the floors left over.
        assert_eq!(count(&dist, Segment::Residual), 21);
        assert_eq!(table.rows()[0].segment, Segment::Gold);
    }

    #[test]
    fn test_thousand_customers_top_tier() {
        let table = score_and_segment(&population(1000)).unwrap();
        let platinum = table.find_customers(Segment::Platinum);
        let ids: Vec<&str> = platinum.iter().map(|r| r.customer_id()).collect();
        assert_eq!(ids, vec!["c000", "c001", "c002", "c003", "c004"]);
        assert_eq!(table.segment_of("c005"), Some(Segment::Gold));
        assert_eq!(table.segment_of("c999"), Some(Segment::Residual));
    }

    #[test]
    fn test_segments_monotonic_in_rank() {
        let table = score_and_segment(&population(257)).unwrap();
        let tiers: Vec<usize> = table.iter().map(|r| r.segment.index()).collect();
        assert!(tiers.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_partition_is_total() {
        for n in [1, 2, 9, 10, 11, 99, 150] {
            let table = score_and_segment(&population(n)).unwrap();
            let total: usize = table.distribution().iter().map(|d| d.no_of_customers).sum();
            assert_eq!(total, n);
            assert!(!table.find_customers(Segment::Residual).is_empty());
        }
    }

    #[test]
    fn test_score_and_segment_is_idempotent() {
        let input = population(50);
        let first = score_and_segment(&input).unwrap();
        let second = score_and_segment(&input).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let input = vec![
            features("b", 0, 1, 10.0),
            features("a", 0, 1, 10.0),
            features("c", 0, 1, 10.0),
        ];
        let table = score_and_segment(&input).unwrap();
        let ids: Vec<&str> = table.iter().map(|r| r.customer_id()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    // ── decile strategy ───────────────────────────────────────────────────────

    #[test]
    fn test_decile_strategy_equal_buckets() {
        let table = PyramidScorer::new(CutoffStrategy::Decile)
            .score_and_segment(&population(100))
            .unwrap();
        let dist = table.distribution();
        assert_eq!(dist.len(), 10);
        assert!(dist.iter().all(|d| d.no_of_customers == 10));
    }

    #[test]
    fn test_decile_strategy_small_population() {
        let table = PyramidScorer::new(CutoffStrategy::Decile)
            .score_and_segment(&population(3))
            .unwrap();
        let segments: Vec<Segment> = table.iter().map(|r| r.segment).collect();
        // ranks 0, 1, 2 → tiers 0, 3, 6
        assert_eq!(
            segments,
            vec![Segment::Platinum, Segment::Bronze, Segment::EntryLevel]
        );
    }

    // ── lookups ───────────────────────────────────────────────────────────────

    #[test]
    fn test_find_customers_empty_segment() {
        let table = score_and_segment(&population(3)).unwrap();
        assert!(find_customers(&table, Segment::Platinum).is_empty());
    }

    #[test]
    fn test_find_customers_by_label() {
        let table = score_and_segment(&population(3)).unwrap();
        assert_eq!(table.find_customers_by_label("Residual Tier").len(), 3);
        assert!(table.find_customers_by_label("No Such Tier").is_empty());
    }

    #[test]
    fn test_segment_distribution_in_pyramid_order() {
        let table = score_and_segment(&population(100)).unwrap();
        let order: Vec<usize> = segment_distribution(&table)
            .iter()
            .map(|d| d.segment.index())
            .collect();
        assert!(order.windows(2).all(|w| w[0] < w[1]));
    }
}
