//! Price corridors: the range of prices a customer, or a segment of
//! comparable customers, has accepted.

use std::collections::HashMap;

use pyramid_core::data_processors::{field, AmountProcessor, CustomerIdProcessor};
use pyramid_core::error::{PyramidError, Result};
use pyramid_core::models::{Segment, TransactionSchema};
use pyramid_core::stats::iqr_fence;
use pyramid_data::ScoredTable;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Lowest and highest accepted price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min_price: f64,
    pub max_price: f64,
}

impl PriceRange {
    /// Range spanned by `prices`, or `None` when there are none.
    pub fn from_prices(prices: &[f64]) -> Option<Self> {
        let mut iter = prices.iter().copied();
        let first = iter.next()?;
        let (min_price, max_price) = iter.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p)));
        Some(Self {
            min_price,
            max_price,
        })
    }

    pub fn contains(&self, price: f64) -> bool {
        (self.min_price..=self.max_price).contains(&price)
    }
}

/// Coerced price of `record`, or `None` when the cell is empty.
fn record_price(record: &Value, price_key: &str) -> Result<Option<f64>> {
    AmountProcessor::coerce(price_key, field(record, price_key))
}

fn record_customer(record: &Value, schema: &TransactionSchema) -> Result<Option<String>> {
    CustomerIdProcessor::coerce(&schema.customer_key, field(record, &schema.customer_key))
}

// ── PriceCorridor ─────────────────────────────────────────────────────────────

/// Price corridor of a single customer.
#[derive(Debug, Clone)]
pub struct PriceCorridor {
    schema: TransactionSchema,
}

impl PriceCorridor {
    /// Fails with a configuration error unless the schema names a price
    /// column.
    pub fn new(schema: TransactionSchema) -> Result<Self> {
        schema.require_price_key()?;
        Ok(Self { schema })
    }

    /// Minimum and maximum price paid by `customer_id`.
    ///
    /// [`PyramidError::NotFound`] when the customer has no priced
    /// transaction.
    pub fn price_range(&self, records: &[Value], customer_id: &str) -> Result<PriceRange> {
        let price_key = self.schema.require_price_key()?;
        let wanted = CustomerIdProcessor::normalize(customer_id.trim());

        let mut prices = Vec::new();
        for record in records {
            if record_customer(record, &self.schema)?.as_deref() != Some(wanted.as_str()) {
                continue;
            }
            if let Some(price) = record_price(record, price_key)? {
                prices.push(price);
            }
        }

        PriceRange::from_prices(&prices).ok_or_else(|| {
            PyramidError::NotFound(format!("no transactions for customer '{}'", customer_id))
        })
    }
}

// ── GroupPriceCorridor ────────────────────────────────────────────────────────

/// Price corridor of a segment, with IQR outliers removed.
#[derive(Debug, Clone)]
pub struct GroupPriceCorridor {
    schema: TransactionSchema,
    segment_key: String,
}

impl GroupPriceCorridor {
    /// `segment_key` names the record column holding the segment label; it is
    /// only read by [`price_range`](Self::price_range).
    pub fn new(schema: TransactionSchema, segment_key: impl Into<String>) -> Result<Self> {
        schema.require_price_key()?;
        Ok(Self {
            schema,
            segment_key: segment_key.into(),
        })
    }

    /// Corridor of the records whose segment column equals `segment`.
    ///
    /// [`PyramidError::NotFound`] when no priced record is in the segment.
    pub fn price_range(&self, records: &[Value], segment: &str) -> Result<PriceRange> {
        let price_key = self.schema.require_price_key()?;
        let wanted = segment.trim();

        let mut prices = Vec::new();
        for record in records {
            let in_segment = field(record, &self.segment_key)
                .and_then(Value::as_str)
                .is_some_and(|s| s.trim() == wanted);
            if !in_segment {
                continue;
            }
            if let Some(price) = record_price(record, price_key)? {
                prices.push(price);
            }
        }

        self.fenced_range(&prices, wanted)
    }

    /// Corridor of `segment`, resolving each record's segment through the
    /// customer's row in `scored`. Records of unscored customers are ignored.
    pub fn price_range_for_segment(
        &self,
        records: &[Value],
        scored: &ScoredTable,
        segment: Segment,
    ) -> Result<PriceRange> {
        let price_key = self.schema.require_price_key()?;
        let membership: HashMap<&str, Segment> = scored
            .iter()
            .map(|row| (row.customer_id(), row.segment))
            .collect();

        let mut prices = Vec::new();
        for record in records {
            let Some(customer) = record_customer(record, &self.schema)? else {
                continue;
            };
            if membership.get(customer.as_str()) != Some(&segment) {
                continue;
            }
            if let Some(price) = record_price(record, price_key)? {
                prices.push(price);
            }
        }

        self.fenced_range(&prices, segment.label())
    }

    fn fenced_range(&self, prices: &[f64], segment: &str) -> Result<PriceRange> {
        let not_found = || PyramidError::NotFound(format!("no customers in segment '{}'", segment));

        let (lower, upper) = iqr_fence(prices).ok_or_else(not_found)?;
        let kept: Vec<f64> = prices
            .iter()
            .copied()
            .filter(|p| (lower..=upper).contains(p))
            .collect();

        debug!(
            "Segment '{}': kept {} of {} prices inside [{}, {}]",
            segment,
            kept.len(),
            prices.len(),
            lower,
            upper
        );

        PriceRange::from_prices(&kept).ok_or_else(not_found)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
