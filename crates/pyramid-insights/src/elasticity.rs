//! Price elasticity of demand per customer.

use pyramid_core::data_processors::{field, AmountProcessor, CustomerIdProcessor};
use pyramid_core::error::{PyramidError, Result};
use pyramid_core::models::TransactionSchema;
use pyramid_core::stats::{mean, pct_change};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// One observed (price, quantity) pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub price: f64,
    pub quantity: f64,
}

/// Elasticity from a customer's price points.
///
/// Points are ordered by price (stable for equal prices); the result is the
/// mean percent change in quantity divided by the mean percent change in
/// price across consecutive points. Steps starting from a zero price or
/// quantity have no defined percent change and are skipped.
///
/// Needs at least two distinct prices.
pub fn elasticity(points: &[PricePoint]) -> Result<f64> {
    let mut sorted = points.to_vec();
    sorted.sort_by(|a, b| a.price.total_cmp(&b.price));

    let distinct_prices = sorted
        .windows(2)
        .filter(|w| w[0].price != w[1].price)
        .count()
        + usize::from(!sorted.is_empty());
    if distinct_prices < 2 {
        return Err(PyramidError::InsufficientData(format!(
            "elasticity needs at least two distinct prices, found {}",
            distinct_prices
        )));
    }

    let (price_changes, quantity_changes): (Vec<f64>, Vec<f64>) = sorted
        .windows(2)
        .filter_map(|w| {
            let dp = pct_change(w[0].price, w[1].price)?;
            let dq = pct_change(w[0].quantity, w[1].quantity)?;
            Some((dp, dq))
        })
        .unzip();

    match (mean(&quantity_changes), mean(&price_changes)) {
        (Some(dq), Some(dp)) if dp != 0.0 => Ok(dq / dp),
        _ => Err(PyramidError::InsufficientData(
            "no defined price change between consecutive price points".to_string(),
        )),
    }
}

// ── PriceElasticity ───────────────────────────────────────────────────────────

/// Computes elasticity for a single customer from raw ledger records.
#[derive(Debug, Clone)]
pub struct PriceElasticity {
    schema: TransactionSchema,
}

impl PriceElasticity {
    /// Fails with a configuration error unless the schema names both a price
    /// and a quantity column.
    pub fn new(schema: TransactionSchema) -> Result<Self> {
        schema.require_price_key()?;
        schema.require_quantity_key()?;
        Ok(Self { schema })
    }

    /// Price points of `customer_id`. Records missing either value are
    /// skipped.
    pub fn price_points(&self, records: &[Value], customer_id: &str) -> Result<Vec<PricePoint>> {
        let price_key = self.schema.require_price_key()?;
        let quantity_key = self.schema.require_quantity_key()?;
        let wanted = CustomerIdProcessor::normalize(customer_id.trim());

        let mut points = Vec::new();
        for record in records {
            let id = CustomerIdProcessor::coerce(
                &self.schema.customer_key,
                field(record, &self.schema.customer_key),
            )?;
            if id.as_deref() != Some(wanted.as_str()) {
                continue;
            }
            let price = AmountProcessor::coerce(price_key, field(record, price_key))?;
            let quantity = AmountProcessor::coerce(quantity_key, field(record, quantity_key))?;
            if let (Some(price), Some(quantity)) = (price, quantity) {
                points.push(PricePoint { price, quantity });
            }
        }
        Ok(points)
    }

    /// Elasticity for `customer_id`.
    ///
    /// A customer with fewer than two distinct prices, including an unknown
    /// customer, is [`PyramidError::InsufficientData`].
    pub fn calculate(&self, records: &[Value], customer_id: &str) -> Result<f64> {
        let points = self.price_points(records, customer_id)?;
        debug!("Customer {} has {} price points", customer_id, points.len());
        elasticity(&points)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
