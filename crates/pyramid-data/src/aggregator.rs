//! Reduction of a raw transaction ledger into one recency / frequency /
//! monetary row per customer.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use pyramid_core::data_processors::{
    field, has_column, AmountProcessor, CustomerIdProcessor, TimestampProcessor,
};
use pyramid_core::error::{PyramidError, Result};
use pyramid_core::models::{CustomerFeatures, Transaction, TransactionSchema};
use serde_json::Value;
use tracing::debug;

// ── CustomerAccumulator ───────────────────────────────────────────────────────

/// Running per-customer totals while grouping the ledger.
#[derive(Debug, Clone)]
struct CustomerAccumulator {
    last_purchase: DateTime<Utc>,
    frequency: u64,
    monetary_value: f64,
}

impl CustomerAccumulator {
    fn new(txn: &Transaction) -> Self {
        Self {
            last_purchase: txn.timestamp,
            frequency: 0,
            monetary_value: 0.0,
        }
    }

    fn add(&mut self, txn: &Transaction) {
        self.last_purchase = self.last_purchase.max(txn.timestamp);
        self.frequency += 1;
        self.monetary_value += txn.amount;
    }
}

// ── FeatureAggregator ─────────────────────────────────────────────────────────

/// Turns ledger records addressed by a [`TransactionSchema`] into
/// [`CustomerFeatures`] rows.
#[derive(Debug, Clone)]
pub struct FeatureAggregator {
    schema: TransactionSchema,
    drop_duplicates: bool,
}

impl FeatureAggregator {
    /// Aggregator that drops exact duplicate transactions.
    pub fn new(schema: TransactionSchema) -> Self {
        Self {
            schema,
            drop_duplicates: true,
        }
    }

    /// Choose whether identical transactions are kept once or every time.
    pub fn drop_duplicates(mut self, drop: bool) -> Self {
        self.drop_duplicates = drop;
        self
    }

    pub fn schema(&self) -> &TransactionSchema {
        &self.schema
    }

    /// Check that every column the aggregation reads exists in the input.
    ///
    /// A column counts as present when at least one record carries the key,
    /// even with a `null` value. An empty input passes.
    pub fn validate(&self, records: &[Value]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        for key in [
            &self.schema.customer_key,
            &self.schema.timestamp_key,
            &self.schema.amount_key,
        ] {
            if !has_column(records, key) {
                return Err(PyramidError::Data(format!(
                    "column '{}' not found in input records",
                    key
                )));
            }
        }
        Ok(())
    }

    /// Validate, filter and coerce `records` into typed transactions.
    ///
    /// Records without a customer or an amount are silently skipped. Any
    /// surviving value that cannot be coerced fails the whole call.
    pub fn clean(&self, records: &[Value]) -> Result<Vec<Transaction>> {
        self.validate(records)?;

        let schema = &self.schema;
        let mut cleaned = Vec::with_capacity(records.len());
        let mut seen: HashSet<(String, i64, u64)> = HashSet::new();
        let mut skipped_missing = 0usize;
        let mut skipped_duplicate = 0usize;

        for record in records {
            let raw_customer = field(record, &schema.customer_key);
            let raw_amount = field(record, &schema.amount_key);
            if raw_customer.is_none() || raw_amount.is_none() {
                skipped_missing += 1;
                continue;
            }

            let customer = CustomerIdProcessor::coerce(&schema.customer_key, raw_customer)?;
            let amount = AmountProcessor::coerce(&schema.amount_key, raw_amount)?;
            let (Some(customer_id), Some(amount)) = (customer, amount) else {
                skipped_missing += 1;
                continue;
            };
            let timestamp =
                TimestampProcessor::coerce(&schema.timestamp_key, field(record, &schema.timestamp_key))?;

            if self.drop_duplicates {
                let key = (
                    customer_id.clone(),
                    timestamp.timestamp_micros(),
                    amount.to_bits(),
                );
                if !seen.insert(key) {
                    skipped_duplicate += 1;
                    continue;
                }
            }

            cleaned.push(Transaction {
                customer_id,
                timestamp,
                amount,
            });
        }

        debug!(
            "Cleaned {} of {} records ({} missing customer/amount, {} duplicates)",
            cleaned.len(),
            records.len(),
            skipped_missing,
            skipped_duplicate
        );

        Ok(cleaned)
    }

    /// Clean `records` and aggregate them per customer.
    pub fn aggregate(&self, records: &[Value]) -> Result<Vec<CustomerFeatures>> {
        let transactions = self.clean(records)?;
        Ok(aggregate_transactions(&transactions))
    }
}

// ── Public functions ──────────────────────────────────────────────────────────

/// Aggregate raw ledger records into one feature row per customer, dropping
/// exact duplicate transactions.
///
/// Rows come back ordered by customer id.
pub fn aggregate(records: &[Value], schema: &TransactionSchema) -> Result<Vec<CustomerFeatures>> {
    FeatureAggregator::new(schema.clone()).aggregate(records)
}

/// Group already-cleaned transactions by customer.
///
/// Recency is measured against the latest timestamp in the whole slice, not
/// each customer's own. Rows come back ordered by customer id; an empty slice
/// gives an empty table.
pub fn aggregate_transactions(transactions: &[Transaction]) -> Vec<CustomerFeatures> {
    let Some(reference) = transactions.iter().map(|t| t.timestamp).max() else {
        return Vec::new();
    };

    let mut groups: BTreeMap<&str, CustomerAccumulator> = BTreeMap::new();
    for txn in transactions {
        groups
            .entry(txn.customer_id.as_str())
            .or_insert_with(|| CustomerAccumulator::new(txn))
            .add(txn);
    }

    groups
        .into_iter()
        .map(|(customer_id, acc)| CustomerFeatures {
            customer_id: customer_id.to_string(),
            // num_days truncates toward zero.
            recency: (reference - acc.last_purchase).num_days(),
            frequency: acc.frequency,
            monetary_value: acc.monetary_value,
        })
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
