use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PyramidError;

// ── TransactionSchema ─────────────────────────────────────────────────────────

/// Column names used to address fields inside heterogeneous ledger records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSchema {
    /// Key holding the customer identifier.
    pub customer_key: String,
    /// Key holding the transaction date/time.
    pub timestamp_key: String,
    /// Key holding the transaction amount.
    pub amount_key: String,
    /// Key holding the unit price (price corridor and elasticity only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_key: Option<String>,
    /// Key holding the purchased quantity (elasticity only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity_key: Option<String>,
}

impl TransactionSchema {
    /// Schema for the three columns the feature aggregator needs.
    pub fn new(
        customer_key: impl Into<String>,
        timestamp_key: impl Into<String>,
        amount_key: impl Into<String>,
    ) -> Self {
        Self {
            customer_key: customer_key.into(),
            timestamp_key: timestamp_key.into(),
            amount_key: amount_key.into(),
            price_key: None,
            quantity_key: None,
        }
    }

    /// Attach the unit-price column.
    pub fn with_price(mut self, price_key: impl Into<String>) -> Self {
        self.price_key = Some(price_key.into());
        self
    }

    /// Attach the quantity column.
    pub fn with_quantity(mut self, quantity_key: impl Into<String>) -> Self {
        self.quantity_key = Some(quantity_key.into());
        self
    }

    /// The price column, or a configuration error when none was set.
    pub fn require_price_key(&self) -> Result<&str, PyramidError> {
        self.price_key
            .as_deref()
            .ok_or_else(|| PyramidError::Config("schema has no price column".to_string()))
    }

    /// The quantity column, or a configuration error when none was set.
    pub fn require_quantity_key(&self) -> Result<&str, PyramidError> {
        self.quantity_key
            .as_deref()
            .ok_or_else(|| PyramidError::Config("schema has no quantity column".to_string()))
    }
}

impl Default for TransactionSchema {
    fn default() -> Self {
        Self::new("customer_id", "transaction_date", "amount")
    }
}

// ── Transaction ───────────────────────────────────────────────────────────────

/// A ledger record after null filtering and type coercion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub customer_id: String,
    pub timestamp: DateTime<Utc>,
    pub amount: f64,
}

// ── CustomerFeatures ──────────────────────────────────────────────────────────

/// One aggregated row per customer: recency, frequency and monetary value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerFeatures {
    pub customer_id: String,
    /// Whole days between the ledger-wide latest transaction and this
    /// customer's latest transaction. Never negative.
    pub recency: i64,
    /// Number of cleaned transactions. At least 1.
    pub frequency: u64,
    /// Sum of transaction amounts.
    pub monetary_value: f64,
}

// ── Segment ───────────────────────────────────────────────────────────────────

/// The ten value tiers of the customer pyramid, ordered from the most to the
/// least valuable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Segment {
    #[serde(rename = "Platinum Tier")]
    Platinum,
    #[serde(rename = "Gold Tier")]
    Gold,
    #[serde(rename = "Silver Tier")]
    Silver,
    #[serde(rename = "Bronze Tier")]
    Bronze,
    #[serde(rename = "Prime Clients")]
    Prime,
    #[serde(rename = "Core Clients")]
    Core,
    #[serde(rename = "Entry-Level Clients")]
    EntryLevel,
    #[serde(rename = "Low Contribution")]
    LowContribution,
    #[serde(rename = "Minimal Value")]
    MinimalValue,
    #[serde(rename = "Residual Tier")]
    Residual,
}

impl Segment {
    /// Every tier in pyramid order (index 0 is the top).
    pub const ALL: [Segment; 10] = [
        Segment::Platinum,
        Segment::Gold,
        Segment::Silver,
        Segment::Bronze,
        Segment::Prime,
        Segment::Core,
        Segment::EntryLevel,
        Segment::LowContribution,
        Segment::MinimalValue,
        Segment::Residual,
    ];

    /// Position of the tier in the pyramid (0 = top).
    pub fn index(self) -> usize {
        self as usize
    }

    /// Tier at `index`, or `None` past the bottom of the pyramid.
    pub fn from_index(index: usize) -> Option<Segment> {
        Self::ALL.get(index).copied()
    }

    /// Display label.
    pub fn label(self) -> &'static str {
        match self {
            Segment::Platinum => "Platinum Tier",
            Segment::Gold => "Gold Tier",
            Segment::Silver => "Silver Tier",
            Segment::Bronze => "Bronze Tier",
            Segment::Prime => "Prime Clients",
            Segment::Core => "Core Clients",
            Segment::EntryLevel => "Entry-Level Clients",
            Segment::LowContribution => "Low Contribution",
            Segment::MinimalValue => "Minimal Value",
            Segment::Residual => "Residual Tier",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Segment {
    type Err = PyramidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Segment::ALL
            .into_iter()
            .find(|seg| seg.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| PyramidError::NotFound(format!("segment '{}'", wanted)))
    }
}

// ── ScoredCustomer ────────────────────────────────────────────────────────────

/// A [`CustomerFeatures`] row extended with its composite score and tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCustomer {
    #[serde(flatten)]
    pub features: CustomerFeatures,
    pub pyramid_score: f64,
    pub segment: Segment,
}

impl ScoredCustomer {
    pub fn customer_id(&self) -> &str {
        &self.features.customer_id
    }
}

// ── SegmentCount ──────────────────────────────────────────────────────────────

/// Number of customers assigned to one segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentCount {
    pub segment: Segment,
    pub no_of_customers: usize,
}

// ── CutoffStrategy ────────────────────────────────────────────────────────────

/// How ranked customers are split into the ten tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CutoffStrategy {
    /// Floored cumulative counts of the fixed pyramid proportions; the last
    /// tier absorbs every rank past the ninth cutoff.
    #[default]
    FixedProportion,
    /// Ten equal-count rank deciles.
    Decile,
}

impl fmt::Display for CutoffStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CutoffStrategy::FixedProportion => f.write_str("fixed_proportion"),
            CutoffStrategy::Decile => f.write_str("decile"),
        }
    }
}

impl FromStr for CutoffStrategy {
    type Err = PyramidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "fixed_proportion" | "pyramid" => Ok(CutoffStrategy::FixedProportion),
            "decile" => Ok(CutoffStrategy::Decile),
            other => Err(PyramidError::Config(format!(
                "unknown cutoff strategy: {}",
                other
            ))),
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
