//! Shared foundation for the pyramid-score crates.
//!
//! Holds the error taxonomy, the record and table row types, value coercion
//! for heterogeneous ledger records, descriptive statistics, configuration
//! and report formatting.

pub mod data_processors;
pub mod error;
pub mod formatting;
pub mod models;
pub mod settings;
pub mod stats;

pub use error::{PyramidError, Result};
pub use models::{
    CustomerFeatures, CutoffStrategy, ScoredCustomer, Segment, SegmentCount, Transaction,
    TransactionSchema,
};
pub use settings::PyramidConfig;
