//! Per-customer insights built on top of the ledger and the scored table:
//! price elasticity, price corridors and churn prediction.

pub mod churn;
pub mod corridor;
pub mod elasticity;

pub use churn::{
    customer_feature_vector, detect_warning_signs, ChurnConfig, ChurnModel, PeriodActivity,
    TrainingReport, WarningSigns,
};
pub use corridor::{GroupPriceCorridor, PriceCorridor, PriceRange};
pub use elasticity::{elasticity, PriceElasticity, PricePoint};
