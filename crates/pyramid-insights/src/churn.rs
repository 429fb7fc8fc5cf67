//! Churn prediction.
//!
//! A logistic-regression classifier over customer features, plus a simple
//! rule that flags sharp period-over-period drops in activity.

use std::fmt;

use linfa::prelude::*;
use linfa_logistic::{FittedLogisticRegression, LogisticRegression};
use linfa_preprocessing::linear_scaling::LinearScaler;
use ndarray::{Array1, Array2};
use pyramid_core::error::{PyramidError, Result};
use pyramid_core::models::CustomerFeatures;
use pyramid_core::stats::pct_change;
use rand::SeedableRng;
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Relative change below which a period-over-period move counts as a drop
/// (a fall of more than half).
pub const DROP_THRESHOLD: f64 = -0.5;

// ── ChurnConfig ───────────────────────────────────────────────────────────────

/// Training parameters for [`ChurnModel`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChurnConfig {
    /// Share of rows held out for evaluation.
    pub test_size: f32,
    /// Seed for the train/test shuffle.
    pub seed: u64,
    /// Optimiser iteration cap.
    pub max_iterations: u64,
    /// L2 penalty on the weights.
    pub l2_penalty: f64,
}

impl Default for ChurnConfig {
    fn default() -> Self {
        Self {
            test_size: 0.3,
            seed: 42,
            max_iterations: 100,
            l2_penalty: 1.0,
        }
    }
}

// ── TrainingReport ────────────────────────────────────────────────────────────

/// Held-out evaluation of a freshly trained model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Fraction of held-out rows classified correctly.
    pub accuracy: f64,
    /// Per-class precision / recall / F1 / support table.
    pub report: String,
    pub train_size: usize,
    pub test_size: usize,
}

// ── Fitted parameters ─────────────────────────────────────────────────────────

struct FittedModel {
    scaler: LinearScaler<f64>,
    classifier: FittedLogisticRegression<f64, bool>,
    /// Whether the classifier's positive class is the `true` (churned) label.
    churn_is_positive: bool,
    width: usize,
}

impl fmt::Debug for FittedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FittedModel")
            .field("width", &self.width)
            .field("churn_is_positive", &self.churn_is_positive)
            .finish_non_exhaustive()
    }
}

impl FittedModel {
    fn churn_probabilities(&self, records: Array2<f64>) -> Array1<f64> {
        let scaled = self.scaler.transform(records);
        let positive = self.classifier.predict_probabilities(&scaled);
        if self.churn_is_positive {
            positive
        } else {
            positive.mapv(|p| 1.0 - p)
        }
    }
}

fn model_error(err: impl fmt::Display) -> PyramidError {
    PyramidError::Model(err.to_string())
}

fn to_records(rows: &[Vec<f64>]) -> Result<Array2<f64>> {
    let width = rows.first().map_or(0, Vec::len);
    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    Array2::from_shape_vec((rows.len(), width), flat).map_err(|e| PyramidError::Data(e.to_string()))
}

// ── ChurnModel ────────────────────────────────────────────────────────────────

/// Binary churn classifier. Untrained until [`train`](Self::train) succeeds.
#[derive(Debug, Default)]
pub struct ChurnModel {
    config: ChurnConfig,
    fitted: Option<FittedModel>,
}

impl ChurnModel {
    pub fn new(config: ChurnConfig) -> Self {
        Self {
            config,
            fitted: None,
        }
    }

    pub fn is_trained(&self) -> bool {
        self.fitted.is_some()
    }

    /// Fit on `features` (one row per customer) and boolean churn `labels`.
    ///
    /// Rows are shuffled with the configured seed and split into train and
    /// test sets; features are standardised on the train part, the model is
    /// fitted there and scored on the test part.
    pub fn train(&mut self, features: &[Vec<f64>], labels: &[bool]) -> Result<TrainingReport> {
        validate_training_input(features, labels)?;
        let width = features[0].len();

        let dataset = Dataset::new(to_records(features)?, Array1::from(labels.to_vec()));
        let mut rng = Pcg64::seed_from_u64(self.config.seed);
        let (train, test) = dataset
            .shuffle(&mut rng)
            .split_with_ratio(1.0 - self.config.test_size);

        if test.nsamples() == 0 {
            return Err(PyramidError::InsufficientData(
                "too few rows to hold out a test split".to_string(),
            ));
        }
        let train_targets = train.targets();
        if train_targets.iter().all(|&y| y == train_targets[0]) {
            return Err(PyramidError::InsufficientData(
                "training split contains a single churn class".to_string(),
            ));
        }

        let scaler = LinearScaler::standard().fit(&train).map_err(model_error)?;
        let train = scaler.transform(train);
        let test = scaler.transform(test);

        let classifier = LogisticRegression::default()
            .alpha(self.config.l2_penalty)
            .max_iterations(self.config.max_iterations)
            .fit(&train)
            .map_err(model_error)?;

        // Orient the positive-class probability using the most confident
        // training row.
        let train_probs = classifier.predict_probabilities(train.records());
        let train_pred: Array1<bool> = classifier.predict(train.records());
        let anchor = (0..train_probs.len())
            .max_by(|&a, &b| {
                (train_probs[a] - 0.5)
                    .abs()
                    .total_cmp(&(train_probs[b] - 0.5).abs())
            })
            .unwrap_or(0);
        let churn_is_positive = (train_probs[anchor] >= 0.5) == train_pred[anchor];

        let y_pred: Array1<bool> = classifier.predict(test.records());
        let y_true: Vec<bool> = test.targets().iter().copied().collect();
        let y_pred: Vec<bool> = y_pred.to_vec();
        let correct = y_true.iter().zip(&y_pred).filter(|(t, p)| t == p).count();
        let accuracy = correct as f64 / y_true.len() as f64;

        info!(
            "Trained churn model on {} rows, held-out accuracy {:.3}",
            train.nsamples(),
            accuracy
        );
        debug!(
            "Churn coefficients {:?}, intercept {:.4}",
            classifier.params(),
            classifier.intercept()
        );

        let report = TrainingReport {
            accuracy,
            report: classification_report(&y_true, &y_pred),
            train_size: train.nsamples(),
            test_size: y_true.len(),
        };
        self.fitted = Some(FittedModel {
            scaler,
            classifier,
            churn_is_positive,
            width,
        });
        Ok(report)
    }

    /// Churn probability in `[0, 1]` for one feature row.
    pub fn predict_probability(&self, row: &[f64]) -> Result<f64> {
        let fitted = self.fitted.as_ref().ok_or(PyramidError::NotTrained)?;
        if row.len() != fitted.width {
            return Err(PyramidError::Data(format!(
                "expected {} features, got {}",
                fitted.width,
                row.len()
            )));
        }
        let records = to_records(&[row.to_vec()])?;
        Ok(fitted.churn_probabilities(records)[0])
    }

    /// Churn probability for an aggregated customer row, using
    /// [`customer_feature_vector`] as the feature layout.
    pub fn predict_customer(&self, customer: &CustomerFeatures) -> Result<f64> {
        self.predict_probability(&customer_feature_vector(customer))
    }
}

/// `[recency, frequency, monetary_value]`.
pub fn customer_feature_vector(customer: &CustomerFeatures) -> Vec<f64> {
    vec![
        customer.recency as f64,
        customer.frequency as f64,
        customer.monetary_value,
    ]
}

fn validate_training_input(features: &[Vec<f64>], labels: &[bool]) -> Result<()> {
    if features.len() != labels.len() {
        return Err(PyramidError::Data(format!(
            "{} feature rows but {} labels",
            features.len(),
            labels.len()
        )));
    }
    if features.len() < 2 {
        return Err(PyramidError::InsufficientData(
            "churn training needs at least two rows".to_string(),
        ));
    }
    let width = features[0].len();
    if width == 0 || features.iter().any(|row| row.len() != width) {
        return Err(PyramidError::Data(
            "feature rows must be non-empty and equally long".to_string(),
        ));
    }
    if labels.iter().all(|&y| y == labels[0]) {
        return Err(PyramidError::InsufficientData(
            "churn labels contain a single class".to_string(),
        ));
    }
    Ok(())
}

// ── classification_report ─────────────────────────────────────────────────────

struct ClassScores {
    precision: f64,
    recall: f64,
    f1: f64,
    support: usize,
}

fn class_scores(y_true: &[bool], y_pred: &[bool], class: bool) -> ClassScores {
    let tp = count_pairs(y_true, y_pred, |t, p| t == class && p == class);
    let predicted = y_pred.iter().filter(|&&p| p == class).count();
    let support = y_true.iter().filter(|&&t| t == class).count();
    let precision = ratio(tp, predicted);
    let recall = ratio(tp, support);
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };
    ClassScores {
        precision,
        recall,
        f1,
        support,
    }
}

/// Text table of precision, recall, F1 and support for both classes,
/// followed by overall accuracy and the macro / support-weighted averages.
pub fn classification_report(y_true: &[bool], y_pred: &[bool]) -> String {
    let row = |name: &str, precision: f64, recall: f64, f1: f64, support: usize| {
        format!(
            "{:>12} {:>10.2} {:>10.2} {:>10.2} {:>10}\n",
            name, precision, recall, f1, support
        )
    };

    let mut out = format!(
        "{:>12} {:>10} {:>10} {:>10} {:>10}\n\n",
        "", "precision", "recall", "f1-score", "support"
    );
    let classes = [
        ("0", class_scores(y_true, y_pred, false)),
        ("1", class_scores(y_true, y_pred, true)),
    ];
    for (name, c) in &classes {
        out.push_str(&row(name, c.precision, c.recall, c.f1, c.support));
    }

    let total = y_true.len();
    let correct = count_pairs(y_true, y_pred, |t, p| t == p);
    out.push_str(&format!(
        "\n{:>12} {:>10} {:>10} {:>10.2} {:>10}\n",
        "accuracy",
        "",
        "",
        ratio(correct, total),
        total
    ));

    let macro_avg = |pick: fn(&ClassScores) -> f64| {
        classes.iter().map(|(_, c)| pick(c)).sum::<f64>() / classes.len() as f64
    };
    let weighted_avg = |pick: fn(&ClassScores) -> f64| {
        if total == 0 {
            return 0.0;
        }
        classes
            .iter()
            .map(|(_, c)| pick(c) * c.support as f64)
            .sum::<f64>()
            / total as f64
    };
    out.push_str(&row(
        "macro avg",
        macro_avg(|c| c.precision),
        macro_avg(|c| c.recall),
        macro_avg(|c| c.f1),
        total,
    ));
    out.push_str(&row(
        "weighted avg",
        weighted_avg(|c| c.precision),
        weighted_avg(|c| c.recall),
        weighted_avg(|c| c.f1),
        total,
    ));
    out
}

fn count_pairs(y_true: &[bool], y_pred: &[bool], pred: impl Fn(bool, bool) -> bool) -> usize {
    y_true
        .iter()
        .zip(y_pred)
        .filter(|&(&t, &p)| pred(t, p))
        .count()
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

// ── Warning signs ─────────────────────────────────────────────────────────────

/// Activity of one customer in one period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeriodActivity {
    pub frequency: f64,
    pub monetary_value: f64,
}

/// Early churn indicators from the latest period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarningSigns {
    pub frequency_drop: bool,
    pub value_drop: bool,
}

impl WarningSigns {
    pub fn any(&self) -> bool {
        self.frequency_drop || self.value_drop
    }
}

/// Compare the last period of `history` (oldest first) to the one before it
/// and flag a fall of more than half in frequency or monetary value.
pub fn detect_warning_signs(history: &[PeriodActivity]) -> Result<WarningSigns> {
    let [.., prior, latest] = history else {
        return Err(PyramidError::InsufficientData(
            "warning signs need at least two periods".to_string(),
        ));
    };

    let dropped = |before: f64, after: f64| pct_change(before, after).is_some_and(|c| c < DROP_THRESHOLD);

    Ok(WarningSigns {
        frequency_drop: dropped(prior.frequency, latest.frequency),
        value_drop: dropped(prior.monetary_value, latest.monetary_value),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
