//! Plain-text rendering of an analysis for the terminal.

use std::fmt::Write;

use pyramid_core::formatting::{format_currency, format_number, percentage};
use pyramid_core::models::{ScoredCustomer, Segment, SegmentCount};
use pyramid_data::PyramidAnalysis;

const SEGMENT_WIDTH: usize = 20;

/// Segment distribution table with customer counts and shares.
pub fn render_distribution(analysis: &PyramidAnalysis) -> String {
    let total = analysis.scored.len() as f64;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "{:<w$} {:>10} {:>8}",
        "Segment",
        "Customers",
        "Share",
        w = SEGMENT_WIDTH
    );
    let _ = writeln!(out, "{}", "-".repeat(SEGMENT_WIDTH + 20));

    for SegmentCount {
        segment,
        no_of_customers,
    } in &analysis.distribution
    {
        let share = percentage(*no_of_customers as f64, total, 1);
        let _ = writeln!(
            out,
            "{:<w$} {:>10} {:>7}%",
            segment.label(),
            format_number(*no_of_customers as f64, 0),
            format_number(share, 1),
            w = SEGMENT_WIDTH
        );
    }

    let meta = &analysis.metadata;
    let _ = writeln!(out, "{}", "-".repeat(SEGMENT_WIDTH + 20));
    let _ = writeln!(
        out,
        "{} customers from {} of {} records ({})",
        format_number(meta.customers as f64, 0),
        format_number(meta.transactions_kept as f64, 0),
        format_number(meta.records_read as f64, 0),
        meta.cutoff_strategy
    );
    out
}

/// Member listing for one segment, best score first.
pub fn render_members(segment: Segment, members: &[ScoredCustomer]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} ({} customers)", segment, members.len());
    if members.is_empty() {
        return out;
    }

    let _ = writeln!(
        out,
        "{:<16} {:>8} {:>10} {:>14} {:>12}",
        "Customer", "Recency", "Frequency", "Monetary", "Score"
    );
    for row in members {
        let f = &row.features;
        let _ = writeln!(
            out,
            "{:<16} {:>8} {:>10} {:>14} {:>12}",
            f.customer_id,
            f.recency,
            f.frequency,
            format_currency(f.monetary_value),
            format_number(row.pyramid_score, 2)
        );
    }
    out
}

// ── Tests ──────────────────────────────────────────────────────────────────────
