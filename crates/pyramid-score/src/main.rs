mod bootstrap;
mod report;

use anyhow::{bail, Context, Result};
use pyramid_core::models::Segment;
use pyramid_core::settings::Settings;
use pyramid_data::{analyze, reader};

fn main() -> Result<()> {
    let (settings, config) = Settings::load();

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(&settings.log_level)?;

    tracing::info!("Pyramid Score v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Columns: {} / {} / {}, strategy: {}",
        config.schema.customer_key,
        config.schema.timestamp_key,
        config.schema.amount_key,
        config.cutoff_strategy
    );

    let Some(input) = settings.input.as_deref() else {
        if settings.clear {
            println!("Saved configuration cleared.");
            return Ok(());
        }
        bail!("no ledger given; pass --input <file or directory>");
    };

    let records = reader::load_records(input)
        .with_context(|| format!("failed to read ledger at {}", input.display()))?;
    let analysis = analyze(&records, &config)?;

    // Resolve the label before printing anything so a typo fails cleanly.
    let segment = settings
        .segment
        .as_deref()
        .map(str::parse::<Segment>)
        .transpose()?;

    if settings.json {
        let json = match segment {
            Some(segment) => serde_json::to_string_pretty(&analysis.scored.find_customers(segment))?,
            None => serde_json::to_string_pretty(&analysis.scored)?,
        };
        println!("{}", json);
        return Ok(());
    }

    print!("{}", report::render_distribution(&analysis));
    if let Some(segment) = segment {
        println!();
        print!(
            "{}",
            report::render_members(segment, &analysis.scored.find_customers(segment))
        );
    }

    Ok(())
}
