use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::models::{CutoffStrategy, TransactionSchema};

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Customer-value pyramid segmentation for transaction ledgers
#[derive(Parser, Debug, Clone)]
#[command(
    name = "pyramid-score",
    about = "Customer-value pyramid segmentation for transaction ledgers",
    version
)]
pub struct Settings {
    /// Ledger file (.json array or .jsonl) or a directory containing them
    #[arg(long, short = 'i')]
    pub input: Option<PathBuf>,

    /// Column holding the customer identifier
    #[arg(long, default_value = "customer_id")]
    pub customer_key: String,

    /// Column holding the transaction date
    #[arg(long, default_value = "transaction_date")]
    pub date_key: String,

    /// Column holding the transaction amount
    #[arg(long, default_value = "amount")]
    pub amount_key: String,

    /// Tier cutoff strategy
    #[arg(long, default_value = "fixed_proportion", value_parser = ["fixed_proportion", "decile"])]
    pub strategy: String,

    /// Keep exact duplicate transactions instead of dropping them
    #[arg(long)]
    pub keep_duplicates: bool,

    /// List the customers of this segment (e.g. "Gold Tier")
    #[arg(long)]
    pub segment: Option<String>,

    /// Print the scored table as JSON instead of the text report
    #[arg(long)]
    pub json: bool,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR"])]
    pub log_level: String,

    /// Configuration file (defaults to ~/.pyramid-score/config.json)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Clear saved configuration
    #[arg(long)]
    pub clear: bool,
}

// ── PyramidConfig ──────────────────────────────────────────────────────────────

/// Persisted analysis configuration, saved to `~/.pyramid-score/config.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PyramidConfig {
    /// Column names of the ledger records.
    pub schema: TransactionSchema,
    /// How ranked customers are cut into tiers.
    pub cutoff_strategy: CutoffStrategy,
    /// Drop transactions identical in customer, date and amount.
    pub drop_duplicates: bool,
}

impl Default for PyramidConfig {
    fn default() -> Self {
        Self {
            schema: TransactionSchema::default(),
            cutoff_strategy: CutoffStrategy::default(),
            drop_duplicates: true,
        }
    }
}

impl PyramidConfig {
    /// Return the default path to the persisted config file.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Return the config path rooted at `base_dir` (used for testing).
    pub fn config_path_in(base_dir: &Path) -> PathBuf {
        base_dir.join(".pyramid-score").join("config.json")
    }

    /// Load the config from an explicit path.
    /// Returns `Default` when the file is absent or cannot be parsed.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring unreadable config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Atomically write the config to an explicit path, creating parent
    /// directories if needed.
    pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Delete the config file at an explicit path if it exists.
    pub fn clear_at(path: &Path) -> Result<(), std::io::Error> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments and merge them with the persisted config.
    pub fn load() -> (Self, PyramidConfig) {
        Self::load_impl(std::env::args_os().collect(), None)
    }

    /// Parse `args`, merge with the config stored at `config_path` (or the
    /// `--config` flag, or the default path) and persist the merged result.
    ///
    /// Flags given on the command line win over the stored config, which wins
    /// over built-in defaults. `--clear` deletes the stored config and skips
    /// persisting.
    pub fn load_impl(
        args: Vec<std::ffi::OsString>,
        config_path: Option<&Path>,
    ) -> (Self, PyramidConfig) {
        let matches = Settings::command().get_matches_from(args.clone());
        let mut settings = Settings::parse_from(args);

        let path = config_path
            .map(Path::to_path_buf)
            .or_else(|| settings.config.clone())
            .unwrap_or_else(PyramidConfig::config_path);

        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }

        if settings.clear {
            let _ = PyramidConfig::clear_at(&path);
            let config = settings.apply_to(PyramidConfig::default(), &matches, true);
            return (settings, config);
        }

        let stored = PyramidConfig::load_from(&path);
        let config = settings.apply_to(stored, &matches, false);
        let _ = config.save_to(&path);

        (settings, config)
    }

    /// Overlay CLI values onto `config`. With `all` set, every CLI value is
    /// applied (defaults included); otherwise only explicitly passed flags.
    fn apply_to(
        &self,
        mut config: PyramidConfig,
        matches: &clap::ArgMatches,
        all: bool,
    ) -> PyramidConfig {
        let take = |name: &str| all || is_arg_explicitly_set(matches, name);

        if take("customer_key") {
            config.schema.customer_key = self.customer_key.clone();
        }
        if take("date_key") {
            config.schema.timestamp_key = self.date_key.clone();
        }
        if take("amount_key") {
            config.schema.amount_key = self.amount_key.clone();
        }
        if take("strategy") {
            if let Ok(strategy) = self.strategy.parse() {
                config.cutoff_strategy = strategy;
            }
        }
        if take("keep_duplicates") {
            config.drop_duplicates = !self.keep_duplicates;
        }
        config
    }
}

// ── Helper: check if an arg was explicitly set on the command line ─────────────

/// Returns `true` when `name` was supplied explicitly on the command line
/// (not via default value or environment variable).
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tmp_config_path(tmp: &TempDir) -> PathBuf {
        PyramidConfig::config_path_in(tmp.path())
    }

    fn args(list: &[&str]) -> Vec<std::ffi::OsString> {
        list.iter().map(|s| (*s).into()).collect()
    }

    // ── PyramidConfig persistence ─────────────────────────────────────────────

    #[test]
    fn test_config_save_load() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        let config = PyramidConfig {
            schema: TransactionSchema::new("CustomerID", "InvoiceDate", "Total")
                .with_price("UnitPrice"),
            cutoff_strategy: CutoffStrategy::Decile,
            drop_duplicates: false,
        };

        config.save_to(&path).expect("save");
        let loaded = PyramidConfig::load_from(&path);

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_default_when_missing() {
        let tmp = TempDir::new().expect("tempdir");
        let loaded = PyramidConfig::load_from(&tmp_config_path(&tmp));
        assert_eq!(loaded, PyramidConfig::default());
        assert!(loaded.drop_duplicates);
    }

    #[test]
    fn test_config_default_when_corrupt() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(PyramidConfig::load_from(&path), PyramidConfig::default());
    }

    #[test]
    fn test_config_partial_file_fills_defaults() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"cutoff_strategy": "decile"}"#).unwrap();

        let loaded = PyramidConfig::load_from(&path);
        assert_eq!(loaded.cutoff_strategy, CutoffStrategy::Decile);
        assert_eq!(loaded.schema, TransactionSchema::default());
    }

    #[test]
    fn test_config_clear() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        PyramidConfig::default().save_to(&path).expect("save");
        assert!(path.exists());

        PyramidConfig::clear_at(&path).expect("clear");
        assert!(!path.exists());
    }

    // ── Settings parsing ──────────────────────────────────────────────────────

    #[test]
    fn test_settings_default_values() {
        let settings = Settings::parse_from(["pyramid-score"]);

        assert!(settings.input.is_none());
        assert_eq!(settings.customer_key, "customer_id");
        assert_eq!(settings.date_key, "transaction_date");
        assert_eq!(settings.amount_key, "amount");
        assert_eq!(settings.strategy, "fixed_proportion");
        assert!(!settings.keep_duplicates);
        assert!(settings.segment.is_none());
        assert!(!settings.json);
        assert_eq!(settings.log_level, "INFO");
        assert!(!settings.debug);
        assert!(!settings.clear);
    }

    #[test]
    fn test_settings_rejects_unknown_strategy() {
        let result = Settings::try_parse_from(["pyramid-score", "--strategy", "quartile"]);
        assert!(result.is_err());
    }

    // ── load_impl merging ─────────────────────────────────────────────────────

    #[test]
    fn test_load_uses_persisted_values() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        let stored = PyramidConfig {
            schema: TransactionSchema::new("cid", "date", "value"),
            cutoff_strategy: CutoffStrategy::Decile,
            drop_duplicates: false,
        };
        stored.save_to(&path).expect("save");

        let (_, config) = Settings::load_impl(args(&["pyramid-score"]), Some(&path));
        assert_eq!(config, stored);
    }

    #[test]
    fn test_load_cli_overrides_persisted() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        let stored = PyramidConfig {
            schema: TransactionSchema::new("cid", "date", "value"),
            ..Default::default()
        };
        stored.save_to(&path).expect("save");

        let (_, config) = Settings::load_impl(
            args(&["pyramid-score", "--amount-key", "total", "--strategy", "decile"]),
            Some(&path),
        );
        assert_eq!(config.schema.customer_key, "cid");
        assert_eq!(config.schema.amount_key, "total");
        assert_eq!(config.cutoff_strategy, CutoffStrategy::Decile);

        // The merged result is persisted for the next run.
        assert_eq!(PyramidConfig::load_from(&path), config);
    }

    #[test]
    fn test_load_clear_removes_file_and_uses_defaults() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        PyramidConfig {
            cutoff_strategy: CutoffStrategy::Decile,
            ..Default::default()
        }
        .save_to(&path)
        .expect("save");

        let (_, config) = Settings::load_impl(args(&["pyramid-score", "--clear"]), Some(&path));
        assert!(!path.exists());
        assert_eq!(config, PyramidConfig::default());
    }

    #[test]
    fn test_load_debug_overrides_log_level() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        let (settings, _) = Settings::load_impl(args(&["pyramid-score", "--debug"]), Some(&path));
        assert_eq!(settings.log_level, "DEBUG");
    }
}
