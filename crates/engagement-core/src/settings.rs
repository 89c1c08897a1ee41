use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::{PipelineConfig, UsageAggregation};
use crate::error::Result;
use crate::stats::PercentileMethod;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Engagement analytics over a Steam purchase/play event log
#[derive(Parser, Debug, Clone)]
#[command(
    name = "steam-engagement",
    about = "Engagement analytics over a Steam purchase/play event log",
    version
)]
pub struct Settings {
    /// Event log (user, game, behaviour, amount, unused)
    #[arg(long, default_value = "steam-200k.csv")]
    pub input: PathBuf,

    /// Pipeline config file (JSON); defaults to ~/.steam-engagement/config.json when present
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Report to produce
    #[arg(long, default_value = "ranking", value_parser = ["ranking", "quadrants", "population", "users"])]
    pub view: String,

    /// Metric to rank games by
    #[arg(long, default_value = "success_score")]
    pub metric: String,

    /// Maximum number of rows in a ranking (0 = unlimited)
    #[arg(long, default_value = "20")]
    pub limit: usize,

    /// Minimum number of owners for a game to be reported
    #[arg(long)]
    pub min_owners: Option<u64>,

    /// Minimum number of players for a game to be reported
    #[arg(long)]
    pub min_players: Option<u64>,

    /// Minimum total hours for a game to be reported
    #[arg(long)]
    pub min_total_hours: Option<f64>,

    /// How repeated play rows for the same user and game combine
    #[arg(long, value_enum)]
    pub aggregation: Option<UsageAggregation>,

    /// Percentile interpolation method
    #[arg(long, value_enum)]
    pub percentile_method: Option<PercentileMethod>,

    /// Hours above which a player counts as retained
    #[arg(long)]
    pub retention_threshold: Option<f64>,

    /// Skip the first line of the input
    #[arg(long, conflicts_with = "no_header")]
    pub has_header: bool,

    /// Treat the first line as data, overriding the config file
    #[arg(long)]
    pub no_header: bool,

    /// Field delimiter of the input
    #[arg(long)]
    pub delimiter: Option<char>,

    /// Worker threads for per-game aggregation (1-64)
    #[arg(long, default_value = "1", value_parser = clap::value_parser!(u16).range(1..=64))]
    pub shards: u16,

    /// Output format
    #[arg(long, default_value = "table", value_parser = ["table", "csv", "json"])]
    pub format: String,

    /// Write the report to a file instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR"])]
    pub log_level: String,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse process arguments and apply the `--debug` flag.
    pub fn load() -> Self {
        Self::load_from_args(std::env::args_os().collect())
    }

    /// Same as [`Settings::load`] with an explicit argument list.
    pub fn load_from_args(args: Vec<std::ffi::OsString>) -> Self {
        let mut settings = Settings::parse_from(args);
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }

    /// Build the pipeline config for this run.
    ///
    /// The base comes from `--config`, else from `default_path` when that
    /// file exists, else from the built-in defaults. Flags given on the
    /// command line then override the base.
    pub fn resolve_pipeline_config(&self, default_path: &Path) -> Result<PipelineConfig> {
        let base = match &self.config {
            Some(path) => PipelineConfig::load_from(path)?,
            None if default_path.exists() => {
                debug!("Using config file {}", default_path.display());
                PipelineConfig::load_from(default_path)?
            }
            None => PipelineConfig::default(),
        };
        let config = self.apply_overrides(base);
        config.validate()?;
        Ok(config)
    }

    /// Apply every explicitly supplied flag on top of `config`.
    pub fn apply_overrides(&self, mut config: PipelineConfig) -> PipelineConfig {
        if let Some(v) = self.min_owners {
            config.min_support.min_owners = v;
        }
        if let Some(v) = self.min_players {
            config.min_support.min_players = v;
        }
        if let Some(v) = self.min_total_hours {
            config.min_support.min_total_hours = v;
        }
        if let Some(v) = self.aggregation {
            config.usage_aggregation = v;
        }
        if let Some(v) = self.percentile_method {
            config.percentile_method = v;
        }
        if let Some(v) = self.retention_threshold {
            config.retention_threshold_hours = v;
        }
        if let Some(v) = self.delimiter {
            config.delimiter = v;
        }
        if self.has_header {
            config.has_header = true;
        }
        if self.no_header {
            config.has_header = false;
        }
        config
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
