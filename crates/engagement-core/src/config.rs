//! Explicit configuration for one pipeline run.
//!
//! Every threshold and strategy choice lives here and is passed into the
//! pipeline entry point. The structure round-trips through JSON so that an
//! analysis can be pinned in a file and re-run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EngagementError, Result};
use crate::models::EventKind;
use crate::stats::PercentileMethod;

/// Default retention threshold, in hours. Players above it are "keepers".
pub const DEFAULT_RETENTION_THRESHOLD_HOURS: f64 = 3.0;

// ── UsageAggregation ──────────────────────────────────────────────────────────

/// How several usage rows for the same `(user, item)` pair collapse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum UsageAggregation {
    /// Each row is a separate session; hours add up.
    #[default]
    Sum,
    /// Each row is a cumulative counter; the largest value wins.
    Max,
}

impl UsageAggregation {
    /// Fold a new amount into the running value for a pair.
    pub fn combine(self, current: f64, amount: f64) -> f64 {
        match self {
            UsageAggregation::Sum => current + amount,
            UsageAggregation::Max => current.max(amount),
        }
    }
}

// ── MinSupport ────────────────────────────────────────────────────────────────

/// Lower bounds that exclude statistically unreliable items from reports.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MinSupport {
    pub min_owners: u64,
    pub min_players: u64,
    pub min_total_hours: f64,
}

impl MinSupport {
    /// Whether an item with these counts passes every bound.
    pub fn admits(&self, owners: u64, players: u64, total_hours: f64) -> bool {
        owners >= self.min_owners && players >= self.min_players && total_hours >= self.min_total_hours
    }
}

// ── MetricWeights ─────────────────────────────────────────────────────────────

/// Weights of the rank-percentile components of the success score.
///
/// * `ownership` – rank of `ownership_rate`
/// * `engagement` – rank of `mean_hours`
/// * `retention` – rank of the threshold-based `retention_rate`
///
/// The score divides by the weight sum, so only the proportions matter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricWeights {
    pub ownership: f64,
    pub engagement: f64,
    pub retention: f64,
}

impl Default for MetricWeights {
    fn default() -> Self {
        Self {
            ownership: 0.4,
            engagement: 0.3,
            retention: 0.3,
        }
    }
}

impl MetricWeights {
    pub fn total(&self) -> f64 {
        self.ownership + self.engagement + self.retention
    }

    /// Weights must be finite and non-negative, and at least one positive.
    pub fn validate(&self) -> Result<()> {
        let all = [self.ownership, self.engagement, self.retention];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(EngagementError::Config(format!(
                "metric weights must be finite and non-negative, got {all:?}"
            )));
        }
        if self.total() <= 0.0 {
            return Err(EngagementError::Config(
                "at least one metric weight must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

// ── PipelineConfig ────────────────────────────────────────────────────────────

/// Every option of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Source label → event kind. Matched case-sensitively.
    pub event_kind_map: BTreeMap<String, EventKind>,
    pub usage_aggregation: UsageAggregation,
    pub min_support: MinSupport,
    pub metric_weights: MetricWeights,
    pub percentile_method: PercentileMethod,
    /// Players strictly above this many hours count as retained.
    pub retention_threshold_hours: f64,
    /// Skip the first record of the input.
    pub has_header: bool,
    /// Field delimiter of the input.
    pub delimiter: char,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let mut event_kind_map = BTreeMap::new();
        event_kind_map.insert("purchase".to_string(), EventKind::Ownership);
        event_kind_map.insert("play".to_string(), EventKind::Usage);
        Self {
            event_kind_map,
            usage_aggregation: UsageAggregation::default(),
            min_support: MinSupport::default(),
            metric_weights: MetricWeights::default(),
            percentile_method: PercentileMethod::default(),
            retention_threshold_hours: DEFAULT_RETENTION_THRESHOLD_HOURS,
            has_header: false,
            delimiter: ',',
        }
    }
}

impl PipelineConfig {
    /// Location of the config file under `base_dir`, normally the home
    /// directory: `<base_dir>/.steam-engagement/config.json`.
    pub fn default_path_in(base_dir: &Path) -> PathBuf {
        base_dir.join(".steam-engagement").join("config.json")
    }

    /// Load and validate a config file. Missing fields take their defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            EngagementError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: PipelineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the config as pretty JSON, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.metric_weights.validate()?;
        if self.event_kind_map.is_empty() {
            return Err(EngagementError::Config(
                "event_kind_map must name at least one label".to_string(),
            ));
        }
        if !self.retention_threshold_hours.is_finite() || self.retention_threshold_hours < 0.0 {
            return Err(EngagementError::Config(format!(
                "retention_threshold_hours must be a non-negative number, got {}",
                self.retention_threshold_hours
            )));
        }
        if !self.delimiter.is_ascii() || matches!(self.delimiter, '"' | '\n' | '\r') {
            return Err(EngagementError::Config(format!(
                "delimiter must be a single ASCII character other than quote or line break, got {:?}",
                self.delimiter
            )));
        }
        if !self.min_support.min_total_hours.is_finite() {
            return Err(EngagementError::Config(
                "min_total_hours must be finite".to_string(),
            ));
        }
        Ok(())
    }

    /// The delimiter as the byte the CSV reader expects.
    pub fn delimiter_byte(&self) -> u8 {
        // validate() guarantees ASCII; fall back to a comma otherwise.
        u8::try_from(self.delimiter).unwrap_or(b',')
    }

    /// Resolve a source label to an event kind.
    pub fn event_kind(&self, label: &str) -> Option<EventKind> {
        self.event_kind_map.get(label).copied()
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
