//! Main analysis pipeline.
//!
//! Orchestrates loading, splitting, aggregation and metric derivation,
//! returning an [`AnalysisResult`] ready for the reporting layer.

use std::io::Read;
use std::path::Path;
use std::time::Instant;

use chrono::Utc;
use engagement_core::config::PipelineConfig;
use engagement_core::models::{ItemDerivedMetrics, ItemSummary, PopulationInequality, UserSummary};
use engagement_core::Result;
use tracing::info;

use crate::aggregator::{AggregationOptions, EntityAggregator};
use crate::metrics::MetricCalculator;
use crate::reader::{events_from_reader, open_event_log, EventParser, LoadDiagnostics};
use crate::splitter::EventSplitter;

// ── Public types ──────────────────────────────────────────────────────────────

/// Metadata produced alongside the analysis result.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AnalysisMetadata {
    /// RFC 3339 timestamp when this result was generated.
    pub generated_at: String,
    pub diagnostics: LoadDiagnostics,
    /// Accepted ownership events, duplicates included.
    pub ownership_events: u64,
    /// Accepted usage events before per-pair aggregation.
    pub usage_events: u64,
    /// Distinct `(user, game)` ownership pairs.
    pub ownership_facts: usize,
    /// Distinct `(user, game)` usage pairs.
    pub usage_facts: usize,
    pub shards: usize,
    /// Wall-clock seconds spent reading and splitting the log.
    pub load_time_seconds: f64,
    /// Wall-clock seconds spent aggregating and deriving metrics.
    pub transform_time_seconds: f64,
}

/// The complete output of one pipeline run.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    /// Per-game summaries, ordered by `item_id`.
    pub items: Vec<ItemSummary>,
    /// Derived metrics, parallel to `items`.
    pub metrics: Vec<ItemDerivedMetrics>,
    /// Per-user summaries, ordered by `user_id`.
    pub users: Vec<UserSummary>,
    pub population: PopulationInequality,
    pub total_users: u64,
    pub metadata: AnalysisMetadata,
}

// ── Public functions ──────────────────────────────────────────────────────────

/// Run the full pipeline over the event log at `path`.
///
/// 1. Read and validate rows, dropping bad ones.
/// 2. Split events into ownership and usage facts.
/// 3. Aggregate per game (across `shards` threads) and per user.
/// 4. Derive per-game metrics and population inequality.
pub fn run_pipeline(path: &Path, config: &PipelineConfig, shards: usize) -> Result<AnalysisResult> {
    let load_start = Instant::now();
    let parser = open_event_log(path, config)?;
    analyze_events(parser, config, shards, load_start)
}

/// Same as [`run_pipeline`] over any byte source.
pub fn run_pipeline_from_reader<R: Read>(
    source: R,
    config: &PipelineConfig,
    shards: usize,
) -> Result<AnalysisResult> {
    let load_start = Instant::now();
    analyze_events(events_from_reader(source, config), config, shards, load_start)
}

// ── Private helpers ───────────────────────────────────────────────────────────

fn analyze_events<I>(
    mut parser: EventParser<'_, I>,
    config: &PipelineConfig,
    shards: usize,
    load_start: Instant,
) -> Result<AnalysisResult>
where
    I: Iterator<Item = std::result::Result<csv::StringRecord, csv::Error>>,
{
    // ── Steps 1-2: Load and split ─────────────────────────────────────────────
    let split = EventSplitter::split(parser.by_ref(), config.usage_aggregation);
    let diagnostics = parser.finish()?;
    let load_time = load_start.elapsed().as_secs_f64();
    info!(
        "Loaded {} events from {} rows; skipped {} ({} malformed, {} unrecognized kinds)",
        diagnostics.events_accepted,
        diagnostics.rows_read,
        diagnostics.skipped(),
        diagnostics.malformed_rows,
        diagnostics.unrecognized_kinds
    );
    info!(
        "Split into {} ownership facts from {} events and {} usage facts from {} events",
        split.ownership.len(),
        split.ownership_events,
        split.usage.len(),
        split.usage_events
    );

    // ── Step 3: Aggregate ─────────────────────────────────────────────────────
    let transform_start = Instant::now();
    let options = AggregationOptions::from(config);
    let shards = shards.max(1);
    let aggregates = EntityAggregator::aggregate_sharded(&split, &options, shards);

    // ── Step 4: Derive ────────────────────────────────────────────────────────
    let metrics = MetricCalculator::derive_all(
        &aggregates.items,
        aggregates.total_users,
        &config.metric_weights,
    );
    let population = MetricCalculator::population_inequality(&aggregates.users);
    let transform_time = transform_start.elapsed().as_secs_f64();
    info!(
        "Aggregated {} games across {} users",
        aggregates.items.len(),
        aggregates.total_users
    );

    let metadata = AnalysisMetadata {
        generated_at: Utc::now().to_rfc3339(),
        diagnostics,
        ownership_events: split.ownership_events,
        usage_events: split.usage_events,
        ownership_facts: split.ownership.len(),
        usage_facts: split.usage.len(),
        shards,
        load_time_seconds: load_time,
        transform_time_seconds: transform_time,
    };

    Ok(AnalysisResult {
        items: aggregates.items,
        metrics,
        users: aggregates.users,
        population,
        total_users: aggregates.total_users,
        metadata,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
