//! Rankings, quadrant analysis and report rendering.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::str::FromStr;

use engagement_core::config::MinSupport;
use engagement_core::formatting::{
    format_hours, format_number, format_optional, format_rate, pad_left, truncate, UNDEFINED,
};
use engagement_core::models::{ItemDerivedMetrics, ItemSummary, PopulationInequality, UserSummary};
use engagement_core::stats;
use engagement_core::{EngagementError, Result};
use serde::Serialize;
use tracing::debug;

/// Widest game name printed in a table before truncation.
const NAME_WIDTH: usize = 40;

// ── MetricKey ─────────────────────────────────────────────────────────────────

/// A per-item value a ranking can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKey {
    SuccessScore,
    KeeperScore,
    PlayRate,
    BacklogRate,
    PlayersPerOwner,
    OwnershipRate,
    OwnershipOdds,
    RetentionRate,
    Gini,
    MeanMedianGap,
    MeanMedianRatio,
    Iqr,
    TailRatio,
    CoefficientOfVariation,
    Owners,
    Players,
    TotalHours,
    MeanHours,
    MedianHours,
    StdHours,
    P25Hours,
    P75Hours,
    P90Hours,
    P95Hours,
}

impl MetricKey {
    pub const ALL: [MetricKey; 24] = [
        MetricKey::SuccessScore,
        MetricKey::KeeperScore,
        MetricKey::PlayRate,
        MetricKey::BacklogRate,
        MetricKey::PlayersPerOwner,
        MetricKey::OwnershipRate,
        MetricKey::OwnershipOdds,
        MetricKey::RetentionRate,
        MetricKey::Gini,
        MetricKey::MeanMedianGap,
        MetricKey::MeanMedianRatio,
        MetricKey::Iqr,
        MetricKey::TailRatio,
        MetricKey::CoefficientOfVariation,
        MetricKey::Owners,
        MetricKey::Players,
        MetricKey::TotalHours,
        MetricKey::MeanHours,
        MetricKey::MedianHours,
        MetricKey::StdHours,
        MetricKey::P25Hours,
        MetricKey::P75Hours,
        MetricKey::P90Hours,
        MetricKey::P95Hours,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MetricKey::SuccessScore => "success_score",
            MetricKey::KeeperScore => "keeper_score",
            MetricKey::PlayRate => "play_rate",
            MetricKey::BacklogRate => "backlog_rate",
            MetricKey::PlayersPerOwner => "players_per_owner",
            MetricKey::OwnershipRate => "ownership_rate",
            MetricKey::OwnershipOdds => "ownership_odds",
            MetricKey::RetentionRate => "retention_rate",
            MetricKey::Gini => "gini",
            MetricKey::MeanMedianGap => "mean_median_gap",
            MetricKey::MeanMedianRatio => "mean_median_ratio",
            MetricKey::Iqr => "iqr",
            MetricKey::TailRatio => "tail_ratio",
            MetricKey::CoefficientOfVariation => "coefficient_of_variation",
            MetricKey::Owners => "owners",
            MetricKey::Players => "players",
            MetricKey::TotalHours => "total_hours",
            MetricKey::MeanHours => "mean_hours",
            MetricKey::MedianHours => "median_hours",
            MetricKey::StdHours => "std_hours",
            MetricKey::P25Hours => "p25_hours",
            MetricKey::P75Hours => "p75_hours",
            MetricKey::P90Hours => "p90_hours",
            MetricKey::P95Hours => "p95_hours",
        }
    }

    /// Value of this metric for one item, `None` when undefined.
    pub fn value(self, summary: &ItemSummary, metrics: &ItemDerivedMetrics) -> Option<f64> {
        let p = summary.percentiles;
        match self {
            MetricKey::SuccessScore => Some(metrics.success_score),
            MetricKey::KeeperScore => Some(metrics.keeper_score),
            MetricKey::PlayRate => Some(metrics.play_rate),
            MetricKey::BacklogRate => Some(metrics.backlog_rate),
            MetricKey::PlayersPerOwner => metrics.players_per_owner,
            MetricKey::OwnershipRate => Some(metrics.ownership_rate),
            MetricKey::OwnershipOdds => metrics.ownership_odds,
            MetricKey::RetentionRate => Some(metrics.retention_rate),
            MetricKey::Gini => metrics.gini,
            MetricKey::MeanMedianGap => metrics.mean_median_gap,
            MetricKey::MeanMedianRatio => metrics.mean_median_ratio,
            MetricKey::Iqr => metrics.iqr,
            MetricKey::TailRatio => metrics.tail_ratio,
            MetricKey::CoefficientOfVariation => metrics.coefficient_of_variation,
            MetricKey::Owners => Some(summary.owners as f64),
            MetricKey::Players => Some(summary.players as f64),
            MetricKey::TotalHours => Some(summary.total_hours),
            MetricKey::MeanHours => summary.mean_hours,
            MetricKey::MedianHours => summary.median_hours,
            MetricKey::StdHours => summary.std_hours,
            MetricKey::P25Hours => p.map(|p| p.p25),
            MetricKey::P75Hours => p.map(|p| p.p75),
            MetricKey::P90Hours => p.map(|p| p.p90),
            MetricKey::P95Hours => p.map(|p| p.p95),
        }
    }

    /// Decimal places used when printing this metric in a table.
    pub fn decimals(self) -> u32 {
        match self {
            MetricKey::Owners | MetricKey::Players => 0,
            MetricKey::TotalHours
            | MetricKey::MeanHours
            | MetricKey::MedianHours
            | MetricKey::StdHours
            | MetricKey::MeanMedianGap
            | MetricKey::Iqr
            | MetricKey::P25Hours
            | MetricKey::P75Hours
            | MetricKey::P90Hours
            | MetricKey::P95Hours => 1,
            MetricKey::KeeperScore => 2,
            _ => 3,
        }
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKey {
    type Err = EngagementError;

    fn from_str(s: &str) -> Result<Self> {
        MetricKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| EngagementError::InvalidMetricKey(s.to_string()))
    }
}

// ── ReportFormat ──────────────────────────────────────────────────────────────

/// Output encoding of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Table,
    Csv,
    Json,
}

impl FromStr for ReportFormat {
    type Err = EngagementError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "table" => Ok(ReportFormat::Table),
            "csv" => Ok(ReportFormat::Csv),
            "json" => Ok(ReportFormat::Json),
            other => Err(EngagementError::Config(format!("unknown report format '{other}'"))),
        }
    }
}

// ── Ranking ───────────────────────────────────────────────────────────────────

/// What to rank and which items qualify.
#[derive(Debug, Clone, PartialEq)]
pub struct RankingRequest {
    pub metric: MetricKey,
    pub min_support: MinSupport,
    /// Maximum number of rows; `None` keeps every qualifying item.
    pub limit: Option<usize>,
}

impl RankingRequest {
    /// Build a request from a metric name, failing on unknown names.
    pub fn parse(metric: &str, min_support: MinSupport, limit: Option<usize>) -> Result<Self> {
        Ok(Self {
            metric: metric.parse()?,
            min_support,
            limit,
        })
    }
}

/// One row of a game ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedRow {
    pub rank: usize,
    pub item_id: String,
    pub value: f64,
    pub owners: u64,
    pub players: u64,
    pub total_hours: f64,
    pub mean_hours: Option<f64>,
}

/// Rank items by the requested metric, highest first.
///
/// `items` and `metrics` are parallel slices. Items failing the minimum
/// support or with an undefined metric value are left out. Equal values are
/// ordered by `item_id` ascending.
pub fn rank_items(
    items: &[ItemSummary],
    metrics: &[ItemDerivedMetrics],
    request: &RankingRequest,
) -> Vec<RankedRow> {
    let mut candidates: Vec<(&ItemSummary, f64)> = items
        .iter()
        .zip(metrics)
        .filter(|(s, _)| request.min_support.admits(s.owners, s.players, s.total_hours))
        .filter_map(|(s, m)| request.metric.value(s, m).map(|v| (s, v)))
        .filter(|(_, v)| v.is_finite())
        .collect();

    candidates.sort_by(|(a, va), (b, vb)| vb.total_cmp(va).then_with(|| a.item_id.cmp(&b.item_id)));
    let limit = request.limit.unwrap_or(candidates.len());
    debug!(
        "Ranking {} qualifying items by {} (limit {})",
        candidates.len(),
        request.metric,
        limit
    );

    candidates
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, (s, value))| RankedRow {
            rank: i + 1,
            item_id: s.item_id.clone(),
            value,
            owners: s.owners,
            players: s.players,
            total_hours: s.total_hours,
            mean_hours: s.mean_hours,
        })
        .collect()
}

// ── Quadrants ─────────────────────────────────────────────────────────────────

/// Position of a game relative to the median play rate and mean playtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Quadrant {
    HighRetentionHighPlaytime,
    HighRetentionLowPlaytime,
    LowRetentionHighPlaytime,
    LowRetentionLowPlaytime,
}

impl Quadrant {
    /// Values at or above the median count as high.
    pub fn classify(play_rate: f64, mean_hours: f64, play_rate_median: f64, hours_median: f64) -> Self {
        match (play_rate >= play_rate_median, mean_hours >= hours_median) {
            (true, true) => Quadrant::HighRetentionHighPlaytime,
            (true, false) => Quadrant::HighRetentionLowPlaytime,
            (false, true) => Quadrant::LowRetentionHighPlaytime,
            (false, false) => Quadrant::LowRetentionLowPlaytime,
        }
    }
}

impl fmt::Display for Quadrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Coarse play-rate category: below 40%, 40% to 90%, above 90%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum RetentionBand {
    Low,
    Medium,
    High,
}

impl RetentionBand {
    pub fn of(play_rate: f64) -> Self {
        if play_rate < 0.4 {
            RetentionBand::Low
        } else if play_rate <= 0.9 {
            RetentionBand::Medium
        } else {
            RetentionBand::High
        }
    }
}

impl fmt::Display for RetentionBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuadrantRow {
    pub item_id: String,
    pub quadrant: Quadrant,
    pub band: RetentionBand,
    pub play_rate: f64,
    pub mean_hours: f64,
}

/// Every qualifying game placed in a quadrant, plus the split points.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuadrantReport {
    pub play_rate_median: Option<f64>,
    pub mean_hours_median: Option<f64>,
    pub counts: BTreeMap<Quadrant, u64>,
    pub rows: Vec<QuadrantRow>,
}

/// Classify played games that pass `min_support` into quadrants.
///
/// Games without players have no playtime and are left out. Rows are
/// ordered by quadrant, then by `item_id`.
pub fn quadrant_analysis(
    items: &[ItemSummary],
    metrics: &[ItemDerivedMetrics],
    min_support: &MinSupport,
) -> QuadrantReport {
    let points: Vec<(&str, f64, f64)> = items
        .iter()
        .zip(metrics)
        .filter(|(s, _)| min_support.admits(s.owners, s.players, s.total_hours))
        .filter_map(|(s, m)| s.mean_hours.map(|h| (s.item_id.as_str(), m.play_rate, h)))
        .collect();

    let play_rates = stats::sorted_copy(&points.iter().map(|p| p.1).collect::<Vec<_>>());
    let hours = stats::sorted_copy(&points.iter().map(|p| p.2).collect::<Vec<_>>());
    let play_rate_median = stats::median(&play_rates);
    let mean_hours_median = stats::median(&hours);

    let mut rows: Vec<QuadrantRow> = match (play_rate_median, mean_hours_median) {
        (Some(pm), Some(hm)) => points
            .iter()
            .map(|(id, rate, h)| QuadrantRow {
                item_id: id.to_string(),
                quadrant: Quadrant::classify(*rate, *h, pm, hm),
                band: RetentionBand::of(*rate),
                play_rate: *rate,
                mean_hours: *h,
            })
            .collect(),
        _ => Vec::new(),
    };
    rows.sort_by(|a, b| a.quadrant.cmp(&b.quadrant).then_with(|| a.item_id.cmp(&b.item_id)));

    let mut counts = BTreeMap::new();
    for row in &rows {
        *counts.entry(row.quadrant).or_insert(0u64) += 1;
    }

    QuadrantReport {
        play_rate_median,
        mean_hours_median,
        counts,
        rows,
    }
}

// ── Users ─────────────────────────────────────────────────────────────────────

/// One row of the user ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRow {
    pub rank: usize,
    pub user_id: String,
    pub owned_count: u64,
    pub played_count: u64,
    pub total_hours: f64,
    /// `played_count / owned_count`; undefined without owned games.
    pub played_share: Option<f64>,
}

/// Rank users by total hours, highest first, ties by `user_id`.
pub fn rank_users(users: &[UserSummary], limit: Option<usize>) -> Vec<UserRow> {
    let mut sorted: Vec<&UserSummary> = users.iter().collect();
    sorted.sort_by(|a, b| {
        b.total_hours
            .total_cmp(&a.total_hours)
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    sorted
        .into_iter()
        .take(limit.unwrap_or(users.len()))
        .enumerate()
        .map(|(i, u)| UserRow {
            rank: i + 1,
            user_id: u.user_id.clone(),
            owned_count: u.owned_count,
            played_count: u.played_count,
            total_hours: u.total_hours,
            played_share: stats::checked_ratio(u.played_count as f64, u.owned_count as f64),
        })
        .collect()
}

// ── Rendering ─────────────────────────────────────────────────────────────────

/// Write a game ranking.
pub fn write_ranking<W: Write>(
    out: W,
    rows: &[RankedRow],
    metric: MetricKey,
    format: ReportFormat,
) -> Result<()> {
    match format {
        ReportFormat::Csv => write_csv(out, rows),
        ReportFormat::Json => write_json(out, &rows),
        ReportFormat::Table => {
            let mut table = TextTable::new(&["#", "game", metric.as_str(), "owners", "players", "hours", "mean"]);
            for r in rows {
                table.push(vec![
                    r.rank.to_string(),
                    truncate(&r.item_id, NAME_WIDTH),
                    format_number(r.value, metric.decimals()),
                    format_number(r.owners as f64, 0),
                    format_number(r.players as f64, 0),
                    format_hours(r.total_hours),
                    format_optional(r.mean_hours, 1),
                ]);
            }
            table.write_to(out)
        }
    }
}

/// Write a quadrant report.
pub fn write_quadrants<W: Write>(mut out: W, report: &QuadrantReport, format: ReportFormat) -> Result<()> {
    match format {
        ReportFormat::Csv => write_csv(out, &report.rows),
        ReportFormat::Json => write_json(out, report),
        ReportFormat::Table => {
            writeln!(
                out,
                "Split at play rate {} and mean playtime {}h",
                report
                    .play_rate_median
                    .map_or_else(|| UNDEFINED.to_string(), |m| format_rate(m, 1)),
                format_optional(report.mean_hours_median, 1)
            )?;
            for (quadrant, count) in &report.counts {
                writeln!(out, "  {:<28}{}", quadrant.to_string(), pad_left(&count.to_string(), 8))?;
            }
            writeln!(out)?;
            let mut table = TextTable::new(&["game", "quadrant", "band", "play_rate", "mean"]);
            for r in &report.rows {
                table.push(vec![
                    truncate(&r.item_id, NAME_WIDTH),
                    r.quadrant.to_string(),
                    r.band.to_string(),
                    format_rate(r.play_rate, 1),
                    format_number(r.mean_hours, 1),
                ]);
            }
            table.write_to(out)
        }
    }
}

/// Write population inequality. CSV carries the Lorenz curve points.
pub fn write_population<W: Write>(
    mut out: W,
    population: &PopulationInequality,
    format: ReportFormat,
) -> Result<()> {
    match format {
        ReportFormat::Csv => write_csv(out, &population.lorenz),
        ReportFormat::Json => write_json(out, population),
        ReportFormat::Table => {
            writeln!(out, "Users:       {}", format_number(population.users as f64, 0))?;
            writeln!(out, "Total hours: {}", format_hours(population.total_hours))?;
            writeln!(out, "Gini:        {}", format_optional(population.gini, 4))?;
            writeln!(out)?;
            let mut table = TextTable::new(&["users", "hours share"]);
            for decile in 1..=10 {
                let share = decile as f64 / 10.0;
                if let Some(point) = population
                    .lorenz
                    .iter()
                    .find(|p| p.population_share >= share - 1e-12)
                {
                    table.push(vec![
                        format!("{}%", decile * 10),
                        format!("{}%", format_number(point.value_share * 100.0, 1)),
                    ]);
                }
            }
            table.write_to(out)
        }
    }
}

/// Write the user ranking.
pub fn write_users<W: Write>(out: W, rows: &[UserRow], format: ReportFormat) -> Result<()> {
    match format {
        ReportFormat::Csv => write_csv(out, rows),
        ReportFormat::Json => write_json(out, &rows),
        ReportFormat::Table => {
            let mut table = TextTable::new(&["#", "user", "owned", "played", "hours", "played share"]);
            for r in rows {
                table.push(vec![
                    r.rank.to_string(),
                    r.user_id.clone(),
                    format_number(r.owned_count as f64, 0),
                    format_number(r.played_count as f64, 0),
                    format_hours(r.total_hours),
                    format_optional(r.played_share, 3),
                ]);
            }
            table.write_to(out)
        }
    }
}

fn write_csv<W: Write, T: Serialize>(out: W, rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_json<W: Write, T: Serialize + ?Sized>(mut out: W, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}

// ── TextTable ─────────────────────────────────────────────────────────────────

/// Plain aligned table: first column left-aligned, the rest right-aligned.
struct TextTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl TextTable {
    fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    fn widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (w, cell) in widths.iter_mut().zip(row) {
                *w = (*w).max(cell.chars().count());
            }
        }
        widths
    }

    fn write_line<W: Write>(out: &mut W, cells: &[String], widths: &[usize]) -> Result<()> {
        let line: Vec<String> = cells
            .iter()
            .zip(widths)
            .enumerate()
            .map(|(i, (cell, w))| {
                // `{:<w$}` pads by char count, which matters for `…`.
                if i == 0 {
                    format!("{:<w$}", cell, w = *w)
                } else {
                    pad_left(cell, *w)
                }
            })
            .collect();
        writeln!(out, "{}", line.join("  ").trim_end())?;
        Ok(())
    }

    fn write_to<W: Write>(&self, mut out: W) -> Result<()> {
        let widths = self.widths();
        Self::write_line(&mut out, &self.headers, &widths)?;
        let rule: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
        writeln!(out, "{}", rule.join("  "))?;
        for row in &self.rows {
            Self::write_line(&mut out, row, &widths)?;
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
