use serde::{Deserialize, Serialize};

/// What a single row of the event log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// The user acquired the item. The amount column carries no meaning.
    Ownership,
    /// The user spent time with the item. The amount is in hours.
    Usage,
}

/// One validated row of the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Opaque user identifier, unique per user.
    pub user_id: String,
    /// Game name, used as the natural key of an item.
    pub item_id: String,
    /// Ownership or usage.
    pub kind: EventKind,
    /// Usage hours for [`EventKind::Usage`]; ignored for ownership.
    /// Always finite, and never negative for usage events.
    pub amount: f64,
}

/// A distinct `(user, item)` ownership pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OwnershipFact {
    pub user_id: String,
    pub item_id: String,
}

/// Hours a user spent on an item, collapsed to one value per pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageFact {
    pub user_id: String,
    pub item_id: String,
    pub hours: f64,
}

/// Upper and lower quantiles of an hours distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Percentiles {
    pub p25: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
}

/// Per-game aggregate computed once per pipeline run.
///
/// Distribution statistics are `None` when the item has no players, so that
/// "no data" never reads as a measured zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemSummary {
    /// Game name.
    pub item_id: String,
    /// Distinct users owning the item.
    pub owners: u64,
    /// Distinct users with a positive usage record.
    pub players: u64,
    /// Owners who also have a positive usage record.
    pub owner_players: u64,
    /// Usage facts for the item, including zero-hour ones.
    pub usage_records: u64,
    /// Players whose hours exceed the retention threshold.
    pub retained: u64,
    /// Sum of hours over all players.
    pub total_hours: f64,
    pub mean_hours: Option<f64>,
    pub median_hours: Option<f64>,
    /// Sample standard deviation; needs at least two players.
    pub std_hours: Option<f64>,
    pub percentiles: Option<Percentiles>,
    /// The players' hours, sorted ascending.
    #[serde(skip)]
    pub hours: Vec<f64>,
}

/// Per-user aggregate used for population-level inequality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub user_id: String,
    /// Distinct items the user owns.
    pub owned_count: u64,
    /// Distinct items the user played for more than zero hours.
    pub played_count: u64,
    pub total_hours: f64,
}

/// Ratios, inequality measures and composite scores for one game.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemDerivedMetrics {
    pub item_id: String,
    /// Share of owners with a positive usage record; 0 when nobody owns the item.
    pub play_rate: f64,
    /// Share of owners who never played; 0 when nobody owns the item.
    pub backlog_rate: f64,
    /// `players / owners`, counting players who do not own the item.
    /// Undefined when nobody owns it.
    pub players_per_owner: Option<f64>,
    /// `owners / total_users`.
    pub ownership_rate: f64,
    /// `owners / non_owners`; undefined when every user owns the item.
    pub ownership_odds: Option<f64>,
    /// Share of players above the retention threshold; 0 without players.
    pub retention_rate: f64,
    /// Gini coefficient of the hours distribution.
    pub gini: Option<f64>,
    pub mean_median_gap: Option<f64>,
    pub mean_median_ratio: Option<f64>,
    pub iqr: Option<f64>,
    /// `p90 / median`.
    pub tail_ratio: Option<f64>,
    pub coefficient_of_variation: Option<f64>,
    /// `players × retention_rate`.
    pub keeper_score: f64,
    /// Weighted rank-percentile score in `[0, 1]`.
    pub success_score: f64,
}

/// One point of a Lorenz curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LorenzPoint {
    /// Cumulative share of the population, ascending by value.
    pub population_share: f64,
    /// Cumulative share of the total value held by that population.
    pub value_share: f64,
}

/// Inequality of total hours across all users.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopulationInequality {
    pub users: u64,
    pub total_hours: f64,
    /// Starts at `(0, 0)` and ends at `(1, 1)` unless all hours are zero.
    pub lorenz: Vec<LorenzPoint>,
    pub gini: Option<f64>,
}
