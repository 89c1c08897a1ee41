//! Ratios, inequality measures and composite scores derived from summaries.

use engagement_core::config::MetricWeights;
use engagement_core::models::{
    ItemDerivedMetrics, ItemSummary, PopulationInequality, UserSummary,
};
use engagement_core::stats::{self, checked_ratio, ratio_or_zero};
use tracing::debug;

/// Stateless helper that turns aggregates into derived metrics.
pub struct MetricCalculator;

impl MetricCalculator {
    /// Derived metrics for every item, in the order of `items`.
    ///
    /// `total_users` is the size of the user universe. The success score
    /// ranks each item against all of `items`, so callers filter afterwards.
    pub fn derive_all(
        items: &[ItemSummary],
        total_users: u64,
        weights: &MetricWeights,
    ) -> Vec<ItemDerivedMetrics> {
        let mut derived: Vec<ItemDerivedMetrics> = items
            .iter()
            .map(|item| Self::derive_item(item, total_users))
            .collect();

        let scores = Self::success_scores(items, &derived, weights);
        for (metrics, score) in derived.iter_mut().zip(scores) {
            metrics.success_score = score;
        }
        debug!("Derived metrics for {} items", derived.len());
        derived
    }

    /// Metrics for one item; `success_score` is left at 0.
    pub fn derive_item(item: &ItemSummary, total_users: u64) -> ItemDerivedMetrics {
        let owners = item.owners as f64;
        let players = item.players as f64;

        // Only owners count towards play and backlog rates.
        let play_rate = ratio_or_zero(item.owner_players as f64, owners);
        let backlog_rate = ratio_or_zero(item.owners.saturating_sub(item.owner_players) as f64, owners);

        let non_owners = total_users.saturating_sub(item.owners) as f64;
        let retention_rate = ratio_or_zero(item.retained as f64, players);

        let mean = item.mean_hours;
        let median = item.median_hours;
        let nonzero_median = median.filter(|m| *m != 0.0);

        ItemDerivedMetrics {
            item_id: item.item_id.clone(),
            play_rate,
            backlog_rate,
            players_per_owner: checked_ratio(players, owners),
            ownership_rate: ratio_or_zero(owners, total_users as f64),
            ownership_odds: checked_ratio(owners, non_owners),
            retention_rate,
            gini: stats::gini(&item.hours),
            mean_median_gap: mean.zip(median).map(|(m, md)| m - md),
            mean_median_ratio: mean.zip(nonzero_median).map(|(m, md)| m / md),
            iqr: item.percentiles.map(|p| p.p75 - p.p25),
            tail_ratio: item
                .percentiles
                .zip(nonzero_median)
                .map(|(p, md)| p.p90 / md),
            coefficient_of_variation: item
                .std_hours
                .zip(mean)
                .and_then(|(s, m)| checked_ratio(s, m)),
            keeper_score: players * retention_rate,
            success_score: 0.0,
        }
    }

    /// Weighted rank-percentile score per item.
    ///
    /// Components are the ranks of `ownership_rate`, `mean_hours` (undefined
    /// ranks as 0) and `retention_rate`, each in `(0, 1]`.
    pub fn success_scores(
        items: &[ItemSummary],
        derived: &[ItemDerivedMetrics],
        weights: &MetricWeights,
    ) -> Vec<f64> {
        let ownership: Vec<f64> = derived.iter().map(|d| d.ownership_rate).collect();
        let engagement: Vec<f64> = items.iter().map(|i| i.mean_hours.unwrap_or(0.0)).collect();
        let retention: Vec<f64> = derived.iter().map(|d| d.retention_rate).collect();

        let ownership = stats::rank_percentiles(&ownership);
        let engagement = stats::rank_percentiles(&engagement);
        let retention = stats::rank_percentiles(&retention);

        let total = weights.total();
        (0..derived.len())
            .map(|i| {
                let weighted = weights.ownership * ownership[i]
                    + weights.engagement * engagement[i]
                    + weights.retention * retention[i];
                ratio_or_zero(weighted, total)
            })
            .collect()
    }

    /// Lorenz curve and Gini of total hours across every user.
    pub fn population_inequality(users: &[UserSummary]) -> PopulationInequality {
        let hours: Vec<f64> = users.iter().map(|u| u.total_hours).collect();
        PopulationInequality {
            users: users.len() as u64,
            total_hours: hours.iter().sum(),
            lorenz: stats::lorenz_curve(&hours),
            gini: stats::gini(&hours),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
