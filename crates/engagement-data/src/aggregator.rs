//! Per-game and per-user aggregation of ownership and usage facts.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};

use engagement_core::config::PipelineConfig;
use engagement_core::models::{ItemSummary, Percentiles, UserSummary};
use engagement_core::stats::{self, PercentileMethod};
use serde::Serialize;
use tracing::debug;

use crate::splitter::SplitEvents;

// ── AggregationOptions ────────────────────────────────────────────────────────

/// The parts of [`PipelineConfig`] the aggregator depends on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregationOptions {
    pub retention_threshold_hours: f64,
    pub percentile_method: PercentileMethod,
}

impl From<&PipelineConfig> for AggregationOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            retention_threshold_hours: config.retention_threshold_hours,
            percentile_method: config.percentile_method,
        }
    }
}

impl Default for AggregationOptions {
    fn default() -> Self {
        AggregationOptions::from(&PipelineConfig::default())
    }
}

// ── Aggregates ────────────────────────────────────────────────────────────────

/// Output of the aggregation stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Aggregates {
    /// One summary per item seen in either fact set, ordered by `item_id`.
    pub items: Vec<ItemSummary>,
    /// One summary per user in the user universe, ordered by `user_id`.
    pub users: Vec<UserSummary>,
    pub total_users: u64,
}

// ── ItemAccumulator ───────────────────────────────────────────────────────────

/// Running counts for one item.
///
/// Ownership facts must be added before usage facts so that players can be
/// matched against owners.
#[derive(Debug, Default)]
struct ItemAccumulator<'a> {
    owners: BTreeSet<&'a str>,
    owner_players: u64,
    usage_records: u64,
    hours: Vec<f64>,
}

impl<'a> ItemAccumulator<'a> {
    fn add_owner(&mut self, user_id: &'a str) {
        self.owners.insert(user_id);
    }

    fn add_usage(&mut self, user_id: &str, hours: f64) {
        self.usage_records += 1;
        if hours > 0.0 {
            self.hours.push(hours);
            if self.owners.contains(user_id) {
                self.owner_players += 1;
            }
        }
    }

    fn finish(mut self, item_id: String, options: &AggregationOptions) -> ItemSummary {
        self.hours.sort_by(f64::total_cmp);
        let hours = self.hours;
        let method = options.percentile_method;
        let at = |p: f64| stats::percentile(&hours, p, method);

        let percentiles = match (at(25.0), at(75.0), at(90.0), at(95.0)) {
            (Some(p25), Some(p75), Some(p90), Some(p95)) => Some(Percentiles { p25, p75, p90, p95 }),
            _ => None,
        };

        ItemSummary {
            item_id,
            owners: self.owners.len() as u64,
            players: hours.len() as u64,
            owner_players: self.owner_players,
            usage_records: self.usage_records,
            retained: hours
                .iter()
                .filter(|h| **h > options.retention_threshold_hours)
                .count() as u64,
            total_hours: hours.iter().sum(),
            mean_hours: stats::mean(&hours),
            median_hours: stats::median(&hours),
            std_hours: stats::sample_std(&hours),
            percentiles,
            hours,
        }
    }
}

// ── EntityAggregator ──────────────────────────────────────────────────────────

/// Stateless helper that builds item and user summaries.
pub struct EntityAggregator;

impl EntityAggregator {
    /// Aggregate on the calling thread.
    pub fn aggregate(split: &SplitEvents, options: &AggregationOptions) -> Aggregates {
        let items = Self::summarize_items(split, options, |_| true);
        Self::assemble(split, items)
    }

    /// Aggregate with items partitioned across `shards` scoped threads.
    ///
    /// Each shard owns the items whose name hashes to it and accumulates
    /// them without sharing state. The merged result is identical to
    /// [`EntityAggregator::aggregate`].
    pub fn aggregate_sharded(
        split: &SplitEvents,
        options: &AggregationOptions,
        shards: usize,
    ) -> Aggregates {
        if shards <= 1 {
            return Self::aggregate(split, options);
        }

        let mut items: Vec<ItemSummary> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..shards)
                .map(|shard| {
                    scope.spawn(move || {
                        Self::summarize_items(split, options, |item| {
                            shard_of(item, shards) == shard
                        })
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|h| match h.join() {
                    Ok(items) => items,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        });
        items.sort_by(|a, b| a.item_id.cmp(&b.item_id));
        debug!("Merged {} item summaries from {} shards", items.len(), shards);

        Self::assemble(split, items)
    }

    // ── Private ───────────────────────────────────────────────────────────────

    fn assemble(split: &SplitEvents, items: Vec<ItemSummary>) -> Aggregates {
        Aggregates {
            items,
            users: Self::summarize_users(split),
            total_users: split.total_users(),
        }
    }

    /// Summaries for every item accepted by `owns`, ordered by `item_id`.
    fn summarize_items(
        split: &SplitEvents,
        options: &AggregationOptions,
        owns: impl Fn(&str) -> bool,
    ) -> Vec<ItemSummary> {
        let mut map: BTreeMap<&str, ItemAccumulator> = BTreeMap::new();

        for fact in split.ownership.iter().filter(|f| owns(&f.item_id)) {
            map.entry(fact.item_id.as_str())
                .or_default()
                .add_owner(&fact.user_id);
        }
        for fact in split.usage.iter().filter(|f| owns(&f.item_id)) {
            map.entry(fact.item_id.as_str())
                .or_default()
                .add_usage(&fact.user_id, fact.hours);
        }

        map.into_iter()
            .map(|(item_id, acc)| acc.finish(item_id.to_string(), options))
            .collect()
    }

    fn summarize_users(split: &SplitEvents) -> Vec<UserSummary> {
        let mut map: BTreeMap<&str, UserSummary> = split
            .users
            .iter()
            .map(|u| {
                (
                    u.as_str(),
                    UserSummary {
                        user_id: u.clone(),
                        owned_count: 0,
                        played_count: 0,
                        total_hours: 0.0,
                    },
                )
            })
            .collect();

        for fact in &split.ownership {
            if let Some(summary) = map.get_mut(fact.user_id.as_str()) {
                summary.owned_count += 1;
            }
        }
        for fact in &split.usage {
            if let Some(summary) = map.get_mut(fact.user_id.as_str()) {
                summary.total_hours += fact.hours;
                if fact.hours > 0.0 {
                    summary.played_count += 1;
                }
            }
        }

        map.into_values().collect()
    }
}

/// Shard index of an item name.
fn shard_of(item_id: &str, shards: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    item_id.hash(&mut hasher);
    (hasher.finish() % shards as u64) as usize
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::splitter::EventSplitter;
    use engagement_core::config::UsageAggregation;
    use engagement_core::models::{Event, EventKind};

    fn event(user: &str, item: &str, kind: EventKind, amount: f64) -> Event {
        Event {
            user_id: user.to_string(),
            item_id: item.to_string(),
            kind,
            amount,
        }
    }

    fn aggregate(events: Vec<Event>) -> Aggregates {
        let split = EventSplitter::split(events, UsageAggregation::Sum);
        EntityAggregator::aggregate(&split, &AggregationOptions::default())
    }

    fn find<'a>(aggregates: &'a Aggregates, item_id: &str) -> Option<&'a ItemSummary> {
        aggregates.items.iter().find(|s| s.item_id == item_id)
    }

    // ── items ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_owned_and_played_item() {
        let aggregates = aggregate(vec![
            event("U1", "A", EventKind::Ownership, 0.0),
            event("U1", "A", EventKind::Usage, 5.0),
            event("U2", "A", EventKind::Ownership, 0.0),
        ]);
        let a = find(&aggregates, "A").unwrap();
        assert_eq!(a.owners, 2);
        assert_eq!(a.players, 1);
        assert_eq!(a.total_hours, 5.0);
        assert_eq!(a.mean_hours, Some(5.0));
        assert_eq!(a.median_hours, Some(5.0));
        assert_eq!(a.std_hours, None);
        assert_eq!(a.percentiles.unwrap().p95, 5.0);
    }

    #[test]
    fn test_ownership_only_item() {
        let aggregates = aggregate(vec![
            event("U1", "Backlog", EventKind::Ownership, 1.0),
            event("U2", "Backlog", EventKind::Ownership, 1.0),
        ]);
        let item = find(&aggregates, "Backlog").unwrap();
        assert_eq!(item.owners, 2);
        assert_eq!(item.players, 0);
        assert_eq!(item.total_hours, 0.0);
        assert_eq!(item.mean_hours, None);
        assert_eq!(item.median_hours, None);
        assert!(item.percentiles.is_none());
        assert!(item.hours.is_empty());
    }

    #[test]
    fn test_usage_only_item_has_zero_owners() {
        let aggregates = aggregate(vec![event("U1", "Free", EventKind::Usage, 2.0)]);
        let item = find(&aggregates, "Free").unwrap();
        assert_eq!(item.owners, 0);
        assert_eq!(item.players, 1);
    }

    #[test]
    fn test_owner_players_excludes_non_owners() {
        let aggregates = aggregate(vec![
            event("U1", "A", EventKind::Ownership, 1.0),
            event("U1", "A", EventKind::Usage, 5.0),
            event("U2", "A", EventKind::Usage, 5.0),
            event("U3", "A", EventKind::Ownership, 1.0),
        ]);
        let item = find(&aggregates, "A").unwrap();
        assert_eq!(item.owners, 2);
        assert_eq!(item.players, 2);
        assert_eq!(item.owner_players, 1);
    }

    #[test]
    fn test_zero_hour_usage_is_not_a_player() {
        let aggregates = aggregate(vec![
            event("U1", "A", EventKind::Usage, 0.0),
            event("U2", "A", EventKind::Usage, 4.0),
        ]);
        let item = find(&aggregates, "A").unwrap();
        assert_eq!(item.usage_records, 2);
        assert_eq!(item.players, 1);
        assert_eq!(item.hours, vec![4.0]);
    }

    #[test]
    fn test_distribution_statistics() {
        let events = [1.0, 2.0, 3.0, 4.0, 10.0]
            .iter()
            .enumerate()
            .map(|(i, h)| event(&format!("U{i}"), "A", EventKind::Usage, *h))
            .collect();
        let aggregates = aggregate(events);
        let item = find(&aggregates, "A").unwrap();
        assert_eq!(item.players, 5);
        assert_eq!(item.total_hours, 20.0);
        assert_eq!(item.mean_hours, Some(4.0));
        assert_eq!(item.median_hours, Some(3.0));
        // Threshold 3h: only 4h and 10h are strictly above.
        assert_eq!(item.retained, 2);
        let p = item.percentiles.unwrap();
        assert_eq!(p.p25, 2.0);
        assert_eq!(p.p75, 4.0);
        assert!((p.p90 - 7.6).abs() < 1e-9);
        assert!(item.std_hours.unwrap() > 0.0);
    }

    #[test]
    fn test_percentile_method_option() {
        let split = EventSplitter::split(
            vec![
                event("U1", "A", EventKind::Usage, 10.0),
                event("U2", "A", EventKind::Usage, 20.0),
            ],
            UsageAggregation::Sum,
        );
        let options = AggregationOptions {
            percentile_method: PercentileMethod::Lower,
            ..AggregationOptions::default()
        };
        let aggregates = EntityAggregator::aggregate(&split, &options);
        let p = aggregates.items[0].percentiles.unwrap();
        assert_eq!(p.p75, 10.0);
        // The median stays the conventional one.
        assert_eq!(aggregates.items[0].median_hours, Some(15.0));
    }

    #[test]
    fn test_items_sorted_by_name() {
        let aggregates = aggregate(vec![
            event("U1", "Zeta", EventKind::Ownership, 1.0),
            event("U1", "Alpha", EventKind::Usage, 1.0),
            event("U1", "Mid", EventKind::Ownership, 1.0),
        ]);
        let names: Vec<&str> = aggregates.items.iter().map(|i| i.item_id.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Mid", "Zeta"]);
        assert!(find(&aggregates, "Nope").is_none());
    }

    // ── users ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_user_summaries() {
        let aggregates = aggregate(vec![
            event("U1", "A", EventKind::Ownership, 1.0),
            event("U1", "B", EventKind::Ownership, 1.0),
            event("U1", "A", EventKind::Usage, 3.0),
            event("U1", "B", EventKind::Usage, 0.0),
            event("U2", "A", EventKind::Ownership, 1.0),
        ]);
        assert_eq!(aggregates.total_users, 2);
        assert_eq!(aggregates.users.len(), 2);
        let u1 = &aggregates.users[0];
        assert_eq!(u1.user_id, "U1");
        assert_eq!(u1.owned_count, 2);
        assert_eq!(u1.played_count, 1);
        assert_eq!(u1.total_hours, 3.0);
        let u2 = &aggregates.users[1];
        assert_eq!(u2.owned_count, 1);
        assert_eq!(u2.total_hours, 0.0);
    }

    // ── sharding ──────────────────────────────────────────────────────────────

    #[test]
    fn test_sharded_matches_reference() {
        let mut events = Vec::new();
        for u in 0..40 {
            for g in 0..15 {
                if (u + g) % 3 != 0 {
                    events.push(event(&format!("U{u}"), &format!("Game {g}"), EventKind::Ownership, 1.0));
                }
                if (u * g) % 4 == 1 {
                    let hours = (u as f64 * 1.37 + g as f64 * 0.11) % 50.0;
                    events.push(event(&format!("U{u}"), &format!("Game {g}"), EventKind::Usage, hours));
                }
            }
        }
        let split = EventSplitter::split(events, UsageAggregation::Sum);
        let options = AggregationOptions::default();
        let reference = EntityAggregator::aggregate(&split, &options);
        for shards in [1, 2, 3, 8] {
            let sharded = EntityAggregator::aggregate_sharded(&split, &options, shards);
            assert_eq!(sharded, reference, "shards = {shards}");
        }
    }

    #[test]
    fn test_shard_of_is_in_range() {
        for name in ["Dota 2", "Team Fortress 2", "Counter-Strike", ""] {
            assert!(shard_of(name, 4) < 4);
        }
    }
}
