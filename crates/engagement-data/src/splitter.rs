//! Partition of validated events into ownership and usage facts.

use std::collections::{BTreeMap, BTreeSet};

use engagement_core::config::UsageAggregation;
use engagement_core::models::{Event, EventKind, OwnershipFact, UsageFact};

/// Ownership and usage facts of one event log, plus its user universe.
///
/// Facts are ordered by `(user_id, item_id)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplitEvents {
    pub ownership: Vec<OwnershipFact>,
    pub usage: Vec<UsageFact>,
    /// Every user with at least one accepted event.
    pub users: BTreeSet<String>,
    /// Usage events folded into `usage`.
    pub usage_events: u64,
    /// Ownership events, duplicates included.
    pub ownership_events: u64,
}

impl SplitEvents {
    pub fn total_users(&self) -> u64 {
        self.users.len() as u64
    }
}

/// Stateless helper that splits an event stream into fact sets.
pub struct EventSplitter;

impl EventSplitter {
    /// Split `events`, collapsing repeated pairs.
    ///
    /// Duplicate ownership pairs collapse to one fact. Repeated usage pairs
    /// combine their amounts with `strategy`.
    pub fn split<I>(events: I, strategy: UsageAggregation) -> SplitEvents
    where
        I: IntoIterator<Item = Event>,
    {
        let mut owned: BTreeSet<(String, String)> = BTreeSet::new();
        let mut used: BTreeMap<(String, String), f64> = BTreeMap::new();
        let mut users: BTreeSet<String> = BTreeSet::new();
        let mut usage_events = 0u64;
        let mut ownership_events = 0u64;

        for event in events {
            if !users.contains(&event.user_id) {
                users.insert(event.user_id.clone());
            }
            match event.kind {
                EventKind::Ownership => {
                    ownership_events += 1;
                    owned.insert((event.user_id, event.item_id));
                }
                EventKind::Usage => {
                    usage_events += 1;
                    used.entry((event.user_id, event.item_id))
                        .and_modify(|hours| *hours = strategy.combine(*hours, event.amount))
                        .or_insert(event.amount);
                }
            }
        }

        SplitEvents {
            ownership: owned
                .into_iter()
                .map(|(user_id, item_id)| OwnershipFact { user_id, item_id })
                .collect(),
            usage: used
                .into_iter()
                .map(|((user_id, item_id), hours)| UsageFact {
                    user_id,
                    item_id,
                    hours,
                })
                .collect(),
            users,
            usage_events,
            ownership_events,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
