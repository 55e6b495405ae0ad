//! Adaptive question selection.
//!
//! A request is filled in priority stages: review-due items first (capped),
//! then weak-topic items (capped), then exam-weighted or uniform filler.
//! The final set is shuffled so stage ordering never leaks into
//! presentation order.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use tracing::debug;

use crate::config::EngineConfig;
use crate::scheduler;
use crate::types::{EngineState, Item, TopicId};

#[derive(Debug, Clone, Default)]
pub struct SelectionCriteria {
    /// Restrict to these topics; `None` means all.
    pub topics: Option<Vec<TopicId>>,
    pub count: usize,
    pub exclude_recent: bool,
    pub prioritize_weak: bool,
    pub include_review_due: bool,
    /// Fill the remainder with topic-weight-proportional sampling instead
    /// of uniform filler.
    pub exam_weighted: bool,
}

/// Selection outcome. A pool smaller than the request is not an error;
/// `shortfall` carries the number of unfilled slots.
#[derive(Debug, Clone)]
pub struct Selection {
    pub items: Vec<Item>,
    pub shortfall: usize,
}

pub fn select(
    pool: &[Item],
    state: &EngineState,
    config: &EngineConfig,
    criteria: &SelectionCriteria,
    now: DateTime<Utc>,
    rng: &mut dyn RngCore,
) -> Selection {
    let mut chosen: Vec<&Item> = Vec::with_capacity(criteria.count);
    let mut used: HashSet<&str> = HashSet::new();

    let available: Vec<&Item> = pool
        .iter()
        .filter(|item| match &criteria.topics {
            Some(topics) => topics.contains(&item.topic),
            None => true,
        })
        .filter(|item| !criteria.exclude_recent || !state.recently_seen_contains(&item.id))
        .collect();

    if criteria.include_review_due {
        let cap = (criteria.count as f64 * config.selection.review_cap_ratio).ceil() as usize;
        let mut due: Vec<&Item> = available
            .iter()
            .copied()
            .filter(|item| {
                state
                    .items
                    .get(&item.id)
                    .is_some_and(|h| scheduler::is_due(h, now))
            })
            .collect();
        // Most overdue first.
        due.sort_by_key(|item| state.items[&item.id].next_review);

        for item in due.into_iter().take(cap) {
            if used.insert(&item.id) {
                chosen.push(item);
            }
        }
    }

    if criteria.prioritize_weak && chosen.len() < criteria.count {
        let cap = (criteria.count as f64 * config.selection.weak_cap_ratio).ceil() as usize;
        let mut taken = 0usize;

        'topics: for topic in state.weak_topics(config) {
            let mut from_topic = 0usize;
            for item in available.iter().copied().filter(|i| i.topic == topic) {
                if taken >= cap || chosen.len() >= criteria.count {
                    break 'topics;
                }
                if from_topic >= config.selection.per_topic_weak_cap {
                    break;
                }
                if used.insert(&item.id) {
                    chosen.push(item);
                    taken += 1;
                    from_topic += 1;
                }
            }
        }
    }

    if chosen.len() < criteria.count {
        let remainder: Vec<&Item> = available
            .iter()
            .copied()
            .filter(|item| !used.contains(item.id.as_str()))
            .collect();

        if criteria.exam_weighted {
            fill_exam_weighted(&mut chosen, remainder, criteria.count, config, rng);
        } else {
            let mut remainder = remainder;
            remainder.shuffle(rng);
            chosen.extend(remainder.into_iter().take(criteria.count - chosen.len()));
        }
    }

    chosen.shuffle(rng);

    let shortfall = criteria.count.saturating_sub(chosen.len());
    if shortfall > 0 {
        debug!(
            requested = criteria.count,
            delivered = chosen.len(),
            "selection pool exhausted"
        );
    }

    Selection {
        items: chosen.into_iter().cloned().collect(),
        shortfall,
    }
}

/// Sampling without replacement where each draw picks a topic with
/// probability proportional to its exam weight, then a random item of that
/// topic.
fn fill_exam_weighted<'a>(
    chosen: &mut Vec<&'a Item>,
    remainder: Vec<&'a Item>,
    count: usize,
    config: &EngineConfig,
    rng: &mut dyn RngCore,
) {
    let mut by_topic: HashMap<TopicId, Vec<&Item>> = HashMap::new();
    for item in remainder {
        by_topic.entry(item.topic).or_default().push(item);
    }

    while chosen.len() < count {
        let total: f64 = by_topic.keys().map(|t| config.weight(*t)).sum();
        if total <= 0.0 || by_topic.is_empty() {
            break;
        }

        let mut draw = rng.random::<f64>() * total;
        let mut picked = None;
        for topic in by_topic.keys() {
            draw -= config.weight(*topic);
            if draw <= 0.0 {
                picked = Some(*topic);
                break;
            }
        }
        let topic = match picked.or_else(|| by_topic.keys().next().copied()) {
            Some(topic) => topic,
            None => break,
        };

        let items = match by_topic.get_mut(&topic) {
            Some(items) if !items.is_empty() => items,
            _ => {
                by_topic.remove(&topic);
                continue;
            }
        };
        let idx = rng.random_range(0..items.len());
        chosen.push(items.swap_remove(idx));
        if items.is_empty() {
            by_topic.remove(&topic);
        }
    }
}
