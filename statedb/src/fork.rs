// Copyright 2022-2024 Basalt Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT
//! Pluggable fork-choice comparators.
//!
//! A comparator only orders two finalized tips; the tree breaks ties by
//! block-id lexicographic order so every algorithm stays deterministic.

use std::cmp::Ordering;

use crate::node::NodeSummary;

pub trait ForkChoice: Send + Sync {
    /// How `candidate` compares against the `current` head. `Greater` makes
    /// the candidate the new head; `Equal` defers to the id tie-break.
    fn prefer(&self, current: &NodeSummary, candidate: &NodeSummary) -> Ordering;
}

/// Insertion order: the first finalized tip at the greatest height wins.
#[derive(Debug, Default)]
pub struct FifoForkChoice;

impl ForkChoice for FifoForkChoice {
    fn prefer(&self, current: &NodeSummary, candidate: &NodeSummary) -> Ordering {
        candidate
            .height
            .cmp(&current.height)
            .then(current.insertion.cmp(&candidate.insertion))
    }
}

/// Greatest height, then earliest block timestamp.
#[derive(Debug, Default)]
pub struct BlockTimeForkChoice;

impl ForkChoice for BlockTimeForkChoice {
    fn prefer(&self, current: &NodeSummary, candidate: &NodeSummary) -> Ordering {
        candidate
            .height
            .cmp(&current.height)
            .then(current.timestamp.cmp(&candidate.timestamp))
    }
}

/// Proof-of-burn: an externally supplied weight, then height.
pub struct PobForkChoice {
    weight: Box<dyn Fn(&NodeSummary) -> u128 + Send + Sync>,
}

impl PobForkChoice {
    pub fn new(weight: impl Fn(&NodeSummary) -> u128 + Send + Sync + 'static) -> Self {
        PobForkChoice {
            weight: Box::new(weight),
        }
    }
}

impl ForkChoice for PobForkChoice {
    fn prefer(&self, current: &NodeSummary, candidate: &NodeSummary) -> Ordering {
        (self.weight)(candidate)
            .cmp(&(self.weight)(current))
            .then(candidate.height.cmp(&current.height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeHandle;

    fn summary(height: u64, timestamp: u64, insertion: u64) -> NodeSummary {
        NodeSummary {
            handle: NodeHandle(insertion),
            block_id: Some(vec![insertion as u8]),
            height,
            timestamp,
            insertion,
            finalized: true,
        }
    }

    #[test]
    fn fifo_keeps_first_at_equal_height() {
        let algo = FifoForkChoice;
        let current = summary(1, 50, 1);
        let later = summary(1, 10, 2);
        assert_eq!(algo.prefer(&current, &later), Ordering::Less);
        let taller = summary(2, 99, 3);
        assert_eq!(algo.prefer(&current, &taller), Ordering::Greater);
    }

    #[test]
    fn block_time_prefers_earlier_sibling() {
        let algo = BlockTimeForkChoice;
        let current = summary(1, 50, 1);
        let earlier = summary(1, 10, 2);
        assert_eq!(algo.prefer(&current, &earlier), Ordering::Greater);
    }

    #[test]
    fn pob_orders_by_external_weight() {
        let algo = PobForkChoice::new(|s| s.timestamp as u128);
        let current = summary(5, 10, 1);
        let heavier = summary(1, 90, 2);
        assert_eq!(algo.prefer(&current, &heavier), Ordering::Greater);
    }
}
