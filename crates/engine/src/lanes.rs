//! Three-lane priority queue with strict lane ordering.
//!
//! FIFO within each lane; `high` always drains before `normal`, which
//! always drains before `low`. Sustained high-lane load can therefore
//! starve the lower lanes indefinitely. This is accepted policy: callers
//! rely on tier-based preferential service, so no aging or fairness
//! mechanism is applied.

use std::collections::VecDeque;

use uuid::Uuid;

use crate::entry::{Lane, QueueEntry};

/// Holds all queued entries across the three priority lanes.
#[derive(Debug, Default)]
pub struct LaneSet {
    high: VecDeque<QueueEntry>,
    normal: VecDeque<QueueEntry>,
    low: VecDeque<QueueEntry>,
}

impl LaneSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn lane(&self, lane: Lane) -> &VecDeque<QueueEntry> {
        match lane {
            Lane::High => &self.high,
            Lane::Normal => &self.normal,
            Lane::Low => &self.low,
        }
    }

    fn lane_mut(&mut self, lane: Lane) -> &mut VecDeque<QueueEntry> {
        match lane {
            Lane::High => &mut self.high,
            Lane::Normal => &mut self.normal,
            Lane::Low => &mut self.low,
        }
    }

    /// Enqueue a freshly admitted entry at the back of its lane.
    pub fn push_back(&mut self, entry: QueueEntry) {
        self.lane_mut(entry.lane).push_back(entry);
    }

    /// Re-insert a retried entry at the front of its lane, so it does not
    /// lose its relative priority to freshly admitted work.
    pub fn push_front(&mut self, entry: QueueEntry) {
        self.lane_mut(entry.lane).push_front(entry);
    }

    /// Remove and return the next entry by strict lane priority.
    pub fn next(&mut self) -> Option<QueueEntry> {
        self.high
            .pop_front()
            .or_else(|| self.normal.pop_front())
            .or_else(|| self.low.pop_front())
    }

    /// Total queued entries across all lanes.
    pub fn len(&self) -> usize {
        self.high.len() + self.normal.len() + self.low.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn lane_len(&self, lane: Lane) -> usize {
        self.lane(lane).len()
    }

    /// 1-based serve position of an entry: how many dequeues (including its
    /// own) happen before it leaves the queue, given strict lane priority.
    pub fn serve_position(&self, id: Uuid) -> Option<usize> {
        let mut offset = 0;
        for lane in [Lane::High, Lane::Normal, Lane::Low] {
            let q = self.lane(lane);
            if let Some(idx) = q.iter().position(|e| e.id == id) {
                return Some(offset + idx + 1);
            }
            offset += q.len();
        }
        None
    }

    /// Linear scan for a queued entry by id.
    pub fn find(&self, id: Uuid) -> Option<&QueueEntry> {
        self.high
            .iter()
            .chain(self.normal.iter())
            .chain(self.low.iter())
            .find(|e| e.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schleuse_core::{GenerationRequest, PriorityHint, Tier};
    use std::time::Duration;

    fn entry(tier: Tier, hint: Option<PriorityHint>) -> QueueEntry {
        let mut req = GenerationRequest::new("owner", tier, "draft", serde_json::json!({}));
        req.priority_hint = hint;
        QueueEntry::admit(req, Duration::from_secs(60))
    }

    #[test]
    fn next_respects_strict_lane_priority() {
        let mut lanes = LaneSet::new();
        let low = entry(Tier::Free, None);
        let normal = entry(Tier::Paid, None);
        let high = entry(Tier::Premium, None);

        // Admit in reverse priority order; dispatch must ignore arrival order.
        lanes.push_back(low.clone());
        lanes.push_back(normal.clone());
        lanes.push_back(high.clone());

        assert_eq!(lanes.next().unwrap().id, high.id);
        assert_eq!(lanes.next().unwrap().id, normal.id);
        assert_eq!(lanes.next().unwrap().id, low.id);
        assert!(lanes.next().is_none());
    }

    #[test]
    fn fifo_within_a_lane() {
        let mut lanes = LaneSet::new();
        let first = entry(Tier::Paid, None);
        let second = entry(Tier::Paid, None);
        lanes.push_back(first.clone());
        lanes.push_back(second.clone());

        assert_eq!(lanes.next().unwrap().id, first.id);
        assert_eq!(lanes.next().unwrap().id, second.id);
    }

    #[test]
    fn push_front_jumps_ahead_of_same_lane_work() {
        let mut lanes = LaneSet::new();
        let fresh = entry(Tier::Free, None);
        let retried = entry(Tier::Free, None);
        lanes.push_back(fresh.clone());
        lanes.push_front(retried.clone());

        assert_eq!(lanes.next().unwrap().id, retried.id);
        assert_eq!(lanes.next().unwrap().id, fresh.id);
    }

    #[test]
    fn serve_position_counts_across_lanes() {
        let mut lanes = LaneSet::new();
        let h1 = entry(Tier::Premium, None);
        let h2 = entry(Tier::Premium, None);
        let n1 = entry(Tier::Paid, None);
        let l1 = entry(Tier::Free, None);

        lanes.push_back(l1.clone());
        lanes.push_back(h1.clone());
        lanes.push_back(n1.clone());
        lanes.push_back(h2.clone());

        assert_eq!(lanes.serve_position(h1.id), Some(1));
        assert_eq!(lanes.serve_position(h2.id), Some(2));
        assert_eq!(lanes.serve_position(n1.id), Some(3));
        assert_eq!(lanes.serve_position(l1.id), Some(4));
        assert_eq!(lanes.serve_position(Uuid::new_v4()), None);
    }

    #[test]
    fn len_and_find() {
        let mut lanes = LaneSet::new();
        assert!(lanes.is_empty());

        let e = entry(Tier::Free, Some(PriorityHint::Urgent));
        lanes.push_back(e.clone());

        assert_eq!(lanes.len(), 1);
        assert_eq!(lanes.lane_len(Lane::High), 1);
        assert_eq!(lanes.find(e.id).unwrap().id, e.id);
        assert!(lanes.find(Uuid::new_v4()).is_none());
    }
}
