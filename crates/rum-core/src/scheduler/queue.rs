//! Pending-chunk queue: backoff gating plus priority dispatch.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use tokio::time::Instant;

use crate::chunker::{ChunkDescriptor, FileId};

/// One pending chunk assignment: the chunk, which attempt comes next, and
/// when that attempt becomes eligible (backoff pushes this into the future).
#[derive(Debug, Clone, Copy)]
pub(crate) struct QueuedChunk {
    pub eligible_at: Instant,
    pub priority: i32,
    pub attempt: u32,
    pub chunk: ChunkDescriptor,
}

/// Max-heap key for dispatch: higher priority first, then lower offset so
/// completion stays loosely monotonic within a file, then file id.
#[derive(Debug, Clone, Copy)]
struct ByPriority(QueuedChunk);

impl Ord for ByPriority {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .priority
            .cmp(&other.0.priority)
            .then_with(|| other.0.chunk.offset.cmp(&self.0.chunk.offset))
            .then_with(|| other.0.chunk.file_id.cmp(&self.0.chunk.file_id))
    }
}

impl PartialOrd for ByPriority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ByPriority {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ByPriority {}

/// Min-heap key for the backoff gate: earliest eligibility first.
#[derive(Debug, Clone, Copy)]
struct ByEligibility(QueuedChunk);

impl Ord for ByEligibility {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .eligible_at
            .cmp(&other.0.eligible_at)
            .then_with(|| self.0.chunk.offset.cmp(&other.0.chunk.offset))
            .then_with(|| self.0.chunk.file_id.cmp(&other.0.chunk.file_id))
    }
}

impl PartialOrd for ByEligibility {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ByEligibility {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ByEligibility {}

/// Pending chunks across all tasks, in two stages: `delayed` holds
/// backed-off items until their eligibility passes, `ready` orders
/// dispatchable items by priority. Eligibility gates; it never outranks
/// priority. Single-owner: only the scheduler coordinator touches this,
/// so no locking here.
#[derive(Debug, Default)]
pub(crate) struct WorkQueue {
    ready: BinaryHeap<ByPriority>,
    delayed: BinaryHeap<Reverse<ByEligibility>>,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self {
            ready: BinaryHeap::new(),
            delayed: BinaryHeap::new(),
        }
    }

    pub fn push(&mut self, item: QueuedChunk) {
        if item.eligible_at <= Instant::now() {
            self.ready.push(ByPriority(item));
        } else {
            self.delayed.push(Reverse(ByEligibility(item)));
        }
    }

    /// Move everything whose backoff has elapsed into the ready heap.
    fn promote(&mut self, now: Instant) {
        while let Some(Reverse(ByEligibility(front))) = self.delayed.peek() {
            if front.eligible_at > now {
                break;
            }
            if let Some(Reverse(ByEligibility(item))) = self.delayed.pop() {
                self.ready.push(ByPriority(item));
            }
        }
    }

    /// Pop the highest-priority chunk that is eligible at `now`.
    pub fn pop_ready(&mut self, now: Instant) -> Option<QueuedChunk> {
        self.promote(now);
        self.ready.pop().map(|ByPriority(item)| item)
    }

    /// When the queue next has something to hand out; `None` when empty.
    /// Can be in the past if ready items are waiting on worker capacity.
    pub fn next_eligible_at(&self) -> Option<Instant> {
        let ready = self.ready.peek().map(|ByPriority(item)| item.eligible_at);
        let delayed = self
            .delayed
            .peek()
            .map(|Reverse(ByEligibility(item))| item.eligible_at);
        match (ready, delayed) {
            (Some(r), Some(d)) => Some(r.min(d)),
            (r, d) => r.or(d),
        }
    }

    /// Drop every queued chunk belonging to `file_id` (task cancelled or
    /// settled). Returns how many entries were removed.
    pub fn remove_file(&mut self, file_id: FileId) -> usize {
        let before = self.len();
        self.ready
            .retain(|ByPriority(item)| item.chunk.file_id != file_id);
        self.delayed
            .retain(|Reverse(ByEligibility(item))| item.chunk.file_id != file_id);
        before - self.len()
    }

    pub fn len(&self) -> usize {
        self.ready.len() + self.delayed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ready.is_empty() && self.delayed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn item(
        eligible_at: Instant,
        priority: i32,
        file_id: FileId,
        offset: u64,
    ) -> QueuedChunk {
        QueuedChunk {
            eligible_at,
            priority,
            attempt: 1,
            chunk: ChunkDescriptor::new(file_id, offset, 100),
        }
    }

    #[test]
    fn pops_by_priority_then_offset_among_eligible() {
        let now = Instant::now();
        let mut q = WorkQueue::new();
        q.push(item(now, 0, 2, 200));
        q.push(item(now, 0, 2, 100));
        q.push(item(now, 5, 3, 300));

        // Priority 5 beats priority 0; within one priority, lower offset wins.
        assert!(!q.is_empty());
        assert_eq!(q.pop_ready(now).unwrap().chunk.offset, 300);
        assert_eq!(q.pop_ready(now).unwrap().chunk.offset, 100);
        assert_eq!(q.pop_ready(now).unwrap().chunk.offset, 200);
        assert!(q.pop_ready(now).is_none());
        assert!(q.is_empty());
    }

    #[test]
    fn late_high_priority_push_overtakes_earlier_items() {
        let now = Instant::now();
        let mut q = WorkQueue::new();
        q.push(item(now, 0, 1, 0));
        q.push(item(now, 0, 1, 100));
        // Pushed later, but more urgent.
        q.push(item(now, 7, 2, 0));

        assert_eq!(q.pop_ready(now).unwrap().chunk.file_id, 2);
        assert_eq!(q.pop_ready(now).unwrap().chunk.file_id, 1);
    }

    #[test]
    fn backed_off_items_wait_for_eligibility() {
        let now = Instant::now();
        let mut q = WorkQueue::new();
        q.push(item(now + Duration::from_secs(2), 9, 1, 0));
        q.push(item(now, 0, 2, 0));

        // The high-priority item is still backing off; the eligible one goes.
        assert_eq!(q.pop_ready(now).unwrap().chunk.file_id, 2);
        assert!(q.pop_ready(now).is_none());
        assert_eq!(q.len(), 1);
        assert_eq!(q.next_eligible_at(), Some(now + Duration::from_secs(2)));
        let popped = q.pop_ready(now + Duration::from_secs(3)).unwrap();
        assert_eq!(popped.chunk.file_id, 1);
    }

    #[test]
    fn promoted_items_regain_priority_order() {
        let now = Instant::now();
        let mut q = WorkQueue::new();
        q.push(item(now + Duration::from_millis(10), 9, 1, 0));
        q.push(item(now + Duration::from_millis(10), 0, 2, 0));

        // Both leave backoff together; priority decides again.
        let later = now + Duration::from_secs(1);
        assert_eq!(q.pop_ready(later).unwrap().chunk.file_id, 1);
        assert_eq!(q.pop_ready(later).unwrap().chunk.file_id, 2);
    }

    #[test]
    fn remove_file_drops_only_that_file() {
        let now = Instant::now();
        let mut q = WorkQueue::new();
        q.push(item(now, 0, 1, 0));
        q.push(item(now + Duration::from_secs(5), 0, 1, 100));
        q.push(item(now, 0, 2, 0));

        assert_eq!(q.remove_file(1), 2);
        assert_eq!(q.len(), 1);
        assert_eq!(q.pop_ready(now).unwrap().chunk.file_id, 2);
    }
}
