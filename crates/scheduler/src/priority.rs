//! Priority ranking and the pending load queue
//!
//! Pages are ranked by their distance from the anchor. The queue dequeues hot
//! candidates before warm ones, nearest first, with ties broken by ascending
//! index so that a recompute always yields the same order.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

/// Scheduling rank of `candidate_index` relative to `anchor_index`
///
/// Lower values are scheduled first.
///
/// # Example
///
/// ```
/// use nview_scheduler::priority_for_index;
///
/// assert_eq!(priority_for_index(5, 5), 0);
/// assert_eq!(priority_for_index(5, 3), priority_for_index(5, 7));
/// ```
pub fn priority_for_index(anchor_index: usize, candidate_index: usize) -> usize {
    candidate_index.abs_diff(anchor_index)
}

/// Zone class of a queued load
///
/// Higher numeric values are dequeued first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LoadPriority {
    /// Prefetch inside the warm zone
    Warm = 0,

    /// Must be resident, inside the hot zone
    Hot = 1,
}

/// A page waiting for a load slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadJob {
    /// Page index to load
    pub index: usize,

    /// Zone class
    pub priority: LoadPriority,

    /// Distance from the anchor at the time the job was queued
    pub distance: usize,
}

impl LoadJob {
    /// Create a job ranked against `anchor_index`
    pub fn new(index: usize, anchor_index: usize, priority: LoadPriority) -> Self {
        Self { index, priority, distance: priority_for_index(anchor_index, index) }
    }
}

impl PartialOrd for LoadJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LoadJob {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max heap: nearer and lower indices must compare greater
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.distance.cmp(&self.distance))
            .then_with(|| other.index.cmp(&self.index))
    }
}

/// Pending page loads ordered by zone class, then distance, then index
///
/// An index is present at most once; pushing an index that is already queued
/// keeps whichever job ranks higher.
#[derive(Debug, Default)]
pub struct LoadQueue {
    heap: BinaryHeap<LoadJob>,
    queued: HashSet<usize>,
}

impl LoadQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a job, returning false if the index was already queued at an equal
    /// or higher rank
    pub fn push(&mut self, job: LoadJob) -> bool {
        if self.queued.contains(&job.index) {
            let existing = self.heap.iter().find(|queued| queued.index == job.index).copied();
            match existing {
                Some(existing) if existing >= job => return false,
                _ => self.heap.retain(|queued| queued.index != job.index),
            }
        }

        self.queued.insert(job.index);
        self.heap.push(job);
        true
    }

    /// Dequeue the highest ranked job
    pub fn pop(&mut self) -> Option<LoadJob> {
        let job = self.heap.pop()?;
        self.queued.remove(&job.index);
        Some(job)
    }

    /// Highest ranked job without removing it
    pub fn peek(&self) -> Option<&LoadJob> {
        self.heap.peek()
    }

    /// Whether `index` is waiting in the queue
    pub fn contains(&self, index: usize) -> bool {
        self.queued.contains(&index)
    }

    /// Drop every job matching `predicate`, returning how many were removed
    pub fn remove_if<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&LoadJob) -> bool,
    {
        let before = self.heap.len();
        let queued = &mut self.queued;
        self.heap.retain(|job| {
            if predicate(job) {
                queued.remove(&job.index);
                false
            } else {
                true
            }
        });
        before - self.heap.len()
    }

    /// Number of queued jobs
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Remove every job
    pub fn clear(&mut self) {
        self.heap.clear();
        self.queued.clear();
    }
}
