//! Bounded scheduling queue ordered by the Sort plugin.
//!
//! Entries are ordered once, on insertion, by the configured Sort plugin;
//! requests that compare equal leave in arrival order. Many workers may
//! wait on [`SchedulingQueue::dequeue`] at once.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use fog_core::WorkloadRequest;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::{SchedulerError, SchedulerResult};
use crate::plugin::Plugin;

/// A request waiting for (another) scheduling cycle.
#[derive(Debug, Clone)]
pub struct QueuedRequest {
    pub request: Arc<WorkloadRequest>,
    /// Cycles already run for this request.
    pub attempts: u32,
}

impl QueuedRequest {
    pub fn new(request: WorkloadRequest) -> Self {
        Self {
            request: Arc::new(request),
            attempts: 0,
        }
    }
}

struct Entry {
    item: QueuedRequest,
    seq: u64,
    sorter: Arc<dyn Plugin>,
}

// BinaryHeap pops the greatest entry, so "dequeued first" is Greater.
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sorter
            .compare(&self.item.request, &other.item.request)
            .reverse()
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

#[derive(Default)]
struct QueueState {
    heap: BinaryHeap<Entry>,
    closed: bool,
    next_seq: u64,
}

pub struct SchedulingQueue {
    state: Mutex<QueueState>,
    capacity: usize,
    sorter: Arc<dyn Plugin>,
    items_available: Notify,
    space_available: Notify,
}

impl SchedulingQueue {
    pub fn new(capacity: usize, sorter: Arc<dyn Plugin>) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            capacity: capacity.max(1),
            sorter,
            items_available: Notify::new(),
            space_available: Notify::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.state.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    fn push(&self, state: &mut QueueState, item: QueuedRequest) {
        let seq = state.next_seq;
        state.next_seq += 1;
        state.heap.push(Entry {
            item,
            seq,
            sorter: self.sorter.clone(),
        });
    }

    /// Insert without waiting; a full queue rejects the request.
    pub fn try_enqueue(&self, item: QueuedRequest) -> SchedulerResult<()> {
        {
            let mut state = self.state.lock();
            if state.closed {
                return Err(SchedulerError::QueueClosed);
            }
            if state.heap.len() >= self.capacity {
                return Err(SchedulerError::QueueFull(self.capacity));
            }
            self.push(&mut state, item);
        }
        self.items_available.notify_one();
        Ok(())
    }

    /// Insert, waiting for room while the queue is full.
    pub async fn enqueue(&self, item: QueuedRequest) -> SchedulerResult<()> {
        loop {
            let space = self.space_available.notified();
            tokio::pin!(space);
            space.as_mut().enable();

            {
                let mut state = self.state.lock();
                if state.closed {
                    return Err(SchedulerError::QueueClosed);
                }
                if state.heap.len() < self.capacity {
                    self.push(&mut state, item);
                    drop(state);
                    self.items_available.notify_one();
                    return Ok(());
                }
            }

            space.await;
        }
    }

    /// Wait for the next request. Returns `None` once the queue is closed.
    pub async fn dequeue(&self) -> Option<QueuedRequest> {
        loop {
            let ready = self.items_available.notified();
            tokio::pin!(ready);
            ready.as_mut().enable();

            {
                let mut state = self.state.lock();
                if state.closed {
                    return None;
                }
                if let Some(entry) = state.heap.pop() {
                    drop(state);
                    self.space_available.notify_one();
                    return Some(entry.item);
                }
            }

            ready.await;
        }
    }

    /// Stop accepting requests and release every waiter. Pending requests
    /// are dropped and returned.
    pub fn close(&self) -> Vec<QueuedRequest> {
        let drained = {
            let mut state = self.state.lock();
            state.closed = true;
            std::mem::take(&mut state.heap)
                .into_sorted_vec()
                .into_iter()
                .rev()
                .map(|e| e.item)
                .collect()
        };
        self.items_available.notify_waiters();
        self.space_available.notify_waiters();
        drained
    }
}
