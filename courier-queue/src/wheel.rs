//! Wall-clock scheduling of future work.

use std::{
    cmp::Ordering,
    collections::BinaryHeap,
    time::{Duration, SystemTime},
};

use tokio::sync::{Mutex, mpsc};

/// A scheduled entry emitted by the wheel once its due time arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry<T> {
    pub due: SystemTime,
    pub value: T,
}

enum Op<T> {
    Add(Entry<T>),
    Close,
}

/// Heap slot ordered so the earliest due time pops first; ties break by
/// insertion order.
struct Slot<T> {
    due: SystemTime,
    seq: u64,
    value: T,
}

impl<T> PartialEq for Slot<T> {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl<T> Eq for Slot<T> {}

impl<T> PartialOrd for Slot<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Slot<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Holds `(due time, value)` entries and emits each one exactly once when
/// wall-clock time reaches its due time, in non-decreasing due-time order
/// with stable ties.
///
/// Entries can be added from any number of tasks; emitted entries are
/// consumed through [`recv`](Self::recv), which delivers each entry to
/// exactly one caller. The wheel holds no persistent state: re-populating
/// it after a restart is the owner's job.
///
/// Granularity below one second is not guaranteed, and dispatch past the
/// due time is expected under load.
///
/// Must be created inside a Tokio runtime.
#[derive(Debug)]
pub struct TimeWheel<T> {
    ops: mpsc::UnboundedSender<Op<T>>,
    dispatch: Mutex<mpsc::UnboundedReceiver<Entry<T>>>,
}

impl<T: Send + 'static> Default for TimeWheel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> TimeWheel<T> {
    #[must_use]
    pub fn new() -> Self {
        let (ops_tx, ops_rx) = mpsc::unbounded_channel();
        let (dispatch_tx, dispatch_rx) = mpsc::unbounded_channel();
        tokio::spawn(run(ops_rx, dispatch_tx));

        Self {
            ops: ops_tx,
            dispatch: Mutex::new(dispatch_rx),
        }
    }

    /// Schedule `value` to be emitted at `due`. Discarded after
    /// [`close`](Self::close).
    pub fn add(&self, due: SystemTime, value: T) {
        let _ = self.ops.send(Op::Add(Entry { due, value }));
    }

    /// Wait for the next due entry.
    ///
    /// Returns `None` once the wheel is closed and already-emitted entries
    /// have been drained.
    pub async fn recv(&self) -> Option<Entry<T>> {
        self.dispatch.lock().await.recv().await
    }

    /// Stop the wheel. Entries not yet due are discarded; entries already
    /// emitted remain receivable until the stream reports `None`.
    pub fn close(&self) {
        let _ = self.ops.send(Op::Close);
    }
}

async fn run<T: Send>(
    mut ops: mpsc::UnboundedReceiver<Op<T>>,
    dispatch: mpsc::UnboundedSender<Entry<T>>,
) {
    let mut pending: BinaryHeap<Slot<T>> = BinaryHeap::new();
    let mut seq = 0u64;

    loop {
        let now = SystemTime::now();
        while pending.peek().is_some_and(|slot| slot.due <= now) {
            let Some(slot) = pending.pop() else { break };
            if dispatch
                .send(Entry {
                    due: slot.due,
                    value: slot.value,
                })
                .is_err()
            {
                return;
            }
        }

        let op = if let Some(next_due) = pending.peek().map(|slot| slot.due) {
            let wait = next_due
                .duration_since(SystemTime::now())
                .unwrap_or(Duration::ZERO);
            tokio::select! {
                op = ops.recv() => op,
                () = tokio::time::sleep(wait) => continue,
            }
        } else {
            ops.recv().await
        };

        match op {
            Some(Op::Add(entry)) => {
                pending.push(Slot {
                    due: entry.due,
                    seq,
                    value: entry.value,
                });
                seq += 1;
            }
            Some(Op::Close) | None => return,
        }
    }
}
