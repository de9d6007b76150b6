//! The virtual transport clock shared by every running piece.
//!
//! All timed triggers land on this single cooperative timeline. Nothing
//! fires until the clock is advanced; `advance` then runs due callbacks one
//! at a time in (time, insertion) order. The inner lock is released around
//! each callback, so a callback may schedule its successor on the same
//! transport — the self-perpetuation idiom every generative voice uses.
//! Virtual time is not wall time: a single `advance` may run many events.

use std::collections::{BinaryHeap, HashMap};
use std::sync::{Arc, Mutex};

/// Handle to a scheduled callback, used for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(u64);

type EventCallback = Box<dyn FnMut(&Transport, f64) + Send>;

/// Min-heap key: earliest time first, insertion order breaking ties.
struct QueueKey {
    at: f64,
    seq: u64,
    id: EventId,
}

impl PartialEq for QueueKey {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for QueueKey {}

impl PartialOrd for QueueKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reversed so BinaryHeap's max is the earliest event.
        other
            .at
            .total_cmp(&self.at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct EventState {
    /// Re-arm interval for repeating events.
    repeat: Option<f64>,
    /// Taken while the callback runs, put back if the event re-arms.
    callback: Option<EventCallback>,
}

#[derive(Default)]
struct Inner {
    now: f64,
    next_id: u64,
    queue: BinaryHeap<QueueKey>,
    events: HashMap<EventId, EventState>,
}

/// Cheap-clone handle to the shared clock.
#[derive(Clone, Default)]
pub struct Transport {
    inner: Arc<Mutex<Inner>>,
}

/// Repeat intervals shorter than this are clamped so a pathological zero
/// interval cannot spin the clock.
const MIN_REPEAT_INTERVAL: f64 = 1e-3;

impl Transport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time in seconds.
    pub fn now(&self) -> f64 {
        self.inner.lock().unwrap().now
    }

    /// Number of pending scheduled events.
    pub fn pending(&self) -> usize {
        self.inner.lock().unwrap().events.len()
    }

    /// Schedule a one-shot callback `delay` seconds from now.
    pub fn schedule_once<F>(&self, delay: f64, callback: F) -> EventId
    where
        F: FnMut(&Transport, f64) + Send + 'static,
    {
        self.schedule(delay, None, Box::new(callback))
    }

    /// Schedule a repeating callback: first fire after `start_delay`, then
    /// every `interval` seconds until cancelled.
    pub fn schedule_repeat<F>(&self, interval: f64, start_delay: f64, callback: F) -> EventId
    where
        F: FnMut(&Transport, f64) + Send + 'static,
    {
        self.schedule(
            start_delay,
            Some(interval.max(MIN_REPEAT_INTERVAL)),
            Box::new(callback),
        )
    }

    fn schedule(&self, delay: f64, repeat: Option<f64>, callback: EventCallback) -> EventId {
        let mut inner = self.inner.lock().unwrap();
        let id = EventId(inner.next_id);
        inner.next_id += 1;
        let seq = id.0;
        let at = inner.now + delay.max(0.0);
        inner.queue.push(QueueKey { at, seq, id });
        inner.events.insert(
            id,
            EventState {
                repeat,
                callback: Some(callback),
            },
        );
        id
    }

    /// Cancel a pending event. Cancelling an already-fired or unknown event
    /// is a no-op.
    pub fn cancel(&self, id: EventId) {
        self.inner.lock().unwrap().events.remove(&id);
    }

    /// Advance the clock by `dt` seconds, running every due callback in
    /// order. Re-entrant scheduling from inside callbacks is supported.
    pub fn advance(&self, dt: f64) {
        let target = {
            let inner = self.inner.lock().unwrap();
            inner.now + dt.max(0.0)
        };

        loop {
            let (key, mut callback, repeat) = {
                let mut inner = self.inner.lock().unwrap();
                let due = matches!(inner.queue.peek(), Some(key) if key.at <= target);
                if !due {
                    inner.now = target;
                    break;
                }
                let key = inner.queue.pop().expect("peeked entry present");
                let repeat = match inner.events.get(&key.id) {
                    // Cancelled while queued.
                    None => continue,
                    Some(state) => state.repeat,
                };
                // One-shots leave the table before their callback runs, so
                // `pending` never counts the event currently firing.
                // Repeats keep their entry with the callback taken; a
                // cancel from inside the callback removes it and stops the
                // re-arm below.
                let callback = if repeat.is_some() {
                    inner.events.get_mut(&key.id).and_then(|s| s.callback.take())
                } else {
                    inner.events.remove(&key.id).and_then(|s| s.callback)
                };
                let Some(callback) = callback else {
                    continue;
                };
                inner.now = inner.now.max(key.at);
                (key, callback, repeat)
            };

            callback(self, key.at);

            if let Some(interval) = repeat {
                let mut inner = self.inner.lock().unwrap();
                if let Some(state) = inner.events.get_mut(&key.id) {
                    state.callback = Some(callback);
                    inner.queue.push(QueueKey {
                        at: key.at + interval,
                        seq: key.seq,
                        id: key.id,
                    });
                }
            }
        }
    }
}
