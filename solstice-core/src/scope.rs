//! Session cancellation scope.
//!
//! Every playback session schedules its callbacks through one scope. A
//! scope records the transport event ids it issued; `cancel_all` cancels
//! exactly those and kills the scope, so a voice whose callback is mid-chain
//! can no longer re-arm itself. Re-issuing `schedule` on a piece builds a
//! brand-new scope — sessions never share cancellation state.

use std::sync::{Arc, Mutex};

use crate::transport::{EventId, Transport};

#[derive(Clone)]
pub struct SessionScope {
    transport: Transport,
    inner: Arc<Mutex<ScopeInner>>,
}

struct ScopeInner {
    active: bool,
    events: Vec<EventId>,
}

impl SessionScope {
    pub fn new(transport: &Transport) -> Self {
        Self {
            transport: transport.clone(),
            inner: Arc::new(Mutex::new(ScopeInner {
                active: true,
                events: Vec::new(),
            })),
        }
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn is_active(&self) -> bool {
        self.inner.lock().unwrap().active
    }

    /// Schedule a one-shot callback in this scope. Returns `None` (and does
    /// nothing) once the scope has been cancelled.
    pub fn schedule_once<F>(&self, delay: f64, mut callback: F) -> Option<EventId>
    where
        F: FnMut(&Transport, f64) + Send + 'static,
    {
        let mut inner = self.inner.lock().unwrap();
        if !inner.active {
            return None;
        }
        // The callback drops its own id from the scope when it fires, so a
        // self-rescheduling chain holds one tracked id, not its whole history.
        let slot = Arc::new(Mutex::new(None::<EventId>));
        let fired_slot = Arc::clone(&slot);
        let scope_inner = Arc::clone(&self.inner);
        let id = self.transport.schedule_once(delay, move |transport, at| {
            if let Some(id) = fired_slot.lock().unwrap().take() {
                scope_inner.lock().unwrap().events.retain(|e| *e != id);
            }
            callback(transport, at);
        });
        *slot.lock().unwrap() = Some(id);
        inner.events.push(id);
        Some(id)
    }

    /// Schedule a repeating callback in this scope.
    pub fn schedule_repeat<F>(&self, interval: f64, start_delay: f64, callback: F) -> Option<EventId>
    where
        F: FnMut(&Transport, f64) + Send + 'static,
    {
        let mut inner = self.inner.lock().unwrap();
        if !inner.active {
            return None;
        }
        let id = self.transport.schedule_repeat(interval, start_delay, callback);
        inner.events.push(id);
        Some(id)
    }

    /// Cancel every callback this scope registered and kill the scope.
    /// Idempotent.
    pub fn cancel_all(&self) {
        let events = {
            let mut inner = self.inner.lock().unwrap();
            inner.active = false;
            std::mem::take(&mut inner.events)
        };
        for id in events {
            self.transport.cancel(id);
        }
    }
}
