//! Thread-safe FIFO of individually needed ingredients, with blocking and
//! non-blocking consumers.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::types::{IngredientType, OrderId};

/// One ingredient some pending order still needs fetched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Demand {
    pub kind: IngredientType,
    pub order_id: OrderId,
}

/// Order-tagged ingredient demand, drained by whichever worker asks first.
pub struct DemandQueue {
    inner: Mutex<DemandState>,
    available: Condvar,
}

struct DemandState {
    queue: VecDeque<Demand>,
    closed: bool,
}

impl DemandQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(DemandState {
                queue: VecDeque::new(),
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Push a demand; returns it back if the queue is closed.
    pub fn push(&self, demand: Demand) -> Result<(), Demand> {
        let mut guard = self.inner.lock().expect("demand queue mutex poisoned");
        if guard.closed {
            return Err(demand);
        }
        guard.queue.push_back(demand);
        self.available.notify_one();
        Ok(())
    }

    /// Try to pop immediately without blocking.
    pub fn try_pop(&self) -> Option<Demand> {
        let mut guard = self.inner.lock().expect("demand queue mutex poisoned");
        guard.queue.pop_front()
    }

    /// Wait up to `timeout` for a demand; `None` on timeout or once closed and drained.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<Demand> {
        let guard = self.inner.lock().expect("demand queue mutex poisoned");
        let (mut guard, _) = self
            .available
            .wait_timeout_while(guard, timeout, |state| {
                state.queue.is_empty() && !state.closed
            })
            .expect("condvar wait failed");
        guard.queue.pop_front()
    }

    /// Close the queue and wake all blocked consumers. Queued demand stays poppable.
    pub fn close(&self) {
        let mut guard = self.inner.lock().expect("demand queue mutex poisoned");
        guard.closed = true;
        self.available.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.inner
            .lock()
            .expect("demand queue mutex poisoned")
            .closed
    }

    /// Current number of queued demands.
    pub fn len(&self) -> usize {
        let guard = self.inner.lock().expect("demand queue mutex poisoned");
        guard.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DemandQueue {
    fn default() -> Self {
        Self::new()
    }
}
