//! Serving counter: the sink for finished plates and the one outward notification.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::types::{OrderId, Plate, Position, StationId, StationKind};

/// Observer told about every served order, exactly once per order.
pub trait ServeListener: Send + Sync {
    fn on_order_served(&self, plate: &Plate);
}

struct ServeState {
    /// Every order below this id is settled; plates for them are refused.
    settled_below: OrderId,
    /// Served orders at or above `settled_below`.
    recent: BTreeSet<OrderId>,
    served: usize,
    listeners: Vec<Arc<dyn ServeListener>>,
}

pub struct ServeStation {
    id: StationId,
    position: Position,
    state: Mutex<ServeState>,
}

impl ServeStation {
    pub fn new(index: usize, position: Position) -> Self {
        Self {
            id: StationId::new(StationKind::Serve, index),
            position,
            state: Mutex::new(ServeState {
                settled_below: 0,
                recent: BTreeSet::new(),
                served: 0,
                listeners: Vec::new(),
            }),
        }
    }

    pub fn subscribe(&self, listener: Arc<dyn ServeListener>) {
        let mut guard = self.state.lock().expect("serve mutex poisoned");
        guard.listeners.push(listener);
    }

    /// Accept a finished plate and notify listeners.
    ///
    /// A second plate for an order that was already served is refused.
    pub fn serve(&self, plate: Plate) -> bool {
        let listeners = {
            let mut guard = self.state.lock().expect("serve mutex poisoned");
            if plate.order_id < guard.settled_below || !guard.recent.insert(plate.order_id) {
                warn!("{} refused duplicate plate for order {}", self.id, plate.order_id);
                return false;
            }
            guard.served += 1;
            guard.listeners.clone()
        };
        info!("order {} served ({} items)", plate.order_id, plate.contents.len());
        for listener in listeners {
            listener.on_order_served(&plate);
        }
        true
    }

    /// Forget served ids below `order_id`; the order book has closed all of them.
    pub fn settle_below(&self, order_id: OrderId) {
        let mut guard = self.state.lock().expect("serve mutex poisoned");
        if order_id <= guard.settled_below {
            return;
        }
        guard.settled_below = order_id;
        guard.recent = guard.recent.split_off(&order_id);
    }

    pub fn served_count(&self) -> usize {
        self.state.lock().expect("serve mutex poisoned").served
    }

    pub fn id(&self) -> StationId {
        self.id
    }

    pub fn position(&self) -> Position {
        self.position
    }
}

/// Served-order counter with a session clock.
pub struct Scoreboard {
    served: AtomicU64,
    started: Instant,
    session: Option<Duration>,
}

impl Scoreboard {
    pub fn new(session: Option<Duration>) -> Self {
        Self {
            served: AtomicU64::new(0),
            started: Instant::now(),
            session,
        }
    }

    pub fn served(&self) -> u64 {
        self.served.load(Ordering::SeqCst)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Time left in the session; `None` for open-ended sessions.
    pub fn remaining(&self) -> Option<Duration> {
        self.session
            .map(|session| session.saturating_sub(self.elapsed()))
    }

    /// `m:ss` of the remaining session time, or of the elapsed time when open-ended.
    pub fn clock_display(&self) -> String {
        format_clock(self.remaining().unwrap_or_else(|| self.elapsed()))
    }
}

impl ServeListener for Scoreboard {
    fn on_order_served(&self, _plate: &Plate) {
        self.served.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn format_clock(time: Duration) -> String {
    let secs = time.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}
