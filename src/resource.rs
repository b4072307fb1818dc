//! Exclusive, non-reentrant station reservation.

use std::sync::Mutex;

use log::debug;

use crate::types::WorkerId;

/// Reservation held by at most one worker at a time.
///
/// First caller wins; there is no queueing, so losers retry on their own
/// schedule.
pub struct Resource {
    holder: Mutex<Option<WorkerId>>,
}

impl Resource {
    pub fn new() -> Self {
        Self {
            holder: Mutex::new(None),
        }
    }

    /// Claim the resource for `worker`; fails if anyone holds it, including `worker`.
    pub fn try_reserve(&self, worker: WorkerId) -> bool {
        let mut guard = self.holder.lock().expect("resource mutex poisoned");
        if guard.is_some() {
            return false;
        }
        *guard = Some(worker);
        true
    }

    /// Release the reservation; a no-op returning false unless `worker` holds it.
    pub fn release(&self, worker: WorkerId) -> bool {
        let mut guard = self.holder.lock().expect("resource mutex poisoned");
        match *guard {
            Some(owner) if owner == worker => {
                *guard = None;
                true
            }
            Some(owner) => {
                debug!("release by non-holder ignored: holder={owner} caller={worker}");
                false
            }
            None => false,
        }
    }

    pub fn is_available(&self) -> bool {
        self.holder.lock().expect("resource mutex poisoned").is_none()
    }

    pub fn holder(&self) -> Option<WorkerId> {
        *self.holder.lock().expect("resource mutex poisoned")
    }
}

impl Default for Resource {
    fn default() -> Self {
        Self::new()
    }
}
