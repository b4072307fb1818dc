//! Shift log: what every worker is doing and how long since it moved forward.
//!
//! Workers report an [`Activity`] each time they advance. A sweep turns
//! workers that stayed on one activity past the timeout into [`Stall`]
//! reports, each one raised once until the worker advances again.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::recipe::Step;
use crate::types::{IngredientType, OrderId, WorkerId};
use crate::worker::Role;

/// What a worker last said it was busy with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Activity {
    /// Looking for an order or a demand.
    Idle,
    /// Working an order; `step` is `None` until the plate is claimed.
    Order { order_id: OrderId, step: Option<Step> },
    /// Fetching and cutting one demanded ingredient.
    Prep { order_id: OrderId, kind: IngredientType },
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Activity::Idle => f.write_str("idle"),
            Activity::Order {
                order_id,
                step: Some(step),
            } => write!(f, "order {order_id} at {step:?}"),
            Activity::Order {
                order_id,
                step: None,
            } => write!(f, "order {order_id} waiting for a plate"),
            Activity::Prep { order_id, kind } => write!(f, "{kind} for order {order_id}"),
        }
    }
}

/// A worker stuck on one activity for longer than the timeout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stall {
    pub worker: WorkerId,
    pub role: Role,
    pub activity: Activity,
    pub quiet_for: Duration,
}

impl fmt::Display for Stall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} stuck for {}ms on {}",
            self.role,
            self.worker,
            self.quiet_for.as_millis(),
            self.activity
        )
    }
}

struct Shift {
    role: Role,
    activity: Activity,
    since: Instant,
    reported: bool,
}

#[derive(Default)]
pub struct Watchdog {
    shifts: Mutex<HashMap<WorkerId, Shift>>,
}

impl Watchdog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put `worker` on shift, idle as of now.
    pub fn clock_in(&self, worker: WorkerId, role: Role) {
        let mut guard = self.shifts.lock().expect("watchdog mutex poisoned");
        guard.insert(
            worker,
            Shift {
                role,
                activity: Activity::Idle,
                since: Instant::now(),
                reported: false,
            },
        );
    }

    /// Record that `worker` moved on to `activity`.
    pub fn progress(&self, worker: WorkerId, activity: Activity) {
        let mut guard = self.shifts.lock().expect("watchdog mutex poisoned");
        if let Some(shift) = guard.get_mut(&worker) {
            shift.activity = activity;
            shift.since = Instant::now();
            shift.reported = false;
        }
    }

    pub fn clock_out(&self, worker: WorkerId) {
        self.shifts
            .lock()
            .expect("watchdog mutex poisoned")
            .remove(&worker);
    }

    pub fn activity(&self, worker: WorkerId) -> Option<Activity> {
        let guard = self.shifts.lock().expect("watchdog mutex poisoned");
        guard.get(&worker).map(|shift| shift.activity)
    }

    /// Stalls that started since the previous sweep, as seen at `now`.
    pub fn sweep(&self, now: Instant, timeout: Duration) -> Vec<Stall> {
        let mut guard = self.shifts.lock().expect("watchdog mutex poisoned");
        let mut fresh: Vec<Stall> = guard
            .iter_mut()
            .filter(|(_, shift)| !shift.reported)
            .filter_map(|(&worker, shift)| {
                let quiet_for = now.saturating_duration_since(shift.since);
                if quiet_for <= timeout {
                    return None;
                }
                shift.reported = true;
                Some(Stall {
                    worker,
                    role: shift.role,
                    activity: shift.activity,
                    quiet_for,
                })
            })
            .collect();
        fresh.sort_by_key(|stall| stall.worker);
        fresh
    }

    /// Workers currently flagged by a sweep, in id order.
    pub fn stalled_workers(&self) -> Vec<WorkerId> {
        let guard = self.shifts.lock().expect("watchdog mutex poisoned");
        let mut stalled: Vec<WorkerId> = guard
            .iter()
            .filter(|(_, shift)| shift.reported)
            .map(|(&worker, _)| worker)
            .collect();
        stalled.sort_unstable();
        stalled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UtensilKind;

    const TIMEOUT: Duration = Duration::from_millis(100);

    fn later(by: Duration) -> Instant {
        Instant::now() + by
    }

    #[test]
    fn stall_carries_what_the_worker_was_doing() {
        let watchdog = Watchdog::new();
        watchdog.clock_in(2, Role::Chef);
        let activity = Activity::Order {
            order_id: 9,
            step: Some(Step::Cook(UtensilKind::Pot)),
        };
        watchdog.progress(2, activity);

        assert!(watchdog.sweep(Instant::now(), TIMEOUT).is_empty());
        let stalls = watchdog.sweep(later(TIMEOUT * 3), TIMEOUT);
        assert_eq!(stalls.len(), 1);
        assert_eq!(stalls[0].role, Role::Chef);
        assert_eq!(stalls[0].activity, activity);
        assert!(stalls[0].quiet_for > TIMEOUT);
        assert_eq!(stalls[0].to_string().split(" stuck").next(), Some("chef 2"));
        assert!(stalls[0].to_string().ends_with("on order 9 at Cook(Pot)"));
    }

    #[test]
    fn each_stall_is_reported_once_until_progress() {
        let watchdog = Watchdog::new();
        watchdog.clock_in(5, Role::Prep);
        assert_eq!(watchdog.sweep(later(TIMEOUT * 2), TIMEOUT).len(), 1);
        assert!(watchdog.sweep(later(TIMEOUT * 4), TIMEOUT).is_empty());
        assert_eq!(watchdog.stalled_workers(), vec![5]);

        watchdog.progress(
            5,
            Activity::Prep {
                order_id: 1,
                kind: IngredientType::Onion,
            },
        );
        assert!(watchdog.stalled_workers().is_empty());
        let again = watchdog.sweep(later(TIMEOUT * 2), TIMEOUT);
        assert_eq!(again[0].to_string().rsplit(" on ").next(), Some("onion for order 1"));
    }

    #[test]
    fn clocked_out_workers_are_never_reported() {
        let watchdog = Watchdog::new();
        watchdog.clock_in(4, Role::Chef);
        watchdog.clock_out(4);
        assert!(watchdog.sweep(later(TIMEOUT * 10), TIMEOUT).is_empty());
        assert_eq!(watchdog.activity(4), None);
    }

    #[test]
    fn progress_from_an_unknown_worker_is_ignored() {
        let watchdog = Watchdog::new();
        watchdog.progress(8, Activity::Idle);
        assert_eq!(watchdog.activity(8), None);
        assert!(watchdog.stalled_workers().is_empty());
    }
}
