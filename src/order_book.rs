//! Pending orders, their reservation protocol, and the ingredient demand queue.

use std::sync::Mutex;
use std::time::Duration;

use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::demand::{Demand, DemandQueue};
use crate::recipe::{Catalog, RecipeKind};
use crate::types::{IngredientType, OrderId, WorkerId};

/// One recipe request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Order {
    /// Spawn sequence number.
    pub id: OrderId,
    pub kind: RecipeKind,
    pub ingredients: Vec<IngredientType>,
    pub reserved_by: Option<WorkerId>,
}

impl Order {
    pub fn new(id: OrderId, kind: RecipeKind, ingredients: Vec<IngredientType>) -> Self {
        Self {
            id,
            kind,
            ingredients,
            reserved_by: None,
        }
    }

    pub fn is_reserved(&self) -> bool {
        self.reserved_by.is_some()
    }
}

struct BookState {
    /// Pending orders in spawn order.
    pending: Vec<Order>,
    next_id: OrderId,
    spawning: bool,
}

/// Recipe manager: owns pending orders and hands them out to workers.
pub struct OrderBook {
    catalog: Catalog,
    state: Mutex<BookState>,
    demand: DemandQueue,
    /// Off when no prep crew exists to drain the demand queue.
    track_demand: bool,
}

impl OrderBook {
    pub fn new(catalog: Catalog) -> Self {
        Self::with_demand(catalog, true)
    }

    /// Book that queues per-ingredient demand only when `track_demand` is set.
    pub fn with_demand(catalog: Catalog, track_demand: bool) -> Self {
        Self {
            catalog,
            state: Mutex::new(BookState {
                pending: Vec::new(),
                next_id: 0,
                spawning: true,
            }),
            demand: DemandQueue::new(),
            track_demand,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Create a pending order of `kind` and, when demand is tracked, queue one
    /// demand per required ingredient.
    ///
    /// Returns `None` once spawning has stopped or when `kind` is not in the catalog.
    pub fn spawn(&self, kind: RecipeKind) -> Option<Order> {
        let Some(spec) = self.catalog.get(kind) else {
            warn!("cannot spawn {kind}: not in catalog");
            return None;
        };
        let mut guard = self.state.lock().expect("order book mutex poisoned");
        if !guard.spawning {
            return None;
        }
        let order = Order::new(guard.next_id, kind, spec.ingredients.clone());
        guard.next_id += 1;
        let demanded: &[IngredientType] = if self.track_demand { &order.ingredients[..] } else { &[] };
        for &ingredient in demanded {
            let demand = Demand {
                kind: ingredient,
                order_id: order.id,
            };
            if self.demand.push(demand).is_err() {
                warn!("demand queue closed while spawning order {}", order.id);
            }
        }
        guard.pending.push(order.clone());
        info!("order {} spawned: {}", order.id, order.kind);
        Some(order)
    }

    /// Spawn an order of a kind picked uniformly from the catalog.
    pub fn spawn_random<R: Rng>(&self, rng: &mut R) -> Option<Order> {
        let kinds = self.catalog.kinds();
        let kind = *kinds.choose(rng)?;
        self.spawn(kind)
    }

    /// First pending order, in spawn order, that nobody has reserved.
    pub fn next_order(&self) -> Option<Order> {
        let guard = self.state.lock().expect("order book mutex poisoned");
        guard.pending.iter().find(|o| !o.is_reserved()).cloned()
    }

    /// Atomically claim `order` for `worker`.
    ///
    /// Fails if it is already reserved or no longer pending.
    pub fn try_reserve(&self, order: &Order, worker: WorkerId) -> bool {
        let mut guard = self.state.lock().expect("order book mutex poisoned");
        let Some(entry) = guard.pending.iter_mut().find(|o| o.id == order.id) else {
            return false;
        };
        if entry.is_reserved() {
            return false;
        }
        entry.reserved_by = Some(worker);
        info!("order {} ({}) reserved by worker {worker}", entry.id, entry.kind);
        true
    }

    /// Give a reservation back so another worker can pick the order up.
    pub fn release(&self, order: &Order, worker: WorkerId) -> bool {
        let mut guard = self.state.lock().expect("order book mutex poisoned");
        match guard.pending.iter_mut().find(|o| o.id == order.id) {
            Some(entry) if entry.reserved_by == Some(worker) => {
                entry.reserved_by = None;
                true
            }
            _ => false,
        }
    }

    fn remove(&self, order_id: OrderId) -> Option<Order> {
        let mut guard = self.state.lock().expect("order book mutex poisoned");
        let index = guard.pending.iter().position(|o| o.id == order_id)?;
        Some(guard.pending.remove(index))
    }

    /// Remove a served order. Returns false if it was already gone.
    pub fn complete_order(&self, order: &Order) -> bool {
        let removed = self.remove(order.id).is_some();
        if removed {
            info!("order {} ({}) completed", order.id, order.kind);
        }
        removed
    }

    /// Remove an order that cannot be produced. Returns false if it was already gone.
    pub fn fail_order(&self, order_id: OrderId) -> bool {
        match self.remove(order_id) {
            Some(order) => {
                warn!("order {} ({}) failed and was dropped", order.id, order.kind);
                true
            }
            None => false,
        }
    }

    /// Every order below this id has been completed or failed.
    pub fn oldest_open_id(&self) -> OrderId {
        let guard = self.state.lock().expect("order book mutex poisoned");
        guard.pending.first().map_or(guard.next_id, |o| o.id)
    }

    pub fn is_pending(&self, order_id: OrderId) -> bool {
        let guard = self.state.lock().expect("order book mutex poisoned");
        guard.pending.iter().any(|o| o.id == order_id)
    }

    /// Pop the oldest outstanding ingredient demand.
    pub fn next_demanded_ingredient(&self) -> Option<Demand> {
        self.demand.try_pop()
    }

    /// Like `next_demanded_ingredient`, but waits up to `timeout` for one.
    pub fn wait_demanded_ingredient(&self, timeout: Duration) -> Option<Demand> {
        self.demand.pop_timeout(timeout)
    }

    /// Snapshot of every pending order, in spawn order.
    pub fn pending_orders(&self) -> Vec<Order> {
        self.state
            .lock()
            .expect("order book mutex poisoned")
            .pending
            .clone()
    }

    pub fn pending_count(&self) -> usize {
        self.state
            .lock()
            .expect("order book mutex poisoned")
            .pending
            .len()
    }

    pub fn pending_demand_count(&self) -> usize {
        self.demand.len()
    }

    /// Number of orders spawned so far.
    pub fn spawned(&self) -> u64 {
        self.state.lock().expect("order book mutex poisoned").next_id
    }

    /// Halt spawning for good and wake anyone blocked on the demand queue.
    pub fn stop_spawning(&self) {
        let mut guard = self.state.lock().expect("order book mutex poisoned");
        guard.spawning = false;
        self.demand.close();
    }

    pub fn is_spawning(&self) -> bool {
        self.state.lock().expect("order book mutex poisoned").spawning
    }
}

/// Draws spawn intervals uniformly from `[min, max]`.
pub struct SpawnSchedule {
    min: Duration,
    max: Duration,
    rng: StdRng,
}

impl SpawnSchedule {
    pub fn new(min: Duration, max: Duration, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { min, max, rng }
    }

    pub fn next_delay(&mut self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        self.rng.gen_range(self.min..=self.max)
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::default_recipes;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;

    fn book() -> OrderBook {
        OrderBook::new(Catalog::new(default_recipes()))
    }

    #[test]
    fn two_workers_race_for_one_soup() {
        let book = Arc::new(book());
        let order = book.spawn(RecipeKind::OnionSoup).expect("spawning");
        assert_eq!(order.ingredients, vec![IngredientType::Onion; 3]);

        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = (0..2u64)
            .map(|worker| {
                let book = Arc::clone(&book);
                let barrier = Arc::clone(&barrier);
                let order = order.clone();
                thread::spawn(move || {
                    barrier.wait();
                    book.try_reserve(&order, worker)
                })
            })
            .collect();
        let results: Vec<bool> = handles
            .into_iter()
            .map(|h| h.join().expect("racer panicked"))
            .collect();
        assert_eq!(results.iter().filter(|won| **won).count(), 1);
        assert_eq!(book.next_order(), None);
    }

    #[test]
    fn next_order_skips_reserved_in_spawn_order() {
        let book = book();
        let first = book.spawn(RecipeKind::Burger).expect("spawning");
        let second = book.spawn(RecipeKind::TomatoSoup).expect("spawning");
        assert_eq!(book.next_order().map(|o| o.id), Some(first.id));
        assert!(book.try_reserve(&first, 1));
        assert!(!book.try_reserve(&first, 2));
        assert_eq!(book.next_order().map(|o| o.id), Some(second.id));
    }

    #[test]
    fn completion_removes_exactly_once_under_duplicates() {
        let book = Arc::new(book());
        let order = book.spawn(RecipeKind::MushroomSoup).expect("spawning");
        let callers = 8;
        let barrier = Arc::new(Barrier::new(callers));
        let removed = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..callers)
            .map(|_| {
                let book = Arc::clone(&book);
                let barrier = Arc::clone(&barrier);
                let removed = Arc::clone(&removed);
                let order = order.clone();
                thread::spawn(move || {
                    barrier.wait();
                    if book.complete_order(&order) {
                        removed.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("completer panicked");
        }
        assert_eq!(removed.load(Ordering::SeqCst), 1);
        assert_eq!(book.pending_count(), 0);
    }

    #[test]
    fn reserving_a_completed_order_fails() {
        let book = book();
        let order = book.spawn(RecipeKind::Burger).expect("spawning");
        assert!(book.complete_order(&order));
        assert!(!book.try_reserve(&order, 1));
        assert!(!book.complete_order(&order));
    }

    #[test]
    fn demand_is_queued_per_ingredient_with_order_tag() {
        let book = book();
        let soup = book.spawn(RecipeKind::OnionSoup).expect("spawning");
        let burger = book.spawn(RecipeKind::Burger).expect("spawning");
        assert_eq!(book.pending_demand_count(), 7);

        let drained: Vec<Demand> = std::iter::from_fn(|| book.next_demanded_ingredient()).collect();
        assert_eq!(drained.len(), 7);
        assert!(drained[..3].iter().all(|d| d.order_id == soup.id));
        assert!(drained[3..].iter().all(|d| d.order_id == burger.id));
        // Demand is independent of reservation.
        assert_eq!(book.next_order().map(|o| o.id), Some(soup.id));
    }

    #[test]
    fn release_only_by_the_reserving_worker() {
        let book = book();
        let order = book.spawn(RecipeKind::TomatoSoup).expect("spawning");
        assert!(book.try_reserve(&order, 4));
        assert!(!book.release(&order, 5));
        assert!(book.release(&order, 4));
        assert!(book.try_reserve(&order, 5));
    }

    #[test]
    fn stop_spawning_refuses_new_orders() {
        let book = book();
        assert!(book.is_spawning());
        book.stop_spawning();
        assert!(!book.is_spawning());
        assert_eq!(book.spawn(RecipeKind::Burger), None);
        assert_eq!(book.spawned(), 0);
    }

    #[test]
    fn unknown_kind_is_not_spawned() {
        let book = OrderBook::new(Catalog::new(Vec::new()));
        assert_eq!(book.spawn(RecipeKind::Burger), None);
        let mut schedule = SpawnSchedule::new(Duration::ZERO, Duration::ZERO, Some(1));
        assert_eq!(book.spawn_random(schedule.rng()), None);
    }

    #[test]
    fn schedule_stays_inside_bounds() {
        let min = Duration::from_millis(20);
        let max = Duration::from_millis(50);
        let mut schedule = SpawnSchedule::new(min, max, Some(7));
        for _ in 0..500 {
            let delay = schedule.next_delay();
            assert!(delay >= min && delay <= max);
        }
        let mut fixed = SpawnSchedule::new(max, max, None);
        assert_eq!(fixed.next_delay(), max);
    }

    #[test]
    fn failing_by_id_happens_once() {
        let book = book();
        let order = book.spawn(RecipeKind::TomatoSoup).expect("spawning");
        assert!(book.try_reserve(&order, 2));
        assert!(book.fail_order(order.id));
        assert!(!book.fail_order(order.id));
        assert!(!book.complete_order(&order));
        assert!(!book.is_pending(order.id));
    }

    #[test]
    fn untracked_demand_stays_empty() {
        let book = OrderBook::with_demand(Catalog::new(default_recipes()), false);
        book.spawn(RecipeKind::Burger).expect("spawning");
        book.spawn(RecipeKind::OnionSoup).expect("spawning");
        assert_eq!(book.pending_demand_count(), 0);
        assert_eq!(book.next_demanded_ingredient(), None);
        assert_eq!(book.pending_count(), 2);
    }

    #[test]
    fn oldest_open_id_tracks_the_first_pending_order() {
        let book = book();
        assert_eq!(book.oldest_open_id(), 0);
        let first = book.spawn(RecipeKind::Burger).expect("spawning");
        let second = book.spawn(RecipeKind::OnionSoup).expect("spawning");
        assert_eq!(book.oldest_open_id(), first.id);

        assert!(book.complete_order(&second));
        assert_eq!(book.oldest_open_id(), first.id);
        assert!(book.fail_order(first.id));
        assert_eq!(book.oldest_open_id(), 2);
    }
}
