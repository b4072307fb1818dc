//! Worker pipeline: one polling state machine per worker thread.
//!
//! Chefs reserve orders and run the recipe's step plan. Prep workers drain the
//! ingredient demand queue into staging so chefs only collect.

use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, error, info};

use crate::assembly::AssemblyStation;
use crate::cooking::CookingStation;
use crate::cutting::CuttingStation;
use crate::demand::Demand;
use crate::error::KitchenError;
use crate::kitchen::Kitchen;
use crate::order_book::Order;
use crate::recipe::Step;
use crate::types::{Ingredient, IngredientType, OrderId, Position, UtensilKind, WorkerId};
use crate::watchdog::Activity;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// Owns orders end to end.
    Chef,
    /// Fetches and cuts demanded ingredients into staging.
    Prep,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Chef => f.write_str("chef"),
            Role::Prep => f.write_str("prep"),
        }
    }
}

/// What a worker got done before its loop exited.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerReport {
    pub id: WorkerId,
    pub role: Role,
    pub served: usize,
    pub failed: usize,
    pub prepared: usize,
}

/// Stations the worker currently holds, by index into the kitchen's lists.
#[derive(Default)]
struct Claims {
    plate: Option<usize>,
    stove: Option<usize>,
    board: Option<usize>,
}

pub struct Worker {
    id: WorkerId,
    role: Role,
    kitchen: Arc<Kitchen>,
    position: Position,
    /// At most one ingredient in hand.
    carried: Option<Ingredient>,
    claims: Claims,
    activity: Activity,
    report: WorkerReport,
}

impl Worker {
    pub fn new(id: WorkerId, role: Role, kitchen: Arc<Kitchen>) -> Self {
        let position = kitchen.entrance();
        Self {
            id,
            role,
            kitchen,
            position,
            carried: None,
            claims: Claims::default(),
            activity: Activity::Idle,
            report: WorkerReport {
                id,
                role,
                served: 0,
                failed: 0,
                prepared: 0,
            },
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Work until the kitchen finishes, then report.
    pub fn run(mut self) -> WorkerReport {
        let kitchen = Arc::clone(&self.kitchen);
        kitchen.watchdog().clock_in(self.id, self.role);
        match self.role {
            Role::Chef => self.run_chef(),
            Role::Prep => self.run_prep(),
        }
        kitchen.watchdog().clock_out(self.id);
        info!(
            "{} {} off shift: served={} failed={} prepared={}",
            self.role, self.id, self.report.served, self.report.failed, self.report.prepared
        );
        self.report
    }

    fn run_chef(&mut self) {
        let kitchen = Arc::clone(&self.kitchen);
        let orders = kitchen.orders();
        loop {
            if kitchen.is_halted() {
                break;
            }
            let Some(order) = orders.next_order() else {
                if !orders.is_spawning() {
                    break;
                }
                self.heartbeat();
                thread::sleep(kitchen.config().timing.idle());
                continue;
            };
            if !orders.try_reserve(&order, self.id) {
                kitchen.stats().record_order_race();
                debug!("chef {} lost the race for order {}", self.id, order.id);
                continue;
            }

            match self.fulfil(&order) {
                Ok(()) => self.report.served += 1,
                Err(KitchenError::Halted) => {
                    self.abandon();
                    orders.release(&order, self.id);
                    break;
                }
                Err(KitchenError::OrderGone { order_id }) => {
                    info!("chef {} let go of order {order_id}, failed elsewhere", self.id);
                    self.abandon();
                }
                Err(err) => {
                    error!("chef {} dropping order {}: {err}", self.id, order.id);
                    self.abandon();
                    if kitchen.fail_order(order.id) {
                        self.report.failed += 1;
                    }
                }
            }
            self.activity = Activity::Idle;
            self.heartbeat();
        }
    }

    fn run_prep(&mut self) {
        let kitchen = Arc::clone(&self.kitchen);
        let orders = kitchen.orders();
        let idle = kitchen.config().timing.idle();
        loop {
            if kitchen.is_halted() {
                break;
            }
            let Some(demand) = orders.wait_demanded_ingredient(idle) else {
                if !orders.is_spawning() && orders.pending_demand_count() == 0 {
                    break;
                }
                self.heartbeat();
                continue;
            };
            if !orders.is_pending(demand.order_id) {
                debug!("prep {} skipping {} for closed order {}", self.id, demand.kind, demand.order_id);
                continue;
            }

            self.activity = Activity::Prep {
                order_id: demand.order_id,
                kind: demand.kind,
            };
            self.heartbeat();
            match self.prepare(demand) {
                Ok(()) => self.report.prepared += 1,
                Err(KitchenError::Halted) => {
                    self.abandon();
                    break;
                }
                Err(KitchenError::OrderGone { order_id }) => {
                    debug!("prep {} dropped {} for closed order {order_id}", self.id, demand.kind);
                    self.abandon();
                }
                Err(err) => {
                    error!("prep {} dropping order {}: {err}", self.id, demand.order_id);
                    self.abandon();
                    if kitchen.fail_order(demand.order_id) {
                        self.report.failed += 1;
                    }
                }
            }
            self.activity = Activity::Idle;
            self.heartbeat();
        }
    }

    /// Take one order from reservation to the serving counter.
    fn fulfil(&mut self, order: &Order) -> Result<(), KitchenError> {
        let kitchen = Arc::clone(&self.kitchen);
        let spec = kitchen
            .orders()
            .catalog()
            .get(order.kind)
            .ok_or(KitchenError::UnknownRecipe { kind: order.kind })?;
        let plan = spec.plan(kitchen.sourcing());
        info!("chef {} starting order {} ({}, {} steps)", self.id, order.id, order.kind, plan.len());

        self.activity = Activity::Order {
            order_id: order.id,
            step: None,
        };
        self.heartbeat();
        let plate = self.claim_plate(order)?;
        for step in plan {
            self.activity = Activity::Order {
                order_id: order.id,
                step: Some(step),
            };
            self.heartbeat();
            self.execute(step, order, plate)?;
        }
        self.deliver(order, plate)
    }

    fn execute(&mut self, step: Step, order: &Order, plate: usize) -> Result<(), KitchenError> {
        debug!("{} {} order {}: {step:?}", self.role, self.id, order.id);
        match step {
            Step::Fetch(kind) => {
                let kitchen = Arc::clone(&self.kitchen);
                let supply = kitchen
                    .supply_for(kind)
                    .ok_or(KitchenError::MissingSupply { kind })?;
                self.travel_to(supply.position());
                self.pick_up(supply.take().tagged(order.id));
                Ok(())
            }
            Step::Collect(kind) => self.collect(kind, order.id),
            Step::Cut => self.cut(),
            Step::Cook(utensil) => self.cook(utensil, order),
            Step::PlaceOnAssembly => self.place_on_assembly(order, plate),
        }
    }

    /// Retry `probe` every poll interval until it yields, or the kitchen halts.
    fn wait_for<T>(&self, mut probe: impl FnMut() -> Option<T>) -> Result<T, KitchenError> {
        let poll = self.kitchen.config().timing.poll();
        loop {
            if let Some(found) = probe() {
                return Ok(found);
            }
            if self.kitchen.is_halted() {
                return Err(KitchenError::Halted);
            }
            self.kitchen.stats().record_retry();
            thread::sleep(poll);
        }
    }

    fn travel_to(&mut self, target: Position) {
        let speed = self.kitchen.config().timing.move_speed;
        let distance = self.position.distance(target);
        if speed > 0.0 && distance > 0.0 {
            thread::sleep(Duration::from_secs_f32(distance / speed));
        }
        self.position = target;
    }

    fn pick_up(&mut self, item: Ingredient) {
        if let Some(dropped) = self.carried.replace(item) {
            debug!("{} {} dropped {dropped}", self.role, self.id);
        }
    }

    fn heartbeat(&self) {
        self.kitchen.watchdog().progress(self.id, self.activity);
    }

    fn claim_plate(&mut self, order: &Order) -> Result<usize, KitchenError> {
        let kitchen = Arc::clone(&self.kitchen);
        loop {
            let index = self.wait_for(|| kitchen.assembly().iter().position(AssemblyStation::is_free))?;
            let station = &kitchen.assembly()[index];
            self.travel_to(station.position());
            if station.place_plate(self.id, order.id) {
                kitchen.stats().enter(station.id());
                station.set_order(order);
                self.claims.plate = Some(index);
                return Ok(index);
            }
            kitchen.stats().record_denial();
        }
    }

    fn claim_stove(&mut self, utensil: UtensilKind, order: &Order) -> Result<usize, KitchenError> {
        let kitchen = Arc::clone(&self.kitchen);
        if !kitchen.has_utensil(utensil) {
            return Err(KitchenError::MissingUtensil {
                recipe: order.kind,
                utensil,
            });
        }
        loop {
            let index = self.wait_for(|| kitchen.cooking().iter().position(CookingStation::is_free))?;
            let stove = &kitchen.cooking()[index];
            self.travel_to(stove.position());
            if stove.place_utensil(utensil, self.id) {
                kitchen.stats().enter(stove.id());
                self.claims.stove = Some(index);
                return Ok(index);
            }
            kitchen.stats().record_denial();
        }
    }

    fn collect(&mut self, kind: IngredientType, order_id: OrderId) -> Result<(), KitchenError> {
        let kitchen = Arc::clone(&self.kitchen);
        let orders = kitchen.orders();
        loop {
            let index = self.wait_for(|| {
                if !orders.is_pending(order_id) {
                    return Some(Err(KitchenError::OrderGone { order_id }));
                }
                kitchen
                    .staging()
                    .iter()
                    .position(|q| q.has_of_type_for_order(kind, order_id))
                    .map(Ok)
            })??;
            let queue = &kitchen.staging()[index];
            self.travel_to(queue.position());
            if let Some(ingredient) = queue.take_of_type_for_order(kind, order_id) {
                self.pick_up(ingredient);
                return Ok(());
            }
        }
    }

    /// Run the carried ingredient through a cutting board, if it needs it.
    fn cut(&mut self) -> Result<(), KitchenError> {
        let Some(mut ingredient) = self.carried.take() else {
            return Ok(());
        };
        if !ingredient.needs_cutting() {
            self.carried = Some(ingredient);
            return Ok(());
        }

        let kitchen = Arc::clone(&self.kitchen);
        let me = self.id;
        let index = loop {
            let index = self.wait_for(|| kitchen.cutting().iter().position(CuttingStation::is_free))?;
            let board = &kitchen.cutting()[index];
            self.travel_to(board.position());
            if let Err(back) = board.place(ingredient) {
                ingredient = back;
                kitchen.stats().record_denial();
                continue;
            }
            if board.try_start_cutting(me, self.position) {
                kitchen.stats().enter(board.id());
                break index;
            }
            kitchen.stats().record_denial();
            ingredient = self.wait_for(|| board.take(me))?;
        };
        self.claims.board = Some(index);

        let board = &kitchen.cutting()[index];
        let done = self.wait_for(|| {
            if board.is_cutting() {
                return None;
            }
            kitchen.stats().pre_release(board.id());
            let taken = board.take(me);
            if taken.is_none() {
                kitchen.stats().revert_pre_release(board.id());
            }
            taken
        })?;
        self.claims.board = None;
        self.pick_up(done);
        Ok(())
    }

    /// Put the carried ingredient into the order's utensil and start it once full.
    ///
    /// A pan is cooked and emptied straight away; a pot waits for the plate step.
    fn cook(&mut self, utensil: UtensilKind, order: &Order) -> Result<(), KitchenError> {
        let kitchen = Arc::clone(&self.kitchen);
        let index = match self.claims.stove {
            Some(index) => index,
            None => self.claim_stove(utensil, order)?,
        };
        let Some(ingredient) = self.carried.take() else {
            return Ok(());
        };
        let stove = &kitchen.cooking()[index];
        self.travel_to(stove.position());
        if let Err(back) = stove.add(ingredient) {
            return Err(KitchenError::Rejected {
                order_id: order.id,
                kind: back.kind,
            });
        }
        if stove.can_start() && stove.start_cooking(order) {
            debug!("{} cooking order {} in a {utensil:?}", stove.id(), order.id);
        }

        if utensil == UtensilKind::Pan {
            self.wait_for(|| stove.is_ready().then_some(()))?;
            for item in self.clear_stove() {
                self.pick_up(item);
            }
        }
        Ok(())
    }

    fn clear_stove(&mut self) -> Vec<Ingredient> {
        let Some(index) = self.claims.stove else {
            return Vec::new();
        };
        let kitchen = Arc::clone(&self.kitchen);
        let stove = &kitchen.cooking()[index];
        kitchen.stats().pre_release(stove.id());
        match stove.clear(self.id) {
            Some(contents) => {
                self.claims.stove = None;
                contents
            }
            None => {
                kitchen.stats().revert_pre_release(stove.id());
                Vec::new()
            }
        }
    }

    fn place_on_assembly(&mut self, order: &Order, plate: usize) -> Result<(), KitchenError> {
        let kitchen = Arc::clone(&self.kitchen);
        let items = match self.carried.take() {
            Some(item) => vec![item],
            None => {
                // Soup: tip the finished pot onto the plate.
                let Some(index) = self.claims.stove else {
                    return Ok(());
                };
                let stove = &kitchen.cooking()[index];
                self.travel_to(stove.position());
                self.wait_for(|| stove.is_ready().then_some(()))?;
                self.clear_stove()
            }
        };

        let station = &kitchen.assembly()[plate];
        self.travel_to(station.position());
        for item in items {
            if let Err(back) = station.add(item) {
                kitchen.stats().record_plate_rejection();
                return Err(KitchenError::Rejected {
                    order_id: order.id,
                    kind: back.kind,
                });
            }
        }
        Ok(())
    }

    /// Wait for the plate, carry it to the counter and close the order.
    fn deliver(&mut self, order: &Order, plate: usize) -> Result<(), KitchenError> {
        let kitchen = Arc::clone(&self.kitchen);
        let station = &kitchen.assembly()[plate];
        let me = self.id;
        let finished = self.wait_for(|| {
            if !station.is_ready() {
                return None;
            }
            kitchen.stats().pre_release(station.id());
            let taken = station.take(me);
            if taken.is_none() {
                kitchen.stats().revert_pre_release(station.id());
            }
            taken
        })?;
        self.claims.plate = None;

        let counter = kitchen.serve_station();
        self.travel_to(counter.position());
        counter.serve(finished);
        kitchen.complete_order(order);
        Ok(())
    }

    /// Fetch, cut and stage one demanded ingredient.
    ///
    /// Nothing is left in staging for an order that closed in the meantime.
    fn prepare(&mut self, demand: Demand) -> Result<(), KitchenError> {
        let kitchen = Arc::clone(&self.kitchen);
        let supply = kitchen
            .supply_for(demand.kind)
            .ok_or(KitchenError::MissingSupply { kind: demand.kind })?;
        self.travel_to(supply.position());
        self.pick_up(supply.take().tagged(demand.order_id));
        self.cut()?;

        let gone = KitchenError::OrderGone {
            order_id: demand.order_id,
        };
        if !kitchen.orders().is_pending(demand.order_id) {
            return Err(gone);
        }
        let Some(mut item) = self.carried.take() else {
            return Ok(());
        };
        loop {
            let index = self.wait_for(|| kitchen.staging().iter().position(|q| !q.is_full()))?;
            let queue = &kitchen.staging()[index];
            self.travel_to(queue.position());
            match queue.add(item) {
                Ok(()) => {
                    // A failure that purged staging before this add missed the item.
                    if !kitchen.orders().is_pending(demand.order_id) {
                        queue.take_of_type_for_order(demand.kind, demand.order_id);
                        return Err(gone);
                    }
                    return Ok(());
                }
                Err(back) => {
                    item = back;
                    kitchen.stats().record_denial();
                }
            }
        }
    }

    /// Drop whatever is in hand and give back every held station.
    fn abandon(&mut self) {
        let kitchen = Arc::clone(&self.kitchen);
        let stats = kitchen.stats();
        if let Some(dropped) = self.carried.take() {
            debug!("{} {} discarded {dropped}", self.role, self.id);
        }
        if self.claims.stove.is_some() {
            self.clear_stove();
        }
        if let Some(index) = self.claims.plate.take() {
            let station = &kitchen.assembly()[index];
            stats.pre_release(station.id());
            if station.discard(self.id).is_none() {
                stats.revert_pre_release(station.id());
            }
        }
        if let Some(index) = self.claims.board.take() {
            let board = &kitchen.cutting()[index];
            stats.pre_release(board.id());
            if board.holder() == Some(self.id) {
                if let Some(dropped) = board.cancel(self.id) {
                    debug!("{} {} left {dropped} uncut", self.role, self.id);
                }
            } else {
                stats.revert_pre_release(board.id());
            }
        }
    }
}
