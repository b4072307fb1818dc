//! The coordination context: every station, the order book and the shared
//! observers, constructed once and handed to workers behind an `Arc`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{info, warn};

use crate::assembly::AssemblyStation;
use crate::config::KitchenConfig;
use crate::cooking::CookingStation;
use crate::cutting::CuttingStation;
use crate::error::KitchenError;
use crate::order_book::{Order, OrderBook};
use crate::recipe::Sourcing;
use crate::serve::{Scoreboard, ServeListener, ServeStation};
use crate::staging::StagingQueue;
use crate::stats::KitchenStats;
use crate::supply::SupplyStation;
use crate::types::{
    IngredientState, IngredientType, OrderId, Position, StationId, UtensilKind, WorkerId,
};
use crate::watchdog::Watchdog;

// Floor layout: one row per station family, stations spaced along x.
const STATION_SPACING: f32 = 2.0;
const ROW_SUPPLY: f32 = 0.0;
const ROW_CUTTING: f32 = 4.0;
const ROW_COOKING: f32 = 8.0;
const ROW_STAGING: f32 = 12.0;
const ROW_ASSEMBLY: f32 = 16.0;
const ROW_SERVE: f32 = 20.0;

fn slot(index: usize, row: f32) -> Position {
    Position::new(index as f32 * STATION_SPACING, row)
}

/// How the kitchen is wound down.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopMode {
    /// Stop spawning; workers finish what is in flight, then exit.
    Drain,
    /// Stop spawning and make every waiting worker bail out.
    Halt,
}

/// Read-only dashboard row for one station.
#[derive(Clone, Debug, PartialEq)]
pub struct StationStatus {
    pub id: StationId,
    pub holder: Option<WorkerId>,
    pub item: Option<(IngredientType, IngredientState)>,
    /// Stock, queue depth, slot count or plates served, depending on the station.
    pub depth: usize,
}

pub struct Kitchen {
    config: KitchenConfig,
    supplies: Vec<SupplyStation>,
    cutting: Vec<CuttingStation>,
    cooking: Vec<CookingStation>,
    staging: Vec<StagingQueue>,
    assembly: Vec<AssemblyStation>,
    serve: ServeStation,
    orders: OrderBook,
    stats: KitchenStats,
    watchdog: Watchdog,
    scoreboard: Arc<Scoreboard>,
    halted: AtomicBool,
}

impl Kitchen {
    /// Validate `config` and lay out the stations it describes.
    pub fn new(config: KitchenConfig) -> Result<Self, KitchenError> {
        config.validate()?;
        for problem in config.warnings() {
            warn!("{problem}; affected orders will fail");
        }

        let stations = &config.stations;
        let timing = &config.timing;
        let supplies = stations
            .supplies
            .iter()
            .enumerate()
            .map(|(i, &kind)| {
                SupplyStation::new(
                    i,
                    kind,
                    slot(i, ROW_SUPPLY),
                    stations.supply_initial_stock,
                    stations.supply_low_water,
                )
            })
            .collect();
        let cutting = (0..stations.cutting)
            .map(|i| {
                CuttingStation::new(
                    i,
                    slot(i, ROW_CUTTING),
                    stations.interaction_radius,
                    timing.cutting(),
                )
            })
            .collect();
        let cooking = (0..stations.cooking)
            .map(|i| {
                CookingStation::new(
                    i,
                    slot(i, ROW_COOKING),
                    timing.cooking(),
                    stations.pot_capacity,
                    stations.pan_capacity,
                )
            })
            .collect();
        let staging = (0..stations.staging)
            .map(|i| StagingQueue::new(i, slot(i, ROW_STAGING), stations.staging_capacity))
            .collect();
        let assembly = (0..stations.assembly)
            .map(|i| AssemblyStation::new(i, slot(i, ROW_ASSEMBLY)))
            .collect();

        let serve = ServeStation::new(0, slot(0, ROW_SERVE));
        let scoreboard = Arc::new(Scoreboard::new(timing.session()));
        serve.subscribe(scoreboard.clone());

        let orders = OrderBook::with_demand(config.catalog(), config.crew.preps > 0);
        info!(
            "kitchen ready: {} chefs, {} preps, {} recipes",
            config.crew.chefs,
            config.crew.preps,
            config.recipes.len()
        );
        Ok(Self {
            config,
            supplies,
            cutting,
            cooking,
            staging,
            assembly,
            serve,
            orders,
            stats: KitchenStats::new(),
            watchdog: Watchdog::new(),
            scoreboard,
            halted: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &KitchenConfig {
        &self.config
    }

    pub fn supplies(&self) -> &[SupplyStation] {
        &self.supplies
    }

    pub fn supply_for(&self, kind: IngredientType) -> Option<&SupplyStation> {
        self.supplies.iter().find(|s| s.kind() == kind)
    }

    pub fn cutting(&self) -> &[CuttingStation] {
        &self.cutting
    }

    pub fn cooking(&self) -> &[CookingStation] {
        &self.cooking
    }

    pub fn staging(&self) -> &[StagingQueue] {
        &self.staging
    }

    pub fn assembly(&self) -> &[AssemblyStation] {
        &self.assembly
    }

    pub fn serve_station(&self) -> &ServeStation {
        &self.serve
    }

    pub fn orders(&self) -> &OrderBook {
        &self.orders
    }

    pub fn stats(&self) -> &KitchenStats {
        &self.stats
    }

    pub fn watchdog(&self) -> &Watchdog {
        &self.watchdog
    }

    pub fn scoreboard(&self) -> &Scoreboard {
        &self.scoreboard
    }

    /// Register an extra observer of served orders.
    pub fn on_served(&self, listener: Arc<dyn ServeListener>) {
        self.serve.subscribe(listener);
    }

    pub fn has_utensil(&self, utensil: UtensilKind) -> bool {
        self.config.utensils.contains(&utensil)
    }

    /// Chefs collect from staging whenever prep workers are on shift.
    pub fn sourcing(&self) -> Sourcing {
        if self.config.crew.preps > 0 {
            Sourcing::Staged
        } else {
            Sourcing::Solo
        }
    }

    /// Close a served order and count it. Returns false if it was already gone.
    pub fn complete_order(&self, order: &Order) -> bool {
        if !self.orders.complete_order(order) {
            return false;
        }
        self.stats.record_served();
        self.serve.settle_below(self.orders.oldest_open_id());
        true
    }

    /// Drop an order that cannot be produced, along with anything staged for it.
    ///
    /// Returns false if the order was already gone; only the caller that gets
    /// true counts the failure.
    pub fn fail_order(&self, order_id: OrderId) -> bool {
        if !self.orders.fail_order(order_id) {
            return false;
        }
        self.stats.record_failed();
        let purged: usize = self.staging.iter().map(|q| q.purge_order(order_id)).sum();
        if purged > 0 {
            info!("discarded {purged} staged items for failed order {order_id}");
        }
        self.serve.settle_below(self.orders.oldest_open_id());
        true
    }

    /// Where workers start their shift.
    pub fn entrance(&self) -> Position {
        Position::default()
    }

    /// Advance every timed station by `dt`.
    pub fn tick(&self, dt: Duration) {
        for board in &self.cutting {
            board.tick(dt);
        }
        for stove in &self.cooking {
            stove.tick(dt);
        }
    }

    /// Raise the "simulation finished" flag.
    pub fn finish(&self, mode: StopMode) {
        self.orders.stop_spawning();
        if mode == StopMode::Halt {
            self.halted.store(true, Ordering::SeqCst);
        }
        info!("kitchen finishing ({mode:?})");
    }

    pub fn is_finished(&self) -> bool {
        !self.orders.is_spawning()
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// One row per station, in layout order.
    pub fn station_statuses(&self) -> Vec<StationStatus> {
        let mut rows = Vec::new();
        rows.extend(self.supplies.iter().map(|s| StationStatus {
            id: s.id(),
            holder: None,
            item: Some((s.kind(), IngredientState::Raw)),
            depth: s.stock(),
        }));
        rows.extend(self.cutting.iter().map(|b| StationStatus {
            id: b.id(),
            holder: b.holder(),
            item: b.held(),
            depth: usize::from(b.has_ingredient()),
        }));
        rows.extend(self.cooking.iter().map(|c| StationStatus {
            id: c.id(),
            holder: c.holder(),
            item: c.contents().first().map(|i| (i.kind, i.state)),
            depth: c.count(),
        }));
        rows.extend(self.staging.iter().map(|q| StationStatus {
            id: q.id(),
            holder: None,
            item: None,
            depth: q.count(),
        }));
        rows.extend(self.assembly.iter().map(|a| StationStatus {
            id: a.id(),
            holder: a.holder(),
            item: None,
            depth: a.count(),
        }));
        rows.push(StationStatus {
            id: self.serve.id(),
            holder: None,
            item: None,
            depth: self.serve.served_count(),
        });
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::RecipeKind;
    use crate::types::{Ingredient, StationKind};

    #[test]
    fn layout_follows_the_config() {
        let kitchen = Kitchen::new(KitchenConfig::default()).expect("default kitchen");
        assert_eq!(kitchen.supplies().len(), IngredientType::ALL.len());
        assert_eq!(kitchen.cutting().len(), 2);
        assert!(kitchen.supply_for(IngredientType::Meat).is_some());
        assert_eq!(kitchen.sourcing(), Sourcing::Solo);

        let statuses = kitchen.station_statuses();
        let serve = statuses.last().expect("serve row");
        assert_eq!(serve.id.kind, StationKind::Serve);
        assert!(statuses.iter().all(|s| s.holder.is_none()));
    }

    #[test]
    fn invalid_config_is_refused() {
        let mut config = KitchenConfig::default();
        config.stations.assembly = 0;
        assert!(Kitchen::new(config).is_err());
    }

    #[test]
    fn tick_drives_every_cutting_board() {
        let kitchen = Kitchen::new(KitchenConfig::default()).expect("default kitchen");
        let board = &kitchen.cutting()[1];
        board
            .place(Ingredient::raw(IngredientType::Onion))
            .expect("empty board");
        assert!(board.try_start_cutting(9, board.position()));

        let statuses = kitchen.station_statuses();
        let row = statuses
            .iter()
            .find(|s| s.id == board.id())
            .expect("cutting row");
        assert_eq!(row.holder, Some(9));
        assert_eq!(row.item, Some((IngredientType::Onion, IngredientState::Raw)));

        kitchen.tick(kitchen.config().timing.cutting());
        assert!(!board.is_cutting());
        assert_eq!(
            board.take(9).map(|i| i.state),
            Some(IngredientState::Cut)
        );
    }

    #[test]
    fn finish_modes() {
        let kitchen = Kitchen::new(KitchenConfig::default()).expect("default kitchen");
        kitchen.finish(StopMode::Drain);
        assert!(kitchen.is_finished());
        assert!(!kitchen.is_halted());
        assert_eq!(kitchen.orders().spawn(RecipeKind::Burger), None);

        let kitchen = Kitchen::new(KitchenConfig::default()).expect("default kitchen");
        kitchen.finish(StopMode::Halt);
        assert!(kitchen.is_halted());
    }

    #[test]
    fn failing_an_order_clears_its_staged_items() {
        let mut config = KitchenConfig::default();
        config.crew.preps = 1;
        let kitchen = Kitchen::new(config).expect("staged kitchen");
        let doomed = kitchen.orders().spawn(RecipeKind::Burger).expect("spawning");
        let kept = kitchen.orders().spawn(RecipeKind::OnionSoup).expect("spawning");
        assert_eq!(kitchen.orders().pending_demand_count(), 7);

        let staging = &kitchen.staging()[0];
        staging
            .add(Ingredient::raw(IngredientType::Bun).tagged(doomed.id))
            .expect("unbounded");
        staging
            .add(Ingredient::raw(IngredientType::Onion).tagged(kept.id))
            .expect("unbounded");

        assert!(kitchen.fail_order(doomed.id));
        assert!(!kitchen.fail_order(doomed.id));
        assert_eq!(kitchen.stats().failed(), 1);
        assert_eq!(staging.count(), 1);
        assert!(staging.has_of_type_for_order(IngredientType::Onion, kept.id));
    }

    #[test]
    fn solo_kitchen_queues_no_demand() {
        let kitchen = Kitchen::new(KitchenConfig::default()).expect("default kitchen");
        let order = kitchen.orders().spawn(RecipeKind::Burger).expect("spawning");
        assert_eq!(kitchen.orders().pending_demand_count(), 0);

        assert!(kitchen.complete_order(&order));
        assert!(!kitchen.complete_order(&order));
        assert_eq!(kitchen.stats().served(), 1);
    }
}
