//! Timed single-slot cutting board.
//!
//! Empty -> Loaded -> Cutting -> Done -> Empty. The board is advanced by
//! `tick`; only a worker standing within the interaction radius can start it.

use std::sync::Mutex;
use std::time::Duration;

use crate::resource::Resource;
use crate::types::{
    Ingredient, IngredientState, IngredientType, Position, StationId, StationKind, WorkerId,
};

struct CuttingState {
    held: Option<Ingredient>,
    cutting: bool,
    elapsed: Duration,
}

pub struct CuttingStation {
    id: StationId,
    position: Position,
    radius: f32,
    duration: Duration,
    reservation: Resource,
    state: Mutex<CuttingState>,
}

impl CuttingStation {
    pub fn new(index: usize, position: Position, radius: f32, duration: Duration) -> Self {
        Self {
            id: StationId::new(StationKind::Cutting, index),
            position,
            radius,
            duration,
            reservation: Resource::new(),
            state: Mutex::new(CuttingState {
                held: None,
                cutting: false,
                elapsed: Duration::ZERO,
            }),
        }
    }

    /// Load the board; hands the ingredient back if something is already on it.
    pub fn place(&self, ingredient: Ingredient) -> Result<(), Ingredient> {
        let mut guard = self.state.lock().expect("cutting mutex poisoned");
        if guard.held.is_some() {
            return Err(ingredient);
        }
        guard.held = Some(ingredient);
        guard.elapsed = Duration::ZERO;
        Ok(())
    }

    /// Start cutting the loaded ingredient on behalf of `worker` standing at `at`.
    pub fn try_start_cutting(&self, worker: WorkerId, at: Position) -> bool {
        let mut guard = self.state.lock().expect("cutting mutex poisoned");
        if guard.held.is_none() || guard.cutting {
            return false;
        }
        if at.distance(self.position) > self.radius {
            return false;
        }
        if !self.reservation.try_reserve(worker) {
            return false;
        }
        guard.cutting = true;
        guard.elapsed = Duration::ZERO;
        true
    }

    /// Advance the cutting timer by `dt`.
    pub fn tick(&self, dt: Duration) {
        let mut guard = self.state.lock().expect("cutting mutex poisoned");
        if !guard.cutting {
            return;
        }
        guard.elapsed += dt;
        if guard.elapsed >= self.duration {
            if let Some(ingredient) = guard.held.as_mut() {
                ingredient.cut();
            }
            guard.cutting = false;
        }
    }

    /// Remove whatever is on the board unless it is still being cut.
    ///
    /// A reserved board only gives its ingredient to the holder, whose
    /// reservation is released. An unstarted board is unreserved and hands the
    /// ingredient back to anyone.
    pub fn take(&self, worker: WorkerId) -> Option<Ingredient> {
        let mut guard = self.state.lock().expect("cutting mutex poisoned");
        if guard.cutting {
            return None;
        }
        let holder = self.reservation.holder();
        if holder.is_some_and(|h| h != worker) {
            return None;
        }
        let ingredient = guard.held.take()?;
        guard.elapsed = Duration::ZERO;
        if holder.is_some() {
            self.reservation.release(worker);
        }
        Some(ingredient)
    }

    /// Abort the holder's cut: stop the timer, clear the board and release it.
    ///
    /// Returns `None` and changes nothing unless `worker` holds the board.
    pub fn cancel(&self, worker: WorkerId) -> Option<Ingredient> {
        let mut guard = self.state.lock().expect("cutting mutex poisoned");
        if self.reservation.holder() != Some(worker) {
            return None;
        }
        let ingredient = guard.held.take();
        guard.cutting = false;
        guard.elapsed = Duration::ZERO;
        self.reservation.release(worker);
        ingredient
    }

    pub fn is_cutting(&self) -> bool {
        self.state.lock().expect("cutting mutex poisoned").cutting
    }

    pub fn has_ingredient(&self) -> bool {
        self.state
            .lock()
            .expect("cutting mutex poisoned")
            .held
            .is_some()
    }

    /// Whether a worker could load this board right now.
    pub fn is_free(&self) -> bool {
        !self.has_ingredient() && self.reservation.is_available()
    }

    /// Type and state of the item on the board, for dashboards.
    pub fn held(&self) -> Option<(IngredientType, IngredientState)> {
        let guard = self.state.lock().expect("cutting mutex poisoned");
        guard.held.as_ref().map(|i| (i.kind, i.state))
    }

    pub fn holder(&self) -> Option<WorkerId> {
        self.reservation.holder()
    }

    pub fn is_available(&self) -> bool {
        self.reservation.is_available()
    }

    pub fn id(&self) -> StationId {
        self.id
    }

    pub fn position(&self) -> Position {
        self.position
    }
}
