//! Timed multi-slot cooking surface.
//!
//! A utensil must be placed (which also reserves the station) before any
//! ingredient is accepted. A pot takes a full batch and only starts once the
//! batch is complete; a pan starts with a single item. Contents leave the
//! station only through `clear`.

use std::sync::Mutex;
use std::time::Duration;

use log::debug;

use crate::order_book::Order;
use crate::resource::Resource;
use crate::types::{
    Ingredient, IngredientState, IngredientType, OrderId, Position, StationId, StationKind,
    UtensilKind, WorkerId,
};

struct CookingState {
    utensil: Option<UtensilKind>,
    contents: Vec<Ingredient>,
    /// Order the contents belong to, adopted from the first tagged ingredient.
    bound_order: Option<OrderId>,
    cooking: bool,
    /// Set once the timer has run to completion for the current batch.
    cooked: bool,
    elapsed: Duration,
}

pub struct CookingStation {
    id: StationId,
    position: Position,
    duration: Duration,
    pot_capacity: usize,
    pan_capacity: usize,
    reservation: Resource,
    state: Mutex<CookingState>,
}

impl CookingStation {
    pub fn new(
        index: usize,
        position: Position,
        duration: Duration,
        pot_capacity: usize,
        pan_capacity: usize,
    ) -> Self {
        Self {
            id: StationId::new(StationKind::Cooking, index),
            position,
            duration,
            pot_capacity,
            pan_capacity,
            reservation: Resource::new(),
            state: Mutex::new(CookingState {
                utensil: None,
                contents: Vec::new(),
                bound_order: None,
                cooking: false,
                cooked: false,
                elapsed: Duration::ZERO,
            }),
        }
    }

    fn capacity(&self, utensil: UtensilKind) -> usize {
        match utensil {
            UtensilKind::Pot => self.pot_capacity,
            UtensilKind::Pan => self.pan_capacity,
        }
    }

    /// Put a pot or pan on the surface and reserve the station for `worker`.
    pub fn place_utensil(&self, utensil: UtensilKind, worker: WorkerId) -> bool {
        let mut guard = self.state.lock().expect("cooking mutex poisoned");
        if guard.utensil.is_some() {
            return false;
        }
        if !self.reservation.try_reserve(worker) {
            return false;
        }
        guard.utensil = Some(utensil);
        guard.contents.clear();
        guard.bound_order = None;
        guard.cooked = false;
        true
    }

    /// Add an ingredient to the utensil; hands it back when there is no utensil,
    /// the utensil is full or cooking, or the ingredient belongs to another order.
    pub fn add(&self, ingredient: Ingredient) -> Result<(), Ingredient> {
        let mut guard = self.state.lock().expect("cooking mutex poisoned");
        let Some(utensil) = guard.utensil else {
            return Err(ingredient);
        };
        if guard.cooking || guard.contents.len() >= self.capacity(utensil) {
            return Err(ingredient);
        }
        if let (Some(bound), Some(tag)) = (guard.bound_order, ingredient.order_id) {
            if bound != tag {
                debug!("{} refused {ingredient}: bound to order {bound}", self.id);
                return Err(ingredient);
            }
        }
        if guard.bound_order.is_none() {
            guard.bound_order = ingredient.order_id;
        }
        guard.contents.push(ingredient);
        guard.cooked = false;
        Ok(())
    }

    /// Whether the slot-count precondition for `start_cooking` is met.
    pub fn can_start(&self) -> bool {
        let guard = self.state.lock().expect("cooking mutex poisoned");
        self.can_start_locked(&guard)
    }

    fn can_start_locked(&self, state: &CookingState) -> bool {
        if state.cooking {
            return false;
        }
        match state.utensil {
            Some(UtensilKind::Pot) => state.contents.len() == self.pot_capacity,
            Some(UtensilKind::Pan) => !state.contents.is_empty(),
            None => false,
        }
    }

    /// Start the cooking timer for `order`'s batch.
    pub fn start_cooking(&self, order: &Order) -> bool {
        let mut guard = self.state.lock().expect("cooking mutex poisoned");
        if !self.can_start_locked(&guard) {
            return false;
        }
        if guard.bound_order.is_some_and(|bound| bound != order.id) {
            return false;
        }
        guard.bound_order = Some(order.id);
        guard.cooking = true;
        guard.cooked = false;
        guard.elapsed = Duration::ZERO;
        true
    }

    /// Advance the cooking timer by `dt`.
    pub fn tick(&self, dt: Duration) {
        let mut guard = self.state.lock().expect("cooking mutex poisoned");
        if !guard.cooking {
            return;
        }
        guard.elapsed += dt;
        if guard.elapsed < self.duration {
            return;
        }
        for ingredient in guard.contents.iter_mut() {
            if ingredient.kind == IngredientType::Meat && ingredient.state == IngredientState::Chopped
            {
                ingredient.state = IngredientState::Cooked;
            }
        }
        guard.cooking = false;
        guard.cooked = true;
    }

    /// Pot: a full batch whose timer has elapsed. Pan: cooked meat only.
    pub fn is_ready(&self) -> bool {
        let guard = self.state.lock().expect("cooking mutex poisoned");
        if guard.cooking || guard.contents.is_empty() {
            return false;
        }
        match guard.utensil {
            Some(UtensilKind::Pot) => guard.cooked && guard.contents.len() == self.pot_capacity,
            Some(UtensilKind::Pan) => guard.contents.iter().all(|i| {
                i.kind == IngredientType::Meat && i.state == IngredientState::Cooked
            }),
            None => false,
        }
    }

    pub fn is_cooking(&self) -> bool {
        self.state.lock().expect("cooking mutex poisoned").cooking
    }

    /// Snapshot of what is in the utensil.
    pub fn contents(&self) -> Vec<Ingredient> {
        self.state
            .lock()
            .expect("cooking mutex poisoned")
            .contents
            .clone()
    }

    /// Evict the contents, remove the utensil and release the station.
    ///
    /// Returns `None` (and changes nothing) unless `worker` holds the station.
    pub fn clear(&self, worker: WorkerId) -> Option<Vec<Ingredient>> {
        let mut guard = self.state.lock().expect("cooking mutex poisoned");
        if self.reservation.holder() != Some(worker) {
            return None;
        }
        let contents = std::mem::take(&mut guard.contents);
        guard.utensil = None;
        guard.bound_order = None;
        guard.cooking = false;
        guard.cooked = false;
        guard.elapsed = Duration::ZERO;
        self.reservation.release(worker);
        Some(contents)
    }

    pub fn has_utensil(&self) -> bool {
        self.state
            .lock()
            .expect("cooking mutex poisoned")
            .utensil
            .is_some()
    }

    pub fn utensil(&self) -> Option<UtensilKind> {
        self.state.lock().expect("cooking mutex poisoned").utensil
    }

    pub fn count(&self) -> usize {
        self.state
            .lock()
            .expect("cooking mutex poisoned")
            .contents
            .len()
    }

    /// Whether a worker could set a utensil down right now.
    pub fn is_free(&self) -> bool {
        !self.has_utensil() && self.reservation.is_available()
    }

    pub fn holder(&self) -> Option<WorkerId> {
        self.reservation.holder()
    }

    pub fn id(&self) -> StationId {
        self.id
    }

    pub fn position(&self) -> Position {
        self.position
    }
}
