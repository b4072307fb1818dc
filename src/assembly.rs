//! Plate station: accumulates ingredients for one order until its multiset is met.
//!
//! Empty -> PlateSet(order) -> Accumulating -> Ready -> Taken (Empty again).
//! `add` refuses anything the bound order does not still need, so a plate can
//! never be overfilled and readiness reduces to a total count.

use std::collections::BTreeMap;
use std::sync::Mutex;

use log::debug;

use crate::order_book::Order;
use crate::resource::Resource;
use crate::types::{
    Ingredient, IngredientType, OrderId, Plate, Position, StationId, StationKind, WorkerId,
};

#[derive(Default)]
struct PlateState {
    bound_order: Option<OrderId>,
    required: Option<BTreeMap<IngredientType, usize>>,
    contents: Vec<Ingredient>,
}

impl PlateState {
    fn on_plate(&self, kind: IngredientType) -> usize {
        self.contents.iter().filter(|i| i.kind == kind).count()
    }

    fn still_needs(&self, kind: IngredientType) -> bool {
        let required = self
            .required
            .as_ref()
            .and_then(|r| r.get(&kind))
            .copied()
            .unwrap_or(0);
        self.on_plate(kind) < required
    }

    fn required_total(&self) -> Option<usize> {
        self.required.as_ref().map(|r| r.values().sum())
    }
}

pub struct AssemblyStation {
    id: StationId,
    position: Position,
    reservation: Resource,
    state: Mutex<PlateState>,
}

impl AssemblyStation {
    pub fn new(index: usize, position: Position) -> Self {
        Self {
            id: StationId::new(StationKind::Assembly, index),
            position,
            reservation: Resource::new(),
            state: Mutex::new(PlateState::default()),
        }
    }

    /// Set down an empty plate bound to `order_id` and reserve the station.
    pub fn place_plate(&self, worker: WorkerId, order_id: OrderId) -> bool {
        let mut guard = self.state.lock().expect("plate mutex poisoned");
        if guard.bound_order.is_some() {
            return false;
        }
        if !self.reservation.try_reserve(worker) {
            return false;
        }
        *guard = PlateState {
            bound_order: Some(order_id),
            ..PlateState::default()
        };
        true
    }

    /// Attach the order's required multiset; ignored unless the plate is bound to it.
    pub fn set_order(&self, order: &Order) -> bool {
        let mut guard = self.state.lock().expect("plate mutex poisoned");
        if guard.bound_order != Some(order.id) {
            return false;
        }
        let mut required = BTreeMap::new();
        for &kind in &order.ingredients {
            *required.entry(kind).or_insert(0) += 1;
        }
        guard.required = Some(required);
        true
    }

    /// Put an ingredient on the plate.
    ///
    /// Hands it back if no plate is bound, if it is tagged for another order,
    /// or if the order already has every item of its type. Untagged
    /// ingredients adopt the plate's order.
    pub fn add(&self, mut ingredient: Ingredient) -> Result<(), Ingredient> {
        let mut guard = self.state.lock().expect("plate mutex poisoned");
        let Some(bound) = guard.bound_order else {
            return Err(ingredient);
        };
        if ingredient.order_id.is_some_and(|tag| tag != bound) {
            debug!("{} refused {ingredient}: plate is for order {bound}", self.id);
            return Err(ingredient);
        }
        if !guard.still_needs(ingredient.kind) {
            debug!("{} refused {ingredient}: not needed by order {bound}", self.id);
            return Err(ingredient);
        }
        ingredient.order_id = Some(bound);
        guard.contents.push(ingredient);
        Ok(())
    }

    /// Whether the bound order's ingredient type is still missing from the plate.
    pub fn still_needs(&self, kind: IngredientType) -> bool {
        self.state
            .lock()
            .expect("plate mutex poisoned")
            .still_needs(kind)
    }

    pub fn is_ready(&self) -> bool {
        let guard = self.state.lock().expect("plate mutex poisoned");
        guard.bound_order.is_some() && guard.required_total() == Some(guard.contents.len())
    }

    /// Lift the finished plate; only the holder can take it, and only when ready.
    pub fn take(&self, worker: WorkerId) -> Option<Plate> {
        let mut guard = self.state.lock().expect("plate mutex poisoned");
        let bound = guard.bound_order?;
        if guard.required_total() != Some(guard.contents.len()) {
            return None;
        }
        if self.reservation.holder() != Some(worker) {
            return None;
        }
        let state = std::mem::take(&mut *guard);
        self.reservation.release(worker);
        Some(Plate {
            order_id: bound,
            contents: state.contents,
        })
    }

    /// Drop an unfinished plate and free the station (order abandoned).
    pub fn discard(&self, worker: WorkerId) -> Option<Vec<Ingredient>> {
        let mut guard = self.state.lock().expect("plate mutex poisoned");
        if self.reservation.holder() != Some(worker) {
            return None;
        }
        let state = std::mem::take(&mut *guard);
        self.reservation.release(worker);
        Some(state.contents)
    }

    pub fn bound_order(&self) -> Option<OrderId> {
        self.state.lock().expect("plate mutex poisoned").bound_order
    }

    pub fn count(&self) -> usize {
        self.state
            .lock()
            .expect("plate mutex poisoned")
            .contents
            .len()
    }

    pub fn has_plate(&self) -> bool {
        self.bound_order().is_some()
    }

    pub fn is_free(&self) -> bool {
        !self.has_plate() && self.reservation.is_available()
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::RecipeKind;
    use crate::types::IngredientState;

    fn burger(id: OrderId) -> Order {
        use IngredientType::*;
        Order::new(id, RecipeKind::Burger, vec![Bun, Lettuce, Tomato, Meat])
    }

    fn prepared(kind: IngredientType, order: Option<OrderId>) -> Ingredient {
        let mut ingredient = Ingredient::raw(kind);
        ingredient.order_id = order;
        if kind != IngredientType::Bun {
            ingredient.cut();
        }
        if kind == IngredientType::Meat {
            ingredient.state = IngredientState::Cooked;
        }
        ingredient
    }

    fn bound_station(order: &Order) -> AssemblyStation {
        let station = AssemblyStation::new(0, Position::default());
        assert!(station.place_plate(1, order.id));
        assert!(station.set_order(order));
        station
    }

    #[test]
    fn second_tomato_is_rejected_while_other_slots_stay_open() {
        let order = burger(12);
        let station = bound_station(&order);
        station
            .add(prepared(IngredientType::Bun, Some(12)))
            .expect("bun needed");
        station
            .add(prepared(IngredientType::Tomato, Some(12)))
            .expect("tomato needed");
        let back = station
            .add(prepared(IngredientType::Tomato, Some(12)))
            .expect_err("one tomato only");
        assert_eq!(back.kind, IngredientType::Tomato);

        assert!(station.still_needs(IngredientType::Meat));
        assert!(station.still_needs(IngredientType::Lettuce));
        assert!(!station.is_ready());

        station
            .add(prepared(IngredientType::Meat, Some(12)))
            .expect("meat needed");
        station
            .add(prepared(IngredientType::Lettuce, Some(12)))
            .expect("lettuce needed");
        assert!(station.is_ready());
    }

    #[test]
    fn foreign_order_is_rejected_and_untagged_is_adopted() {
        let order = burger(3);
        let station = bound_station(&order);
        assert!(station.add(prepared(IngredientType::Bun, Some(4))).is_err());
        station
            .add(prepared(IngredientType::Bun, None))
            .expect("untagged bun");

        station
            .add(prepared(IngredientType::Meat, Some(3)))
            .expect("meat");
        station
            .add(prepared(IngredientType::Lettuce, Some(3)))
            .expect("lettuce");
        station
            .add(prepared(IngredientType::Tomato, Some(3)))
            .expect("tomato");
        let plate = station.take(1).expect("ready plate");
        assert!(plate.contents.iter().all(|i| i.order_id == Some(3)));
    }

    #[test]
    fn add_without_plate_or_order_is_rejected() {
        let station = AssemblyStation::new(0, Position::default());
        assert!(station.add(prepared(IngredientType::Bun, None)).is_err());
        assert!(station.place_plate(1, 9));
        // Bound but no multiset attached yet: nothing is needed.
        assert!(station.add(prepared(IngredientType::Bun, Some(9))).is_err());
        assert!(!station.set_order(&burger(10)));
    }

    #[test]
    fn take_only_when_ready_and_resets() {
        let order = Order::new(
            5,
            RecipeKind::OnionSoup,
            vec![IngredientType::Onion; 3],
        );
        let station = bound_station(&order);
        assert!(!station.place_plate(2, 6));
        for _ in 0..2 {
            station
                .add(prepared(IngredientType::Onion, Some(5)))
                .expect("onion");
        }
        assert_eq!(station.take(1), None);
        station
            .add(prepared(IngredientType::Onion, Some(5)))
            .expect("onion");
        assert_eq!(station.take(2), None);

        let plate = station.take(1).expect("ready");
        assert_eq!(plate.order_id, 5);
        assert_eq!(plate.contents.len(), 3);
        assert!(station.is_free());
        assert_eq!(station.bound_order(), None);
        assert!(station.place_plate(2, 6));
    }
}
