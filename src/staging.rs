//! Holding area between processing and assembly, searchable by type and order.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::types::{Ingredient, IngredientType, OrderId, Position, StationId, StationKind};

/// FIFO of prepared ingredients. Unbounded by default; `single_slot` gives the
/// capacity-one counter variant.
pub struct StagingQueue {
    id: StationId,
    position: Position,
    capacity: Option<usize>,
    queue: Mutex<VecDeque<Ingredient>>,
}

impl StagingQueue {
    pub fn new(index: usize, position: Position, capacity: Option<usize>) -> Self {
        Self {
            id: StationId::new(StationKind::Staging, index),
            position,
            capacity,
            queue: Mutex::new(VecDeque::new()),
        }
    }

    pub fn unbounded(index: usize, position: Position) -> Self {
        Self::new(index, position, None)
    }

    pub fn single_slot(index: usize, position: Position) -> Self {
        Self::new(index, position, Some(1))
    }

    /// Append an ingredient; hands it back when the queue is at capacity.
    pub fn add(&self, ingredient: Ingredient) -> Result<(), Ingredient> {
        let mut guard = self.queue.lock().expect("staging mutex poisoned");
        if self.capacity.is_some_and(|cap| guard.len() >= cap) {
            return Err(ingredient);
        }
        guard.push_back(ingredient);
        Ok(())
    }

    pub fn has_of_type_for_order(&self, kind: IngredientType, order_id: OrderId) -> bool {
        let guard = self.queue.lock().expect("staging mutex poisoned");
        guard
            .iter()
            .any(|i| i.kind == kind && i.order_id == Some(order_id))
    }

    /// Remove the first matching ingredient; the rest keep their order.
    pub fn take_of_type_for_order(
        &self,
        kind: IngredientType,
        order_id: OrderId,
    ) -> Option<Ingredient> {
        let mut guard = self.queue.lock().expect("staging mutex poisoned");
        let index = guard
            .iter()
            .position(|i| i.kind == kind && i.order_id == Some(order_id))?;
        guard.remove(index)
    }

    /// Drop every item tagged for `order_id`. Returns how many were removed.
    pub fn purge_order(&self, order_id: OrderId) -> usize {
        let mut guard = self.queue.lock().expect("staging mutex poisoned");
        let before = guard.len();
        guard.retain(|i| i.order_id != Some(order_id));
        before - guard.len()
    }

    pub fn count(&self) -> usize {
        self.queue.lock().expect("staging mutex poisoned").len()
    }

    pub fn is_full(&self) -> bool {
        self.capacity.is_some_and(|cap| self.count() >= cap)
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

    fn tagged(kind: IngredientType, order: OrderId) -> Ingredient {
        Ingredient::raw(kind).tagged(order)
    }

    #[test]
    fn takes_first_match_and_preserves_the_rest() {
        let queue = StagingQueue::unbounded(0, Position::default());
        queue.add(tagged(IngredientType::Onion, 1)).expect("unbounded");
        queue.add(tagged(IngredientType::Tomato, 2)).expect("unbounded");
        queue.add(tagged(IngredientType::Onion, 2)).expect("unbounded");
        queue.add(tagged(IngredientType::Tomato, 2)).expect("unbounded");

        assert!(queue.has_of_type_for_order(IngredientType::Tomato, 2));
        assert!(!queue.has_of_type_for_order(IngredientType::Tomato, 1));

        let taken = queue
            .take_of_type_for_order(IngredientType::Tomato, 2)
            .expect("tomato for 2");
        assert_eq!(taken.order_id, Some(2));
        assert_eq!(queue.count(), 3);

        let rest: Vec<_> = std::iter::from_fn(|| {
            queue
                .take_of_type_for_order(IngredientType::Onion, 1)
                .or_else(|| queue.take_of_type_for_order(IngredientType::Onion, 2))
                .or_else(|| queue.take_of_type_for_order(IngredientType::Tomato, 2))
        })
        .map(|i| (i.kind, i.order_id))
        .collect();
        assert_eq!(
            rest,
            vec![
                (IngredientType::Onion, Some(1)),
                (IngredientType::Onion, Some(2)),
                (IngredientType::Tomato, Some(2)),
            ]
        );
    }

    #[test]
    fn untagged_items_never_match_an_order() {
        let queue = StagingQueue::unbounded(0, Position::default());
        queue.add(Ingredient::raw(IngredientType::Bun)).expect("unbounded");
        assert!(!queue.has_of_type_for_order(IngredientType::Bun, 0));
        assert_eq!(queue.take_of_type_for_order(IngredientType::Bun, 0), None);
    }

    #[test]
    fn single_slot_refuses_a_second_item() {
        let slot = StagingQueue::single_slot(0, Position::default());
        slot.add(tagged(IngredientType::Meat, 5)).expect("empty slot");
        assert!(slot.is_full());
        let back = slot
            .add(tagged(IngredientType::Lettuce, 5))
            .expect_err("slot full");
        assert_eq!(back.kind, IngredientType::Lettuce);

        assert!(slot.take_of_type_for_order(IngredientType::Meat, 5).is_some());
        assert!(slot.add(back).is_ok());
    }

    #[test]
    fn purge_drops_only_the_given_order() {
        let queue = StagingQueue::unbounded(0, Position::default());
        queue.add(tagged(IngredientType::Bun, 3)).expect("unbounded");
        queue.add(tagged(IngredientType::Meat, 4)).expect("unbounded");
        queue.add(tagged(IngredientType::Lettuce, 3)).expect("unbounded");

        assert_eq!(queue.purge_order(3), 2);
        assert_eq!(queue.count(), 1);
        assert!(queue.has_of_type_for_order(IngredientType::Meat, 4));
        assert_eq!(queue.purge_order(3), 0);
    }
}
