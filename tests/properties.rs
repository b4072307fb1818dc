//! Property-based tests for plate validation and staging queue semantics.

use std::collections::BTreeMap;

use kitchen_brigade::assembly::AssemblyStation;
use kitchen_brigade::order_book::Order;
use kitchen_brigade::recipe::RecipeKind;
use kitchen_brigade::staging::StagingQueue;
use kitchen_brigade::types::{Ingredient, IngredientType, OrderId, Position};
use proptest::prelude::*;

// ===========================================================================
// Generators
// ===========================================================================

fn arb_kind() -> impl Strategy<Value = IngredientType> {
    prop::sample::select(IngredientType::ALL.to_vec())
}

/// An ingredient tag: the plate's order, another order, or untagged.
fn arb_tag() -> impl Strategy<Value = Option<OrderId>> {
    prop_oneof![Just(Some(1u64)), Just(Some(2u64)), Just(None)]
}

fn counts(kinds: &[IngredientType]) -> BTreeMap<IngredientType, usize> {
    let mut map = BTreeMap::new();
    for &kind in kinds {
        *map.entry(kind).or_insert(0) += 1;
    }
    map
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Whatever is offered, the plate never exceeds the order's per-type
    /// counts, only carries the bound order's tag, and is ready exactly when
    /// the counts match.
    #[test]
    fn plate_never_overfills(
        required in prop::collection::vec(arb_kind(), 1..6),
        offers in prop::collection::vec((arb_kind(), arb_tag()), 0..30),
    ) {
        let order = Order::new(1, RecipeKind::Burger, required.clone());
        let station = AssemblyStation::new(0, Position::default());
        prop_assert!(station.place_plate(7, order.id));
        prop_assert!(station.set_order(&order));

        let wanted = counts(&required);
        let mut accepted: Vec<IngredientType> = Vec::new();
        for (kind, tag) in offers {
            let mut ingredient = Ingredient::raw(kind);
            ingredient.order_id = tag;
            let before = counts(&accepted).get(&kind).copied().unwrap_or(0);
            let should_accept = tag != Some(2) && before < wanted.get(&kind).copied().unwrap_or(0);
            match station.add(ingredient) {
                Ok(()) => {
                    prop_assert!(should_accept);
                    accepted.push(kind);
                }
                Err(back) => {
                    prop_assert!(!should_accept);
                    prop_assert_eq!(back.kind, kind);
                }
            }
        }

        let on_plate = counts(&accepted);
        for (kind, count) in &on_plate {
            prop_assert!(*count <= wanted[kind]);
        }
        prop_assert_eq!(station.is_ready(), on_plate == wanted);

        if on_plate == wanted {
            let plate = station.take(7).expect("ready plate");
            prop_assert!(plate.contents.iter().all(|i| i.order_id == Some(1)));
            prop_assert!(station.is_free());
        }
    }

    /// Removing by (type, order) always takes the first match and leaves the
    /// remaining items in their original relative order.
    #[test]
    fn staging_takes_first_match_and_keeps_order(
        items in prop::collection::vec((arb_kind(), 0u64..3), 0..20),
        queries in prop::collection::vec((arb_kind(), 0u64..3), 0..20),
    ) {
        let queue = StagingQueue::unbounded(0, Position::default());
        let mut model: Vec<(IngredientType, OrderId)> = Vec::new();
        for &(kind, order) in &items {
            queue.add(Ingredient::raw(kind).tagged(order)).expect("unbounded");
            model.push((kind, order));
        }

        for (kind, order) in queries {
            prop_assert_eq!(
                queue.has_of_type_for_order(kind, order),
                model.contains(&(kind, order))
            );
            let taken = queue.take_of_type_for_order(kind, order);
            match model.iter().position(|&entry| entry == (kind, order)) {
                Some(index) => {
                    model.remove(index);
                    let taken = taken.expect("model has a match");
                    prop_assert_eq!((taken.kind, taken.order_id), (kind, Some(order)));
                }
                None => prop_assert!(taken.is_none()),
            }
            prop_assert_eq!(queue.count(), model.len());
        }

        // Drain in model order: each head must be the first match for itself.
        for (kind, order) in model {
            let next = queue.take_of_type_for_order(kind, order).expect("still queued");
            prop_assert_eq!(next.kind, kind);
        }
        prop_assert_eq!(queue.count(), 0);
    }
}
