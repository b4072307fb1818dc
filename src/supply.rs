//! Self-replenishing source of one raw ingredient type.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::types::{Ingredient, IngredientType, Position, StationId, StationKind};

/// Never observably empties: stock is topped back up to the low-water mark
/// after every take, and a fresh ingredient is synthesised if the pool is
/// momentarily empty.
pub struct SupplyStation {
    id: StationId,
    kind: IngredientType,
    position: Position,
    low_water: usize,
    stock: Mutex<VecDeque<Ingredient>>,
}

impl SupplyStation {
    pub fn new(
        index: usize,
        kind: IngredientType,
        position: Position,
        initial_stock: usize,
        low_water: usize,
    ) -> Self {
        let stock = (0..initial_stock.max(low_water))
            .map(|_| Ingredient::raw(kind))
            .collect();
        Self {
            id: StationId::new(StationKind::Supply, index),
            kind,
            position,
            low_water,
            stock: Mutex::new(stock),
        }
    }

    /// Take one raw, untagged ingredient. Always succeeds.
    pub fn take(&self) -> Ingredient {
        let mut guard = self.stock.lock().expect("supply mutex poisoned");
        let ingredient = guard
            .pop_front()
            .unwrap_or_else(|| Ingredient::raw(self.kind));
        while guard.len() < self.low_water {
            guard.push_back(Ingredient::raw(self.kind));
        }
        ingredient
    }

    pub fn has_stock(&self) -> bool {
        !self.stock.lock().expect("supply mutex poisoned").is_empty()
    }

    /// Current pool depth, for dashboards.
    pub fn stock(&self) -> usize {
        self.stock.lock().expect("supply mutex poisoned").len()
    }

    pub fn kind(&self) -> IngredientType {
        self.kind
    }

    pub fn id(&self) -> StationId {
        self.id
    }

    pub fn position(&self) -> Position {
        self.position
    }
}
