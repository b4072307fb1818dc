//! Shared identifiers and the ingredient/plate model used across the kitchen.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Sequence number of an order; also tags every ingredient bought for it.
pub type OrderId = u64;
/// Unique identifier for a worker thread.
pub type WorkerId = u64;

/// A raw or processed good.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngredientType {
    Onion,
    Tomato,
    Mushroom,
    Lettuce,
    Meat,
    Bun,
}

impl IngredientType {
    pub const ALL: [IngredientType; 6] = [
        IngredientType::Onion,
        IngredientType::Tomato,
        IngredientType::Mushroom,
        IngredientType::Lettuce,
        IngredientType::Meat,
        IngredientType::Bun,
    ];
}

impl fmt::Display for IngredientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IngredientType::Onion => "onion",
            IngredientType::Tomato => "tomato",
            IngredientType::Mushroom => "mushroom",
            IngredientType::Lettuce => "lettuce",
            IngredientType::Meat => "meat",
            IngredientType::Bun => "bun",
        };
        f.write_str(name)
    }
}

/// Processing progression: Raw -> Cut | Chopped -> Cooked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngredientState {
    Raw,
    Cut,
    Chopped,
    Cooked,
}

/// A single good moving through the kitchen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ingredient {
    pub kind: IngredientType,
    pub state: IngredientState,
    /// Order this ingredient is bound to; `None` while unassigned.
    pub order_id: Option<OrderId>,
}

impl Ingredient {
    /// Fresh, untagged raw ingredient.
    pub fn raw(kind: IngredientType) -> Self {
        Self {
            kind,
            state: IngredientState::Raw,
            order_id: None,
        }
    }

    /// Same ingredient, bound to `order_id`.
    pub fn tagged(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn needs_cutting(&self) -> bool {
        self.state == IngredientState::Raw && self.kind != IngredientType::Bun
    }

    pub fn needs_cooking(&self) -> bool {
        self.kind == IngredientType::Meat && self.state == IngredientState::Chopped
    }

    /// Apply the cutting transition: meat is chopped, everything else is cut.
    pub fn cut(&mut self) {
        self.state = if self.kind == IngredientType::Meat {
            IngredientState::Chopped
        } else {
            IngredientState::Cut
        };
    }
}

impl fmt::Display for Ingredient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.order_id {
            Some(order) => write!(f, "{}({:?})#{order}", self.kind, self.state),
            None => write!(f, "{}({:?})", self.kind, self.state),
        }
    }
}

/// Cookware placed on a cooking station before it accepts ingredients.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UtensilKind {
    Pot,
    Pan,
}

/// Floor coordinates of a station or worker.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Finished (or in-progress) plate handed from an assembly station to a sink.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Plate {
    pub order_id: OrderId,
    pub contents: Vec<Ingredient>,
}

/// Station families, used for identification and dashboards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StationKind {
    Supply,
    Cutting,
    Cooking,
    Staging,
    Assembly,
    Serve,
}

/// Stable identifier of one station.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StationId {
    pub kind: StationKind,
    pub index: usize,
}

impl StationId {
    pub const fn new(kind: StationKind, index: usize) -> Self {
        Self { kind, index }
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.kind {
            StationKind::Supply => "supply",
            StationKind::Cutting => "cutting",
            StationKind::Cooking => "cooking",
            StationKind::Staging => "staging",
            StationKind::Assembly => "plate",
            StationKind::Serve => "serve",
        };
        write!(f, "{prefix}-{}", self.index)
    }
}
