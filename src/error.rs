use std::path::PathBuf;

use crate::recipe::RecipeKind;
use crate::types::{IngredientType, OrderId, UtensilKind};

/// Errors surfaced by configuration loading and by the worker pipeline.
///
/// Station contention is not represented here: it is reported through `bool`
/// or `Result<(), Ingredient>` returns and retried locally.
#[derive(Debug, thiserror::Error)]
pub enum KitchenError {
    /// A configuration value is out of range or inconsistent.
    #[error("invalid configuration: {detail}")]
    InvalidConfig { detail: String },

    /// A recipe needs a utensil the kitchen was not given.
    #[error("no {utensil:?} configured for {recipe:?}")]
    MissingUtensil {
        recipe: RecipeKind,
        utensil: UtensilKind,
    },

    /// No supply station stocks the requested ingredient.
    #[error("no supply station for {kind}")]
    MissingSupply { kind: IngredientType },

    /// An order kind has no catalog entry.
    #[error("recipe {kind:?} missing from catalog")]
    UnknownRecipe { kind: RecipeKind },

    /// A station bound to the order refused an ingredient meant for it.
    #[error("order {order_id}: station refused {kind}")]
    Rejected { order_id: OrderId, kind: IngredientType },

    /// The order left the pending set while a worker was still on it.
    #[error("order {order_id} was dropped while in progress")]
    OrderGone { order_id: OrderId },

    /// The kitchen was halted while the worker was waiting.
    #[error("kitchen halted")]
    Halted,

    /// Failed to parse a configuration file.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl KitchenError {
    pub(crate) fn invalid(detail: impl Into<String>) -> Self {
        KitchenError::InvalidConfig {
            detail: detail.into(),
        }
    }
}
