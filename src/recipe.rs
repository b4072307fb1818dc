//! Order-type catalog and the step plans workers execute for each order.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{IngredientType, UtensilKind};

/// Kinds of dishes the kitchen can be asked for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipeKind {
    OnionSoup,
    TomatoSoup,
    MushroomSoup,
    Burger,
}

impl fmt::Display for RecipeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecipeKind::OnionSoup => "onion soup",
            RecipeKind::TomatoSoup => "tomato soup",
            RecipeKind::MushroomSoup => "mushroom soup",
            RecipeKind::Burger => "burger",
        };
        f.write_str(name)
    }
}

/// Catalog entry: the ingredient multiset a dish needs and the utensil it cooks in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeSpec {
    pub kind: RecipeKind,
    pub ingredients: Vec<IngredientType>,
    pub utensil: UtensilKind,
}

impl RecipeSpec {
    pub fn new(kind: RecipeKind, ingredients: Vec<IngredientType>, utensil: UtensilKind) -> Self {
        Self {
            kind,
            ingredients,
            utensil,
        }
    }

    /// Soups are cooked as a batch in a pot.
    pub fn is_soup(&self) -> bool {
        self.utensil == UtensilKind::Pot
    }

    /// Build the step list a chef runs for this dish.
    pub fn plan(&self, sourcing: Sourcing) -> Vec<Step> {
        let mut steps = Vec::new();
        for &kind in &self.ingredients {
            match sourcing {
                Sourcing::Solo => {
                    steps.push(Step::Fetch(kind));
                    if kind != IngredientType::Bun {
                        steps.push(Step::Cut);
                    }
                }
                Sourcing::Staged => steps.push(Step::Collect(kind)),
            }
            match self.utensil {
                UtensilKind::Pot => steps.push(Step::Cook(UtensilKind::Pot)),
                UtensilKind::Pan => {
                    if kind == IngredientType::Meat {
                        steps.push(Step::Cook(UtensilKind::Pan));
                    }
                    steps.push(Step::PlaceOnAssembly);
                }
            }
        }
        if self.is_soup() {
            // The pot's contents are transferred to the plate in one go.
            steps.push(Step::PlaceOnAssembly);
        }
        steps
    }
}

/// How a chef obtains the processed ingredients for an order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sourcing {
    /// Fetch and cut everything personally.
    Solo,
    /// Collect items prepared by prep workers from the staging queues.
    Staged,
}

/// One node of a chef's task graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// Take a raw ingredient from its supply station, tagged for the order.
    Fetch(IngredientType),
    /// Take a prepared ingredient for the order from a staging queue.
    Collect(IngredientType),
    /// Run the carried ingredient through a cutting station.
    Cut,
    /// Put the carried ingredient into the order's utensil; cook once it is full.
    Cook(UtensilKind),
    /// Deliver the carried ingredient, or the cooked contents, to the order's plate.
    PlaceOnAssembly,
}

/// Kind-indexed recipe catalog.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    recipes: BTreeMap<RecipeKind, RecipeSpec>,
}

impl Catalog {
    pub fn new(specs: impl IntoIterator<Item = RecipeSpec>) -> Self {
        Self {
            recipes: specs.into_iter().map(|spec| (spec.kind, spec)).collect(),
        }
    }

    pub fn get(&self, kind: RecipeKind) -> Option<&RecipeSpec> {
        self.recipes.get(&kind)
    }

    pub fn kinds(&self) -> Vec<RecipeKind> {
        self.recipes.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }
}

/// The four dishes of the classic menu.
pub fn default_recipes() -> Vec<RecipeSpec> {
    use IngredientType::*;
    vec![
        RecipeSpec::new(RecipeKind::OnionSoup, vec![Onion, Onion, Onion], UtensilKind::Pot),
        RecipeSpec::new(RecipeKind::TomatoSoup, vec![Tomato, Tomato, Tomato], UtensilKind::Pot),
        RecipeSpec::new(
            RecipeKind::MushroomSoup,
            vec![Mushroom, Mushroom, Mushroom],
            UtensilKind::Pot,
        ),
        RecipeSpec::new(RecipeKind::Burger, vec![Bun, Meat, Lettuce, Tomato], UtensilKind::Pan),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use IngredientType::*;

    fn spec(kind: RecipeKind) -> RecipeSpec {
        default_recipes()
            .into_iter()
            .find(|r| r.kind == kind)
            .expect("default recipe")
    }

    #[test]
    fn soup_plan_cooks_three_times_then_plates() {
        let plan = spec(RecipeKind::OnionSoup).plan(Sourcing::Solo);
        let round = [Step::Fetch(Onion), Step::Cut, Step::Cook(UtensilKind::Pot)];
        let mut expected: Vec<Step> = round.iter().copied().cycle().take(9).collect();
        expected.push(Step::PlaceOnAssembly);
        assert_eq!(plan, expected);
    }

    #[test]
    fn burger_plan_only_cooks_the_meat() {
        let plan = spec(RecipeKind::Burger).plan(Sourcing::Solo);
        assert_eq!(
            plan,
            vec![
                Step::Fetch(Bun),
                Step::PlaceOnAssembly,
                Step::Fetch(Meat),
                Step::Cut,
                Step::Cook(UtensilKind::Pan),
                Step::PlaceOnAssembly,
                Step::Fetch(Lettuce),
                Step::Cut,
                Step::PlaceOnAssembly,
                Step::Fetch(Tomato),
                Step::Cut,
                Step::PlaceOnAssembly,
            ]
        );
    }

    #[test]
    fn staged_plan_collects_instead_of_fetching() {
        let plan = spec(RecipeKind::Burger).plan(Sourcing::Staged);
        assert!(!plan.iter().any(|s| matches!(s, Step::Fetch(_) | Step::Cut)));
        assert_eq!(plan.iter().filter(|s| matches!(s, Step::Collect(_))).count(), 4);
    }

    #[test]
    fn catalog_lookup_by_kind() {
        let catalog = Catalog::new(default_recipes());
        assert_eq!(catalog.kinds().len(), 4);
        assert_eq!(catalog.get(RecipeKind::Burger).map(|r| r.ingredients.len()), Some(4));
    }
}
