//! Static kitchen configuration: timings, station counts, crew and menu.
//!
//! Loaded from TOML or built in code. Every section has defaults, so a file
//! only needs to name what it changes.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::KitchenError;
use crate::recipe::{Catalog, RecipeSpec, default_recipes};
use crate::types::{IngredientType, UtensilKind};

/// Order generation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnConfig {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Stop spawning after this many orders.
    pub max_orders: Option<u64>,
    /// Seed for the spawn RNG; entropy when absent.
    pub seed: Option<u64>,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 20,
            max_delay_ms: 60,
            max_orders: None,
            seed: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub cutting_ms: u64,
    pub cooking_ms: u64,
    /// Retry interval of every "wait for X" loop.
    pub poll_ms: u64,
    /// Back-off while no order or demand is available.
    pub idle_ms: u64,
    /// Clock thread period.
    pub tick_ms: u64,
    /// Floor units per second; 0 makes travel instant.
    pub move_speed: f32,
    pub stall_timeout_ms: u64,
    /// Session length; open-ended when absent.
    pub session_ms: Option<u64>,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            cutting_ms: 40,
            cooking_ms: 120,
            poll_ms: 5,
            idle_ms: 20,
            tick_ms: 5,
            move_speed: 0.0,
            stall_timeout_ms: 2_000,
            session_ms: None,
        }
    }
}

impl TimingConfig {
    pub fn cutting(&self) -> Duration {
        Duration::from_millis(self.cutting_ms)
    }

    pub fn cooking(&self) -> Duration {
        Duration::from_millis(self.cooking_ms)
    }

    pub fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }

    pub fn idle(&self) -> Duration {
        Duration::from_millis(self.idle_ms)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn stall_timeout(&self) -> Duration {
        Duration::from_millis(self.stall_timeout_ms)
    }

    pub fn session(&self) -> Option<Duration> {
        self.session_ms.map(Duration::from_millis)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    /// Ingredient types that get a supply station, one each.
    pub supplies: Vec<IngredientType>,
    pub supply_initial_stock: usize,
    pub supply_low_water: usize,
    pub cutting: usize,
    pub cooking: usize,
    pub staging: usize,
    /// `None` for unbounded queues, `Some(1)` for single-slot counters.
    pub staging_capacity: Option<usize>,
    pub assembly: usize,
    pub pot_capacity: usize,
    pub pan_capacity: usize,
    pub interaction_radius: f32,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            supplies: IngredientType::ALL.to_vec(),
            supply_initial_stock: 10,
            supply_low_water: 5,
            cutting: 2,
            cooking: 2,
            staging: 1,
            staging_capacity: None,
            assembly: 2,
            pot_capacity: 3,
            pan_capacity: 1,
            interaction_radius: 1.5,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrewConfig {
    pub chefs: usize,
    /// Prep workers; any at all switches chefs to collecting from staging.
    pub preps: usize,
}

impl Default for CrewConfig {
    fn default() -> Self {
        Self { chefs: 2, preps: 0 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KitchenConfig {
    /// Utensils the kitchen owns.
    pub utensils: Vec<UtensilKind>,
    pub spawn: SpawnConfig,
    pub timing: TimingConfig,
    pub stations: StationConfig,
    pub crew: CrewConfig,
    pub recipes: Vec<RecipeSpec>,
}

impl Default for KitchenConfig {
    fn default() -> Self {
        Self {
            utensils: vec![UtensilKind::Pot, UtensilKind::Pan],
            spawn: SpawnConfig::default(),
            timing: TimingConfig::default(),
            stations: StationConfig::default(),
            crew: CrewConfig::default(),
            recipes: default_recipes(),
        }
    }
}

impl KitchenConfig {
    /// Real-time pacing: two-minute session, seconds-long cutting and cooking.
    pub fn classic() -> Self {
        Self {
            spawn: SpawnConfig {
                min_delay_ms: 2_000,
                max_delay_ms: 5_000,
                ..SpawnConfig::default()
            },
            timing: TimingConfig {
                cutting_ms: 2_000,
                cooking_ms: 5_000,
                poll_ms: 100,
                idle_ms: 500,
                tick_ms: 20,
                move_speed: 3.0,
                stall_timeout_ms: 15_000,
                session_ms: Some(120_000),
            },
            ..Self::default()
        }
    }

    /// Parse TOML text and validate it.
    pub fn from_toml_str(text: &str) -> Result<Self, KitchenError> {
        Self::parse(text, PathBuf::from("<inline>"))
    }

    /// Read, parse and validate a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self, KitchenError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text, path.to_path_buf())
    }

    fn parse(text: &str, file: PathBuf) -> Result<Self, KitchenError> {
        let config: KitchenConfig = toml::from_str(text).map_err(|e| KitchenError::Parse {
            file,
            detail: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn catalog(&self) -> Catalog {
        Catalog::new(self.recipes.iter().cloned())
    }

    /// Reject structurally unusable configurations.
    pub fn validate(&self) -> Result<(), KitchenError> {
        let spawn = &self.spawn;
        if spawn.min_delay_ms > spawn.max_delay_ms {
            return Err(KitchenError::invalid(format!(
                "spawn.min_delay_ms ({}) exceeds spawn.max_delay_ms ({})",
                spawn.min_delay_ms, spawn.max_delay_ms
            )));
        }

        let timing = &self.timing;
        if timing.poll_ms == 0 || timing.tick_ms == 0 {
            return Err(KitchenError::invalid("timing.poll_ms and timing.tick_ms must be > 0"));
        }
        if !timing.move_speed.is_finite() || timing.move_speed < 0.0 {
            return Err(KitchenError::invalid("timing.move_speed must be a finite value >= 0"));
        }

        let stations = &self.stations;
        for (name, count) in [
            ("cutting", stations.cutting),
            ("cooking", stations.cooking),
            ("assembly", stations.assembly),
        ] {
            if count == 0 {
                return Err(KitchenError::invalid(format!("stations.{name} must be > 0")));
            }
        }
        if self.crew.preps > 0 && stations.staging == 0 {
            return Err(KitchenError::invalid("prep workers need at least one staging queue"));
        }
        if stations.staging_capacity == Some(0) {
            return Err(KitchenError::invalid("stations.staging_capacity must be > 0"));
        }
        if stations.pot_capacity == 0 || stations.pan_capacity == 0 {
            return Err(KitchenError::invalid("utensil capacities must be > 0"));
        }
        if !stations.interaction_radius.is_finite() || stations.interaction_radius < 0.0 {
            return Err(KitchenError::invalid("stations.interaction_radius must be >= 0"));
        }

        if self.crew.chefs == 0 {
            return Err(KitchenError::invalid("crew.chefs must be > 0"));
        }

        if self.recipes.is_empty() {
            return Err(KitchenError::invalid("at least one recipe is required"));
        }
        let mut seen = HashSet::new();
        for recipe in &self.recipes {
            if !seen.insert(recipe.kind) {
                return Err(KitchenError::invalid(format!("recipe {} listed twice", recipe.kind)));
            }
            if recipe.ingredients.is_empty() {
                return Err(KitchenError::invalid(format!("recipe {} has no ingredients", recipe.kind)));
            }
            if recipe.is_soup() && recipe.ingredients.len() != stations.pot_capacity {
                return Err(KitchenError::invalid(format!(
                    "recipe {} needs {} items but a pot holds {}",
                    recipe.kind,
                    recipe.ingredients.len(),
                    stations.pot_capacity
                )));
            }
        }
        Ok(())
    }

    /// Problems that only fail the affected orders at run time.
    pub fn warnings(&self) -> Vec<KitchenError> {
        let mut warnings = Vec::new();
        for recipe in &self.recipes {
            if !self.utensils.contains(&recipe.utensil) {
                warnings.push(KitchenError::MissingUtensil {
                    recipe: recipe.kind,
                    utensil: recipe.utensil,
                });
            }
        }
        let mut missing: Vec<IngredientType> = self
            .recipes
            .iter()
            .flat_map(|r| r.ingredients.iter().copied())
            .filter(|kind| !self.stations.supplies.contains(kind))
            .collect();
        missing.sort();
        missing.dedup();
        warnings.extend(missing.into_iter().map(|kind| KitchenError::MissingSupply { kind }));
        warnings
    }
}
