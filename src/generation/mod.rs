//! # Generation Module
//!
//! Procedural generation of the overworld, its dungeons, and their contents.
//!
//! Control flow runs leaf-first components in a fixed order: the region
//! composer builds the overworld on top of the graph generator, the dungeon
//! composer expands one abstract graph per region node, and the loot and
//! encounter allocators populate the resulting tiles. [`WorldGenerator`]
//! drives the whole pipeline.

pub mod dungeon;
pub mod encounters;
pub mod graph;
pub mod items;
pub mod patterns;
pub mod regions;
pub mod stream;
pub mod terrain;
pub mod world;

pub use dungeon::*;
pub use encounters::*;
pub use graph::*;
pub use items::*;
pub use patterns::*;
pub use regions::*;
pub use stream::*;
pub use terrain::*;
pub use world::*;

use crate::{config, IdCounter, Position, WeaveError, WeaveResult};
use serde::{Deserialize, Serialize};

/// Parameters of the overworld region graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverworldConfig {
    pub width: i32,
    pub height: i32,
    /// Fixed start corner
    pub start: Position,
    /// Fixed boss corner
    pub boss: Position,
    pub tiers: u32,
    pub regions_per_tier: u32,
    /// Graph tiles per region
    pub tiles_per_region: u32,
    pub branch_limit_per_level: u32,
    pub directness: u32,
    pub branch_chance_percent: u32,
    pub campfires_per_region: u32,
    pub campfire_attempts: u32,
    /// Minimum exclusive length of key and boss branches
    pub min_branch_length: usize,
    /// Share of plain connecting nodes the `connecting` condition paints
    pub connecting_paint_percent: u32,
    /// Inclusive difficulty range per tier
    pub tier_levels: Vec<(u32, u32)>,
}

impl OverworldConfig {
    /// Total number of regions (overworld security levels).
    pub fn region_count(&self) -> u32 {
        self.tiers * self.regions_per_tier
    }
}

impl Default for OverworldConfig {
    fn default() -> Self {
        Self {
            width: 10,
            height: 10,
            start: Position::new(0, 0),
            boss: Position::new(9, 9),
            tiers: 3,
            regions_per_tier: 2,
            tiles_per_region: 12,
            branch_limit_per_level: 3,
            directness: 1,
            branch_chance_percent: 40,
            campfires_per_region: 2,
            campfire_attempts: config::CAMPFIRE_ATTEMPTS,
            min_branch_length: config::MIN_BRANCH_LENGTH,
            connecting_paint_percent: config::CONNECTING_PAINT_PERCENT,
            tier_levels: vec![(1, 10), (11, 20), (21, 30)],
        }
    }
}

/// Parameters of per-region dungeon generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DungeonConfig {
    /// Abstract grid width
    pub width: i32,
    /// Abstract grid height
    pub height: i32,
    pub tiles_per_security_level: u32,
    pub branch_limit_per_level: u32,
    pub directness: u32,
    pub branch_chance_percent: u32,
    /// First expansion factor; must match the inner template size
    pub inner_scale: i32,
    /// Second expansion factor; must match the outer template size
    pub outer_scale: i32,
    pub expansion_attempts: u32,
    pub smoothing_steps: u32,
    /// Chance a cell starts raised before smoothing
    pub initial_fill_percent: u32,
}

impl Default for DungeonConfig {
    fn default() -> Self {
        Self {
            width: 7,
            height: 7,
            tiles_per_security_level: 8,
            branch_limit_per_level: 3,
            directness: 2,
            branch_chance_percent: 35,
            inner_scale: 3,
            outer_scale: 3,
            expansion_attempts: config::EXPANSION_ATTEMPTS,
            smoothing_steps: config::TERRAIN_SMOOTHING_STEPS,
            initial_fill_percent: 45,
        }
    }
}

/// Parameters of encounter budgeting and placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncounterConfig {
    /// Tiles this close to the entrance never anchor an encounter
    pub start_exclusion: u32,
    /// Hop limit of an anchor's territory flood fill
    pub territory_depth: u32,
    /// Smallest territory an anchor may have
    pub min_territory: usize,
    pub boss_multiplier: f64,
    pub key_multiplier: f64,
    /// Budget bonus per encounter beyond the first
    pub extra_encounter_bonus: f64,
    pub start_region_multiplier: f64,
    /// Regions below this level get a reduced budget
    pub dampened_below_level: u32,
    pub tiles_per_encounter: usize,
    pub max_encounters: usize,
}

impl Default for EncounterConfig {
    fn default() -> Self {
        Self {
            start_exclusion: 10,
            territory_depth: 5,
            min_territory: 7,
            boss_multiplier: 1.5,
            key_multiplier: 1.25,
            extra_encounter_bonus: 0.25,
            start_region_multiplier: 0.5,
            dampened_below_level: 5,
            tiles_per_encounter: 250,
            max_encounters: 4,
        }
    }
}

/// Configuration for a full generation run.
///
/// Loading this from disk is the host's concern; it derives serde so the
/// host can deserialize it from whatever format it uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Random seed for reproducible generation
    pub seed: u64,
    pub overworld: OverworldConfig,
    pub dungeon: DungeonConfig,
    pub encounters: EncounterConfig,
    /// Diagnostic cap on retries at any scope; `None` retries forever
    pub max_attempts: Option<u32>,
}

impl GenerationConfig {
    /// Creates the default generation configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use worldweave::GenerationConfig;
    ///
    /// let config = GenerationConfig::new(42);
    /// assert_eq!(config.overworld.region_count(), 6);
    /// assert!(config.validate().is_ok());
    /// ```
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            overworld: OverworldConfig::default(),
            dungeon: DungeonConfig::default(),
            encounters: EncounterConfig::default(),
            max_attempts: None,
        }
    }

    /// Creates a configuration for testing with a smaller overworld and a
    /// generous diagnostic attempt cap.
    pub fn for_testing(seed: u64) -> Self {
        Self {
            seed,
            overworld: OverworldConfig {
                width: 8,
                height: 8,
                boss: Position::new(7, 7),
                tiers: 1,
                regions_per_tier: 2,
                tiles_per_region: 14,
                campfires_per_region: 1,
                min_branch_length: 2,
                tier_levels: vec![(1, 10)],
                ..OverworldConfig::default()
            },
            dungeon: DungeonConfig {
                tiles_per_security_level: 6,
                ..DungeonConfig::default()
            },
            encounters: EncounterConfig::default(),
            max_attempts: Some(100_000),
        }
    }

    /// Checks that the parameters are internally consistent.
    pub fn validate(&self) -> WeaveResult<()> {
        let ow = &self.overworld;
        if ow.width <= 0 || ow.height <= 0 {
            return Err(WeaveError::InvalidConfig("overworld grid is empty".to_string()));
        }
        if !ow.start.in_bounds(ow.width, ow.height) || !ow.boss.in_bounds(ow.width, ow.height) {
            return Err(WeaveError::InvalidConfig(
                "start and boss corners must lie inside the overworld".to_string(),
            ));
        }
        if ow.start == ow.boss {
            return Err(WeaveError::InvalidConfig(
                "start and boss corners must differ".to_string(),
            ));
        }
        if ow.region_count() == 0 || ow.tiles_per_region == 0 {
            return Err(WeaveError::InvalidConfig(
                "overworld needs at least one region".to_string(),
            ));
        }
        if (ow.tier_levels.len() as u32) < ow.tiers {
            return Err(WeaveError::InvalidConfig(format!(
                "{} tiers declared but only {} level ranges",
                ow.tiers,
                ow.tier_levels.len()
            )));
        }
        if ow.tier_levels.iter().any(|&(lo, hi)| lo > hi) {
            return Err(WeaveError::InvalidConfig("tier level range is inverted".to_string()));
        }
        let dg = &self.dungeon;
        if dg.width < 3 || dg.height < 3 {
            return Err(WeaveError::InvalidConfig(
                "dungeon grid must be at least 3x3".to_string(),
            ));
        }
        if dg.inner_scale < 1 || dg.outer_scale < 1 || dg.tiles_per_security_level == 0 {
            return Err(WeaveError::InvalidConfig("dungeon scales must be positive".to_string()));
        }
        if self.encounters.max_encounters == 0 || self.encounters.tiles_per_encounter == 0 {
            return Err(WeaveError::InvalidConfig(
                "encounter limits must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self::new(42)
    }
}

/// State threaded through one full generation run.
///
/// The lock/key counter is shared by the overworld and every dungeon so a
/// lock id pairs with exactly one key across the whole run.
#[derive(Debug, Clone, Default)]
pub struct GenerationContext {
    pub lock_ids: IdCounter,
    pub encounter_ids: IdCounter,
    /// Diagnostic cap on retries; `None` retries forever
    pub max_attempts: Option<u32>,
}

impl GenerationContext {
    /// Creates a context with fresh counters.
    pub fn new(max_attempts: Option<u32>) -> Self {
        Self {
            lock_ids: IdCounter::new(),
            encounter_ids: IdCounter::new(),
            max_attempts,
        }
    }

    /// Fails once `attempts` reaches the diagnostic cap.
    pub fn check_attempts(&self, scope: &'static str, attempts: u32) -> WeaveResult<()> {
        match self.max_attempts {
            Some(cap) if attempts >= cap => {
                log::warn!("{} generation exhausted its cap of {} attempts", scope, cap);
                Err(WeaveError::AttemptsExhausted { scope, attempts })
            }
            _ => Ok(()),
        }
    }
}

/// Trait for seeded generators that retry until their constraints hold.
pub trait Generator<T> {
    /// Generates content starting from `seed`, retrying with `seed + 1`,
    /// `seed + 2`, ... until a valid result is found or the context's
    /// diagnostic cap runs out.
    fn generate(&self, ctx: &mut GenerationContext, seed: u64) -> WeaveResult<T>;

    /// Validates that the generated content meets its invariants.
    fn validate(&self, content: &T) -> WeaveResult<()>;

    /// Gets the generator type name for logging and debugging.
    fn generator_type(&self) -> &'static str;
}

/// Utility functions for generation algorithms.
pub mod utils {
    use super::*;

    /// Creates a seeded stream from the config.
    pub fn create_stream(config: &GenerationConfig) -> SeededStream {
        SeededStream::new(config.seed)
    }

    /// Mixes a base seed with a salt into a well-spread child seed.
    pub fn derive_seed(base: u64, salt: u64) -> u64 {
        let mut z = base
            .wrapping_add(salt.wrapping_mul(0x9E37_79B9_7F4A_7C15))
            .wrapping_add(0x9E37_79B9_7F4A_7C15);
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_config_creation() {
        let config = GenerationConfig::new(12345);
        assert_eq!(config.seed, 12345);
        assert_eq!(config.overworld.region_count(), 6);
        assert!(config.max_attempts.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_testing_config_is_valid() {
        let config = GenerationConfig::for_testing(1);
        assert!(config.validate().is_ok());
        assert!(config.max_attempts.is_some());
    }

    #[test]
    fn test_validate_rejects_missing_tier_levels() {
        let mut config = GenerationConfig::new(1);
        config.overworld.tier_levels.pop();
        assert!(matches!(config.validate(), Err(WeaveError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_out_of_bounds_corner() {
        let mut config = GenerationConfig::new(1);
        config.overworld.boss = Position::new(10, 10);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serde_round_trip() {
        let config = GenerationConfig::for_testing(99);
        let json = serde_json::to_string(&config).unwrap();
        let back: GenerationConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_attempt_cap() {
        let ctx = GenerationContext::new(Some(3));
        assert!(ctx.check_attempts("graph", 2).is_ok());
        assert!(matches!(
            ctx.check_attempts("graph", 3),
            Err(WeaveError::AttemptsExhausted { scope: "graph", attempts: 3 })
        ));
        let unbounded = GenerationContext::new(None);
        assert!(unbounded.check_attempts("graph", u32::MAX).is_ok());
    }

    #[test]
    fn test_derive_seed_spreads() {
        let a = utils::derive_seed(1, 0);
        let b = utils::derive_seed(1, 1);
        let c = utils::derive_seed(2, 0);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, utils::derive_seed(1, 0));
    }
}
