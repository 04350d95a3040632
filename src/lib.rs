//! # Worldweave
//!
//! A two-tier procedural world generator for tile-based adventure games.
//!
//! ## Architecture Overview
//!
//! Generation runs as a fixed sequence of synchronous phases:
//!
//! - **Graph generation**: an abstract grid graph with security-level gating,
//!   branching, and key/lock placement, retried with an incremented seed until
//!   its constraints hold
//! - **Region composition**: the overworld region graph with biomes,
//!   difficulty levels, campfires, bosses, and offshoots
//! - **Dungeon composition**: one abstract graph per region node, expanded
//!   twice through rotation-aware pattern templates, then elevation smoothing
//! - **Loot allocation**: region-level loot pools, then per-dungeon placement
//! - **Encounter allocation**: budgeted creature placement in spatially
//!   separated clusters
//!
//! Declarative parameters come from a read-only [`DataCatalog`]. Output is
//! plain in-memory data; persistence goes through the [`SaveStore`]
//! collaborator.

pub mod catalog;
pub mod game;
pub mod generation;
pub mod save;
pub mod utils;

// Core module re-exports
pub use catalog::*;
pub use game::*;
pub use save::*;

pub use generation::{
    AbstractGraph, DungeonComposer, EncounterAllocator, EncounterPlan, GenerationConfig,
    GenerationContext, Generator, GraphFailure, GraphGenerator, GraphNode, GraphParams,
    LootAllocator, RegionComposer, RegionFailure, SeededStream, WorldGenerator,
};

/// Core error type for the Worldweave generator.
#[derive(thiserror::Error, Debug)]
pub enum WeaveError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Catalog data is missing or malformed
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Generation parameters are inconsistent
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A replacer template failed load-time validation
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    /// The diagnostic attempt cap ran out before a valid result was found
    #[error("{scope} generation gave up after {attempts} attempts")]
    AttemptsExhausted { scope: &'static str, attempts: u32 },

    /// Generation failed
    #[error("Generation failed: {0}")]
    GenerationFailed(String),
}

/// Result type used throughout the Worldweave codebase.
pub type WeaveResult<T> = Result<T, WeaveError>;

/// Version information for the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Generation constants.
pub mod config {
    /// Attempts per abstract node before falling back to the null template
    pub const EXPANSION_ATTEMPTS: u32 = 3;

    /// Cap on campfire anchor picks per region
    pub const CAMPFIRE_ATTEMPTS: u32 = 200;

    /// Minimum exclusive length of a region's key and boss branches
    pub const MIN_BRANCH_LENGTH: usize = 4;

    /// Cellular automaton smoothing steps for terrain elevation
    pub const TERRAIN_SMOOTHING_STEPS: u32 = 5;

    /// Share of plain connecting nodes painted by the `connecting` condition
    pub const CONNECTING_PAINT_PERCENT: u32 = 35;

    /// Loot lottery weight is this minus the tile's door count
    pub const LOOT_WEIGHT_BASE: u32 = 5;
}
