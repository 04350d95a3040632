//! Typed views over catalog declarations, parsed and validated once per run.

use super::DataCatalog;
use crate::generation::SeededStream;
use crate::{WeaveError, WeaveResult};
use std::collections::BTreeSet;
use std::str::FromStr;

/// Tileset every inheritance chain ends in.
pub const DEFAULT_TILESET: &str = "default";

/// Which overworld nodes a biome paints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BiomeCondition {
    /// The world start node
    FirstMap,
    /// Nodes exclusive to a region's key branch
    KeyMapBranch,
    /// Nodes exclusive to a region's boss branch
    BossMapBranch,
    /// Nodes carrying a key
    KeyMap,
    /// Boss nodes
    BossMap,
    /// A random share of plain two-link nodes
    Connecting,
    /// Anything still unpainted
    Fill,
    /// Extra leaf attached to a node of another biome
    Offshoot,
}

impl FromStr for BiomeCondition {
    type Err = WeaveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "first map" => Ok(Self::FirstMap),
            "key map branch" => Ok(Self::KeyMapBranch),
            "boss map branch" => Ok(Self::BossMapBranch),
            "key map" => Ok(Self::KeyMap),
            "boss map" => Ok(Self::BossMap),
            "connecting" => Ok(Self::Connecting),
            "fill" => Ok(Self::Fill),
            "offshoot" => Ok(Self::Offshoot),
            other => Err(WeaveError::Catalog(format!("unknown biome condition '{}'", other))),
        }
    }
}

/// A biome (sub-region) declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct BiomeDef {
    pub name: String,
    /// Lower paints first
    pub priority: i32,
    pub condition: BiomeCondition,
    pub tileset: String,
    /// Tiers the biome may appear in; empty means every tier
    pub tiers: Vec<u32>,
    /// (security levels, weight) lottery for the node's dungeon
    pub security_levels: Vec<(u32, u32)>,
    pub enemies: Vec<String>,
    pub boss: Option<String>,
    pub loot: Vec<String>,
    /// Parent biome of an offshoot
    pub offshoot_of: Option<String>,
}

impl BiomeDef {
    /// Parses the `biomes` entry `name`.
    pub fn load(catalog: &dyn DataCatalog, name: &str) -> WeaveResult<Self> {
        let field = |f: &str| catalog.get_value("biomes", name, f);
        let array = |f: &str| catalog.get_array_value("biomes", name, f).unwrap_or_default();

        let condition = field("condition")
            .ok_or_else(|| WeaveError::Catalog(format!("biome '{}' has no condition", name)))?
            .parse()?;
        let tiers = array("tiers")
            .iter()
            .map(|tier| parse_u32(tier, name))
            .collect::<WeaveResult<Vec<_>>>()?;
        let mut security_levels = array("securityLevels")
            .iter()
            .map(|entry| parse_lottery_entry(entry, name))
            .collect::<WeaveResult<Vec<_>>>()?;
        if security_levels.is_empty() {
            security_levels.push((1, 1));
        }
        let offshoot_of = field("offshootOf");
        if condition == BiomeCondition::Offshoot && offshoot_of.is_none() {
            return Err(WeaveError::Catalog(format!(
                "offshoot biome '{}' does not name its parent",
                name
            )));
        }

        Ok(Self {
            name: name.to_string(),
            priority: catalog.get_number_value("biomes", name, "priority").unwrap_or(0.0) as i32,
            condition,
            tileset: field("tileset").unwrap_or_else(|| DEFAULT_TILESET.to_string()),
            tiers,
            security_levels,
            enemies: array("enemies"),
            boss: field("boss"),
            loot: array("loot"),
            offshoot_of,
        })
    }

    /// Every biome in the catalog, ordered by (priority, name).
    pub fn load_all(catalog: &dyn DataCatalog) -> WeaveResult<Vec<Self>> {
        let mut biomes = catalog
            .get_entries("biomes")
            .iter()
            .map(|name| Self::load(catalog, name))
            .collect::<WeaveResult<Vec<_>>>()?;
        biomes.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.name.cmp(&b.name)));
        Ok(biomes)
    }

    pub fn applies_to_tier(&self, tier: u32) -> bool {
        self.tiers.is_empty() || self.tiers.contains(&tier)
    }

    /// Rolls the security-level count of a node's dungeon.
    pub fn roll_security_levels(&self, stream: &mut SeededStream) -> u32 {
        let weights: Vec<u32> = self.security_levels.iter().map(|&(_, weight)| weight).collect();
        stream
            .weighted_index(&weights)
            .map(|index| self.security_levels[index].0)
            .unwrap_or(1)
            .max(1)
    }
}

fn parse_u32(text: &str, entry: &str) -> WeaveResult<u32> {
    text.trim()
        .parse()
        .map_err(|_| WeaveError::Catalog(format!("'{}' in '{}' is not a count", text, entry)))
}

/// Parses a `"levels:weight"` lottery entry.
fn parse_lottery_entry(text: &str, entry: &str) -> WeaveResult<(u32, u32)> {
    let (levels, weight) = text.split_once(':').ok_or_else(|| {
        WeaveError::Catalog(format!("lottery entry '{}' in '{}' lacks a weight", text, entry))
    })?;
    Ok((parse_u32(levels, entry)?, parse_u32(weight, entry)?))
}

/// Inheritance chain of a tileset: itself, its `inherits` ancestors, then
/// [`DEFAULT_TILESET`].
pub fn tileset_lineage(catalog: &dyn DataCatalog, name: &str) -> Vec<String> {
    let mut chain = Vec::new();
    let mut seen = BTreeSet::new();
    let mut current = Some(name.to_string());
    while let Some(tileset) = current {
        if !seen.insert(tileset.clone()) {
            break;
        }
        current = catalog.get_value("tilesets", &tileset, "inherits");
        chain.push(tileset);
    }
    if !seen.contains(DEFAULT_TILESET) {
        chain.push(DEFAULT_TILESET.to_string());
    }
    chain
}

/// Elevation parameters of a tileset, in percent.
#[derive(Debug, Clone, PartialEq)]
pub struct TilesetDef {
    pub name: String,
    pub lineage: Vec<String>,
    /// Chance any tile is raised
    pub elevation_base: u32,
    /// Noise threshold under which a tile is sunken
    pub elevation_noise: u32,
    /// Chance a tile inside the smoothed field is raised
    pub elevation_cellular: u32,
}

impl TilesetDef {
    /// Resolves a tileset's parameters through its inheritance chain.
    pub fn load(catalog: &dyn DataCatalog, name: &str) -> Self {
        let lineage = tileset_lineage(catalog, name);
        let lookup = |field: &str| {
            lineage
                .iter()
                .find_map(|tileset| catalog.get_number_value("tilesets", tileset, field))
                .unwrap_or(0.0)
                .clamp(0.0, 100.0) as u32
        };
        Self {
            name: name.to_string(),
            elevation_base: lookup("elevationBase"),
            elevation_noise: lookup("elevationNoise"),
            elevation_cellular: lookup("elevationCellular"),
            lineage,
        }
    }
}

/// An enemy declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatureTemplate {
    pub name: String,
    /// Power at level 1, in generation points
    pub power: f64,
    pub power_per_level: f64,
    /// Footprint edge length in tiles
    pub size: u32,
    pub experience_per_power: f64,
}

impl CreatureTemplate {
    pub fn load(catalog: &dyn DataCatalog, name: &str) -> WeaveResult<Self> {
        let power = catalog
            .get_number_value("creatures", name, "power")
            .ok_or_else(|| WeaveError::Catalog(format!("creature '{}' has no power", name)))?;
        Ok(Self {
            name: name.to_string(),
            power,
            power_per_level: catalog
                .get_number_value("creatures", name, "powerPerLevel")
                .unwrap_or(0.0),
            size: catalog
                .get_number_value("creatures", name, "size")
                .unwrap_or(1.0)
                .max(1.0) as u32,
            experience_per_power: catalog
                .get_number_value("creatures", name, "experiencePerPower")
                .unwrap_or(1.0),
        })
    }

    /// Combat power at `level`.
    pub fn power_at(&self, level: u32) -> f64 {
        self.power + self.power_per_level * level.saturating_sub(1) as f64
    }
}

/// The sample adventuring party encounters are budgeted against.
#[derive(Debug, Clone, PartialEq)]
pub struct PartyDef {
    pub size: u32,
    pub base_power: f64,
    pub power_per_level: f64,
}

impl PartyDef {
    /// Reads the `party/default` entry.
    pub fn load(catalog: &dyn DataCatalog) -> WeaveResult<Self> {
        let number = |field: &str| catalog.get_number_value("party", "default", field);
        let base_power = number("basePower")
            .ok_or_else(|| WeaveError::Catalog("party has no basePower".to_string()))?;
        Ok(Self {
            size: number("size").unwrap_or(1.0).max(1.0) as u32,
            base_power,
            power_per_level: number("powerPerLevel").unwrap_or(0.0),
        })
    }

    /// Power of one party member at `level`.
    pub fn member_power(&self, level: u32) -> f64 {
        self.base_power + self.power_per_level * level.saturating_sub(1) as f64
    }

    /// Power of the whole party at `level`.
    pub fn total_power(&self, level: u32) -> f64 {
        self.member_power(level) * self.size as f64
    }
}
