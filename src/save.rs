//! # Persistence Collaborator
//!
//! Generation output is plain in-memory data. Everything a world needs
//! beyond its seed is captured in a [`WorldRecord`]: the dungeon seeds that
//! were actually used, which locks have been opened, and where creatures
//! and items currently sit. Regenerating from the world seed and applying
//! the record with [`WorldRecord::restore_into`] reproduces the saved state.

use crate::{Creature, LockId, Position, TileItem, WeaveError, WeaveResult, World};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Position of a surviving creature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatureRecord {
    pub id: u32,
    pub anchor: Position,
}

/// Mutable state of one dungeon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DungeonRecord {
    /// Overworld position of the owning region node
    pub region: Position,
    pub seed: u64,
    pub opened_locks: Vec<LockId>,
    pub creatures: Vec<CreatureRecord>,
    pub items: Vec<(Position, TileItem)>,
}

/// Snapshot of a generated world's mutable state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldRecord {
    /// Crate version that wrote the record
    pub version: String,
    pub seed: u64,
    pub dungeons: Vec<DungeonRecord>,
}

impl WorldRecord {
    /// Captures the current state of `world`.
    pub fn from_world(world: &World) -> Self {
        let dungeons = world
            .dungeons
            .values()
            .map(|dungeon| DungeonRecord {
                region: dungeon.region,
                seed: dungeon.seed,
                opened_locks: dungeon.opened_locks.iter().copied().collect(),
                creatures: dungeon
                    .creatures
                    .iter()
                    .map(|creature| CreatureRecord {
                        id: creature.id,
                        anchor: creature.anchor,
                    })
                    .collect(),
                items: dungeon
                    .items()
                    .into_iter()
                    .map(|(pos, item)| (pos, item.clone()))
                    .collect(),
            })
            .collect();
        Self {
            version: crate::VERSION.to_string(),
            seed: world.seed,
            dungeons,
        }
    }

    /// Reapplies the recorded state onto `world`, which must have been
    /// regenerated from the same seed.
    ///
    /// Doors are unlocked, items replaced, and creatures missing from the
    /// record removed; surviving creatures move to their recorded anchors.
    pub fn restore_into(&self, world: &mut World) -> WeaveResult<()> {
        if world.seed != self.seed {
            return Err(WeaveError::GenerationFailed(format!(
                "record is for seed {}, world was generated from {}",
                self.seed, world.seed
            )));
        }

        for record in &self.dungeons {
            let dungeon = world.dungeon_mut(record.region).ok_or_else(|| {
                WeaveError::GenerationFailed(format!("no dungeon at {:?}", record.region))
            })?;
            if dungeon.seed != record.seed {
                return Err(WeaveError::GenerationFailed(format!(
                    "dungeon at {:?} was generated from seed {}, record expects {}",
                    record.region, dungeon.seed, record.seed
                )));
            }

            for &lock in &record.opened_locks {
                dungeon.unlock(lock);
            }

            for tile in dungeon.tiles.values_mut() {
                tile.item = None;
            }
            for (pos, item) in &record.items {
                let tile = dungeon.tile_mut(*pos).ok_or_else(|| {
                    WeaveError::GenerationFailed(format!("item recorded on missing tile {:?}", pos))
                })?;
                tile.item = Some(item.clone());
            }

            let anchors: BTreeMap<u32, Position> =
                record.creatures.iter().map(|c| (c.id, c.anchor)).collect();
            let survivors: Vec<Creature> = dungeon
                .creatures
                .iter()
                .filter_map(|creature| {
                    anchors.get(&creature.id).map(|&anchor| Creature {
                        anchor,
                        ..creature.clone()
                    })
                })
                .collect();
            dungeon.clear_creatures();
            for creature in &survivors {
                for pos in creature.footprint() {
                    if let Some(tile) = dungeon.tile_mut(pos) {
                        tile.creatures.push(creature.id);
                    }
                }
            }
            dungeon.creatures = survivors;
        }
        Ok(())
    }

    /// Serializes the record to JSON.
    pub fn to_json(&self) -> WeaveResult<String> {
        serde_json::to_string_pretty(self).map_err(WeaveError::from)
    }

    /// Deserializes a record from JSON.
    pub fn from_json(json: &str) -> WeaveResult<Self> {
        serde_json::from_str(json).map_err(WeaveError::from)
    }
}

/// Host-side storage for world records.
pub trait SaveStore {
    fn save(&mut self, slot: &str, record: &WorldRecord) -> WeaveResult<()>;

    /// Returns `None` if nothing was saved under `slot`.
    fn load(&self, slot: &str) -> WeaveResult<Option<WorldRecord>>;

    fn slots(&self) -> BTreeSet<String>;
}

/// Keeps records as JSON strings in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SaveStore for MemoryStore {
    fn save(&mut self, slot: &str, record: &WorldRecord) -> WeaveResult<()> {
        self.records.insert(slot.to_string(), record.to_json()?);
        Ok(())
    }

    fn load(&self, slot: &str) -> WeaveResult<Option<WorldRecord>> {
        self.records
            .get(slot)
            .map(|json| WorldRecord::from_json(json))
            .transpose()
    }

    fn slots(&self) -> BTreeSet<String> {
        self.records.keys().cloned().collect()
    }
}
