//! # Loot Allocation
//!
//! Distributes reward items first across overworld regions by biome, then
//! across the tiles of each dungeon with spacing between placements.

use crate::catalog::{BiomeDef, DataCatalog};
use crate::generation::SeededStream;
use crate::{config, Dungeon, Overworld, Position, TileItem, WeaveResult};
use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet};

/// Two-level loot distribution.
#[derive(Debug, Clone, Default)]
pub struct LootAllocator {
    /// Biome name -> loot pool
    tables: BTreeMap<String, Vec<String>>,
}

impl LootAllocator {
    /// Loads every biome's loot table from the catalog.
    pub fn new(catalog: &dyn DataCatalog) -> WeaveResult<Self> {
        let tables = BiomeDef::load_all(catalog)?
            .into_iter()
            .filter(|biome| !biome.loot.is_empty())
            .map(|biome| (biome.name, biome.loot))
            .collect();
        Ok(Self { tables })
    }

    pub fn from_tables(tables: BTreeMap<String, Vec<String>>) -> Self {
        Self { tables }
    }

    /// Shuffles each biome's pool and deals it round-robin across the
    /// overworld nodes painted with that biome.
    pub fn allocate_regions(&self, overworld: &mut Overworld, stream: &mut SeededStream) {
        for (biome, pool) in &self.tables {
            let nodes: Vec<Position> =
                overworld.nodes_of_biome(biome).map(|n| n.position()).collect();
            if nodes.is_empty() {
                continue;
            }
            let mut items = pool.clone();
            stream.shuffle(&mut items);
            for (i, item) in items.into_iter().enumerate() {
                if let Some(node) = overworld.get_mut(nodes[i % nodes.len()]) {
                    node.loot.push(item);
                }
            }
            debug!("loot: {} '{}' items over {} nodes", pool.len(), biome, nodes.len());
        }
    }

    /// Places `loot` on empty tiles of `dungeon`, favouring tiles with few
    /// doors and spreading placements apart.
    ///
    /// After each pick the chosen tile and its four neighbours move to a
    /// fallback set that is only drawn from once no other tile is eligible.
    /// Returns the number of items placed.
    pub fn allocate_dungeon(
        &self,
        dungeon: &mut Dungeon,
        loot: &[String],
        stream: &mut SeededStream,
    ) -> usize {
        let mut eligible: BTreeSet<Position> = dungeon
            .tiles
            .values()
            .filter(|tile| tile.item.is_none() && tile.position != dungeon.entrance)
            .map(|tile| tile.position)
            .collect();
        let mut fallback: BTreeSet<Position> = BTreeSet::new();
        let mut placed = 0;

        for item in loot {
            let pool = if eligible.is_empty() { &fallback } else { &eligible };
            let candidates: Vec<Position> = pool.iter().copied().collect();
            let weights: Vec<u32> = candidates
                .iter()
                .map(|pos| {
                    let doors = dungeon.tile(*pos).map_or(0, |tile| tile.door_count()) as u32;
                    config::LOOT_WEIGHT_BASE.saturating_sub(doors).max(1)
                })
                .collect();
            let Some(index) = stream.weighted_index(&weights) else {
                warn!("No room left for '{}' in dungeon at {:?}", item, dungeon.region);
                continue;
            };
            let pick = candidates[index];
            if let Some(tile) = dungeon.tile_mut(pick) {
                tile.item = Some(TileItem::Loot(item.clone()));
                placed += 1;
            }
            eligible.remove(&pick);
            fallback.remove(&pick);
            for neighbor in pick.cardinal_adjacent_positions() {
                if eligible.remove(&neighbor) {
                    fallback.insert(neighbor);
                }
            }
        }
        placed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DungeonTile;

    fn open_room(width: i32, height: i32) -> Dungeon {
        let mut dungeon = Dungeon::new(Position::origin(), 1, "default");
        for y in 0..height {
            for x in 0..width {
                let pos = Position::new(x, y);
                let mut tile = DungeonTile::new(pos, "default");
                for next in pos.cardinal_adjacent_positions() {
                    if next.in_bounds(width, height) {
                        tile.doors.insert(next, 0);
                    }
                }
                dungeon.tiles.insert(pos, tile);
            }
        }
        dungeon
    }

    fn loot(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("item {}", i)).collect()
    }

    #[test]
    fn test_dungeon_placements_are_spaced() {
        let mut dungeon = open_room(9, 9);
        dungeon.entrance = Position::new(4, 4);
        let allocator = LootAllocator::default();
        let placed = allocator.allocate_dungeon(&mut dungeon, &loot(6), &mut SeededStream::new(3));
        assert_eq!(placed, 6);

        let items: Vec<Position> = dungeon.items().iter().map(|(pos, _)| *pos).collect();
        assert!(!items.contains(&dungeon.entrance));
        for a in &items {
            for b in &items {
                if a != b {
                    assert!(a.manhattan_distance(*b) > 1, "{:?} and {:?} adjacent", a, b);
                }
            }
        }
    }

    #[test]
    fn test_fallback_used_when_crowded() {
        let mut dungeon = open_room(2, 2);
        dungeon.entrance = Position::new(5, 5);
        let allocator = LootAllocator::default();
        let placed = allocator.allocate_dungeon(&mut dungeon, &loot(4), &mut SeededStream::new(1));
        assert_eq!(placed, 4);
        // every tile is used, so a fifth item has nowhere to go
        let placed = allocator.allocate_dungeon(&mut dungeon, &loot(1), &mut SeededStream::new(1));
        assert_eq!(placed, 0);
    }

    #[test]
    fn test_existing_items_are_kept() {
        let mut dungeon = open_room(3, 1);
        dungeon.entrance = Position::new(0, 0);
        dungeon.tile_mut(Position::new(1, 0)).unwrap().item = Some(TileItem::Key(4));
        let allocator = LootAllocator::default();
        allocator.allocate_dungeon(&mut dungeon, &loot(1), &mut SeededStream::new(8));
        assert_eq!(
            dungeon.tile(Position::new(2, 0)).unwrap().item,
            Some(TileItem::Loot("item 0".to_string()))
        );
        assert_eq!(dungeon.tile(Position::new(1, 0)).unwrap().item, Some(TileItem::Key(4)));
    }
}
