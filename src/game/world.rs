//! # World Data Model
//!
//! Structures produced by generation and consumed read-only by rendering,
//! combat, and persistence collaborators.
//!
//! Region nodes are created by the region composer and mutated only while
//! biomes, difficulty, and loot are assigned. Dungeon tiles are created in
//! batches during pattern expansion and then receive items and creatures.

use crate::generation::graph::GraphNode;
use crate::{Direction, IdCounter, LockId, Position, OPEN_PASSAGE};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One overworld cell. Each region node later becomes one dungeon.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionNode {
    /// Connectivity, branch, security level (the region index), and key
    pub node: GraphNode,
    /// Declarative biome name, unset until painting
    pub biome: Option<String>,
    /// Tileset inherited from the biome declaration
    pub tileset: Option<String>,
    /// Difficulty level
    pub level: u32,
    pub is_start: bool,
    pub has_boss: bool,
    pub has_campfire: bool,
    /// Whether this node was attached as an offshoot leaf
    pub is_offshoot: bool,
    /// Security levels of this node's own dungeon
    pub num_security_levels: u32,
    /// Loot item names assigned to this node, in distribution order
    pub loot: Vec<String>,
    /// Seed the node's dungeon was generated from
    pub dungeon_seed: u64,
}

impl RegionNode {
    /// Wraps a freshly generated graph node.
    pub fn new(node: GraphNode) -> Self {
        Self {
            node,
            biome: None,
            tileset: None,
            level: 1,
            is_start: false,
            has_boss: false,
            has_campfire: false,
            is_offshoot: false,
            num_security_levels: 1,
            loot: Vec::new(),
            dungeon_seed: 0,
        }
    }

    pub fn position(&self) -> Position {
        self.node.position
    }

    /// Index of the region (overworld security level) this node belongs to.
    pub fn region(&self) -> u32 {
        self.node.security_level
    }

    /// Key id carried by this node, 0 if none.
    pub fn key_id(&self) -> LockId {
        self.node.key_id
    }

    /// Returns the direction of every link leaving this node.
    pub fn link_directions(&self) -> Vec<(Direction, LockId)> {
        self.node
            .links
            .iter()
            .filter_map(|(&pos, &lock)| {
                Direction::from_delta(pos - self.position()).map(|dir| (dir, lock))
            })
            .collect()
    }
}

/// Summary of one region (one overworld security level).
#[derive(Debug, Clone, PartialEq)]
pub struct RegionInfo {
    pub index: u32,
    pub tier: u32,
    /// First node created in the region
    pub entry: Position,
    /// Node holding the key to the next region
    pub key_node: Option<Position>,
    /// Anchor of the region's boss branch
    pub boss_node: Position,
    /// Member nodes in creation order
    pub members: Vec<Position>,
    /// Tiles exclusive to the path leading to the key
    pub key_branch: Vec<Position>,
    /// Tiles exclusive to the path leading to the boss
    pub boss_branch: Vec<Position>,
}

/// The overworld region graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Overworld {
    pub width: i32,
    pub height: i32,
    /// Seed of the attempt that succeeded
    pub seed: u64,
    pub start: Position,
    nodes: BTreeMap<Position, RegionNode>,
    order: Vec<Position>,
    pub regions: Vec<RegionInfo>,
}

impl Overworld {
    /// Creates an empty overworld.
    pub fn new(width: i32, height: i32, seed: u64, start: Position) -> Self {
        Self {
            width,
            height,
            seed,
            start,
            nodes: BTreeMap::new(),
            order: Vec::new(),
            regions: Vec::new(),
        }
    }

    /// Adds a node, keeping creation order.
    pub fn insert(&mut self, node: RegionNode) {
        let pos = node.position();
        if self.nodes.insert(pos, node).is_none() {
            self.order.push(pos);
        }
    }

    pub fn get(&self, pos: Position) -> Option<&RegionNode> {
        self.nodes.get(&pos)
    }

    pub fn get_mut(&mut self, pos: Position) -> Option<&mut RegionNode> {
        self.nodes.get_mut(&pos)
    }

    pub fn contains(&self, pos: Position) -> bool {
        self.nodes.contains_key(&pos)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Node positions in creation order.
    pub fn order(&self) -> &[Position] {
        &self.order
    }

    /// Nodes in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = &RegionNode> {
        self.order.iter().filter_map(move |pos| self.nodes.get(pos))
    }

    /// Nodes painted with the given biome, in creation order.
    pub fn nodes_of_biome<'a>(&'a self, biome: &'a str) -> impl Iterator<Item = &'a RegionNode> {
        self.nodes()
            .filter(move |node| node.biome.as_deref() == Some(biome))
    }

    /// Links a new node to an existing one with an open passage.
    pub fn link_open(&mut self, a: Position, b: Position) {
        if let Some(node) = self.nodes.get_mut(&a) {
            node.node.links.insert(b, OPEN_PASSAGE);
        }
        if let Some(node) = self.nodes.get_mut(&b) {
            node.node.links.insert(a, OPEN_PASSAGE);
        }
    }
}

/// Elevation tag of a dungeon tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Elevation {
    /// Sunken ground drawn from the noise field
    Low,
    #[default]
    Ground,
    /// Raised ground from the smoothed cellular field or the base chance
    High,
}

/// Item payload resting on a tile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileItem {
    /// Key opening every door with this lock id
    Key(LockId),
    /// Reward item by catalog name
    Loot(String),
}

/// One fine-grid tile of a dungeon.
#[derive(Debug, Clone, PartialEq)]
pub struct DungeonTile {
    pub position: Position,
    pub tileset: String,
    pub elevation: Elevation,
    /// Neighbor position -> lock id (0 = open)
    pub doors: BTreeMap<Position, LockId>,
    pub item: Option<TileItem>,
    /// Ids of creatures occupying the tile
    pub creatures: Vec<u32>,
}

impl DungeonTile {
    /// Creates a bare tile with no doors.
    pub fn new(position: Position, tileset: impl Into<String>) -> Self {
        Self {
            position,
            tileset: tileset.into(),
            elevation: Elevation::Ground,
            doors: BTreeMap::new(),
            item: None,
            creatures: Vec::new(),
        }
    }

    pub fn door_count(&self) -> usize {
        self.doors.len()
    }

    /// A tile linked to all four neighbors.
    pub fn is_fully_linked(&self) -> bool {
        self.doors.len() == 4
    }

    /// Whether an open (unlocked) door leads to `neighbor`.
    pub fn has_open_door(&self, neighbor: Position) -> bool {
        self.doors.get(&neighbor) == Some(&OPEN_PASSAGE)
    }
}

/// A creature placed by encounter allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Creature {
    pub id: u32,
    /// Catalog template name
    pub template: String,
    pub level: u32,
    /// Combat power in generation points
    pub power: f64,
    pub encounter_id: u32,
    /// Top-left tile of the footprint
    pub anchor: Position,
    /// Footprint edge length in tiles
    pub size: u32,
    pub is_boss: bool,
    /// Experience awarded on defeat
    pub experience: u32,
}

impl Creature {
    /// All tiles covered by the creature's footprint.
    pub fn footprint(&self) -> Vec<Position> {
        footprint_at(self.anchor, self.size)
    }
}

/// Tiles covered by a `size` x `size` footprint anchored at its top-left.
pub fn footprint_at(anchor: Position, size: u32) -> Vec<Position> {
    let size = size.max(1) as i32;
    let mut cells = Vec::with_capacity((size * size) as usize);
    for dy in 0..size {
        for dx in 0..size {
            cells.push(Position::new(anchor.x + dx, anchor.y + dy));
        }
    }
    cells
}

/// The concrete tile grid generated for one region node.
#[derive(Debug, Clone, PartialEq)]
pub struct Dungeon {
    /// Overworld position of the owning region node
    pub region: Position,
    pub seed: u64,
    /// Seed of the graph attempt that succeeded, at or after `seed`
    pub graph_seed: u64,
    pub tileset: String,
    pub tiles: BTreeMap<Position, DungeonTile>,
    /// Tile the player enters on
    pub entrance: Position,
    /// Geometric centre of the dungeon's tile grid
    pub center: Position,
    pub creatures: Vec<Creature>,
    /// Locks whose keys have been consumed
    pub opened_locks: BTreeSet<LockId>,
    pub total_experience: u32,
}

impl Dungeon {
    /// Creates an empty dungeon for the region at `region`.
    pub fn new(region: Position, seed: u64, tileset: impl Into<String>) -> Self {
        Self {
            region,
            seed,
            graph_seed: seed,
            tileset: tileset.into(),
            tiles: BTreeMap::new(),
            entrance: Position::origin(),
            center: Position::origin(),
            creatures: Vec::new(),
            opened_locks: BTreeSet::new(),
            total_experience: 0,
        }
    }

    pub fn tile(&self, pos: Position) -> Option<&DungeonTile> {
        self.tiles.get(&pos)
    }

    pub fn tile_mut(&mut self, pos: Position) -> Option<&mut DungeonTile> {
        self.tiles.get_mut(&pos)
    }

    /// Opens every door carrying `lock_id` and records the consumed key.
    ///
    /// Returns the number of door entries changed.
    pub fn unlock(&mut self, lock_id: LockId) -> usize {
        if lock_id == OPEN_PASSAGE {
            return 0;
        }
        let mut opened = 0;
        for tile in self.tiles.values_mut() {
            for lock in tile.doors.values_mut() {
                if *lock == lock_id {
                    *lock = OPEN_PASSAGE;
                    opened += 1;
                }
            }
        }
        self.opened_locks.insert(lock_id);
        opened
    }

    /// Positions of tiles carrying an item, with the item.
    pub fn items(&self) -> Vec<(Position, &TileItem)> {
        self.tiles
            .values()
            .filter_map(|tile| tile.item.as_ref().map(|item| (tile.position, item)))
            .collect()
    }

    /// Lock ids appearing on any door.
    pub fn lock_ids(&self) -> BTreeSet<LockId> {
        self.tiles
            .values()
            .flat_map(|tile| tile.doors.values().copied())
            .filter(|&lock| lock != OPEN_PASSAGE)
            .collect()
    }

    /// Removes every creature and clears tile occupancy.
    pub fn clear_creatures(&mut self) {
        self.creatures.clear();
        for tile in self.tiles.values_mut() {
            tile.creatures.clear();
        }
        self.total_experience = 0;
    }
}

/// Everything one generation run produces.
#[derive(Debug, Clone, PartialEq)]
pub struct World {
    /// Seed the run was started with
    pub seed: u64,
    pub overworld: Overworld,
    /// Dungeon per region node position
    pub dungeons: BTreeMap<Position, Dungeon>,
    /// Lock/key counter state after generation
    pub lock_ids: IdCounter,
    /// Encounter counter state after generation
    pub encounter_ids: IdCounter,
}

impl World {
    pub fn dungeon(&self, region: Position) -> Option<&Dungeon> {
        self.dungeons.get(&region)
    }

    pub fn dungeon_mut(&mut self, region: Position) -> Option<&mut Dungeon> {
        self.dungeons.get_mut(&region)
    }

    /// Total tiles across every dungeon.
    pub fn tile_count(&self) -> usize {
        self.dungeons.values().map(|d| d.tiles.len()).sum()
    }

    /// Total creatures across every dungeon.
    pub fn creature_count(&self) -> usize {
        self.dungeons.values().map(|d| d.creatures.len()).sum()
    }
}
