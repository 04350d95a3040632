//! # Dungeon Generation
//!
//! Per-region dungeon layout generation by pattern-based graph expansion.
//!
//! A dungeon is built by:
//! 1. Generating a small abstract graph whose goals face the region's
//!    overworld links
//! 2. Expanding every abstract node into a block of cells with a rotated
//!    inner template
//! 3. Expanding every resulting cell again with an outer template
//! 4. Dropping door references to cells that were never created
//! 5. Smoothing terrain elevation over the final tile grid

use crate::catalog::{DataCatalog, TilesetDef, DEFAULT_TILESET};
use crate::generation::terrain::{tag_elevation, CellularField};
use crate::generation::utils::derive_seed;
use crate::generation::{
    AbstractGraph, DungeonConfig, ExpansionPass, GenerationContext, Generator, GraphGenerator,
    GraphParams, JoinType, Pattern, PatternTable, SeededStream,
};
use crate::{
    Direction, Dungeon, DungeonTile, LockId, Position, RegionNode, TileItem, WeaveError,
    WeaveResult, OPEN_PASSAGE,
};
use log::{debug, trace, warn};
use std::collections::{BTreeMap, BTreeSet};

/// Something a node carries through expansion. Payloads always land on a
/// template's designated centre cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    /// Where the player enters the dungeon
    Entrance,
    Key(LockId),
}

/// One node of an expansion pass: an abstract node going in, a concrete
/// cell coming out.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpansionCell {
    pub position: Position,
    /// Neighbor position -> lock id (0 = open)
    pub links: BTreeMap<Position, LockId>,
    pub payload: Option<Payload>,
}

impl ExpansionCell {
    pub fn new(position: Position) -> Self {
        Self {
            position,
            links: BTreeMap::new(),
            payload: None,
        }
    }

    fn link_directions(&self) -> Vec<(Direction, LockId)> {
        self.links
            .iter()
            .filter_map(|(&pos, &lock)| {
                Direction::from_delta(pos - self.position).map(|dir| (dir, lock))
            })
            .collect()
    }
}

/// Result of one expansion pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expansion {
    pub cells: Vec<ExpansionCell>,
    /// Input positions no template fit, expanded to nothing
    pub null_fallbacks: Vec<Position>,
}

/// Converts a dungeon graph into first-pass expansion input.
///
/// The start node carries the entrance, key nodes carry their keys, and the
/// last node created on the final security level carries `region_key` when
/// it is non-zero.
pub fn abstract_cells(graph: &AbstractGraph, region_key: LockId) -> Vec<ExpansionCell> {
    let final_level = graph.num_security_levels.saturating_sub(1);
    let key_holder = if region_key != OPEN_PASSAGE {
        graph.level_members(final_level).last().copied()
    } else {
        None
    };
    graph
        .nodes()
        .map(|node| {
            let payload = if node.position == graph.start() {
                Some(Payload::Entrance)
            } else if node.has_key() {
                Some(Payload::Key(node.key_id))
            } else if Some(node.position) == key_holder {
                Some(Payload::Key(region_key))
            } else {
                None
            };
            ExpansionCell {
                position: node.position,
                links: node.links.clone(),
                payload,
            }
        })
        .collect()
}

/// Builds the tile grid of one region node.
#[derive(Debug, Clone)]
pub struct DungeonComposer {
    pub config: DungeonConfig,
    tables: BTreeMap<String, PatternTable>,
    tilesets: BTreeMap<String, TilesetDef>,
}

impl DungeonComposer {
    /// Loads and validates the pattern table of every catalog tileset.
    pub fn new(catalog: &dyn DataCatalog, config: DungeonConfig) -> WeaveResult<Self> {
        let mut tables = BTreeMap::new();
        let mut tilesets = BTreeMap::new();
        let mut names = catalog.get_entries("tilesets");
        if !names.iter().any(|name| name == DEFAULT_TILESET) {
            names.push(DEFAULT_TILESET.to_string());
        }
        for name in names {
            let table = PatternTable::load(
                catalog,
                &name,
                config.inner_scale as usize,
                config.outer_scale as usize,
            )?;
            tables.insert(name.clone(), table);
            tilesets.insert(name.clone(), TilesetDef::load(catalog, &name));
        }
        Ok(Self {
            config,
            tables,
            tilesets,
        })
    }

    fn resolve_tileset(&self, name: &str) -> WeaveResult<(&PatternTable, &TilesetDef)> {
        let key = if self.tables.contains_key(name) {
            name
        } else {
            warn!("Unknown tileset '{}', using '{}'", name, DEFAULT_TILESET);
            DEFAULT_TILESET
        };
        match (self.tables.get(key), self.tilesets.get(key)) {
            (Some(table), Some(def)) => Ok((table, def)),
            _ => Err(WeaveError::Catalog(format!("tileset '{}' is not loaded", key))),
        }
    }

    /// Edge length of the final tile grid.
    pub fn tile_extent(&self) -> (i32, i32) {
        let factor = self.config.inner_scale * self.config.outer_scale;
        (self.config.width * factor, self.config.height * factor)
    }

    /// Border cell facing `dir` on the abstract grid.
    fn border_goal(&self, dir: Direction) -> Position {
        let (w, h) = (self.config.width, self.config.height);
        match dir {
            Direction::North => Position::new(w / 2, 0),
            Direction::South => Position::new(w / 2, h - 1),
            Direction::East => Position::new(w - 1, h / 2),
            Direction::West => Position::new(0, h / 2),
        }
    }

    /// Goal cells of a region's dungeon graph.
    ///
    /// The world start begins at the grid centre; any other region begins at
    /// the border facing the region it was reached from. One border cell is
    /// added for every other overworld link.
    pub fn goal_positions(&self, node: &RegionNode) -> Vec<Position> {
        let center = Position::new(self.config.width / 2, self.config.height / 2);
        let mut goals = Vec::new();
        if node.is_start {
            goals.push(center);
        } else if let Some(dir) = node
            .node
            .parent
            .and_then(|p| Direction::from_delta(p - node.position()))
        {
            goals.push(self.border_goal(dir));
        }
        for (dir, _) in node.link_directions() {
            let goal = self.border_goal(dir);
            if !goals.contains(&goal) {
                goals.push(goal);
            }
        }
        if goals.is_empty() {
            goals.push(center);
        }
        goals
    }

    /// Graph parameters of a region's dungeon.
    ///
    /// The per-level allotment is raised when the goals lie further apart
    /// than the configured allotment could cover.
    pub fn graph_params(&self, node: &RegionNode) -> GraphParams {
        let goals = self.goal_positions(node);
        let levels = node.num_security_levels.max(1);
        let spread: u32 = goals[1..].iter().map(|g| g.manhattan_distance(goals[0])).sum();
        let tiles = self.config.tiles_per_security_level.max(spread.div_ceil(levels) + 1);
        GraphParams {
            width: self.config.width,
            height: self.config.height,
            goals,
            num_security_levels: levels,
            tiles_per_security_level: tiles,
            branch_limit_per_level: self.config.branch_limit_per_level,
            directness: self.config.directness,
            branch_chance_percent: self.config.branch_chance_percent,
        }
    }

    /// Generates the dungeon of `node` from `seed`.
    pub fn build_dungeon(
        &self,
        ctx: &mut GenerationContext,
        node: &RegionNode,
        seed: u64,
    ) -> WeaveResult<Dungeon> {
        let tileset = node.tileset.clone().unwrap_or_else(|| DEFAULT_TILESET.to_string());
        let (table, tileset_def) = self.resolve_tileset(&tileset)?;

        let graph = GraphGenerator::new(self.graph_params(node)).generate(ctx, seed)?;
        let mut stream = SeededStream::new(derive_seed(graph.seed, 2));

        let cells = abstract_cells(&graph, node.key_id());
        let inner = self.expand(&cells, ExpansionPass::Inner, table, &mut stream);
        let outer = self.expand(&inner.cells, ExpansionPass::Outer, table, &mut stream);
        let fallbacks = inner.null_fallbacks.len() + outer.null_fallbacks.len();

        let mut dungeon = Dungeon::new(node.position(), seed, tileset.clone());
        dungeon.graph_seed = graph.seed;
        let (width, height) = self.tile_extent();
        dungeon.center = Position::new(width / 2, height / 2);
        let mut entrance = None;
        for cell in outer.cells {
            let mut tile = DungeonTile::new(cell.position, tileset.clone());
            tile.doors = cell.links;
            match cell.payload {
                Some(Payload::Entrance) => entrance = Some(cell.position),
                Some(Payload::Key(id)) => tile.item = Some(TileItem::Key(id)),
                None => {}
            }
            dungeon.tiles.insert(cell.position, tile);
        }
        dungeon.entrance = match entrance {
            Some(pos) => pos,
            None => {
                warn!("Dungeon at {:?} lost its entrance marker", node.position());
                dungeon.tiles.keys().next().copied().unwrap_or(dungeon.center)
            }
        };

        let mut field = CellularField::random(
            width as usize,
            height as usize,
            self.config.initial_fill_percent,
            &mut stream,
        );
        field.smooth(self.config.smoothing_steps);
        tag_elevation(
            dungeon.tiles.iter_mut().map(|(pos, tile)| (*pos, &mut tile.elevation)),
            &field,
            tileset_def,
            &mut stream,
        );

        debug!(
            "Dungeon at {:?}: {} abstract nodes, {} tiles, {} locks, {} null templates (seed {})",
            node.position(),
            graph.len(),
            dungeon.tiles.len(),
            dungeon.lock_ids().len(),
            fallbacks,
            graph.seed
        );
        Ok(dungeon)
    }

    /// Runs one expansion pass over `cells`.
    ///
    /// Each node gets up to `expansion_attempts` random templates of its join
    /// type. A node carrying a payload then scans every candidate in order.
    /// If still nothing fits, the node expands to nothing. Doors pointing at
    /// cells that were never created are dropped afterwards.
    pub fn expand(
        &self,
        cells: &[ExpansionCell],
        pass: ExpansionPass,
        table: &PatternTable,
        stream: &mut SeededStream,
    ) -> Expansion {
        let scale = table.scale(pass) as i32;
        let mut stamped: BTreeMap<Position, ExpansionCell> = BTreeMap::new();
        let mut order = Vec::new();
        let mut null_fallbacks = Vec::new();

        for cell in cells {
            let links = cell.link_directions();
            let directions: Vec<Direction> = links.iter().map(|&(dir, _)| dir).collect();
            let (join, turns) = JoinType::classify(&directions);
            let candidates = table.patterns(pass, join);

            let mut block = None;
            for attempt in 0..self.config.expansion_attempts {
                let Some(pattern) = stream.pick(candidates) else {
                    break;
                };
                block = stamp(cell, &pattern.rotated(turns), &links, scale);
                if block.is_some() {
                    break;
                }
                trace!(
                    "{:?} {:?} attempt {} did not fit {:?}",
                    pass,
                    join,
                    attempt + 1,
                    cell.position
                );
            }
            if block.is_none() && cell.payload.is_some() {
                block = candidates
                    .iter()
                    .find_map(|pattern| stamp(cell, &pattern.rotated(turns), &links, scale));
            }
            let block = block.unwrap_or_else(|| {
                warn!(
                    "No {} template fit {:?} ({:?}), using the null template",
                    pass.key(),
                    cell.position,
                    join
                );
                null_fallbacks.push(cell.position);
                stamp(cell, &Pattern::null(scale as usize), &[], scale).unwrap_or_default()
            });
            for new_cell in block {
                order.push(new_cell.position);
                stamped.insert(new_cell.position, new_cell);
            }
        }

        let present: BTreeSet<Position> = stamped.keys().copied().collect();
        for cell in stamped.values_mut() {
            cell.links.retain(|pos, _| present.contains(pos));
        }
        Expansion {
            cells: order.into_iter().filter_map(|pos| stamped.remove(&pos)).collect(),
            null_fallbacks,
        }
    }
}

/// Stamps a rotated template for `cell`.
///
/// Fails if the payload has no centre to land on or an abstract edge has no
/// border cell on its side.
fn stamp(
    cell: &ExpansionCell,
    pattern: &Pattern,
    links: &[(Direction, LockId)],
    scale: i32,
) -> Option<Vec<ExpansionCell>> {
    let center = pattern.center();
    if cell.payload.is_some() && center.is_none() {
        return None;
    }
    if links.iter().any(|&(dir, _)| pattern.border_cells(dir).is_empty()) {
        return None;
    }

    let origin = cell.position.scaled(scale);
    let at = |(x, y): (usize, usize)| origin + Position::new(x as i32, y as i32);
    let mut block: BTreeMap<Position, ExpansionCell> = BTreeMap::new();
    let mut order = Vec::new();
    for local in pattern.present_cells() {
        let mut new_cell = ExpansionCell::new(at(local));
        if Some(local) == center {
            new_cell.payload = cell.payload;
        }
        order.push(new_cell.position);
        block.insert(new_cell.position, new_cell);
    }

    let positions = order.clone();
    for pos in &positions {
        for adjacent in pos.cardinal_adjacent_positions() {
            if block.contains_key(&adjacent) {
                if let Some(new_cell) = block.get_mut(pos) {
                    new_cell.links.insert(adjacent, OPEN_PASSAGE);
                }
            }
        }
    }

    for &(dir, lock) in links {
        for local in pattern.border_cells(dir) {
            let pos = at(local);
            if let Some(new_cell) = block.get_mut(&pos) {
                new_cell.links.insert(pos.step(dir), lock);
            }
        }
    }

    Some(order.into_iter().filter_map(|pos| block.remove(&pos)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::{GenerationConfig, GraphNode};
    use crate::JsonCatalog;

    fn composer() -> DungeonComposer {
        let catalog = JsonCatalog::builtin().unwrap();
        DungeonComposer::new(&catalog, GenerationConfig::for_testing(0).dungeon).unwrap()
    }

    fn region_node(links: &[Direction], is_start: bool) -> RegionNode {
        let position = Position::new(4, 4);
        let mut node = GraphNode::new(position, 0, 0, None);
        for &dir in links {
            node.links.insert(position.step(dir), OPEN_PASSAGE);
        }
        if let Some(&first) = links.first() {
            node.parent = Some(position.step(first));
        }
        let mut region = RegionNode::new(node);
        region.is_start = is_start;
        region.tileset = Some("stone".to_string());
        region
    }

    #[test]
    fn test_goal_positions() {
        let composer = composer();
        let start = region_node(&[Direction::East, Direction::South], true);
        assert_eq!(
            composer.goal_positions(&start),
            vec![Position::new(3, 3), Position::new(3, 6), Position::new(6, 3)]
        );
        let reached_from_west = region_node(&[Direction::West, Direction::North], false);
        assert_eq!(
            composer.goal_positions(&reached_from_west),
            vec![Position::new(0, 3), Position::new(3, 0)]
        );
    }

    #[test]
    fn test_allotment_covers_goal_spread() {
        let composer = composer();
        let hub = region_node(&Direction::ALL, false);
        let params = composer.graph_params(&hub);
        assert_eq!(params.goals.len(), 4);
        assert!(params.tiles_per_security_level >= 19);
    }

    #[test]
    fn test_stamp_links_edges_and_payload() {
        let mut cell = ExpansionCell::new(Position::new(1, 0));
        cell.links.insert(Position::new(0, 0), 7);
        cell.payload = Some(Payload::Key(3));
        let pattern = Pattern::parse(".#./.*./...").unwrap().rotated(3);
        let block = stamp(&cell, &pattern, &cell.link_directions(), 3).unwrap();

        assert_eq!(block.len(), 2);
        let door = block.iter().find(|c| c.position == Position::new(3, 1)).unwrap();
        assert_eq!(door.links.get(&Position::new(2, 1)), Some(&7));
        assert_eq!(door.links.get(&Position::new(4, 1)), Some(&OPEN_PASSAGE));
        let centre = block.iter().find(|c| c.position == Position::new(4, 1)).unwrap();
        assert_eq!(centre.payload, Some(Payload::Key(3)));
    }

    #[test]
    fn test_stamp_rejects_missing_side_or_centre() {
        let mut cell = ExpansionCell::new(Position::new(0, 0));
        cell.links.insert(Position::new(1, 0), OPEN_PASSAGE);
        let north_only = Pattern::parse(".#./.*./...").unwrap();
        assert!(stamp(&cell, &north_only, &cell.link_directions(), 3).is_none());

        cell.links.clear();
        cell.payload = Some(Payload::Entrance);
        let no_centre = Pattern::parse(".#./.#./...").unwrap();
        assert!(stamp(&cell, &no_centre, &[], 3).is_none());
    }

    #[test]
    fn test_dungeon_build() {
        let composer = composer();
        let mut ctx = GenerationContext::new(Some(100_000));
        let mut node = region_node(&[Direction::East], true);
        node.num_security_levels = 2;
        let dungeon = composer.build_dungeon(&mut ctx, &node, 17).unwrap();

        assert!(dungeon.tile(dungeon.entrance).is_some());
        assert_eq!(dungeon.center, Position::new(31, 31));
        assert_eq!(dungeon.lock_ids().len(), 1);
        let keys: Vec<LockId> = dungeon
            .items()
            .into_iter()
            .filter_map(|(_, item)| match item {
                TileItem::Key(id) => Some(*id),
                TileItem::Loot(_) => None,
            })
            .collect();
        assert_eq!(keys, dungeon.lock_ids().into_iter().collect::<Vec<_>>());

        // no dangling doors, and every door is mirrored
        for tile in dungeon.tiles.values() {
            for (other, lock) in &tile.doors {
                let back = dungeon.tile(*other).unwrap();
                assert_eq!(back.doors.get(&tile.position), Some(lock));
            }
        }
    }

    #[test]
    fn test_region_key_lands_in_dungeon() {
        let composer = composer();
        let mut ctx = GenerationContext::new(Some(100_000));
        let mut node = region_node(&[Direction::North], false);
        node.node.key_id = 99;
        let dungeon = composer.build_dungeon(&mut ctx, &node, 4).unwrap();
        assert!(dungeon
            .items()
            .iter()
            .any(|(_, item)| **item == TileItem::Key(99)));
    }

    #[test]
    fn test_dungeon_is_deterministic() {
        let composer = composer();
        let node = region_node(&[Direction::South, Direction::West], false);
        let a = composer
            .build_dungeon(&mut GenerationContext::new(Some(100_000)), &node, 8)
            .unwrap();
        let b = composer
            .build_dungeon(&mut GenerationContext::new(Some(100_000)), &node, 8)
            .unwrap();
        assert_eq!(a, b);
    }
}
