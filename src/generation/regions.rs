//! # Region Composition
//!
//! Builds the overworld: one graph generation run at world scale, where each
//! security level becomes a region, followed by boss and campfire marking,
//! difficulty levels, branch tracing, biome painting, and offshoots.
//!
//! A region constraint that cannot be met is never patched locally. The
//! whole overworld is discarded and rebuilt from the next seed, since biome
//! painting depends on the shape of the entire graph.

use crate::catalog::{BiomeCondition, BiomeDef, DataCatalog, DEFAULT_TILESET};
use crate::generation::graph::keyed_reach;
use crate::generation::utils::derive_seed;
use crate::generation::{
    AbstractGraph, GenerationContext, Generator, GraphGenerator, GraphNode, GraphParams,
    OverworldConfig, SeededStream,
};
use crate::utils::{fraction, lerp_level};
use crate::{
    Direction, Overworld, Position, RegionInfo, RegionNode, WeaveError, WeaveResult, OPEN_PASSAGE,
};
use log::{debug, info, trace};
use std::collections::BTreeSet;

/// Why an overworld candidate was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegionFailure {
    #[error("region {region} fit {placed} of {required} campfires")]
    CampfiresUnmet { region: u32, placed: u32, required: u32 },
    #[error("region {region} key branch has {length} exclusive tiles, {required} required")]
    KeyBranchTooShort { region: u32, length: usize, required: usize },
    #[error("region {region} boss branch has {length} exclusive tiles, {required} required")]
    BossBranchTooShort { region: u32, length: usize, required: usize },
    #[error("offshoot '{biome}' found no open cell beside a '{parent}' node")]
    NoOffshootSlot { biome: String, parent: String },
}

/// Builds overworld region graphs.
#[derive(Debug, Clone)]
pub struct RegionComposer {
    pub config: OverworldConfig,
    biomes: Vec<BiomeDef>,
}

impl RegionComposer {
    /// Creates a composer, loading biome declarations from the catalog.
    pub fn new(catalog: &dyn DataCatalog, config: OverworldConfig) -> WeaveResult<Self> {
        let biomes = BiomeDef::load_all(catalog)?;
        for biome in &biomes {
            if let Some(parent) = &biome.offshoot_of {
                if !biomes.iter().any(|other| &other.name == parent) {
                    return Err(WeaveError::Catalog(format!(
                        "offshoot '{}' names unknown parent '{}'",
                        biome.name, parent
                    )));
                }
            }
        }
        Ok(Self { config, biomes })
    }

    /// Biome declarations in painting order.
    pub fn biomes(&self) -> &[BiomeDef] {
        &self.biomes
    }

    pub fn biome(&self, name: &str) -> Option<&BiomeDef> {
        self.biomes.iter().find(|biome| biome.name == name)
    }

    /// Graph parameters of the world-scale run.
    pub fn graph_params(&self) -> GraphParams {
        let config = &self.config;
        GraphParams {
            width: config.width,
            height: config.height,
            goals: vec![config.start, config.boss],
            num_security_levels: config.region_count(),
            tiles_per_security_level: config.tiles_per_region,
            branch_limit_per_level: config.branch_limit_per_level,
            directness: config.directness,
            branch_chance_percent: config.branch_chance_percent,
        }
    }

    /// Builds the overworld, regenerating from the next seed until every
    /// region constraint holds.
    pub fn build_overworld(
        &self,
        ctx: &mut GenerationContext,
        seed: u64,
    ) -> WeaveResult<Overworld> {
        self.generate(ctx, seed)
    }

    /// Turns a world-scale graph into an overworld.
    pub fn compose(&self, graph: &AbstractGraph) -> Result<Overworld, RegionFailure> {
        let mut stream = SeededStream::new(derive_seed(graph.seed, 1));
        let mut overworld = Overworld::new(graph.width, graph.height, graph.seed, graph.start());
        for node in graph.nodes() {
            overworld.insert(RegionNode::new(node.clone()));
        }
        if let Some(start) = overworld.get_mut(graph.start()) {
            start.is_start = true;
        }

        let region_count = self.config.region_count();
        let mut regions = Vec::with_capacity(region_count as usize);
        for index in 0..region_count {
            let mut region = self.outline_region(graph, &mut overworld, index);
            self.place_campfires(&mut overworld, &region, &mut stream)?;
            self.trace_branches(graph, &mut region, index + 1 == region_count)?;
            regions.push(region);
        }
        overworld.regions = regions;

        self.assign_levels(&mut overworld);
        self.paint_biomes(&mut overworld, &mut stream);
        self.attach_offshoots(&mut overworld, &mut stream)?;

        let order = overworld.order().to_vec();
        for pos in order {
            let seed = stream.fork();
            if let Some(node) = overworld.get_mut(pos) {
                node.dungeon_seed = seed;
                if node.tileset.is_none() {
                    node.tileset = Some(DEFAULT_TILESET.to_string());
                }
            }
        }
        Ok(overworld)
    }

    /// Collects a region's members and marks its boss nodes.
    fn outline_region(
        &self,
        graph: &AbstractGraph,
        overworld: &mut Overworld,
        index: u32,
    ) -> RegionInfo {
        let members = graph.level_members(index);
        let entry = members.first().copied().unwrap_or_else(|| graph.start());
        let key_node = members
            .iter()
            .copied()
            .find(|&pos| graph.get(pos).is_some_and(GraphNode::has_key));
        let gates: Vec<Position> = members
            .iter()
            .copied()
            .filter(|&pos| {
                graph.get(pos).is_some_and(|node| {
                    node.links
                        .keys()
                        .any(|next| graph.get(*next).is_some_and(|n| n.security_level == index + 1))
                })
            })
            .collect();

        let boss_corner = self.config.boss;
        let mut bosses = gates.clone();
        if members.contains(&boss_corner) {
            bosses.push(boss_corner);
        }
        for &pos in &bosses {
            if let Some(node) = overworld.get_mut(pos) {
                node.has_boss = true;
            }
        }

        let boss_node = gates.first().copied().unwrap_or_else(|| {
            if members.contains(&boss_corner) {
                boss_corner
            } else {
                let mut deepest = entry;
                for &pos in &members {
                    if graph.depth(pos) > graph.depth(deepest) {
                        deepest = pos;
                    }
                }
                deepest
            }
        });

        RegionInfo {
            index,
            tier: index / self.config.regions_per_tier.max(1),
            entry,
            key_node,
            boss_node,
            members,
            key_branch: Vec::new(),
            boss_branch: Vec::new(),
        }
    }

    /// Places the region's campfires, the entry node first.
    fn place_campfires(
        &self,
        overworld: &mut Overworld,
        region: &RegionInfo,
        stream: &mut SeededStream,
    ) -> Result<(), RegionFailure> {
        let required = self.config.campfires_per_region;
        let mut eligible: BTreeSet<Position> = region
            .members
            .iter()
            .copied()
            .filter(|&pos| {
                overworld
                    .get(pos)
                    .is_some_and(|node| !node.has_boss && node.key_id() == OPEN_PASSAGE)
            })
            .collect();

        let mut forced = Some(region.entry);
        let mut placed = 0;
        let mut attempts = 0;
        while placed < required && attempts < self.config.campfire_attempts {
            attempts += 1;
            let pick = match forced.take() {
                Some(entry) => entry,
                None => {
                    let candidates: Vec<Position> = eligible.iter().copied().collect();
                    match stream.pick(&candidates) {
                        Some(&pos) => pos,
                        None => continue,
                    }
                }
            };
            if !eligible.remove(&pick) {
                continue;
            }
            let Some(node) = overworld.get_mut(pick) else {
                continue;
            };
            node.has_campfire = true;
            placed += 1;
            for (next, lock) in &node.node.links {
                if *lock == OPEN_PASSAGE {
                    eligible.remove(next);
                }
            }
            trace!("region {}: campfire at {:?}", region.index, pick);
        }

        if placed < required {
            return Err(RegionFailure::CampfiresUnmet {
                region: region.index,
                placed,
                required,
            });
        }
        Ok(())
    }

    /// Computes the tiles exclusive to the key branch and to the boss branch.
    ///
    /// Both chains are walked through parent links all the way back to the
    /// world start; their shared prefix belongs to neither branch.
    fn trace_branches(
        &self,
        graph: &AbstractGraph,
        region: &mut RegionInfo,
        is_last: bool,
    ) -> Result<(), RegionFailure> {
        let key_chain = region.key_node.map(|pos| graph.ancestry(pos)).unwrap_or_default();
        let boss_chain = graph.ancestry(region.boss_node);
        let key_set: BTreeSet<Position> = key_chain.iter().copied().collect();
        let boss_set: BTreeSet<Position> = boss_chain.iter().copied().collect();

        region.key_branch = key_chain.into_iter().filter(|pos| !boss_set.contains(pos)).collect();
        region.boss_branch = boss_chain.into_iter().filter(|pos| !key_set.contains(pos)).collect();

        let required = self.config.min_branch_length;
        if !is_last && region.key_branch.len() < required {
            return Err(RegionFailure::KeyBranchTooShort {
                region: region.index,
                length: region.key_branch.len(),
                required,
            });
        }
        if region.boss_branch.len() < required {
            return Err(RegionFailure::BossBranchTooShort {
                region: region.index,
                length: region.boss_branch.len(),
                required,
            });
        }
        Ok(())
    }

    /// Interpolates each node's difficulty across its tier's level range by
    /// its creation position within its own region.
    fn assign_levels(&self, overworld: &mut Overworld) {
        let spans: Vec<(u32, u32, Vec<Position>)> = overworld
            .regions
            .iter()
            .map(|region| {
                let (lo, hi) = self
                    .config
                    .tier_levels
                    .get(region.tier as usize)
                    .copied()
                    .unwrap_or((1, 1));
                (lo, hi, region.members.clone())
            })
            .collect();
        for (lo, hi, members) in spans {
            for (i, &pos) in members.iter().enumerate() {
                if let Some(node) = overworld.get_mut(pos) {
                    node.level = lerp_level(lo, hi, fraction(i, members.len()));
                }
            }
        }
    }

    /// Paints biomes onto unpainted nodes in (priority, name) order.
    fn paint_biomes(&self, overworld: &mut Overworld, stream: &mut SeededStream) {
        let order = overworld.order().to_vec();
        for biome in self.biomes.iter().filter(|b| b.condition != BiomeCondition::Offshoot) {
            let mut painted = 0;
            for &pos in &order {
                let Some(node) = overworld.get(pos) else {
                    continue;
                };
                let Some(region) = overworld.regions.get(node.region() as usize) else {
                    continue;
                };
                if node.biome.is_some() || !biome.applies_to_tier(region.tier) {
                    continue;
                }
                if !self.condition_holds(biome.condition, node, region, stream) {
                    continue;
                }
                let levels = biome.roll_security_levels(stream);
                if let Some(node) = overworld.get_mut(pos) {
                    paint(node, biome, levels);
                    painted += 1;
                }
            }
            trace!("biome '{}' painted {} nodes", biome.name, painted);
        }
    }

    fn condition_holds(
        &self,
        condition: BiomeCondition,
        node: &RegionNode,
        region: &RegionInfo,
        stream: &mut SeededStream,
    ) -> bool {
        let pos = node.position();
        match condition {
            BiomeCondition::FirstMap => node.is_start,
            BiomeCondition::KeyMapBranch => region.key_branch.contains(&pos),
            BiomeCondition::BossMapBranch => region.boss_branch.contains(&pos),
            BiomeCondition::KeyMap => node.key_id() != OPEN_PASSAGE,
            BiomeCondition::BossMap => node.has_boss,
            BiomeCondition::Connecting => {
                node.node.degree() == 2
                    && !node.is_start
                    && !node.has_boss
                    && node.key_id() == OPEN_PASSAGE
                    && stream.chance(self.config.connecting_paint_percent)
            }
            BiomeCondition::Fill => true,
            BiomeCondition::Offshoot => false,
        }
    }

    /// Attaches one leaf node per offshoot declaration beside a node of its
    /// parent biome.
    fn attach_offshoots(
        &self,
        overworld: &mut Overworld,
        stream: &mut SeededStream,
    ) -> Result<(), RegionFailure> {
        let mut next_branch = overworld.nodes().map(|n| n.node.branch_id).max().unwrap_or(0) + 1;
        for biome in self.biomes.iter().filter(|b| b.condition == BiomeCondition::Offshoot) {
            let parent_name = biome.offshoot_of.clone().unwrap_or_default();
            let mut slots: Vec<(Position, Position)> = Vec::new();
            for parent in overworld.nodes_of_biome(&parent_name) {
                let tier = parent.region() / self.config.regions_per_tier.max(1);
                if !biome.applies_to_tier(tier) {
                    continue;
                }
                for dir in Direction::ALL {
                    let cell = parent.position().step(dir);
                    let open = !overworld.contains(cell);
                    if open && cell.in_bounds(overworld.width, overworld.height) {
                        slots.push((parent.position(), cell));
                    }
                }
            }
            let Some(&(parent_pos, cell)) = stream.pick(&slots) else {
                return Err(RegionFailure::NoOffshootSlot {
                    biome: biome.name.clone(),
                    parent: parent_name,
                });
            };

            let Some(parent) = overworld.get(parent_pos) else {
                continue;
            };
            let region = parent.region();
            let level = parent.level;
            let grown = GraphNode::new(cell, next_branch, region, Some(parent_pos));
            let mut leaf = RegionNode::new(grown);
            next_branch += 1;
            leaf.is_offshoot = true;
            leaf.level = level;
            let levels = biome.roll_security_levels(stream);
            paint(&mut leaf, biome, levels);
            overworld.insert(leaf);
            overworld.link_open(parent_pos, cell);
            if let Some(info) = overworld.regions.get_mut(region as usize) {
                info.members.push(cell);
            }
            debug!("offshoot '{}' attached at {:?} beside {:?}", biome.name, cell, parent_pos);
        }
        Ok(())
    }
}

fn paint(node: &mut RegionNode, biome: &BiomeDef, levels: u32) {
    node.biome = Some(biome.name.clone());
    node.tileset = Some(biome.tileset.clone());
    node.num_security_levels = levels;
}

/// Whether every overworld node is reachable from the start once keys are
/// collected along the way.
pub fn overworld_is_solvable(overworld: &Overworld) -> bool {
    let reached = keyed_reach(
        overworld.start,
        |pos| {
            overworld
                .get(pos)
                .map(|node| node.node.links.iter().map(|(&p, &l)| (p, l)).collect())
                .unwrap_or_default()
        },
        |pos| overworld.get(pos).map_or(OPEN_PASSAGE, RegionNode::key_id),
    );
    reached.len() == overworld.len()
}

impl Generator<Overworld> for RegionComposer {
    fn generate(&self, ctx: &mut GenerationContext, seed: u64) -> WeaveResult<Overworld> {
        let graphs = GraphGenerator::new(self.graph_params());
        let mut attempt_seed = seed;
        let mut attempts: u32 = 0;
        loop {
            let checkpoint = ctx.lock_ids.clone();
            let graph = graphs.generate(ctx, attempt_seed)?;
            attempts += 1;
            match self.compose(&graph) {
                Ok(overworld) => {
                    info!(
                        "Overworld composed: {} nodes in {} regions after {} attempts (seed {})",
                        overworld.len(),
                        overworld.regions.len(),
                        attempts,
                        graph.seed
                    );
                    return Ok(overworld);
                }
                Err(reason) => {
                    debug!("overworld from seed {} rejected: {}", graph.seed, reason);
                    ctx.lock_ids = checkpoint;
                }
            }
            attempt_seed = graph.seed.wrapping_add(1);
            ctx.check_attempts(self.generator_type(), attempts)?;
        }
    }

    fn validate(&self, overworld: &Overworld) -> WeaveResult<()> {
        if overworld.regions.len() != self.config.region_count() as usize {
            return Err(WeaveError::GenerationFailed(format!(
                "overworld has {} regions, expected {}",
                overworld.regions.len(),
                self.config.region_count()
            )));
        }
        for region in &overworld.regions {
            let campfires = region
                .members
                .iter()
                .filter(|&&pos| overworld.get(pos).is_some_and(|n| n.has_campfire))
                .count();
            if (campfires as u32) < self.config.campfires_per_region {
                return Err(WeaveError::GenerationFailed(format!(
                    "region {} has {} campfires",
                    region.index, campfires
                )));
            }
        }
        if !overworld_is_solvable(overworld) {
            return Err(WeaveError::GenerationFailed(
                "some regions are unreachable from the start".to_string(),
            ));
        }
        Ok(())
    }

    fn generator_type(&self) -> &'static str {
        "RegionComposer"
    }
}
