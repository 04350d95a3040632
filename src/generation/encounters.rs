//! # Encounter Generation
//!
//! Budgeted creature placement in spatially separated encounter clusters.
//!
//! Each dungeon gets a combat-power budget sized against a sample party.
//! Anchors are spread across the dungeon away from the entrance, creatures
//! are drawn from the region's enemy pool until the budget runs out, split
//! across the anchors by territory share, and finally placed on free,
//! fully-linked tiles. If anything cannot be placed the whole call yields
//! nothing and the caller regenerates the dungeon.

use crate::catalog::{BiomeDef, CreatureTemplate, DataCatalog, PartyDef};
use crate::generation::{EncounterConfig, SeededStream};
use crate::utils::{flood_within, hop_distances, proportional_shares};
use crate::{
    footprint_at, Creature, Dungeon, IdCounter, Position, RegionNode, WeaveError, WeaveResult,
    OPEN_PASSAGE,
};
use log::trace;
use std::collections::{BTreeMap, BTreeSet};

/// One encounter cluster. Only lives for the duration of an allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Encounter {
    pub id: u32,
    pub anchor: Position,
    /// Tiles within reach of the anchor through open doors, in visit order
    pub territory: Vec<Position>,
    /// Share of the dungeon budget
    pub budget: f64,
    pub is_boss: bool,
    /// Template names assigned to this encounter
    pub creatures: Vec<String>,
}

/// Result of a successful allocation, applied to the dungeon with
/// [`EncounterPlan::apply`].
#[derive(Debug, Clone, PartialEq)]
pub struct EncounterPlan {
    pub budget: f64,
    /// Power of every drawn creature
    pub spent: f64,
    pub encounters: Vec<Encounter>,
    pub creatures: Vec<Creature>,
}

impl EncounterPlan {
    /// Replaces the dungeon's creatures with this plan's placements and
    /// records the experience total.
    pub fn apply(self, dungeon: &mut Dungeon) {
        dungeon.clear_creatures();
        for creature in &self.creatures {
            for pos in creature.footprint() {
                if let Some(tile) = dungeon.tile_mut(pos) {
                    tile.creatures.push(creature.id);
                }
            }
        }
        dungeon.total_experience = self.creatures.iter().map(|c| c.experience).sum();
        dungeon.creatures = self.creatures;
    }
}

/// Enemy pool of one biome.
#[derive(Debug, Clone, Default)]
struct EnemyPool {
    enemies: Vec<String>,
    boss: Option<String>,
}

/// Sizes and places encounters.
#[derive(Debug, Clone)]
pub struct EncounterAllocator {
    pub config: EncounterConfig,
    party: PartyDef,
    templates: BTreeMap<String, CreatureTemplate>,
    pools: BTreeMap<String, EnemyPool>,
}

impl EncounterAllocator {
    /// Loads the party, creature templates, and biome enemy pools.
    pub fn new(catalog: &dyn DataCatalog, config: EncounterConfig) -> WeaveResult<Self> {
        let party = PartyDef::load(catalog)?;
        let mut templates = BTreeMap::new();
        for name in catalog.get_entries("creatures") {
            let template = CreatureTemplate::load(catalog, &name)?;
            if template.power <= 0.0 || template.power_per_level < 0.0 {
                return Err(WeaveError::Catalog(format!(
                    "creature '{}' has no positive power",
                    name
                )));
            }
            templates.insert(name, template);
        }

        let mut pools = BTreeMap::new();
        for biome in BiomeDef::load_all(catalog)? {
            for name in biome.enemies.iter().chain(biome.boss.iter()) {
                if !templates.contains_key(name) {
                    return Err(WeaveError::Catalog(format!(
                        "biome '{}' references unknown creature '{}'",
                        biome.name, name
                    )));
                }
            }
            pools.insert(
                biome.name.clone(),
                EnemyPool {
                    enemies: biome.enemies,
                    boss: biome.boss,
                },
            );
        }

        Ok(Self {
            config,
            party,
            templates,
            pools,
        })
    }

    /// Number of encounters a dungeon of this size holds.
    pub fn encounter_count(&self, dungeon: &Dungeon) -> usize {
        let count = 1 + dungeon.tiles.len() / self.config.tiles_per_encounter.max(1);
        count.min(self.config.max_encounters)
    }

    /// Combat-power budget of a region node's dungeon holding `encounters`
    /// encounters.
    pub fn budget(&self, node: &RegionNode, encounters: usize) -> f64 {
        let config = &self.config;
        let mut budget = self.party.total_power(node.level);
        if node.has_boss {
            budget *= config.boss_multiplier;
        }
        if node.key_id() != OPEN_PASSAGE {
            budget *= config.key_multiplier;
        }
        budget *= 1.0 + config.extra_encounter_bonus * encounters.saturating_sub(1) as f64;
        if node.is_start {
            budget *= config.start_region_multiplier;
        }
        let damp = config.dampened_below_level;
        if node.level < damp {
            budget *= (node.level + damp) as f64 / (2 * damp) as f64;
        }
        budget
    }

    /// Plans encounters for `dungeon`.
    ///
    /// Returns `None` when no tile qualifies as an anchor or a creature
    /// cannot be placed; the caller should regenerate the dungeon with a new
    /// seed. Encounter ids drawn before a failure stay consumed.
    pub fn generate_encounters(
        &self,
        dungeon: &Dungeon,
        node: &RegionNode,
        seed: u64,
        ids: &mut IdCounter,
    ) -> Option<EncounterPlan> {
        let mut stream = SeededStream::new(seed);
        let count = self.encounter_count(dungeon);
        let budget = self.budget(node, count);

        let candidates = self.eligible_anchors(dungeon);
        if candidates.is_empty() {
            trace!("no encounter anchors in dungeon at {:?}", dungeon.region);
            return None;
        }
        let anchors = self.choose_anchors(dungeon, &candidates, count, node.has_boss, &mut stream);

        let territory_sizes: Vec<f64> = anchors.iter().map(|(_, t)| t.len() as f64).collect();
        let shares = proportional_shares(budget, &territory_sizes);
        let mut encounters: Vec<Encounter> = anchors
            .into_iter()
            .zip(shares)
            .enumerate()
            .map(|(i, ((anchor, territory), share))| Encounter {
                id: ids.allocate(),
                anchor,
                territory,
                budget: share,
                is_boss: node.has_boss && i == 0,
                creatures: Vec::new(),
            })
            .collect();

        let (boss, drawn, spent) = self.draw_creatures(node, budget, &mut stream);
        let boss_drawn = boss.is_some();
        if let Some(boss) = boss {
            if let Some(encounter) = encounters.iter_mut().find(|e| e.is_boss) {
                encounter.creatures.push(boss);
            }
        }
        self.split(&mut encounters, drawn, node.level);

        let creatures = self.place(dungeon, &encounters, node, boss_drawn, &mut stream)?;
        Some(EncounterPlan {
            budget,
            spent,
            encounters,
            creatures,
        })
    }

    /// Tiles far enough from the entrance with enough territory, each paired
    /// with its territory.
    fn eligible_anchors(&self, dungeon: &Dungeon) -> Vec<(Position, Vec<Position>)> {
        let distances = hop_distances(&dungeon.entrance, |pos| {
            dungeon
                .tile(*pos)
                .map(|tile| tile.doors.keys().copied().collect::<Vec<_>>())
                .unwrap_or_default()
        });
        dungeon
            .tiles
            .keys()
            .copied()
            .filter(|pos| distances.get(pos).is_some_and(|&d| d > self.config.start_exclusion))
            .filter_map(|pos| {
                let territory = self.territory(dungeon, pos);
                (territory.len() >= self.config.min_territory).then_some((pos, territory))
            })
            .collect()
    }

    fn territory(&self, dungeon: &Dungeon, anchor: Position) -> Vec<Position> {
        flood_within(anchor, self.config.territory_depth, |pos| {
            dungeon
                .tile(*pos)
                .map(|tile| {
                    tile.doors
                        .iter()
                        .filter(|(_, &lock)| lock == OPEN_PASSAGE)
                        .map(|(&next, _)| next)
                        .filter(|next| dungeon.tile(*next).is_some())
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default()
        })
    }

    /// Picks up to `count` anchors. A boss anchor, if any, comes first and
    /// is the candidate nearest the dungeon centre; every further anchor is
    /// a random candidate whose distance to the chosen anchors is at least
    /// the average.
    fn choose_anchors(
        &self,
        dungeon: &Dungeon,
        candidates: &[(Position, Vec<Position>)],
        count: usize,
        has_boss: bool,
        stream: &mut SeededStream,
    ) -> Vec<(Position, Vec<Position>)> {
        let mut chosen: Vec<usize> = Vec::new();
        if has_boss {
            let nearest = candidates
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| {
                    a.0.euclidean_distance(dungeon.center)
                        .total_cmp(&b.0.euclidean_distance(dungeon.center))
                })
                .map(|(i, _)| i);
            chosen.extend(nearest);
        }

        while chosen.len() < count.min(candidates.len()) {
            let open: Vec<usize> = (0..candidates.len()).filter(|i| !chosen.contains(i)).collect();
            let next = if chosen.is_empty() {
                stream.pick(&open).copied()
            } else {
                let spread: Vec<(usize, u32)> = open
                    .iter()
                    .map(|&i| {
                        let d = chosen
                            .iter()
                            .map(|&c| candidates[i].0.manhattan_distance(candidates[c].0))
                            .min()
                            .unwrap_or(0);
                        (i, d)
                    })
                    .collect();
                let total: f64 = spread.iter().map(|&(_, d)| d as f64).sum();
                let average = total / spread.len() as f64;
                let far: Vec<usize> = spread
                    .iter()
                    .filter(|&&(_, d)| d as f64 >= average)
                    .map(|&(i, _)| i)
                    .collect();
                stream.pick(&far).copied()
            };
            match next {
                Some(i) => chosen.push(i),
                None => break,
            }
        }
        chosen.into_iter().map(|i| candidates[i].clone()).collect()
    }

    /// Draws creatures while the budget allows. The boss creature, if any,
    /// is charged first.
    fn draw_creatures(
        &self,
        node: &RegionNode,
        budget: f64,
        stream: &mut SeededStream,
    ) -> (Option<String>, Vec<String>, f64) {
        let pool = node
            .biome
            .as_ref()
            .and_then(|biome| self.pools.get(biome))
            .cloned()
            .unwrap_or_default();
        let mut remaining = budget;

        let mut boss = None;
        if node.has_boss {
            if let Some(template) = pool.boss.as_ref().and_then(|name| self.templates.get(name)) {
                let power = template.power_at(node.level);
                if power <= remaining {
                    remaining -= power;
                    boss = Some(template.name.clone());
                }
            }
        }

        let mut drawn = Vec::new();
        loop {
            let fits: Vec<&CreatureTemplate> = pool
                .enemies
                .iter()
                .filter_map(|name| self.templates.get(name))
                .filter(|template| template.power_at(node.level) <= remaining)
                .collect();
            let Some(template) = stream.pick(&fits) else {
                break;
            };
            remaining -= template.power_at(node.level);
            drawn.push(template.name.clone());
        }
        (boss, drawn, budget - remaining)
    }

    /// Deals drawn creatures round-robin to encounters that still have room
    /// in their budget share, then deals whatever is left round-robin
    /// regardless of budget.
    fn split(&self, encounters: &mut [Encounter], drawn: Vec<String>, level: u32) {
        if encounters.is_empty() {
            return;
        }
        let count = encounters.len();
        let mut allotted: Vec<f64> = encounters
            .iter()
            .map(|e| e.creatures.iter().map(|name| self.power_of(name, level)).sum())
            .collect();
        let mut leftovers = Vec::new();
        let mut cursor = 0;
        for name in drawn {
            let power = self.power_of(&name, level);
            let slot = (0..count)
                .map(|step| (cursor + step) % count)
                .find(|&i| allotted[i] + power <= encounters[i].budget);
            match slot {
                Some(i) => {
                    allotted[i] += power;
                    encounters[i].creatures.push(name);
                    cursor = i + 1;
                }
                None => leftovers.push(name),
            }
        }
        for (j, name) in leftovers.into_iter().enumerate() {
            encounters[j % count].creatures.push(name);
        }
    }

    fn power_of(&self, name: &str, level: u32) -> f64 {
        self.templates.get(name).map_or(0.0, |t| t.power_at(level))
    }

    /// Places every encounter's creatures on free tiles of its territory.
    fn place(
        &self,
        dungeon: &Dungeon,
        encounters: &[Encounter],
        node: &RegionNode,
        boss_drawn: bool,
        stream: &mut SeededStream,
    ) -> Option<Vec<Creature>> {
        let mut occupied: BTreeSet<Position> = BTreeSet::new();
        let mut creatures = Vec::new();
        for encounter in encounters {
            let territory: BTreeSet<Position> = encounter.territory.iter().copied().collect();
            for (i, name) in encounter.creatures.iter().enumerate() {
                let template = self.templates.get(name)?;
                let spots: Vec<Position> = encounter
                    .territory
                    .iter()
                    .copied()
                    .filter(|&anchor| {
                        footprint_fits(dungeon, &territory, &occupied, anchor, template.size)
                    })
                    .collect();
                let Some(&anchor) = stream.pick(&spots) else {
                    trace!("no room for '{}' in encounter {}", name, encounter.id);
                    return None;
                };
                occupied.extend(footprint_at(anchor, template.size));

                let power = template.power_at(node.level);
                creatures.push(Creature {
                    id: creatures.len() as u32 + 1,
                    template: name.clone(),
                    level: node.level,
                    power,
                    encounter_id: encounter.id,
                    anchor,
                    size: template.size,
                    is_boss: boss_drawn && encounter.is_boss && i == 0,
                    experience: (power * template.experience_per_power).round() as u32,
                });
            }
        }
        Some(creatures)
    }
}

/// Whether a `size` x `size` footprint anchored at `anchor` lies on free
/// territory tiles joined by open doors and includes a fully-linked tile.
/// For a single tile this means the tile itself is fully linked.
fn footprint_fits(
    dungeon: &Dungeon,
    territory: &BTreeSet<Position>,
    occupied: &BTreeSet<Position>,
    anchor: Position,
    size: u32,
) -> bool {
    let cells = footprint_at(anchor, size);
    let mut fully_linked = false;
    for &pos in &cells {
        if !territory.contains(&pos) || occupied.contains(&pos) {
            return false;
        }
        let Some(tile) = dungeon.tile(pos) else {
            return false;
        };
        fully_linked |= tile.is_fully_linked();
        for neighbor in pos.cardinal_adjacent_positions() {
            if cells.contains(&neighbor) && !tile.has_open_door(neighbor) {
                return false;
            }
        }
    }
    fully_linked
}
