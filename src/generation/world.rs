//! # World Pipeline
//!
//! Drives the generation phases in their fixed order and yields to the host
//! runtime between them.
//!
//! The phases are: overworld, one dungeon per region node, region loot,
//! dungeon loot, encounters, and finally experience. Phases never overlap.
//! A dungeon whose encounters cannot be placed is rebuilt from the next
//! seed and its loot dealt again before encounter planning resumes.

use crate::catalog::DataCatalog;
use crate::generation::utils::derive_seed;
use crate::generation::{
    overworld_is_solvable, DungeonComposer, EncounterAllocator, EncounterPlan, GenerationConfig,
    GenerationContext, Generator, LootAllocator, RegionComposer, SeededStream,
};
use crate::{
    Dungeon, Overworld, Position, RegionNode, TileItem, WeaveError, WeaveResult, World,
    OPEN_PASSAGE,
};
use log::{debug, info};
use std::collections::BTreeMap;

/// Stream salts for the phases that follow dungeon construction.
const REGION_LOOT_SALT: u64 = 4;
const DUNGEON_LOOT_SALT: u64 = 5;
const ENCOUNTER_SALT: u64 = 6;

/// Runs a complete generation from one configuration and catalog.
///
/// Catalog declarations are parsed once, when the generator is built.
#[derive(Debug, Clone)]
pub struct WorldGenerator {
    config: GenerationConfig,
    regions: RegionComposer,
    dungeons: DungeonComposer,
    loot: LootAllocator,
    encounters: EncounterAllocator,
}

impl WorldGenerator {
    /// Validates `config` and loads every declaration the phases need.
    pub fn new(catalog: &dyn DataCatalog, config: GenerationConfig) -> WeaveResult<Self> {
        config.validate()?;
        Ok(Self {
            regions: RegionComposer::new(catalog, config.overworld.clone())?,
            dungeons: DungeonComposer::new(catalog, config.dungeon.clone())?,
            loot: LootAllocator::new(catalog)?,
            encounters: EncounterAllocator::new(catalog, config.encounters.clone())?,
            config,
        })
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    pub fn region_composer(&self) -> &RegionComposer {
        &self.regions
    }

    pub fn dungeon_composer(&self) -> &DungeonComposer {
        &self.dungeons
    }

    /// Generates the world for the configured seed.
    pub async fn generate_world(&self) -> WeaveResult<World> {
        let mut ctx = GenerationContext::new(self.config.max_attempts);
        self.generate_with(&mut ctx, self.config.seed).await
    }

    /// Generates the world for `seed`, drawing ids from `ctx`.
    pub async fn generate_with(
        &self,
        ctx: &mut GenerationContext,
        seed: u64,
    ) -> WeaveResult<World> {
        info!("Generating world from seed {}", seed);

        let mut overworld = self.regions.generate(ctx, seed)?;
        tokio::task::yield_now().await;

        let mut dungeons = BTreeMap::new();
        for pos in overworld.order().to_vec() {
            let Some(node) = overworld.get(pos) else {
                continue;
            };
            let dungeon = self.dungeons.build_dungeon(ctx, node, node.dungeon_seed)?;
            dungeons.insert(pos, dungeon);
            tokio::task::yield_now().await;
        }
        info!("Built {} dungeons", dungeons.len());

        let mut stream = SeededStream::new(derive_seed(overworld.seed, REGION_LOOT_SALT));
        self.loot.allocate_regions(&mut overworld, &mut stream);
        info!(
            "Dealt {} loot items across the overworld",
            overworld.nodes().map(|n| n.loot.len()).sum::<usize>()
        );
        tokio::task::yield_now().await;

        for (pos, dungeon) in dungeons.iter_mut() {
            if let Some(node) = overworld.get(*pos) {
                self.place_dungeon_loot(dungeon, node);
            }
        }
        info!("Placed dungeon loot");
        tokio::task::yield_now().await;

        let mut plans = BTreeMap::new();
        for pos in overworld.order().to_vec() {
            let Some(node) = overworld.get(pos) else {
                continue;
            };
            let plan = self.plan_encounters(ctx, node, &mut dungeons)?;
            plans.insert(pos, plan);
            tokio::task::yield_now().await;
        }
        info!("Planned {} encounters", ctx.encounter_ids.peek() - 1);

        let mut experience = 0;
        for (pos, plan) in plans {
            if let Some(dungeon) = dungeons.get_mut(&pos) {
                plan.apply(dungeon);
                experience += dungeon.total_experience;
            }
        }
        info!("Distributed {} experience", experience);

        Ok(World {
            seed,
            overworld,
            dungeons,
            lock_ids: ctx.lock_ids.clone(),
            encounter_ids: ctx.encounter_ids.clone(),
        })
    }

    fn place_dungeon_loot(&self, dungeon: &mut Dungeon, node: &RegionNode) {
        let mut stream = SeededStream::new(derive_seed(dungeon.seed, DUNGEON_LOOT_SALT));
        let placed = self.loot.allocate_dungeon(dungeon, &node.loot, &mut stream);
        debug!(
            "dungeon at {:?}: {} of {} loot items placed",
            node.position(),
            placed,
            node.loot.len()
        );
    }

    /// Plans the encounters of one node, rebuilding its dungeon from the next
    /// seed while no plan fits.
    fn plan_encounters(
        &self,
        ctx: &mut GenerationContext,
        node: &RegionNode,
        dungeons: &mut BTreeMap<Position, Dungeon>,
    ) -> WeaveResult<EncounterPlan> {
        let pos = node.position();
        let mut attempts: u32 = 0;
        loop {
            let dungeon = dungeons
                .get(&pos)
                .ok_or_else(|| WeaveError::GenerationFailed(format!("no dungeon at {:?}", pos)))?;
            let seed = dungeon.seed;
            let stream_seed = derive_seed(seed, ENCOUNTER_SALT);
            let plan = self.encounters.generate_encounters(
                dungeon,
                node,
                stream_seed,
                &mut ctx.encounter_ids,
            );
            if let Some(plan) = plan {
                return Ok(plan);
            }

            attempts += 1;
            debug!("encounters for {:?} did not fit dungeon seed {}, rebuilding", pos, seed);
            ctx.check_attempts("encounter", attempts)?;
            let rebuilt = self.rebuild_dungeon(ctx, node, dungeon)?;
            dungeons.insert(pos, rebuilt);
        }
    }

    /// Rebuilds a dungeon past the graph seed that produced `dungeon`, so the
    /// replacement never repeats its layout.
    fn rebuild_dungeon(
        &self,
        ctx: &mut GenerationContext,
        node: &RegionNode,
        dungeon: &Dungeon,
    ) -> WeaveResult<Dungeon> {
        let seed = dungeon.graph_seed.wrapping_add(1);
        let mut rebuilt = self.dungeons.build_dungeon(ctx, node, seed)?;
        self.place_dungeon_loot(&mut rebuilt, node);
        Ok(rebuilt)
    }

    /// Checks whole-world invariants: every node has a dungeon, every lock
    /// pairs with exactly one key, and the overworld is solvable.
    pub fn validate(&self, world: &World) -> WeaveResult<()> {
        self.regions.validate(&world.overworld)?;
        if !overworld_is_solvable(&world.overworld) {
            return Err(WeaveError::GenerationFailed("overworld is not solvable".to_string()));
        }
        for node in world.overworld.nodes() {
            if !world.dungeons.contains_key(&node.position()) {
                return Err(WeaveError::GenerationFailed(format!(
                    "region node {:?} has no dungeon",
                    node.position()
                )));
            }
        }
        check_lock_pairing(&world.overworld, &world.dungeons)
    }
}

/// Every lock id on an overworld link or a dungeon door must have exactly
/// one key item somewhere in the world, and no key may exist without a lock.
fn check_lock_pairing(
    overworld: &Overworld,
    dungeons: &BTreeMap<Position, Dungeon>,
) -> WeaveResult<()> {
    let mut locks: BTreeMap<u32, usize> = BTreeMap::new();
    for node in overworld.nodes() {
        for &lock in node.node.links.values() {
            if lock != OPEN_PASSAGE {
                locks.entry(lock).or_insert(0);
            }
        }
    }
    for dungeon in dungeons.values() {
        for lock in dungeon.lock_ids().into_iter().chain(dungeon.opened_locks.iter().copied()) {
            locks.entry(lock).or_insert(0);
        }
    }

    for dungeon in dungeons.values() {
        for (pos, item) in dungeon.items() {
            let TileItem::Key(id) = item else {
                continue;
            };
            match locks.get_mut(id) {
                Some(count) => *count += 1,
                None => {
                    return Err(WeaveError::GenerationFailed(format!(
                        "key {} at {:?} in dungeon {:?} opens no lock",
                        id, pos, dungeon.region
                    )))
                }
            }
        }
    }

    match locks.iter().find(|&(_, &count)| count != 1) {
        Some((lock, count)) => Err(WeaveError::GenerationFailed(format!(
            "lock {} has {} keys",
            lock, count
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JsonCatalog;
    use std::collections::BTreeSet;

    fn generator(seed: u64) -> WorldGenerator {
        let catalog = JsonCatalog::builtin().unwrap();
        WorldGenerator::new(&catalog, GenerationConfig::for_testing(seed)).unwrap()
    }

    #[test]
    fn test_world_generation() {
        let generator = generator(11);
        let world = tokio_test::block_on(generator.generate_world()).unwrap();

        assert_eq!(world.seed, 11);
        assert_eq!(world.dungeons.len(), world.overworld.len());
        assert!(world.tile_count() > 0);
        generator.validate(&world).unwrap();

        for dungeon in world.dungeons.values() {
            assert!(dungeon.tile(dungeon.entrance).is_some());
            let experience: u32 = dungeon.creatures.iter().map(|c| c.experience).sum();
            assert_eq!(dungeon.total_experience, experience);
        }
    }

    #[test]
    fn test_world_is_deterministic() {
        let generator = generator(5);
        let a = tokio_test::block_on(generator.generate_world()).unwrap();
        let b = tokio_test::block_on(generator.generate_world()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_region_loot_reaches_dungeons() {
        let generator = generator(21);
        let world = tokio_test::block_on(generator.generate_world()).unwrap();
        for node in world.overworld.nodes() {
            let dungeon = world.dungeon(node.position()).unwrap();
            let placed: BTreeSet<String> = dungeon
                .items()
                .into_iter()
                .filter_map(|(_, item)| match item {
                    TileItem::Loot(name) => Some(name.clone()),
                    TileItem::Key(_) => None,
                })
                .collect();
            for item in &node.loot {
                assert!(placed.contains(item), "{} missing from {:?}", item, node.position());
            }
        }
    }

    #[test]
    fn test_lock_ids_are_world_unique() {
        let generator = generator(3);
        let world = tokio_test::block_on(generator.generate_world()).unwrap();
        let mut seen: BTreeMap<u32, Position> = BTreeMap::new();
        for (pos, dungeon) in &world.dungeons {
            for lock in dungeon.lock_ids() {
                assert!(seen.insert(lock, *pos).is_none(), "lock {} reused", lock);
            }
        }
        assert!(world.lock_ids.peek() > seen.keys().copied().max().unwrap_or(0));
    }

    #[test]
    fn test_rebuild_starts_past_the_graph_seed() {
        let generator = generator(13);
        let world = tokio_test::block_on(generator.generate_world()).unwrap();
        let mut ctx = GenerationContext::new(Some(100_000));
        for node in world.overworld.nodes() {
            let dungeon = world.dungeon(node.position()).unwrap();
            let rebuilt = generator.rebuild_dungeon(&mut ctx, node, dungeon).unwrap();
            assert_eq!(rebuilt.seed, dungeon.graph_seed.wrapping_add(1));
            assert!(
                rebuilt.graph_seed > dungeon.graph_seed,
                "{:?} reused its layout",
                node.position()
            );
            assert_eq!(rebuilt.region, dungeon.region);
        }
    }

    #[test]
    fn test_validate_catches_stray_key() {
        let generator = generator(8);
        let mut world = tokio_test::block_on(generator.generate_world()).unwrap();
        let region = world.overworld.start;
        let dungeon = world.dungeon_mut(region).unwrap();
        let entrance = dungeon.entrance;
        dungeon.tile_mut(entrance).unwrap().item = Some(TileItem::Key(9_999));
        assert!(generator.validate(&world).is_err());
    }

    #[test]
    fn test_rejects_invalid_config() {
        let catalog = JsonCatalog::builtin().unwrap();
        let mut config = GenerationConfig::for_testing(1);
        config.dungeon.width = 1;
        assert!(matches!(
            WorldGenerator::new(&catalog, config),
            Err(WeaveError::InvalidConfig(_))
        ));
    }
}
