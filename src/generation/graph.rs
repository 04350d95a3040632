//! # Graph Generation
//!
//! Breadth-first construction of an abstract grid graph with security-level
//! gating, branching, and key/lock placement.
//!
//! One attempt grows the graph outward from the first goal position. Each
//! security level has a tile allotment; the last tile of a level (while more
//! levels remain) becomes a dead-end key node, and the tile after it is
//! reached through a locked edge that opens the next level. An attempt is
//! judged globally once the frontier is exhausted, and a failed attempt is
//! discarded wholesale and retried with the next seed.

use crate::generation::{GenerationContext, Generator, SeededStream};
use crate::utils::pathfinding::reachable;
use crate::{Direction, IdCounter, LockId, Position, WeaveError, WeaveResult, OPEN_PASSAGE};
use log::{debug, trace};
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

/// Abstract grid cell produced by graph generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    pub position: Position,
    /// Path segment the node was created on
    pub branch_id: u32,
    /// Monotonic along any path from the start
    pub security_level: u32,
    /// Neighbor position -> lock id (0 = open)
    pub links: BTreeMap<Position, LockId>,
    /// Key carried by the node, 0 if none
    pub key_id: LockId,
    /// Node this one was grown from
    pub parent: Option<Position>,
}

impl GraphNode {
    /// Creates an unlinked node.
    pub fn new(
        position: Position,
        branch_id: u32,
        security_level: u32,
        parent: Option<Position>,
    ) -> Self {
        Self {
            position,
            branch_id,
            security_level,
            links: BTreeMap::new(),
            key_id: OPEN_PASSAGE,
            parent,
        }
    }

    pub fn degree(&self) -> usize {
        self.links.len()
    }

    pub fn has_key(&self) -> bool {
        self.key_id != OPEN_PASSAGE
    }

    /// Directions of every link, with their lock ids.
    pub fn link_directions(&self) -> Vec<(Direction, LockId)> {
        self.links
            .iter()
            .filter_map(|(&pos, &lock)| {
                Direction::from_delta(pos - self.position).map(|dir| (dir, lock))
            })
            .collect()
    }
}

/// Inputs of one graph generation run.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphParams {
    pub width: i32,
    pub height: i32,
    /// `goals[0]` is the start; every goal must be reached
    pub goals: Vec<Position>,
    pub num_security_levels: u32,
    pub tiles_per_security_level: u32,
    pub branch_limit_per_level: u32,
    /// Extra "toward nearest goal" entries in each direction list
    pub directness: u32,
    pub branch_chance_percent: u32,
}

impl GraphParams {
    /// Checks that the parameters describe a generatable graph.
    pub fn validate(&self) -> WeaveResult<()> {
        if self.goals.is_empty() {
            return Err(WeaveError::InvalidConfig("graph needs a start goal".to_string()));
        }
        if let Some(goal) = self
            .goals
            .iter()
            .find(|goal| !goal.in_bounds(self.width, self.height))
        {
            return Err(WeaveError::InvalidConfig(format!(
                "goal {:?} lies outside the {}x{} grid",
                goal, self.width, self.height
            )));
        }
        if self.num_security_levels == 0 || self.tiles_per_security_level == 0 {
            return Err(WeaveError::InvalidConfig(
                "graph needs at least one security level with at least one tile".to_string(),
            ));
        }
        Ok(())
    }

    /// Tile allotment of `level`; levels followed by another one get an extra
    /// slot for their key node.
    fn allotment(&self, level: u32) -> i64 {
        let base = self.tiles_per_security_level as i64;
        if level + 1 < self.num_security_levels {
            base + 1
        } else {
            base
        }
    }
}

/// Why a single generation attempt was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GraphFailure {
    #[error("goal {0:?} was never reached")]
    GoalUnreached(Position),
    #[error("reached security level {reached} but {required} levels are required")]
    SecurityLevelsUnmet { reached: u32, required: u32 },
    #[error("final level left {remaining} tiles of its allotment unused")]
    Undershoot { remaining: i64 },
    #[error("final level overshot its allotment by {excess} tiles")]
    Overshoot { excess: i64 },
    #[error("key {key} lies on branch {branch}, the same branch as its lock")]
    KeySharesLockBranch { key: LockId, branch: u32 },
    #[error("level {level} closed before its key was placed")]
    KeyMissing { level: u32 },
}

/// A successfully generated abstract graph.
#[derive(Debug, Clone, PartialEq)]
pub struct AbstractGraph {
    pub width: i32,
    pub height: i32,
    pub goals: Vec<Position>,
    pub num_security_levels: u32,
    /// Seed of the attempt that succeeded
    pub seed: u64,
    /// Attempts it took, including the successful one
    pub attempts: u32,
    nodes: BTreeMap<Position, GraphNode>,
    order: Vec<Position>,
}

impl AbstractGraph {
    /// Assembles a graph from nodes given in creation order, the start first.
    ///
    /// Links are taken as they are; run [`AbstractGraph::check_invariants`]
    /// on graphs that did not come out of a [`GraphGenerator`].
    pub fn from_nodes(params: &GraphParams, seed: u64, nodes: Vec<GraphNode>) -> Self {
        let order = nodes.iter().map(|node| node.position).collect();
        Self {
            width: params.width,
            height: params.height,
            goals: params.goals.clone(),
            num_security_levels: params.num_security_levels,
            seed,
            attempts: 1,
            nodes: nodes.into_iter().map(|node| (node.position, node)).collect(),
            order,
        }
    }

    pub fn get(&self, pos: Position) -> Option<&GraphNode> {
        self.nodes.get(&pos)
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

    /// The start node position.
    pub fn start(&self) -> Position {
        self.goals[0]
    }

    /// Node positions in creation order.
    pub fn order(&self) -> &[Position] {
        &self.order
    }

    /// Nodes in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.order.iter().filter_map(move |pos| self.nodes.get(pos))
    }

    /// Consumes the graph, yielding nodes in creation order.
    pub fn into_nodes(mut self) -> Vec<GraphNode> {
        self.order
            .iter()
            .filter_map(|pos| self.nodes.remove(pos))
            .collect()
    }

    /// Every locked edge once, as (lower-level side, higher-level side, lock).
    pub fn lock_edges(&self) -> Vec<(Position, Position, LockId)> {
        let mut edges = Vec::new();
        for node in self.nodes() {
            for (&other, &lock) in &node.links {
                if lock == OPEN_PASSAGE {
                    continue;
                }
                let higher = self.nodes.get(&other).map_or(0, |n| n.security_level);
                if higher > node.security_level {
                    edges.push((node.position, other, lock));
                }
            }
        }
        edges
    }

    /// Nodes carrying a key.
    pub fn key_nodes(&self) -> Vec<&GraphNode> {
        self.nodes().filter(|node| node.has_key()).collect()
    }

    /// Positions on `level`, in creation order.
    pub fn level_members(&self, level: u32) -> Vec<Position> {
        self.nodes()
            .filter(|node| node.security_level == level)
            .map(|node| node.position)
            .collect()
    }

    /// Walks parent links from `pos` back to the start.
    ///
    /// Every node has at most one predecessor, so the walk only ends where no
    /// predecessor exists. The result starts at `pos`.
    pub fn ancestry(&self, pos: Position) -> Vec<Position> {
        let mut chain = Vec::new();
        let mut current = self.nodes.get(&pos);
        while let Some(node) = current {
            chain.push(node.position);
            current = node.parent.and_then(|parent| self.nodes.get(&parent));
        }
        chain
    }

    /// Number of parent steps from the start to `pos`.
    pub fn depth(&self, pos: Position) -> usize {
        self.ancestry(pos).len().saturating_sub(1)
    }

    /// Checks that every node is reachable from the start once keys are
    /// collected along the way.
    pub fn is_solvable(&self) -> bool {
        let reached = keyed_reach(
            self.start(),
            |pos| {
                self.nodes
                    .get(&pos)
                    .map(|node| node.links.iter().map(|(&p, &l)| (p, l)).collect())
                    .unwrap_or_default()
            },
            |pos| self.nodes.get(&pos).map_or(OPEN_PASSAGE, |node| node.key_id),
        );
        reached.len() == self.nodes.len()
    }

    /// Checks lock/key pairing, security monotonicity, key dead ends, and
    /// solvability.
    pub fn check_invariants(&self) -> Result<(), String> {
        for (low, _high, lock) in self.lock_edges() {
            let holders: Vec<&GraphNode> =
                self.nodes().filter(|node| node.key_id == lock).collect();
            if holders.len() != 1 {
                return Err(format!("lock {} has {} keys", lock, holders.len()));
            }
            let source_branch = self.nodes.get(&low).map(|node| node.branch_id);
            if source_branch == Some(holders[0].branch_id) {
                return Err(format!("key {} shares its lock's branch", lock));
            }
        }
        for node in self.nodes() {
            if node.has_key() && node.degree() != 1 {
                return Err(format!("key node {:?} is not a dead end", node.position));
            }
            for (other, &lock) in &node.links {
                let Some(neighbor) = self.nodes.get(other) else {
                    return Err(format!("{:?} links to missing {:?}", node.position, other));
                };
                if neighbor.links.get(&node.position) != Some(&lock) {
                    return Err(format!("asymmetric link {:?} -> {:?}", node.position, other));
                }
                let step = node.security_level.abs_diff(neighbor.security_level);
                let expected = if lock == OPEN_PASSAGE { 0 } else { 1 };
                if step != expected {
                    return Err(format!(
                        "edge {:?} -> {:?} (lock {}) changes security by {}",
                        node.position, other, lock, step
                    ));
                }
            }
        }
        if !self.is_solvable() {
            return Err("graph is not solvable from the start".to_string());
        }
        Ok(())
    }
}

/// Positions reachable from `start` when keys are collected greedily: each
/// pass opens the locks whose keys have been reached so far, until a pass
/// finds no new key.
pub fn keyed_reach<L, K>(start: Position, links_of: L, key_of: K) -> HashSet<Position>
where
    L: Fn(Position) -> Vec<(Position, LockId)>,
    K: Fn(Position) -> LockId,
{
    let mut keys: BTreeSet<LockId> = BTreeSet::new();
    loop {
        let reached = reachable(start, |&pos| {
            links_of(pos)
                .into_iter()
                .filter(|(_, lock)| *lock == OPEN_PASSAGE || keys.contains(lock))
                .map(|(next, _)| next)
                .collect::<Vec<_>>()
        });
        let found: BTreeSet<LockId> = reached
            .iter()
            .map(|&pos| key_of(pos))
            .filter(|&key| key != OPEN_PASSAGE)
            .collect();
        if found.is_subset(&keys) {
            return reached;
        }
        keys.extend(found);
    }
}

/// Entry in a shuffled direction list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DirectionChoice {
    Cardinal(Direction),
    TowardGoal,
}

/// Mutable state of a single attempt.
struct GraphBuilder<'a> {
    params: &'a GraphParams,
    stream: SeededStream,
    nodes: BTreeMap<Position, GraphNode>,
    order: Vec<Position>,
    unmet_goals: Vec<Position>,
    level_on: u32,
    remaining: i64,
    branch_quota: u32,
    next_branch: u32,
    /// Key placed for the level currently open, with its branch
    pending_key: Option<(LockId, u32)>,
}

impl<'a> GraphBuilder<'a> {
    fn new(params: &'a GraphParams, seed: u64) -> Self {
        let start = params.goals[0];
        let unmet_goals = params.goals[1..]
            .iter()
            .copied()
            .filter(|&goal| goal != start)
            .collect();
        let mut builder = Self {
            params,
            stream: SeededStream::new(seed),
            nodes: BTreeMap::new(),
            order: Vec::new(),
            unmet_goals,
            level_on: 0,
            remaining: params.allotment(0),
            branch_quota: params.branch_limit_per_level,
            next_branch: 1,
            pending_key: None,
        };
        builder.insert(GraphNode::new(start, 0, 0, None));
        builder
    }

    fn insert(&mut self, node: GraphNode) {
        self.order.push(node.position);
        self.nodes.insert(node.position, node);
    }

    fn more_levels(&self) -> bool {
        self.level_on + 1 < self.params.num_security_levels
    }

    fn run(
        mut self,
        ids: &mut IdCounter,
    ) -> Result<(BTreeMap<Position, GraphNode>, Vec<Position>), GraphFailure> {
        let mut queue = VecDeque::new();
        queue.push_back(self.params.goals[0]);

        while let Some(pos) = queue.pop_front() {
            let on_active_level = self
                .nodes
                .get(&pos)
                .is_some_and(|node| node.security_level == self.level_on);
            if on_active_level {
                self.expand(pos, &mut queue, ids)?;
            }
        }

        self.finish()?;
        Ok((self.nodes, self.order))
    }

    /// Grows new links out of the node at `pos`.
    fn expand(
        &mut self,
        pos: Position,
        queue: &mut VecDeque<Position>,
        ids: &mut IdCounter,
    ) -> Result<(), GraphFailure> {
        let Some(parent_branch) = self.nodes.get(&pos).map(|node| node.branch_id) else {
            return Ok(());
        };
        let directions = self.direction_list(pos);

        let mut desired = 1;
        if self.branch_quota > 0 && self.stream.chance(self.params.branch_chance_percent) {
            desired = 2;
            self.branch_quota -= 1;
        }

        let mut placed = 0;
        for dir in directions {
            if placed == desired {
                break;
            }
            // The final level stops growing once its allotment is spent.
            if !self.more_levels() && self.remaining <= 0 {
                break;
            }
            let next = pos.step(dir);
            let taken = self.nodes.contains_key(&next);
            if taken || !next.in_bounds(self.params.width, self.params.height) {
                continue;
            }

            let branch = if placed == 0 {
                parent_branch
            } else {
                let fresh = self.next_branch;
                self.next_branch += 1;
                fresh
            };

            self.remaining -= 1;
            let mut lock = OPEN_PASSAGE;
            let mut key_id = OPEN_PASSAGE;
            let mut enqueue = true;
            let mut crossed = false;

            if self.more_levels() && self.remaining == 0 {
                let (key, key_branch) = self
                    .pending_key
                    .take()
                    .ok_or(GraphFailure::KeyMissing { level: self.level_on })?;
                if key_branch == parent_branch {
                    return Err(GraphFailure::KeySharesLockBranch { key, branch: key_branch });
                }
                lock = key;
                self.level_on += 1;
                self.remaining = self.params.allotment(self.level_on);
                self.branch_quota = self.params.branch_limit_per_level;
                crossed = true;
            } else if self.more_levels() && self.remaining == 1 {
                key_id = ids.allocate();
                self.pending_key = Some((key_id, branch));
                enqueue = false;
            }

            let mut node = GraphNode::new(next, branch, self.level_on, Some(pos));
            node.key_id = key_id;
            node.links.insert(pos, lock);
            self.insert(node);
            if let Some(parent) = self.nodes.get_mut(&pos) {
                parent.links.insert(next, lock);
            }
            self.unmet_goals.retain(|&goal| goal != next);
            trace!(
                "graph: {:?} -> {:?} level {} branch {} lock {} key {}",
                pos, next, self.level_on, branch, lock, key_id
            );

            if enqueue {
                queue.push_back(next);
            }
            placed += 1;

            // A node on the old level must not open onto the new one twice.
            if crossed {
                break;
            }
        }
        Ok(())
    }

    /// Builds the shuffled direction list for a node: four cardinals plus
    /// `directness` "toward nearest unmet goal" entries collapsed into one.
    fn direction_list(&mut self, pos: Position) -> Vec<Direction> {
        let mut choices: Vec<DirectionChoice> =
            Direction::ALL.iter().map(|&dir| DirectionChoice::Cardinal(dir)).collect();
        let toward = self.toward_nearest_goal(pos);
        if toward.is_some() {
            choices.extend((0..self.params.directness).map(|_| DirectionChoice::TowardGoal));
        }
        self.stream.shuffle(&mut choices);

        let mut directions = Vec::with_capacity(4);
        for choice in choices {
            let dir = match choice {
                DirectionChoice::Cardinal(dir) => Some(dir),
                DirectionChoice::TowardGoal => toward,
            };
            if let Some(dir) = dir {
                if !directions.contains(&dir) {
                    directions.push(dir);
                }
            }
        }
        directions
    }

    /// Direction toward the nearest unmet goal, by Manhattan distance. The
    /// axis with the larger offset wins; equal offsets go horizontal.
    fn toward_nearest_goal(&self, pos: Position) -> Option<Direction> {
        let goal = self
            .unmet_goals
            .iter()
            .min_by_key(|goal| pos.manhattan_distance(**goal))?;
        let offset = *goal - pos;
        if offset.x == 0 && offset.y == 0 {
            return None;
        }
        let dir = if offset.x.abs() >= offset.y.abs() {
            if offset.x > 0 {
                Direction::East
            } else {
                Direction::West
            }
        } else if offset.y > 0 {
            Direction::South
        } else {
            Direction::North
        };
        Some(dir)
    }

    /// Judges the finished attempt.
    fn finish(&self) -> Result<(), GraphFailure> {
        if let Some(&goal) = self.unmet_goals.first() {
            return Err(GraphFailure::GoalUnreached(goal));
        }
        let required = self.params.num_security_levels;
        if self.level_on + 1 != required {
            return Err(GraphFailure::SecurityLevelsUnmet {
                reached: self.level_on + 1,
                required,
            });
        }
        if self.remaining < 0 {
            return Err(GraphFailure::Overshoot { excess: -self.remaining });
        }
        if self.remaining > self.params.tiles_per_security_level as i64 / 2 {
            return Err(GraphFailure::Undershoot { remaining: self.remaining });
        }
        Ok(())
    }
}

/// Seeded graph generator with global retry.
///
/// # Examples
///
/// ```
/// use worldweave::{GenerationContext, Generator, GraphGenerator, GraphParams, Position};
///
/// let generator = GraphGenerator::new(GraphParams {
///     width: 2,
///     height: 1,
///     goals: vec![Position::new(0, 0), Position::new(1, 0)],
///     num_security_levels: 1,
///     tiles_per_security_level: 1,
///     branch_limit_per_level: 0,
///     directness: 1,
///     branch_chance_percent: 0,
/// });
/// let mut ctx = GenerationContext::default();
/// let graph = generator.generate(&mut ctx, 1).unwrap();
/// assert_eq!(graph.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct GraphGenerator {
    pub params: GraphParams,
}

impl GraphGenerator {
    pub fn new(params: GraphParams) -> Self {
        Self { params }
    }

    /// Runs a single attempt with `seed`.
    ///
    /// Lock/key ids allocated by a failed attempt are returned to the counter
    /// so a restart never carries state over from the discarded attempt.
    pub fn try_generate(
        &self,
        seed: u64,
        ids: &mut IdCounter,
    ) -> Result<AbstractGraph, GraphFailure> {
        let checkpoint = ids.clone();
        match GraphBuilder::new(&self.params, seed).run(ids) {
            Ok((mut nodes, order)) => {
                let nodes = order.iter().filter_map(|pos| nodes.remove(pos)).collect();
                Ok(AbstractGraph::from_nodes(&self.params, seed, nodes))
            }
            Err(reason) => {
                *ids = checkpoint;
                Err(reason)
            }
        }
    }
}

impl Generator<AbstractGraph> for GraphGenerator {
    fn generate(&self, ctx: &mut GenerationContext, seed: u64) -> WeaveResult<AbstractGraph> {
        self.params.validate()?;
        let mut attempts: u32 = 0;
        loop {
            let attempt_seed = seed.wrapping_add(attempts as u64);
            attempts += 1;
            match self.try_generate(attempt_seed, &mut ctx.lock_ids) {
                Ok(mut graph) => {
                    graph.attempts = attempts;
                    debug!(
                        "graph: {} nodes after {} attempts (seed {})",
                        graph.len(),
                        attempts,
                        attempt_seed
                    );
                    return Ok(graph);
                }
                Err(reason) => {
                    trace!("graph attempt with seed {} failed: {}", attempt_seed, reason)
                }
            }
            ctx.check_attempts(self.generator_type(), attempts)?;
        }
    }

    fn validate(&self, graph: &AbstractGraph) -> WeaveResult<()> {
        graph.check_invariants().map_err(WeaveError::GenerationFailed)
    }

    fn generator_type(&self) -> &'static str {
        "GraphGenerator"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corridor_params() -> GraphParams {
        GraphParams {
            width: 2,
            height: 1,
            goals: vec![Position::new(0, 0), Position::new(1, 0)],
            num_security_levels: 1,
            tiles_per_security_level: 1,
            branch_limit_per_level: 0,
            directness: 1,
            branch_chance_percent: 0,
        }
    }

    fn gated_params() -> GraphParams {
        GraphParams {
            width: 7,
            height: 7,
            goals: vec![Position::new(0, 3), Position::new(6, 3)],
            num_security_levels: 3,
            tiles_per_security_level: 6,
            branch_limit_per_level: 3,
            directness: 2,
            branch_chance_percent: 50,
        }
    }

    #[test]
    fn test_single_edge_corridor() {
        let generator = GraphGenerator::new(corridor_params());
        let mut ids = IdCounter::new();
        let graph = generator.try_generate(1, &mut ids).unwrap();

        assert_eq!(graph.len(), 2);
        let a = graph.get(Position::new(0, 0)).unwrap();
        let b = graph.get(Position::new(1, 0)).unwrap();
        assert_eq!(a.links.get(&b.position), Some(&OPEN_PASSAGE));
        assert_eq!(b.links.get(&a.position), Some(&OPEN_PASSAGE));
        assert_eq!(a.security_level, 0);
        assert_eq!(b.security_level, 0);
        assert!(graph.lock_edges().is_empty());
        assert_eq!(ids.peek(), 1);
    }

    #[test]
    fn test_one_tile_levels_put_key_and_lock_on_one_branch() {
        let params = GraphParams {
            width: 5,
            height: 1,
            goals: vec![Position::new(2, 0)],
            num_security_levels: 2,
            tiles_per_security_level: 1,
            branch_limit_per_level: 1,
            directness: 0,
            branch_chance_percent: 100,
        };
        let generator = GraphGenerator::new(params);
        let mut ids = IdCounter::new();

        // From the lone start node the key is the first link (start's branch)
        // and the lock is the second, so the pair always shares a branch.
        let result = generator.try_generate(1, &mut ids);
        assert_eq!(
            result,
            Err(GraphFailure::KeySharesLockBranch { key: 1, branch: 0 })
        );
        // The failed attempt's id is rolled back.
        assert_eq!(ids.peek(), 1);

        let mut ctx = GenerationContext::new(Some(5));
        assert!(matches!(
            generator.generate(&mut ctx, 1),
            Err(WeaveError::AttemptsExhausted { attempts: 5, .. })
        ));
    }

    #[test]
    fn test_missing_branch_leaves_level_unmet() {
        let params = GraphParams {
            width: 5,
            height: 1,
            goals: vec![Position::new(0, 0)],
            num_security_levels: 2,
            tiles_per_security_level: 2,
            branch_limit_per_level: 0,
            directness: 0,
            branch_chance_percent: 0,
        };
        let generator = GraphGenerator::new(params);
        let mut ids = IdCounter::new();
        // A single chain dead-ends on its key, so level 1 is never entered.
        assert_eq!(
            generator.try_generate(3, &mut ids),
            Err(GraphFailure::SecurityLevelsUnmet { reached: 1, required: 2 })
        );
    }

    #[test]
    fn test_gated_graph_invariants() {
        let generator = GraphGenerator::new(gated_params());
        let mut ctx = GenerationContext::new(Some(50_000));
        let graph = generator.generate(&mut ctx, 11).unwrap();

        assert!(generator.validate(&graph).is_ok());
        assert_eq!(graph.lock_edges().len(), 2);
        assert_eq!(graph.key_nodes().len(), 2);
        assert!(graph.contains(Position::new(6, 3)));
        assert!(graph.is_solvable());
        let max_level = graph.nodes().map(|n| n.security_level).max();
        assert_eq!(max_level, Some(2));
    }

    #[test]
    fn test_generation_is_deterministic() {
        let generator = GraphGenerator::new(gated_params());
        let mut ctx_a = GenerationContext::new(Some(50_000));
        let mut ctx_b = GenerationContext::new(Some(50_000));
        let a = generator.generate(&mut ctx_a, 77).unwrap();
        let b = generator.generate(&mut ctx_b, 77).unwrap();
        assert_eq!(a, b);
        assert_eq!(ctx_a.lock_ids, ctx_b.lock_ids);
    }

    #[test]
    fn test_ids_continue_across_graphs() {
        let generator = GraphGenerator::new(gated_params());
        let mut ctx = GenerationContext::new(Some(50_000));
        let first = generator.generate(&mut ctx, 5).unwrap();
        let second = generator.generate(&mut ctx, 6).unwrap();
        let first_ids: BTreeSet<LockId> = first.lock_edges().iter().map(|e| e.2).collect();
        let second_ids: BTreeSet<LockId> = second.lock_edges().iter().map(|e| e.2).collect();
        assert!(first_ids.is_disjoint(&second_ids));
    }

    #[test]
    fn test_ancestry_ends_at_start() {
        let generator = GraphGenerator::new(gated_params());
        let mut ctx = GenerationContext::new(Some(50_000));
        let graph = generator.generate(&mut ctx, 21).unwrap();
        for node in graph.nodes() {
            let chain = graph.ancestry(node.position);
            assert_eq!(chain.first(), Some(&node.position));
            assert_eq!(chain.last(), Some(&graph.start()));
        }
    }

    #[test]
    fn test_params_validation() {
        let mut params = corridor_params();
        params.goals.push(Position::new(5, 5));
        assert!(params.validate().is_err());

        let mut params = corridor_params();
        params.goals.clear();
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_toward_goal_prefers_larger_axis() {
        let params = GraphParams {
            width: 10,
            height: 10,
            goals: vec![Position::new(0, 0), Position::new(2, 7)],
            ..corridor_params()
        };
        let builder = GraphBuilder::new(&params, 0);
        assert_eq!(builder.toward_nearest_goal(Position::new(0, 0)), Some(Direction::South));
        assert_eq!(builder.toward_nearest_goal(Position::new(2, 9)), Some(Direction::North));
        assert_eq!(builder.toward_nearest_goal(Position::new(0, 5)), Some(Direction::East));
    }
}
