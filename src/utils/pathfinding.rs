//! # Graph Search Helpers
//!
//! Reachability, hop distances, and depth-limited flood fills over any
//! successor function, built on the `pathfinding` crate.

use pathfinding::prelude::{bfs_reach, dijkstra_all};
use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::Hash;

/// Every node reachable from `start`, including `start`.
pub fn reachable<N, FN, IN>(start: N, successors: FN) -> HashSet<N>
where
    N: Eq + Hash + Clone,
    FN: FnMut(&N) -> IN,
    IN: IntoIterator<Item = N>,
{
    bfs_reach(start, successors).collect()
}

/// Hop distance from `start` to every reachable node, `start` at 0.
pub fn hop_distances<N, FN, IN>(start: &N, mut successors: FN) -> HashMap<N, u32>
where
    N: Eq + Hash + Clone,
    FN: FnMut(&N) -> IN,
    IN: IntoIterator<Item = N>,
{
    let mut distances: HashMap<N, u32> = dijkstra_all(start, |node| {
        successors(node).into_iter().map(|next| (next, 1u32)).collect::<Vec<_>>()
    })
    .into_iter()
    .map(|(node, (_, cost))| (node, cost))
    .collect();
    distances.insert(start.clone(), 0);
    distances
}

/// Breadth-first flood fill from `start` limited to `max_depth` hops.
///
/// Nodes are returned in visit order, `start` first.
pub fn flood_within<N, FN, IN>(start: N, max_depth: u32, mut successors: FN) -> Vec<N>
where
    N: Eq + Hash + Clone,
    FN: FnMut(&N) -> IN,
    IN: IntoIterator<Item = N>,
{
    let mut seen = HashSet::from([start.clone()]);
    let mut order = vec![start.clone()];
    let mut queue = VecDeque::from([(start, 0u32)]);
    while let Some((node, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        for next in successors(&node) {
            if seen.insert(next.clone()) {
                order.push(next.clone());
                queue.push_back((next, depth + 1));
            }
        }
    }
    order
}
