//! # Game Module
//!
//! Core spatial types and the world data model produced by generation.
//!
//! This module contains the fundamental building blocks shared by every
//! generation phase:
//! - Grid positions and cardinal directions
//! - The lock/key id counter shared across a whole generation run
//! - Region, dungeon tile, creature, and item structures (see [`world`])

pub mod world;

pub use world::*;

use serde::{Deserialize, Serialize};

/// Represents a 2D coordinate on a generation grid.
///
/// The same type is used at every scale: overworld cells, abstract dungeon
/// cells, and final tiles. `y` grows southward.
///
/// # Examples
///
/// ```
/// use worldweave::Position;
///
/// let pos = Position::new(10, 5);
/// assert_eq!(pos.x, 10);
/// assert_eq!(pos.y, 5);
///
/// let adjacent = pos.cardinal_adjacent_positions();
/// assert_eq!(adjacent.len(), 4);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    /// Creates a new position with the given coordinates.
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Returns the origin position (0, 0).
    pub fn origin() -> Self {
        Self::new(0, 0)
    }

    /// Calculates the Manhattan distance to another position.
    ///
    /// # Examples
    ///
    /// ```
    /// use worldweave::Position;
    ///
    /// let pos1 = Position::new(0, 0);
    /// let pos2 = Position::new(3, 4);
    /// assert_eq!(pos1.manhattan_distance(pos2), 7);
    /// ```
    pub fn manhattan_distance(self, other: Position) -> u32 {
        ((self.x - other.x).abs() + (self.y - other.y).abs()) as u32
    }

    /// Calculates the Euclidean distance to another position.
    pub fn euclidean_distance(self, other: Position) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }

    /// Returns the neighbouring position one step in `direction`.
    pub fn step(self, direction: Direction) -> Position {
        self + direction.to_delta()
    }

    /// Returns the 4 cardinal adjacent positions in N, E, S, W order.
    pub fn cardinal_adjacent_positions(self) -> Vec<Position> {
        Direction::ALL.iter().map(|&dir| self.step(dir)).collect()
    }

    /// Scales a coarse grid position into the top-left cell of its block on a
    /// grid `factor` times finer.
    pub fn scaled(self, factor: i32) -> Position {
        Position::new(self.x * factor, self.y * factor)
    }

    /// Checks whether the position lies within a `width` x `height` grid
    /// anchored at the origin.
    pub fn in_bounds(self, width: i32, height: i32) -> bool {
        self.x >= 0 && self.y >= 0 && self.x < width && self.y < height
    }
}

impl std::ops::Add for Position {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y)
    }
}

impl std::ops::Sub for Position {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y)
    }
}

/// Cardinal directions used for links between grid cells.
///
/// The discriminant order (N, E, S, W) is clockwise, which is what pattern
/// rotation relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    /// All four directions in clockwise order starting at north.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// Converts a direction to a position delta.
    ///
    /// # Examples
    ///
    /// ```
    /// use worldweave::{Direction, Position};
    ///
    /// let delta = Direction::North.to_delta();
    /// assert_eq!(delta, Position::new(0, -1));
    /// ```
    pub fn to_delta(self) -> Position {
        match self {
            Direction::North => Position::new(0, -1),
            Direction::East => Position::new(1, 0),
            Direction::South => Position::new(0, 1),
            Direction::West => Position::new(-1, 0),
        }
    }

    /// Converts a position delta to a direction.
    ///
    /// Returns None if the delta is not a single cardinal step.
    pub fn from_delta(delta: Position) -> Option<Direction> {
        match (delta.x, delta.y) {
            (0, -1) => Some(Direction::North),
            (1, 0) => Some(Direction::East),
            (0, 1) => Some(Direction::South),
            (-1, 0) => Some(Direction::West),
            _ => None,
        }
    }

    /// Returns the direction pointing the other way.
    pub fn opposite(self) -> Direction {
        self.rotated_cw(2)
    }

    /// Index in clockwise order (north = 0).
    pub fn index(self) -> usize {
        match self {
            Direction::North => 0,
            Direction::East => 1,
            Direction::South => 2,
            Direction::West => 3,
        }
    }

    /// Rotates the direction clockwise by `quarter_turns` quarter turns.
    ///
    /// # Examples
    ///
    /// ```
    /// use worldweave::Direction;
    ///
    /// assert_eq!(Direction::North.rotated_cw(1), Direction::East);
    /// assert_eq!(Direction::West.rotated_cw(2), Direction::East);
    /// ```
    pub fn rotated_cw(self, quarter_turns: u8) -> Direction {
        Direction::ALL[(self.index() + quarter_turns as usize) % 4]
    }
}

/// Shared id for a lock on an edge and the key that opens it.
///
/// `0` means an open passage (or, on a node, no key).
pub type LockId = u32;

/// The lock id of an open passage.
pub const OPEN_PASSAGE: LockId = 0;

/// Monotonic id allocator scoped to one generation run.
///
/// Lock/key pairs and encounters each draw from their own counter. A counter
/// is threaded through the generation call chain by mutable reference so
/// the overworld and every dungeon share one id space and ids never collide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdCounter {
    next: u32,
}

impl IdCounter {
    /// Creates a counter whose first allocated id is 1.
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Allocates the next id.
    pub fn allocate(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        id
    }

    /// Returns the id the next call to [`IdCounter::allocate`] will hand out.
    pub fn peek(&self) -> u32 {
        self.next
    }
}

impl Default for IdCounter {
    fn default() -> Self {
        Self::new()
    }
}
