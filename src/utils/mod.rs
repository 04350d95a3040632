//! # Utilities Module
//!
//! Interpolation math and graph-search helpers shared by the generators.

pub mod math;
pub mod pathfinding;

pub use math::*;
pub use pathfinding::*;
