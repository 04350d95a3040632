//! # Pattern Templates
//!
//! Rotation-aware replacer templates used to expand one abstract node into a
//! block of concrete cells.
//!
//! Every template is declared in its canonical orientation for a join type
//! and rotated clockwise to fit the node's actual edge set. Templates are
//! loaded into an enum-indexed [`PatternTable`] and validated once, so the
//! expansion loop never sees a pattern that could drop an edge.

use crate::catalog::{tileset_lineage, DataCatalog};
use crate::{Direction, Position, WeaveError, WeaveResult};
use std::collections::{BTreeSet, VecDeque};

/// Topological class of a node's edge configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JoinType {
    /// No edges or a single dead-end edge; canonical opening north
    N,
    /// Two opposite edges; canonical north and south
    I,
    /// Two adjacent edges; canonical north and east
    L,
    /// Three edges; canonical opening everywhere but west
    T,
    /// All four edges
    H,
}

impl JoinType {
    pub const ALL: [JoinType; 5] = [
        JoinType::N,
        JoinType::I,
        JoinType::L,
        JoinType::T,
        JoinType::H,
    ];

    pub fn index(self) -> usize {
        match self {
            JoinType::N => 0,
            JoinType::I => 1,
            JoinType::L => 2,
            JoinType::T => 3,
            JoinType::H => 4,
        }
    }

    /// Catalog key suffix.
    pub fn key(self) -> &'static str {
        match self {
            JoinType::N => "N",
            JoinType::I => "I",
            JoinType::L => "L",
            JoinType::T => "T",
            JoinType::H => "H",
        }
    }

    /// Open sides in canonical orientation.
    pub fn canonical_sides(self) -> &'static [Direction] {
        use Direction::*;
        match self {
            JoinType::N => &[North],
            JoinType::I => &[North, South],
            JoinType::L => &[North, East],
            JoinType::T => &[North, East, South],
            JoinType::H => &[North, East, South, West],
        }
    }

    /// Classifies a set of used edge directions into a join type and the
    /// number of clockwise quarter turns from its canonical orientation.
    ///
    /// # Examples
    ///
    /// ```
    /// use worldweave::Direction;
    /// use worldweave::generation::JoinType;
    ///
    /// assert_eq!(JoinType::classify(&[Direction::East, Direction::West]), (JoinType::I, 1));
    /// assert_eq!(JoinType::classify(&[Direction::West, Direction::North]), (JoinType::L, 3));
    /// ```
    pub fn classify(directions: &[Direction]) -> (JoinType, u8) {
        let used: BTreeSet<usize> = directions.iter().map(|dir| dir.index()).collect();
        if used.is_empty() {
            return (JoinType::N, 0);
        }
        for join in JoinType::ALL {
            if join.canonical_sides().len() != used.len() {
                continue;
            }
            for turns in 0..4u8 {
                let rotated: BTreeSet<usize> = join
                    .canonical_sides()
                    .iter()
                    .map(|dir| dir.rotated_cw(turns).index())
                    .collect();
                if rotated == used {
                    return (join, turns);
                }
            }
        }
        (JoinType::H, 0)
    }
}

/// Which of the two expansion passes a template belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpansionPass {
    /// Abstract graph to intermediate cells
    Inner,
    /// Intermediate cells to final tiles
    Outer,
}

impl ExpansionPass {
    pub fn key(self) -> &'static str {
        match self {
            ExpansionPass::Inner => "inner",
            ExpansionPass::Outer => "outer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cell {
    Absent,
    Present,
    /// Present and designated to hold a payload
    Center,
}

/// A square grid of template cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    size: usize,
    cells: Vec<Vec<Cell>>,
}

impl Pattern {
    /// Parses rows separated by `/`: `#` present, `*` present centre,
    /// `.` absent.
    pub fn parse(text: &str) -> WeaveResult<Self> {
        let cells = text
            .split('/')
            .map(|row| {
                row.trim()
                    .chars()
                    .map(|ch| match ch {
                        '#' => Ok(Cell::Present),
                        '*' => Ok(Cell::Center),
                        '.' => Ok(Cell::Absent),
                        other => Err(WeaveError::InvalidPattern(format!(
                            "unexpected '{}' in pattern '{}'",
                            other, text
                        ))),
                    })
                    .collect::<WeaveResult<Vec<_>>>()
            })
            .collect::<WeaveResult<Vec<_>>>()?;
        let size = cells.len();
        if cells.iter().any(|row| row.len() != size) {
            return Err(WeaveError::InvalidPattern(format!("pattern '{}' is not square", text)));
        }
        Ok(Self { size, cells })
    }

    /// A pattern with no cells, used when expansion gives up on a node.
    pub fn null(size: usize) -> Self {
        Self {
            size,
            cells: vec![vec![Cell::Absent; size]; size],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_present(&self, x: usize, y: usize) -> bool {
        self.cells
            .get(y)
            .and_then(|row| row.get(x))
            .is_some_and(|cell| *cell != Cell::Absent)
    }

    /// Designated centre cell, if the template has one.
    pub fn center(&self) -> Option<(usize, usize)> {
        self.present_cells()
            .into_iter()
            .find(|&(x, y)| self.cells[y][x] == Cell::Center)
    }

    /// Present cells in row-major order.
    pub fn present_cells(&self) -> Vec<(usize, usize)> {
        let mut cells = Vec::new();
        for (y, row) in self.cells.iter().enumerate() {
            for (x, cell) in row.iter().enumerate() {
                if *cell != Cell::Absent {
                    cells.push((x, y));
                }
            }
        }
        cells
    }

    /// Present cells on the border facing `side`.
    pub fn border_cells(&self, side: Direction) -> Vec<(usize, usize)> {
        let last = self.size.saturating_sub(1);
        (0..self.size)
            .map(|i| match side {
                Direction::North => (i, 0),
                Direction::South => (i, last),
                Direction::West => (0, i),
                Direction::East => (last, i),
            })
            .filter(|&(x, y)| self.is_present(x, y))
            .collect()
    }

    /// Rotates clockwise by `quarter_turns`.
    pub fn rotated(&self, quarter_turns: u8) -> Self {
        let mut pattern = self.clone();
        for _ in 0..quarter_turns % 4 {
            pattern = pattern.rotated_once();
        }
        pattern
    }

    fn rotated_once(&self) -> Self {
        let s = self.size;
        let mut cells = vec![vec![Cell::Absent; s]; s];
        for (y, row) in cells.iter_mut().enumerate() {
            for (x, cell) in row.iter_mut().enumerate() {
                *cell = self.cells[s - 1 - x][y];
            }
        }
        Self { size: s, cells }
    }

    /// Load-time checks: odd size equal to the pass scale, a middle border
    /// cell on every canonical open side, at most one centre marker sitting
    /// in the middle, and all present cells connected.
    pub fn validate_for(&self, join: JoinType, scale: usize) -> WeaveResult<()> {
        let fail = |reason: String| {
            Err(WeaveError::InvalidPattern(format!("{}-pattern {}", join.key(), reason)))
        };
        if self.size != scale {
            return fail(format!("is {} wide but the pass scale is {}", self.size, scale));
        }
        if self.size % 2 == 0 {
            return fail(format!("has even size {}", self.size));
        }
        let mid = self.size / 2;
        let last = self.size - 1;
        for side in join.canonical_sides() {
            let (x, y) = match side {
                Direction::North => (mid, 0),
                Direction::South => (mid, last),
                Direction::West => (0, mid),
                Direction::East => (last, mid),
            };
            if !self.is_present(x, y) {
                return fail(format!("is closed on its {:?} side", side));
            }
        }
        let centers: Vec<(usize, usize)> = self
            .present_cells()
            .into_iter()
            .filter(|&(x, y)| self.cells[y][x] == Cell::Center)
            .collect();
        if centers.len() > 1 || centers.first().is_some_and(|&c| c != (mid, mid)) {
            return fail("marks a centre off the middle cell".to_string());
        }
        if !self.is_connected() {
            return fail("has disconnected cells".to_string());
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        let present = self.present_cells();
        let Some(&first) = present.first() else {
            return true;
        };
        let cells: BTreeSet<Position> = present
            .iter()
            .map(|&(x, y)| Position::new(x as i32, y as i32))
            .collect();
        let start = Position::new(first.0 as i32, first.1 as i32);
        let mut seen = BTreeSet::from([start]);
        let mut queue = VecDeque::from([start]);
        while let Some(pos) = queue.pop_front() {
            for next in pos.cardinal_adjacent_positions() {
                if cells.contains(&next) && seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        seen.len() == cells.len()
    }
}

/// Templates for one tileset, indexed by pass and join type.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternTable {
    pub tileset: String,
    inner: [Vec<Pattern>; 5],
    outer: [Vec<Pattern>; 5],
    inner_scale: usize,
    outer_scale: usize,
}

impl PatternTable {
    /// Loads and validates every template reachable for `tileset`.
    ///
    /// Each `<pass>.<join>` key is resolved along the tileset's inheritance
    /// chain; the first tileset declaring it wins.
    pub fn load(
        catalog: &dyn DataCatalog,
        tileset: &str,
        inner_scale: usize,
        outer_scale: usize,
    ) -> WeaveResult<Self> {
        let lineage = tileset_lineage(catalog, tileset);
        let mut table = Self {
            tileset: tileset.to_string(),
            inner: Default::default(),
            outer: Default::default(),
            inner_scale,
            outer_scale,
        };
        for pass in [ExpansionPass::Inner, ExpansionPass::Outer] {
            let scale = table.scale(pass);
            for join in JoinType::ALL {
                let key = format!("{}.{}", pass.key(), join.key());
                let rows = lineage
                    .iter()
                    .find_map(|name| catalog.get_array_value("tilesets", name, &key))
                    .ok_or_else(|| {
                        WeaveError::InvalidPattern(format!(
                            "tileset '{}' has no '{}' templates",
                            tileset, key
                        ))
                    })?;
                let patterns = rows
                    .iter()
                    .map(|text| {
                        let pattern = Pattern::parse(text)?;
                        pattern.validate_for(join, scale)?;
                        Ok(pattern)
                    })
                    .collect::<WeaveResult<Vec<_>>>()?;
                if patterns.is_empty() {
                    return Err(WeaveError::InvalidPattern(format!(
                        "tileset '{}' declares no '{}' templates",
                        tileset, key
                    )));
                }
                table.slot_mut(pass)[join.index()] = patterns;
            }
        }
        log::debug!("Loaded pattern table for tileset '{}' ({:?})", tileset, lineage);
        Ok(table)
    }

    pub fn scale(&self, pass: ExpansionPass) -> usize {
        match pass {
            ExpansionPass::Inner => self.inner_scale,
            ExpansionPass::Outer => self.outer_scale,
        }
    }

    /// Canonical templates registered for a join type.
    pub fn patterns(&self, pass: ExpansionPass, join: JoinType) -> &[Pattern] {
        match pass {
            ExpansionPass::Inner => &self.inner[join.index()],
            ExpansionPass::Outer => &self.outer[join.index()],
        }
    }

    fn slot_mut(&mut self, pass: ExpansionPass) -> &mut [Vec<Pattern>; 5] {
        match pass {
            ExpansionPass::Inner => &mut self.inner,
            ExpansionPass::Outer => &mut self.outer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JsonCatalog;
    use Direction::*;

    #[test]
    fn test_classify_rotations() {
        assert_eq!(JoinType::classify(&[]), (JoinType::N, 0));
        assert_eq!(JoinType::classify(&[North]), (JoinType::N, 0));
        assert_eq!(JoinType::classify(&[East]), (JoinType::N, 1));
        assert_eq!(JoinType::classify(&[South]), (JoinType::N, 2));
        assert_eq!(JoinType::classify(&[West]), (JoinType::N, 3));
        assert_eq!(JoinType::classify(&[North, South]), (JoinType::I, 0));
        assert_eq!(JoinType::classify(&[West, East]), (JoinType::I, 1));
        assert_eq!(JoinType::classify(&[North, East]), (JoinType::L, 0));
        assert_eq!(JoinType::classify(&[East, South]), (JoinType::L, 1));
        assert_eq!(JoinType::classify(&[South, West]), (JoinType::L, 2));
        assert_eq!(JoinType::classify(&[North, East, South]), (JoinType::T, 0));
        assert_eq!(JoinType::classify(&[East, South, West]), (JoinType::T, 1));
        assert_eq!(JoinType::classify(&[North, South, West]), (JoinType::T, 2));
        assert_eq!(JoinType::classify(&[North, East, West]), (JoinType::T, 3));
        assert_eq!(JoinType::classify(&[North, East, South, West]), (JoinType::H, 0));
    }

    #[test]
    fn test_rotation_moves_openings_clockwise() {
        let pattern = Pattern::parse(".#./.*./...").unwrap();
        let east = pattern.rotated(1);
        assert!(east.is_present(2, 1));
        assert!(!east.is_present(1, 0));
        assert_eq!(east.center(), Some((1, 1)));
        assert_eq!(pattern.rotated(4), pattern);

        let corner = Pattern::parse("#../.../...").unwrap();
        assert!(corner.rotated(1).is_present(2, 0));
        assert!(corner.rotated(2).is_present(2, 2));
        assert!(corner.rotated(3).is_present(0, 2));
    }

    #[test]
    fn test_border_cells() {
        let pattern = Pattern::parse("##./.*#/.##").unwrap();
        assert_eq!(pattern.border_cells(North), vec![(0, 0), (1, 0)]);
        assert_eq!(pattern.border_cells(East), vec![(2, 1), (2, 2)]);
        assert_eq!(pattern.border_cells(West), vec![(0, 0)]);
    }

    #[test]
    fn test_validation_rejects_bad_templates() {
        assert!(Pattern::parse("##/##").unwrap().validate_for(JoinType::H, 2).is_err());
        assert!(Pattern::parse("...#/.*./...").is_err());
        assert!(Pattern::parse(".x./.*./...").is_err());
        // open north side required
        assert!(Pattern::parse("#../.*./...").unwrap().validate_for(JoinType::N, 3).is_err());
        // wrong scale
        assert!(Pattern::parse(".#./.*./...").unwrap().validate_for(JoinType::N, 5).is_err());
        // disconnected
        assert!(Pattern::parse(".#./..../#..").is_err());
        assert!(Pattern::parse(".#./.../#..").unwrap().validate_for(JoinType::N, 3).is_err());
        // centre off the middle
        assert!(Pattern::parse(".*./.#./...").unwrap().validate_for(JoinType::N, 3).is_err());
        assert!(Pattern::parse(".#./.*./...").unwrap().validate_for(JoinType::N, 3).is_ok());
    }

    #[test]
    fn test_table_resolves_inheritance() {
        let catalog = JsonCatalog::builtin().unwrap();
        let stone = PatternTable::load(&catalog, "stone", 3, 3).unwrap();
        let default = PatternTable::load(&catalog, "default", 3, 3).unwrap();
        assert_eq!(stone.patterns(ExpansionPass::Inner, JoinType::H).len(), 1);
        assert_eq!(
            stone.patterns(ExpansionPass::Outer, JoinType::T),
            default.patterns(ExpansionPass::Outer, JoinType::T)
        );
        assert!(PatternTable::load(&catalog, "stone", 5, 3).is_err());
    }

    #[test]
    fn test_builtin_templates_all_hold_payloads() {
        let catalog = JsonCatalog::builtin().unwrap();
        for tileset in catalog.get_entries("tilesets") {
            let table = PatternTable::load(&catalog, &tileset, 3, 3).unwrap();
            for pass in [ExpansionPass::Inner, ExpansionPass::Outer] {
                for join in JoinType::ALL {
                    for pattern in table.patterns(pass, join) {
                        assert_eq!(pattern.center(), Some((1, 1)), "{} {:?}", tileset, join);
                    }
                }
            }
        }
    }
}
