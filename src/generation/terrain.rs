//! # Terrain Elevation
//!
//! Cellular-automaton smoothing over a random boolean field, followed by
//! per-tile elevation tagging from tileset probabilities and Perlin noise.

use crate::catalog::TilesetDef;
use crate::generation::SeededStream;
use crate::{Elevation, Position};
use log::trace;
use noise::{NoiseFn, Perlin};

/// Sampling frequency of the noise field, in cycles per tile.
const NOISE_FREQUENCY: f64 = 0.15;

/// Cells (of the 3x3 neighborhood, self included) that must be set for a
/// cell to stay set.
const MAJORITY: usize = 5;

/// A boolean field smoothed by a majority rule. Border cells are always
/// unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellularField {
    width: usize,
    height: usize,
    cells: Vec<bool>,
}

impl CellularField {
    /// Seeds a field where each interior cell is set with `fill_percent`
    /// chance.
    pub fn random(
        width: usize,
        height: usize,
        fill_percent: u32,
        stream: &mut SeededStream,
    ) -> Self {
        let mut field = Self {
            width,
            height,
            cells: vec![false; width * height],
        };
        for y in 0..height {
            for x in 0..width {
                let roll = stream.chance(fill_percent);
                if !field.is_border(x, y) {
                    field.cells[y * width + x] = roll;
                }
            }
        }
        field
    }

    fn is_border(&self, x: usize, y: usize) -> bool {
        x == 0 || y == 0 || x + 1 >= self.width || y + 1 >= self.height
    }

    pub fn get(&self, x: i32, y: i32) -> bool {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return false;
        }
        self.cells[y as usize * self.width + x as usize]
    }

    pub fn filled(&self) -> usize {
        self.cells.iter().filter(|&&cell| cell).count()
    }

    /// Applies `steps` rounds of the majority rule.
    pub fn smooth(&mut self, steps: u32) {
        for _ in 0..steps {
            let mut next = vec![false; self.cells.len()];
            for y in 0..self.height {
                for x in 0..self.width {
                    if self.is_border(x, y) {
                        continue;
                    }
                    let mut count = 0;
                    for dy in -1..=1 {
                        for dx in -1..=1 {
                            if self.get(x as i32 + dx, y as i32 + dy) {
                                count += 1;
                            }
                        }
                    }
                    next[y * self.width + x] = count >= MAJORITY;
                }
            }
            self.cells = next;
        }
    }
}

/// Assigns an elevation tag to every position in `tiles`.
///
/// A tile inside the smoothed field is raised with the tileset's cellular
/// chance; failing that it is raised with the base chance; failing that it
/// is sunken where the noise field falls under the noise threshold.
pub fn tag_elevation<'a>(
    tiles: impl Iterator<Item = (Position, &'a mut Elevation)>,
    field: &CellularField,
    tileset: &TilesetDef,
    stream: &mut SeededStream,
) {
    let perlin = Perlin::new(stream.fork() as u32);
    let mut raised = 0;
    for (pos, elevation) in tiles {
        *elevation = if field.get(pos.x, pos.y) && stream.chance(tileset.elevation_cellular) {
            Elevation::High
        } else if stream.chance(tileset.elevation_base) {
            Elevation::High
        } else {
            let sample = perlin.get([
                pos.x as f64 * NOISE_FREQUENCY,
                pos.y as f64 * NOISE_FREQUENCY,
            ]);
            let percent = (sample.clamp(-1.0, 1.0) + 1.0) * 50.0;
            if percent < tileset.elevation_noise as f64 {
                Elevation::Low
            } else {
                Elevation::Ground
            }
        };
        if *elevation == Elevation::High {
            raised += 1;
        }
    }
    trace!("terrain: {} tiles raised for tileset '{}'", raised, tileset.name);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tileset(base: u32, noise: u32, cellular: u32) -> TilesetDef {
        TilesetDef {
            name: "test".to_string(),
            lineage: vec!["test".to_string()],
            elevation_base: base,
            elevation_noise: noise,
            elevation_cellular: cellular,
        }
    }

    #[test]
    fn test_borders_stay_unset() {
        let mut stream = SeededStream::new(1);
        let mut field = CellularField::random(12, 9, 100, &mut stream);
        assert_eq!(field.filled(), 10 * 7);
        field.smooth(5);
        for x in 0..12 {
            assert!(!field.get(x, 0));
            assert!(!field.get(x, 8));
        }
        for y in 0..9 {
            assert!(!field.get(0, y));
            assert!(!field.get(11, y));
        }
        // the solid interior erodes only along its rim
        assert!(field.get(5, 4));
    }

    #[test]
    fn test_smoothing_removes_isolated_cells() {
        let mut field = CellularField {
            width: 5,
            height: 5,
            cells: vec![false; 25],
        };
        field.cells[2 * 5 + 2] = true;
        field.smooth(1);
        assert_eq!(field.filled(), 0);
    }

    #[test]
    fn test_elevation_extremes() {
        let mut stream = SeededStream::new(2);
        let field = CellularField::random(6, 6, 0, &mut stream);
        let mut tags = vec![Elevation::Ground; 36];
        let positions: Vec<Position> = (0..36).map(|i| Position::new(i % 6, i / 6)).collect();

        tag_elevation(
            positions.iter().copied().zip(tags.iter_mut()),
            &field,
            &tileset(100, 0, 0),
            &mut stream,
        );
        assert!(tags.iter().all(|&e| e == Elevation::High));

        tag_elevation(
            positions.iter().copied().zip(tags.iter_mut()),
            &field,
            &tileset(0, 0, 100),
            &mut stream,
        );
        assert!(tags.iter().all(|&e| e == Elevation::Ground));

        tag_elevation(
            positions.iter().copied().zip(tags.iter_mut()),
            &field,
            &tileset(0, 100, 0),
            &mut stream,
        );
        assert!(tags.iter().all(|&e| e == Elevation::Low));
    }

    #[test]
    fn test_field_is_deterministic() {
        let a = CellularField::random(20, 20, 45, &mut SeededStream::new(9));
        let b = CellularField::random(20, 20, 45, &mut SeededStream::new(9));
        assert_eq!(a, b);
    }
}
