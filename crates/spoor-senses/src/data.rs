use std::fmt;

use spoor_geom::{Direction, Point, Rect};

use crate::definition::MAX_SIGNAL_RADIUS;

const DIRECTION_BITS: u8 = 0x0F;
const OBSTRUCTED: u8 = 0x40;
const SELF_ILLUMINATING: u8 = 0x80;

/// Packed direction of arrival plus cell flags.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SenseDirectionStore(u8);

impl SenseDirectionStore {
    pub const EMPTY: SenseDirectionStore = SenseDirectionStore(0);

    #[inline]
    pub fn new(dir: Direction) -> Self {
        Self(dir as u8 & DIRECTION_BITS)
    }

    #[inline]
    pub const fn from_raw(raw: u8) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u8 {
        self.0
    }

    #[inline]
    pub fn with_obstructed(self, on: bool) -> Self {
        if on { Self(self.0 | OBSTRUCTED) } else { Self(self.0 & !OBSTRUCTED) }
    }

    #[inline]
    pub fn with_self_illuminating(self, on: bool) -> Self {
        if on {
            Self(self.0 | SELF_ILLUMINATING)
        } else {
            Self(self.0 & !SELF_ILLUMINATING)
        }
    }

    #[inline]
    pub fn direction(self) -> Direction {
        Direction::from_index(self.0 & DIRECTION_BITS)
    }

    #[inline]
    pub fn is_obstructed(self) -> bool {
        self.0 & OBSTRUCTED != 0
    }

    #[inline]
    pub fn is_self_illuminating(self) -> bool {
        self.0 & SELF_ILLUMINATING != 0
    }
}

impl fmt::Debug for SenseDirectionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SenseDirectionStore")
            .field("direction", &self.direction())
            .field("obstructed", &self.is_obstructed())
            .field("self_illuminating", &self.is_self_illuminating())
            .finish()
    }
}

/// Index math of a `(2r+1)²` grid centered on the origin. The radius is
/// clamped to [`MAX_SIGNAL_RADIUS`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LocalGrid {
    radius: i32,
    side: i32,
}

impl LocalGrid {
    #[inline]
    pub fn new(radius: i32) -> Self {
        let radius = radius.clamp(0, MAX_SIGNAL_RADIUS);
        Self {
            radius,
            side: 2 * radius + 1,
        }
    }

    #[inline]
    pub fn radius(&self) -> i32 {
        self.radius
    }

    #[inline]
    pub fn side(&self) -> i32 {
        self.side
    }

    #[inline]
    pub fn len(&self) -> usize {
        let side = self.side as usize;
        side * side
    }

    #[inline]
    pub fn center(&self) -> usize {
        let (r, side) = (self.radius as usize, self.side as usize);
        r * side + r
    }

    #[inline]
    pub fn index_of(&self, offset: Point) -> Option<usize> {
        let x = offset.x + self.radius;
        let y = offset.y + self.radius;
        if x < 0 || y < 0 || x >= self.side || y >= self.side {
            return None;
        }
        Some(y as usize * self.side as usize + x as usize)
    }

    #[inline]
    pub fn offset_of(&self, idx: usize) -> Point {
        let side = self.side as usize;
        Point::new(
            (idx % side) as i32 - self.radius,
            (idx / side) as i32 - self.radius,
        )
    }
}

/// Local field produced by propagating one source, addressed by offset
/// from the source origin. Owned by the source and reused across ticks.
#[derive(Clone, Debug)]
pub struct SenseSourceData {
    grid: LocalGrid,
    intensities: Vec<f32>,
    directions: Vec<SenseDirectionStore>,
}

impl SenseSourceData {
    pub fn new(radius: i32) -> Self {
        let grid = LocalGrid::new(radius);
        Self {
            grid,
            intensities: vec![0.0; grid.len()],
            directions: vec![SenseDirectionStore::EMPTY; grid.len()],
        }
    }

    /// Clears the field for reuse. Buffers are only reallocated when the
    /// radius changes; returns whether that happened.
    pub fn reset(&mut self, radius: i32) -> bool {
        let grid = LocalGrid::new(radius);
        if grid == self.grid {
            self.intensities.fill(0.0);
            self.directions.fill(SenseDirectionStore::EMPTY);
            return false;
        }
        *self = SenseSourceData::new(radius);
        true
    }

    #[inline]
    pub fn grid(&self) -> LocalGrid {
        self.grid
    }

    #[inline]
    pub fn radius(&self) -> i32 {
        self.grid.radius()
    }

    /// World-space rectangle covered when centered on `origin`.
    #[inline]
    pub fn bounds(&self, origin: Point) -> Rect {
        Rect::around(origin, self.grid.radius())
    }

    /// Signed intensity at `offset`; zero outside the grid.
    #[inline]
    pub fn intensity(&self, offset: Point) -> f32 {
        self.grid
            .index_of(offset)
            .map(|i| self.intensities[i])
            .unwrap_or(0.0)
    }

    #[inline]
    pub fn direction(&self, offset: Point) -> SenseDirectionStore {
        self.grid
            .index_of(offset)
            .map(|i| self.directions[i])
            .unwrap_or(SenseDirectionStore::EMPTY)
    }

    #[inline]
    pub(crate) fn write_index(&mut self, idx: usize, intensity: f32, store: SenseDirectionStore) {
        self.intensities[idx] = intensity;
        self.directions[idx] = store;
    }

    #[inline]
    pub fn intensities(&self) -> &[f32] {
        &self.intensities
    }

    #[inline]
    pub fn directions(&self) -> &[SenseDirectionStore] {
        &self.directions
    }

    /// Non-zero cells as `(offset, intensity, direction)`.
    pub fn iter(&self) -> impl Iterator<Item = (Point, f32, SenseDirectionStore)> + '_ {
        let grid = self.grid;
        self.intensities
            .iter()
            .zip(self.directions.iter())
            .enumerate()
            .filter(|(_, (v, _))| **v != 0.0)
            .map(move |(i, (v, d))| (grid.offset_of(i), *v, *d))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_packs_direction_and_flags() {
        let s = SenseDirectionStore::new(Direction::SouthWest)
            .with_obstructed(true)
            .with_self_illuminating(true);
        assert_eq!(s.direction(), Direction::SouthWest);
        assert!(s.is_obstructed());
        assert!(s.is_self_illuminating());
        let s = s.with_obstructed(false);
        assert!(!s.is_obstructed());
        assert_eq!(SenseDirectionStore::from_raw(s.raw()), s);
    }

    #[test]
    fn local_grid_indexing() {
        let g = LocalGrid::new(2);
        assert_eq!(g.side(), 5);
        assert_eq!(g.center(), 12);
        assert_eq!(g.index_of(Point::ZERO), Some(12));
        assert_eq!(g.index_of(Point::new(-2, -2)), Some(0));
        assert_eq!(g.index_of(Point::new(3, 0)), None);
        for i in 0..g.len() {
            assert_eq!(g.index_of(g.offset_of(i)), Some(i));
        }
    }

    #[test]
    fn largest_grid_indexes_without_overflow() {
        let g = LocalGrid::new(MAX_SIGNAL_RADIUS);
        assert_eq!(g.side(), 2049);
        assert_eq!(g.len(), 2049 * 2049);
        let corner = Point::new(MAX_SIGNAL_RADIUS, MAX_SIGNAL_RADIUS);
        assert_eq!(g.index_of(corner), Some(g.len() - 1));
        assert_eq!(g.offset_of(g.len() - 1), corner);
        assert_eq!(LocalGrid::new(25_000), g);
    }

    #[test]
    fn reset_reuses_buffers_for_same_radius() {
        let mut data = SenseSourceData::new(3);
        data.write_index(0, 1.5, SenseDirectionStore::new(Direction::East));
        assert!(!data.reset(3));
        assert_eq!(data.intensity(Point::new(-3, -3)), 0.0);
        assert!(data.reset(4));
        assert_eq!(data.radius(), 4);
        assert_eq!(data.intensities().len(), 81);
        assert_eq!(data.bounds(Point::new(10, 10)), Rect::new(6, 6, 9, 9));
    }
}
