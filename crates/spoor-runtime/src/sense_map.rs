use spoor_geom::{Point, Rect};
use spoor_grid::{Tile, TiledGrid};
use spoor_senses::SenseDirectionStore;

/// One composited cell: signed intensity and the direction the dominant
/// contribution arrived from.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SenseCell {
    pub intensity: f32,
    pub direction: SenseDirectionStore,
}

impl SenseCell {
    pub const EMPTY: SenseCell = SenseCell {
        intensity: 0.0,
        direction: SenseDirectionStore::EMPTY,
    };
}

pub type SenseDataMap = TiledGrid<SenseCell>;

/// Merge rule for overlapping sources. Same signs keep the stronger
/// magnitude; opposite signs cancel by summing.
#[inline]
pub fn combine(current: f32, incoming: f32) -> f32 {
    if current == 0.0 {
        return incoming;
    }
    if (current > 0.0) == (incoming > 0.0) {
        if incoming.abs() > current.abs() { incoming } else { current }
    } else {
        current + incoming
    }
}

/// [`combine`] on cells; the direction follows the larger magnitude.
#[inline]
pub fn combine_cells(current: SenseCell, incoming: SenseCell) -> SenseCell {
    let direction = if incoming.intensity.abs() > current.intensity.abs() {
        incoming.direction
    } else {
        current.direction
    };
    SenseCell {
        intensity: combine(current.intensity, incoming.intensity),
        direction,
    }
}

/// Read-only view of one level's composite.
#[derive(Clone, Copy)]
pub struct SenseMapView<'a> {
    z: i32,
    map: &'a SenseDataMap,
}

impl<'a> SenseMapView<'a> {
    pub(crate) fn new(z: i32, map: &'a SenseDataMap) -> Self {
        Self { z, map }
    }

    #[inline]
    pub fn z(&self) -> i32 {
        self.z
    }

    /// Composite cell at `(x, y)`; empty outside populated tiles.
    #[inline]
    pub fn query(&self, x: i32, y: i32) -> SenseCell {
        self.map.get(Point::new(x, y))
    }

    #[inline]
    pub fn intensity(&self, x: i32, y: i32) -> f32 {
        self.query(x, y).intensity
    }

    pub fn tiles(&self) -> impl Iterator<Item = &'a Tile<SenseCell>> {
        self.map.tiles()
    }

    /// Extent of the populated tiles.
    pub fn bounds(&self) -> Rect {
        self.map.populated_bounds()
    }

    /// Non-empty cells of the populated tiles.
    pub fn cells(&self) -> impl Iterator<Item = (Point, SenseCell)> + 'a {
        self.map
            .tiles()
            .flat_map(|t| t.iter())
            .filter(|(_, c)| c.intensity != 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spoor_geom::Direction;

    #[test]
    fn combine_same_sign_keeps_stronger() {
        assert_eq!(combine(3.0, 5.0), 5.0);
        assert_eq!(combine(5.0, 3.0), 5.0);
        assert_eq!(combine(-3.0, -5.0), -5.0);
        assert_eq!(combine(0.0, -2.0), -2.0);
    }

    #[test]
    fn combine_opposite_signs_sum() {
        assert_eq!(combine(5.0, -3.0), 2.0);
        assert_eq!(combine(-5.0, 3.0), -2.0);
        assert_eq!(combine(4.0, -4.0), 0.0);
    }

    #[test]
    fn cell_direction_follows_dominant() {
        let a = SenseCell {
            intensity: 2.0,
            direction: SenseDirectionStore::new(Direction::North),
        };
        let b = SenseCell {
            intensity: -5.0,
            direction: SenseDirectionStore::new(Direction::West),
        };
        let c = combine_cells(a, b);
        assert_eq!(c.intensity, -3.0);
        assert_eq!(c.direction.direction(), Direction::West);
    }
}
