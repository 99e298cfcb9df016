//! Per-cell traversability bitmasks derived from a scalar cost grid.
//!
//! A cell is open when its cost is `> 0`. Diagonal edges follow the squeeze
//! rule: the step is refused only when *both* orthogonal cells between the
//! two endpoints are closed.

use std::fmt;

use hashbrown::{HashMap, HashSet};
use rayon::prelude::*;
use spoor_geom::{Direction, Point, Rect};

use crate::tiles::{Tile, TileKey, TileLayout, TiledGrid};

// Indexed by `Direction::index()`; `None` owns no bit.
const DIRECTION_MASKS: [u8; 9] = [0, 1, 2, 4, 8, 16, 32, 64, 128];

/// Set of compass directions whose edge can currently be crossed.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DirectionalityInformation(u8);

impl DirectionalityInformation {
    /// Nothing traversable. Also the sentinel for unknown cells.
    pub const NONE: DirectionalityInformation = DirectionalityInformation(0x00);
    pub const ALL: DirectionalityInformation = DirectionalityInformation(0xFF);

    #[inline]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    pub fn contains(self, dir: Direction) -> bool {
        self.0 & DIRECTION_MASKS[dir.index()] != 0
    }

    #[inline]
    pub fn with(self, dir: Direction) -> Self {
        Self(self.0 | DIRECTION_MASKS[dir.index()])
    }

    #[inline]
    pub fn without(self, dir: Direction) -> Self {
        Self(self.0 & !DIRECTION_MASKS[dir.index()])
    }

    #[inline]
    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    pub fn directions(self) -> impl Iterator<Item = Direction> {
        Direction::EIGHT_WAY.into_iter().filter(move |d| self.contains(*d))
    }
}

impl fmt::Debug for DirectionalityInformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DirectionalityInformation(")?;
        let mut first = true;
        for d in self.directions() {
            if !first {
                write!(f, "|")?;
            }
            write!(f, "{:?}", d)?;
            first = false;
        }
        write!(f, ")")
    }
}

/// Scalar grid the directionality is derived from; `> 0` means open.
/// Cells outside the known world must report `0`.
pub trait CostSource: Sync {
    fn cost(&self, x: i32, y: i32, z: i32) -> f32;
}

impl<F> CostSource for F
where
    F: Fn(i32, i32, i32) -> f32 + Sync,
{
    #[inline]
    fn cost(&self, x: i32, y: i32, z: i32) -> f32 {
        self(x, y, z)
    }
}

#[inline]
fn is_open<C: CostSource + ?Sized>(src: &C, p: Point, z: i32) -> bool {
    src.cost(p.x, p.y, z) > 0.0
}

#[inline]
fn squeeze_ok<C: CostSource + ?Sized>(src: &C, p: Point, z: i32, dir: Direction) -> bool {
    match dir.components() {
        Some((a, b)) => is_open(src, p.step(a), z) || is_open(src, p.step(b), z),
        None => true,
    }
}

/// Directions in which a walker standing on `p` may leave.
pub fn compute_outbound<C: CostSource + ?Sized>(src: &C, p: Point, z: i32) -> DirectionalityInformation {
    let mut info = DirectionalityInformation::NONE;
    for d in Direction::EIGHT_WAY {
        if is_open(src, p.step(d), z) && squeeze_ok(src, p, z, d) {
            info = info.with(d);
        }
    }
    info
}

/// Directions from which `p` may be entered: bit `d` is set when the
/// neighbour at `p + d` can step onto `p`.
pub fn compute_inbound<C: CostSource + ?Sized>(src: &C, p: Point, z: i32) -> DirectionalityInformation {
    if !is_open(src, p, z) {
        return DirectionalityInformation::NONE;
    }
    let mut info = DirectionalityInformation::NONE;
    for d in Direction::EIGHT_WAY {
        if squeeze_ok(src, p, z, d) {
            info = info.with(d);
        }
    }
    info
}

/// Read access to one level's directionality.
pub trait DirectionalityView: Sync {
    fn directionality(&self, p: Point) -> DirectionalityInformation;
}

impl<F> DirectionalityView for F
where
    F: Fn(Point) -> DirectionalityInformation + Sync,
{
    #[inline]
    fn directionality(&self, p: Point) -> DirectionalityInformation {
        self(p)
    }
}

/// View that allows every direction everywhere.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllDirections;

impl DirectionalityView for AllDirections {
    #[inline]
    fn directionality(&self, _p: Point) -> DirectionalityInformation {
        DirectionalityInformation::ALL
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DirectionalityKind {
    Outbound,
    Inbound,
}

impl DirectionalityKind {
    #[inline]
    fn compute<C: CostSource + ?Sized>(self, src: &C, p: Point, z: i32) -> DirectionalityInformation {
        match self {
            DirectionalityKind::Outbound => compute_outbound(src, p, z),
            DirectionalityKind::Inbound => compute_inbound(src, p, z),
        }
    }
}

struct DirectionalityLevel {
    grid: TiledGrid<DirectionalityInformation>,
    dirty: Vec<Rect>,
}

/// Lazily recomputed directionality cache, one tiled grid per z-level.
pub struct DirectionalityMap {
    kind: DirectionalityKind,
    layout: TileLayout,
    levels: HashMap<i32, DirectionalityLevel>,
}

impl DirectionalityMap {
    pub fn new(kind: DirectionalityKind, layout: TileLayout) -> Self {
        Self {
            kind,
            layout,
            levels: HashMap::new(),
        }
    }

    #[inline]
    pub fn kind(&self) -> DirectionalityKind {
        self.kind
    }

    /// Marks `rect` on level `z` for recomputation. The rectangle is grown by
    /// one cell since neighbouring masks depend on every changed cell.
    pub fn invalidate(&mut self, rect: Rect, z: i32) {
        if rect.is_empty() {
            return;
        }
        let layout = self.layout;
        self.levels
            .entry(z)
            .or_insert_with(|| DirectionalityLevel {
                grid: TiledGrid::new(layout, DirectionalityInformation::NONE),
                dirty: Vec::new(),
            })
            .dirty
            .push(rect.expand(1));
    }

    pub fn has_pending(&self) -> bool {
        self.levels.values().any(|l| !l.dirty.is_empty())
    }

    /// Recomputes all dirty cells, tiles in parallel. Returns the number of
    /// cells written.
    pub fn process<C: CostSource + ?Sized>(&mut self, src: &C) -> usize {
        let Self {
            kind,
            layout,
            levels,
        } = self;
        let kind = *kind;
        let mut total = 0usize;
        for (&z, level) in levels.iter_mut() {
            if level.dirty.is_empty() {
                continue;
            }
            let dirty = std::mem::take(&mut level.dirty);
            let mut keys: HashSet<TileKey> = HashSet::new();
            for r in &dirty {
                keys.extend(layout.keys_in(*r));
            }
            for &key in &keys {
                level.grid.ensure_tile(key);
            }
            let mut tiles: Vec<&mut Tile<DirectionalityInformation>> = level
                .grid
                .tiles_mut()
                .filter(|t| keys.contains(&t.key()))
                .collect();
            let written: usize = tiles
                .par_iter_mut()
                .map(|tile| {
                    let bounds = tile.rect();
                    let mut n = 0usize;
                    for r in &dirty {
                        let Some(area) = bounds.intersect(r) else {
                            continue;
                        };
                        for p in area.points() {
                            tile.set(p, kind.compute(src, p, z));
                            n += 1;
                        }
                    }
                    n
                })
                .sum();
            log::debug!(
                target: "senses",
                "directionality {:?} z={} recomputed {} cells in {} tiles",
                kind,
                z,
                written,
                keys.len()
            );
            total += written;
        }
        total
    }

    /// Cached mask; unknown cells read as [`DirectionalityInformation::NONE`].
    #[inline]
    pub fn get_directionality(&self, x: i32, y: i32, z: i32) -> DirectionalityInformation {
        self.levels
            .get(&z)
            .map(|l| l.grid.get(Point::new(x, y)))
            .unwrap_or(DirectionalityInformation::NONE)
    }

    pub fn level(&self, z: i32) -> DirectionalityLevelView<'_> {
        DirectionalityLevelView {
            grid: self.levels.get(&z).map(|l| &l.grid),
        }
    }
}

#[derive(Clone, Copy)]
pub struct DirectionalityLevelView<'a> {
    grid: Option<&'a TiledGrid<DirectionalityInformation>>,
}

impl DirectionalityView for DirectionalityLevelView<'_> {
    #[inline]
    fn directionality(&self, p: Point) -> DirectionalityInformation {
        self.grid
            .map(|g| g.get(p))
            .unwrap_or(DirectionalityInformation::NONE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // '#' closed, anything else open; outside the strings is closed.
    fn cost_from(rows: &'static [&'static str]) -> impl Fn(i32, i32, i32) -> f32 + Sync {
        move |x, y, _z| {
            if x < 0 || y < 0 {
                return 0.0;
            }
            let Some(row) = rows.get(y as usize) else {
                return 0.0;
            };
            match row.as_bytes().get(x as usize) {
                Some(b'#') | None => 0.0,
                Some(_) => 1.0,
            }
        }
    }

    #[test]
    fn diagonal_blocked_when_both_orthogonals_closed() {
        let src = cost_from(&[
            "..#", //
            ".#.", //
            "...",
        ]);
        // From (1,2) north-east to (2,1): intermediates (1,1) '#' and (2,2) '.'
        let out = compute_outbound(&src, Point::new(1, 2), 0);
        assert!(out.contains(Direction::NorthEast));

        let src = cost_from(&[
            "...", //
            ".#.", //
            "#..",
        ]);
        // From (0,1) south-east to (1,2): intermediates (0,2) '#' and (1,1) '#'
        let out = compute_outbound(&src, Point::new(0, 1), 0);
        assert!(!out.contains(Direction::SouthEast));
        assert!(out.contains(Direction::North));
        assert!(!out.contains(Direction::East));
    }

    #[test]
    fn inbound_mirrors_outbound() {
        let src = cost_from(&[
            ".#.", //
            "...", //
            "#..",
        ]);
        for y in 0..3 {
            for x in 0..3 {
                let p = Point::new(x, y);
                let inbound = compute_inbound(&src, p, 0);
                for d in Direction::EIGHT_WAY {
                    let from = p.step(d);
                    let out = compute_outbound(&src, from, 0);
                    assert_eq!(inbound.contains(d), out.contains(d.opposite()), "{:?} {:?}", p, d);
                }
            }
        }
    }

    #[test]
    fn inbound_of_closed_cell_is_none() {
        let src = cost_from(&["...", ".#.", "..."]);
        assert!(compute_inbound(&src, Point::new(1, 1), 0).is_none());
        assert!(!compute_outbound(&src, Point::new(1, 1), 0).is_none());
    }

    #[test]
    fn map_only_recomputes_dirty_cells() {
        let layout = TileLayout::new(4).unwrap();
        let mut map = DirectionalityMap::new(DirectionalityKind::Outbound, layout);
        let open = |_x: i32, _y: i32, _z: i32| 1.0f32;
        assert_eq!(map.get_directionality(1, 1, 0), DirectionalityInformation::NONE);

        map.invalidate(Rect::new(1, 1, 1, 1), 0);
        assert!(map.has_pending());
        let written = map.process(&open);
        assert_eq!(written, 9);
        assert!(!map.has_pending());
        assert_eq!(map.get_directionality(1, 1, 0), DirectionalityInformation::ALL);
        assert_eq!(map.get_directionality(5, 5, 0), DirectionalityInformation::NONE);
        assert_eq!(map.get_directionality(1, 1, 1), DirectionalityInformation::NONE);

        // A closed source no longer changes cached values unless invalidated.
        let closed = |_x: i32, _y: i32, _z: i32| 0.0f32;
        assert_eq!(map.process(&closed), 0);
        assert_eq!(map.get_directionality(1, 1, 0), DirectionalityInformation::ALL);
    }

    #[test]
    fn debug_lists_directions() {
        let info = DirectionalityInformation::NONE
            .with(Direction::North)
            .with(Direction::West);
        assert_eq!(format!("{:?}", info), "DirectionalityInformation(North|West)");
        assert_eq!(info.without(Direction::North).bits(), 64);
    }
}
