use hashbrown::HashMap;
use spoor_geom::{Point, Rect};

use crate::GridError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    pub tx: i32,
    pub ty: i32,
}

impl TileKey {
    #[inline]
    pub const fn new(tx: i32, ty: i32) -> Self {
        Self { tx, ty }
    }
}

/// Square power-of-two tiling of the plane. Negative coordinates floor
/// towards negative infinity, so tile `(-1, -1)` covers `-size..0`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileLayout {
    size: i32,
    shift: u32,
}

impl TileLayout {
    pub fn new(size: u32) -> Result<Self, GridError> {
        if size == 0 || size > 4096 || !size.is_power_of_two() {
            return Err(GridError::InvalidTileSize(size));
        }
        Ok(Self {
            size: size as i32,
            shift: size.trailing_zeros(),
        })
    }

    #[inline]
    pub fn size(&self) -> i32 {
        self.size
    }

    #[inline]
    pub fn cells_per_tile(&self) -> usize {
        (self.size * self.size) as usize
    }

    #[inline]
    pub fn key_of(&self, p: Point) -> TileKey {
        TileKey::new(p.x >> self.shift, p.y >> self.shift)
    }

    #[inline]
    pub fn rect_of(&self, key: TileKey) -> Rect {
        Rect::new(key.tx << self.shift, key.ty << self.shift, self.size, self.size)
    }

    /// Keys of all tiles overlapping `rect`, row-major.
    pub fn keys_in(&self, rect: Rect) -> impl Iterator<Item = TileKey> + use<> {
        let (k0, k1) = if rect.is_empty() {
            (TileKey::new(0, 0), TileKey::new(-1, -1))
        } else {
            (self.key_of(rect.min()), self.key_of(rect.max()))
        };
        (k0.ty..=k1.ty).flat_map(move |ty| (k0.tx..=k1.tx).map(move |tx| TileKey::new(tx, ty)))
    }
}

/// One allocated chunk of a [`TiledGrid`].
#[derive(Clone, Debug)]
pub struct Tile<T> {
    key: TileKey,
    rect: Rect,
    cells: Box<[T]>,
}

impl<T: Copy> Tile<T> {
    fn new(key: TileKey, rect: Rect, fill: T) -> Self {
        Self {
            key,
            rect,
            cells: vec![fill; rect.area()].into_boxed_slice(),
        }
    }

    #[inline]
    pub fn key(&self) -> TileKey {
        self.key
    }

    #[inline]
    pub fn rect(&self) -> Rect {
        self.rect
    }

    #[inline]
    fn idx(&self, p: Point) -> usize {
        debug_assert!(self.rect.contains(p));
        ((p.y - self.rect.y) * self.rect.width + (p.x - self.rect.x)) as usize
    }

    #[inline]
    pub fn get(&self, p: Point) -> T {
        self.cells[self.idx(p)]
    }

    #[inline]
    pub fn get_mut(&mut self, p: Point) -> &mut T {
        let i = self.idx(p);
        &mut self.cells[i]
    }

    #[inline]
    pub fn set(&mut self, p: Point, v: T) {
        let i = self.idx(p);
        self.cells[i] = v;
    }

    pub fn fill(&mut self, v: T) {
        self.cells.fill(v);
    }

    #[inline]
    pub fn cells(&self) -> &[T] {
        &self.cells
    }

    pub fn iter(&self) -> impl Iterator<Item = (Point, T)> + '_ {
        self.rect.points().zip(self.cells.iter().copied())
    }
}

/// Sparse grid made of lazily allocated tiles. Reads of unallocated cells
/// return the grid's default value.
#[derive(Clone, Debug)]
pub struct TiledGrid<T> {
    layout: TileLayout,
    default: T,
    tiles: HashMap<TileKey, Tile<T>>,
}

impl<T: Copy> TiledGrid<T> {
    pub fn new(layout: TileLayout, default: T) -> Self {
        Self {
            layout,
            default,
            tiles: HashMap::new(),
        }
    }

    #[inline]
    pub fn layout(&self) -> TileLayout {
        self.layout
    }

    #[inline]
    pub fn default_value(&self) -> T {
        self.default
    }

    #[inline]
    pub fn get(&self, p: Point) -> T {
        match self.tiles.get(&self.layout.key_of(p)) {
            Some(tile) => tile.get(p),
            None => self.default,
        }
    }

    pub fn set(&mut self, p: Point, v: T) {
        let key = self.layout.key_of(p);
        self.ensure_tile(key).set(p, v);
    }

    pub fn ensure_tile(&mut self, key: TileKey) -> &mut Tile<T> {
        let layout = self.layout;
        let default = self.default;
        self.tiles
            .entry(key)
            .or_insert_with(|| Tile::new(key, layout.rect_of(key), default))
    }

    #[inline]
    pub fn tile(&self, key: TileKey) -> Option<&Tile<T>> {
        self.tiles.get(&key)
    }

    #[inline]
    pub fn tile_mut(&mut self, key: TileKey) -> Option<&mut Tile<T>> {
        self.tiles.get_mut(&key)
    }

    pub fn remove_tile(&mut self, key: TileKey) -> Option<Tile<T>> {
        self.tiles.remove(&key)
    }

    pub fn retain_tiles(&mut self, mut keep: impl FnMut(TileKey) -> bool) {
        self.tiles.retain(|k, _| keep(*k));
    }

    pub fn tiles(&self) -> impl Iterator<Item = &Tile<T>> {
        self.tiles.values()
    }

    pub fn tiles_mut(&mut self) -> impl Iterator<Item = &mut Tile<T>> {
        self.tiles.values_mut()
    }

    #[inline]
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn clear(&mut self) {
        self.tiles.clear();
    }

    /// Bounding rectangle of all allocated tiles.
    pub fn populated_bounds(&self) -> Rect {
        self.tiles
            .values()
            .fold(Rect::EMPTY, |acc, t| acc.union(&t.rect()))
    }
}
