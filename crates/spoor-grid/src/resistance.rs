//! Per-channel resistance summed over world layers and cached per tile.

use std::marker::PhantomData;
use std::sync::Arc;

use hashbrown::{HashMap, HashSet};
use rayon::prelude::*;
use spoor_geom::{Point, Rect};

use crate::channel::{ChannelKind, SenseChannel};
use crate::directionality::CostSource;
use crate::tiles::{Tile, TileKey, TileLayout, TiledGrid};
use crate::GridError;

/// Resistance of uncomputed or unknown cells.
pub const BLOCKING: f32 = 1.0;

/// External supplier of one world layer's resistance (walls, furniture, ...).
pub trait ResistanceLayer: Send + Sync {
    fn name(&self) -> &str;

    /// Resistance contributed by this layer, nominally in `[0, 1]`.
    fn resistance(&self, channel: ChannelKind, x: i32, y: i32, z: i32) -> f32;
}

/// Read access to one level's resistance as consumed by propagation.
pub trait ResistanceView: Sync {
    fn resistance(&self, p: Point) -> f32;

    /// Known extent of the level, if bounded. Propagation declines origins
    /// outside of it.
    fn bounds(&self) -> Option<Rect> {
        None
    }
}

impl<F> ResistanceView for F
where
    F: Fn(Point) -> f32 + Sync,
{
    #[inline]
    fn resistance(&self, p: Point) -> f32 {
        self(p)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirtyRegion {
    pub rect: Rect,
    pub z: i32,
}

struct ResistanceLevel {
    grid: TiledGrid<f32>,
    dirty: Vec<Rect>,
    bounds: Rect,
}

pub struct ResistanceAggregator<S: SenseChannel> {
    layers: Vec<Arc<dyn ResistanceLayer>>,
    layout: TileLayout,
    levels: HashMap<i32, ResistanceLevel>,
    _channel: PhantomData<S>,
}

impl<S: SenseChannel> ResistanceAggregator<S> {
    pub fn new(layers: Vec<Arc<dyn ResistanceLayer>>, layout: TileLayout) -> Result<Self, GridError> {
        if layers.is_empty() {
            return Err(GridError::NoLayers);
        }
        let names: Vec<&str> = layers.iter().map(|l| l.name()).collect();
        log::debug!(target: "senses", "resistance {} sums layers [{}]", S::KIND.name(), names.join(", "));
        Ok(Self {
            layers,
            layout,
            levels: HashMap::new(),
            _channel: PhantomData,
        })
    }

    /// Records that cells of `rect` on level `z` changed in some layer.
    pub fn on_region_dirty(&mut self, rect: Rect, z: i32) {
        if rect.is_empty() {
            return;
        }
        let layout = self.layout;
        self.levels
            .entry(z)
            .or_insert_with(|| ResistanceLevel {
                grid: TiledGrid::new(layout, BLOCKING),
                dirty: Vec::new(),
                bounds: Rect::EMPTY,
            })
            .dirty
            .push(rect);
    }

    pub fn has_pending(&self) -> bool {
        self.levels.values().any(|l| !l.dirty.is_empty())
    }

    /// Recomputes the cells inside pending dirty rectangles and returns those
    /// rectangles so derived caches can be invalidated.
    pub fn process(&mut self) -> Vec<DirtyRegion> {
        let Self {
            layers,
            layout,
            levels,
            ..
        } = self;
        let mut processed = Vec::new();
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
            let mut tiles: Vec<&mut Tile<f32>> = level
                .grid
                .tiles_mut()
                .filter(|t| keys.contains(&t.key()))
                .collect();
            let layers: &[Arc<dyn ResistanceLayer>] = layers;
            tiles.par_iter_mut().for_each(|tile| {
                let bounds = tile.rect();
                for r in &dirty {
                    let Some(area) = bounds.intersect(r) else {
                        continue;
                    };
                    for p in area.points() {
                        tile.set(p, sum_layers(layers, S::KIND, p, z));
                    }
                }
            });
            for r in dirty {
                level.bounds = level.bounds.union(&r);
                processed.push(DirtyRegion { rect: r, z });
            }
            log::debug!(
                target: "senses",
                "resistance {} z={} refreshed {} tiles",
                S::KIND.name(),
                z,
                keys.len()
            );
        }
        processed
    }

    /// Cached resistance; unknown cells are fully blocking.
    #[inline]
    pub fn get_resistance(&self, x: i32, y: i32, z: i32) -> f32 {
        self.levels
            .get(&z)
            .map(|l| l.grid.get(Point::new(x, y)))
            .unwrap_or(BLOCKING)
    }

    pub fn level(&self, z: i32) -> ResistanceLevelView<'_> {
        match self.levels.get(&z) {
            Some(l) => ResistanceLevelView {
                grid: Some(&l.grid),
                bounds: l.bounds,
            },
            None => ResistanceLevelView {
                grid: None,
                bounds: Rect::EMPTY,
            },
        }
    }
}

fn sum_layers(layers: &[Arc<dyn ResistanceLayer>], channel: ChannelKind, p: Point, z: i32) -> f32 {
    let mut total = 0.0f32;
    for layer in layers {
        let v = layer.resistance(channel, p.x, p.y, z);
        if !v.is_finite() {
            return BLOCKING;
        }
        total += v.max(0.0);
    }
    total.min(BLOCKING)
}

impl<S: SenseChannel> CostSource for ResistanceAggregator<S> {
    #[inline]
    fn cost(&self, x: i32, y: i32, z: i32) -> f32 {
        1.0 - self.get_resistance(x, y, z)
    }
}

#[derive(Clone, Copy)]
pub struct ResistanceLevelView<'a> {
    grid: Option<&'a TiledGrid<f32>>,
    bounds: Rect,
}

impl ResistanceView for ResistanceLevelView<'_> {
    #[inline]
    fn resistance(&self, p: Point) -> f32 {
        self.grid.map(|g| g.get(p)).unwrap_or(BLOCKING)
    }

    fn bounds(&self) -> Option<Rect> {
        Some(self.bounds)
    }
}
