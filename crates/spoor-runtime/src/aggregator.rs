//! Per-level composite of all active sources, rebuilt each tick in three
//! strictly ordered phases: collect, process, end.

use std::sync::atomic::{AtomicU64, Ordering};

use hashbrown::{HashMap, HashSet};
use rayon::prelude::*;
use spoor_geom::Point;
use spoor_grid::{Tile, TileKey, TileLayout, TiledGrid};
use spoor_senses::SenseSourceData;

use crate::registry::{SourceHandle, SourceRegistry};
use crate::sense_map::{SenseCell, SenseDataMap, SenseMapView, combine_cells};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AggregatorStats {
    pub tiles_processed: u64,
    pub sources_blitted: u64,
    pub levels_evicted: u64,
    pub levels: usize,
}

struct SenseLevel {
    map: SenseDataMap,
    pending: Vec<SourceHandle>,
    last_used: u64,
}

pub struct SenseMapAggregator {
    layout: TileLayout,
    min_intensity: f32,
    idle_eviction_ticks: u64,
    levels: HashMap<i32, SenseLevel>,
    tiles_processed: AtomicU64,
    sources_blitted: AtomicU64,
    levels_evicted: AtomicU64,
}

impl SenseMapAggregator {
    pub fn new(layout: TileLayout, min_intensity: f32, idle_eviction_ticks: u64) -> Self {
        Self {
            layout,
            min_intensity,
            idle_eviction_ticks,
            levels: HashMap::new(),
            tiles_processed: AtomicU64::new(0),
            sources_blitted: AtomicU64::new(0),
            levels_evicted: AtomicU64::new(0),
        }
    }

    /// Queues every active source on its level, creating levels on first
    /// use, and flags queued sources observed.
    pub fn collect(&mut self, registry: &mut SourceRegistry, tick: u64) -> usize {
        let layout = self.layout;
        let mut collected = 0;
        for (handle, entry) in registry.iter_mut() {
            let pos = match entry.position() {
                Some(pos) if entry.is_active() => pos,
                _ => {
                    entry.set_observed(false);
                    continue;
                }
            };
            self.levels
                .entry(pos.z)
                .or_insert_with(|| SenseLevel {
                    map: TiledGrid::new(layout, SenseCell::EMPTY),
                    pending: Vec::new(),
                    last_used: tick,
                })
                .pending
                .push(handle);
            entry.set_observed(true);
            collected += 1;
        }
        collected
    }

    /// Rebuilds the composite of every level with pending sources, levels
    /// in parallel and then tiles in parallel. Levels without pending
    /// sources are cleared.
    pub fn process(&mut self, registry: &SourceRegistry) {
        let Self {
            layout,
            min_intensity,
            levels,
            tiles_processed,
            sources_blitted,
            ..
        } = self;
        let layout = *layout;
        let min_intensity = *min_intensity;
        let tiles_processed: &AtomicU64 = tiles_processed;
        let sources_blitted: &AtomicU64 = sources_blitted;

        let mut active: Vec<(i32, &mut SenseLevel)> = Vec::new();
        for (&z, level) in levels.iter_mut() {
            if level.pending.is_empty() {
                level.map.clear();
            } else {
                active.push((z, level));
            }
        }

        active.into_par_iter().for_each(|(z, level)| {
            let sources: Vec<(Point, &SenseSourceData)> = level
                .pending
                .iter()
                .filter_map(|h| registry.get(*h))
                .filter_map(|e| Some((e.position()?.point(), e.data()?)))
                .collect();

            let mut keys: HashSet<TileKey> = HashSet::new();
            for (origin, data) in &sources {
                keys.extend(layout.keys_in(data.bounds(*origin)));
            }
            level.map.retain_tiles(|k| keys.contains(&k));
            for &key in &keys {
                level.map.ensure_tile(key);
            }

            let mut tiles: Vec<&mut Tile<SenseCell>> = level.map.tiles_mut().collect();
            tiles.par_iter_mut().for_each(|tile| {
                blit_tile(tile, &sources, min_intensity, sources_blitted);
            });
            tiles_processed.fetch_add(tiles.len() as u64, Ordering::Relaxed);
            log::debug!(
                target: "senses",
                "composite z={} blitted {} sources into {} tiles",
                z,
                sources.len(),
                tiles.len()
            );
        });
    }

    /// Clears pending lists, stamps levels that had sources and evicts
    /// levels idle for longer than the threshold. Returns the number of
    /// evicted levels.
    pub fn end(&mut self, tick: u64) -> usize {
        let idle = self.idle_eviction_ticks;
        for level in self.levels.values_mut() {
            if !level.pending.is_empty() {
                level.last_used = tick;
                level.pending.clear();
            }
        }
        let before = self.levels.len();
        self.levels
            .retain(|_, level| tick.saturating_sub(level.last_used) <= idle);
        let evicted = before - self.levels.len();
        if evicted > 0 {
            self.levels_evicted
                .fetch_add(evicted as u64, Ordering::Relaxed);
            log::info!(target: "senses", "[tick {}] evicted {} idle levels", tick, evicted);
        }
        evicted
    }

    pub fn try_get_level(&self, z: i32) -> Option<SenseMapView<'_>> {
        self.levels.get(&z).map(|l| SenseMapView::new(z, &l.map))
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn stats(&self) -> AggregatorStats {
        AggregatorStats {
            tiles_processed: self.tiles_processed.load(Ordering::Relaxed),
            sources_blitted: self.sources_blitted.load(Ordering::Relaxed),
            levels_evicted: self.levels_evicted.load(Ordering::Relaxed),
            levels: self.levels.len(),
        }
    }
}

fn blit_tile(
    tile: &mut Tile<SenseCell>,
    sources: &[(Point, &SenseSourceData)],
    min_intensity: f32,
    blitted: &AtomicU64,
) {
    tile.fill(SenseCell::EMPTY);
    let rect = tile.rect();
    let mut n = 0u64;
    for (origin, data) in sources {
        let Some(area) = rect.intersect(&data.bounds(*origin)) else {
            continue;
        };
        n += 1;
        for p in area.points() {
            let offset = p - *origin;
            let v = data.intensity(offset);
            if v == 0.0 || v.abs() < min_intensity {
                continue;
            }
            let cell = tile.get_mut(p);
            *cell = combine_cells(
                *cell,
                SenseCell {
                    intensity: v,
                    direction: data.direction(offset),
                },
            );
        }
    }
    blitted.fetch_add(n, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use spoor_geom::Position;
    use spoor_grid::AllDirections;
    use spoor_senses::{LinearDecayPhysics, PropagationAlgorithm, SenseSourceDefinition};
    use std::sync::Arc;

    fn def(intensity: f32) -> SenseSourceDefinition {
        SenseSourceDefinition::builder(intensity)
            .physics(Arc::new(LinearDecayPhysics::default()))
            .build()
            .unwrap()
    }

    fn registry_with(sources: &[(f32, Option<Position>)]) -> (SourceRegistry, Vec<SourceHandle>) {
        let mut reg = SourceRegistry::new();
        let handles = sources.iter().map(|(i, p)| reg.insert(def(*i), *p)).collect();
        let alg = PropagationAlgorithm::flood_fill(1);
        let open = |_p: Point| 0.0f32;
        for entry in reg.dirty_entries() {
            let _ = entry.recompute(&alg, &open, &AllDirections);
        }
        (reg, handles)
    }

    fn aggregator() -> SenseMapAggregator {
        SenseMapAggregator::new(TileLayout::new(8).unwrap(), 0.005, 50)
    }

    #[test]
    fn overlapping_sources_combine() {
        let (mut reg, _) = registry_with(&[
            (5.0, Some(Position::new(0, 0, 0))),
            (3.0, Some(Position::new(2, 0, 0))),
            (-4.0, Some(Position::new(0, 6, 0))),
        ]);
        let mut agg = aggregator();
        assert_eq!(agg.collect(&mut reg, 0), 3);
        agg.process(&reg);
        let view = agg.try_get_level(0).unwrap();
        // Same sign: max(5 - 2, 3).
        assert_eq!(view.intensity(2, 0), 3.0);
        // Opposite signs: (5 - 4) + (-4 + 2).
        assert_eq!(view.intensity(0, 4), -1.0);
        assert_eq!(view.intensity(1, 3), 1.0);
        // Only the negative source reaches here.
        assert_eq!(view.intensity(0, 7), -3.0);
        assert!(view.bounds().contains(Point::new(-5, -5)));
    }

    #[test]
    fn process_is_idempotent() {
        let (mut reg, _) = registry_with(&[
            (5.0, Some(Position::new(3, 3, 0))),
            (-2.0, Some(Position::new(5, 4, 0))),
        ]);
        let mut agg = aggregator();
        agg.collect(&mut reg, 0);
        agg.process(&reg);
        let first: Vec<_> = {
            let view = agg.try_get_level(0).unwrap();
            let mut cells: Vec<_> = view.cells().collect();
            cells.sort_by_key(|(p, _)| *p);
            cells
        };
        agg.process(&reg);
        let view = agg.try_get_level(0).unwrap();
        let mut second: Vec<_> = view.cells().collect();
        second.sort_by_key(|(p, _)| *p);
        assert_eq!(first, second);
    }

    #[test]
    fn sources_without_data_are_not_collected() {
        let (mut reg, handles) = registry_with(&[(5.0, None), (0.0, Some(Position::new(0, 0, 0)))]);
        let mut agg = aggregator();
        assert_eq!(agg.collect(&mut reg, 0), 0);
        assert!(handles.iter().all(|h| !reg.get(*h).unwrap().is_observed()));
        assert!(agg.try_get_level(0).is_none());
    }

    #[test]
    fn idle_levels_are_evicted_after_threshold() {
        let (mut reg, handles) = registry_with(&[(5.0, Some(Position::new(0, 0, 2)))]);
        let mut agg = aggregator();
        agg.collect(&mut reg, 0);
        agg.process(&reg);
        agg.end(0);
        reg.remove(handles[0]);
        for tick in 1..=50 {
            agg.collect(&mut reg, tick);
            agg.process(&reg);
            assert_eq!(agg.end(tick), 0);
        }
        let view = agg.try_get_level(2).unwrap();
        assert_eq!(view.intensity(0, 0), 0.0);
        assert_eq!(view.tiles().count(), 0);
        agg.collect(&mut reg, 51);
        agg.process(&reg);
        assert_eq!(agg.end(51), 1);
        assert!(agg.try_get_level(2).is_none());
        assert_eq!(agg.stats().levels_evicted, 1);
    }

    #[test]
    fn weak_contributions_are_skipped() {
        let (mut reg, _) = registry_with(&[(5.0, Some(Position::new(0, 0, 0)))]);
        let mut agg = SenseMapAggregator::new(TileLayout::new(8).unwrap(), 2.5, 50);
        agg.collect(&mut reg, 0);
        agg.process(&reg);
        let view = agg.try_get_level(0).unwrap();
        assert_eq!(view.intensity(2, 0), 3.0);
        assert_eq!(view.intensity(3, 0), 0.0);
        assert_eq!(view.intensity(4, 0), 0.0);
    }
}
