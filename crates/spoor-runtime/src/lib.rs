//! Per-channel sense orchestration: resistance and directionality caches,
//! the source registry, propagation and per-level composites.
#![forbid(unsafe_code)]

mod aggregator;
pub mod config;
mod error;
mod registry;
mod sense_map;

use std::sync::Arc;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use spoor_geom::{Position, Rect};
use spoor_grid::{
    DirectionalityInformation, DirectionalityKind, DirectionalityMap, ResistanceAggregator,
    ResistanceLayer, SenseChannel,
};
use spoor_senses::{PropagationAlgorithm, SenseSourceData, SenseSourceDefinition};

pub use aggregator::{AggregatorStats, SenseMapAggregator};
pub use config::{AlgorithmKind, SenseConfig};
pub use error::SenseError;
pub use registry::{SourceEntry, SourceHandle, SourceRegistry, SourceState, SourceUpdate};
pub use sense_map::{SenseCell, SenseDataMap, SenseMapView, combine, combine_cells};

/// Outcome of one [`SenseSystem::tick`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub regions_refreshed: usize,
    pub sources_recomputed: usize,
    pub sources_collected: usize,
    pub levels_evicted: usize,
}

/// Everything needed to maintain the composite field of one sense
/// channel `S` across ticks.
pub struct SenseSystem<S: SenseChannel> {
    config: SenseConfig,
    resistance: ResistanceAggregator<S>,
    directionality: DirectionalityMap,
    registry: SourceRegistry,
    algorithm: PropagationAlgorithm,
    aggregator: SenseMapAggregator,
    pool: Option<Arc<ThreadPool>>,
    tick: u64,
}

impl<S: SenseChannel> SenseSystem<S> {
    pub fn new(config: SenseConfig, layers: Vec<Arc<dyn ResistanceLayer>>) -> Result<Self, SenseError> {
        config.validate()?;
        let layout = config.layout()?;
        let pool = if config.worker_threads > 0 {
            let pool = ThreadPoolBuilder::new()
                .num_threads(config.worker_threads)
                .thread_name(|i| format!("spoor-{}-{}", S::KIND.name(), i))
                .build()
                .map_err(|e| SenseError::Config(e.to_string()))?;
            Some(Arc::new(pool))
        } else {
            None
        };
        let algorithm = config.build_algorithm();
        log::info!(
            target: "senses",
            "{} system: {} propagation, tile {}, {} workers",
            S::KIND.name(),
            algorithm.name(),
            config.tile_size,
            config.effective_workers()
        );
        Ok(Self {
            resistance: ResistanceAggregator::new(layers, layout)?,
            directionality: DirectionalityMap::new(DirectionalityKind::Outbound, layout),
            registry: SourceRegistry::new(),
            aggregator: SenseMapAggregator::new(
                layout,
                config.min_intensity,
                config.idle_eviction_ticks,
            ),
            algorithm,
            pool,
            tick: 0,
            config,
        })
    }

    #[inline]
    pub fn config(&self) -> &SenseConfig {
        &self.config
    }

    #[inline]
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    #[inline]
    pub fn algorithm(&self) -> &PropagationAlgorithm {
        &self.algorithm
    }

    pub fn register_source(
        &mut self,
        definition: SenseSourceDefinition,
        position: Option<Position>,
    ) -> SourceHandle {
        self.registry.insert(definition, position)
    }

    pub fn update_source(&mut self, handle: SourceHandle, update: SourceUpdate) -> Result<(), SenseError> {
        let entry = self
            .registry
            .get_mut(handle)
            .ok_or(SenseError::UnknownSource(handle))?;
        entry.apply(update)?;
        Ok(())
    }

    pub fn remove_source(&mut self, handle: SourceHandle) -> Result<(), SenseError> {
        self.registry
            .remove(handle)
            .map(|_| ())
            .ok_or(SenseError::UnknownSource(handle))
    }

    /// Reports that world resistance changed inside `rect` on level `z`.
    pub fn on_region_dirty(&mut self, rect: Rect, z: i32) {
        self.resistance.on_region_dirty(rect, z);
    }

    /// Advances one tick: refresh resistance, refresh directionality,
    /// re-propagate dirty sources, then collect, process and end the
    /// composites.
    pub fn tick(&mut self) -> TickReport {
        match self.pool.clone() {
            Some(pool) => pool.install(|| self.run_tick()),
            None => self.run_tick(),
        }
    }

    fn run_tick(&mut self) -> TickReport {
        let tick = self.tick;
        let regions = self.resistance.process();
        for r in &regions {
            self.directionality.invalidate(r.rect, r.z);
        }
        if self.directionality.has_pending() {
            self.directionality.process(&self.resistance);
        }
        self.registry.mark_dirty_in(&regions);

        let sources_recomputed = self.recompute_sources();
        let sources_collected = self.aggregator.collect(&mut self.registry, tick);
        self.aggregator.process(&self.registry);
        let levels_evicted = self.aggregator.end(tick);

        log::debug!(
            target: "senses",
            "[tick {}] {}: {} regions, {} sources recomputed, {} collected",
            tick,
            S::KIND.name(),
            regions.len(),
            sources_recomputed,
            sources_collected
        );
        self.tick += 1;
        TickReport {
            tick,
            regions_refreshed: regions.len(),
            sources_recomputed,
            sources_collected,
            levels_evicted,
        }
    }

    fn recompute_sources(&mut self) -> usize {
        let Self {
            resistance,
            directionality,
            registry,
            algorithm,
            ..
        } = self;
        let resistance: &ResistanceAggregator<S> = resistance;
        let directionality: &DirectionalityMap = directionality;
        let algorithm: &PropagationAlgorithm = algorithm;

        let mut dirty = registry.dirty_entries();
        let count = dirty.len();
        dirty.par_iter_mut().for_each(|entry| {
            let z = entry.position().map(|p| p.z).unwrap_or(0);
            let res = resistance.level(z);
            let dirs = directionality.level(z);
            if let Err(e) = entry.recompute(algorithm, &res, &dirs) {
                log::trace!(target: "senses", "source has no data: {}", e);
            }
        });
        count
    }

    pub fn try_get_level(&self, z: i32) -> Option<SenseMapView<'_>> {
        self.aggregator.try_get_level(z)
    }

    pub fn source_data(&self, handle: SourceHandle) -> Option<&SenseSourceData> {
        self.registry.get(handle).and_then(|e| e.data())
    }

    pub fn source_state(&self, handle: SourceHandle) -> Option<SourceState> {
        self.registry.get(handle).map(|e| e.state())
    }

    /// Whether the source was part of the last composite.
    pub fn is_observed(&self, handle: SourceHandle) -> bool {
        self.registry.get(handle).is_some_and(|e| e.is_observed())
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    #[inline]
    pub fn get_resistance(&self, x: i32, y: i32, z: i32) -> f32 {
        self.resistance.get_resistance(x, y, z)
    }

    #[inline]
    pub fn get_directionality(&self, x: i32, y: i32, z: i32) -> DirectionalityInformation {
        self.directionality.get_directionality(x, y, z)
    }

    pub fn stats(&self) -> AggregatorStats {
        self.aggregator.stats()
    }
}
