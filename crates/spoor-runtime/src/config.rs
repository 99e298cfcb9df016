use serde::Deserialize;
use std::error::Error;
use std::fs;
use std::path::Path;

use spoor_grid::TileLayout;
use spoor_senses::{PropagationAlgorithm, RippleMode};

use crate::SenseError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmKind {
    #[default]
    FloodFill,
    Ripple,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SenseConfig {
    #[serde(default = "default_tile_size")]
    pub tile_size: u32,
    /// A level no source touched for more than this many ticks is dropped.
    #[serde(default = "default_idle_eviction_ticks")]
    pub idle_eviction_ticks: u64,
    /// Contributions weaker than this are not blitted into composites.
    #[serde(default = "default_min_intensity")]
    pub min_intensity: f32,
    /// 0 runs on the global rayon pool.
    #[serde(default)]
    pub worker_threads: usize,
    /// 0 sizes scratch pools at twice the worker count.
    #[serde(default)]
    pub scratch_pool_size: usize,
    #[serde(default)]
    pub algorithm: AlgorithmKind,
    #[serde(default)]
    pub ripple_mode: RippleMode,
}

fn default_tile_size() -> u32 {
    64
}

fn default_idle_eviction_ticks() -> u64 {
    50
}

fn default_min_intensity() -> f32 {
    0.005
}

impl Default for SenseConfig {
    fn default() -> Self {
        Self {
            tile_size: default_tile_size(),
            idle_eviction_ticks: default_idle_eviction_ticks(),
            min_intensity: default_min_intensity(),
            worker_threads: 0,
            scratch_pool_size: 0,
            algorithm: AlgorithmKind::default(),
            ripple_mode: RippleMode::default(),
        }
    }
}

impl SenseConfig {
    pub fn validate(&self) -> Result<(), SenseError> {
        TileLayout::new(self.tile_size)?;
        if !self.min_intensity.is_finite() || self.min_intensity < 0.0 {
            return Err(SenseError::Config(format!(
                "min_intensity must be a non-negative number, got {}",
                self.min_intensity
            )));
        }
        if self.idle_eviction_ticks == 0 {
            return Err(SenseError::Config(
                "idle_eviction_ticks must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn layout(&self) -> Result<TileLayout, SenseError> {
        Ok(TileLayout::new(self.tile_size)?)
    }

    pub fn effective_workers(&self) -> usize {
        if self.worker_threads > 0 {
            self.worker_threads
        } else {
            rayon::current_num_threads().max(1)
        }
    }

    pub fn effective_scratch_pool_size(&self) -> usize {
        if self.scratch_pool_size > 0 {
            self.scratch_pool_size
        } else {
            self.effective_workers() * 2
        }
    }

    pub fn build_algorithm(&self) -> PropagationAlgorithm {
        let pool = self.effective_scratch_pool_size();
        match self.algorithm {
            AlgorithmKind::FloodFill => PropagationAlgorithm::flood_fill(pool),
            AlgorithmKind::Ripple => PropagationAlgorithm::ripple(self.ripple_mode, pool),
        }
    }
}

pub fn load_from_path(path: &Path) -> Result<SenseConfig, Box<dyn Error>> {
    let s = fs::read_to_string(path)?;
    let cfg: SenseConfig = toml::from_str(&s)?;
    cfg.validate()?;
    Ok(cfg)
}
