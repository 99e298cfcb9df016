//! Tiled per-level grids and the caches derived from world resistance:
//! aggregated resistance and per-cell directionality.
#![forbid(unsafe_code)]

use std::fmt;

mod channel;
pub mod directionality;
pub mod resistance;
mod tiles;

pub use channel::{ChannelKind, Noise, SenseChannel, Smell, Touch, Vision};
pub use directionality::{
    AllDirections, CostSource, DirectionalityInformation, DirectionalityKind, DirectionalityMap,
    DirectionalityView, compute_inbound, compute_outbound,
};
pub use resistance::{
    DirtyRegion, ResistanceAggregator, ResistanceLayer, ResistanceLevelView, ResistanceView,
};
pub use tiles::{Tile, TileKey, TileLayout, TiledGrid};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    /// Tile sizes must be a power of two between 1 and 4096.
    InvalidTileSize(u32),
    /// A resistance aggregator needs at least one layer.
    NoLayers,
}

impl fmt::Display for GridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridError::InvalidTileSize(s) => {
                write!(f, "tile size {} is not a power of two in 1..=4096", s)
            }
            GridError::NoLayers => write!(f, "resistance aggregation requires at least one layer"),
        }
    }
}

impl std::error::Error for GridError {}
