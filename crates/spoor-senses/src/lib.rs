//! Propagation of a single sense source into a bounded local field.
//!
//! Two algorithms are provided: [`FloodFillPropagation`], a label-setting
//! search that honours directionality, and [`RipplePropagation`], a
//! breadth-first spread that softens around corners. Both write into a
//! [`SenseSourceData`] owned by the caller and draw their working buffers
//! from a bounded [`ScratchPool`].
#![forbid(unsafe_code)]

use std::fmt;

use spoor_geom::Point;
use spoor_grid::{DirectionalityView, ResistanceView};

pub mod angle;
mod data;
mod definition;
mod flood_fill;
mod physics;
mod ripple;
mod scratch;

pub use data::{LocalGrid, SenseDirectionStore, SenseSourceData};
pub use definition::{
    Cone, DefinitionError, MAX_SIGNAL_RADIUS, SenseSourceDefinition, SenseSourceDefinitionBuilder,
};
pub use flood_fill::{FloodFillPropagation, FloodFillScratch};
pub use physics::{ExponentialDecayPhysics, LinearDecayPhysics, SensePhysics};
pub use ripple::{RippleMode, RipplePropagation, RippleScratch};
pub use scratch::{PooledScratch, Scratch, ScratchPool};

/// Reasons a source produced no field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropagationError {
    /// Zero intensity, or physics that fades before the first cell.
    NoSignal,
    /// The origin lies outside the known extent of the resistance level.
    OriginOutOfBounds { origin: Point },
}

impl fmt::Display for PropagationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropagationError::NoSignal => write!(f, "source carries no signal"),
            PropagationError::OriginOutOfBounds { origin } => {
                write!(f, "origin ({}, {}) is outside the resistance map", origin.x, origin.y)
            }
        }
    }
}

impl std::error::Error for PropagationError {}

/// Shared entry checks; on success `data` is cleared and sized for `def`.
pub(crate) fn begin_propagation<R: ResistanceView + ?Sized>(
    def: &SenseSourceDefinition,
    origin: Point,
    resistance: &R,
    data: &mut SenseSourceData,
) -> Result<LocalGrid, PropagationError> {
    let radius = def.signal_radius();
    if def.intensity() == 0.0 || radius <= 0 {
        return Err(PropagationError::NoSignal);
    }
    if let Some(bounds) = resistance.bounds() {
        if !bounds.contains(origin) {
            return Err(PropagationError::OriginOutOfBounds { origin });
        }
    }
    data.reset(radius);
    Ok(data.grid())
}

pub enum PropagationAlgorithm {
    FloodFill(FloodFillPropagation),
    Ripple(RipplePropagation),
}

impl PropagationAlgorithm {
    pub fn flood_fill(pool_size: usize) -> Self {
        PropagationAlgorithm::FloodFill(FloodFillPropagation::new(pool_size))
    }

    pub fn ripple(mode: RippleMode, pool_size: usize) -> Self {
        PropagationAlgorithm::Ripple(RipplePropagation::new(mode, pool_size))
    }

    pub fn name(&self) -> &'static str {
        match self {
            PropagationAlgorithm::FloodFill(_) => "flood-fill",
            PropagationAlgorithm::Ripple(_) => "ripple",
        }
    }

    /// Propagate `def` from `origin` into `data`. Ripple ignores
    /// `directionality`.
    pub fn calculate<R, D>(
        &self,
        def: &SenseSourceDefinition,
        origin: Point,
        resistance: &R,
        directionality: &D,
        data: &mut SenseSourceData,
    ) -> Result<(), PropagationError>
    where
        R: ResistanceView + ?Sized,
        D: DirectionalityView + ?Sized,
    {
        let result = match self {
            PropagationAlgorithm::FloodFill(alg) => {
                alg.calculate(def, origin, resistance, directionality, data)
            }
            PropagationAlgorithm::Ripple(alg) => alg.calculate(def, origin, resistance, data),
        };
        if let Err(e) = &result {
            log::trace!(
                target: "senses",
                "{} declined at ({}, {}): {}",
                self.name(),
                origin.x,
                origin.y,
                e
            );
        }
        result
    }
}

impl Default for PropagationAlgorithm {
    fn default() -> Self {
        PropagationAlgorithm::FloodFill(FloodFillPropagation::default())
    }
}
