use std::fmt;

/// How a signal fades over open distance. Resistance is applied on top of
/// this by the propagation algorithms.
pub trait SensePhysics: Send + Sync + fmt::Debug {
    /// Distance at which a signal of `intensity` has faded to nothing.
    fn signal_radius(&self, intensity: f32) -> f32;

    /// Signal left of `intensity` after travelling `distance` through
    /// open space. Never negative.
    fn attenuate(&self, intensity: f32, distance: f32) -> f32;
}

/// Loses `decay` units of intensity per unit of distance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinearDecayPhysics {
    decay: f32,
}

impl LinearDecayPhysics {
    pub fn new(decay: f32) -> Self {
        Self {
            decay: if decay.is_finite() && decay > 0.0 { decay } else { 1.0 },
        }
    }

    #[inline]
    pub fn decay(&self) -> f32 {
        self.decay
    }
}

impl Default for LinearDecayPhysics {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl SensePhysics for LinearDecayPhysics {
    #[inline]
    fn signal_radius(&self, intensity: f32) -> f32 {
        intensity.abs() / self.decay
    }

    #[inline]
    fn attenuate(&self, intensity: f32, distance: f32) -> f32 {
        (intensity - distance * self.decay).max(0.0)
    }
}

// Signals below this are treated as gone.
const EXPONENTIAL_CUTOFF: f32 = 0.05;

/// Halves the intensity every `half_distance` units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExponentialDecayPhysics {
    half_distance: f32,
}

impl ExponentialDecayPhysics {
    pub fn new(half_distance: f32) -> Self {
        Self {
            half_distance: if half_distance.is_finite() && half_distance > 0.0 {
                half_distance
            } else {
                1.0
            },
        }
    }

    #[inline]
    pub fn half_distance(&self) -> f32 {
        self.half_distance
    }
}

impl SensePhysics for ExponentialDecayPhysics {
    fn signal_radius(&self, intensity: f32) -> f32 {
        let i = intensity.abs();
        if i <= EXPONENTIAL_CUTOFF {
            return 0.0;
        }
        self.half_distance * (i / EXPONENTIAL_CUTOFF).log2()
    }

    fn attenuate(&self, intensity: f32, distance: f32) -> f32 {
        let v = intensity * 0.5f32.powf(distance / self.half_distance);
        if v < EXPONENTIAL_CUTOFF { 0.0 } else { v }
    }
}
