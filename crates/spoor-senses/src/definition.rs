use std::fmt;
use std::sync::Arc;

use spoor_geom::{AdjacencyRule, DistanceMetric, Point};

use crate::angle::angle_degrees;
use crate::physics::SensePhysics;

// Slack for cells sitting exactly on a cone edge.
const CONE_EDGE_TOLERANCE: f32 = 0.1;

/// Largest local-grid radius a source may reach.
pub const MAX_SIGNAL_RADIUS: i32 = 1024;

#[derive(Debug, Clone, PartialEq)]
pub enum DefinitionError {
    MissingPhysics,
    InvalidIntensity(f32),
    InvalidCone { angle: f32, span: f32 },
    RadiusTooLarge { intensity: f32, radius: f32 },
}

impl fmt::Display for DefinitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefinitionError::MissingPhysics => write!(f, "sense source has no decay physics"),
            DefinitionError::InvalidIntensity(v) => write!(f, "invalid source intensity {}", v),
            DefinitionError::InvalidCone { angle, span } => {
                write!(f, "invalid cone angle={} span={}", angle, span)
            }
            DefinitionError::RadiusTooLarge { intensity, radius } => write!(
                f,
                "intensity {} reaches radius {}, limit is {}",
                intensity, radius, MAX_SIGNAL_RADIUS
            ),
        }
    }
}

impl std::error::Error for DefinitionError {}

/// Restricts a source to a wedge. Angles are in degrees, 0° east, growing
/// clockwise on the y-down grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cone {
    angle: f32,
    span: f32,
}

impl Cone {
    pub fn new(angle: f32, span: f32) -> Result<Self, DefinitionError> {
        if !angle.is_finite() || !span.is_finite() || span <= 0.0 {
            return Err(DefinitionError::InvalidCone { angle, span });
        }
        Ok(Self {
            angle: angle.rem_euclid(360.0),
            span: span.min(360.0),
        })
    }

    #[inline]
    pub fn angle(&self) -> f32 {
        self.angle
    }

    #[inline]
    pub fn span(&self) -> f32 {
        self.span
    }

    /// Whether a cell at `offset` from the origin lies inside the wedge.
    /// The origin itself always does.
    pub fn contains(&self, offset: Point) -> bool {
        if offset == Point::ZERO || self.span >= 360.0 {
            return true;
        }
        let a = angle_degrees(offset.x, offset.y);
        let diff = (a - self.angle).rem_euclid(360.0);
        let diff = if diff > 180.0 { 360.0 - diff } else { diff };
        diff <= self.span * 0.5 + CONE_EDGE_TOLERANCE
    }
}

/// Everything needed to propagate one source. The sign of `intensity`
/// is the source polarity; negative sources produce negative fields.
#[derive(Clone, Debug)]
pub struct SenseSourceDefinition {
    metric: DistanceMetric,
    adjacency: AdjacencyRule,
    intensity: f32,
    physics: Arc<dyn SensePhysics>,
    cone: Option<Cone>,
}

impl SenseSourceDefinition {
    pub fn builder(intensity: f32) -> SenseSourceDefinitionBuilder {
        SenseSourceDefinitionBuilder {
            metric: DistanceMetric::default(),
            adjacency: None,
            intensity,
            physics: None,
            cone: None,
        }
    }

    #[inline]
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    #[inline]
    pub fn adjacency(&self) -> AdjacencyRule {
        self.adjacency
    }

    #[inline]
    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    #[inline]
    pub fn physics(&self) -> &dyn SensePhysics {
        self.physics.as_ref()
    }

    #[inline]
    pub fn cone(&self) -> Option<&Cone> {
        self.cone.as_ref()
    }

    #[inline]
    pub fn polarity(&self) -> f32 {
        if self.intensity < 0.0 { -1.0 } else { 1.0 }
    }

    /// Radius of the local grid: `ceil(physics.signal_radius(|intensity|))`.
    pub fn signal_radius(&self) -> i32 {
        let r = self.physics.signal_radius(self.intensity.abs());
        if r.is_finite() && r > 0.0 {
            r.ceil() as i32
        } else {
            0
        }
    }

    pub fn with_intensity(&self, intensity: f32) -> Result<Self, DefinitionError> {
        validate_intensity(intensity)?;
        validate_radius(self.physics.as_ref(), intensity)?;
        let mut def = self.clone();
        def.intensity = intensity;
        Ok(def)
    }

    pub fn with_cone(&self, cone: Option<Cone>) -> Self {
        let mut def = self.clone();
        def.cone = cone;
        def
    }
}

fn validate_intensity(v: f32) -> Result<(), DefinitionError> {
    if v.is_finite() {
        Ok(())
    } else {
        Err(DefinitionError::InvalidIntensity(v))
    }
}

fn validate_radius(physics: &dyn SensePhysics, intensity: f32) -> Result<(), DefinitionError> {
    let radius = physics.signal_radius(intensity.abs());
    if radius > MAX_SIGNAL_RADIUS as f32 {
        return Err(DefinitionError::RadiusTooLarge { intensity, radius });
    }
    Ok(())
}

pub struct SenseSourceDefinitionBuilder {
    metric: DistanceMetric,
    adjacency: Option<AdjacencyRule>,
    intensity: f32,
    physics: Option<Arc<dyn SensePhysics>>,
    cone: Option<(f32, f32)>,
}

impl SenseSourceDefinitionBuilder {
    pub fn metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Defaults to the metric's natural adjacency when not set.
    pub fn adjacency(mut self, adjacency: AdjacencyRule) -> Self {
        self.adjacency = Some(adjacency);
        self
    }

    pub fn physics(mut self, physics: Arc<dyn SensePhysics>) -> Self {
        self.physics = Some(physics);
        self
    }

    pub fn cone(mut self, angle: f32, span: f32) -> Self {
        self.cone = Some((angle, span));
        self
    }

    pub fn build(self) -> Result<SenseSourceDefinition, DefinitionError> {
        let physics = self.physics.ok_or(DefinitionError::MissingPhysics)?;
        validate_intensity(self.intensity)?;
        validate_radius(physics.as_ref(), self.intensity)?;
        let cone = match self.cone {
            Some((angle, span)) => Some(Cone::new(angle, span)?),
            None => None,
        };
        Ok(SenseSourceDefinition {
            metric: self.metric,
            adjacency: self
                .adjacency
                .unwrap_or_else(|| self.metric.natural_adjacency()),
            intensity: self.intensity,
            physics,
            cone,
        })
    }
}
