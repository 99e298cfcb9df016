//! TOML scenarios: ASCII levels, per-channel furniture resistance and a
//! list of sources, run through a [`SenseSystem`] for a number of ticks.

use std::error::Error;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use hashbrown::{HashMap, HashSet};
use serde::Deserialize;
use spoor_geom::{AdjacencyRule, DistanceMetric, Position, Rect};
use spoor_grid::{ChannelKind, ResistanceLayer, SenseChannel};
use spoor_runtime::{SenseConfig, SenseError, SenseSystem, SourceHandle, SourceUpdate, TickReport};
use spoor_senses::{
    DefinitionError, ExponentialDecayPhysics, LinearDecayPhysics, SensePhysics,
    SenseSourceDefinition,
};

pub const WALL: u8 = b'#';
pub const FURNITURE: u8 = b'+';

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelName {
    #[default]
    Vision,
    Smell,
    Noise,
    Touch,
}

/// Resistance a glyph contributes on each channel.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ChannelResistance {
    pub vision: f32,
    pub smell: f32,
    pub noise: f32,
    pub touch: f32,
}

impl Default for ChannelResistance {
    fn default() -> Self {
        Self {
            vision: 0.5,
            smell: 0.2,
            noise: 0.3,
            touch: 1.0,
        }
    }
}

impl ChannelResistance {
    pub const fn uniform(v: f32) -> Self {
        Self {
            vision: v,
            smell: v,
            noise: v,
            touch: v,
        }
    }

    #[inline]
    pub fn get(&self, channel: ChannelKind) -> f32 {
        match channel {
            ChannelKind::Vision => self.vision,
            ChannelKind::Smell => self.smell,
            ChannelKind::Noise => self.noise,
            ChannelKind::Touch => self.touch,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct LevelSpec {
    #[serde(default)]
    pub z: i32,
    pub rows: Vec<String>,
}

impl LevelSpec {
    /// Bounding rectangle of the rows; ragged rows are padded with open
    /// cells.
    pub fn rect(&self) -> Rect {
        let width = self.rows.iter().map(|r| r.len()).max().unwrap_or(0);
        Rect::new(0, 0, width as i32, self.rows.len() as i32)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhysicsKind {
    #[default]
    Linear,
    Exponential,
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct ConeSpec {
    pub angle: f32,
    pub span: f32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SourceSpec {
    #[serde(default)]
    pub name: String,
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub z: i32,
    pub intensity: f32,
    #[serde(default)]
    pub metric: DistanceMetric,
    #[serde(default)]
    pub adjacency: Option<AdjacencyRule>,
    #[serde(default)]
    pub physics: PhysicsKind,
    /// Per-unit decay for linear physics, half distance for exponential.
    #[serde(default = "default_decay")]
    pub decay: f32,
    #[serde(default)]
    pub cone: Option<ConeSpec>,
    /// Positions taken on ticks 1, 2, ... after the starting cell.
    #[serde(default)]
    pub path: Vec<[i32; 2]>,
}

fn default_decay() -> f32 {
    1.0
}

impl SourceSpec {
    pub fn definition(&self) -> Result<SenseSourceDefinition, DefinitionError> {
        let physics: Arc<dyn SensePhysics> = match self.physics {
            PhysicsKind::Linear => Arc::new(LinearDecayPhysics::new(self.decay)),
            PhysicsKind::Exponential => Arc::new(ExponentialDecayPhysics::new(self.decay)),
        };
        let mut builder = SenseSourceDefinition::builder(self.intensity)
            .metric(self.metric)
            .physics(physics);
        if let Some(adjacency) = self.adjacency {
            builder = builder.adjacency(adjacency);
        }
        if let Some(cone) = self.cone {
            builder = builder.cone(cone.angle, cone.span);
        }
        builder.build()
    }

    pub fn position_at(&self, tick: u64) -> Position {
        if tick == 0 || self.path.is_empty() {
            return Position::new(self.x, self.y, self.z);
        }
        let i = ((tick - 1) as usize).min(self.path.len() - 1);
        let [x, y] = self.path[i];
        Position::new(x, y, self.z)
    }

    /// The new position if the source moves on `tick`.
    pub fn moved_at(&self, tick: u64) -> Option<Position> {
        if tick == 0 || tick as usize > self.path.len() {
            return None;
        }
        Some(self.position_at(tick))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioError {
    NoLevels,
    DuplicateLevel(i32),
    EmptyLevel(i32),
}

impl fmt::Display for ScenarioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScenarioError::NoLevels => write!(f, "scenario defines no [[levels]]"),
            ScenarioError::DuplicateLevel(z) => write!(f, "level z={} is defined twice", z),
            ScenarioError::EmptyLevel(z) => write!(f, "level z={} has no rows", z),
        }
    }
}

impl Error for ScenarioError {}

#[derive(Clone, Debug, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub sense: SenseConfig,
    #[serde(default)]
    pub channel: ChannelName,
    #[serde(default)]
    pub furniture: ChannelResistance,
    pub levels: Vec<LevelSpec>,
    #[serde(default)]
    pub sources: Vec<SourceSpec>,
}

impl Scenario {
    pub fn parse(s: &str) -> Result<Scenario, Box<dyn Error>> {
        let scenario: Scenario = toml::from_str(s)?;
        scenario.validate()?;
        scenario.sense.validate()?;
        Ok(scenario)
    }

    pub fn load(path: &Path) -> Result<Scenario, Box<dyn Error>> {
        let s = fs::read_to_string(path)?;
        Scenario::parse(&s)
    }

    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.levels.is_empty() {
            return Err(ScenarioError::NoLevels);
        }
        let mut seen = HashSet::new();
        for level in &self.levels {
            if level.rows.is_empty() {
                return Err(ScenarioError::EmptyLevel(level.z));
            }
            if !seen.insert(level.z) {
                return Err(ScenarioError::DuplicateLevel(level.z));
            }
        }
        Ok(())
    }

    pub fn level(&self, z: i32) -> Option<&LevelSpec> {
        self.levels.iter().find(|l| l.z == z)
    }

    /// Wall and furniture layers reading the scenario's glyphs.
    pub fn layers(&self) -> Vec<Arc<dyn ResistanceLayer>> {
        let map = Arc::new(AsciiMap::new(&self.levels));
        vec![
            Arc::new(GlyphLayer {
                name: "walls",
                glyph: WALL,
                values: ChannelResistance::uniform(1.0),
                outside: 1.0,
                map: map.clone(),
            }),
            Arc::new(GlyphLayer {
                name: "furniture",
                glyph: FURNITURE,
                values: self.furniture,
                outside: 0.0,
                map,
            }),
        ]
    }

    /// Builds a system for channel `S`, marks every level dirty, registers
    /// the sources and runs `ticks` ticks (at least one), moving sources
    /// along their paths.
    pub fn simulate<S: SenseChannel>(&self, ticks: u64) -> Result<Simulation<S>, SenseError> {
        let mut system = SenseSystem::<S>::new(self.sense.clone(), self.layers())?;
        for level in &self.levels {
            system.on_region_dirty(level.rect(), level.z);
        }
        let mut handles = Vec::with_capacity(self.sources.len());
        for spec in &self.sources {
            let definition = spec.definition()?;
            handles.push(system.register_source(definition, Some(spec.position_at(0))));
        }

        let mut last = TickReport::default();
        for tick in 0..ticks.max(1) {
            for (spec, &handle) in self.sources.iter().zip(&handles) {
                if let Some(pos) = spec.moved_at(tick) {
                    log::debug!(target: "senses", "[tick {}] {} moves to {:?}", tick, spec.name, pos);
                    system.update_source(handle, SourceUpdate::Position(Some(pos)))?;
                }
            }
            last = system.tick();
        }
        Ok(Simulation {
            system,
            handles,
            last,
        })
    }
}

pub struct Simulation<S: SenseChannel> {
    pub system: SenseSystem<S>,
    pub handles: Vec<SourceHandle>,
    pub last: TickReport,
}

struct AsciiMap {
    levels: HashMap<i32, Vec<Vec<u8>>>,
}

impl AsciiMap {
    fn new(levels: &[LevelSpec]) -> Self {
        let levels = levels
            .iter()
            .map(|l| (l.z, l.rows.iter().map(|r| r.as_bytes().to_vec()).collect()))
            .collect();
        Self { levels }
    }

    /// `None` outside the level's rows.
    fn glyph(&self, x: i32, y: i32, z: i32) -> Option<u8> {
        if x < 0 || y < 0 {
            return None;
        }
        let rows = self.levels.get(&z)?;
        let row = rows.get(y as usize)?;
        Some(row.get(x as usize).copied().unwrap_or(b'.'))
    }
}

struct GlyphLayer {
    name: &'static str,
    glyph: u8,
    values: ChannelResistance,
    outside: f32,
    map: Arc<AsciiMap>,
}

impl ResistanceLayer for GlyphLayer {
    fn name(&self) -> &str {
        self.name
    }

    fn resistance(&self, channel: ChannelKind, x: i32, y: i32, z: i32) -> f32 {
        match self.map.glyph(x, y, z) {
            Some(g) if g == self.glyph => self.values.get(channel),
            Some(_) => 0.0,
            None => self.outside,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spoor_geom::Point;
    use spoor_grid::{Smell, Vision};
    use spoor_runtime::SourceState;

    const HALL: &str = r########"
        [sense]
        tile_size = 8

        [[levels]]
        rows = [
            "#######",
            "..+....",
            "#######",
        ]

        [[sources]]
        name = "lamp"
        x = 0
        y = 1
        intensity = 10.0
    "########;

    #[test]
    fn defaults_fill_missing_fields() {
        let s = Scenario::parse(HALL).unwrap();
        assert_eq!(s.channel, ChannelName::Vision);
        assert_eq!(s.sense.tile_size, 8);
        assert_eq!(s.sense.idle_eviction_ticks, 50);
        assert_eq!(s.furniture, ChannelResistance::default());
        let src = &s.sources[0];
        assert_eq!(src.metric, DistanceMetric::Chebyshev);
        assert_eq!(src.physics, PhysicsKind::Linear);
        assert_eq!(src.decay, 1.0);
        assert_eq!(s.levels[0].rect(), Rect::new(0, 0, 7, 3));
    }

    #[test]
    fn invalid_scenarios_are_rejected() {
        assert!(Scenario::parse("levels = []").is_err());
        let dup = r#"
            [[levels]]
            rows = ["..."]
            [[levels]]
            rows = ["..."]
        "#;
        let err = Scenario::parse(dup).unwrap_err();
        assert_eq!(err.to_string(), "level z=0 is defined twice");
        let bad_sense = "[sense]\ntile_size = 10\n[[levels]]\nrows = [\".\"]";
        assert!(Scenario::parse(bad_sense).is_err());
    }

    #[test]
    fn furniture_dims_per_channel() {
        let s = Scenario::parse(HALL).unwrap();

        let vision = s.simulate::<Vision>(1).unwrap();
        let view = vision.system.try_get_level(0).unwrap();
        assert_eq!(view.intensity(1, 1), 9.0);
        assert_eq!(view.intensity(2, 1), 4.0);
        assert_eq!(view.intensity(3, 1), 3.0);

        let smell = s.simulate::<Smell>(1).unwrap();
        let view = smell.system.try_get_level(0).unwrap();
        assert!((view.intensity(2, 1) - 6.4).abs() < 1e-4);
        assert!((view.intensity(3, 1) - 5.4).abs() < 1e-4);
        assert_eq!(view.intensity(3, 0), 0.0);
    }

    #[test]
    fn sources_follow_their_path() {
        let mut s = Scenario::parse(HALL).unwrap();
        s.sources[0].path = vec![[3, 1], [5, 1]];
        assert_eq!(s.sources[0].position_at(0), Position::new(0, 1, 0));
        assert_eq!(s.sources[0].position_at(7), Position::new(5, 1, 0));
        assert_eq!(s.sources[0].moved_at(2), Some(Position::new(5, 1, 0)));
        assert_eq!(s.sources[0].moved_at(3), None);

        let sim = s.simulate::<Vision>(3).unwrap();
        assert_eq!(sim.last.tick, 2);
        assert_eq!(sim.last.sources_recomputed, 1);
        let h = sim.handles[0];
        assert_eq!(sim.system.source_state(h), Some(SourceState::Ready));
        let view = sim.system.try_get_level(0).unwrap();
        assert_eq!(view.intensity(5, 1), 10.0);
        assert!(view.query(5, 1).direction.is_self_illuminating());
        assert_eq!(
            sim.system.source_data(h).map(|d| d.intensity(Point::new(1, 0))),
            Some(9.0)
        );
    }

    #[test]
    fn tavern_demo_runs() {
        let s = Scenario::parse(include_str!("../demos/tavern.toml")).unwrap();
        let sim = s.simulate::<Vision>(3).unwrap();
        for h in &sim.handles {
            assert_eq!(sim.system.source_state(*h), Some(SourceState::Ready));
        }
        let ground = sim.system.try_get_level(0).unwrap();
        assert_eq!(ground.intensity(4, 3), 12.0);
        assert!(ground.intensity(15, 7) < 0.0);
        let cellar = sim.system.try_get_level(-1).unwrap();
        assert_eq!(cellar.intensity(2, 2), 5.0);
        assert_eq!(cellar.intensity(4, 2), 0.0);
    }

    #[test]
    fn sources_off_the_map_have_no_data() {
        let mut s = Scenario::parse(HALL).unwrap();
        s.sources[0].z = 4;
        let sim = s.simulate::<Vision>(1).unwrap();
        assert_eq!(sim.system.source_state(sim.handles[0]), Some(SourceState::NoData));
        assert!(sim.system.try_get_level(4).is_none());
    }
}
