//! Breadth-first ripple: each newly reached cell takes the best signal
//! offered by its few neighbours closest to the source, so light bends
//! softly around corners and obstacles cast shadows.
//!
//! The spread advances in waves. Every cell touched by a wave reads the
//! field as it stood before that wave, and neighbours tied on distance to
//! the source are sampled together, so the result does not depend on the
//! order in which directions are scanned.

use serde::Deserialize;
use spoor_geom::{Direction, Point};
use spoor_grid::ResistanceView;

use crate::data::{LocalGrid, SenseDirectionStore, SenseSourceData};
use crate::definition::SenseSourceDefinition;
use crate::scratch::{Scratch, ScratchPool};
use crate::{PropagationError, begin_propagation};

/// How many origin-nearest neighbours a cell draws its signal from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RippleMode {
    Tight,
    #[default]
    Regular,
    Loose,
    VeryLoose,
}

impl RippleMode {
    #[inline]
    pub fn neighbor_count(self) -> usize {
        match self {
            RippleMode::Tight => 1,
            RippleMode::Regular => 2,
            RippleMode::Loose => 3,
            RippleMode::VeryLoose => 6,
        }
    }
}

#[derive(Default)]
pub struct RippleScratch {
    light: Vec<f32>,
    indirect: Vec<bool>,
    arrival: Vec<Direction>,
    // Wave number that last evaluated each cell.
    visited: Vec<u32>,
    frontier: Vec<usize>,
    next: Vec<usize>,
    updates: Vec<(usize, NearLight)>,
}

impl Scratch for RippleScratch {
    fn prepare(&mut self, cells: usize) {
        self.light.clear();
        self.light.resize(cells, 0.0);
        self.indirect.clear();
        self.indirect.resize(cells, false);
        self.arrival.clear();
        self.arrival.resize(cells, Direction::None);
        self.visited.clear();
        self.visited.resize(cells, 0);
        self.frontier.clear();
        self.next.clear();
        self.updates.clear();
    }
}

#[derive(Clone, Copy)]
struct NearLight {
    value: f32,
    arrival: Direction,
    indirect: bool,
}

pub struct RipplePropagation {
    mode: RippleMode,
    pool: ScratchPool<RippleScratch>,
}

impl RipplePropagation {
    pub fn new(mode: RippleMode, pool_size: usize) -> Self {
        let pool = if pool_size == 0 {
            ScratchPool::with_capacity_from_workers(rayon::current_num_threads())
        } else {
            ScratchPool::new(pool_size)
        };
        Self { mode, pool }
    }

    #[inline]
    pub fn mode(&self) -> RippleMode {
        self.mode
    }

    pub fn scratch_pool(&self) -> &ScratchPool<RippleScratch> {
        &self.pool
    }

    pub fn calculate<R>(
        &self,
        def: &SenseSourceDefinition,
        origin: Point,
        resistance: &R,
        data: &mut SenseSourceData,
    ) -> Result<(), PropagationError>
    where
        R: ResistanceView + ?Sized,
    {
        let grid = begin_propagation(def, origin, resistance, data)?;
        let radius = grid.radius() as f32;
        let center = grid.center();

        let mut guard = self.pool.acquire(grid.len());
        let RippleScratch {
            light,
            indirect,
            arrival,
            visited,
            frontier,
            next,
            updates,
        } = &mut *guard;
        light[center] = def.intensity().abs();
        frontier.push(center);

        let mut wave = 0u32;
        while !frontier.is_empty() {
            wave += 1;
            for &idx in frontier.iter() {
                if light[idx] <= 0.0 || indirect[idx] {
                    continue;
                }
                let offset = grid.offset_of(idx);
                for &dir in def.adjacency().directions() {
                    let target = offset.step(dir);
                    let Some(target_idx) = grid.index_of(target) else {
                        continue;
                    };
                    if visited[target_idx] == wave {
                        continue;
                    }
                    if def.metric().calculate(target.x, target.y) > radius {
                        continue;
                    }
                    if let Some(cone) = def.cone() {
                        if !cone.contains(target) {
                            continue;
                        }
                    }
                    visited[target_idx] = wave;
                    let near = self.near_light(light, indirect, grid, target, def, origin, resistance);
                    if near.value > light[target_idx] {
                        updates.push((target_idx, near));
                    }
                }
            }

            next.clear();
            for (idx, near) in updates.drain(..) {
                light[idx] = near.value;
                arrival[idx] = near.arrival;
                indirect[idx] = near.indirect;
                if resistance.resistance(origin + grid.offset_of(idx)) < 1.0 {
                    next.push(idx);
                }
            }
            std::mem::swap(frontier, next);
        }

        let polarity = def.polarity();
        for idx in 0..grid.len() {
            let value = light[idx];
            if value <= 0.0 {
                continue;
            }
            let offset = grid.offset_of(idx);
            let store = SenseDirectionStore::new(arrival[idx])
                .with_obstructed(resistance.resistance(origin + offset) >= 1.0)
                .with_self_illuminating(idx == center);
            data.write_index(idx, polarity * value, store);
        }
        Ok(())
    }

    /// Best signal `target` can draw from its origin-nearest neighbours.
    /// Neighbours tied with the last one sampled are sampled as well.
    #[allow(clippy::too_many_arguments)]
    fn near_light<R: ResistanceView + ?Sized>(
        &self,
        light: &[f32],
        indirect: &[bool],
        grid: LocalGrid,
        target: Point,
        def: &SenseSourceDefinition,
        origin: Point,
        resistance: &R,
    ) -> NearLight {
        if target == Point::ZERO {
            return NearLight {
                value: def.intensity().abs(),
                arrival: Direction::None,
                indirect: false,
            };
        }

        let mut candidates: [(i32, Direction, Point, usize); 8] =
            [(0, Direction::None, Point::ZERO, 0); 8];
        let mut count = 0;
        for &dir in def.adjacency().directions() {
            let c = target.step(dir);
            if let Some(idx) = grid.index_of(c) {
                candidates[count] = (c.x * c.x + c.y * c.y, dir, c, idx);
                count += 1;
            }
        }
        let candidates = &mut candidates[..count];
        candidates.sort_by_key(|&(d2, ..)| d2);
        let k = self.mode.neighbor_count().min(count);
        let cutoff = match k {
            0 => i32::MIN,
            _ => candidates[k - 1].0,
        };

        let mut best = 0.0f32;
        let mut arrival = Direction::None;
        let mut lit = 0;
        let mut shadowed = 0;
        for &(_, dir, c, idx) in candidates.iter().take_while(|&&(d2, ..)| d2 <= cutoff) {
            let signal = light[idx];
            if signal <= 0.0 {
                continue;
            }
            lit += 1;
            if indirect[idx] {
                shadowed += 1;
            }
            let res = if c == Point::ZERO {
                0.0
            } else {
                resistance.resistance(origin + c).clamp(0.0, 1.0)
            };
            let step = def.metric().calculate(target.x - c.x, target.y - c.y);
            let value = def.physics().attenuate(signal, step) * (1.0 - res);
            if value > best {
                best = value;
                arrival = dir.opposite();
            }
        }

        let blocked = !(resistance.resistance(origin + target) < 1.0);
        NearLight {
            value: best,
            arrival,
            indirect: blocked || (lit > 0 && shadowed >= lit),
        }
    }
}

impl Default for RipplePropagation {
    fn default() -> Self {
        Self::new(RippleMode::default(), 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_neighbor_counts() {
        assert_eq!(RippleMode::Tight.neighbor_count(), 1);
        assert_eq!(RippleMode::default().neighbor_count(), 2);
        assert_eq!(RippleMode::Loose.neighbor_count(), 3);
        assert_eq!(RippleMode::VeryLoose.neighbor_count(), 6);
    }
}
