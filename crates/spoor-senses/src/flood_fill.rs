//! Label-setting (Dijkstra) propagation: the strongest remaining signal is
//! settled first, and edges follow the directionality of the expanding cell.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use spoor_geom::{Direction, Point};
use spoor_grid::{DirectionalityView, ResistanceView};

use crate::data::{SenseDirectionStore, SenseSourceData};
use crate::definition::SenseSourceDefinition;
use crate::scratch::{Scratch, ScratchPool};
use crate::{PropagationError, begin_propagation};

#[derive(Clone, Copy, Debug)]
struct OpenNode {
    remaining: f32,
    idx: u32,
}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenNode {}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenNode {
    // Max-heap on remaining signal; lower index wins ties so the order is
    // deterministic.
    fn cmp(&self, other: &Self) -> Ordering {
        self.remaining
            .total_cmp(&other.remaining)
            .then_with(|| other.idx.cmp(&self.idx))
    }
}

#[derive(Default)]
pub struct FloodFillScratch {
    remaining: Vec<f32>,
    arrival: Vec<Direction>,
    closed: Vec<bool>,
    open: BinaryHeap<OpenNode>,
}

impl Scratch for FloodFillScratch {
    fn prepare(&mut self, cells: usize) {
        self.remaining.clear();
        self.remaining.resize(cells, 0.0);
        self.arrival.clear();
        self.arrival.resize(cells, Direction::None);
        self.closed.clear();
        self.closed.resize(cells, false);
        self.open.clear();
    }
}

pub struct FloodFillPropagation {
    pool: ScratchPool<FloodFillScratch>,
}

impl FloodFillPropagation {
    /// `pool_size == 0` sizes the scratch pool from the rayon worker count.
    pub fn new(pool_size: usize) -> Self {
        let pool = if pool_size == 0 {
            ScratchPool::with_capacity_from_workers(rayon::current_num_threads())
        } else {
            ScratchPool::new(pool_size)
        };
        Self { pool }
    }

    pub fn scratch_pool(&self) -> &ScratchPool<FloodFillScratch> {
        &self.pool
    }

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
        let grid = begin_propagation(def, origin, resistance, data)?;
        let magnitude = def.intensity().abs();
        let polarity = def.polarity();
        let metric = def.metric();
        let physics = def.physics();
        let center = grid.center();

        let mut guard = self.pool.acquire(grid.len());
        let FloodFillScratch {
            remaining,
            arrival,
            closed,
            open,
        } = &mut *guard;

        remaining[center] = magnitude;
        open.push(OpenNode {
            remaining: magnitude,
            idx: center as u32,
        });

        while let Some(node) = open.pop() {
            let idx = node.idx as usize;
            if closed[idx] {
                continue;
            }
            closed[idx] = true;

            let offset = grid.offset_of(idx);
            let here = origin + offset;
            let allowed = directionality.directionality(here);
            for &dir in def.adjacency().directions() {
                if !allowed.contains(dir) {
                    continue;
                }
                let next_offset = offset.step(dir);
                let Some(next_idx) = grid.index_of(next_offset) else {
                    continue;
                };
                if closed[next_idx] {
                    continue;
                }
                if let Some(cone) = def.cone() {
                    if !cone.contains(next_offset) {
                        continue;
                    }
                }
                let res = resistance.resistance(here.step(dir));
                if !(res < 1.0) {
                    continue;
                }
                let (dx, dy) = dir.delta();
                let next = physics.attenuate(node.remaining, metric.calculate(dx, dy))
                    * (1.0 - res.max(0.0));
                if next > 0.0 && next > remaining[next_idx] {
                    remaining[next_idx] = next;
                    arrival[next_idx] = dir;
                    open.push(OpenNode {
                        remaining: next,
                        idx: next_idx as u32,
                    });
                }
            }
        }

        for idx in 0..grid.len() {
            if !closed[idx] {
                continue;
            }
            let offset = grid.offset_of(idx);
            let store = SenseDirectionStore::new(arrival[idx])
                .with_obstructed(resistance.resistance(origin + offset) >= 1.0)
                .with_self_illuminating(idx == center);
            data.write_index(idx, polarity * remaining[idx], store);
        }
        Ok(())
    }
}

impl Default for FloodFillPropagation {
    fn default() -> Self {
        Self::new(0)
    }
}
