//! Slot storage for sense sources with generational handles.

use spoor_geom::{Position, Rect};
use spoor_grid::{DirectionalityView, DirtyRegion, ResistanceView};
use spoor_senses::{PropagationAlgorithm, PropagationError, SenseSourceData, SenseSourceDefinition};

/// Stable reference to a registered source. A handle stops resolving once
/// its source is removed, even if the slot is reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SourceHandle {
    index: u32,
    generation: u32,
}

impl SourceHandle {
    #[inline]
    pub fn index(self) -> u32 {
        self.index
    }

    #[inline]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceState {
    /// Awaiting propagation on the next tick.
    Dirty,
    /// Holds a field for its current definition and position.
    Ready,
    /// Has no position, is disabled, or propagation declined.
    NoData,
}

/// Changes applied through [`crate::SenseSystem::update_source`]. Every
/// update marks the source dirty.
#[derive(Clone, Debug)]
pub enum SourceUpdate {
    Definition(SenseSourceDefinition),
    Position(Option<Position>),
    Intensity(f32),
    Enabled(bool),
}

pub struct SourceEntry {
    definition: SenseSourceDefinition,
    position: Option<Position>,
    enabled: bool,
    data: SenseSourceData,
    state: SourceState,
    observed: bool,
}

impl SourceEntry {
    fn new(definition: SenseSourceDefinition, position: Option<Position>) -> Self {
        Self {
            definition,
            position,
            enabled: true,
            data: SenseSourceData::new(0),
            state: SourceState::Dirty,
            observed: false,
        }
    }

    #[inline]
    pub fn definition(&self) -> &SenseSourceDefinition {
        &self.definition
    }

    #[inline]
    pub fn position(&self) -> Option<Position> {
        self.position
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[inline]
    pub fn state(&self) -> SourceState {
        self.state
    }

    #[inline]
    pub fn is_observed(&self) -> bool {
        self.observed
    }

    /// The propagated field, only while the source is ready.
    #[inline]
    pub fn data(&self) -> Option<&SenseSourceData> {
        match self.state {
            SourceState::Ready => Some(&self.data),
            _ => None,
        }
    }

    /// Whether the source takes part in composites this tick.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.enabled && self.position.is_some() && self.state == SourceState::Ready
    }

    /// World rectangle and level the source could light, if positioned.
    pub fn reach(&self) -> Option<(Rect, i32)> {
        let pos = self.position?;
        let rect = match self.state {
            SourceState::Ready => self.data.bounds(pos.point()),
            _ => Rect::around(pos.point(), self.definition.signal_radius()),
        };
        Some((rect, pos.z))
    }

    pub(crate) fn apply(&mut self, update: SourceUpdate) -> Result<(), spoor_senses::DefinitionError> {
        match update {
            SourceUpdate::Definition(def) => self.definition = def,
            SourceUpdate::Position(pos) => self.position = pos,
            SourceUpdate::Intensity(v) => self.definition = self.definition.with_intensity(v)?,
            SourceUpdate::Enabled(on) => self.enabled = on,
        }
        self.state = SourceState::Dirty;
        Ok(())
    }

    #[inline]
    pub(crate) fn set_observed(&mut self, observed: bool) {
        self.observed = observed;
    }

    /// Re-propagates the source against the views of its own level.
    pub(crate) fn recompute<R, D>(
        &mut self,
        algorithm: &PropagationAlgorithm,
        resistance: &R,
        directionality: &D,
    ) -> Result<(), PropagationError>
    where
        R: ResistanceView + ?Sized,
        D: DirectionalityView + ?Sized,
    {
        let Some(pos) = self.position.filter(|_| self.enabled) else {
            self.state = SourceState::NoData;
            return Err(PropagationError::NoSignal);
        };
        let result = algorithm.calculate(
            &self.definition,
            pos.point(),
            resistance,
            directionality,
            &mut self.data,
        );
        self.state = match result {
            Ok(()) => SourceState::Ready,
            Err(_) => SourceState::NoData,
        };
        result
    }
}

struct Slot {
    generation: u32,
    entry: Option<SourceEntry>,
}

#[derive(Default)]
pub struct SourceRegistry {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, definition: SenseSourceDefinition, position: Option<Position>) -> SourceHandle {
        let entry = SourceEntry::new(definition, position);
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entry = Some(entry);
            return SourceHandle {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            entry: Some(entry),
        });
        SourceHandle {
            index,
            generation: 0,
        }
    }

    pub fn remove(&mut self, handle: SourceHandle) -> Option<SourceEntry> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.live -= 1;
        Some(entry)
    }

    pub fn get(&self, handle: SourceHandle) -> Option<&SourceEntry> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.entry.as_ref()
    }

    pub fn get_mut(&mut self, handle: SourceHandle) -> Option<&mut SourceEntry> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.entry.as_mut()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Live sources in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (SourceHandle, &SourceEntry)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.entry.as_ref().map(|e| {
                (
                    SourceHandle {
                        index: i as u32,
                        generation: slot.generation,
                    },
                    e,
                )
            })
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (SourceHandle, &mut SourceEntry)> {
        self.slots.iter_mut().enumerate().filter_map(|(i, slot)| {
            let generation = slot.generation;
            slot.entry.as_mut().map(|e| {
                (
                    SourceHandle {
                        index: i as u32,
                        generation,
                    },
                    e,
                )
            })
        })
    }

    /// Marks every source whose reach overlaps a processed region dirty.
    /// Returns the number of sources newly marked.
    pub fn mark_dirty_in(&mut self, regions: &[DirtyRegion]) -> usize {
        if regions.is_empty() {
            return 0;
        }
        let mut marked = 0;
        for (_, entry) in self.iter_mut() {
            if entry.state == SourceState::Dirty {
                continue;
            }
            let Some((rect, z)) = entry.reach() else {
                continue;
            };
            if regions.iter().any(|r| r.z == z && r.rect.intersects(&rect)) {
                entry.state = SourceState::Dirty;
                marked += 1;
            }
        }
        marked
    }

    /// Sources awaiting propagation.
    pub(crate) fn dirty_entries(&mut self) -> Vec<&mut SourceEntry> {
        self.slots
            .iter_mut()
            .filter_map(|s| s.entry.as_mut())
            .filter(|e| e.state == SourceState::Dirty)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spoor_geom::Point;
    use spoor_grid::AllDirections;
    use spoor_senses::LinearDecayPhysics;
    use std::sync::Arc;

    fn def(intensity: f32) -> SenseSourceDefinition {
        SenseSourceDefinition::builder(intensity)
            .physics(Arc::new(LinearDecayPhysics::default()))
            .build()
            .unwrap()
    }

    #[test]
    fn stale_handles_are_rejected_after_slot_reuse() {
        let mut reg = SourceRegistry::new();
        let a = reg.insert(def(3.0), None);
        assert!(reg.remove(a).is_some());
        let b = reg.insert(def(4.0), None);
        assert_eq!(a.index(), b.index());
        assert_ne!(a, b);
        assert!(reg.get(a).is_none());
        assert!(reg.remove(a).is_none());
        assert_eq!(reg.get(b).map(|e| e.definition().intensity()), Some(4.0));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn recompute_without_position_has_no_data() {
        let mut reg = SourceRegistry::new();
        let h = reg.insert(def(3.0), None);
        let alg = PropagationAlgorithm::flood_fill(1);
        let open = |_p: Point| 0.0f32;
        for entry in reg.dirty_entries() {
            assert!(entry.recompute(&alg, &open, &AllDirections).is_err());
        }
        let entry = reg.get(h).unwrap();
        assert_eq!(entry.state(), SourceState::NoData);
        assert!(entry.data().is_none());
        assert!(entry.reach().is_none());
    }

    #[test]
    fn regions_mark_overlapping_sources_dirty() {
        let mut reg = SourceRegistry::new();
        let near = reg.insert(def(3.0), Some(Position::new(0, 0, 0)));
        let far = reg.insert(def(3.0), Some(Position::new(40, 0, 0)));
        let other_level = reg.insert(def(3.0), Some(Position::new(0, 0, 1)));
        let alg = PropagationAlgorithm::flood_fill(1);
        let open = |_p: Point| 0.0f32;
        for entry in reg.dirty_entries() {
            entry.recompute(&alg, &open, &AllDirections).unwrap();
        }
        let regions = [DirtyRegion {
            rect: Rect::new(2, 2, 4, 4),
            z: 0,
        }];
        assert_eq!(reg.mark_dirty_in(&regions), 1);
        assert_eq!(reg.get(near).unwrap().state(), SourceState::Dirty);
        assert_eq!(reg.get(far).unwrap().state(), SourceState::Ready);
        assert_eq!(reg.get(other_level).unwrap().state(), SourceState::Ready);
    }

    #[test]
    fn updates_mark_dirty_and_validate() {
        let mut reg = SourceRegistry::new();
        let h = reg.insert(def(3.0), None);
        let entry = reg.get_mut(h).unwrap();
        assert!(entry.apply(SourceUpdate::Intensity(f32::INFINITY)).is_err());
        entry.apply(SourceUpdate::Enabled(false)).unwrap();
        assert!(!entry.is_enabled());
        assert_eq!(entry.state(), SourceState::Dirty);
    }
}
