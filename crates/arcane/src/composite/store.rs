use serde::{Deserialize, Serialize};

use super::{Composite, CompositeId, Kind};
use crate::types::{Lineage, Predefined};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Entry {
    generation: u32,
    composite: Option<Composite>,
}

/// Arena of composites addressed by [`CompositeId`].
///
/// Slots of destroyed composites stay as gaps; their index is never handed
/// out again within the same store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Store {
    entries: Vec<Entry>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, composite: Composite) -> CompositeId {
        let index = self.entries.len() as u32;
        self.entries.push(Entry {
            generation: 0,
            composite: Some(composite),
        });
        CompositeId { index, generation: 0 }
    }

    /// Removes the composite, leaving a gap and invalidating its handle.
    pub fn free(&mut self, id: CompositeId) -> Option<Composite> {
        if !self.is_valid(id) {
            return None;
        }
        let entry = &mut self.entries[id.index as usize];
        entry.generation += 1;
        entry.composite.take()
    }

    pub fn is_valid(&self, id: CompositeId) -> bool {
        self.entries
            .get(id.index as usize)
            .is_some_and(|entry| entry.generation == id.generation && entry.composite.is_some())
    }

    pub fn get(&self, id: CompositeId) -> Option<&Composite> {
        let entry = self.entries.get(id.index as usize)?;
        if entry.generation != id.generation {
            return None;
        }
        entry.composite.as_ref()
    }

    pub fn get_mut(&mut self, id: CompositeId) -> Option<&mut Composite> {
        let entry = self.entries.get_mut(id.index as usize)?;
        if entry.generation != id.generation {
            return None;
        }
        entry.composite.as_mut()
    }

    /// Current handle of a slot index, if it holds a composite.
    pub fn id_at(&self, index: u32) -> Option<CompositeId> {
        let entry = self.entries.get(index as usize)?;
        entry.composite.as_ref()?;
        Some(CompositeId {
            index,
            generation: entry.generation,
        })
    }

    /// Number of slots, gaps included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn live_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.composite.is_some()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CompositeId, &Composite)> {
        self.entries.iter().enumerate().filter_map(|(index, entry)| {
            entry.composite.as_ref().map(|composite| {
                (
                    CompositeId {
                        index: index as u32,
                        generation: entry.generation,
                    },
                    composite,
                )
            })
        })
    }

    pub fn kind_of(&self, id: CompositeId) -> Option<Kind> {
        self.get(id).and_then(Composite::kind)
    }

    pub fn is_kind(&self, id: Option<CompositeId>, kind: Kind) -> bool {
        id.and_then(|id| self.kind_of(id)) == Some(kind)
    }
}

impl Lineage for Store {
    fn super_type(&self, id: CompositeId) -> Option<CompositeId> {
        self.get(id)?.ids.super_type
    }

    fn kind(&self, id: CompositeId) -> Option<Predefined> {
        self.get(id)?.type_.root_predefined()
    }
}
