//! Creature bookkeeping for the lighting core.
//!
//! Creatures and the map never hold references to each other; the tracker
//! resolves ids to current positions on every query. The light map reads it
//! for carried light sources, the pathfinder's hazard policies for movement
//! traits.

use std::collections::HashMap;

use bevy::prelude::Resource;

use crate::grid::TilePos;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CreatureId(pub u32);

#[derive(Debug, Clone)]
struct CreatureEntry {
    pos: TilePos,
    active_light: f32,
    flying: bool,
}

#[derive(Resource, Debug, Clone, Default)]
pub struct CreatureTracker {
    entries: HashMap<CreatureId, CreatureEntry>,
    by_pos: HashMap<TilePos, CreatureId>,
}

impl CreatureTracker {
    /// Register a creature. Two creatures cannot share a tile; a colliding
    /// insert is refused and logged rather than corrupting the index.
    pub fn insert(&mut self, id: CreatureId, pos: TilePos) -> bool {
        if let Some(&occupant) = self.by_pos.get(&pos) {
            if occupant != id {
                tracing::error!(
                    target: "gridlight::tracker",
                    id = id.0,
                    occupant = occupant.0,
                    ?pos,
                    "refusing to register creature on an occupied tile"
                );
                return false;
            }
        }
        if let Some(old) = self.entries.insert(
            id,
            CreatureEntry {
                pos,
                active_light: 0.0,
                flying: false,
            },
        ) {
            self.by_pos.remove(&old.pos);
        }
        self.by_pos.insert(pos, id);
        true
    }

    pub fn remove(&mut self, id: CreatureId) {
        if let Some(entry) = self.entries.remove(&id) {
            self.by_pos.remove(&entry.pos);
        }
    }

    /// Move a registered creature. Fails if the destination is occupied by
    /// someone else.
    pub fn move_to(&mut self, id: CreatureId, pos: TilePos) -> bool {
        if self.by_pos.get(&pos).is_some_and(|&o| o != id) {
            return false;
        }
        let Some(entry) = self.entries.get_mut(&id) else {
            return false;
        };
        self.by_pos.remove(&entry.pos);
        entry.pos = pos;
        self.by_pos.insert(pos, id);
        true
    }

    pub fn set_active_light(&mut self, id: CreatureId, luminance: f32) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.active_light = luminance.max(0.0);
        }
    }

    pub fn set_flying(&mut self, id: CreatureId, flying: bool) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.flying = flying;
        }
    }

    pub fn pos_of(&self, id: CreatureId) -> Option<TilePos> {
        self.entries.get(&id).map(|e| e.pos)
    }

    pub fn creature_at(&self, pos: TilePos) -> Option<CreatureId> {
        self.by_pos.get(&pos).copied()
    }

    pub fn is_flying(&self, id: CreatureId) -> bool {
        self.entries.get(&id).is_some_and(|e| e.flying)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Creatures currently emitting light, for the light map build.
    pub fn light_sources(&self) -> impl Iterator<Item = (TilePos, f32)> + '_ {
        self.entries
            .values()
            .filter(|e| e.active_light > 0.0)
            .map(|e| (e.pos, e.active_light))
    }
}
