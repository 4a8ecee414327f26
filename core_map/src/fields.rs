//! Field overlays: typed per-tile effects (fire, smoke, acid...) that emit
//! light, occlude it, or pose hazards.
//!
//! Decay is a pure function of `(born, now)` so processing a tick twice with
//! the same clock is a no-op. Spread and conversion follow the same rule:
//! wandering vents scatter children with a position hash rather than an RNG,
//! and a converted entry keeps its tile slot with a fresh `born`.

use bitflags::bitflags;

use crate::grid::{GridError, MapGrid, TilePos};

/// Cells hold at most this many simultaneous field entries.
pub const MAX_FIELDS_PER_CELL: usize = 4;

/// Index into the field-type table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldTypeId(pub u16);

pub const FD_NULL: FieldTypeId = FieldTypeId(0);
pub const FD_FIRE: FieldTypeId = FieldTypeId(1);
pub const FD_SMOKE: FieldTypeId = FieldTypeId(2);
pub const FD_ACID: FieldTypeId = FieldTypeId(3);
pub const FD_ELECTRICITY: FieldTypeId = FieldTypeId(4);
pub const FD_FIRE_VENT: FieldTypeId = FieldTypeId(5);
pub const FD_FLAME_BURST: FieldTypeId = FieldTypeId(6);
pub const FD_SMOKE_VENT: FieldTypeId = FieldTypeId(7);
pub const FD_TOXIC_GAS: FieldTypeId = FieldTypeId(8);
pub const FD_BLOOD: FieldTypeId = FieldTypeId(9);

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FieldHazard: u8 {
        const FIRE = 1 << 0;
        const ELECTRIC = 1 << 1;
        const ACID = 1 << 2;
        const TOXIC = 1 << 3;
    }
}

/// Periodic child spawning for wandering fields (smoke vents and the like).
#[derive(Debug, Clone, Copy)]
pub struct WanderSpec {
    pub child: FieldTypeId,
    /// Spawn every this many turns.
    pub period: u64,
    /// Chebyshev radius the child lands within.
    pub radius: i32,
}

#[derive(Debug, Clone)]
pub struct FieldDefinition {
    pub name: &'static str,
    /// Light output per intensity 1..=3.
    pub luminance: [f32; 3],
    /// Transparency multiplier per intensity 1..=3; 0 is fully occluding.
    pub transparency: [f32; 3],
    /// Total lifetime in turns per intensity 1..=3; 0 means permanent.
    pub lifetime: [u64; 3],
    pub hazard: FieldHazard,
    /// Acid-style fields drop a z-level when the tile below is passable.
    pub sinks_through_floor: bool,
    pub wander: Option<WanderSpec>,
    /// When the lifetime runs out the entry becomes this type in place.
    pub converts_to: Option<FieldTypeId>,
}

fn fd(name: &'static str, luminance: [f32; 3], transparency: [f32; 3], lifetime: [u64; 3]) -> FieldDefinition {
    FieldDefinition {
        name,
        luminance,
        transparency,
        lifetime,
        hazard: FieldHazard::empty(),
        sinks_through_floor: false,
        wander: None,
        converts_to: None,
    }
}

pub(crate) fn builtin_field_table() -> Vec<FieldDefinition> {
    let clear = [1.0, 1.0, 1.0];
    let mut table = vec![
        fd("null", [0.0; 3], clear, [1, 1, 1]),
        fd("fire", [5.0, 25.0, 50.0], clear, [300, 425, 600]),
        fd("smoke", [0.0; 3], [0.7, 0.4, 0.0], [125, 180, 255]),
        fd("acid", [0.0; 3], clear, [225, 345, 500]),
        fd("electricity", [0.0, 1.0, 5.0], clear, [10, 8, 5]),
        fd("fire vent", [0.0; 3], clear, [40, 40, 40]),
        fd("flame burst", [5.0, 10.0, 15.0], clear, [20, 20, 20]),
        fd("smoke vent", [0.0; 3], clear, [0, 0, 0]),
        fd("toxic gas", [0.0; 3], [0.9, 0.6, 0.3], [450, 300, 225]),
        fd("blood", [0.0; 3], clear, [0, 0, 0]),
    ];
    table[FD_FIRE.0 as usize].hazard = FieldHazard::FIRE;
    table[FD_SMOKE.0 as usize].hazard = FieldHazard::TOXIC;
    table[FD_ACID.0 as usize].hazard = FieldHazard::ACID;
    table[FD_ACID.0 as usize].sinks_through_floor = true;
    table[FD_ELECTRICITY.0 as usize].hazard = FieldHazard::ELECTRIC;
    table[FD_FIRE_VENT.0 as usize].converts_to = Some(FD_FLAME_BURST);
    table[FD_FLAME_BURST.0 as usize].hazard = FieldHazard::FIRE;
    table[FD_FLAME_BURST.0 as usize].converts_to = Some(FD_FIRE_VENT);
    table[FD_SMOKE_VENT.0 as usize].wander = Some(WanderSpec {
        child: FD_SMOKE,
        period: 50,
        radius: 2,
    });
    table
}

/// One live overlay on a tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldEntry {
    pub type_id: FieldTypeId,
    /// 1..=3.
    pub intensity: u8,
    /// Turn the entry was created (or last converted).
    pub born: u64,
}

impl FieldEntry {
    pub fn new(type_id: FieldTypeId, intensity: u8, born: u64) -> Self {
        Self {
            type_id,
            intensity: intensity.clamp(1, 3),
            born,
        }
    }

    pub fn age(&self, now: u64) -> u64 {
        now.saturating_sub(self.born)
    }

    pub fn is_alive(&self, def: &FieldDefinition, now: u64) -> bool {
        let lifetime = def.lifetime[(self.intensity - 1) as usize];
        lifetime == 0 || self.age(now) < lifetime
    }

    pub fn luminance(&self, def: &FieldDefinition) -> f32 {
        def.luminance[(self.intensity - 1) as usize]
    }

    pub fn transparency(&self, def: &FieldDefinition) -> f32 {
        def.transparency[(self.intensity - 1) as usize]
    }
}

/// Per-cell field storage: a small vector kept sorted by type id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMap {
    entries: Vec<FieldEntry>,
}

impl FieldMap {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[FieldEntry] {
        &self.entries
    }

    pub fn get(&self, ty: FieldTypeId) -> Option<&FieldEntry> {
        self.entries
            .binary_search_by_key(&ty, |e| e.type_id)
            .ok()
            .map(|i| &self.entries[i])
    }

    /// Insert or merge an entry. Merging keeps the higher intensity and the
    /// existing `born` so repeated insertion is idempotent.
    pub(crate) fn insert(&mut self, entry: FieldEntry) -> Result<bool, GridError> {
        match self.entries.binary_search_by_key(&entry.type_id, |e| e.type_id) {
            Ok(i) => {
                if entry.intensity > self.entries[i].intensity {
                    self.entries[i].intensity = entry.intensity;
                }
                Ok(false)
            }
            Err(i) => {
                if self.entries.len() >= MAX_FIELDS_PER_CELL {
                    return Err(GridError::Full);
                }
                self.entries.insert(i, entry);
                Ok(true)
            }
        }
    }

    pub(crate) fn remove(&mut self, ty: FieldTypeId) -> Option<FieldEntry> {
        self.entries
            .binary_search_by_key(&ty, |e| e.type_id)
            .ok()
            .map(|i| self.entries.remove(i))
    }

    pub(crate) fn entries_mut(&mut self) -> &mut Vec<FieldEntry> {
        &mut self.entries
    }
}

/// Deterministic scatter for wandering fields: a position-and-time hash in
/// place of an RNG, so a replayed tick lands children on the same tiles.
fn scatter_offset(pos: TilePos, now: u64, radius: i32) -> (i32, i32) {
    let mut n = (pos.x as u32).wrapping_mul(0x6C8E_9CF5)
        ^ (pos.y as u32).wrapping_mul(0xB529_7A4D)
        ^ (pos.z as u32).wrapping_mul(0x1B56_C4E9)
        ^ (now as u32).rotate_left(7);
    n ^= n >> 13;
    n = n.wrapping_mul(0x68E3_1DA4);
    n ^= n >> 11;
    let span = (2 * radius + 1) as u32;
    let dx = (n % span) as i32 - radius;
    let dy = ((n >> 8) % span) as i32 - radius;
    (dx, dy)
}

/// Advance every field on the grid to `now`: expire, convert, sink, spread.
pub fn process_fields(grid: &mut MapGrid, now: u64) {
    grid.set_turn(now);
    let data = grid.data();
    let mut spawns: Vec<(TilePos, FieldTypeId, u8)> = Vec::new();
    let mut sunk: Vec<(TilePos, FieldEntry)> = Vec::new();
    let mut dropped_unknown = 0u32;

    for pos in grid.positions() {
        // Cross-cell reads must happen before the cell is borrowed mutably.
        let below = TilePos::new(pos.x, pos.y, pos.z - 1);
        let below_passable = grid.in_bounds(below) && grid.move_cost_at(below) > 0;

        let Some(cell) = grid.cell_mut(pos) else {
            continue;
        };
        if cell.fields.is_empty() {
            continue;
        }

        let entries = cell.fields.entries_mut();
        let mut converted = false;
        let mut i = 0;
        while i < entries.len() {
            let entry = entries[i];
            let Some(def) = data.field(entry.type_id) else {
                dropped_unknown += 1;
                entries.remove(i);
                continue;
            };

            if !entry.is_alive(def, now) {
                match def.converts_to {
                    Some(next) => {
                        entries[i].type_id = next;
                        entries[i].born = now;
                        converted = true;
                    }
                    None => {
                        entries.remove(i);
                        continue;
                    }
                }
                i += 1;
                continue;
            }

            if let Some(wander) = def.wander {
                if wander.period > 0 && now % wander.period == 0 {
                    let (dx, dy) = scatter_offset(pos, now, wander.radius);
                    spawns.push((TilePos::new(pos.x + dx, pos.y + dy, pos.z), wander.child, 1));
                }
            }

            if def.sinks_through_floor && below_passable {
                let moved = entries.remove(i);
                sunk.push((below, moved));
                continue;
            }

            i += 1;
        }
        if converted {
            // lookup by type relies on the entries staying sorted
            entries.sort_by_key(|e| e.type_id);
        }
    }

    if dropped_unknown > 0 {
        tracing::debug!(
            target: "gridlight::fields",
            count = dropped_unknown,
            "dropped field entries with unknown type"
        );
    }

    for (pos, ty, intensity) in spawns {
        match grid.add_field(pos, ty, intensity) {
            Ok(_) => {}
            Err(err) => {
                tracing::debug!(
                    target: "gridlight::fields",
                    ?pos,
                    error = %err,
                    "wandering field spawn rejected"
                );
            }
        }
    }

    for (pos, entry) in sunk {
        if let Err(err) = grid.restore_field_entry(pos, entry) {
            tracing::debug!(
                target: "gridlight::fields",
                ?pos,
                error = %err,
                "sinking field lost"
            );
        }
    }
}
