//! Flyweight tables for terrain, furniture and traps.
//!
//! Cells reference these definitions by index. Unknown ids resolve to the
//! null instance so a bad id coming out of content loading can never panic
//! the core; the lookup logs the id once per call at debug level.

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TerrainFlags: u16 {
        /// Blocks light entirely; transparency resolves to zero.
        const OPAQUE = 1 << 0;
        /// Under the open sky; receives the natural-light ambient term.
        const OUTSIDE = 1 << 1;
        /// Transparent but impassable boundary; bleeds sunlight indoors.
        const WINDOW = 1 << 2;
        /// Door that only opens from the interior side.
        const OPENCLOSE_INSIDE = 1 << 3;
        /// Can be broken down given enough bash force.
        const BASHABLE = 1 << 4;
        /// Nothing to stand on; a fall hazard for anything that cannot fly.
        const OPEN_AIR = 1 << 5;
        /// Molten rock. Walking in is a terrible idea regardless of cost.
        const LAVA = 1 << 6;
        /// Liquid deep enough to swim in.
        const LIQUID = 1 << 7;
    }
}

/// Index into the terrain table. `TerrainId::NULL` is the guaranteed-valid
/// fallback used when an id does not resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TerrainId(pub u16);

impl TerrainId {
    pub const NULL: TerrainId = TerrainId(0);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FurnitureId(pub u16);

impl FurnitureId {
    pub const NONE: FurnitureId = FurnitureId(0);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrapId(pub u16);

impl TrapId {
    pub const NONE: TrapId = TrapId(0);
}

#[derive(Debug, Clone)]
pub struct TerrainDefinition {
    pub name: &'static str,
    pub flags: TerrainFlags,
    /// 0 = impassable.
    pub move_cost: u16,
    /// Intrinsic light output (utility lights, lava glow). 0 for most tiles.
    pub luminance: f32,
    /// Terrain this opens into, for doors.
    pub open_to: Option<TerrainId>,
    /// Bash force required to have any chance / to succeed reliably.
    /// `(0, 0)` means unbashable.
    pub bash_str: (u16, u16),
}

impl TerrainDefinition {
    /// How promising bashing through this terrain is for a given force.
    /// 0 = cannot bash, 1 = desperate, 2..=10 scale with surplus force.
    pub fn bash_rating(&self, bash_force: i32) -> i32 {
        if bash_force <= 0 || !self.flags.contains(TerrainFlags::BASHABLE) {
            return 0;
        }
        let (min, max) = self.bash_str;
        if (bash_force as u16) < min {
            return 1;
        }
        let span = max.saturating_sub(min).max(1) as i32;
        let surplus = bash_force - min as i32;
        2 + (surplus * 8 / span).min(8)
    }
}

#[derive(Debug, Clone)]
pub struct FurnitureDefinition {
    pub name: &'static str,
    pub flags: TerrainFlags,
    /// Added to the terrain cost; -1 makes the tile impassable.
    pub move_cost_mod: i16,
}

#[derive(Debug, Clone)]
pub struct TrapDefinition {
    pub name: &'static str,
    /// Benign traps (a rollmat, a funnel) carry no danger cost.
    pub benign: bool,
}

pub mod terrain {
    use super::TerrainId;

    pub const T_NULL: TerrainId = TerrainId(0);
    pub const T_FLOOR: TerrainId = TerrainId(1);
    pub const T_DIRT: TerrainId = TerrainId(2);
    pub const T_GRASS: TerrainId = TerrainId(3);
    pub const T_BRICK_WALL: TerrainId = TerrainId(4);
    pub const T_WINDOW_FRAME: TerrainId = TerrainId(5);
    pub const T_DOOR_CLOSED: TerrainId = TerrainId(6);
    pub const T_DOOR_OPEN: TerrainId = TerrainId(7);
    pub const T_DOOR_CLOSED_INSIDE: TerrainId = TerrainId(8);
    pub const T_UTILITY_LIGHT: TerrainId = TerrainId(9);
    pub const T_LAVA: TerrainId = TerrainId(10);
    pub const T_OPEN_AIR: TerrainId = TerrainId(11);
    pub const T_WATER_DEEP: TerrainId = TerrainId(12);
}

pub mod trap {
    use super::TrapId;

    pub const TR_NONE: TrapId = TrapId(0);
    pub const TR_BEARTRAP: TrapId = TrapId(1);
    pub const TR_ROLLMAT: TrapId = TrapId(2);
    pub const TR_PIT: TrapId = TrapId(3);
}

pub mod furniture {
    use super::FurnitureId;

    pub const F_NONE: FurnitureId = FurnitureId(0);
    pub const F_BOOKCASE: FurnitureId = FurnitureId(1);
    pub const F_CHAIR: FurnitureId = FurnitureId(2);
}

/// The registry the grid resolves ids against. Built in code; the host's
/// content loader may construct its own.
#[derive(Debug, Clone)]
pub struct MapData {
    terrain: Vec<TerrainDefinition>,
    furniture: Vec<FurnitureDefinition>,
    traps: Vec<TrapDefinition>,
    fields: Vec<crate::fields::FieldDefinition>,
}

fn ter(
    name: &'static str,
    flags: TerrainFlags,
    move_cost: u16,
    luminance: f32,
) -> TerrainDefinition {
    TerrainDefinition {
        name,
        flags,
        move_cost,
        luminance,
        open_to: None,
        bash_str: (0, 0),
    }
}

impl MapData {
    pub fn builtin() -> Self {
        use TerrainFlags as F;

        let mut terrain_table = vec![
            ter("null", F::empty(), 0, 0.0),
            ter("floor", F::empty(), 2, 0.0),
            ter("dirt", F::OUTSIDE, 2, 0.0),
            ter("grass", F::OUTSIDE, 2, 0.0),
            ter("brick wall", F::OPAQUE | F::BASHABLE, 0, 0.0),
            ter("window frame", F::WINDOW, 0, 0.0),
            ter("closed door", F::OPAQUE | F::BASHABLE, 0, 0.0),
            ter("open door", F::empty(), 2, 0.0),
            ter("closed door (inside latch)", F::OPAQUE | F::BASHABLE, 0, 0.0),
            ter("utility light", F::empty(), 2, 50.0),
            ter("lava", F::OUTSIDE | F::LAVA, 2, 8.0),
            ter("open air", F::OUTSIDE | F::OPEN_AIR, 2, 0.0),
            ter("deep water", F::OUTSIDE | F::LIQUID, 4, 0.0),
        ];
        terrain_table[terrain::T_BRICK_WALL.0 as usize].bash_str = (40, 80);
        terrain_table[terrain::T_DOOR_CLOSED.0 as usize].open_to = Some(terrain::T_DOOR_OPEN);
        terrain_table[terrain::T_DOOR_CLOSED.0 as usize].bash_str = (8, 20);
        terrain_table[terrain::T_DOOR_CLOSED_INSIDE.0 as usize].open_to =
            Some(terrain::T_DOOR_OPEN);
        terrain_table[terrain::T_DOOR_CLOSED_INSIDE.0 as usize].bash_str = (8, 20);
        terrain_table[terrain::T_DOOR_CLOSED_INSIDE.0 as usize]
            .flags
            .insert(F::OPENCLOSE_INSIDE);

        let furniture = vec![
            FurnitureDefinition {
                name: "none",
                flags: F::empty(),
                move_cost_mod: 0,
            },
            FurnitureDefinition {
                name: "bookcase",
                flags: F::OPAQUE,
                move_cost_mod: -1,
            },
            FurnitureDefinition {
                name: "chair",
                flags: F::empty(),
                move_cost_mod: 1,
            },
        ];

        let traps = vec![
            TrapDefinition {
                name: "none",
                benign: true,
            },
            TrapDefinition {
                name: "bear trap",
                benign: false,
            },
            TrapDefinition {
                name: "fur rollmat",
                benign: true,
            },
            TrapDefinition {
                name: "pit",
                benign: false,
            },
        ];

        Self {
            terrain: terrain_table,
            furniture,
            traps,
            fields: crate::fields::builtin_field_table(),
        }
    }

    pub fn terrain(&self, id: TerrainId) -> &TerrainDefinition {
        match self.terrain.get(id.0 as usize) {
            Some(def) => def,
            None => {
                tracing::debug!(
                    target: "gridlight::mapdata",
                    id = id.0,
                    "unknown terrain id, using null terrain"
                );
                &self.terrain[0]
            }
        }
    }

    pub fn furniture(&self, id: FurnitureId) -> &FurnitureDefinition {
        match self.furniture.get(id.0 as usize) {
            Some(def) => def,
            None => {
                tracing::debug!(
                    target: "gridlight::mapdata",
                    id = id.0,
                    "unknown furniture id, using null furniture"
                );
                &self.furniture[0]
            }
        }
    }

    pub fn trap(&self, id: TrapId) -> &TrapDefinition {
        match self.traps.get(id.0 as usize) {
            Some(def) => def,
            None => {
                tracing::debug!(
                    target: "gridlight::mapdata",
                    id = id.0,
                    "unknown trap id, using null trap"
                );
                &self.traps[0]
            }
        }
    }

    pub fn field(&self, id: crate::fields::FieldTypeId) -> Option<&crate::fields::FieldDefinition> {
        self.fields.get(id.0 as usize)
    }

    pub fn terrain_count(&self) -> usize {
        self.terrain.len()
    }
}
