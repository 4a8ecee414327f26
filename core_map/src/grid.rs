//! The grid substrate: a statically-sized, optionally layered tile window.
//!
//! Storage is flat `Vec`s indexed `(z * H + y) * W + x`, allocated once and
//! owned by the map instance. Cells cache their resolved move cost so the
//! pathfinder never touches the flyweight tables in its inner loop.

use std::sync::Arc;

use bevy::prelude::Resource;
use thiserror::Error;

use crate::fields::{self, FieldEntry, FieldMap, FieldTypeId};
use crate::mapdata::{FurnitureId, MapData, TerrainFlags, TerrainId, TrapId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl TilePos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z)
    }
}

/// Dominant-axis (Chebyshev) distance; the attenuation metric.
pub fn chebyshev_dist(a: TilePos, b: TilePos) -> i32 {
    (a.x - b.x).abs().max((a.y - b.y).abs())
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GridError {
    #[error("coordinate {0:?} is outside the active window")]
    OutOfBounds(TilePos),
    #[error("unknown {kind} id {id}")]
    UnknownType { kind: &'static str, id: u16 },
    #[error("tile field capacity reached")]
    Full,
}

/// An impassable vehicle part occupying a cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleObstacle {
    /// A door or hatch that can be opened rather than smashed.
    pub openable: bool,
    /// Opens only from a tile that is itself part of the vehicle.
    pub inside_only: bool,
    pub hp: u16,
}

#[derive(Debug, Clone)]
pub struct Cell {
    pub terrain: TerrainId,
    pub furniture: FurnitureId,
    pub trap: TrapId,
    /// Resolved cost to move through; 0 = impassable. Kept in sync with
    /// terrain, furniture and vehicle changes.
    pub move_cost: u16,
    pub radiation: u8,
    /// Light output of glowing items lying on the tile.
    pub item_light: f32,
    pub fields: FieldMap,
    pub vehicle: Option<VehicleObstacle>,
}

impl Cell {
    fn null() -> Self {
        Self {
            terrain: TerrainId::NULL,
            furniture: FurnitureId::NONE,
            trap: TrapId::NONE,
            move_cost: 0,
            radiation: 0,
            item_light: 0.0,
            fields: FieldMap::default(),
            vehicle: None,
        }
    }
}

/// Read-only view of the fields on one tile.
#[derive(Debug, Clone, Copy)]
pub struct FieldView<'a> {
    entries: &'a [FieldEntry],
}

impl<'a> FieldView<'a> {
    pub fn entries(&self) -> &'a [FieldEntry] {
        self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a FieldEntry> {
        self.entries.iter()
    }

    pub fn get(&self, ty: FieldTypeId) -> Option<&'a FieldEntry> {
        self.entries.iter().find(|e| e.type_id == ty)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Resource, Debug, Clone)]
pub struct MapGrid {
    width: u32,
    height: u32,
    min_z: i32,
    levels: u32,
    /// Last turn `process_fields` saw; new field entries are born at it.
    turn: u64,
    cells: Vec<Cell>,
    data: Arc<MapData>,
}

impl MapGrid {
    /// Single-layer window at z = 0.
    pub fn new(width: u32, height: u32, data: Arc<MapData>) -> Self {
        Self::with_layers(width, height, 0, 1, data)
    }

    pub fn with_layers(width: u32, height: u32, min_z: i32, levels: u32, data: Arc<MapData>) -> Self {
        debug_assert!(width > 0 && height > 0 && levels > 0);
        let total = (width * height * levels) as usize;
        Self {
            width,
            height,
            min_z,
            levels,
            turn: 0,
            cells: vec![Cell::null(); total],
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn min_z(&self) -> i32 {
        self.min_z
    }

    pub fn levels(&self) -> u32 {
        self.levels
    }

    pub fn turn(&self) -> u64 {
        self.turn
    }

    pub(crate) fn set_turn(&mut self, now: u64) {
        self.turn = self.turn.max(now);
    }

    pub fn data(&self) -> Arc<MapData> {
        Arc::clone(&self.data)
    }

    pub fn in_bounds(&self, p: TilePos) -> bool {
        p.x >= 0
            && p.y >= 0
            && (p.x as u32) < self.width
            && (p.y as u32) < self.height
            && p.z >= self.min_z
            && p.z < self.min_z + self.levels as i32
    }

    #[inline]
    fn index(&self, p: TilePos) -> Option<usize> {
        if !self.in_bounds(p) {
            return None;
        }
        let layer = (p.z - self.min_z) as u32;
        Some(((layer * self.height + p.y as u32) * self.width + p.x as u32) as usize)
    }

    /// Row-major index on a single z-layer, for callers holding flat caches.
    #[inline]
    pub fn plane_index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return None;
        }
        Some((y as u32 * self.width + x as u32) as usize)
    }

    /// Every position in the window, lowest layer first.
    pub fn positions(&self) -> impl Iterator<Item = TilePos> + 'static {
        let (w, h, min_z, levels) = (self.width as i32, self.height as i32, self.min_z, self.levels as i32);
        (min_z..min_z + levels).flat_map(move |z| {
            (0..h).flat_map(move |y| (0..w).map(move |x| TilePos::new(x, y, z)))
        })
    }

    pub fn cell(&self, p: TilePos) -> Option<&Cell> {
        self.index(p).map(|i| &self.cells[i])
    }

    pub(crate) fn cell_mut(&mut self, p: TilePos) -> Option<&mut Cell> {
        self.index(p).map(move |i| &mut self.cells[i])
    }

    pub fn set_terrain(&mut self, p: TilePos, id: TerrainId) -> Result<(), GridError> {
        let idx = self.index(p).ok_or(GridError::OutOfBounds(p))?;
        self.cells[idx].terrain = id;
        self.refresh_move_cost(idx);
        Ok(())
    }

    pub fn fill_terrain(&mut self, id: TerrainId) {
        for idx in 0..self.cells.len() {
            self.cells[idx].terrain = id;
            self.refresh_move_cost(idx);
        }
    }

    pub fn set_furniture(&mut self, p: TilePos, id: FurnitureId) -> Result<(), GridError> {
        let idx = self.index(p).ok_or(GridError::OutOfBounds(p))?;
        self.cells[idx].furniture = id;
        self.refresh_move_cost(idx);
        Ok(())
    }

    pub fn set_vehicle(&mut self, p: TilePos, obstacle: Option<VehicleObstacle>) -> Result<(), GridError> {
        let idx = self.index(p).ok_or(GridError::OutOfBounds(p))?;
        self.cells[idx].vehicle = obstacle;
        self.refresh_move_cost(idx);
        Ok(())
    }

    pub fn set_trap(&mut self, p: TilePos, id: TrapId) -> Result<(), GridError> {
        let idx = self.index(p).ok_or(GridError::OutOfBounds(p))?;
        self.cells[idx].trap = id;
        Ok(())
    }

    pub fn trap_at(&self, p: TilePos) -> TrapId {
        self.cell(p).map_or(TrapId::NONE, |c| c.trap)
    }

    pub fn radiation_at(&self, p: TilePos) -> u8 {
        self.cell(p).map_or(0, |c| c.radiation)
    }

    pub fn set_radiation(&mut self, p: TilePos, rads: u8) -> Result<(), GridError> {
        let idx = self.index(p).ok_or(GridError::OutOfBounds(p))?;
        self.cells[idx].radiation = rads;
        Ok(())
    }

    pub fn item_light_at(&self, p: TilePos) -> f32 {
        self.cell(p).map_or(0.0, |c| c.item_light)
    }

    pub fn set_item_light(&mut self, p: TilePos, luminance: f32) -> Result<(), GridError> {
        let idx = self.index(p).ok_or(GridError::OutOfBounds(p))?;
        self.cells[idx].item_light = luminance.max(0.0);
        Ok(())
    }

    fn refresh_move_cost(&mut self, idx: usize) {
        let cell = &self.cells[idx];
        let ter = self.data.terrain(cell.terrain);
        let furn = self.data.furniture(cell.furniture);
        let cost = if cell.vehicle.is_some() || ter.move_cost == 0 || furn.move_cost_mod < 0 {
            0
        } else {
            (ter.move_cost as i32 + furn.move_cost_mod as i32).max(0) as u16
        };
        self.cells[idx].move_cost = cost;
    }

    /// Cost to move through; 0 = impassable. Off-window tiles are impassable.
    pub fn move_cost_at(&self, p: TilePos) -> u16 {
        self.cell(p).map_or(0, |c| c.move_cost)
    }

    /// Resolved light transmission coefficient for the tile: terrain base
    /// multiplied by every overlapping field's per-intensity factor. A zero
    /// anywhere in the product makes the tile opaque. Off-window is opaque so
    /// rays cannot escape the active window.
    pub fn transparency_at(&self, p: TilePos) -> f32 {
        let Some(cell) = self.cell(p) else {
            return 0.0;
        };
        let ter = self.data.terrain(cell.terrain);
        let furn = self.data.furniture(cell.furniture);
        if ter.flags.contains(TerrainFlags::OPAQUE) || furn.flags.contains(TerrainFlags::OPAQUE) {
            return 0.0;
        }
        let mut transparency = 1.0f32;
        for entry in cell.fields.entries() {
            if let Some(def) = self.data.field(entry.type_id) {
                transparency *= entry.transparency(def);
            }
            if transparency <= 0.0 {
                return 0.0;
            }
        }
        transparency
    }

    /// Under the open sky, so the natural-light ambient applies.
    pub fn is_outside(&self, p: TilePos) -> bool {
        self.cell(p).is_some_and(|c| {
            self.data
                .terrain(c.terrain)
                .flags
                .contains(TerrainFlags::OUTSIDE)
        })
    }

    pub fn add_field(&mut self, p: TilePos, ty: FieldTypeId, intensity: u8) -> Result<bool, GridError> {
        let idx = self.index(p).ok_or(GridError::OutOfBounds(p))?;
        if self.data.field(ty).is_none() {
            return Err(GridError::UnknownType {
                kind: "field",
                id: ty.0,
            });
        }
        let born = self.turn;
        self.cells[idx].fields.insert(FieldEntry::new(ty, intensity, born))
    }

    /// Re-insert an entry that moved between cells, keeping its age.
    pub(crate) fn restore_field_entry(&mut self, p: TilePos, entry: FieldEntry) -> Result<(), GridError> {
        let idx = self.index(p).ok_or(GridError::OutOfBounds(p))?;
        self.cells[idx].fields.insert(entry).map(|_| ())
    }

    pub fn remove_field(&mut self, p: TilePos, ty: FieldTypeId) -> Option<FieldEntry> {
        let idx = self.index(p)?;
        self.cells[idx].fields.remove(ty)
    }

    pub fn field_at(&self, p: TilePos) -> FieldView<'_> {
        FieldView {
            entries: self.cell(p).map_or(&[], |c| c.fields.entries()),
        }
    }

    /// Decay, spread and convert every field on the grid. `now` is the game
    /// turn and must not move backwards.
    pub fn process_fields(&mut self, now: u64) {
        fields::process_fields(self, now);
    }

    /// Open a door-like terrain in place. `from_inside` is whether the
    /// opener stands on an interior tile; inside-latched doors refuse
    /// otherwise.
    pub fn open_door(&mut self, p: TilePos, from_inside: bool) -> bool {
        let Some(cell) = self.cell(p) else {
            return false;
        };
        let ter = self.data.terrain(cell.terrain);
        let Some(target) = ter.open_to else {
            return false;
        };
        if ter.flags.contains(TerrainFlags::OPENCLOSE_INSIDE) && !from_inside {
            return false;
        }
        self.set_terrain(p, target).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{FD_SMOKE, FD_TOXIC_GAS};
    use crate::mapdata::{furniture, terrain};

    fn grid() -> MapGrid {
        let mut g = MapGrid::new(4, 4, Arc::new(MapData::builtin()));
        g.fill_terrain(terrain::T_FLOOR);
        g
    }

    #[test]
    fn out_of_bounds_is_opaque_and_impassable() {
        let g = grid();
        let p = TilePos::new(-1, 2, 0);
        assert_eq!(g.move_cost_at(p), 0);
        assert_eq!(g.transparency_at(p), 0.0);
        assert!(g.field_at(p).is_empty());
    }

    #[test]
    fn transparency_multiplies_field_factors() {
        let mut g = grid();
        let p = TilePos::new(1, 1, 0);
        assert_eq!(g.transparency_at(p), 1.0);

        g.add_field(p, FD_SMOKE, 1).unwrap();
        g.add_field(p, FD_TOXIC_GAS, 2).unwrap();
        // smoke@1 = 0.7, toxic gas@2 = 0.6
        assert!((g.transparency_at(p) - 0.42).abs() < 1e-6);

        g.add_field(p, FD_SMOKE, 3).unwrap();
        assert_eq!(g.transparency_at(p), 0.0, "thick smoke is opaque");
    }

    #[test]
    fn opaque_terrain_wins_over_fields() {
        let mut g = grid();
        let p = TilePos::new(0, 0, 0);
        g.set_terrain(p, terrain::T_BRICK_WALL).unwrap();
        assert_eq!(g.transparency_at(p), 0.0);
        assert_eq!(g.move_cost_at(p), 0);
    }

    #[test]
    fn furniture_modifies_move_cost() {
        let mut g = grid();
        let p = TilePos::new(2, 2, 0);
        assert_eq!(g.move_cost_at(p), 2);
        g.set_furniture(p, furniture::F_CHAIR).unwrap();
        assert_eq!(g.move_cost_at(p), 3);
        g.set_furniture(p, furniture::F_BOOKCASE).unwrap();
        assert_eq!(g.move_cost_at(p), 0);
        assert_eq!(g.transparency_at(p), 0.0);
    }

    #[test]
    fn vehicle_obstacle_blocks_movement() {
        let mut g = grid();
        let p = TilePos::new(3, 1, 0);
        g.set_vehicle(
            p,
            Some(VehicleObstacle {
                openable: true,
                inside_only: false,
                hp: 100,
            }),
        )
        .unwrap();
        assert_eq!(g.move_cost_at(p), 0);
    }

    #[test]
    fn inside_latched_door_refuses_outsiders() {
        let mut g = grid();
        let p = TilePos::new(1, 3, 0);
        g.set_terrain(p, terrain::T_DOOR_CLOSED_INSIDE).unwrap();
        assert!(!g.open_door(p, false));
        assert!(g.open_door(p, true));
        assert_eq!(g.move_cost_at(p), 2);
    }

    #[test]
    fn add_field_rejects_unknown_type() {
        let mut g = grid();
        let err = g
            .add_field(TilePos::new(0, 0, 0), FieldTypeId(999), 1)
            .unwrap_err();
        assert_eq!(
            err,
            GridError::UnknownType {
                kind: "field",
                id: 999
            }
        );
    }
}
