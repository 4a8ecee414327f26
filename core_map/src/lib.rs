//! Tile visibility and lighting core.
//!
//! Provides the grid substrate, the shadowcasting light map with its
//! apparent-light classification, and the multi-source pathfinder consumed
//! by game logic. The core is single-threaded and turn-synchronous: hosts
//! pass the current turn into every time-dependent operation and rebuild
//! the derived caches once per tick, either directly or through the systems
//! in [`lightmap_systems`].

pub mod calendar;
pub mod fields;
pub mod grid;
pub mod light_config;
pub mod lightmap;
pub mod lightmap_systems;
pub mod mapdata;
pub mod observer;
pub mod pathfind;
pub mod resources;
mod shadowcast;
pub mod tracker;

pub use fields::{FieldEntry, FieldTypeId};
pub use grid::{chebyshev_dist, FieldView, GridError, MapGrid, TilePos, VehicleObstacle};
pub use light_config::{load_light_config_from_env, LightConfig, LightConfigHandle};
pub use lightmap::{FourQuadrants, LightMap, LightQuadrant, LitLevel};
pub use mapdata::{MapData, TerrainFlags, TerrainId, TrapId};
pub use observer::{Observer, VisionFlags, VisionVariables};
pub use pathfind::{HazardPolicy, ParentGrid, Pathfinder, PathProfiles, PathSettings};
pub use resources::GameTurn;
pub use tracker::{CreatureId, CreatureTracker};
