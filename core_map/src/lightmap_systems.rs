//! The canonical per-tick system sequence for hosts running the core inside
//! an ECS schedule:
//! 1. `process_grid_fields` - decay, spread and convert field overlays
//! 2. `generate_lightmap` - rebuild the frame's light and seen maps
//! 3. `capture_vision_variables` - snapshot the observer for queries
//!
//! Everything here is a thin shell over the plain library methods; hosts
//! that do not use an ECS can call those directly in the same order.

use bevy::prelude::*;

use crate::grid::MapGrid;
use crate::light_config::LightConfigHandle;
use crate::lightmap::LightMap;
use crate::observer::{Observer, VisionVariables};
use crate::resources::GameTurn;
use crate::tracker::CreatureTracker;

pub fn process_grid_fields(mut grid: ResMut<MapGrid>, turn: Res<GameTurn>) {
    tracing::info!(
        target: "gridlight::fields",
        turn = turn.0,
        "fields.process START"
    );

    grid.process_fields(turn.0);

    tracing::info!(
        target: "gridlight::fields",
        "fields.process END"
    );
}

pub fn generate_lightmap(
    mut lightmap: ResMut<LightMap>,
    grid: Res<MapGrid>,
    tracker: Res<CreatureTracker>,
    mut observer: ResMut<Observer>,
    turn: Res<GameTurn>,
    config: Res<LightConfigHandle>,
) {
    let cfg = config.0.as_ref();

    tracing::info!(
        target: "gridlight::lightmap",
        turn = turn.0,
        observer = ?observer.pos,
        "lightmap.generate START"
    );

    lightmap.generate(&grid, &tracker, &observer, turn.0, cfg);
    observer.adapt(lightmap.mean_brightness(), cfg);

    tracing::info!(
        target: "gridlight::lightmap",
        mean_brightness = lightmap.mean_brightness(),
        vision_threshold = observer.vision_threshold,
        "lightmap.generate END"
    );
}

pub fn capture_vision_variables(
    mut commands: Commands,
    lightmap: Res<LightMap>,
    observer: Res<Observer>,
    config: Res<LightConfigHandle>,
) {
    let cfg = config.0.as_ref();
    let local = observer.effective_local_light(lightmap.ambient_light_at(observer.pos));
    let vars = VisionVariables::capture(&observer, local, cfg);

    tracing::debug!(
        target: "gridlight::lightmap",
        sight_range = vars.sight_range,
        "vision variables captured"
    );

    commands.insert_resource(vars);
}
