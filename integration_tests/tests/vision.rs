mod common;

use core_map::{calendar, LightConfig, LitLevel, Observer, TilePos};

/// Open ground at noon: everything in the window reads fully lit and the
/// observer sees out to the hard view cap.
#[test]
fn open_room_at_noon_is_lit_everywhere() {
    let scene = common::scene(&[
        "     ", //
        "  U  ", //
        "     ",
    ]);
    let cfg = LightConfig::default();
    let mut observer = Observer::new(scene.observer);
    let lightmap = common::build_frame(&scene.grid, &mut observer, calendar::turn_at(0, 12), &cfg);
    let vars = common::frame_vars(&lightmap, &observer, &cfg);

    for p in scene.grid.positions() {
        assert_eq!(
            lightmap.apparent_light_at(p, &vars, &cfg),
            LitLevel::Lit,
            "tile {p:?} should be lit at noon"
        );
    }
    assert_eq!(vars.sight_range, cfg.max_view_distance);
}

/// A wall between a lamp and the observer leaves the observer in the dark.
#[test]
fn wall_blocks_light_from_reaching_the_observer() {
    let scene = common::scene(&["L#@"]);
    let cfg = LightConfig::default();
    let mut observer = Observer::new(scene.observer);
    // midnight, new moon: no ambient worth mentioning
    let lightmap = common::build_frame(&scene.grid, &mut observer, 0, &cfg);
    let vars = common::frame_vars(&lightmap, &observer, &cfg);

    assert!(lightmap.ambient_light_at(scene.observer) <= cfg.ambient_low);
    assert_eq!(
        lightmap.apparent_light_at(scene.observer, &vars, &cfg),
        LitLevel::Dark
    );
    assert_eq!(
        lightmap.apparent_light_at(scene.marker('L'), &vars, &cfg),
        LitLevel::Dark,
        "the lamp is on the far side of the wall"
    );
}

/// Daylight pours through a window frame: tiles near the window read lit,
/// the far wall of the room only low.
#[test]
fn daylight_through_a_window_grades_across_the_room() {
    let scene = common::scene(&[
        "#######", //
        "#...#  ", //
        "#@..#  ", //
        "#...=  ", //
        "#######",
    ]);
    let cfg = LightConfig::default();
    let mut observer = Observer::new(scene.observer);
    let lightmap = common::build_frame(&scene.grid, &mut observer, calendar::turn_at(0, 12), &cfg);
    let vars = common::frame_vars(&lightmap, &observer, &cfg);

    let lit = [(2, 1), (3, 1), (2, 2), (3, 2), (2, 3), (3, 3)];
    for (x, y) in lit {
        assert_eq!(
            lightmap.apparent_light_at(TilePos::new(x, y, 0), &vars, &cfg),
            LitLevel::Lit,
            "({x},{y}) faces the window"
        );
    }
    let low = [(1, 1), (1, 3)];
    for (x, y) in low {
        assert_eq!(
            lightmap.apparent_light_at(TilePos::new(x, y, 0), &vars, &cfg),
            LitLevel::Low,
            "({x},{y}) sits deep in the room"
        );
    }
    assert_eq!(
        lightmap.apparent_light_at(scene.observer, &vars, &cfg),
        LitLevel::Low
    );
}

/// Under a full moon the open ground is visible but dim.
#[test]
fn full_moon_renders_open_ground_low() {
    let scene = common::scene(&[
        "     ", //
        "  U  ", //
        "     ",
    ]);
    let cfg = LightConfig::default();
    let mut observer = Observer::new(scene.observer);
    let lightmap =
        common::build_frame(&scene.grid, &mut observer, calendar::turn_at(14, 0), &cfg);
    let vars = common::frame_vars(&lightmap, &observer, &cfg);

    for p in scene.grid.positions() {
        assert_eq!(lightmap.apparent_light_at(p, &vars, &cfg), LitLevel::Low);
    }
}

/// New-moon midnight: the observer can make out their own tile and nothing
/// past the attenuation of even that faint skylight.
#[test]
fn new_moon_night_is_dark_beyond_arms_reach() {
    let scene = common::scene(&[
        "     ", //
        "  U  ", //
        "     ",
    ]);
    let cfg = LightConfig::default();
    let mut observer = Observer::new(scene.observer);
    let lightmap = common::build_frame(&scene.grid, &mut observer, 0, &cfg);
    let vars = common::frame_vars(&lightmap, &observer, &cfg);

    assert_eq!(
        lightmap.apparent_light_at(scene.observer, &vars, &cfg),
        LitLevel::Low
    );
    assert_eq!(
        lightmap.apparent_light_at(TilePos::new(0, 0, 0), &vars, &cfg),
        LitLevel::Dark
    );
}

/// A carried lamp lights the carrier's surroundings and their own tile
/// reads bright.
#[test]
fn carried_lamp_lights_the_dark() {
    let scene = common::scene(&[
        ".....", //
        "..@..", //
        ".....",
    ]);
    let cfg = LightConfig::default();
    let mut observer = Observer::new(scene.observer).with_active_light(15.0);
    let lightmap = common::build_frame(&scene.grid, &mut observer, 0, &cfg);
    let vars = common::frame_vars(&lightmap, &observer, &cfg);

    assert_eq!(
        lightmap.apparent_light_at(scene.observer, &vars, &cfg),
        LitLevel::Bright,
        "the lamp tile itself hosts the source"
    );
    assert_eq!(
        lightmap.apparent_light_at(TilePos::new(3, 1, 0), &vars, &cfg),
        LitLevel::Lit
    );
}

/// The full per-tick system sequence over an ECS world, the way a host
/// schedules it.
#[test]
fn system_sequence_classifies_like_the_direct_calls() {
    use bevy::prelude::{IntoSystemConfigs, Schedule, World};
    use core_map::lightmap_systems::{
        capture_vision_variables, generate_lightmap, process_grid_fields,
    };
    use core_map::{CreatureTracker, GameTurn, LightConfigHandle, LightMap, VisionVariables};

    let scene = common::scene(&[
        "     ", //
        "  U  ", //
        "     ",
    ]);
    let observer_pos = scene.observer;

    let mut world = World::new();
    world.insert_resource(scene.grid);
    world.insert_resource(LightMap::new());
    world.insert_resource(CreatureTracker::default());
    world.insert_resource(Observer::new(observer_pos));
    world.insert_resource(GameTurn(calendar::turn_at(0, 12)));
    world.insert_resource(LightConfigHandle::new(LightConfig::builtin()));

    let mut schedule = Schedule::default();
    schedule.add_systems(
        (
            process_grid_fields,
            generate_lightmap,
            capture_vision_variables,
        )
            .chain(),
    );
    // two ticks so the adaptation threshold settles, as with build_frame
    schedule.run(&mut world);
    schedule.run(&mut world);

    let vars = *world.resource::<VisionVariables>();
    let cfg = world.resource::<LightConfigHandle>().get();
    let lightmap = world.resource::<LightMap>();

    assert_eq!(vars.origin, observer_pos);
    assert_eq!(vars.sight_range, cfg.max_view_distance);
    assert_eq!(
        lightmap.apparent_light_at(TilePos::new(0, 0, 0), &vars, &cfg),
        LitLevel::Lit
    );
}
