use std::collections::HashMap;
use std::sync::Arc;

use core_map::fields::FD_FIRE;
use core_map::mapdata::terrain;
use core_map::{
    CreatureTracker, LightConfig, LightMap, MapData, MapGrid, Observer, TilePos, VisionVariables,
};

/// A scenario parsed from rows of map glyphs:
/// `.` floor, ` ` grass (outside), `#` brick wall, `=` window frame,
/// `L` utility light, `D` closed door, `F` fire, `@` observer on floor,
/// `U` observer outside, `T`/`S` markers on floor.
pub struct Scene {
    pub grid: MapGrid,
    pub observer: TilePos,
    pub markers: HashMap<char, Vec<TilePos>>,
}

#[allow(dead_code)]
impl Scene {
    pub fn marker(&self, glyph: char) -> TilePos {
        self.markers[&glyph][0]
    }
}

pub fn scene(rows: &[&str]) -> Scene {
    let mut grid = MapGrid::new(
        rows[0].chars().count() as u32,
        rows.len() as u32,
        Arc::new(MapData::builtin()),
    );
    let mut observer = None;
    let mut markers: HashMap<char, Vec<TilePos>> = HashMap::new();

    for (y, row) in rows.iter().enumerate() {
        assert_eq!(row.chars().count(), rows[0].chars().count());
        for (x, glyph) in row.chars().enumerate() {
            let p = TilePos::new(x as i32, y as i32, 0);
            let ter = match glyph {
                'L' => terrain::T_UTILITY_LIGHT,
                'D' => terrain::T_DOOR_CLOSED,
                '.' | 'T' | 'S' | 'F' | '@' => terrain::T_FLOOR,
                ' ' | 'U' => terrain::T_GRASS,
                '#' => terrain::T_BRICK_WALL,
                '=' => terrain::T_WINDOW_FRAME,
                other => panic!("unexpected scene glyph {other:?}"),
            };
            grid.set_terrain(p, ter).unwrap();
            match glyph {
                '@' | 'U' => observer = Some(p),
                'F' => {
                    grid.add_field(p, FD_FIRE, 3).unwrap();
                }
                'T' | 'S' | 'L' | 'D' => markers.entry(glyph).or_default().push(p),
                _ => {}
            }
        }
    }

    Scene {
        grid,
        observer: observer.unwrap_or(TilePos::new(0, 0, 0)),
        markers,
    }
}

/// Build a settled frame: two generate passes so the observer's adaptation
/// threshold reflects the lighting it is tested under.
#[allow(dead_code)]
pub fn build_frame(
    grid: &MapGrid,
    observer: &mut Observer,
    turn: u64,
    cfg: &LightConfig,
) -> LightMap {
    let tracker = CreatureTracker::default();
    let mut lightmap = LightMap::new();
    lightmap.generate(grid, &tracker, observer, turn, cfg);
    observer.adapt(lightmap.mean_brightness(), cfg);
    lightmap.generate(grid, &tracker, observer, turn, cfg);
    observer.adapt(lightmap.mean_brightness(), cfg);
    lightmap
}

#[allow(dead_code)]
pub fn frame_vars(lightmap: &LightMap, observer: &Observer, cfg: &LightConfig) -> VisionVariables {
    let local = observer.effective_local_light(lightmap.ambient_light_at(observer.pos));
    VisionVariables::capture(observer, local, cfg)
}
