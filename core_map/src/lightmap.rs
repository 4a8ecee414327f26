//! The light map: per-tile luminance accumulated from every source on the
//! active window, split into four directional quadrants, plus the observer's
//! seen map and the apparent-light classification built from both.
//!
//! All buffers are flat heap vectors owned by the map instance and reused
//! frame to frame; a rebuild never allocates once the window size settles.

use bevy::prelude::Resource;

use crate::calendar;
use crate::grid::{chebyshev_dist, MapGrid, TilePos};
use crate::light_config::LightConfig;
use crate::observer::{Observer, VisionVariables};
use crate::shadowcast::{cast_light_source, cast_seen, CastPlane};
use crate::tracker::CreatureTracker;

/// How bright a tile looks to a particular observer.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LitLevel {
    #[default]
    Dark = 0,
    /// Hard to see.
    Low = 1,
    Lit = 2,
    /// The tile itself hosts a light source.
    Bright = 3,
}

impl LitLevel {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Low,
            2 => Self::Lit,
            3 => Self::Bright,
            _ => Self::Dark,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightQuadrant {
    NE = 0,
    SE = 1,
    SW = 2,
    NW = 3,
}

/// A tile's accumulated light split by the direction it arrived from, so a
/// character facing away from a lamp still reads as lit from behind.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FourQuadrants([f32; 4]);

impl FourQuadrants {
    pub fn get(&self, q: LightQuadrant) -> f32 {
        self.0[q as usize]
    }

    pub fn max(&self) -> f32 {
        self.0.iter().fold(0.0f32, |a, &b| a.max(b))
    }

    pub fn sum(&self) -> f32 {
        self.0.iter().sum()
    }

    fn add(&mut self, q: LightQuadrant, amount: f32) {
        self.0[q as usize] += amount;
    }

    fn add_all(&mut self, amount: f32) {
        for v in &mut self.0 {
            *v += amount * 0.25;
        }
    }

    /// Credit `amount` arriving at a tile displaced `delta` from the source.
    /// Off-axis light lands in one quadrant; light travelling straight along
    /// an axis splits between the two quadrants that share it, and light on
    /// the source tile itself spreads over all four.
    pub fn credit(&mut self, delta: (i32, i32), amount: f32) {
        use LightQuadrant::{NE, NW, SE, SW};
        let (dx, dy) = delta;
        match (dx.signum(), dy.signum()) {
            (0, 0) => self.add_all(amount),
            (1, -1) => self.add(NE, amount),
            (1, 1) => self.add(SE, amount),
            (-1, 1) => self.add(SW, amount),
            (-1, -1) => self.add(NW, amount),
            (1, 0) => {
                self.add(NE, amount * 0.5);
                self.add(SE, amount * 0.5);
            }
            (-1, 0) => {
                self.add(NW, amount * 0.5);
                self.add(SW, amount * 0.5);
            }
            (0, -1) => {
                self.add(NE, amount * 0.5);
                self.add(NW, amount * 0.5);
            }
            _ => {
                self.add(SE, amount * 0.5);
                self.add(SW, amount * 0.5);
            }
        }
    }
}

#[derive(Resource, Debug, Clone, Default)]
pub struct LightMap {
    width: u32,
    height: u32,
    /// z-layer the current frame was built for.
    plane_z: i32,
    brightness: Vec<f32>,
    /// Raw luminance emitted on the tile itself; nonzero marks a source.
    source: Vec<f32>,
    directional: Vec<FourQuadrants>,
    /// Best transmission from the observer along any sightline, 0 = unseen.
    seen: Vec<f32>,
    transparency: Vec<f32>,
    lit_scratch: Vec<bool>,
    last_mean_brightness: f32,
}

impl LightMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_size(&mut self, width: u32, height: u32) {
        let total = (width * height) as usize;
        if self.width != width || self.height != height {
            self.width = width;
            self.height = height;
            self.brightness = vec![0.0; total];
            self.source = vec![0.0; total];
            self.directional = vec![FourQuadrants::default(); total];
            self.seen = vec![0.0; total];
            self.transparency = vec![0.0; total];
            self.lit_scratch = vec![false; total];
        }
    }

    #[inline]
    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return None;
        }
        Some((y as u32 * self.width + x as u32) as usize)
    }

    /// Rebuild the frame: transparency, ambient, every source, the seen map
    /// and the adaptation mean. `now` is the game turn driving sun and moon.
    pub fn generate(
        &mut self,
        grid: &MapGrid,
        tracker: &CreatureTracker,
        observer: &Observer,
        now: u64,
        cfg: &LightConfig,
    ) {
        let _span = tracing::debug_span!(
            target: "gridlight::lightmap",
            "generate",
            turn = now,
        )
        .entered();

        let (w, h) = (grid.width(), grid.height());
        let z = observer.pos.z;
        self.ensure_size(w, h);
        self.plane_z = z;

        for y in 0..h as i32 {
            for x in 0..w as i32 {
                let i = (y as u32 * w + x as u32) as usize;
                self.transparency[i] = grid.transparency_at(TilePos::new(x, y, z));
            }
        }
        self.brightness.fill(0.0);
        self.source.fill(0.0);
        self.directional.fill(FourQuadrants::default());
        self.seen.fill(0.0);

        // Natural light on everything under the open sky, then bled through
        // transparent boundaries (windows, doorways) at reduced strength.
        let natural = calendar::natural_light(now);
        let mut bleed: Vec<TilePos> = Vec::new();
        for y in 0..h as i32 {
            for x in 0..w as i32 {
                let p = TilePos::new(x, y, z);
                let i = (y as u32 * w + x as u32) as usize;
                if grid.is_outside(p) {
                    self.brightness[i] += natural;
                    self.directional[i].add_all(natural);
                } else if natural > cfg.ambient_low
                    && self.transparency[i] > 0.0
                    && [(1, 0), (-1, 0), (0, 1), (0, -1)]
                        .iter()
                        .any(|&(dx, dy)| grid.is_outside(p.offset(dx, dy)))
                {
                    bleed.push(p);
                }
            }
        }
        for p in bleed {
            self.apply_light_source(p, natural / cfg.window_bleed_divisor, cfg);
        }

        // Collect the frame's emitters before touching the buffers: fields,
        // items on the ground, intrinsic terrain light, carried lights.
        let data = grid.data();
        let mut sources: Vec<(TilePos, f32)> = Vec::new();
        for y in 0..h as i32 {
            for x in 0..w as i32 {
                let p = TilePos::new(x, y, z);
                let Some(cell) = grid.cell(p) else { continue };
                for entry in cell.fields.entries() {
                    let Some(def) = data.field(entry.type_id) else {
                        continue;
                    };
                    if entry.is_alive(def, now) {
                        let lum = entry.luminance(def);
                        if lum > 0.0 {
                            sources.push((p, lum));
                        }
                    }
                }
                if cell.item_light > 0.0 {
                    sources.push((p, cell.item_light));
                }
                let ter = data.terrain(cell.terrain);
                if ter.luminance > 0.0 {
                    sources.push((p, ter.luminance));
                }
            }
        }
        for (pos, lum) in tracker.light_sources() {
            if pos.z == z {
                sources.push((pos, lum));
            }
        }
        if observer.active_light > 0.0 {
            sources.push((observer.pos, observer.active_light));
        }

        let source_count = sources.len();
        for (pos, lum) in sources {
            self.apply_light_source(pos, lum, cfg);
        }

        // The observer's seen map over the same transparency plane.
        let plane = CastPlane {
            transparency: &self.transparency,
            width: w as i32,
            height: h as i32,
        };
        cast_seen(
            &plane,
            (observer.pos.x, observer.pos.y),
            cfg.max_view_distance as f32,
            cfg.transparency_open_air,
            &mut self.seen,
        );

        let total: f32 = self.brightness.iter().sum();
        self.last_mean_brightness = total / (w * h) as f32;

        tracing::debug!(
            target: "gridlight::lightmap",
            sources = source_count,
            natural,
            mean = self.last_mean_brightness,
            "lightmap generated"
        );
    }

    /// Accumulate one source into the frame. Requires the transparency plane
    /// from the current `generate`; exposed so hosts can add late sources
    /// (muzzle flashes and the like) without a full rebuild.
    pub fn apply_light_source(&mut self, pos: TilePos, luminance: f32, cfg: &LightConfig) {
        let radius = cfg.light_range(luminance);
        if radius <= 0 {
            return;
        }
        let Some(origin_idx) = self.index(pos.x, pos.y) else {
            return;
        };

        let Self {
            width,
            height,
            transparency,
            brightness,
            source,
            directional,
            lit_scratch,
            ..
        } = self;
        let plane = CastPlane {
            transparency: transparency.as_slice(),
            width: *width as i32,
            height: *height as i32,
        };

        lit_scratch.fill(false);
        lit_scratch[origin_idx] = true;
        brightness[origin_idx] += luminance;
        source[origin_idx] += luminance;
        directional[origin_idx].credit((0, 0), luminance);

        cast_light_source(
            &plane,
            (pos.x, pos.y),
            luminance,
            radius as f32,
            lit_scratch,
            |idx, delta, amount| {
                brightness[idx] += amount;
                directional[idx].credit(delta, amount);
            },
        );
    }

    /// Raw accumulated brightness; exactly what `generate` put there.
    pub fn ambient_light_at(&self, p: TilePos) -> f32 {
        self.index(p.x, p.y).map_or(0.0, |i| self.brightness[i])
    }

    pub fn source_light_at(&self, p: TilePos) -> f32 {
        self.index(p.x, p.y).map_or(0.0, |i| self.source[i])
    }

    pub fn directional_at(&self, p: TilePos) -> FourQuadrants {
        self.index(p.x, p.y)
            .map_or_else(FourQuadrants::default, |i| self.directional[i])
    }

    pub fn seen_at(&self, p: TilePos) -> f32 {
        self.index(p.x, p.y).map_or(0.0, |i| self.seen[i])
    }

    pub fn transparency_at(&self, p: TilePos) -> f32 {
        self.index(p.x, p.y).map_or(0.0, |i| self.transparency[i])
    }

    /// z-layer the current frame was built for; queries address that plane.
    pub fn plane_z(&self) -> i32 {
        self.plane_z
    }

    /// Mean brightness of the frame just built; next frame's adaptation.
    pub fn mean_brightness(&self) -> f32 {
        self.last_mean_brightness
    }

    /// Brightness after the obstruction penalty along the observer's
    /// sightline.
    pub fn apparent_light_at_raw(&self, p: TilePos) -> f32 {
        let Some(i) = self.index(p.x, p.y) else {
            return 0.0;
        };
        self.brightness[i] * self.seen[i]
    }

    /// Classify a tile for one observer.
    pub fn apparent_light_at(
        &self,
        p: TilePos,
        vars: &VisionVariables,
        cfg: &LightConfig,
    ) -> LitLevel {
        let Some(i) = self.index(p.x, p.y) else {
            return LitLevel::Dark;
        };
        if chebyshev_dist(vars.origin, p) > vars.sight_range {
            return LitLevel::Dark;
        }
        let seen = self.seen[i];
        if seen <= 0.0 {
            return LitLevel::Dark;
        }
        let apparent = self.brightness[i] * seen;
        if apparent < vars.vision_threshold {
            return LitLevel::Dark;
        }
        if apparent >= cfg.ambient_lit {
            if self.source[i] >= cfg.bright_source_floor {
                LitLevel::Bright
            } else {
                LitLevel::Lit
            }
        } else if apparent >= cfg.ambient_low {
            LitLevel::Low
        } else {
            LitLevel::Dark
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapdata::{terrain, MapData};
    use std::sync::Arc;

    fn indoor_grid(w: u32, h: u32) -> MapGrid {
        let mut g = MapGrid::new(w, h, Arc::new(MapData::builtin()));
        g.fill_terrain(terrain::T_FLOOR);
        g
    }

    fn build(
        grid: &MapGrid,
        observer: &Observer,
        now: u64,
        cfg: &LightConfig,
    ) -> LightMap {
        let mut lm = LightMap::new();
        lm.generate(grid, &CreatureTracker::default(), observer, now, cfg);
        lm
    }

    #[test]
    fn quadrant_split_ratios_are_pinned() {
        let mut q = FourQuadrants::default();
        q.credit((2, -1), 8.0);
        assert_eq!(q.get(LightQuadrant::NE), 8.0);
        assert_eq!(q.sum(), 8.0);

        let mut axis = FourQuadrants::default();
        axis.credit((3, 0), 8.0);
        assert_eq!(axis.get(LightQuadrant::NE), 4.0);
        assert_eq!(axis.get(LightQuadrant::SE), 4.0);
        assert_eq!(axis.get(LightQuadrant::NW), 0.0);

        let mut center = FourQuadrants::default();
        center.credit((0, 0), 8.0);
        for quad in [
            LightQuadrant::NE,
            LightQuadrant::SE,
            LightQuadrant::SW,
            LightQuadrant::NW,
        ] {
            assert_eq!(center.get(quad), 2.0);
        }
    }

    #[test]
    fn noon_ambient_reaches_every_outside_tile() {
        let mut g = indoor_grid(5, 5);
        g.fill_terrain(terrain::T_GRASS);
        let obs = Observer::new(TilePos::new(2, 2, 0));
        let cfg = LightConfig::default();
        let lm = build(&g, &obs, calendar::turn_at(0, 12), &cfg);

        for p in g.positions() {
            assert_eq!(lm.ambient_light_at(p), 100.0);
        }
    }

    #[test]
    fn single_source_brightness_is_bounded_by_its_range() {
        let g = indoor_grid(21, 21);
        let obs = Observer::new(TilePos::new(10, 10, 0));
        let cfg = LightConfig::default();
        let mut lm = build(&g, &obs, 0, &cfg);

        let src = TilePos::new(10, 10, 0);
        lm.apply_light_source(src, 50.0, &cfg);

        let range = cfg.light_range(50.0);
        for p in g.positions() {
            if chebyshev_dist(src, p) > range {
                assert!(
                    lm.ambient_light_at(p) < cfg.ambient_low,
                    "tile {p:?} beyond range {range} should stay below the faint floor"
                );
            }
        }
        assert_eq!(lm.source_light_at(src), 50.0);
    }

    #[test]
    fn sources_are_additive() {
        let g = indoor_grid(15, 15);
        let obs = Observer::new(TilePos::new(7, 7, 0));
        let cfg = LightConfig::default();

        let a = TilePos::new(3, 7, 0);
        let b = TilePos::new(11, 7, 0);

        let mut only_a = build(&g, &obs, 0, &cfg);
        only_a.apply_light_source(a, 25.0, &cfg);
        let mut only_b = build(&g, &obs, 0, &cfg);
        only_b.apply_light_source(b, 25.0, &cfg);
        let mut both = build(&g, &obs, 0, &cfg);
        both.apply_light_source(a, 25.0, &cfg);
        both.apply_light_source(b, 25.0, &cfg);

        for p in g.positions() {
            let sum = only_a.ambient_light_at(p) + only_b.ambient_light_at(p);
            assert!((both.ambient_light_at(p) - sum).abs() < 1e-4);
        }
    }

    #[test]
    fn generate_discards_the_previous_frame() {
        let mut g = indoor_grid(9, 9);
        let p = TilePos::new(4, 4, 0);
        g.add_field(p, crate::fields::FD_FIRE, 3).unwrap();
        let obs = Observer::new(TilePos::new(1, 1, 0));
        let cfg = LightConfig::default();

        let mut lm = build(&g, &obs, 0, &cfg);
        assert!(lm.ambient_light_at(p) >= 50.0);

        g.remove_field(p, crate::fields::FD_FIRE);
        lm.generate(&g, &CreatureTracker::default(), &obs, 0, &cfg);
        assert_eq!(lm.ambient_light_at(p), 0.0);
    }

    #[test]
    fn wall_between_source_and_observer_reads_dark() {
        // L # @  on one row, at night with no other light
        let mut g = indoor_grid(3, 1);
        g.set_terrain(TilePos::new(1, 0, 0), terrain::T_BRICK_WALL).unwrap();
        g.set_terrain(TilePos::new(0, 0, 0), terrain::T_UTILITY_LIGHT)
            .unwrap();
        let obs = Observer::new(TilePos::new(2, 0, 0));
        let cfg = LightConfig::default();
        let lm = build(&g, &obs, 0, &cfg);

        let at_observer = TilePos::new(2, 0, 0);
        assert!(lm.ambient_light_at(at_observer) <= cfg.ambient_low);

        let vars = VisionVariables::capture(
            &obs,
            obs.effective_local_light(lm.ambient_light_at(at_observer)),
            &cfg,
        );
        assert_eq!(lm.apparent_light_at(at_observer, &vars, &cfg), LitLevel::Dark);
        assert_eq!(
            lm.apparent_light_at(TilePos::new(0, 0, 0), &vars, &cfg),
            LitLevel::Dark,
            "the source is hidden behind the wall"
        );
    }

    #[test]
    fn weak_emitters_do_not_read_bright() {
        let cfg = LightConfig::default();

        // intensity-3 electricity glows at exactly the lit threshold but
        // stays under the bright-source floor
        let mut arcing = indoor_grid(7, 7);
        let p = TilePos::new(3, 3, 0);
        arcing.add_field(p, crate::fields::FD_ELECTRICITY, 3).unwrap();
        let obs = Observer::new(p);
        let lm = build(&arcing, &obs, 0, &cfg);
        let vars = VisionVariables::capture(&obs, lm.ambient_light_at(p), &cfg);
        assert_eq!(lm.apparent_light_at(p, &vars, &cfg), LitLevel::Lit);

        // a lamp past the floor on the same tile does read bright
        let mut lamplit = indoor_grid(7, 7);
        lamplit.set_item_light(p, 15.0).unwrap();
        let lm = build(&lamplit, &obs, 0, &cfg);
        let vars = VisionVariables::capture(&obs, lm.ambient_light_at(p), &cfg);
        assert_eq!(lm.apparent_light_at(p, &vars, &cfg), LitLevel::Bright);
    }

    #[test]
    fn observer_lamp_lights_their_surroundings() {
        let g = indoor_grid(9, 9);
        let obs = Observer::new(TilePos::new(4, 4, 0)).with_active_light(15.0);
        let cfg = LightConfig::default();
        let lm = build(&g, &obs, 0, &cfg);

        assert!(lm.ambient_light_at(TilePos::new(4, 4, 0)) >= 15.0);
        assert!(lm.ambient_light_at(TilePos::new(6, 4, 0)) > 0.0);
    }
}
