//! Observer state: impairments, carried light, and how far they can see.
//!
//! Sight range is the lesser of a flag-derived geometric cap and a
//! Beer-Lambert cutoff: the farthest distance at which the light on the
//! observer's own tile still reads above their adaptation threshold after
//! open-air attenuation.

use bevy::prelude::Resource;
use bitflags::bitflags;

use crate::grid::TilePos;
use crate::light_config::LightConfig;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct VisionFlags: u16 {
        const BLIND = 1 << 0;
        const BOOMERED = 1 << 1;
        const MYOPIC = 1 << 2;
        /// Excellent night eyes, daylight-nearsighted unless corrected.
        const URSINE = 1 << 3;
        const UNDERWATER = 1 << 4;
        const FIX_NEARSIGHT = 1 << 5;
        const SWIM_GOGGLES = 1 << 6;
    }
}

#[derive(Resource, Debug, Clone)]
pub struct Observer {
    pub pos: TilePos,
    pub flags: VisionFlags,
    /// Output of a held or worn active light, fed to the light map.
    pub active_light: f32,
    /// Adaptation threshold carried over from the previous frame.
    pub vision_threshold: f32,
}

impl Observer {
    pub fn new(pos: TilePos) -> Self {
        Self {
            pos,
            flags: VisionFlags::empty(),
            active_light: 0.0,
            vision_threshold: 0.0125,
        }
    }

    pub fn with_flags(mut self, flags: VisionFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_active_light(mut self, luminance: f32) -> Self {
        self.active_light = luminance.max(0.0);
        self
    }

    /// Geometric range cap from impairments alone, before light is
    /// considered. The Ursine daylight cap is not applied here because it
    /// depends on the light at the observer's tile.
    pub fn unimpaired_range(&self, cfg: &LightConfig) -> i32 {
        let f = self.flags;
        if f.contains(VisionFlags::BLIND) {
            return 0;
        }
        if f.contains(VisionFlags::BOOMERED) {
            return cfg.boomer_range;
        }
        if f.contains(VisionFlags::UNDERWATER) && !f.contains(VisionFlags::SWIM_GOGGLES) {
            return cfg.underwater_range;
        }
        if f.contains(VisionFlags::MYOPIC) && !f.contains(VisionFlags::FIX_NEARSIGHT) {
            return cfg.nearsight_range;
        }
        cfg.max_view_distance
    }

    /// Light the observer effectively stands in: ambient at their tile or
    /// their own lamp, whichever is stronger.
    pub fn effective_local_light(&self, ambient_at_tile: f32) -> f32 {
        ambient_at_tile.max(self.active_light)
    }

    /// How far the observer can see given the light on their own tile.
    pub fn sight_range(&self, local_light: f32, cfg: &LightConfig) -> i32 {
        let mut range = self.unimpaired_range(cfg);

        // Ursine eyes are not nearsight in the dark: the cap only binds once
        // the observer's own tile is lit or brighter.
        if self.flags.contains(VisionFlags::URSINE)
            && !self.flags.contains(VisionFlags::FIX_NEARSIGHT)
            && local_light >= cfg.ambient_lit
        {
            range = range.min(cfg.nearsight_range);
        }
        if range == 0 {
            return 0;
        }

        let threshold = self.vision_threshold.max(cfg.vision_threshold_min);
        let cutoff = if local_light <= threshold {
            1
        } else {
            ((local_light / threshold).ln() / cfg.transparency_open_air).floor() as i32
        };
        range.min(cutoff.max(1))
    }

    /// Adapt to what was just seen; takes effect next frame.
    pub fn adapt(&mut self, prev_mean_brightness: f32, cfg: &LightConfig) {
        self.vision_threshold = cfg.vision_threshold(prev_mean_brightness);
    }
}

/// Per-frame snapshot consumed by tile classification queries.
#[derive(Resource, Debug, Clone, Copy)]
pub struct VisionVariables {
    pub origin: TilePos,
    pub vision_threshold: f32,
    pub sight_range: i32,
}

impl VisionVariables {
    pub fn capture(observer: &Observer, local_light: f32, cfg: &LightConfig) -> Self {
        Self {
            origin: observer.pos,
            vision_threshold: observer.vision_threshold.max(cfg.vision_threshold_min),
            sight_range: observer.sight_range(local_light, cfg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(flags: VisionFlags) -> Observer {
        Observer::new(TilePos::new(0, 0, 0)).with_flags(flags)
    }

    #[test]
    fn impairments_cap_geometric_range() {
        let cfg = LightConfig::default();
        assert_eq!(obs(VisionFlags::empty()).unimpaired_range(&cfg), 60);
        assert_eq!(obs(VisionFlags::BLIND).unimpaired_range(&cfg), 0);
        assert_eq!(obs(VisionFlags::BOOMERED).unimpaired_range(&cfg), 1);
        assert_eq!(obs(VisionFlags::MYOPIC).unimpaired_range(&cfg), 12);
        assert_eq!(
            obs(VisionFlags::MYOPIC | VisionFlags::FIX_NEARSIGHT).unimpaired_range(&cfg),
            60
        );
        assert_eq!(obs(VisionFlags::UNDERWATER).unimpaired_range(&cfg), 4);
        assert_eq!(
            obs(VisionFlags::UNDERWATER | VisionFlags::SWIM_GOGGLES).unimpaired_range(&cfg),
            60
        );
    }

    #[test]
    fn full_daylight_reaches_the_view_cap() {
        let cfg = LightConfig::default();
        assert_eq!(obs(VisionFlags::empty()).sight_range(100.0, &cfg), 60);
    }

    #[test]
    fn dim_light_cuts_range_by_beer_lambert() {
        let cfg = LightConfig::default();
        let mut watcher = obs(VisionFlags::empty());
        watcher.vision_threshold = 1.0;

        // ln(4.5 / 1.0) / 0.038376 ≈ 39.2
        assert_eq!(watcher.sight_range(4.5, &cfg), 39);
        // own tile is always visible
        assert_eq!(watcher.sight_range(0.5, &cfg), 1);
    }

    #[test]
    fn ursine_cap_depends_on_local_light() {
        let cfg = LightConfig::default();
        let bear = obs(VisionFlags::URSINE);

        assert_eq!(bear.sight_range(100.0, &cfg), 12, "capped in daylight");
        assert!(bear.sight_range(1.0, &cfg) > 12, "uncapped in the dark");

        let corrected = obs(VisionFlags::URSINE | VisionFlags::FIX_NEARSIGHT);
        assert_eq!(corrected.sight_range(100.0, &cfg), 60);
    }

    #[test]
    fn adaptation_raises_the_threshold_after_daylight() {
        let cfg = LightConfig::default();
        let mut watcher = obs(VisionFlags::empty());
        watcher.adapt(100.0, &cfg);
        assert!((watcher.vision_threshold - 1.25).abs() < 1e-6);
        watcher.adapt(0.0, &cfg);
        assert_eq!(watcher.vision_threshold, cfg.vision_threshold_min);
    }

    #[test]
    fn own_lamp_counts_as_local_light() {
        let lamp = Observer::new(TilePos::new(0, 0, 0)).with_active_light(15.0);
        assert_eq!(lamp.effective_local_light(1.0), 15.0);
        assert_eq!(lamp.effective_local_light(100.0), 100.0);
    }
}
