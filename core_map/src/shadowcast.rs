//! Symmetric recursive shadowcasting over eight octants.
//!
//! One engine serves both consumers: light accumulation from a source and
//! the observer's seen map. The octant walker visits every reachable cell at
//! most once per octant; callers deduplicate across octant boundaries with a
//! per-cast bitmap. Occlusion is binary (a zero-transparency cell terminates
//! the arc); partial occlusion is modelled as extinction accumulated along
//! the path, applied as `exp(-k·d)` on top of the geometric falloff.

/// A flat transparency plane for one z-layer. Anything off the plane reads
/// as opaque so rays cannot escape the active window.
pub(crate) struct CastPlane<'a> {
    pub transparency: &'a [f32],
    pub width: i32,
    pub height: i32,
}

impl CastPlane<'_> {
    #[inline]
    fn transparency(&self, x: i32, y: i32) -> f32 {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return 0.0;
        }
        self.transparency[(y * self.width + x) as usize]
    }

    #[inline]
    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return None;
        }
        Some((y * self.width + x) as usize)
    }
}

/// Row/column transform for one of the eight octants.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Octant {
    xx: i32,
    xy: i32,
    yx: i32,
    yy: i32,
}

pub(crate) const OCTANTS: [Octant; 8] = [
    Octant { xx: 0, xy: 1, yx: 1, yy: 0 },
    Octant { xx: 1, xy: 0, yx: 0, yy: 1 },
    Octant { xx: 0, xy: -1, yx: 1, yy: 0 },
    Octant { xx: -1, xy: 0, yx: 0, yy: 1 },
    Octant { xx: 0, xy: 1, yx: -1, yy: 0 },
    Octant { xx: 1, xy: 0, yx: 0, yy: -1 },
    Octant { xx: 0, xy: -1, yx: -1, yy: 0 },
    Octant { xx: -1, xy: 0, yx: 0, yy: -1 },
];

/// Extinction coefficient of one cell: the caller's per-tile baseline plus
/// the cell's own absorption. Opaque cells never get here.
#[inline]
fn extinction(base_k: f32, transparency: f32) -> f32 {
    base_k - transparency.min(1.0).ln()
}

/// Recursive walk of a single octant.
///
/// `start`/`end` bound the live slope band (`start >= end`), `row` is the
/// first row to scan, `cum_k` the mean extinction per tile accumulated on
/// the way here. The visitor receives the plane index, the world-space delta
/// from the origin, the dominant-axis distance, and the transmission factor.
#[allow(clippy::too_many_arguments)]
pub(crate) fn cast_octant<F>(
    plane: &CastPlane<'_>,
    octant: Octant,
    origin: (i32, i32),
    radius: f32,
    row: i32,
    mut start: f32,
    end: f32,
    mut cum_k: f32,
    base_k: f32,
    visit: &mut F,
) where
    F: FnMut(usize, (i32, i32), i32, f32),
{
    if start < end {
        return;
    }

    let mut new_start = 0.0f32;
    let mut blocked = false;
    let mut distance = row;

    while distance as f32 <= radius && !blocked {
        let delta_y = -distance;
        let mut axis_k = base_k;

        for delta_x in -distance..=0 {
            let current_x = origin.0 + delta_x * octant.xx + delta_y * octant.xy;
            let current_y = origin.1 + delta_x * octant.yx + delta_y * octant.yy;
            let left_slope = (delta_x as f32 - 0.5) / (delta_y as f32 + 0.5);
            let right_slope = (delta_x as f32 + 0.5) / (delta_y as f32 - 0.5);

            if start < right_slope {
                continue;
            }
            if end > left_slope {
                break;
            }

            let transparency = plane.transparency(current_x, current_y);
            let opaque = transparency <= 0.0;
            if !opaque && delta_x == 0 {
                axis_k = extinction(base_k, transparency);
            }

            let trig = ((delta_x * delta_x + delta_y * delta_y) as f32).sqrt();
            if trig <= radius {
                if let Some(idx) = plane.index(current_x, current_y) {
                    let transmission = (-cum_k * distance as f32).exp();
                    visit(
                        idx,
                        (current_x - origin.0, current_y - origin.1),
                        distance,
                        transmission,
                    );
                }
            }

            if blocked {
                if opaque {
                    new_start = right_slope;
                    continue;
                }
                blocked = false;
                start = new_start;
            } else if opaque && (distance as f32) < radius {
                blocked = true;
                cast_octant(
                    plane,
                    octant,
                    origin,
                    radius,
                    distance + 1,
                    start,
                    left_slope,
                    cum_k,
                    base_k,
                    visit,
                );
                new_start = right_slope;
            }
        }

        // Fold the straight-line cell of this row into the running mean so
        // deeper rows attenuate through what the ray just crossed.
        cum_k = (cum_k * (distance - 1).max(0) as f32 + axis_k) / distance as f32;
        distance += 1;
    }
}

/// Cast a light source over the whole plane. The per-cast `lit` bitmap keeps
/// octant overlaps from double-crediting a tile; the caller clears it and is
/// responsible for crediting the source tile itself.
pub(crate) fn cast_light_source<F>(
    plane: &CastPlane<'_>,
    origin: (i32, i32),
    luminance: f32,
    radius: f32,
    lit: &mut [bool],
    mut credit: F,
) where
    F: FnMut(usize, (i32, i32), f32),
{
    for &octant in &OCTANTS {
        cast_octant(
            plane,
            octant,
            origin,
            radius,
            1,
            1.0,
            0.0,
            0.0,
            0.0,
            &mut |idx, delta, dist, transmission| {
                if !lit[idx] {
                    lit[idx] = true;
                    let d = dist.max(1) as f32;
                    credit(idx, delta, luminance / (d * d) * transmission);
                }
            },
        );
    }
}

/// Cast the observer's seen map: each reachable cell records the best
/// transmission along any sightline, `1.0` on the observer's own tile.
pub(crate) fn cast_seen(
    plane: &CastPlane<'_>,
    origin: (i32, i32),
    radius: f32,
    open_air_k: f32,
    seen: &mut [f32],
) {
    if let Some(idx) = plane.index(origin.0, origin.1) {
        seen[idx] = 1.0;
    }
    for &octant in &OCTANTS {
        cast_octant(
            plane,
            octant,
            origin,
            radius,
            1,
            1.0,
            0.0,
            open_air_k,
            open_air_k,
            &mut |idx, _delta, _dist, transmission| {
                if transmission > seen[idx] {
                    seen[idx] = transmission;
                }
            },
        );
    }
}
