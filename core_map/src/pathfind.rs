//! Multi-source, single-target pathfinding.
//!
//! Dijkstra expands from the target so one pass serves every requested
//! start: the result is a parent grid, and following parents from any start
//! walks a minimum-cost route to the target. Starts are seeded as `Avoid`
//! so expansion flows through them with a penalty, which gives approaching
//! creatures natural surrounding behavior instead of single-file stacking.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, HashMap};

use serde::Deserialize;

use crate::grid::{chebyshev_dist, MapGrid, TilePos};
use crate::mapdata::TerrainFlags;

/// 8-connected neighborhood, cardinals first.
const NEIGHBORS: [(i32, i32); 8] = [
    (1, 0),
    (0, 1),
    (-1, 0),
    (0, -1),
    (1, 1),
    (-1, 1),
    (-1, -1),
    (1, -1),
];

/// The reached-all-starts test runs every `unreached * CHECK_STRIDE` pops.
const CHECK_STRIDE: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TileState {
    Open,
    Closed,
    /// A start tile: path through it, but penalize making it a waypoint.
    Avoid,
}

/// Per-requester knobs, deserializable from host JSON by id.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathSettings {
    pub max_dist: i32,
    /// 0 disables bashing through obstacles entirely.
    pub bash_force: i32,
    pub allow_open_doors: bool,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            max_dist: 9999,
            bash_force: 0,
            allow_open_doors: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ProfileEntry {
    id: String,
    #[serde(flatten)]
    settings: PathSettings,
}

/// Named pathfinder profiles loaded from data.
#[derive(Debug, Clone, Default)]
pub struct PathProfiles {
    profiles: HashMap<String, PathSettings>,
}

impl PathProfiles {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        let entries: Vec<ProfileEntry> = serde_json::from_str(json)?;
        let mut profiles = HashMap::new();
        for entry in entries {
            profiles.insert(entry.id, entry.settings);
        }
        Ok(Self { profiles })
    }

    pub fn get(&self, id: &str) -> Option<&PathSettings> {
        self.profiles.get(id)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

/// Ready-made danger costs for the common movement traits; hosts with more
/// exotic creatures supply their own closure instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct HazardPolicy {
    pub flying: bool,
    /// Reckless creatures walk straight through fire.
    pub wary_of_fields: bool,
}

impl HazardPolicy {
    pub fn cautious() -> Self {
        Self {
            flying: false,
            wary_of_fields: true,
        }
    }

    pub fn reckless() -> Self {
        Self::default()
    }

    pub fn flyer() -> Self {
        Self {
            flying: true,
            wary_of_fields: true,
        }
    }

    pub fn danger_cost(&self, grid: &MapGrid, p: TilePos) -> u32 {
        let data = grid.data();
        let Some(cell) = grid.cell(p) else {
            return 0;
        };
        let ter = data.terrain(cell.terrain);
        if ter.flags.contains(TerrainFlags::LAVA) {
            return 1000;
        }
        if ter.flags.contains(TerrainFlags::OPEN_AIR) && !self.flying {
            return 1000;
        }

        let mut cost = 0;
        if !data.trap(cell.trap).benign {
            cost += 500;
        }
        if self.wary_of_fields {
            for entry in cell.fields.entries() {
                let hazardous = data
                    .field(entry.type_id)
                    .is_some_and(|def| !def.hazard.is_empty());
                if hazardous {
                    cost += 1000;
                    break;
                }
            }
        }
        cost
    }
}

/// The product of one expansion: parents and scores on the target's plane.
#[derive(Debug, Clone)]
pub struct ParentGrid {
    width: i32,
    height: i32,
    z: i32,
    target: TilePos,
    parent: Vec<i32>,
    score: Vec<i32>,
}

impl ParentGrid {
    #[inline]
    fn index(&self, p: TilePos) -> Option<usize> {
        if p.z != self.z || p.x < 0 || p.y < 0 || p.x >= self.width || p.y >= self.height {
            return None;
        }
        Some((p.y * self.width + p.x) as usize)
    }

    fn pos_of(&self, idx: i32) -> TilePos {
        TilePos::new(idx % self.width, idx / self.width, self.z)
    }

    pub fn target(&self) -> TilePos {
        self.target
    }

    pub fn parent_of(&self, p: TilePos) -> Option<TilePos> {
        let idx = self.index(p)?;
        let parent = self.parent[idx];
        (parent >= 0).then(|| self.pos_of(parent))
    }

    /// Relaxed cost from `p` to the target, if `p` was reached.
    pub fn cost_from(&self, p: TilePos) -> Option<i32> {
        let idx = self.index(p)?;
        (self.score[idx] != i32::MAX).then_some(self.score[idx])
    }
}

pub struct Pathfinder {
    pub settings: PathSettings,
    seekers: BTreeMap<TilePos, BTreeSet<TilePos>>,
    maps: BTreeMap<TilePos, ParentGrid>,
}

impl Pathfinder {
    pub fn new(settings: PathSettings) -> Self {
        Self {
            settings,
            seekers: BTreeMap::new(),
            maps: BTreeMap::new(),
        }
    }

    /// Queue a start/goal pair for the next `compute`.
    pub fn request_path(&mut self, start: TilePos, goal: TilePos) {
        self.seekers.entry(goal).or_default().insert(start);
    }

    /// Run one inverse-Dijkstra expansion per requested goal. Results stay
    /// valid until the terrain cost grid changes.
    pub fn compute<F>(&mut self, grid: &MapGrid, danger: F)
    where
        F: Fn(TilePos) -> u32,
    {
        let seekers = std::mem::take(&mut self.seekers);
        for (goal, starts) in seekers {
            if let Some(map) = expand(grid, &self.settings, &starts, goal, &danger) {
                self.maps.insert(goal, map);
            }
        }
    }

    pub fn parent_grid(&self, goal: TilePos) -> Option<&ParentGrid> {
        self.maps.get(&goal)
    }

    /// Walk the parent grid from `start` to `goal`. The returned path
    /// excludes the start and ends on the goal; empty means unreachable.
    pub fn get_path(&self, start: TilePos, goal: TilePos) -> Vec<TilePos> {
        let Some(map) = self.maps.get(&goal) else {
            tracing::error!(
                target: "gridlight::pathfind",
                ?goal,
                "path requested for a goal that was never computed"
            );
            return Vec::new();
        };
        let Some(start_idx) = map.index(start) else {
            tracing::error!(
                target: "gridlight::pathfind",
                ?start,
                "path start is out of bounds"
            );
            return Vec::new();
        };
        if start == goal {
            return Vec::new();
        }

        let goal_idx = map.index(goal).expect("goal was validated at expansion") as i32;
        let mut path = Vec::with_capacity(chebyshev_dist(start, goal) as usize * 3);
        let mut cur = map.parent[start_idx];
        if cur < 0 {
            return Vec::new();
        }

        let mut guard = map.parent.len();
        while cur != goal_idx {
            if guard == 0 {
                tracing::error!(
                    target: "gridlight::pathfind",
                    ?start,
                    ?goal,
                    "parent grid contains a cycle"
                );
                return Vec::new();
            }
            guard -= 1;
            if cur < 0 {
                tracing::error!(
                    target: "gridlight::pathfind",
                    ?start,
                    ?goal,
                    "parent chain breaks before reaching the goal"
                );
                return Vec::new();
            }
            path.push(map.pos_of(cur));
            cur = map.parent[cur as usize];
        }
        path.push(goal);
        path
    }

    /// One-shot convenience: request, compute and extract a single route.
    pub fn route<F>(&mut self, grid: &MapGrid, start: TilePos, goal: TilePos, danger: F) -> Vec<TilePos>
    where
        F: Fn(TilePos) -> u32,
    {
        self.request_path(start, goal);
        self.compute(grid, danger);
        self.get_path(start, goal)
    }
}

fn expand<F>(
    grid: &MapGrid,
    settings: &PathSettings,
    starts: &BTreeSet<TilePos>,
    goal: TilePos,
    danger: &F,
) -> Option<ParentGrid>
where
    F: Fn(TilePos) -> u32,
{
    if !grid.in_bounds(goal) {
        tracing::error!(
            target: "gridlight::pathfind",
            ?goal,
            "cannot expand toward an out-of-bounds goal"
        );
        return None;
    }

    let width = grid.width() as i32;
    let height = grid.height() as i32;
    let z = goal.z;
    let total = (width * height) as usize;
    let data = grid.data();

    let mut state = vec![TileState::Open; total];
    let mut score = vec![i32::MAX; total];
    let mut parent = vec![-1i32; total];
    let index = |x: i32, y: i32| (y * width + x) as usize;

    // Starts too far to ever be reached are quietly dropped; out-of-bounds
    // starts are a caller bug worth a diagnostic.
    let mut unreached: BTreeSet<TilePos> = BTreeSet::new();
    let mut min_max_dist = -1;
    for &s in starts {
        let dist = chebyshev_dist(s, goal);
        if !grid.in_bounds(s) || s.z != z {
            tracing::error!(
                target: "gridlight::pathfind",
                start = ?s,
                "pathfinding attempted from an out-of-bounds start"
            );
        } else if dist <= settings.max_dist {
            min_max_dist = min_max_dist.max(dist);
            unreached.insert(s);
        }
    }
    for &s in &unreached {
        state[index(s.x, s.y)] = TileState::Avoid;
    }

    let goal_idx = index(goal.x, goal.y);
    score[goal_idx] = 0;
    parent[goal_idx] = goal_idx as i32;

    let mut open: BinaryHeap<Reverse<(i32, i32)>> = BinaryHeap::new();
    open.push(Reverse((0, goal_idx as i32)));
    let mut next_check = 0usize;

    while let Some(Reverse((cost, cur_flat))) = open.pop() {
        if cost > settings.max_dist {
            break;
        }
        let cur_idx = cur_flat as usize;
        if state[cur_idx] == TileState::Closed {
            continue;
        }
        state[cur_idx] = TileState::Closed;
        let cur = TilePos::new(cur_flat % width, cur_flat / width, z);

        // Deferred bulk check that every start has been swallowed; doing it
        // per-pop would dominate the loop.
        if cost >= min_max_dist {
            if next_check > 0 {
                next_check -= 1;
            } else {
                unreached.retain(|p| state[index(p.x, p.y)] != TileState::Closed);
                if unreached.is_empty() {
                    break;
                }
                next_check = unreached.len() * CHECK_STRIDE;
            }
        }

        for (dx, dy) in NEIGHBORS {
            let nx = cur.x + dx;
            let ny = cur.y + dy;
            if nx < 0 || ny < 0 || nx >= width || ny >= height {
                continue;
            }
            let n_idx = index(nx, ny);
            if state[n_idx] == TileState::Closed {
                continue;
            }
            let npos = TilePos::new(nx, ny, z);
            let cell = grid.cell(npos).expect("neighbor is in bounds");
            let move_cost = cell.move_cost as i32;
            let ter = data.terrain(cell.terrain);
            let openable = ter.open_to.is_some();
            // Bash ratings are only worth computing for blocked tiles.
            let rating = if settings.bash_force == 0 || move_cost != 0 {
                -1
            } else {
                ter.bash_rating(settings.bash_force)
            };

            if move_cost == 0 && rating <= 0 && !openable && cell.vehicle.is_none() {
                // Permanently impassable for this requester; close it so we
                // never price it again.
                state[n_idx] = TileState::Closed;
                continue;
            }

            let mut newg = score[cur_idx]
                + move_cost
                + i32::from(dx != 0 && dy != 0)
                + if state[n_idx] == TileState::Avoid { 100 } else { 0 };

            if move_cost == 0 {
                if openable
                    && settings.allow_open_doors
                    && (!ter.flags.contains(TerrainFlags::OPENCLOSE_INSIDE)
                        || !grid.is_outside(cur))
                {
                    // One turn to open, then step through.
                    newg += 4;
                } else if let Some(veh) = cell.vehicle {
                    let cur_in_vehicle = grid.cell(cur).is_some_and(|c| c.vehicle.is_some());
                    if settings.allow_open_doors
                        && veh.openable
                        && (!veh.inside_only || cur_in_vehicle)
                    {
                        newg += 10;
                    } else if settings.bash_force > 0 {
                        newg += veh.hp as i32 / settings.bash_force + 8 + 4;
                    } else {
                        newg = 10000;
                    }
                } else if rating > 1 {
                    // Expected turns to break through, plus a penalty so we
                    // do not trash everything just because we can.
                    newg += 20 / rating + 6;
                } else if rating == 1 {
                    newg += 1000;
                } else {
                    newg = 10000;
                }
            }

            newg += danger(npos) as i32;

            if newg < score[n_idx] {
                score[n_idx] = newg;
                parent[n_idx] = cur_flat;
                open.push(Reverse((newg, n_idx as i32)));
            }
        }
    }

    Some(ParentGrid {
        width,
        height,
        z,
        target: goal,
        parent,
        score,
    })
}
