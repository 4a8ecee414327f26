//! Shared ECS resources for hosts that schedule the core as systems.

use bevy::prelude::Resource;

/// Total game turns elapsed. The host advances it; the core only reads.
#[derive(Resource, Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameTurn(pub u64);
