//! Flux Runner - endless runner simulation core
//!
//! Core modules:
//! - `sim`: Deterministic simulation (level generation, physics, collisions)
//! - `tuning`: Data-driven physics and pacing values
//!
//! Rendering, audio, input devices and progression live outside this crate
//! and talk to it through `sim::Run`, `sim::Level` and the emitted events.

pub mod sim;
pub mod tuning;

pub use tuning::{Difficulty, Tuning, TuningError};

/// Game configuration constants
pub mod consts {
    /// Nominal frame step (60 Hz)
    pub const SIM_DT: f32 = 1.0 / 60.0;

    /// World bounds
    pub const WORLD_TOP: f32 = 60.0;
    /// World bottom sits this far above the bottom of the view
    pub const WORLD_BOTTOM_MARGIN: f32 = 40.0;
    /// Past the world bottom by this much is always fatal
    pub const OUT_OF_BOUNDS_MARGIN: f32 = 10.0;

    /// Player box
    pub const PLAYER_WIDTH: f32 = 40.0;
    pub const PLAYER_HEIGHT: f32 = 40.0;
    /// Hitbox shrink per side (fraction of size) for forgiving hits
    pub const HITBOX_SHRINK: f32 = 0.02;
    /// Airborne spin (degrees per second)
    pub const SPIN_SPEED: f32 = 120.0;
    /// Spawn height above the bottom of the view, used when no platform
    /// is under the spawn point
    pub const PLAYER_SPAWN_OFFSET: f32 = 120.0;
    /// Lead player's starting distance; others start `PLAYER_SPACING` apart
    pub const PLAYER_START_X: f32 = 100.0;
    pub const PLAYER_SPACING: f32 = 100.0;
    pub const MAX_PLAYERS: usize = 2;

    /// Max vertical travel per physics sub-step
    pub const SUBSTEP_DISTANCE: f32 = 10.0;

    /// Platform slab thickness
    pub const PLATFORM_THICKNESS: f32 = 20.0;
    /// How far below the surface a player over a gap may sink before dying
    pub const GAP_FALL_DEPTH: f32 = 16.0;
    /// How far past a surface a moving box may already be and still land
    pub const LANDING_TOLERANCE: f32 = GAP_FALL_DEPTH;

    /// Segment layout
    pub const SEGMENT_MIN_WIDTH: f32 = 300.0;
    pub const SEGMENT_MAX_WIDTH: f32 = 700.0;
    pub const INITIAL_SEGMENTS: usize = 8;
    /// Flat, empty opening segment so nothing spawns under the players
    pub const START_RUNWAY_WIDTH: f32 = SEGMENT_MIN_WIDTH;
    /// Runway and tutorial ground sit this far above the world bottom
    pub const GROUND_OFFSET: f32 = 40.0;
    /// Segments this far behind the camera are evicted
    pub const EVICT_MARGIN: f32 = 200.0;
    /// Generation runs this many view widths ahead of the camera
    pub const LOOKAHEAD_VIEWS: f32 = 2.0;

    /// Obstacle dimensions
    pub const SPIKE_WIDTH: f32 = 28.0;
    pub const SPIKE_HEIGHT: f32 = 32.0;
    pub const SPIKE_MIN_SPACING: f32 = 50.0;
    pub const PILLAR_WIDTH: f32 = 30.0;
    pub const JUMP_PAD_WIDTH: f32 = 60.0;
    pub const JUMP_PAD_HEIGHT: f32 = 12.0;
    pub const RING_SIZE: f32 = 48.0;
    pub const MOVING_WIDTH: f32 = 100.0;
    pub const MOVING_HEIGHT: f32 = 18.0;
    pub const COIN_SIZE: f32 = 12.0;
    /// Coins, rings float this far above the platform
    pub const PICKUP_HOVER: f32 = 40.0;

    /// Coin arena size
    pub const COIN_POOL_CAPACITY: usize = 64;

    /// Tutorial layout seed
    pub const TUTORIAL_SEED: u64 = 0x1234_5678;
}

/// Snap an angle in degrees to the nearest quarter turn
#[inline]
pub fn snap_quarter_turn(angle: f32) -> f32 {
    (angle / 90.0).round() * 90.0
}
