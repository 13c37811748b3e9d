//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Seeded RNG only
//! - Stable iteration order (segments in track order, players by index)
//! - No rendering, audio or platform dependencies

pub mod collision;
pub mod geom;
pub mod level;
pub mod pool;
pub mod rng;
pub mod state;
pub mod tick;
pub mod validate;

pub use collision::{Contact, Hazard};
pub use geom::Aabb;
pub use level::{Level, SegmentView};
pub use pool::{Handle, Pool, Reset};
pub use rng::SeededStream;
pub use state::{
    Coin, DeathCause, Gap, JumpPad, MovingPlatform, NEVER, Obstacle, Pillar, Player, PlayerPhase,
    Ring, RunEvent, Segment, Spike,
};
pub use tick::{Run, RunPhase, TickInput, step_player, tick};
pub use validate::{SeedReport, Violation, ViolationKind};
