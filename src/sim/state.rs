//! Level and player entities
//!
//! Plain state containers. The generator fills segments, the resolver
//! moves players; neither type reaches out to anything else.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::geom::Aabb;
use super::pool::{Handle, Reset};
use crate::consts::*;
use crate::snap_quarter_turn;

/// A hole in the platform, `x` is its left edge
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gap {
    pub x: f32,
    pub width: f32,
}

/// Solid column standing on the platform, lethal on any contact
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pillar {
    /// Horizontal center
    pub x: f32,
    /// Platform surface the pillar stands on
    pub base_y: f32,
    pub width: f32,
    pub height: f32,
}

impl Pillar {
    pub fn aabb(&self) -> Aabb {
        Aabb::from_corner(
            self.x - self.width / 2.0,
            self.base_y - self.height,
            self.width,
            self.height,
        )
    }
}

/// Launches a grounded player upward
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JumpPad {
    pub pos: Vec2,
    pub size: Vec2,
    pub strength: f32,
}

impl JumpPad {
    pub fn aabb(&self) -> Aabb {
        Aabb::from_center(self.pos, self.size)
    }
}

/// Mid-air booster fired by a jump press while overlapping; single use
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ring {
    pub pos: Vec2,
    pub size: Vec2,
    pub strength: f32,
    pub active: bool,
}

impl Ring {
    pub fn aabb(&self) -> Aabb {
        Aabb::from_center(self.pos, self.size)
    }
}

/// Platform bobbing vertically on a sine wave
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovingPlatform {
    /// Horizontal center
    pub x: f32,
    /// Top edge at rest
    pub base_y: f32,
    pub width: f32,
    pub height: f32,
    pub amplitude: f32,
    /// Seconds per oscillation
    pub period: f32,
    /// Phase offset in seconds
    pub phase: f32,
}

impl MovingPlatform {
    /// Top edge at `run_time`
    pub fn current_y(&self, run_time: f32) -> f32 {
        let angle = std::f32::consts::TAU * (run_time + self.phase) / self.period;
        self.base_y + angle.sin() * self.amplitude
    }

    pub fn aabb(&self, run_time: f32) -> Aabb {
        Aabb::from_corner(
            self.x - self.width / 2.0,
            self.current_y(run_time),
            self.width,
            self.height,
        )
    }

    pub fn left(&self) -> f32 {
        self.x - self.width / 2.0
    }

    pub fn right(&self) -> f32 {
        self.x + self.width / 2.0
    }
}

/// Obstacle placed in a segment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Obstacle {
    Gap(Gap),
    Pillar(Pillar),
    JumpPad(JumpPad),
    Ring(Ring),
    Moving(MovingPlatform),
}

impl Obstacle {
    /// Short name for logs and diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            Obstacle::Gap(_) => "gap",
            Obstacle::Pillar(_) => "pillar",
            Obstacle::JumpPad(_) => "jump_pad",
            Obstacle::Ring(_) => "ring",
            Obstacle::Moving(_) => "moving",
        }
    }

    /// Horizontal extent `(left, right)` along the track
    pub fn span(&self) -> (f32, f32) {
        match self {
            Obstacle::Gap(g) => (g.x, g.x + g.width),
            Obstacle::Pillar(p) => (p.x - p.width / 2.0, p.x + p.width / 2.0),
            Obstacle::JumpPad(j) => (j.pos.x - j.size.x / 2.0, j.pos.x + j.size.x / 2.0),
            Obstacle::Ring(r) => (r.pos.x - r.size.x / 2.0, r.pos.x + r.size.x / 2.0),
            Obstacle::Moving(m) => (m.left(), m.right()),
        }
    }

    /// Move along the track (used when repair closes up the layout)
    pub fn shift_x(&mut self, dx: f32) {
        match self {
            Obstacle::Gap(g) => g.x += dx,
            Obstacle::Pillar(p) => p.x += dx,
            Obstacle::JumpPad(j) => j.pos.x += dx,
            Obstacle::Ring(r) => r.pos.x += dx,
            Obstacle::Moving(m) => m.x += dx,
        }
    }
}

/// Floor spike standing on the platform
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Spike {
    /// Horizontal center
    pub x: f32,
    pub width: f32,
}

/// Collectible coin (lives in the level's coin pool)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coin {
    pub pos: Vec2,
    pub size: f32,
    pub active: bool,
    pub collected: bool,
}

impl Default for Coin {
    fn default() -> Self {
        Self {
            pos: Vec2::ZERO,
            size: COIN_SIZE,
            active: false,
            collected: false,
        }
    }
}

impl Reset for Coin {
    fn reset(&mut self) {
        *self = Coin::default();
    }
}

impl Coin {
    pub fn aabb(&self) -> Aabb {
        Aabb::from_center(self.pos, Vec2::splat(self.size))
    }
}

/// A contiguous slice of track: one platform plus its contents
#[derive(Debug)]
pub struct Segment {
    pub id: u64,
    pub x: f32,
    pub width: f32,
    /// Top of the platform slab
    pub platform_y: f32,
    pub obstacles: Vec<Obstacle>,
    pub coins: Vec<Handle<Coin>>,
    pub spikes: Vec<Spike>,
}

impl Segment {
    pub fn new(id: u64, x: f32, width: f32, platform_y: f32) -> Self {
        Self {
            id,
            x,
            width,
            platform_y,
            obstacles: Vec::new(),
            coins: Vec::new(),
            spikes: Vec::new(),
        }
    }

    #[inline]
    pub fn end(&self) -> f32 {
        self.x + self.width
    }

    /// Whole platform slab, gaps included
    pub fn platform_aabb(&self) -> Aabb {
        Aabb::from_corner(self.x, self.platform_y, self.width, PLATFORM_THICKNESS)
    }

    /// Gap spans clipped to this segment
    pub fn gap_spans(&self) -> impl Iterator<Item = (f32, f32)> + '_ {
        self.obstacles.iter().filter_map(|ob| match ob {
            Obstacle::Gap(g) => {
                let start = g.x.max(self.x);
                let end = (g.x + g.width).min(self.end());
                (end > start).then_some((start, end))
            }
            _ => None,
        })
    }

    /// Is there platform under horizontal position `x`?
    pub fn is_solid_at(&self, x: f32) -> bool {
        x >= self.x && x <= self.end() && !self.gap_spans().any(|(s, e)| x > s && x < e)
    }

    /// Is `x` over one of this segment's gaps?
    pub fn is_gap_at(&self, x: f32) -> bool {
        self.gap_spans().any(|(s, e)| x > s && x < e)
    }

    pub fn spike_aabb(&self, spike: &Spike) -> Aabb {
        Aabb::from_corner(
            spike.x - spike.width / 2.0,
            self.platform_y - SPIKE_HEIGHT,
            spike.width,
            SPIKE_HEIGHT,
        )
    }
}

/// Why a player died
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeathCause {
    Spike,
    Pillar,
    Gap,
    /// Hit the side of a moving platform
    SideClip,
    /// Ended up below the world
    OutOfBounds,
}

/// Player state machine: Grounded ⇄ Airborne → Dead
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerPhase {
    Grounded,
    Airborne,
    Dead,
}

/// Timestamp meaning "never" for jump windows
pub const NEVER: f32 = -9999.0;

/// A runner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    /// Vertical center
    pub y: f32,
    /// Horizontal world position (also drives the camera)
    pub distance: f32,
    pub vy: f32,
    /// +1 falls down, -1 falls up
    pub gravity_dir: f32,
    pub grounded: bool,
    pub alive: bool,
    pub width: f32,
    pub height: f32,
    /// Cosmetic rotation in degrees
    pub angle: f32,
    pub last_jump_time: f32,
    /// A late jump is allowed until this run time
    pub coyote_until: f32,
    /// An early jump fires on landing until this run time
    pub input_buffer_until: f32,
}

impl Player {
    pub fn new(y: f32, distance: f32) -> Self {
        Self {
            y,
            distance,
            vy: 0.0,
            gravity_dir: 1.0,
            grounded: false,
            alive: true,
            width: PLAYER_WIDTH,
            height: PLAYER_HEIGHT,
            angle: 0.0,
            last_jump_time: NEVER,
            coyote_until: NEVER,
            input_buffer_until: NEVER,
        }
    }

    pub fn phase(&self) -> PlayerPhase {
        if !self.alive {
            PlayerPhase::Dead
        } else if self.grounded {
            PlayerPhase::Grounded
        } else {
            PlayerPhase::Airborne
        }
    }

    /// Full box, used to stand on surfaces
    pub fn bounds(&self) -> Aabb {
        Aabb::from_center(
            Vec2::new(self.distance, self.y),
            Vec2::new(self.width, self.height),
        )
    }

    /// Slightly shrunk box, used for hazards and pickups
    pub fn hitbox(&self) -> Aabb {
        self.bounds().shrunk(HITBOX_SHRINK)
    }

    /// Jump if grounded or inside the coyote window
    pub fn attempt_jump(&mut self, now: f32, jump_velocity: f32) -> bool {
        if !self.alive {
            return false;
        }
        if self.grounded || now <= self.coyote_until {
            self.vy = jump_velocity * self.gravity_dir;
            self.grounded = false;
            self.coyote_until = NEVER;
            self.last_jump_time = now;
            true
        } else {
            false
        }
    }

    /// Remember a jump press so it fires if the player lands before `until`
    pub fn buffer_jump(&mut self, until: f32) {
        self.input_buffer_until = until;
    }

    pub fn has_coyote(&self, now: f32) -> bool {
        now <= self.coyote_until
    }

    pub fn has_buffered_jump(&self, now: f32) -> bool {
        now <= self.input_buffer_until
    }

    /// Swap which way gravity pulls this player
    pub fn flip_gravity(&mut self) {
        self.gravity_dir = -self.gravity_dir;
        self.grounded = false;
    }

    /// Touchdown bookkeeping
    pub fn land(&mut self, was_grounded: bool) {
        self.grounded = true;
        self.vy = 0.0;
        self.coyote_until = NEVER;
        if !was_grounded {
            self.angle = snap_quarter_turn(self.angle);
        }
    }

    pub fn kill(&mut self) {
        self.alive = false;
        self.grounded = false;
    }
}

/// Things the presentation layer reacts to (sound, particles, HUD, economy)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RunEvent {
    Jumped { player: usize },
    Landed { player: usize },
    JumpPadFired { player: usize },
    RingFired { player: usize },
    CoinCollected { player: usize, pos: Vec2 },
    SpeedUp { speed: f32 },
    PlayerDied { player: usize, cause: DeathCause },
    TutorialComplete,
    /// The run ended; in a versus run `winner` is the surviving player
    /// (`None` on a draw or in a solo run)
    RunOver { winner: Option<usize> },
}
