//! Frame tick and player physics
//!
//! `tick` advances a whole run by one frame: input, level upkeep, player
//! physics, pickups, then end-of-run checks. `step_player` is the per-player
//! integrator and can be driven on its own.

use serde::{Deserialize, Serialize};

use super::collision::Contact;
use super::level::Level;
use super::state::{DeathCause, NEVER, Player, RunEvent};
use crate::consts::*;
use crate::tuning::{Difficulty, Tuning, TuningError};

/// Input commands for a single tick
#[derive(Debug, Clone, Copy, Default)]
pub struct TickInput {
    /// Jump pressed this frame, per player
    pub jump: [bool; MAX_PLAYERS],
    /// Pause toggle
    pub pause: bool,
}

impl TickInput {
    /// Jump press for player 0 only
    pub fn single_jump() -> Self {
        let mut input = Self::default();
        input.jump[0] = true;
        input
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunPhase {
    Playing,
    Paused,
    /// Every player is dead or the tutorial is finished
    Over,
}

/// One play session: the level, its runners and the clock
#[derive(Debug)]
pub struct Run {
    pub level: Level,
    pub players: Vec<Player>,
    pub phase: RunPhase,
    /// Seconds of unpaused play
    pub run_time: f32,
    /// Coins picked up this run, all players together
    pub coins: u32,
    pub tutorial: bool,
    pub tutorial_complete: bool,
    events: Vec<RunEvent>,
}

impl Run {
    /// Start a generated run
    pub fn new(
        seed: u64,
        difficulty: Difficulty,
        tuning: &Tuning,
        players: usize,
    ) -> Result<Self, TuningError> {
        let level = Level::new(seed, difficulty, tuning)?;
        let run = Self::start(level, players, false);
        log::info!(
            "Run started: seed {:#x}, {}, {} player(s)",
            seed,
            difficulty.as_str(),
            run.players.len()
        );
        Ok(run)
    }

    /// Start the fixed tutorial course (single player)
    pub fn tutorial(difficulty: Difficulty, tuning: &Tuning) -> Result<Self, TuningError> {
        let mut level = Level::new(TUTORIAL_SEED, difficulty, tuning)?;
        level.generate_tutorial();
        log::info!("Tutorial started");
        Ok(Self::start(level, 1, true))
    }

    fn start(level: Level, players: usize, tutorial: bool) -> Self {
        let count = players.clamp(1, MAX_PLAYERS);
        if count != players {
            log::warn!("{} players requested, running with {}", players, count);
        }
        let players = (0..count)
            .map(|i| spawn_player(&level, PLAYER_START_X - i as f32 * PLAYER_SPACING))
            .collect();
        Self {
            level,
            players,
            phase: RunPhase::Playing,
            run_time: 0.0,
            coins: 0,
            tutorial,
            tutorial_complete: false,
            events: Vec::new(),
        }
    }

    /// Lead player's distance, which is where the camera sits
    pub fn camera_x(&self) -> f32 {
        self.players.first().map_or(0.0, |p| p.distance)
    }

    pub fn is_over(&self) -> bool {
        self.phase == RunPhase::Over
    }

    /// Take the events emitted since the last drain
    pub fn drain_events(&mut self) -> Vec<RunEvent> {
        std::mem::take(&mut self.events)
    }
}

/// Place a player on the surface under `distance`, or at the default
/// height when nothing is there
fn spawn_player(level: &Level, distance: f32) -> Player {
    match level.segment_at(distance) {
        Some(seg) if seg.is_solid_at(distance) => {
            let mut player = Player::new(seg.platform_y - PLAYER_HEIGHT / 2.0, distance);
            player.grounded = true;
            player
        }
        _ => Player::new(level.tuning().view_height - PLAYER_SPAWN_OFFSET, distance),
    }
}

/// Advance the run by one frame
pub fn tick(run: &mut Run, input: &TickInput, frame_dt: f32) {
    if input.pause {
        match run.phase {
            RunPhase::Playing => {
                run.phase = RunPhase::Paused;
                return;
            }
            RunPhase::Paused => run.phase = RunPhase::Playing,
            RunPhase::Over => {}
        }
    }
    if run.phase != RunPhase::Playing {
        return;
    }

    let dt = frame_dt.clamp(0.0, run.level.tuning().max_dt());
    if dt <= 0.0 {
        return;
    }
    run.run_time += dt;
    let now = run.run_time;

    let Run {
        level,
        players,
        events,
        ..
    } = run;

    let jump_velocity = level.tuning().initial_jump_velocity();
    let buffer = level.tuning().input_buffer();
    for (i, player) in players.iter_mut().enumerate() {
        if !input.jump[i] || !player.alive {
            continue;
        }
        if player.attempt_jump(now, jump_velocity) {
            events.push(RunEvent::Jumped { player: i });
        } else if let Some(strength) = level.trigger_ring(&player.hitbox()) {
            player.vy = jump_velocity * strength * player.gravity_dir;
            player.grounded = false;
            player.coyote_until = NEVER;
            events.push(RunEvent::RingFired { player: i });
        } else {
            player.buffer_jump(now + buffer);
        }
    }

    let camera_x = players.first().map_or(0.0, |p| p.distance);
    let speed = level.speed();
    events.extend(level.advance(dt, speed, camera_x));

    for (i, player) in players.iter_mut().enumerate() {
        step_player(level, player, i, dt, now, events);
    }

    for (i, player) in players.iter_mut().enumerate() {
        if !player.alive {
            continue;
        }
        for pos in level.collect_coins(&player.hitbox()) {
            run.coins += 1;
            events.push(RunEvent::CoinCollected { player: i, pos });
        }
    }

    if run.tutorial && !run.tutorial_complete {
        let finished = players
            .first()
            .is_some_and(|p| p.alive && p.distance > level.frontier() - 80.0);
        if finished {
            run.tutorial_complete = true;
            run.phase = RunPhase::Over;
            events.push(RunEvent::TutorialComplete);
            log::info!("Tutorial complete at {:.1}s", now);
            return;
        }
    }

    // Solo runs end when the runner dies, versus runs on the first death
    let alive = players.iter().filter(|p| p.alive).count();
    let versus = players.len() > 1;
    if alive == 0 || (versus && alive < players.len()) {
        let winner = if versus {
            players.iter().position(|p| p.alive)
        } else {
            None
        };
        run.phase = RunPhase::Over;
        events.push(RunEvent::RunOver { winner });
        log::info!(
            "Run over after {:.1}s, {:.0} units, {} coins, winner {:?}",
            now,
            camera_x,
            run.coins,
            winner
        );
    }
}

/// Integrate one player for `dt` seconds at run time `now`
pub fn step_player(
    level: &Level,
    player: &mut Player,
    index: usize,
    dt: f32,
    now: f32,
    events: &mut Vec<RunEvent>,
) {
    if !player.alive {
        return;
    }
    let tuning = level.tuning();

    let terminal = tuning.terminal_velocity;
    player.vy = (player.vy + tuning.gravity * player.gravity_dir * dt).clamp(-terminal, terminal);

    let was_grounded = player.grounded;
    // Bound each sub-step's travel so fast falls can't skip thin geometry
    let steps = ((player.vy * dt).abs() / SUBSTEP_DISTANCE).ceil().max(1.0) as u32;
    let step_dt = dt / steps as f32;
    let mut launched = false;

    for _ in 0..steps {
        let prev_y = player.y;
        player.y += player.vy * step_dt;

        let hitbox = player.hitbox();
        let hazard = if player.gravity_dir > 0.0 {
            level.lethal_hit(&hitbox)
        } else {
            level.obstacle_hit(&hitbox)
        };
        if let Some(hazard) = hazard {
            kill(player, index, hazard.into(), events);
            return;
        }

        match level.resolve_platform_collision(player, now, prev_y) {
            Contact::Landed => {
                if !was_grounded && !player.grounded {
                    events.push(RunEvent::Landed { player: index });
                }
                player.land(was_grounded);
            }
            Contact::Launched => {
                launched = true;
                player.coyote_until = NEVER;
                events.push(RunEvent::JumpPadFired { player: index });
            }
            Contact::SideClip => {
                kill(player, index, DeathCause::SideClip, events);
                return;
            }
            Contact::None => {
                if was_grounded && !launched {
                    player.coyote_until = now + tuning.coyote_time();
                }
                player.grounded = false;
            }
        }
    }

    let out_of_bounds = if player.gravity_dir > 0.0 {
        player.y > level.world_bottom() + OUT_OF_BOUNDS_MARGIN
    } else {
        player.y < level.world_top() - OUT_OF_BOUNDS_MARGIN
    };
    if out_of_bounds {
        kill(player, index, DeathCause::OutOfBounds, events);
        return;
    }

    player.distance += level.speed() * dt;

    if player.grounded && player.has_buffered_jump(now) {
        if player.attempt_jump(now, tuning.initial_jump_velocity()) {
            events.push(RunEvent::Jumped { player: index });
        }
        player.input_buffer_until = NEVER;
    }

    if !player.grounded {
        player.angle = (player.angle + SPIN_SPEED * dt) % 360.0;
    }
}

fn kill(player: &mut Player, index: usize, cause: DeathCause, events: &mut Vec<RunEvent>) {
    player.kill();
    log::info!(
        "Player {} died ({:?}) at {:.1}, {:.1}",
        index,
        cause,
        player.distance,
        player.y
    );
    events.push(RunEvent::PlayerDied {
        player: index,
        cause,
    });
}
