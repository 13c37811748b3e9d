//! Procedural level generation
//!
//! Produces an endless run of contiguous segments from a seeded stream.
//! Every segment is clamped to the jump envelope at the speed it was built
//! for; `validate`/`repair` (see `validate.rs`) catch whatever a later speed
//! change invalidates.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::pool::Pool;
use super::rng::SeededStream;
use super::state::{
    Coin, Gap, JumpPad, MovingPlatform, Obstacle, Pillar, Ring, RunEvent, Segment, Spike,
};
use crate::consts::*;
use crate::tuning::{Difficulty, Tuning, TuningError};

/// Per-segment placement probabilities
const OBSTACLE_CHANCE: f64 = 0.6;
const GAP_SHARE: f64 = 0.5;
const SPIKE_CHANCE: f64 = 0.18;
const RING_CHANCE: f64 = 0.18;
const JUMP_PAD_CHANCE: f64 = 0.12;
const COIN_CHANCE: f64 = 0.6;
const COIN_ATTEMPTS: u32 = 3;

/// Construction-time caps, as fractions of the max jump distance
const GAP_BUILD_FRACTION: f32 = 0.85;
const PILLAR_WIDTH_FRACTION: f32 = 0.15;
const SEGMENT_WIDTH_FRACTION: f32 = 1.5;
/// Floors for the caps so slow speeds still allow a playable layout
pub(crate) const MIN_GAP_CAP: f32 = 60.0;
const MIN_PILLAR_CAP: f32 = 24.0;

/// Serializable view of one live segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentView {
    pub id: u64,
    pub x: f32,
    pub width: f32,
    pub platform_y: f32,
    pub obstacles: Vec<Obstacle>,
    pub spikes: Vec<Spike>,
    pub coins: Vec<Coin>,
}

/// The generated track and everything living on it
#[derive(Debug)]
pub struct Level {
    pub(crate) tuning: Tuning,
    pub(crate) difficulty: Difficulty,
    rng: SeededStream,
    pub(crate) segments: Vec<Segment>,
    /// Current map speed (units/s)
    pub(crate) speed: f32,
    speed_cap: f32,
    distance_since_speed_up: f32,
    /// Right edge of the last generated segment
    pub(crate) frontier: f32,
    next_segment_id: u64,
    pub(crate) coin_pool: Pool<Coin>,
    /// Hand-authored layouts are neither extended nor repaired
    scripted: bool,
}

impl Level {
    /// Build a level and its first batch of segments
    pub fn new(seed: u64, difficulty: Difficulty, tuning: &Tuning) -> Result<Self, TuningError> {
        tuning.validate()?;
        let mut level = Self {
            tuning: tuning.clone(),
            difficulty,
            rng: SeededStream::new(seed),
            segments: Vec::new(),
            speed: tuning.base_speed.get(difficulty),
            speed_cap: tuning.speed_cap.get(difficulty),
            distance_since_speed_up: 0.0,
            frontier: 0.0,
            next_segment_id: 1,
            coin_pool: Pool::with_capacity(COIN_POOL_CAPACITY),
            scripted: false,
        };
        level.generate_initial();
        Ok(level)
    }

    pub fn seed(&self) -> u64 {
        self.rng.seed()
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn frontier(&self) -> f32 {
        self.frontier
    }

    pub fn is_scripted(&self) -> bool {
        self.scripted
    }

    /// Live segments in track order
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Coins currently placed in a segment
    pub fn coins<'a>(&'a self, segment: &'a Segment) -> impl Iterator<Item = &'a Coin> + 'a {
        segment.coins.iter().map(|h| self.coin_pool.get(h))
    }

    pub fn coin_pool(&self) -> &Pool<Coin> {
        &self.coin_pool
    }

    pub fn world_top(&self) -> f32 {
        self.tuning.world_top()
    }

    pub fn world_bottom(&self) -> f32 {
        self.tuning.world_bottom()
    }

    /// Horizontal reach of a full jump at the current speed
    pub fn max_jump_distance(&self) -> f32 {
        self.speed * self.tuning.flight_time()
    }

    /// Switch difficulty mid-run; speed restarts from the new base
    pub fn set_difficulty(&mut self, difficulty: Difficulty) {
        self.difficulty = difficulty;
        self.speed = self.tuning.base_speed.get(difficulty);
        self.speed_cap = self.tuning.speed_cap.get(difficulty);
        self.distance_since_speed_up = 0.0;
    }

    /// Throw away the track and build the opening batch
    pub fn generate_initial(&mut self) {
        self.clear_segments();
        self.scripted = false;
        let ground = self.world_bottom() - GROUND_OFFSET;
        self.push_flat(START_RUNWAY_WIDTH, ground);
        for _ in 0..INITIAL_SEGMENTS {
            self.push_segment();
        }
        let issues = self.validate_all_segments();
        if !issues.is_empty() {
            self.repair(&issues);
        }
    }

    /// Replace the track with the fixed tutorial layout
    pub fn generate_tutorial(&mut self) {
        self.clear_segments();
        self.scripted = true;
        let ground = self.world_bottom() - GROUND_OFFSET;

        self.push_flat(400.0, ground);
        self.push_flat(220.0, ground);
        let gap_start = self.frontier + 40.0;
        let seg = self.push_flat(160.0, ground);
        seg.obstacles.push(Obstacle::Gap(Gap {
            x: gap_start,
            width: 120.0,
        }));
        self.push_flat(360.0, ground - 40.0);
        self.push_flat(600.0, ground);
        log::info!(
            "Tutorial layout: {} segments, ends at {}",
            self.segments.len(),
            self.frontier
        );
    }

    /// Append an empty segment at the frontier
    pub fn push_flat(&mut self, width: f32, platform_y: f32) -> &mut Segment {
        let id = self.next_id();
        self.segments
            .push(Segment::new(id, self.frontier, width, platform_y));
        self.frontier += width;
        let last = self.segments.len() - 1;
        &mut self.segments[last]
    }

    /// Per-frame upkeep: extend ahead, re-check, prune behind, speed up
    pub fn advance(&mut self, dt: f32, speed: f32, camera_x: f32) -> Vec<RunEvent> {
        let mut events = Vec::new();

        if !self.scripted {
            let horizon = camera_x + self.tuning.view_width * LOOKAHEAD_VIEWS;
            while self.frontier < horizon {
                self.push_segment();
            }

            // Speed may have changed since these segments were clamped
            let issues = self.validate_all_segments();
            if !issues.is_empty() {
                log::warn!(
                    "{} traversability violations at speed {}, repairing",
                    issues.len(),
                    self.speed
                );
                self.repair(&issues);
            }
        }

        self.prune(camera_x);

        self.distance_since_speed_up += speed * dt;
        let threshold = self.tuning.speed_up_threshold;
        if self.distance_since_speed_up >= threshold {
            self.distance_since_speed_up -= threshold;
            let step = self.tuning.speed_step.get(self.difficulty);
            let new_speed = (self.speed + step).min(self.speed_cap);
            if new_speed > self.speed {
                self.speed = new_speed;
                log::debug!("Speed up: {}", self.speed);
                events.push(RunEvent::SpeedUp { speed: self.speed });
            }
        }

        events
    }

    /// Evict segments far behind the camera and return their coins
    fn prune(&mut self, camera_x: f32) {
        let cutoff = camera_x - EVICT_MARGIN;
        let stale = self
            .segments
            .iter()
            .take_while(|s| s.end() <= cutoff)
            .count();
        if stale == 0 {
            return;
        }
        for seg in self.segments.drain(..stale) {
            for coin in seg.coins {
                self.coin_pool.release(coin);
            }
        }
        log::debug!("Evicted {} segments behind {}", stale, cutoff);
    }

    fn clear_segments(&mut self) {
        for seg in self.segments.drain(..) {
            for coin in seg.coins {
                self.coin_pool.release(coin);
            }
        }
        self.frontier = 0.0;
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_segment_id;
        self.next_segment_id += 1;
        id
    }

    /// Roll one random segment and append it
    pub(crate) fn push_segment(&mut self) {
        let bottom = self.world_bottom();
        let x = self.frontier;
        // Clamp before anything is placed so contents stay on the platform
        let width = (self.rng.range(SEGMENT_MIN_WIDTH as f64, SEGMENT_MAX_WIDTH as f64).round()
            as f32)
            .min(self.segment_width_cap());
        let platform_y = self
            .rng
            .range((bottom - 120.0) as f64, (bottom - 20.0) as f64)
            .round() as f32;
        let id = self.next_id();
        let mut seg = Segment::new(id, x, width, platform_y);

        if self.rng.chance(OBSTACLE_CHANCE) {
            let obstacle = if self.rng.chance(GAP_SHARE) {
                self.create_gap(x + width * 0.6)
            } else {
                self.create_pillar(x + width * 0.5, platform_y)
            };
            seg.obstacles.push(obstacle);
        }

        if self.rng.chance(SPIKE_CHANCE) {
            let sx = self.roll_x(&seg, 0.1, 0.9);
            let spaced = seg
                .spikes
                .iter()
                .all(|sp| (sp.x - sx).abs() >= SPIKE_MIN_SPACING);
            if spaced {
                seg.spikes.push(Spike {
                    x: sx,
                    width: SPIKE_WIDTH,
                });
            }
        }

        if self.rng.chance(RING_CHANCE) {
            let rx = self.roll_x(&seg, 0.15, 0.85);
            let strength = self.rng.range(1.0, 1.6) as f32;
            seg.obstacles.push(Obstacle::Ring(Ring {
                pos: Vec2::new(rx, platform_y - PICKUP_HOVER),
                size: Vec2::splat(RING_SIZE),
                strength,
                active: true,
            }));
        }

        if self.rng.chance(JUMP_PAD_CHANCE) {
            let jx = self.roll_x(&seg, 0.2, 0.8);
            let strength = self.rng.range(1.0, 1.6) as f32;
            // Pad top sits flush with the platform surface
            seg.obstacles.push(Obstacle::JumpPad(JumpPad {
                pos: Vec2::new(jx, platform_y - JUMP_PAD_HEIGHT / 2.0),
                size: Vec2::new(JUMP_PAD_WIDTH, JUMP_PAD_HEIGHT),
                strength,
            }));
        }

        let moving_chance = self.difficulty.moving_platform_chance();
        if moving_chance > 0.0 && self.rng.chance(moving_chance) {
            let moving = self.create_moving(x + width * 0.5, platform_y - 120.0);
            seg.obstacles.push(moving);
        }

        if self.rng.chance(COIN_CHANCE) {
            self.place_coin(&mut seg);
        }

        self.enforce_segment_constraints(&mut seg);
        self.frontier += seg.width;
        self.segments.push(seg);
    }

    fn roll_x(&mut self, seg: &Segment, from: f32, to: f32) -> f32 {
        let lo = seg.x + seg.width * from;
        let hi = seg.x + seg.width * to;
        self.rng.range(lo as f64, hi as f64).round() as f32
    }

    fn create_gap(&mut self, x: f32) -> Obstacle {
        let width = self.rng.range(80.0, 160.0).round() as f32;
        Obstacle::Gap(Gap { x, width })
    }

    fn create_pillar(&mut self, x: f32, base_y: f32) -> Obstacle {
        let height = self.rng.range(40.0, 80.0).round() as f32;
        Obstacle::Pillar(Pillar {
            x,
            base_y,
            width: PILLAR_WIDTH,
            height,
        })
    }

    fn create_moving(&mut self, x: f32, base_y: f32) -> Obstacle {
        let amplitude = self.rng.range(20.0, 80.0).round() as f32;
        let period = (self.rng.range(1.2, 2.8).round() as f32).max(1.0);
        let phase = self.rng.next() as f32;
        Obstacle::Moving(MovingPlatform {
            x,
            base_y,
            width: MOVING_WIDTH,
            height: MOVING_HEIGHT,
            amplitude,
            period,
            phase,
        })
    }

    /// Try a few spots for a coin that doesn't sit inside a pillar or spike
    fn place_coin(&mut self, seg: &mut Segment) {
        let y = seg.platform_y - PICKUP_HOVER;
        let half = COIN_SIZE / 2.0;

        for _ in 0..COIN_ATTEMPTS {
            let cx = self.roll_x(seg, 0.1, 0.9);
            let hits_pillar = seg.obstacles.iter().any(|ob| match ob {
                Obstacle::Pillar(p) => {
                    let center_y = p.base_y - p.height / 2.0;
                    (cx - p.x).abs() < p.width / 2.0 + half
                        && (y - center_y).abs() < p.height / 2.0 + half
                }
                _ => false,
            });
            let hits_spike = seg
                .spikes
                .iter()
                .any(|sp| (cx - sp.x).abs() < half + sp.width / 2.0);
            if hits_pillar || hits_spike {
                continue;
            }

            match self.coin_pool.obtain() {
                Some(handle) => {
                    let coin = self.coin_pool.get_mut(&handle);
                    coin.pos = Vec2::new(cx, y);
                    coin.active = true;
                    coin.collected = false;
                    seg.coins.push(handle);
                }
                None => log::warn!("Coin pool exhausted, segment {} left without coin", seg.id),
            }
            return;
        }
    }

    /// Clamp a fresh segment's obstacles into the jump envelope for the
    /// current speed
    fn enforce_segment_constraints(&self, seg: &mut Segment) {
        let max_dist = self.max_jump_distance();
        let gap_cap = MIN_GAP_CAP.max((max_dist * GAP_BUILD_FRACTION).floor());
        let pillar_cap = MIN_PILLAR_CAP.max((max_dist * PILLAR_WIDTH_FRACTION).floor());

        let end = seg.end();
        for ob in &mut seg.obstacles {
            match ob {
                Obstacle::Gap(g) => g.width = g.width.min(gap_cap).min(end - g.x),
                Obstacle::Pillar(p) => p.width = p.width.min(pillar_cap),
                _ => {}
            }
        }
    }

    /// Widest segment allowed at the current speed
    pub(crate) fn segment_width_cap(&self) -> f32 {
        SEGMENT_MIN_WIDTH.max((self.max_jump_distance() * SEGMENT_WIDTH_FRACTION).floor())
    }

    /// Mark overlapping coins collected and hand them back to the pool
    ///
    /// Returns the positions of the collected coins.
    pub fn collect_coins(&mut self, hitbox: &super::geom::Aabb) -> Vec<Vec2> {
        let mut collected = Vec::new();
        let pool = &mut self.coin_pool;
        for seg in &mut self.segments {
            if seg.x > hitbox.max.x || seg.end() < hitbox.min.x {
                continue;
            }
            let mut i = 0;
            while i < seg.coins.len() {
                let coin = pool.get_mut(&seg.coins[i]);
                if coin.active && !coin.collected && coin.aabb().intersects(hitbox) {
                    coin.collected = true;
                    coin.active = false;
                    collected.push(coin.pos);
                    let handle = seg.coins.remove(i);
                    pool.release(handle);
                } else {
                    i += 1;
                }
            }
        }
        collected
    }

    /// Fire the first active ring overlapping `hitbox`; returns its strength
    pub fn trigger_ring(&mut self, hitbox: &super::geom::Aabb) -> Option<f32> {
        self.segments
            .iter_mut()
            .flat_map(|seg| seg.obstacles.iter_mut())
            .find_map(|ob| match ob {
                Obstacle::Ring(ring) if ring.active && ring.aabb().intersects(hitbox) => {
                    ring.active = false;
                    Some(ring.strength)
                }
                _ => None,
            })
    }

    /// Comparable, serializable copy of the live layout
    pub fn snapshot(&self) -> Vec<SegmentView> {
        self.segments
            .iter()
            .map(|seg| SegmentView {
                id: seg.id,
                x: seg.x,
                width: seg.width,
                platform_y: seg.platform_y,
                obstacles: seg.obstacles.clone(),
                spikes: seg.spikes.clone(),
                coins: self.coins(seg).copied().collect(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::geom::Aabb;

    fn level(seed: u64) -> Level {
        Level::new(seed, Difficulty::Medium, &Tuning::default()).unwrap()
    }

    #[test]
    fn test_initial_batch_is_contiguous() {
        let level = level(4242);
        let segs = level.segments();
        assert_eq!(segs.len(), INITIAL_SEGMENTS + 1);
        assert_eq!(segs[0].x, 0.0);
        assert_eq!(segs[0].width, START_RUNWAY_WIDTH);
        assert!(segs[0].obstacles.is_empty() && segs[0].spikes.is_empty());
        for pair in segs.windows(2) {
            assert_eq!(pair[1].x, pair[0].x + pair[0].width);
        }
        assert_eq!(level.frontier(), segs.last().unwrap().end());
    }

    #[test]
    fn test_segment_dimensions_in_range() {
        let level = level(77);
        let bottom = level.world_bottom();
        let cap = level.segment_width_cap();
        for seg in level.segments() {
            assert!(seg.width >= SEGMENT_MIN_WIDTH && seg.width <= cap);
            assert!(seg.platform_y >= bottom - 120.0 && seg.platform_y <= bottom - 20.0);
        }
    }

    #[test]
    fn test_max_jump_distance_tracks_speed() {
        let mut level = level(1);
        let tuning = Tuning::default();
        let expected = 360.0 * tuning.flight_time();
        assert!((level.max_jump_distance() - expected).abs() < 1e-3);

        level.set_difficulty(Difficulty::Hard);
        assert!((level.max_jump_distance() - 480.0 * tuning.flight_time()).abs() < 1e-3);
    }

    #[test]
    fn test_same_seed_same_layout() {
        let mut a = level(0xBEEF);
        let mut b = level(0xBEEF);
        for step in 0..200 {
            let cam = step as f32 * 20.0;
            a.advance(SIM_DT, a.speed(), cam);
            b.advance(SIM_DT, b.speed(), cam);
        }
        assert_eq!(a.snapshot(), b.snapshot());
        assert_eq!(a.speed(), b.speed());
    }

    #[test]
    fn test_different_seeds_differ() {
        assert_ne!(level(1).snapshot(), level(2).snapshot());
    }

    #[test]
    fn test_advance_generates_two_views_ahead() {
        let mut level = level(9);
        let cam = 5000.0;
        level.advance(SIM_DT, level.speed(), cam);
        assert!(level.frontier() >= cam + level.tuning().view_width * LOOKAHEAD_VIEWS);
    }

    #[test]
    fn test_prune_releases_coins() {
        let mut level = level(31337);
        let capacity = level.coin_pool().capacity();
        for step in 0..400 {
            level.advance(SIM_DT, level.speed(), step as f32 * 50.0);
            let placed: usize = level.segments().iter().map(|s| s.coins.len()).sum();
            assert_eq!(placed, level.coin_pool().checked_out());
            assert_eq!(level.coin_pool().checked_out() + level.coin_pool().idle(), capacity);
        }
        let cam = 399.0 * 50.0;
        assert!(level.segments().iter().all(|s| s.end() > cam - EVICT_MARGIN));
    }

    #[test]
    fn test_speed_up_is_stepped_and_capped() {
        let mut level = level(5);
        let tuning = Tuning::default();
        let base = level.speed();

        // 900 units at 360 u/s is 2.5 s
        let events = level.advance(2.5, base, 0.0);
        assert_eq!(level.speed(), base + tuning.speed_step.medium);
        assert_eq!(events, vec![RunEvent::SpeedUp { speed: level.speed() }]);

        for _ in 0..100 {
            level.advance(2.5, level.speed(), 0.0);
        }
        assert_eq!(level.speed(), tuning.speed_cap.medium);
    }

    #[test]
    fn test_coins_avoid_pillars_and_spikes() {
        for seed in 0..100 {
            let level = level(seed);
            for seg in level.segments() {
                for coin in level.coins(seg) {
                    assert!(coin.active && !coin.collected);
                    for sp in &seg.spikes {
                        assert!((coin.pos.x - sp.x).abs() >= COIN_SIZE / 2.0 + sp.width / 2.0);
                    }
                    for ob in &seg.obstacles {
                        if let Obstacle::Pillar(p) = ob {
                            assert!(!coin.aabb().intersects(&p.aabb().shrunk(0.01)));
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_collect_coins_returns_to_pool() {
        let mut level = (0..50)
            .map(level)
            .find(|l| l.segments().iter().any(|s| !s.coins.is_empty()))
            .expect("some seed places a coin");
        let seg = level.segments().iter().find(|s| !s.coins.is_empty()).unwrap();
        let pos = level.coins(seg).next().unwrap().pos;
        let before = level.coin_pool().checked_out();

        let hitbox = Aabb::from_center(pos, Vec2::splat(20.0));
        let collected = level.collect_coins(&hitbox);
        assert!(collected.contains(&pos));
        assert_eq!(level.coin_pool().checked_out(), before - collected.len());
        assert!(level.collect_coins(&hitbox).is_empty());
    }

    #[test]
    fn test_ring_fires_once() {
        let mut level = level(3);
        level.generate_tutorial();
        let ring_pos = Vec2::new(100.0, 400.0);
        level.segments[0].obstacles.push(Obstacle::Ring(Ring {
            pos: ring_pos,
            size: Vec2::splat(RING_SIZE),
            strength: 1.3,
            active: true,
        }));
        let hitbox = Aabb::from_center(ring_pos, Vec2::splat(30.0));
        assert_eq!(level.trigger_ring(&hitbox), Some(1.3));
        assert_eq!(level.trigger_ring(&hitbox), None);
    }

    #[test]
    fn test_tutorial_layout() {
        let mut level = Level::new(TUTORIAL_SEED, Difficulty::Medium, &Tuning::default()).unwrap();
        level.generate_tutorial();
        let segs = level.segments();
        let widths: Vec<f32> = segs.iter().map(|s| s.width).collect();
        assert_eq!(widths, vec![400.0, 220.0, 160.0, 360.0, 600.0]);

        assert!(segs[0].obstacles.is_empty() && segs[1].obstacles.is_empty());
        assert_eq!(segs[2].obstacles.len(), 1);
        match segs[2].obstacles[0] {
            Obstacle::Gap(g) => {
                assert_eq!(g.width, 120.0);
                assert_eq!(g.x, segs[2].x + 40.0);
            }
            other => panic!("expected gap, got {}", other.kind_name()),
        }
        assert!(level.coin_pool().checked_out() == 0);
    }

    #[test]
    fn test_tutorial_is_not_extended() {
        let mut level = Level::new(TUTORIAL_SEED, Difficulty::Medium, &Tuning::default()).unwrap();
        level.generate_tutorial();
        let frontier = level.frontier();
        level.advance(SIM_DT, level.speed(), 0.0);
        assert_eq!(level.frontier(), frontier);
        assert_eq!(level.segments().len(), 5);
    }

    #[test]
    fn test_hard_places_moving_platforms() {
        let found = (0..40).any(|seed| {
            let level = Level::new(seed, Difficulty::Hard, &Tuning::default()).unwrap();
            level
                .segments()
                .iter()
                .flat_map(|s| s.obstacles.iter())
                .any(|ob| matches!(ob, Obstacle::Moving(_)))
        });
        assert!(found);
    }

    #[test]
    fn test_invalid_tuning_fails_fast() {
        let tuning = Tuning {
            gravity: -5.0,
            ..Default::default()
        };
        assert!(Level::new(1, Difficulty::Medium, &tuning).is_err());
    }
}
