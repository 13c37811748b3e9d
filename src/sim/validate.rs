//! Traversability validation and repair
//!
//! Two explicit phases: `validate_all_segments` reports what is out of the
//! jump envelope at the current speed, `repair` shrinks exactly those
//! dimensions. Repair only ever shrinks and lands on the validation limit,
//! so running it again on the same report changes nothing.

use serde::{Deserialize, Serialize};

use super::level::{Level, MIN_GAP_CAP};
use super::state::Obstacle;
use crate::tuning::{Difficulty, Tuning};

/// Gap limit used by validation, as a fraction of the max jump distance
const GAP_VALIDATE_FRACTION: f32 = 0.9;

/// What is out of bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationKind {
    /// A gap wider than the player can clear; `obstacle` indexes the
    /// segment's obstacle list
    GapTooWide { obstacle: usize },
    SegmentTooWide,
}

/// One traversability problem
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Segment id
    pub segment: u64,
    pub kind: ViolationKind,
    pub measured: f32,
    pub allowed: f32,
}

/// Diagnostic result for one seed of a sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedReport {
    pub seed: u64,
    pub violations: Vec<Violation>,
    /// Whether a repair pass was attempted before this report was taken
    pub repair_attempted: bool,
}

impl Level {
    /// Widest gap allowed at the current speed
    pub fn gap_width_limit(&self) -> f32 {
        MIN_GAP_CAP.max((self.max_jump_distance() * GAP_VALIDATE_FRACTION).floor())
    }

    /// Widest segment allowed at the current speed
    pub fn segment_width_limit(&self) -> f32 {
        self.segment_width_cap()
    }

    /// Scan live segments against the current jump envelope
    pub fn validate_all_segments(&self) -> Vec<Violation> {
        let gap_limit = self.gap_width_limit();
        let seg_limit = self.segment_width_limit();
        let mut violations = Vec::new();

        for seg in &self.segments {
            for (i, ob) in seg.obstacles.iter().enumerate() {
                if let Obstacle::Gap(g) = ob
                    && g.width > gap_limit
                {
                    violations.push(Violation {
                        segment: seg.id,
                        kind: ViolationKind::GapTooWide { obstacle: i },
                        measured: g.width,
                        allowed: gap_limit,
                    });
                }
            }
            if seg.width > seg_limit {
                violations.push(Violation {
                    segment: seg.id,
                    kind: ViolationKind::SegmentTooWide,
                    measured: seg.width,
                    allowed: seg_limit,
                });
            }
        }
        violations
    }

    /// Shrink the reported dimensions to their limits
    ///
    /// Narrowing a segment pulls every later segment (and the frontier)
    /// back by the same amount so the track stays contiguous. Violations
    /// for segments that are no longer live are ignored.
    pub fn repair(&mut self, violations: &[Violation]) {
        for v in violations {
            let Ok(idx) = self.segments.binary_search_by_key(&v.segment, |s| s.id) else {
                continue;
            };
            match v.kind {
                ViolationKind::GapTooWide { obstacle } => {
                    if let Some(Obstacle::Gap(g)) = self.segments[idx].obstacles.get_mut(obstacle) {
                        g.width = g.width.min(v.allowed);
                    }
                }
                ViolationKind::SegmentTooWide => {
                    let seg = &mut self.segments[idx];
                    let shrink = seg.width - seg.width.min(v.allowed);
                    if shrink > 0.0 {
                        seg.width -= shrink;
                        self.clip_contents(idx);
                        self.shift_after(idx, -shrink);
                    }
                }
            }
        }
    }

    /// Drop whatever a narrowed segment no longer has room for; gaps are
    /// cut at the new end
    fn clip_contents(&mut self, idx: usize) {
        let seg = &mut self.segments[idx];
        let end = seg.end();
        let before = seg.spikes.len() + seg.obstacles.len() + seg.coins.len();

        seg.spikes.retain(|sp| sp.x + sp.width / 2.0 <= end);
        seg.obstacles.retain_mut(|ob| match ob {
            Obstacle::Gap(g) => {
                g.width = g.width.min(end - g.x);
                g.width > 0.0
            }
            other => other.span().1 <= end,
        });

        let pool = &mut self.coin_pool;
        let (kept, dropped): (Vec<_>, Vec<_>) = seg
            .coins
            .drain(..)
            .partition(|coin| pool.get(coin).aabb().max.x <= end);
        seg.coins = kept;
        for coin in dropped {
            pool.release(coin);
        }

        let removed = before - (seg.spikes.len() + seg.obstacles.len() + seg.coins.len());
        if removed > 0 {
            log::debug!("Segment {} narrowed to {}, dropped {} items", seg.id, seg.width, removed);
        }
    }

    /// Move everything after segment `idx` along the track by `dx`
    fn shift_after(&mut self, idx: usize, dx: f32) {
        let pool = &mut self.coin_pool;
        for seg in &mut self.segments[idx + 1..] {
            seg.x += dx;
            for ob in &mut seg.obstacles {
                ob.shift_x(dx);
            }
            for sp in &mut seg.spikes {
                sp.x += dx;
            }
            for coin in &seg.coins {
                pool.get_mut(coin).pos.x += dx;
            }
        }
        self.frontier += dx;
    }

    /// Fresh level per seed; report seeds whose opening batch fails validation
    pub fn test_seeds(seed_start: u64, count: u64, difficulty: Difficulty) -> Vec<SeedReport> {
        Self::test_seeds_with(&Tuning::default(), seed_start, count, difficulty)
    }

    pub fn test_seeds_with(
        tuning: &Tuning,
        seed_start: u64,
        count: u64,
        difficulty: Difficulty,
    ) -> Vec<SeedReport> {
        sweep(tuning, seed_start, count, difficulty, false)
    }

    /// Like [`Level::test_seeds`], but give each failing seed one repair
    /// pass and report only the seeds still broken afterwards
    pub fn self_test_and_repair(
        seed_start: u64,
        count: u64,
        difficulty: Difficulty,
    ) -> Vec<SeedReport> {
        Self::self_test_and_repair_with(&Tuning::default(), seed_start, count, difficulty)
    }

    pub fn self_test_and_repair_with(
        tuning: &Tuning,
        seed_start: u64,
        count: u64,
        difficulty: Difficulty,
    ) -> Vec<SeedReport> {
        sweep(tuning, seed_start, count, difficulty, true)
    }
}

fn sweep(
    tuning: &Tuning,
    seed_start: u64,
    count: u64,
    difficulty: Difficulty,
    repair: bool,
) -> Vec<SeedReport> {
    let mut reports = Vec::new();
    for seed in seed_start..seed_start.saturating_add(count) {
        let mut level = match Level::new(seed, difficulty, tuning) {
            Ok(level) => level,
            Err(e) => {
                log::error!("Seed sweep aborted: {e}");
                return reports;
            }
        };
        let mut violations = level.validate_all_segments();
        if repair && !violations.is_empty() {
            level.repair(&violations);
            violations = level.validate_all_segments();
        }
        if !violations.is_empty() {
            reports.push(SeedReport {
                seed,
                violations,
                repair_attempted: repair,
            });
        }
    }
    reports
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::*;
    use crate::sim::state::{Gap, Spike};
    use proptest::prelude::*;

    fn level(seed: u64) -> Level {
        Level::new(seed, Difficulty::Medium, &Tuning::default()).unwrap()
    }

    /// Dropping to a slower difficulty shrinks the jump envelope under
    /// already generated segments
    fn slowed(seed: u64) -> Level {
        let mut level = Level::new(seed, Difficulty::Hard, &Tuning::default()).unwrap();
        level.set_difficulty(Difficulty::Easy);
        level
    }

    fn assert_contiguous(level: &Level) {
        for pair in level.segments().windows(2) {
            assert_eq!(pair[1].x, pair[0].x + pair[0].width);
        }
        assert_eq!(level.frontier(), level.segments().last().unwrap().end());
    }

    fn assert_contents_inside(level: &Level) {
        for seg in level.segments() {
            let (lo, hi) = (seg.x, seg.end());
            for sp in &seg.spikes {
                assert!(sp.x - sp.width / 2.0 >= lo && sp.x + sp.width / 2.0 <= hi);
                assert!(level.check_lethal_collision(&seg.spike_aabb(sp).shrunk(0.1)));
            }
            for ob in &seg.obstacles {
                let (left, right) = ob.span();
                assert!(left >= lo && right <= hi, "{} {left}..{right} outside {lo}..{hi}", ob.kind_name());
            }
            for coin in level.coins(seg) {
                let b = coin.aabb();
                assert!(b.min.x >= lo && b.max.x <= hi);
            }
        }
        let placed: usize = level.segments().iter().map(|s| s.coins.len()).sum();
        assert_eq!(placed, level.coin_pool().checked_out());
    }

    #[test]
    fn test_contents_stay_on_their_segment() {
        for difficulty in Difficulty::ALL {
            for seed in 0..300 {
                let level = Level::new(seed, difficulty, &Tuning::default()).unwrap();
                assert_contents_inside(&level);
            }
        }
    }

    #[test]
    fn test_repair_keeps_contents_on_narrowed_segments() {
        for seed in 0..60 {
            let mut level = slowed(seed);
            let violations = level.validate_all_segments();
            level.repair(&violations);
            assert_contents_inside(&level);
        }
    }

    #[test]
    fn test_narrowing_drops_overhanging_contents() {
        let mut level = level(5);
        let idx = level.segments.len() - 1;
        let width = 500.0;
        let (id, x) = (level.segments[idx].id, level.segments[idx].x);
        level.segments[idx].width = width;
        level.frontier = x + width;
        let keep_x = x + 50.0;
        let tail_x = x + width - 20.0;
        level.segments[idx].spikes = vec![
            Spike { x: keep_x, width: SPIKE_WIDTH },
            Spike { x: tail_x, width: SPIKE_WIDTH },
        ];
        level.segments[idx].obstacles = vec![Obstacle::Gap(Gap {
            x: x + 200.0,
            width: 150.0,
        })];
        let before = level.coin_pool().checked_out() - level.segments[idx].coins.len();

        level.repair(&[Violation {
            segment: id,
            kind: ViolationKind::SegmentTooWide,
            measured: width,
            allowed: SEGMENT_MIN_WIDTH,
        }]);

        let seg = &level.segments[idx];
        assert_eq!(seg.width, SEGMENT_MIN_WIDTH);
        assert_eq!(seg.spikes, vec![Spike { x: keep_x, width: SPIKE_WIDTH }]);
        assert_eq!(seg.gap_spans().collect::<Vec<_>>(), vec![(x + 200.0, x + SEGMENT_MIN_WIDTH)]);
        assert!(level.coin_pool().checked_out() >= before);
        assert_contents_inside(&level);
        assert_contiguous(&level);
    }

    #[test]
    fn test_seed_sweep_medium_is_clean() {
        let reports = Level::test_seeds(1, 200, Difficulty::Medium);
        assert!(reports.is_empty(), "bad seeds: {:?}", reports);
    }

    #[test]
    fn test_seed_sweep_all_difficulties_clean() {
        for difficulty in Difficulty::ALL {
            assert!(Level::test_seeds(1000, 50, difficulty).is_empty());
            assert!(Level::self_test_and_repair(1000, 50, difficulty).is_empty());
        }
    }

    #[test]
    fn test_fresh_level_has_no_violations() {
        assert!(level(12).validate_all_segments().is_empty());
    }

    #[test]
    fn test_oversized_gap_reported_and_repaired() {
        let mut level = level(8);
        let limit = level.gap_width_limit();
        let id = level.segments[2].id;
        let x = level.segments[2].x;
        level.segments[2].obstacles.push(Obstacle::Gap(Gap {
            x,
            width: limit + 50.0,
        }));

        let violations = level.validate_all_segments();
        assert_eq!(violations.len(), 1);
        let v = violations[0];
        assert_eq!(v.segment, id);
        assert!(matches!(v.kind, ViolationKind::GapTooWide { .. }));
        assert_eq!(v.measured, limit + 50.0);
        assert_eq!(v.allowed, limit);

        level.repair(&violations);
        assert!(level.validate_all_segments().is_empty());
    }

    #[test]
    fn test_slowdown_creates_violations_that_repair_fixes() {
        let mut level = (0..50)
            .map(slowed)
            .find(|l| !l.validate_all_segments().is_empty())
            .expect("some hard layout is too wide for easy speed");

        let violations = level.validate_all_segments();
        level.repair(&violations);
        assert!(level.validate_all_segments().is_empty());
        assert_contiguous(&level);
        for seg in level.segments() {
            assert!(seg.width <= level.segment_width_limit());
            assert!(seg.width >= SEGMENT_MIN_WIDTH);
        }
    }

    #[test]
    fn test_repair_ignores_evicted_segments() {
        let mut level = level(3);
        let before = level.snapshot();
        level.repair(&[Violation {
            segment: 9999,
            kind: ViolationKind::SegmentTooWide,
            measured: 900.0,
            allowed: 300.0,
        }]);
        assert_eq!(level.snapshot(), before);
    }

    #[test]
    fn test_advance_repairs_after_slowdown() {
        let mut level = slowed(21);
        level.advance(SIM_DT, level.speed(), 0.0);
        assert!(level.validate_all_segments().is_empty());
        assert_contiguous(&level);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_repair_is_idempotent(seed in 0u64..10_000) {
            let mut level = slowed(seed);
            let violations = level.validate_all_segments();

            level.repair(&violations);
            let once = level.snapshot();
            level.repair(&violations);
            prop_assert_eq!(level.snapshot(), once);
            prop_assert!(level.validate_all_segments().is_empty());
        }

        #[test]
        fn prop_repair_never_grows(seed in 0u64..10_000) {
            let mut level = slowed(seed);
            let before = level.snapshot();
            let violations = level.validate_all_segments();
            level.repair(&violations);
            for (old, new) in before.iter().zip(level.snapshot().iter()) {
                prop_assert!(new.width <= old.width);
                for (a, b) in old.obstacles.iter().zip(new.obstacles.iter()) {
                    if let (Obstacle::Gap(a), Obstacle::Gap(b)) = (a, b) {
                        prop_assert!(b.width <= a.width);
                    }
                }
            }
        }

        #[test]
        fn prop_same_seed_same_segments(seed in any::<u64>(), steps in 1usize..120) {
            let mut a = level(seed);
            let mut b = level(seed);
            for i in 0..steps {
                let cam = i as f32 * 35.0;
                a.advance(SIM_DT, a.speed(), cam);
                b.advance(SIM_DT, b.speed(), cam);
            }
            prop_assert_eq!(a.snapshot(), b.snapshot());
        }

        #[test]
        fn prop_gaps_within_envelope(seed in 0u64..100_000) {
            let level = level(seed);
            let max_dist = level.max_jump_distance();
            for seg in level.segments() {
                prop_assert!(seg.width <= (1.5 * max_dist).max(SEGMENT_MIN_WIDTH));
                for (start, end) in seg.gap_spans() {
                    prop_assert!(end - start <= 0.9 * max_dist);
                }
            }
        }
    }
}
