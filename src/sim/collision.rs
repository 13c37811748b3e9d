//! Collision queries and platform resolution
//!
//! Lethal checks use the player's shrunk hitbox, surface resolution uses the
//! full box. Screen convention: y grows downward, so a falling player has
//! `vy >= 0` under normal gravity.

use serde::{Deserialize, Serialize};

use super::geom::Aabb;
use super::level::Level;
use super::state::{DeathCause, Obstacle, Player, Segment};
use crate::consts::*;

/// Something that kills on contact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Hazard {
    Spike,
    Pillar,
    /// Sank below the track: through a gap or under a ledge that was
    /// too high to step onto
    Gap,
}

impl From<Hazard> for DeathCause {
    fn from(hazard: Hazard) -> Self {
        match hazard {
            Hazard::Spike => DeathCause::Spike,
            Hazard::Pillar => DeathCause::Pillar,
            Hazard::Gap => DeathCause::Gap,
        }
    }
}

/// Outcome of one platform resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contact {
    /// Nothing touched
    None,
    /// Resting on a surface; position already snapped
    Landed,
    /// A jump pad fired; velocity already set
    Launched,
    /// Hit the side of a moving platform
    SideClip,
}

impl Contact {
    pub fn landed(&self) -> bool {
        matches!(self, Contact::Landed)
    }
}

impl Level {
    /// Spikes and pillars overlapping `hitbox`
    pub fn obstacle_hit(&self, hitbox: &Aabb) -> Option<Hazard> {
        for seg in self.segments_near(hitbox) {
            if seg
                .spikes
                .iter()
                .any(|sp| seg.spike_aabb(sp).intersects(hitbox))
            {
                return Some(Hazard::Spike);
            }
            let pillar = seg.obstacles.iter().any(|ob| match ob {
                Obstacle::Pillar(p) => p.aabb().intersects(hitbox),
                _ => false,
            });
            if pillar {
                return Some(Hazard::Pillar);
            }
        }
        None
    }

    /// Anything lethal for a player falling downward with this hitbox
    ///
    /// On top of spikes and pillars, a box whose center is over the track
    /// and whose bottom has sunk more than [`GAP_FALL_DEPTH`] below the
    /// surface there is lost.
    pub fn lethal_hit(&self, hitbox: &Aabb) -> Option<Hazard> {
        self.obstacle_hit(hitbox).or_else(|| {
            let cx = hitbox.center().x;
            let seg = self.segment_at(cx)?;
            (hitbox.max.y > seg.platform_y + GAP_FALL_DEPTH).then_some(Hazard::Gap)
        })
    }

    pub fn check_lethal_collision(&self, hitbox: &Aabb) -> bool {
        self.lethal_hit(hitbox).is_some()
    }

    /// First live segment spanning horizontal position `x`
    pub fn segment_at(&self, x: f32) -> Option<&Segment> {
        self.segments.iter().find(|s| x >= s.x && x <= s.end())
    }

    fn segments_near<'a>(&'a self, aabb: &'a Aabb) -> impl Iterator<Item = &'a Segment> + 'a {
        self.segments
            .iter()
            .filter(move |s| s.x <= aabb.max.x && s.end() >= aabb.min.x)
    }

    /// Resolve the player against world bounds, dynamic obstacles and
    /// platform slabs, in that order
    ///
    /// `prev_y` is the player's y before the current sub-step; the swept
    /// span between it and the current box decides whether a surface was
    /// reached from the right side.
    pub fn resolve_platform_collision(
        &self,
        player: &mut Player,
        run_time: f32,
        prev_y: f32,
    ) -> Contact {
        let half_h = player.height / 2.0;
        let bounds = player.bounds();
        let falling_down = player.gravity_dir > 0.0;

        // World floor and ceiling are hard stops
        if falling_down && bounds.max.y >= self.world_bottom() {
            player.y = self.world_bottom() - half_h;
            return Contact::Landed;
        }
        if !falling_down && bounds.min.y <= self.world_top() {
            player.y = self.world_top() + half_h;
            return Contact::Landed;
        }

        let cx = player.distance;
        let prev_bottom = prev_y + half_h;
        let prev_top = prev_y - half_h;

        for seg in self.segments_near(&bounds) {
            for ob in &seg.obstacles {
                match ob {
                    Obstacle::JumpPad(pad) => {
                        if player.grounded && pad.aabb().intersects(&bounds) {
                            let v0 = self.tuning.initial_jump_velocity();
                            player.vy = v0 * pad.strength * player.gravity_dir;
                            player.grounded = false;
                            return Contact::Launched;
                        }
                    }
                    Obstacle::Moving(m) => {
                        let mb = m.aabb(run_time);
                        if !mb.intersects(&bounds) {
                            continue;
                        }
                        if falling_down
                            && player.vy >= 0.0
                            && prev_bottom <= mb.min.y + LANDING_TOLERANCE
                        {
                            player.y = mb.min.y - half_h;
                            return Contact::Landed;
                        }
                        if !falling_down
                            && player.vy <= 0.0
                            && prev_top >= mb.max.y - LANDING_TOLERANCE
                        {
                            player.y = mb.max.y + half_h;
                            return Contact::Landed;
                        }
                        if cx < m.left() || cx > m.right() {
                            return Contact::SideClip;
                        }
                    }
                    // Pillars are lethal-only, rings wait for jump input
                    _ => {}
                }
            }
        }

        for seg in self.segments_near(&bounds) {
            if !seg.is_solid_at(cx) {
                continue;
            }
            let slab = seg.platform_aabb();
            if !slab.intersects(&bounds) {
                continue;
            }
            if falling_down && player.vy >= 0.0 && prev_bottom <= slab.min.y + LANDING_TOLERANCE {
                player.y = slab.min.y - half_h;
                return Contact::Landed;
            }
            if !falling_down && player.vy <= 0.0 && prev_top >= slab.max.y - LANDING_TOLERANCE {
                player.y = slab.max.y + half_h;
                return Contact::Landed;
            }
        }

        Contact::None
    }
}
