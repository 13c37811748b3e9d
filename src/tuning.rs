//! Game tuning and difficulty presets
//!
//! A small immutable record of physics and pacing values. Loaded once
//! (defaults or JSON) and handed to the level and run by reference.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Difficulty levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "easy" => Some(Difficulty::Easy),
            "medium" | "med" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }

    /// Chance per segment of a moving platform.
    ///
    /// Zero means no RNG draw happens at all, so easy and medium
    /// layouts do not depend on this feature.
    pub fn moving_platform_chance(&self) -> f64 {
        match self {
            Difficulty::Easy => 0.0,
            Difficulty::Medium => 0.0,
            Difficulty::Hard => 0.10,
        }
    }
}

/// One value per difficulty
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerDifficulty<T> {
    pub easy: T,
    pub medium: T,
    pub hard: T,
}

impl<T: Copy> PerDifficulty<T> {
    pub fn get(&self, difficulty: Difficulty) -> T {
        match difficulty {
            Difficulty::Easy => self.easy,
            Difficulty::Medium => self.medium,
            Difficulty::Hard => self.hard,
        }
    }
}

/// Rejected configuration
#[derive(Debug, Error)]
pub enum TuningError {
    #[error("{field} must be positive (got {value})")]
    NotPositive { field: &'static str, value: f32 },
    #[error("{field} must not be negative (got {value})")]
    Negative { field: &'static str, value: f32 },
    #[error("{difficulty} speed cap {cap} is below base speed {base}")]
    CapBelowBase {
        difficulty: &'static str,
        base: f32,
        cap: f32,
    },
    #[error("invalid tuning json: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Physics and pacing tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    /// Downward acceleration (units/s²)
    pub gravity: f32,
    /// Apex height of a standing jump, used to derive the jump velocity
    pub desired_max_jump_height: f32,
    /// Vertical speed clamp (units/s)
    pub terminal_velocity: f32,
    /// Map scroll speed at run start (units/s)
    pub base_speed: PerDifficulty<f32>,
    /// Upper bound for progressive speed-up
    pub speed_cap: PerDifficulty<f32>,
    /// Speed added each time the speed-up threshold is crossed
    pub speed_step: PerDifficulty<f32>,
    /// Distance travelled between speed-ups
    pub speed_up_threshold: f32,
    /// Late-jump grace after leaving a platform
    pub coyote_time_ms: f32,
    /// Early-jump memory before landing
    pub input_buffer_ms: f32,
    /// Longest frame accepted as a physics step
    pub clamp_delta_ms: f32,
    /// Playfield size; generation runs two view widths ahead of the camera
    pub view_width: f32,
    pub view_height: f32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            gravity: 2200.0,
            desired_max_jump_height: 160.0,
            terminal_velocity: 2000.0,
            base_speed: PerDifficulty {
                easy: 280.0,
                medium: 360.0,
                hard: 480.0,
            },
            speed_cap: PerDifficulty {
                easy: 420.0,
                medium: 600.0,
                hard: 900.0,
            },
            speed_step: PerDifficulty {
                easy: 8.0,
                medium: 12.0,
                hard: 20.0,
            },
            speed_up_threshold: 900.0,
            coyote_time_ms: 100.0,
            input_buffer_ms: 100.0,
            clamp_delta_ms: 50.0,
            view_width: 960.0,
            view_height: 600.0,
        }
    }
}

impl Tuning {
    /// Parse tuning from JSON; missing fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self, TuningError> {
        let tuning: Tuning = serde_json::from_str(json)?;
        tuning.validate()?;
        Ok(tuning)
    }

    /// Reject setups the physics cannot run with
    pub fn validate(&self) -> Result<(), TuningError> {
        positive("gravity", self.gravity)?;
        positive("desired_max_jump_height", self.desired_max_jump_height)?;
        positive("terminal_velocity", self.terminal_velocity)?;
        positive("speed_up_threshold", self.speed_up_threshold)?;
        positive("clamp_delta_ms", self.clamp_delta_ms)?;
        positive("view_width", self.view_width)?;
        positive("view_height", self.view_height)?;
        non_negative("coyote_time_ms", self.coyote_time_ms)?;
        non_negative("input_buffer_ms", self.input_buffer_ms)?;

        for difficulty in Difficulty::ALL {
            let base = self.base_speed.get(difficulty);
            let cap = self.speed_cap.get(difficulty);
            positive("base_speed", base)?;
            non_negative("speed_step", self.speed_step.get(difficulty))?;
            if cap < base {
                return Err(TuningError::CapBelowBase {
                    difficulty: difficulty.as_str(),
                    base,
                    cap,
                });
            }
        }
        Ok(())
    }

    /// Upward launch velocity (negative = up)
    pub fn initial_jump_velocity(&self) -> f32 {
        -(2.0 * self.gravity * self.desired_max_jump_height).sqrt()
    }

    /// Seconds airborne for a full jump arc from and back to the same height
    pub fn flight_time(&self) -> f32 {
        2.0 * self.initial_jump_velocity().abs() / self.gravity
    }

    pub fn coyote_time(&self) -> f32 {
        self.coyote_time_ms / 1000.0
    }

    pub fn input_buffer(&self) -> f32 {
        self.input_buffer_ms / 1000.0
    }

    /// Longest physics step in seconds
    pub fn max_dt(&self) -> f32 {
        self.clamp_delta_ms / 1000.0
    }

    pub fn world_top(&self) -> f32 {
        crate::consts::WORLD_TOP
    }

    pub fn world_bottom(&self) -> f32 {
        self.view_height - crate::consts::WORLD_BOTTOM_MARGIN
    }
}

fn positive(field: &'static str, value: f32) -> Result<(), TuningError> {
    // NaN fails here too
    if value > 0.0 {
        Ok(())
    } else {
        Err(TuningError::NotPositive { field, value })
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<(), TuningError> {
    if value >= 0.0 {
        Ok(())
    } else {
        Err(TuningError::Negative { field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let tuning = Tuning::default();
        assert!(tuning.validate().is_ok());
        assert_eq!(tuning.world_bottom(), 560.0);
    }

    #[test]
    fn test_jump_velocity_reaches_desired_height() {
        let tuning = Tuning::default();
        let v0 = tuning.initial_jump_velocity();
        assert!(v0 < 0.0);
        // apex = v0² / 2g
        let apex = v0 * v0 / (2.0 * tuning.gravity);
        assert!((apex - tuning.desired_max_jump_height).abs() < 0.01);
    }

    #[test]
    fn test_non_positive_gravity_rejected() {
        let tuning = Tuning {
            gravity: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            tuning.validate(),
            Err(TuningError::NotPositive { field: "gravity", .. })
        ));
    }

    #[test]
    fn test_cap_below_base_rejected() {
        let mut tuning = Tuning::default();
        tuning.speed_cap.hard = 100.0;
        assert!(matches!(
            tuning.validate(),
            Err(TuningError::CapBelowBase { difficulty: "hard", .. })
        ));
    }

    #[test]
    fn test_from_json_partial() {
        let tuning = Tuning::from_json(r#"{ "gravity": 3000.0, "coyote_time_ms": 80.0 }"#).unwrap();
        assert_eq!(tuning.gravity, 3000.0);
        assert_eq!(tuning.coyote_time_ms, 80.0);
        assert_eq!(tuning.base_speed.medium, 360.0);
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(
            Tuning::from_json("{ gravity: "),
            Err(TuningError::Parse(_))
        ));
        assert!(Tuning::from_json(r#"{ "gravity": -1.0 }"#).is_err());
    }

    #[test]
    fn test_difficulty_from_str() {
        assert_eq!(Difficulty::from_str("MEDIUM"), Some(Difficulty::Medium));
        assert_eq!(Difficulty::from_str("med"), Some(Difficulty::Medium));
        assert_eq!(Difficulty::from_str("nightmare"), None);
        for d in Difficulty::ALL {
            assert_eq!(Difficulty::from_str(d.as_str()), Some(d));
        }
    }
}
