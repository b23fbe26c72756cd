//! Difficulty tiers and per-game tuning tables
//!
//! Constants are empirically tuned; changing them changes game balance.

use serde::{Deserialize, Serialize};

/// Difficulty tier selectable before or while playing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
    Impossible,
}

impl Difficulty {
    pub const ALL: [Difficulty; 4] = [
        Difficulty::Easy,
        Difficulty::Medium,
        Difficulty::Hard,
        Difficulty::Impossible,
    ];

    /// Stable key used in result metadata
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
            Difficulty::Impossible => "impossible",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
            Difficulty::Impossible => "Impossible",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "easy" => Some(Difficulty::Easy),
            "medium" | "med" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            "impossible" => Some(Difficulty::Impossible),
            _ => None,
        }
    }

    pub fn tap_tuning(&self) -> TapTuning {
        match self {
            Difficulty::Easy => TapTuning {
                required_streak: 3,
                shrink_factor: 0.9,
                speed_increase: 1.05,
                min_target_width_pct: 12.0,
                min_cycle_ms: 220.0,
            },
            Difficulty::Medium => TapTuning {
                required_streak: 5,
                shrink_factor: 0.8,
                speed_increase: 1.15,
                min_target_width_pct: 8.0,
                min_cycle_ms: 160.0,
            },
            Difficulty::Hard => TapTuning {
                required_streak: 6,
                shrink_factor: 0.7,
                speed_increase: 1.25,
                min_target_width_pct: 6.0,
                min_cycle_ms: 120.0,
            },
            Difficulty::Impossible => TapTuning {
                required_streak: 8,
                shrink_factor: 0.6,
                speed_increase: 1.35,
                min_target_width_pct: 4.0,
                min_cycle_ms: 90.0,
            },
        }
    }

    pub fn defense_tuning(&self) -> DefenseTuning {
        match self {
            Difficulty::Easy => DefenseTuning {
                speed_min: 30.0,
                speed_max: 60.0,
                base_spawn_ms: 1400.0,
                min_spawn_ms: 700.0,
                spawn_ramp_ms_per_sec: 8.0,
                max_mosquitoes: 16,
            },
            Difficulty::Medium => DefenseTuning {
                speed_min: 40.0,
                speed_max: 80.0,
                base_spawn_ms: 1100.0,
                min_spawn_ms: 520.0,
                spawn_ramp_ms_per_sec: 12.0,
                max_mosquitoes: 22,
            },
            Difficulty::Hard => DefenseTuning {
                speed_min: 55.0,
                speed_max: 100.0,
                base_spawn_ms: 850.0,
                min_spawn_ms: 380.0,
                spawn_ramp_ms_per_sec: 16.0,
                max_mosquitoes: 28,
            },
            Difficulty::Impossible => DefenseTuning {
                speed_min: 70.0,
                speed_max: 120.0,
                base_spawn_ms: 650.0,
                min_spawn_ms: 260.0,
                spawn_ramp_ms_per_sec: 20.0,
                max_mosquitoes: 34,
            },
        }
    }
}

/// Tap-timing tuning
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TapTuning {
    /// Consecutive hits needed to complete
    pub required_streak: u32,
    /// Target width multiplier applied after each hit
    pub shrink_factor: f64,
    /// Speed multiplier applied after each hit
    pub speed_increase: f64,
    pub min_target_width_pct: f64,
    /// Floor on one sweep of the track
    pub min_cycle_ms: f64,
}

/// Survival-defense tuning
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DefenseTuning {
    /// Entity speed range (px/s)
    pub speed_min: f64,
    pub speed_max: f64,
    pub base_spawn_ms: f64,
    pub min_spawn_ms: f64,
    /// Interval shrink per elapsed second
    pub spawn_ramp_ms_per_sec: f64,
    /// Hard cap on live entities
    pub max_mosquitoes: usize,
}

impl DefenseTuning {
    /// Spawn interval after `elapsed_secs` of play
    pub fn spawn_interval_ms(&self, elapsed_secs: f64) -> f64 {
        self.min_spawn_ms
            .max(self.base_spawn_ms - elapsed_secs * self.spawn_ramp_ms_per_sec)
    }

    /// Entities per spawn interval after `elapsed_secs` of play
    pub fn spawn_burst(elapsed_secs: f64) -> usize {
        use crate::consts::{BURST_GROWTH_SECS, MAX_SPAWN_BURST};
        (1 + (elapsed_secs / BURST_GROWTH_SECS).floor() as usize).min(MAX_SPAWN_BURST)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_round_trips_keys() {
        for d in Difficulty::ALL {
            assert_eq!(Difficulty::from_str(d.as_str()), Some(d));
        }
        assert_eq!(Difficulty::from_str("MED"), Some(Difficulty::Medium));
        assert_eq!(Difficulty::from_str("nightmare"), None);
        assert_eq!(Difficulty::default(), Difficulty::Medium);
    }

    #[test]
    fn test_tiers_get_strictly_harder() {
        let tiers: Vec<_> = Difficulty::ALL.iter().map(|d| d.tap_tuning()).collect();
        for pair in tiers.windows(2) {
            assert!(pair[1].required_streak > pair[0].required_streak);
            assert!(pair[1].min_cycle_ms < pair[0].min_cycle_ms);
        }
        let tiers: Vec<_> = Difficulty::ALL.iter().map(|d| d.defense_tuning()).collect();
        for pair in tiers.windows(2) {
            assert!(pair[1].base_spawn_ms < pair[0].base_spawn_ms);
            assert!(pair[1].max_mosquitoes > pair[0].max_mosquitoes);
        }
    }

    #[test]
    fn test_spawn_interval_ramps_to_floor() {
        let t = Difficulty::Medium.defense_tuning();
        assert_eq!(t.spawn_interval_ms(0.0), 1100.0);
        assert_eq!(t.spawn_interval_ms(10.0), 980.0);
        assert_eq!(t.spawn_interval_ms(1000.0), 520.0);
    }

    #[test]
    fn test_spawn_burst_grows_every_six_seconds_capped() {
        assert_eq!(DefenseTuning::spawn_burst(0.0), 1);
        assert_eq!(DefenseTuning::spawn_burst(5.99), 1);
        assert_eq!(DefenseTuning::spawn_burst(6.0), 2);
        assert_eq!(DefenseTuning::spawn_burst(29.9), 5);
        assert_eq!(DefenseTuning::spawn_burst(120.0), 5);
    }
}
