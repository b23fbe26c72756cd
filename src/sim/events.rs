//! Events surfaced by engines to the host (feedback text, sound cues)

use super::stealth::StealthPhase;

/// Something noteworthy that happened during input handling or a frame
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    /// Tap landed inside the target zone
    TapHit { score: u32, streak: u32, required: u32 },
    /// Tap landed outside the target zone by `miss_by` percent
    TapMiss { miss_by: f64 },
    /// Stealth watcher changed phase
    PhaseChanged(StealthPhase),
    /// Caught holding while watched; progress forfeited
    Spotted { resets: u32 },
    /// Entities appeared on the arena edges
    Spawned { count: usize },
    /// Entities reached the center this frame
    CenterHit { damage: u32 },
    /// Player removed an entity
    Squashed { id: u32 },
    /// Damage cap reached; run restarted
    Overrun { resets: u32 },
    /// Step finished successfully
    Completed,
}

impl GameEvent {
    /// Player-facing feedback line, if the event warrants one
    pub fn feedback(&self) -> Option<String> {
        match self {
            GameEvent::TapHit {
                score,
                streak,
                required,
            } => Some(format!("Hit! ({streak}/{required}) Score {score}.")),
            GameEvent::TapMiss { miss_by } => {
                Some(format!("Missed by {miss_by:.1}%. Streak reset."))
            }
            GameEvent::Spotted { .. } => Some("They saw you! Start over.".to_string()),
            GameEvent::Overrun { .. } => {
                Some("The mosquitoes got through! Start over.".to_string())
            }
            GameEvent::Completed => Some("Success! Challenge complete.".to_string()),
            GameEvent::PhaseChanged(_)
            | GameEvent::Spawned { .. }
            | GameEvent::CenterHit { .. }
            | GameEvent::Squashed { .. } => None,
        }
    }
}
