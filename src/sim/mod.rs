//! Deterministic simulation module
//!
//! All mini-game logic lives here. Engines are pure state machines:
//! - Time only moves through `advance(delta_ms)`
//! - Seeded RNG only
//! - No rendering, storage, or platform dependencies

pub mod clock;
pub mod defense;
pub mod events;
pub mod stealth;
pub mod tap_timing;
pub mod timers;

pub use clock::{FrameClock, FrameHandle};
pub use defense::{Arena, Marker, Mosquito, MosquitoDefenseGame};
pub use events::GameEvent;
pub use stealth::{DwellRange, StealthPhase, StealthPourGame};
pub use tap_timing::{TapOutcome, TapTimingGame, TargetZone, indicator_position};
pub use timers::{TimerHandle, Timers};
