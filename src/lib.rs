//! Interactive Book - step engine for a book of playable pages
//!
//! Core modules:
//! - `book`: Book/Page/Step definitions and the `StepResult` contract
//! - `difficulty`: Data-driven tuning tables per difficulty tier
//! - `sim`: Frame-driven simulation (clock, timers, the three mini-games)
//! - `dispatch`: Routes steps to engines and feeds completions into progress
//! - `progress`: Persisted reading progress with validation against the book
//! - `platform`: Key-value storage backends (memory, files, LocalStorage)

pub mod audio;
pub mod autoplay;
pub mod book;
pub mod catalog;
pub mod difficulty;
pub mod dispatch;
pub mod platform;
pub mod progress;
pub mod settings;
pub mod sim;

pub use book::{Book, Page, ResultMeta, Step, StepResult, StepStatus};
pub use difficulty::Difficulty;
pub use dispatch::{BookSession, StepEngine};
pub use progress::{BookProgress, ProgressState, ProgressStore};
pub use settings::Settings;

use rand::Rng;

/// Game configuration constants
pub mod consts {
    /// Namespace prefix for persisted progress keys (`<namespace>:<bookId>`)
    pub const PROGRESS_NAMESPACE: &str = "interactive_book_progress";

    /// Longest simulation step a single host frame may advance (ms)
    pub const MAX_FRAME_DELTA_MS: f64 = 100.0;

    /// Stealth: fixed warning dwell before the watcher turns around
    pub const WARNING_MS: f64 = 350.0;
    /// Stealth: default safe dwell range (ms)
    pub const DEFAULT_SAFE_MIN_MS: f64 = 1600.0;
    pub const DEFAULT_SAFE_MAX_MS: f64 = 3200.0;
    /// Stealth: default unsafe dwell range (ms)
    pub const DEFAULT_UNSAFE_MIN_MS: f64 = 1200.0;
    pub const DEFAULT_UNSAFE_MAX_MS: f64 = 2600.0;

    /// Tap timing: widest allowed base target zone (percent of track)
    pub const MAX_TARGET_WIDTH_PCT: f64 = 80.0;
    /// Tap timing: widest zone a re-rolled target may take
    pub const MAX_RANDOM_TARGET_WIDTH_PCT: f64 = 90.0;

    /// Defense: damage points that force a run reset
    pub const MAX_DAMAGE: u32 = 5;
    /// Defense: protected zone radius as a fraction of min(width, height)
    pub const CENTER_RADIUS_FACTOR: f64 = 0.08;
    /// Defense: spawn burst grows by one every this many seconds
    pub const BURST_GROWTH_SECS: f64 = 6.0;
    /// Defense: upper bound on entities spawned per interval
    pub const MAX_SPAWN_BURST: usize = 5;
    /// Defense: entities placed on the arena edges when a run starts empty
    pub const SEED_MOSQUITOES: usize = 2;

    /// Transient effect lifetimes (ms)
    pub const HIT_FLASH_MS: f64 = 200.0;
    pub const HIT_PING_MS: f64 = 350.0;
    pub const SPLAT_MS: f64 = 300.0;
}

/// Clamp `value` into `[min, max]` (min wins if the bounds cross)
#[inline]
pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.min(max).max(min)
}

/// Uniform draw in `[min, max)`; collapses to `min` when the range is empty
#[inline]
pub fn random_between<R: Rng + ?Sized>(rng: &mut R, min: f64, max: f64) -> f64 {
    min + rng.random::<f64>() * (max - min).max(0.0)
}

/// Round to a fixed number of decimal places
#[inline]
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
