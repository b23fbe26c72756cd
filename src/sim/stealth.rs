//! Stealth-hold engine
//!
//! A watcher cycles safe -> warning -> unsafe -> safe on randomized dwell
//! timers, independent of the player. Holding input while not watched pours;
//! being caught holding (or starting to hold while watched) forfeits all
//! progress. Pouring the full amount is the only terminal outcome.

use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::clock::{FrameClock, FrameHandle};
use super::events::GameEvent;
use super::timers::{TimerHandle, Timers};
use crate::book::{ResultMeta, StealthPourStep, StepResult};
use crate::consts::*;
use crate::{clamp, random_between};

/// Watcher phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StealthPhase {
    Safe,
    /// Short heads-up before `Unsafe`; holding still pours
    Warning,
    Unsafe,
}

impl StealthPhase {
    /// Whether holding currently accumulates pour time
    pub fn allows_pouring(&self) -> bool {
        !matches!(self, StealthPhase::Unsafe)
    }

    pub fn label(&self) -> &'static str {
        match self {
            StealthPhase::Safe => "Safe",
            StealthPhase::Warning => "Careful",
            StealthPhase::Unsafe => "Seen",
        }
    }
}

/// Dwell range for a phase (ms)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DwellRange {
    pub min: f64,
    pub max: f64,
}

impl DwellRange {
    /// At least 1 ms so a zero-width range cannot stall the phase cycle
    fn roll(&self, rng: &mut Pcg32) -> f64 {
        random_between(rng, self.min.max(0.0), self.max.max(0.0)).max(1.0)
    }
}

/// Live stealth-pour game
#[derive(Debug, Clone)]
pub struct StealthPourGame {
    pub step: StealthPourStep,
    pub phase: StealthPhase,
    pub holding: bool,
    pub held_ms: f64,
    pub resets: u32,
    pub feedback: Option<String>,
    pub safe_range: DwellRange,
    pub unsafe_range: DwellRange,
    timers: Timers<StealthPhase>,
    phase_timer: Option<TimerHandle>,
    completed: Option<StepResult>,
    pending: Option<StepResult>,
    events: Vec<GameEvent>,
    clock: FrameClock,
    rng: Pcg32,
}

impl StealthPourGame {
    pub fn new(step: StealthPourStep, seed: u64) -> Self {
        let safe_range = DwellRange {
            min: step.safe_min_ms.unwrap_or(DEFAULT_SAFE_MIN_MS),
            max: step.safe_max_ms.unwrap_or(DEFAULT_SAFE_MAX_MS),
        };
        let unsafe_range = DwellRange {
            min: step.unsafe_min_ms.unwrap_or(DEFAULT_UNSAFE_MIN_MS),
            max: step.unsafe_max_ms.unwrap_or(DEFAULT_UNSAFE_MAX_MS),
        };
        let mut game = Self {
            step,
            phase: StealthPhase::Safe,
            holding: false,
            held_ms: 0.0,
            resets: 0,
            feedback: None,
            safe_range,
            unsafe_range,
            timers: Timers::new(),
            phase_timer: None,
            completed: None,
            pending: None,
            events: Vec::new(),
            clock: FrameClock::new(),
            rng: Pcg32::seed_from_u64(seed),
        };
        game.schedule_after(StealthPhase::Safe);
        game
    }

    /// Re-render of an already completed step: no timers, no input
    pub fn with_existing(mut self, existing: Option<&StepResult>) -> Self {
        if let Some(result) = existing.filter(|r| r.is_success()) {
            self.completed = Some(result.clone());
            self.cancel_timers();
        }
        self
    }

    pub fn is_complete(&self) -> bool {
        self.completed.is_some()
    }

    pub fn result(&self) -> Option<&StepResult> {
        self.completed.as_ref()
    }

    pub fn take_completion(&mut self) -> Option<StepResult> {
        self.pending.take()
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Stored pour time for completed steps, live value otherwise
    pub fn display_held_ms(&self) -> f64 {
        self.completed
            .as_ref()
            .and_then(|r| r.meta_f64("heldMs"))
            .unwrap_or(self.held_ms)
    }

    pub fn progress_pct(&self) -> f64 {
        if self.step.total_hold_ms <= 0.0 {
            return 100.0;
        }
        clamp(self.display_held_ms() / self.step.total_hold_ms * 100.0, 0.0, 100.0)
    }

    /// Time left in the current phase, if a transition is pending
    pub fn phase_remaining_ms(&self) -> Option<f64> {
        self.timers.time_until_next()
    }

    /// Mount: start the watcher cycle and frame delivery
    pub fn start(&mut self) -> Option<FrameHandle> {
        if self.is_complete() {
            return None;
        }
        if self.phase_timer.is_none() {
            self.schedule_after(self.phase);
        }
        Some(self.clock.start())
    }

    /// Unmount: cancel frame delivery and every phase timer
    pub fn stop(&mut self) {
        self.holding = false;
        self.cancel_timers();
        self.clock.stop();
    }

    /// Back to a fresh safe phase with no progress
    pub fn reset(&mut self) {
        if self.is_complete() {
            return;
        }
        let was_running = self.clock.is_running();
        self.stop();
        self.phase = StealthPhase::Safe;
        self.held_ms = 0.0;
        self.resets = 0;
        self.feedback = None;
        self.schedule_after(StealthPhase::Safe);
        if was_running {
            self.clock.start();
        }
    }

    pub fn frame_handle(&self) -> Option<FrameHandle> {
        self.clock.handle()
    }

    /// Host frame callback; false means the handle is stale
    pub fn frame(&mut self, handle: FrameHandle, now_ms: f64) -> bool {
        match self.clock.frame(handle, now_ms) {
            Some(delta) => {
                self.advance(delta);
                true
            }
            None => false,
        }
    }

    /// Press. Starting to hold while watched is an immediate forfeit.
    /// Ignored while stopped.
    pub fn hold_start(&mut self) -> bool {
        if self.is_complete() || !self.clock.is_running() {
            return false;
        }
        if self.phase == StealthPhase::Unsafe {
            self.spotted();
            return false;
        }
        self.feedback = None;
        self.holding = true;
        true
    }

    /// Release
    pub fn hold_end(&mut self) {
        self.holding = false;
    }

    /// Advance phase timers and pour accumulation by `delta_ms`
    ///
    /// The frame is split at phase boundaries so pour time is credited only
    /// up to the instant the watcher turns around. A stopped engine does not
    /// move.
    pub fn advance(&mut self, delta_ms: f64) {
        if !self.clock.is_running() {
            return;
        }
        let mut remaining = delta_ms.max(0.0);
        loop {
            if self.is_complete() {
                return;
            }
            let (consumed, fired) = self.timers.advance_to_next(remaining);
            self.accumulate(consumed);
            remaining -= consumed;
            if self.is_complete() {
                return;
            }
            let idle = fired.is_empty();
            for phase in fired {
                self.enter_phase(phase);
            }
            if idle && remaining <= 0.0 {
                return;
            }
        }
    }

    fn accumulate(&mut self, slice_ms: f64) {
        if !self.holding || !self.phase.allows_pouring() || slice_ms <= 0.0 {
            if self.holding && self.held_ms >= self.step.total_hold_ms {
                self.complete();
            }
            return;
        }
        let total = self.step.total_hold_ms;
        self.held_ms = clamp(self.held_ms + slice_ms, 0.0, total);
        if self.held_ms >= total {
            self.complete();
        }
    }

    fn enter_phase(&mut self, phase: StealthPhase) {
        self.phase_timer = None;
        self.phase = phase;
        self.events.push(GameEvent::PhaseChanged(phase));
        log::debug!("stealth {} -> {:?}", self.step.id, phase);
        if phase == StealthPhase::Unsafe && self.holding {
            self.spotted();
        }
        self.schedule_after(phase);
    }

    /// Schedule the transition out of `phase` with a freshly rolled dwell
    fn schedule_after(&mut self, phase: StealthPhase) {
        if let Some(handle) = self.phase_timer.take() {
            self.timers.cancel(handle);
        }
        let (next, dwell) = match phase {
            StealthPhase::Safe => (StealthPhase::Warning, self.safe_range.roll(&mut self.rng)),
            StealthPhase::Warning => (StealthPhase::Unsafe, WARNING_MS),
            StealthPhase::Unsafe => (StealthPhase::Safe, self.unsafe_range.roll(&mut self.rng)),
        };
        self.phase_timer = Some(self.timers.schedule(dwell, next));
    }

    fn cancel_timers(&mut self) {
        self.timers.clear();
        self.phase_timer = None;
    }

    fn spotted(&mut self) {
        self.held_ms = 0.0;
        self.resets += 1;
        self.holding = false;
        let event = GameEvent::Spotted {
            resets: self.resets,
        };
        self.feedback = event.feedback();
        self.events.push(event);
        log::debug!("stealth {} spotted (resets {})", self.step.id, self.resets);
    }

    fn complete(&mut self) {
        let total = self.step.total_hold_ms;
        self.held_ms = total;
        self.holding = false;
        self.cancel_timers();
        self.clock.stop();

        let mut meta = ResultMeta::new();
        meta.insert("heldMs".into(), json!(total));
        meta.insert("resets".into(), json!(self.resets));
        let result = StepResult::success(self.step.id.clone())
            .with_score(100)
            .with_meta(meta);

        self.completed = Some(result.clone());
        self.pending = Some(result);
        self.feedback = Some("Poured it all! Great job.".to_string());
        self.events.push(GameEvent::Completed);
        log::info!("stealth {} complete after {} resets", self.step.id, self.resets);
    }
}
