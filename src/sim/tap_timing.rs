//! Tap-timing engine
//!
//! An indicator sweeps 0% -> 100% -> 0% along a track (triangle wave). Taps
//! inside the target zone build a streak; every hit speeds the sweep up and
//! shrinks and moves the zone. Any miss drops back to the starting geometry.

use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde_json::json;

use super::clock::{FrameClock, FrameHandle};
use super::events::GameEvent;
use crate::book::{ResultMeta, StepResult, TapTimingStep};
use crate::consts::{MAX_RANDOM_TARGET_WIDTH_PCT, MAX_TARGET_WIDTH_PCT};
use crate::difficulty::{Difficulty, TapTuning};
use crate::{clamp, random_between, round_to};

/// Target zone on the track, in percent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetZone {
    pub start: f64,
    pub end: f64,
}

impl TargetZone {
    /// Normalize the step's zone: order-independent, width clamped to
    /// `[min_width, 80]`, center pulled in so the zone stays on the track
    pub fn base(step: &TapTimingStep, min_width: f64) -> Self {
        let start_raw = clamp(step.target_start_pct, 0.0, 100.0);
        let end_raw = clamp(step.target_end_pct, 0.0, 100.0);
        let start = start_raw.min(end_raw);
        let end = start_raw.max(end_raw);
        let width = clamp(end - start, min_width, MAX_TARGET_WIDTH_PCT);
        let center = clamp((start + end) / 2.0, width / 2.0, 100.0 - width / 2.0);
        Self::centered(center, width)
    }

    fn centered(center: f64, width: f64) -> Self {
        Self {
            start: clamp(center - width / 2.0, 0.0, 100.0),
            end: clamp(center + width / 2.0, 0.0, 100.0),
        }
    }

    /// Zone of `width` with a uniformly random center that keeps it on the track
    pub fn random(rng: &mut Pcg32, width: f64, min_width: f64) -> Self {
        let width = clamp(width, min_width, MAX_RANDOM_TARGET_WIDTH_PCT);
        let min_center = width / 2.0;
        let max_center = 100.0 - width / 2.0;
        Self::centered(random_between(rng, min_center, max_center), width)
    }

    pub fn width(&self) -> f64 {
        (self.end - self.start).abs()
    }

    pub fn center(&self) -> f64 {
        (self.start + self.end) / 2.0
    }

    /// Half width, floored so scoring never divides by zero
    pub fn half_width(&self) -> f64 {
        let half = self.width() / 2.0;
        if half > 0.0 { half } else { 0.01 }
    }

    /// Inclusive on both ends
    pub fn contains(&self, pct: f64) -> bool {
        pct >= self.start && pct <= self.end
    }

    /// Distance from the nearest edge for a position outside the zone
    pub fn miss_distance(&self, pct: f64) -> f64 {
        if pct < self.start {
            self.start - pct
        } else {
            pct - self.end
        }
    }

    /// 0-100 accuracy score: 100 at the center, 0 at the edges
    pub fn score(&self, pct: f64) -> u32 {
        let distance = (pct - self.center()).abs();
        let normalized = clamp(1.0 - distance / self.half_width(), 0.0, 1.0);
        (normalized * 100.0).round() as u32
    }
}

/// Triangle-wave position for `elapsed_ms` with a sweep of `cycle_ms`
pub fn indicator_position(elapsed_ms: f64, cycle_ms: f64) -> f64 {
    let phase = elapsed_ms % (cycle_ms * 2.0);
    if phase <= cycle_ms {
        phase / cycle_ms * 100.0
    } else {
        (1.0 - (phase - cycle_ms) / cycle_ms) * 100.0
    }
}

/// Result of a tap
#[derive(Debug, Clone, PartialEq)]
pub enum TapOutcome {
    /// Not running or already complete
    Ignored,
    Hit { score: u32, streak: u32 },
    Miss { miss_by: f64 },
    Completed(StepResult),
}

/// Live tap-timing game
#[derive(Debug, Clone)]
pub struct TapTimingGame {
    pub step: TapTimingStep,
    pub difficulty: Difficulty,
    pub tuning: TapTuning,
    pub running: bool,
    /// Time since the sweep origin
    pub elapsed_ms: f64,
    /// Indicator position on the track (percent)
    pub position_pct: f64,
    pub total_taps: u32,
    pub streak: u32,
    pub score_total: u32,
    pub speed_multiplier: f64,
    pub target: TargetZone,
    pub base_target: TargetZone,
    pub feedback: Option<String>,
    completed: Option<StepResult>,
    pending: Option<StepResult>,
    events: Vec<GameEvent>,
    clock: FrameClock,
    rng: Pcg32,
}

impl TapTimingGame {
    pub fn new(step: TapTimingStep, difficulty: Difficulty, seed: u64) -> Self {
        let tuning = difficulty.tap_tuning();
        let base_target = TargetZone::base(&step, tuning.min_target_width_pct);
        Self {
            step,
            difficulty,
            tuning,
            running: false,
            elapsed_ms: 0.0,
            position_pct: 0.0,
            total_taps: 0,
            streak: 0,
            score_total: 0,
            speed_multiplier: 1.0,
            target: base_target,
            base_target,
            feedback: None,
            completed: None,
            pending: None,
            events: Vec::new(),
            clock: FrameClock::new(),
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    /// Re-render of an already completed step: every input becomes a no-op
    pub fn with_existing(mut self, existing: Option<&StepResult>) -> Self {
        if let Some(result) = existing.filter(|r| r.is_success()) {
            self.completed = Some(result.clone());
        }
        self
    }

    pub fn is_complete(&self) -> bool {
        self.completed.is_some()
    }

    pub fn result(&self) -> Option<&StepResult> {
        self.completed.as_ref()
    }

    /// Completion not yet handed to the progress store (at most once)
    pub fn take_completion(&mut self) -> Option<StepResult> {
        self.pending.take()
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// One sweep of the track at the current speed
    pub fn cycle_ms(&self) -> f64 {
        (self.step.duration_ms / self.speed_multiplier).max(self.tuning.min_cycle_ms)
    }

    /// Stored tap count for completed steps, live count otherwise
    pub fn display_total_taps(&self) -> u32 {
        self.completed
            .as_ref()
            .and_then(|r| r.meta_f64("totalTaps"))
            .map(|t| t as u32)
            .unwrap_or(self.total_taps)
    }

    /// Change tier; resets the whole game
    pub fn set_difficulty(&mut self, difficulty: Difficulty) {
        if self.is_complete() {
            return;
        }
        self.difficulty = difficulty;
        self.tuning = difficulty.tap_tuning();
        self.base_target = TargetZone::base(&self.step, self.tuning.min_target_width_pct);
        self.reset();
    }

    /// Swap in new step geometry; resets the whole game
    pub fn set_step(&mut self, step: TapTimingStep) {
        if self.is_complete() {
            return;
        }
        self.base_target = TargetZone::base(&step, self.tuning.min_target_width_pct);
        self.step = step;
        self.reset();
    }

    /// Back to the initial state; cancels the frame loop
    pub fn reset(&mut self) {
        if self.is_complete() {
            return;
        }
        self.clock.stop();
        self.running = false;
        self.elapsed_ms = 0.0;
        self.position_pct = 0.0;
        self.feedback = None;
        self.total_taps = 0;
        self.streak = 0;
        self.score_total = 0;
        self.target = self.base_target;
        self.speed_multiplier = 1.0;
    }

    /// Start sweeping from the left edge
    pub fn start(&mut self) -> Option<FrameHandle> {
        if self.is_complete() {
            return None;
        }
        if !self.running {
            self.elapsed_ms = 0.0;
            self.position_pct = 0.0;
        }
        self.feedback = None;
        self.running = true;
        Some(self.clock.start())
    }

    /// Pause; the next start begins a fresh sweep
    pub fn stop(&mut self) {
        self.running = false;
        self.clock.stop();
    }

    pub fn frame_handle(&self) -> Option<FrameHandle> {
        self.clock.handle()
    }

    /// Host frame callback; false means the handle is stale and the loop must end
    pub fn frame(&mut self, handle: FrameHandle, now_ms: f64) -> bool {
        match self.clock.frame(handle, now_ms) {
            Some(delta) => {
                self.advance(delta);
                true
            }
            None => false,
        }
    }

    /// Move the indicator by `delta_ms`
    pub fn advance(&mut self, delta_ms: f64) {
        if !self.running || self.is_complete() {
            return;
        }
        self.elapsed_ms += delta_ms;
        self.position_pct = indicator_position(self.elapsed_ms, self.cycle_ms());
    }

    /// Score the indicator's current position
    pub fn tap(&mut self) -> TapOutcome {
        if !self.running || self.is_complete() {
            return TapOutcome::Ignored;
        }

        let pct = self.position_pct;
        self.total_taps += 1;

        if !self.target.contains(pct) {
            let miss_by = self.target.miss_distance(pct);
            self.streak = 0;
            self.score_total = 0;
            self.speed_multiplier = 1.0;
            self.target = self.base_target;
            self.emit(GameEvent::TapMiss { miss_by });
            log::debug!("tap miss by {:.1}% on {}", miss_by, self.step.id);
            return TapOutcome::Miss { miss_by };
        }

        let score = self.target.score(pct);
        self.score_total += score;
        self.streak += 1;
        self.speed_multiplier *= self.tuning.speed_increase;

        if self.streak >= self.tuning.required_streak {
            let result = self.complete(score, pct);
            return TapOutcome::Completed(result);
        }

        self.emit(GameEvent::TapHit {
            score,
            streak: self.streak,
            required: self.tuning.required_streak,
        });

        let next_width = self
            .tuning
            .min_target_width_pct
            .max(self.target.width() * self.tuning.shrink_factor);
        self.target = TargetZone::random(&mut self.rng, next_width, self.tuning.min_target_width_pct);

        TapOutcome::Hit {
            score,
            streak: self.streak,
        }
    }

    fn complete(&mut self, last_score: u32, pct: f64) -> StepResult {
        let required = self.tuning.required_streak;
        let final_score = (self.score_total as f64 / required as f64).round() as u32;

        let mut meta = ResultMeta::new();
        meta.insert("difficulty".into(), json!(self.difficulty.as_str()));
        meta.insert("totalTaps".into(), json!(self.total_taps));
        meta.insert("successStreak".into(), json!(self.streak));
        meta.insert("averageScore".into(), json!(final_score));
        meta.insert("lastTapScore".into(), json!(last_score));
        meta.insert("finalPositionPct".into(), json!(round_to(pct, 2)));

        let result = StepResult::success(self.step.id.clone())
            .with_score(final_score)
            .with_meta(meta);

        self.running = false;
        self.clock.stop();
        self.completed = Some(result.clone());
        self.pending = Some(result.clone());
        self.emit(GameEvent::Completed);
        log::info!(
            "tap timing {} complete on {} (score {})",
            self.step.id,
            self.difficulty.as_str(),
            final_score
        );
        result
    }

    fn emit(&mut self, event: GameEvent) {
        if let Some(text) = event.feedback() {
            self.feedback = Some(text);
        }
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn step(start: f64, end: f64) -> TapTimingStep {
        TapTimingStep {
            id: "tap".into(),
            prompt: "Tap".into(),
            duration_ms: 2400.0,
            target_start_pct: start,
            target_end_pct: end,
            attempts_allowed: None,
        }
    }

    fn running_game(difficulty: Difficulty) -> TapTimingGame {
        let mut game = TapTimingGame::new(step(42.0, 58.0), difficulty, 12345);
        game.start();
        game
    }

    #[test]
    fn test_base_target_normalization() {
        let zone = TargetZone::base(&step(58.0, 42.0), 8.0);
        assert_eq!(zone, TargetZone { start: 42.0, end: 58.0 });

        // Too narrow: widened to the tier minimum around the same center
        let zone = TargetZone::base(&step(50.0, 51.0), 8.0);
        assert!((zone.width() - 8.0).abs() < 1e-9);
        assert!((zone.center() - 50.5).abs() < 1e-9);

        // Too wide and off the edge: clamped to 80 and kept on the track
        let zone = TargetZone::base(&step(-20.0, 130.0), 8.0);
        assert!((zone.width() - 80.0).abs() < 1e-9);
        assert!(zone.start >= 0.0 && zone.end <= 100.0);

        // Near an edge: center re-clamped so the widened zone fits
        let zone = TargetZone::base(&step(0.0, 2.0), 12.0);
        assert_eq!(zone, TargetZone { start: 0.0, end: 12.0 });
    }

    #[test]
    fn test_indicator_triangle_wave() {
        assert_eq!(indicator_position(0.0, 1000.0), 0.0);
        assert_eq!(indicator_position(500.0, 1000.0), 50.0);
        assert_eq!(indicator_position(1000.0, 1000.0), 100.0);
        assert_eq!(indicator_position(1500.0, 1000.0), 50.0);
        assert_eq!(indicator_position(2000.0, 1000.0), 0.0);
        assert_eq!(indicator_position(2250.0, 1000.0), 25.0);
    }

    #[test]
    fn test_cycle_respects_speed_and_floor() {
        let mut game = running_game(Difficulty::Medium);
        assert_eq!(game.cycle_ms(), 2400.0);
        game.speed_multiplier = 2.0;
        assert_eq!(game.cycle_ms(), 1200.0);
        game.speed_multiplier = 100.0;
        assert_eq!(game.cycle_ms(), 160.0);
    }

    #[test]
    fn test_advance_moves_indicator_only_while_running() {
        let mut game = TapTimingGame::new(step(42.0, 58.0), Difficulty::Medium, 1);
        game.advance(600.0);
        assert_eq!(game.position_pct, 0.0);
        game.start();
        game.advance(600.0);
        assert!((game.position_pct - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_center_taps_complete_exactly_at_required_streak() {
        let mut game = running_game(Difficulty::Medium);
        let required = game.tuning.required_streak;
        for i in 1..required {
            game.position_pct = game.target.center();
            assert_eq!(game.tap(), TapOutcome::Hit { score: 100, streak: i });
            assert!(!game.is_complete());
            assert!(game.take_completion().is_none());
        }
        game.position_pct = game.target.center();
        let TapOutcome::Completed(result) = game.tap() else {
            panic!("expected completion");
        };
        assert_eq!(result.score, Some(100));
        assert!(result.is_success());
        assert_eq!(result.meta_f64("successStreak"), Some(required as f64));
        assert_eq!(result.meta_f64("totalTaps"), Some(required as f64));
        assert!(!game.running);

        // Delivered to the store exactly once
        assert_eq!(game.take_completion(), Some(result));
        assert!(game.take_completion().is_none());
        assert_eq!(game.tap(), TapOutcome::Ignored);
    }

    #[test]
    fn test_zone_edges_are_inclusive() {
        let mut game = running_game(Difficulty::Medium);
        game.position_pct = game.target.start;
        assert!(matches!(game.tap(), TapOutcome::Hit { streak: 1, .. }));
        game.position_pct = game.target.end;
        assert!(matches!(game.tap(), TapOutcome::Hit { streak: 2, .. }));
    }

    #[test]
    fn test_edge_hit_scores_zero_but_counts() {
        let mut game = running_game(Difficulty::Medium);
        game.position_pct = game.target.end;
        assert_eq!(game.tap(), TapOutcome::Hit { score: 0, streak: 1 });
    }

    #[test]
    fn test_miss_resets_streak_score_speed_and_zone() {
        let mut game = running_game(Difficulty::Medium);
        game.position_pct = game.target.center();
        game.tap();
        assert_eq!(game.streak, 1);
        assert!(game.speed_multiplier > 1.0);
        assert!(game.target.width() < game.base_target.width());

        game.position_pct = if game.target.start >= 1.0 {
            game.target.start - 1.0
        } else {
            game.target.end + 1.0
        };
        match game.tap() {
            TapOutcome::Miss { miss_by } => assert!((miss_by - 1.0).abs() < 1e-9),
            other => panic!("expected miss, got {other:?}"),
        }
        assert_eq!(game.streak, 0);
        assert_eq!(game.score_total, 0);
        assert_eq!(game.speed_multiplier, 1.0);
        assert_eq!(game.target, game.base_target);
        assert_eq!(game.total_taps, 2);
        assert_eq!(game.feedback.as_deref(), Some("Missed by 1.0%. Streak reset."));
    }

    #[test]
    fn test_hit_shrinks_and_keeps_zone_on_track() {
        let mut game = running_game(Difficulty::Hard);
        let before = game.target.width();
        game.position_pct = game.target.center();
        game.tap();
        let expected = (before * game.tuning.shrink_factor).max(game.tuning.min_target_width_pct);
        assert!((game.target.width() - expected).abs() < 1e-9);
        assert!(game.target.start >= 0.0 && game.target.end <= 100.0);
    }

    #[test]
    fn test_difficulty_change_reinitializes() {
        let mut game = running_game(Difficulty::Medium);
        game.advance(300.0);
        game.position_pct = game.target.center();
        game.tap();
        game.set_difficulty(Difficulty::Easy);
        assert!(!game.running);
        assert_eq!(game.streak, 0);
        assert_eq!(game.total_taps, 0);
        assert_eq!(game.speed_multiplier, 1.0);
        assert_eq!(game.tuning.required_streak, 3);
        assert_eq!(game.target, game.base_target);
        assert!(game.frame_handle().is_none());
    }

    #[test]
    fn test_step_change_reinitializes() {
        let mut game = running_game(Difficulty::Medium);
        game.advance(300.0);
        for _ in 0..2 {
            game.position_pct = game.target.center();
            game.tap();
        }
        assert_eq!(game.streak, 2);
        assert!(game.speed_multiplier > 1.0);
        let old_base = game.base_target;

        game.set_step(step(30.0, 10.0));
        let expected = TargetZone::base(&step(10.0, 30.0), game.tuning.min_target_width_pct);
        assert_ne!(game.base_target, old_base);
        assert_eq!(game.base_target, expected);
        assert_eq!(game.target, game.base_target);
        assert_eq!(game.step.target_start_pct, 30.0);
        assert_eq!(game.streak, 0);
        assert_eq!(game.score_total, 0);
        assert_eq!(game.total_taps, 0);
        assert_eq!(game.speed_multiplier, 1.0);
        assert_eq!(game.elapsed_ms, 0.0);
        assert_eq!(game.position_pct, 0.0);
        assert!(!game.running);
        assert!(game.frame_handle().is_none());
        assert_eq!(game.tap(), TapOutcome::Ignored);
    }

    #[test]
    fn test_tap_ignored_when_not_running() {
        let mut game = TapTimingGame::new(step(42.0, 58.0), Difficulty::Medium, 1);
        assert_eq!(game.tap(), TapOutcome::Ignored);
        assert_eq!(game.total_taps, 0);
    }

    #[test]
    fn test_existing_success_blocks_input() {
        let mut meta = ResultMeta::new();
        meta.insert("totalTaps".into(), json!(9));
        let existing = StepResult::success("tap").with_score(80).with_meta(meta);
        let mut game = TapTimingGame::new(step(42.0, 58.0), Difficulty::Medium, 1)
            .with_existing(Some(&existing));
        assert!(game.start().is_none());
        assert_eq!(game.tap(), TapOutcome::Ignored);
        assert_eq!(game.display_total_taps(), 9);
        assert!(game.take_completion().is_none());
    }

    #[test]
    fn test_stale_frame_handle_after_stop() {
        let mut game = running_game(Difficulty::Medium);
        let handle = game.frame_handle().unwrap();
        assert!(game.frame(handle, 0.0));
        game.stop();
        assert!(!game.frame(handle, 16.0));
        let fresh = game.start().unwrap();
        assert!(!game.frame(handle, 32.0));
        assert!(game.frame(fresh, 32.0));
    }

    proptest! {
        #[test]
        fn prop_center_tap_scores_100(start in 0.0f64..100.0, end in 0.0f64..100.0, seed in any::<u64>()) {
            let mut game = TapTimingGame::new(step(start, end), Difficulty::Impossible, seed);
            game.start();
            let required = game.tuning.required_streak;
            let mut total = 0;
            for _ in 0..required {
                game.position_pct = game.target.center();
                match game.tap() {
                    TapOutcome::Hit { score, .. } => { prop_assert_eq!(score, 100); total += 1; }
                    TapOutcome::Completed(result) => {
                        total += 1;
                        prop_assert_eq!(result.score, Some(100));
                    }
                    other => prop_assert!(false, "unexpected {:?}", other),
                }
            }
            prop_assert_eq!(total, required);
            prop_assert!(game.is_complete());
        }
    }
}
