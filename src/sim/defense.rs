//! Survival-defense engine
//!
//! Mosquitoes spawn on the arena edges and fly straight at the center. The
//! player squashes them; any that reach the protected zone deal one damage.
//! Surviving `duration_ms` completes the step. Reaching the damage cap
//! restarts the run from zero (the step never records a failure).

use glam::DVec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::clock::{FrameClock, FrameHandle};
use super::events::GameEvent;
use super::timers::{TimerHandle, Timers};
use crate::book::{MosquitoDefenseStep, ResultMeta, StepResult};
use crate::consts::*;
use crate::difficulty::{DefenseTuning, Difficulty};
use crate::{clamp, random_between};

/// Measured play area (px)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Arena {
    pub width: f64,
    pub height: f64,
}

impl Arena {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Zero-sized layouts have not been measured yet
    pub fn is_measured(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    pub fn center(&self) -> DVec2 {
        DVec2::new(self.width / 2.0, self.height / 2.0)
    }

    /// Radius of the protected zone
    pub fn center_radius(&self) -> f64 {
        self.width.min(self.height) * CENTER_RADIUS_FACTOR
    }

    /// Uniform point on one of the four edges
    pub fn random_edge_point(&self, rng: &mut Pcg32) -> DVec2 {
        match rng.random_range(0..4) {
            0 => DVec2::new(random_between(rng, 0.0, self.width), 0.0),
            1 => DVec2::new(self.width, random_between(rng, 0.0, self.height)),
            2 => DVec2::new(random_between(rng, 0.0, self.width), self.height),
            _ => DVec2::new(0.0, random_between(rng, 0.0, self.height)),
        }
    }
}

/// An enemy entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mosquito {
    pub id: u32,
    pub pos: DVec2,
    /// px/s
    pub speed: f64,
}

impl Mosquito {
    /// Whether the mosquito is inside the protected zone (checked before moving)
    pub fn reached(&self, center: DVec2, radius: f64) -> bool {
        distance_or_one(center - self.pos) <= radius
    }

    /// Fly straight at `center` for `delta_ms`
    pub fn steer(&mut self, center: DVec2, delta_ms: f64) {
        let to_center = center - self.pos;
        let distance = distance_or_one(to_center);
        self.pos += to_center / distance * (self.speed * delta_ms / 1000.0);
    }
}

/// Zero-length vectors count as distance 1 so steering never divides by zero
fn distance_or_one(v: DVec2) -> f64 {
    let d = v.length();
    if d > 0.0 { d } else { 1.0 }
}

/// Short-lived visual marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub id: u32,
    pub pos: DVec2,
}

/// Effect expirations
#[derive(Debug, Clone, Copy, PartialEq)]
enum Expiry {
    Flash,
    Ping(u32),
    Splat(u32),
}

/// Live mosquito-defense game
#[derive(Debug, Clone)]
pub struct MosquitoDefenseGame {
    pub step: MosquitoDefenseStep,
    pub difficulty: Difficulty,
    pub tuning: DefenseTuning,
    pub arena: Arena,
    pub running: bool,
    pub elapsed_ms: f64,
    pub mosquitoes: Vec<Mosquito>,
    pub squashed: u32,
    pub resets: u32,
    pub damage: u32,
    pub spawn_accumulator_ms: f64,
    pub feedback: Option<String>,
    /// Screen flash after center damage
    pub hit_flash: bool,
    /// Ripple at the center after damage
    pub hit_pings: Vec<Marker>,
    /// Remains at squash positions
    pub splats: Vec<Marker>,
    effects: Timers<Expiry>,
    flash_timer: Option<TimerHandle>,
    next_id: u32,
    completed: Option<StepResult>,
    pending: Option<StepResult>,
    events: Vec<GameEvent>,
    clock: FrameClock,
    rng: Pcg32,
}

impl MosquitoDefenseGame {
    pub fn new(step: MosquitoDefenseStep, difficulty: Difficulty, seed: u64) -> Self {
        Self {
            step,
            difficulty,
            tuning: difficulty.defense_tuning(),
            arena: Arena::default(),
            running: false,
            elapsed_ms: 0.0,
            mosquitoes: Vec::new(),
            squashed: 0,
            resets: 0,
            damage: 0,
            spawn_accumulator_ms: 0.0,
            feedback: None,
            hit_flash: false,
            hit_pings: Vec::new(),
            splats: Vec::new(),
            effects: Timers::new(),
            flash_timer: None,
            next_id: 1,
            completed: None,
            pending: None,
            events: Vec::new(),
            clock: FrameClock::new(),
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    pub fn with_existing(mut self, existing: Option<&StepResult>) -> Self {
        if let Some(result) = existing.filter(|r| r.is_success()) {
            self.completed = Some(result.clone());
        }
        self
    }

    pub fn with_arena(mut self, width: f64, height: f64) -> Self {
        self.set_arena(width, height);
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

    /// Layout measured or resized
    pub fn set_arena(&mut self, width: f64, height: f64) {
        self.arena = Arena::new(width.max(0.0), height.max(0.0));
    }

    pub fn display_elapsed_ms(&self) -> f64 {
        self.completed
            .as_ref()
            .and_then(|r| r.meta_f64("elapsedMs"))
            .unwrap_or(self.elapsed_ms)
    }

    pub fn progress_pct(&self) -> f64 {
        if self.step.duration_ms <= 0.0 {
            return 100.0;
        }
        clamp(self.display_elapsed_ms() / self.step.duration_ms * 100.0, 0.0, 100.0)
    }

    pub fn set_difficulty(&mut self, difficulty: Difficulty) {
        if self.is_complete() {
            return;
        }
        self.difficulty = difficulty;
        self.tuning = difficulty.defense_tuning();
        self.reset();
    }

    /// Full reinitialization, counters included
    pub fn reset(&mut self) {
        if self.is_complete() {
            return;
        }
        self.clock.stop();
        self.running = false;
        self.elapsed_ms = 0.0;
        self.mosquitoes.clear();
        self.feedback = None;
        self.squashed = 0;
        self.resets = 0;
        self.damage = 0;
        self.spawn_accumulator_ms = 0.0;
        self.clear_effects();
    }

    /// Begin (or resume) the run; an empty arena gets two starters
    pub fn start(&mut self) -> Option<FrameHandle> {
        if self.is_complete() {
            return None;
        }
        self.feedback = None;
        self.running = true;
        if self.mosquitoes.is_empty() {
            let seeded = self.spawn(SEED_MOSQUITOES);
            if seeded > 0 {
                log::debug!("defense {} seeded {} mosquitoes", self.step.id, seeded);
            }
        }
        Some(self.clock.start())
    }

    /// Pause the run, keeping elapsed time and entities
    pub fn stop(&mut self) {
        self.running = false;
        self.clock.stop();
        self.clear_effects();
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

    /// Remove a live mosquito; unknown ids are ignored
    pub fn squash(&mut self, id: u32) -> bool {
        if self.is_complete() {
            return false;
        }
        let Some(index) = self.mosquitoes.iter().position(|m| m.id == id) else {
            return false;
        };
        let target = self.mosquitoes.remove(index);
        self.squashed += 1;
        let splat_id = self.next_entity_id();
        self.splats.push(Marker {
            id: splat_id,
            pos: target.pos,
        });
        self.effects.schedule(SPLAT_MS, Expiry::Splat(splat_id));
        self.events.push(GameEvent::Squashed { id });
        true
    }

    /// Mosquito at `point` (within `radius`), nearest first
    pub fn mosquito_at(&self, point: DVec2, radius: f64) -> Option<u32> {
        self.mosquitoes
            .iter()
            .map(|m| (m.id, m.pos.distance(point)))
            .filter(|(_, d)| *d <= radius)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }

    /// One simulation step of `delta_ms`
    pub fn advance(&mut self, delta_ms: f64) {
        if !self.running || self.is_complete() || !self.arena.is_measured() {
            return;
        }

        self.expire_effects(delta_ms);

        let duration = self.step.duration_ms;
        self.elapsed_ms = (self.elapsed_ms + delta_ms).min(duration);
        let elapsed_secs = self.elapsed_ms / 1000.0;

        // Spawning
        let interval = self.tuning.spawn_interval_ms(elapsed_secs);
        let burst = DefenseTuning::spawn_burst(elapsed_secs);
        self.spawn_accumulator_ms += delta_ms;
        let mut spawned = 0;
        while self.spawn_accumulator_ms >= interval
            && self.mosquitoes.len() < self.tuning.max_mosquitoes
        {
            spawned += self.spawn(burst);
            self.spawn_accumulator_ms -= interval;
        }
        if spawned > 0 {
            self.events.push(GameEvent::Spawned { count: spawned });
        }

        // Steering and center collisions
        let center = self.arena.center();
        let radius = self.arena.center_radius();
        let mut new_damage = 0;
        self.mosquitoes.retain_mut(|m| {
            if m.reached(center, radius) {
                new_damage += 1;
                false
            } else {
                m.steer(center, delta_ms);
                true
            }
        });

        if new_damage > 0 {
            self.damage = (self.damage + new_damage).min(MAX_DAMAGE);
            self.trigger_hit_effects(center);
            self.events.push(GameEvent::CenterHit {
                damage: self.damage,
            });
            if self.damage >= MAX_DAMAGE {
                self.overrun();
                return;
            }
        }

        if self.elapsed_ms >= duration {
            self.complete();
        }
    }

    /// Spawn up to `count` mosquitoes under the live cap
    fn spawn(&mut self, count: usize) -> usize {
        if !self.arena.is_measured() {
            return 0;
        }
        let mut created = 0;
        for _ in 0..count {
            if self.mosquitoes.len() >= self.tuning.max_mosquitoes {
                break;
            }
            let pos = self.arena.random_edge_point(&mut self.rng);
            let speed = random_between(&mut self.rng, self.tuning.speed_min, self.tuning.speed_max);
            let id = self.next_entity_id();
            self.mosquitoes.push(Mosquito { id, pos, speed });
            created += 1;
        }
        created
    }

    fn next_entity_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn trigger_hit_effects(&mut self, center: DVec2) {
        if let Some(handle) = self.flash_timer.take() {
            self.effects.cancel(handle);
        }
        self.hit_flash = true;
        self.flash_timer = Some(self.effects.schedule(HIT_FLASH_MS, Expiry::Flash));

        let ping_id = self.next_entity_id();
        self.hit_pings.push(Marker {
            id: ping_id,
            pos: center,
        });
        self.effects.schedule(HIT_PING_MS, Expiry::Ping(ping_id));
    }

    fn expire_effects(&mut self, delta_ms: f64) {
        for expiry in self.effects.advance(delta_ms) {
            match expiry {
                Expiry::Flash => {
                    self.hit_flash = false;
                    self.flash_timer = None;
                }
                Expiry::Ping(id) => self.hit_pings.retain(|p| p.id != id),
                Expiry::Splat(id) => self.splats.retain(|s| s.id != id),
            }
        }
    }

    fn clear_effects(&mut self) {
        self.effects.clear();
        self.flash_timer = None;
        self.hit_flash = false;
        self.hit_pings.clear();
        self.splats.clear();
    }

    /// Damage cap reached: restart from zero and wait for a new start
    fn overrun(&mut self) {
        self.running = false;
        self.clock.stop();
        self.elapsed_ms = 0.0;
        self.mosquitoes.clear();
        self.resets += 1;
        self.damage = 0;
        self.spawn_accumulator_ms = 0.0;
        self.clear_effects();
        let event = GameEvent::Overrun {
            resets: self.resets,
        };
        self.feedback = event.feedback();
        self.events.push(event);
        log::debug!("defense {} overrun (resets {})", self.step.id, self.resets);
    }

    fn complete(&mut self) {
        self.running = false;
        self.clock.stop();
        self.clear_effects();

        let mut meta = ResultMeta::new();
        meta.insert("elapsedMs".into(), json!(self.step.duration_ms));
        meta.insert("squashed".into(), json!(self.squashed));
        meta.insert("resets".into(), json!(self.resets));
        meta.insert("damage".into(), json!(self.damage));
        meta.insert("difficulty".into(), json!(self.difficulty.as_str()));
        let result = StepResult::success(self.step.id.clone())
            .with_score(100)
            .with_meta(meta);

        self.completed = Some(result.clone());
        self.pending = Some(result);
        self.feedback = Some("You protected her long enough!".to_string());
        self.events.push(GameEvent::Completed);
        log::info!(
            "defense {} complete on {} ({} squashed, {} resets)",
            self.step.id,
            self.difficulty.as_str(),
            self.squashed,
            self.resets
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn step(duration: f64) -> MosquitoDefenseStep {
        MosquitoDefenseStep {
            id: "bugs".into(),
            prompt: "Squash".into(),
            duration_ms: duration,
        }
    }

    fn game(duration: f64, difficulty: Difficulty) -> MosquitoDefenseGame {
        MosquitoDefenseGame::new(step(duration), difficulty, 42).with_arena(400.0, 300.0)
    }

    fn at_center(game: &mut MosquitoDefenseGame, n: usize) {
        let center = game.arena.center();
        for _ in 0..n {
            let id = game.next_entity_id();
            game.mosquitoes.push(Mosquito {
                id,
                pos: center,
                speed: 50.0,
            });
        }
    }

    #[test]
    fn test_arena_geometry() {
        let arena = Arena::new(400.0, 300.0);
        assert_eq!(arena.center(), DVec2::new(200.0, 150.0));
        assert!((arena.center_radius() - 24.0).abs() < 1e-9);
        assert!(!Arena::new(0.0, 300.0).is_measured());

        let mut rng = Pcg32::seed_from_u64(3);
        for _ in 0..200 {
            let p = arena.random_edge_point(&mut rng);
            let on_edge = p.x == 0.0 || p.x == 400.0 || p.y == 0.0 || p.y == 300.0;
            assert!(on_edge, "{p:?} not on an edge");
        }
    }

    #[test]
    fn test_start_seeds_two_on_edges() {
        let mut game = game(30000.0, Difficulty::Medium);
        game.start();
        assert_eq!(game.mosquitoes.len(), 2);
        for m in &game.mosquitoes {
            assert!((40.0..80.0).contains(&m.speed));
        }
    }

    #[test]
    fn test_unmeasured_arena_is_noop() {
        let mut game = MosquitoDefenseGame::new(step(30000.0), Difficulty::Medium, 1);
        game.start();
        assert!(game.mosquitoes.is_empty());
        game.advance(5000.0);
        assert_eq!(game.elapsed_ms, 0.0);
        assert_eq!(game.damage, 0);
        assert!(game.mosquitoes.is_empty());

        game.set_arena(400.0, 300.0);
        game.advance(16.0);
        assert_eq!(game.elapsed_ms, 16.0);
    }

    #[test]
    fn test_steering_moves_toward_center_at_speed() {
        let mut game = game(30000.0, Difficulty::Medium);
        game.running = true;
        game.mosquitoes.push(Mosquito {
            id: 99,
            pos: DVec2::new(0.0, 150.0),
            speed: 100.0,
        });
        game.advance(500.0);
        let m = game.mosquitoes.iter().find(|m| m.id == 99).unwrap();
        assert!((m.pos.x - 50.0).abs() < 1e-9);
        assert!((m.pos.y - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_spawn_interval_and_cap() {
        let mut game = game(60000.0, Difficulty::Easy);
        game.running = true;
        game.advance(1000.0);
        assert!(game.mosquitoes.is_empty());
        game.advance(500.0);
        assert_eq!(game.mosquitoes.len(), 1);

        game.mosquitoes.clear();
        game.elapsed_ms = 0.0;
        game.spawn_accumulator_ms = 0.0;
        let cap = game.tuning.max_mosquitoes;
        game.advance(1400.0 * 40.0);
        assert!(game.mosquitoes.len() <= cap);
    }

    #[test]
    fn test_center_hit_counts_damage_and_effects() {
        let mut game = game(30000.0, Difficulty::Medium);
        game.running = true;
        at_center(&mut game, 2);
        game.advance(16.0);
        assert_eq!(game.damage, 2);
        assert!(game.hit_flash);
        assert_eq!(game.hit_pings.len(), 1);
        assert!(game.mosquitoes.is_empty());
        game.advance(200.0);
        assert!(!game.hit_flash);
        game.advance(150.0);
        assert!(game.hit_pings.is_empty());
    }

    #[test]
    fn test_fifth_damage_resets_run_in_same_frame() {
        let mut game = game(30000.0, Difficulty::Medium);
        game.start();
        game.advance(1000.0);
        game.damage = 3;
        at_center(&mut game, 4);
        game.advance(16.0);
        assert_eq!(game.damage, 0);
        assert_eq!(game.resets, 1);
        assert_eq!(game.elapsed_ms, 0.0);
        assert!(game.mosquitoes.is_empty());
        assert!(!game.running);
        assert!(game.frame_handle().is_none());
        assert!(!game.is_complete());
        assert!(game.drain_events().contains(&GameEvent::Overrun { resets: 1 }));
    }

    #[test]
    fn test_squash_removes_and_counts() {
        let mut game = game(30000.0, Difficulty::Medium);
        game.start();
        let id = game.mosquitoes[0].id;
        let elapsed = game.elapsed_ms;
        assert!(game.squash(id));
        assert!(!game.squash(id));
        assert_eq!(game.squashed, 1);
        assert_eq!(game.mosquitoes.len(), 1);
        assert_eq!(game.splats.len(), 1);
        assert_eq!(game.elapsed_ms, elapsed);
        game.advance(300.0);
        assert!(game.splats.is_empty());
    }

    #[test]
    fn test_mosquito_at_picks_nearest() {
        let mut game = game(30000.0, Difficulty::Medium);
        game.mosquitoes = vec![
            Mosquito { id: 1, pos: DVec2::new(10.0, 10.0), speed: 1.0 },
            Mosquito { id: 2, pos: DVec2::new(14.0, 10.0), speed: 1.0 },
        ];
        assert_eq!(game.mosquito_at(DVec2::new(13.0, 10.0), 20.0), Some(2));
        assert_eq!(game.mosquito_at(DVec2::new(100.0, 100.0), 20.0), None);
    }

    #[test]
    fn test_survival_emits_single_success() {
        let mut game = game(1000.0, Difficulty::Easy);
        let handle = game.start().unwrap();
        let mut now = 0.0;
        let mut completions = 0;
        while game.frame(handle, now) {
            if game.take_completion().is_some() {
                completions += 1;
            }
            now += 16.0;
            assert!(now < 5000.0, "never completed");
        }
        if game.take_completion().is_some() {
            completions += 1;
        }
        assert_eq!(completions, 1);
        let result = game.result().unwrap();
        assert_eq!(result.score, Some(100));
        assert_eq!(result.meta_f64("elapsedMs"), Some(1000.0));
        assert_eq!(result.meta_f64("damage"), Some(0.0));
        assert_eq!(result.meta.as_ref().unwrap()["difficulty"], json!("easy"));
        assert_eq!(game.progress_pct(), 100.0);
    }

    #[test]
    fn test_resume_after_long_pause_advances_one_capped_step() {
        let mut game = game(30000.0, Difficulty::Impossible);
        let handle = game.start().unwrap();
        assert!(game.frame(handle, 0.0));
        assert!(game.frame(handle, 60_000.0));
        assert!(game.elapsed_ms <= MAX_FRAME_DELTA_MS);
        assert!(!game.is_complete());
        assert!(game.take_completion().is_none());
    }

    #[test]
    fn test_difficulty_change_reinitializes_everything() {
        let mut game = game(30000.0, Difficulty::Medium);
        game.start();
        game.advance(3000.0);
        game.squashed = 4;
        game.resets = 2;
        game.set_difficulty(Difficulty::Hard);
        assert!(!game.running);
        assert_eq!(game.elapsed_ms, 0.0);
        assert!(game.mosquitoes.is_empty());
        assert_eq!((game.squashed, game.resets, game.damage), (0, 0, 0));
        assert_eq!(game.spawn_accumulator_ms, 0.0);
        assert_eq!(game.tuning.max_mosquitoes, 28);
    }

    #[test]
    fn test_completed_step_ignores_input() {
        let existing = StepResult::success("bugs").with_score(100);
        let mut game = game(30000.0, Difficulty::Medium).with_existing(Some(&existing));
        assert!(game.start().is_none());
        game.running = true;
        game.advance(1000.0);
        assert_eq!(game.elapsed_ms, 0.0);
        game.set_difficulty(Difficulty::Easy);
        assert_eq!(game.difficulty, Difficulty::Medium);
    }

    proptest! {
        #[test]
        fn prop_damage_never_reaches_cap_after_frame(
            seed in any::<u64>(),
            frames in proptest::collection::vec(1.0f64..250.0, 1..400),
            width in 40.0f64..600.0,
            height in 40.0f64..600.0,
        ) {
            let mut game = MosquitoDefenseGame::new(step(20000.0), Difficulty::Impossible, seed)
                .with_arena(width, height);
            game.start();
            for dt in frames {
                if !game.running && !game.is_complete() {
                    game.start();
                }
                let resets_before = game.resets;
                game.advance(dt);
                prop_assert!(game.damage < MAX_DAMAGE);
                if game.resets > resets_before {
                    prop_assert_eq!(game.damage, 0);
                    prop_assert_eq!(game.elapsed_ms, 0.0);
                    prop_assert!(game.mosquitoes.is_empty());
                }
                prop_assert!(game.mosquitoes.len() <= game.tuning.max_mosquitoes);
            }
            if let Some(result) = game.result() {
                prop_assert!(result.meta_f64("damage").unwrap() < MAX_DAMAGE as f64);
            }
        }
    }
}
