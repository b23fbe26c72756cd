//! Step dispatch
//!
//! Maps each `Step` variant to its engine and feeds completions into the
//! progress store. `BookSession` owns the engines mounted for the current
//! page and rebuilds them whenever the page or its results change.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use crate::audio::AudioManager;
use crate::book::{Book, Step, StepResult, TextStep};
use crate::difficulty::Difficulty;
use crate::platform::KvStore;
use crate::progress::BookProgress;
use crate::settings::Settings;
use crate::sim::{
    FrameHandle, GameEvent, MosquitoDefenseGame, StealthPourGame, TapOutcome, TapTimingGame,
};

/// Passive text step, completed by marking it read
#[derive(Debug, Clone)]
pub struct TextStepView {
    pub step: TextStep,
    completed: Option<StepResult>,
    pending: Option<StepResult>,
}

impl TextStepView {
    pub fn new(step: TextStep) -> Self {
        Self {
            step,
            completed: None,
            pending: None,
        }
    }

    pub fn with_existing(mut self, existing: Option<&StepResult>) -> Self {
        if let Some(result) = existing.filter(|r| r.is_success()) {
            self.completed = Some(result.clone());
        }
        self
    }

    pub fn is_complete(&self) -> bool {
        self.completed.is_some()
    }

    /// Plain success, no score or metadata
    pub fn mark_read(&mut self) -> bool {
        if self.is_complete() {
            return false;
        }
        let result = StepResult::success(self.step.id.clone());
        self.completed = Some(result.clone());
        self.pending = Some(result);
        true
    }

    pub fn take_completion(&mut self) -> Option<StepResult> {
        self.pending.take()
    }
}

/// Engine mounted for one step
#[derive(Debug, Clone)]
pub enum StepEngine {
    Text(TextStepView),
    TapTiming(TapTimingGame),
    StealthPour(StealthPourGame),
    MosquitoDefense(MosquitoDefenseGame),
}

impl StepEngine {
    /// Build the engine for `step`. A successful `existing` result mounts it
    /// completed. Stealth steps start watching on mount.
    pub fn for_step(
        step: &Step,
        existing: Option<&StepResult>,
        settings: &Settings,
        seed: u64,
    ) -> Self {
        match step {
            Step::Text(s) => StepEngine::Text(TextStepView::new(s.clone()).with_existing(existing)),
            Step::TapTiming(s) => StepEngine::TapTiming(
                TapTimingGame::new(s.clone(), settings.tap_difficulty, seed).with_existing(existing),
            ),
            Step::StealthPour(s) => {
                let mut game = StealthPourGame::new(s.clone(), seed).with_existing(existing);
                game.start();
                StepEngine::StealthPour(game)
            }
            Step::MosquitoDefense(s) => StepEngine::MosquitoDefense(
                MosquitoDefenseGame::new(s.clone(), settings.defense_difficulty, seed)
                    .with_existing(existing),
            ),
        }
    }

    pub fn step_id(&self) -> &str {
        match self {
            StepEngine::Text(v) => &v.step.id,
            StepEngine::TapTiming(g) => &g.step.id,
            StepEngine::StealthPour(g) => &g.step.id,
            StepEngine::MosquitoDefense(g) => &g.step.id,
        }
    }

    pub fn is_complete(&self) -> bool {
        match self {
            StepEngine::Text(v) => v.is_complete(),
            StepEngine::TapTiming(g) => g.is_complete(),
            StepEngine::StealthPour(g) => g.is_complete(),
            StepEngine::MosquitoDefense(g) => g.is_complete(),
        }
    }

    /// Active frame loop, if any
    pub fn frame_handle(&self) -> Option<FrameHandle> {
        match self {
            StepEngine::Text(_) => None,
            StepEngine::TapTiming(g) => g.frame_handle(),
            StepEngine::StealthPour(g) => g.frame_handle(),
            StepEngine::MosquitoDefense(g) => g.frame_handle(),
        }
    }

    /// Deliver a host frame to the active loop
    pub fn frame(&mut self, now_ms: f64) -> bool {
        let Some(handle) = self.frame_handle() else {
            return false;
        };
        match self {
            StepEngine::Text(_) => false,
            StepEngine::TapTiming(g) => g.frame(handle, now_ms),
            StepEngine::StealthPour(g) => g.frame(handle, now_ms),
            StepEngine::MosquitoDefense(g) => g.frame(handle, now_ms),
        }
    }

    /// Advance simulation time directly, bypassing the frame clock
    pub fn advance(&mut self, delta_ms: f64) {
        match self {
            StepEngine::Text(_) => {}
            StepEngine::TapTiming(g) => g.advance(delta_ms),
            StepEngine::StealthPour(g) => g.advance(delta_ms),
            StepEngine::MosquitoDefense(g) => g.advance(delta_ms),
        }
    }

    pub fn take_completion(&mut self) -> Option<StepResult> {
        match self {
            StepEngine::Text(v) => v.take_completion(),
            StepEngine::TapTiming(g) => g.take_completion(),
            StepEngine::StealthPour(g) => g.take_completion(),
            StepEngine::MosquitoDefense(g) => g.take_completion(),
        }
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        match self {
            StepEngine::Text(_) => Vec::new(),
            StepEngine::TapTiming(g) => g.drain_events(),
            StepEngine::StealthPour(g) => g.drain_events(),
            StepEngine::MosquitoDefense(g) => g.drain_events(),
        }
    }

    pub fn feedback(&self) -> Option<&str> {
        match self {
            StepEngine::Text(_) => None,
            StepEngine::TapTiming(g) => g.feedback.as_deref(),
            StepEngine::StealthPour(g) => g.feedback.as_deref(),
            StepEngine::MosquitoDefense(g) => g.feedback.as_deref(),
        }
    }

    pub fn start(&mut self) {
        match self {
            StepEngine::Text(_) => {}
            StepEngine::TapTiming(g) => {
                g.start();
            }
            StepEngine::StealthPour(g) => {
                g.start();
            }
            StepEngine::MosquitoDefense(g) => {
                g.start();
            }
        }
    }

    /// Unmount: cancel frame loops and pending timers
    pub fn stop(&mut self) {
        match self {
            StepEngine::Text(_) => {}
            StepEngine::TapTiming(g) => g.stop(),
            StepEngine::StealthPour(g) => g.stop(),
            StepEngine::MosquitoDefense(g) => g.stop(),
        }
    }

    pub fn set_difficulty(&mut self, difficulty: Difficulty) {
        match self {
            StepEngine::TapTiming(g) => g.set_difficulty(difficulty),
            StepEngine::MosquitoDefense(g) => g.set_difficulty(difficulty),
            StepEngine::Text(_) | StepEngine::StealthPour(_) => {}
        }
    }

    pub fn set_arena(&mut self, width: f64, height: f64) {
        if let StepEngine::MosquitoDefense(g) = self {
            g.set_arena(width, height);
        }
    }
}

/// One reader's session in a book: progress plus the current page's engines
pub struct BookSession<S> {
    progress: BookProgress<S>,
    engines: Vec<StepEngine>,
    settings: Settings,
    audio: AudioManager,
    arena: Option<(f64, f64)>,
    rng: Pcg32,
}

impl<S: KvStore> BookSession<S> {
    /// Load stored progress and mount the current page
    pub fn open(book: Book, store: S, settings: Settings) -> Self {
        Self::with_seed(book, store, settings, rand::random::<u64>())
    }

    /// Same as `open` with a fixed seed for every engine's RNG
    pub fn with_seed(book: Book, store: S, settings: Settings, seed: u64) -> Self {
        log::info!("opening book {} ({} pages)", book.id, book.page_count());
        let mut session = Self {
            progress: BookProgress::open(book, store),
            engines: Vec::new(),
            audio: AudioManager::from_settings(&settings),
            settings,
            arena: None,
            rng: Pcg32::seed_from_u64(seed),
        };
        session.mount_page();
        session
    }

    pub fn progress(&self) -> &BookProgress<S> {
        &self.progress
    }

    pub fn book(&self) -> &Book {
        self.progress.book()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: Settings) {
        self.audio.apply_settings(&settings);
        self.settings = settings;
    }

    pub fn engines(&self) -> &[StepEngine] {
        &self.engines
    }

    pub fn engine(&self, step_id: &str) -> Option<&StepEngine> {
        self.engines.iter().find(|e| e.step_id() == step_id)
    }

    pub fn engine_mut(&mut self, step_id: &str) -> Option<&mut StepEngine> {
        self.engines.iter_mut().find(|e| e.step_id() == step_id)
    }

    pub fn arena(&self) -> Option<(f64, f64)> {
        self.arena
    }

    /// Measured arena size for defense steps (kept across remounts)
    pub fn set_arena(&mut self, width: f64, height: f64) {
        self.arena = Some((width, height));
        for engine in &mut self.engines {
            engine.set_arena(width, height);
        }
    }

    /// Deliver a host frame to every running engine
    pub fn frame(&mut self, now_ms: f64) -> Vec<(String, GameEvent)> {
        let mut events = Vec::new();
        for index in 0..self.engines.len() {
            self.engines[index].frame(now_ms);
            events.extend(self.settle(index));
        }
        events
    }

    /// Run `f` against a step's engine, then record what came out of it
    fn with_engine<T>(
        &mut self,
        step_id: &str,
        f: impl FnOnce(&mut StepEngine) -> T,
    ) -> Option<T> {
        let index = self.engines.iter().position(|e| e.step_id() == step_id)?;
        let out = f(&mut self.engines[index]);
        self.settle(index);
        Some(out)
    }

    /// Sounds for new events, completions into progress
    fn settle(&mut self, index: usize) -> Vec<(String, GameEvent)> {
        let engine = &mut self.engines[index];
        let step_id = engine.step_id().to_owned();
        let events = engine.drain_events();
        let completion = engine.take_completion();

        for event in &events {
            self.audio.play_event(event);
        }
        if let Some(result) = completion {
            log::info!("step {step_id} complete (score {:?})", result.score);
            self.progress.set_step_result(result);
        }
        events.into_iter().map(|e| (step_id.clone(), e)).collect()
    }

    pub fn start(&mut self, step_id: &str) -> bool {
        self.with_engine(step_id, StepEngine::start).is_some()
    }

    pub fn stop(&mut self, step_id: &str) -> bool {
        self.with_engine(step_id, StepEngine::stop).is_some()
    }

    pub fn tap(&mut self, step_id: &str) -> TapOutcome {
        self.with_engine(step_id, |engine| match engine {
            StepEngine::TapTiming(g) => g.tap(),
            _ => TapOutcome::Ignored,
        })
        .unwrap_or(TapOutcome::Ignored)
    }

    pub fn hold_start(&mut self, step_id: &str) -> bool {
        self.with_engine(step_id, |engine| match engine {
            StepEngine::StealthPour(g) => g.hold_start(),
            _ => false,
        })
        .unwrap_or(false)
    }

    pub fn hold_end(&mut self, step_id: &str) {
        self.with_engine(step_id, |engine| {
            if let StepEngine::StealthPour(g) = engine {
                g.hold_end();
            }
        });
    }

    pub fn squash(&mut self, step_id: &str, mosquito_id: u32) -> bool {
        self.with_engine(step_id, |engine| match engine {
            StepEngine::MosquitoDefense(g) => g.squash(mosquito_id),
            _ => false,
        })
        .unwrap_or(false)
    }

    pub fn mark_read(&mut self, step_id: &str) -> bool {
        self.with_engine(step_id, |engine| match engine {
            StepEngine::Text(v) => v.mark_read(),
            _ => false,
        })
        .unwrap_or(false)
    }

    pub fn set_difficulty(&mut self, step_id: &str, difficulty: Difficulty) -> bool {
        self.with_engine(step_id, |engine| engine.set_difficulty(difficulty))
            .is_some()
    }

    /// Forget one step's result, on any page, and remount its engine fresh
    /// if it is on the current page. False when there was nothing to reset.
    pub fn reset_step(&mut self, step_id: &str) -> bool {
        let cleared = self.progress.clear_step_result(step_id);
        let mounted = self.engines.iter().position(|e| e.step_id() == step_id);
        if let Some(index) = mounted {
            self.engines[index].stop();
            if let Some(engine) = self.build_engine(step_id) {
                self.engines[index] = engine;
            }
        }
        if cleared || mounted.is_some() {
            log::debug!("step {step_id} reset");
        }
        cleared || mounted.is_some()
    }

    pub fn go_next(&mut self) -> bool {
        self.navigate(BookProgress::go_next)
    }

    pub fn go_prev(&mut self) -> bool {
        self.navigate(BookProgress::go_prev)
    }

    pub fn skip(&mut self) -> bool {
        self.navigate(BookProgress::skip)
    }

    /// Clear the current page's results and remount it
    pub fn retry_page(&mut self) {
        self.progress.retry_page();
        self.mount_page();
    }

    pub fn reset_progress(&mut self) {
        self.progress.reset_progress();
        self.mount_page();
    }

    fn navigate(&mut self, mv: impl FnOnce(&mut BookProgress<S>) -> bool) -> bool {
        let moved = mv(&mut self.progress);
        if moved {
            self.mount_page();
        }
        moved
    }

    fn build_engine(&mut self, step_id: &str) -> Option<StepEngine> {
        let seed = self.rng.random::<u64>();
        let step = self.progress.book().find_step(step_id)?;
        let mut engine =
            StepEngine::for_step(step, self.progress.result(step_id), &self.settings, seed);
        if let Some((width, height)) = self.arena {
            engine.set_arena(width, height);
        }
        Some(engine)
    }

    /// Tear down the mounted engines and mount the current page's steps
    fn mount_page(&mut self) {
        for engine in &mut self.engines {
            engine.stop();
        }
        let ids: Vec<String> = self
            .progress
            .current_page()
            .map(|page| page.steps.iter().map(|s| s.id().to_owned()).collect())
            .unwrap_or_default();
        let engines: Vec<StepEngine> = ids.iter().filter_map(|id| self.build_engine(id)).collect();
        self.engines = engines;
        log::debug!(
            "mounted page {} ({} steps)",
            self.progress.current_page_index(),
            self.engines.len()
        );
    }
}
