//! Scripted demo player
//!
//! Plays a `BookSession` the way a careful reader would: reads text, taps the
//! timing bar dead center, pours only while unobserved and squashes whatever
//! is closest to the center. Used by the native demo and integration tests.

use crate::dispatch::{BookSession, StepEngine};
use crate::platform::KvStore;
use crate::sim::{GameEvent, StealthPhase};

/// Default host frame interval (~60 Hz)
pub const FRAME_MS: f64 = 16.0;

/// Arena used when the host has not measured one
pub const DEFAULT_ARENA: (f64, f64) = (400.0, 300.0);

/// Time until a triangle-wave indicator next sits at `target_pct`
pub fn ms_until_position(elapsed_ms: f64, cycle_ms: f64, target_pct: f64) -> f64 {
    if cycle_ms <= 0.0 {
        return 0.0;
    }
    let period = cycle_ms * 2.0;
    let phase = elapsed_ms.rem_euclid(period);
    let rising = target_pct.clamp(0.0, 100.0) / 100.0 * cycle_ms;
    let falling = period - rising;
    [rising, falling, rising + period]
        .into_iter()
        .filter(|t| *t >= phase)
        .map(|t| t - phase)
        .fold(f64::INFINITY, f64::min)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Move {
    Idle,
    MarkRead,
    Start,
    TapAfter(f64),
    Hold,
    Release,
    Squash(u32),
}

fn plan(engine: &StepEngine) -> Move {
    if engine.is_complete() {
        return Move::Idle;
    }
    match engine {
        StepEngine::Text(_) => Move::MarkRead,
        StepEngine::TapTiming(g) if !g.running => Move::Start,
        StepEngine::TapTiming(g) => {
            Move::TapAfter(ms_until_position(g.elapsed_ms, g.cycle_ms(), g.target.center()))
        }
        StepEngine::StealthPour(g) if g.frame_handle().is_none() => Move::Start,
        StepEngine::StealthPour(g) => match (g.phase, g.holding) {
            (StealthPhase::Safe, false) => Move::Hold,
            (StealthPhase::Warning | StealthPhase::Unsafe, true) => Move::Release,
            _ => Move::Idle,
        },
        StepEngine::MosquitoDefense(g) if !g.running => Move::Start,
        StepEngine::MosquitoDefense(g) => {
            let center = g.arena.center();
            g.mosquitoes
                .iter()
                .min_by(|a, b| {
                    a.pos
                        .distance_squared(center)
                        .total_cmp(&b.pos.distance_squared(center))
                })
                .map_or(Move::Idle, |m| Move::Squash(m.id))
        }
    }
}

/// Frame-by-frame scripted player
#[derive(Debug, Clone)]
pub struct Autoplay {
    now_ms: f64,
    frame_ms: f64,
}

impl Default for Autoplay {
    fn default() -> Self {
        Self::new()
    }
}

impl Autoplay {
    pub fn new() -> Self {
        Self {
            now_ms: 0.0,
            frame_ms: FRAME_MS,
        }
    }

    pub fn with_frame_ms(mut self, frame_ms: f64) -> Self {
        self.frame_ms = frame_ms.max(1.0);
        self
    }

    /// Host clock of the last delivered frame
    pub fn now_ms(&self) -> f64 {
        self.now_ms
    }

    /// Act on every mounted engine, then deliver one frame
    pub fn step<S: KvStore>(&mut self, session: &mut BookSession<S>) -> Vec<(String, GameEvent)> {
        let moves: Vec<(String, Move)> = session
            .engines()
            .iter()
            .map(|e| (e.step_id().to_owned(), plan(e)))
            .collect();
        for (step_id, mv) in moves {
            apply(session, &step_id, mv);
        }
        let events = session.frame(self.now_ms);
        self.now_ms += self.frame_ms;
        events
    }

    /// Play the current page until complete or `max_ms` of frames have passed
    pub fn play_page<S: KvStore>(&mut self, session: &mut BookSession<S>, max_ms: f64) -> bool {
        if session.arena().is_none() {
            session.set_arena(DEFAULT_ARENA.0, DEFAULT_ARENA.1);
        }
        let index = session.progress().current_page_index();
        let deadline = self.now_ms + max_ms;
        while self.now_ms < deadline {
            if session.progress().is_page_complete(index) {
                break;
            }
            for (step_id, event) in self.step(session) {
                log::debug!("{step_id}: {event:?}");
            }
        }
        let complete = session.progress().is_page_complete(index);
        log::info!(
            "page {} {} at {:.0} ms",
            index,
            if complete { "complete" } else { "timed out" },
            self.now_ms
        );
        complete
    }

    /// Play every page from the current one; true if the last page completes
    pub fn play_book<S: KvStore>(
        &mut self,
        session: &mut BookSession<S>,
        max_ms_per_page: f64,
    ) -> bool {
        loop {
            if !self.play_page(session, max_ms_per_page) {
                return false;
            }
            if session.progress().is_last_page() {
                return true;
            }
            if !session.go_next() {
                return false;
            }
        }
    }
}

fn apply<S: KvStore>(session: &mut BookSession<S>, step_id: &str, mv: Move) {
    match mv {
        Move::Idle => {}
        Move::MarkRead => {
            session.mark_read(step_id);
        }
        Move::Start => {
            session.start(step_id);
        }
        Move::TapAfter(wait_ms) => {
            if let Some(engine) = session.engine_mut(step_id) {
                engine.advance(wait_ms);
            }
            session.tap(step_id);
        }
        Move::Hold => {
            session.hold_start(step_id);
        }
        Move::Release => session.hold_end(step_id),
        Move::Squash(id) => {
            session.squash(step_id, id);
        }
    }
}
