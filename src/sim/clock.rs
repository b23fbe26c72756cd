//! Frame clock
//!
//! Turns host frame timestamps into simulation deltas. Every `start` opens a
//! new lifecycle; handles from an older lifecycle are rejected so a frame
//! callback scheduled before a stop/reset can never touch fresh state.

use crate::consts::MAX_FRAME_DELTA_MS;

/// Token identifying one lifecycle of a frame loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle {
    generation: u64,
}

/// Per-engine frame driver state
#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    generation: u64,
    running: bool,
    last_frame_ms: Option<f64>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a new lifecycle, invalidating any outstanding handle
    pub fn start(&mut self) -> FrameHandle {
        self.stop();
        self.running = true;
        FrameHandle {
            generation: self.generation,
        }
    }

    /// Halt frame delivery; the next `start` begins with a zero delta
    pub fn stop(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.running = false;
        self.last_frame_ms = None;
    }

    /// Cancel `handle` if it is the live one (host teardown)
    pub fn cancel(&mut self, handle: FrameHandle) -> bool {
        if self.is_current(handle) {
            self.stop();
            true
        } else {
            false
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Handle for the live lifecycle, if any
    pub fn handle(&self) -> Option<FrameHandle> {
        self.running.then_some(FrameHandle {
            generation: self.generation,
        })
    }

    pub fn is_current(&self, handle: FrameHandle) -> bool {
        self.running && handle.generation == self.generation
    }

    /// Deliver a frame at `now_ms`; returns the delta since the previous frame
    ///
    /// The first frame of a lifecycle has a zero delta and every delta is
    /// capped at [`MAX_FRAME_DELTA_MS`], so a suspended tab resumes where it
    /// left off. Stale handles and stopped clocks yield `None`.
    pub fn frame(&mut self, handle: FrameHandle, now_ms: f64) -> Option<f64> {
        if !self.is_current(handle) {
            return None;
        }
        let last = self.last_frame_ms.unwrap_or(now_ms);
        self.last_frame_ms = Some(now_ms);
        Some((now_ms - last).clamp(0.0, MAX_FRAME_DELTA_MS))
    }
}
