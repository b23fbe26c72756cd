//! Feedback tones
//!
//! Short oscillator blips generated on the fly, no audio files. On wasm32 they
//! go through the Web Audio API; native builds only log them. Audio never
//! affects game state: every failure is swallowed.

use crate::settings::Settings;
use crate::sim::GameEvent;

/// Sound effect types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundEffect {
    /// Tap inside the target zone
    TapHit,
    /// Tap outside the target zone
    TapMiss,
    /// Caught pouring while watched
    Spotted,
    /// Mosquito reached the center
    CenterHit,
    /// Mosquito squashed
    Squash,
    /// Any step finished
    StepComplete,
}

/// Oscillator shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wave {
    Sine,
    Square,
    Triangle,
}

/// A single fixed-pitch blip
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub frequency_hz: f32,
    pub duration_ms: f32,
    pub wave: Wave,
    /// Peak gain before volume scaling
    pub gain: f32,
}

impl SoundEffect {
    /// Cue for an engine event, if it has one
    pub fn for_event(event: &GameEvent) -> Option<Self> {
        match event {
            GameEvent::TapHit { .. } => Some(SoundEffect::TapHit),
            GameEvent::TapMiss { .. } => Some(SoundEffect::TapMiss),
            GameEvent::Spotted { .. } => Some(SoundEffect::Spotted),
            GameEvent::CenterHit { .. } => Some(SoundEffect::CenterHit),
            GameEvent::Squashed { .. } => Some(SoundEffect::Squash),
            GameEvent::Completed => Some(SoundEffect::StepComplete),
            GameEvent::PhaseChanged(_) | GameEvent::Spawned { .. } | GameEvent::Overrun { .. } => {
                None
            }
        }
    }

    pub fn tone(&self) -> Tone {
        let (frequency_hz, duration_ms, wave) = match self {
            SoundEffect::TapHit => (660.0, 90.0, Wave::Sine),
            SoundEffect::TapMiss => (220.0, 140.0, Wave::Triangle),
            SoundEffect::Spotted => (140.0, 260.0, Wave::Square),
            SoundEffect::CenterHit => (180.0, 120.0, Wave::Square),
            SoundEffect::Squash => (520.0, 80.0, Wave::Square),
            SoundEffect::StepComplete => (880.0, 220.0, Wave::Sine),
        };
        Tone {
            frequency_hz,
            duration_ms,
            wave,
            gain: 0.08,
        }
    }
}

/// Plays feedback tones at the configured volume
pub struct AudioManager {
    #[cfg(target_arch = "wasm32")]
    ctx: Option<web_sys::AudioContext>,
    master_volume: f32,
    sfx_volume: f32,
    muted: bool,
}

impl Default for AudioManager {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioManager {
    /// The context is created lazily on first play (browsers want a gesture first)
    pub fn new() -> Self {
        Self {
            #[cfg(target_arch = "wasm32")]
            ctx: None,
            master_volume: 0.8,
            sfx_volume: 1.0,
            muted: false,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let mut audio = Self::new();
        audio.apply_settings(settings);
        audio
    }

    pub fn apply_settings(&mut self, settings: &Settings) {
        self.set_master_volume(settings.master_volume);
        self.set_sfx_volume(settings.sfx_volume);
        self.set_muted(!settings.sound_enabled);
    }

    /// Set master volume (0.0 - 1.0)
    pub fn set_master_volume(&mut self, vol: f32) {
        self.master_volume = vol.clamp(0.0, 1.0);
    }

    /// Set SFX volume (0.0 - 1.0)
    pub fn set_sfx_volume(&mut self, vol: f32) {
        self.sfx_volume = vol.clamp(0.0, 1.0);
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    pub fn effective_volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.master_volume * self.sfx_volume
        }
    }

    /// Play the cue for an engine event, if any
    pub fn play_event(&mut self, event: &GameEvent) {
        if let Some(effect) = SoundEffect::for_event(event) {
            self.play(effect);
        }
    }

    /// Play a sound effect
    pub fn play(&mut self, effect: SoundEffect) {
        let vol = self.effective_volume();
        if vol <= 0.0 {
            return;
        }
        self.play_tone(effect.tone(), vol);
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn play_tone(&mut self, tone: Tone, vol: f32) {
        log::trace!(
            "tone {} Hz for {} ms at {:.2}",
            tone.frequency_hz,
            tone.duration_ms,
            vol
        );
    }

    #[cfg(target_arch = "wasm32")]
    fn play_tone(&mut self, tone: Tone, vol: f32) {
        use web_sys::{AudioContext, AudioContextState};

        if self.ctx.is_none() {
            self.ctx = AudioContext::new().ok();
            if self.ctx.is_none() {
                log::warn!("Failed to create AudioContext - audio disabled");
                self.muted = true;
                return;
            }
        }
        let Some(ctx) = &self.ctx else { return };

        // Resume context if suspended (browsers require user gesture)
        if ctx.state() == AudioContextState::Suspended {
            let _ = ctx.resume();
        }

        let Some((osc, gain)) = create_osc(ctx, tone.frequency_hz, tone.wave) else {
            return;
        };
        let t = ctx.current_time();
        gain.gain().set_value_at_time(tone.gain * vol, t).ok();
        osc.start().ok();
        osc.stop_with_when(t + f64::from(tone.duration_ms) / 1000.0).ok();
    }
}

/// Create an oscillator routed through a gain node
#[cfg(target_arch = "wasm32")]
fn create_osc(
    ctx: &web_sys::AudioContext,
    freq: f32,
    wave: Wave,
) -> Option<(web_sys::OscillatorNode, web_sys::GainNode)> {
    use web_sys::OscillatorType;

    let osc = ctx.create_oscillator().ok()?;
    let gain = ctx.create_gain().ok()?;

    osc.set_type(match wave {
        Wave::Sine => OscillatorType::Sine,
        Wave::Square => OscillatorType::Square,
        Wave::Triangle => OscillatorType::Triangle,
    });
    osc.frequency().set_value(freq);
    osc.connect_with_audio_node(&gain).ok()?;
    gain.connect_with_audio_node(&ctx.destination()).ok()?;

    Some((osc, gain))
}
