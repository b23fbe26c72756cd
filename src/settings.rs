//! Player settings and preferences
//!
//! Persisted separately from book progress, through the same key-value store.

use serde::{Deserialize, Serialize};

use crate::difficulty::Difficulty;
use crate::platform::{KvStore, StorageError};

/// Player settings/preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    // === Difficulty ===
    /// Initial tier for tap-timing steps
    pub tap_difficulty: Difficulty,
    /// Initial tier for mosquito-defense steps
    pub defense_difficulty: Difficulty,

    // === Audio ===
    pub sound_enabled: bool,
    /// Master volume (0.0 - 1.0)
    pub master_volume: f32,
    /// Sound effects volume (0.0 - 1.0)
    pub sfx_volume: f32,

    // === Accessibility ===
    /// Reduced motion (no hit flashes)
    pub reduced_motion: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tap_difficulty: Difficulty::Medium,
            defense_difficulty: Difficulty::Medium,

            sound_enabled: true,
            master_volume: 0.8,
            sfx_volume: 1.0,

            reduced_motion: false,
        }
    }
}

impl Settings {
    /// Storage key
    pub const STORAGE_KEY: &'static str = "interactive_book_settings";

    /// Whether hosts should draw the center-hit flash
    pub fn effective_hit_flash(&self) -> bool {
        !self.reduced_motion
    }

    /// Stored settings, or defaults if absent or unreadable
    pub fn load(store: &impl KvStore) -> Self {
        match store.get(Self::STORAGE_KEY) {
            Ok(Some(json)) => match serde_json::from_str(&json) {
                Ok(settings) => {
                    log::info!("Loaded settings");
                    settings
                }
                Err(e) => {
                    log::warn!("Ignoring unreadable settings: {e}");
                    Self::default()
                }
            },
            Ok(None) => {
                log::info!("Using default settings");
                Self::default()
            }
            Err(e) => {
                log::warn!("Failed to read settings: {e}");
                Self::default()
            }
        }
    }

    pub fn save(&self, store: &mut impl KvStore) -> Result<(), StorageError> {
        let json = serde_json::to_string(self)?;
        store.set(Self::STORAGE_KEY, &json)?;
        log::info!("Settings saved");
        Ok(())
    }
}
