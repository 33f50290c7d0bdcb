//! # copaw-settings
//!
//! Configuration management with layered sources for the CoPaw engine.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults** — [`CopawSettings::default()`]
//! 2. **User file** — `~/.copaw/settings.json` (deep-merged over defaults)
//! 3. **Environment variables** — `COPAW_*` overrides (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::{CompactionSettings, CopawSettings};

use std::sync::OnceLock;

/// Global settings singleton.
///
/// Initialized on first access via [`get_settings`]. The settings are loaded
/// from `~/.copaw/settings.json` with env var overrides, or fall back to
/// compiled defaults if loading fails.
static SETTINGS: OnceLock<CopawSettings> = OnceLock::new();

/// Get the global settings instance.
///
/// On first call, loads settings from `~/.copaw/settings.json` with env var
/// overrides. On subsequent calls, returns the cached value. If loading
/// fails, returns compiled defaults.
pub fn get_settings() -> &'static CopawSettings {
    SETTINGS.get_or_init(|| load_settings().unwrap_or_default())
}

/// Initialize the global settings with a specific value.
///
/// # Errors
///
/// Returns the provided settings back if the global was already initialized.
pub fn init_settings(settings: CopawSettings) -> std::result::Result<(), CopawSettings> {
    SETTINGS.set(settings)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
