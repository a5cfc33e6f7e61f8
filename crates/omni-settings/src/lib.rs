//! # omni-settings
//!
//! Configuration for the relay, loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`RelaySettings::default()`]
//! 2. **Settings file**: `~/.omni/relay.json` or an explicit path (deep-merged over defaults)
//! 3. **Environment variables**: `RABBITMQ_URL` and `OMNI_*` overrides (highest priority)
//!
//! Settings are an explicit value passed to whoever needs them; there is no
//! process-global instance.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_overrides, deep_merge, load_settings, load_settings_from_path, load_settings_with,
    settings_path,
};
pub use types::*;
