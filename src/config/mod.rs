//! Depot Configuration Module
//!
//! Provides per-depot configuration loaded from TOML files, replacing all
//! hardcoded planning thresholds with operator-tunable values.
//!
//! ## Loading Order
//!
//! 1. `RAILMIND_CONFIG` environment variable (path to TOML file)
//! 2. `railmind.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! Call `config::init()` once at startup, then `config::get()` anywhere:
//!
//! ```ignore
//! // In main():
//! config::init(DepotConfig::load());
//!
//! // Anywhere in the codebase:
//! let min = config::get().engine.min_trainsets;
//! ```

mod depot_config;
pub mod defaults;

pub use depot_config::*;

use std::sync::OnceLock;

/// Global depot configuration, initialized once at startup.
static DEPOT_CONFIG: OnceLock<DepotConfig> = OnceLock::new();

/// Initialize the global depot configuration.
///
/// Must be called exactly once before any calls to `get()`.
pub fn init(config: DepotConfig) {
    if DEPOT_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once — ignoring");
    }
}

/// Get a reference to the global depot configuration.
///
/// Falls back to built-in defaults when `init()` was never called, which
/// keeps library consumers and tests independent of startup order.
pub fn get() -> &'static DepotConfig {
    DEPOT_CONFIG.get_or_init(DepotConfig::default)
}

/// Check whether the config has been initialized.
pub fn is_initialized() -> bool {
    DEPOT_CONFIG.get().is_some()
}
