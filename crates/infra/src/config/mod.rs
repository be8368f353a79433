//! Configuration loading and management
//!
//! Layers environment variables over an optional TOML/JSON file and
//! validates the result before anything is started.

pub mod loader;

// Re-export commonly used items
pub use loader::{
    apply_env_overrides, load, load_from_env, load_from_file, probe_config_paths, validate,
};
