//! # paysched daemon
//!
//! Process wiring for the scheduled payment runner: logging, configuration,
//! the application context and shutdown.

pub mod context;
pub mod logging;

pub use context::AppContext;
pub use logging::LogFormat;
