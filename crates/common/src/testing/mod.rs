//! Testing utilities and helpers
//!
//! - **[`async_utils`]**: bounded waits and polling for async tests
//! - **[`concurrency`]**: gauge that records how many operations overlap
//!
//! ## Usage
//!
//! ```rust
//! # #[cfg(feature = "test-utils")]
//! # {
//! use paysched_common::testing::ConcurrencyGauge;
//!
//! let gauge = ConcurrencyGauge::new();
//! {
//!     let _guard = gauge.enter();
//!     assert_eq!(gauge.current(), 1);
//! }
//! assert_eq!(gauge.peak(), 1);
//! # }
//! ```

pub mod async_utils;
pub mod concurrency;

pub use async_utils::{poll_until, timeout_ok};
pub use concurrency::{ConcurrencyGauge, GaugeGuard};
