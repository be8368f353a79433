//! Charging a batch: resilient calls, per-item processing and fan-out

pub mod caller;
pub mod cancel;
pub mod dispatcher;
pub mod ports;
pub mod processor;

pub use caller::{CallResult, CallerSettings, ResilientCaller};
pub use cancel::{CancelSignal, Escalation};
pub use dispatcher::FanOutDispatcher;
pub use processor::{ItemProcessor, ProcessorSettings};
