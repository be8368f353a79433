//! Domain types and models

pub mod batch;
pub mod charge;
pub mod outcome;
pub mod work_item;

pub use batch::{BatchResult, ReconciliationFailure};
pub use charge::{ChargeRequest, ProviderResponse, TransportError};
pub use outcome::{CallOutcome, ItemReport, OutcomeKind, ReconciliationAction};
pub use work_item::{WorkItem, WorkItemId};
