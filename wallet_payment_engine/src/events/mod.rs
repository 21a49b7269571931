//! Ledger and reconciliation events.
//!
//! The engine APIs publish an event after every committed ledger entry and after every anomaly they record.
//! Subscribers register async callbacks through [`EventHooks`]; each callback runs on its own task and cannot affect
//! the operation that triggered it.
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
