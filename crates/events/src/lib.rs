//! Event/command abstractions and event distribution.

pub mod bus;
pub mod command;
pub mod envelope;
pub mod event;
pub mod handler;
pub mod in_memory_bus;
pub mod tenant;

pub use bus::{EventBus, Subscription};
pub use command::Command;
pub use envelope::{CausationMetadata, EventEnvelope};
pub use event::Event;
pub use handler::{execute, replay};
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use tenant::TenantScoped;
