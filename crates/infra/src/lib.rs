//! Infrastructure layer: event store, command dispatcher.
//!
//! Domain crates stay pure; this crate owns every side effect of the write
//! path (stream loads, conditional appends, publication to the bus).

pub mod command_dispatcher;
pub mod event_store;


pub use command_dispatcher::{
    AggregateRegistration, CmsCommand, CommandDispatcher, DispatchError, DispatchOutcome, Registry,
    SchemaBound,
};
pub use event_store::{
    EventStore, EventStoreError, InMemoryEventStore, StoredEvent, UncommittedEvent,
};
