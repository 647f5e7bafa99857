//! Aggregate root traits for event-sourced domain models.

use crate::error::{DomainError, DomainResult};

/// Aggregate root marker + minimal interface.
pub trait AggregateRoot {
    /// Strongly-typed aggregate identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the aggregate identifier.
    fn id(&self) -> &Self::Id;

    /// Version token of the aggregate's state.
    ///
    /// Equals the stream version of the last folded event batch; `0` means the
    /// stream does not exist yet.
    fn version(&self) -> u64;
}

/// Optimistic concurrency expectation for a stream append.
///
/// There is no "any version" variant: every append is
/// conditional.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// The stream must not exist yet (aggregate creation).
    NoStream,
    /// Require the stream to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    /// Expectation for an aggregate currently at `version` (`0` = not created).
    pub fn from_version(version: u64) -> Self {
        if version == 0 {
            ExpectedVersion::NoStream
        } else {
            ExpectedVersion::Exact(version)
        }
    }

    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::NoStream => actual == 0,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    pub fn check(self, actual: u64) -> DomainResult<()> {
        match self {
            _ if self.matches(actual) => Ok(()),
            ExpectedVersion::NoStream => Err(DomainError::already_exists(format!(
                "stream already exists at version {actual}"
            ))),
            ExpectedVersion::Exact(expected) => Err(DomainError::version_conflict(expected, actual)),
        }
    }
}

/// Aggregate execution semantics (pure, deterministic).
///
/// - **Decision logic**: `handle(&self, cmd)` returns events.
/// - **State mutation**: `apply(&mut self, event, version)` evolves state.
///
/// Aggregates must not perform IO or side effects. They should only return events
/// describing what happened.
pub trait Aggregate: AggregateRoot {
    type Command: Clone + core::fmt::Debug;
    type Event: Clone + core::fmt::Debug;
    type Error: core::fmt::Debug;

    /// Fold a single event into in-memory state.
    ///
    /// `version` is the stream version of the batch the event was committed in.
    /// All events of one batch share it, so implementations set their version
    /// to it rather than counting events.
    fn apply(&mut self, event: &Self::Event, version: u64);

    /// Decide which events to emit given the current state and a command.
    ///
    /// This must not mutate state. State evolution is done through `apply`.
    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;
}
