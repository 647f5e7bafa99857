//! Deterministic, IO-free helpers around the [`Aggregate`] lifecycle.
//!
//! These are what unit tests use to drive aggregates without a store. The
//! dispatcher in `pinkparrot-infra` runs the same two steps with persistence
//! in between.
//!
//! ## Decide, then evolve
//!
//! Every state change goes through two separate steps:
//!
//! 1. `handle(&self, command)` validates the command against current state and
//!    returns the events it implies. It never mutates, so a rejected command
//!    leaves the aggregate exactly as it was.
//! 2. `apply(&mut self, event, version)` folds one event. It never fails; the
//!    decision already happened in step 1.
//!
//! Because `apply` is the only mutation, replaying a recorded history with
//! [`replay`] reproduces the state that decided it. The aggregate tests check
//! that property against live state driven by [`execute`].
//!
//! ## Versions
//!
//! A version belongs to a command, not to an event. All events decided by one
//! command are applied at the same version, matching the single
//! `stream_version` the store assigns to a committed batch.

use pinkparrot_core::Aggregate;

/// Execute an aggregate command in memory.
///
/// 1. **Decide**: `aggregate.handle(command)` (pure, no mutation)
/// 2. **Evolve**: fold each decided event at the next version
///
/// A successful command bumps the version by exactly one, no matter how many
/// events it produced. A command that decides no events leaves the version
/// untouched.
pub fn execute<A>(aggregate: &mut A, command: &A::Command) -> Result<Vec<A::Event>, A::Error>
where
    A: Aggregate,
{
    let events = aggregate.handle(command)?;
    if events.is_empty() {
        return Ok(events);
    }

    let next = aggregate.version() + 1;
    for ev in &events {
        aggregate.apply(ev, next);
    }
    Ok(events)
}

/// Rebuild state by folding `(stream_version, event)` pairs in stream order.
pub fn replay<'a, A>(aggregate: &mut A, history: impl IntoIterator<Item = (u64, &'a A::Event)>)
where
    A: Aggregate,
    A::Event: 'a,
{
    for (version, ev) in history {
        aggregate.apply(ev, version);
    }
}
