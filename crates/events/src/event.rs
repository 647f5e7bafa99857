use chrono::{DateTime, Utc};

use pinkparrot_core::UserId;

/// A domain event.
///
/// Events are:
/// - **immutable** facts about what changed
/// - **versioned** (payload schema evolution)
/// - the unit of persistence, appended to a stream and never rewritten
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name (e.g. "cms.content.published").
    fn event_type(&self) -> &'static str;

    /// Payload schema version for this event type.
    fn version(&self) -> u32;

    /// When the producing command was issued (business time).
    fn occurred_at(&self) -> DateTime<Utc>;

    /// Who issued the producing command.
    fn actor(&self) -> UserId;
}
