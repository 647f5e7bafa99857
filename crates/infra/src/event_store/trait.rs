use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use pinkparrot_core::{AggregateId, ExpectedVersion, TenantId};
use pinkparrot_events::{CausationMetadata, EventEnvelope, TenantScoped};

/// An event decided by an aggregate, ready to be appended to its stream.
///
/// The store assigns `sequence_number` and `stream_version` during append;
/// everything else is fixed by the dispatcher.
///
/// Lifecycle:
///
/// 1. **Domain event**: returned by the aggregate's `handle()`
/// 2. **UncommittedEvent**: serialized, wrapped with stream and causation metadata
/// 3. **StoredEvent**: persisted with its stream position
/// 4. **EventEnvelope**: published to the bus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedEvent {
    pub event_id: Uuid,
    pub tenant_id: TenantId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    pub event_type: String,
    pub event_version: u32,
    pub metadata: CausationMetadata,

    pub payload: JsonValue,
}

impl UncommittedEvent {
    /// Build an uncommitted event from a typed domain event.
    ///
    /// `metadata` is shared by every event of the same command; the actor and
    /// timestamp come from the command, not from the wall clock.
    pub fn from_typed<E>(
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        metadata: CausationMetadata,
        event: &E,
    ) -> Result<Self, EventStoreError>
    where
        E: pinkparrot_events::Event + Serialize,
    {
        let payload = serde_json::to_value(event)
            .map_err(|e| EventStoreError::InvalidAppend(format!("payload serialization failed: {e}")))?;

        Ok(Self {
            event_id: Uuid::now_v7(),
            tenant_id,
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            metadata,
            payload,
        })
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.metadata.occurred_at
    }
}

/// A persisted event of an append-only stream.
///
/// Two positions are tracked:
///
/// - `sequence_number` numbers events within the stream (1, 2, 3, ...) with
///   no gaps.
/// - `stream_version` numbers committed batches. Every event appended by the
///   same call shares it, and it is the version token clients present back as
///   their expected version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub tenant_id: TenantId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    pub sequence_number: u64,
    pub stream_version: u64,

    pub event_type: String,
    pub event_version: u32,
    pub metadata: CausationMetadata,

    pub payload: JsonValue,
}

impl StoredEvent {
    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.metadata.occurred_at
    }

    /// Convert into a tenant-scoped envelope for publication.
    pub fn to_envelope(&self) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            self.event_id,
            self.tenant_id,
            self.aggregate_id,
            self.aggregate_type.clone(),
            self.sequence_number,
            self.stream_version,
            self.event_type.clone(),
            self.metadata,
            self.payload.clone(),
        )
    }
}

impl TenantScoped for StoredEvent {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// Event store operation error.
///
/// These are infrastructure errors. `Concurrency` and `StreamAlreadyExists`
/// are the store-level view of a failed [`ExpectedVersion`] check and are
/// translated back into domain errors by the dispatcher.
#[derive(Debug, Error)]
pub enum EventStoreError {
    #[error("optimistic concurrency check failed (expected: {expected:?}, actual: {actual})")]
    Concurrency {
        expected: ExpectedVersion,
        actual: u64,
    },

    #[error("stream already exists at version {0}")]
    StreamAlreadyExists(u64),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("aggregate type mismatch: {0}")]
    AggregateTypeMismatch(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Append-only, tenant-scoped event store.
///
/// Streams are keyed by `(tenant_id, aggregate_id)`. A stream that was never
/// appended to has version `0` and loads as an empty vector.
///
/// `append()` must:
/// - reject batches that mix tenants, aggregates or aggregate types
/// - check `expected_version` against the current stream version and append
///   in the same critical section, so concurrent appends with the same
///   expectation commit at most once
/// - stamp every event of the batch with `stream_version = current + 1` and
///   consecutive sequence numbers
/// - be atomic: all events of the batch are persisted or none are
///
/// `load_stream()` returns events in sequence order and never returns events
/// of another tenant.
pub trait EventStore: Send + Sync {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    fn load_stream(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;
}

impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).append(events, expected_version)
    }

    fn load_stream(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_stream(tenant_id, aggregate_id)
    }
}

/// Version of a loaded stream (`0` when empty).
pub fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.stream_version).unwrap_or(0)
}
