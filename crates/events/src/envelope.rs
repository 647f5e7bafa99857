use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use pinkparrot_core::{AggregateId, TenantId, UserId};

/// Causation metadata attached to every committed event.
///
/// All events produced by one dispatched command share the same `causation_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CausationMetadata {
    pub causation_id: Uuid,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Envelope for a committed event, handed to the projection side.
///
/// - **Multi-tenancy** is carried via `tenant_id`.
/// - `sequence_number` is the event's position in its stream (1, 2, 3, ...).
/// - `stream_version` is the version token of the batch the event belongs to;
///   it grows by one per command, not per event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    tenant_id: TenantId,

    aggregate_id: AggregateId,
    aggregate_type: String,

    sequence_number: u64,
    stream_version: u64,

    event_type: String,
    metadata: CausationMetadata,

    payload: E,
}

impl<E> EventEnvelope<E> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        event_id: Uuid,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        sequence_number: u64,
        stream_version: u64,
        event_type: impl Into<String>,
        metadata: CausationMetadata,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            tenant_id,
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            sequence_number,
            stream_version,
            event_type: event_type.into(),
            metadata,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn aggregate_id(&self) -> AggregateId {
        self.aggregate_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn stream_version(&self) -> u64 {
        self.stream_version
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn metadata(&self) -> &CausationMetadata {
        &self.metadata
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}
