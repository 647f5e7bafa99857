use std::collections::HashMap;
use std::sync::RwLock;

use pinkparrot_core::{AggregateId, ExpectedVersion, TenantId};

use super::r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent, stream_version};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct StreamKey {
    tenant_id: TenantId,
    aggregate_id: AggregateId,
}

/// In-memory append-only event store.
///
/// The version check and the append run under one write lock, which makes
/// appends linearizable per stream. Intended for tests and embedding.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: RwLock<HashMap<StreamKey, Vec<StoredEvent>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of streams with at least one committed batch.
    pub fn stream_count(&self) -> Result<usize, EventStoreError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::Unavailable("lock poisoned".to_string()))?;
        Ok(streams.len())
    }

    fn check_batch(events: &[UncommittedEvent]) -> Result<StreamKey, EventStoreError> {
        let first = &events[0];
        for (idx, e) in events.iter().enumerate() {
            if e.tenant_id != first.tenant_id {
                return Err(EventStoreError::TenantIsolation(format!(
                    "batch contains multiple tenant_ids (index {idx})"
                )));
            }
            if e.aggregate_id != first.aggregate_id {
                return Err(EventStoreError::InvalidAppend(format!(
                    "batch contains multiple aggregate_ids (index {idx})"
                )));
            }
            if e.aggregate_type != first.aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "batch contains multiple aggregate_types (index {idx})"
                )));
            }
        }
        Ok(StreamKey {
            tenant_id: first.tenant_id,
            aggregate_id: first.aggregate_id,
        })
    }
}

impl EventStore for InMemoryEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        if events.is_empty() {
            return Ok(vec![]);
        }

        let key = Self::check_batch(&events)?;

        let mut streams = self
            .streams
            .write()
            .map_err(|_| EventStoreError::Unavailable("lock poisoned".to_string()))?;

        let existing = streams.get(&key).map(Vec::as_slice).unwrap_or_default();
        let current = stream_version(existing);

        if !expected_version.matches(current) {
            return Err(match expected_version {
                ExpectedVersion::NoStream => EventStoreError::StreamAlreadyExists(current),
                ExpectedVersion::Exact(_) => EventStoreError::Concurrency {
                    expected: expected_version,
                    actual: current,
                },
            });
        }

        if let Some(first) = existing.first() {
            if first.aggregate_type != events[0].aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "stream aggregate_type is '{}', attempted append with '{}'",
                    first.aggregate_type, events[0].aggregate_type
                )));
            }
        }

        let version = current + 1;
        let mut sequence = existing.last().map(|e| e.sequence_number).unwrap_or(0);

        let committed: Vec<StoredEvent> = events
            .into_iter()
            .map(|e| {
                sequence += 1;
                StoredEvent {
                    event_id: e.event_id,
                    tenant_id: e.tenant_id,
                    aggregate_id: e.aggregate_id,
                    aggregate_type: e.aggregate_type,
                    sequence_number: sequence,
                    stream_version: version,
                    event_type: e.event_type,
                    event_version: e.event_version,
                    metadata: e.metadata,
                    payload: e.payload,
                }
            })
            .collect();

        streams
            .entry(key)
            .or_default()
            .extend(committed.iter().cloned());

        Ok(committed)
    }

    fn load_stream(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let key = StreamKey {
            tenant_id,
            aggregate_id,
        };

        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::Unavailable("lock poisoned".to_string()))?;

        Ok(streams.get(&key).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pinkparrot_core::UserId;
    use pinkparrot_events::CausationMetadata;
    use serde_json::json;
    use uuid::Uuid;

    fn event(tenant_id: TenantId, aggregate_id: AggregateId, event_type: &str) -> UncommittedEvent {
        UncommittedEvent {
            event_id: Uuid::now_v7(),
            tenant_id,
            aggregate_id,
            aggregate_type: "cms.content".to_string(),
            event_type: event_type.to_string(),
            event_version: 1,
            metadata: CausationMetadata {
                causation_id: Uuid::now_v7(),
                actor: UserId::new(),
                occurred_at: Utc::now(),
            },
            payload: json!({}),
        }
    }

    #[test]
    fn batch_shares_one_stream_version() {
        let store = InMemoryEventStore::new();
        let tenant = TenantId::new();
        let agg = AggregateId::new();

        let committed = store
            .append(
                vec![
                    event(tenant, agg, "cms.content.created"),
                    event(tenant, agg, "cms.content.published"),
                ],
                ExpectedVersion::NoStream,
            )
            .unwrap();

        assert_eq!(committed.len(), 2);
        assert_eq!(committed[0].sequence_number, 1);
        assert_eq!(committed[1].sequence_number, 2);
        assert!(committed.iter().all(|e| e.stream_version == 1));

        let next = store
            .append(
                vec![event(tenant, agg, "cms.content.unpublished")],
                ExpectedVersion::Exact(1),
            )
            .unwrap();
        assert_eq!(next[0].sequence_number, 3);
        assert_eq!(next[0].stream_version, 2);
    }

    #[test]
    fn no_stream_on_existing_stream_is_rejected() {
        let store = InMemoryEventStore::new();
        let tenant = TenantId::new();
        let agg = AggregateId::new();

        store
            .append(vec![event(tenant, agg, "a")], ExpectedVersion::NoStream)
            .unwrap();
        let err = store
            .append(vec![event(tenant, agg, "b")], ExpectedVersion::NoStream)
            .unwrap_err();
        assert!(matches!(err, EventStoreError::StreamAlreadyExists(1)));
    }

    #[test]
    fn stale_exact_version_is_concurrency_error() {
        let store = InMemoryEventStore::new();
        let tenant = TenantId::new();
        let agg = AggregateId::new();

        store
            .append(vec![event(tenant, agg, "a")], ExpectedVersion::NoStream)
            .unwrap();
        store
            .append(vec![event(tenant, agg, "b")], ExpectedVersion::Exact(1))
            .unwrap();

        let err = store
            .append(vec![event(tenant, agg, "c")], ExpectedVersion::Exact(1))
            .unwrap_err();
        assert!(matches!(
            err,
            EventStoreError::Concurrency {
                expected: ExpectedVersion::Exact(1),
                actual: 2
            }
        ));
        assert_eq!(store.load_stream(tenant, agg).unwrap().len(), 2);
    }

    #[test]
    fn exact_version_on_missing_stream_is_concurrency_error() {
        let store = InMemoryEventStore::new();
        let err = store
            .append(
                vec![event(TenantId::new(), AggregateId::new(), "a")],
                ExpectedVersion::Exact(3),
            )
            .unwrap_err();
        assert!(matches!(err, EventStoreError::Concurrency { actual: 0, .. }));
        assert_eq!(store.stream_count().unwrap(), 0);
    }

    #[test]
    fn mixed_tenant_batch_is_rejected() {
        let store = InMemoryEventStore::new();
        let agg = AggregateId::new();

        let err = store
            .append(
                vec![event(TenantId::new(), agg, "a"), event(TenantId::new(), agg, "b")],
                ExpectedVersion::NoStream,
            )
            .unwrap_err();
        assert!(matches!(err, EventStoreError::TenantIsolation(_)));
    }

    #[test]
    fn streams_are_tenant_scoped() {
        let store = InMemoryEventStore::new();
        let tenant_a = TenantId::new();
        let tenant_b = TenantId::new();
        let agg = AggregateId::new();

        store
            .append(vec![event(tenant_a, agg, "a")], ExpectedVersion::NoStream)
            .unwrap();

        assert!(store.load_stream(tenant_b, agg).unwrap().is_empty());
        store
            .append(vec![event(tenant_b, agg, "a")], ExpectedVersion::NoStream)
            .unwrap();
        assert_eq!(store.stream_count().unwrap(), 2);
    }

    #[test]
    fn aggregate_type_is_stable_per_stream() {
        let store = InMemoryEventStore::new();
        let tenant = TenantId::new();
        let agg = AggregateId::new();

        store
            .append(vec![event(tenant, agg, "a")], ExpectedVersion::NoStream)
            .unwrap();

        let mut other = event(tenant, agg, "b");
        other.aggregate_type = "cms.schema".to_string();
        let err = store.append(vec![other], ExpectedVersion::Exact(1)).unwrap_err();
        assert!(matches!(err, EventStoreError::AggregateTypeMismatch(_)));
    }
}
