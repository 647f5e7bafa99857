//! Command execution pipeline.
//!
//! ```text
//! CmsCommand
//!   ↓
//! 1. Load the target stream (tenant-scoped) and validate it
//!   ↓
//! 2. Rehydrate the aggregate by folding the stream
//!   ↓
//! 3. Handle the command (pure decision, produces events)
//!   ↓
//! 4. Check a schema-bound payload against the referenced schema
//!   ↓
//! 5. Conditional append (expected version taken from the command)
//!   ↓
//! 6. Publish committed envelopes to the bus
//! ```
//!
//! ## Commit point
//!
//! The conditional append in step 5 is the only point at which a command takes
//! effect. Everything before it may fail and leaves no trace; nothing after it
//! can turn the command into a failure:
//!
//! - A bus that refuses an envelope is logged and reported through
//!   [`DispatchOutcome::unpublished`]. The caller still receives the new
//!   version, and the envelope can be published again from the store.
//! - [`DispatchError::is_retryable`] is true only for failures that happened
//!   before the commit and say nothing about aggregate state.
//!
//! ## Concurrency
//!
//! The dispatcher holds no per-aggregate lock. Concurrent writers of one stream
//! are serialized by the store's conditional append; the loser gets a version
//! conflict and nothing is retried.
//!
//! ## Stream identity
//!
//! Streams are keyed by `(tenant_id, aggregate_id)` alone. A stream written by
//! one aggregate type is never folded into another: loading it through the
//! wrong registration reads as not found, and creating over it reads as
//! already exists.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

use pinkparrot_contents::{Content, ContentCommand, ContentId};
use pinkparrot_core::{
    Aggregate, AggregateId, DomainError, ErrorKind, ExpectedVersion, TenantId, UserId,
};
use pinkparrot_events::{CausationMetadata, Command, Event, EventBus, EventEnvelope, TenantScoped};
use pinkparrot_schemas::{Schema, SchemaCommand, SchemaId};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent, stream_version};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Deterministic rejection decided by the domain (or its store-level twin).
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// A loaded stream contained events of another tenant or aggregate.
    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    /// A loaded stream is out of order. Repeating the command cannot help.
    #[error("corrupt event stream: {0}")]
    CorruptStream(String),

    /// A stored payload could not be decoded into the aggregate's event type.
    #[error("failed to deserialize stored event: {0}")]
    Deserialize(String),

    #[error("event store failure: {0}")]
    Store(EventStoreError),
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::Domain(e) => e.kind(),
            _ => ErrorKind::Infrastructure,
        }
    }

    /// Whether repeating the same command may succeed without the caller
    /// refreshing its view of the aggregate.
    ///
    /// Only a store that was unreachable before the commit qualifies. Every
    /// other failure is either a decision about state or a defect in the data.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DispatchError::Store(EventStoreError::Unavailable(_)))
    }
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency { expected, actual } => {
                let expected = match expected {
                    ExpectedVersion::Exact(v) => v,
                    ExpectedVersion::NoStream => 0,
                };
                DispatchError::Domain(DomainError::version_conflict(expected, actual))
            }
            EventStoreError::StreamAlreadyExists(version) => DispatchError::Domain(
                DomainError::already_exists(format!("stream already exists at version {version}")),
            ),
            EventStoreError::TenantIsolation(msg) => DispatchError::TenantIsolation(msg),
            other => DispatchError::Store(other),
        }
    }
}

/// Successful dispatch result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Version token to present with the next command on this aggregate.
    pub new_version: u64,
    /// Committed events, in stream order.
    pub events: Vec<StoredEvent>,
    /// Ids of committed events the bus refused. They are durable in the store.
    pub unpublished: Vec<Uuid>,
}

impl DispatchOutcome {
    pub fn is_fully_published(&self) -> bool {
        self.unpublished.is_empty()
    }
}

/// Commands whose payload is constrained by a schema.
///
/// The dispatcher checks the payload before every append, whichever entry
/// point the command came through.
pub trait SchemaBound {
    /// Referenced schema and the payload it must accept, if the command carries one.
    fn bound_payload(&self) -> Option<(SchemaId, &JsonValue)>;
}

impl SchemaBound for SchemaCommand {
    fn bound_payload(&self) -> Option<(SchemaId, &JsonValue)> {
        None
    }
}

impl SchemaBound for ContentCommand {
    fn bound_payload(&self) -> Option<(SchemaId, &JsonValue)> {
        self.data().map(|data| (self.schema_id(), data))
    }
}

/// Aggregate type name plus a factory for an empty instance.
pub struct AggregateRegistration<A> {
    aggregate_type: String,
    factory: fn(AggregateId) -> A,
}

impl<A> AggregateRegistration<A> {
    pub fn new(aggregate_type: impl Into<String>, factory: fn(AggregateId) -> A) -> Self {
        Self {
            aggregate_type: aggregate_type.into(),
            factory,
        }
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn empty(&self, id: AggregateId) -> A {
        (self.factory)(id)
    }
}

impl<A> core::fmt::Debug for AggregateRegistration<A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AggregateRegistration")
            .field("aggregate_type", &self.aggregate_type)
            .finish_non_exhaustive()
    }
}

/// Aggregates known to the dispatcher.
#[derive(Debug)]
pub struct Registry {
    schema: AggregateRegistration<Schema>,
    content: AggregateRegistration<Content>,
}

impl Registry {
    pub const SCHEMA_TYPE: &'static str = "cms.schema";
    pub const CONTENT_TYPE: &'static str = "cms.content";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema_type(mut self, aggregate_type: impl Into<String>) -> Self {
        self.schema.aggregate_type = aggregate_type.into();
        self
    }

    pub fn with_content_type(mut self, aggregate_type: impl Into<String>) -> Self {
        self.content.aggregate_type = aggregate_type.into();
        self
    }

    pub fn schema(&self) -> &AggregateRegistration<Schema> {
        &self.schema
    }

    pub fn content(&self) -> &AggregateRegistration<Content> {
        &self.content
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            schema: AggregateRegistration::new(Self::SCHEMA_TYPE, |id| Schema::empty(SchemaId::new(id))),
            content: AggregateRegistration::new(Self::CONTENT_TYPE, |id| {
                Content::empty(ContentId::new(id))
            }),
        }
    }
}

/// Every command the write side accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CmsCommand {
    Schema(SchemaCommand),
    Content(ContentCommand),
}

impl From<SchemaCommand> for CmsCommand {
    fn from(value: SchemaCommand) -> Self {
        CmsCommand::Schema(value)
    }
}

impl From<ContentCommand> for CmsCommand {
    fn from(value: ContentCommand) -> Self {
        CmsCommand::Content(value)
    }
}

impl Command for CmsCommand {
    fn tenant_id(&self) -> TenantId {
        match self {
            CmsCommand::Schema(c) => c.tenant_id(),
            CmsCommand::Content(c) => c.tenant_id(),
        }
    }

    fn target_aggregate_id(&self) -> AggregateId {
        match self {
            CmsCommand::Schema(c) => c.target_aggregate_id(),
            CmsCommand::Content(c) => c.target_aggregate_id(),
        }
    }

    fn expected_version(&self) -> ExpectedVersion {
        match self {
            CmsCommand::Schema(c) => c.expected_version(),
            CmsCommand::Content(c) => c.expected_version(),
        }
    }

    fn actor(&self) -> UserId {
        match self {
            CmsCommand::Schema(c) => c.actor(),
            CmsCommand::Content(c) => c.actor(),
        }
    }

    fn command_type(&self) -> &'static str {
        match self {
            CmsCommand::Schema(c) => c.command_type(),
            CmsCommand::Content(c) => c.command_type(),
        }
    }
}

/// Command execution engine for the schema and content aggregates.
///
/// Generic over the store and the bus so tests run against the in-memory
/// implementations and a deployment can plug in its own.
///
/// ## Responsibilities
///
/// - **Routing**: a [`CmsCommand`] picks its [`AggregateRegistration`] from the
///   [`Registry`]; [`dispatch_with`](Self::dispatch_with) takes one explicitly.
/// - **Rehydration**: the stream is loaded under the command's tenant, every
///   event is re-checked for tenant, aggregate and ordering, then folded into
///   the registration's empty instance.
/// - **Decision**: the aggregate's pure `handle` decides the events. Nothing
///   is written when it rejects the command or decides nothing.
/// - **Schema check**: a [`SchemaBound`] payload must satisfy its schema in the
///   same tenant. This runs after the decision so a stale version is reported
///   ahead of a bad payload.
/// - **Persistence**: one conditional append per command, conditioned on the
///   version the command presents. All events of the batch share one stream
///   version and one causation id.
/// - **Publication**: committed envelopes go to the bus in stream order.
///
/// ## Guarantees
///
/// - events are appended before they are published; a failed append publishes nothing
/// - a successful append always yields `Ok`, with the new version
/// - no entry point writes a schema-bound payload without checking it
///
/// ## Usage
///
/// ```ignore
/// let dispatcher = CommandDispatcher::new(store, bus, Registry::new());
/// let outcome = dispatcher.dispatch(SchemaCommand::CreateModelSchema(create).into())?;
/// assert_eq!(outcome.new_version, 1);
/// ```
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
    registry: Registry,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B, registry: Registry) -> Self {
        Self {
            store,
            bus,
            registry,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn into_parts(self) -> (S, B) {
        (self.store, self.bus)
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Route a command to its aggregate and run it through the pipeline.
    #[instrument(
        skip_all,
        fields(
            command = command.command_type(),
            tenant_id = %command.tenant_id(),
            aggregate_id = %command.target_aggregate_id(),
        )
    )]
    pub fn dispatch(&self, command: CmsCommand) -> Result<DispatchOutcome, DispatchError> {
        match command {
            CmsCommand::Schema(cmd) => self.run(&self.registry.schema, cmd),
            CmsCommand::Content(cmd) => self.run(&self.registry.content, cmd),
        }
    }

    /// Run a command against any registered aggregate type.
    ///
    /// Goes through the same pipeline as [`dispatch`](Self::dispatch),
    /// schema check included.
    pub fn dispatch_with<A>(
        &self,
        registration: &AggregateRegistration<A>,
        command: A::Command,
    ) -> Result<DispatchOutcome, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Command: Command + SchemaBound,
        A::Event: Event + Serialize + DeserializeOwned,
    {
        self.run(registration, command)
    }

    /// Load and fold an aggregate without executing anything.
    ///
    /// A missing stream yields the registration's empty instance. A stream
    /// written by another aggregate type is `NotFound`.
    pub fn load<A>(
        &self,
        registration: &AggregateRegistration<A>,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let history = self.read_stream(registration, tenant_id, aggregate_id)?;
        if let Some(found) = foreign_type(registration, &history) {
            return Err(DomainError::not_found(format!(
                "{} {aggregate_id} (stream holds {found})",
                registration.aggregate_type()
            ))
            .into());
        }
        fold(registration, aggregate_id, &history)
    }

    pub fn load_schema(&self, tenant_id: TenantId, schema_id: SchemaId) -> Result<Schema, DispatchError> {
        self.load(&self.registry.schema, tenant_id, schema_id.0)
    }

    pub fn load_content(
        &self,
        tenant_id: TenantId,
        content_id: ContentId,
    ) -> Result<Content, DispatchError> {
        self.load(&self.registry.content, tenant_id, content_id.0)
    }

    fn read_stream<A>(
        &self,
        registration: &AggregateRegistration<A>,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        let history = self.store.load_stream(tenant_id, aggregate_id)?;
        validate_loaded_stream(tenant_id, aggregate_id, &history)?;

        tracing::debug!(
            aggregate_type = registration.aggregate_type(),
            %aggregate_id,
            events = history.len(),
            version = stream_version(&history),
            "stream loaded"
        );
        Ok(history)
    }

    fn run<A>(
        &self,
        registration: &AggregateRegistration<A>,
        command: A::Command,
    ) -> Result<DispatchOutcome, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Command: Command + SchemaBound,
        A::Event: Event + Serialize + DeserializeOwned,
    {
        let tenant_id = command.tenant_id();
        let aggregate_id = command.target_aggregate_id();

        let history = self.read_stream(registration, tenant_id, aggregate_id)?;
        if let Some(found) = foreign_type(registration, &history) {
            let err = match command.expected_version() {
                ExpectedVersion::NoStream => DomainError::already_exists(format!(
                    "{aggregate_id} is taken by a {found} stream"
                )),
                ExpectedVersion::Exact(_) => DomainError::not_found(format!(
                    "{} {aggregate_id} (stream holds {found})",
                    registration.aggregate_type()
                )),
            };
            return Err(err.into());
        }
        let aggregate = fold(registration, aggregate_id, &history)?;

        let decided = aggregate.handle(&command)?;
        if decided.is_empty() {
            return Ok(DispatchOutcome {
                new_version: aggregate.version(),
                events: vec![],
                unpublished: vec![],
            });
        }

        if let Some((schema_id, data)) = command.bound_payload() {
            self.check_payload(tenant_id, schema_id, data)?;
        }

        let causation_id = Uuid::now_v7();
        let actor = command.actor();
        let uncommitted = decided
            .iter()
            .map(|ev| {
                let metadata = CausationMetadata {
                    causation_id,
                    actor,
                    occurred_at: ev.occurred_at(),
                };
                UncommittedEvent::from_typed(
                    tenant_id,
                    aggregate_id,
                    registration.aggregate_type(),
                    metadata,
                    ev,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let expected = command.expected_version();
        let committed = self.store.append(uncommitted, expected).map_err(|e| {
            if matches!(
                e,
                EventStoreError::Concurrency { .. } | EventStoreError::StreamAlreadyExists(_)
            ) {
                tracing::warn!(
                    aggregate_type = registration.aggregate_type(),
                    %aggregate_id,
                    ?expected,
                    error = %e,
                    "conditional append rejected"
                );
            }
            DispatchError::from(e)
        })?;

        let new_version = stream_version(&committed);

        tracing::info!(
            aggregate_type = registration.aggregate_type(),
            %aggregate_id,
            new_version,
            events = committed.len(),
            %causation_id,
            "events committed"
        );

        let mut unpublished = Vec::new();
        for stored in &committed {
            if let Err(e) = self.bus.publish(stored.to_envelope()) {
                tracing::error!(
                    event_id = %stored.event_id,
                    event_type = %stored.event_type,
                    %aggregate_id,
                    new_version,
                    error = ?e,
                    "publish after commit failed"
                );
                unpublished.push(stored.event_id);
            }
        }

        Ok(DispatchOutcome {
            new_version,
            events: committed,
            unpublished,
        })
    }

    /// Payloads must conform to the referenced schema of the same tenant.
    fn check_payload(
        &self,
        tenant_id: TenantId,
        schema_id: SchemaId,
        data: &JsonValue,
    ) -> Result<(), DispatchError> {
        let schema = self.load_schema(tenant_id, schema_id)?;
        if !schema.is_created() {
            return Err(DomainError::not_found(format!("schema {schema_id}")).into());
        }

        schema.validate_data(data)?;
        Ok(())
    }
}

fn validate_loaded_stream(
    tenant_id: TenantId,
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    let mut last_sequence = 0u64;
    let mut last_version = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if !e.belongs_to(tenant_id) {
            return Err(DispatchError::TenantIsolation(format!(
                "loaded stream contains wrong tenant_id at index {idx}"
            )));
        }
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::TenantIsolation(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            )));
        }
        if e.sequence_number <= last_sequence {
            return Err(DispatchError::CorruptStream(format!(
                "non-monotonic sequence_number in loaded stream (last={last_sequence}, found={})",
                e.sequence_number
            )));
        }
        if e.stream_version == 0 || e.stream_version < last_version {
            return Err(DispatchError::CorruptStream(format!(
                "decreasing stream_version in loaded stream (last={last_version}, found={})",
                e.stream_version
            )));
        }
        last_sequence = e.sequence_number;
        last_version = e.stream_version;
    }
    Ok(())
}

/// Aggregate type of a stream written by something other than `registration`.
fn foreign_type<'a, A>(
    registration: &AggregateRegistration<A>,
    history: &'a [StoredEvent],
) -> Option<&'a str> {
    history
        .first()
        .map(|e| e.aggregate_type.as_str())
        .filter(|found| *found != registration.aggregate_type())
}

fn fold<A>(
    registration: &AggregateRegistration<A>,
    aggregate_id: AggregateId,
    history: &[StoredEvent],
) -> Result<A, DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    let mut aggregate = registration.empty(aggregate_id);
    for stored in history {
        let ev: A::Event = serde_json::from_value(stored.payload.clone())
            .map_err(|e| DispatchError::Deserialize(format!("{} ({})", e, stored.event_type)))?;
        aggregate.apply(&ev, stored.stream_version);
    }
    Ok(aggregate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_store::InMemoryEventStore;
    use chrono::Utc;
    use pinkparrot_events::InMemoryEventBus;
    use serde_json::json;

    fn stored(tenant_id: TenantId, aggregate_id: AggregateId, seq: u64, version: u64) -> StoredEvent {
        StoredEvent {
            event_id: Uuid::now_v7(),
            tenant_id,
            aggregate_id,
            aggregate_type: Registry::CONTENT_TYPE.to_string(),
            sequence_number: seq,
            stream_version: version,
            event_type: "cms.content.updated".to_string(),
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
    fn store_conflicts_map_to_domain_errors() {
        let err = DispatchError::from(EventStoreError::Concurrency {
            expected: ExpectedVersion::Exact(2),
            actual: 3,
        });
        assert!(matches!(
            err,
            DispatchError::Domain(DomainError::VersionConflict {
                expected: 2,
                actual: 3
            })
        ));
        assert!(err.kind().is_precondition_failed());
        assert!(!err.is_retryable());

        let err = DispatchError::from(EventStoreError::StreamAlreadyExists(1));
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);

        let err = DispatchError::from(EventStoreError::Unavailable("down".to_string()));
        assert_eq!(err.kind(), ErrorKind::Infrastructure);
        assert!(err.is_retryable());

        let err = DispatchError::from(EventStoreError::AggregateTypeMismatch("x".to_string()));
        assert_eq!(err.kind(), ErrorKind::Infrastructure);
        assert!(!err.is_retryable());
    }

    #[test]
    fn loaded_stream_from_another_tenant_is_rejected() {
        let tenant = TenantId::new();
        let agg = AggregateId::new();
        let stream = vec![stored(tenant, agg, 1, 1), stored(TenantId::new(), agg, 2, 2)];

        let err = validate_loaded_stream(tenant, agg, &stream).unwrap_err();
        assert!(matches!(err, DispatchError::TenantIsolation(_)));
    }

    #[test]
    fn loaded_stream_must_be_ordered() {
        let tenant = TenantId::new();
        let agg = AggregateId::new();

        let shared_batch = vec![stored(tenant, agg, 1, 1), stored(tenant, agg, 2, 1)];
        assert!(validate_loaded_stream(tenant, agg, &shared_batch).is_ok());

        let reordered = vec![stored(tenant, agg, 2, 1), stored(tenant, agg, 1, 1)];
        let err = validate_loaded_stream(tenant, agg, &reordered).unwrap_err();
        assert!(matches!(err, DispatchError::CorruptStream(_)));
        assert_eq!(err.kind(), ErrorKind::Infrastructure);
        assert!(!err.is_retryable());

        let version_regressed = vec![stored(tenant, agg, 1, 2), stored(tenant, agg, 2, 1)];
        assert!(matches!(
            validate_loaded_stream(tenant, agg, &version_regressed),
            Err(DispatchError::CorruptStream(_))
        ));
    }

    #[test]
    fn undecodable_history_is_a_deserialize_error() {
        let store = InMemoryEventStore::new();
        let bus = InMemoryEventBus::<EventEnvelope<JsonValue>>::new();
        let tenant = TenantId::new();
        let agg = AggregateId::new();

        store
            .append(
                vec![UncommittedEvent {
                    event_id: Uuid::now_v7(),
                    tenant_id: tenant,
                    aggregate_id: agg,
                    aggregate_type: Registry::CONTENT_TYPE.to_string(),
                    event_type: "cms.content.created".to_string(),
                    event_version: 1,
                    metadata: CausationMetadata {
                        causation_id: Uuid::now_v7(),
                        actor: UserId::new(),
                        occurred_at: Utc::now(),
                    },
                    payload: json!({ "unexpected": true }),
                }],
                ExpectedVersion::NoStream,
            )
            .unwrap();

        let dispatcher = CommandDispatcher::new(store, bus, Registry::new());
        let err = dispatcher.load_content(tenant, ContentId::new(agg)).unwrap_err();
        assert!(matches!(err, DispatchError::Deserialize(_)));
        assert_eq!(err.kind(), ErrorKind::Infrastructure);
    }

    #[test]
    fn registry_type_names_are_configurable() {
        let registry = Registry::new()
            .with_schema_type("tenant.schema")
            .with_content_type("tenant.content");
        assert_eq!(registry.schema().aggregate_type(), "tenant.schema");
        assert_eq!(registry.content().aggregate_type(), "tenant.content");

        let defaults = Registry::default();
        assert_eq!(defaults.schema().aggregate_type(), "cms.schema");
        assert_eq!(defaults.content().aggregate_type(), "cms.content");
    }
}
