use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use pinkparrot_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, DomainResult, ExpectedVersion, TenantId,
    UserId,
};
use pinkparrot_events::{Command, Event};
use pinkparrot_schemas::SchemaId;

/// Content identifier (scoped by tenant and schema).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(pub AggregateId);

impl ContentId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ContentId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Content lifecycle. `Deleted` is terminal and logical (the stream stays).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    Draft,
    Published,
    Deleted,
}

/// Aggregate root: Content.
#[derive(Debug, Clone, PartialEq)]
pub struct Content {
    id: ContentId,
    tenant_id: Option<TenantId>,
    schema_id: Option<SchemaId>,
    data: JsonValue,
    status: ContentStatus,
    created_by: Option<UserId>,
    created_at: Option<DateTime<Utc>>,
    last_modified_by: Option<UserId>,
    last_modified_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Content {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ContentId) -> Self {
        Self {
            id,
            tenant_id: None,
            schema_id: None,
            data: JsonValue::Null,
            status: ContentStatus::Draft,
            created_by: None,
            created_at: None,
            last_modified_by: None,
            last_modified_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ContentId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn schema_id(&self) -> Option<SchemaId> {
        self.schema_id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn data(&self) -> &JsonValue {
        &self.data
    }

    pub fn status(&self) -> ContentStatus {
        self.status
    }

    pub fn is_published(&self) -> bool {
        self.created && self.status == ContentStatus::Published
    }

    pub fn created_by(&self) -> Option<UserId> {
        self.created_by
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn last_modified_by(&self) -> Option<UserId> {
        self.last_modified_by
    }

    pub fn last_modified_at(&self) -> Option<DateTime<Utc>> {
        self.last_modified_at
    }
}

impl AggregateRoot for Content {
    type Id = ContentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateContent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateContent {
    pub tenant_id: TenantId,
    pub schema_id: SchemaId,
    pub content_id: ContentId,
    pub data: JsonValue,
    /// Publish in the same batch as the creation.
    pub publish: bool,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateContent (wholesale data replacement).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateContent {
    pub tenant_id: TenantId,
    pub schema_id: SchemaId,
    pub content_id: ContentId,
    pub expected_version: u64,
    pub data: JsonValue,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: PublishContent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishContent {
    pub tenant_id: TenantId,
    pub schema_id: SchemaId,
    pub content_id: ContentId,
    pub expected_version: u64,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UnpublishContent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnpublishContent {
    pub tenant_id: TenantId,
    pub schema_id: SchemaId,
    pub content_id: ContentId,
    pub expected_version: u64,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteContent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteContent {
    pub tenant_id: TenantId,
    pub schema_id: SchemaId,
    pub content_id: ContentId,
    pub expected_version: u64,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ContentCommand {
    Create(CreateContent),
    Update(UpdateContent),
    Publish(PublishContent),
    Unpublish(UnpublishContent),
    Delete(DeleteContent),
}

impl ContentCommand {
    pub fn schema_id(&self) -> SchemaId {
        match self {
            ContentCommand::Create(c) => c.schema_id,
            ContentCommand::Update(c) => c.schema_id,
            ContentCommand::Publish(c) => c.schema_id,
            ContentCommand::Unpublish(c) => c.schema_id,
            ContentCommand::Delete(c) => c.schema_id,
        }
    }

    pub fn content_id(&self) -> ContentId {
        match self {
            ContentCommand::Create(c) => c.content_id,
            ContentCommand::Update(c) => c.content_id,
            ContentCommand::Publish(c) => c.content_id,
            ContentCommand::Unpublish(c) => c.content_id,
            ContentCommand::Delete(c) => c.content_id,
        }
    }

    /// Payload that must conform to the schema, for commands that carry one.
    pub fn data(&self) -> Option<&JsonValue> {
        match self {
            ContentCommand::Create(c) => Some(&c.data),
            ContentCommand::Update(c) => Some(&c.data),
            _ => None,
        }
    }
}

impl Command for ContentCommand {
    fn tenant_id(&self) -> TenantId {
        match self {
            ContentCommand::Create(c) => c.tenant_id,
            ContentCommand::Update(c) => c.tenant_id,
            ContentCommand::Publish(c) => c.tenant_id,
            ContentCommand::Unpublish(c) => c.tenant_id,
            ContentCommand::Delete(c) => c.tenant_id,
        }
    }

    fn target_aggregate_id(&self) -> AggregateId {
        self.content_id().0
    }

    fn expected_version(&self) -> ExpectedVersion {
        match self {
            ContentCommand::Create(_) => ExpectedVersion::NoStream,
            ContentCommand::Update(c) => ExpectedVersion::Exact(c.expected_version),
            ContentCommand::Publish(c) => ExpectedVersion::Exact(c.expected_version),
            ContentCommand::Unpublish(c) => ExpectedVersion::Exact(c.expected_version),
            ContentCommand::Delete(c) => ExpectedVersion::Exact(c.expected_version),
        }
    }

    fn actor(&self) -> UserId {
        match self {
            ContentCommand::Create(c) => c.actor,
            ContentCommand::Update(c) => c.actor,
            ContentCommand::Publish(c) => c.actor,
            ContentCommand::Unpublish(c) => c.actor,
            ContentCommand::Delete(c) => c.actor,
        }
    }

    fn command_type(&self) -> &'static str {
        match self {
            ContentCommand::Create(_) => "CreateContent",
            ContentCommand::Update(_) => "UpdateContent",
            ContentCommand::Publish(_) => "PublishContent",
            ContentCommand::Unpublish(_) => "UnpublishContent",
            ContentCommand::Delete(_) => "DeleteContent",
        }
    }
}

/// Event: ContentCreated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentCreated {
    pub tenant_id: TenantId,
    pub schema_id: SchemaId,
    pub content_id: ContentId,
    pub data: JsonValue,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ContentUpdated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentUpdated {
    pub tenant_id: TenantId,
    pub content_id: ContentId,
    pub data: JsonValue,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Payload shared by the data-less lifecycle events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentStatusChanged {
    pub tenant_id: TenantId,
    pub content_id: ContentId,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ContentEvent {
    ContentCreated(ContentCreated),
    ContentUpdated(ContentUpdated),
    ContentPublished(ContentStatusChanged),
    ContentUnpublished(ContentStatusChanged),
    ContentDeleted(ContentStatusChanged),
}

impl ContentEvent {
    fn meta(&self) -> (UserId, DateTime<Utc>) {
        match self {
            ContentEvent::ContentCreated(e) => (e.actor, e.occurred_at),
            ContentEvent::ContentUpdated(e) => (e.actor, e.occurred_at),
            ContentEvent::ContentPublished(e)
            | ContentEvent::ContentUnpublished(e)
            | ContentEvent::ContentDeleted(e) => (e.actor, e.occurred_at),
        }
    }
}

impl Event for ContentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ContentEvent::ContentCreated(_) => "cms.content.created",
            ContentEvent::ContentUpdated(_) => "cms.content.updated",
            ContentEvent::ContentPublished(_) => "cms.content.published",
            ContentEvent::ContentUnpublished(_) => "cms.content.unpublished",
            ContentEvent::ContentDeleted(_) => "cms.content.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.meta().1
    }

    fn actor(&self) -> UserId {
        self.meta().0
    }
}

impl Aggregate for Content {
    type Command = ContentCommand;
    type Event = ContentEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event, version: u64) {
        match event {
            ContentEvent::ContentCreated(e) => {
                self.id = e.content_id;
                self.tenant_id = Some(e.tenant_id);
                self.schema_id = Some(e.schema_id);
                self.data = e.data.clone();
                self.status = ContentStatus::Draft;
                self.created_by = Some(e.actor);
                self.created_at = Some(e.occurred_at);
                self.created = true;
            }
            ContentEvent::ContentUpdated(e) => {
                self.data = e.data.clone();
            }
            ContentEvent::ContentPublished(_) => {
                self.status = ContentStatus::Published;
            }
            ContentEvent::ContentUnpublished(_) => {
                self.status = ContentStatus::Draft;
            }
            ContentEvent::ContentDeleted(_) => {
                self.status = ContentStatus::Deleted;
            }
        }

        let (actor, at) = event.meta();
        self.last_modified_by = Some(actor);
        self.last_modified_at = Some(at);
        self.version = version;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ContentCommand::Create(cmd) => self.handle_create(cmd),
            ContentCommand::Update(cmd) => self.handle_update(cmd),
            ContentCommand::Publish(cmd) => self.handle_publish(cmd),
            ContentCommand::Unpublish(cmd) => self.handle_unpublish(cmd),
            ContentCommand::Delete(cmd) => self.handle_delete(cmd),
        }
    }
}

impl Content {
    /// Identity and liveness checks shared by every non-create command.
    ///
    /// Content of another tenant or under another schema is reported as absent.
    fn ensure_live(&self, tenant_id: TenantId, schema_id: SchemaId) -> DomainResult<()> {
        if !self.created || self.tenant_id != Some(tenant_id) || self.schema_id != Some(schema_id) {
            return Err(DomainError::not_found(format!("content {}", self.id)));
        }
        if self.status == ContentStatus::Deleted {
            return Err(DomainError::gone(format!("content {} has been deleted", self.id)));
        }
        Ok(())
    }

    fn ensure_version(&self, expected_version: u64) -> DomainResult<()> {
        ExpectedVersion::Exact(expected_version).check(self.version)
    }

    fn ensure_object(data: &JsonValue) -> DomainResult<()> {
        if data.is_object() {
            Ok(())
        } else {
            Err(DomainError::validation("content data must be a JSON object"))
        }
    }

    fn status_changed(
        tenant_id: TenantId,
        content_id: ContentId,
        actor: UserId,
        occurred_at: DateTime<Utc>,
    ) -> ContentStatusChanged {
        ContentStatusChanged {
            tenant_id,
            content_id,
            actor,
            occurred_at,
        }
    }

    fn handle_create(&self, cmd: &CreateContent) -> Result<Vec<ContentEvent>, DomainError> {
        if self.created {
            return Err(DomainError::already_exists(format!("content {}", cmd.content_id)));
        }
        Self::ensure_object(&cmd.data)?;

        let mut events = vec![ContentEvent::ContentCreated(ContentCreated {
            tenant_id: cmd.tenant_id,
            schema_id: cmd.schema_id,
            content_id: cmd.content_id,
            data: cmd.data.clone(),
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })];

        if cmd.publish {
            events.push(ContentEvent::ContentPublished(Self::status_changed(
                cmd.tenant_id,
                cmd.content_id,
                cmd.actor,
                cmd.occurred_at,
            )));
        }

        Ok(events)
    }

    fn handle_update(&self, cmd: &UpdateContent) -> Result<Vec<ContentEvent>, DomainError> {
        self.ensure_live(cmd.tenant_id, cmd.schema_id)?;
        self.ensure_version(cmd.expected_version)?;
        Self::ensure_object(&cmd.data)?;

        Ok(vec![ContentEvent::ContentUpdated(ContentUpdated {
            tenant_id: cmd.tenant_id,
            content_id: cmd.content_id,
            data: cmd.data.clone(),
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_publish(&self, cmd: &PublishContent) -> Result<Vec<ContentEvent>, DomainError> {
        self.ensure_live(cmd.tenant_id, cmd.schema_id)?;
        if self.status != ContentStatus::Draft {
            return Err(DomainError::invalid_transition(format!(
                "content {} is already published",
                cmd.content_id
            )));
        }
        self.ensure_version(cmd.expected_version)?;

        Ok(vec![ContentEvent::ContentPublished(Self::status_changed(
            cmd.tenant_id,
            cmd.content_id,
            cmd.actor,
            cmd.occurred_at,
        ))])
    }

    fn handle_unpublish(&self, cmd: &UnpublishContent) -> Result<Vec<ContentEvent>, DomainError> {
        self.ensure_live(cmd.tenant_id, cmd.schema_id)?;
        if self.status != ContentStatus::Published {
            return Err(DomainError::invalid_transition(format!(
                "content {} is not published",
                cmd.content_id
            )));
        }
        self.ensure_version(cmd.expected_version)?;

        Ok(vec![ContentEvent::ContentUnpublished(Self::status_changed(
            cmd.tenant_id,
            cmd.content_id,
            cmd.actor,
            cmd.occurred_at,
        ))])
    }

    fn handle_delete(&self, cmd: &DeleteContent) -> Result<Vec<ContentEvent>, DomainError> {
        self.ensure_live(cmd.tenant_id, cmd.schema_id)?;
        self.ensure_version(cmd.expected_version)?;

        Ok(vec![ContentEvent::ContentDeleted(Self::status_changed(
            cmd.tenant_id,
            cmd.content_id,
            cmd.actor,
            cmd.occurred_at,
        ))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinkparrot_events::execute;
    use serde_json::json;

    #[derive(Debug, Clone, Copy)]
    struct Ids {
        tenant_id: TenantId,
        schema_id: SchemaId,
        content_id: ContentId,
    }

    fn test_ids() -> Ids {
        Ids {
            tenant_id: TenantId::new(),
            schema_id: SchemaId::new(AggregateId::new()),
            content_id: ContentId::new(AggregateId::new()),
        }
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn create(ids: Ids, data: JsonValue, publish: bool) -> ContentCommand {
        ContentCommand::Create(CreateContent {
            tenant_id: ids.tenant_id,
            schema_id: ids.schema_id,
            content_id: ids.content_id,
            data,
            publish,
            actor: UserId::new(),
            occurred_at: test_time(),
        })
    }

    fn update(ids: Ids, expected_version: u64, data: JsonValue) -> ContentCommand {
        ContentCommand::Update(UpdateContent {
            tenant_id: ids.tenant_id,
            schema_id: ids.schema_id,
            content_id: ids.content_id,
            expected_version,
            data,
            actor: UserId::new(),
            occurred_at: test_time(),
        })
    }

    fn publish(ids: Ids, expected_version: u64) -> ContentCommand {
        ContentCommand::Publish(PublishContent {
            tenant_id: ids.tenant_id,
            schema_id: ids.schema_id,
            content_id: ids.content_id,
            expected_version,
            actor: UserId::new(),
            occurred_at: test_time(),
        })
    }

    fn unpublish(ids: Ids, expected_version: u64) -> ContentCommand {
        ContentCommand::Unpublish(UnpublishContent {
            tenant_id: ids.tenant_id,
            schema_id: ids.schema_id,
            content_id: ids.content_id,
            expected_version,
            actor: UserId::new(),
            occurred_at: test_time(),
        })
    }

    fn delete(ids: Ids, expected_version: u64) -> ContentCommand {
        ContentCommand::Delete(DeleteContent {
            tenant_id: ids.tenant_id,
            schema_id: ids.schema_id,
            content_id: ids.content_id,
            expected_version,
            actor: UserId::new(),
            occurred_at: test_time(),
        })
    }

    fn draft(ids: Ids) -> Content {
        let mut content = Content::empty(ids.content_id);
        execute(&mut content, &create(ids, json!({ "title": "x" }), false)).unwrap();
        content
    }

    #[test]
    fn create_content_emits_content_created_in_draft() {
        let ids = test_ids();
        let mut content = Content::empty(ids.content_id);

        let events = execute(&mut content, &create(ids, json!({ "title": "x" }), false)).unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            ContentEvent::ContentCreated(e) => {
                assert_eq!(e.tenant_id, ids.tenant_id);
                assert_eq!(e.schema_id, ids.schema_id);
                assert_eq!(e.content_id, ids.content_id);
                assert_eq!(e.data, json!({ "title": "x" }));
            }
            _ => panic!("Expected ContentCreated event"),
        }

        assert_eq!(content.status(), ContentStatus::Draft);
        assert!(!content.is_published());
        assert_eq!(content.version(), 1);
    }

    #[test]
    fn create_and_publish_is_one_batch() {
        let ids = test_ids();
        let mut content = Content::empty(ids.content_id);

        let events = execute(&mut content, &create(ids, json!({}), true)).unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], ContentEvent::ContentCreated(_)));
        assert!(matches!(events[1], ContentEvent::ContentPublished(_)));

        assert!(content.is_published());
        assert_eq!(content.version(), 1);
    }

    #[test]
    fn create_content_rejects_duplicate_creation() {
        let ids = test_ids();
        let content = draft(ids);

        let err = content.handle(&create(ids, json!({}), false)).unwrap_err();
        assert!(matches!(err, DomainError::AlreadyExists(_)));
    }

    #[test]
    fn create_content_rejects_non_object_data() {
        let ids = test_ids();
        let content = Content::empty(ids.content_id);

        let err = content.handle(&create(ids, json!("title"), false)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn commands_on_missing_content_are_not_found() {
        let ids = test_ids();
        let content = Content::empty(ids.content_id);

        for cmd in [
            update(ids, 0, json!({})),
            publish(ids, 0),
            unpublish(ids, 0),
            delete(ids, 0),
        ] {
            let err = content.handle(&cmd).unwrap_err();
            assert!(matches!(err, DomainError::NotFound(_)), "{cmd:?} -> {err:?}");
        }
    }

    #[test]
    fn other_tenant_or_schema_sees_content_as_missing() {
        let ids = test_ids();
        let content = draft(ids);

        let foreign_tenant = Ids {
            tenant_id: TenantId::new(),
            ..ids
        };
        let err = content.handle(&publish(foreign_tenant, 1)).unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));

        let foreign_schema = Ids {
            schema_id: SchemaId::new(AggregateId::new()),
            ..ids
        };
        let err = content.handle(&publish(foreign_schema, 1)).unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[test]
    fn update_replaces_data_wholesale() {
        let ids = test_ids();
        let mut content = Content::empty(ids.content_id);
        execute(
            &mut content,
            &create(ids, json!({ "title": "x", "body": "y" }), false),
        )
        .unwrap();

        execute(&mut content, &update(ids, 1, json!({ "title": "z" }))).unwrap();
        assert_eq!(content.data(), &json!({ "title": "z" }));
        assert_eq!(content.version(), 2);
    }

    #[test]
    fn update_with_stale_version_is_version_conflict() {
        let ids = test_ids();
        let mut content = draft(ids);
        execute(&mut content, &update(ids, 1, json!({ "title": "a" }))).unwrap();
        let before = content.clone();

        let err = execute(&mut content, &update(ids, 1, json!({ "title": "b" }))).unwrap_err();
        assert_eq!(err, DomainError::version_conflict(1, 2));
        assert_eq!(content, before);
    }

    #[test]
    fn stale_version_wins_over_invalid_payload() {
        let ids = test_ids();
        let content = draft(ids);

        let err = content.handle(&update(ids, 7, json!(42))).unwrap_err();
        assert!(matches!(err, DomainError::VersionConflict { .. }));
    }

    #[test]
    fn publish_twice_is_invalid_transition_regardless_of_version() {
        let ids = test_ids();
        let mut content = draft(ids);
        execute(&mut content, &publish(ids, 1)).unwrap();

        let err = content.handle(&publish(ids, 2)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
        let err = content.handle(&publish(ids, 1)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    #[test]
    fn unpublish_requires_published_content() {
        let ids = test_ids();
        let content = draft(ids);

        let err = content.handle(&unpublish(ids, 1)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    #[test]
    fn deleted_content_is_gone_for_every_command() {
        let ids = test_ids();
        let mut content = draft(ids);
        execute(&mut content, &delete(ids, 1)).unwrap();
        assert_eq!(content.status(), ContentStatus::Deleted);

        for cmd in [
            update(ids, 2, json!({})),
            publish(ids, 2),
            unpublish(ids, 2),
            delete(ids, 2),
            update(ids, 99, json!({})),
        ] {
            let err = content.handle(&cmd).unwrap_err();
            assert!(matches!(err, DomainError::Gone(_)), "{cmd:?} -> {err:?}");
        }

        let err = content.handle(&create(ids, json!({}), false)).unwrap_err();
        assert!(matches!(err, DomainError::AlreadyExists(_)));
    }

    #[test]
    fn full_lifecycle_bumps_version_once_per_command() {
        let ids = test_ids();
        let mut content = draft(ids);
        assert_eq!((content.version(), content.status()), (1, ContentStatus::Draft));

        execute(&mut content, &publish(ids, 1)).unwrap();
        assert_eq!((content.version(), content.status()), (2, ContentStatus::Published));

        execute(&mut content, &unpublish(ids, 2)).unwrap();
        assert_eq!((content.version(), content.status()), (3, ContentStatus::Draft));

        execute(&mut content, &delete(ids, 3)).unwrap();
        assert_eq!((content.version(), content.status()), (4, ContentStatus::Deleted));
    }

    #[test]
    fn audit_fields_follow_event_metadata() {
        let ids = test_ids();
        let author = UserId::new();
        let editor = UserId::new();
        let created_at = test_time();
        let mut content = Content::empty(ids.content_id);

        execute(
            &mut content,
            &ContentCommand::Create(CreateContent {
                tenant_id: ids.tenant_id,
                schema_id: ids.schema_id,
                content_id: ids.content_id,
                data: json!({}),
                publish: false,
                actor: author,
                occurred_at: created_at,
            }),
        )
        .unwrap();

        let edited_at = created_at + chrono::Duration::seconds(5);
        execute(
            &mut content,
            &ContentCommand::Publish(PublishContent {
                tenant_id: ids.tenant_id,
                schema_id: ids.schema_id,
                content_id: ids.content_id,
                expected_version: 1,
                actor: editor,
                occurred_at: edited_at,
            }),
        )
        .unwrap();

        assert_eq!(content.created_by(), Some(author));
        assert_eq!(content.created_at(), Some(created_at));
        assert_eq!(content.last_modified_by(), Some(editor));
        assert_eq!(content.last_modified_at(), Some(edited_at));
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let ids = test_ids();
        let content = draft(ids);
        let before = content.clone();

        let cmd = publish(ids, 1);
        let events1 = content.handle(&cmd).unwrap();
        let events2 = content.handle(&cmd).unwrap();

        assert_eq!(content, before);
        assert_eq!(events1, events2);
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Update(String),
            Publish,
            Unpublish,
            Delete,
            Stale,
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                "[a-z]{0,16}".prop_map(Op::Update),
                Just(Op::Publish),
                Just(Op::Unpublish),
                Just(Op::Delete),
                Just(Op::Stale),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 512,
                ..ProptestConfig::default()
            })]

            /// Property: each successful command bumps the version by exactly one;
            /// each rejected command leaves state untouched.
            #[test]
            fn version_increments_by_one_per_successful_command(
                publish_now in any::<bool>(),
                ops in prop::collection::vec(op(), 0..30),
            ) {
                let ids = test_ids();
                let mut content = Content::empty(ids.content_id);
                execute(&mut content, &create(ids, json!({}), publish_now)).unwrap();
                prop_assert_eq!(content.version(), 1);

                for op in ops {
                    let v = content.version();
                    let cmd = match op {
                        Op::Update(title) => update(ids, v, json!({ "title": title })),
                        Op::Publish => publish(ids, v),
                        Op::Unpublish => unpublish(ids, v),
                        Op::Delete => delete(ids, v),
                        Op::Stale => update(ids, v.saturating_sub(1), json!({})),
                    };

                    let before = content.clone();
                    match execute(&mut content, &cmd) {
                        Ok(_) => prop_assert_eq!(content.version(), v + 1),
                        Err(_) => prop_assert_eq!(&content, &before),
                    }
                }
            }

            /// Property: folding the committed history reproduces the live state.
            #[test]
            fn replay_reproduces_state(ops in prop::collection::vec(op(), 0..30)) {
                let ids = test_ids();
                let mut live = Content::empty(ids.content_id);
                let mut history: Vec<(u64, ContentEvent)> = Vec::new();

                let mut record = |content: &mut Content, cmd: &ContentCommand| {
                    if let Ok(events) = execute(content, cmd) {
                        history.extend(events.into_iter().map(|e| (content.version(), e)));
                    }
                };

                record(&mut live, &create(ids, json!({ "title": "x" }), false));
                for op in ops {
                    let v = live.version();
                    let cmd = match op {
                        Op::Update(title) => update(ids, v, json!({ "title": title })),
                        Op::Publish => publish(ids, v),
                        Op::Unpublish => unpublish(ids, v),
                        Op::Delete => delete(ids, v),
                        Op::Stale => publish(ids, v + 1),
                    };
                    record(&mut live, &cmd);
                }

                let mut replayed = Content::empty(ids.content_id);
                pinkparrot_events::replay(&mut replayed, history.iter().map(|(v, e)| (*v, e)));
                prop_assert_eq!(replayed, live);
            }
        }
    }
}
