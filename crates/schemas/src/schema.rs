use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use pinkparrot_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, DomainResult, ExpectedVersion, TenantId,
    UserId,
};
use pinkparrot_events::{Command, Event};

use crate::field::{Field, FieldId, FieldProperties, is_slug};

/// Schema identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaId(pub AggregateId);

impl SchemaId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for SchemaId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Schema-level properties.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaProperties {
    pub name: String,
    pub label: Option<String>,
    pub hints: Option<String>,
}

impl SchemaProperties {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        if !is_slug(&self.name) {
            return Err(DomainError::validation(format!(
                "schema name '{}' must be a lowercase slug",
                self.name
            )));
        }
        Ok(())
    }
}

/// Aggregate root: Schema.
///
/// States are `Uninitialized` (no events, `created == false`) and `Active`.
/// There is no terminal state.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    id: SchemaId,
    tenant_id: Option<TenantId>,
    properties: SchemaProperties,
    fields: Vec<Field>,
    /// Highest field id ever issued; ids are allocated from here and never reused.
    last_field_id: u64,
    version: u64,
    created: bool,
}

impl Schema {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: SchemaId) -> Self {
        Self {
            id,
            tenant_id: None,
            properties: SchemaProperties::default(),
            fields: Vec::new(),
            last_field_id: 0,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> SchemaId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn properties(&self) -> &SchemaProperties {
        &self.properties
    }

    /// Fields in the order they were added.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, field_id: FieldId) -> Option<&Field> {
        self.fields.iter().find(|f| f.id == field_id)
    }

    pub fn field_by_name(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name() == name)
    }

    pub fn enabled_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.enabled)
    }

    /// Validate a content payload against the enabled fields of this schema.
    ///
    /// All violations are collected into a single validation error.
    pub fn validate_data(&self, data: &JsonValue) -> DomainResult<()> {
        let Some(object) = data.as_object() else {
            return Err(DomainError::validation("content data must be a JSON object"));
        };

        let mut problems = Vec::new();

        for key in object.keys() {
            match self.field_by_name(key) {
                None => problems.push(format!("unknown field '{key}'")),
                Some(f) if !f.enabled => problems.push(format!("field '{key}' is disabled")),
                Some(_) => {}
            }
        }

        for field in self.enabled_fields() {
            if let Err(msg) = field.check(object.get(field.name())) {
                problems.push(msg);
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(DomainError::validation(problems.join("; ")))
        }
    }
}

impl AggregateRoot for Schema {
    type Id = SchemaId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateModelSchema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateModelSchema {
    pub tenant_id: TenantId,
    pub schema_id: SchemaId,
    pub properties: SchemaProperties,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateModelSchema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateModelSchema {
    pub tenant_id: TenantId,
    pub schema_id: SchemaId,
    pub expected_version: u64,
    pub properties: SchemaProperties,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddModelField.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddModelField {
    pub tenant_id: TenantId,
    pub schema_id: SchemaId,
    pub expected_version: u64,
    pub properties: FieldProperties,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateModelField.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateModelField {
    pub tenant_id: TenantId,
    pub schema_id: SchemaId,
    pub expected_version: u64,
    pub field_id: FieldId,
    pub properties: FieldProperties,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: EnableModelField.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnableModelField {
    pub tenant_id: TenantId,
    pub schema_id: SchemaId,
    pub expected_version: u64,
    pub field_id: FieldId,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DisableModelField.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisableModelField {
    pub tenant_id: TenantId,
    pub schema_id: SchemaId,
    pub expected_version: u64,
    pub field_id: FieldId,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SchemaCommand {
    CreateModelSchema(CreateModelSchema),
    UpdateModelSchema(UpdateModelSchema),
    AddModelField(AddModelField),
    UpdateModelField(UpdateModelField),
    EnableModelField(EnableModelField),
    DisableModelField(DisableModelField),
}

impl SchemaCommand {
    pub fn schema_id(&self) -> SchemaId {
        match self {
            SchemaCommand::CreateModelSchema(c) => c.schema_id,
            SchemaCommand::UpdateModelSchema(c) => c.schema_id,
            SchemaCommand::AddModelField(c) => c.schema_id,
            SchemaCommand::UpdateModelField(c) => c.schema_id,
            SchemaCommand::EnableModelField(c) => c.schema_id,
            SchemaCommand::DisableModelField(c) => c.schema_id,
        }
    }
}

impl Command for SchemaCommand {
    fn tenant_id(&self) -> TenantId {
        match self {
            SchemaCommand::CreateModelSchema(c) => c.tenant_id,
            SchemaCommand::UpdateModelSchema(c) => c.tenant_id,
            SchemaCommand::AddModelField(c) => c.tenant_id,
            SchemaCommand::UpdateModelField(c) => c.tenant_id,
            SchemaCommand::EnableModelField(c) => c.tenant_id,
            SchemaCommand::DisableModelField(c) => c.tenant_id,
        }
    }

    fn target_aggregate_id(&self) -> AggregateId {
        self.schema_id().0
    }

    fn expected_version(&self) -> ExpectedVersion {
        match self {
            SchemaCommand::CreateModelSchema(_) => ExpectedVersion::NoStream,
            SchemaCommand::UpdateModelSchema(c) => ExpectedVersion::Exact(c.expected_version),
            SchemaCommand::AddModelField(c) => ExpectedVersion::Exact(c.expected_version),
            SchemaCommand::UpdateModelField(c) => ExpectedVersion::Exact(c.expected_version),
            SchemaCommand::EnableModelField(c) => ExpectedVersion::Exact(c.expected_version),
            SchemaCommand::DisableModelField(c) => ExpectedVersion::Exact(c.expected_version),
        }
    }

    fn actor(&self) -> UserId {
        match self {
            SchemaCommand::CreateModelSchema(c) => c.actor,
            SchemaCommand::UpdateModelSchema(c) => c.actor,
            SchemaCommand::AddModelField(c) => c.actor,
            SchemaCommand::UpdateModelField(c) => c.actor,
            SchemaCommand::EnableModelField(c) => c.actor,
            SchemaCommand::DisableModelField(c) => c.actor,
        }
    }

    fn command_type(&self) -> &'static str {
        match self {
            SchemaCommand::CreateModelSchema(_) => "CreateModelSchema",
            SchemaCommand::UpdateModelSchema(_) => "UpdateModelSchema",
            SchemaCommand::AddModelField(_) => "AddModelField",
            SchemaCommand::UpdateModelField(_) => "UpdateModelField",
            SchemaCommand::EnableModelField(_) => "EnableModelField",
            SchemaCommand::DisableModelField(_) => "DisableModelField",
        }
    }
}

/// Event: SchemaCreated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaCreated {
    pub tenant_id: TenantId,
    pub schema_id: SchemaId,
    pub properties: SchemaProperties,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SchemaUpdated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaUpdated {
    pub tenant_id: TenantId,
    pub schema_id: SchemaId,
    pub properties: SchemaProperties,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: FieldAdded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldAdded {
    pub tenant_id: TenantId,
    pub schema_id: SchemaId,
    pub field_id: FieldId,
    pub properties: FieldProperties,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: FieldUpdated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldUpdated {
    pub tenant_id: TenantId,
    pub schema_id: SchemaId,
    pub field_id: FieldId,
    pub properties: FieldProperties,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: FieldEnabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldEnabled {
    pub tenant_id: TenantId,
    pub schema_id: SchemaId,
    pub field_id: FieldId,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: FieldDisabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDisabled {
    pub tenant_id: TenantId,
    pub schema_id: SchemaId,
    pub field_id: FieldId,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SchemaEvent {
    SchemaCreated(SchemaCreated),
    SchemaUpdated(SchemaUpdated),
    FieldAdded(FieldAdded),
    FieldUpdated(FieldUpdated),
    FieldEnabled(FieldEnabled),
    FieldDisabled(FieldDisabled),
}

impl Event for SchemaEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SchemaEvent::SchemaCreated(_) => "cms.schema.created",
            SchemaEvent::SchemaUpdated(_) => "cms.schema.updated",
            SchemaEvent::FieldAdded(_) => "cms.schema.field_added",
            SchemaEvent::FieldUpdated(_) => "cms.schema.field_updated",
            SchemaEvent::FieldEnabled(_) => "cms.schema.field_enabled",
            SchemaEvent::FieldDisabled(_) => "cms.schema.field_disabled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SchemaEvent::SchemaCreated(e) => e.occurred_at,
            SchemaEvent::SchemaUpdated(e) => e.occurred_at,
            SchemaEvent::FieldAdded(e) => e.occurred_at,
            SchemaEvent::FieldUpdated(e) => e.occurred_at,
            SchemaEvent::FieldEnabled(e) => e.occurred_at,
            SchemaEvent::FieldDisabled(e) => e.occurred_at,
        }
    }

    fn actor(&self) -> UserId {
        match self {
            SchemaEvent::SchemaCreated(e) => e.actor,
            SchemaEvent::SchemaUpdated(e) => e.actor,
            SchemaEvent::FieldAdded(e) => e.actor,
            SchemaEvent::FieldUpdated(e) => e.actor,
            SchemaEvent::FieldEnabled(e) => e.actor,
            SchemaEvent::FieldDisabled(e) => e.actor,
        }
    }
}

impl Aggregate for Schema {
    type Command = SchemaCommand;
    type Event = SchemaEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event, version: u64) {
        match event {
            SchemaEvent::SchemaCreated(e) => {
                self.id = e.schema_id;
                self.tenant_id = Some(e.tenant_id);
                self.properties = e.properties.clone();
                self.fields.clear();
                self.last_field_id = 0;
                self.created = true;
            }
            SchemaEvent::SchemaUpdated(e) => {
                self.properties = e.properties.clone();
            }
            SchemaEvent::FieldAdded(e) => {
                self.fields.push(Field {
                    id: e.field_id,
                    properties: e.properties.clone(),
                    enabled: true,
                });
                self.last_field_id = self.last_field_id.max(e.field_id.0);
            }
            SchemaEvent::FieldUpdated(e) => {
                if let Some(f) = self.field_mut(e.field_id) {
                    f.properties = e.properties.clone();
                }
            }
            SchemaEvent::FieldEnabled(e) => {
                if let Some(f) = self.field_mut(e.field_id) {
                    f.enabled = true;
                }
            }
            SchemaEvent::FieldDisabled(e) => {
                if let Some(f) = self.field_mut(e.field_id) {
                    f.enabled = false;
                }
            }
        }

        self.version = version;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SchemaCommand::CreateModelSchema(cmd) => self.handle_create(cmd),
            SchemaCommand::UpdateModelSchema(cmd) => self.handle_update(cmd),
            SchemaCommand::AddModelField(cmd) => self.handle_add_field(cmd),
            SchemaCommand::UpdateModelField(cmd) => self.handle_update_field(cmd),
            SchemaCommand::EnableModelField(cmd) => self.handle_enable_field(cmd),
            SchemaCommand::DisableModelField(cmd) => self.handle_disable_field(cmd),
        }
    }
}

impl Schema {
    fn field_mut(&mut self, field_id: FieldId) -> Option<&mut Field> {
        self.fields.iter_mut().find(|f| f.id == field_id)
    }

    /// Common preconditions for every command on an existing schema.
    ///
    /// A schema of another tenant is reported as absent.
    fn ensure_active(
        &self,
        tenant_id: TenantId,
        schema_id: SchemaId,
        expected_version: u64,
    ) -> DomainResult<()> {
        if !self.created || self.tenant_id != Some(tenant_id) {
            return Err(DomainError::not_found(format!("schema {schema_id}")));
        }
        if self.id != schema_id {
            return Err(DomainError::validation("schema_id mismatch"));
        }
        ExpectedVersion::Exact(expected_version).check(self.version)
    }

    fn existing_field(&self, field_id: FieldId) -> DomainResult<&Field> {
        self.field(field_id)
            .ok_or_else(|| DomainError::not_found(format!("field {field_id} in schema {}", self.id)))
    }

    fn handle_create(&self, cmd: &CreateModelSchema) -> Result<Vec<SchemaEvent>, DomainError> {
        if self.created {
            return Err(DomainError::already_exists(format!("schema {}", cmd.schema_id)));
        }
        cmd.properties.validate()?;

        Ok(vec![SchemaEvent::SchemaCreated(SchemaCreated {
            tenant_id: cmd.tenant_id,
            schema_id: cmd.schema_id,
            properties: cmd.properties.clone(),
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateModelSchema) -> Result<Vec<SchemaEvent>, DomainError> {
        self.ensure_active(cmd.tenant_id, cmd.schema_id, cmd.expected_version)?;
        cmd.properties.validate()?;

        Ok(vec![SchemaEvent::SchemaUpdated(SchemaUpdated {
            tenant_id: cmd.tenant_id,
            schema_id: cmd.schema_id,
            properties: cmd.properties.clone(),
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_field(&self, cmd: &AddModelField) -> Result<Vec<SchemaEvent>, DomainError> {
        self.ensure_active(cmd.tenant_id, cmd.schema_id, cmd.expected_version)?;
        cmd.properties.validate()?;

        // Disabled fields keep their name reserved.
        if self.field_by_name(&cmd.properties.name).is_some() {
            return Err(DomainError::validation(format!(
                "field name '{}' is already in use",
                cmd.properties.name
            )));
        }

        Ok(vec![SchemaEvent::FieldAdded(FieldAdded {
            tenant_id: cmd.tenant_id,
            schema_id: cmd.schema_id,
            field_id: FieldId(self.last_field_id + 1),
            properties: cmd.properties.clone(),
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_field(&self, cmd: &UpdateModelField) -> Result<Vec<SchemaEvent>, DomainError> {
        self.ensure_active(cmd.tenant_id, cmd.schema_id, cmd.expected_version)?;
        let field = self.existing_field(cmd.field_id)?;
        cmd.properties.validate()?;

        // Additive-only evolution: name and type are fixed.
        if cmd.properties.name != field.properties.name {
            return Err(DomainError::validation(format!(
                "field {} cannot be renamed",
                cmd.field_id
            )));
        }
        if !cmd.properties.kind.same_type(&field.properties.kind) {
            return Err(DomainError::validation(format!(
                "field {} cannot change type from {} to {}",
                cmd.field_id,
                field.properties.kind.type_name(),
                cmd.properties.kind.type_name()
            )));
        }

        Ok(vec![SchemaEvent::FieldUpdated(FieldUpdated {
            tenant_id: cmd.tenant_id,
            schema_id: cmd.schema_id,
            field_id: cmd.field_id,
            properties: cmd.properties.clone(),
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_enable_field(&self, cmd: &EnableModelField) -> Result<Vec<SchemaEvent>, DomainError> {
        self.ensure_active(cmd.tenant_id, cmd.schema_id, cmd.expected_version)?;
        let field = self.existing_field(cmd.field_id)?;

        if field.enabled {
            return Err(DomainError::invalid_transition(format!(
                "field {} is already enabled",
                cmd.field_id
            )));
        }

        Ok(vec![SchemaEvent::FieldEnabled(FieldEnabled {
            tenant_id: cmd.tenant_id,
            schema_id: cmd.schema_id,
            field_id: cmd.field_id,
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_disable_field(&self, cmd: &DisableModelField) -> Result<Vec<SchemaEvent>, DomainError> {
        self.ensure_active(cmd.tenant_id, cmd.schema_id, cmd.expected_version)?;
        let field = self.existing_field(cmd.field_id)?;

        if !field.enabled {
            return Err(DomainError::invalid_transition(format!(
                "field {} is already disabled",
                cmd.field_id
            )));
        }

        Ok(vec![SchemaEvent::FieldDisabled(FieldDisabled {
            tenant_id: cmd.tenant_id,
            schema_id: cmd.schema_id,
            field_id: cmd.field_id,
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }
}
