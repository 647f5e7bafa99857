//! Schema aggregate (event-sourced).
//!
//! A schema defines the structure content items must conform to: an ordered
//! list of typed fields plus schema-level properties. Pure domain logic only.

pub mod field;
pub mod schema;

pub use field::{Field, FieldId, FieldKind, FieldProperties};
pub use schema::{
    AddModelField, CreateModelSchema, DisableModelField, EnableModelField, FieldAdded,
    FieldDisabled, FieldEnabled, FieldUpdated, Schema, SchemaCommand, SchemaCreated, SchemaEvent,
    SchemaId, SchemaProperties, SchemaUpdated, UpdateModelField, UpdateModelSchema,
};
