//! Content aggregate (event-sourced).
//!
//! A content item is a versioned JSON payload living under a schema, with a
//! draft/published/deleted lifecycle. Conformance of the payload to the schema
//! is checked by the dispatcher, which can read the schema stream; this crate
//! stays pure.

pub mod content;

pub use content::{
    Content, ContentCommand, ContentCreated, ContentEvent, ContentId, ContentStatus,
    ContentStatusChanged, ContentUpdated, CreateContent, DeleteContent, PublishContent,
    UnpublishContent, UpdateContent,
};
