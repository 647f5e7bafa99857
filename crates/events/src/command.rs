use pinkparrot_core::{AggregateId, ExpectedVersion, TenantId, UserId};

/// A command targets exactly one aggregate stream of one tenant.
///
/// Commands represent **intent** and are transient: they are validated against
/// current state and either rejected or turned into events, which are persisted.
///
/// Every command names its tenant and target aggregate so the dispatcher can
/// resolve the stream without inspecting the payload. Every command except an
/// aggregate's creation command carries the version token its caller last
/// observed; creation commands expect the stream not to exist yet.
pub trait Command: Clone + core::fmt::Debug + Send + Sync + 'static {
    fn tenant_id(&self) -> TenantId;

    fn target_aggregate_id(&self) -> AggregateId;

    /// Precondition for the conditional append.
    fn expected_version(&self) -> ExpectedVersion;

    fn actor(&self) -> UserId;

    /// Stable command name, used for logging.
    fn command_type(&self) -> &'static str;
}
