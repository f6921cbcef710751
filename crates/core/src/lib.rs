pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod lifecycle;
pub mod orchestrator;
pub mod repository;
pub mod scope;

pub use audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink, NoopAuditSink};
pub use domain::{Actor, Application, ApplicationId, ApplicationStatus, ApprovalStatus, Capability, Role};
pub use errors::WorkflowError;
pub use lifecycle::ApprovalParty;
pub use orchestrator::ApprovalOrchestrator;
pub use repository::{
    ApplicationRepository, AuditLogEntry, InMemoryApplicationRepository, RepositoryError,
    StatusSummary,
};
pub use scope::{may_filter, resolve_scope, EntityFilter};
