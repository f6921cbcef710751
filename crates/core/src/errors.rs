use thiserror::Error;

use crate::domain::{ApplicationId, ApplicationStatus, Capability, Role};
use crate::lifecycle::ApprovalParty;

/// Failure taxonomy for the approval workflow. Every variant carries enough
/// context (application id, attempted transition, actor role) for the caller
/// to render a precise message; nothing is swallowed or defaulted.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("application `{application_id}` not found within the caller's scope")]
    NotFound { application_id: ApplicationId },
    #[error("actor `{actor_id}` with role {role:?} lacks capability {capability:?}")]
    Forbidden { actor_id: String, role: Role, capability: Capability },
    #[error("invalid status transition from `{from}` to `{to}`")]
    InvalidTransition { from: ApplicationStatus, to: ApplicationStatus },
    #[error("application is already approved by the {party}")]
    AlreadyApproved { party: ApprovalParty },
    #[error("company approval attempted without a resolvable company association")]
    MissingCompanyContext,
    #[error("repository failure: {0}")]
    Repository(String),
}

impl WorkflowError {
    /// User-safe message for the presentation layer. `AlreadyApproved` is an
    /// informational notice rather than a hard failure: the end state the
    /// user wanted is already true.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "The requested application was not found.",
            Self::Forbidden { .. } => "You do not have permission to perform this action.",
            Self::InvalidTransition { .. } => {
                "The application cannot move to the requested status from its current state."
            }
            Self::AlreadyApproved { .. } => "This approval has already been recorded.",
            Self::MissingCompanyContext => {
                "Complete your company association before approving on behalf of a company."
            }
            Self::Repository(_) => "A temporary storage error occurred. Please retry.",
        }
    }

    /// Only generic I/O failures are retryable: a failed write leaves no
    /// partial state, so the whole operation can be safely re-issued.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Repository(_))
    }
}
