//! Sequences one user-initiated approval or status change end-to-end:
//! capability gate, state-machine validation, repository write, then a
//! mandatory fresh re-read. The re-read is correctness, not convenience:
//! it is how callers observe the auto-advance to `approved`.

use std::sync::Arc;

use tracing::{info, warn};

use crate::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, NoopAuditSink};
use crate::domain::{Actor, Application, ApplicationId, ApplicationStatus, ApprovalStatus, Capability};
use crate::errors::WorkflowError;
use crate::lifecycle::{self, ApprovalParty};
use crate::repository::{ApplicationRepository, AuditLogEntry, StatusSummary};
use crate::scope::resolve_scope;

pub struct ApprovalOrchestrator<R> {
    repository: Arc<R>,
    audit: Arc<dyn AuditSink>,
}

impl<R> ApprovalOrchestrator<R>
where
    R: ApplicationRepository,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository, audit: Arc::new(NoopAuditSink) }
    }

    pub fn with_audit_sink(repository: Arc<R>, audit: Arc<dyn AuditSink>) -> Self {
        Self { repository, audit }
    }

    /// Read-only pass-through for initial page load.
    pub async fn application(
        &self,
        id: &ApplicationId,
        actor: &Actor,
    ) -> Result<Application, WorkflowError> {
        self.require_capability(actor, Capability::ViewApplications)?;
        let scope = resolve_scope(actor);
        Ok(self.repository.find_by_id(id, scope.as_ref()).await?)
    }

    pub async fn approval_status(
        &self,
        id: &ApplicationId,
        actor: &Actor,
    ) -> Result<ApprovalStatus, WorkflowError> {
        self.require_capability(actor, Capability::ViewApplications)?;
        let scope = resolve_scope(actor);
        Ok(self.repository.approval_status(id, scope.as_ref()).await?)
    }

    pub async fn list_applications(&self, actor: &Actor) -> Result<Vec<Application>, WorkflowError> {
        self.require_capability(actor, Capability::ViewApplications)?;
        let scope = resolve_scope(actor);
        Ok(self.repository.list(scope.as_ref()).await?)
    }

    pub async fn status_summary(&self, actor: &Actor) -> Result<StatusSummary, WorkflowError> {
        self.require_capability(actor, Capability::ViewApplications)?;
        let scope = resolve_scope(actor);
        Ok(self.repository.status_summary(scope.as_ref()).await?)
    }

    pub async fn audit_trail(
        &self,
        id: &ApplicationId,
        actor: &Actor,
    ) -> Result<Vec<AuditLogEntry>, WorkflowError> {
        self.require_capability(actor, Capability::ViewApplications)?;
        let scope = resolve_scope(actor);
        Ok(self.repository.audit_log(id, scope.as_ref()).await?)
    }

    pub async fn approve_as_advisor(
        &self,
        id: &ApplicationId,
        actor: &Actor,
    ) -> Result<(Application, ApprovalStatus), WorkflowError> {
        self.record_approval(id, actor, ApprovalParty::Advisor).await
    }

    pub async fn approve_as_company(
        &self,
        id: &ApplicationId,
        actor: &Actor,
    ) -> Result<(Application, ApprovalStatus), WorkflowError> {
        self.record_approval(id, actor, ApprovalParty::Company).await
    }

    async fn record_approval(
        &self,
        id: &ApplicationId,
        actor: &Actor,
        party: ApprovalParty,
    ) -> Result<(Application, ApprovalStatus), WorkflowError> {
        let event_type = match party {
            ApprovalParty::Advisor => "approval.advisor",
            ApprovalParty::Company => "approval.company",
        };

        self.require_capability(actor, Capability::EditApplication)
            .and_then(|()| self.require_party_role(actor, party))
            .map_err(|error| self.rejected(id, event_type, AuditCategory::Approval, actor, error))?;

        let scope = resolve_scope(actor);

        // Company approvals need a resolvable company before any I/O is
        // issued, so a failure here provably leaves no partial write.
        let company_id = match party {
            ApprovalParty::Advisor => None,
            ApprovalParty::Company => Some(
                scope
                    .as_ref()
                    .and_then(|filter| filter.company_id.clone())
                    .ok_or(WorkflowError::MissingCompanyContext)
                    .map_err(|error| {
                        self.rejected(id, event_type, AuditCategory::Approval, actor, error)
                    })?,
            ),
        };

        let application = self.repository.find_by_id(id, scope.as_ref()).await?;
        let approval = self.repository.approval_status(id, scope.as_ref()).await?;

        lifecycle::check_approval_state(application.status, &approval, party)
            .map_err(|error| self.rejected(id, event_type, AuditCategory::Approval, actor, error))?;

        match party {
            ApprovalParty::Advisor => {
                self.repository
                    .record_advisor_approval(
                        id,
                        "Application approved by the assigned advisor",
                        &actor.id,
                        scope.as_ref(),
                    )
                    .await?;
            }
            ApprovalParty::Company => {
                let company_id = company_id.unwrap_or_default();
                self.repository
                    .record_company_approval(
                        id,
                        "Application approved by the company",
                        &actor.id,
                        &company_id,
                        scope.as_ref(),
                    )
                    .await?;
            }
        }

        // Mandatory fresh read: the approval write may have auto-advanced
        // the status, and the caller must see that, not a stale copy.
        let application = self.repository.find_by_id(id, scope.as_ref()).await?;
        let approval = self.repository.approval_status(id, scope.as_ref()).await?;

        info!(
            application_id = %id,
            actor = %actor.id,
            party = %party,
            status = %application.status,
            "approval recorded"
        );
        self.audit.emit(
            AuditEvent::new(
                Some(id.clone()),
                format!("{event_type}_recorded"),
                AuditCategory::Approval,
                actor.id.clone(),
                AuditOutcome::Success,
            )
            .with_metadata("status_after", application.status.as_str())
            .with_metadata("fully_approved", approval.fully_approved().to_string()),
        );

        Ok((application, approval))
    }

    pub async fn change_status(
        &self,
        id: &ApplicationId,
        actor: &Actor,
        new_status: ApplicationStatus,
    ) -> Result<Application, WorkflowError> {
        self.require_capability(actor, Capability::EditApplication)
            .and_then(|()| {
                if lifecycle::status_change_role_allows(actor, new_status) {
                    Ok(())
                } else {
                    Err(WorkflowError::Forbidden {
                        actor_id: actor.id.clone(),
                        role: actor.role,
                        capability: Capability::EditApplication,
                    })
                }
            })
            .map_err(|error| self.rejected(id, "status.change", AuditCategory::Lifecycle, actor, error))?;

        let scope = resolve_scope(actor);
        let application = self.repository.find_by_id(id, scope.as_ref()).await?;

        lifecycle::check_status_change(application.status, new_status).map_err(|error| {
            self.rejected(id, "status.change", AuditCategory::Lifecycle, actor, error)
        })?;

        self.repository
            .set_status(
                id,
                new_status,
                &format!("Status changed from {} to {}", application.status, new_status),
                &actor.id,
                scope.as_ref(),
            )
            .await?;

        let application = self.repository.find_by_id(id, scope.as_ref()).await?;

        info!(
            application_id = %id,
            actor = %actor.id,
            status = %application.status,
            "status change applied"
        );
        self.audit.emit(
            AuditEvent::new(
                Some(id.clone()),
                "status.change_applied",
                AuditCategory::Lifecycle,
                actor.id.clone(),
                AuditOutcome::Success,
            )
            .with_metadata("to", new_status.as_str()),
        );

        Ok(application)
    }

    fn require_capability(
        &self,
        actor: &Actor,
        capability: Capability,
    ) -> Result<(), WorkflowError> {
        if actor.has_capability(capability) {
            Ok(())
        } else {
            Err(WorkflowError::Forbidden {
                actor_id: actor.id.clone(),
                role: actor.role,
                capability,
            })
        }
    }

    fn require_party_role(&self, actor: &Actor, party: ApprovalParty) -> Result<(), WorkflowError> {
        if lifecycle::approval_role_allows(actor, party) {
            Ok(())
        } else {
            Err(WorkflowError::Forbidden {
                actor_id: actor.id.clone(),
                role: actor.role,
                capability: Capability::EditApplication,
            })
        }
    }

    fn rejected(
        &self,
        id: &ApplicationId,
        event_type: &str,
        category: AuditCategory,
        actor: &Actor,
        error: WorkflowError,
    ) -> WorkflowError {
        warn!(application_id = %id, actor = %actor.id, %error, "workflow request rejected");
        self.audit.emit(
            AuditEvent::new(
                Some(id.clone()),
                format!("{event_type}_rejected"),
                category,
                actor.id.clone(),
                AuditOutcome::Rejected,
            )
            .with_metadata("error", error.to_string()),
        );
        error
    }
}
