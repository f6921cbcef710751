//! Repository port for application and approval records. Every operation
//! takes an optional [`EntityFilter`] that is AND-combined with the id
//! lookup, so a scoped actor can never read or write outside their entity.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::domain::{Application, ApplicationId, ApplicationStatus, ApprovalStatus};
use crate::errors::WorkflowError;
use crate::lifecycle::{self, ApprovalParty};
use crate::scope::EntityFilter;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("application `{application_id}` not found")]
    NotFound { application_id: ApplicationId },
    #[error("application already approved by the {party}")]
    AlreadyApproved { party: ApprovalParty },
    #[error("company approval requires a company id")]
    MissingCompanyId,
    #[error("invalid stored record: {0}")]
    Corrupt(String),
    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl From<RepositoryError> for WorkflowError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::NotFound { application_id } => Self::NotFound { application_id },
            RepositoryError::AlreadyApproved { party } => Self::AlreadyApproved { party },
            RepositoryError::MissingCompanyId => Self::MissingCompanyContext,
            RepositoryError::Corrupt(message) | RepositoryError::Backend(message) => {
                Self::Repository(message)
            }
        }
    }
}

/// One row of the per-application audit trail. Appended by every mutating
/// repository operation.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct AuditLogEntry {
    pub application_id: ApplicationId,
    pub action: String,
    pub note: String,
    pub actor_id: String,
    pub occurred_at: DateTime<Utc>,
}

/// Per-status counts for the dashboard, scoped like every other read.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct StatusSummary {
    pub total: u64,
    pub pending: u64,
    pub in_review: u64,
    pub approved: u64,
    pub por_dispersar: u64,
    pub completed: u64,
    pub rejected: u64,
}

impl StatusSummary {
    pub fn observe(&mut self, status: ApplicationStatus) {
        self.total += 1;
        match status {
            ApplicationStatus::Pending => self.pending += 1,
            ApplicationStatus::InReview => self.in_review += 1,
            ApplicationStatus::Approved => self.approved += 1,
            ApplicationStatus::PorDispersar => self.por_dispersar += 1,
            ApplicationStatus::Completed => self.completed += 1,
            ApplicationStatus::Rejected => self.rejected += 1,
        }
    }
}

#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    /// Inserts a new application together with its default (all-false)
    /// approval record. Intake itself happens upstream; this exists for
    /// fixtures and tests.
    async fn create(&self, application: Application) -> Result<(), RepositoryError>;

    async fn find_by_id(
        &self,
        id: &ApplicationId,
        filter: Option<&EntityFilter>,
    ) -> Result<Application, RepositoryError>;

    async fn approval_status(
        &self,
        id: &ApplicationId,
        filter: Option<&EntityFilter>,
    ) -> Result<ApprovalStatus, RepositoryError>;

    /// Sets the advisor flag and its timestamp, evaluating the auto-advance
    /// to `approved` inside the same logical operation. Fails with
    /// `AlreadyApproved` on a duplicate rather than silently ignoring it.
    async fn record_advisor_approval(
        &self,
        id: &ApplicationId,
        note: &str,
        actor_id: &str,
        filter: Option<&EntityFilter>,
    ) -> Result<(), RepositoryError>;

    /// Company-side counterpart of [`record_advisor_approval`]. The company
    /// id is mandatory and must match the application's company.
    async fn record_company_approval(
        &self,
        id: &ApplicationId,
        note: &str,
        actor_id: &str,
        company_id: &str,
        filter: Option<&EntityFilter>,
    ) -> Result<(), RepositoryError>;

    /// Persists a raw status value plus an audit note. Transition legality
    /// is the state machine's job; this is a dumb write.
    async fn set_status(
        &self,
        id: &ApplicationId,
        new_status: ApplicationStatus,
        note: &str,
        actor_id: &str,
        filter: Option<&EntityFilter>,
    ) -> Result<(), RepositoryError>;

    async fn list(&self, filter: Option<&EntityFilter>)
        -> Result<Vec<Application>, RepositoryError>;

    async fn status_summary(
        &self,
        filter: Option<&EntityFilter>,
    ) -> Result<StatusSummary, RepositoryError>;

    async fn audit_log(
        &self,
        id: &ApplicationId,
        filter: Option<&EntityFilter>,
    ) -> Result<Vec<AuditLogEntry>, RepositoryError>;
}

struct ApplicationRecord {
    application: Application,
    approval: ApprovalStatus,
    audit: Vec<AuditLogEntry>,
}

/// In-memory repository with the same scope and conflict semantics as the
/// SQL implementation. Used by orchestrator unit tests and local tooling.
#[derive(Default)]
pub struct InMemoryApplicationRepository {
    records: RwLock<HashMap<String, ApplicationRecord>>,
}

impl InMemoryApplicationRepository {
    fn scope_mismatch(id: &ApplicationId) -> RepositoryError {
        RepositoryError::NotFound { application_id: id.clone() }
    }
}

fn permitted<'a>(
    record: Option<&'a ApplicationRecord>,
    id: &ApplicationId,
    filter: Option<&EntityFilter>,
) -> Result<&'a ApplicationRecord, RepositoryError> {
    match record {
        Some(record) if filter.map_or(true, |f| f.permits(&record.application)) => Ok(record),
        _ => Err(InMemoryApplicationRepository::scope_mismatch(id)),
    }
}

#[async_trait]
impl ApplicationRepository for InMemoryApplicationRepository {
    async fn create(&self, application: Application) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        records.insert(
            application.id.0.clone(),
            ApplicationRecord {
                application,
                approval: ApprovalStatus::default(),
                audit: Vec::new(),
            },
        );
        Ok(())
    }

    async fn find_by_id(
        &self,
        id: &ApplicationId,
        filter: Option<&EntityFilter>,
    ) -> Result<Application, RepositoryError> {
        let records = self.records.read().await;
        permitted(records.get(&id.0), id, filter).map(|record| record.application.clone())
    }

    async fn approval_status(
        &self,
        id: &ApplicationId,
        filter: Option<&EntityFilter>,
    ) -> Result<ApprovalStatus, RepositoryError> {
        let records = self.records.read().await;
        permitted(records.get(&id.0), id, filter).map(|record| record.approval.clone())
    }

    async fn record_advisor_approval(
        &self,
        id: &ApplicationId,
        note: &str,
        actor_id: &str,
        filter: Option<&EntityFilter>,
    ) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        let record = match records.get_mut(&id.0) {
            Some(record) if filter.map_or(true, |f| f.permits(&record.application)) => record,
            _ => return Err(Self::scope_mismatch(id)),
        };

        if record.approval.approved_by_advisor {
            return Err(RepositoryError::AlreadyApproved { party: ApprovalParty::Advisor });
        }

        let now = Utc::now();
        record.approval.approved_by_advisor = true;
        record.approval.approval_date_advisor = Some(now);
        if let Some(next) = lifecycle::derived_status(&record.approval) {
            record.application.status = next;
        }
        record.application.updated_at = now;
        record.audit.push(AuditLogEntry {
            application_id: id.clone(),
            action: "advisor_approval".to_string(),
            note: note.to_string(),
            actor_id: actor_id.to_string(),
            occurred_at: now,
        });
        Ok(())
    }

    async fn record_company_approval(
        &self,
        id: &ApplicationId,
        note: &str,
        actor_id: &str,
        company_id: &str,
        filter: Option<&EntityFilter>,
    ) -> Result<(), RepositoryError> {
        if company_id.trim().is_empty() {
            return Err(RepositoryError::MissingCompanyId);
        }

        let mut records = self.records.write().await;
        let record = match records.get_mut(&id.0) {
            Some(record) if filter.map_or(true, |f| f.permits(&record.application)) => record,
            _ => return Err(Self::scope_mismatch(id)),
        };

        if record.application.company_id.as_deref() != Some(company_id) {
            return Err(Self::scope_mismatch(id));
        }
        if record.approval.approved_by_company {
            return Err(RepositoryError::AlreadyApproved { party: ApprovalParty::Company });
        }

        let now = Utc::now();
        record.approval.approved_by_company = true;
        record.approval.approval_date_company = Some(now);
        if let Some(next) = lifecycle::derived_status(&record.approval) {
            record.application.status = next;
        }
        record.application.updated_at = now;
        record.audit.push(AuditLogEntry {
            application_id: id.clone(),
            action: "company_approval".to_string(),
            note: note.to_string(),
            actor_id: actor_id.to_string(),
            occurred_at: now,
        });
        Ok(())
    }

    async fn set_status(
        &self,
        id: &ApplicationId,
        new_status: ApplicationStatus,
        note: &str,
        actor_id: &str,
        filter: Option<&EntityFilter>,
    ) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        let record = match records.get_mut(&id.0) {
            Some(record) if filter.map_or(true, |f| f.permits(&record.application)) => record,
            _ => return Err(Self::scope_mismatch(id)),
        };

        let now = Utc::now();
        record.application.status = new_status;
        record.application.updated_at = now;
        record.audit.push(AuditLogEntry {
            application_id: id.clone(),
            action: format!("status_change:{new_status}"),
            note: note.to_string(),
            actor_id: actor_id.to_string(),
            occurred_at: now,
        });
        Ok(())
    }

    async fn list(
        &self,
        filter: Option<&EntityFilter>,
    ) -> Result<Vec<Application>, RepositoryError> {
        let records = self.records.read().await;
        let mut applications: Vec<Application> = records
            .values()
            .filter(|record| filter.map_or(true, |f| f.permits(&record.application)))
            .map(|record| record.application.clone())
            .collect();
        applications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(applications)
    }

    async fn status_summary(
        &self,
        filter: Option<&EntityFilter>,
    ) -> Result<StatusSummary, RepositoryError> {
        let records = self.records.read().await;
        let mut summary = StatusSummary::default();
        for record in records.values() {
            if filter.map_or(true, |f| f.permits(&record.application)) {
                summary.observe(record.application.status);
            }
        }
        Ok(summary)
    }

    async fn audit_log(
        &self,
        id: &ApplicationId,
        filter: Option<&EntityFilter>,
    ) -> Result<Vec<AuditLogEntry>, RepositoryError> {
        let records = self.records.read().await;
        permitted(records.get(&id.0), id, filter).map(|record| record.audit.clone())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use crate::domain::{Application, ApplicationId, ApplicationStatus};
    use crate::lifecycle::ApprovalParty;
    use crate::scope::EntityFilter;

    use super::{ApplicationRepository, InMemoryApplicationRepository, RepositoryError};

    fn application(id: &str, assigned_to: &str, company_id: &str) -> Application {
        let now = Utc::now();
        Application {
            id: ApplicationId(id.to_string()),
            product_type: "equipment_loan".to_string(),
            requested_amount: Decimal::new(12_000_000, 2),
            status: ApplicationStatus::Pending,
            client_name: "Pedro Ramos".to_string(),
            client_email: "pedro@example.com".to_string(),
            company_id: Some(company_id.to_string()),
            company_name: Some("Acme Ltda".to_string()),
            assigned_to: Some(assigned_to.to_string()),
            advisor_name: Some("Ana Soto".to_string()),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn advisor_filter_hides_foreign_applications() {
        let repo = InMemoryApplicationRepository::default();
        repo.create(application("APP-1", "adv-1", "c-1")).await.expect("create");

        let id = ApplicationId("APP-1".to_string());
        let own = EntityFilter::for_advisor("adv-1");
        let foreign = EntityFilter::for_advisor("adv-2");

        repo.find_by_id(&id, Some(&own)).await.expect("own scope sees the record");
        repo.find_by_id(&id, None).await.expect("unrestricted sees the record");
        let error = repo.find_by_id(&id, Some(&foreign)).await.expect_err("foreign scope");
        assert_eq!(error, RepositoryError::NotFound { application_id: id });
    }

    #[tokio::test]
    async fn duplicate_advisor_approval_conflicts_and_keeps_first_date() {
        let repo = InMemoryApplicationRepository::default();
        repo.create(application("APP-1", "adv-1", "c-1")).await.expect("create");
        let id = ApplicationId("APP-1".to_string());

        repo.record_advisor_approval(&id, "first", "adv-1", None).await.expect("first approval");
        let first = repo.approval_status(&id, None).await.expect("read");

        let error = repo
            .record_advisor_approval(&id, "second", "adv-1", None)
            .await
            .expect_err("duplicate");
        assert_eq!(error, RepositoryError::AlreadyApproved { party: ApprovalParty::Advisor });

        let after = repo.approval_status(&id, None).await.expect("read");
        assert_eq!(after.approval_date_advisor, first.approval_date_advisor);
    }

    #[tokio::test]
    async fn second_approval_auto_advances_status() {
        let repo = InMemoryApplicationRepository::default();
        repo.create(application("APP-1", "adv-1", "c-1")).await.expect("create");
        let id = ApplicationId("APP-1".to_string());

        repo.record_company_approval(&id, "company ok", "adm-1", "c-1", None)
            .await
            .expect("company approval");
        assert_eq!(
            repo.find_by_id(&id, None).await.expect("read").status,
            ApplicationStatus::Pending,
        );

        repo.record_advisor_approval(&id, "advisor ok", "adv-1", None)
            .await
            .expect("advisor approval");
        assert_eq!(
            repo.find_by_id(&id, None).await.expect("read").status,
            ApplicationStatus::Approved,
        );
    }

    #[tokio::test]
    async fn company_approval_requires_matching_company() {
        let repo = InMemoryApplicationRepository::default();
        repo.create(application("APP-1", "adv-1", "c-1")).await.expect("create");
        let id = ApplicationId("APP-1".to_string());

        let error = repo
            .record_company_approval(&id, "note", "adm-1", "c-2", None)
            .await
            .expect_err("wrong company");
        assert!(matches!(error, RepositoryError::NotFound { .. }));

        let error = repo
            .record_company_approval(&id, "note", "adm-1", "  ", None)
            .await
            .expect_err("blank company id");
        assert_eq!(error, RepositoryError::MissingCompanyId);
    }

    #[tokio::test]
    async fn summary_and_list_honor_scope() {
        let repo = InMemoryApplicationRepository::default();
        repo.create(application("APP-1", "adv-1", "c-1")).await.expect("create");
        repo.create(application("APP-2", "adv-1", "c-2")).await.expect("create");
        repo.create(application("APP-3", "adv-2", "c-1")).await.expect("create");

        let scoped = EntityFilter::for_advisor("adv-1");
        let listed = repo.list(Some(&scoped)).await.expect("list");
        assert_eq!(listed.len(), 2);

        let summary = repo.status_summary(Some(&EntityFilter::for_company("c-1"))).await.expect("summary");
        assert_eq!(summary.total, 2);
        assert_eq!(summary.pending, 2);
    }
}
