use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Row, Sqlite, Transaction};
use uuid::Uuid;

use crediflow_core::lifecycle::{self, ApprovalParty};
use crediflow_core::repository::{
    ApplicationRepository, AuditLogEntry, RepositoryError, StatusSummary,
};
use crediflow_core::scope::EntityFilter;
use crediflow_core::{Application, ApplicationId, ApplicationStatus, ApprovalStatus};

use crate::DbPool;

pub struct SqlApplicationRepository {
    pool: DbPool,
}

impl SqlApplicationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn backend(error: sqlx::Error) -> RepositoryError {
    RepositoryError::Backend(error.to_string())
}

fn decode(message: impl Into<String>) -> RepositoryError {
    RepositoryError::Corrupt(message.into())
}

fn parse_timestamp(raw: &str, column: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| decode(format!("column `{column}` is not an RFC 3339 timestamp: {e}")))
}

fn row_to_application(row: &sqlx::sqlite::SqliteRow) -> Result<Application, RepositoryError> {
    let id: String = row.try_get("id").map_err(backend)?;
    let product_type: String = row.try_get("product_type").map_err(backend)?;
    let amount_str: String = row.try_get("requested_amount").map_err(backend)?;
    let status_str: String = row.try_get("status").map_err(backend)?;
    let client_name: String = row.try_get("client_name").map_err(backend)?;
    let client_email: String = row.try_get("client_email").map_err(backend)?;
    let company_id: Option<String> = row.try_get("company_id").map_err(backend)?;
    let company_name: Option<String> = row.try_get("company_name").map_err(backend)?;
    let assigned_to: Option<String> = row.try_get("assigned_to").map_err(backend)?;
    let advisor_name: Option<String> = row.try_get("advisor_name").map_err(backend)?;
    let created_at_str: String = row.try_get("created_at").map_err(backend)?;
    let updated_at_str: String = row.try_get("updated_at").map_err(backend)?;

    let requested_amount: Decimal = amount_str
        .parse()
        .map_err(|e| decode(format!("column `requested_amount` is not a decimal: {e}")))?;
    let status = ApplicationStatus::parse(&status_str)
        .ok_or_else(|| decode(format!("unknown application status `{status_str}`")))?;

    Ok(Application {
        id: ApplicationId(id),
        product_type,
        requested_amount,
        status,
        client_name,
        client_email,
        company_id,
        company_name,
        assigned_to,
        advisor_name,
        created_at: parse_timestamp(&created_at_str, "created_at")?,
        updated_at: parse_timestamp(&updated_at_str, "updated_at")?,
    })
}

fn row_to_approval(row: &sqlx::sqlite::SqliteRow) -> Result<ApprovalStatus, RepositoryError> {
    let approved_by_advisor: i64 = row.try_get("approved_by_advisor").map_err(backend)?;
    let approved_by_company: i64 = row.try_get("approved_by_company").map_err(backend)?;
    let advisor_date_str: Option<String> =
        row.try_get("approval_date_advisor").map_err(backend)?;
    let company_date_str: Option<String> =
        row.try_get("approval_date_company").map_err(backend)?;

    let approval = ApprovalStatus {
        approved_by_advisor: approved_by_advisor != 0,
        approved_by_company: approved_by_company != 0,
        approval_date_advisor: advisor_date_str
            .map(|s| parse_timestamp(&s, "approval_date_advisor"))
            .transpose()?,
        approval_date_company: company_date_str
            .map(|s| parse_timestamp(&s, "approval_date_company"))
            .transpose()?,
    };

    if !approval.is_consistent() {
        return Err(decode("approval flags and dates disagree"));
    }
    Ok(approval)
}

const APPLICATION_COLUMNS: &str = "id, product_type, requested_amount, status, client_name, \
     client_email, company_id, company_name, assigned_to, advisor_name, created_at, updated_at";

/// Builds the scope predicate appended to list/summary queries. An absent
/// filter adds nothing; a present filter with no populated field must match
/// nothing rather than silently widening.
fn scope_clause(filter: Option<&EntityFilter>) -> (&'static str, Vec<String>) {
    match filter {
        None => ("", Vec::new()),
        Some(filter) => match (&filter.advisor_id, &filter.company_id) {
            (Some(advisor_id), Some(company_id)) => (
                " WHERE assigned_to = ? AND company_id = ?",
                vec![advisor_id.clone(), company_id.clone()],
            ),
            (Some(advisor_id), None) => (" WHERE assigned_to = ?", vec![advisor_id.clone()]),
            (None, Some(company_id)) => (" WHERE company_id = ?", vec![company_id.clone()]),
            (None, None) => (" WHERE 0 = 1", Vec::new()),
        },
    }
}

impl SqlApplicationRepository {
    /// Fetches the application inside the given transaction and applies the
    /// scope predicate. A scope mismatch is indistinguishable from an
    /// absent record.
    async fn fetch_scoped(
        tx: &mut Transaction<'_, Sqlite>,
        id: &ApplicationId,
        filter: Option<&EntityFilter>,
    ) -> Result<Application, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {APPLICATION_COLUMNS} FROM application WHERE id = ?"
        ))
        .bind(&id.0)
        .fetch_optional(&mut **tx)
        .await
        .map_err(backend)?;

        let application = match row {
            Some(ref row) => row_to_application(row)?,
            None => return Err(RepositoryError::NotFound { application_id: id.clone() }),
        };

        if filter.map_or(true, |f| f.permits(&application)) {
            Ok(application)
        } else {
            Err(RepositoryError::NotFound { application_id: id.clone() })
        }
    }

    async fn fetch_approval(
        tx: &mut Transaction<'_, Sqlite>,
        id: &ApplicationId,
    ) -> Result<ApprovalStatus, RepositoryError> {
        let row = sqlx::query(
            "SELECT approved_by_advisor, approved_by_company,
                    approval_date_advisor, approval_date_company
             FROM application_approval WHERE application_id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&mut **tx)
        .await
        .map_err(backend)?;

        match row {
            Some(ref row) => row_to_approval(row),
            None => Err(RepositoryError::NotFound { application_id: id.clone() }),
        }
    }

    async fn append_audit(
        tx: &mut Transaction<'_, Sqlite>,
        id: &ApplicationId,
        action: &str,
        note: &str,
        actor_id: &str,
        occurred_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO application_audit_log (id, application_id, action, note, actor_id, occurred_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&id.0)
        .bind(action)
        .bind(note)
        .bind(actor_id)
        .bind(occurred_at.to_rfc3339())
        .execute(&mut **tx)
        .await
        .map_err(backend)?;
        Ok(())
    }

    /// Applies the auto-advance: if the approval record now has both flags,
    /// the status becomes `approved` within the same transaction as the
    /// approval write.
    async fn apply_derived_status(
        tx: &mut Transaction<'_, Sqlite>,
        id: &ApplicationId,
        approval: &ApprovalStatus,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        if let Some(next) = lifecycle::derived_status(approval) {
            sqlx::query("UPDATE application SET status = ?, updated_at = ? WHERE id = ?")
                .bind(next.as_str())
                .bind(now.to_rfc3339())
                .bind(&id.0)
                .execute(&mut **tx)
                .await
                .map_err(backend)?;
        }
        Ok(())
    }
}

#[async_trait]
impl ApplicationRepository for SqlApplicationRepository {
    async fn create(&self, application: Application) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        sqlx::query(&format!(
            "INSERT INTO application ({APPLICATION_COLUMNS})
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(&application.id.0)
        .bind(&application.product_type)
        .bind(application.requested_amount.to_string())
        .bind(application.status.as_str())
        .bind(&application.client_name)
        .bind(&application.client_email)
        .bind(&application.company_id)
        .bind(&application.company_name)
        .bind(&application.assigned_to)
        .bind(&application.advisor_name)
        .bind(application.created_at.to_rfc3339())
        .bind(application.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        sqlx::query("INSERT INTO application_approval (application_id) VALUES (?)")
            .bind(&application.id.0)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        tx.commit().await.map_err(backend)
    }

    async fn find_by_id(
        &self,
        id: &ApplicationId,
        filter: Option<&EntityFilter>,
    ) -> Result<Application, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let application = Self::fetch_scoped(&mut tx, id, filter).await?;
        tx.commit().await.map_err(backend)?;
        Ok(application)
    }

    async fn approval_status(
        &self,
        id: &ApplicationId,
        filter: Option<&EntityFilter>,
    ) -> Result<ApprovalStatus, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        Self::fetch_scoped(&mut tx, id, filter).await?;
        let approval = Self::fetch_approval(&mut tx, id).await?;
        tx.commit().await.map_err(backend)?;
        Ok(approval)
    }

    async fn record_advisor_approval(
        &self,
        id: &ApplicationId,
        note: &str,
        actor_id: &str,
        filter: Option<&EntityFilter>,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        Self::fetch_scoped(&mut tx, id, filter).await?;
        let mut approval = Self::fetch_approval(&mut tx, id).await?;

        if approval.approved_by_advisor {
            return Err(RepositoryError::AlreadyApproved { party: ApprovalParty::Advisor });
        }

        let now = Utc::now();
        sqlx::query(
            "UPDATE application_approval
             SET approved_by_advisor = 1, approval_date_advisor = ?
             WHERE application_id = ?",
        )
        .bind(now.to_rfc3339())
        .bind(&id.0)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        approval.approved_by_advisor = true;
        approval.approval_date_advisor = Some(now);
        Self::apply_derived_status(&mut tx, id, &approval, now).await?;
        Self::append_audit(&mut tx, id, "advisor_approval", note, actor_id, now).await?;

        tx.commit().await.map_err(backend)
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

        let mut tx = self.pool.begin().await.map_err(backend)?;
        let application = Self::fetch_scoped(&mut tx, id, filter).await?;
        if application.company_id.as_deref() != Some(company_id) {
            return Err(RepositoryError::NotFound { application_id: id.clone() });
        }

        let mut approval = Self::fetch_approval(&mut tx, id).await?;
        if approval.approved_by_company {
            return Err(RepositoryError::AlreadyApproved { party: ApprovalParty::Company });
        }

        let now = Utc::now();
        sqlx::query(
            "UPDATE application_approval
             SET approved_by_company = 1, approval_date_company = ?
             WHERE application_id = ?",
        )
        .bind(now.to_rfc3339())
        .bind(&id.0)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        approval.approved_by_company = true;
        approval.approval_date_company = Some(now);
        Self::apply_derived_status(&mut tx, id, &approval, now).await?;
        Self::append_audit(&mut tx, id, "company_approval", note, actor_id, now).await?;

        tx.commit().await.map_err(backend)
    }

    async fn set_status(
        &self,
        id: &ApplicationId,
        new_status: ApplicationStatus,
        note: &str,
        actor_id: &str,
        filter: Option<&EntityFilter>,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        Self::fetch_scoped(&mut tx, id, filter).await?;

        let now = Utc::now();
        sqlx::query("UPDATE application SET status = ?, updated_at = ? WHERE id = ?")
            .bind(new_status.as_str())
            .bind(now.to_rfc3339())
            .bind(&id.0)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        let action = format!("status_change:{new_status}");
        Self::append_audit(&mut tx, id, &action, note, actor_id, now).await?;

        tx.commit().await.map_err(backend)
    }

    async fn list(
        &self,
        filter: Option<&EntityFilter>,
    ) -> Result<Vec<Application>, RepositoryError> {
        let (clause, binds) = scope_clause(filter);
        let sql = format!(
            "SELECT {APPLICATION_COLUMNS} FROM application{clause} ORDER BY created_at DESC"
        );

        let mut query = sqlx::query(&sql);
        for bind in &binds {
            query = query.bind(bind);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(backend)?;
        rows.iter().map(row_to_application).collect()
    }

    async fn status_summary(
        &self,
        filter: Option<&EntityFilter>,
    ) -> Result<StatusSummary, RepositoryError> {
        let (clause, binds) = scope_clause(filter);
        let sql = format!("SELECT status FROM application{clause}");

        let mut query = sqlx::query(&sql);
        for bind in &binds {
            query = query.bind(bind);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(backend)?;
        let mut summary = StatusSummary::default();
        for row in &rows {
            let status_str: String = row.try_get("status").map_err(backend)?;
            let status = ApplicationStatus::parse(&status_str)
                .ok_or_else(|| decode(format!("unknown application status `{status_str}`")))?;
            summary.observe(status);
        }
        Ok(summary)
    }

    async fn audit_log(
        &self,
        id: &ApplicationId,
        filter: Option<&EntityFilter>,
    ) -> Result<Vec<AuditLogEntry>, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        Self::fetch_scoped(&mut tx, id, filter).await?;

        let rows = sqlx::query(
            "SELECT application_id, action, note, actor_id, occurred_at
             FROM application_audit_log
             WHERE application_id = ?
             ORDER BY occurred_at ASC, rowid ASC",
        )
        .bind(&id.0)
        .fetch_all(&mut *tx)
        .await
        .map_err(backend)?;
        tx.commit().await.map_err(backend)?;

        rows.iter()
            .map(|row| {
                let application_id: String = row.try_get("application_id").map_err(backend)?;
                let action: String = row.try_get("action").map_err(backend)?;
                let note: String = row.try_get("note").map_err(backend)?;
                let actor_id: String = row.try_get("actor_id").map_err(backend)?;
                let occurred_at_str: String = row.try_get("occurred_at").map_err(backend)?;
                Ok(AuditLogEntry {
                    application_id: ApplicationId(application_id),
                    action,
                    note,
                    actor_id,
                    occurred_at: parse_timestamp(&occurred_at_str, "occurred_at")?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use crediflow_core::lifecycle::ApprovalParty;
    use crediflow_core::repository::{ApplicationRepository, RepositoryError};
    use crediflow_core::scope::EntityFilter;
    use crediflow_core::{Application, ApplicationId, ApplicationStatus};

    use super::SqlApplicationRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn sample_application(id: &str, advisor_id: &str, company_id: &str) -> Application {
        let now = Utc::now();
        Application {
            id: ApplicationId(id.to_string()),
            product_type: "working_capital".to_string(),
            requested_amount: Decimal::new(7_500_000, 2),
            status: ApplicationStatus::Pending,
            client_name: "Valentina Reyes".to_string(),
            client_email: "valentina@example.com".to_string(),
            company_id: Some(company_id.to_string()),
            company_name: Some("Comercial Andina".to_string()),
            assigned_to: Some(advisor_id.to_string()),
            advisor_name: Some("Mario Silva".to_string()),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn create_and_find_round_trip() {
        let pool = setup().await;
        let repo = SqlApplicationRepository::new(pool);
        let application = sample_application("APP-001", "adv-1", "c-1");

        repo.create(application.clone()).await.expect("create");
        let found = repo
            .find_by_id(&ApplicationId("APP-001".to_string()), None)
            .await
            .expect("find");

        assert_eq!(found.id, application.id);
        assert_eq!(found.requested_amount, application.requested_amount);
        assert_eq!(found.status, ApplicationStatus::Pending);

        let approval = repo
            .approval_status(&ApplicationId("APP-001".to_string()), None)
            .await
            .expect("approval record created with the application");
        assert!(!approval.approved_by_advisor);
        assert!(!approval.approved_by_company);
    }

    #[tokio::test]
    async fn scoped_lookup_rejects_foreign_advisor() {
        let pool = setup().await;
        let repo = SqlApplicationRepository::new(pool);
        repo.create(sample_application("APP-001", "adv-1", "c-1")).await.expect("create");

        let id = ApplicationId("APP-001".to_string());
        repo.find_by_id(&id, Some(&EntityFilter::for_advisor("adv-1")))
            .await
            .expect("own advisor sees it");

        let error = repo
            .find_by_id(&id, Some(&EntityFilter::for_advisor("adv-9")))
            .await
            .expect_err("foreign advisor blocked");
        assert_eq!(error, RepositoryError::NotFound { application_id: id });
    }

    #[tokio::test]
    async fn advisor_approval_is_conflict_on_duplicate() {
        let pool = setup().await;
        let repo = SqlApplicationRepository::new(pool);
        repo.create(sample_application("APP-001", "adv-1", "c-1")).await.expect("create");
        let id = ApplicationId("APP-001".to_string());

        repo.record_advisor_approval(&id, "ok", "adv-1", None).await.expect("first");
        let first = repo.approval_status(&id, None).await.expect("read");
        assert!(first.approved_by_advisor);
        assert!(first.approval_date_advisor.is_some());

        let error =
            repo.record_advisor_approval(&id, "again", "adv-1", None).await.expect_err("dup");
        assert_eq!(error, RepositoryError::AlreadyApproved { party: ApprovalParty::Advisor });

        let after = repo.approval_status(&id, None).await.expect("read");
        assert_eq!(after.approval_date_advisor, first.approval_date_advisor);
    }

    #[tokio::test]
    async fn both_approvals_auto_advance_status_in_the_same_write() {
        let pool = setup().await;
        let repo = SqlApplicationRepository::new(pool);
        repo.create(sample_application("APP-001", "adv-1", "c-1")).await.expect("create");
        let id = ApplicationId("APP-001".to_string());

        repo.record_advisor_approval(&id, "advisor ok", "adv-1", None).await.expect("advisor");
        assert_eq!(repo.find_by_id(&id, None).await.expect("read").status, ApplicationStatus::Pending);

        repo.record_company_approval(&id, "company ok", "adm-1", "c-1", None)
            .await
            .expect("company");
        assert_eq!(
            repo.find_by_id(&id, None).await.expect("read").status,
            ApplicationStatus::Approved,
        );
    }

    #[tokio::test]
    async fn company_approval_validates_company_context() {
        let pool = setup().await;
        let repo = SqlApplicationRepository::new(pool);
        repo.create(sample_application("APP-001", "adv-1", "c-1")).await.expect("create");
        let id = ApplicationId("APP-001".to_string());

        let error = repo
            .record_company_approval(&id, "note", "adm-1", "", None)
            .await
            .expect_err("blank company id");
        assert_eq!(error, RepositoryError::MissingCompanyId);

        let error = repo
            .record_company_approval(&id, "note", "adm-1", "c-2", None)
            .await
            .expect_err("mismatched company");
        assert!(matches!(error, RepositoryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn every_mutation_appends_an_audit_row() {
        let pool = setup().await;
        let repo = SqlApplicationRepository::new(pool);
        repo.create(sample_application("APP-001", "adv-1", "c-1")).await.expect("create");
        let id = ApplicationId("APP-001".to_string());

        repo.record_advisor_approval(&id, "advisor ok", "adv-1", None).await.expect("advisor");
        repo.record_company_approval(&id, "company ok", "adm-1", "c-1", None)
            .await
            .expect("company");
        repo.set_status(&id, ApplicationStatus::PorDispersar, "disburse", "adv-1", None)
            .await
            .expect("set status");

        let log = repo.audit_log(&id, None).await.expect("audit log");
        assert_eq!(log.len(), 3);
        assert_eq!(log[0].action, "advisor_approval");
        assert_eq!(log[1].action, "company_approval");
        assert_eq!(log[2].action, "status_change:por_dispersar");
        assert_eq!(log[2].note, "disburse");
    }

    #[tokio::test]
    async fn list_and_summary_apply_scope_clause() {
        let pool = setup().await;
        let repo = SqlApplicationRepository::new(pool);
        repo.create(sample_application("APP-001", "adv-1", "c-1")).await.expect("create");
        repo.create(sample_application("APP-002", "adv-1", "c-2")).await.expect("create");
        repo.create(sample_application("APP-003", "adv-2", "c-1")).await.expect("create");

        let by_advisor = repo.list(Some(&EntityFilter::for_advisor("adv-1"))).await.expect("list");
        assert_eq!(by_advisor.len(), 2);

        let by_company = repo
            .status_summary(Some(&EntityFilter::for_company("c-1")))
            .await
            .expect("summary");
        assert_eq!(by_company.total, 2);
        assert_eq!(by_company.pending, 2);

        let empty_filter = EntityFilter::default();
        let nothing = repo.list(Some(&empty_filter)).await.expect("empty filter list");
        assert!(nothing.is_empty());
    }
}
