//! Deterministic demo dataset for local development and smoke checks.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use tracing::info;

use crediflow_core::repository::{ApplicationRepository, RepositoryError};
use crediflow_core::{Application, ApplicationId, ApplicationStatus};

use crate::repositories::SqlApplicationRepository;
use crate::DbPool;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub inserted: usize,
    pub skipped: usize,
}

fn demo_applications() -> Vec<Application> {
    let base = Utc::now() - Duration::days(14);
    let entries = [
        ("APP-2026-0001", "working_capital", 12_500_000i64, "Rosa Carvajal", "rosa@lacteosdelsur.cl", "c-lacteos", "Lácteos del Sur", "adv-maria", "María Paz Ortega", 0i64),
        ("APP-2026-0002", "equipment_loan", 48_000_000, "Héctor Brito", "hector@andinatransportes.cl", "c-andina", "Transportes Andina", "adv-maria", "María Paz Ortega", 2),
        ("APP-2026-0003", "working_capital", 6_900_000, "Paula Núñez", "paula@vinamarga.cl", "c-vinamarga", "Viña Marga", "adv-jorge", "Jorge Aliaga", 5),
        ("APP-2026-0004", "invoice_factoring", 21_300_000, "Iván Cortés", "ivan@lacteosdelsur.cl", "c-lacteos", "Lácteos del Sur", "adv-jorge", "Jorge Aliaga", 9),
    ];

    entries
        .into_iter()
        .enumerate()
        .map(|(offset, (id, product, amount, client, email, company_id, company, advisor_id, advisor, age_days))| {
            let created_at = base + Duration::days(age_days) + Duration::minutes(offset as i64);
            Application {
                id: ApplicationId(id.to_string()),
                product_type: product.to_string(),
                requested_amount: Decimal::new(amount, 2),
                status: ApplicationStatus::Pending,
                client_name: client.to_string(),
                client_email: email.to_string(),
                company_id: Some(company_id.to_string()),
                company_name: Some(company.to_string()),
                assigned_to: Some(advisor_id.to_string()),
                advisor_name: Some(advisor.to_string()),
                created_at,
                updated_at: created_at,
            }
        })
        .collect()
}

/// Inserts the demo applications, skipping ids that already exist so the
/// seed can be re-run safely.
pub async fn seed_demo_data(pool: &DbPool) -> Result<SeedSummary, RepositoryError> {
    let repo = SqlApplicationRepository::new(pool.clone());
    let mut summary = SeedSummary::default();

    for application in demo_applications() {
        match repo.find_by_id(&application.id, None).await {
            Ok(_) => summary.skipped += 1,
            Err(RepositoryError::NotFound { .. }) => {
                repo.create(application).await?;
                summary.inserted += 1;
            }
            Err(other) => return Err(other),
        }
    }

    info!(inserted = summary.inserted, skipped = summary.skipped, "demo dataset seeded");
    Ok(summary)
}
