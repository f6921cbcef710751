use serde_json::json;

use crediflow_core::config::AppConfig;
use crediflow_core::repository::ApplicationRepository;
use crediflow_core::{EntityFilter, WorkflowError};
use crediflow_db::SqlApplicationRepository;

use super::{open_runtime_and_pool, workflow_failure, CommandResult};

pub fn run(
    config: &AppConfig,
    advisor_id: Option<&str>,
    company_id: Option<&str>,
) -> CommandResult {
    // No narrowing flags means an unrestricted listing, not an empty filter.
    let filter = match (advisor_id, company_id) {
        (None, None) => None,
        (advisor_id, company_id) => Some(EntityFilter {
            advisor_id: advisor_id.map(str::to_string),
            company_id: company_id.map(str::to_string),
        }),
    };

    let (runtime, pool) = match open_runtime_and_pool("list", config) {
        Ok(parts) => parts,
        Err(result) => return result,
    };

    let repository = SqlApplicationRepository::new(pool);
    runtime.block_on(async {
        match repository.list(filter.as_ref()).await {
            Ok(applications) => CommandResult::success_with_data(
                "list",
                format!("{} application(s)", applications.len()),
                Some(json!({ "applications": applications })),
            ),
            Err(error) => workflow_failure("list", &WorkflowError::from(error)),
        }
    })
}
