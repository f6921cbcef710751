use std::sync::Arc;

use serde_json::json;

use crediflow_core::config::AppConfig;
use crediflow_core::{ApplicationId, ApplicationStatus, ApprovalOrchestrator};
use crediflow_db::SqlApplicationRepository;

use super::{open_runtime_and_pool, operator_actor, workflow_failure, CommandResult};

pub fn run(config: &AppConfig, id: &str, status: &str, actor_id: &str) -> CommandResult {
    let Some(new_status) = ApplicationStatus::parse(status) else {
        return CommandResult::failure(
            "set-status",
            "unknown_status",
            format!(
                "unknown status {status:?}; expected one of pending, in_review, approved, \
                 por_dispersar, completed, rejected"
            ),
            2,
        );
    };

    let (runtime, pool) = match open_runtime_and_pool("set-status", config) {
        Ok(parts) => parts,
        Err(result) => return result,
    };

    let orchestrator = ApprovalOrchestrator::new(Arc::new(SqlApplicationRepository::new(pool)));
    let application_id = ApplicationId(id.to_string());
    let operator = operator_actor(actor_id);

    runtime.block_on(async {
        match orchestrator.change_status(&application_id, &operator, new_status).await {
            Ok(application) => CommandResult::success_with_data(
                "set-status",
                format!("application {} is now {}", application.id, application.status),
                Some(json!({ "application": application })),
            ),
            Err(error) => workflow_failure("set-status", &error),
        }
    })
}
