use std::sync::Arc;

use serde_json::json;

use crediflow_core::config::AppConfig;
use crediflow_core::{ApplicationId, ApprovalOrchestrator};
use crediflow_db::SqlApplicationRepository;

use super::{open_runtime_and_pool, operator_actor, workflow_failure, CommandResult};

pub fn run(config: &AppConfig, id: &str) -> CommandResult {
    let (runtime, pool) = match open_runtime_and_pool("show", config) {
        Ok(parts) => parts,
        Err(result) => return result,
    };

    let orchestrator = ApprovalOrchestrator::new(Arc::new(SqlApplicationRepository::new(pool)));
    let application_id = ApplicationId(id.to_string());
    let operator = operator_actor("cli-operator");

    runtime.block_on(async {
        let application = match orchestrator.application(&application_id, &operator).await {
            Ok(application) => application,
            Err(error) => return workflow_failure("show", &error),
        };
        let approval = match orchestrator.approval_status(&application_id, &operator).await {
            Ok(approval) => approval,
            Err(error) => return workflow_failure("show", &error),
        };
        let trail = match orchestrator.audit_trail(&application_id, &operator).await {
            Ok(trail) => trail,
            Err(error) => return workflow_failure("show", &error),
        };

        CommandResult::success_with_data(
            "show",
            format!("application {} is {}", application.id, application.status),
            Some(json!({
                "application": application,
                "approval": approval,
                "audit_trail": trail,
            })),
        )
    })
}
