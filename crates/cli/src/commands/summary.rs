use std::sync::Arc;

use serde_json::json;

use crediflow_core::config::AppConfig;
use crediflow_core::ApprovalOrchestrator;
use crediflow_db::SqlApplicationRepository;

use super::{open_runtime_and_pool, operator_actor, workflow_failure, CommandResult};

pub fn run(config: &AppConfig) -> CommandResult {
    let (runtime, pool) = match open_runtime_and_pool("summary", config) {
        Ok(parts) => parts,
        Err(result) => return result,
    };

    let orchestrator = ApprovalOrchestrator::new(Arc::new(SqlApplicationRepository::new(pool)));
    let operator = operator_actor("cli-operator");

    runtime.block_on(async {
        match orchestrator.status_summary(&operator).await {
            Ok(summary) => CommandResult::success_with_data(
                "summary",
                format!("{} applications tracked", summary.total),
                Some(json!(summary)),
            ),
            Err(error) => workflow_failure("summary", &error),
        }
    })
}
