use std::sync::Arc;

use serde_json::json;

use crediflow_core::config::AppConfig;
use crediflow_core::{Actor, ApplicationId, ApprovalOrchestrator, Role};
use crediflow_db::SqlApplicationRepository;

use crate::PartyArg;

use super::{open_runtime_and_pool, workflow_failure, CommandResult};

pub fn run(
    config: &AppConfig,
    id: &str,
    party: PartyArg,
    actor_id: &str,
    company_id: Option<&str>,
) -> CommandResult {
    let actor = match party {
        PartyArg::Advisor => Actor {
            id: actor_id.to_string(),
            name: actor_id.to_string(),
            role: Role::Advisor,
            company_id: None,
        },
        PartyArg::Company => {
            let Some(company_id) = company_id else {
                return CommandResult::failure(
                    "approve",
                    "missing_company_id",
                    "--company-id is required when approving as the company",
                    2,
                );
            };
            Actor {
                id: actor_id.to_string(),
                name: actor_id.to_string(),
                role: Role::CompanyAdmin,
                company_id: Some(company_id.to_string()),
            }
        }
    };

    let (runtime, pool) = match open_runtime_and_pool("approve", config) {
        Ok(parts) => parts,
        Err(result) => return result,
    };

    let orchestrator = ApprovalOrchestrator::new(Arc::new(SqlApplicationRepository::new(pool)));
    let application_id = ApplicationId(id.to_string());

    runtime.block_on(async {
        let outcome = match party {
            PartyArg::Advisor => orchestrator.approve_as_advisor(&application_id, &actor).await,
            PartyArg::Company => orchestrator.approve_as_company(&application_id, &actor).await,
        };

        match outcome {
            Ok((application, approval)) => CommandResult::success_with_data(
                "approve",
                if approval.fully_approved() {
                    format!("both parties have approved; {} is now {}", application.id, application.status)
                } else {
                    format!("approval recorded; {} remains {}", application.id, application.status)
                },
                Some(json!({ "application": application, "approval": approval })),
            ),
            Err(error) => workflow_failure("approve", &error),
        }
    })
}
