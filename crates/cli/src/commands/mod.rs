pub mod approve;
pub mod list;
pub mod migrate;
pub mod seed;
pub mod set_status;
pub mod show;
pub mod summary;

use serde::Serialize;

use crediflow_core::config::AppConfig;
use crediflow_db::DbPool;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with_data(command, message, None)
    }

    pub fn success_with_data(
        command: &str,
        message: impl Into<String>,
        data: Option<serde_json::Value>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string_pretty(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// The CLI operates the backoffice with an unrestricted role; per-user
/// scope enforcement belongs to the interactive surfaces.
pub(crate) fn operator_actor(actor_id: &str) -> crediflow_core::Actor {
    crediflow_core::Actor {
        id: actor_id.to_string(),
        name: "CLI operator".to_string(),
        role: crediflow_core::Role::Superadmin,
        company_id: None,
    }
}

pub(crate) fn workflow_failure(
    command: &'static str,
    error: &crediflow_core::WorkflowError,
) -> CommandResult {
    use crediflow_core::WorkflowError;

    let error_class = match error {
        WorkflowError::NotFound { .. } => "not_found",
        WorkflowError::Forbidden { .. } => "forbidden",
        WorkflowError::InvalidTransition { .. } => "invalid_transition",
        WorkflowError::AlreadyApproved { .. } => "already_approved",
        WorkflowError::MissingCompanyContext => "missing_company_context",
        WorkflowError::Repository(_) => "repository",
    };
    let exit_code = if error.is_retryable() { 4 } else { 1 };
    CommandResult::failure(
        command,
        error_class,
        format!("{} ({error})", error.user_message()),
        exit_code,
    )
}

/// One-shot runtime plus connected pool. Exit codes are shared across
/// subcommands: 3 runtime init, 4 connectivity.
pub(crate) fn open_runtime_and_pool(
    command: &'static str,
    config: &AppConfig,
) -> Result<(tokio::runtime::Runtime, DbPool), CommandResult> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|error| {
            CommandResult::failure(
                command,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            )
        })?;

    let pool = runtime
        .block_on(crediflow_db::connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        ))
        .map_err(|error| {
            CommandResult::failure(command, "db_connectivity", error.to_string(), 4)
        })?;

    Ok((runtime, pool))
}
