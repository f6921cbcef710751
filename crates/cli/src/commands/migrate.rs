use crediflow_core::config::AppConfig;

use super::{open_runtime_and_pool, CommandResult};

pub fn run(config: &AppConfig) -> CommandResult {
    let (runtime, pool) = match open_runtime_and_pool("migrate", config) {
        Ok(parts) => parts,
        Err(result) => return result,
    };

    match runtime.block_on(crediflow_db::migrations::run_pending(&pool)) {
        Ok(()) => CommandResult::success("migrate", "database schema is up to date"),
        Err(error) => CommandResult::failure(
            "migrate",
            "migration",
            format!("migration failed: {error}"),
            5,
        ),
    }
}
