use serde_json::json;

use crediflow_core::config::AppConfig;

use super::{open_runtime_and_pool, CommandResult};

pub fn run(config: &AppConfig) -> CommandResult {
    let (runtime, pool) = match open_runtime_and_pool("seed", config) {
        Ok(parts) => parts,
        Err(result) => return result,
    };

    match runtime.block_on(crediflow_db::seed_demo_data(&pool)) {
        Ok(summary) => CommandResult::success_with_data(
            "seed",
            format!(
                "demo dataset loaded: {} inserted, {} already present",
                summary.inserted, summary.skipped
            ),
            Some(json!({ "inserted": summary.inserted, "skipped": summary.skipped })),
        ),
        Err(error) => {
            CommandResult::failure("seed", "seed", format!("seeding failed: {error}"), 5)
        }
    }
}
