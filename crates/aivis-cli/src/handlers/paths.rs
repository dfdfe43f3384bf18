//! `paths`: where aivis-mcp keeps its files.

use aivis_core::paths;

use crate::error::CliError;

fn lines() -> Result<Vec<(&'static str, String)>, CliError> {
    Ok(vec![
        ("settings", paths::settings_path()?.display().to_string()),
        ("worker_log", paths::worker_log_path()?.display().to_string()),
        (
            "store_start_lock",
            paths::store_start_lock_path().display().to_string(),
        ),
    ])
}

pub fn execute() -> Result<(), CliError> {
    for (key, value) in lines()? {
        println!("{key} = {value}");
    }
    Ok(())
}
