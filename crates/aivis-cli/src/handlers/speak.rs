//! `speak`: queue text and, with `--sync`, wait for it to be played.

use std::time::Duration;

use aivis_coord::CompletionOutcome;
use aivis_core::{ConfigOverrides, RequestId, SpeechRequest};
use tracing::debug;

use crate::bootstrap;
use crate::commands::SpeakArgs;
use crate::error::CliError;

/// Queue payload for `args`; a sync call gets a fresh request id.
fn build_request(
    config: &aivis_core::AppConfig,
    args: &SpeakArgs,
) -> Result<SpeechRequest, CliError> {
    let mut request = config.build_request(args.joined_text(), args.wait);
    request.validate()?;
    if args.sync {
        request = request.with_request_id(RequestId::generate());
    }
    Ok(request)
}

pub async fn execute(overrides: &ConfigOverrides, args: &SpeakArgs) -> Result<(), CliError> {
    let config = bootstrap::resolve_config(overrides);
    let request = build_request(&config, args)?;
    if !config.has_api_key() {
        eprintln!("Warning: no API key configured; run `aivis-mcp init` or set AIVIS_API_KEY");
    }

    let coord = bootstrap::connect(&config).await?;
    let position = coord.queue().enqueue(&request).await?;
    let ensured = bootstrap::worker_supervisor(&coord, overrides)?
        .ensure_worker()
        .await?;
    debug!(position, ?ensured, "Queued");

    let Some(id) = &request.request_id else {
        println!("Queued (position {position})");
        return Ok(());
    };

    let timeout = Duration::from_secs(args.timeout) + request.pre_delay().unwrap_or_default();
    match coord.completion().await_completion(id, timeout).await? {
        CompletionOutcome::Completed => {
            println!("Done");
            Ok(())
        }
        CompletionOutcome::TimedOut { processing: true } => Err(CliError::General(format!(
            "Timed out after {}s; playback is still in progress",
            timeout.as_secs()
        ))),
        CompletionOutcome::TimedOut { processing: false } => Err(CliError::General(format!(
            "Timed out after {}s; the request failed or is still queued (see the worker log)",
            timeout.as_secs()
        ))),
    }
}
