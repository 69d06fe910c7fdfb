use anyhow::{Context, Result};
use std::io::Write;
use std::time::Duration;
use tracing::debug;

use crate::api::{applications, ApiClient, ResourceRef};
use crate::poller::log_delta;

async fn fetch_runtime_log(client: &ApiClient, app_id: &str) -> Result<String> {
    let logs = applications::logs(client, app_id)
        .await
        .with_context(|| format!("Failed to fetch logs for application {}", app_id))?;
    Ok(logs.runtime_log())
}

fn emit(text: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(text.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

/// `drapps logs`. With `follow`, keeps polling and prints only what was
/// appended until the process is interrupted.
pub async fn show_logs(
    client: &ApiClient,
    application: &str,
    follow: bool,
    interval: Duration,
) -> Result<()> {
    let app_id = applications::resolve_id(client, &ResourceRef::parse(application)).await?;

    let mut seen = fetch_runtime_log(client, &app_id).await?;
    emit(&seen)?;

    if !follow {
        println!();
        return Ok(());
    }

    loop {
        tokio::time::sleep(interval).await;
        let current = fetch_runtime_log(client, &app_id).await?;
        match log_delta(&seen, &current) {
            Some(delta) => emit(delta)?,
            None => debug!("No new log records for {}", app_id),
        }
        seen = current;
    }
}
