use anyhow::{Context, Result};
use std::io::{BufRead, IsTerminal};

use crate::api::{applications, ApiClient, ApiResult, ResourceRef};
use crate::error::UsageError;

/// Targets from the command line, or one per line from stdin when none were
/// given and stdin is not a terminal
pub fn collect_targets(args: Vec<String>) -> Result<Vec<String>> {
    if !args.is_empty() {
        return Ok(args);
    }
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Err(missing_targets().into());
    }
    targets_from_reader(stdin.lock())
}

pub fn targets_from_reader(reader: impl BufRead) -> Result<Vec<String>> {
    let mut targets = Vec::new();
    for line in reader.lines() {
        let line = line.context("Failed to read application IDs from stdin")?;
        let line = line.trim();
        if !line.is_empty() {
            targets.push(line.to_string());
        }
    }
    if targets.is_empty() {
        return Err(missing_targets().into());
    }
    Ok(targets)
}

fn missing_targets() -> UsageError {
    UsageError::new("Missing argument 'APPLICATION_ID_OR_NAME...'.")
}

async fn remove_app(client: &ApiClient, target: &str) -> ApiResult<()> {
    let app_id = applications::resolve_id(client, &ResourceRef::parse(target)).await?;
    applications::delete(client, &app_id).await
}

/// `drapps terminate`. Missing or forbidden applications are reported and
/// skipped; any other failure stops the run.
pub async fn terminate(client: &ApiClient, targets: &[String]) -> Result<()> {
    for target in targets {
        match remove_app(client, target).await {
            Ok(()) => println!("Custom application {} was deleted.", target),
            Err(e) if e.is_not_found() => eprintln!("Cannot find application {}.", target),
            Err(e) if e.is_forbidden() => eprintln!("No permissions for deleting {}.", target),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to delete application {}", target))
            }
        }
    }
    Ok(())
}
