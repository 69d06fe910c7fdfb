use anyhow::{Context, Result};
use std::time::Duration;

use crate::api::models::UpdateApplicationRequest;
use crate::api::{applications, ApiClient, ResourceRef};
use crate::cli::wait_until_running;
use crate::error::{DeployError, UsageError};

/// `drapps publish`: rename an application and/or switch it to the source
/// version another application runs
pub async fn publish(
    client: &ApiClient,
    application: &str,
    new_name: Option<&str>,
    source_application: Option<&str>,
    skip_wait: bool,
    interval: Duration,
) -> Result<()> {
    if new_name.is_none() && source_application.is_none() {
        return Err(UsageError::new(
            "Nothing to publish: pass a new name (--name) and/or a source application (--source-application).",
        )
        .into());
    }

    let app_id = applications::resolve_id(client, &ResourceRef::parse(application)).await?;

    let mut request = UpdateApplicationRequest {
        name: new_name.map(str::to_string),
        ..Default::default()
    };
    if let Some(source) = source_application {
        let source_app = applications::resolve(client, &ResourceRef::parse(source)).await?;
        let version_id = source_app
            .custom_application_source_version_id
            .ok_or_else(|| DeployError::MissingSourceVersion(source.to_string()))?;
        request.custom_application_source_version_id = Some(version_id);
    }

    applications::update(client, &app_id, &request)
        .await
        .with_context(|| format!("Failed to update application {}", application))?;
    println!("Custom application {} was updated.", application);

    if !skip_wait {
        wait_until_running(client, &app_id, interval).await?;
    }
    Ok(())
}

/// `drapps revert-publish`: go back `by` entries in the publish history
pub async fn revert_publish(
    client: &ApiClient,
    application: &str,
    by: usize,
    skip_wait: bool,
    interval: Duration,
) -> Result<()> {
    if by == 0 {
        return Err(UsageError::for_param("'-b' / '--by'", "must be at least 1").into());
    }

    let app_id = applications::resolve_id(client, &ResourceRef::parse(application)).await?;
    let history = applications::history(client, &app_id)
        .await
        .with_context(|| format!("Failed to fetch history of application {}", application))?;
    let entry = history
        .get(by - 1)
        .ok_or_else(|| DeployError::HistoryOutOfRange {
            app: application.to_string(),
            by,
        })?;

    let request = UpdateApplicationRequest {
        custom_application_source_version_id: Some(entry.source_version_id.clone()),
        ..Default::default()
    };
    applications::update(client, &app_id, &request)
        .await
        .with_context(|| format!("Failed to update application {}", application))?;
    println!(
        "Custom application {} was reverted to source version {}.",
        application, entry.source_version_id
    );

    if !skip_wait {
        wait_until_running(client, &app_id, interval).await?;
    }
    Ok(())
}
