use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use reqwest::Body;
use std::path::Path;
use std::time::Duration;
use tokio_util::io::ReaderStream;
use tracing::info;

use crate::api::{environments, ApiClient};
use crate::error::{DeployError, UsageError};
use crate::poller::{self, PollState, Poller};

/// Multipart field for a prebuilt image archive
pub const DOCKER_IMAGE_FIELD: &str = "docker_image";
/// Multipart field for a docker context (Dockerfile plus files) archive
pub const DOCKER_CONTEXT_FIELD: &str = "docker_context";

pub fn check_archive(param: &str, archive: &Path) -> Result<(), UsageError> {
    if archive.is_file() {
        Ok(())
    } else {
        Err(UsageError::for_param(
            param,
            format!("File '{}' does not exist.", archive.display()),
        ))
    }
}

/// Upload an archive as a new version of `environment_id` and wait for the
/// image build. Returns the new version ID.
pub async fn upload_image_and_wait(
    client: &ApiClient,
    environment_id: &str,
    archive: &Path,
    field: &'static str,
    interval: Duration,
) -> Result<String> {
    let file_name = archive
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "image.tar".to_string());
    println!("Uploading {} to Data Robot.", file_name);

    let handle = tokio::fs::File::open(archive)
        .await
        .with_context(|| format!("Failed to open {}", archive.display()))?;
    let len = handle.metadata().await?.len();
    info!("Uploading {} bytes as {}", len, field);

    let part = Part::stream_with_length(Body::wrap_stream(ReaderStream::new(handle)), len)
        .file_name(file_name)
        .mime_str("application/octet-stream")?;
    let version = environments::create_version(client, environment_id, Form::new().part(field, part))
        .await
        .context("Failed to upload image")?;

    println!("Waiting till image is ready...");
    let version_id = version.id.as_str();
    let outcome = Poller::new("Image build", interval)
        .poll(move || poller::image_build_state(client, environment_id, version_id))
        .await?;

    if outcome.state == PollState::Failed {
        return Err(DeployError::ImageBuildFailed {
            environment_id: environment_id.to_string(),
            version_id: version.id.clone(),
        }
        .into());
    }

    Ok(version.id)
}

/// `create-env`: new execution environment built from a docker context archive
pub async fn create_env(
    client: &ApiClient,
    name: &str,
    archive: &Path,
    description: Option<&str>,
    interval: Duration,
) -> Result<()> {
    check_archive("'-i' / '--dockerfilezip'", archive)?;

    println!("Creating execution environment");
    let environment = environments::create(client, name, description)
        .await
        .context("Failed to create execution environment")?;
    println!("Created execution environment {} ({})", environment.name, environment.id);

    upload_image_and_wait(client, &environment.id, archive, DOCKER_CONTEXT_FIELD, interval).await?;
    println!("Execution environment {} is ready.", name);
    Ok(())
}
