use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use crate::api::models::{CreateApplicationRequest, CreatedApplication};
use crate::api::{applications, environments, sources, ApiClient, ResourceRef};
use crate::cli::environment::{check_archive, upload_image_and_wait, DOCKER_IMAGE_FIELD};
use crate::cli::report_startup_failure;
use crate::error::UsageError;
use crate::poller::{self, PollSettings, PollState, Poller};
use crate::upload::{
    check_project, collect_runtime_parameters, CpuSize, ProjectUpload, ResourceSettings,
    SourceVersionTarget, UploadPipeline, UploadSettings,
};

const IMAGE_ENVIRONMENT_DESCRIPTION: &str =
    "Environment for prebuild image with a custom application.";

/// Options for `drapps create`
#[derive(Debug, Clone)]
pub struct CreateOptions<'a> {
    pub name: &'a str,
    pub base_env: Option<&'a str>,
    pub path: Option<&'a Path>,
    pub image: Option<&'a Path>,
    pub replicas: u32,
    pub cpu_size: CpuSize,
    pub use_session_affinity: bool,
    pub service_requests_on_root_path: bool,
    pub string_env_vars: &'a [(String, String)],
    pub numeric_env_vars: &'a [(String, String)],
    pub skip_wait: bool,
}

/// What the application is provisioned from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppSource<'a> {
    Image(&'a Path),
    Project { base_env: &'a str, path: &'a Path },
}

/// Check the mutually exclusive input modes
pub fn validate_parameters<'a>(
    base_env: Option<&'a str>,
    path: Option<&'a Path>,
    image: Option<&'a Path>,
    has_runtime_params: bool,
) -> Result<AppSource<'a>, UsageError> {
    match (base_env, path, image) {
        (None, None, None) => Err(UsageError::new(
            "Docker container (image) or execution environment (base-env) and project folder (path) are required for creating custom application.",
        )),
        (_, _, Some(_)) if base_env.is_some() || path.is_some() => Err(UsageError::new(
            "Docker container (image) should not be used with execution environment (base-env) or project folder (path).",
        )),
        (None, Some(_), None) | (Some(_), None, None) => Err(UsageError::new(
            "Execution environment (base-env) and project folder (path) are both required for creating custom application.",
        )),
        (_, _, Some(_)) if has_runtime_params => Err(UsageError::new(
            "Custom runtime params does not support direct image upload.",
        )),
        (_, _, Some(image)) => Ok(AppSource::Image(image)),
        (Some(base_env), Some(path), None) => Ok(AppSource::Project { base_env, path }),
    }
}

/// `drapps create`
pub async fn create_app(
    client: &ApiClient,
    upload_settings: UploadSettings,
    poll_settings: PollSettings,
    options: CreateOptions<'_>,
) -> Result<()> {
    let runtime_parameters =
        collect_runtime_parameters(options.string_env_vars, options.numeric_env_vars);
    let source = validate_parameters(
        options.base_env,
        options.path,
        options.image,
        !runtime_parameters.is_empty(),
    )?;

    match source {
        AppSource::Image(image) => check_archive("'-i' / '--image'", image)?,
        AppSource::Project { path, .. } => {
            if !path.is_dir() {
                return Err(UsageError::for_param(
                    "'-p' / '--path'",
                    format!("Directory '{}' does not exist.", path.display()),
                )
                .into());
            }
            check_project(path)?;
        }
    }

    if applications::is_name_in_use(client, options.name).await? {
        return Err(UsageError::for_param(
            "'APPLICATION_NAME'",
            format!("Name {} is used by other custom application", options.name),
        )
        .into());
    }

    let created = match source {
        AppSource::Image(image) => {
            create_from_image(client, poll_settings, image, options.name).await?
        }
        AppSource::Project { base_env, path } => {
            let base_environment_version_id = base_environment_version(client, base_env).await?;
            let target = new_source_version(client, &format!("{}Source", options.name)).await?;

            let upload = ProjectUpload {
                root: path,
                base_environment_version_id: &base_environment_version_id,
                resources: ResourceSettings::new(
                    options.replicas,
                    options.cpu_size,
                    options.use_session_affinity,
                    options.service_requests_on_root_path,
                ),
                runtime_parameters,
            };
            let report = UploadPipeline::new(client, upload_settings)
                .run(&target, &upload)
                .await?;
            info!(
                "Uploaded {} files in {} batches, {} runtime parameters",
                report.files, report.batches, report.runtime_parameters
            );

            start_app(
                client,
                CreateApplicationRequest {
                    name: options.name.to_string(),
                    application_source_id: Some(target.source_id),
                    environment_id: None,
                },
            )
            .await?
        }
    };

    let application = created.application;
    let status_url = match created.status_url {
        Some(url) if !options.skip_wait => url,
        _ => {
            println!(
                "Custom application {} was successfully created.",
                options.name
            );
            return Ok(());
        }
    };

    println!("Waiting till app is ready...");
    let url = status_url.as_str();
    let outcome = Poller::new("Application startup", poll_settings.app_start_interval())
        .poll(move || poller::job_state(client, url))
        .await?;

    if outcome.state == PollState::Succeeded {
        println!(
            "Custom application is running: {}",
            application.application_url.as_deref().unwrap_or_default()
        );
    } else {
        report_startup_failure(client, &application.id).await?;
    }

    Ok(())
}

/// ID of the latest version of the base environment
async fn base_environment_version(client: &ApiClient, base_env: &str) -> Result<String> {
    let environment = match environments::resolve(client, &ResourceRef::parse(base_env)).await {
        Ok(environment) => environment,
        Err(e) if e.is_not_found() => {
            return Err(UsageError::for_param(
                "'--base-env'",
                format!(
                    "Can't find {} that can be used for creating custom application",
                    base_env
                ),
            )
            .into())
        }
        Err(e) => return Err(e.into()),
    };

    environment
        .latest_version
        .map(|version| version.id)
        .ok_or_else(|| {
            UsageError::for_param(
                "'--base-env'",
                format!("Can't find last version for environment {}.", base_env),
            )
            .into()
        })
}

/// Find or create the application source and add a fresh version to it
async fn new_source_version(client: &ApiClient, source_name: &str) -> Result<SourceVersionTarget> {
    let (source, version_count) = match sources::get_by_name(client, source_name).await {
        Ok(source) => {
            let versions = sources::list_versions(client, &source.id).await?;
            (source, versions.len())
        }
        Err(e) if e.is_not_found() => {
            let source = sources::create(client, source_name)
                .await
                .context("Failed to create custom application source")?;
            (source, 0)
        }
        Err(e) => return Err(e.into()),
    };
    println!("Using {} custom application source.", source_name);

    let label = format!("v{}", version_count + 1);
    let version = sources::create_version(client, &source.id, &label)
        .await
        .context("Failed to create custom application source version")?;
    println!(
        "Creating new version for {} custom application source.",
        source_name
    );

    Ok(SourceVersionTarget {
        source_id: source.id,
        version_id: version.id,
    })
}

async fn create_from_image(
    client: &ApiClient,
    poll_settings: PollSettings,
    image: &Path,
    app_name: &str,
) -> Result<CreatedApplication> {
    let environment_name = image
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| app_name.to_string());
    let environment = environments::create(
        client,
        &environment_name,
        Some(IMAGE_ENVIRONMENT_DESCRIPTION),
    )
    .await
    .context("Failed to create execution environment")?;

    upload_image_and_wait(
        client,
        &environment.id,
        image,
        DOCKER_IMAGE_FIELD,
        poll_settings.image_build_interval(),
    )
    .await?;

    start_app(
        client,
        CreateApplicationRequest {
            name: app_name.to_string(),
            application_source_id: None,
            environment_id: Some(environment.id),
        },
    )
    .await
}

async fn start_app(
    client: &ApiClient,
    request: CreateApplicationRequest,
) -> Result<CreatedApplication> {
    println!("Starting {} custom application.", request.name);
    applications::create(client, &request)
        .await
        .context("Failed to create custom application")
}
