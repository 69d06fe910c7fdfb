//! Chunked upload of a project directory into a custom application source version.
//!
//! The pipeline runs strictly in order: file batches (the first one carrying the
//! base environment version), then the resource settings, then the runtime
//! parameters that survived validation. The first failing request aborts the
//! whole upload; nothing that was already sent is rolled back.

pub mod project;
pub mod runtime_params;

pub use project::{check_project, discover_files, IgnoreRules, ProjectFile};
pub use runtime_params::{collect_runtime_parameters, ParameterDeclarations};

use anyhow::{Context, Result};
use bytes::{BufMut, Bytes, BytesMut};
use reqwest::multipart::{Form, Part};
use reqwest::Body;
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use crate::api::models::RuntimeParameter;
use crate::api::{sources, ApiClient};

/// Upload tuning, configurable through the `[upload]` config section
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UploadSettings {
    /// Number of files sent per multipart request
    pub batch_size: usize,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self { batch_size: 50 }
    }
}

/// Container size offered for a custom application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum CpuSize {
    #[value(name = "2xsmall")]
    TwoXSmall,
    #[value(name = "xsmall")]
    XSmall,
    #[default]
    #[value(name = "small")]
    Small,
    #[value(name = "medium")]
    Medium,
    #[value(name = "large")]
    Large,
    #[value(name = "xlarge")]
    XLarge,
    #[value(name = "2xlarge")]
    TwoXLarge,
}

impl CpuSize {
    /// Resource bundle label the platform knows this size by
    pub fn resource_label(self) -> &'static str {
        match self {
            CpuSize::TwoXSmall => "cpu.nano",
            CpuSize::XSmall => "cpu.micro",
            CpuSize::Small => "cpu.small",
            CpuSize::Medium => "cpu.medium",
            CpuSize::Large => "cpu.large",
            CpuSize::XLarge => "cpu.xlarge",
            CpuSize::TwoXLarge => "cpu.2xlarge",
        }
    }
}

/// Body of the `resources` part sent after all files are uploaded
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSettings {
    pub replicas: u32,
    pub resource_label: String,
    pub session_affinity: bool,
    pub service_web_requests_on_root_path: bool,
}

impl ResourceSettings {
    pub fn new(
        replicas: u32,
        cpu_size: CpuSize,
        session_affinity: bool,
        service_web_requests_on_root_path: bool,
    ) -> Self {
        Self {
            replicas,
            resource_label: cpu_size.resource_label().to_string(),
            session_affinity,
            service_web_requests_on_root_path,
        }
    }
}

/// The source version receiving the upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceVersionTarget {
    pub source_id: String,
    pub version_id: String,
}

/// Everything the pipeline needs to know about the project being uploaded
#[derive(Debug, Clone)]
pub struct ProjectUpload<'a> {
    pub root: &'a std::path::Path,
    pub base_environment_version_id: &'a str,
    pub resources: ResourceSettings,
    pub runtime_parameters: Vec<RuntimeParameter>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadReport {
    pub files: usize,
    pub batches: usize,
    pub runtime_parameters: usize,
}

pub struct UploadPipeline<'a> {
    client: &'a ApiClient,
    settings: UploadSettings,
}

impl<'a> UploadPipeline<'a> {
    pub fn new(client: &'a ApiClient, settings: UploadSettings) -> Self {
        Self { client, settings }
    }

    pub async fn run(
        &self,
        target: &SourceVersionTarget,
        upload: &ProjectUpload<'_>,
    ) -> Result<UploadReport> {
        let rules = IgnoreRules::load(upload.root)?;
        let files = discover_files(upload.root, &rules)?;
        let runtime_parameters = self.validated_parameters(upload, &rules)?;

        let batch_size = self.settings.batch_size.max(1);
        info!(
            "Uploading project: {} files in batches of {}",
            files.len(),
            batch_size
        );

        let mut batches = 0;
        if files.is_empty() {
            // The base environment still has to be attached to the version
            let form = batch_form(&[], Some(upload.base_environment_version_id)).await?;
            self.send_form(target, form)
                .await
                .context("Failed to attach base environment")?;
        }

        let mut uploaded = 0;
        for (index, batch) in files.chunks(batch_size).enumerate() {
            let base = (index == 0).then_some(upload.base_environment_version_id);
            // File handles live inside the form and are closed when the request is dropped
            let form = batch_form(batch, base).await?;
            self.send_form(target, form)
                .await
                .with_context(|| format!("Failed to upload file batch {}", index + 1))?;

            batches += 1;
            uploaded += batch.len();
            info!("Uploaded {}/{} files", uploaded, files.len());
        }

        let resources = serde_json::to_string(&upload.resources)?;
        debug!("Resource settings: {}", resources);
        let part = Part::text(resources)
            .mime_str("application/json")
            .context("Failed to build resources part")?;
        self.send_form(target, Form::new().part("resources", part))
            .await
            .context("Failed to update resource settings")?;

        if !runtime_parameters.is_empty() {
            let encoded = serde_json::to_string(&runtime_parameters)?;
            sources::update_version_json(
                self.client,
                &target.source_id,
                &target.version_id,
                &serde_json::json!({ "runtimeParameterValues": encoded }),
            )
            .await
            .context("Failed to set runtime parameters")?;
            info!("Set {} runtime parameters", runtime_parameters.len());
        }

        Ok(UploadReport {
            files: files.len(),
            batches,
            runtime_parameters: runtime_parameters.len(),
        })
    }

    fn validated_parameters(
        &self,
        upload: &ProjectUpload<'_>,
        rules: &IgnoreRules,
    ) -> Result<Vec<RuntimeParameter>> {
        if upload.runtime_parameters.is_empty() {
            return Ok(Vec::new());
        }
        // Declarations only count when the metadata file is part of the upload
        let declarations = if rules.is_ignored(runtime_params::METADATA_FILE_NAME) {
            None
        } else {
            ParameterDeclarations::load(upload.root)?
        };
        match declarations {
            Some(declarations) => Ok(declarations.retain_declared(upload.runtime_parameters.clone())),
            None => {
                warn!(
                    "Project has no {}, runtime parameters are not sent",
                    runtime_params::METADATA_FILE_NAME
                );
                Ok(Vec::new())
            }
        }
    }

    async fn send_form(&self, target: &SourceVersionTarget, form: Form) -> Result<()> {
        sources::update_version_multipart(self.client, &target.source_id, &target.version_id, form)
            .await?;
        Ok(())
    }
}

/// One multipart request: all `filePath` fields, then all `file` parts in the same order
async fn batch_form(batch: &[ProjectFile], base_environment_version_id: Option<&str>) -> Result<Form> {
    let mut form = Form::new();
    if let Some(id) = base_environment_version_id {
        form = form.text("baseEnvironmentVersionId", id.to_string());
    }
    for file in batch {
        form = form.text("filePath", file.relative_path.clone());
    }
    for file in batch {
        form = form.part("file", file_part(file).await?);
    }
    Ok(form)
}

async fn file_part(file: &ProjectFile) -> Result<Part> {
    let part = if cfg!(windows) && file.is_entrypoint() {
        let content = tokio::fs::read(&file.path)
            .await
            .with_context(|| format!("Failed to read {}", file.path.display()))?;
        Part::stream(normalize_line_endings(&content))
    } else {
        let handle = tokio::fs::File::open(&file.path)
            .await
            .with_context(|| format!("Failed to open {}", file.path.display()))?;
        let len = handle
            .metadata()
            .await
            .with_context(|| format!("Failed to stat {}", file.path.display()))?
            .len();
        Part::stream_with_length(Body::wrap_stream(ReaderStream::new(handle)), len)
    };

    part.file_name(file.file_name().to_string())
        .mime_str("application/octet-stream")
        .context("Failed to build file part")
}

/// Replace CRLF with LF; lone CR bytes are kept
pub fn normalize_line_endings(content: &[u8]) -> Bytes {
    let mut out = BytesMut::with_capacity(content.len());
    let mut iter = content.iter().peekable();
    while let Some(&byte) = iter.next() {
        if byte == b'\r' && iter.peek() == Some(&&b'\n') {
            continue;
        }
        out.put_u8(byte);
    }
    out.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_labels() {
        assert_eq!(CpuSize::TwoXSmall.resource_label(), "cpu.nano");
        assert_eq!(CpuSize::XSmall.resource_label(), "cpu.micro");
        assert_eq!(CpuSize::default().resource_label(), "cpu.small");
        assert_eq!(CpuSize::TwoXLarge.resource_label(), "cpu.2xlarge");
    }

    #[test]
    fn test_cpu_size_parses_cli_names() {
        use clap::ValueEnum;
        assert_eq!(CpuSize::from_str("2xsmall", false).unwrap(), CpuSize::TwoXSmall);
        assert_eq!(CpuSize::from_str("xlarge", false).unwrap(), CpuSize::XLarge);
        assert!(CpuSize::from_str("huge", false).is_err());
    }

    #[test]
    fn test_resource_settings_wire_shape() {
        let resources = ResourceSettings::new(2, CpuSize::Medium, true, false);
        assert_eq!(
            serde_json::to_value(&resources).unwrap(),
            serde_json::json!({
                "replicas": 2,
                "resourceLabel": "cpu.medium",
                "sessionAffinity": true,
                "serviceWebRequestsOnRootPath": false,
            })
        );
    }

    #[test]
    fn test_normalize_line_endings() {
        assert_eq!(
            normalize_line_endings(b"#!/bin/sh\r\necho hi\r\n"),
            Bytes::from_static(b"#!/bin/sh\necho hi\n")
        );
        assert_eq!(normalize_line_endings(b"a\rb\n"), Bytes::from_static(b"a\rb\n"));
    }

    #[test]
    fn test_default_batch_size() {
        assert_eq!(UploadSettings::default().batch_size, 50);
    }
}
