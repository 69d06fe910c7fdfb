//! Runtime parameters passed on the command line, checked against the
//! declarations in the project's `metadata.yaml`

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

use crate::api::models::{RuntimeParameter, RuntimeParameterType};

pub const METADATA_FILE_NAME: &str = "metadata.yaml";

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ProjectMetadata {
    #[serde(default)]
    runtime_parameter_definitions: Vec<ParameterDefinition>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParameterDefinition {
    field_name: String,
    #[serde(rename = "type")]
    param_type: String,
}

/// Declared runtime parameters: field name to declared type
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterDeclarations {
    declared: HashMap<String, String>,
}

impl ParameterDeclarations {
    pub fn parse(content: &str) -> Result<Self> {
        let value: serde_yaml::Value =
            serde_yaml::from_str(content).context("Error parsing metadata.yaml")?;
        if value.is_null() {
            return Ok(Self::default());
        }
        let metadata: ProjectMetadata =
            serde_yaml::from_value(value).context("Error parsing metadata.yaml")?;

        let declared = metadata
            .runtime_parameter_definitions
            .into_iter()
            .map(|def| (def.field_name, def.param_type))
            .collect();
        Ok(Self { declared })
    }

    /// Declarations from `metadata.yaml` in the project root, `None` if the
    /// project has no metadata file
    pub fn load(root: &Path) -> Result<Option<Self>> {
        let path = root.join(METADATA_FILE_NAME);
        if !path.is_file() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).map(Some)
    }

    /// Keep the parameters declared with a matching type. The rest are logged and dropped.
    pub fn retain_declared(&self, params: Vec<RuntimeParameter>) -> Vec<RuntimeParameter> {
        params
            .into_iter()
            .filter(|param| match self.declared.get(&param.field_name) {
                Some(declared) if *declared == param.param_type.to_string() => true,
                Some(declared) => {
                    warn!(
                        "Invalid type for '{}'. Expected '{}', got '{}'.",
                        param.field_name, declared, param.param_type
                    );
                    false
                }
                None => {
                    warn!("Undefined parameter: '{}'.", param.field_name);
                    false
                }
            })
            .collect()
    }
}

/// Runtime parameters from repeated `KEY=VALUE` options. A repeated key keeps
/// its first position and its last value.
pub fn collect_runtime_parameters(
    string_vars: &[(String, String)],
    numeric_vars: &[(String, String)],
) -> Vec<RuntimeParameter> {
    let mut params: Vec<RuntimeParameter> = Vec::new();

    let typed = string_vars
        .iter()
        .map(|kv| (kv, RuntimeParameterType::String))
        .chain(
            numeric_vars
                .iter()
                .map(|kv| (kv, RuntimeParameterType::Numeric)),
        );

    for ((key, value), param_type) in typed {
        match params
            .iter_mut()
            .find(|p| p.field_name == *key && p.param_type == param_type)
        {
            Some(existing) => existing.value = value.clone(),
            None => params.push(RuntimeParameter {
                field_name: key.clone(),
                param_type,
                value: value.clone(),
            }),
        }
    }

    params
}
