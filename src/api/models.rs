//! Request/response types for the custom application endpoints
//!
//! Only the fields the CLI reads or writes are modelled. Everything else the
//! platform returns is ignored on deserialization.

use serde::{Deserialize, Serialize};

/// Paginated list envelope used by every list endpoint
#[derive(Debug, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CustomApplication {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub application_url: Option<String>,
    #[serde(default)]
    pub custom_application_source_version_id: Option<String>,
    #[serde(default)]
    pub external_access_enabled: Option<bool>,
    #[serde(default)]
    pub external_access_recipients: Vec<String>,
}

/// A freshly created application together with the status-check URL the
/// platform hands back in the `Location` header
#[derive(Debug, Clone)]
pub struct CreatedApplication {
    pub application: CustomApplication,
    pub status_url: Option<String>,
}

/// Payload for creating an application. Exactly one of the two sources is set.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateApplicationRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_source_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment_id: Option<String>,
}

/// PATCH payload for a running application
#[derive(Debug, Serialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateApplicationRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_application_source_version_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_access_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_access_recipients: Option<Vec<String>>,
}

impl UpdateApplicationRequest {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameCheckResponse {
    pub in_use: bool,
}

/// One entry of an application's publish history, newest first
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationHistoryEntry {
    pub source_version_id: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationLogs {
    #[serde(default)]
    pub logs: Vec<String>,
    #[serde(default)]
    pub build_error: Option<String>,
    #[serde(default)]
    pub build_log: Option<String>,
}

impl ApplicationLogs {
    /// Runtime log records joined into one text block
    pub fn runtime_log(&self) -> String {
        self.logs.join("\n")
    }
}

/// Body returned by an asynchronous job's status URL
#[derive(Debug, Deserialize)]
pub struct JobStatus {
    pub status: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VersionRef {
    pub id: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionEnvironment {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub latest_version: Option<VersionRef>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEnvironmentRequest<'a> {
    pub name: &'a str,
    pub use_cases: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentVersion {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub build_status: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApplicationSource {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceVersion {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeParameterType {
    String,
    Numeric,
}

impl std::fmt::Display for RuntimeParameterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeParameterType::String => write!(f, "string"),
            RuntimeParameterType::Numeric => write!(f, "numeric"),
        }
    }
}

/// A runtime parameter value supplied on the command line
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeParameter {
    pub field_name: String,
    #[serde(rename = "type")]
    pub param_type: RuntimeParameterType,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_application_tolerates_missing_fields() {
        let app: CustomApplication =
            serde_json::from_str(r#"{"id": "65980d79eea4fd0eddd59bba", "extra": 1}"#).unwrap();
        assert_eq!(app.id, "65980d79eea4fd0eddd59bba");
        assert!(app.external_access_recipients.is_empty());
        assert!(app.application_url.is_none());
    }

    #[test]
    fn test_create_request_skips_unset_source() {
        let req = CreateApplicationRequest {
            name: "app".to_string(),
            application_source_id: None,
            environment_id: Some("env".to_string()),
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            serde_json::json!({"name": "app", "environmentId": "env"})
        );
    }

    #[test]
    fn test_runtime_parameter_wire_shape() {
        let param = RuntimeParameter {
            field_name: "INT_VAL".to_string(),
            param_type: RuntimeParameterType::Numeric,
            value: "3".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&param).unwrap(),
            serde_json::json!({"fieldName": "INT_VAL", "type": "numeric", "value": "3"})
        );
    }

    #[test]
    fn test_empty_update_request() {
        assert!(UpdateApplicationRequest::default().is_empty());
        let update = UpdateApplicationRequest {
            name: Some("new".to_string()),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }
}
