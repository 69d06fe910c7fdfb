//! Credential and settings resolution.
//!
//! Every command needs an API token and an endpoint. They are resolved once,
//! before dispatch, from (highest priority first) command-line flags, environment
//! variables, the optional config file and finally the public default endpoint.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::UsageError;
use crate::poller::PollSettings;
use crate::upload::UploadSettings;

pub const TOKEN_ENV: &str = "DATAROBOT_API_TOKEN";
pub const ENDPOINT_ENV: &str = "DATAROBOT_ENDPOINT";
pub const HOST_ENV: &str = "DATAROBOT_HOST";
pub const CONFIG_PATH_ENV: &str = "DRAPPS_CONFIG";

pub const DEFAULT_HOST: &str = "https://app.datarobot.com";

/// Contents of `~/.config/drapps/config.toml` (or `$DRAPPS_CONFIG`)
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    pub token: Option<String>,
    pub endpoint: Option<String>,
    #[serde(default)]
    pub upload: UploadSettings,
    #[serde(default)]
    pub polling: PollSettings,
}

impl ConfigFile {
    /// Location of the config file; `$DRAPPS_CONFIG` wins over the default path
    pub fn config_path() -> Option<PathBuf> {
        if let Some(path) = env_var_non_empty(CONFIG_PATH_ENV) {
            return Some(PathBuf::from(path));
        }
        dirs::home_dir().map(|home| home.join(".config").join("drapps").join("config.toml"))
    }

    /// Load the config file, returning defaults when it does not exist
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        debug!("Loading config from {}", path.display());
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let mut unused_fields = Vec::new();
        let deserializer = toml::Deserializer::new(&content);
        let config: ConfigFile = serde_ignored::deserialize(deserializer, |field| {
            unused_fields.push(field.to_string());
        })
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        for field in &unused_fields {
            warn!(
                "Unknown configuration field in {}: {}",
                path.display(),
                field
            );
        }

        Ok(config)
    }
}

/// Token and endpoint every command authenticates with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub token: String,
    pub endpoint: String,
}

/// Resolve credentials from flags, environment and config file.
///
/// `env` looks up an environment variable; empty values count as unset.
pub fn resolve_credentials<F>(
    flag_token: Option<&str>,
    flag_endpoint: Option<&str>,
    env: F,
    file: &ConfigFile,
) -> Result<Credentials, UsageError>
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |key: &str| env(key).filter(|value| !value.is_empty());

    let token = flag_token
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .or_else(|| lookup(TOKEN_ENV))
        .or_else(|| file.token.clone())
        .ok_or_else(|| {
            UsageError::new(format!(
                "You need to set DR API token through parameters or {} env variable.",
                TOKEN_ENV
            ))
        })?;

    let endpoint = flag_endpoint
        .filter(|e| !e.is_empty())
        .map(str::to_string)
        .or_else(|| lookup(ENDPOINT_ENV))
        .or_else(|| lookup(HOST_ENV).map(|host| join_api_path(&host)))
        .or_else(|| file.endpoint.clone())
        .unwrap_or_else(|| join_api_path(DEFAULT_HOST));

    Ok(Credentials { token, endpoint })
}

fn join_api_path(host: &str) -> String {
    format!("{}/api/v2", host.trim_end_matches('/'))
}

/// Read an environment variable, treating empty strings as unset
pub fn env_var_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_flags_take_precedence() {
        let env = env_of(&[(TOKEN_ENV, "env-token"), (ENDPOINT_ENV, "https://env/api/v2")]);
        let creds = resolve_credentials(
            Some("flag-token"),
            Some("https://flag/api/v2"),
            env,
            &ConfigFile::default(),
        )
        .unwrap();
        assert_eq!(creds.token, "flag-token");
        assert_eq!(creds.endpoint, "https://flag/api/v2");
    }

    #[test]
    fn test_env_used_when_flags_missing() {
        let env = env_of(&[(TOKEN_ENV, "env-token"), (ENDPOINT_ENV, "https://env/api/v2")]);
        let creds = resolve_credentials(None, None, env, &ConfigFile::default()).unwrap();
        assert_eq!(creds.token, "env-token");
        assert_eq!(creds.endpoint, "https://env/api/v2");
    }

    #[test]
    fn test_host_env_builds_endpoint() {
        let env = env_of(&[(TOKEN_ENV, "t"), (HOST_ENV, "https://my.host/")]);
        let creds = resolve_credentials(None, None, env, &ConfigFile::default()).unwrap();
        assert_eq!(creds.endpoint, "https://my.host/api/v2");
    }

    #[test]
    fn test_default_endpoint() {
        let env = env_of(&[(TOKEN_ENV, "t")]);
        let creds = resolve_credentials(None, None, env, &ConfigFile::default()).unwrap();
        assert_eq!(creds.endpoint, "https://app.datarobot.com/api/v2");
    }

    #[test]
    fn test_config_file_is_lowest_priority() {
        let file = ConfigFile {
            token: Some("file-token".to_string()),
            endpoint: Some("https://file/api/v2".to_string()),
            ..Default::default()
        };
        let creds = resolve_credentials(None, None, env_of(&[]), &file).unwrap();
        assert_eq!(creds.token, "file-token");
        assert_eq!(creds.endpoint, "https://file/api/v2");

        let env = env_of(&[(TOKEN_ENV, "env-token")]);
        let creds = resolve_credentials(None, None, env, &file).unwrap();
        assert_eq!(creds.token, "env-token");
    }

    #[test]
    fn test_missing_token_is_usage_error() {
        let env = env_of(&[(TOKEN_ENV, "")]);
        let err = resolve_credentials(None, None, env, &ConfigFile::default()).unwrap_err();
        assert!(err.to_string().contains(TOKEN_ENV));
    }

    #[test]
    fn test_load_config_file_with_settings() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
token = "abc"

[upload]
batch_size = 10

[polling]
app_start_interval_secs = 1
unknown_field = true
"#,
        )
        .unwrap();

        let config = ConfigFile::load_from(&path).unwrap();
        assert_eq!(config.token.as_deref(), Some("abc"));
        assert_eq!(config.upload.batch_size, 10);
        assert_eq!(config.polling.app_start_interval_secs, 1);
        assert_eq!(config.polling.image_build_interval_secs, 5);
        assert_eq!(config.polling.log_follow_interval_secs, 30);
    }

    #[test]
    fn test_load_config_file_rejects_invalid_toml() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "***").unwrap();
        assert!(ConfigFile::load_from(&path).is_err());
    }
}
