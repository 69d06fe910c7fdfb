//! Typed errors raised by the API client and resource accessors

use std::fmt;

use thiserror::Error;

/// A non-2xx response from the platform.
///
/// `message` comes from the JSON body's `message` field when present, otherwise
/// it is the HTTP reason phrase. `errors` keeps the structured field errors the
/// platform attaches to validation failures.
#[derive(Debug, Clone, Error)]
#[error("{status}, message={message}, url={url}")]
pub struct ClientResponseError {
    pub url: String,
    pub status: u16,
    pub message: String,
    pub errors: Option<serde_json::Value>,
}

/// Which lookup path failed to find a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Id,
    Name,
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookup::Id => write!(f, "ID"),
            Lookup::Name => write!(f, "name"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Client(#[from] ClientResponseError),

    #[error("Can't find {kind} \"{identifier}\" by {by}.")]
    NotFound {
        kind: &'static str,
        by: Lookup,
        identifier: String,
    },

    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to parse response from {url}: {reason}")]
    Decode { url: String, reason: String },
}

impl ApiError {
    /// HTTP status of the failure, with name lookups that found nothing reported as 404
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Client(err) => Some(err.status),
            ApiError::NotFound { .. } => Some(404),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn is_forbidden(&self) -> bool {
        self.status() == Some(403)
    }

    /// Turn a server 404 for an ID lookup into [`ApiError::NotFound`]
    pub(crate) fn missing_id(self, kind: &'static str, id: &str) -> Self {
        match self {
            ApiError::Client(err) if err.status == 404 => ApiError::NotFound {
                kind,
                by: Lookup::Id,
                identifier: id.to_string(),
            },
            other => other,
        }
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
