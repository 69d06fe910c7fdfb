//! Client-side interface to the platform's public REST API.
//!
//! [`ApiClient`] is the only place that talks HTTP. Every accessor goes through
//! [`ApiClient::send`], so a non-2xx response always surfaces as the same
//! [`ClientResponseError`] no matter which resource was being touched.

pub mod applications;
pub mod environments;
pub mod error;
pub mod identifier;
pub mod models;
pub mod sources;

pub use error::{ApiError, ApiResult, ClientResponseError, Lookup};
pub use identifier::ResourceRef;

use reqwest::{redirect, Client, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    endpoint: String,
    token: String,
}

impl ApiClient {
    /// Create a client for `endpoint` (e.g. `https://app.datarobot.com/api/v2`).
    ///
    /// Redirects are not followed: a status-check URL answers with a redirect once
    /// the job behind it is finished, and the poller needs to see that.
    pub fn new(endpoint: &str, token: &str) -> ApiResult<Self> {
        let http = Client::builder()
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|source| ApiError::Transport {
                url: endpoint.to_string(),
                source,
            })?;

        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    /// Absolute URL for an API path. Absolute URLs (status URLs from a
    /// `Location` header) are passed through untouched.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.endpoint, path.trim_start_matches('/'))
        }
    }

    /// Start an authenticated request
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, self.url(path))
            .bearer_auth(&self.token)
    }

    /// Send a request, turning any status >= 400 into [`ClientResponseError`]
    pub async fn send(&self, builder: RequestBuilder) -> ApiResult<Response> {
        let request = builder.build().map_err(|source| ApiError::Transport {
            url: self.endpoint.clone(),
            source,
        })?;
        let url = request.url().to_string();
        debug!("{} {}", request.method(), url);

        let response = self
            .http
            .execute(request)
            .await
            .map_err(|source| ApiError::Transport {
                url: url.clone(),
                source,
            })?;

        check_response(response).await
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> ApiResult<T> {
        let mut builder = self.request(Method::GET, path);
        if !query.is_empty() {
            builder = builder.query(query);
        }
        let response = self.send(builder).await?;
        decode_json(response).await
    }

    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        let response = self
            .send(self.request(Method::POST, path).json(body))
            .await?;
        decode_json(response).await
    }

    pub async fn patch_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> ApiResult<()> {
        self.send(self.request(Method::PATCH, path).json(body))
            .await?;
        Ok(())
    }

    pub async fn delete(&self, path: &str) -> ApiResult<()> {
        self.send(self.request(Method::DELETE, path)).await?;
        Ok(())
    }
}

/// Normalize an error response into [`ClientResponseError`]
async fn check_response(response: Response) -> ApiResult<Response> {
    let status = response.status();
    if status.as_u16() < 400 {
        return Ok(response);
    }

    let url = response.url().to_string();
    let reason = status.canonical_reason().unwrap_or("Unknown error").to_string();
    let body = response.text().await.unwrap_or_default();

    let (message, errors) = match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(serde_json::Value::Object(map)) => {
            let message = map
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or(reason);
            let errors = map.get("errors").filter(|e| !e.is_null()).cloned();
            (message, errors)
        }
        _ => (reason, None),
    };

    Err(ClientResponseError {
        url,
        status: status.as_u16(),
        message,
        errors,
    }
    .into())
}

pub(crate) async fn decode_json<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
    let url = response.url().to_string();
    let bytes = response
        .bytes()
        .await
        .map_err(|source| ApiError::Transport {
            url: url.clone(),
            source,
        })?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode {
        url,
        reason: e.to_string(),
    })
}
