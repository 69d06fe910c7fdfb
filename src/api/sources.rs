//! Custom application source accessors

use reqwest::{multipart::Form, Method};
use serde::Serialize;

use super::models::{ApplicationSource, Page, SourceVersion};
use super::{ApiClient, ApiError, ApiResult, Lookup};

const KIND: &str = "custom application source";

pub async fn list(client: &ApiClient) -> ApiResult<Vec<ApplicationSource>> {
    let page: Page<ApplicationSource> = client.get_json("customApplicationSources/", &[]).await?;
    Ok(page.data)
}

/// The sources endpoint has no name filter, so the match happens client-side
pub async fn get_by_name(client: &ApiClient, name: &str) -> ApiResult<ApplicationSource> {
    list(client)
        .await?
        .into_iter()
        .find(|source| source.name == name)
        .ok_or_else(|| ApiError::NotFound {
            kind: KIND,
            by: Lookup::Name,
            identifier: name.to_string(),
        })
}

pub async fn create(client: &ApiClient, name: &str) -> ApiResult<ApplicationSource> {
    client
        .post_json("customApplicationSources/", &serde_json::json!({ "name": name }))
        .await
}

pub async fn list_versions(client: &ApiClient, source_id: &str) -> ApiResult<Vec<SourceVersion>> {
    let page: Page<SourceVersion> = client
        .get_json(&format!("customApplicationSources/{}/versions/", source_id), &[])
        .await?;
    Ok(page.data)
}

pub async fn create_version(
    client: &ApiClient,
    source_id: &str,
    label: &str,
) -> ApiResult<SourceVersion> {
    client
        .post_json(
            &format!("customApplicationSources/{}/versions/", source_id),
            &serde_json::json!({ "label": label }),
        )
        .await
}

fn version_path(source_id: &str, version_id: &str) -> String {
    format!(
        "customApplicationSources/{}/versions/{}/",
        source_id, version_id
    )
}

/// PATCH a source version with a multipart form (files, resources)
pub async fn update_version_multipart(
    client: &ApiClient,
    source_id: &str,
    version_id: &str,
    form: Form,
) -> ApiResult<()> {
    let path = version_path(source_id, version_id);
    client
        .send(client.request(Method::PATCH, &path).multipart(form))
        .await?;
    Ok(())
}

/// PATCH a source version with a JSON body (runtime parameters)
pub async fn update_version_json<B: Serialize + ?Sized>(
    client: &ApiClient,
    source_id: &str,
    version_id: &str,
    body: &B,
) -> ApiResult<()> {
    client
        .patch_json(&version_path(source_id, version_id), body)
        .await
}
