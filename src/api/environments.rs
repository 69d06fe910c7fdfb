//! Execution environment accessors

use reqwest::{multipart::Form, Method};

use super::models::{CreateEnvironmentRequest, EnvironmentVersion, ExecutionEnvironment, Page};
use super::{decode_json, ApiClient, ApiError, ApiResult, Lookup, ResourceRef};

const KIND: &str = "execution environment";

/// Use case every environment listed or created by this CLI is scoped to
pub const CUSTOM_APPLICATION_USE_CASE: &str = "customApplication";

/// List environments usable for custom applications.
///
/// The server's `searchFor` filter is a substring match, so when a search term
/// is given the result is narrowed to exact name matches here.
pub async fn list(client: &ApiClient, search: Option<&str>) -> ApiResult<Vec<ExecutionEnvironment>> {
    let mut query = vec![("useCases", CUSTOM_APPLICATION_USE_CASE)];
    if let Some(term) = search {
        query.push(("searchFor", term));
    }

    let page: Page<ExecutionEnvironment> = client.get_json("executionEnvironments/", &query).await?;
    let mut environments = page.data;
    if let Some(term) = search {
        environments.retain(|env| env.name == term);
    }
    Ok(environments)
}

pub async fn get_by_id(client: &ApiClient, id: &str) -> ApiResult<ExecutionEnvironment> {
    client
        .get_json(&format!("executionEnvironments/{}/", id), &[])
        .await
}

pub async fn get_by_name(client: &ApiClient, name: &str) -> ApiResult<ExecutionEnvironment> {
    list(client, Some(name))
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::NotFound {
            kind: KIND,
            by: Lookup::Name,
            identifier: name.to_string(),
        })
}

pub async fn resolve(
    client: &ApiClient,
    reference: &ResourceRef,
) -> ApiResult<ExecutionEnvironment> {
    match reference {
        ResourceRef::Id(id) => get_by_id(client, id)
            .await
            .map_err(|e| e.missing_id(KIND, id)),
        ResourceRef::Name(name) => get_by_name(client, name).await,
    }
}

pub async fn create(
    client: &ApiClient,
    name: &str,
    description: Option<&str>,
) -> ApiResult<ExecutionEnvironment> {
    let request = CreateEnvironmentRequest {
        name,
        use_cases: vec![CUSTOM_APPLICATION_USE_CASE],
        description,
    };
    client.post_json("executionEnvironments/", &request).await
}

/// Upload an image (or docker context) archive as a new environment version
pub async fn create_version(
    client: &ApiClient,
    environment_id: &str,
    form: Form,
) -> ApiResult<EnvironmentVersion> {
    let path = format!("executionEnvironments/{}/versions/", environment_id);
    let response = client
        .send(client.request(Method::POST, &path).multipart(form))
        .await?;
    decode_json(response).await
}

pub async fn get_version(
    client: &ApiClient,
    environment_id: &str,
    version_id: &str,
) -> ApiResult<EnvironmentVersion> {
    client
        .get_json(
            &format!("executionEnvironments/{}/versions/{}/", environment_id, version_id),
            &[],
        )
        .await
}
