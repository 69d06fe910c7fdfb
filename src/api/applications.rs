//! Custom application accessors

use reqwest::{header::LOCATION, Method};
use tracing::debug;

use super::models::{
    ApplicationHistoryEntry, ApplicationLogs, CreateApplicationRequest, CreatedApplication,
    CustomApplication, NameCheckResponse, Page, UpdateApplicationRequest,
};
use super::{decode_json, ApiClient, ApiError, ApiResult, Lookup, ResourceRef};

const KIND: &str = "custom application";

/// List applications, optionally filtered by name on the server side
pub async fn list(client: &ApiClient, name: Option<&str>) -> ApiResult<Vec<CustomApplication>> {
    let query: Vec<(&str, &str)> = name.map(|n| vec![("name", n)]).unwrap_or_default();
    let page: Page<CustomApplication> = client.get_json("customApplications/", &query).await?;
    Ok(page.data)
}

pub async fn get_by_id(client: &ApiClient, id: &str) -> ApiResult<CustomApplication> {
    client
        .get_json(&format!("customApplications/{}/", id), &[])
        .await
}

/// Exactly one name-filtered search; the exact-name match is enforced client-side
pub async fn get_by_name(client: &ApiClient, name: &str) -> ApiResult<CustomApplication> {
    list(client, Some(name))
        .await?
        .into_iter()
        .find(|app| app.name == name)
        .ok_or_else(|| ApiError::NotFound {
            kind: KIND,
            by: Lookup::Name,
            identifier: name.to_string(),
        })
}

/// Fetch the full record behind a reference
pub async fn resolve(client: &ApiClient, reference: &ResourceRef) -> ApiResult<CustomApplication> {
    match reference {
        ResourceRef::Id(id) => get_by_id(client, id)
            .await
            .map_err(|e| e.missing_id(KIND, id)),
        ResourceRef::Name(name) => get_by_name(client, name).await,
    }
}

/// Application ID behind a reference; an ID is returned without any request
pub async fn resolve_id(client: &ApiClient, reference: &ResourceRef) -> ApiResult<String> {
    match reference {
        ResourceRef::Id(id) => Ok(id.clone()),
        ResourceRef::Name(name) => Ok(get_by_name(client, name).await?.id),
    }
}

pub async fn is_name_in_use(client: &ApiClient, name: &str) -> ApiResult<bool> {
    let response: NameCheckResponse = client
        .get_json("customApplications/nameCheck/", &[("name", name)])
        .await?;
    Ok(response.in_use)
}

/// Create an application. The status-check URL for the startup job is taken
/// from the `Location` header, resolved against the request URL.
pub async fn create(
    client: &ApiClient,
    request: &CreateApplicationRequest,
) -> ApiResult<CreatedApplication> {
    let response = client
        .send(client.request(Method::POST, "customApplications/").json(request))
        .await?;

    let status_url = response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|location| response.url().join(location).ok())
        .map(|url| url.to_string());
    debug!("Application status URL: {:?}", status_url);

    let application: CustomApplication = decode_json(response).await?;
    Ok(CreatedApplication {
        application,
        status_url,
    })
}

pub async fn update(
    client: &ApiClient,
    app_id: &str,
    request: &UpdateApplicationRequest,
) -> ApiResult<()> {
    client
        .patch_json(&format!("customApplications/{}/", app_id), request)
        .await
}

pub async fn delete(client: &ApiClient, app_id: &str) -> ApiResult<()> {
    client
        .delete(&format!("customApplications/{}/", app_id))
        .await
}

pub async fn logs(client: &ApiClient, app_id: &str) -> ApiResult<ApplicationLogs> {
    client
        .get_json(&format!("customApplications/{}/logs/", app_id), &[])
        .await
}

/// Publish history of an application, newest entry first
pub async fn history(client: &ApiClient, app_id: &str) -> ApiResult<Vec<ApplicationHistoryEntry>> {
    let page: Page<ApplicationHistoryEntry> = client
        .get_json(&format!("customApplications/{}/history/", app_id), &[])
        .await?;
    Ok(page.data)
}
