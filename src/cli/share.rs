use anyhow::{Context, Result};

use crate::api::models::UpdateApplicationRequest;
use crate::api::{applications, ApiClient, ResourceRef};

/// Current recipients plus `add`, minus `remove`. Order is kept and
/// duplicates collapse.
pub fn updated_recipients(current: &[String], add: &[String], remove: &[String]) -> Vec<String> {
    let mut recipients: Vec<String> = Vec::new();
    for user in current.iter().chain(add) {
        if !remove.contains(user) && !recipients.contains(user) {
            recipients.push(user.clone());
        }
    }
    recipients
}

/// `drapps external-share`
pub async fn external_share(
    client: &ApiClient,
    application: &str,
    set_external_sharing: Option<bool>,
    add_users: &[String],
    remove_users: &[String],
) -> Result<()> {
    let app = applications::resolve(client, &ResourceRef::parse(application)).await?;

    let mut request = UpdateApplicationRequest {
        external_access_enabled: set_external_sharing,
        ..Default::default()
    };
    if !add_users.is_empty() || !remove_users.is_empty() {
        request.external_access_recipients = Some(updated_recipients(
            &app.external_access_recipients,
            add_users,
            remove_users,
        ));
    }

    if request.is_empty() {
        println!("Nothing to change for application {}.", application);
        return Ok(());
    }

    applications::update(client, &app.id, &request)
        .await
        .with_context(|| format!("Failed to update sharing of application {}", application))?;
    println!("External sharing of {} was updated.", application);
    Ok(())
}
