use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate};
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Attribute, Cell, Table};

use crate::api::models::{CustomApplication, ExecutionEnvironment};
use crate::api::{applications, environments, ApiClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Entity {
    Apps,
    Envs,
}

/// `drapps ls`
pub async fn list(client: &ApiClient, entity: Entity, id_only: bool) -> Result<()> {
    let output = match entity {
        Entity::Apps => {
            let apps = applications::list(client, None)
                .await
                .context("Failed to list custom applications")?;
            if id_only {
                ids(apps.iter().map(|app| app.id.as_str()))
            } else {
                apps_table(&apps, Local::now().date_naive()).to_string()
            }
        }
        Entity::Envs => {
            let envs = environments::list(client, None)
                .await
                .context("Failed to list execution environments")?;
            if id_only {
                ids(envs.iter().map(|env| env.id.as_str()))
            } else {
                environments_table(&envs).to_string()
            }
        }
    };

    println!("{}", output);
    Ok(())
}

fn ids<'a>(ids: impl Iterator<Item = &'a str>) -> String {
    ids.collect::<Vec<_>>().join("\n")
}

fn header(names: &[&str]) -> Vec<Cell> {
    names
        .iter()
        .map(|name| Cell::new(name).add_attribute(Attribute::Bold))
        .collect()
}

pub fn apps_table(apps: &[CustomApplication], today: NaiveDate) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(header(&[
            "ID",
            "NAME",
            "STATUS",
            "UPDATED",
            "URL",
            "EXTERNAL SHARING",
            "EXTERNAL SHARING RECIPIENTS",
        ]));

    for app in apps {
        table.add_row(vec![
            Cell::new(&app.id),
            Cell::new(&app.name),
            Cell::new(app.status.as_deref().unwrap_or("-")),
            Cell::new(format_updated(app.updated_at.as_deref(), today)),
            Cell::new(app.application_url.as_deref().unwrap_or("-")),
            Cell::new(
                app.external_access_enabled
                    .map(|enabled| enabled.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(app.external_access_recipients.join(",")),
        ]);
    }

    table
}

pub fn environments_table(envs: &[ExecutionEnvironment]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(header(&["ID", "NAME", "DESCRIPTION"]));

    for env in envs {
        table.add_row(vec![
            Cell::new(&env.id),
            Cell::new(&env.name),
            Cell::new(env.description.as_deref().unwrap_or("")),
        ]);
    }

    table
}

/// Time of day for timestamps from `today`, the date otherwise
fn format_updated(updated_at: Option<&str>, today: NaiveDate) -> String {
    let Some(raw) = updated_at.filter(|s| !s.is_empty()) else {
        return String::new();
    };
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) if dt.date_naive() == today => dt.format("%H:%M:%S").to_string(),
        Ok(dt) => dt.date_naive().format("%Y-%m-%d").to_string(),
        Err(_) => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_format_updated_today_shows_time() {
        assert_eq!(
            format_updated(Some("2024-01-05T10:11:12.123456Z"), date(2024, 1, 5)),
            "10:11:12"
        );
    }

    #[test]
    fn test_format_updated_other_day_shows_date() {
        assert_eq!(
            format_updated(Some("2024-01-05T10:11:12Z"), date(2024, 2, 1)),
            "2024-01-05"
        );
    }

    #[test]
    fn test_format_updated_missing_or_invalid() {
        assert_eq!(format_updated(None, date(2024, 1, 5)), "");
        assert_eq!(format_updated(Some("yesterday"), date(2024, 1, 5)), "yesterday");
    }

    #[test]
    fn test_apps_table_contents() {
        let apps = vec![CustomApplication {
            id: "65980d79eea4fd0eddd59bba".to_string(),
            name: "my-app".to_string(),
            status: Some("running".to_string()),
            updated_at: Some("2024-01-05T10:11:12Z".to_string()),
            application_url: Some("https://app.test/custom_applications/1/".to_string()),
            external_access_enabled: Some(true),
            external_access_recipients: vec!["a@x.com".to_string(), "b@x.com".to_string()],
            ..Default::default()
        }];
        let rendered = apps_table(&apps, date(2024, 2, 1)).to_string();
        assert!(rendered.contains("EXTERNAL SHARING RECIPIENTS"));
        assert!(rendered.contains("my-app"));
        assert!(rendered.contains("2024-01-05"));
        assert!(rendered.contains("a@x.com,b@x.com"));
    }

    #[test]
    fn test_ids_are_newline_delimited() {
        assert_eq!(ids(["a", "b"].into_iter()), "a\nb");
    }
}
