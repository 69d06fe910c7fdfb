pub mod create;
pub mod environment;
pub mod logs;
pub mod ls;
pub mod publish;
pub mod share;
pub mod terminate;

use std::time::Duration;

use crate::api::models::ApplicationLogs;
use crate::api::{applications, ApiClient};
use crate::poller::{self, PollState, Poller};

/// Diagnostics printed when an application fails to start, most specific first
pub fn failure_report(app_id: &str, logs: &ApplicationLogs) -> String {
    if let Some(build_error) = logs.build_error.as_deref().filter(|e| !e.is_empty()) {
        let mut report = format!(
            "Error happened during dependency image build: {}",
            build_error
        );
        if let Some(build_log) = logs.build_log.as_deref().filter(|l| !l.is_empty()) {
            report.push('\n');
            report.push_str(build_log);
        }
        return report;
    }

    let runtime_log = logs.runtime_log();
    if !runtime_log.is_empty() {
        return format!("Runtime log:\n{}", runtime_log);
    }

    format!(
        "There are no logs for application {}. Please get in touch with support.",
        app_id
    )
}

/// Tell the operator the application did not come up and show why
pub async fn report_startup_failure(client: &ApiClient, app_id: &str) -> anyhow::Result<()> {
    eprintln!("Custom application did not achieve stable state.");
    let logs = applications::logs(client, app_id).await?;
    eprintln!("{}", failure_report(app_id, &logs));
    Ok(())
}

/// Poll an application's own status until it is running or has failed
pub async fn wait_until_running(
    client: &ApiClient,
    app_id: &str,
    interval: Duration,
) -> anyhow::Result<PollState> {
    let outcome = Poller::new("Application", interval)
        .poll(move || poller::app_state(client, app_id))
        .await?;

    match outcome.state {
        PollState::Succeeded => println!("Custom application {} is running.", app_id),
        _ => report_startup_failure(client, app_id).await?,
    }
    Ok(outcome.state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_error_wins() {
        let logs = ApplicationLogs {
            logs: vec!["runtime line".to_string()],
            build_error: Some("pip failed".to_string()),
            build_log: Some("Collecting streamlit".to_string()),
        };
        assert_eq!(
            failure_report("app", &logs),
            "Error happened during dependency image build: pip failed\nCollecting streamlit"
        );
    }

    #[test]
    fn test_runtime_log_when_no_build_error() {
        let logs = ApplicationLogs {
            logs: vec!["line 1".to_string(), "line 2".to_string()],
            ..Default::default()
        };
        assert_eq!(failure_report("app", &logs), "Runtime log:\nline 1\nline 2");
    }

    #[test]
    fn test_no_logs_notice() {
        let report = failure_report("65980d79eea4fd0eddd59bba", &ApplicationLogs::default());
        assert!(report.contains("There are no logs for application 65980d79eea4fd0eddd59bba"));
    }
}
