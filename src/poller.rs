//! Completion polling for asynchronous platform jobs.
//!
//! The platform reports progress in several vocabularies (image build status,
//! job status behind a `Location` URL, application status). They all collapse
//! into [`PollState`], and a single [`Poller`] loop drives them: fetch, stop on a
//! terminal state, otherwise sleep a fixed interval and fetch again. There is no
//! timeout; the loop runs until a terminal state or until the process is
//! interrupted.

use reqwest::Method;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

use crate::api::models::JobStatus;
use crate::api::{applications, decode_json, environments, ApiClient, ApiResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Pending,
    Processing,
    Succeeded,
    Failed,
}

impl PollState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PollState::Succeeded | PollState::Failed)
    }

    /// Execution environment version `buildStatus`
    pub fn from_build_status(status: Option<&str>) -> Self {
        match status {
            Some("success") => PollState::Succeeded,
            Some("failed") => PollState::Failed,
            Some("submitted") | None => PollState::Pending,
            Some(_) => PollState::Processing,
        }
    }

    /// Status reported by an asynchronous job's status URL
    pub fn from_job_status(status: &str) -> Self {
        match status {
            "COMPLETED" => PollState::Succeeded,
            "ERROR" | "ABORTED" | "EXPIRED" => PollState::Failed,
            "INITIALIZED" => PollState::Pending,
            _ => PollState::Processing,
        }
    }

    /// Custom application `status`
    pub fn from_app_status(status: Option<&str>) -> Self {
        match status.map(str::to_ascii_lowercase).as_deref() {
            Some("running") => PollState::Succeeded,
            Some("failed") | Some("errored") => PollState::Failed,
            Some("pending") | None => PollState::Pending,
            Some(_) => PollState::Processing,
        }
    }
}

impl std::fmt::Display for PollState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollState::Pending => write!(f, "pending"),
            PollState::Processing => write!(f, "processing"),
            PollState::Succeeded => write!(f, "succeeded"),
            PollState::Failed => write!(f, "failed"),
        }
    }
}

/// Poll intervals, configurable through the `[polling]` config section
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PollSettings {
    pub image_build_interval_secs: u64,
    pub app_start_interval_secs: u64,
    pub log_follow_interval_secs: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            image_build_interval_secs: 5,
            app_start_interval_secs: 5,
            log_follow_interval_secs: 30,
        }
    }
}

impl PollSettings {
    pub fn image_build_interval(&self) -> Duration {
        Duration::from_secs(self.image_build_interval_secs)
    }

    pub fn app_start_interval(&self) -> Duration {
        Duration::from_secs(self.app_start_interval_secs)
    }

    pub fn log_follow_interval(&self) -> Duration {
        Duration::from_secs(self.log_follow_interval_secs)
    }
}

/// Terminal state reached by a poll loop and how many fetches it took
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    pub state: PollState,
    pub attempts: usize,
}

#[derive(Debug, Clone)]
pub struct Poller {
    interval: Duration,
    what: String,
}

impl Poller {
    pub fn new(what: impl Into<String>, interval: Duration) -> Self {
        Self {
            interval,
            what: what.into(),
        }
    }

    /// Call `fetch` until it reports a terminal state, sleeping between calls.
    ///
    /// Errors from `fetch` abort the loop immediately.
    pub async fn poll<F, Fut, E>(&self, mut fetch: F) -> Result<PollOutcome, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<PollState, E>>,
    {
        let mut attempts = 0;
        let mut last_state = None;

        loop {
            attempts += 1;
            let state = fetch().await?;

            if last_state != Some(state) {
                info!("{} → {}", self.what, state);
                last_state = Some(state);
            }

            if state.is_terminal() {
                return Ok(PollOutcome { state, attempts });
            }

            debug!(
                "{} still {}, checking again in {:?}",
                self.what, state, self.interval
            );
            tokio::time::sleep(self.interval).await;
        }
    }
}

/// Current state of the job behind a status URL. A redirect means done.
pub async fn job_state(client: &ApiClient, status_url: &str) -> ApiResult<PollState> {
    let response = client
        .send(client.request(Method::GET, status_url))
        .await?;
    if response.status().is_redirection() {
        return Ok(PollState::Succeeded);
    }
    let job: JobStatus = decode_json(response).await?;
    Ok(PollState::from_job_status(&job.status))
}

/// Current build state of an execution environment version
pub async fn image_build_state(
    client: &ApiClient,
    environment_id: &str,
    version_id: &str,
) -> ApiResult<PollState> {
    let version = environments::get_version(client, environment_id, version_id).await?;
    Ok(PollState::from_build_status(version.build_status.as_deref()))
}

/// Current state of a custom application
pub async fn app_state(client: &ApiClient, app_id: &str) -> ApiResult<PollState> {
    let app = applications::get_by_id(client, app_id).await?;
    Ok(PollState::from_app_status(app.status.as_deref()))
}

/// Text that was appended to a log since it was last seen.
///
/// Returns `None` when nothing changed. If the log no longer starts with what
/// was seen before (it was truncated or rotated) the whole current text is new.
pub fn log_delta<'a>(previous: &str, current: &'a str) -> Option<&'a str> {
    if previous == current {
        None
    } else if let Some(suffix) = current.strip_prefix(previous) {
        Some(suffix)
    } else {
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    fn scripted(
        states: &[PollState],
    ) -> (
        Arc<Mutex<usize>>,
        impl FnMut() -> std::future::Ready<Result<PollState, String>>,
    ) {
        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();
        let mut queue: VecDeque<PollState> = states.iter().copied().collect();
        let fetch = move || {
            *counter.lock().unwrap() += 1;
            let state = queue.pop_front().expect("poller fetched past the script");
            std::future::ready(Ok(state))
        };
        (calls, fetch)
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_polls_two_sleeps() {
        let poller = Poller::new("image build", Duration::from_secs(5));
        let (calls, fetch) = scripted(&[
            PollState::Processing,
            PollState::Processing,
            PollState::Succeeded,
        ]);

        let start = tokio::time::Instant::now();
        let outcome = poller.poll(fetch).await.unwrap();
        let elapsed = start.elapsed();

        assert_eq!(outcome.state, PollState::Succeeded);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(*calls.lock().unwrap(), 3);
        // Two intervals slept, never a third
        assert!(elapsed >= Duration::from_secs(10));
        assert!(elapsed < Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_is_terminal() {
        let poller = Poller::new("app startup", Duration::from_secs(5));
        let (_, fetch) = scripted(&[PollState::Pending, PollState::Failed]);
        let outcome = poller.poll(fetch).await.unwrap();
        assert_eq!(outcome.state, PollState::Failed);
        assert_eq!(outcome.attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_terminal_does_not_sleep() {
        let poller = Poller::new("app startup", Duration::from_secs(5));
        let (_, fetch) = scripted(&[PollState::Succeeded]);
        let start = tokio::time::Instant::now();
        let outcome = poller.poll(fetch).await.unwrap();
        assert_eq!(outcome.attempts, 1);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_fetch_error_aborts_loop() {
        let poller = Poller::new("app startup", Duration::ZERO);
        let mut calls = 0;
        let result: Result<PollOutcome, String> = poller
            .poll(|| {
                calls += 1;
                let result = if calls < 2 {
                    Ok(PollState::Processing)
                } else {
                    Err("boom".to_string())
                };
                std::future::ready(result)
            })
            .await;
        assert_eq!(result.unwrap_err(), "boom");
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_build_status_vocabulary() {
        assert_eq!(PollState::from_build_status(Some("success")), PollState::Succeeded);
        assert_eq!(PollState::from_build_status(Some("failed")), PollState::Failed);
        assert_eq!(PollState::from_build_status(Some("processing")), PollState::Processing);
        assert_eq!(PollState::from_build_status(Some("submitted")), PollState::Pending);
        assert_eq!(PollState::from_build_status(None), PollState::Pending);
    }

    #[test]
    fn test_job_status_vocabulary() {
        assert_eq!(PollState::from_job_status("COMPLETED"), PollState::Succeeded);
        for failed in ["ERROR", "ABORTED", "EXPIRED"] {
            assert_eq!(PollState::from_job_status(failed), PollState::Failed);
        }
        assert_eq!(PollState::from_job_status("INITIALIZED"), PollState::Pending);
        assert_eq!(PollState::from_job_status("RUNNING"), PollState::Processing);
    }

    #[test]
    fn test_app_status_vocabulary() {
        assert_eq!(PollState::from_app_status(Some("running")), PollState::Succeeded);
        assert_eq!(PollState::from_app_status(Some("RUNNING")), PollState::Succeeded);
        assert_eq!(PollState::from_app_status(Some("failed")), PollState::Failed);
        assert_eq!(PollState::from_app_status(Some("errored")), PollState::Failed);
        assert_eq!(PollState::from_app_status(Some("initializing")), PollState::Processing);
        assert_eq!(PollState::from_app_status(None), PollState::Pending);
    }

    #[test]
    fn test_log_delta() {
        assert_eq!(log_delta("a\nb", "a\nb"), None);
        assert_eq!(log_delta("a\nb", "a\nb\nc"), Some("\nc"));
        assert_eq!(log_delta("", "first"), Some("first"));
        // Rotated log: everything is new
        assert_eq!(log_delta("old text", "fresh"), Some("fresh"));
    }
}
