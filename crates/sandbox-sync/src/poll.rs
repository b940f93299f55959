//! Fixed-interval polling of deployment status.
//!
//! The poller fetches once right away, then on every interval tick or manual
//! trigger, and publishes each snapshot on a broadcast channel. It stops on
//! [`StatusPoller::stop`] or when dropped. [`HttpStatusSource`] reads the
//! statuses from a configured HTTP endpoint.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::workspace::WorkspaceDescriptor;

#[derive(Error, Debug)]
pub enum PollError {
    #[error("Status source unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid status response: {0}")]
    InvalidResponse(String),

    #[error("Invalid status URL: {0}")]
    InvalidUrl(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentState {
    Up,
    InProgress,
    Error,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentStatus {
    /// Matches [`WorkspaceDescriptor::deployment_resource_name`].
    pub resource_name: String,
    pub state: DeploymentState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Where deployment status comes from.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<DeploymentStatus>, PollError>;
}

/// Fetches a JSON array of [`DeploymentStatus`] with a GET request.
pub struct HttpStatusSource {
    http: reqwest::Client,
    url: Url,
}

impl HttpStatusSource {
    pub fn new(url: &str) -> Result<Self, PollError> {
        let url = Url::parse(url).map_err(|e| PollError::InvalidUrl(format!("{}: {}", url, e)))?;
        Ok(Self {
            http: reqwest::Client::new(),
            url,
        })
    }
}

#[async_trait]
impl StatusSource for HttpStatusSource {
    async fn fetch(&self) -> Result<Vec<DeploymentStatus>, PollError> {
        let response = self
            .http
            .get(self.url.clone())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| PollError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PollError::Unavailable(format!(
                "{} answered with status {}",
                self.url,
                status.as_u16()
            )));
        }

        response
            .json::<Vec<DeploymentStatus>>()
            .await
            .map_err(|e| PollError::InvalidResponse(e.to_string()))
    }
}

/// One poll result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub fetched_at: DateTime<Utc>,
    pub statuses: Vec<DeploymentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Statuses keyed by workspace id. Workspaces without a deployment, or whose
/// deployment is not reported, are absent.
pub fn statuses_by_workspace(
    workspaces: &[WorkspaceDescriptor],
    statuses: &[DeploymentStatus],
) -> HashMap<String, DeploymentStatus> {
    let by_resource: HashMap<&str, &DeploymentStatus> = statuses
        .iter()
        .map(|s| (s.resource_name.as_str(), s))
        .collect();

    workspaces
        .iter()
        .filter_map(|w| {
            let name = w.deployment_resource_name.as_deref()?;
            let status = by_resource.get(name)?;
            Some((w.workspace_id.clone(), (*status).clone()))
        })
        .collect()
}

pub struct StatusPoller {
    shutdown: Arc<AtomicBool>,
    trigger_tx: broadcast::Sender<()>,
    snapshot_tx: broadcast::Sender<StatusSnapshot>,
    handle: Option<JoinHandle<()>>,
}

impl StatusPoller {
    /// Spawns the polling task on the current tokio runtime.
    pub fn start(source: Arc<dyn StatusSource>, interval: Duration) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let (trigger_tx, mut trigger_rx) = broadcast::channel::<()>(16);
        let (snapshot_tx, _) = broadcast::channel::<StatusSnapshot>(16);

        let task_shutdown = Arc::clone(&shutdown);
        let task_snapshots = snapshot_tx.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                // The first tick completes immediately.
                tokio::select! {
                    _ = ticker.tick() => {},
                    Ok(()) = trigger_rx.recv() => {
                        log::debug!("Manual status refresh triggered");
                    },
                }

                if task_shutdown.load(Ordering::Acquire) {
                    break;
                }

                let snapshot = match source.fetch().await {
                    Ok(statuses) => StatusSnapshot {
                        fetched_at: Utc::now(),
                        statuses,
                        error: None,
                    },
                    Err(e) => {
                        log::warn!("Deployment status poll failed: {}", e);
                        StatusSnapshot {
                            fetched_at: Utc::now(),
                            statuses: Vec::new(),
                            error: Some(e.to_string()),
                        }
                    }
                };
                let _ = task_snapshots.send(snapshot);
            }
            log::debug!("Status poller stopped");
        });

        Self {
            shutdown,
            trigger_tx,
            snapshot_tx,
            handle: Some(handle),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Polls now instead of waiting for the next tick.
    pub fn trigger(&self) {
        let _ = self.trigger_tx.send(());
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::WorkspaceOrigin;
    use std::sync::atomic::AtomicUsize;

    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl StatusSource for CountingSource {
        async fn fetch(&self) -> Result<Vec<DeploymentStatus>, PollError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n == 1 {
                return Err(PollError::Unavailable("cluster unreachable".to_string()));
            }
            Ok(vec![DeploymentStatus {
                resource_name: "dep-1".to_string(),
                state: DeploymentState::Up,
                url: Some("https://dep-1.example.com".to_string()),
            }])
        }
    }

    fn source() -> Arc<CountingSource> {
        Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
        })
    }

    #[test]
    fn test_statuses_by_workspace() {
        let mut deployed = WorkspaceDescriptor::new("ws1", "Deployed", WorkspaceOrigin::Local);
        deployed.deployment_resource_name = Some("dep-1".to_string());
        let mut gone = WorkspaceDescriptor::new("ws2", "Gone", WorkspaceOrigin::Local);
        gone.deployment_resource_name = Some("dep-2".to_string());
        let plain = WorkspaceDescriptor::new("ws3", "Plain", WorkspaceOrigin::Local);

        let statuses = vec![DeploymentStatus {
            resource_name: "dep-1".to_string(),
            state: DeploymentState::InProgress,
            url: None,
        }];
        let map = statuses_by_workspace(&[deployed, gone, plain], &statuses);

        assert_eq!(map.len(), 1);
        assert_eq!(map["ws1"].state, DeploymentState::InProgress);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_immediately_then_on_interval() {
        let source = source();
        let mut poller = StatusPoller::start(source.clone(), Duration::from_secs(5));
        let mut rx = poller.subscribe();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.statuses.len(), 1);

        let second = rx.recv().await.unwrap();
        assert!(second.error.is_some());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);

        poller.stop();
        assert!(!poller.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_trigger() {
        let source = source();
        let poller = StatusPoller::start(source.clone(), Duration::from_secs(3600));
        let mut rx = poller.subscribe();
        rx.recv().await.unwrap();

        poller.trigger();
        rx.recv().await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_http_source_reads_statuses() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "resourceName": "dep-1", "state": "UP", "url": "https://dep-1.example.com" },
                { "resourceName": "dep-2", "state": "IN_PROGRESS" }
            ])))
            .mount(&server)
            .await;

        let source = HttpStatusSource::new(&format!("{}/status", server.uri())).unwrap();
        let statuses = source.fetch().await.unwrap();

        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].state, DeploymentState::Up);
        assert_eq!(statuses[1].state, DeploymentState::InProgress);
        assert!(statuses[1].url.is_none());
    }

    #[tokio::test]
    async fn test_http_source_reports_failures() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let source = HttpStatusSource::new(&server.uri()).unwrap();
        assert!(matches!(source.fetch().await, Err(PollError::Unavailable(_))));
        assert!(matches!(source.fetch().await, Err(PollError::InvalidResponse(_))));

        assert!(matches!(
            HttpStatusSource::new("not a url"),
            Err(PollError::InvalidUrl(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_polling() {
        let source = source();
        let poller = StatusPoller::start(source.clone(), Duration::from_secs(1));
        let mut rx = poller.subscribe();
        rx.recv().await.unwrap();
        drop(poller);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }
}
