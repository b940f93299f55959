//! Progress events for git subprocesses.
//!
//! Git writes transfer progress to stderr (`--progress`). Each line is parsed
//! into a [`GitProgressEvent`] and fanned out over a broadcast channel so a CLI
//! spinner or any other observer can follow along.

use std::sync::{Arc, LazyLock};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

static RE_PERCENTAGE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)%").unwrap());
static RE_COUNT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\((\d+)/(\d+)\)").unwrap());
static RE_BYTES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\d.]+)\s*(bytes?|[KMGT]iB)").unwrap());
static RE_SPEED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\|\s*([\d.]+)\s*([KMGT]?i?B)/s").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GitOperationType {
    Init,
    Clone,
    Commit,
    Push,
    Pull,
    Branch,
    AddRemote,
}

impl std::fmt::Display for GitOperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            GitOperationType::Init => "init",
            GitOperationType::Clone => "clone",
            GitOperationType::Commit => "commit",
            GitOperationType::Push => "push",
            GitOperationType::Pull => "pull",
            GitOperationType::Branch => "branch",
            GitOperationType::AddRemote => "add-remote",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GitOperationPhase {
    Starting,
    StagingFiles,
    Committing,
    Counting,
    Compressing,
    Writing,
    Receiving,
    Resolving,
    Unpacking,
    Completed,
    Failed,
}

impl std::fmt::Display for GitOperationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            GitOperationPhase::Starting => "Starting...",
            GitOperationPhase::StagingFiles => "Staging files...",
            GitOperationPhase::Committing => "Committing...",
            GitOperationPhase::Counting => "Counting objects...",
            GitOperationPhase::Compressing => "Compressing objects...",
            GitOperationPhase::Writing => "Writing objects...",
            GitOperationPhase::Receiving => "Receiving objects...",
            GitOperationPhase::Resolving => "Resolving deltas...",
            GitOperationPhase::Unpacking => "Unpacking objects...",
            GitOperationPhase::Completed => "Completed",
            GitOperationPhase::Failed => "Failed",
        };
        f.write_str(label)
    }
}

/// Keyword → phase, checked in order against the lowercased line.
const PHASE_KEYWORDS: &[(&str, GitOperationPhase)] = &[
    ("enumerating", GitOperationPhase::Counting),
    ("counting", GitOperationPhase::Counting),
    ("compressing", GitOperationPhase::Compressing),
    ("writing", GitOperationPhase::Writing),
    ("receiving", GitOperationPhase::Receiving),
    ("resolving", GitOperationPhase::Resolving),
    ("unpacking", GitOperationPhase::Unpacking),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitProgressEvent {
    pub operation_id: String,
    pub operation_type: GitOperationType,
    pub phase: GitOperationPhase,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_transferred: Option<u64>,
    /// Bytes per second.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_speed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl GitProgressEvent {
    fn new(
        operation_id: &str,
        operation_type: GitOperationType,
        phase: GitOperationPhase,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation_id: operation_id.to_string(),
            operation_type,
            phase,
            message: message.into(),
            progress: None,
            current: None,
            total: None,
            bytes_transferred: None,
            transfer_speed: None,
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.phase,
            GitOperationPhase::Completed | GitOperationPhase::Failed
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedProgress {
    pub phase: Option<GitOperationPhase>,
    pub current: Option<u64>,
    pub total: Option<u64>,
    pub percentage: Option<u8>,
    pub bytes: Option<u64>,
    pub speed: Option<u64>,
}

fn unit_multiplier(unit: &str) -> f64 {
    match unit.to_lowercase().as_str() {
        "kib" | "kb" => 1024.0,
        "mib" | "mb" => 1024.0 * 1024.0,
        "gib" | "gb" => 1024.0 * 1024.0 * 1024.0,
        "tib" | "tb" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        _ => 1.0,
    }
}

fn parse_size(captures: Option<regex::Captures<'_>>) -> Option<u64> {
    let captures = captures?;
    let number: f64 = captures.get(1)?.as_str().parse().ok()?;
    let unit = captures.get(2)?.as_str();
    Some((number * unit_multiplier(unit)) as u64)
}

/// Parses one stderr line such as
/// `Writing objects:  33% (1/3), 256 bytes | 256.00 KiB/s`.
pub fn parse_git_progress(line: &str) -> ParsedProgress {
    let lower = line.to_lowercase();

    let phase = PHASE_KEYWORDS
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map(|(_, phase)| *phase);

    let percentage = RE_PERCENTAGE
        .captures(line)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok());

    let (current, total) = match RE_COUNT.captures(line) {
        Some(c) => (
            c.get(1).and_then(|m| m.as_str().parse().ok()),
            c.get(2).and_then(|m| m.as_str().parse().ok()),
        ),
        None => (None, None),
    };

    ParsedProgress {
        phase,
        current,
        total,
        percentage,
        bytes: parse_size(RE_BYTES.captures(line)),
        speed: parse_size(RE_SPEED.captures(line)),
    }
}

/// Reports progress for one git invocation.
pub struct OperationProgress {
    operation_id: String,
    operation_type: GitOperationType,
    sender: Arc<broadcast::Sender<GitProgressEvent>>,
}

impl OperationProgress {
    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    fn send(&self, event: GitProgressEvent) {
        // No subscribers is fine.
        let _ = self.sender.send(event);
    }

    pub fn phase(&self, phase: GitOperationPhase, message: &str) {
        self.send(GitProgressEvent::new(
            &self.operation_id,
            self.operation_type,
            phase,
            message,
        ));
    }

    /// Forwards a stderr line if it carries recognizable progress.
    pub fn output_line(&self, line: &str) {
        let parsed = parse_git_progress(line);
        let Some(phase) = parsed.phase else {
            return;
        };

        let mut event =
            GitProgressEvent::new(&self.operation_id, self.operation_type, phase, phase.to_string());
        match (parsed.current, parsed.total) {
            (Some(current), Some(total)) if total > 0 => {
                event.current = Some(current);
                event.total = Some(total);
                event.progress = Some(((current * 100) / total).min(100) as u8);
            }
            _ => event.progress = parsed.percentage,
        }
        event.bytes_transferred = parsed.bytes;
        event.transfer_speed = parsed.speed;
        self.send(event);
    }

    pub fn completed(&self, message: &str) {
        self.phase(GitOperationPhase::Completed, message);
    }

    pub fn failed(&self, error: &str) {
        let mut event = GitProgressEvent::new(
            &self.operation_id,
            self.operation_type,
            GitOperationPhase::Failed,
            "Operation failed",
        );
        event.error = Some(error.to_string());
        self.send(event);
    }
}

/// Fan-out of git progress events.
#[derive(Clone)]
pub struct GitProgressBroadcaster {
    sender: Arc<broadcast::Sender<GitProgressEvent>>,
}

impl GitProgressBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GitProgressEvent> {
        self.sender.subscribe()
    }

    pub fn start_operation(&self, operation_type: GitOperationType) -> OperationProgress {
        OperationProgress {
            operation_id: Uuid::new_v4().to_string(),
            operation_type,
            sender: Arc::clone(&self.sender),
        }
    }
}

impl Default for GitProgressBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_counting_objects() {
        let parsed = parse_git_progress("Counting objects: 100% (10/10), done.");
        assert_eq!(parsed.phase, Some(GitOperationPhase::Counting));
        assert_eq!(parsed.percentage, Some(100));
        assert_eq!(parsed.current, Some(10));
        assert_eq!(parsed.total, Some(10));
    }

    #[test]
    fn test_parse_writing_with_speed() {
        let parsed = parse_git_progress("Writing objects:  33% (1/3), 256 bytes | 256.00 KiB/s");
        assert_eq!(parsed.phase, Some(GitOperationPhase::Writing));
        assert_eq!(parsed.bytes, Some(256));
        assert_eq!(parsed.speed, Some(256 * 1024));
    }

    #[test]
    fn test_parse_receiving_mib() {
        let parsed =
            parse_git_progress("Receiving objects:  75% (75/100), 1.00 MiB | 512.00 KiB/s");
        assert_eq!(parsed.phase, Some(GitOperationPhase::Receiving));
        assert_eq!(parsed.bytes, Some(1024 * 1024));
    }

    #[test]
    fn test_parse_non_progress_line() {
        let parsed = parse_git_progress("To https://github.com/o/r.git");
        assert_eq!(parsed.phase, None);
    }

    #[test]
    fn test_output_line_broadcasts_progress() {
        let broadcaster = GitProgressBroadcaster::new(10);
        let mut rx = broadcaster.subscribe();

        let progress = broadcaster.start_operation(GitOperationType::Push);
        progress.output_line("remote: hello");
        progress.output_line("Compressing objects:  50% (5/10)");

        let event = rx.try_recv().unwrap();
        assert_eq!(event.operation_type, GitOperationType::Push);
        assert_eq!(event.phase, GitOperationPhase::Compressing);
        assert_eq!(event.progress, Some(50));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_failed_event_is_terminal() {
        let broadcaster = GitProgressBroadcaster::default();
        let mut rx = broadcaster.subscribe();

        broadcaster
            .start_operation(GitOperationType::Pull)
            .failed("Network error");

        let event = rx.try_recv().unwrap();
        assert!(event.is_terminal());
        assert_eq!(event.error.as_deref(), Some("Network error"));
    }
}
