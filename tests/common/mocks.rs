use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use html_audit::{ConformanceValidator, ReachabilityProbe, RemoteStatus, ValidatorMessage};

/// Reachability probe answering from a fixed table, `Ok` for unknown URLs
#[derive(Default)]
pub struct MockProbe {
    statuses: Mutex<HashMap<String, RemoteStatus>>,
    request_log: Mutex<Vec<String>>,
}

impl MockProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(self, url: &str, status: RemoteStatus) -> Self {
        self.statuses
            .lock()
            .unwrap()
            .insert(url.to_string(), status);
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.request_log.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.request_log.lock().unwrap().len()
    }
}

#[async_trait]
impl ReachabilityProbe for MockProbe {
    async fn probe(&self, url: &str) -> RemoteStatus {
        self.request_log.lock().unwrap().push(url.to_string());
        self.statuses
            .lock()
            .unwrap()
            .get(url)
            .copied()
            .unwrap_or(RemoteStatus::Ok)
    }
}

/// Conformance checker returning canned messages per file name, counting calls
#[derive(Default)]
pub struct MockConformance {
    responses: Mutex<HashMap<String, Vec<ValidatorMessage>>>,
    calls: Mutex<Vec<PathBuf>>,
    delay: Option<Duration>,
    unavailable: bool,
}

impl MockConformance {
    pub fn new() -> Self {
        Self::default()
    }

    /// A checker that never answers
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_messages(self, file_name: &str, messages: Vec<ValidatorMessage>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(file_name.to_string(), messages);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_for(&self, file_name: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|path| path.file_name().and_then(|n| n.to_str()) == Some(file_name))
            .count()
    }
}

#[async_trait]
impl ConformanceValidator for MockConformance {
    async fn check(&self, path: &Path) -> Option<Vec<ValidatorMessage>> {
        self.calls.lock().unwrap().push(path.to_path_buf());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.unavailable {
            return None;
        }

        let file_name = path.file_name()?.to_str()?;
        Some(
            self.responses
                .lock()
                .unwrap()
                .get(file_name)
                .cloned()
                .unwrap_or_default(),
        )
    }
}

/// A validator message of the given type
pub fn validator_message(kind: &str, message: &str, last_line: i64) -> ValidatorMessage {
    ValidatorMessage {
        kind: Some(kind.to_string()),
        message: Some(message.to_string()),
        extract: Some("<p>".to_string()),
        last_line: Some(last_line),
        ..ValidatorMessage::default()
    }
}
