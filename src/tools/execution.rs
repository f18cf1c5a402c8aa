use crate::config::ExecutionConfig;
use crate::error::{BackendError, ExecutionError};
use crate::models::{ExperimentReport, ExperimentRequest};
use crate::retry::RetryPolicy;
use serde_json::Value;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

/// Client for the remote code-execution service.
///
/// When the service is down and a startup command is configured, the client
/// launches it once and keeps the child process for its own lifetime (the
/// child is killed when the client is dropped).
pub struct ExecutionClient {
    config: ExecutionConfig,
    base_url: String,
    retry: RetryPolicy,
    http: reqwest::Client,
    child: Mutex<Option<Child>>,
}

impl ExecutionClient {
    pub fn new(config: ExecutionConfig) -> Self {
        let retry = RetryPolicy::new(config.max_retries, config.retry_backoff);
        let base_url = config.server_url.trim_end_matches('/').to_string();
        Self {
            config,
            base_url,
            retry,
            http: reqwest::Client::new(),
            child: Mutex::new(None),
        }
    }

    pub fn server_url(&self) -> &str {
        &self.base_url
    }

    pub async fn has_started_server(&self) -> bool {
        self.child.lock().await.is_some()
    }

    /// Health check under the retry policy.
    pub async fn handshake(&self) -> bool {
        let url = format!("{}{}", self.base_url, self.config.handshake_path);
        let timeout = Duration::from_secs(self.config.handshake_timeout);
        let (http, url) = (&self.http, &url);
        let result = self
            .retry
            .run("execution handshake", |_| async move {
                let response = http.get(url).timeout(timeout).send().await?;
                let status = response.status();
                if status.is_success() {
                    Ok::<(), BackendError>(())
                } else {
                    let body = response.text().await.unwrap_or_default();
                    Err(BackendError::from_status(status, body))
                }
            })
            .await;
        result.is_ok()
    }

    /// Make sure the service answers, launching it if configured to.
    #[instrument(skip(self), fields(server = %self.base_url))]
    pub async fn ensure_running(&self) -> Result<(), ExecutionError> {
        if self.handshake().await {
            return Ok(());
        }

        let launched = self.launch().await?;
        if launched {
            tokio::time::sleep(Duration::from_millis(self.config.startup_grace_ms)).await;
        }

        if self.handshake().await {
            info!("Execution server reachable");
            Ok(())
        } else {
            Err(ExecutionError::Unreachable(self.base_url.clone()))
        }
    }

    async fn launch(&self) -> Result<bool, ExecutionError> {
        let Some(command) = self
            .config
            .startup_command
            .as_deref()
            .filter(|c| !c.trim().is_empty())
        else {
            return Ok(false);
        };

        let mut child = self.child.lock().await;
        if child.is_some() {
            return Ok(false);
        }

        info!("Launching execution server: {}", command);
        let spawned = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(ExecutionError::Spawn)?;
        *child = Some(spawned);
        Ok(true)
    }

    #[instrument(skip(self, code))]
    pub async fn run_experiment(
        &self,
        hypothesis: &str,
        code: &str,
    ) -> Result<ExperimentReport, ExecutionError> {
        self.ensure_running().await?;

        let url = format!("{}/execute", self.base_url);
        let timeout = Duration::from_secs(self.config.request_timeout);
        let request = ExperimentRequest {
            hypothesis: hypothesis.to_string(),
            code: code.to_string(),
        };

        let (http, url, body) = (&self.http, &url, &request);
        let raw = self
            .retry
            .run("execution request", |_| async move {
                let response = http
                    .post(url)
                    .timeout(timeout)
                    .json(body)
                    .send()
                    .await?;
                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(BackendError::from_status(status, body));
                }
                Ok::<Value, BackendError>(response.json::<Value>().await?)
            })
            .await
            .map_err(|err| {
                warn!("Experiment submission failed: {}", err);
                ExecutionError::from(err)
            })?;

        Ok(ExperimentReport {
            hypothesis: request.hypothesis,
            code: request.code,
            raw,
        })
    }
}

/// Reduce a raw execution result to a markdown report.
pub fn interpret_result(raw: &Value) -> String {
    let logs = first_present(raw, &["logs", "stderr"]);
    let output = first_present(raw, &["stdout", "result"]);
    let summary = first_present(raw, &["summary"]);

    let mut parts = vec![
        "### Execution Summary".to_string(),
        summary
            .map(render)
            .unwrap_or_else(|| "The execution server did not return an explicit summary.".to_string()),
        String::new(),
        "### Output".to_string(),
        output.map(render).unwrap_or_default(),
    ];
    if let Some(logs) = logs {
        parts.extend([String::new(), "### Logs".to_string(), render(logs)]);
    }
    parts.join("\n")
}

fn first_present<'a>(raw: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().filter_map(|key| raw.get(*key)).find(|value| is_present(value))
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Number(_) => true,
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}
