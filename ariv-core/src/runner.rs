//! Subprocess streaming runner (§4.E).
//!
//! Spawns the model runtime binary, parses its stdout as line-delimited
//! JSON (or raw lines as a degradation mode), and forwards tokens over a
//! channel. Stderr is drained concurrently to avoid pipe-capacity deadlock;
//! a bounded tail is kept for failure reporting.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use ariv_common::{ArivError, Result};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, Mutex};

use crate::config::RunnerConfig;

const STDERR_TAIL_BYTES: usize = 1200;

/// Session lifecycle, no back-edges: `Idle -> Spawning -> Streaming ->
/// Draining -> {Succeeded | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Idle,
    Spawning,
    Streaming,
    Draining,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone)]
pub struct ChatParams {
    pub model_path: String,
    pub prompt: String,
    pub num_gpu_layers: u32,
    pub max_tokens: u32,
    pub temperature: f32,
    /// True when `model_path` was named directly by the caller (the CLI's
    /// `bench`/`download`, or `/v1/eval`'s request body) — a missing path is
    /// then the caller's mistake. False when the path was resolved by the
    /// router from a request the caller did not pick a model for (`/v1/chat`),
    /// where a missing path is a server-side registry/deployment fault.
    pub path_user_visible: bool,
}

/// A live session: a channel of tokens (or a terminal error) plus a handle
/// to observe the session's state machine.
#[derive(Debug)]
pub struct StreamSession {
    pub tokens: mpsc::Receiver<Result<String>>,
    pub state: Arc<Mutex<RunnerState>>,
}

pub struct StreamingRunner {
    binary: String,
    shutdown_timeout: Duration,
    mock: bool,
}

impl StreamingRunner {
    pub fn new(binary: impl Into<String>, shutdown_timeout: Duration, mock: bool) -> Self {
        Self {
            binary: binary.into(),
            shutdown_timeout,
            mock,
        }
    }

    pub fn from_config(cfg: &RunnerConfig) -> Self {
        Self::new(
            cfg.binary.clone(),
            Duration::from_secs(cfg.shutdown_timeout_secs),
            cfg.mock,
        )
    }

    /// Spawn the runtime (or the mock generator) and return a streaming
    /// session. Fails before spawning if the model path does not exist
    /// (mock mode bypasses this check; its path is nominal, never read).
    pub async fn stream(&self, params: ChatParams) -> Result<StreamSession> {
        let state = Arc::new(Mutex::new(RunnerState::Idle));

        if self.mock {
            return Ok(self.stream_mock(params, state).await);
        }

        *state.lock().await = RunnerState::Spawning;

        let model_path = PathBuf::from(&params.model_path);
        if !model_path.exists() {
            *state.lock().await = RunnerState::Failed;
            return Err(ArivError::ModelNotFound {
                path: params.model_path,
                user_visible: params.path_user_visible,
            });
        }

        let mut cmd = build_command(&self.binary, &model_path, &params);
        let mut child = cmd.spawn().map_err(|e| {
            ArivError::Internal(format!("failed to spawn {}: {e}", self.binary))
        })?;

        let stdout = child.stdout.take().expect("stdout piped");
        let stderr = child.stderr.take().expect("stderr piped");

        let (tx, rx) = mpsc::channel(64);
        let binary = self.binary.clone();
        let model_path_str = params.model_path.clone();
        let shutdown_timeout = self.shutdown_timeout;
        let state_task = state.clone();

        tokio::spawn(async move {
            *state_task.lock().await = RunnerState::Streaming;
            drive_session(
                child,
                stdout,
                stderr,
                tx,
                binary,
                model_path_str,
                shutdown_timeout,
                state_task,
            )
            .await;
        });

        Ok(StreamSession { tokens: rx, state })
    }

    async fn stream_mock(&self, params: ChatParams, state: Arc<Mutex<RunnerState>>) -> StreamSession {
        let (tx, rx) = mpsc::channel(64);
        let max_tokens = params.max_tokens as usize;
        let words: Vec<String> = params
            .prompt
            .split_whitespace()
            .take(max_tokens)
            .map(|w| format!("{w} "))
            .collect();
        let state_task = state.clone();
        tokio::spawn(async move {
            *state_task.lock().await = RunnerState::Streaming;
            for word in words {
                if tx.send(Ok(word)).await.is_err() {
                    *state_task.lock().await = RunnerState::Failed;
                    return;
                }
            }
            *state_task.lock().await = RunnerState::Succeeded;
        });
        StreamSession { tokens: rx, state }
    }

    /// Run a session to completion, concatenating tokens. Used by the
    /// benchmark harness, which invokes the runner synchronously.
    pub async fn run_chat(&self, params: ChatParams) -> Result<(String, usize)> {
        let mut session = self.stream(params).await?;
        let mut text = String::new();
        let mut count = 0usize;
        while let Some(item) = session.tokens.recv().await {
            match item {
                Ok(token) => {
                    text.push_str(&token);
                    count += 1;
                }
                Err(e) => return Err(e),
            }
        }
        Ok((text, count))
    }
}

fn build_command(binary: &str, model_path: &Path, params: &ChatParams) -> Command {
    let mut cmd = Command::new(binary);
    cmd.arg("-m")
        .arg(model_path)
        .arg("-p")
        .arg(&params.prompt)
        .arg("-n")
        .arg(params.max_tokens.to_string())
        .arg("--temp")
        .arg(params.temperature.to_string())
        .arg("--mmap")
        .arg("--use-mlock")
        .arg("--num-gpu-layers")
        .arg(params.num_gpu_layers.to_string())
        .arg("--json")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

#[allow(clippy::too_many_arguments)]
async fn drive_session(
    mut child: Child,
    stdout: tokio::process::ChildStdout,
    stderr: tokio::process::ChildStderr,
    tx: mpsc::Sender<Result<String>>,
    binary: String,
    model_path: String,
    shutdown_timeout: Duration,
    state: Arc<Mutex<RunnerState>>,
) {
    let stderr_tail: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
    let stderr_tail_writer = stderr_tail.clone();
    let stderr_task = tokio::spawn(async move {
        let mut reader = BufReader::new(stderr);
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf).await;
        *stderr_tail_writer.lock().await = buf;
    });

    let mut lines = BufReader::new(stdout).lines();
    let mut cancelled = false;

    loop {
        match lines.next_line().await {
            Ok(Some(raw_line)) => {
                let line = raw_line.trim();
                if line.is_empty() {
                    continue;
                }
                let content = line.strip_prefix("data:").map(str::trim).unwrap_or(line);
                match parse_token_line(content) {
                    Some(token) => {
                        if tx.send(Ok(token)).await.is_err() {
                            cancelled = true;
                            break;
                        }
                    }
                    None => continue,
                }
            }
            Ok(None) => break,
            Err(_) => break,
        }
    }

    *state.lock().await = RunnerState::Draining;
    let _ = stderr_task.await;

    if cancelled {
        terminate_child(&mut child, shutdown_timeout).await;
        *state.lock().await = RunnerState::Failed;
        return;
    }

    match child.wait().await {
        Ok(status) if status.success() => {
            *state.lock().await = RunnerState::Succeeded;
        }
        Ok(status) => {
            let tail_bytes = stderr_tail.lock().await;
            let stderr_tail = bounded_tail(&tail_bytes);
            *state.lock().await = RunnerState::Failed;
            let _ = tx
                .send(Err(ArivError::RuntimeFailure {
                    binary,
                    model_path,
                    exit_code: status.code().unwrap_or(-1),
                    stderr_tail,
                }))
                .await;
        }
        Err(e) => {
            *state.lock().await = RunnerState::Failed;
            let _ = tx
                .send(Err(ArivError::Internal(format!("wait failed: {e}"))))
                .await;
        }
    }
}

async fn terminate_child(child: &mut Child, shutdown_timeout: Duration) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        let _ = nix::sys::signal::kill(
            nix::unistd::Pid::from_raw(pid as i32),
            nix::sys::signal::Signal::SIGTERM,
        );
    }
    if tokio::time::timeout(shutdown_timeout, child.wait())
        .await
        .is_err()
    {
        let _ = child.start_kill();
        let _ = child.wait().await;
    }
}

/// Parse one stdout line (already stripped of a `data:` prefix). Emits the
/// first non-empty of `token`/`content`/`text` if the line is a JSON object;
/// returns `None` (skip this line) when it parses but none of those fields
/// hold a non-empty string; falls back to the raw line only when the line
/// isn't valid JSON at all, for non-JSON runtimes.
fn parse_token_line(content: &str) -> Option<String> {
    match serde_json::from_str::<serde_json::Value>(content) {
        Ok(serde_json::Value::Object(obj)) => {
            for key in ["token", "content", "text"] {
                if let Some(s) = obj.get(key).and_then(|v| v.as_str()) {
                    if !s.is_empty() {
                        return Some(s.to_string());
                    }
                }
            }
            None
        }
        Ok(_) => None,
        Err(_) => Some(content.to_string()),
    }
}

fn bounded_tail(bytes: &[u8]) -> String {
    let start = bytes.len().saturating_sub(STDERR_TAIL_BYTES);
    let tail = String::from_utf8_lossy(&bytes[start..]).trim().to_string();
    if tail.is_empty() {
        "<empty>".to_string()
    } else {
        tail
    }
}
