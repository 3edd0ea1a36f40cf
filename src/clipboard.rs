use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

static IMDB_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^tt\d{7,8}$").expect("static regex is valid"));

/// True when `content` is exactly an IMDb title id (`tt` + 7 or 8 digits).
pub fn is_imdb_id(content: &str) -> bool {
    IMDB_ID_RE.is_match(content)
}

#[async_trait]
pub trait ClipboardSource: Send + Sync {
    async fn read(&self) -> Result<String>;
}

/// Reads the clipboard through the platform's paste command.
#[derive(Debug, Clone)]
pub struct CommandClipboard {
    program: String,
    args: Vec<String>,
}

impl CommandClipboard {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn detect() -> Self {
        if cfg!(target_os = "macos") {
            Self::new("pbpaste", &[])
        } else if std::env::var_os("WAYLAND_DISPLAY").is_some() {
            Self::new("wl-paste", &["--no-newline"])
        } else {
            Self::new("xclip", &["-selection", "clipboard", "-o"])
        }
    }
}

#[async_trait]
impl ClipboardSource for CommandClipboard {
    async fn read(&self) -> Result<String> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.program))?;
        if !output.status.success() {
            return Err(anyhow!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Polls a clipboard source and hands new, matching values to a callback.
///
/// The callback is awaited inline, so the next poll starts only after it
/// returns. Stopping is cooperative: the flag is checked once per iteration.
pub struct ClipboardWatcher {
    source: Arc<dyn ClipboardSource>,
    interval: Duration,
    stop: Arc<AtomicBool>,
}

impl ClipboardWatcher {
    pub fn new(source: Arc<dyn ClipboardSource>, interval: Duration) -> Self {
        Self {
            source,
            interval,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub async fn run<P, F, Fut>(&self, predicate: P, mut callback: F)
    where
        P: Fn(&str) -> bool,
        F: FnMut(String) -> Fut,
        Fut: Future<Output = ()>,
    {
        let mut recent = String::new();
        while !self.stop.load(Ordering::SeqCst) {
            match self.source.read().await {
                Ok(current) if current != recent => {
                    recent = current;
                    if predicate(&recent) {
                        debug!("Clipboard matched: {}", recent);
                        callback(recent.clone()).await;
                    }
                }
                Ok(_) => {}
                Err(e) => warn!("Failed to read clipboard: {:#}", e),
            }
            tokio::time::sleep(self.interval).await;
        }
        debug!("Clipboard watcher stopped");
    }
}
