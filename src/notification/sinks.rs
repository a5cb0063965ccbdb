use async_trait::async_trait;
use reqwest::Client;
use std::io::Write;
use std::process::Stdio;
use std::sync::mpsc;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::oneshot;

use super::event::NotificationEvent;
use crate::core::SinkError;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// One notification channel.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn name(&self) -> &'static str;

    /// Disabled sinks are reported as skipped and never called.
    fn enabled(&self) -> bool;

    async fn deliver(&self, event: &NotificationEvent) -> Result<(), SinkError>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Webhook
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct WebhookSink {
    http: Client,
    url: Option<String>,
}

impl WebhookSink {
    pub fn new(url: Option<&str>) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(WEBHOOK_TIMEOUT).build()?;

        Ok(Self {
            http,
            url: url.map(str::to_string),
        })
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    fn name(&self) -> &'static str {
        "webhook"
    }

    fn enabled(&self) -> bool {
        self.url.is_some()
    }

    async fn deliver(&self, event: &NotificationEvent) -> Result<(), SinkError> {
        let Some(url) = &self.url else {
            return Ok(());
        };

        let response = self
            .http
            .post(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&event.webhook_payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::WebhookStatus(status.as_u16()));
        }

        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Clipboard
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

type ClipboardRequest = (String, oneshot::Sender<Result<(), String>>);

/// Writes the whisper to the OS clipboard.
///
/// The clipboard handle lives on a dedicated thread: on X11 the copied text
/// is only served while the handle that set it stays alive.
pub struct ClipboardSink {
    requests: Option<Mutex<mpsc::Sender<ClipboardRequest>>>,
}

impl ClipboardSink {
    pub fn new(enabled: bool) -> Self {
        if !enabled {
            return Self { requests: None };
        }

        let (tx, rx) = mpsc::channel::<ClipboardRequest>();
        let spawned = std::thread::Builder::new()
            .name("clipboard".to_string())
            .spawn(move || clipboard_worker(rx));

        match spawned {
            Ok(_) => Self {
                requests: Some(Mutex::new(tx)),
            },
            Err(e) => {
                tracing::warn!("⚠️  Clipboard thread failed to start, sink disabled: {}", e);
                Self { requests: None }
            }
        }
    }

    pub fn disabled() -> Self {
        Self::new(false)
    }
}

fn clipboard_worker(rx: mpsc::Receiver<ClipboardRequest>) {
    let mut clipboard: Option<arboard::Clipboard> = None;

    for (text, reply) in rx {
        if clipboard.is_none() {
            match arboard::Clipboard::new() {
                Ok(handle) => clipboard = Some(handle),
                Err(e) => {
                    let _ = reply.send(Err(e.to_string()));
                    continue;
                }
            }
        }

        let result = match clipboard.as_mut() {
            Some(handle) => handle.set_text(text).map_err(|e| e.to_string()),
            None => Err("clipboard handle missing".to_string()),
        };

        // Reopened on the next request.
        if result.is_err() {
            clipboard = None;
        }

        let _ = reply.send(result);
    }
}

#[async_trait]
impl NotificationSink for ClipboardSink {
    fn name(&self) -> &'static str {
        "clipboard"
    }

    fn enabled(&self) -> bool {
        self.requests.is_some()
    }

    async fn deliver(&self, event: &NotificationEvent) -> Result<(), SinkError> {
        let Some(requests) = &self.requests else {
            return Ok(());
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        {
            let sender = requests
                .lock()
                .map_err(|_| SinkError::Clipboard("clipboard sender poisoned".to_string()))?;
            sender
                .send((event.whisper.clone(), reply_tx))
                .map_err(|_| SinkError::Clipboard("clipboard thread stopped".to_string()))?;
        }

        reply_rx
            .await
            .map_err(|_| SinkError::Clipboard("clipboard thread stopped".to_string()))?
            .map_err(SinkError::Clipboard)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Console
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One line per notification, on stdout unless another writer is given.
pub struct ConsoleSink {
    out: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleSink {
    pub fn stdout() -> Self {
        Self::with_writer(Box::new(std::io::stdout()))
    }

    pub fn with_writer(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }
}

#[async_trait]
impl NotificationSink for ConsoleSink {
    fn name(&self) -> &'static str {
        "console"
    }

    fn enabled(&self) -> bool {
        true
    }

    async fn deliver(&self, event: &NotificationEvent) -> Result<(), SinkError> {
        // A panic while printing leaves the writer usable.
        let mut out = match self.out.lock() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        };
        writeln!(out, "{}", event.message)?;
        out.flush()?;
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sound
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Runs a shell command (e.g. a media player) without waiting for it.
pub struct SoundSink {
    command: Option<String>,
}

impl SoundSink {
    pub fn new(command: Option<&str>) -> Self {
        Self {
            command: command
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
        }
    }
}

#[async_trait]
impl NotificationSink for SoundSink {
    fn name(&self) -> &'static str {
        "sound"
    }

    fn enabled(&self) -> bool {
        self.command.is_some()
    }

    async fn deliver(&self, _event: &NotificationEvent) -> Result<(), SinkError> {
        let Some(command) = &self.command else {
            return Ok(());
        };

        let (shell, flag) = if cfg!(windows) { ("cmd", "/C") } else { ("sh", "-c") };

        tokio::process::Command::new(shell)
            .arg(flag)
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(|_child| ())
            .map_err(|e| SinkError::Sound(e.to_string()))
    }
}
