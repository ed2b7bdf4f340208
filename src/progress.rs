// ABOUTME: Progress events streamed to the caller while a deploy runs.
// ABOUTME: Every event is also mirrored to tracing so the console sees the same narration.

use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;

/// Severity of a progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        })
    }
}

/// A single step of narration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub level: Level,
    #[serde(rename = "data")]
    pub message: String,
}

/// Receives progress events synchronously, in order.
pub trait ProgressSink: Send + Sync {
    fn notify(&self, event: &ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn notify(&self, event: &ProgressEvent) {
        self(event)
    }
}

/// Sink that keeps every event, for embedding callers that report after the fact.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl CollectingSink {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().clone()
    }

    pub fn messages_at(&self, level: Level) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.level == level)
            .map(|e| e.message.clone())
            .collect()
    }
}

impl ProgressSink for CollectingSink {
    fn notify(&self, event: &ProgressEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Reporter handed to every pipeline stage. A missing sink is legal.
#[derive(Clone, Copy)]
pub struct Progress<'a> {
    sink: Option<&'a dyn ProgressSink>,
}

impl<'a> Progress<'a> {
    pub fn new(sink: Option<&'a dyn ProgressSink>) -> Self {
        Self { sink }
    }

    pub fn silent() -> Self {
        Self { sink: None }
    }

    pub fn emit(&self, level: Level, message: impl Into<String>) {
        let event = ProgressEvent {
            level,
            message: message.into(),
        };

        match level {
            Level::Debug => tracing::debug!("{}", event.message),
            Level::Info => tracing::info!("{}", event.message),
            Level::Warn => tracing::warn!("{}", event.message),
            Level::Error => tracing::error!("{}", event.message),
        }

        if let Some(sink) = self.sink {
            sink.notify(&event);
        }
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.emit(Level::Debug, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(Level::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.emit(Level::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(Level::Error, message);
    }
}

impl fmt::Debug for Progress<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Progress")
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}
