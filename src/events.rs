// src/events.rs

//! The caller-facing event stream.
//!
//! Every invocation owns exactly one [`EventSink`]; it is the only place that
//! hands out sequence numbers, which keeps them strictly increasing within a
//! stream no matter which component produced the message.

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::types::Level;

/// A single line of progress reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub seq: u64,
    pub level: Level,
    pub message: String,
}

impl LogEvent {
    pub fn is_error(&self) -> bool {
        self.level == Level::Error
    }
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.level, self.message)
    }
}

/// The consumer went away; the invocation should stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamClosed;

/// Sending half of an invocation's event stream.
#[derive(Debug)]
pub struct EventSink {
    tx: mpsc::Sender<LogEvent>,
    next_seq: u64,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<LogEvent>) -> Self {
        Self { tx, next_seq: 0 }
    }

    pub async fn info(&mut self, message: impl Into<String>) -> Result<(), StreamClosed> {
        self.emit(Level::Info, message).await
    }

    pub async fn error(&mut self, message: impl Into<String>) -> Result<(), StreamClosed> {
        self.emit(Level::Error, message).await
    }

    pub async fn emit(
        &mut self,
        level: Level,
        message: impl Into<String>,
    ) -> Result<(), StreamClosed> {
        let event = LogEvent {
            seq: self.next_seq,
            level,
            message: message.into(),
        };
        self.next_seq += 1;

        match level {
            Level::Info => debug!(seq = event.seq, "{}", event.message),
            Level::Error => error!(seq = event.seq, "{}", event.message),
        }

        self.tx.send(event).await.map_err(|_| StreamClosed)
    }

    /// Resolves once the receiving half has been dropped.
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}
