//! Append-only capture log for XHR/fetch exchanges.
//!
//! The capture task appends out-of-band while the run progresses; the
//! extraction chain only reads the log after navigation has quiesced, so a
//! mutex around the vector is all the synchronization required.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One captured response. `body` is `None` when the payload exceeded the
/// capture ceiling or could not be fetched.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetworkExchange {
    pub url: String,
    pub status: i64,
    pub resource_kind: String,
    pub content_type: String,
    pub body: Option<String>,
    pub captured_at: DateTime<Utc>,
}

/// Shared, append-only exchange log for the lifetime of one run.
#[derive(Clone)]
pub struct ResponseLog {
    entries: Arc<Mutex<Vec<NetworkExchange>>>,
    body_ceiling: usize,
}

impl ResponseLog {
    pub fn new(body_ceiling: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
            body_ceiling,
        }
    }

    pub fn body_ceiling(&self) -> usize {
        self.body_ceiling
    }

    /// Append one exchange, eliding the body when it exceeds the ceiling.
    pub fn push(&self, mut exchange: NetworkExchange) {
        if let Some(body) = &exchange.body {
            if body.len() > self.body_ceiling {
                debug!(url = %exchange.url, size = body.len(), "eliding oversized body");
                exchange.body = None;
            }
        }
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(exchange);
        }
    }

    /// Read-only snapshot in capture order.
    pub fn snapshot(&self) -> Vec<NetworkExchange> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
