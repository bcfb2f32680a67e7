// SPDX-License-Identifier: MIT OR Apache-2.0

//! Network utilities shared by the services.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Token for signaling cancelation of a task
#[derive(Debug, Clone)]
pub struct CancellationToken {
    inner: Arc<tokio::sync::Notify>,
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new cancellation token
    pub fn new() -> Self {
        Self {
            inner: Arc::new(tokio::sync::Notify::new()),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Check if the token has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Cancel the token, notifying all waiters
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
        self.inner.notify_waiters();
    }

    /// Wait for cancellation
    pub async fn cancelled(&self) {
        if !self.is_cancelled() {
            self.inner.notified().await;
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve the address a request actually came from.
///
/// The first entry of `X-Forwarded-For` wins over the raw connection
/// address, so the directory keeps working behind a reverse proxy.
pub fn client_ip(forwarded: Option<&str>, remote: Option<SocketAddr>) -> Option<String> {
    if let Some(list) = forwarded {
        if let Some(first) = list.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return Some(first.to_string());
            }
        }
    }
    remote.map(|addr| addr.ip().to_string())
}
