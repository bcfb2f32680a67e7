// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic expiry sweeper.
//!
//! Each store implements [`Expire`] and the sweeper ticks over all of them
//! on a fixed interval. The sweep only ever deletes, so it can run against
//! live stores without coordinating with the components that insert.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::net_util::CancellationToken;

/// A store whose entries age out
pub trait Expire: Send + Sync {
    /// Short name used in sweep logs
    fn label(&self) -> &'static str;
    /// Remove every expired entry, returning how many were dropped
    fn remove_expired(&self) -> usize;
}

/// Handle to a running sweep task
pub struct Sweeper {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Sweeper {
    /// Start a background task sweeping `stores` every `interval`.
    pub fn spawn(interval: Duration, stores: Vec<Arc<dyn Expire>>) -> Self {
        let token = CancellationToken::new();
        let task_token = token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // the first tick fires immediately; skip it
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    _ = ticker.tick() => {
                        for store in &stores {
                            let removed = store.remove_expired();
                            if removed > 0 {
                                debug!(store = store.label(), removed, "swept expired entries");
                            }
                        }
                    }
                }
            }
            debug!("sweeper stopped");
        });

        Self { token, handle }
    }

    /// Cancel the sweep task and wait for it to finish.
    pub async fn shutdown(self) {
        self.token.cancel();
        let _ = self.handle.await;
    }
}
