// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Zoom-change debounce

use crate::events::ShellSignal;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::time::timeout;

/// Default quiet window before a zoom change is announced
pub const DEFAULT_ZOOM_DEBOUNCE: Duration = Duration::from_millis(10);

/// Coalesces bursts of zoom changes into one [`ShellSignal::ZoomChange`]
///
/// Only the latest level is kept, however long the burst runs.
pub struct ZoomDebouncer {
    window: Duration,
    sender: watch::Sender<i32>,
    watcher: Mutex<Watcher>,
}

struct Watcher {
    receiver: watch::Receiver<i32>,
    /// A burst was seen but has not settled yet
    in_burst: bool,
}

impl Default for ZoomDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_ZOOM_DEBOUNCE)
    }
}

impl ZoomDebouncer {
    /// Create a debouncer announcing after `window` of quiet
    #[must_use]
    pub fn new(window: Duration) -> Self {
        let (sender, receiver) = watch::channel(0);
        Self {
            window,
            sender,
            watcher: Mutex::new(Watcher { receiver, in_burst: false }),
        }
    }

    /// Record a zoom level
    pub fn notify(&self, zoom: i32) {
        self.sender.send_replace(zoom);
    }

    /// Latest recorded level, settled or not
    #[must_use]
    pub fn latest(&self) -> i32 {
        *self.sender.borrow()
    }

    /// Wait for the next burst to settle and return its latest level.
    ///
    /// Cancel-safe: a burst interrupted mid-window resumes on the next call.
    pub async fn settled(&self) -> Option<ShellSignal> {
        let mut watcher = self.watcher.lock().await;
        if !watcher.in_burst {
            watcher.receiver.changed().await.ok()?;
            watcher.in_burst = true;
        }
        while let Ok(changed) = timeout(self.window, watcher.receiver.changed()).await {
            changed.ok()?;
        }
        watcher.in_burst = false;
        let zoom = *watcher.receiver.borrow_and_update();
        Some(ShellSignal::ZoomChange { zoom })
    }
}
