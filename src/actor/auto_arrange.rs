//! Tracks whether auto-arrangement is on and decides which foreground
//! changes are acted upon.
//!
//! While enabled, a forwarding task relays the window source's foreground
//! notifications into the warden's queue. The warden asks [`AutoArranger::admit`]
//! about each one as it is dequeued, so turning the controller off also
//! discards anything that was already queued.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::actor::warden::{Event, Sender};
use crate::model::app::{AppIdentity, ForegroundChange};
use crate::sys::window::WindowSource;

/// What the controller reports to callers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoState {
    pub enabled: bool,
    pub last_applied_app: Option<AppIdentity>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    Arrange,
    Disabled,
    /// Sent before the controller was last enabled.
    Stale,
    /// The app was the last one arranged.
    SameApp,
}

#[derive(Default)]
pub struct AutoArranger {
    watcher: Option<CancellationToken>,
    enabled_at: Option<Instant>,
    last_applied_app: Option<AppIdentity>,
}

impl AutoArranger {
    pub fn new() -> Self { Self::default() }

    pub fn is_enabled(&self) -> bool { self.watcher.is_some() }

    pub fn state(&self) -> AutoState {
        AutoState {
            enabled: self.is_enabled(),
            last_applied_app: self.last_applied_app.clone(),
        }
    }

    /// Starts watching `source`. Returns `false` if already enabled, in which
    /// case nothing changes.
    pub fn enable<S: WindowSource + ?Sized>(&mut self, source: &S, events_tx: Sender) -> bool {
        if self.is_enabled() {
            debug!("auto-arrangement already enabled");
            return false;
        }
        let token = CancellationToken::new();
        let changes = BroadcastStream::new(source.foreground_changes());
        tokio::spawn(forward(changes, events_tx, token.clone()));
        self.watcher = Some(token);
        self.enabled_at = Some(Instant::now());
        info!("auto-arrangement enabled");
        true
    }

    /// Stops watching. Returns `false` if already disabled.
    pub fn disable(&mut self) -> bool {
        let Some(token) = self.watcher.take() else {
            debug!("auto-arrangement already disabled");
            return false;
        };
        token.cancel();
        self.enabled_at = None;
        self.last_applied_app = None;
        info!("auto-arrangement disabled");
        true
    }

    /// Returns to the initial disabled state.
    pub fn reset(&mut self) { self.disable(); }

    pub fn admit(&self, change: &ForegroundChange) -> Admission {
        let Some(enabled_at) = self.enabled_at else {
            return Admission::Disabled;
        };
        if change.timestamp < enabled_at {
            return Admission::Stale;
        }
        if self.last_applied_app.as_ref() == Some(&change.app) {
            return Admission::SameApp;
        }
        Admission::Arrange
    }

    pub fn record_applied(&mut self, app: AppIdentity) { self.last_applied_app = Some(app); }
}

impl Drop for AutoArranger {
    fn drop(&mut self) {
        if let Some(token) = self.watcher.take() {
            token.cancel();
        }
    }
}

async fn forward(
    mut changes: BroadcastStream<ForegroundChange>,
    events_tx: Sender,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            next = changes.next() => match next {
                Some(Ok(change)) => {
                    if events_tx.try_send(Event::ForegroundChanged(change)).is_err() {
                        break;
                    }
                }
                Some(Err(BroadcastStreamRecvError::Lagged(missed))) => {
                    warn!(missed, "dropped foreground notifications");
                }
                None => break,
            },
        }
    }
    debug!("foreground forwarding stopped");
}
