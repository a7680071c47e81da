//! The boundary between the engine and whatever actually owns the windows.

use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::model::app::{AppIdentity, ApplicationSnapshot, ForegroundChange, WindowHandle};
use crate::sys::geometry::{Display, Rect};

#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkError {
    #[error("window {0:?} no longer exists")]
    WindowClosed(WindowHandle),
    #[error("not permitted to move window {0:?}")]
    PermissionDenied(WindowHandle),
    #[error("window {handle:?} rejected the new frame: {reason}")]
    Rejected { handle: WindowHandle, reason: String },
}

/// A window as it currently sits on screen.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CapturedWindow {
    pub handle: WindowHandle,
    pub frame: Rect,
    pub app: AppIdentity,
}

pub trait WindowSource: Send + Sync + 'static {
    fn list_applications(&self) -> Vec<ApplicationSnapshot>;

    /// Work areas of all displays, primary first.
    fn displays(&self) -> Vec<Display>;

    /// Subscribes to foreground application changes. Every call returns an
    /// independent receiver.
    fn foreground_changes(&self) -> broadcast::Receiver<ForegroundChange>;
}

pub trait WindowSink: Send + Sync + 'static {
    fn move_resize(
        &self,
        handle: WindowHandle,
        rect: Rect,
    ) -> impl Future<Output = Result<(), SinkError>> + Send;

    fn capture_current_arrangement(&self) -> Vec<CapturedWindow>;
}
