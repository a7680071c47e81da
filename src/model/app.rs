use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::sys::geometry::Rect;

/// An identifier for a window, handed out by the window source.
///
/// Handles are ordered by creation: a lower handle belongs to a window that
/// was created earlier.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowHandle(pub u64);

/// Identity of a running application.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct AppIdentity {
    /// Bundle identifier, e.g. `com.apple.Terminal`. May be a bare category
    /// name such as `terminal` for sources that have no bundle ids.
    pub bundle_id: String,
    #[serde(default)]
    pub name: String,
}

impl AppIdentity {
    pub fn new(bundle_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            bundle_id: bundle_id.into(),
            name: name.into(),
        }
    }

    /// Whether `pattern` names this app. Patterns ending in `.` are bundle id
    /// prefixes (`com.jetbrains.`); otherwise the pattern must equal the bundle
    /// id, or the app name ignoring case.
    pub fn matches_id(&self, pattern: &str) -> bool {
        if pattern.is_empty() {
            return false;
        }
        if pattern.ends_with('.') {
            return self.bundle_id.starts_with(pattern);
        }
        self.bundle_id == pattern
            || self.bundle_id.eq_ignore_ascii_case(pattern)
            || (!self.name.is_empty() && self.name.eq_ignore_ascii_case(pattern))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WindowSnapshot {
    pub handle: WindowHandle,
    #[serde(default)]
    pub title: String,
    pub frame: Rect,
    /// Focus sequence number; larger means focused more recently.
    #[serde(default)]
    pub last_focused: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApplicationSnapshot {
    pub identity: AppIdentity,
    pub windows: Vec<WindowSnapshot>,
}

/// Sent by the window source when a different application becomes frontmost.
#[derive(Clone, Debug)]
pub struct ForegroundChange {
    pub app: AppIdentity,
    pub timestamp: Instant,
}

impl ForegroundChange {
    pub fn now(app: AppIdentity) -> Self {
        Self { app, timestamp: Instant::now() }
    }
}
