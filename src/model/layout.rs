use serde::{Deserialize, Serialize};

use crate::model::app::{AppIdentity, WindowSnapshot};

/// A rectangle expressed as fractions of a display's work area.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Display index; 0 is the primary display.
    #[serde(default)]
    pub display: usize,
}

impl Region {
    pub const FULL: Region = Region::new(0.0, 0.0, 1.0, 1.0);

    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height, display: 0 }
    }

    pub const fn on_display(mut self, display: usize) -> Self {
        self.display = display;
        self
    }

    pub fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }

    /// Pulls offsets and extents back into `[0, 1]` so that `x + width <= 1`
    /// and `y + height <= 1`. Extents are kept when they fit.
    pub fn clamped(&self) -> Region {
        let (x, width) = clamp_axis(self.x, self.width);
        let (y, height) = clamp_axis(self.y, self.height);
        Region { x, y, width, height, display: self.display }
    }
}

fn clamp_axis(offset: f64, extent: f64) -> (f64, f64) {
    let extent = if extent.is_finite() { extent.clamp(0.0, 1.0) } else { 1.0 };
    let offset = if offset.is_finite() { offset } else { 0.0 };
    (offset.clamp(0.0, 1.0 - extent), extent)
}

/// Decides which running applications a [`WindowSlot`] applies to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppMatcher {
    /// Bundle id, bundle id prefix ending in `.`, or app name.
    App(String),
    /// Any of several ids, with the same rules as `App`.
    AnyApp(Vec<String>),
    /// Case-insensitive substring of the window title.
    Title(String),
    /// Every window.
    Any,
}

impl AppMatcher {
    pub fn matches(&self, app: &AppIdentity, window: &WindowSnapshot) -> bool {
        match self {
            AppMatcher::App(id) => app.matches_id(id),
            AppMatcher::AnyApp(ids) => ids.iter().any(|id| app.matches_id(id)),
            AppMatcher::Title(needle) => {
                !needle.is_empty() && window.title.to_lowercase().contains(&needle.to_lowercase())
            }
            AppMatcher::Any => true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WindowSlot {
    pub matcher: AppMatcher,
    pub region: Region,
    /// Lower values claim contested windows first.
    #[serde(default)]
    pub priority: Option<u32>,
}

impl WindowSlot {
    pub fn new(matcher: AppMatcher, region: Region) -> Self {
        Self { matcher, region, priority: None }
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = Some(priority);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub name: String,
    pub slots: Vec<WindowSlot>,
}

impl Layout {
    pub fn new(name: impl Into<String>, slots: Vec<WindowSlot>) -> Self {
        Self { name: name.into(), slots }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutOrigin {
    Preset,
    User,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutSummary {
    pub name: String,
    pub slot_count: usize,
    pub origin: LayoutOrigin,
}
