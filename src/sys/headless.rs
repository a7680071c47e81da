//! An in-memory desktop.
//!
//! Stands in for a real window server: it serves a recorded set of displays,
//! apps and windows, applies moves to its own copy of the frames and can be
//! told to make individual windows fail. The `warden` binary runs against a
//! desktop loaded from a RON file, and the engine's tests use it as their
//! window source and sink.

use std::path::Path;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::model::app::{
    AppIdentity, ApplicationSnapshot, ForegroundChange, WindowHandle, WindowSnapshot,
};
use crate::sys::geometry::{Display, Rect};
use crate::sys::window::{CapturedWindow, SinkError, WindowSink, WindowSource};

const FOREGROUND_CHANNEL_CAPACITY: usize = 64;

/// How a window responds to move requests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowBehavior {
    #[default]
    Normal,
    /// The window went away after it was listed.
    Closed,
    /// Moves are refused, as if accessibility access were missing.
    Denied,
    /// Every move takes this long before it lands.
    Slow { delay_ms: u64 },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeadlessWindow {
    pub handle: WindowHandle,
    #[serde(default)]
    pub title: String,
    pub frame: Rect,
    #[serde(default)]
    pub last_focused: Option<u64>,
    #[serde(default)]
    pub behavior: WindowBehavior,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeadlessApp {
    pub identity: AppIdentity,
    pub windows: Vec<HeadlessWindow>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DesktopState {
    pub displays: Vec<Display>,
    pub apps: Vec<HeadlessApp>,
    /// Last handle handed out by `add_window`.
    #[serde(default)]
    pub next_handle: u64,
    /// Last focus sequence number handed out by `focus`.
    #[serde(default)]
    pub focus_counter: u64,
}

impl DesktopState {
    pub fn with_display(bounds: Rect) -> Self {
        Self {
            displays: vec![Display::new(bounds)],
            ..Default::default()
        }
    }

    pub fn add_display(&mut self, bounds: Rect) { self.displays.push(Display::new(bounds)); }

    /// Adds a window for `app`, creating the app entry on first use.
    pub fn add_window(&mut self, app: &AppIdentity, title: &str, frame: Rect) -> WindowHandle {
        let handle = WindowHandle(self.next_handle.max(self.max_handle()) + 1);
        self.next_handle = handle.0;
        let window = HeadlessWindow {
            handle,
            title: title.to_string(),
            frame,
            last_focused: None,
            behavior: WindowBehavior::Normal,
        };
        match self.apps.iter_mut().find(|a| &a.identity == app) {
            Some(existing) => existing.windows.push(window),
            None => self.apps.push(HeadlessApp { identity: app.clone(), windows: vec![window] }),
        }
        handle
    }

    fn max_handle(&self) -> u64 {
        self.apps
            .iter()
            .flat_map(|a| a.windows.iter())
            .map(|w| w.handle.0)
            .max()
            .unwrap_or(0)
    }

    fn window_mut(&mut self, handle: WindowHandle) -> Option<(&AppIdentity, &mut HeadlessWindow)> {
        self.apps.iter_mut().find_map(|app| {
            let identity = &app.identity;
            app.windows.iter_mut().find(|w| w.handle == handle).map(|w| (identity, w))
        })
    }

    fn window(&self, handle: WindowHandle) -> Option<&HeadlessWindow> {
        self.apps.iter().flat_map(|a| a.windows.iter()).find(|w| w.handle == handle)
    }
}

pub struct HeadlessDesktop {
    state: Mutex<DesktopState>,
    foreground: broadcast::Sender<ForegroundChange>,
}

impl HeadlessDesktop {
    pub fn new(state: DesktopState) -> Self {
        let (foreground, _) = broadcast::channel(FOREGROUND_CHANNEL_CAPACITY);
        Self { state: Mutex::new(state), foreground }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let buf = std::fs::read_to_string(path)?;
        let state: DesktopState = ron::from_str(&buf)?;
        Ok(Self::new(state))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let state = self.state();
        let text = ron::ser::to_string_pretty(&state, ron::ser::PrettyConfig::default())?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, text)?;
        Ok(())
    }

    pub fn state(&self) -> DesktopState { self.state.lock().clone() }

    pub fn frame_of(&self, handle: WindowHandle) -> Option<Rect> {
        self.state.lock().window(handle).map(|w| w.frame)
    }

    pub fn set_behavior(&self, handle: WindowHandle, behavior: WindowBehavior) {
        if let Some((_, window)) = self.state.lock().window_mut(handle) {
            window.behavior = behavior;
        }
    }

    /// Focuses `handle` and announces its app as the new foreground app.
    /// Returns `false` if there is no such window.
    pub fn focus(&self, handle: WindowHandle) -> bool {
        let app = {
            let mut state = self.state.lock();
            state.focus_counter += 1;
            let counter = state.focus_counter;
            let Some((identity, window)) = state.window_mut(handle) else {
                return false;
            };
            window.last_focused = Some(counter);
            identity.clone()
        };
        debug!(?handle, app = %app.bundle_id, "foreground changed");
        // Nobody listening is fine: auto-arrangement may be off.
        _ = self.foreground.send(ForegroundChange::now(app));
        true
    }
}

impl WindowSource for HeadlessDesktop {
    fn list_applications(&self) -> Vec<ApplicationSnapshot> {
        let state = self.state.lock();
        state
            .apps
            .iter()
            .filter(|app| !app.windows.is_empty())
            .map(|app| ApplicationSnapshot {
                identity: app.identity.clone(),
                windows: app
                    .windows
                    .iter()
                    .map(|w| WindowSnapshot {
                        handle: w.handle,
                        title: w.title.clone(),
                        frame: w.frame,
                        last_focused: w.last_focused,
                    })
                    .collect(),
            })
            .collect()
    }

    fn displays(&self) -> Vec<Display> { self.state.lock().displays.clone() }

    fn foreground_changes(&self) -> broadcast::Receiver<ForegroundChange> {
        self.foreground.subscribe()
    }
}

impl WindowSink for HeadlessDesktop {
    async fn move_resize(&self, handle: WindowHandle, rect: Rect) -> Result<(), SinkError> {
        let behavior = {
            let state = self.state.lock();
            state.window(handle).map(|w| w.behavior)
        };
        match behavior {
            None | Some(WindowBehavior::Closed) => return Err(SinkError::WindowClosed(handle)),
            Some(WindowBehavior::Denied) => return Err(SinkError::PermissionDenied(handle)),
            Some(WindowBehavior::Slow { delay_ms }) => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            Some(WindowBehavior::Normal) => {}
        }

        let mut state = self.state.lock();
        let (_, window) = state.window_mut(handle).ok_or(SinkError::WindowClosed(handle))?;
        trace!(?handle, from = ?window.frame, to = ?rect, "moving window");
        window.frame = rect;
        Ok(())
    }

    fn capture_current_arrangement(&self) -> Vec<CapturedWindow> {
        let state = self.state.lock();
        state
            .apps
            .iter()
            .flat_map(|app| {
                app.windows
                    .iter()
                    .filter(|w| w.behavior != WindowBehavior::Closed)
                    .map(|w| CapturedWindow {
                        handle: w.handle,
                        frame: w.frame,
                        app: app.identity.clone(),
                    })
            })
            .collect()
    }
}
