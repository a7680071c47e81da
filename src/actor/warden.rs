//! The warden owns all mutable engine state.
//!
//! It drains a single event queue: commands from an [`EngineHandle`] and
//! foreground changes relayed by the auto-arrangement watcher. Each event is
//! handled to completion before the next is dequeued, so commands never
//! interleave and no state is shared with callers.

mod error;

use std::cmp::Reverse;
use std::sync::Arc;

pub use error::EngineError;
use tokio::sync::oneshot;
use tracing::{Instrument, debug, info, instrument, trace, warn};

use crate::actor;
use crate::actor::auto_arrange::{Admission, AutoArranger, AutoState};
use crate::actor::executor::{ArrangementExecutor, ArrangementOutcome};
use crate::common::collections::HashMap;
use crate::common::config::Config;
use crate::layout_engine::grid;
use crate::layout_engine::repository::{LayoutRepository, RepositoryError};
use crate::layout_engine::resolver::{self, Assignment};
use crate::model::app::{AppIdentity, ForegroundChange};
use crate::model::layout::{AppMatcher, Layout, LayoutOrigin, LayoutSummary, WindowSlot};
use crate::model::preset::Preset;
use crate::sys::store::PersistentStore;
use crate::sys::window::{WindowSink, WindowSource};

pub type Sender = actor::Sender<Event>;
pub type Receiver = actor::Receiver<Event>;

type Reply<T> = oneshot::Sender<Result<T, EngineError>>;

#[derive(Debug)]
pub enum Event {
    Command(Command),
    ForegroundChanged(ForegroundChange),
}

#[derive(Debug)]
pub enum Command {
    ApplyPreset(String, Reply<ArrangementOutcome>),
    ApplyLayout(String, Reply<ArrangementOutcome>),
    /// Captures the current arrangement under a name.
    Save(String, Reply<LayoutSummary>),
    Delete(String, Reply<()>),
    List(Reply<Vec<LayoutSummary>>),
    EnableAuto(Reply<AutoState>),
    DisableAuto(Reply<AutoState>),
    AutoState(Reply<AutoState>),
    SnapToGrid(u32, Reply<ArrangementOutcome>),
    ResetWindows(Reply<ArrangementOutcome>),
    /// Retries assignments, usually the failed subset of an earlier outcome.
    Reapply(Vec<Assignment>, Reply<ArrangementOutcome>),
    Shutdown(Reply<()>),
}

/// The command surface of a running engine.
#[derive(Clone)]
pub struct EngineHandle {
    events_tx: Sender,
}

static_assertions::assert_impl_all!(EngineHandle: Send, Sync, Clone);

impl EngineHandle {
    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.events_tx
            .try_send(Event::Command(command(tx)))
            .map_err(|_| EngineError::EngineStopped)?;
        rx.await.map_err(|_| EngineError::EngineStopped)?
    }

    pub async fn apply_preset(&self, name: &str) -> Result<ArrangementOutcome, EngineError> {
        self.request(|r| Command::ApplyPreset(name.to_string(), r)).await
    }

    pub async fn apply_layout(&self, name: &str) -> Result<ArrangementOutcome, EngineError> {
        self.request(|r| Command::ApplyLayout(name.to_string(), r)).await
    }

    pub async fn save(&self, name: &str) -> Result<LayoutSummary, EngineError> {
        self.request(|r| Command::Save(name.to_string(), r)).await
    }

    pub async fn delete(&self, name: &str) -> Result<(), EngineError> {
        self.request(|r| Command::Delete(name.to_string(), r)).await
    }

    pub async fn list(&self) -> Result<Vec<LayoutSummary>, EngineError> {
        self.request(Command::List).await
    }

    pub async fn enable_auto(&self) -> Result<AutoState, EngineError> {
        self.request(Command::EnableAuto).await
    }

    pub async fn disable_auto(&self) -> Result<AutoState, EngineError> {
        self.request(Command::DisableAuto).await
    }

    pub async fn auto_state(&self) -> Result<AutoState, EngineError> {
        self.request(Command::AutoState).await
    }

    pub async fn snap_to_grid(&self, grid_size: u32) -> Result<ArrangementOutcome, EngineError> {
        self.request(|r| Command::SnapToGrid(grid_size, r)).await
    }

    pub async fn reset_windows(&self) -> Result<ArrangementOutcome, EngineError> {
        self.request(Command::ResetWindows).await
    }

    pub async fn reapply(&self, assignments: Vec<Assignment>) -> Result<ArrangementOutcome, EngineError> {
        self.request(|r| Command::Reapply(assignments, r)).await
    }

    pub async fn shutdown(&self) -> Result<(), EngineError> {
        self.request(Command::Shutdown).await
    }
}

pub struct Warden<D> {
    config: Config,
    desktop: Arc<D>,
    store: Arc<dyn PersistentStore>,
    repository: LayoutRepository,
    auto: AutoArranger,
    executor: ArrangementExecutor<D>,
    events_tx: Sender,
    /// Why the stored snapshot could not be restored. While set, nothing is
    /// written back to the store.
    restore_failure: Option<String>,
}

impl<D: WindowSource + WindowSink> Warden<D> {
    /// Creates the warden, restoring saved layouts from `store`. A store that
    /// cannot be read or restored leaves the repository empty and refuses
    /// saves and deletes, so the unreadable snapshot is never overwritten.
    pub fn new(config: Config, desktop: Arc<D>, store: Arc<dyn PersistentStore>, events_tx: Sender) -> Self {
        let mut repository = LayoutRepository::new();
        let restore_failure = match store.read_snapshot() {
            Ok(Some(bytes)) => match repository.restore(&bytes) {
                Ok(count) => {
                    info!(count, "restored saved layouts");
                    None
                }
                Err(e) => {
                    warn!("ignoring saved layouts, store is read-only until restart: {e}");
                    Some(e.to_string())
                }
            },
            Ok(None) => {
                debug!("no saved layouts");
                None
            }
            Err(e) => {
                warn!("could not read saved layouts, store is read-only until restart: {e}");
                Some(e.to_string())
            }
        };
        let executor = ArrangementExecutor::from_settings(desktop.clone(), &config.settings);
        Self {
            config,
            desktop,
            store,
            repository,
            auto: AutoArranger::new(),
            executor,
            events_tx,
            restore_failure,
        }
    }

    /// Starts a warden on the current runtime and returns its handle.
    pub fn spawn(config: Config, desktop: Arc<D>, store: Arc<dyn PersistentStore>) -> EngineHandle {
        let (events_tx, events_rx) = actor::channel();
        let warden = Warden::new(config, desktop, store, events_tx.clone());
        tokio::spawn(warden.run(events_rx));
        EngineHandle { events_tx }
    }

    pub async fn run(mut self, mut events: Receiver) {
        if self.config.settings.auto_enable_on_start {
            self.auto.enable(&*self.desktop, self.events_tx.clone());
        }
        while let Some((span, event)) = events.recv().await {
            if !self.handle_event(event).instrument(span).await {
                break;
            }
        }
        self.auto.reset();
        info!("warden stopped");
    }

    /// Returns `false` once the warden should stop.
    #[instrument(name = "warden::handle_event", skip(self), fields(event=?event))]
    async fn handle_event(&mut self, event: Event) -> bool {
        debug!(?event, "Event");
        match event {
            Event::ForegroundChanged(change) => self.on_foreground_changed(change).await,
            Event::Command(Command::Shutdown(reply)) => {
                self.auto.reset();
                _ = reply.send(Ok(()));
                return false;
            }
            Event::Command(command) => self.handle_command(command).await,
        }
        true
    }

    async fn handle_command(&mut self, command: Command) {
        // A dropped reply just means the caller stopped waiting.
        match command {
            Command::ApplyPreset(name, reply) => {
                _ = reply.send(self.apply_preset(&name).await);
            }
            Command::ApplyLayout(name, reply) => {
                _ = reply.send(self.apply_layout(&name).await);
            }
            Command::Save(name, reply) => {
                _ = reply.send(self.save(&name));
            }
            Command::Delete(name, reply) => {
                _ = reply.send(self.persist(|repository| repository.delete(&name)));
            }
            Command::List(reply) => {
                _ = reply.send(Ok(self.repository.list()));
            }
            Command::EnableAuto(reply) => {
                self.auto.enable(&*self.desktop, self.events_tx.clone());
                _ = reply.send(Ok(self.auto.state()));
            }
            Command::DisableAuto(reply) => {
                self.auto.disable();
                _ = reply.send(Ok(self.auto.state()));
            }
            Command::AutoState(reply) => {
                _ = reply.send(Ok(self.auto.state()));
            }
            Command::SnapToGrid(grid_size, reply) => {
                _ = reply.send(self.snap_to_grid(grid_size).await);
            }
            Command::ResetWindows(reply) => {
                _ = reply.send(self.reset_windows().await);
            }
            Command::Reapply(assignments, reply) => {
                _ = reply.send(self.execute(assignments).await);
            }
            Command::Shutdown(reply) => {
                _ = reply.send(Ok(()));
            }
        }
    }

    async fn apply_preset(&mut self, name: &str) -> Result<ArrangementOutcome, EngineError> {
        let preset =
            Preset::find(name).ok_or_else(|| RepositoryError::NotFound(name.trim().to_string()))?;
        self.arrange(preset.layout(), None).await
    }

    async fn apply_layout(&mut self, name: &str) -> Result<ArrangementOutcome, EngineError> {
        let layout = self.repository.load(name)?;
        self.arrange(layout, None).await
    }

    /// Resolves `layout` against the running apps, or only `only_app`'s
    /// windows if given, and moves the bound windows.
    async fn arrange(
        &mut self,
        layout: Layout,
        only_app: Option<&AppIdentity>,
    ) -> Result<ArrangementOutcome, EngineError> {
        let mut apps = self.desktop.list_applications();
        if let Some(app) = only_app {
            apps.retain(|a| &a.identity == app);
        }
        let displays = self.desktop.displays();
        let resolution = resolver::resolve_layout(&layout, &apps, &displays)?;
        for slot in &resolution.unmatched_slots {
            debug!(layout = %layout.name, slot = slot.slot, "slot left empty");
        }
        let report = self.executor.apply(resolution.assignments()).await;
        finish(ArrangementOutcome::from_resolution(resolution, report))
    }

    async fn execute(&mut self, assignments: Vec<Assignment>) -> Result<ArrangementOutcome, EngineError> {
        let report = self.executor.apply(assignments).await;
        finish(ArrangementOutcome::new(None, None, report))
    }

    fn save(&mut self, name: &str) -> Result<LayoutSummary, EngineError> {
        let last_focused: HashMap<_, _> = self
            .desktop
            .list_applications()
            .into_iter()
            .flat_map(|app| app.windows)
            .map(|w| (w.handle, w.last_focused))
            .collect();
        // Windows of one app fill its slots most recently focused first, so
        // the slots are written in that order.
        let mut captured = self.desktop.capture_current_arrangement();
        captured.sort_by_key(|w| (Reverse(last_focused.get(&w.handle).copied().flatten()), w.handle));
        let displays = self.desktop.displays();

        let mut slots = Vec::with_capacity(captured.len());
        for window in captured {
            let region = grid::relative_region(window.frame, &displays).ok_or(EngineError::NoDisplays)?;
            if !region.is_valid() {
                debug!(handle = ?window.handle, frame = ?window.frame, "not saving window without area");
                continue;
            }
            let id = if window.app.bundle_id.is_empty() { window.app.name } else { window.app.bundle_id };
            slots.push(WindowSlot::new(AppMatcher::App(id), region));
        }

        let layout = Layout::new(name.trim(), slots);
        let summary = LayoutSummary {
            name: layout.name.clone(),
            slot_count: layout.slots.len(),
            origin: LayoutOrigin::User,
        };
        self.persist(|repository| repository.save(layout))?;
        info!(name = %summary.name, slots = summary.slot_count, "saved layout");
        Ok(summary)
    }

    /// Applies `change` to a copy of the repository and commits the copy only
    /// once its snapshot has been written.
    fn persist<T>(
        &mut self,
        change: impl FnOnce(&mut LayoutRepository) -> Result<T, RepositoryError>,
    ) -> Result<T, EngineError> {
        if let Some(reason) = &self.restore_failure {
            return Err(EngineError::StoreLocked(reason.clone()));
        }
        let mut next = self.repository.clone();
        let value = change(&mut next)?;
        let bytes = next.snapshot()?;
        if let Err(e) = self.store.write_snapshot(&bytes) {
            warn!("not committing layout change: {e}");
            return Err(e.into());
        }
        self.repository = next;
        Ok(value)
    }

    async fn snap_to_grid(&mut self, grid_size: u32) -> Result<ArrangementOutcome, EngineError> {
        let grid = grid::grid_size(grid_size)?;
        let assignments = self
            .desktop
            .capture_current_arrangement()
            .into_iter()
            .filter_map(|w| {
                let target = grid::snap(w.frame, grid);
                (target != w.frame).then_some(Assignment { handle: w.handle, target })
            })
            .collect();
        self.execute(assignments).await
    }

    async fn reset_windows(&mut self) -> Result<ArrangementOutcome, EngineError> {
        let displays = self.desktop.displays();
        if displays.is_empty() {
            return Err(EngineError::NoDisplays);
        }
        let mut assignments = Vec::new();
        for window in self.desktop.capture_current_arrangement() {
            let display = grid::display_index_for(window.frame, &displays);
            let region = self.config.settings.reset_region.on_display(display);
            let bounds = resolver::display_bounds(&region, &displays)?;
            assignments.push(Assignment {
                handle: window.handle,
                target: grid::resolve(region, bounds)?,
            });
        }
        self.execute(assignments).await
    }

    async fn on_foreground_changed(&mut self, change: ForegroundChange) {
        match self.auto.admit(&change) {
            Admission::Arrange => {}
            admission => {
                trace!(?admission, app = %change.app.bundle_id, "not arranging");
                return;
            }
        }
        let Some(rule) = self.config.rule_for(&change.app) else {
            trace!(app = %change.app.bundle_id, "no auto rule");
            return;
        };
        let layout = match self.repository.load(&rule.layout) {
            Ok(layout) => layout,
            Err(e) => {
                warn!(app = %change.app.bundle_id, "auto rule names an unusable layout: {e}");
                return;
            }
        };

        // If every move failed the app is not recorded, so its next focus
        // tries again.
        let moved = match self.arrange(layout, Some(&change.app)).await {
            Ok(outcome) => {
                info!(app = %change.app.bundle_id, layout = ?outcome.layout, moved = outcome.report.applied, "auto-arranged");
                true
            }
            Err(EngineError::PartialFailure(outcome)) if outcome.report.applied > 0 => {
                warn!(app = %change.app.bundle_id, failed = outcome.report.failed.len(), "auto-arrangement partially failed");
                true
            }
            Err(e) => {
                warn!(app = %change.app.bundle_id, "auto-arrangement failed: {e}");
                false
            }
        };
        if moved {
            self.auto.record_applied(change.app);
        }
    }
}

fn finish(outcome: ArrangementOutcome) -> Result<ArrangementOutcome, EngineError> {
    if outcome.report.is_complete() {
        Ok(outcome)
    } else {
        Err(EngineError::PartialFailure(outcome))
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;
    use crate::actor::executor::{ArrangementStatus, FailureReason};
    use crate::common::config::AutoRule;
    use crate::model::app::WindowHandle;
    use crate::sys::geometry::Rect;
    use crate::sys::headless::{DesktopState, HeadlessDesktop, WindowBehavior};
    use crate::sys::store::MemoryStore;
    use crate::sys::window::SinkError;

    const SCREEN: Rect = Rect::new(0.0, 0.0, 1000.0, 800.0);

    struct Apps {
        code: AppIdentity,
        term: AppIdentity,
        zoom: AppIdentity,
        slack: AppIdentity,
    }

    struct Setup {
        desktop: Arc<HeadlessDesktop>,
        store: Arc<MemoryStore>,
        handle: EngineHandle,
        apps: Apps,
        editor: WindowHandle,
        terminal: WindowHandle,
        call: WindowHandle,
        chat: WindowHandle,
    }

    fn setup_with(config: Config) -> Setup {
        let apps = Apps {
            code: AppIdentity::new("com.microsoft.VSCode", "Code"),
            term: AppIdentity::new("com.apple.Terminal", "Terminal"),
            zoom: AppIdentity::new("us.zoom.xos", "zoom.us"),
            slack: AppIdentity::new("com.tinyspeck.slackmacgap", "Slack"),
        };
        let mut state = DesktopState::with_display(SCREEN);
        let start = Rect::new(100.0, 100.0, 300.0, 200.0);
        let editor = state.add_window(&apps.code, "main.rs", start);
        let terminal = state.add_window(&apps.term, "zsh", start);
        let call = state.add_window(&apps.zoom, "Zoom Meeting", start);
        let chat = state.add_window(&apps.slack, "general", start);
        let desktop = Arc::new(HeadlessDesktop::new(state));
        let store = Arc::new(MemoryStore::new());
        let handle = Warden::spawn(config, desktop.clone(), store.clone());
        Setup {
            desktop,
            store,
            handle,
            apps,
            editor,
            terminal,
            call,
            chat,
        }
    }

    fn setup() -> Setup { setup_with(Config::default()) }

    fn spawn_on(state: DesktopState) -> (Arc<HeadlessDesktop>, EngineHandle) {
        let desktop = Arc::new(HeadlessDesktop::new(state));
        let handle = Warden::spawn(Config::default(), desktop.clone(), Arc::new(MemoryStore::new()));
        (desktop, handle)
    }

    #[test(tokio::test)]
    async fn list_with_only_presets() {
        let s = setup();
        let list = s.handle.list().await.unwrap();
        let names: Vec<_> = list.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["Coding", "Writing", "Meeting", "Research", "Focused"]);
        assert!(list.iter().all(|l| l.origin == LayoutOrigin::Preset));
    }

    #[test(tokio::test)]
    async fn apply_preset_moves_matching_windows() {
        let s = setup();
        let outcome = s.handle.apply_preset("coding").await.unwrap();
        assert_eq!(outcome.status, ArrangementStatus::Applied);
        assert_eq!(outcome.layout.as_deref(), Some("Coding"));
        assert_eq!(outcome.report.applied, 2);
        assert_eq!(s.desktop.frame_of(s.editor), Some(Rect::new(0.0, 0.0, 700.0, 800.0)));
        assert_eq!(s.desktop.frame_of(s.terminal), Some(Rect::new(700.0, 0.0, 300.0, 400.0)));
        // Not part of the preset.
        assert_eq!(s.desktop.frame_of(s.call), Some(Rect::new(100.0, 100.0, 300.0, 200.0)));

        let err = s.handle.apply_preset("Gaming").await.unwrap_err();
        assert!(matches!(err, EngineError::Repository(RepositoryError::NotFound(ref n)) if n == "Gaming"));
    }

    #[test(tokio::test)]
    async fn saved_layouts_can_be_applied_and_deleted() {
        let s = setup();
        s.desktop.move_resize(s.editor, Rect::new(0.0, 0.0, 500.0, 800.0)).await.unwrap();
        s.desktop.move_resize(s.terminal, Rect::new(500.0, 0.0, 500.0, 800.0)).await.unwrap();

        let summary = s.handle.save(" Evening ").await.unwrap();
        assert_eq!(summary.name, "Evening");
        assert_eq!(summary.slot_count, 4);
        assert!(s.store.contents().is_some());

        s.handle.apply_preset("Coding").await.unwrap();
        s.handle.apply_layout("evening").await.unwrap();
        assert_eq!(s.desktop.frame_of(s.editor), Some(Rect::new(0.0, 0.0, 500.0, 800.0)));
        assert_eq!(s.desktop.frame_of(s.terminal), Some(Rect::new(500.0, 0.0, 500.0, 800.0)));

        let list = s.handle.list().await.unwrap();
        assert_eq!(list.last().map(|l| (l.name.as_str(), l.origin)), Some(("Evening", LayoutOrigin::User)));

        s.handle.delete("EVENING").await.unwrap();
        let err = s.handle.apply_layout("Evening").await.unwrap_err();
        assert!(matches!(err, EngineError::Repository(RepositoryError::NotFound(_))));
    }

    #[test(tokio::test)]
    async fn windows_of_one_app_return_to_their_own_regions() {
        let term = AppIdentity::new("com.apple.Terminal", "Terminal");
        let mut state = DesktopState::with_display(SCREEN);
        let left = state.add_window(&term, "build", Rect::new(0.0, 0.0, 500.0, 800.0));
        let right = state.add_window(&term, "logs", Rect::new(500.0, 0.0, 500.0, 800.0));
        let (desktop, handle) = spawn_on(state);
        desktop.focus(left);
        desktop.focus(right);

        handle.save("Two").await.unwrap();
        for window in [left, right] {
            desktop.move_resize(window, Rect::new(100.0, 100.0, 300.0, 200.0)).await.unwrap();
        }
        handle.apply_layout("Two").await.unwrap();

        assert_eq!(desktop.frame_of(left), Some(Rect::new(0.0, 0.0, 500.0, 800.0)));
        assert_eq!(desktop.frame_of(right), Some(Rect::new(500.0, 0.0, 500.0, 800.0)));
    }

    #[test(tokio::test)]
    async fn windows_without_area_are_not_saved() {
        let mut state = DesktopState::with_display(SCREEN);
        let shell = state.add_window(
            &AppIdentity::new("com.apple.Terminal", "Terminal"),
            "zsh",
            Rect::new(0.0, 0.0, 500.0, 800.0),
        );
        let hidden = state.add_window(
            &AppIdentity::new("com.apple.Notes", "Notes"),
            "Shopping",
            Rect::new(0.0, 0.0, 0.0, 0.0),
        );
        let (desktop, handle) = spawn_on(state);

        assert_eq!(handle.save("Z").await.unwrap().slot_count, 1);
        desktop.move_resize(shell, Rect::new(10.0, 10.0, 100.0, 100.0)).await.unwrap();
        let outcome = handle.apply_layout("Z").await.unwrap();
        assert_eq!(outcome.report.applied, 1);
        assert_eq!(desktop.frame_of(shell), Some(Rect::new(0.0, 0.0, 500.0, 800.0)));
        assert_eq!(desktop.frame_of(hidden), Some(Rect::new(0.0, 0.0, 0.0, 0.0)));

        desktop.move_resize(shell, Rect::new(0.0, 0.0, 0.0, 0.0)).await.unwrap();
        let err = handle.save("Nothing").await.unwrap_err();
        assert!(matches!(err, EngineError::Repository(RepositoryError::EmptyLayout(_))));
    }

    #[test(tokio::test)]
    async fn presets_are_protected() {
        let s = setup();
        let err = s.handle.delete("meeting").await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Repository(RepositoryError::ProtectedPreset(Preset::Meeting))
        ));
        let err = s.handle.save("Focused").await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Repository(RepositoryError::ProtectedPreset(Preset::Focused))
        ));
        assert_eq!(s.store.contents(), None);
    }

    #[test(tokio::test)]
    async fn store_failure_leaves_repository_untouched() {
        let s = setup();
        s.handle.save("Evening").await.unwrap();
        s.store.set_offline(true);

        let err = s.handle.save("Morning").await.unwrap_err();
        assert!(matches!(err, EngineError::StoreUnavailable(_)));
        let err = s.handle.delete("Evening").await.unwrap_err();
        assert!(matches!(err, EngineError::StoreUnavailable(_)));

        let names: Vec<_> = s.handle.list().await.unwrap().into_iter().map(|l| l.name).collect();
        assert!(names.contains(&"Evening".to_string()));
        assert!(!names.contains(&"Morning".to_string()));
    }

    #[test(tokio::test)]
    async fn saved_layouts_survive_a_restart() {
        let s = setup();
        s.handle.save("Evening").await.unwrap();
        s.handle.shutdown().await.unwrap();
        assert!(matches!(s.handle.list().await, Err(EngineError::EngineStopped)));

        let restarted = Warden::spawn(Config::default(), s.desktop.clone(), s.store.clone());
        let list = restarted.list().await.unwrap();
        assert_eq!(list.len(), 6);
        assert_eq!(list[5].name, "Evening");
    }

    #[test(tokio::test)]
    async fn unreadable_snapshot_is_never_overwritten() {
        let s = setup();
        s.handle.shutdown().await.unwrap();
        let newer: &[u8] = br#"(
            version: 2,
            layouts: [(name: "Precious", slots: [(matcher: any, region: (x: 0.0, y: 0.0, width: 1.0, height: 1.0))])],
        )"#;
        s.store.write_snapshot(newer).unwrap();

        let restarted = Warden::spawn(Config::default(), s.desktop.clone(), s.store.clone());
        assert_eq!(restarted.list().await.unwrap().len(), 5);
        let err = restarted.save("New").await.unwrap_err();
        assert!(matches!(err, EngineError::StoreLocked(_)));
        let err = restarted.delete("Precious").await.unwrap_err();
        assert!(matches!(err, EngineError::StoreLocked(_)));
        assert_eq!(s.store.contents().as_deref(), Some(newer));

        // Presets still apply.
        restarted.apply_preset("Coding").await.unwrap();
        assert_eq!(s.desktop.frame_of(s.editor), Some(Rect::new(0.0, 0.0, 700.0, 800.0)));
    }

    #[test(tokio::test)]
    async fn partial_failure_reports_failed_subset() {
        let s = setup();
        s.desktop.set_behavior(s.terminal, WindowBehavior::Denied);

        let err = s.handle.apply_preset("Coding").await.unwrap_err();
        let outcome = err.outcome().cloned().unwrap();
        assert_eq!(outcome.status, ArrangementStatus::PartiallyApplied);
        assert_eq!(outcome.report.applied, 1);
        assert_eq!(outcome.report.failed.len(), 1);
        assert_eq!(outcome.report.failed[0].handle, s.terminal);
        assert_eq!(
            outcome.report.failed[0].reason,
            FailureReason::Sink(SinkError::PermissionDenied(s.terminal))
        );

        s.desktop.set_behavior(s.terminal, WindowBehavior::Normal);
        let retried = s.handle.reapply(outcome.report.failed_assignments()).await.unwrap();
        assert_eq!(retried.report.applied, 1);
        assert_eq!(s.desktop.frame_of(s.terminal), Some(Rect::new(700.0, 0.0, 300.0, 400.0)));
    }

    #[test(tokio::test)]
    async fn snap_and_reset() {
        let s = setup();
        s.desktop.move_resize(s.editor, Rect::new(3.0, 5.0, 301.0, 199.0)).await.unwrap();

        assert!(matches!(
            s.handle.snap_to_grid(0).await,
            Err(EngineError::Geometry(grid::GeometryError::InvalidGrid))
        ));
        // Only the editor is off the grid.
        let outcome = s.handle.snap_to_grid(10).await.unwrap();
        assert_eq!(outcome.report.applied, 1);
        assert_eq!(s.desktop.frame_of(s.editor), Some(Rect::new(0.0, 10.0, 300.0, 190.0)));

        let outcome = s.handle.snap_to_grid(10).await.unwrap();
        assert_eq!(outcome.report.applied, 0);

        let outcome = s.handle.reset_windows().await.unwrap();
        assert_eq!(outcome.report.applied, 4);
        for window in [s.editor, s.terminal, s.call, s.chat] {
            assert_eq!(s.desktop.frame_of(window), Some(Rect::new(100.0, 80.0, 800.0, 640.0)));
        }
    }

    async fn settle() { tokio::time::sleep(Duration::from_millis(50)).await; }

    #[test(tokio::test)]
    async fn auto_arrangement_moves_only_the_foreground_app() {
        let s = setup();
        let state = s.handle.enable_auto().await.unwrap();
        assert!(state.enabled);
        assert_eq!(s.handle.enable_auto().await.unwrap(), state);

        s.desktop.focus(s.call);
        settle().await;

        assert_eq!(s.desktop.frame_of(s.call), Some(Rect::new(0.0, 0.0, 700.0, 800.0)));
        // Slack is in the Meeting preset but was not the foreground app.
        assert_eq!(s.desktop.frame_of(s.chat), Some(Rect::new(100.0, 100.0, 300.0, 200.0)));
        assert_eq!(s.handle.auto_state().await.unwrap().last_applied_app, Some(s.apps.zoom.clone()));

        // Apps without a rule are left alone.
        s.desktop.focus(s.terminal);
        settle().await;
        assert_eq!(s.desktop.frame_of(s.terminal), Some(Rect::new(100.0, 100.0, 300.0, 200.0)));

        s.desktop.focus(s.editor);
        settle().await;
        assert_eq!(s.desktop.frame_of(s.editor), Some(Rect::new(0.0, 0.0, 700.0, 800.0)));
        assert_eq!(s.handle.auto_state().await.unwrap().last_applied_app, Some(s.apps.code.clone()));
    }

    #[test(tokio::test)]
    async fn failed_auto_arrangement_is_retried_on_next_focus() {
        let s = setup();
        s.desktop.set_behavior(s.call, WindowBehavior::Denied);
        s.handle.enable_auto().await.unwrap();

        s.desktop.focus(s.call);
        settle().await;
        assert_eq!(s.handle.auto_state().await.unwrap().last_applied_app, None);
        assert_eq!(s.desktop.frame_of(s.call), Some(Rect::new(100.0, 100.0, 300.0, 200.0)));

        s.desktop.set_behavior(s.call, WindowBehavior::Normal);
        s.desktop.focus(s.terminal);
        settle().await;
        s.desktop.focus(s.call);
        settle().await;
        assert_eq!(s.desktop.frame_of(s.call), Some(Rect::new(0.0, 0.0, 700.0, 800.0)));
        assert_eq!(s.handle.auto_state().await.unwrap().last_applied_app, Some(s.apps.zoom.clone()));
    }

    #[test(tokio::test)]
    async fn disabled_controller_ignores_foreground_changes() {
        let s = setup();
        s.handle.enable_auto().await.unwrap();
        let state = s.handle.disable_auto().await.unwrap();
        assert_eq!(state, AutoState::default());
        assert_eq!(s.handle.disable_auto().await.unwrap(), state);

        s.desktop.focus(s.call);
        settle().await;
        assert_eq!(s.desktop.frame_of(s.call), Some(Rect::new(100.0, 100.0, 300.0, 200.0)));
    }

    #[test(tokio::test)]
    async fn queued_notifications_are_discarded_after_disable() {
        let (events_tx, events_rx) = actor::channel();
        let s = setup();
        let mut warden = Warden::new(Config::default(), s.desktop.clone(), s.store.clone(), events_tx);
        assert!(warden.auto.enable(&*s.desktop, warden.events_tx.clone()));

        let queued = ForegroundChange {
            app: s.apps.zoom.clone(),
            timestamp: Instant::now().checked_sub(Duration::from_millis(1)).unwrap(),
        };
        warden.auto.disable();
        warden.handle_event(Event::ForegroundChanged(queued.clone())).await;
        assert_eq!(s.desktop.frame_of(s.call), Some(Rect::new(100.0, 100.0, 300.0, 200.0)));

        // Re-enabling does not resurrect notifications sent before it.
        warden.auto.enable(&*s.desktop, warden.events_tx.clone());
        warden.handle_event(Event::ForegroundChanged(queued)).await;
        assert_eq!(s.desktop.frame_of(s.call), Some(Rect::new(100.0, 100.0, 300.0, 200.0)));

        warden.handle_event(Event::ForegroundChanged(ForegroundChange::now(s.apps.zoom.clone()))).await;
        assert_eq!(s.desktop.frame_of(s.call), Some(Rect::new(0.0, 0.0, 700.0, 800.0)));
        drop(events_rx);
    }

    #[test(tokio::test)]
    async fn auto_rules_can_name_saved_layouts() {
        let mut config = Config::default();
        config.settings.auto_enable_on_start = true;
        config.auto_rules = vec![AutoRule { app: "Slack".into(), layout: "Chat".into() }];
        let s = setup_with(config);
        s.desktop.move_resize(s.chat, Rect::new(0.0, 400.0, 1000.0, 400.0)).await.unwrap();
        s.handle.save("Chat").await.unwrap();
        s.desktop.move_resize(s.chat, Rect::new(5.0, 5.0, 100.0, 100.0)).await.unwrap();
        assert!(s.handle.auto_state().await.unwrap().enabled);

        s.desktop.focus(s.chat);
        settle().await;
        assert_eq!(s.desktop.frame_of(s.chat), Some(Rect::new(0.0, 400.0, 1000.0, 400.0)));
        assert_eq!(s.desktop.frame_of(s.call), Some(Rect::new(100.0, 100.0, 300.0, 200.0)));
    }
}
