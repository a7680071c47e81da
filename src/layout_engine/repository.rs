use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::model::layout::{Layout, LayoutOrigin, LayoutSummary};
use crate::model::preset::Preset;

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RepositoryError {
    #[error("layout name must not be blank")]
    EmptyName,
    #[error("layout '{0}' has no window slots")]
    EmptyLayout(String),
    #[error("no layout named '{0}'")]
    NotFound(String),
    #[error("'{0}' is a built-in preset and cannot be changed")]
    ProtectedPreset(Preset),
    #[error("slot {slot} of layout '{layout}' has an empty or non-finite region")]
    InvalidRegion { layout: String, slot: usize },
    #[error("snapshot could not be read: {0}")]
    Corrupt(String),
    #[error("snapshot could not be written: {0}")]
    Encode(String),
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    layouts: Vec<Layout>,
}

/// Owns every layout the engine knows about. Presets are generated on demand
/// from their constant tables; user layouts are kept most recently saved
/// first.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LayoutRepository {
    user: Vec<Layout>,
}

fn key(name: &str) -> String { name.trim().to_lowercase() }

impl LayoutRepository {
    pub fn new() -> Self { Self::default() }

    fn check(layout: &Layout) -> Result<(), RepositoryError> {
        if layout.name.trim().is_empty() {
            return Err(RepositoryError::EmptyName);
        }
        if layout.slots.is_empty() {
            return Err(RepositoryError::EmptyLayout(layout.name.clone()));
        }
        if let Some(preset) = Preset::find(&layout.name) {
            return Err(RepositoryError::ProtectedPreset(preset));
        }
        if let Some(slot) = layout.slots.iter().position(|s| !s.region.is_valid()) {
            return Err(RepositoryError::InvalidRegion { layout: layout.name.clone(), slot });
        }
        Ok(())
    }

    fn position(&self, name: &str) -> Option<usize> {
        let wanted = key(name);
        self.user.iter().position(|l| key(&l.name) == wanted)
    }

    /// Inserts `layout`, replacing any user layout with the same name.
    pub fn save(&mut self, layout: Layout) -> Result<(), RepositoryError> {
        Self::check(&layout)?;
        if let Some(idx) = self.position(&layout.name) {
            debug!(name = %layout.name, "overwriting layout");
            self.user.remove(idx);
        }
        self.user.insert(0, layout);
        Ok(())
    }

    pub fn load(&self, name: &str) -> Result<Layout, RepositoryError> {
        if let Some(preset) = Preset::find(name) {
            return Ok(preset.layout());
        }
        self.position(name)
            .map(|idx| self.user[idx].clone())
            .ok_or_else(|| RepositoryError::NotFound(name.to_string()))
    }

    pub fn delete(&mut self, name: &str) -> Result<(), RepositoryError> {
        if let Some(preset) = Preset::find(name) {
            return Err(RepositoryError::ProtectedPreset(preset));
        }
        let idx = self.position(name).ok_or_else(|| RepositoryError::NotFound(name.to_string()))?;
        self.user.remove(idx);
        Ok(())
    }

    /// Presets in enumeration order, then user layouts most recently saved
    /// first.
    pub fn list(&self) -> Vec<LayoutSummary> {
        let presets = Preset::all().map(|preset| LayoutSummary {
            name: preset.name().to_string(),
            slot_count: preset.slot_table().len(),
            origin: LayoutOrigin::Preset,
        });
        let user = self.user.iter().map(|layout| LayoutSummary {
            name: layout.name.clone(),
            slot_count: layout.slots.len(),
            origin: LayoutOrigin::User,
        });
        presets.chain(user).collect()
    }

    /// Serializes all user layouts. Presets are never included.
    pub fn snapshot(&self) -> Result<Vec<u8>, RepositoryError> {
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            layouts: self.user.clone(),
        };
        ron::ser::to_string_pretty(&snapshot, ron::ser::PrettyConfig::default())
            .map(String::into_bytes)
            .map_err(|e| RepositoryError::Encode(e.to_string()))
    }

    /// Replaces all user layouts with the contents of `bytes`.
    ///
    /// Entries that would not be accepted by [`save`](Self::save) are skipped.
    /// A snapshot that cannot be parsed leaves the repository untouched.
    pub fn restore(&mut self, bytes: &[u8]) -> Result<usize, RepositoryError> {
        let snapshot: Snapshot =
            ron::de::from_bytes(bytes).map_err(|e| RepositoryError::Corrupt(e.to_string()))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(RepositoryError::Corrupt(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }

        let mut restored = LayoutRepository::new();
        // Snapshots are stored most recent first; replay oldest first so that
        // `save` reproduces the same order.
        for layout in snapshot.layouts.into_iter().rev() {
            let name = layout.name.clone();
            if let Err(e) = restored.save(layout) {
                warn!(%name, "skipping layout from snapshot: {e}");
            }
        }
        let count = restored.user.len();
        *self = restored;
        Ok(count)
    }
}
