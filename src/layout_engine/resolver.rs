//! Matching of running applications against a layout's slots.

use std::cmp::Reverse;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{trace, warn};

use crate::common::collections::HashSet;
use crate::layout_engine::grid::{self, GeometryError};
use crate::model::app::{AppIdentity, ApplicationSnapshot, WindowHandle, WindowSnapshot};
use crate::model::layout::{AppMatcher, Layout, Region};
use crate::sys::geometry::{Display, Rect};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ResolveError {
    #[error("no displays are available")]
    NoDisplays,
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// A window move the executor should perform.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub handle: WindowHandle,
    pub target: Rect,
}

/// Which app a slot was bound to, and where its window goes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppBinding {
    pub app: AppIdentity,
    pub handle: WindowHandle,
    pub slot: usize,
    pub region: Region,
    pub target: Rect,
}

/// A slot for which no running window was available.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnmatchedSlot {
    pub slot: usize,
    pub matcher: AppMatcher,
}

/// A window that matched a slot but was not given a region, and is left
/// where it is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassedOver {
    pub handle: WindowHandle,
    pub slot: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub layout: String,
    pub bindings: Vec<AppBinding>,
    pub unmatched_slots: Vec<UnmatchedSlot>,
    pub passed_over: Vec<PassedOver>,
}

impl Resolution {
    pub fn assignments(&self) -> Vec<Assignment> {
        self.bindings
            .iter()
            .map(|b| Assignment { handle: b.handle, target: b.target })
            .collect()
    }
}

fn candidates<'a>(
    matcher: &'a AppMatcher,
    apps: &'a [ApplicationSnapshot],
) -> impl Iterator<Item = (&'a AppIdentity, &'a WindowSnapshot)> + 'a {
    apps.iter().flat_map(move |app| {
        app.windows
            .iter()
            .filter(move |w| matcher.matches(&app.identity, w))
            .map(move |w| (&app.identity, w))
    })
}

/// Picks the display a region refers to, falling back to the primary display
/// when the index is out of range.
pub fn display_bounds(region: &Region, displays: &[Display]) -> Result<Rect, ResolveError> {
    match displays.get(region.display) {
        Some(d) => Ok(d.bounds),
        None => {
            let primary = displays.first().ok_or(ResolveError::NoDisplays)?;
            warn!(
                display = region.display,
                available = displays.len(),
                "region refers to a missing display, using the primary display"
            );
            Ok(primary.bounds)
        }
    }
}

/// Binds the slots of `layout` to windows in `apps`.
///
/// Slots are visited by ascending priority (slots without a priority last,
/// declaration order otherwise). Each slot takes the most recently focused
/// matching window that no earlier slot claimed; ties go to the window created
/// first. Windows no slot claims are never moved.
pub fn resolve_layout(
    layout: &Layout,
    apps: &[ApplicationSnapshot],
    displays: &[Display],
) -> Result<Resolution, ResolveError> {
    if displays.is_empty() {
        return Err(ResolveError::NoDisplays);
    }

    let mut order: Vec<usize> = (0..layout.slots.len()).collect();
    order.sort_by_key(|&idx| {
        let priority = layout.slots[idx].priority;
        (priority.is_none(), priority, idx)
    });

    let mut claimed = HashSet::default();
    let mut bindings = Vec::new();
    let mut unmatched_slots = Vec::new();

    for idx in order {
        let slot = &layout.slots[idx];
        let best = candidates(&slot.matcher, apps)
            .filter(|(_, w)| !claimed.contains(&w.handle))
            .max_by_key(|(_, w)| (w.last_focused, Reverse(w.handle)));

        let Some((app, window)) = best else {
            trace!(slot = idx, "no window for slot");
            unmatched_slots.push(UnmatchedSlot { slot: idx, matcher: slot.matcher.clone() });
            continue;
        };

        let bounds = display_bounds(&slot.region, displays)?;
        let target = grid::resolve(slot.region, bounds)?;
        claimed.insert(window.handle);
        bindings.push(AppBinding {
            app: app.clone(),
            handle: window.handle,
            slot: idx,
            region: slot.region,
            target,
        });
    }

    let mut passed_over: Vec<PassedOver> = Vec::new();
    for (idx, slot) in layout.slots.iter().enumerate() {
        for (_, window) in candidates(&slot.matcher, apps) {
            if !claimed.contains(&window.handle)
                && !passed_over.iter().any(|p| p.handle == window.handle)
            {
                passed_over.push(PassedOver { handle: window.handle, slot: idx });
            }
        }
    }

    bindings.sort_by_key(|b| b.slot);
    unmatched_slots.sort_by_key(|u| u.slot);

    Ok(Resolution {
        layout: layout.name.clone(),
        bindings,
        unmatched_slots,
        passed_over,
    })
}
