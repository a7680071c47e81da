//! Built-in layouts.
//!
//! Presets are code-defined: their slot tables are constants, they are never
//! written to a snapshot and they cannot be deleted or overwritten.

use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::model::layout::{AppMatcher, Layout, Region, WindowSlot};

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, EnumString, IntoStaticStr,
)]
#[strum(ascii_case_insensitive)]
pub enum Preset {
    Coding,
    Writing,
    Meeting,
    Research,
    Focused,
}

/// One row of a preset's slot table. An empty `apps` list matches any window.
pub struct PresetSlot {
    pub apps: &'static [&'static str],
    pub region: Region,
}

const EDITORS: &[&str] = &[
    "code-editor",
    "com.microsoft.VSCode",
    "com.jetbrains.",
    "com.sublimetext.",
    "com.apple.dt.Xcode",
    "dev.zed.Zed",
];

const TERMINALS: &[&str] = &[
    "terminal",
    "com.apple.Terminal",
    "com.googlecode.iterm2",
    "net.kovidgoyal.kitty",
    "com.mitchellh.ghostty",
    "org.alacritty",
];

const BROWSERS: &[&str] = &[
    "browser",
    "com.apple.Safari",
    "com.google.Chrome",
    "org.mozilla.firefox",
    "com.brave.Browser",
    "com.microsoft.edgemac",
    "company.thebrowser.Browser",
];

const DOCS: &[&str] = &[
    "docs",
    "browser",
    "com.kapeli.dashdoc",
    "com.apple.Safari",
    "com.google.Chrome",
    "org.mozilla.firefox",
    "com.brave.Browser",
];

const WRITERS: &[&str] = &[
    "writing",
    "com.apple.iWork.Pages",
    "com.microsoft.Word",
    "com.ulyssesapp.mac",
    "pro.writer.mac",
];

const NOTES: &[&str] = &["notes", "com.apple.Notes", "md.obsidian", "notion.id", "net.shinyfrog.bear"];

const VIDEO_CALLS: &[&str] = &[
    "video-call",
    "us.zoom.xos",
    "com.microsoft.teams",
    "com.microsoft.teams2",
    "com.apple.FaceTime",
    "com.cisco.webexmeetingsapp",
];

const CHAT_AND_NOTES: &[&str] = &[
    "chat",
    "notes",
    "com.tinyspeck.slackmacgap",
    "com.hnc.Discord",
    "com.apple.MobileSMS",
    "com.apple.Notes",
    "md.obsidian",
];

const CODING: &[PresetSlot] = &[
    PresetSlot { apps: EDITORS, region: Region::new(0.0, 0.0, 0.7, 1.0) },
    PresetSlot { apps: TERMINALS, region: Region::new(0.7, 0.0, 0.3, 0.5) },
    PresetSlot { apps: DOCS, region: Region::new(0.7, 0.5, 0.3, 0.5) },
];

const WRITING: &[PresetSlot] = &[
    PresetSlot { apps: WRITERS, region: Region::new(0.2, 0.0, 0.6, 1.0) },
    PresetSlot { apps: BROWSERS, region: Region::new(0.0, 0.0, 0.2, 1.0) },
    PresetSlot { apps: NOTES, region: Region::new(0.8, 0.0, 0.2, 1.0) },
];

const MEETING: &[PresetSlot] = &[
    PresetSlot { apps: VIDEO_CALLS, region: Region::new(0.0, 0.0, 0.7, 1.0) },
    PresetSlot { apps: CHAT_AND_NOTES, region: Region::new(0.7, 0.0, 0.3, 1.0) },
];

// Both slots match browsers; the second one picks up the next most recently
// focused browser window.
const RESEARCH: &[PresetSlot] = &[
    PresetSlot { apps: BROWSERS, region: Region::new(0.0, 0.0, 0.5, 1.0) },
    PresetSlot { apps: BROWSERS, region: Region::new(0.5, 0.0, 0.5, 1.0) },
];

const FOCUSED: &[PresetSlot] = &[PresetSlot { apps: &[], region: Region::new(0.1, 0.05, 0.8, 0.9) }];

impl Preset {
    pub fn all() -> impl Iterator<Item = Preset> { Preset::iter() }

    pub fn name(self) -> &'static str { self.into() }

    /// Case-insensitive lookup of a preset by name.
    pub fn find(name: &str) -> Option<Preset> { name.trim().parse().ok() }

    pub fn slot_table(self) -> &'static [PresetSlot] {
        match self {
            Preset::Coding => CODING,
            Preset::Writing => WRITING,
            Preset::Meeting => MEETING,
            Preset::Research => RESEARCH,
            Preset::Focused => FOCUSED,
        }
    }

    pub fn layout(self) -> Layout {
        let slots = self
            .slot_table()
            .iter()
            .map(|slot| {
                let matcher = if slot.apps.is_empty() {
                    AppMatcher::Any
                } else {
                    AppMatcher::AnyApp(slot.apps.iter().map(|s| s.to_string()).collect())
                };
                WindowSlot::new(matcher, slot.region)
            })
            .collect();
        Layout::new(self.name(), slots)
    }
}

impl std::fmt::Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.name()) }
}
