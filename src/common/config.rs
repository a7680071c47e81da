use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::app::AppIdentity;
use crate::model::layout::Region;

const MAX_PARALLEL_MOVES: usize = 64;

pub fn data_dir() -> PathBuf { home_dir().join(".warden") }
pub fn restore_file() -> PathBuf { data_dir().join("layouts.ron") }
pub fn desktop_file() -> PathBuf { data_dir().join("desktop.ron") }
pub fn config_file() -> PathBuf { home_dir().join(".warden.toml") }

fn home_dir() -> PathBuf { dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")) }

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
    /// Layouts to apply automatically when an app comes to the foreground.
    #[serde(default)]
    pub auto_rules: Vec<AutoRule>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Grid cell size in points used by `snap` when no size is given.
    #[serde(default = "default_grid_size")]
    pub grid_size: u32,
    /// How long a single window move may take before it counts as failed.
    #[serde(default = "default_move_timeout_ms")]
    pub move_timeout_ms: u64,
    /// Upper bound on window moves in flight at once.
    #[serde(default = "default_max_parallel_moves")]
    pub max_parallel_moves: usize,
    #[serde(default)]
    pub auto_enable_on_start: bool,
    /// Where `reset` puts every window, relative to its current display.
    #[serde(default = "default_reset_region")]
    pub reset_region: Region,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct AutoRule {
    /// Bundle identifier, bundle id prefix ending in `.`, or app name.
    pub app: String,
    /// Name of a preset or saved layout.
    pub layout: String,
}

impl AutoRule {
    pub fn matches(&self, app: &AppIdentity) -> bool { app.matches_id(&self.app) }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            grid_size: default_grid_size(),
            move_timeout_ms: default_move_timeout_ms(),
            max_parallel_moves: default_max_parallel_moves(),
            auto_enable_on_start: false,
            reset_region: default_reset_region(),
        }
    }
}

impl Settings {
    pub fn move_timeout(&self) -> Duration { Duration::from_millis(self.move_timeout_ms) }

    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.grid_size == 0 {
            issues.push("grid_size must be at least 1".to_string());
        }

        if self.move_timeout_ms == 0 {
            issues.push("move_timeout_ms must be positive".to_string());
        }

        if self.max_parallel_moves == 0 {
            issues.push("max_parallel_moves must be at least 1".to_string());
        }
        if self.max_parallel_moves > MAX_PARALLEL_MOVES {
            issues.push(format!(
                "max_parallel_moves should not exceed {}, got {}",
                MAX_PARALLEL_MOVES, self.max_parallel_moves
            ));
        }

        if !self.reset_region.is_valid() {
            issues.push(format!(
                "reset_region must have positive width and height, got {}x{}",
                self.reset_region.width, self.reset_region.height
            ));
        }

        issues
    }

    pub fn auto_fix_values(&mut self) -> usize {
        let mut fixes = 0;

        if self.grid_size == 0 {
            self.grid_size = default_grid_size();
            fixes += 1;
        }

        if self.move_timeout_ms == 0 {
            self.move_timeout_ms = default_move_timeout_ms();
            fixes += 1;
        }

        if self.max_parallel_moves == 0 {
            self.max_parallel_moves = default_max_parallel_moves();
            fixes += 1;
        }
        if self.max_parallel_moves > MAX_PARALLEL_MOVES {
            self.max_parallel_moves = MAX_PARALLEL_MOVES;
            fixes += 1;
        }

        if !self.reset_region.is_valid() {
            self.reset_region = default_reset_region();
            fixes += 1;
        }

        fixes
    }
}

fn default_grid_size() -> u32 { 16 }

fn default_move_timeout_ms() -> u64 { 500 }

fn default_max_parallel_moves() -> usize { 8 }

fn default_reset_region() -> Region { Region::new(0.1, 0.1, 0.8, 0.8) }

impl Config {
    pub fn read(path: &Path) -> anyhow::Result<Config> {
        let buf = std::fs::read_to_string(path)?;
        Self::parse(&buf)
    }

    pub fn default() -> Config {
        Self::parse(include_str!("../../warden.default.toml")).expect("embedded default config parses")
    }

    /// Reads the user's config file if there is one, otherwise the defaults.
    pub fn load() -> anyhow::Result<Config> {
        let path = config_file();
        if path.exists() { Self::read(&path) } else { Ok(Self::default()) }
    }

    pub fn validate(&self) -> Vec<String> {
        let mut issues = self.settings.validate();

        let mut seen_apps = crate::common::collections::HashSet::default();
        for (index, rule) in self.auto_rules.iter().enumerate() {
            if rule.app.trim().is_empty() {
                issues.push(format!("Auto rule {} has no app specified", index));
            }
            if rule.layout.trim().is_empty() {
                issues.push(format!("Auto rule {} has no layout specified", index));
            }
            if !rule.app.is_empty() && !seen_apps.insert(rule.app.to_lowercase()) {
                issues.push(format!("Duplicate app '{}' in auto rule {}", rule.app, index));
            }
        }

        issues
    }

    /// Attempts to fix configuration values automatically.
    /// Returns the number of fixes applied.
    pub fn auto_fix_values(&mut self) -> usize {
        let mut fixes = self.settings.auto_fix_values();

        let initial_rule_count = self.auto_rules.len();
        self.auto_rules
            .retain(|rule| !rule.app.trim().is_empty() && !rule.layout.trim().is_empty());
        fixes += initial_rule_count - self.auto_rules.len();

        fixes
    }

    /// The first rule naming `app`, if any.
    pub fn rule_for(&self, app: &AppIdentity) -> Option<&AutoRule> {
        self.auto_rules.iter().find(|rule| rule.matches(app))
    }

    fn parse(buf: &str) -> anyhow::Result<Config> {
        let config: Config = toml::from_str(buf)?;
        Ok(config)
    }
}
