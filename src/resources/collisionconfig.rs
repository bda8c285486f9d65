//! Collision layer configuration resource.
//!
//! Settings are loaded from an INI file. Missing values keep their defaults,
//! and a missing file leaves the whole configuration at its defaults.
//!
//! # Configuration File Format
//!
//! ```ini
//! [collision]
//! strict_groups = false
//! exit_on_cleanup = false
//! emit_lifecycle_markers = true
//! touch_is_overlap = true
//!
//! [compatibility]
//! player = enemy, wall, item, portal
//! boss = player, player_projectile
//! ```
//!
//! Entries under `[compatibility]` are added to the catalog defaults of
//! [`GroupCompatibilityTable`].

use std::path::PathBuf;

use bevy_ecs::prelude::*;
use configparser::ini::Ini;
use log::info;

use crate::error::{CollisionError, Result};
use crate::resources::compatibility::GroupCompatibilityTable;

const DEFAULT_STRICT_GROUPS: bool = false;
const DEFAULT_EXIT_ON_CLEANUP: bool = false;
const DEFAULT_EMIT_LIFECYCLE_MARKERS: bool = true;
const DEFAULT_TOUCH_IS_OVERLAP: bool = true;
const DEFAULT_CONFIG_PATH: &str = "./collision.ini";

#[derive(Resource, Debug, Clone)]
pub struct CollisionConfig {
    /// Reject rules between groups the compatibility table does not declare.
    /// When `false` such rules are registered with a warning.
    pub strict_groups: bool,
    /// Fire every pending exit during `cleanup` instead of clearing silently.
    pub exit_on_cleanup: bool,
    /// Emit `collision_start`/`collision_stay`/`collision_end` next to the
    /// pair-named events.
    pub emit_lifecycle_markers: bool,
    /// Treat bounds that only share an edge as still overlapping in the exit
    /// sweep.
    pub touch_is_overlap: bool,
    /// Compatibility declarations.
    pub compatibility: GroupCompatibilityTable,
    /// Path to the configuration file.
    pub config_path: PathBuf,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl CollisionConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self {
            strict_groups: DEFAULT_STRICT_GROUPS,
            exit_on_cleanup: DEFAULT_EXIT_ON_CLEANUP,
            emit_lifecycle_markers: DEFAULT_EMIT_LIFECYCLE_MARKERS,
            touch_is_overlap: DEFAULT_TOUCH_IS_OVERLAP,
            compatibility: GroupCompatibilityTable::default(),
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
        }
    }

    /// Create a configuration with a custom config file path.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
            ..Self::new()
        }
    }

    /// Load configuration from the INI file.
    ///
    /// Missing values retain their current values.
    pub fn load_from_file(&mut self) -> Result<()> {
        let mut config = Ini::new();
        config
            .load(&self.config_path)
            .map_err(|e| CollisionError::Config(format!("failed to load config file: {e}")))?;

        if let Some(v) = config.getbool("collision", "strict_groups").ok().flatten() {
            self.strict_groups = v;
        }
        if let Some(v) = config.getbool("collision", "exit_on_cleanup").ok().flatten() {
            self.exit_on_cleanup = v;
        }
        if let Some(v) = config
            .getbool("collision", "emit_lifecycle_markers")
            .ok()
            .flatten()
        {
            self.emit_lifecycle_markers = v;
        }
        if let Some(v) = config.getbool("collision", "touch_is_overlap").ok().flatten() {
            self.touch_is_overlap = v;
        }

        // configparser lowercases keys by default, which matches group names.
        if let Some(section) = config.get_map_ref().get("compatibility") {
            for (group, partners) in section {
                let Some(partners) = partners else { continue };
                let partners = partners
                    .split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty());
                self.compatibility.declare(group, partners);
            }
        }

        info!(
            "Loaded collision config: strict_groups={}, exit_on_cleanup={}, markers={}, touch_is_overlap={}",
            self.strict_groups,
            self.exit_on_cleanup,
            self.emit_lifecycle_markers,
            self.touch_is_overlap
        );

        Ok(())
    }

    /// Save configuration to the INI file.
    ///
    /// Creates the file if it doesn't exist.
    pub fn save_to_file(&self) -> Result<()> {
        let mut config = Ini::new();

        config.set("collision", "strict_groups", Some(self.strict_groups.to_string()));
        config.set(
            "collision",
            "exit_on_cleanup",
            Some(self.exit_on_cleanup.to_string()),
        );
        config.set(
            "collision",
            "emit_lifecycle_markers",
            Some(self.emit_lifecycle_markers.to_string()),
        );
        config.set(
            "collision",
            "touch_is_overlap",
            Some(self.touch_is_overlap.to_string()),
        );

        let mut groups: Vec<&String> = self.compatibility.entries.keys().collect();
        groups.sort();
        for group in groups {
            let mut partners: Vec<&str> = self
                .compatibility
                .partners(group)
                .map(String::as_str)
                .collect();
            partners.sort_unstable();
            config.set("compatibility", group, Some(partners.join(", ")));
        }

        config
            .write(&self.config_path)
            .map_err(|e| CollisionError::Config(format!("failed to save config file: {e}")))?;

        info!("Saved collision config to {:?}", self.config_path);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = CollisionConfig::new();
        assert!(!config.strict_groups);
        assert!(!config.exit_on_cleanup);
        assert!(config.emit_lifecycle_markers);
        assert!(config.compatibility.is_compatible("player", "enemy"));
    }

    #[test]
    fn test_missing_file_is_an_error_and_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = CollisionConfig::with_path(dir.path().join("nope.ini"));
        assert!(config.load_from_file().is_err());
        assert!(!config.strict_groups);
    }

    #[test]
    fn test_load_overrides_and_compatibility() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("collision.ini");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[collision]\nstrict_groups = true\n\n[compatibility]\nboss = player, player_projectile").unwrap();

        let mut config = CollisionConfig::with_path(&path);
        config.load_from_file().unwrap();

        assert!(config.strict_groups);
        assert!(config.emit_lifecycle_markers);
        assert!(config.compatibility.is_compatible("boss", "player_projectile"));
        assert!(config.compatibility.is_compatible("player", "boss"));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("collision.ini");

        let mut config = CollisionConfig::with_path(&path);
        config.exit_on_cleanup = true;
        config.compatibility.declare("boss", ["player"]);
        config.save_to_file().unwrap();

        let mut loaded = CollisionConfig::with_path(&path);
        loaded.compatibility.clear();
        loaded.load_from_file().unwrap();
        assert!(loaded.exit_on_cleanup);
        assert!(loaded.compatibility.is_compatible("boss", "player"));
    }
}
