//! Plugin loading configuration.
//!
//! Stored as TOML, for example:
//!
//! ```toml
//! enabled = true
//! plugin_dir = "/home/me/.libchinese/plugins"
//! plugins = ["emoji.rhai", "cloud.rhai"]
//! ```
//!
//! Relative entries in `plugins` are resolved against the plugin directory.
//! When `plugin_dir` is unset the per-user default directory is used.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::runtime::default_plugin_dir;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PluginConfig {
    /// Master switch; nothing is loaded when false
    pub enabled: bool,
    /// Directory holding plugin files
    pub plugin_dir: Option<PathBuf>,
    /// Plugin files to load, in load order
    pub plugins: Vec<String>,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            plugin_dir: None,
            plugins: Vec::new(),
        }
    }
}

impl PluginConfig {
    /// Load configuration from a TOML file.
    pub fn load_toml<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save configuration to a TOML file.
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Configured plugin directory, or the per-user default.
    pub fn resolved_plugin_dir(&self) -> PathBuf {
        self.plugin_dir
            .clone()
            .unwrap_or_else(|| default_plugin_dir().clone())
    }

    /// Full paths of the configured plugin files, in load order.
    pub fn plugin_paths(&self) -> Vec<PathBuf> {
        let dir = self.resolved_plugin_dir();
        self.plugins.iter().map(|file| dir.join(file)).collect()
    }

    /// Append a plugin file unless already listed.
    pub fn add_plugin(&mut self, file: &str) {
        if !self.plugins.iter().any(|p| p == file) {
            self.plugins.push(file.to_string());
        }
    }

    /// Remove a plugin file. Returns true if it was listed.
    pub fn remove_plugin(&mut self, file: &str) -> bool {
        let before = self.plugins.len();
        self.plugins.retain(|p| p != file);
        self.plugins.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PluginConfig::default();
        assert!(config.enabled);
        assert!(config.plugins.is_empty());
        assert_eq!(&config.resolved_plugin_dir(), default_plugin_dir());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = PluginConfig::from_toml_str("plugins = [\"emoji.rhai\"]").unwrap();
        assert!(config.enabled);
        assert_eq!(config.plugins, vec!["emoji.rhai".to_string()]);
    }

    #[test]
    fn test_toml_round_trip_preserves_order() {
        let mut config = PluginConfig {
            enabled: false,
            plugin_dir: Some(PathBuf::from("/opt/ime/plugins")),
            plugins: vec![],
        };
        config.add_plugin("b.rhai");
        config.add_plugin("a.rhai");
        config.add_plugin("b.rhai");

        let text = config.to_toml_string().unwrap();
        let parsed = PluginConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed, config);
        assert_eq!(parsed.plugins, vec!["b.rhai", "a.rhai"]);
    }

    #[test]
    fn test_plugin_paths_join_dir() {
        let config = PluginConfig {
            enabled: true,
            plugin_dir: Some(PathBuf::from("/opt/ime/plugins")),
            plugins: vec!["emoji.rhai".into(), "/abs/cloud.rhai".into()],
        };
        assert_eq!(
            config.plugin_paths(),
            vec![
                PathBuf::from("/opt/ime/plugins/emoji.rhai"),
                PathBuf::from("/abs/cloud.rhai"),
            ]
        );
    }

    #[test]
    fn test_remove_plugin() {
        let mut config = PluginConfig::default();
        config.add_plugin("emoji.rhai");
        assert!(config.remove_plugin("emoji.rhai"));
        assert!(!config.remove_plugin("emoji.rhai"));
    }

    #[test]
    fn test_invalid_toml() {
        assert!(PluginConfig::from_toml_str("plugins = 3").is_err());
    }
}
