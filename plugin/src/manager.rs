//! Plugin registry.
//!
//! `PluginManager` owns every loaded plugin, rejects duplicate names, keeps
//! the single last-error slot and aggregates the shortest deferral requested
//! during a dispatch round. It is the only interface the engine talks to.
//!
//! All state is plain single-threaded state; embedders that share a manager
//! across threads must serialize access themselves.

use std::collections::HashMap;
use std::rc::Rc;

use crate::candidate::WaitTime;
use crate::config::PluginConfig;
use crate::error::{LastError, PluginError};
use crate::plugin::{Plugin, PluginType, ScriptPlugin};
use crate::runtime::ScriptRuntime;

/// Constructs plugins of one `PluginType`.
pub trait PluginBackend {
    /// Build a plugin for `filename`. Load failures are written to `errors`;
    /// the returned plugin is then discarded by the manager.
    fn create(
        &self,
        filename: &str,
        plugin_type: PluginType,
        errors: &mut LastError,
    ) -> Box<dyn Plugin>;
}

/// Backend producing `ScriptPlugin`s from a shared runtime.
pub struct ScriptBackend<R: ScriptRuntime> {
    runtime: Rc<R>,
}

impl<R: ScriptRuntime> ScriptBackend<R> {
    pub fn new(runtime: Rc<R>) -> Self {
        Self { runtime }
    }

    pub fn runtime(&self) -> &Rc<R> {
        &self.runtime
    }
}

impl<R: ScriptRuntime + 'static> PluginBackend for ScriptBackend<R> {
    fn create(
        &self,
        filename: &str,
        plugin_type: PluginType,
        errors: &mut LastError,
    ) -> Box<dyn Plugin> {
        Box::new(ScriptPlugin::load(
            Rc::clone(&self.runtime),
            filename,
            plugin_type,
            errors,
        ))
    }
}

/// Outcome of one configured load, captured right after the attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub filename: String,
    /// Registered plugin name, or the error message.
    pub result: Result<String, String>,
}

pub struct PluginManager {
    backends: HashMap<PluginType, Box<dyn PluginBackend>>,
    plugins: Vec<Box<dyn Plugin>>,
    last_error: LastError,
    wait_time: WaitTime,
}

impl PluginManager {
    /// Manager with no backends; every load fails until one is registered.
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
            plugins: Vec::new(),
            last_error: LastError::new(),
            wait_time: WaitTime::FINAL,
        }
    }

    /// Manager with the bundled backends on the default plugin directory.
    #[cfg(feature = "rhai")]
    pub fn with_default_backends() -> Self {
        let mut manager = Self::new();
        manager.register_backend(
            PluginType::Rhai,
            ScriptBackend::new(Rc::new(crate::runtime::RhaiRuntime::with_default_search_path())),
        );
        manager
    }

    /// Without the `rhai` feature no backend is bundled.
    #[cfg(not(feature = "rhai"))]
    pub fn with_default_backends() -> Self {
        Self::new()
    }

    /// Install (or replace) the backend building plugins of `plugin_type`.
    pub fn register_backend<B: PluginBackend + 'static>(&mut self, plugin_type: PluginType, backend: B) {
        self.backends.insert(plugin_type, Box::new(backend));
    }

    pub fn detect_plugin_type(&self, filename: &str) -> PluginType {
        PluginType::detect(filename)
    }

    /// Build a plugin without registering it. Clears the error slot first.
    ///
    /// Returns `None` when no plugin could be constructed at all. A returned
    /// plugin may still have failed to import; check `has_last_error`.
    pub fn create_plugin(&mut self, filename: &str, plugin_type: PluginType) -> Option<Box<dyn Plugin>> {
        self.clear_last_error();

        if plugin_type == PluginType::Unknown {
            self.set_last_error(PluginError::UnknownType {
                filename: filename.to_string(),
            });
            return None;
        }
        let Some(backend) = self.backends.get(&plugin_type) else {
            self.set_last_error(PluginError::NoBackend {
                type_name: plugin_type.to_string(),
                filename: filename.to_string(),
            });
            return None;
        };
        Some(backend.create(filename, plugin_type, &mut self.last_error))
    }

    /// Load and register the plugin in `filename`.
    ///
    /// On failure returns `None` and leaves the reason in the error slot.
    /// A construction failure takes precedence over a duplicate name.
    pub fn load_plugin(&mut self, filename: &str) -> Option<&dyn Plugin> {
        let plugin_type = self.detect_plugin_type(filename);
        let plugin = self.create_plugin(filename, plugin_type)?;
        if self.has_last_error() {
            return None;
        }

        if self.plugins.iter().any(|p| p.name() == plugin.name()) {
            let name = plugin.name().to_string();
            drop(plugin);
            tracing::debug!(filename, name = %name, "rejected duplicate plugin");
            self.set_last_error(PluginError::Duplicate { name });
            return None;
        }

        tracing::debug!(filename, name = plugin.name(), "registered plugin");
        self.plugins.push(plugin);
        self.plugins.last().map(|p| p.as_ref())
    }

    /// Load every file listed in `config`, in order.
    pub fn load_configured(&mut self, config: &PluginConfig) -> Vec<LoadReport> {
        if !config.enabled {
            return Vec::new();
        }
        config
            .plugin_paths()
            .into_iter()
            .map(|path| {
                let filename = path.to_string_lossy().into_owned();
                let result = match self.load_plugin(&filename) {
                    Some(plugin) => Ok(plugin.name().to_string()),
                    None => Err(self.last_error.message()),
                };
                LoadReport { filename, result }
            })
            .collect()
    }

    pub fn set_last_error(&mut self, error: PluginError) {
        self.last_error.set(error);
    }

    pub fn clear_last_error(&mut self) {
        self.last_error.clear();
    }

    pub fn has_last_error(&self) -> bool {
        self.last_error.has_error()
    }

    /// Error of the most recent load attempt.
    pub fn last_error(&self) -> Option<&PluginError> {
        self.last_error.get()
    }

    /// Fold one call's wait time into the round aggregate.
    ///
    /// Non-positive values are ignored. The first positive value becomes the
    /// aggregate, later ones can only lower it. The aggregate is not reset
    /// here; call `reset_wait_time` before the next round.
    pub fn mark_wait_time(&mut self, wait_time: WaitTime) {
        if !wait_time.is_deferred() {
            return;
        }
        if !self.wait_time.is_deferred() || wait_time < self.wait_time {
            self.wait_time = wait_time;
        }
    }

    /// Shortest deferral marked since the last reset; `FINAL` when none.
    pub fn wait_time(&self) -> WaitTime {
        self.wait_time
    }

    pub fn reset_wait_time(&mut self) {
        self.wait_time = WaitTime::FINAL;
    }

    /// Registered plugins in registration order.
    pub fn plugins(&self) -> impl Iterator<Item = &dyn Plugin> + '_ {
        self.plugins.iter().map(|p| p.as_ref())
    }

    pub fn plugin(&self, name: &str) -> Option<&dyn Plugin> {
        self.plugins().find(|p| p.name() == name)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::with_default_backends()
    }
}

impl Drop for PluginManager {
    fn drop(&mut self) {
        if !self.plugins.is_empty() {
            tracing::debug!(count = self.plugins.len(), "releasing plugins");
        }
    }
}
