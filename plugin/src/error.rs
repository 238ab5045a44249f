//! Error types and the manager's last-error slot.

use thiserror::Error;

/// Load-time failures recorded in the manager's error slot.
///
/// Call-time problems (missing entry point, script exception, malformed
/// result entries) are never reported here; they degrade to a negative
/// `WaitTime` or are dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PluginError {
    #[error("cannot detect type for {filename}")]
    UnknownType { filename: String },

    #[error("error when loading script module {module}: {cause}")]
    Import { module: String, cause: String },

    #[error("no backend registered for {type_name} plugins ({filename})")]
    NoBackend { type_name: String, filename: String },

    #[error("Plugin {name} has already loaded!")]
    Duplicate { name: String },
}

/// Failures reported by a script runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("module {0} not found")]
    ModuleNotFound(String),

    #[error("failed to compile {module}: {message}")]
    Compile { module: String, message: String },

    #[error("call to {function} failed: {message}")]
    Invocation { function: String, message: String },
}

/// Configuration file I/O failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Single last-write-wins error register.
///
/// Reflects the outcome of the most recent load attempt only. Read it right
/// after the operation that may have set it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LastError {
    error: Option<PluginError>,
}

impl LastError {
    pub fn new() -> Self {
        Self { error: None }
    }

    pub fn set(&mut self, error: PluginError) {
        self.error = Some(error);
    }

    pub fn clear(&mut self) {
        self.error = None;
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn get(&self) -> Option<&PluginError> {
        self.error.as_ref()
    }

    /// The stored message, or an empty string when no error is set.
    pub fn message(&self) -> String {
        self.error.as_ref().map(|e| e.to_string()).unwrap_or_default()
    }
}
