//! Script runtime abstraction.
//!
//! A runtime hosts plugin code and is consumed only through four primitives:
//! import a module by name, resolve a callable, resolve a string constant and
//! invoke a callable with one text argument. Module handles release their
//! runtime resources when dropped.
//!
//! Bundled runtimes:
//! - `MemoryRuntime`: modules defined from Rust closures
//! - `RhaiRuntime`: `.rhai` script files (feature `rhai`)

use std::path::PathBuf;
use std::sync::OnceLock;

use crate::error::RuntimeError;

pub mod memory;
pub use memory::{MemoryModuleBuilder, MemoryRuntime};

#[cfg(feature = "rhai")]
pub mod rhai;
#[cfg(feature = "rhai")]
pub use self::rhai::RhaiRuntime;

/// Entry point called with the preedit text.
pub const PROVIDE_CANDIDATES: &str = "provide_candidates";
/// Entry point called with a chosen candidate.
pub const TRANSLATE_CANDIDATE: &str = "translate_candidate";

/// Metadata constants a script may export.
pub const META_NAME: &str = "NAME";
pub const META_AUTHOR: &str = "AUTHOR";
pub const META_DESCRIPTION: &str = "DESCRIPTION";

/// Plugin directory below the user's home.
const PLUGIN_SUBDIR: &str = ".libchinese/plugins";

/// Raw value returned by a script call, before interpretation.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Int(i64),
    Text(String),
    Sequence(Vec<RawValue>),
    Other,
}

impl RawValue {
    /// A `(rank, text)` pair built the way scripts return one.
    pub fn pair<T: Into<String>>(rank: i64, text: T) -> Self {
        RawValue::Sequence(vec![RawValue::Int(rank), RawValue::Text(text.into())])
    }
}

/// Capability set consumed from a script runtime.
pub trait ScriptRuntime {
    /// Loaded module. Dropping it releases the runtime's resources.
    type Module;
    /// Resolved entry point inside a module.
    type Callable;

    fn import_module(&self, name: &str) -> Result<Self::Module, RuntimeError>;

    fn resolve_callable(&self, module: &Self::Module, name: &str) -> Option<Self::Callable>;

    fn resolve_string(&self, module: &Self::Module, name: &str) -> Option<String>;

    fn invoke(
        &self,
        module: &Self::Module,
        callable: &Self::Callable,
        text: &str,
    ) -> Result<RawValue, RuntimeError>;
}

/// The per-user plugin directory, `<home>/.libchinese/plugins`.
///
/// Resolved once per process; later calls return the cached value. Falls
/// back to a relative path when no home directory is known.
pub fn default_plugin_dir() -> &'static PathBuf {
    static PLUGIN_DIR: OnceLock<PathBuf> = OnceLock::new();
    PLUGIN_DIR.get_or_init(|| {
        let dir = dirs::home_dir()
            .map(|home| home.join(PLUGIN_SUBDIR))
            .unwrap_or_else(|| PathBuf::from(PLUGIN_SUBDIR));
        tracing::debug!(dir = %dir.display(), "resolved plugin search path");
        dir
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_plugin_dir_is_stable() {
        let first = default_plugin_dir();
        let second = default_plugin_dir();
        assert!(std::ptr::eq(first, second));
        assert!(first.ends_with("plugins"));
    }

    #[test]
    fn test_pair_shape() {
        assert_eq!(
            RawValue::pair(3, "好"),
            RawValue::Sequence(vec![RawValue::Int(3), RawValue::Text("好".into())])
        );
    }
}
