//! Rhai script runtime.
//!
//! A module named `emoji` is the file `emoji.rhai` found in the first search
//! path that contains it; absolute module names are used as-is, and names
//! with directory components are tried relative to the working directory
//! before the search paths. Metadata are
//! top-level string constants and entry points are one-argument functions:
//!
//! ```text
//! const NAME = "emoji";
//! const AUTHOR = "someone";
//!
//! fn provide_candidates(preedit) {
//!     if preedit == "xiao" { [[1, "😄"]] } else { [] }
//! }
//! ```

use std::cell::RefCell;
use std::fmt;
use std::path::{Path, PathBuf};

use rhai::{CallFnOptions, Dynamic, Engine, ImmutableString, Scope, AST};

use super::{default_plugin_dir, RawValue, ScriptRuntime};
use crate::error::RuntimeError;
use crate::plugin::PluginType;

/// Operation budget per script run; keeps a runaway script from hanging the engine.
const DEFAULT_MAX_OPERATIONS: u64 = 1_000_000;

/// Compiled script plus the scope holding its top-level constants.
pub struct RhaiModule {
    name: String,
    path: PathBuf,
    ast: AST,
    scope: RefCell<Scope<'static>>,
}

impl RhaiModule {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Debug for RhaiModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RhaiModule")
            .field("name", &self.name)
            .field("path", &self.path)
            .finish()
    }
}

/// Name of a script function known to take exactly one argument.
#[derive(Debug, Clone)]
pub struct RhaiCallable {
    name: String,
}

/// Runtime loading `.rhai` files from an ordered list of directories.
pub struct RhaiRuntime {
    engine: Engine,
    search_paths: Vec<PathBuf>,
}

impl RhaiRuntime {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        let mut engine = Engine::new();
        engine.set_max_operations(DEFAULT_MAX_OPERATIONS);
        engine.on_print(|text| tracing::info!(target: "libchinese_plugin::script", "{}", text));
        Self {
            engine,
            search_paths,
        }
    }

    /// Runtime searching only `<home>/.libchinese/plugins`.
    pub fn with_default_search_path() -> Self {
        Self::new(vec![default_plugin_dir().clone()])
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Append a directory to the search path. Duplicates are ignored.
    pub fn add_search_path<P: Into<PathBuf>>(&mut self, dir: P) {
        let dir = dir.into();
        if !self.search_paths.contains(&dir) {
            self.search_paths.push(dir);
        }
    }

    pub fn set_max_operations(&mut self, operations: u64) {
        self.engine.set_max_operations(operations);
    }

    fn locate(&self, name: &str) -> Option<PathBuf> {
        let file = PathBuf::from(format!("{}.{}", name, PluginType::Rhai.extension()));
        if file.is_absolute() {
            return file.is_file().then_some(file);
        }
        // A name with directory components may already be relative to the
        // working directory, e.g. `<plugin_dir>/<file>` from a config.
        let has_dir = file
            .parent()
            .is_some_and(|parent| !parent.as_os_str().is_empty());
        if has_dir && file.is_file() {
            return Some(file);
        }
        self.search_paths
            .iter()
            .map(|dir| dir.join(&file))
            .find(|candidate| candidate.is_file())
    }
}

impl Default for RhaiRuntime {
    fn default() -> Self {
        Self::with_default_search_path()
    }
}

impl ScriptRuntime for RhaiRuntime {
    type Module = RhaiModule;
    type Callable = RhaiCallable;

    fn import_module(&self, name: &str) -> Result<RhaiModule, RuntimeError> {
        let path = self
            .locate(name)
            .ok_or_else(|| RuntimeError::ModuleNotFound(name.to_string()))?;
        let compile_error = |message: String| RuntimeError::Compile {
            module: name.to_string(),
            message,
        };

        let ast = self
            .engine
            .compile_file(path.clone())
            .map_err(|e| compile_error(e.to_string()))?;

        // Top-level statements run once, leaving constants in the module scope.
        let mut scope = Scope::new();
        self.engine
            .run_ast_with_scope(&mut scope, &ast)
            .map_err(|e| compile_error(e.to_string()))?;

        Ok(RhaiModule {
            name: name.to_string(),
            path,
            ast,
            scope: RefCell::new(scope),
        })
    }

    fn resolve_callable(&self, module: &RhaiModule, name: &str) -> Option<RhaiCallable> {
        module
            .ast
            .iter_functions()
            .any(|f| f.name == name && f.params.len() == 1)
            .then(|| RhaiCallable {
                name: name.to_string(),
            })
    }

    fn resolve_string(&self, module: &RhaiModule, name: &str) -> Option<String> {
        module
            .scope
            .borrow()
            .get_value::<ImmutableString>(name)
            .map(|s| s.to_string())
    }

    fn invoke(
        &self,
        module: &RhaiModule,
        callable: &RhaiCallable,
        text: &str,
    ) -> Result<RawValue, RuntimeError> {
        let options = CallFnOptions::new().eval_ast(false).rewind_scope(true);
        let mut scope = module.scope.borrow_mut();
        let result = self
            .engine
            .call_fn_with_options::<Dynamic>(
                options,
                &mut scope,
                &module.ast,
                &callable.name,
                (text.to_string(),),
            )
            .map_err(|e| RuntimeError::Invocation {
                function: callable.name.clone(),
                message: e.to_string(),
            })?;
        Ok(to_raw(result))
    }
}

fn to_raw(value: Dynamic) -> RawValue {
    if value.is_int() {
        return value
            .as_int()
            .map(|v| RawValue::Int(v as i64))
            .unwrap_or(RawValue::Other);
    }
    if value.is_string() {
        return value.into_string().map(RawValue::Text).unwrap_or(RawValue::Other);
    }
    if value.is_array() {
        return value
            .into_array()
            .map(|items| RawValue::Sequence(items.into_iter().map(to_raw).collect()))
            .unwrap_or(RawValue::Other);
    }
    RawValue::Other
}
