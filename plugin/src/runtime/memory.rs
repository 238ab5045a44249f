//! In-process runtime whose modules are defined from Rust closures.
//!
//! Useful for embedding native plugins next to scripted ones and for tests.
//! The runtime counts live module handles so callers can check that every
//! imported module was released.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use super::{RawValue, ScriptRuntime, META_AUTHOR, META_DESCRIPTION, META_NAME};
use crate::error::RuntimeError;

type ScriptFn = Rc<dyn Fn(&str) -> Result<RawValue, String>>;

#[derive(Clone, Default)]
struct ModuleDef {
    functions: HashMap<String, ScriptFn>,
    strings: HashMap<String, String>,
    import_error: Option<String>,
}

/// Builder for one in-memory module.
#[derive(Clone, Default)]
pub struct MemoryModuleBuilder {
    def: ModuleDef,
}

impl MemoryModuleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Export a string constant.
    pub fn constant<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.def.strings.insert(key.into(), value.into());
        self
    }

    pub fn name<V: Into<String>>(self, value: V) -> Self {
        self.constant(META_NAME, value)
    }

    pub fn author<V: Into<String>>(self, value: V) -> Self {
        self.constant(META_AUTHOR, value)
    }

    pub fn description<V: Into<String>>(self, value: V) -> Self {
        self.constant(META_DESCRIPTION, value)
    }

    /// Export a one-argument function. Returning `Err` simulates a script exception.
    pub fn function<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&str) -> Result<RawValue, String> + 'static,
    {
        self.def.functions.insert(name.to_string(), Rc::new(f));
        self
    }
}

/// Decrements the live-module counter when the handle goes away.
struct LiveGuard(Rc<Cell<usize>>);

impl LiveGuard {
    fn acquire(counter: &Rc<Cell<usize>>) -> Self {
        counter.set(counter.get() + 1);
        LiveGuard(Rc::clone(counter))
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.set(self.0.get().saturating_sub(1));
    }
}

/// Imported in-memory module.
pub struct MemoryModule {
    name: String,
    def: ModuleDef,
    _live: LiveGuard,
}

impl MemoryModule {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for MemoryModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryModule").field("name", &self.name).finish()
    }
}

/// Resolved function of an in-memory module.
#[derive(Clone)]
pub struct MemoryCallable {
    name: String,
    func: ScriptFn,
}

/// Runtime holding modules registered from Rust.
#[derive(Default)]
pub struct MemoryRuntime {
    modules: RefCell<HashMap<String, ModuleDef>>,
    live: Rc<Cell<usize>>,
    imports: Cell<usize>,
}

impl MemoryRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a module under `name`.
    pub fn register(&self, name: &str, module: MemoryModuleBuilder) {
        self.modules.borrow_mut().insert(name.to_string(), module.def);
    }

    /// Register a module whose import always fails with `message`.
    pub fn register_broken(&self, name: &str, message: &str) {
        let def = ModuleDef {
            import_error: Some(message.to_string()),
            ..ModuleDef::default()
        };
        self.modules.borrow_mut().insert(name.to_string(), def);
    }

    /// Number of module handles currently alive.
    pub fn live_modules(&self) -> usize {
        self.live.get()
    }

    /// Number of successful imports so far.
    pub fn imports(&self) -> usize {
        self.imports.get()
    }
}

impl ScriptRuntime for MemoryRuntime {
    type Module = MemoryModule;
    type Callable = MemoryCallable;

    fn import_module(&self, name: &str) -> Result<MemoryModule, RuntimeError> {
        let modules = self.modules.borrow();
        let def = modules
            .get(name)
            .ok_or_else(|| RuntimeError::ModuleNotFound(name.to_string()))?;
        if let Some(message) = &def.import_error {
            return Err(RuntimeError::Compile {
                module: name.to_string(),
                message: message.clone(),
            });
        }
        self.imports.set(self.imports.get() + 1);
        Ok(MemoryModule {
            name: name.to_string(),
            def: def.clone(),
            _live: LiveGuard::acquire(&self.live),
        })
    }

    fn resolve_callable(&self, module: &MemoryModule, name: &str) -> Option<MemoryCallable> {
        module.def.functions.get(name).map(|func| MemoryCallable {
            name: name.to_string(),
            func: Rc::clone(func),
        })
    }

    fn resolve_string(&self, module: &MemoryModule, name: &str) -> Option<String> {
        module.def.strings.get(name).cloned()
    }

    fn invoke(
        &self,
        _module: &MemoryModule,
        callable: &MemoryCallable,
        text: &str,
    ) -> Result<RawValue, RuntimeError> {
        (callable.func)(text).map_err(|message| RuntimeError::Invocation {
            function: callable.name.clone(),
            message,
        })
    }
}
