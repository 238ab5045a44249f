//! Loaded plugins and the call contract they expose.
//!
//! A `Plugin` suggests candidates for a preedit and/or translates a chosen
//! candidate. Every call reports a `WaitTime` alongside its payload:
//! - missing entry point: empty payload, `WaitTime::UNAVAILABLE`, no runtime call
//! - integer result: empty payload, the integer as wait time
//! - sequence result: final; well-formed `(rank, text)` pairs are kept,
//!   everything else is dropped
//! - call failure: empty payload, `WaitTime::UNAVAILABLE`, logged and swallowed

use std::fmt;
use std::path::Path;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::candidate::{
    PluginCandidate, PluginCandidateItem, PluginCandidates, PluginPreedit, PluginResponse,
    WaitTime,
};
use crate::error::{LastError, PluginError};
use crate::runtime::{
    RawValue, ScriptRuntime, META_AUTHOR, META_DESCRIPTION, META_NAME, PROVIDE_CANDIDATES,
    TRANSLATE_CANDIDATE,
};

/// Backend kind of a plugin file, decided by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PluginType {
    /// `.rhai` script
    Rhai,
    Unknown,
}

impl PluginType {
    /// Classify a plugin file by suffix.
    pub fn detect(filename: &str) -> PluginType {
        match Path::new(filename).extension().and_then(|ext| ext.to_str()) {
            Some("rhai") => PluginType::Rhai,
            _ => PluginType::Unknown,
        }
    }

    /// File extension without the dot; empty for `Unknown`.
    pub fn extension(self) -> &'static str {
        match self {
            PluginType::Rhai => "rhai",
            PluginType::Unknown => "",
        }
    }
}

impl fmt::Display for PluginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginType::Rhai => f.write_str("rhai"),
            PluginType::Unknown => f.write_str("unknown"),
        }
    }
}

/// Strip the extension from a plugin filename, giving the module name
/// handed to the runtime. Directory components are kept.
pub fn module_name_for(filename: &str) -> String {
    Path::new(filename)
        .with_extension("")
        .to_string_lossy()
        .into_owned()
}

/// A loaded plugin, independent of the runtime backing it.
pub trait Plugin {
    fn plugin_type(&self) -> PluginType;

    /// Identity of the plugin. Empty if the script exported no name.
    fn name(&self) -> &str;

    fn author(&self) -> &str;

    fn description(&self) -> &str;

    fn has_provide_candidates(&self) -> bool;

    fn has_translate_candidate(&self) -> bool;

    fn provide_candidates(&self, preedit: &PluginPreedit) -> PluginResponse<PluginCandidates>;

    /// `payload` is `None` when the script produced no usable text.
    fn translate_candidate(
        &self,
        candidate: &PluginCandidate,
    ) -> PluginResponse<Option<PluginCandidate>>;
}

impl fmt::Debug for dyn Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("type", &self.plugin_type())
            .field("name", &self.name())
            .field("provide", &self.has_provide_candidates())
            .field("translate", &self.has_translate_candidate())
            .finish()
    }
}

/// Plugin backed by any `ScriptRuntime`.
///
/// Module and entry points are resolved once at load time. All of them are
/// owned here and released when the plugin is dropped.
pub struct ScriptPlugin<R: ScriptRuntime> {
    plugin_type: PluginType,
    name: String,
    author: String,
    description: String,
    // Entry points are declared before the module so they drop first.
    provide: Option<R::Callable>,
    translate: Option<R::Callable>,
    module: Option<R::Module>,
    runtime: Rc<R>,
}

impl<R: ScriptRuntime> ScriptPlugin<R> {
    /// Import the module behind `filename` and resolve its capabilities.
    ///
    /// Import failure is recorded in `errors` and yields a plugin without a
    /// module, which the caller is expected to discard.
    pub fn load(
        runtime: Rc<R>,
        filename: &str,
        plugin_type: PluginType,
        errors: &mut LastError,
    ) -> Self {
        let module_name = module_name_for(filename);
        let module_name = module_name.as_str();
        let mut plugin = ScriptPlugin {
            plugin_type,
            name: String::new(),
            author: String::new(),
            description: String::new(),
            provide: None,
            translate: None,
            module: None,
            runtime,
        };

        let module = match plugin.runtime.import_module(module_name) {
            Ok(module) => module,
            Err(e) => {
                tracing::debug!(module = module_name, error = %e, "plugin import failed");
                errors.set(PluginError::Import {
                    module: module_name.to_string(),
                    cause: e.to_string(),
                });
                return plugin;
            }
        };

        let runtime = &plugin.runtime;
        plugin.provide = runtime.resolve_callable(&module, PROVIDE_CANDIDATES);
        plugin.translate = runtime.resolve_callable(&module, TRANSLATE_CANDIDATE);
        plugin.name = runtime.resolve_string(&module, META_NAME).unwrap_or_default();
        plugin.author = runtime.resolve_string(&module, META_AUTHOR).unwrap_or_default();
        plugin.description = runtime
            .resolve_string(&module, META_DESCRIPTION)
            .unwrap_or_default();
        plugin.module = Some(module);
        plugin
    }

    /// Whether the backing module was imported.
    pub fn is_loaded(&self) -> bool {
        self.module.is_some()
    }

    fn call(&self, callable: Option<&R::Callable>, entry: &str, text: &str) -> Option<RawValue> {
        let (module, callable) = match (self.module.as_ref(), callable) {
            (Some(module), Some(callable)) => (module, callable),
            _ => return None,
        };
        match self.runtime.invoke(module, callable, text) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(plugin = %self.name, entry, error = %e, "plugin call failed");
                None
            }
        }
    }
}

impl<R: ScriptRuntime> Plugin for ScriptPlugin<R> {
    fn plugin_type(&self) -> PluginType {
        self.plugin_type
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn author(&self) -> &str {
        &self.author
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn has_provide_candidates(&self) -> bool {
        self.module.is_some() && self.provide.is_some()
    }

    fn has_translate_candidate(&self) -> bool {
        self.module.is_some() && self.translate.is_some()
    }

    fn provide_candidates(&self, preedit: &PluginPreedit) -> PluginResponse<PluginCandidates> {
        match self.call(self.provide.as_ref(), PROVIDE_CANDIDATES, preedit.as_str()) {
            Some(value) => interpret_candidates(value),
            None => PluginResponse::unavailable(),
        }
    }

    fn translate_candidate(
        &self,
        candidate: &PluginCandidate,
    ) -> PluginResponse<Option<PluginCandidate>> {
        match self.call(self.translate.as_ref(), TRANSLATE_CANDIDATE, candidate) {
            Some(value) => interpret_translation(value),
            None => PluginResponse::unavailable(),
        }
    }
}

/// Interpret a raw `provide_candidates` result.
pub fn interpret_candidates(value: RawValue) -> PluginResponse<PluginCandidates> {
    match value {
        RawValue::Int(wait) => PluginResponse::deferred(WaitTime::from_script_int(wait)),
        RawValue::Sequence(items) => {
            PluginResponse::final_result(items.into_iter().filter_map(candidate_item).collect())
        }
        RawValue::Text(_) | RawValue::Other => PluginResponse::final_result(Vec::new()),
    }
}

/// Interpret a raw `translate_candidate` result.
pub fn interpret_translation(value: RawValue) -> PluginResponse<Option<PluginCandidate>> {
    match value {
        RawValue::Int(wait) => PluginResponse::deferred(WaitTime::from_script_int(wait)),
        RawValue::Text(text) => PluginResponse::final_result(Some(text)),
        RawValue::Sequence(_) | RawValue::Other => PluginResponse::final_result(None),
    }
}

// A pair is a sequence whose first two elements are an int and a string.
fn candidate_item(value: RawValue) -> Option<PluginCandidateItem> {
    let RawValue::Sequence(fields) = value else {
        return None;
    };
    let mut fields = fields.into_iter();
    match (fields.next(), fields.next()) {
        (Some(RawValue::Int(rank)), Some(RawValue::Text(text))) => {
            let rank = rank.clamp(i32::MIN as i64, i32::MAX as i64) as i32;
            Some(PluginCandidateItem::new(rank, text))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{MemoryModuleBuilder, MemoryRuntime};
    use std::cell::Cell;

    fn load(runtime: &Rc<MemoryRuntime>, filename: &str) -> (ScriptPlugin<MemoryRuntime>, LastError) {
        let mut errors = LastError::new();
        let plugin = ScriptPlugin::load(
            Rc::clone(runtime),
            filename,
            PluginType::detect(filename),
            &mut errors,
        );
        (plugin, errors)
    }

    #[test]
    fn test_detect_plugin_type() {
        assert_eq!(PluginType::detect("emoji.rhai"), PluginType::Rhai);
        assert_eq!(PluginType::detect("/home/u/plugins/emoji.rhai"), PluginType::Rhai);
        assert_eq!(PluginType::detect("emoji.py"), PluginType::Unknown);
        assert_eq!(PluginType::detect("rhai"), PluginType::Unknown);
        assert_eq!(PluginType::detect(""), PluginType::Unknown);
    }

    #[test]
    fn test_module_name_for() {
        assert_eq!(module_name_for("emoji.rhai"), "emoji");
        assert_eq!(module_name_for("/opt/plugins/emoji.rhai"), "/opt/plugins/emoji");
        assert_eq!(module_name_for("emoji"), "emoji");
        assert_eq!(module_name_for("plugins/emoji.rhai"), "plugins/emoji");
    }

    #[test]
    fn test_module_name_for_odd_suffixes() {
        assert_eq!(module_name_for("a.é//"), "a");
        assert_eq!(module_name_for("emoji.rhai/"), "emoji");
        assert_eq!(module_name_for("archive.tar.rhai"), "archive.tar");
    }

    #[test]
    fn test_metadata_defaults_to_empty() {
        let runtime = Rc::new(MemoryRuntime::new());
        runtime.register("bare", MemoryModuleBuilder::new());

        let (plugin, errors) = load(&runtime, "bare.rhai");
        assert!(!errors.has_error());
        assert!(plugin.is_loaded());
        assert_eq!(plugin.name(), "");
        assert_eq!(plugin.author(), "");
        assert_eq!(plugin.description(), "");
        assert_eq!(plugin.plugin_type(), PluginType::Rhai);
    }

    #[test]
    fn test_import_failure_sets_error() {
        let runtime = Rc::new(MemoryRuntime::new());
        runtime.register_broken("broken", "SyntaxError");

        let (plugin, errors) = load(&runtime, "broken.rhai");
        assert!(!plugin.is_loaded());
        assert!(matches!(errors.get(), Some(PluginError::Import { module, .. }) if module == "broken"));
        assert_eq!(runtime.live_modules(), 0);
    }

    #[test]
    fn test_missing_entry_point_is_unavailable() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let runtime = Rc::new(MemoryRuntime::new());
        runtime.register(
            "translit",
            MemoryModuleBuilder::new().name("translit").function(TRANSLATE_CANDIDATE, move |s| {
                counter.set(counter.get() + 1);
                Ok(RawValue::Text(s.to_string()))
            }),
        );

        let (plugin, _) = load(&runtime, "translit.rhai");
        assert!(!plugin.has_provide_candidates());
        assert!(plugin.has_translate_candidate());
        for input in ["", "nihao", "🙂"] {
            let response = plugin.provide_candidates(&PluginPreedit::from(input));
            assert!(response.payload.is_empty());
            assert_eq!(response.wait_time, WaitTime::UNAVAILABLE);
        }
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_malformed_pairs_are_dropped() {
        let runtime = Rc::new(MemoryRuntime::new());
        runtime.register(
            "mixed",
            MemoryModuleBuilder::new().function(PROVIDE_CANDIDATES, |_| {
                Ok(RawValue::Sequence(vec![
                    RawValue::pair(1, "foo"),
                    RawValue::Sequence(vec![RawValue::Text("bad".into()), RawValue::Text("x".into())]),
                    RawValue::Int(9),
                    RawValue::Sequence(vec![RawValue::Int(4)]),
                    RawValue::pair(2, "bar"),
                ]))
            }),
        );

        let (plugin, _) = load(&runtime, "mixed.rhai");
        let response = plugin.provide_candidates(&PluginPreedit::from("f"));
        assert_eq!(response.wait_time, WaitTime::FINAL);
        assert_eq!(
            response.payload,
            vec![PluginCandidateItem::new(1, "foo"), PluginCandidateItem::new(2, "bar")]
        );
    }

    #[test]
    fn test_integer_result_defers() {
        let runtime = Rc::new(MemoryRuntime::new());
        runtime.register(
            "cloud",
            MemoryModuleBuilder::new().function(PROVIDE_CANDIDATES, |_| Ok(RawValue::Int(50))),
        );

        let (plugin, _) = load(&runtime, "cloud.rhai");
        let response = plugin.provide_candidates(&PluginPreedit::from("zhongguo"));
        assert!(response.payload.is_empty());
        assert_eq!(response.wait_time, WaitTime::new(50));
    }

    #[test]
    fn test_call_failure_is_swallowed() {
        let runtime = Rc::new(MemoryRuntime::new());
        runtime.register(
            "flaky",
            MemoryModuleBuilder::new()
                .function(PROVIDE_CANDIDATES, |_| Err("KeyError".into()))
                .function(TRANSLATE_CANDIDATE, |_| Err("KeyError".into())),
        );

        let (plugin, errors) = load(&runtime, "flaky.rhai");
        let provided = plugin.provide_candidates(&PluginPreedit::from("a"));
        assert!(provided.payload.is_empty());
        assert_eq!(provided.wait_time, WaitTime::UNAVAILABLE);

        let translated = plugin.translate_candidate(&"a".to_string());
        assert_eq!(translated.payload, None);
        assert_eq!(translated.wait_time, WaitTime::UNAVAILABLE);
        assert!(!errors.has_error());
    }

    #[test]
    fn test_translate_result_shapes() {
        assert_eq!(
            interpret_translation(RawValue::Text("你好".into())),
            PluginResponse::final_result(Some("你好".to_string()))
        );
        assert_eq!(
            interpret_translation(RawValue::Int(30)),
            PluginResponse::deferred(WaitTime::new(30))
        );
        assert_eq!(interpret_translation(RawValue::Other), PluginResponse::final_result(None));
        assert_eq!(
            interpret_translation(RawValue::Sequence(vec![])),
            PluginResponse::final_result(None)
        );
    }

    #[test]
    fn test_text_result_is_final_and_empty() {
        let response = interpret_candidates(RawValue::Text("not a list".into()));
        assert!(response.payload.is_empty());
        assert!(response.wait_time.is_final());
    }

    #[test]
    fn test_negative_integer_is_unavailable() {
        let response = interpret_candidates(RawValue::Int(-3));
        assert!(response.wait_time.is_unavailable());
    }

    #[test]
    fn test_module_released_on_drop() {
        let runtime = Rc::new(MemoryRuntime::new());
        runtime.register("m", MemoryModuleBuilder::new().name("m"));
        let (plugin, _) = load(&runtime, "m.rhai");
        assert_eq!(runtime.live_modules(), 1);
        drop(plugin);
        assert_eq!(runtime.live_modules(), 0);
    }
}
