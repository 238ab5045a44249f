//! libchinese-plugin
//!
//! Script plugins for the libchinese input engines. A plugin can suggest
//! extra candidates for the current preedit and translate a chosen candidate
//! before it is committed.
//!
//! Public API:
//! - `PluginManager` - Registry, load errors and wait-time aggregation
//! - `Plugin` / `ScriptPlugin` - Call contract and its runtime-backed implementation
//! - `ScriptRuntime` - Import/resolve/invoke capability a backend provides
//! - `ProvideRound` / `TranslateRound` - Merged results of one dispatch round
//! - `PluginConfig` - Which plugin files to load and from where
//!
//! ```no_run
//! use libchinese_plugin::{PluginManager, PluginPreedit};
//!
//! let mut manager = PluginManager::default();
//! if manager.load_plugin("emoji.rhai").is_none() {
//!     eprintln!("{:?}", manager.last_error());
//! }
//! let round = manager.provide_round(&PluginPreedit::from("xiao"));
//! for item in &round.candidates {
//!     println!("{} {}", item.rank, item.text);
//! }
//! ```

pub mod candidate;
pub use candidate::{
    PluginCandidate, PluginCandidateItem, PluginCandidates, PluginPreedit, PluginResponse,
    WaitTime,
};

pub mod config;
pub use config::PluginConfig;

pub mod dispatch;
pub use dispatch::{merge_candidates, ProvideRound, TranslateRound};

pub mod error;
pub use error::{ConfigError, LastError, PluginError, RuntimeError};

pub mod manager;
pub use manager::{LoadReport, PluginBackend, PluginManager, ScriptBackend};

pub mod plugin;
pub use plugin::{module_name_for, Plugin, PluginType, ScriptPlugin};

pub mod runtime;
pub use runtime::{default_plugin_dir, MemoryModuleBuilder, MemoryRuntime, RawValue, ScriptRuntime};
#[cfg(feature = "rhai")]
pub use runtime::RhaiRuntime;
