//! Load plugin scripts and show what they export.
//!
//! Usage:
//!   cargo run -p plugin_inspect -- emoji.rhai cloud.rhai
//!   cargo run -p plugin_inspect -- --config plugins.toml --preedit xiao
//!   cargo run -p plugin_inspect -- --dir ./plugins emoji.rhai --translate 你好 --json

use std::path::PathBuf;
use std::rc::Rc;

use anyhow::Context;
use clap::Parser;
use libchinese_plugin::{
    LoadReport, PluginConfig, PluginManager, PluginPreedit, PluginType, ProvideRound,
    RhaiRuntime, ScriptBackend, TranslateRound,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "plugin_inspect")]
#[command(about = "Load IME plugin scripts and run them against sample input")]
struct Args {
    /// Plugin files to load (after those listed in --config)
    files: Vec<String>,

    /// TOML plugin configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Extra directory searched for plugin modules
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Run one provide round with this preedit
    #[arg(short, long)]
    preedit: Option<String>,

    /// Run one translate round with this candidate
    #[arg(short, long)]
    translate: Option<String>,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,

    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Serialize)]
struct PluginInfo {
    name: String,
    author: String,
    description: String,
    plugin_type: PluginType,
    provides_candidates: bool,
    translates_candidates: bool,
}

#[derive(Serialize)]
struct Report {
    loads: Vec<LoadEntry>,
    plugins: Vec<PluginInfo>,
    provide: Option<ProvideRound>,
    translate: Option<TranslateRound>,
}

#[derive(Serialize)]
struct LoadEntry {
    filename: String,
    loaded: Option<String>,
    error: Option<String>,
}

impl From<LoadReport> for LoadEntry {
    fn from(report: LoadReport) -> Self {
        let (loaded, error) = match report.result {
            Ok(name) => (Some(name), None),
            Err(message) => (None, Some(message)),
        };
        LoadEntry {
            filename: report.filename,
            loaded,
            error,
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = match &args.config {
        Some(path) => PluginConfig::load_toml(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?,
        None => PluginConfig::default(),
    };
    tracing::debug!(?config, "plugin config");

    let mut runtime = RhaiRuntime::new(vec![config.resolved_plugin_dir()]);
    if let Some(dir) = &args.dir {
        runtime.add_search_path(dir);
    }
    let mut manager = PluginManager::new();
    manager.register_backend(PluginType::Rhai, ScriptBackend::new(Rc::new(runtime)));

    let mut loads: Vec<LoadEntry> = manager
        .load_configured(&config)
        .into_iter()
        .map(LoadEntry::from)
        .collect();
    for file in &args.files {
        let loaded = manager.load_plugin(file).map(|p| p.name().to_string());
        let error = loaded.is_none().then(|| {
            manager
                .last_error()
                .map(|e| e.to_string())
                .unwrap_or_default()
        });
        loads.push(LoadEntry {
            filename: file.clone(),
            loaded,
            error,
        });
    }

    let plugins: Vec<PluginInfo> = manager
        .plugins()
        .map(|p| PluginInfo {
            name: p.name().to_string(),
            author: p.author().to_string(),
            description: p.description().to_string(),
            plugin_type: p.plugin_type(),
            provides_candidates: p.has_provide_candidates(),
            translates_candidates: p.has_translate_candidate(),
        })
        .collect();

    let provide = args
        .preedit
        .as_deref()
        .map(|text| manager.provide_round(&PluginPreedit::from(text)));
    let translate = args
        .translate
        .as_ref()
        .map(|text| manager.translate_round(text));

    let report = Report {
        loads,
        plugins,
        provide,
        translate,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_text(&report);
    }
    Ok(())
}

fn print_text(report: &Report) {
    for entry in &report.loads {
        match (&entry.loaded, &entry.error) {
            (Some(name), _) => println!("loaded  {} -> {}", entry.filename, name),
            (None, Some(error)) => println!("failed  {}: {}", entry.filename, error),
            (None, None) => println!("failed  {}", entry.filename),
        }
    }

    println!("\n{} plugin(s):", report.plugins.len());
    for info in &report.plugins {
        println!(
            "  {} [{}] by {}{}{}",
            info.name,
            info.plugin_type,
            if info.author.is_empty() { "?" } else { info.author.as_str() },
            if info.provides_candidates { " +provide" } else { "" },
            if info.translates_candidates { " +translate" } else { "" },
        );
        if !info.description.is_empty() {
            println!("    {}", info.description);
        }
    }

    if let Some(round) = &report.provide {
        println!("\nprovide round:");
        for item in &round.candidates {
            println!("  {:>4}  {}", item.rank, item.text);
        }
        if !round.is_settled() {
            println!(
                "  pending: {} (retry after {})",
                round.deferred.join(", "),
                round.retry_after
            );
        }
    }

    if let Some(round) = &report.translate {
        println!("\ntranslate round: {}", round.candidate);
        if !round.is_settled() {
            println!(
                "  pending: {} (retry after {})",
                round.deferred.join(", "),
                round.retry_after
            );
        }
    }
}
