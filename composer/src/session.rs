//! Orchestration shared by the CLI commands: load files, build the rig,
//! render results.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::core::types::ElementKey;
use crate::engine::{ConnectorMatches, ModularRig, ModuleInstance, ModuleRegistry};
use crate::io::config::{ComposerConfig, load_config};
use crate::io::model_store::load_model;
use crate::io::type_library::load_type_library;
use crate::library::LibraryFactory;

/// Rig type the CLI publishes its model under.
pub const CLI_RIG_TYPE: &str = "Composer";

/// Files a session is opened from.
#[derive(Debug, Clone)]
pub struct SessionFiles {
    pub model: PathBuf,
    pub types: PathBuf,
    pub config: PathBuf,
}

/// A loaded model plus the rig built from it.
pub struct Session {
    pub config: ComposerConfig,
    pub rig: ModularRig,
}

impl Session {
    pub fn open(files: &SessionFiles) -> Result<Self> {
        let config = load_config(&files.config).context("load composer.toml")?;
        let model = load_model(&files.model)?;
        let library = load_type_library(&files.types)?;

        let registry = Arc::new(ModuleRegistry::new());
        registry.publish(CLI_RIG_TYPE, model);
        let rig = ModularRig::new(
            CLI_RIG_TYPE,
            registry,
            Arc::new(LibraryFactory::new(library)),
            config.engine_settings(),
        );
        info!(modules = rig.module_count(), "session opened");
        Ok(Self { config, rig })
    }

    /// Events to run: the given ones, else the configured defaults.
    pub fn events_or_default(&self, events: &[String]) -> Vec<String> {
        if events.is_empty() {
            return self.config.evaluate_events.clone();
        }
        events.to_vec()
    }

    pub fn evaluate(&mut self, events: &[String]) {
        let names: Vec<&str> = events.iter().map(String::as_str).collect();
        self.rig.evaluate(&names);
    }

    /// Find candidate targets for a connector given by name; a bare name is
    /// looked up among all connectors by its display path.
    pub fn resolve(&mut self, connector: &str) -> ConnectorMatches {
        if self.rig.construction_required() {
            let event = self.rig.settings().construction_event.clone();
            self.rig.execute(&event);
        }
        let key = self.find_connector(connector);
        self.rig.find_matches(&key, None, None)
    }

    fn find_connector(&self, name: &str) -> ElementKey {
        let exact = ElementKey::connector(name);
        if self.rig.hierarchy().contains(&exact) {
            return exact;
        }
        self.rig
            .hierarchy()
            .connectors()
            .into_iter()
            .find(|key| {
                self.rig
                    .shortest_display_path(key, false)
                    .is_some_and(|display| display.eq_ignore_ascii_case(name))
            })
            .cloned()
            .unwrap_or(exact)
    }
}

/// Indented module tree with types, rig ids and bindings.
pub fn render_tree(rig: &ModularRig) -> String {
    let mut out = String::new();
    for root in rig.root_modules() {
        render_module(rig, root, 0, &mut out);
    }
    out
}

fn render_module(rig: &ModularRig, module: &ModuleInstance, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    let _ = writeln!(
        out,
        "{indent}{} [{}] {}",
        module.display_name(),
        module.rig_type(),
        module.rig_id()
    );
    for binding in module.bindings() {
        let _ = writeln!(out, "{indent}  {} <- {}", binding.variable, binding.source);
    }
    for child in rig.children(module.path()) {
        render_module(rig, child, depth + 1, out);
    }
}

/// One line per queue entry: `module  event  state`.
pub fn render_queue(rig: &ModularRig) -> String {
    let mut out = String::new();
    for entry in rig.queue() {
        let _ = writeln!(
            out,
            "{}\t{}\t{:?}",
            entry.module_path(),
            entry.event(),
            entry.state()
        );
    }
    out
}

pub fn render_matches(rig: &ModularRig, matches: &ConnectorMatches) -> String {
    let mut out = String::new();
    let name = |key: &ElementKey| {
        rig.shortest_display_path(key, false)
            .unwrap_or_else(|| key.to_string())
    };
    let _ = writeln!(out, "{} ({:?})", name(&matches.connector), matches.outcome);
    for candidate in &matches.matches {
        let marker = if candidate.is_default() { "*" } else { " " };
        let _ = writeln!(out, "{marker} {}", name(&candidate.key));
    }
    for excluded in &matches.excluded {
        let _ = writeln!(out, "- {}: {}", name(&excluded.key), excluded.message);
    }
    if let Some(message) = &matches.message {
        let _ = writeln!(out, "! {message}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::events;
    use crate::test_support::TestWorkspace;

    fn open(workspace: &TestWorkspace) -> Session {
        let paths = workspace.paths();
        Session::open(&SessionFiles {
            model: paths.model_path.clone(),
            types: paths.types_path.clone(),
            config: paths.config_path.clone(),
        })
        .expect("open session")
    }

    #[test]
    fn sample_workspace_renders_tree_with_bindings() {
        let workspace = TestWorkspace::new().expect("workspace");
        let session = open(&workspace);
        let tree = render_tree(&session.rig);
        let lines: Vec<&str> = tree.lines().collect();
        assert_eq!(lines[0], "Spine [Spine] rig#1");
        assert_eq!(lines[1], "  Arm [Arm] rig#2");
        assert_eq!(lines[2], "    length <- Spine:length");
        assert!(!session.rig.has_problems());
    }

    #[test]
    fn default_events_run_in_order() {
        let workspace = TestWorkspace::new().expect("workspace");
        let mut session = open(&workspace);
        let names = session.events_or_default(&[]);
        session.evaluate(&names);

        let queue = render_queue(&session.rig);
        let lines: Vec<&str> = queue.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], format!("Spine\t{}\tExecuted", events::CONSTRUCTION));
        assert_eq!(lines[3], format!("Spine/Arm\t{}\tExecuted", events::FORWARDS_SOLVE));
    }

    #[test]
    fn resolve_finds_connector_by_display_name() {
        let workspace = TestWorkspace::new().expect("workspace");
        let mut session = open(&workspace);
        let matches = session.resolve("parent");
        assert_eq!(matches.connector, ElementKey::connector("Spine/Arm:parent"));
        let rendered = render_matches(&session.rig, &matches);
        assert!(rendered.contains("* chest"));
    }
}
