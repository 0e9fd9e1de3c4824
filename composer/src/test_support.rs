//! Test-only helpers: model builders, scripted rigs and temp workspaces.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tempfile::TempDir;

use crate::core::model::{Connection, ModuleGraphModel, ModuleReference};
use crate::core::types::{ElementKey, Variable, VariableValue};
use crate::engine::{
    EngineSettings, ExecutableRig, ExecuteContext, ModularRig, ModuleRegistry, RigCapabilities,
    RigFactory,
};
use crate::io::init::{ComposerPaths, InitOptions, init_workspace};

/// Rig type under which test models are published.
pub const TEST_RIG_TYPE: &str = "TestRig";

/// Create a module reference with no config values or bindings.
pub fn module(name: &str, parent_path: &str, type_id: &str) -> ModuleReference {
    ModuleReference::new(name, parent_path, type_id)
}

pub fn model_of(modules: Vec<ModuleReference>) -> ModuleGraphModel {
    ModuleGraphModel {
        modules,
        connections: Vec::new(),
    }
}

/// Wire connector `connector` to bone `target`.
pub fn connect(model: &mut ModuleGraphModel, connector: &str, target: &str) {
    model.connections.push(Connection {
        connector: ElementKey::connector(connector),
        target: ElementKey::bone(target),
    });
}

/// Bind `variable` of the module at `path` to `expr`.
pub fn bind(model: &mut ModuleGraphModel, path: &str, variable: &str, expr: &str) {
    if let Some(module) = model.find_module_mut(path) {
        module
            .bindings
            .insert(variable.to_string(), expr.to_string());
    }
}

/// One recorded execution of a scripted rig.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
    pub module_path: String,
    pub event: String,
    /// Public variables as seen when the event started.
    pub variables: BTreeMap<String, VariableValue>,
}

pub type Journal = Arc<Mutex<Vec<JournalEntry>>>;

/// Extra logic run after a scripted rig records an execution.
pub type Behaviour = Arc<dyn Fn(&str, &mut ExecuteContext<'_>) + Send + Sync>;

#[derive(Clone)]
pub struct ScriptedType {
    name: String,
    is_module: bool,
    events: Vec<String>,
    variables: BTreeMap<String, VariableValue>,
    behaviour: Option<Behaviour>,
    /// `Some(result)` makes the rig require reinitialization before every event.
    reinitialize: Option<bool>,
}

impl ScriptedType {
    pub fn module(name: &str) -> Self {
        Self {
            name: name.to_string(),
            is_module: true,
            events: Vec::new(),
            variables: BTreeMap::new(),
            behaviour: None,
            reinitialize: None,
        }
    }

    /// A type that exists but cannot be used as a module.
    pub fn rig(name: &str) -> Self {
        Self {
            is_module: false,
            ..Self::module(name)
        }
    }

    pub fn events(mut self, events: &[&str]) -> Self {
        self.events = events.iter().map(|event| event.to_string()).collect();
        self
    }

    pub fn variable(mut self, name: &str, value: VariableValue) -> Self {
        self.variables.insert(name.to_string(), value);
        self
    }

    pub fn on_execute(
        mut self,
        behaviour: impl Fn(&str, &mut ExecuteContext<'_>) + Send + Sync + 'static,
    ) -> Self {
        self.behaviour = Some(Arc::new(behaviour));
        self
    }

    pub fn reinitializes(mut self, succeeds: bool) -> Self {
        self.reinitialize = Some(succeeds);
        self
    }
}

/// Factory of [`ScriptedRig`]s sharing one journal.
#[derive(Clone, Default)]
pub struct ScriptedFactory {
    types: BTreeMap<String, ScriptedType>,
    journal: Journal,
    detached: Arc<AtomicUsize>,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, scripted: ScriptedType) -> Self {
        self.types.insert(scripted.name.clone(), scripted);
        self
    }

    pub fn journal(&self) -> Journal {
        Arc::clone(&self.journal)
    }

    pub fn entries(&self) -> Vec<JournalEntry> {
        self.journal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// `(module_path, event)` pairs in execution order.
    pub fn executions(&self) -> Vec<(String, String)> {
        self.entries()
            .into_iter()
            .map(|entry| (entry.module_path, entry.event))
            .collect()
    }

    /// How many rigs were told they left the graph.
    pub fn detached_count(&self) -> usize {
        self.detached.load(Ordering::SeqCst)
    }
}

impl RigFactory for ScriptedFactory {
    fn describe(&self, rig_type: &str) -> Option<RigCapabilities> {
        let scripted = self.types.get(rig_type)?;
        Some(RigCapabilities {
            is_module: scripted.is_module,
            events: scripted.events.clone(),
        })
    }

    fn create(&self, rig_type: &str) -> Option<Box<dyn ExecutableRig>> {
        let scripted = self.types.get(rig_type)?.clone();
        let variables = scripted
            .variables
            .iter()
            .map(|(name, value)| (name.clone(), Variable::new(value.clone())))
            .collect();
        Some(Box::new(ScriptedRig {
            scripted,
            variables,
            journal: self.journal(),
            detached: Arc::clone(&self.detached),
        }))
    }
}

pub struct ScriptedRig {
    scripted: ScriptedType,
    variables: BTreeMap<String, Variable>,
    journal: Journal,
    detached: Arc<AtomicUsize>,
}

impl ExecutableRig for ScriptedRig {
    fn rig_type(&self) -> &str {
        &self.scripted.name
    }

    fn supported_events(&self) -> Vec<String> {
        self.scripted.events.clone()
    }

    fn execute(&mut self, event: &str, ctx: &mut ExecuteContext<'_>) {
        let entry = JournalEntry {
            module_path: ctx.module_path().to_string(),
            event: event.to_string(),
            variables: self
                .variables
                .iter()
                .map(|(name, variable)| (name.clone(), variable.value.clone()))
                .collect(),
        };
        self.journal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
        if let Some(behaviour) = self.scripted.behaviour.clone() {
            behaviour(event, ctx);
        }
    }

    fn requires_reinitialization(&self) -> bool {
        self.scripted.reinitialize.is_some()
    }

    /// Resets variables to the type defaults.
    fn reinitialize(&mut self, _event: &str) -> bool {
        let succeeds = self.scripted.reinitialize.unwrap_or(true);
        if succeeds {
            for (name, value) in &self.scripted.variables {
                self.variables
                    .insert(name.clone(), Variable::new(value.clone()));
            }
        }
        succeeds
    }

    fn public_variable(&self, name: &str) -> Option<Variable> {
        self.variables.get(name).cloned()
    }

    fn set_public_variable(&mut self, name: &str, value: VariableValue) -> Result<(), String> {
        let variable = self
            .variables
            .get_mut(name)
            .ok_or_else(|| format!("unknown variable '{name}'"))?;
        if !variable.ty.accepts(value.variable_type()) {
            return Err(format!("variable '{name}' is {}", variable.ty));
        }
        variable.value = value;
        Ok(())
    }

    fn on_detached(&mut self) {
        self.detached.fetch_add(1, Ordering::SeqCst);
    }
}

/// Build a modular rig over `model` with default settings.
pub fn rig_with(factory: ScriptedFactory, model: ModuleGraphModel) -> ModularRig {
    rig_with_settings(factory, model, EngineSettings::default())
}

pub fn rig_with_settings(
    factory: ScriptedFactory,
    model: ModuleGraphModel,
    settings: EngineSettings,
) -> ModularRig {
    let registry = Arc::new(ModuleRegistry::new());
    registry.publish(TEST_RIG_TYPE, model);
    ModularRig::new(TEST_RIG_TYPE, registry, Arc::new(factory), settings)
}

/// A scaffolded composer workspace in a temp directory.
pub struct TestWorkspace {
    dir: TempDir,
    paths: ComposerPaths,
}

impl TestWorkspace {
    pub fn new() -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;
        let paths = init_workspace(dir.path(), &InitOptions::default())?;
        Ok(Self { dir, paths })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn paths(&self) -> &ComposerPaths {
        &self.paths
    }
}
