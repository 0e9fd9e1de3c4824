//! The modular rig: instance tree, shared hierarchy and execution state.

use std::cell::OnceCell;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::core::diagnostics::{Diagnostic, Severity};
use crate::core::display_path::DisplayPathCache;
use crate::core::hierarchy::ElementHierarchy;
use crate::core::model::ModuleGraphModel;
use crate::core::resolve::ConnectorResolveState;
use crate::core::types::{ElementKey, Variable, VariableValue, events};
use crate::engine::context::SharedContext;
use crate::engine::instance::{ConnectionRedirector, DetachedRig, ModuleHandle, ModuleInstance};
use crate::engine::rebuild::RebuildSummary;
use crate::engine::registry::ModuleRegistry;
use crate::engine::rig::{ExecutableRig, RigFactory, RigId};
use crate::engine::scheduler::ExecutionQueue;
use crate::engine::scope::ExecutionScope;

/// Engine knobs, usually loaded from `composer.toml`.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub frames_per_second: f64,
    pub delta_time: f64,
    /// Report sibling name clashes as warnings (otherwise informational).
    pub report_name_clashes: bool,
    /// Reclaim discarded rigs at the end of every rebuild.
    pub reclaim_on_rebuild: bool,
    pub construction_event: String,
    /// Variables of the host rig, available as bare binding sources.
    pub host_variables: BTreeMap<String, Variable>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            frames_per_second: 30.0,
            delta_time: 1.0 / 30.0,
            report_name_clashes: true,
            reclaim_on_rebuild: false,
            construction_event: events::CONSTRUCTION.to_string(),
            host_variables: BTreeMap::new(),
        }
    }
}

pub struct ModularRig {
    pub(crate) rig_type: String,
    pub(crate) registry: Arc<ModuleRegistry>,
    pub(crate) factory: Arc<dyn RigFactory>,
    pub(crate) settings: EngineSettings,
    pub(crate) model: Arc<ModuleGraphModel>,
    pub(crate) instances: Vec<ModuleInstance>,
    pub(crate) roots: Vec<usize>,
    /// Rigs parked by `reset_modules(false)`, keyed by their former path.
    pub(crate) detached: BTreeMap<String, DetachedRig>,
    /// Rigs awaiting deferred reclamation.
    pub(crate) discarded: Vec<DetachedRig>,
    pub(crate) next_rig_id: u64,
    pub(crate) host_variables: BTreeMap<String, Variable>,
    pub(crate) hierarchy: ElementHierarchy,
    pub(crate) shared: SharedContext,
    pub(crate) scope: ExecutionScope,
    pub(crate) queue: ExecutionQueue,
    pub(crate) resolve: ConnectorResolveState,
    pub(crate) redirector_override: Option<ConnectionRedirector>,
    pub(crate) display_paths: OnceCell<DisplayPathCache>,
    pub(crate) diagnostics: Vec<Diagnostic>,
    pub(crate) supported_events: Vec<String>,
    pub(crate) construction_required: bool,
}

impl ModularRig {
    /// Create a modular rig for `rig_type` from the registry's current
    /// snapshot (an empty model if none is published) and build its modules.
    pub fn new(
        rig_type: &str,
        registry: Arc<ModuleRegistry>,
        factory: Arc<dyn RigFactory>,
        settings: EngineSettings,
    ) -> Self {
        let model = registry
            .get(rig_type)
            .unwrap_or_else(|| Arc::new(ModuleGraphModel::new()));
        let shared = SharedContext::new(rig_type, settings.frames_per_second, settings.delta_time);
        let host_variables = settings.host_variables.clone();
        let mut rig = Self {
            rig_type: rig_type.to_string(),
            registry,
            factory,
            settings,
            model,
            instances: Vec::new(),
            roots: Vec::new(),
            detached: BTreeMap::new(),
            discarded: Vec::new(),
            next_rig_id: 0,
            host_variables,
            hierarchy: ElementHierarchy::new(),
            shared,
            scope: ExecutionScope::default(),
            queue: ExecutionQueue::default(),
            resolve: ConnectorResolveState::default(),
            redirector_override: None,
            display_paths: OnceCell::new(),
            diagnostics: Vec::new(),
            supported_events: Vec::new(),
            construction_required: true,
        };
        rig.rebuild();
        rig
    }

    pub fn rig_type(&self) -> &str {
        &self.rig_type
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn model(&self) -> &Arc<ModuleGraphModel> {
        &self.model
    }

    /// Publish `model` for this rig type and rebuild from it.
    pub fn set_model(&mut self, model: ModuleGraphModel) -> RebuildSummary {
        self.model = self.registry.publish(&self.rig_type, model);
        self.rebuild()
    }

    /// Pick up the registry's current snapshot and rebuild.
    pub fn refresh_model(&mut self) -> RebuildSummary {
        if let Some(model) = self.registry.get(&self.rig_type) {
            self.model = model;
        }
        self.rebuild()
    }

    pub(crate) fn next_rig_id(&mut self) -> RigId {
        self.next_rig_id += 1;
        RigId(self.next_rig_id)
    }

    /// Whether the construction event must run before elements can be trusted.
    pub fn construction_required(&self) -> bool {
        self.construction_required
    }

    // Diagnostics

    pub(crate) fn report(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error | Severity::Warning => warn!(
                kind = ?diagnostic.kind,
                subject = %diagnostic.subject,
                "{}",
                diagnostic.message
            ),
            Severity::Info => info!(
                kind = ?diagnostic.kind,
                subject = %diagnostic.subject,
                "{}",
                diagnostic.message
            ),
        }
        self.diagnostics.push(diagnostic);
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// True if any warning or error was reported since the last take.
    pub fn has_problems(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_problem)
    }

    // Module queries

    pub fn module_count(&self) -> usize {
        self.instances.len()
    }

    pub(crate) fn index_of(&self, path: &str) -> Option<usize> {
        let path = path.strip_suffix(':').unwrap_or(path);
        self.instances.iter().position(|module| module.path == path)
    }

    pub fn find_module(&self, path: &str) -> Option<&ModuleInstance> {
        self.index_of(path).map(|idx| &self.instances[idx])
    }

    /// The module whose namespace owns `key`.
    pub fn find_module_by_element(&self, key: &ElementKey) -> Option<&ModuleInstance> {
        let path = self.hierarchy.module_path_of(key)?;
        self.find_module(&path)
    }

    pub fn module_handle(&self, path: &str) -> ModuleHandle {
        ModuleHandle::new(path)
    }

    pub(crate) fn breadth_first_indices(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.instances.len());
        let mut queue: VecDeque<usize> = self.roots.iter().copied().collect();
        while let Some(idx) = queue.pop_front() {
            order.push(idx);
            queue.extend(self.instances[idx].children.iter().copied());
        }
        order
    }

    /// Visit modules breadth-first until `visit` returns `false`.
    pub fn for_each_module(&self, mut visit: impl FnMut(&ModuleInstance) -> bool) {
        for idx in self.breadth_first_indices() {
            if !visit(&self.instances[idx]) {
                return;
            }
        }
    }

    pub fn module_paths(&self) -> Vec<String> {
        let mut paths = Vec::with_capacity(self.instances.len());
        self.for_each_module(|module| {
            paths.push(module.path.clone());
            true
        });
        paths
    }

    pub fn root_modules(&self) -> Vec<&ModuleInstance> {
        self.roots.iter().map(|idx| &self.instances[*idx]).collect()
    }

    pub fn children(&self, path: &str) -> Vec<&ModuleInstance> {
        self.find_module(path)
            .map(|module| {
                module
                    .children
                    .iter()
                    .map(|idx| &self.instances[*idx])
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn parent_path(&self, path: &str) -> Option<&str> {
        self.parent_module(path).map(ModuleInstance::path)
    }

    pub fn parent_module(&self, path: &str) -> Option<&ModuleInstance> {
        let parent = self.find_module(path)?.parent?;
        self.instances.get(parent)
    }

    /// The root module above `path` (the module itself if it is a root).
    pub fn root_module(&self, path: &str) -> Option<&ModuleInstance> {
        let mut current = self.find_module(path)?;
        while let Some(parent) = current.parent {
            current = &self.instances[parent];
        }
        Some(current)
    }

    pub fn module_rig(&self, path: &str) -> Option<&dyn ExecutableRig> {
        self.find_module(path).and_then(ModuleInstance::rig)
    }

    pub fn module_rig_mut(&mut self, path: &str) -> Option<&mut (dyn ExecutableRig + 'static)> {
        let idx = self.index_of(path)?;
        self.instances[idx].rig.as_deref_mut()
    }

    pub fn find_connectors(&self, path: &str) -> Vec<ElementKey> {
        self.hierarchy
            .connectors_of_module(path)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Primary connector of a module, cached until the topology or elements change.
    pub fn find_primary_connector(&self, path: &str) -> Option<ElementKey> {
        let module = self.find_module(path)?;
        module
            .primary_connector
            .get_or_init(|| {
                self.hierarchy
                    .primary_connector_of_module(&module.path)
                    .cloned()
            })
            .clone()
    }

    // Events

    /// Union of the events supported by the module rigs, in first-seen order.
    pub fn supported_events(&self) -> &[String] {
        &self.supported_events
    }

    pub fn supports_event(&self, event: &str) -> bool {
        self.supported_events.iter().any(|name| name == event)
    }

    pub(crate) fn update_supported_events(&mut self) {
        let mut supported: Vec<String> = Vec::new();
        for idx in self.breadth_first_indices() {
            let Some(rig) = self.instances[idx].rig.as_deref() else {
                continue;
            };
            for event in rig.supported_events() {
                if !supported.contains(&event) {
                    supported.push(event);
                }
            }
        }
        self.supported_events = supported;
    }

    // Host state

    pub fn host_variables(&self) -> &BTreeMap<String, Variable> {
        &self.host_variables
    }

    /// Values written here flow into bound modules on their next execution.
    /// Adding new names requires a rebuild before modules can bind to them.
    pub fn host_variables_mut(&mut self) -> &mut BTreeMap<String, Variable> {
        &mut self.host_variables
    }

    pub fn set_host_variable(&mut self, name: &str, value: VariableValue) {
        self.host_variables
            .insert(name.to_string(), Variable::new(value));
    }

    pub fn shared(&self) -> &SharedContext {
        &self.shared
    }

    pub fn shared_mut(&mut self) -> &mut SharedContext {
        &mut self.shared
    }

    // Hierarchy and derived caches

    pub fn hierarchy(&self) -> &ElementHierarchy {
        &self.hierarchy
    }

    /// Mutable hierarchy access; drops every cache derived from the element set.
    pub fn hierarchy_mut(&mut self) -> &mut ElementHierarchy {
        self.invalidate_caches();
        &mut self.hierarchy
    }

    pub(crate) fn invalidate_caches(&mut self) {
        self.display_paths = OnceCell::new();
        for module in &mut self.instances {
            module.primary_connector = OnceCell::new();
        }
    }

    /// Display name of `key`: the bare name when unique across all elements
    /// and connections, else `module:name`. With `always_show_namespace`
    /// the namespaced form is returned for module elements.
    pub fn shortest_display_path(
        &self,
        key: &ElementKey,
        always_show_namespace: bool,
    ) -> Option<String> {
        let cache = self.display_paths.get_or_init(|| self.build_display_paths());
        cache
            .display_path(key, always_show_namespace)
            .map(str::to_string)
    }

    fn build_display_paths(&self) -> DisplayPathCache {
        let connection_keys = self
            .model
            .connections
            .iter()
            .flat_map(|connection| [&connection.connector, &connection.target]);
        let keys: Vec<&ElementKey> = self.hierarchy.keys().chain(connection_keys).collect();
        debug!(keys = keys.len(), "rebuilding display path cache");
        DisplayPathCache::build(keys, &self.hierarchy, |path| {
            self.find_module(path)
                .map(|module| module.display_name().to_string())
                .or_else(|| {
                    self.model
                        .find_module(path)
                        .map(|module| module.display_name().to_string())
                })
        })
    }
}
