//! RAII guards for re-entrant execution.
//!
//! Running a module swaps the active namespace, redirector and interaction
//! filter; running the resolution protocol swaps the queue, its cursor, the
//! resolve state and the redirector override. Each guard saves what it
//! replaces and restores it in `Drop`, so every exit path (including a
//! panicking module) leaves the rig as it found it.

use std::mem;

use tracing::{debug, warn};

use crate::core::diagnostics::{Diagnostic, DiagnosticKind};
use crate::core::resolve::ConnectorResolveState;
use crate::core::types::{ElementKey, events};
use crate::engine::context::{ExecuteContext, InteractionType};
use crate::engine::instance::ConnectionRedirector;
use crate::engine::modular_rig::ModularRig;
use crate::engine::rig::ExecutableRig;
use crate::engine::scheduler::{EntryState, ExecutionQueue};

/// Per-module execution state visible through [`ExecuteContext`].
#[derive(Debug, Clone, Default)]
pub(crate) struct ExecutionScope {
    pub instance: Option<usize>,
    pub event: String,
    pub interaction: Vec<ElementKey>,
    pub interaction_type: InteractionType,
    pub redirector: Option<ConnectionRedirector>,
}

/// Holds a module's rig out of its slot while the module executes.
pub(crate) struct ModuleScope<'a> {
    rig: &'a mut ModularRig,
    instance: usize,
    module_rig: Option<Box<dyn ExecutableRig>>,
    previous_scope: Option<ExecutionScope>,
    previous_namespace: String,
}

impl<'a> ModuleScope<'a> {
    /// Enter `instance` for `event`. Returns `None` when the module has no
    /// rig to run, for example because it is already executing further up
    /// the stack.
    pub fn enter(rig: &'a mut ModularRig, instance: usize, event: &str) -> Option<Self> {
        let module_rig = rig.instances.get_mut(instance)?.rig.take()?;
        let module = &rig.instances[instance];
        let namespace = module.namespace();
        let redirector = rig
            .redirector_override
            .clone()
            .unwrap_or_else(|| module.redirector.clone());

        let interaction: Vec<ElementKey> = rig
            .shared
            .interaction_elements
            .iter()
            .filter(|key| {
                rig.hierarchy
                    .namespace_of(key)
                    .is_some_and(|ns| ns.eq_ignore_ascii_case(&namespace))
            })
            .cloned()
            .collect();
        let interaction_type = if interaction.is_empty() {
            InteractionType::None
        } else {
            rig.shared.interaction_type
        };

        let scope = ExecutionScope {
            instance: Some(instance),
            event: event.to_string(),
            interaction,
            interaction_type,
            redirector: Some(redirector),
        };
        let previous_scope = mem::replace(&mut rig.scope, scope);
        let previous_namespace = rig.hierarchy.set_active_namespace(namespace);
        Some(Self {
            rig,
            instance,
            module_rig: Some(module_rig),
            previous_scope: Some(previous_scope),
            previous_namespace,
        })
    }

    /// Reinitialize if needed, copy bindings and execute the event.
    pub fn run(&mut self, entry: usize) -> EntryState {
        let Self {
            rig,
            instance,
            module_rig,
            ..
        } = self;
        let Some(module_rig) = module_rig.as_mut() else {
            return EntryState::Skipped;
        };
        let event = rig.scope.event.clone();
        if !module_rig.supports_event(&event) {
            return EntryState::Skipped;
        }

        if module_rig.requires_reinitialization() {
            if !module_rig.reinitialize(&event) {
                let path = rig.instances[*instance].path.clone();
                rig.report(Diagnostic::warning(
                    DiagnosticKind::Reinitialization,
                    path,
                    format!("rig failed to reinitialize for '{event}'"),
                ));
                return EntryState::Skipped;
            }
            rig.reapply_config_values(*instance, &mut **module_rig);
        }

        rig.copy_bindings(*instance, &mut **module_rig);
        rig.set_entry_state(entry, EntryState::Executing);
        debug!(module = %rig.instances[*instance].path, event = %event, "executing module");
        let mut ctx = ExecuteContext::new(rig, *instance);
        module_rig.execute(&event, &mut ctx);
        EntryState::Executed
    }
}

impl Drop for ModuleScope<'_> {
    fn drop(&mut self) {
        self.rig
            .hierarchy
            .set_active_namespace(mem::take(&mut self.previous_namespace));
        if let Some(previous) = self.previous_scope.take() {
            self.rig.scope = previous;
        }
        if let Some(module_rig) = self.module_rig.take() {
            match self.rig.instances.get_mut(self.instance) {
                Some(slot) => slot.rig = Some(module_rig),
                None => warn!(instance = self.instance, "module slot vanished during execution"),
            }
        }
    }
}

/// Runs the connector event on one module with an isolated queue.
pub(crate) struct ResolveScope<'a> {
    rig: &'a mut ModularRig,
    saved_queue: Option<ExecutionQueue>,
    saved_resolve: Option<ConnectorResolveState>,
    saved_redirector: Option<Option<ConnectionRedirector>>,
}

impl<'a> ResolveScope<'a> {
    pub fn enter(
        rig: &'a mut ModularRig,
        state: ConnectorResolveState,
        redirector: ConnectionRedirector,
    ) -> Self {
        let saved_queue = mem::take(&mut rig.queue);
        let saved_resolve = mem::replace(&mut rig.resolve, state);
        let saved_redirector = mem::replace(&mut rig.redirector_override, Some(redirector));
        Self {
            rig,
            saved_queue: Some(saved_queue),
            saved_resolve: Some(saved_resolve),
            saved_redirector: Some(saved_redirector),
        }
    }

    /// Queue the connector event for `instance`, drain it and return the
    /// resulting resolve state.
    pub fn run(&mut self, instance: usize) -> ConnectorResolveState {
        let path = self.rig.instances[instance].path.clone();
        self.rig.queue.push(instance, &path, events::CONNECTOR);
        self.rig.drain_queue();
        if self.rig.queue.entries.iter().all(|entry| !entry.executed()) {
            debug!(module = %path, "connector event did not run; candidates unfiltered");
        }
        self.rig.resolve.clone()
    }
}

impl Drop for ResolveScope<'_> {
    fn drop(&mut self) {
        if let Some(queue) = self.saved_queue.take() {
            self.rig.queue = queue;
        }
        if let Some(resolve) = self.saved_resolve.take() {
            self.rig.resolve = resolve;
        }
        if let Some(redirector) = self.saved_redirector.take() {
            self.rig.redirector_override = redirector;
        }
    }
}
