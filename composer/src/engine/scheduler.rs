//! Per-event work queue and its drain loop.
//!
//! The queue is append-only and consumed by a front cursor, so module logic
//! may schedule more work while the queue drains. `execute` appends to the
//! current queue; `evaluate` starts a fresh one.

use serde::Serialize;
use tracing::{debug, instrument};

use crate::core::types::events;
use crate::engine::instance::BindingOrigin;
use crate::engine::modular_rig::ModularRig;
use crate::engine::rig::ExecutableRig;
use crate::engine::scope::ModuleScope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryState {
    Pending,
    Executing,
    Executed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionQueueEntry {
    #[serde(skip)]
    pub(crate) instance: usize,
    module_path: String,
    event: String,
    state: EntryState,
}

impl ExecutionQueueEntry {
    pub fn module_path(&self) -> &str {
        &self.module_path
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn state(&self) -> EntryState {
        self.state
    }

    pub fn executed(&self) -> bool {
        self.state == EntryState::Executed
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ExecutionQueue {
    pub entries: Vec<ExecutionQueueEntry>,
    pub front: usize,
}

impl ExecutionQueue {
    pub fn push(&mut self, instance: usize, module_path: &str, event: &str) {
        self.entries.push(ExecutionQueueEntry {
            instance,
            module_path: module_path.to_string(),
            event: event.to_string(),
            state: EntryState::Pending,
        });
    }
}

impl ModularRig {
    /// Queue every module that supports `event` (breadth-first) and drain the queue.
    #[instrument(skip(self), fields(rig_type = %self.rig_type))]
    pub fn execute(&mut self, event: &str) {
        if event == self.settings.construction_event {
            self.prepare_construction();
        }
        let interaction_scoped = events::is_interaction_scoped(event);
        for idx in self.breadth_first_indices() {
            let instance = &self.instances[idx];
            let Some(rig) = instance.rig.as_deref() else {
                continue;
            };
            if !rig.supports_event(event) {
                continue;
            }
            if interaction_scoped && !self.is_interacting_with(idx) {
                debug!(module = %instance.path, "no interaction elements in module namespace");
                continue;
            }
            let path = instance.path.clone();
            self.queue.push(idx, &path, event);
        }
        self.drain_queue();
        if event == self.settings.construction_event {
            self.construction_required = false;
        }
    }

    /// Start a fresh queue and execute `events` in order, as a host frame does.
    ///
    /// Rigs discarded by earlier rebuilds are reclaimed first; no module is
    /// running at a frame boundary.
    pub fn evaluate(&mut self, events: &[&str]) {
        self.collect_discarded();
        self.reset_execution_queue();
        for event in events {
            self.execute(event);
        }
    }

    pub fn reset_execution_queue(&mut self) {
        self.queue = Default::default();
    }

    pub fn queue(&self) -> &[ExecutionQueueEntry] {
        &self.queue.entries
    }

    /// Index of the next entry to run.
    pub fn queue_front(&self) -> usize {
        self.queue.front
    }

    fn is_interacting_with(&self, idx: usize) -> bool {
        let namespace = self.instances[idx].namespace();
        self.shared.interaction_elements.iter().any(|key| {
            self.hierarchy
                .namespace_of(key)
                .is_some_and(|ns| ns.eq_ignore_ascii_case(&namespace))
        })
    }

    /// Drop module-spawned elements so construction rebuilds them from scratch.
    fn prepare_construction(&mut self) {
        let removed = self
            .hierarchy_mut()
            .retain(|record| record.module_path.is_none());
        if removed > 0 {
            debug!(removed, "cleared module elements before construction");
        }
    }

    pub(crate) fn drain_queue(&mut self) {
        while self.queue.front < self.queue.entries.len() {
            let entry = self.queue.front;
            self.run_entry(entry);
            self.queue.front += 1;
        }
    }

    fn run_entry(&mut self, entry: usize) {
        let (instance, event) = {
            let queued = &self.queue.entries[entry];
            (queued.instance, queued.event.clone())
        };
        let state = match ModuleScope::enter(self, instance, &event) {
            Some(mut scope) => scope.run(entry),
            None => {
                debug!(instance, event = %event, "module rig unavailable, skipping entry");
                EntryState::Skipped
            }
        };
        self.set_entry_state(entry, state);
    }

    pub(crate) fn set_entry_state(&mut self, entry: usize, state: EntryState) {
        if let Some(queued) = self.queue.entries.get_mut(entry) {
            queued.state = state;
        }
    }

    /// Append `(module_path, event)` to the running queue.
    pub(crate) fn schedule(&mut self, module_path: &str, event: &str) -> bool {
        let Some(idx) = self.index_of(module_path) else {
            debug!(module = module_path, "cannot schedule unknown module");
            return false;
        };
        let path = self.instances[idx].path.clone();
        self.queue.push(idx, &path, event);
        true
    }

    /// Copy live binding values into `target` right before it executes.
    pub(crate) fn copy_bindings(&self, instance: usize, target: &mut dyn ExecutableRig) {
        for binding in &self.instances[instance].bindings {
            let value = match binding.origin {
                BindingOrigin::Host => {
                    self.host_variables.get(&binding.source.variable).cloned()
                }
                BindingOrigin::Module(source) => self
                    .instances
                    .get(source)
                    .and_then(|module| module.rig.as_deref())
                    .and_then(|rig| rig.public_variable(&binding.source.variable)),
            };
            let Some(value) = value else {
                debug!(binding = %binding.source, "binding source unavailable");
                continue;
            };
            let compatible = target
                .public_variable(&binding.variable)
                .is_some_and(|current| current.ty.accepts(value.ty));
            if !compatible {
                debug!(binding = %binding.source, variable = %binding.variable, "incompatible binding skipped");
                continue;
            }
            if let Err(err) = target.set_public_variable(&binding.variable, value.value) {
                debug!(variable = %binding.variable, error = %err, "binding copy failed");
            }
        }
    }
}
