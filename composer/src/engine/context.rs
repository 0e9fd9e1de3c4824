//! Context handed to module logic while it executes.
//!
//! An [`ExecuteContext`] is the only way module logic reaches the engine. It
//! borrows the whole modular rig mutably, which is what makes nested
//! connector resolution possible from inside a running module.

use serde::Serialize;
use tracing::debug;

use crate::core::diagnostics::{Diagnostic, DiagnosticKind};
use crate::core::hierarchy::{ElementHierarchy, ElementRecord};
use crate::core::namespace::join_namespace;
use crate::core::types::{ElementKey, ElementKind, ResolveMatch, Variable, events};
use crate::engine::instance::ConnectionRedirector;
use crate::engine::modular_rig::ModularRig;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionType {
    #[default]
    None,
    Translate,
    Rotate,
    Scale,
    All,
}

/// Host-provided state copied down to every module.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SharedContext {
    pub host_name: String,
    pub absolute_time: f64,
    pub delta_time: f64,
    pub frames_per_second: f64,
    /// Elements the user is manipulating; modules only see their own.
    pub interaction_elements: Vec<ElementKey>,
    pub interaction_type: InteractionType,
}

impl SharedContext {
    pub fn new(host_name: &str, frames_per_second: f64, delta_time: f64) -> Self {
        Self {
            host_name: host_name.to_string(),
            absolute_time: 0.0,
            delta_time,
            frames_per_second,
            interaction_elements: Vec::new(),
            interaction_type: InteractionType::None,
        }
    }
}

pub struct ExecuteContext<'a> {
    rig: &'a mut ModularRig,
    instance: usize,
}

impl<'a> ExecuteContext<'a> {
    pub(crate) fn new(rig: &'a mut ModularRig, instance: usize) -> Self {
        Self { rig, instance }
    }

    pub fn event(&self) -> &str {
        &self.rig.scope.event
    }

    pub fn module_path(&self) -> &str {
        &self.rig.instances[self.instance].path
    }

    pub fn module_name(&self) -> &str {
        &self.rig.instances[self.instance].name
    }

    pub fn namespace(&self) -> String {
        self.rig.instances[self.instance].namespace()
    }

    pub fn shared(&self) -> &SharedContext {
        &self.rig.shared
    }

    /// Interaction elements that belong to this module.
    pub fn interaction_elements(&self) -> &[ElementKey] {
        &self.rig.scope.interaction
    }

    /// `None` when none of the interaction elements belong to this module.
    pub fn interaction_type(&self) -> InteractionType {
        self.rig.scope.interaction_type
    }

    pub fn hierarchy(&self) -> &ElementHierarchy {
        &self.rig.hierarchy
    }

    pub fn host_variable(&self, name: &str) -> Option<&Variable> {
        self.rig.host_variables.get(name)
    }

    pub fn redirector(&self) -> Option<&ConnectionRedirector> {
        self.rig.scope.redirector.as_ref()
    }

    /// Append `(module_path, event)` to the running queue.
    pub fn schedule(&mut self, module_path: &str, event: &str) -> bool {
        self.rig.schedule(module_path, event)
    }

    /// Add an element in this module's namespace. A connector parent is
    /// replaced by its wired target.
    pub fn add_element(
        &mut self,
        kind: ElementKind,
        name: &str,
        parent: Option<ElementKey>,
    ) -> ElementKey {
        let parent = parent.map(|key| self.resolve_key(&key));
        let record = self.record(kind, name).with_parent(parent);
        let key = record.key.clone();
        self.rig.hierarchy_mut().add(record);
        key
    }

    pub fn add_connector(&mut self, name: &str, primary: bool) -> ElementKey {
        let record = self.record(ElementKind::Connector, name).primary(primary);
        let key = record.key.clone();
        self.rig.hierarchy_mut().add(record);
        key
    }

    fn record(&self, kind: ElementKind, name: &str) -> ElementRecord {
        let path = self.module_path();
        ElementRecord::new(ElementKey::new(kind, join_namespace(&self.namespace(), name)))
            .in_module(path, name)
    }

    /// Find an element, looking in this module's namespace first.
    pub fn find_element(&self, kind: ElementKind, name: &str) -> Option<ElementKey> {
        self.rig.hierarchy.find(kind, name).cloned()
    }

    /// Resolve a connector key through the active redirector; other keys pass through.
    pub fn resolve_key(&self, key: &ElementKey) -> ElementKey {
        self.redirector()
            .and_then(|redirector| redirector.resolve(key))
            .cloned()
            .unwrap_or_else(|| key.clone())
    }

    fn in_connector_event(&mut self, operation: &str) -> bool {
        if self.rig.scope.event == events::CONNECTOR {
            return true;
        }
        let subject = self.module_path().to_string();
        let message = format!(
            "{operation} is only available during the '{}' event (running '{}')",
            events::CONNECTOR,
            self.rig.scope.event
        );
        self.rig
            .report(Diagnostic::warning(DiagnosticKind::ProtocolMisuse, subject, message));
        false
    }

    /// The connector being resolved, relative to this module's namespace.
    pub fn connector(&self) -> Option<&ElementKey> {
        self.rig.resolve.connector.as_ref()
    }

    /// Current candidates of the connector being resolved.
    pub fn candidates(&mut self) -> Vec<ResolveMatch> {
        if !self.in_connector_event("candidates") {
            return Vec::new();
        }
        self.rig.resolve.matches.clone()
    }

    /// Move the named candidates to the excluded set.
    pub fn discard_matches(&mut self, keys: &[ElementKey], reason: &str) -> usize {
        if !self.in_connector_event("discard_matches") {
            return 0;
        }
        let moved = self.rig.resolve.discard_matches(keys, reason);
        debug!(module = %self.module_path(), moved, "discarded connector matches");
        moved
    }

    /// Make `key` the single default candidate.
    pub fn set_default_match(&mut self, key: &ElementKey) -> bool {
        if !self.in_connector_event("set_default_match") {
            return false;
        }
        match self.rig.resolve.set_default_match(key) {
            Ok(()) => true,
            Err(message) => {
                let subject = self.module_path().to_string();
                self.rig.report(Diagnostic::warning(
                    DiagnosticKind::ProtocolMisuse,
                    subject,
                    message,
                ));
                false
            }
        }
    }

    /// Run the resolution protocol for another connector from inside this module.
    pub fn resolve_connector(
        &mut self,
        connector: &ElementKey,
        module_path: Option<&str>,
        redirector: Option<&ConnectionRedirector>,
        candidates: Vec<ResolveMatch>,
    ) -> Vec<ResolveMatch> {
        self.rig
            .resolve_connector(connector, module_path, redirector, candidates)
    }
}
