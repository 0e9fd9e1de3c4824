//! Connector resolution protocol entry point.

use tracing::{debug, instrument};

use crate::core::diagnostics::{Diagnostic, DiagnosticKind};
use crate::core::namespace::strip_namespace;
use crate::core::resolve::ConnectorResolveState;
use crate::core::types::{ElementKey, ResolveMatch};
use crate::engine::instance::ConnectionRedirector;
use crate::engine::modular_rig::ModularRig;
use crate::engine::scope::ResolveScope;

impl ModularRig {
    /// Let the owning module filter and rank `candidates` for `connector`.
    ///
    /// Runs the connector event on the owner with an isolated queue, so it may
    /// be called while another event is draining. Without an owner or a
    /// redirector there is nothing to ask and the result is empty. An owner
    /// that is itself executing cannot be asked either; that is reported as
    /// protocol misuse and the result is empty.
    pub fn resolve_connector(
        &mut self,
        connector: &ElementKey,
        module_path: Option<&str>,
        redirector: Option<&ConnectionRedirector>,
        candidates: Vec<ResolveMatch>,
    ) -> Vec<ResolveMatch> {
        self.resolve_connector_state(connector, module_path, redirector, candidates)
            .map(|state| state.matches)
            .unwrap_or_default()
    }

    #[instrument(skip(self, redirector, candidates), fields(connector = %connector))]
    pub(crate) fn resolve_connector_state(
        &mut self,
        connector: &ElementKey,
        module_path: Option<&str>,
        redirector: Option<&ConnectionRedirector>,
        candidates: Vec<ResolveMatch>,
    ) -> Option<ConnectorResolveState> {
        let Some(instance) = module_path.and_then(|path| self.index_of(path)) else {
            debug!(module = ?module_path, "no owning module, candidates cleared");
            return None;
        };
        if self.instances[instance].rig.is_none() {
            let path = self.instances[instance].path.clone();
            self.report(Diagnostic::warning(
                DiagnosticKind::ProtocolMisuse,
                path,
                format!("cannot resolve {connector} while its owning module is executing"),
            ));
            return None;
        }
        let Some(redirector) = redirector.cloned() else {
            debug!("no redirector, candidates cleared");
            return None;
        };

        let namespace = self.instances[instance].namespace();
        let local = ElementKey::new(connector.kind, strip_namespace(&connector.name, &namespace));
        let state = ConnectorResolveState::new(local, candidates);
        let mut scope = ResolveScope::enter(self, state, redirector);
        Some(scope.run(instance))
    }
}
