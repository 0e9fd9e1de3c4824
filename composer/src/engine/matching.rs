//! Candidate search for a connector across the whole hierarchy.
//!
//! Every element starts as a possible target. Built-in filters drop
//! incompatible kinds and the connector's own namespace, then the owning
//! module gets its say through the connector event.

use serde::Serialize;
use tracing::{debug, instrument};

use crate::core::namespace::{is_below_namespace, is_in_namespace, namespace_of_path};
use crate::core::resolve::{ConnectorResolveState, move_default_to_front};
use crate::core::types::{ElementKey, ElementKind, ResolveMatch};
use crate::engine::instance::ConnectionRedirector;
use crate::engine::modular_rig::ModularRig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolveOutcome {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectorMatches {
    pub connector: ElementKey,
    /// Default match first, when there is one.
    pub matches: Vec<ResolveMatch>,
    pub excluded: Vec<ResolveMatch>,
    pub outcome: ResolveOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ConnectorMatches {
    fn error(connector: &ElementKey, message: String) -> Self {
        Self {
            connector: connector.clone(),
            matches: Vec::new(),
            excluded: Vec::new(),
            outcome: ResolveOutcome::Error,
            message: Some(message),
        }
    }

    pub fn default_match(&self) -> Option<&ResolveMatch> {
        self.matches.first().filter(|candidate| candidate.is_default())
    }
}

impl ModularRig {
    /// Collect the valid targets of `connector`.
    ///
    /// `module_path` defaults to the connector's owner and `redirector` to
    /// the owner's own. Runs construction first if the element set is stale.
    #[instrument(skip(self, redirector), fields(connector = %connector))]
    pub fn find_matches(
        &mut self,
        connector: &ElementKey,
        module_path: Option<&str>,
        redirector: Option<&ConnectionRedirector>,
    ) -> ConnectorMatches {
        if self.construction_required {
            let event = self.settings.construction_event.clone();
            self.execute(&event);
        }
        if !self.hierarchy.contains(connector) {
            return ConnectorMatches::error(connector, format!("connector {connector} not found"));
        }

        let owner = module_path
            .map(str::to_string)
            .or_else(|| self.hierarchy.module_path_of(connector));
        let candidates = self
            .hierarchy
            .keys()
            .filter(|key| *key != connector)
            .cloned()
            .map(ResolveMatch::possible)
            .collect();
        let mut state = ConnectorResolveState::new(connector.clone(), candidates);

        let curves = keys_where(&state, |key| key.kind == ElementKind::Curve);
        state.discard_matches(&curves, "Cannot connect to curves.");
        let connectors = keys_where(&state, |key| key.kind == ElementKind::Connector);
        state.discard_matches(&connectors, "Cannot connect to connectors.");

        if let Some(owner) = owner.as_deref() {
            let namespace = namespace_of_path(owner);
            let own = keys_where(&state, |key| is_in_namespace(&key.name, &namespace));
            state.discard_matches(&own, "Cannot connect within the same namespace.");
            let below = keys_where(&state, |key| is_below_namespace(&key.name, &namespace));
            state.discard_matches(
                &below,
                "Cannot connect to element below the connector's namespace.",
            );

            let redirector = match redirector {
                Some(redirector) => Some(redirector.clone()),
                None => self.find_module(owner).map(|module| module.redirector.clone()),
            };
            let asked = self.resolve_connector_state(
                connector,
                Some(owner),
                redirector.as_ref(),
                state.matches.clone(),
            );
            match asked {
                Some(result) => {
                    state.matches = result.matches;
                    state.excluded.extend(result.excluded);
                }
                None => debug!(owner, "owner unavailable, keeping built-in filtering"),
            }
        }

        move_default_to_front(&mut state.matches);
        let (outcome, message) = if state.matches.is_empty() {
            (ResolveOutcome::Error, Some(format!("no valid targets for {connector}")))
        } else {
            (ResolveOutcome::Success, None)
        };
        ConnectorMatches {
            connector: connector.clone(),
            matches: state.matches,
            excluded: state.excluded,
            outcome,
            message,
        }
    }

    /// [`Self::find_matches`] for the primary connector of `module_path`.
    pub fn find_matches_for_primary_connector(&mut self, module_path: &str) -> ConnectorMatches {
        if self.construction_required {
            let event = self.settings.construction_event.clone();
            self.execute(&event);
        }
        match self.find_primary_connector(module_path) {
            Some(connector) => self.find_matches(&connector, Some(module_path), None),
            None => ConnectorMatches::error(
                &ElementKey::connector(module_path),
                format!("module '{module_path}' has no connectors"),
            ),
        }
    }
}

fn keys_where(state: &ConnectorResolveState, keep: impl Fn(&ElementKey) -> bool) -> Vec<ElementKey> {
    state
        .matches
        .iter()
        .filter(|candidate| keep(&candidate.key))
        .map(|candidate| candidate.key.clone())
        .collect()
}
