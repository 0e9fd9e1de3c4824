//! Reconciles the instance tree with the model snapshot.
//!
//! A rebuild parks every live rig by path, walks the model breadth-first and
//! either reuses the parked rig (same path, same type) or creates a new one.
//! Rigs that are not picked up again are discarded: detached from the graph
//! and held until [`ModularRig::collect_discarded`] reclaims them, which
//! `evaluate` does at the start of every frame.

use std::collections::{BTreeMap, HashSet};
use std::mem;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::core::bindings::{BindingExpr, BindingFailure, check_compatibility};
use crate::core::diagnostics::{Diagnostic, DiagnosticKind, Severity};
use crate::engine::instance::{
    BindingOrigin, ConnectionRedirector, DetachedRig, ModuleInstance, ResolvedBinding,
};
use crate::engine::modular_rig::ModularRig;
use crate::engine::rig::ExecutableRig;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RebuildSummary {
    pub created: usize,
    pub reused: usize,
    pub discarded: usize,
    pub rejected: usize,
    pub binding_failures: usize,
}

impl ModularRig {
    /// Rebuild the instance tree from the current model snapshot.
    ///
    /// Never fails: rejected modules and broken bindings are reported as
    /// diagnostics and the rest of the graph is still built. Rebuilding an
    /// unchanged model reuses every rig.
    #[instrument(skip(self), fields(rig_type = %self.rig_type))]
    pub fn rebuild(&mut self) -> RebuildSummary {
        let model = Arc::clone(&self.model);
        self.reset_modules(false);
        let mut previous = mem::take(&mut self.detached);
        let mut summary = RebuildSummary::default();
        let mut visited: HashSet<String> = HashSet::new();

        for reference in model.breadth_first() {
            let path = reference.path();
            visited.insert(path.clone());

            let parent = if reference.is_root() {
                None
            } else {
                match self.index_of(&reference.parent_path) {
                    Some(parent) => Some(parent),
                    None => {
                        self.report(Diagnostic::warning(
                            DiagnosticKind::OrphanedModule,
                            &path,
                            format!("parent '{}' has no instance", reference.parent_path),
                        ));
                        summary.rejected += 1;
                        continue;
                    }
                }
            };

            if self
                .instances
                .iter()
                .any(|module| module.path.eq_ignore_ascii_case(&path))
            {
                let severity = if self.settings.report_name_clashes {
                    Severity::Warning
                } else {
                    Severity::Info
                };
                self.report(Diagnostic::new(
                    severity,
                    DiagnosticKind::NameClash,
                    &path,
                    "a sibling with the same name already exists; keeping the first",
                ));
                summary.rejected += 1;
                continue;
            }

            let Some(capabilities) = self.factory.describe(&reference.type_id) else {
                self.report(Diagnostic::warning(
                    DiagnosticKind::UnresolvedType,
                    &path,
                    format!("unknown rig type '{}'", reference.type_id),
                ));
                summary.rejected += 1;
                continue;
            };
            if !capabilities.is_module {
                self.report(Diagnostic::warning(
                    DiagnosticKind::NotAModule,
                    &path,
                    format!("rig type '{}' cannot be used as a module", reference.type_id),
                ));
                summary.rejected += 1;
                continue;
            }

            let reusable = match previous.remove(&path) {
                Some(parked) if parked.rig.rig_type() == reference.type_id => Some(parked),
                Some(stale) => {
                    self.discard(stale);
                    summary.discarded += 1;
                    None
                }
                None => None,
            };
            let (mut rig, rig_id) = match reusable {
                Some(parked) => {
                    summary.reused += 1;
                    (parked.rig, parked.id)
                }
                None => {
                    let Some(rig) = self.factory.create(&reference.type_id) else {
                        self.report(Diagnostic::warning(
                            DiagnosticKind::UnresolvedType,
                            &path,
                            format!("factory could not create '{}'", reference.type_id),
                        ));
                        summary.rejected += 1;
                        continue;
                    };
                    summary.created += 1;
                    (rig, self.next_rig_id())
                }
            };

            self.apply_config_values(&path, &reference.config_values, rig.as_mut());

            let redirector = ConnectionRedirector::from_model(&model, &path);
            let instance = ModuleInstance::new(reference, parent, rig, rig_id, redirector);
            let idx = self.instances.len();
            self.instances.push(instance);
            match parent {
                Some(parent) => self.instances[parent].children.push(idx),
                None => self.roots.push(idx),
            }
        }

        for reference in &model.modules {
            let path = reference.path();
            if !visited.contains(&path) {
                self.report(Diagnostic::warning(
                    DiagnosticKind::OrphanedModule,
                    &path,
                    format!("parent '{}' is not in the model", reference.parent_path),
                ));
                summary.rejected += 1;
            }
        }

        for (_, stale) in mem::take(&mut previous) {
            self.discard(stale);
            summary.discarded += 1;
        }

        for idx in 0..self.instances.len() {
            summary.binding_failures += self.resolve_bindings(idx);
        }

        self.prune_module_elements();
        self.update_supported_events();
        self.invalidate_caches();
        self.construction_required = true;
        if self.settings.reclaim_on_rebuild {
            self.collect_discarded();
        }

        info!(
            modules = self.instances.len(),
            created = summary.created,
            reused = summary.reused,
            discarded = summary.discarded,
            rejected = summary.rejected,
            binding_failures = summary.binding_failures,
            "rebuilt modular rig"
        );
        summary
    }

    /// Tear down the instance tree. With `destroy_rigs` every rig is
    /// discarded and reclaimed; otherwise rigs are parked by path for the
    /// next rebuild to pick up.
    pub fn reset_modules(&mut self, destroy_rigs: bool) {
        let instances = mem::take(&mut self.instances);
        self.roots.clear();
        self.queue = Default::default();
        for module in instances {
            let Some(rig) = module.rig else {
                continue;
            };
            let parked = DetachedRig {
                former_path: module.path,
                id: module.rig_id,
                rig,
            };
            if destroy_rigs {
                self.discard(parked);
            } else {
                self.detached.insert(parked.former_path.clone(), parked);
            }
        }
        if destroy_rigs {
            for (_, parked) in mem::take(&mut self.detached) {
                self.discard(parked);
            }
            self.prune_module_elements();
            self.collect_discarded();
            self.supported_events.clear();
        }
        self.invalidate_caches();
    }

    /// Detach `parked` from the graph and hold it for deferred reclamation.
    fn discard(&mut self, mut parked: DetachedRig) {
        parked.rig.on_detached();
        self.report(Diagnostic::info(
            DiagnosticKind::Reclamation,
            &parked.former_path,
            format!("{} ({}) detached", parked.id, parked.rig.rig_type()),
        ));
        self.discarded.push(parked);
    }

    /// Drop every discarded rig. Returns how many were reclaimed.
    pub fn collect_discarded(&mut self) -> usize {
        let reclaimed = self.discarded.len();
        self.discarded.clear();
        if reclaimed > 0 {
            debug!(reclaimed, "reclaimed discarded rigs");
        }
        reclaimed
    }

    /// Number of rigs waiting for [`Self::collect_discarded`].
    pub fn discarded_count(&self) -> usize {
        self.discarded.len()
    }

    /// Re-resolve bindings of every module, for example after new host
    /// variables were added. Returns the number of failed entries.
    pub fn rebuild_bindings(&mut self) -> usize {
        (0..self.instances.len())
            .map(|idx| self.resolve_bindings(idx))
            .sum()
    }

    /// Resolve the model's bindings for one instance. Each failing entry is
    /// reported and skipped; the rest still bind. Returns the failure count.
    fn resolve_bindings(&mut self, idx: usize) -> usize {
        let model = Arc::clone(&self.model);
        let path = self.instances[idx].path.clone();
        let Some(reference) = model.find_module(&path) else {
            self.instances[idx].bindings.clear();
            return 0;
        };

        let mut resolved = Vec::with_capacity(reference.bindings.len());
        let mut failures = 0;
        for (variable, expr) in &reference.bindings {
            match self.resolve_binding(idx, variable, expr) {
                Ok(binding) => resolved.push(binding),
                Err(failure) => {
                    failures += 1;
                    self.report(Diagnostic::warning(
                        DiagnosticKind::BindingFailed,
                        &path,
                        format!("binding '{variable}' <- '{expr}': {failure}"),
                    ));
                }
            }
        }
        self.instances[idx].bindings = resolved;
        failures
    }

    fn resolve_binding(
        &self,
        idx: usize,
        variable: &str,
        expr: &str,
    ) -> Result<ResolvedBinding, BindingFailure> {
        let source = BindingExpr::parse(expr).map_err(BindingFailure::Malformed)?;
        let target = self.instances[idx]
            .rig
            .as_deref()
            .and_then(|rig| rig.public_variable(variable))
            .ok_or_else(|| BindingFailure::MissingTarget {
                variable: variable.to_string(),
            })?;

        let (origin, value) = if source.is_host() {
            (
                BindingOrigin::Host,
                self.host_variables.get(&source.variable).cloned(),
            )
        } else {
            let source_idx =
                self.index_of(&source.source_path)
                    .ok_or_else(|| BindingFailure::MissingSourceModule {
                        path: source.source_path.clone(),
                    })?;
            let value = self.instances[source_idx]
                .rig
                .as_deref()
                .and_then(|rig| rig.public_variable(&source.variable));
            (BindingOrigin::Module(source_idx), value)
        };
        check_compatibility(&target, value.as_ref(), &source)?;

        Ok(ResolvedBinding {
            variable: variable.to_string(),
            source,
            origin,
        })
    }

    /// Apply serialized config values from the model after a reinitialization.
    pub(crate) fn reapply_config_values(&mut self, instance: usize, rig: &mut dyn ExecutableRig) {
        let model = Arc::clone(&self.model);
        let path = self.instances[instance].path.clone();
        if let Some(reference) = model.find_module(&path) {
            self.apply_config_values(&path, &reference.config_values, rig);
        }
    }

    fn apply_config_values(
        &mut self,
        path: &str,
        values: &BTreeMap<String, String>,
        rig: &mut dyn ExecutableRig,
    ) {
        for (name, raw) in values {
            if let Err(err) = rig.set_variable_from_string(name, raw) {
                self.report(Diagnostic::warning(
                    DiagnosticKind::ConfigValue,
                    path,
                    format!("config value '{name}' = '{raw}': {err}"),
                ));
            }
        }
    }

    /// Drop elements spawned by modules that no longer exist.
    fn prune_module_elements(&mut self) {
        let live: HashSet<String> = self
            .instances
            .iter()
            .map(|module| module.path.to_ascii_lowercase())
            .collect();
        let removed = self.hierarchy.retain(|record| {
            record
                .module_path
                .as_ref()
                .is_none_or(|path| live.contains(&path.to_ascii_lowercase()))
        });
        if removed > 0 {
            debug!(removed, "pruned elements of removed modules");
        }
    }
}
