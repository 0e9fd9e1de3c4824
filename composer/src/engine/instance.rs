//! Runtime module instances and the structures they own.

use std::cell::OnceCell;
use std::collections::BTreeMap;

use crate::core::bindings::BindingExpr;
use crate::core::model::{ModuleGraphModel, ModuleReference};
use crate::core::namespace::{namespace_of_path, strip_namespace};
use crate::core::types::{ElementKey, ElementKind};
use crate::engine::modular_rig::ModularRig;
use crate::engine::rig::{ExecutableRig, RigId};

/// Maps a module's local connector keys to their wired targets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionRedirector {
    namespace: String,
    targets: BTreeMap<ElementKey, ElementKey>,
}

impl ConnectionRedirector {
    pub fn new(module_path: &str) -> Self {
        Self {
            namespace: namespace_of_path(module_path),
            targets: BTreeMap::new(),
        }
    }

    pub fn from_model(model: &ModuleGraphModel, module_path: &str) -> Self {
        Self {
            namespace: namespace_of_path(module_path),
            targets: model.module_connection_map(module_path),
        }
    }

    /// Wire a connector (local or namespaced) to `target`.
    pub fn insert(&mut self, connector: &ElementKey, target: ElementKey) {
        self.targets.insert(self.local_key(connector), target);
    }

    /// Target of a connector, accepting local or namespaced connector keys.
    pub fn resolve(&self, key: &ElementKey) -> Option<&ElementKey> {
        if key.kind != ElementKind::Connector {
            return None;
        }
        self.targets.get(&self.local_key(key))
    }

    fn local_key(&self, key: &ElementKey) -> ElementKey {
        ElementKey::new(key.kind, strip_namespace(&key.name, &self.namespace))
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BindingOrigin {
    Host,
    Module(usize),
}

/// A binding that resolved at rebuild time; its value is copied before every execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBinding {
    pub variable: String,
    pub source: BindingExpr,
    pub(crate) origin: BindingOrigin,
}

/// A rig that left the active graph and waits for reuse or reclamation.
pub(crate) struct DetachedRig {
    pub former_path: String,
    pub id: RigId,
    pub rig: Box<dyn ExecutableRig>,
}

pub struct ModuleInstance {
    pub(crate) name: String,
    pub(crate) short_name: Option<String>,
    pub(crate) parent_path: String,
    pub(crate) path: String,
    pub(crate) rig_type: String,
    /// Empty while the module executes.
    pub(crate) rig: Option<Box<dyn ExecutableRig>>,
    pub(crate) rig_id: RigId,
    pub(crate) parent: Option<usize>,
    pub(crate) children: Vec<usize>,
    pub(crate) primary_connector: OnceCell<Option<ElementKey>>,
    pub(crate) bindings: Vec<ResolvedBinding>,
    pub(crate) redirector: ConnectionRedirector,
}

impl ModuleInstance {
    pub(crate) fn new(
        reference: &ModuleReference,
        parent: Option<usize>,
        rig: Box<dyn ExecutableRig>,
        rig_id: RigId,
        redirector: ConnectionRedirector,
    ) -> Self {
        Self {
            name: reference.name.clone(),
            short_name: reference.short_name.clone(),
            parent_path: reference.parent_path.clone(),
            path: reference.path(),
            rig_type: reference.type_id.clone(),
            rig: Some(rig),
            rig_id,
            parent,
            children: Vec::new(),
            primary_connector: OnceCell::new(),
            bindings: Vec::new(),
            redirector,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn display_name(&self) -> &str {
        self.short_name.as_deref().unwrap_or(&self.name)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn parent_path(&self) -> &str {
        &self.parent_path
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn namespace(&self) -> String {
        namespace_of_path(&self.path)
    }

    pub fn rig_type(&self) -> &str {
        &self.rig_type
    }

    pub fn rig_id(&self) -> RigId {
        self.rig_id
    }

    /// The module's rig, unless it is currently executing.
    pub fn rig(&self) -> Option<&dyn ExecutableRig> {
        self.rig.as_deref()
    }

    pub fn bindings(&self) -> &[ResolvedBinding] {
        &self.bindings
    }

    pub fn redirector(&self) -> &ConnectionRedirector {
        &self.redirector
    }
}

/// Path-keyed handle to a module, resolved against a rig on use.
///
/// Handles survive rebuilds: they name a path, not an instance slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleHandle {
    path: String,
}

impl ModuleHandle {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn resolve<'a>(&self, rig: &'a ModularRig) -> Option<&'a ModuleInstance> {
        rig.find_module(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirector_accepts_local_and_namespaced_connectors() {
        let mut redirector = ConnectionRedirector::new("Spine/Arm");
        redirector.insert(
            &ElementKey::connector("Spine/Arm:parent"),
            ElementKey::bone("Spine:chest"),
        );
        let target = Some(&ElementKey::bone("Spine:chest"));
        assert_eq!(redirector.resolve(&ElementKey::connector("parent")), target);
        assert_eq!(
            redirector.resolve(&ElementKey::connector("Spine/Arm:parent")),
            target
        );
        assert_eq!(redirector.resolve(&ElementKey::bone("parent")), None);
        assert_eq!(redirector.len(), 1);
    }
}
