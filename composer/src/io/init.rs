//! Scaffolding for a composer workspace.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::config::{ComposerConfig, write_config};
use super::model_store::write_model;
use crate::core::model::{Connection, ModuleGraphModel, ModuleReference};
use crate::core::types::ElementKey;

const SAMPLE_TYPES: &str = r#"# Declarative rig types used by `composer tree`, `run` and `resolve`.

[types.Spine]
events = ["Forwards Solve"]
variables = { length = { type = "float", default = "1.0" } }
connectors = [{ name = "root", primary = true, prefer = "world" }]
elements = [
    { kind = "bone", name = "pelvis", parent = { kind = "connector", name = "root" } },
    { kind = "bone", name = "chest", parent = { kind = "bone", name = "pelvis" } },
]

[types.Arm]
events = ["Forwards Solve", "Interaction"]
variables = { length = { type = "float", default = "0.5" } }
connectors = [{ name = "parent", primary = true, prefer = "chest", reject_kinds = ["control"] }]
elements = [
    { kind = "bone", name = "upper", parent = { kind = "connector", name = "parent" } },
    { kind = "control", name = "ik", parent = { kind = "bone", name = "upper" } },
]
"#;

/// Canonical file locations of a composer workspace.
#[derive(Debug, Clone)]
pub struct ComposerPaths {
    pub root: PathBuf,
    pub config_path: PathBuf,
    pub model_path: PathBuf,
    pub types_path: PathBuf,
}

impl ComposerPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            config_path: root.join("composer.toml"),
            model_path: root.join("rig.json"),
            types_path: root.join("types.toml"),
            root,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InitOptions {
    /// Overwrite existing files.
    pub force: bool,
}

/// Sample model: a spine with one arm wired to its chest.
pub fn sample_model() -> ModuleGraphModel {
    let mut arm = ModuleReference::new("Arm", "Spine", "Arm");
    arm.bindings
        .insert("length".to_string(), "Spine:length".to_string());
    ModuleGraphModel {
        modules: vec![ModuleReference::new("Spine", "", "Spine"), arm],
        connections: vec![Connection {
            connector: ElementKey::connector("Spine/Arm:parent"),
            target: ElementKey::bone("Spine:chest"),
        }],
    }
}

/// Create `composer.toml`, `rig.json` and `types.toml` under `root` if missing.
pub fn init_workspace(root: &Path, options: &InitOptions) -> Result<ComposerPaths> {
    let paths = ComposerPaths::new(root);
    fs::create_dir_all(&paths.root)
        .with_context(|| format!("create directory {}", paths.root.display()))?;

    if options.force || !paths.config_path.exists() {
        write_config(&paths.config_path, &ComposerConfig::default())?;
    }
    if options.force || !paths.model_path.exists() {
        write_model(&paths.model_path, &sample_model())?;
    }
    write_if_missing_or_force(&paths.types_path, SAMPLE_TYPES, options.force)?;
    Ok(paths)
}

fn write_if_missing_or_force(path: &Path, contents: &str, force: bool) -> Result<()> {
    if !force && path.exists() {
        return Ok(());
    }
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::config::load_config;
    use crate::io::model_store::load_model;
    use crate::io::type_library::load_type_library;

    #[test]
    fn init_creates_loadable_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = init_workspace(temp.path(), &InitOptions::default()).expect("init");

        load_config(&paths.config_path).expect("config");
        assert_eq!(load_model(&paths.model_path).expect("model"), sample_model());
        let library = load_type_library(&paths.types_path).expect("types");
        assert!(library.types.contains_key("Arm"));
    }

    #[test]
    fn init_keeps_existing_files_unless_forced() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = ComposerPaths::new(temp.path());
        fs::write(&paths.types_path, "# mine\n").expect("write");

        init_workspace(temp.path(), &InitOptions { force: false }).expect("init");
        assert_eq!(fs::read_to_string(&paths.types_path).expect("read"), "# mine\n");

        init_workspace(temp.path(), &InitOptions { force: true }).expect("init");
        assert_eq!(
            fs::read_to_string(&paths.types_path).expect("read"),
            SAMPLE_TYPES
        );
    }
}
