//! Type library files (`types.toml`).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};

use crate::library::TypeLibrary;

/// Load and validate a type library from a TOML file.
pub fn load_type_library(path: &Path) -> Result<TypeLibrary> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let library: TypeLibrary =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    let errors = library.validate();
    if !errors.is_empty() {
        return Err(anyhow!(
            "type library {} is invalid: {}",
            path.display(),
            errors.join("; ")
        ));
    }
    Ok(library)
}

/// Write a type library as TOML with a trailing newline.
pub fn write_type_library(path: &Path, library: &TypeLibrary) -> Result<()> {
    let mut buf = toml::to_string_pretty(library).context("serialize type library")?;
    buf.push('\n');
    fs::write(path, buf).with_context(|| format!("write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::RigTypeDef;

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("types.toml");
        let mut library = TypeLibrary::default();
        library.types.insert(
            "Spine".into(),
            RigTypeDef {
                events: vec!["Forwards Solve".into()],
                ..RigTypeDef::default()
            },
        );
        write_type_library(&path, &library).expect("write");
        assert_eq!(load_type_library(&path).expect("load"), library);
    }

    #[test]
    fn invalid_library_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("types.toml");
        fs::write(
            &path,
            "[types.Arm]\nvariables = { count = { type = \"int\", default = \"many\" } }\n",
        )
        .expect("write");
        let err = load_type_library(&path).expect_err("invalid");
        assert!(err.to_string().contains("count"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(load_type_library(&temp.path().join("types.toml")).is_err());
    }
}
