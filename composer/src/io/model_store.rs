//! Model load/save helpers with schema + invariant validation.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use jsonschema::Draft;
use serde_json::Value;

use crate::core::invariants::validate_invariants;
use crate::core::model::ModuleGraphModel;

pub const MODEL_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../schemas/module_model/v1.schema.json"
));

/// Load and validate a model from disk (schema + invariants).
pub fn load_model(model_path: &Path) -> Result<ModuleGraphModel> {
    let contents = fs::read_to_string(model_path)
        .with_context(|| format!("read model {}", model_path.display()))?;
    parse_model(&contents).with_context(|| format!("load model {}", model_path.display()))
}

/// Parse and validate a model document.
pub fn parse_model(raw: &str) -> Result<ModuleGraphModel> {
    let value: Value = serde_json::from_str(raw).context("parse model json")?;
    validate_schema(&value)?;
    let model: ModuleGraphModel =
        serde_json::from_value(value).context("deserialize model as v1 struct")?;
    validate_model_invariants(&model)?;
    Ok(model)
}

/// Write a model as pretty JSON with a trailing newline.
pub fn write_model(model_path: &Path, model: &ModuleGraphModel) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(model).context("serialize model json")?;
    buf.push('\n');
    fs::write(model_path, buf).with_context(|| format!("write model {}", model_path.display()))
}

/// Validate a model document against the embedded JSON Schema (Draft 2020-12).
fn validate_schema(instance: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(MODEL_SCHEMA).context("parse model schema")?;
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .map_err(|err| anyhow!("invalid schema: {err}"))?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        return Err(anyhow!(
            "model schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}

fn validate_model_invariants(model: &ModuleGraphModel) -> Result<()> {
    let errors = validate_invariants(model);
    if errors.is_empty() {
        return Ok(());
    }
    Err(anyhow!("model invariants failed: {}", errors.join("; ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{bind, connect, model_of, module};

    #[test]
    fn load_and_write_model_round_trip() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("rig.json");
        let mut model = model_of(vec![module("Spine", "", "Spine"), module("Arm", "Spine", "Arm")]);
        connect(&mut model, "Spine/Arm:parent", "Spine:chest");
        bind(&mut model, "Spine/Arm", "length", "Spine:length");

        write_model(&path, &model).expect("write model");
        let raw = fs::read_to_string(&path).expect("read");
        assert!(raw.ends_with("}\n"));
        let loaded = load_model(&path).expect("load model");
        assert_eq!(loaded, model);
    }

    #[test]
    fn schema_rejects_unknown_fields_and_kinds() {
        let err = parse_model(r#"{"modules": [{"name": "Spine", "type_id": "Spine", "extra": 1}]}"#)
            .expect_err("unknown field");
        assert!(err.to_string().contains("schema"));

        let err = parse_model(
            r#"{"connections": [{"connector": {"kind": "joint", "name": "a:b"}, "target": {"kind": "bone", "name": "c"}}]}"#,
        )
        .expect_err("unknown kind");
        assert!(err.to_string().contains("schema"));
    }

    #[test]
    fn invariants_reject_missing_parent() {
        let err = parse_model(
            r#"{"modules": [{"name": "Arm", "parent_path": "Spine", "type_id": "Arm"}]}"#,
        )
        .expect_err("missing parent");
        assert!(err.to_string().contains("invariants"));
    }
}
