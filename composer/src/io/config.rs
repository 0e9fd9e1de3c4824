//! Composer configuration stored in `composer.toml`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::types::{Variable, events};
use crate::engine::EngineSettings;
use crate::library::VariableDef;

/// Composer configuration (TOML).
///
/// Edited by humans; missing fields fall back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ComposerConfig {
    pub frames_per_second: f64,

    /// Seconds per evaluated frame.
    pub delta_time: f64,

    /// Report sibling name clashes as warnings instead of info.
    pub report_name_clashes: bool,

    /// Reclaim discarded rigs at the end of every rebuild.
    pub reclaim_on_rebuild: bool,

    /// Event that spawns module elements.
    pub construction_event: String,

    /// Events run in order by `composer run` when none are given.
    pub evaluate_events: Vec<String>,

    /// Variables of the host rig, usable as bare binding sources.
    pub host_variables: BTreeMap<String, VariableDef>,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        let settings = EngineSettings::default();
        Self {
            frames_per_second: settings.frames_per_second,
            delta_time: settings.delta_time,
            report_name_clashes: settings.report_name_clashes,
            reclaim_on_rebuild: settings.reclaim_on_rebuild,
            construction_event: settings.construction_event,
            evaluate_events: vec![
                events::CONSTRUCTION.to_string(),
                events::FORWARDS_SOLVE.to_string(),
            ],
            host_variables: BTreeMap::new(),
        }
    }
}

impl ComposerConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.frames_per_second.is_finite() && self.frames_per_second > 0.0) {
            return Err(anyhow!("frames_per_second must be > 0"));
        }
        if !(self.delta_time.is_finite() && self.delta_time >= 0.0) {
            return Err(anyhow!("delta_time must be >= 0"));
        }
        if self.construction_event.trim().is_empty() {
            return Err(anyhow!("construction_event must be non-empty"));
        }
        if self.evaluate_events.iter().any(|event| event.trim().is_empty()) {
            return Err(anyhow!("evaluate_events must not contain empty names"));
        }
        for (name, def) in &self.host_variables {
            def.default_value()
                .map_err(|err| anyhow!("host_variables.{name}: {err}"))?;
        }
        Ok(())
    }

    /// Engine settings derived from this config.
    pub fn engine_settings(&self) -> EngineSettings {
        let host_variables = self
            .host_variables
            .iter()
            .filter_map(|(name, def)| {
                def.default_value()
                    .ok()
                    .map(|value| (name.clone(), Variable::new(value)))
            })
            .collect();
        EngineSettings {
            frames_per_second: self.frames_per_second,
            delta_time: self.delta_time,
            report_name_clashes: self.report_name_clashes,
            reclaim_on_rebuild: self.reclaim_on_rebuild,
            construction_event: self.construction_event.clone(),
            host_variables,
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `ComposerConfig::default()`.
pub fn load_config(path: &Path) -> Result<ComposerConfig> {
    if !path.exists() {
        let cfg = ComposerConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: ComposerConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &ComposerConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
