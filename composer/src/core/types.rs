//! Shared deterministic types for the composition core.
//!
//! These types define stable contracts between the model, the runtime engine
//! and module logic. They carry no I/O and serialize in a stable form.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Well-known event names.
pub mod events {
    /// Builds the hierarchy elements owned by each module.
    pub const CONSTRUCTION: &str = "Construction";
    /// Regular per-frame solve.
    pub const FORWARDS_SOLVE: &str = "Forwards Solve";
    /// Inverse solve used when posing from the outside.
    pub const BACKWARDS_SOLVE: &str = "Backwards Solve";
    /// Emitted while the user manipulates elements; scoped to the touched modules.
    pub const INTERACTION: &str = "Interaction";
    /// Lets a module filter and rank the targets of one of its connectors.
    pub const CONNECTOR: &str = "Connector";

    /// True for events that carry the set of elements being interacted with.
    pub fn is_interaction_scoped(event: &str) -> bool {
        event == INTERACTION
    }
}

/// Kind of a hierarchy element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Bone,
    Null,
    Control,
    Curve,
    Connector,
    Socket,
}

impl ElementKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ElementKind::Bone => "bone",
            ElementKind::Null => "null",
            ElementKind::Control => "control",
            ElementKind::Curve => "curve",
            ElementKind::Connector => "connector",
            ElementKind::Socket => "socket",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bone" => Ok(ElementKind::Bone),
            "null" => Ok(ElementKind::Null),
            "control" => Ok(ElementKind::Control),
            "curve" => Ok(ElementKind::Curve),
            "connector" => Ok(ElementKind::Connector),
            "socket" => Ok(ElementKind::Socket),
            other => Err(format!("unknown element kind '{other}'")),
        }
    }
}

/// Identity of an element in the shared hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ElementKey {
    pub kind: ElementKind,
    pub name: String,
}

impl ElementKey {
    pub fn new(kind: ElementKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    pub fn connector(name: impl Into<String>) -> Self {
        Self::new(ElementKind::Connector, name)
    }

    pub fn bone(name: impl Into<String>) -> Self {
        Self::new(ElementKind::Bone, name)
    }
}

impl fmt::Display for ElementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.name)
    }
}

/// Resolution state of a connector candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolveState {
    Possible,
    Default,
    Invalid,
}

/// One connector candidate, tagged with its resolution state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveMatch {
    pub key: ElementKey,
    pub state: ResolveState,
    /// Human-readable reason, set when the candidate was invalidated.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl ResolveMatch {
    pub fn possible(key: ElementKey) -> Self {
        Self {
            key,
            state: ResolveState::Possible,
            message: String::new(),
        }
    }

    pub fn invalid(key: ElementKey, message: impl Into<String>) -> Self {
        Self {
            key,
            state: ResolveState::Invalid,
            message: message.into(),
        }
    }

    pub fn is_default(&self) -> bool {
        self.state == ResolveState::Default
    }
}

/// Storage type of a public variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    Bool,
    Int,
    Float,
    Name,
    Vector,
}

impl VariableType {
    /// Whether a value stored as `source` can be copied into `self`.
    pub fn accepts(self, source: VariableType) -> bool {
        self == source
    }
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VariableType::Bool => "bool",
            VariableType::Int => "int",
            VariableType::Float => "float",
            VariableType::Name => "name",
            VariableType::Vector => "vector",
        };
        f.write_str(name)
    }
}

/// Value of a public variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Vector([f64; 3]),
    Name(String),
}

impl VariableValue {
    pub fn variable_type(&self) -> VariableType {
        match self {
            VariableValue::Bool(_) => VariableType::Bool,
            VariableValue::Int(_) => VariableType::Int,
            VariableValue::Float(_) => VariableType::Float,
            VariableValue::Vector(_) => VariableType::Vector,
            VariableValue::Name(_) => VariableType::Name,
        }
    }

    /// Zero value for `ty`.
    pub fn default_for(ty: VariableType) -> Self {
        match ty {
            VariableType::Bool => VariableValue::Bool(false),
            VariableType::Int => VariableValue::Int(0),
            VariableType::Float => VariableValue::Float(0.0),
            VariableType::Vector => VariableValue::Vector([0.0; 3]),
            VariableType::Name => VariableValue::Name(String::new()),
        }
    }

    /// Parse a serialized config value (`"true"`, `"3"`, `"0.5"`, `"(1,2,3)"`).
    pub fn parse(ty: VariableType, raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        match ty {
            VariableType::Bool => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(VariableValue::Bool(true)),
                "false" | "0" => Ok(VariableValue::Bool(false)),
                _ => Err(format!("'{raw}' is not a bool")),
            },
            VariableType::Int => trimmed
                .parse()
                .map(VariableValue::Int)
                .map_err(|err| format!("'{raw}' is not an int: {err}")),
            VariableType::Float => trimmed
                .parse()
                .map(VariableValue::Float)
                .map_err(|err| format!("'{raw}' is not a float: {err}")),
            VariableType::Name => Ok(VariableValue::Name(raw.to_string())),
            VariableType::Vector => parse_vector(trimmed)
                .map(VariableValue::Vector)
                .ok_or_else(|| format!("'{raw}' is not a vector (expected (x,y,z))")),
        }
    }
}

fn parse_vector(raw: &str) -> Option<[f64; 3]> {
    let inner = raw.strip_prefix('(')?.strip_suffix(')')?;
    let mut out = [0.0; 3];
    let mut parts = inner.split(',');
    for slot in &mut out {
        *slot = parts.next()?.trim().parse().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(out)
}

impl fmt::Display for VariableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableValue::Bool(value) => write!(f, "{value}"),
            VariableValue::Int(value) => write!(f, "{value}"),
            VariableValue::Float(value) => write!(f, "{value}"),
            VariableValue::Vector([x, y, z]) => write!(f, "({x},{y},{z})"),
            VariableValue::Name(value) => f.write_str(value),
        }
    }
}

/// A typed public variable as exposed by an executable rig.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub ty: VariableType,
    pub value: VariableValue,
}

impl Variable {
    pub fn new(value: VariableValue) -> Self {
        Self {
            ty: value.variable_type(),
            value,
        }
    }
}
