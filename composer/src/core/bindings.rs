//! Variable binding expressions and compatibility checks.

use std::fmt;

use thiserror::Error;

use crate::core::namespace::{NAMESPACE_SEPARATOR, split_binding_source};
use crate::core::types::{Variable, VariableType};

/// Parsed `module/path:variable` (or bare `variable`) binding source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingExpr {
    /// Empty when the source is the host rig.
    pub source_path: String,
    pub variable: String,
}

impl BindingExpr {
    pub fn parse(expr: &str) -> Result<Self, String> {
        let expr = expr.trim();
        if expr.is_empty() {
            return Err("binding expression is empty".to_string());
        }
        let (source_path, variable) = split_binding_source(expr);
        if variable.trim().is_empty() {
            return Err(format!("binding '{expr}' names no variable"));
        }
        if expr.starts_with(NAMESPACE_SEPARATOR) {
            return Err(format!("binding '{expr}' names no source module"));
        }
        Ok(Self {
            source_path: source_path.to_string(),
            variable: variable.to_string(),
        })
    }

    pub fn is_host(&self) -> bool {
        self.source_path.is_empty()
    }
}

impl fmt::Display for BindingExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_host() {
            return f.write_str(&self.variable);
        }
        write!(f, "{}{NAMESPACE_SEPARATOR}{}", self.source_path, self.variable)
    }
}

/// Why a single binding entry could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingFailure {
    #[error("{0}")]
    Malformed(String),
    #[error("module has no public variable '{variable}'")]
    MissingTarget { variable: String },
    #[error("source module '{path}' has no instance")]
    MissingSourceModule { path: String },
    #[error("source variable '{expr}' does not exist")]
    MissingSource { expr: String },
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: VariableType, found: VariableType },
}

/// Check that `source` can feed `target`.
pub fn check_compatibility(
    target: &Variable,
    source: Option<&Variable>,
    expr: &BindingExpr,
) -> Result<(), BindingFailure> {
    let Some(source) = source else {
        return Err(BindingFailure::MissingSource {
            expr: expr.to_string(),
        });
    };
    if !target.ty.accepts(source.ty) {
        return Err(BindingFailure::TypeMismatch {
            expected: target.ty,
            found: source.ty,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::VariableValue;

    #[test]
    fn parse_module_and_host_sources() {
        let module = BindingExpr::parse("Root/Child:speed").expect("parse");
        assert_eq!(module.source_path, "Root/Child");
        assert_eq!(module.variable, "speed");
        assert!(!module.is_host());

        let host = BindingExpr::parse("speed").expect("parse");
        assert!(host.is_host());
        assert_eq!(host.to_string(), "speed");
    }

    #[test]
    fn rejects_malformed_expressions() {
        assert!(BindingExpr::parse("  ").is_err());
        assert!(BindingExpr::parse("Root:").is_err());
        assert!(BindingExpr::parse(":speed").is_err());
    }

    #[test]
    fn compatibility_requires_matching_types() {
        let expr = BindingExpr::parse("Root:speed").expect("parse");
        let target = Variable::new(VariableValue::Float(0.0));
        let int_source = Variable::new(VariableValue::Int(3));
        assert_eq!(
            check_compatibility(&target, Some(&int_source), &expr),
            Err(BindingFailure::TypeMismatch {
                expected: VariableType::Float,
                found: VariableType::Int,
            })
        );
        assert!(matches!(
            check_compatibility(&target, None, &expr),
            Err(BindingFailure::MissingSource { .. })
        ));
        let float_source = Variable::new(VariableValue::Float(1.5));
        assert_eq!(check_compatibility(&target, Some(&float_source), &expr), Ok(()));
    }

    #[test]
    fn failures_describe_the_broken_entry() {
        let mismatch = BindingFailure::TypeMismatch {
            expected: VariableType::Float,
            found: VariableType::Int,
        };
        assert_eq!(mismatch.to_string(), "type mismatch: expected float, found int");
        let missing = BindingFailure::MissingSourceModule {
            path: "Root/Gone".to_string(),
        };
        assert_eq!(missing.to_string(), "source module 'Root/Gone' has no instance");
    }
}
