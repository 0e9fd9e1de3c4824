//! Recoverable problems reported by the engine.
//!
//! Nothing in the engine aborts on bad input: clashing modules, unknown types,
//! broken bindings and protocol misuse are recorded as [`Diagnostic`]s and the
//! offending item is skipped.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(label)
    }
}

/// What went wrong, grouped by the failure classes the engine recovers from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A sibling with the same name was registered first.
    NameClash,
    /// The factory does not know the module's type.
    UnresolvedType,
    /// The type exists but cannot be composed as a module.
    NotAModule,
    /// The parent module produced no instance.
    OrphanedModule,
    /// A config value could not be applied.
    ConfigValue,
    /// A variable binding source is missing or has the wrong type.
    BindingFailed,
    /// A resolution operation was used outside its event, or named an absent match.
    ProtocolMisuse,
    /// A rig refused to reinitialize before execution.
    Reinitialization,
    /// A stale rig was detached or reclaimed.
    Reclamation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    /// Module path, binding or element the diagnostic is about.
    pub subject: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(
        severity: Severity,
        kind: DiagnosticKind,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            kind,
            subject: subject.into(),
            message: message.into(),
        }
    }

    pub fn warning(
        kind: DiagnosticKind,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(Severity::Warning, kind, subject, message)
    }

    pub fn error(
        kind: DiagnosticKind,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(Severity::Error, kind, subject, message)
    }

    pub fn info(
        kind: DiagnosticKind,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(Severity::Info, kind, subject, message)
    }

    /// True for warnings and errors, which degrade a run.
    pub fn is_problem(&self) -> bool {
        self.severity >= Severity::Warning
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{:?}] {}: {}",
            self.severity, self.kind, self.subject, self.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_is_not_a_problem() {
        let info = Diagnostic::info(DiagnosticKind::Reclamation, "Arm", "reclaimed");
        let warning = Diagnostic::warning(DiagnosticKind::NameClash, "Arm", "clash");
        assert!(!info.is_problem());
        assert!(warning.is_problem());
    }

    #[test]
    fn display_includes_subject_and_kind() {
        let diagnostic =
            Diagnostic::error(DiagnosticKind::BindingFailed, "Root/Child", "missing source");
        assert_eq!(
            diagnostic.to_string(),
            "error [BindingFailed] Root/Child: missing source"
        );
    }
}
