//! Candidate bookkeeping for connector resolution.
//!
//! Order of `matches` is owned by the caller: discarding preserves the
//! relative order of the survivors and promoting a default never reorders.

use serde::Serialize;

use crate::core::types::{ElementKey, ResolveMatch, ResolveState};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConnectorResolveState {
    /// Connector being resolved, relative to the owning module's namespace.
    pub connector: Option<ElementKey>,
    pub matches: Vec<ResolveMatch>,
    pub excluded: Vec<ResolveMatch>,
}

impl ConnectorResolveState {
    pub fn new(connector: ElementKey, candidates: Vec<ResolveMatch>) -> Self {
        Self {
            connector: Some(connector),
            matches: candidates,
            excluded: Vec::new(),
        }
    }

    /// Move every match whose key is in `keys` to `excluded`, tagged with `reason`.
    ///
    /// Keys that are not (or no longer) among the matches are ignored, so
    /// repeating a discard changes nothing. Returns how many matches moved.
    pub fn discard_matches(&mut self, keys: &[ElementKey], reason: &str) -> usize {
        let before = self.matches.len();
        let (discarded, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.matches)
            .into_iter()
            .partition(|candidate| keys.contains(&candidate.key));
        self.matches = kept;
        self.excluded.extend(
            discarded
                .into_iter()
                .map(|candidate| ResolveMatch::invalid(candidate.key, reason)),
        );
        before - self.matches.len()
    }

    /// Promote `key` to the single default match, demoting any previous default.
    pub fn set_default_match(&mut self, key: &ElementKey) -> Result<(), String> {
        if !self.matches.iter().any(|candidate| &candidate.key == key) {
            return Err(format!("{key} is not among the current matches"));
        }
        for candidate in &mut self.matches {
            if &candidate.key == key {
                candidate.state = ResolveState::Default;
            } else if candidate.state == ResolveState::Default {
                candidate.state = ResolveState::Possible;
            }
        }
        Ok(())
    }

    pub fn default_match(&self) -> Option<&ResolveMatch> {
        self.matches.iter().find(|candidate| candidate.is_default())
    }
}

/// Move the default match (if any) to the front, keeping the rest in order.
pub fn move_default_to_front(matches: &mut Vec<ResolveMatch>) {
    if let Some(idx) = matches.iter().position(ResolveMatch::is_default) {
        let default = matches.remove(idx);
        matches.insert(0, default);
    }
}
