//! Shortest unique display names for hierarchy elements.
//!
//! The cache is built in one pass over a fixed key set and is never patched;
//! callers drop and rebuild it when modules or elements change.

use std::collections::HashMap;

use crate::core::hierarchy::ElementHierarchy;
use crate::core::namespace::join_namespace;
use crate::core::types::ElementKey;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayPaths {
    /// `module:name`, using the module's display name.
    pub namespaced: String,
    /// The bare name when unique, else the namespaced one.
    pub shortest: String,
}

#[derive(Debug, Clone, Default)]
pub struct DisplayPathCache {
    entries: HashMap<ElementKey, DisplayPaths>,
}

impl DisplayPathCache {
    /// Build display paths for `keys`. `module_display_name` maps a module
    /// path to its display name; unknown modules fall back to the path.
    pub fn build<'a>(
        keys: impl IntoIterator<Item = &'a ElementKey>,
        hierarchy: &ElementHierarchy,
        module_display_name: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let mut unique_keys: Vec<ElementKey> = Vec::new();
        for key in keys {
            if !unique_keys.contains(key) {
                unique_keys.push(key.clone());
            }
        }

        let bare: Vec<String> = unique_keys
            .iter()
            .map(|key| hierarchy.desired_name(key).to_string())
            .collect();
        let mut namespaced: Vec<String> = unique_keys
            .iter()
            .zip(&bare)
            .map(|(key, bare)| match hierarchy.module_path_of(key) {
                Some(path) => {
                    let module = module_display_name(&path).unwrap_or(path);
                    join_namespace(&module, bare)
                }
                None => key.name.clone(),
            })
            .collect();
        make_unique(&unique_keys, &mut namespaced, |key| key.name.clone());
        make_unique(&unique_keys, &mut namespaced, ElementKey::to_string);

        let bare_counts = count(&bare);
        let mut shortest: Vec<String> = bare
            .iter()
            .zip(&namespaced)
            .map(|(bare, namespaced)| {
                if bare_counts.get(bare.as_str()) == Some(&1) {
                    bare.clone()
                } else {
                    namespaced.clone()
                }
            })
            .collect();
        make_unique(&unique_keys, &mut shortest, ElementKey::to_string);

        let entries = unique_keys
            .into_iter()
            .zip(namespaced.into_iter().zip(shortest))
            .map(|(key, (namespaced, shortest))| {
                (
                    key,
                    DisplayPaths {
                        namespaced,
                        shortest,
                    },
                )
            })
            .collect();
        Self { entries }
    }

    pub fn get(&self, key: &ElementKey) -> Option<&DisplayPaths> {
        self.entries.get(key)
    }

    pub fn display_path(&self, key: &ElementKey, always_show_namespace: bool) -> Option<&str> {
        self.get(key).map(|paths| {
            if always_show_namespace {
                paths.namespaced.as_str()
            } else {
                paths.shortest.as_str()
            }
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn count(values: &[String]) -> HashMap<&str, usize> {
    let mut counts = HashMap::new();
    for value in values {
        *counts.entry(value.as_str()).or_insert(0) += 1;
    }
    counts
}

/// Replace colliding values with `fallback(key)` until every value is unique
/// or no replacement changes anything.
fn make_unique(
    keys: &[ElementKey],
    values: &mut [String],
    fallback: impl Fn(&ElementKey) -> String,
) {
    loop {
        let colliding: Vec<usize> = {
            let counts = count(values);
            (0..values.len())
                .filter(|idx| counts.get(values[*idx].as_str()).is_some_and(|n| *n > 1))
                .filter(|idx| values[*idx] != fallback(&keys[*idx]))
                .collect()
        };
        if colliding.is_empty() {
            return;
        }
        for idx in colliding {
            values[idx] = fallback(&keys[idx]);
        }
    }
}
