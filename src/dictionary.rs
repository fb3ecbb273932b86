//! Bidirectional string <-> label interner.
//!
//! Backs vertex/edge/property labels (spec §3 "Labels are small integers
//! assigned by the string dictionary") and the external loader's `indexes`
//! output (spec §6 "Persisted state").

use crate::ids::Label;
use parking_lot::RwLock;
use std::collections::HashMap;

struct Inner {
    by_name: HashMap<String, Label>,
    by_label: Vec<String>,
}

/// Thread-safe label dictionary. `Label(0)` is reserved as the tombstone
/// sentinel (spec §3 edge-version `label == 0`), so real labels start at 1.
pub struct LabelDictionary {
    inner: RwLock<Inner>,
}

impl LabelDictionary {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                by_name: HashMap::new(),
                by_label: vec!["__tombstone__".to_string()],
            }),
        }
    }

    /// Intern `name`, assigning a fresh label if it hasn't been seen before.
    pub fn intern(&self, name: &str) -> Label {
        if let Some(&label) = self.inner.read().by_name.get(name) {
            return label;
        }
        let mut inner = self.inner.write();
        if let Some(&label) = inner.by_name.get(name) {
            return label;
        }
        let label = inner.by_label.len() as Label;
        inner.by_label.push(name.to_string());
        inner.by_name.insert(name.to_string(), label);
        label
    }

    pub fn name_of(&self, label: Label) -> Option<String> {
        self.inner.read().by_label.get(label as usize).cloned()
    }

    pub fn label_of(&self, name: &str) -> Option<Label> {
        self.inner.read().by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.inner.read().by_label.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LabelDictionary {
    fn default() -> Self {
        Self::new()
    }
}
