// ── Composite-key rule index ──

use indexmap::IndexMap;

use crate::model::{QueueAttr, RuleSource, ShapingRule};

/// `_`-prefixed values of `attrs`, in order. An absent attribute
/// contributes a bare `_`.
pub fn index_key(rule: &ShapingRule, attrs: &[QueueAttr]) -> String {
    attrs.iter().fold(String::new(), |mut key, &attr| {
        key.push('_');
        key.push_str(rule.get(attr).unwrap_or_default());
        key
    })
}

/// Rules keyed by the values of a chosen attribute list.
///
/// Two rules with the same key collide: the later one replaces the earlier,
/// which keeps its original position.
#[derive(Debug, Clone)]
pub struct IndexedRuleSet<T> {
    entries: IndexMap<String, T>,
}

impl<T: RuleSource> IndexedRuleSet<T> {
    pub fn build(rules: impl IntoIterator<Item = T>, attrs: &[QueueAttr]) -> Self {
        let mut entries = IndexMap::new();
        for rule in rules {
            entries.insert(index_key(rule.rule(), attrs), rule);
        }
        Self { entries }
    }

    /// Re-key the same rules by another attribute list.
    pub fn reindex(self, attrs: &[QueueAttr]) -> Self {
        Self::build(self.entries.into_values(), attrs)
    }

    /// Entries whose key is absent from `other`.
    pub fn without_keys_of<U>(&self, other: &IndexedRuleSet<U>) -> Self
    where
        T: Clone,
    {
        let entries = self
            .entries
            .iter()
            .filter(|(key, _)| !other.contains_key(key))
            .map(|(key, rule)| (key.clone(), rule.clone()))
            .collect();
        Self { entries }
    }
}

impl<T> IndexedRuleSet<T> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.values()
    }

    pub fn into_values(self) -> Vec<T> {
        self.entries.into_values().collect()
    }
}

impl<T> Default for IndexedRuleSet<T> {
    fn default() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }
}
