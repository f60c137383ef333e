//! Insertion-ordered map keyed by component name.

use std::collections::HashMap;

/// A name-keyed map that iterates in first-insertion order.
///
/// Replacing an existing key keeps its original position, which is how
/// declaration order survives re-registration.
pub(crate) struct NamedMap<V> {
    entries: Vec<(String, V)>,
    index: HashMap<String, usize>,
}

impl<V> Default for NamedMap<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<V> NamedMap<V> {
    /// Inserts or replaces, returning the replaced value.
    pub(crate) fn insert(&mut self, name: String, value: V) -> Option<V> {
        match self.index.get(&name) {
            Some(&pos) => Some(std::mem::replace(&mut self.entries[pos].1, value)),
            None => {
                self.index.insert(name.clone(), self.entries.len());
                self.entries.push((name, value));
                None
            }
        }
    }

    pub(crate) fn get(&self, name: &str) -> Option<&V> {
        self.index.get(name).map(|&pos| &self.entries[pos].1)
    }

    /// Returns the value for `name`, inserting a default first if absent.
    pub(crate) fn get_or_default(&mut self, name: &str) -> &mut V
    where
        V: Default,
    {
        let pos = match self.index.get(name) {
            Some(&pos) => pos,
            None => {
                self.index.insert(name.to_string(), self.entries.len());
                self.entries.push((name.to_string(), V::default()));
                self.entries.len() - 1
            }
        };
        &mut self.entries[pos].1
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
