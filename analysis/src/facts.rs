use std::borrow::Borrow;
use std::collections::BTreeMap;

/// Facts proven about symbols during one analysis session.
///
/// The store is write-once per key: the first export for a symbol wins and
/// every later export for the same symbol is a no-op. This makes exporting
/// idempotent, and the order in which dependent compilation units import
/// the facts does not matter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FactStore<K: Ord, V> {
    facts: BTreeMap<K, V>,
}

impl<K: Ord, V> Default for FactStore<K, V> {
    fn default() -> Self {
        Self {
            facts: BTreeMap::new(),
        }
    }
}

impl<K: Ord, V> FactStore<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the fact was recorded, false when a fact for the
    /// key already existed.
    pub fn export(&mut self, key: K, value: V) -> bool {
        if self.facts.contains_key(&key) {
            return false;
        }
        self.facts.insert(key, value);
        true
    }

    pub fn import<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.facts.get(key)
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Iterate over the facts ordered by key.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.facts.iter()
    }
}
