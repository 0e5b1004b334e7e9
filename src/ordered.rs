//! Insertion-ordered sets.
//!
//! Generated tables and error messages must come out identical across runs,
//! so every set in the generator iterates in insertion order. Two variants
//! exist: a mutable [`OrderedSet`] and a hashable [`OrderedFrozenSet`]. Both
//! compare equal by content, ignoring order; the frozen variant also hashes
//! by content, so permutations of the same elements collide as map keys.

use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
};

use indexmap::IndexSet;

/// A mutable set that iterates in insertion order.
#[derive(Debug, Clone)]
pub struct OrderedSet<V: Eq + Hash> {
    /// The underlying index set
    items: IndexSet<V>,
}

impl<V: Eq + Hash> Default for OrderedSet<V> {
    fn default() -> Self {
        Self {
            items: IndexSet::new(),
        }
    }
}

impl<V: Eq + Hash + Clone> OrderedSet<V> {
    /// Create an empty set.
    pub fn new() -> Self {
        Self {
            items: IndexSet::new(),
        }
    }

    /// Insert a value, keeping its position if already present. Returns true
    /// if the value was not in the set.
    pub fn insert(&mut self, value: V) -> bool {
        self.items.insert(value)
    }

    /// Remove a value, preserving the order of the remaining elements.
    /// Returns true if the value was present.
    pub fn remove(&mut self, value: &V) -> bool {
        self.items.shift_remove(value)
    }

    /// Whether the value is in the set.
    pub fn contains(&self, value: &V) -> bool {
        self.items.contains(value)
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the set has no elements.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &V> {
        self.items.iter()
    }

    /// Convert into the frozen variant, preserving order.
    pub fn freeze(self) -> OrderedFrozenSet<V> {
        OrderedFrozenSet { items: self.items }
    }
}

impl<V: Eq + Hash> PartialEq for OrderedSet<V> {
    fn eq(&self, other: &Self) -> bool {
        // IndexSet equality is content equality, order ignored.
        self.items == other.items
    }
}

impl<V: Eq + Hash> Eq for OrderedSet<V> {}

impl<V: Eq + Hash> FromIterator<V> for OrderedSet<V> {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<V: Eq + Hash> Extend<V> for OrderedSet<V> {
    fn extend<I: IntoIterator<Item = V>>(&mut self, iter: I) {
        self.items.extend(iter)
    }
}

impl<V: Eq + Hash> IntoIterator for OrderedSet<V> {
    type Item = V;
    type IntoIter = indexmap::set::IntoIter<V>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, V: Eq + Hash> IntoIterator for &'a OrderedSet<V> {
    type Item = &'a V;
    type IntoIter = indexmap::set::Iter<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// An immutable set that iterates in insertion order and hashes by content.
///
/// `IndexSet` itself does not implement `Hash`; this wrapper combines the
/// element hashes order-independently so that equal sets hash equally no
/// matter how they were built.
#[derive(Debug, Clone)]
pub struct OrderedFrozenSet<V: Eq + Hash> {
    /// The underlying index set
    items: IndexSet<V>,
}

impl<V: Eq + Hash> Default for OrderedFrozenSet<V> {
    fn default() -> Self {
        Self {
            items: IndexSet::new(),
        }
    }
}

impl<V: Eq + Hash + Clone> OrderedFrozenSet<V> {
    /// Create an empty frozen set.
    pub fn new() -> Self {
        Self {
            items: IndexSet::new(),
        }
    }

    /// Whether the value is in the set.
    pub fn contains(&self, value: &V) -> bool {
        self.items.contains(value)
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the set has no elements.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &V> {
        self.items.iter()
    }

    /// Union, ordered as self's elements followed by other's new elements.
    pub fn union(&self, other: &Self) -> Self {
        let mut items = self.items.clone();
        items.extend(other.items.iter().cloned());
        Self { items }
    }

    /// Difference, keeping self's order.
    pub fn difference(&self, other: &Self) -> Self {
        self.iter()
            .filter(|v| !other.contains(v))
            .cloned()
            .collect()
    }

    /// Intersection, keeping self's order.
    pub fn intersection(&self, other: &Self) -> Self {
        self.iter().filter(|v| other.contains(v)).cloned().collect()
    }

    /// A copy of this set with one value removed, order preserved.
    pub fn without(&self, value: &V) -> Self {
        self.iter().filter(|v| *v != value).cloned().collect()
    }

    /// Whether every element of self is in other.
    pub fn is_subset(&self, other: &Self) -> bool {
        self.iter().all(|v| other.contains(v))
    }

    /// Convert into the mutable variant, preserving order.
    pub fn thaw(&self) -> OrderedSet<V> {
        OrderedSet {
            items: self.items.clone(),
        }
    }
}

impl<V: Eq + Hash> PartialEq for OrderedFrozenSet<V> {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl<V: Eq + Hash> Eq for OrderedFrozenSet<V> {}

impl<V: Eq + Hash> Hash for OrderedFrozenSet<V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // XOR of per-element hashes, so order cannot matter.
        let mut combined: u64 = 0;
        for v in &self.items {
            let mut h = DefaultHasher::new();
            v.hash(&mut h);
            combined ^= h.finish();
        }
        state.write_usize(self.items.len());
        state.write_u64(combined);
    }
}

impl<V: Eq + Hash> FromIterator<V> for OrderedFrozenSet<V> {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<V: Eq + Hash> IntoIterator for OrderedFrozenSet<V> {
    type Item = V;
    type IntoIter = indexmap::set::IntoIter<V>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, V: Eq + Hash> IntoIterator for &'a OrderedFrozenSet<V> {
    type Item = &'a V;
    type IntoIter = indexmap::set::Iter<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
