use std::borrow::Borrow;
use std::hash::Hash;
use std::{collections::HashMap, ops::Index, ops::IndexMut};

use serde::de::Error as SerdeError;
use serde::{Deserialize, Serialize};

use crate::is_debug;

pub trait KeyIndexKey<K> {
    fn key(&self) -> &K;
}

/// Vector that keeps insertion order while resolving items by key.
#[derive(Debug, Clone)]
pub struct KeyIndexVec<K: Clone + Eq + Hash, V: KeyIndexKey<K>> {
    items: Vec<V>,
    idx_by_key: HashMap<K, usize>,
}

impl<K, V> Default for KeyIndexVec<K, V>
where
    K: Clone + Eq + Hash,
    V: KeyIndexKey<K>,
{
    fn default() -> Self {
        Self {
            items: Vec::new(),
            idx_by_key: HashMap::new(),
        }
    }
}

impl<K, V> KeyIndexVec<K, V>
where
    K: Clone + Eq + Hash,
    V: KeyIndexKey<K>,
{
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            idx_by_key: HashMap::with_capacity(capacity),
        }
    }

    /// Replaces an existing item with the same key in place, keeping its position.
    pub fn push(&mut self, v: V) -> usize {
        match self.idx_by_key.get(v.key()).copied() {
            Some(idx) => {
                self.items[idx] = v;
                idx
            }
            None => {
                let idx = self.items.len();
                self.idx_by_key.insert(v.key().clone(), idx);
                self.items.push(v);
                idx
            }
        }
    }

    pub fn insert_with(&mut self, key: &K, create: impl FnOnce() -> V) -> usize {
        if let Some(idx) = self.idx_by_key.get(key).copied() {
            return idx;
        }

        let value = create();
        assert!(value.key() == key);
        self.push(value)
    }

    pub fn remove_by_key<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = self.idx_by_key.remove(key)?;
        let removed = self.items.remove(idx);

        for (pos, item) in self.items.iter().enumerate().skip(idx) {
            self.idx_by_key.insert(item.key().clone(), pos);
        }

        Some(removed)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, V> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, V> {
        self.items.iter_mut()
    }

    pub fn len(&self) -> usize {
        assert_eq!(self.items.len(), self.idx_by_key.len());
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        assert_eq!(self.items.len(), self.idx_by_key.len());
        self.items.is_empty()
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.idx_by_key.contains_key(key)
    }

    pub fn index_of_key<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.idx_by_key.get(key).copied()
    }

    pub fn by_key<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index_of_key(key).map(|idx| &self.items[idx])
    }

    pub fn by_key_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = self.index_of_key(key)?;
        Some(&mut self.items[idx])
    }

    pub fn validate(&self) {
        if !is_debug() {
            return;
        }

        assert_eq!(self.items.len(), self.idx_by_key.len());
        for (idx, v) in self.items.iter().enumerate() {
            assert_eq!(Some(idx), self.index_of_key(v.key()));
        }
    }
}

impl<K, V> Index<usize> for KeyIndexVec<K, V>
where
    K: Clone + Eq + Hash,
    V: KeyIndexKey<K>,
{
    type Output = V;

    fn index(&self, idx: usize) -> &Self::Output {
        assert!(idx < self.items.len());
        &self.items[idx]
    }
}

impl<K, V> IndexMut<usize> for KeyIndexVec<K, V>
where
    K: Clone + Eq + Hash,
    V: KeyIndexKey<K>,
{
    fn index_mut(&mut self, idx: usize) -> &mut Self::Output {
        assert!(idx < self.items.len());
        &mut self.items[idx]
    }
}

impl<'a, K, V> IntoIterator for &'a KeyIndexVec<K, V>
where
    K: Clone + Eq + Hash,
    V: KeyIndexKey<K>,
{
    type Item = &'a V;
    type IntoIter = std::slice::Iter<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<K, V> Serialize for KeyIndexVec<K, V>
where
    K: Clone + Eq + Hash,
    V: KeyIndexKey<K> + Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.items.serialize(serializer)
    }
}

impl<'de, K, V> Deserialize<'de> for KeyIndexVec<K, V>
where
    K: Clone + Eq + Hash,
    V: KeyIndexKey<K> + Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let items: Vec<V> = Vec::deserialize(deserializer)?;
        let mut idx_by_key = HashMap::with_capacity(items.len());
        for (idx, item) in items.iter().enumerate() {
            if idx_by_key.insert(item.key().clone(), idx).is_some() {
                return Err(SerdeError::custom("Duplicate key in KeyIndexVec"));
            }
        }

        Ok(Self { items, idx_by_key })
    }
}
