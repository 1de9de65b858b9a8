//! Least-recently-used map.
//!
//! Nodes live in a slab (`Vec`) and are threaded into a doubly-linked access
//! list by index; a `HashMap` maps keys to slab slots. Lookups, inserts,
//! promotions and evictions are all O(1).

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug)]
struct Node<K, V> {
    key: K,
    value: V,
    /// Towards the most recently used end.
    prev: Option<usize>,
    /// Towards the least recently used end.
    next: Option<usize>,
}

/// A bounded map that evicts its least-recently-used entry when full.
#[derive(Debug)]
pub struct LruMap<K, V> {
    index: HashMap<K, usize>,
    nodes: Vec<Option<Node<K, V>>>,
    free: Vec<usize>,
    /// Most recently used.
    head: Option<usize>,
    /// Least recently used.
    tail: Option<usize>,
    capacity: usize,
}

impl<K: Hash + Eq + Clone, V> LruMap<K, V> {
    /// Create a map holding at most `capacity` entries (minimum one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            index: HashMap::with_capacity(capacity.min(4096)),
            nodes: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            capacity,
        }
    }

    /// Maximum number of entries.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of entries.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the map is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Whether the map is at capacity.
    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.index.len() >= self.capacity
    }

    /// Check for a key without touching access order.
    #[must_use]
    pub fn has<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.contains_key(key)
    }

    /// Get a value and mark it most recently used.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = *self.index.get(key)?;
        self.touch(idx);
        self.nodes[idx].as_ref().map(|n| &n.value)
    }

    /// Get a mutable value and mark it most recently used.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = *self.index.get(key)?;
        self.touch(idx);
        self.nodes[idx].as_mut().map(|n| &mut n.value)
    }

    /// Get a value without changing access order.
    #[must_use]
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = *self.index.get(key)?;
        self.nodes[idx].as_ref().map(|n| &n.value)
    }

    /// Get a mutable value without changing access order.
    pub fn peek_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = *self.index.get(key)?;
        self.nodes[idx].as_mut().map(|n| &mut n.value)
    }

    /// Insert or replace a value, marking it most recently used.
    ///
    /// Returns the entry evicted to make room, if any. Replacing an existing
    /// key never evicts.
    pub fn set(&mut self, key: K, value: V) -> Option<(K, V)> {
        if let Some(&idx) = self.index.get(&key) {
            if let Some(node) = self.nodes[idx].as_mut() {
                node.value = value;
            }
            self.touch(idx);
            return None;
        }

        let evicted = if self.index.len() >= self.capacity {
            self.evict_lru()
        } else {
            None
        };

        let node = Node {
            key: key.clone(),
            value,
            prev: None,
            next: None,
        };
        let idx = match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = Some(node);
                idx
            },
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            },
        };
        self.push_front(idx);
        self.index.insert(key, idx);

        evicted
    }

    /// Remove an entry.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = self.index.remove(key)?;
        self.unlink(idx);
        let node = self.nodes[idx].take()?;
        self.free.push(idx);
        Some(node.value)
    }

    /// Remove and return the least-recently-used entry.
    pub fn evict_lru(&mut self) -> Option<(K, V)> {
        let idx = self.tail?;
        self.unlink(idx);
        let node = self.nodes[idx].take()?;
        self.index.remove(&node.key);
        self.free.push(idx);
        Some((node.key, node.value))
    }

    /// Peek at the least-recently-used entry.
    #[must_use]
    pub fn peek_lru(&self) -> Option<(&K, &V)> {
        let idx = self.tail?;
        self.nodes[idx].as_ref().map(|n| (&n.key, &n.value))
    }

    /// Iterate from least to most recently used.
    pub fn iter(&self) -> LruIter<'_, K, V> {
        LruIter {
            map: self,
            cursor: self.tail,
        }
    }

    /// Keys from least to most recently used.
    #[must_use]
    pub fn keys(&self) -> Vec<K> {
        self.iter().map(|(k, _)| k.clone()).collect()
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.index.clear();
        self.nodes.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
    }

    fn touch(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return;
        }
        self.unlink(idx);
        self.push_front(idx);
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = match self.nodes[idx].as_ref() {
            Some(node) => (node.prev, node.next),
            None => return,
        };

        match prev {
            Some(p) => {
                if let Some(node) = self.nodes[p].as_mut() {
                    node.next = next;
                }
            },
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(node) = self.nodes[n].as_mut() {
                    node.prev = prev;
                }
            },
            None => self.tail = prev,
        }

        if let Some(node) = self.nodes[idx].as_mut() {
            node.prev = None;
            node.next = None;
        }
    }

    fn push_front(&mut self, idx: usize) {
        let old_head = self.head;
        if let Some(node) = self.nodes[idx].as_mut() {
            node.prev = None;
            node.next = old_head;
        }
        if let Some(h) = old_head {
            if let Some(node) = self.nodes[h].as_mut() {
                node.prev = Some(idx);
            }
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }
}

/// Iterator over an [`LruMap`] from least to most recently used.
#[derive(Debug)]
pub struct LruIter<'a, K, V> {
    map: &'a LruMap<K, V>,
    cursor: Option<usize>,
}

impl<'a, K, V> Iterator for LruIter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.cursor?;
        let node = self.map.nodes[idx].as_ref()?;
        self.cursor = node.prev;
        Some((&node.key, &node.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_first_inserted() {
        let mut map = LruMap::new(3);
        assert!(map.set("a", 1).is_none());
        assert!(map.set("b", 2).is_none());
        assert!(map.set("c", 3).is_none());

        let evicted = map.set("d", 4);
        assert_eq!(evicted, Some(("a", 1)));
        assert!(!map.has("a"));
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn test_get_protects_from_eviction() {
        let mut map = LruMap::new(3);
        map.set("a", 1);
        map.set("b", 2);
        map.set("c", 3);

        assert_eq!(map.get("a"), Some(&1));
        let evicted = map.set("d", 4);
        assert_eq!(evicted, Some(("b", 2)));
        assert!(map.has("a"));
    }

    #[test]
    fn test_peek_does_not_touch() {
        let mut map = LruMap::new(2);
        map.set("a", 1);
        map.set("b", 2);

        assert_eq!(map.peek("a"), Some(&1));
        assert_eq!(map.set("c", 3), Some(("a", 1)));
    }

    #[test]
    fn test_update_existing_key() {
        let mut map = LruMap::new(2);
        map.set("a", 1);
        map.set("b", 2);
        assert!(map.set("a", 10).is_none());
        assert_eq!(map.len(), 2);
        assert_eq!(map.peek("a"), Some(&10));
        assert_eq!(map.peek_lru(), Some((&"b", &2)));
    }

    #[test]
    fn test_remove_and_reuse_slot() {
        let mut map = LruMap::new(3);
        map.set("a".to_string(), 1);
        map.set("b".to_string(), 2);

        assert_eq!(map.remove("a"), Some(1));
        assert_eq!(map.remove("a"), None);
        map.set("c".to_string(), 3);
        assert_eq!(map.nodes.len(), 2);
        assert_eq!(map.keys(), vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_evict_lru_order() {
        let mut map = LruMap::new(4);
        for i in 0..4 {
            map.set(i, i * 10);
        }
        map.get(&0);

        assert_eq!(map.evict_lru(), Some((1, 10)));
        assert_eq!(map.evict_lru(), Some((2, 20)));
        assert_eq!(map.evict_lru(), Some((3, 30)));
        assert_eq!(map.evict_lru(), Some((0, 0)));
        assert_eq!(map.evict_lru(), None);
        assert!(map.is_empty());
    }

    #[test]
    fn test_iter_lru_to_mru() {
        let mut map = LruMap::new(3);
        map.set(1, ());
        map.set(2, ());
        map.set(3, ());
        map.get(&2);

        let order: Vec<i32> = map.iter().map(|(k, _)| *k).collect();
        assert_eq!(order, vec![1, 3, 2]);
    }

    #[test]
    fn test_single_capacity() {
        let mut map = LruMap::new(0);
        assert_eq!(map.capacity(), 1);
        map.set(1, "one");
        assert_eq!(map.set(2, "two"), Some((1, "one")));
        assert_eq!(map.get(&2), Some(&"two"));
    }
}
