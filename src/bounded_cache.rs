//! Fixed-capacity cache keyed by IPv4 address
//!
//! An arena of slots threaded on an intrusive doubly-linked recency list, plus
//! a chained hash index. Every `get` and `insert` moves the entry to the front;
//! when the arena is full an insert of a new key evicts the entry at the back.
//! Eviction order is fully deterministic so callers can reason about exact
//! victims.
//!
//! The arena and the bucket array are allocated once at construction. After
//! that the cache never allocates or rehashes: index chains run through the
//! slots themselves and slots freed by `remove` are recycled through a free
//! list.

use std::num::NonZeroUsize;

/// Largest supported capacity (slot indices are stored as `u32`)
pub const MAX_CAPACITY: usize = 1 << 24;

const NIL: u32 = u32::MAX;

/// Fibonacci hashing multiplier (2^32 / golden ratio)
const HASH_MULTIPLIER: u32 = 0x9E37_79B9;

#[derive(Debug, Clone, Copy)]
struct Slot<V> {
    key: u32,
    value: V,
    prev: u32,
    next: u32,
    /// Next slot in the same bucket chain
    hash_next: u32,
}

/// Bounded least-recently-touched cache
#[derive(Debug)]
pub struct BoundedCache<V> {
    slots: Vec<Slot<V>>,
    /// Head slot of each bucket chain; length is a power of two >= capacity
    buckets: Box<[u32]>,
    /// Most recently touched
    head: u32,
    /// Least recently touched, next eviction victim
    tail: u32,
    /// Recycled slots, linked through `next`
    free: u32,
    len: usize,
    capacity: usize,
}

impl<V: Copy> BoundedCache<V> {
    /// Create an empty cache holding at most `capacity` entries
    /// (clamped to [`MAX_CAPACITY`]).
    pub fn new(capacity: NonZeroUsize) -> Self {
        let capacity = capacity.get().min(MAX_CAPACITY);
        Self {
            slots: Vec::with_capacity(capacity),
            buckets: vec![NIL; capacity.next_power_of_two()].into_boxed_slice(),
            head: NIL,
            tail: NIL,
            free: NIL,
            len: 0,
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, key: u32) -> bool {
        self.find(key).is_some()
    }

    /// Look up `key` and mark it most recently touched
    pub fn get(&mut self, key: u32) -> Option<&mut V> {
        let idx = self.find(key)?;
        self.move_to_front(idx);
        Some(&mut self.slots[idx as usize].value)
    }

    /// Look up `key` without touching its recency
    pub fn peek(&self, key: u32) -> Option<&V> {
        let idx = self.find(key)?;
        Some(&self.slots[idx as usize].value)
    }

    /// Insert or overwrite `key` and mark it most recently touched.
    ///
    /// Returns the evicted entry when a new key had to displace the least
    /// recently touched one.
    pub fn insert(&mut self, key: u32, value: V) -> Option<(u32, V)> {
        if let Some(idx) = self.find(key) {
            self.slots[idx as usize].value = value;
            self.move_to_front(idx);
            return None;
        }

        let mut evicted = None;
        let idx = if self.free != NIL {
            let idx = self.free;
            self.free = self.slots[idx as usize].next;
            idx
        } else if self.slots.len() < self.capacity {
            // within the reserved capacity, so this never reallocates
            self.slots.push(Slot {
                key,
                value,
                prev: NIL,
                next: NIL,
                hash_next: NIL,
            });
            (self.slots.len() - 1) as u32
        } else {
            let idx = self.tail;
            self.unlink(idx);
            self.unhash(idx);
            let victim = self.slots[idx as usize];
            evicted = Some((victim.key, victim.value));
            self.len -= 1;
            idx
        };

        let slot = &mut self.slots[idx as usize];
        slot.key = key;
        slot.value = value;
        self.push_front(idx);
        self.link_bucket(idx);
        self.len += 1;
        evicted
    }

    /// Remove `key`, returning its value
    pub fn remove(&mut self, key: u32) -> Option<V> {
        let idx = self.find(key)?;
        self.unlink(idx);
        self.unhash(idx);
        self.len -= 1;
        let slot = &mut self.slots[idx as usize];
        slot.next = self.free;
        self.free = idx;
        Some(slot.value)
    }

    /// Key that the next insert of a new key would evict, once full
    pub fn lru(&self) -> Option<u32> {
        (self.tail != NIL).then(|| self.slots[self.tail as usize].key)
    }

    /// Entries from most to least recently touched
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            cache: self,
            cursor: self.head,
        }
    }

    fn bucket_of(&self, key: u32) -> usize {
        let hash = key.wrapping_mul(HASH_MULTIPLIER);
        (hash ^ (hash >> 16)) as usize & (self.buckets.len() - 1)
    }

    fn find(&self, key: u32) -> Option<u32> {
        let mut cursor = self.buckets[self.bucket_of(key)];
        while cursor != NIL {
            let slot = &self.slots[cursor as usize];
            if slot.key == key {
                return Some(cursor);
            }
            cursor = slot.hash_next;
        }
        None
    }

    /// Link slot `idx` at the head of its key's bucket chain
    fn link_bucket(&mut self, idx: u32) {
        let bucket = self.bucket_of(self.slots[idx as usize].key);
        self.slots[idx as usize].hash_next = self.buckets[bucket];
        self.buckets[bucket] = idx;
    }

    /// Remove slot `idx` from its bucket chain
    fn unhash(&mut self, idx: u32) {
        let bucket = self.bucket_of(self.slots[idx as usize].key);
        let next = self.slots[idx as usize].hash_next;
        if self.buckets[bucket] == idx {
            self.buckets[bucket] = next;
        } else {
            let mut cursor = self.buckets[bucket];
            while cursor != NIL {
                let after = self.slots[cursor as usize].hash_next;
                if after == idx {
                    self.slots[cursor as usize].hash_next = next;
                    break;
                }
                cursor = after;
            }
        }
        self.slots[idx as usize].hash_next = NIL;
    }

    fn unlink(&mut self, idx: u32) {
        let Slot { prev, next, .. } = self.slots[idx as usize];
        if prev != NIL {
            self.slots[prev as usize].next = next;
        } else {
            self.head = next;
        }
        if next != NIL {
            self.slots[next as usize].prev = prev;
        } else {
            self.tail = prev;
        }
        let slot = &mut self.slots[idx as usize];
        slot.prev = NIL;
        slot.next = NIL;
    }

    fn push_front(&mut self, idx: u32) {
        let old_head = self.head;
        {
            let slot = &mut self.slots[idx as usize];
            slot.prev = NIL;
            slot.next = old_head;
        }
        if old_head != NIL {
            self.slots[old_head as usize].prev = idx;
        } else {
            self.tail = idx;
        }
        self.head = idx;
    }

    fn move_to_front(&mut self, idx: u32) {
        if self.head != idx {
            self.unlink(idx);
            self.push_front(idx);
        }
    }
}

pub struct Iter<'a, V> {
    cache: &'a BoundedCache<V>,
    cursor: u32,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (u32, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == NIL {
            return None;
        }
        let slot = &self.cache.slots[self.cursor as usize];
        self.cursor = slot.next;
        Some((slot.key, &slot.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(capacity: usize) -> BoundedCache<u64> {
        BoundedCache::new(NonZeroUsize::new(capacity).unwrap())
    }

    fn keys(cache: &BoundedCache<u64>) -> Vec<u32> {
        cache.iter().map(|(k, _)| k).collect()
    }

    #[test]
    fn test_insert_and_get() {
        let mut c = cache(4);
        assert!(c.insert(1, 10).is_none());
        assert!(c.insert(2, 20).is_none());
        assert_eq!(c.get(1).copied(), Some(10));
        assert_eq!(c.len(), 2);
        assert_eq!(keys(&c), vec![1, 2]);
    }

    #[test]
    fn test_evicts_least_recently_inserted() {
        let mut c = cache(3);
        c.insert(1, 1);
        c.insert(2, 2);
        c.insert(3, 3);
        assert_eq!(c.insert(4, 4), Some((1, 1)));
        assert_eq!(c.len(), 3);
        assert!(!c.contains(1));
        assert_eq!(keys(&c), vec![4, 3, 2]);
    }

    #[test]
    fn test_lookup_counts_as_touch() {
        let mut c = cache(3);
        c.insert(1, 1);
        c.insert(2, 2);
        c.insert(3, 3);
        c.get(1);
        assert_eq!(c.lru(), Some(2));
        assert_eq!(c.insert(4, 4), Some((2, 2)));
        assert!(c.contains(1));
    }

    #[test]
    fn test_peek_does_not_touch() {
        let mut c = cache(2);
        c.insert(1, 1);
        c.insert(2, 2);
        assert_eq!(c.peek(1).copied(), Some(1));
        assert_eq!(c.insert(3, 3), Some((1, 1)));
    }

    #[test]
    fn test_overwrite_moves_to_front_without_eviction() {
        let mut c = cache(2);
        c.insert(1, 1);
        c.insert(2, 2);
        assert!(c.insert(1, 100).is_none());
        assert_eq!(c.peek(1).copied(), Some(100));
        assert_eq!(c.insert(3, 3), Some((2, 2)));
    }

    #[test]
    fn test_missing_lookup_creates_nothing() {
        let mut c = cache(2);
        assert!(c.get(9).is_none());
        assert!(c.peek(9).is_none());
        assert!(c.remove(9).is_none());
        assert!(c.is_empty());
        assert_eq!(c.lru(), None);
    }

    #[test]
    fn test_removed_slots_are_recycled() {
        let mut c = cache(3);
        c.insert(1, 1);
        c.insert(2, 2);
        c.insert(3, 3);
        assert_eq!(c.remove(2), Some(2));
        assert_eq!(c.len(), 2);
        // free slot is reused, nothing evicted
        assert!(c.insert(4, 4).is_none());
        assert_eq!(keys(&c), vec![4, 3, 1]);
        assert_eq!(c.insert(5, 5), Some((1, 1)));
    }

    #[test]
    fn test_remove_head_and_tail() {
        let mut c = cache(3);
        c.insert(1, 1);
        c.insert(2, 2);
        c.insert(3, 3);
        c.remove(3);
        c.remove(1);
        assert_eq!(keys(&c), vec![2]);
        assert_eq!(c.lru(), Some(2));
        c.remove(2);
        assert!(c.is_empty());
        assert_eq!(c.iter().count(), 0);
    }

    #[test]
    fn test_capacity_one() {
        let mut c = cache(1);
        c.insert(1, 1);
        assert_eq!(c.insert(2, 2), Some((1, 1)));
        assert_eq!(c.get(2).copied(), Some(2));
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let mut c = cache(64);
        for key in 0..10_000u32 {
            c.insert(key, u64::from(key));
            if key % 7 == 0 {
                c.get(key / 2);
            }
            if key % 11 == 0 {
                c.remove(key.wrapping_sub(3));
            }
            assert!(c.len() <= 64);
        }
        assert_eq!(c.iter().count(), c.len());
    }

    #[test]
    fn test_index_is_fixed_under_churn() {
        for capacity in [100usize, 10_000] {
            let mut c = cache(capacity);
            let buckets = c.buckets.len();
            let bucket_ptr = c.buckets.as_ptr();
            let slots_cap = c.slots.capacity();

            let total = (capacity * 20) as u32;
            for key in 0..total {
                c.insert(key, u64::from(key));
                if key % 3 == 0 {
                    c.get(key / 2);
                }
                assert!(c.len() <= capacity);
            }

            assert_eq!(c.buckets.len(), buckets);
            assert_eq!(c.buckets.as_ptr(), bucket_ptr);
            assert_eq!(c.slots.capacity(), slots_cap);
            assert_eq!(c.len(), capacity);
            // the most recent inserts survive, old keys are gone
            assert_eq!(c.peek(total - 1).copied(), Some(u64::from(total - 1)));
            assert!(!c.contains(1));
            assert_eq!(c.iter().count(), capacity);
        }
    }

    #[test]
    fn test_colliding_keys_stay_reachable() {
        // capacity 4 gives 4 buckets, so 64 keys share chains heavily
        let mut c = cache(4);
        for key in (0..64u32).map(|k| k << 20) {
            c.insert(key, u64::from(key));
        }
        let survivors = keys(&c);
        assert_eq!(survivors, vec![63 << 20, 62 << 20, 61 << 20, 60 << 20]);
        for key in &survivors {
            assert_eq!(c.peek(*key).copied(), Some(u64::from(*key)));
        }
        assert_eq!(c.remove(61 << 20), Some(61 << 20));
        assert!(!c.contains(61 << 20));
        assert!(c.contains(62 << 20) && c.contains(60 << 20));
    }
}
