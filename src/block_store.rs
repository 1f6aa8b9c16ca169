//! Block Store
//!
//! Maps a source address to the monotonic timestamp (ns) at which its block
//! ends. Expired entries are removed lazily by the lookup that finds them.
//! Capacity-bounded with least-recently-touched eviction: lookups and inserts
//! both count as touches.
//!
//! The whole store sits behind one mutex so eviction follows a single global
//! recency order. Each call holds it for one O(1) key operation and never
//! across I/O or another lock. Units hitting the store at the same instant
//! briefly wait on each other; sharding would remove that wait but only give
//! per-shard LRU order.

use std::net::Ipv4Addr;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use tracing::{debug, trace};

use crate::bounded_cache::BoundedCache;
use crate::lock_utils::lock_or_recover;

const STORE_NAME: &str = "block store";

/// A blocked source and the end of its block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockEntry {
    pub source: Ipv4Addr,
    pub expiry: u64,
}

/// Shared, concurrently accessed block list
#[derive(Debug)]
pub struct BlockStore {
    entries: Mutex<BoundedCache<u64>>,
}

impl BlockStore {
    pub fn new(capacity: NonZeroUsize) -> Self {
        debug!("Block store created (capacity: {})", capacity);
        Self {
            entries: Mutex::new(BoundedCache::new(capacity)),
        }
    }

    /// True iff `ip` has a block with `expiry > now`.
    ///
    /// A found but expired block is deleted and reported as not blocked. An
    /// unknown address leaves the store untouched.
    pub fn is_blocked(&self, ip: Ipv4Addr, now: u64) -> bool {
        let key = u32::from(ip);
        let mut entries = lock_or_recover(&self.entries, STORE_NAME);

        let Some(expiry) = entries.get(key).map(|expiry| *expiry) else {
            return false;
        };
        if now < expiry {
            return true;
        }

        entries.remove(key);
        drop(entries);
        debug!("Block expired for {} (expiry: {}, now: {})", ip, expiry, now);
        false
    }

    /// Block `ip` until `until` (exclusive), overwriting any existing block.
    pub fn block(&self, ip: Ipv4Addr, until: u64) {
        let evicted = lock_or_recover(&self.entries, STORE_NAME).insert(u32::from(ip), until);

        if let Some((victim, expiry)) = evicted {
            trace!(
                "Block store full, evicted {} (expiry: {})",
                Ipv4Addr::from(victim),
                expiry
            );
        }
    }

    /// Stored expiry for `ip`, without touching recency or removing it
    pub fn expiry_of(&self, ip: Ipv4Addr) -> Option<u64> {
        lock_or_recover(&self.entries, STORE_NAME)
            .peek(u32::from(ip))
            .copied()
    }

    pub fn len(&self) -> usize {
        lock_or_recover(&self.entries, STORE_NAME).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        lock_or_recover(&self.entries, STORE_NAME).capacity()
    }

    /// All stored blocks (expired ones included), most recently touched first
    pub fn snapshot(&self) -> Vec<BlockEntry> {
        lock_or_recover(&self.entries, STORE_NAME)
            .iter()
            .map(|(key, &expiry)| BlockEntry {
                source: Ipv4Addr::from(key),
                expiry,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 1);
    const B: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 2);
    const C: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 3);

    fn store(capacity: usize) -> BlockStore {
        BlockStore::new(NonZeroUsize::new(capacity).unwrap())
    }

    #[test]
    fn test_blocked_until_expiry() {
        let s = store(8);
        s.block(A, 1_000);
        assert!(s.is_blocked(A, 0));
        assert!(s.is_blocked(A, 999));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn test_expiry_is_exclusive_and_lazy() {
        let s = store(8);
        s.block(A, 1_000);
        // record still present until someone looks at it
        assert_eq!(s.expiry_of(A), Some(1_000));
        assert!(!s.is_blocked(A, 1_000));
        assert_eq!(s.expiry_of(A), None);
        assert!(s.is_empty());
    }

    #[test]
    fn test_unknown_lookup_creates_no_state() {
        let s = store(8);
        for now in [0, 10, u64::MAX] {
            assert!(!s.is_blocked(B, now));
        }
        assert!(s.is_empty());
    }

    #[test]
    fn test_block_overwrites() {
        let s = store(8);
        s.block(A, 100);
        s.block(A, 5_000);
        assert_eq!(s.len(), 1);
        assert!(s.is_blocked(A, 4_999));
    }

    #[test]
    fn test_eviction_respects_lookups() {
        let s = store(2);
        s.block(A, 1_000);
        s.block(B, 1_000);
        // touching A makes B the oldest
        assert!(s.is_blocked(A, 0));
        s.block(C, 1_000);
        assert_eq!(s.len(), 2);
        assert_eq!(s.expiry_of(B), None);
        assert!(s.is_blocked(A, 0));
        assert!(s.is_blocked(C, 0));
    }

    #[test]
    fn test_snapshot_order() {
        let s = store(4);
        s.block(A, 1);
        s.block(B, 2);
        let snap = s.snapshot();
        assert_eq!(
            snap,
            vec![
                BlockEntry {
                    source: B,
                    expiry: 2
                },
                BlockEntry {
                    source: A,
                    expiry: 1
                },
            ]
        );
        assert_eq!(s.capacity(), 4);
    }
}
