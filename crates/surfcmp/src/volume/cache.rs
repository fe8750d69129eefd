//! Bounded tile cache for lazy decoding.
//!
//! Deferred decoding is an explicit cache keyed by tile index, with FIFO
//! eviction at a fixed capacity, so memory stays predictable for large
//! scans regardless of read pattern.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use ndarray::Array3;

#[derive(Debug)]
pub(crate) struct TileCache {
    capacity: usize,
    tiles: HashMap<usize, Arc<Array3<u16>>>,
    order: VecDeque<usize>,
}

impl TileCache {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            tiles: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub(crate) fn get(&self, index: usize) -> Option<Arc<Array3<u16>>> {
        self.tiles.get(&index).cloned()
    }

    pub(crate) fn insert(&mut self, index: usize, tile: Arc<Array3<u16>>) {
        if self.tiles.contains_key(&index) {
            return;
        }
        while self.tiles.len() >= self.capacity {
            match self.order.pop_front() {
                Some(evicted) => {
                    self.tiles.remove(&evicted);
                }
                None => break,
            }
        }
        self.tiles.insert(index, tile);
        self.order.push_back(index);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.tiles.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile(v: u16) -> Arc<Array3<u16>> {
        Arc::new(Array3::from_elem((1, 1, 1), v))
    }

    #[test]
    fn evicts_oldest_tile_first() {
        let mut cache = TileCache::new(2);
        cache.insert(0, tile(0));
        cache.insert(1, tile(1));
        cache.insert(2, tile(2));
        assert_eq!(cache.len(), 2);
        assert!(cache.get(0).is_none());
        assert!(cache.get(1).is_some());
        assert!(cache.get(2).is_some());
    }

    #[test]
    fn reinsert_does_not_duplicate() {
        let mut cache = TileCache::new(2);
        cache.insert(0, tile(0));
        cache.insert(0, tile(0));
        assert_eq!(cache.len(), 1);
    }
}
