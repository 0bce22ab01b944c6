//
// blossomv-rs is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License  v3
// as published by the Free Software Foundation.
//
// blossomv-rs is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY.
// See the GNU Lesser General Public License  for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with blossomv-rs. If not, see http://www.gnu.org/licenses/lgpl-3.0.en.html
//
// Copyright (c)  2022 by X. Gillard
//

//! This module defines the addressable min-heap which is used to keep track
//! of the edges and blossoms that constrain the dual updates of the trees.

use std::{
    cmp::Reverse,
    fmt::Debug,
    hash::{BuildHasherDefault, Hash},
};

use ordered_float::OrderedFloat;
use priority_queue::PriorityQueue;
use rustc_hash::FxHasher;

/// The priority of an item in the heap. Ties on the key are broken on the
/// item itself so that the minimum of a heap never depends on the order in
/// which the items were pushed.
type Priority<T> = Reverse<(OrderedFloat<f64>, T)>;

/// An addressable min priority queue keyed by floating point values
pub(crate) struct MinHeap<T>
where
    T: Copy + Eq + Ord + Hash,
{
    queue: PriorityQueue<T, Priority<T>, BuildHasherDefault<FxHasher>>,
}

impl<T> MinHeap<T>
where
    T: Copy + Eq + Ord + Hash,
{
    /// Creates a new empty heap
    pub fn new() -> Self {
        Self {
            queue: PriorityQueue::with_default_hasher(),
        }
    }
    /// Inserts the item with the given key. When the item is already present
    /// in the heap, its key is updated.
    pub fn push(&mut self, item: T, key: f64) {
        self.queue.push(item, Reverse((OrderedFloat(key), item)));
    }
    /// Removes the item from the heap. Returns true iff it was present
    pub fn remove(&mut self, item: T) -> bool {
        self.queue.remove(&item).is_some()
    }
    /// Returns the item having the smallest key along with that key
    pub fn peek(&self) -> Option<(T, f64)> {
        self.queue
            .peek()
            .map(|(item, Reverse((key, _)))| (*item, key.into_inner()))
    }
    /// Returns the smallest key of the heap
    pub fn min_key(&self) -> Option<f64> {
        self.peek().map(|(_, key)| key)
    }
    /// Returns the number of items in the heap
    pub fn len(&self) -> usize {
        self.queue.len()
    }
    /// Returns true iff the heap holds no item
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl<T> Debug for MinHeap<T>
where
    T: Copy + Eq + Ord + Hash + Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MinHeap")
            .field("len", &self.len())
            .field("min", &self.peek())
            .finish()
    }
}

// ############################################################################
// ### UNIT TESTS #############################################################
// ############################################################################

#[cfg(test)]
mod test_minheap {
    use super::*;

    #[test]
    fn an_empty_heap_has_no_minimum() {
        let heap = MinHeap::<usize>::new();
        assert!(heap.is_empty());
        assert_eq!(0, heap.len());
        assert_eq!(None, heap.peek());
        assert_eq!(None, heap.min_key());
    }

    #[test]
    fn peek_returns_the_item_with_the_smallest_key() {
        let mut heap = MinHeap::<usize>::new();
        heap.push(1, 10.0);
        heap.push(2, -3.5);
        heap.push(3, 4.0);
        assert_eq!(Some((2, -3.5)), heap.peek());
        assert_eq!(3, heap.len());
    }

    #[test]
    fn pushing_an_item_twice_updates_its_key() {
        let mut heap = MinHeap::<usize>::new();
        heap.push(1, 10.0);
        heap.push(2, 5.0);
        heap.push(1, 1.0);
        assert_eq!(2, heap.len());
        assert_eq!(Some((1, 1.0)), heap.peek());

        heap.push(1, 7.0);
        assert_eq!(Some((2, 5.0)), heap.peek());
    }

    #[test]
    fn removed_items_are_gone() {
        let mut heap = MinHeap::<usize>::new();
        heap.push(1, 1.0);
        heap.push(2, 2.0);
        assert!(heap.remove(1));
        assert!(!heap.remove(1));
        assert_eq!(Some((2, 2.0)), heap.peek());
        assert!(heap.remove(2));
        assert!(heap.is_empty());
    }

    #[test]
    fn ties_are_broken_on_the_smallest_item() {
        let mut heap = MinHeap::<usize>::new();
        heap.push(7, 1.0);
        heap.push(3, 1.0);
        heap.push(5, 1.0);
        assert_eq!(Some((3, 1.0)), heap.peek());
    }
}
