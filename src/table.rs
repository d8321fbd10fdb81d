//! Hash-consed node arena (the *unique table*).
//!
//! Values live in a growable `Vec`, addressed by a stable slot index. Slot 0
//! is a sentinel and is never handed out. Lookup goes through a bucket array
//! of chain heads; each entry stores the index of the next entry in its chain.
//!
//! The table never grows beyond its configured capacity: running out of slots
//! is reported as [`Error::ResourceExhausted`] instead of aborting.

use std::ops::Index;

use log::debug;

use crate::error::{Error, Result};
use crate::utils::MyHash;

#[derive(Clone, Default)]
struct Entry<T> {
    value: T,
    next: usize,
    occupied: bool,
}

pub struct Table<T> {
    data: Vec<Entry<T>>,
    buckets: Vec<usize>,
    bitmask: u64,
    /// Slots released by [`Table::retain`], reused before growing `data`.
    free: Vec<usize>,
    /// Number of occupied cells.
    real_size: usize,
    /// Maximal number of occupied cells.
    capacity: usize,
}

impl<T> Table<T>
where
    T: Default,
{
    /// Create a new table with `2^bits` initial buckets and the given capacity.
    pub fn new(bits: usize, capacity: usize) -> Self {
        assert!(bits <= 31, "Bucket bits should be in the range 0..=31");

        let mut data: Vec<Entry<T>> = Vec::with_capacity((1 << bits).min(capacity + 1));
        data.push(Entry {
            occupied: true, // sentry
            ..Entry::default()
        });

        let buckets_size = 1usize << bits;

        Self {
            data,
            buckets: vec![0; buckets_size],
            bitmask: (buckets_size - 1) as u64,
            free: Vec::new(),
            real_size: 0,
            capacity,
        }
    }

    /// Allocate a new cell and return its index.
    fn alloc(&mut self) -> Result<usize> {
        if self.real_size >= self.capacity {
            return Err(Error::ResourceExhausted {
                capacity: self.capacity,
            });
        }

        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.data.push(Entry::default());
                self.data.len() - 1
            }
        };

        self.data[index].occupied = true;
        self.real_size += 1;
        Ok(index)
    }
}

impl<T> Table<T> {
    /// Maximal number of occupied cells.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of occupied cells.
    pub fn real_size(&self) -> usize {
        self.real_size
    }

    /// Number of allocated slots, including free ones and the sentinel.
    pub fn slots(&self) -> usize {
        self.data.len()
    }

    pub fn num_buckets(&self) -> usize {
        self.buckets.len()
    }

    pub fn value(&self, index: usize) -> &T {
        assert_ne!(index, 0, "Index is 0");
        &self.data[index].value
    }

    pub fn is_occupied(&self, index: usize) -> bool {
        self.data.get(index).is_some_and(|e| e.occupied)
    }

    /// Release every occupied cell for which `keep` returns false and rebuild
    /// the bucket chains. Returns the number of released cells.
    pub fn retain(&mut self, mut keep: impl FnMut(usize) -> bool) -> usize
    where
        T: MyHash,
    {
        let mut dropped = 0;
        for index in 1..self.data.len() {
            if self.data[index].occupied && !keep(index) {
                self.data[index].occupied = false;
                self.free.push(index);
                self.real_size -= 1;
                dropped += 1;
            }
        }
        self.rehash(self.buckets.len());
        dropped
    }

    fn rehash(&mut self, num_buckets: usize)
    where
        T: MyHash,
    {
        debug!("Rehashing {} cells into {} buckets", self.real_size, num_buckets);
        self.buckets = vec![0; num_buckets];
        self.bitmask = (num_buckets - 1) as u64;
        for index in 1..self.data.len() {
            let entry = &self.data[index];
            if entry.occupied {
                let b = (entry.value.hash() & self.bitmask) as usize;
                self.data[index].next = self.buckets[b];
                self.buckets[b] = index;
            }
        }
    }
}

impl<T> Table<T>
where
    T: MyHash + Eq + Default,
{
    fn bucket_index(&self, value: &T) -> usize {
        (value.hash() & self.bitmask) as usize
    }

    /// Find the index of an existing equal value.
    pub fn find(&self, value: &T) -> Option<usize> {
        let mut index = self.buckets[self.bucket_index(value)];
        while index != 0 {
            if &self.data[index].value == value {
                return Some(index);
            }
            index = self.data[index].next;
        }
        None
    }

    /// Put a value into the table and return its index, reusing an equal
    /// value if one is already present.
    pub fn put(&mut self, value: T) -> Result<usize> {
        if let Some(index) = self.find(&value) {
            return Ok(index);
        }

        let bucket_index = self.bucket_index(&value);
        let index = self.alloc()?;
        let head = self.buckets[bucket_index];
        let entry = &mut self.data[index];
        entry.value = value;
        entry.next = head;
        self.buckets[bucket_index] = index;

        // Keep chains short: double the bucket array once the load exceeds 2.
        if self.real_size > 2 * self.buckets.len() && self.buckets.len() < (1 << 31) {
            self.rehash(2 * self.buckets.len());
        }

        Ok(index)
    }
}

impl<T> Index<usize> for Table<T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        self.value(index)
    }
}
