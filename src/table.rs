use std::ops::Index;

use crate::utils::MyHash;

#[derive(Clone)]
struct Entry<T> {
    value: T,
    next: usize,
}

/// Hash-consing table: a growable arena of values with bucket chains.
///
/// Index 0 is a sentry and never holds a value, so `0` doubles as the
/// "end of chain" marker. Values are never removed; a table lives as long as
/// the manager that owns it.
pub struct Table<T> {
    data: Vec<Entry<T>>,
    buckets: Vec<usize>,
    bitmask: u64,
}

impl<T> Table<T>
where
    T: Default,
{
    /// Create a new table with `2^bits` preallocated cells.
    pub fn new(bits: usize) -> Self {
        assert!(bits <= 31, "Storage bits should be in the range 0..=31");

        let capacity = 1 << bits;
        let mut data: Vec<Entry<T>> = Vec::with_capacity(capacity);
        data.push(Entry {
            value: T::default(),
            next: 0,
        });

        let buckets_size = 1 << bits.min(16);
        let buckets = vec![0; buckets_size];
        let bitmask = (buckets_size - 1) as u64;

        Self { data, buckets, bitmask }
    }
}

impl<T> Table<T> {
    /// Number of stored values.
    pub fn size(&self) -> usize {
        self.data.len() - 1
    }

    pub fn num_buckets(&self) -> usize {
        self.buckets.len()
    }

    /// Get the reference to the value at the given index.
    pub fn value(&self, index: usize) -> &T {
        assert_ne!(index, 0, "Index is 0");
        &self.data[index].value
    }

    /// Get the index of the next cell in the bucket chain.
    pub fn next(&self, index: usize) -> usize {
        assert_ne!(index, 0, "Index is 0");
        self.data[index].next
    }

    /// Add a new value without hash-consing and return its index.
    pub fn add(&mut self, value: T) -> usize {
        self.data.push(Entry { value, next: 0 });
        self.data.len() - 1
    }
}

impl<T> Table<T>
where
    T: MyHash,
{
    fn bucket_index(&self, value: &T) -> usize {
        (value.hash() & self.bitmask) as usize
    }

    /// Put a value into the table, returning the index of the existing equal
    /// value if there is one.
    pub fn put(&mut self, value: T) -> usize
    where
        T: Eq,
    {
        let bucket_index = self.bucket_index(&value);
        let mut index = self.buckets[bucket_index];

        while index != 0 {
            if &value == self.value(index) {
                return index;
            }
            index = self.next(index);
        }

        // Prepend the new value to its bucket.
        let i = self.add(value);
        self.data[i].next = self.buckets[bucket_index];
        self.buckets[bucket_index] = i;

        if self.size() > 2 * self.buckets.len() {
            self.grow_buckets();
        }

        i
    }

    /// Double the number of buckets and relink every chain.
    fn grow_buckets(&mut self) {
        let size = self.buckets.len() * 2;
        self.buckets = vec![0; size];
        self.bitmask = (size - 1) as u64;
        for i in 1..self.data.len() {
            let b = self.bucket_index(&self.data[i].value);
            self.data[i].next = self.buckets[b];
            self.buckets[b] = i;
        }
    }
}

impl<T> Index<usize> for Table<T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        self.value(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
    struct Item(i32);

    impl MyHash for Item {
        fn hash(&self) -> u64 {
            self.0.unsigned_abs() as u64
        }
    }

    #[test]
    fn test_add() {
        let mut table = Table::new(2);
        assert_eq!(table.add(42), 1);
        assert_eq!(table.add(43), 2);
        assert_eq!(table[1], 42);
        assert_eq!(table.size(), 2);
    }

    #[test]
    fn test_put_dedup() {
        let mut table = Table::new(2);
        let index1 = table.put(Item(5));
        let index2 = table.put(Item(-5));
        assert_ne!(index1, index2);
        assert_eq!(table.put(Item(5)), index1);
        assert_eq!(table.put(Item(-5)), index2);
        assert_eq!(table[index1], Item(5));
        assert_eq!(table[index2], Item(-5));
        // Same hash, same chain.
        assert_eq!(table.next(index2), index1);
    }

    #[test]
    fn test_grows_past_initial_capacity() {
        let mut table = Table::new(1);
        let indices: Vec<usize> = (0..100).map(|i| table.put(Item(i))).collect();
        assert!(table.num_buckets() > 2);
        for (i, &index) in indices.iter().enumerate() {
            assert_eq!(table[index], Item(i as i32));
            assert_eq!(table.put(Item(i as i32)), index);
        }
        assert_eq!(table.size(), 100);
    }
}
