//! Sparse set of small integers for clause bookkeeping.
//!
//! SampleSAT keeps the set of currently unsatisfied clauses in a [`SparseSet`]:
//! membership tests, insertion, removal and picking a uniformly random member are all
//! O(1), and iteration only touches the members.

use rand::Rng;

/// A set of indices below a fixed universe size.
///
/// Members are packed densely in `dense`; `sparse[i]` is the position of `i` in
/// `dense` (meaningful only while `i` is a member).
#[derive(Debug, Clone)]
pub struct SparseSet {
    dense: Vec<usize>,
    sparse: Vec<usize>,
}

impl SparseSet {
    /// Creates an empty set over the universe `0..universe`.
    pub fn new(universe: usize) -> Self {
        Self {
            dense: Vec::new(),
            sparse: vec![usize::MAX; universe],
        }
    }

    /// Returns the number of members.
    #[inline]
    pub fn len(&self) -> usize {
        self.dense.len()
    }

    /// Returns true if the set has no members.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    /// Returns the universe size.
    #[inline]
    pub fn universe(&self) -> usize {
        self.sparse.len()
    }

    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        match self.sparse.get(index) {
            Some(&pos) => pos < self.dense.len() && self.dense[pos] == index,
            None => false,
        }
    }

    /// Adds `index`. Returns true if it was not already a member.
    ///
    /// Panics if `index` is outside the universe.
    #[inline]
    pub fn insert(&mut self, index: usize) -> bool {
        if self.contains(index) {
            return false;
        }
        self.sparse[index] = self.dense.len();
        self.dense.push(index);
        true
    }

    /// Removes `index`. Returns true if it was a member.
    #[inline]
    pub fn remove(&mut self, index: usize) -> bool {
        if !self.contains(index) {
            return false;
        }
        let pos = self.sparse[index];
        let last = self.dense.len() - 1;
        // Move the last member into the hole
        self.dense.swap(pos, last);
        self.sparse[self.dense[pos]] = pos;
        self.dense.pop();
        self.sparse[index] = usize::MAX;
        true
    }

    /// Picks a member uniformly at random, or `None` if the set is empty.
    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<usize> {
        if self.dense.is_empty() {
            return None;
        }
        Some(self.dense[rng.random_range(0..self.dense.len())])
    }

    /// Removes all members.
    pub fn clear(&mut self) {
        for &i in &self.dense {
            self.sparse[i] = usize::MAX;
        }
        self.dense.clear();
    }

    /// Returns an iterator over the members, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.dense.iter().copied()
    }
}

impl Extend<usize> for SparseSet {
    fn extend<I: IntoIterator<Item = usize>>(&mut self, iter: I) {
        for index in iter {
            self.insert(index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_empty() {
        let s = SparseSet::new(10);
        assert!(s.is_empty());
        assert_eq!(s.len(), 0);
        assert_eq!(s.universe(), 10);
        assert!(!s.contains(0));
        assert!(!s.contains(100));
    }

    #[test]
    fn test_insert_remove() {
        let mut s = SparseSet::new(100);
        assert!(s.insert(42));
        assert!(!s.insert(42)); // Already a member
        assert!(s.insert(7));
        assert!(s.insert(99));
        assert_eq!(s.len(), 3);

        assert!(s.remove(42));
        assert!(!s.remove(42));
        assert!(!s.contains(42));
        assert!(s.contains(7));
        assert!(s.contains(99));

        let mut members: Vec<_> = s.iter().collect();
        members.sort();
        assert_eq!(members, vec![7, 99]);
    }

    #[test]
    fn test_choose() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut s = SparseSet::new(10);
        assert_eq!(s.choose(&mut rng), None);
        s.extend([2, 5, 8]);
        let mut seen = [false; 10];
        for _ in 0..200 {
            let i = s.choose(&mut rng).unwrap();
            assert!(s.contains(i));
            seen[i] = true;
        }
        assert!(seen[2] && seen[5] && seen[8]);
    }

    #[test]
    fn test_clear() {
        let mut s = SparseSet::new(10);
        s.extend([1, 3, 9]);
        s.clear();
        assert!(s.is_empty());
        assert!(!s.contains(3));
        assert!(s.insert(3));
    }
}
