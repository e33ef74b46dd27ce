use core::{
    fmt,
    iter::FusedIterator,
    ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, BitXor, BitXorAssign, Not},
};

/// A fixed capacity set of small integers.
///
/// Used for kind masks, requirement sets and capability sets. The capacity is
/// a hard ceiling on the number of distinct kinds per namespace.
#[derive(Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct BitField(u64);

impl BitField {
    /// The number of bits which can be stored
    pub const CAPACITY: usize = u64::BITS as usize;

    /// Creates an empty set
    pub const fn new() -> Self {
        Self(0)
    }

    /// Creates a set from raw bits
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Returns the underlying bits
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Creates a set containing every index below `count`
    pub fn first_n(count: usize) -> Self {
        assert!(count <= Self::CAPACITY, "BitField index {count} out of range");
        if count == Self::CAPACITY {
            Self(u64::MAX)
        } else {
            Self((1 << count) - 1)
        }
    }

    #[inline]
    fn check(index: usize) {
        assert!(
            index < Self::CAPACITY,
            "BitField index {index} out of range"
        );
    }

    /// Returns true if `index` is in the set
    #[inline]
    pub fn get(self, index: usize) -> bool {
        Self::check(index);
        self.0 & (1 << index) != 0
    }

    /// Inserts or removes `index`
    #[inline]
    pub fn set(&mut self, index: usize, value: bool) {
        Self::check(index);
        if value {
            self.0 |= 1 << index;
        } else {
            self.0 &= !(1 << index);
        }
    }

    /// Inserts `index`
    #[inline]
    pub fn insert(&mut self, index: usize) {
        self.set(index, true)
    }

    /// Removes `index`
    #[inline]
    pub fn remove(&mut self, index: usize) {
        self.set(index, false)
    }

    /// Builder style insertion
    pub fn with(mut self, index: usize) -> Self {
        self.insert(index);
        self
    }

    /// Returns the number of set bits
    #[inline]
    pub fn count(self) -> usize {
        self.0.count_ones() as usize
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns true if every index in `other` is also in `self`
    #[inline]
    pub fn contains_all(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns true if the sets share an index
    #[inline]
    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Returns the indices in `self` which are not in `other`
    #[inline]
    pub fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Returns the lowest set index
    pub fn first(self) -> Option<usize> {
        (self.0 != 0).then(|| self.0.trailing_zeros() as usize)
    }

    /// Iterates the set indices in ascending order
    pub fn iter(self) -> Iter {
        Iter { bits: self.0 }
    }

    /// Iterates the set indices in descending order
    pub fn reversed(self) -> Reversed {
        Reversed { bits: self.0 }
    }

    /// Rewrites every index through `map`, where `map[old] == new`.
    ///
    /// Every set index must be present in the map.
    pub fn remap(self, map: &[usize]) -> Self {
        self.iter().map(|old| map[old]).collect()
    }
}

impl fmt::Debug for BitField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl FromIterator<usize> for BitField {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut bits = Self::new();
        iter.into_iter().for_each(|v| bits.insert(v));
        bits
    }
}

impl Extend<usize> for BitField {
    fn extend<I: IntoIterator<Item = usize>>(&mut self, iter: I) {
        iter.into_iter().for_each(|v| self.insert(v));
    }
}

impl IntoIterator for BitField {
    type Item = usize;
    type IntoIter = Iter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl BitAnd for BitField {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        Self(self.0 & rhs.0)
    }
}

impl BitOr for BitField {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl BitXor for BitField {
    type Output = Self;

    fn bitxor(self, rhs: Self) -> Self::Output {
        Self(self.0 ^ rhs.0)
    }
}

impl Not for BitField {
    type Output = Self;

    fn not(self) -> Self::Output {
        Self(!self.0)
    }
}

impl BitAndAssign for BitField {
    fn bitand_assign(&mut self, rhs: Self) {
        self.0 &= rhs.0;
    }
}

impl BitOrAssign for BitField {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitXorAssign for BitField {
    fn bitxor_assign(&mut self, rhs: Self) {
        self.0 ^= rhs.0;
    }
}

/// Ascending iterator over the indices of a [`BitField`]
#[derive(Clone)]
pub struct Iter {
    bits: u64,
}

impl Iterator for Iter {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.bits == 0 {
            return None;
        }

        let index = self.bits.trailing_zeros();
        // Clear the lowest set bit
        self.bits &= self.bits - 1;
        Some(index as usize)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.bits.count_ones() as usize;
        (len, Some(len))
    }
}

impl ExactSizeIterator for Iter {}
impl FusedIterator for Iter {}

/// Descending iterator over the indices of a [`BitField`].
///
/// Used to tear down kinds in reverse dependency order.
#[derive(Clone)]
pub struct Reversed {
    bits: u64,
}

impl Iterator for Reversed {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.bits == 0 {
            return None;
        }

        let index = 63 - self.bits.leading_zeros();
        self.bits &= !(1 << index);
        Some(index as usize)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.bits.count_ones() as usize;
        (len, Some(len))
    }
}

impl ExactSizeIterator for Reversed {}
impl FusedIterator for Reversed {}

#[cfg(test)]
mod test {
    use itertools::Itertools;
    use pretty_assertions::assert_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;

    #[test]
    fn get_set() {
        let mut bits = BitField::new();
        assert!(bits.is_empty());

        bits.insert(0);
        bits.insert(5);
        bits.insert(63);

        assert!(bits.get(0));
        assert!(bits.get(5));
        assert!(bits.get(63));
        assert!(!bits.get(1));
        assert_eq!(bits.count(), 3);

        bits.remove(5);
        assert!(!bits.get(5));
        assert_eq!(bits.count(), 2);
        assert_eq!(bits.first(), Some(0));
    }

    #[test]
    #[should_panic]
    fn out_of_range() {
        let mut bits = BitField::new();
        bits.insert(64);
    }

    #[test]
    fn iteration_order() {
        let bits: BitField = [3, 1, 40, 63, 0].into_iter().collect();

        assert_eq!(bits.iter().collect_vec(), [0, 1, 3, 40, 63]);
        assert_eq!(bits.reversed().collect_vec(), [63, 40, 3, 1, 0]);
        assert_eq!(bits.iter().len(), 5);
    }

    #[test]
    fn set_algebra() {
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..256 {
            let a = BitField::from_bits(rng.gen());
            let b = BitField::from_bits(rng.gen());

            assert_eq!((a & b) | (a & !b), a);
            assert_eq!(a ^ b, (a | b).difference(a & b));
            assert!((a | b).contains_all(a));

            let forward = a.iter().collect_vec();
            let mut reverse = a.reversed().collect_vec();

            assert!(reverse.windows(2).all(|w| w[0] > w[1]));
            reverse.reverse();
            assert_eq!(forward, reverse);
        }
    }

    #[test]
    fn remap() {
        let bits: BitField = [0, 2].into_iter().collect();
        let map = [2, 0, 1];

        assert_eq!(bits.remap(&map).iter().collect_vec(), [1, 2]);
        assert_eq!(BitField::first_n(64), !BitField::new());
        assert_eq!(BitField::first_n(3).iter().collect_vec(), [0, 1, 2]);
    }
}
