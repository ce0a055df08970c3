use std::collections::TryReserveError;
use std::ops::{BitOrAssign, SubAssign};

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

/// Lookup table for the position of the lowest set bit, indexed by the de Bruijn product
const DE_BRUIJN_LUT: [u8; 64] = [
    0, 1, 2, 53, 3, 7, 54, 27, 4, 38, 41, 8, 34, 55, 48, 28, //
    62, 5, 39, 46, 44, 42, 22, 9, 24, 35, 59, 56, 49, 18, 29, 11, //
    63, 52, 6, 26, 37, 40, 33, 47, 61, 45, 43, 21, 23, 58, 17, 10, //
    51, 25, 36, 32, 60, 20, 57, 16, 50, 31, 19, 15, 30, 14, 13, 12, //
];
const DE_BRUIJN_MULTIPLIER: u64 = 0x022F_DD63_CC95_386D;

/// Returns with the index of the lowest set bit of the given non-zero word
#[inline]
pub(crate) fn lowest_bit(word: u64) -> u32 {
    debug_assert!(word != 0);
    let isolated = word & word.wrapping_neg();
    DE_BRUIJN_LUT[(isolated.wrapping_mul(DE_BRUIJN_MULTIPLIER) >> 58) as usize] as u32
}

///####################################################################################
/// Bitmask
///####################################################################################

/// Set of `2^(3*LOG2DIM)` bits, one for every slot of a node with `2^LOG2DIM` slots along each axis
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct Bitmask<const LOG2DIM: u32> {
    words: Box<[u64]>,
}

impl<const LOG2DIM: u32> Bitmask<LOG2DIM> {
    /// Number of bits in the mask
    pub const SIZE: u32 = 1 << (3 * LOG2DIM);

    /// Number of 64 bit words storing the bits
    pub const WORD_COUNT: usize = ((Self::SIZE + 63) >> 6) as usize;

    /// Creates a mask with every bit off
    pub fn new() -> Self {
        Self::filled(false)
    }

    /// Creates a mask with every bit set to the given state
    pub fn filled(on: bool) -> Self {
        Self {
            words: vec![Self::fill_word(on); Self::WORD_COUNT].into_boxed_slice(),
        }
    }

    /// Creates a mask with every bit set to the given state, reporting allocation failure
    pub fn try_filled(on: bool) -> Result<Self, TryReserveError> {
        let mut words = Vec::new();
        words.try_reserve_exact(Self::WORD_COUNT)?;
        words.resize(Self::WORD_COUNT, Self::fill_word(on));
        Ok(Self {
            words: words.into_boxed_slice(),
        })
    }

    fn fill_word(on: bool) -> u64 {
        if on {
            // Masks smaller than a word only keep their valid bits
            if Self::SIZE < 64 {
                (1u64 << Self::SIZE) - 1
            } else {
                u64::MAX
            }
        } else {
            0
        }
    }

    #[inline]
    pub fn set_on(&mut self, n: u32) {
        debug_assert!(n < Self::SIZE);
        self.words[(n >> 6) as usize] |= 1u64 << (n & 63);
    }

    #[inline]
    pub fn set_off(&mut self, n: u32) {
        debug_assert!(n < Self::SIZE);
        self.words[(n >> 6) as usize] &= !(1u64 << (n & 63));
    }

    #[inline]
    pub fn set(&mut self, n: u32, on: bool) {
        if on {
            self.set_on(n);
        } else {
            self.set_off(n);
        }
    }

    #[inline]
    pub fn is_on(&self, n: u32) -> bool {
        debug_assert!(n < Self::SIZE);
        0 != (self.words[(n >> 6) as usize] & (1u64 << (n & 63)))
    }

    /// Number of set bits
    pub fn count_on(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Linear offset of the first set bit, or `SIZE` if there is none
    pub fn find_first_on(&self) -> u32 {
        match self.words.iter().position(|w| *w != 0) {
            Some(n) => ((n as u32) << 6) + lowest_bit(self.words[n]),
            None => Self::SIZE,
        }
    }

    /// Linear offset of the first set bit at or after `start`, or `SIZE` if there is none
    pub fn find_next_on(&self, start: u32) -> u32 {
        let mut n = (start >> 6) as usize;
        if n >= Self::WORD_COUNT {
            return Self::SIZE;
        }
        let bit = start & 63;
        let mut word = self.words[n];
        if 0 != word & (1u64 << bit) {
            return start;
        }
        word &= u64::MAX << bit;
        while 0 == word {
            n += 1;
            if n >= Self::WORD_COUNT {
                return Self::SIZE;
            }
            word = self.words[n];
        }
        ((n as u32) << 6) + lowest_bit(word)
    }

    /// Visits the set bits in ascending order; every call starts from the first set bit
    pub fn iter(&self) -> BitmaskIter<'_, LOG2DIM> {
        BitmaskIter {
            position: self.find_first_on(),
            mask: self,
        }
    }
}

impl<const LOG2DIM: u32> Default for Bitmask<LOG2DIM> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const LOG2DIM: u32> BitOrAssign<&Bitmask<LOG2DIM>> for Bitmask<LOG2DIM> {
    fn bitor_assign(&mut self, other: &Bitmask<LOG2DIM>) {
        for (word, other_word) in self.words.iter_mut().zip(other.words.iter()) {
            *word |= *other_word;
        }
    }
}

/// Bitwise difference: keeps the bits which are set in self, but not in other
impl<const LOG2DIM: u32> SubAssign<&Bitmask<LOG2DIM>> for Bitmask<LOG2DIM> {
    fn sub_assign(&mut self, other: &Bitmask<LOG2DIM>) {
        for (word, other_word) in self.words.iter_mut().zip(other.words.iter()) {
            *word &= !*other_word;
        }
    }
}

impl<'a, const LOG2DIM: u32> IntoIterator for &'a Bitmask<LOG2DIM> {
    type Item = u32;
    type IntoIter = BitmaskIter<'a, LOG2DIM>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct BitmaskIter<'a, const LOG2DIM: u32> {
    position: u32,
    mask: &'a Bitmask<LOG2DIM>,
}

impl<const LOG2DIM: u32> Iterator for BitmaskIter<'_, LOG2DIM> {
    type Item = u32;
    fn next(&mut self) -> Option<u32> {
        if self.position >= Bitmask::<LOG2DIM>::SIZE {
            return None;
        }
        let current = self.position;
        self.position = self.mask.find_next_on(current + 1);
        Some(current)
    }
}

#[cfg(test)]
mod bitmask_tests {
    use super::{lowest_bit, Bitmask};

    #[test]
    fn test_lowest_bit_matches_trailing_zeros() {
        for bit in 0..64 {
            assert_eq!(lowest_bit(1u64 << bit), bit);
            assert_eq!(lowest_bit(u64::MAX << bit), bit);
        }
        assert_eq!(lowest_bit(0b1011_0000), 4);
    }

    #[test]
    fn test_set_and_count() {
        let mut mask = Bitmask::<3>::new();
        assert!(mask.is_empty());
        mask.set_on(0);
        mask.set_on(63);
        mask.set_on(64);
        mask.set_on(511);
        assert!(mask.is_on(0) && mask.is_on(63) && mask.is_on(64) && mask.is_on(511));
        assert!(!mask.is_on(1));
        assert_eq!(mask.count_on(), 4);

        mask.set_off(63);
        assert!(!mask.is_on(63));
        assert_eq!(mask.count_on(), 3);
        assert_eq!(Bitmask::<3>::filled(true).count_on(), 512);
        assert_eq!(Bitmask::<1>::filled(true).count_on(), 8);
    }

    #[test]
    fn test_iteration_visits_set_bits_in_order() {
        let mut mask = Bitmask::<4>::new();
        let bits = [3, 64, 65, 700, 4095];
        for bit in bits.iter().rev() {
            mask.set_on(*bit);
        }
        assert_eq!(mask.iter().collect::<Vec<_>>(), bits.to_vec());

        // restartable
        assert_eq!(mask.iter().next(), Some(3));
        assert_eq!(mask.iter().count(), bits.len());
        assert_eq!(Bitmask::<4>::new().iter().next(), None);
    }

    #[test]
    fn test_find_next_on() {
        let mut mask = Bitmask::<3>::new();
        mask.set_on(10);
        mask.set_on(200);
        assert_eq!(mask.find_first_on(), 10);
        assert_eq!(mask.find_next_on(10), 10);
        assert_eq!(mask.find_next_on(11), 200);
        assert_eq!(mask.find_next_on(201), Bitmask::<3>::SIZE);
        assert_eq!(mask.find_next_on(5000), Bitmask::<3>::SIZE);
    }

    #[test]
    fn test_union_and_difference() {
        let mut a = Bitmask::<3>::new();
        let mut b = Bitmask::<3>::new();
        a.set_on(1);
        a.set_on(2);
        b.set_on(2);
        b.set_on(300);

        let mut only_in_b = b.clone();
        only_in_b -= &a;
        assert_eq!(only_in_b.iter().collect::<Vec<_>>(), vec![300]);

        a |= &b;
        assert_eq!(a.iter().collect::<Vec<_>>(), vec![1, 2, 300]);
    }
}
