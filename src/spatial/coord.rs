use std::hash::{BuildHasherDefault, Hash, Hasher};
use std::ops::{Add, AddAssign, BitAnd, Index, IndexMut, Sub, SubAssign};

/// Signed integer index of a voxel in 3 dimensional space
#[derive(Default, Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
#[repr(C)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Coord {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub const fn unit(scale: i32) -> Self {
        Self {
            x: scale,
            y: scale,
            z: scale,
        }
    }

    /// Returns with the coordinate moved by the given amounts along each axis
    pub fn offset_by(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// Returns with the coordinate moved by the same amount along every axis
    pub fn offset(self, n: i32) -> Self {
        self.offset_by(n, n, n)
    }

    /// Component-wise minimum
    pub fn min_component(self, other: Coord) -> Self {
        Self::new(
            self.x.min(other.x),
            self.y.min(other.y),
            self.z.min(other.z),
        )
    }

    /// Component-wise maximum
    pub fn max_component(self, other: Coord) -> Self {
        Self::new(
            self.x.max(other.x),
            self.y.max(other.y),
            self.z.max(other.z),
        )
    }

    /// Aligns the coordinate to the origin of the enclosing block of size `2^log2_size`
    pub fn aligned(self, log2_size: u32) -> Self {
        self & !((1i32 << log2_size) - 1)
    }

    /// Hash key mixing the three components with large primes.
    /// Only stable inside one process, it is never persisted.
    pub fn hash_key(&self) -> u64 {
        let mixed = self.x.wrapping_mul(73856093)
            ^ self.y.wrapping_mul(19349663)
            ^ self.z.wrapping_mul(83492791);
        mixed as u32 as u64
    }
}

impl BitAnd<i32> for Coord {
    type Output = Coord;
    fn bitand(self, mask: i32) -> Coord {
        Coord::new(self.x & mask, self.y & mask, self.z & mask)
    }
}

impl BitAnd<u32> for Coord {
    type Output = Coord;
    fn bitand(self, mask: u32) -> Coord {
        self & (mask as i32)
    }
}

impl Index<usize> for Coord {
    type Output = i32;
    fn index(&self, axis: usize) -> &i32 {
        match axis {
            0 => &self.x,
            1 => &self.y,
            2 => &self.z,
            _ => panic!("Coord axis index out of range: {axis}"),
        }
    }
}

impl IndexMut<usize> for Coord {
    fn index_mut(&mut self, axis: usize) -> &mut i32 {
        match axis {
            0 => &mut self.x,
            1 => &mut self.y,
            2 => &mut self.z,
            _ => panic!("Coord axis index out of range: {axis}"),
        }
    }
}

impl Add for Coord {
    type Output = Coord;
    fn add(self, other: Coord) -> Coord {
        Coord::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl Sub for Coord {
    type Output = Coord;
    fn sub(self, other: Coord) -> Coord {
        Coord::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl AddAssign for Coord {
    fn add_assign(&mut self, other: Coord) {
        *self = *self + other;
    }
}

impl SubAssign for Coord {
    fn sub_assign(&mut self, other: Coord) {
        *self = *self - other;
    }
}

impl Hash for Coord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash_key());
    }
}

impl From<[i32; 3]> for Coord {
    fn from(vec: [i32; 3]) -> Coord {
        Coord::new(vec[0], vec[1], vec[2])
    }
}

impl From<(i32, i32, i32)> for Coord {
    fn from((x, y, z): (i32, i32, i32)) -> Coord {
        Coord::new(x, y, z)
    }
}

impl From<Coord> for [i32; 3] {
    fn from(coord: Coord) -> [i32; 3] {
        [coord.x, coord.y, coord.z]
    }
}

///####################################################################################
/// CoordHasher
///####################################################################################

/// Passes the already mixed `Coord::hash_key` through to the hash table
#[derive(Default, Clone, Copy)]
pub struct CoordHasher {
    state: u64,
}

impl Hasher for CoordHasher {
    fn finish(&self) -> u64 {
        self.state
    }

    fn write(&mut self, bytes: &[u8]) {
        // Only reached for keys other than Coord
        for byte in bytes {
            self.state = self.state.rotate_left(8) ^ (*byte as u64);
        }
    }

    fn write_u64(&mut self, key: u64) {
        // spread the 32 bit key into the high bits the table probes with
        self.state ^= key.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    }
}

pub type BuildCoordHasher = BuildHasherDefault<CoordHasher>;
