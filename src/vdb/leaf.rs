use crate::spatial::{Bitmask, Coord};
use crate::vdb::node::{allocation_failed, try_table, CacheSink, TreeNode};
use crate::vdb::types::{LeafNode, VdbError, VoxelValue};

impl<T: VoxelValue, const LOG2DIM: u32> LeafNode<T, LOG2DIM> {
    const DIM_MASK: i32 = (1 << LOG2DIM) - 1;

    /// Linear offset of the voxel at the given position inside the node
    #[inline]
    pub(crate) fn coord_to_offset(position: Coord) -> u32 {
        (((position.x & Self::DIM_MASK) as u32) << (2 * LOG2DIM))
            + (((position.y & Self::DIM_MASK) as u32) << LOG2DIM)
            + ((position.z & Self::DIM_MASK) as u32)
    }

    /// Global position of the voxel at the given linear offset
    pub fn offset_to_coord(&self, offset: u32) -> Coord {
        let dim_mask = Self::DIM_MASK as u32;
        self.origin
            + Coord::new(
                ((offset >> (2 * LOG2DIM)) & dim_mask) as i32,
                ((offset >> LOG2DIM) & dim_mask) as i32,
                (offset & dim_mask) as i32,
            )
    }

    pub fn value_mask(&self) -> &Bitmask<LOG2DIM> {
        &self.value_mask
    }

    /// The value of the voxel at the given linear offset
    pub fn value_at(&self, offset: u32) -> &T {
        &self.values[offset as usize]
    }

    /// The value of the voxel at the given position, regardless of its state
    #[inline]
    pub fn get_value(&self, position: &Coord) -> &T {
        &self.values[Self::coord_to_offset(*position) as usize]
    }

    #[inline]
    pub fn is_value_on(&self, position: &Coord) -> bool {
        self.value_mask.is_on(Self::coord_to_offset(*position))
    }

    /// Overwrites the voxel at the given position and marks it active
    #[inline]
    pub fn set_value(&mut self, position: &Coord, value: T) {
        let offset = Self::coord_to_offset(*position);
        self.value_mask.set_on(offset);
        self.values[offset as usize] = value;
    }

    /// Visits the active voxels with their global positions, in ascending offset order
    pub fn iter_active(&self) -> impl Iterator<Item = (Coord, &T)> + '_ {
        self.value_mask
            .iter()
            .map(move |offset| (self.offset_to_coord(offset), &self.values[offset as usize]))
    }
}

impl<T: VoxelValue, const LOG2DIM: u32> TreeNode for LeafNode<T, LOG2DIM> {
    type Value = T;
    type Leaf = Self;
    type Below = ();

    const LOG2DIM: u32 = LOG2DIM;
    const TOTAL: u32 = LOG2DIM;
    const LEVEL: u32 = 0;

    fn new(position: Coord, value: T, active: bool) -> Result<Self, VdbError> {
        let origin = position.aligned(LOG2DIM);
        let fail = |err| allocation_failed(0, origin, err);
        Ok(Self {
            origin,
            value_mask: Bitmask::try_filled(active).map_err(fail)?,
            values: try_table(Self::SIZE as usize, value).map_err(fail)?,
        })
    }

    fn origin(&self) -> Coord {
        self.origin
    }

    #[inline]
    fn get_value_and_cache<'a, S: CacheSink>(
        &'a self,
        position: Coord,
        _below: &'a (),
        _sink: &mut S,
    ) -> &'a T {
        self.get_value(&position)
    }

    #[inline]
    fn is_value_on_and_cache<S: CacheSink>(
        &self,
        position: Coord,
        _below: &(),
        _sink: &mut S,
    ) -> bool {
        self.is_value_on(&position)
    }

    #[inline]
    fn set_value_and_cache<S: CacheSink>(
        &mut self,
        position: Coord,
        value: T,
        _below: &mut (),
        _sink: &mut S,
    ) -> Result<(), VdbError> {
        self.set_value(&position, value);
        Ok(())
    }

    fn add_tile(
        &mut self,
        _position: Coord,
        level: u32,
        _value: T,
        _active: bool,
        _below: &mut (),
    ) -> Result<(), VdbError> {
        // leaf nodes hold voxels only
        Err(VdbError::InvalidTileLevel(level))
    }

    fn active_value_count(&self, _below: &()) -> u64 {
        self.value_mask.count_on() as u64
    }

    fn expand_active_bbox(&self, _below: &(), min: &mut Coord, max: &mut Coord) -> bool {
        for offset in self.value_mask.iter() {
            let position = self.offset_to_coord(offset);
            *min = min.min_component(position);
            *max = max.max_component(position);
        }
        !self.value_mask.is_empty()
    }

    fn collect_leaves<'a, E>(&'a self, _below: &'a (), leaves: &mut E)
    where
        E: Extend<&'a Self::Leaf>,
        Self::Leaf: 'a,
    {
        leaves.extend(std::iter::once(self));
    }

    fn merge(&mut self, other: Self, _other_below: &mut (), _below: &mut ()) -> Result<(), VdbError> {
        let mut taken = other.value_mask.clone();
        taken -= &self.value_mask;
        for offset in taken.iter() {
            self.values[offset as usize] = other.values[offset as usize].clone();
        }
        self.value_mask |= &other.value_mask;
        Ok(())
    }

    fn relocate(self, _from: &mut (), _into: &mut ()) -> Result<Self, VdbError> {
        Ok(self)
    }

    fn release(self, _below: &mut ()) {}

    fn reserve_below(_below: &mut (), _other: &()) -> Result<(), VdbError> {
        Ok(())
    }

    fn clear_below(_below: &mut ()) {}
}
