use crate::object_pool::NodeKey;
use crate::spatial::{Bitmask, Coord};
use crate::vdb::node::{allocation_failed, try_table, CacheSink, NodeLevel, TreeNode};
use crate::vdb::types::{InternalNode, Slot, VdbError};

impl<T> Slot<T> {
    fn child_key(&self) -> Option<NodeKey> {
        match self {
            Slot::Child(key) => Some(*key),
            Slot::Tile(_) => None,
        }
    }
}

impl<C: TreeNode, const LOG2DIM: u32> InternalNode<C, LOG2DIM> {
    const DIM_MASK: u32 = (1 << LOG2DIM) - 1;
    const TOTAL_MASK: i32 = (1 << (LOG2DIM + C::TOTAL)) - 1;

    /// Linear offset of the slot containing the given position
    #[inline]
    pub(crate) fn coord_to_offset(position: Coord) -> u32 {
        ((((position.x & Self::TOTAL_MASK) >> C::TOTAL) as u32) << (2 * LOG2DIM))
            + ((((position.y & Self::TOTAL_MASK) >> C::TOTAL) as u32) << LOG2DIM)
            + (((position.z & Self::TOTAL_MASK) >> C::TOTAL) as u32)
    }

    /// Minimum corner of the region covered by the slot at the given offset
    pub fn offset_to_origin(&self, offset: u32) -> Coord {
        self.origin
            + Coord::new(
                (((offset >> (2 * LOG2DIM)) & Self::DIM_MASK) << C::TOTAL) as i32,
                (((offset >> LOG2DIM) & Self::DIM_MASK) << C::TOTAL) as i32,
                ((offset & Self::DIM_MASK) << C::TOTAL) as i32,
            )
    }

    pub fn value_mask(&self) -> &Bitmask<LOG2DIM> {
        &self.value_mask
    }

    pub fn child_mask(&self) -> &Bitmask<LOG2DIM> {
        &self.child_mask
    }

    /// Keys of the child nodes together with the offset of their slots, in ascending offset order
    pub fn child_keys(&self) -> impl Iterator<Item = (u32, NodeKey)> + '_ {
        self.child_mask
            .iter()
            .filter_map(move |offset| Some((offset, self.slots[offset as usize].child_key()?)))
    }

    fn child_key(&self, offset: u32) -> NodeKey {
        match &self.slots[offset as usize] {
            Slot::Child(key) => *key,
            Slot::Tile(_) => panic!("Slot {offset} marked in the child mask holds a tile!"),
        }
    }

    /// Replaces the tile at the given slot with a child node holding the same values and states
    fn materialize(
        &mut self,
        offset: u32,
        position: Coord,
        below: &mut NodeLevel<C>,
    ) -> Result<NodeKey, VdbError> {
        let value = match &self.slots[offset as usize] {
            Slot::Tile(value) => value.clone(),
            Slot::Child(key) => return Ok(*key),
        };
        let active = self.value_mask.is_on(offset);
        let key = below.push(C::new(position, value, active)?)?;
        log::trace!(
            "Level {} tile at {:?} expanded into a child node",
            C::LEVEL,
            self.offset_to_origin(offset)
        );
        self.slots[offset as usize] = Slot::Child(key);
        self.child_mask.set_on(offset);
        self.value_mask.set_off(offset);
        Ok(key)
    }
}

impl<C: TreeNode, const LOG2DIM: u32> TreeNode for InternalNode<C, LOG2DIM> {
    type Value = C::Value;
    type Leaf = C::Leaf;
    type Below = NodeLevel<C>;

    const LOG2DIM: u32 = LOG2DIM;
    const TOTAL: u32 = LOG2DIM + C::TOTAL;
    const LEVEL: u32 = C::LEVEL + 1;

    fn new(position: Coord, value: C::Value, active: bool) -> Result<Self, VdbError> {
        let origin = position.aligned(Self::TOTAL);
        let fail = |err| allocation_failed(Self::LEVEL, origin, err);
        Ok(Self {
            origin,
            value_mask: Bitmask::try_filled(active).map_err(fail)?,
            child_mask: Bitmask::try_filled(false).map_err(fail)?,
            slots: try_table(Self::SIZE as usize, Slot::Tile(value)).map_err(fail)?,
        })
    }

    fn origin(&self) -> Coord {
        self.origin
    }

    #[inline]
    fn get_value_and_cache<'a, S: CacheSink>(
        &'a self,
        position: Coord,
        below: &'a NodeLevel<C>,
        sink: &mut S,
    ) -> &'a C::Value {
        match &self.slots[Self::coord_to_offset(position) as usize] {
            Slot::Child(key) => {
                sink.cache(C::LEVEL, position, *key);
                below
                    .node(*key)
                    .get_value_and_cache(position, &below.below, sink)
            }
            Slot::Tile(value) => value,
        }
    }

    fn is_value_on_and_cache<S: CacheSink>(
        &self,
        position: Coord,
        below: &NodeLevel<C>,
        sink: &mut S,
    ) -> bool {
        let offset = Self::coord_to_offset(position);
        match &self.slots[offset as usize] {
            Slot::Child(key) => {
                sink.cache(C::LEVEL, position, *key);
                below
                    .node(*key)
                    .is_value_on_and_cache(position, &below.below, sink)
            }
            Slot::Tile(_) => self.value_mask.is_on(offset),
        }
    }

    fn set_value_and_cache<S: CacheSink>(
        &mut self,
        position: Coord,
        value: C::Value,
        below: &mut NodeLevel<C>,
        sink: &mut S,
    ) -> Result<(), VdbError> {
        let offset = Self::coord_to_offset(position);
        if let Slot::Tile(tile) = &self.slots[offset as usize] {
            if self.value_mask.is_on(offset) && *tile == value {
                // Already covered by an active tile of the same value
                return Ok(());
            }
        }
        let key = self.materialize(offset, position, below)?;
        sink.cache(C::LEVEL, position, key);
        let (child, deeper) = below.split_mut(key);
        child.set_value_and_cache(position, value, deeper, sink)
    }

    fn add_tile(
        &mut self,
        position: Coord,
        level: u32,
        value: C::Value,
        active: bool,
        below: &mut NodeLevel<C>,
    ) -> Result<(), VdbError> {
        let offset = Self::coord_to_offset(position);
        if level == Self::LEVEL {
            if let Slot::Child(key) = self.slots[offset as usize] {
                below.take(key).release(&mut below.below);
                self.child_mask.set_off(offset);
            }
            self.slots[offset as usize] = Slot::Tile(value);
            self.value_mask.set(offset, active);
            return Ok(());
        }
        let key = self.materialize(offset, position, below)?;
        let (child, deeper) = below.split_mut(key);
        child.add_tile(position, level, value, active, deeper)
    }

    fn active_value_count(&self, below: &NodeLevel<C>) -> u64 {
        let children: u64 = self
            .child_keys()
            .map(|(_, key)| below.node(key).active_value_count(&below.below))
            .sum();
        children + self.value_mask.count_on() as u64 * C::VOXEL_COUNT
    }

    fn expand_active_bbox(
        &self,
        below: &NodeLevel<C>,
        min: &mut Coord,
        max: &mut Coord,
    ) -> bool {
        let mut found = false;
        for (_, key) in self.child_keys() {
            found |= below.node(key).expand_active_bbox(&below.below, min, max);
        }
        for offset in self.value_mask.iter() {
            let tile_origin = self.offset_to_origin(offset);
            *min = min.min_component(tile_origin);
            *max = max.max_component(tile_origin.offset((1 << C::TOTAL) - 1));
            found = true;
        }
        found
    }

    fn collect_leaves<'a, E>(&'a self, below: &'a NodeLevel<C>, leaves: &mut E)
    where
        E: Extend<&'a Self::Leaf>,
        Self::Leaf: 'a,
    {
        for (_, key) in self.child_keys() {
            below.node(key).collect_leaves(&below.below, leaves);
        }
    }

    fn merge(
        &mut self,
        other: Self,
        other_below: &mut NodeLevel<C>,
        below: &mut NodeLevel<C>,
    ) -> Result<(), VdbError> {
        for (offset, other_key) in other.child_keys() {
            if self.child_mask.is_on(offset) {
                let other_child = other_below.take(other_key);
                let (child, deeper) = below.split_mut(self.child_key(offset));
                child.merge(other_child, &mut other_below.below, deeper)?;
            } else if !self.value_mask.is_on(offset) {
                // The inactive tile is replaced by the child of the other node
                let adopted = other_below
                    .take(other_key)
                    .relocate(&mut other_below.below, &mut below.below)?;
                self.slots[offset as usize] = Slot::Child(below.push(adopted)?);
                self.child_mask.set_on(offset);
            }
        }
        for offset in other.value_mask.iter() {
            if self.child_mask.is_on(offset) || self.value_mask.is_on(offset) {
                continue;
            }
            if let Slot::Tile(value) = &other.slots[offset as usize] {
                self.slots[offset as usize] = Slot::Tile(value.clone());
                self.value_mask.set_on(offset);
            }
        }
        Ok(())
    }

    fn relocate(
        mut self,
        from: &mut NodeLevel<C>,
        into: &mut NodeLevel<C>,
    ) -> Result<Self, VdbError> {
        for offset in self.child_mask.iter() {
            let slot = &mut self.slots[offset as usize];
            if let Slot::Child(key) = *slot {
                let child = from
                    .take(key)
                    .relocate(&mut from.below, &mut into.below)?;
                *slot = Slot::Child(into.push(child)?);
            }
        }
        Ok(self)
    }

    fn release(self, below: &mut NodeLevel<C>) {
        for (_, key) in self.child_keys() {
            below.take(key).release(&mut below.below);
        }
    }

    fn reserve_below(below: &mut NodeLevel<C>, other: &NodeLevel<C>) -> Result<(), VdbError> {
        below.reserve_for(other)
    }

    fn clear_below(below: &mut NodeLevel<C>) {
        below.clear();
    }
}
