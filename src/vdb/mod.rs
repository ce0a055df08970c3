pub mod accessor;
pub mod internal;
pub mod leaf;
pub mod node;
pub mod root;
pub mod types;


pub use accessor::{ReadAccessor, ValueAccessor};
pub use node::{CacheSink, NodeLevel, TreeNode};
pub use types::{
    InternalNode, Leaf, LeafNode, Lower, RootNode, Tree, Upper, VdbError, VoxelValue,
    LEAF_LOG2DIM, LOWER_LOG2DIM, ROOT_LEVEL, UPPER_LOG2DIM,
};

use crate::spatial::Coord;
use node::NoCache;

impl<T: VoxelValue + num_traits::Zero> Default for Tree<T> {
    fn default() -> Self {
        Self::new(T::zero())
    }
}

impl<T: VoxelValue> Tree<T> {
    /// Creates an empty tree, every position resolving to the given background value
    pub fn new(background: T) -> Self {
        Self {
            root: RootNode::new(background),
        }
    }

    pub fn background(&self) -> &T {
        self.root.background()
    }

    pub fn root(&self) -> &RootNode<T> {
        &self.root
    }

    /// Sets the voxel at the given position active with the given value
    pub fn set_value(&mut self, position: &Coord, value: T) -> Result<(), VdbError> {
        self.root.set_value_and_cache(*position, value, &mut NoCache)
    }

    /// The value at the given position: the voxel, the enclosing tile or the background
    pub fn get_value(&self, position: &Coord) -> &T {
        self.root.get_value_and_cache(*position, &mut NoCache)
    }

    pub fn is_value_on(&self, position: &Coord) -> bool {
        self.root.is_value_on_and_cache(*position, &mut NoCache)
    }

    /// Places a uniform tile covering the node region of the given level around `position`.
    /// Level 1 covers 8³ voxels, level 2 covers 128³ voxels, level 3 covers 4096³ voxels.
    pub fn add_tile(
        &mut self,
        position: &Coord,
        level: u32,
        value: T,
        active: bool,
    ) -> Result<(), VdbError> {
        if !(1..=ROOT_LEVEL).contains(&level) {
            return Err(VdbError::InvalidTileLevel(level));
        }
        log::debug!("Adding level {level} tile at {position:?}");
        self.root.add_tile(*position, level, value, active)
    }

    /// Number of active voxels, an active tile counting for every voxel it covers
    pub fn active_value_count(&self) -> u64 {
        self.root.active_value_count()
    }

    /// Inclusive bounds of every active value, or None if there is no active value
    pub fn active_bbox(&self) -> Option<(Coord, Coord)> {
        let mut min = Coord::unit(i32::MAX);
        let mut max = Coord::unit(i32::MIN);
        if self.root.expand_active_bbox(&mut min, &mut max) {
            Some((min, max))
        } else {
            None
        }
    }

    /// Appends every leaf node of the tree to the given collection
    pub fn leaf_nodes<'a, E>(&'a self, leaves: &mut E)
    where
        E: Extend<&'a Leaf<T>>,
    {
        self.root.collect_leaves(leaves);
    }

    pub fn leaves(&self) -> Vec<&Leaf<T>> {
        let mut leaves = Vec::new();
        self.leaf_nodes(&mut leaves);
        leaves
    }

    /// Takes over the active values of `other` wherever this tree is inactive.
    /// Nodes of `other` are moved instead of being copied.
    pub fn merge(&mut self, other: Tree<T>) -> Result<(), VdbError> {
        log::debug!(
            "Merging a tree of {} root entries into one of {}",
            other.root.table.len(),
            self.root.table.len()
        );
        self.root.merge(other.root)
    }

    /// Same as `merge`, leaving `other` as an empty tree with its background value
    pub fn merge_from(&mut self, other: &mut Tree<T>) -> Result<(), VdbError> {
        let emptied = Tree::new(other.background().clone());
        self.merge(std::mem::replace(other, emptied))
    }

    /// Removes every value, keeping only the background
    pub fn clear(&mut self) {
        log::debug!("Clearing tree of {} root entries", self.root.table.len());
        self.root.clear();
    }

    /// Cached random access for reading and writing values
    pub fn accessor(&mut self) -> ValueAccessor<'_, T> {
        ValueAccessor::new(self)
    }

    /// Cached random access for reading values
    pub fn read_accessor(&self) -> ReadAccessor<'_, T> {
        ReadAccessor::new(self)
    }
}
