use crate::object_pool::NodeKey;
use crate::spatial::coord::BuildCoordHasher;
use crate::spatial::{Bitmask, Coord};
use crate::vdb::node::{NodeLevel, TreeNode};
use std::collections::HashMap;

/// error types during usage of the tree
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum VdbError {
    #[error("unable to allocate a level {level} node at {origin:?}")]
    AllocationFailed { level: u32, origin: Coord },
    #[error("tiles can only be placed at levels 1..=3, not at level {0}")]
    InvalidTileLevel(u32),
}

/// Values storable inside the tree
pub trait VoxelValue: Clone + PartialEq {}
impl<T: Clone + PartialEq> VoxelValue for T {}

/// log2 of the voxel count along one axis of a leaf node
pub const LEAF_LOG2DIM: u32 = 3;
/// log2 of the slot count along one axis of a lower internal node
pub const LOWER_LOG2DIM: u32 = 4;
/// log2 of the slot count along one axis of an upper internal node
pub const UPPER_LOG2DIM: u32 = 5;
/// The level of the root node; leaf nodes are at level 0
pub const ROOT_LEVEL: u32 = 3;

pub type Leaf<T> = LeafNode<T, LEAF_LOG2DIM>;
pub type Lower<T> = InternalNode<Leaf<T>, LOWER_LOG2DIM>;
pub type Upper<T> = InternalNode<Lower<T>, UPPER_LOG2DIM>;

/// Dense block of `2^(3*LOG2DIM)` voxels at the finest resolution
#[derive(Debug, Clone)]
pub struct LeafNode<T, const LOG2DIM: u32> {
    pub(crate) origin: Coord,
    pub(crate) value_mask: Bitmask<LOG2DIM>,
    pub(crate) values: Box<[T]>,
}

/// Content of one slot inside an internal node:
/// either an owned child node or a value uniform for the whole region of the slot.
/// The active state of a tile is kept in the value mask of the node.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Slot<T> {
    Child(NodeKey),
    Tile(T),
}

/// Node with `2^(3*LOG2DIM)` slots, each covering the region of one child node
pub struct InternalNode<C: TreeNode, const LOG2DIM: u32> {
    pub(crate) origin: Coord,
    pub(crate) value_mask: Bitmask<LOG2DIM>, // active state of the tiles
    pub(crate) child_mask: Bitmask<LOG2DIM>, // slots holding a child
    pub(crate) slots: Box<[Slot<C::Value>]>,
}

impl<C: TreeNode, const LOG2DIM: u32> Clone for InternalNode<C, LOG2DIM> {
    fn clone(&self) -> Self {
        Self {
            origin: self.origin,
            value_mask: self.value_mask.clone(),
            child_mask: self.child_mask.clone(),
            slots: self.slots.clone(),
        }
    }
}

/// Content of one entry inside the root table
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RootTile<T> {
    Child(NodeKey),
    Tile { value: T, active: bool },
}

/// Unbounded sparse table of the top level regions
#[derive(Clone)]
pub struct RootNode<T: VoxelValue> {
    pub(crate) background: T,
    pub(crate) table: HashMap<Coord, RootTile<T>, BuildCoordHasher>,
    pub(crate) nodes: NodeLevel<Upper<T>>,
}

/// Sparse volume of values indexed by signed integer coordinates.
/// Every position never written resolves to the background value.
#[derive(Clone)]
pub struct Tree<T: VoxelValue> {
    pub(crate) root: RootNode<T>,
}
