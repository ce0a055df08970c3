use crate::object_pool::{NodeKey, ObjectPool};
use crate::spatial::Coord;
use crate::vdb::types::{VdbError, VoxelValue};
use std::collections::TryReserveError;

/// Receives the nodes visited during a descent, so later lookups can start from them
pub trait CacheSink {
    /// Registers the node at `level` containing `position`
    fn cache(&mut self, level: u32, position: Coord, key: NodeKey);
}

/// Descent without anything to remember
pub(crate) struct NoCache;

impl CacheSink for NoCache {
    #[inline]
    fn cache(&mut self, _level: u32, _position: Coord, _key: NodeKey) {}
}

///####################################################################################
/// TreeNode
///####################################################################################

/// Shared behavior of the leaf and internal nodes.
/// Every node receives the storage of the levels below it as an argument,
/// as the children are not owned directly but through `NodeLevel` pools.
pub trait TreeNode: Clone + Sized {
    type Value: VoxelValue;

    /// The leaf node type at the bottom of the chain
    type Leaf;

    /// Storage for every node below this one
    type Below: Clone + Default;

    /// log2 of the slot count along one axis
    const LOG2DIM: u32;

    /// log2 of the voxel count along one axis
    const TOTAL: u32;

    /// Leaf nodes are at level 0, each parent is one level above its children
    const LEVEL: u32;

    /// Number of slots (voxels for a leaf node)
    const SIZE: u32 = 1 << (3 * Self::LOG2DIM);

    /// Number of voxels covered by the node
    const VOXEL_COUNT: u64 = 1 << (3 * Self::TOTAL);

    /// Creates a node containing `position` with every value and state set uniformly
    fn new(position: Coord, value: Self::Value, active: bool) -> Result<Self, VdbError>;

    /// The minimum corner of the region covered by the node
    fn origin(&self) -> Coord;

    fn get_value_and_cache<'a, S: CacheSink>(
        &'a self,
        position: Coord,
        below: &'a Self::Below,
        sink: &mut S,
    ) -> &'a Self::Value;

    fn is_value_on_and_cache<S: CacheSink>(
        &self,
        position: Coord,
        below: &Self::Below,
        sink: &mut S,
    ) -> bool;

    /// Sets the voxel at `position` active with the given value,
    /// expanding tiles into child nodes where needed
    fn set_value_and_cache<S: CacheSink>(
        &mut self,
        position: Coord,
        value: Self::Value,
        below: &mut Self::Below,
        sink: &mut S,
    ) -> Result<(), VdbError>;

    /// Places a uniform tile at the given level into the region containing `position`
    fn add_tile(
        &mut self,
        position: Coord,
        level: u32,
        value: Self::Value,
        active: bool,
        below: &mut Self::Below,
    ) -> Result<(), VdbError>;

    /// Number of active voxels, an active tile counting for every voxel it covers
    fn active_value_count(&self, below: &Self::Below) -> u64;

    /// Extends the given inclusive bounds with every active value inside the node,
    /// returns true if there was any
    fn expand_active_bbox(&self, below: &Self::Below, min: &mut Coord, max: &mut Coord) -> bool;

    fn collect_leaves<'a, E>(&'a self, below: &'a Self::Below, leaves: &mut E)
    where
        E: Extend<&'a Self::Leaf>,
        Self::Leaf: 'a;

    /// Moves the active values of `other` into the places inactive in self.
    /// Child nodes of `other` are taken over from `other_below`, not copied.
    /// Pushes into `below` only fail if `reserve_below` was not called for `other_below`.
    fn merge(
        &mut self,
        other: Self,
        other_below: &mut Self::Below,
        below: &mut Self::Below,
    ) -> Result<(), VdbError>;

    /// Moves every descendant of the node from the storage `from` into `into`
    fn relocate(self, from: &mut Self::Below, into: &mut Self::Below) -> Result<Self, VdbError>;

    /// Frees every descendant of the node
    fn release(self, below: &mut Self::Below);

    /// Reserves room in `below` for every node stored in `other`
    fn reserve_below(below: &mut Self::Below, other: &Self::Below) -> Result<(), VdbError>;

    /// Frees every node in `below`, keeping the generations of the freed slots
    fn clear_below(below: &mut Self::Below);
}

///####################################################################################
/// NodeLevel
///####################################################################################

/// Owns every node of one level, together with the storage of the levels below
pub struct NodeLevel<N: TreeNode> {
    pub(crate) pool: ObjectPool<N>,
    pub(crate) below: N::Below,
}

impl<N: TreeNode> Default for NodeLevel<N> {
    fn default() -> Self {
        Self {
            pool: ObjectPool::default(),
            below: N::Below::default(),
        }
    }
}

impl<N: TreeNode> Clone for NodeLevel<N> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            below: self.below.clone(),
        }
    }
}

impl<N: TreeNode> NodeLevel<N> {
    /// Number of nodes stored at this level
    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// The node behind a child key stored inside a parent
    pub(crate) fn node(&self, key: NodeKey) -> &N {
        match self.pool.get(key) {
            Some(node) => node,
            None => panic!("Child key {key:?} does not point to a level {} node!", N::LEVEL),
        }
    }

    /// Removes the node from the storage, its descendants are left untouched
    pub(crate) fn take(&mut self, key: NodeKey) -> N {
        match self.pool.pop(key) {
            Some(node) => node,
            None => panic!("Child key {key:?} does not point to a level {} node!", N::LEVEL),
        }
    }

    pub(crate) fn push(&mut self, node: N) -> Result<NodeKey, VdbError> {
        let origin = node.origin();
        self.pool
            .push(node)
            .map_err(|err| allocation_failed(N::LEVEL, origin, err))
    }

    /// Reserves room for every node of `other` at this level and below,
    /// so moving them over afterwards can not fail
    pub(crate) fn reserve_for(&mut self, other: &NodeLevel<N>) -> Result<(), VdbError> {
        self.pool
            .try_reserve(other.len())
            .map_err(|err| allocation_failed(N::LEVEL, Coord::default(), err))?;
        N::reserve_below(&mut self.below, &other.below)
    }

    /// Frees every node at this level and below; keys handed out before stay invalid
    pub(crate) fn clear(&mut self) {
        self.pool.clear();
        N::clear_below(&mut self.below);
    }

    /// Mutable access to a node together with the storage of the levels below
    pub(crate) fn split_mut(&mut self, key: NodeKey) -> (&mut N, &mut N::Below) {
        let NodeLevel { pool, below } = self;
        match pool.get_mut(key) {
            Some(node) => (node, below),
            None => panic!("Child key {key:?} does not point to a level {} node!", N::LEVEL),
        }
    }
}

pub(crate) fn allocation_failed(level: u32, origin: Coord, err: TryReserveError) -> VdbError {
    log::warn!("Allocation of a level {level} node at {origin:?} failed: {err}");
    VdbError::AllocationFailed { level, origin }
}

/// Allocates a table of `len` copies of `fill`, reporting failure instead of aborting
pub(crate) fn try_table<E: Clone>(len: usize, fill: E) -> Result<Box<[E]>, TryReserveError> {
    let mut table = Vec::new();
    table.try_reserve_exact(len)?;
    table.resize(len, fill);
    Ok(table.into_boxed_slice())
}
