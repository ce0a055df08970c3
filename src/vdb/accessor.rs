use crate::object_pool::NodeKey;
use crate::spatial::Coord;
use crate::vdb::node::{CacheSink, TreeNode};
use crate::vdb::types::{
    RootNode, Tree, VdbError, VoxelValue, LEAF_LOG2DIM, LOWER_LOG2DIM, UPPER_LOG2DIM,
};

/// log2 of the region size covered by a cached node, for each cached level
const CACHED_TOTALS: [u32; 3] = [
    LEAF_LOG2DIM,
    LEAF_LOG2DIM + LOWER_LOG2DIM,
    LEAF_LOG2DIM + LOWER_LOG2DIM + UPPER_LOG2DIM,
];

///####################################################################################
/// NodeCache
///####################################################################################

/// The last visited leaf, lower and upper node, each with the aligned key of its region
#[derive(Default, Clone, Copy, Debug)]
pub(crate) struct NodeCache {
    entries: [Option<(Coord, NodeKey)>; 3],
}

impl NodeCache {
    /// The node cached at `level` if its region contains `position`
    #[inline]
    fn hit(&self, level: usize, position: Coord) -> Option<NodeKey> {
        match self.entries[level] {
            Some((region, key)) if region == position.aligned(CACHED_TOTALS[level]) => Some(key),
            _ => None,
        }
    }

    fn invalidate(&mut self, level: usize) {
        log::trace!("Stale level {level} node dropped from the accessor cache");
        self.entries[level] = None;
    }

    fn clear(&mut self) {
        self.entries = [None; 3];
    }

    /// Value lookup starting from the lowest cached node containing `position`
    fn get_value<'t, T: VoxelValue>(&mut self, root: &'t RootNode<T>, position: Coord) -> &'t T {
        let uppers = root.nodes();
        let lowers = &uppers.below;
        let leaves = &lowers.below;
        if let Some(key) = self.hit(0, position) {
            match leaves.pool.get(key) {
                Some(leaf) => return leaf.get_value(&position),
                None => self.invalidate(0),
            }
        }
        if let Some(key) = self.hit(1, position) {
            match lowers.pool.get(key) {
                Some(node) => return node.get_value_and_cache(position, leaves, self),
                None => self.invalidate(1),
            }
        }
        if let Some(key) = self.hit(2, position) {
            match uppers.pool.get(key) {
                Some(node) => return node.get_value_and_cache(position, lowers, self),
                None => self.invalidate(2),
            }
        }
        root.get_value_and_cache(position, self)
    }

    fn is_value_on<T: VoxelValue>(&mut self, root: &RootNode<T>, position: Coord) -> bool {
        let uppers = root.nodes();
        let lowers = &uppers.below;
        let leaves = &lowers.below;
        if let Some(key) = self.hit(0, position) {
            match leaves.pool.get(key) {
                Some(leaf) => return leaf.is_value_on(&position),
                None => self.invalidate(0),
            }
        }
        if let Some(key) = self.hit(1, position) {
            match lowers.pool.get(key) {
                Some(node) => return node.is_value_on_and_cache(position, leaves, self),
                None => self.invalidate(1),
            }
        }
        if let Some(key) = self.hit(2, position) {
            match uppers.pool.get(key) {
                Some(node) => return node.is_value_on_and_cache(position, lowers, self),
                None => self.invalidate(2),
            }
        }
        root.is_value_on_and_cache(position, self)
    }

    fn set_value<T: VoxelValue>(
        &mut self,
        root: &mut RootNode<T>,
        position: Coord,
        value: T,
    ) -> Result<(), VdbError> {
        let uppers = root.nodes_mut();
        if let Some(key) = self.hit(0, position) {
            match uppers.below.below.pool.get_mut(key) {
                Some(leaf) => {
                    leaf.set_value(&position, value);
                    return Ok(());
                }
                None => self.invalidate(0),
            }
        }
        if let Some(key) = self.hit(1, position) {
            let lowers = &mut uppers.below;
            match lowers.pool.get_mut(key) {
                Some(node) => {
                    return node.set_value_and_cache(position, value, &mut lowers.below, self)
                }
                None => self.invalidate(1),
            }
        }
        if let Some(key) = self.hit(2, position) {
            match uppers.pool.get_mut(key) {
                Some(node) => {
                    return node.set_value_and_cache(position, value, &mut uppers.below, self)
                }
                None => self.invalidate(2),
            }
        }
        root.set_value_and_cache(position, value, self)
    }
}

impl CacheSink for NodeCache {
    #[inline]
    fn cache(&mut self, level: u32, position: Coord, key: NodeKey) {
        let level = level as usize;
        self.entries[level] = Some((position.aligned(CACHED_TOTALS[level]), key));
    }
}

///####################################################################################
/// ValueAccessor
///####################################################################################

/// Random access into a tree, remembering the last visited node of each level.
/// Lookups close to the previous one skip the descent from the root.
pub struct ValueAccessor<'a, T: VoxelValue> {
    tree: &'a mut Tree<T>,
    cache: NodeCache,
}

impl<'a, T: VoxelValue> ValueAccessor<'a, T> {
    pub fn new(tree: &'a mut Tree<T>) -> Self {
        Self {
            tree,
            cache: NodeCache::default(),
        }
    }

    /// The value at the given position, same as `Tree::get_value`
    pub fn get_value(&mut self, position: &Coord) -> &T {
        self.cache.get_value(&self.tree.root, *position)
    }

    pub fn is_value_on(&mut self, position: &Coord) -> bool {
        self.cache.is_value_on(&self.tree.root, *position)
    }

    /// Sets the voxel active with the given value, same as `Tree::set_value`
    pub fn set_value(&mut self, position: &Coord, value: T) -> Result<(), VdbError> {
        self.cache.set_value(&mut self.tree.root, *position, value)
    }

    /// True if a node of the given level (0: leaf, 1: lower, 2: upper) containing the position is cached
    pub fn is_cached(&self, position: &Coord, level: u32) -> bool {
        level < 3 && self.cache.hit(level as usize, *position).is_some()
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    pub fn tree(&self) -> &Tree<T> {
        self.tree
    }
}

///####################################################################################
/// ReadAccessor
///####################################################################################

/// Read-only variant of `ValueAccessor`; any number of them may share one tree,
/// including from different threads.
pub struct ReadAccessor<'a, T: VoxelValue> {
    tree: &'a Tree<T>,
    cache: NodeCache,
}

impl<'a, T: VoxelValue> ReadAccessor<'a, T> {
    pub fn new(tree: &'a Tree<T>) -> Self {
        Self {
            tree,
            cache: NodeCache::default(),
        }
    }

    pub fn get_value(&mut self, position: &Coord) -> &'a T {
        let tree: &'a Tree<T> = self.tree;
        self.cache.get_value(&tree.root, *position)
    }

    pub fn is_value_on(&mut self, position: &Coord) -> bool {
        self.cache.is_value_on(&self.tree.root, *position)
    }

    pub fn is_cached(&self, position: &Coord, level: u32) -> bool {
        level < 3 && self.cache.hit(level as usize, *position).is_some()
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }
}
