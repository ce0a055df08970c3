use crate::object_pool::NodeKey;
use crate::spatial::Coord;
use crate::vdb::node::{allocation_failed, CacheSink, NodeLevel, TreeNode};
use crate::vdb::types::{Leaf, RootNode, RootTile, Upper, VdbError, VoxelValue, ROOT_LEVEL};
use std::collections::HashMap;

impl<T: VoxelValue> RootNode<T> {
    /// Creates an empty root node with the given background value
    pub fn new(background: T) -> Self {
        Self {
            background,
            table: HashMap::default(),
            nodes: NodeLevel::default(),
        }
    }

    pub fn background(&self) -> &T {
        &self.background
    }

    /// Number of entries holding a child node
    pub fn child_count(&self) -> usize {
        self.table
            .values()
            .filter(|tile| matches!(tile, RootTile::Child(_)))
            .count()
    }

    /// Number of entries holding a tile
    pub fn tile_count(&self) -> usize {
        self.table.len() - self.child_count()
    }

    /// The key of the table entry containing the given position
    #[inline]
    pub(crate) fn coord_to_key(position: Coord) -> Coord {
        position.aligned(Upper::<T>::TOTAL)
    }

    pub(crate) fn get_value_and_cache<S: CacheSink>(&self, position: Coord, sink: &mut S) -> &T {
        match self.table.get(&Self::coord_to_key(position)) {
            None => &self.background,
            Some(RootTile::Tile { value, .. }) => value,
            Some(RootTile::Child(key)) => {
                sink.cache(Upper::<T>::LEVEL, position, *key);
                self.nodes
                    .node(*key)
                    .get_value_and_cache(position, &self.nodes.below, sink)
            }
        }
    }

    pub(crate) fn is_value_on_and_cache<S: CacheSink>(&self, position: Coord, sink: &mut S) -> bool {
        match self.table.get(&Self::coord_to_key(position)) {
            None => false,
            Some(RootTile::Tile { active, .. }) => *active,
            Some(RootTile::Child(key)) => {
                sink.cache(Upper::<T>::LEVEL, position, *key);
                self.nodes
                    .node(*key)
                    .is_value_on_and_cache(position, &self.nodes.below, sink)
            }
        }
    }

    /// Returns with the child node of the entry containing `position`,
    /// creating it from the background or the tile of the entry if needed
    fn materialize(&mut self, position: Coord) -> Result<NodeKey, VdbError> {
        let key = Self::coord_to_key(position);
        let (value, active) = match self.table.get(&key) {
            Some(RootTile::Child(child_key)) => return Ok(*child_key),
            Some(RootTile::Tile { value, active }) => (value.clone(), *active),
            None => (self.background.clone(), false),
        };
        self.table
            .try_reserve(1)
            .map_err(|err| allocation_failed(ROOT_LEVEL, key, err))?;
        let child_key = self.nodes.push(Upper::<T>::new(position, value, active)?)?;
        log::trace!("Root entry {key:?} expanded into a child node");
        self.table.insert(key, RootTile::Child(child_key));
        Ok(child_key)
    }

    pub(crate) fn set_value_and_cache<S: CacheSink>(
        &mut self,
        position: Coord,
        value: T,
        sink: &mut S,
    ) -> Result<(), VdbError> {
        if let Some(RootTile::Tile {
            value: tile,
            active: true,
        }) = self.table.get(&Self::coord_to_key(position))
        {
            if *tile == value {
                return Ok(());
            }
        }
        let key = self.materialize(position)?;
        sink.cache(Upper::<T>::LEVEL, position, key);
        let (child, below) = self.nodes.split_mut(key);
        child.set_value_and_cache(position, value, below, sink)
    }

    pub(crate) fn add_tile(
        &mut self,
        position: Coord,
        level: u32,
        value: T,
        active: bool,
    ) -> Result<(), VdbError> {
        if level == ROOT_LEVEL {
            let key = Self::coord_to_key(position);
            self.table
                .try_reserve(1)
                .map_err(|err| allocation_failed(ROOT_LEVEL, key, err))?;
            if let Some(RootTile::Child(child_key)) =
                self.table.insert(key, RootTile::Tile { value, active })
            {
                let replaced = self.nodes.take(child_key);
                replaced.release(&mut self.nodes.below);
            }
            return Ok(());
        }
        let key = self.materialize(position)?;
        let (child, below) = self.nodes.split_mut(key);
        child.add_tile(position, level, value, active, below)
    }

    pub(crate) fn active_value_count(&self) -> u64 {
        self.table
            .values()
            .map(|tile| match tile {
                RootTile::Child(key) => self.nodes.node(*key).active_value_count(&self.nodes.below),
                RootTile::Tile { active: true, .. } => Upper::<T>::VOXEL_COUNT,
                RootTile::Tile { active: false, .. } => 0,
            })
            .sum()
    }

    /// Extends the given inclusive bounds with every active value, returns true if there was any
    pub(crate) fn expand_active_bbox(&self, min: &mut Coord, max: &mut Coord) -> bool {
        let mut found = false;
        for (key, tile) in self.table.iter() {
            match tile {
                RootTile::Child(child_key) => {
                    found |= self
                        .nodes
                        .node(*child_key)
                        .expand_active_bbox(&self.nodes.below, min, max)
                }
                RootTile::Tile { active: true, .. } => {
                    *min = min.min_component(*key);
                    *max = max.max_component(key.offset((1 << Upper::<T>::TOTAL) - 1));
                    found = true;
                }
                RootTile::Tile { active: false, .. } => {}
            }
        }
        found
    }

    pub(crate) fn collect_leaves<'a, E>(&'a self, leaves: &mut E)
    where
        E: Extend<&'a Leaf<T>>,
    {
        for tile in self.table.values() {
            if let RootTile::Child(key) = tile {
                self.nodes
                    .node(*key)
                    .collect_leaves(&self.nodes.below, leaves);
            }
        }
    }

    /// Takes over the active values of `other` wherever self is inactive.
    /// Child nodes of `other` are moved, not copied.
    /// Storage for every moved node is reserved up front, so on failure self is left untouched.
    pub(crate) fn merge(&mut self, other: RootNode<T>) -> Result<(), VdbError> {
        let RootNode {
            table: other_table,
            nodes: mut other_nodes,
            ..
        } = other;
        self.table
            .try_reserve(other_table.len())
            .map_err(|err| allocation_failed(ROOT_LEVEL, Coord::default(), err))?;
        self.nodes.reserve_for(&other_nodes)?;
        for (key, other_tile) in other_table {
            match other_tile {
                RootTile::Child(other_key) => match self.table.get(&key) {
                    Some(RootTile::Child(child_key)) => {
                        let other_child = other_nodes.take(other_key);
                        let (child, below) = self.nodes.split_mut(*child_key);
                        child.merge(other_child, &mut other_nodes.below, below)?;
                    }
                    Some(RootTile::Tile { active: true, .. }) => {}
                    _ => {
                        // Nothing or an inactive tile: the child of the other root is taken over
                        let adopted = other_nodes
                            .take(other_key)
                            .relocate(&mut other_nodes.below, &mut self.nodes.below)?;
                        let child_key = self.nodes.push(adopted)?;
                        self.table.insert(key, RootTile::Child(child_key));
                    }
                },
                RootTile::Tile {
                    value,
                    active: true,
                } => {
                    if matches!(
                        self.table.get(&key),
                        None | Some(RootTile::Tile { active: false, .. })
                    ) {
                        self.table.insert(key, RootTile::Tile { value, active: true });
                    }
                }
                RootTile::Tile { active: false, .. } => {}
            }
        }
        Ok(())
    }

    /// Removes every value and node, keeping only the background
    pub(crate) fn clear(&mut self) {
        self.table.clear();
        self.nodes.clear();
    }

    pub(crate) fn nodes(&self) -> &NodeLevel<Upper<T>> {
        &self.nodes
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut NodeLevel<Upper<T>> {
        &mut self.nodes
    }
}
