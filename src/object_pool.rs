use std::collections::TryReserveError;
use std::vec::Vec;

/// Handle to an item inside an `ObjectPool`.
/// The generation changes every time the slot is freed, so a key to a removed item
/// is detected as stale instead of resolving to whatever reuses its place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeKey {
    index: u32,
    generation: u32,
}

impl NodeKey {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// One item in a datapool with its generation
#[derive(Clone)]
struct ReusableItem<T: Clone> {
    generation: u32,
    item: Option<T>,
}

///####################################################################################
/// ObjectPool
///####################################################################################

/// Stores re-usable slots to eliminate allocation overhead when inserting and removing Nodes
#[derive(Clone)]
pub(crate) struct ObjectPool<T: Clone> {
    buffer: Vec<ReusableItem<T>>, // Pool of slots to be reused
    first_available: usize,       // the index of the first free slot, or buffer.len()
    len: usize,                   // number of occupied slots
}

impl<T: Clone> Default for ObjectPool<T> {
    fn default() -> Self {
        Self {
            buffer: Vec::new(),
            first_available: 0,
            len: 0,
        }
    }
}

impl<T> ObjectPool<T>
where
    T: Clone,
{
    #[cfg(test)]
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        ObjectPool {
            buffer: Vec::with_capacity(capacity),
            ..Default::default()
        }
    }

    fn seek_first_available(&mut self) {
        while self.first_available < self.buffer.len()
            && self.buffer[self.first_available].item.is_some()
        {
            self.first_available += 1;
        }
    }

    /// Number of occupied slots
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_empty(&self) -> bool {
        0 == self.len
    }

    /// Makes sure the next `additional` pushes succeed without allocating
    pub(crate) fn try_reserve(&mut self, additional: usize) -> Result<(), TryReserveError> {
        let free_slots = self.buffer.len() - self.len;
        self.buffer
            .try_reserve(additional.saturating_sub(free_slots))
    }

    /// Stores the item, reusing the first free slot if there is one
    pub(crate) fn push(&mut self, item: T) -> Result<NodeKey, TryReserveError> {
        self.seek_first_available();
        let index = if self.first_available < self.buffer.len() {
            self.buffer[self.first_available].item = Some(item);
            self.first_available
        } else {
            if self.buffer.len() == self.buffer.capacity() {
                // reserve less additional slots the bigger the buffer is
                let x = self.buffer.len().max(10) as f32;
                let additional = (((100. * x.log10().powf(2.)) / x) as usize).max(1);
                if self.buffer.try_reserve(additional).is_err() {
                    self.buffer.try_reserve_exact(1)?;
                }
            }
            self.buffer.push(ReusableItem {
                generation: 0,
                item: Some(item),
            });
            self.buffer.len() - 1
        };
        self.first_available = index + 1;
        self.len += 1;
        Ok(NodeKey {
            index: index as u32,
            generation: self.buffer[index].generation,
        })
    }

    /// Removes the item behind the key, invalidating every copy of the key
    pub(crate) fn pop(&mut self, key: NodeKey) -> Option<T> {
        if !self.key_is_valid(key) {
            return None;
        }
        let slot = &mut self.buffer[key.index as usize];
        slot.generation = slot.generation.wrapping_add(1);
        self.first_available = self.first_available.min(key.index as usize);
        self.len -= 1;
        slot.item.take()
    }

    #[cfg(test)]
    pub(crate) fn free(&mut self, key: NodeKey) -> bool {
        self.pop(key).is_some()
    }

    pub(crate) fn get(&self, key: NodeKey) -> Option<&T> {
        self.buffer
            .get(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.item.as_ref())
    }

    pub(crate) fn get_mut(&mut self, key: NodeKey) -> Option<&mut T> {
        self.buffer
            .get_mut(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.item.as_mut())
    }

    pub(crate) fn key_is_valid(&self, key: NodeKey) -> bool {
        self.get(key).is_some()
    }

    /// Drops every item; keys handed out before stay invalid afterwards
    pub(crate) fn clear(&mut self) {
        for slot in self.buffer.iter_mut() {
            if slot.item.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
        }
        self.first_available = 0;
        self.len = 0;
    }
}

#[cfg(test)]
mod object_pool_tests {
    use super::ObjectPool;

    #[test]
    fn test_push_pop_modify() {
        let mut pool = ObjectPool::<f32>::with_capacity(3);
        let test_value = 5.;
        let key = pool.push(test_value).expect("pool push");
        assert!(*pool.get(key).unwrap() == test_value);

        *pool.get_mut(key).unwrap() = 10.;
        assert!(*pool.get(key).unwrap() == 10.);

        assert!(pool.pop(key).unwrap() == 10.);
        assert!(pool.pop(key).is_none());
        assert!(pool.is_empty());
    }

    #[test]
    fn test_push_deallocate() {
        let mut pool = ObjectPool::<f32>::with_capacity(3);
        let key = pool.push(5.).expect("pool push");
        assert!(pool.free(key));
        assert!(!pool.free(key));
        assert!(pool.get(key).is_none());
    }

    #[test]
    fn test_edge_case_reused_item() {
        let mut pool = ObjectPool::<f32>::with_capacity(3);
        let test_value = 5.;
        let key_1 = pool.push(test_value).expect("pool push");
        pool.push(test_value * 2.).expect("pool push");
        pool.pop(key_1);
        assert!(pool.first_available == 0); // the first slot should be available

        let key_3 = pool.push(test_value * 3.).expect("pool push");
        assert_eq!(key_3.index(), key_1.index()); // the original slot is reused
        assert_ne!(key_3.generation(), key_1.generation());
        assert!(pool.get(key_1).is_none()); // the old key does not see the new value
        assert!(*pool.get(key_3).unwrap() == test_value * 3.);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_reserved_pushes_do_not_grow_the_buffer() {
        let mut pool = ObjectPool::<u32>::default();
        let key = pool.push(1).expect("pool push");
        pool.push(2).expect("pool push");
        pool.pop(key);

        pool.try_reserve(5).expect("pool reserve");
        let capacity = pool.buffer.capacity();
        assert!(capacity >= 6);
        for i in 0..5 {
            pool.push(i).expect("pool push");
        }
        assert_eq!(pool.buffer.capacity(), capacity);
        assert_eq!(pool.len(), 6);
    }

    #[test]
    fn test_clear_invalidates_keys() {
        let mut pool = ObjectPool::<u32>::default();
        let keys: Vec<_> = (0..20).map(|i| pool.push(i).expect("pool push")).collect();
        pool.clear();
        assert!(pool.is_empty());
        assert!(keys.iter().all(|k| !pool.key_is_valid(*k)));
        let key = pool.push(7).expect("pool push");
        assert_eq!(key.index(), 0);
        assert_eq!(*pool.get(key).unwrap(), 7);
    }
}
