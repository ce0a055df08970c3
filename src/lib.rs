pub mod spatial;
pub mod vdb;

pub(crate) mod object_pool;

pub use object_pool::NodeKey;
pub use spatial::Coord;
pub use vdb::{ReadAccessor, Tree, ValueAccessor, VdbError};
