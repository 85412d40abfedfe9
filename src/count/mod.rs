//! In-memory prefix-bucketed counting: the bridge between the rolling
//! `KmerEncoder` and the persisted on-disk blocks.

mod array;
mod bucket;
mod packed_array;

pub use array::{BlockSink, CountArray};
pub use bucket::Bucket;
pub use packed_array::PackedArray;
