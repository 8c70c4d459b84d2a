//! Fixed-size batching for bulk store calls

use std::num::NonZeroUsize;

/// Default number of records per store round-trip
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Split `items` into contiguous batches of at most `size` records.
///
/// The iterator is lazy and borrows `items`; calling again restarts from the
/// beginning.
pub fn batches<T>(items: &[T], size: NonZeroUsize) -> std::slice::Chunks<'_, T> {
    items.chunks(size.get())
}

/// Number of batches `batches` yields for `len` records
pub fn batch_count(len: usize, size: NonZeroUsize) -> usize {
    len.div_ceil(size.get())
}
