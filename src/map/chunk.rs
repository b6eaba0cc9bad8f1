//! Partitioning of a flat element range into contiguous chunks.

use std::ops::Range;

/// Split `0..len` into at most `chunks` contiguous, non-empty ranges.
///
/// Fewer ranges are produced when a chunk would hold less than
/// `min_chunk_len` elements. Earlier ranges are at most one element longer
/// than later ones.
pub fn chunk_ranges(len: usize, chunks: usize, min_chunk_len: usize) -> Vec<Range<usize>> {
    if len == 0 {
        return Vec::new();
    }
    let by_size = (len / min_chunk_len.max(1)).max(1);
    let count = chunks.clamp(1, by_size).min(len);

    let base = len / count;
    let extra = len % count;
    let mut ranges = Vec::with_capacity(count);
    let mut start = 0;
    for i in 0..count {
        let size = base + usize::from(i < extra);
        ranges.push(start..start + size);
        start += size;
    }
    ranges
}

/// Borrow `slice` as disjoint mutable chunks, one per range.
///
/// `ranges` must be contiguous and start at 0, as produced by
/// [`chunk_ranges`].
pub fn split_mut<'a, T>(mut slice: &'a mut [T], ranges: &[Range<usize>]) -> Vec<&'a mut [T]> {
    let mut parts = Vec::with_capacity(ranges.len());
    for range in ranges {
        let (head, tail) = std::mem::take(&mut slice).split_at_mut(range.len());
        parts.push(head);
        slice = tail;
    }
    parts
}

/// Borrow `slice` as shared chunks, one per range.
pub fn split<'a, T>(slice: &'a [T], ranges: &[Range<usize>]) -> Vec<&'a [T]> {
    ranges.iter().map(|range| &slice[range.clone()]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_even_split() {
        assert_eq!(chunk_ranges(100, 4, 1), vec![0..25, 25..50, 50..75, 75..100]);
    }

    #[test]
    fn test_remainder_goes_first() {
        assert_eq!(chunk_ranges(10, 3, 1), vec![0..4, 4..7, 7..10]);
    }

    #[test]
    fn test_min_chunk_len_limits_count() {
        assert_eq!(chunk_ranges(10, 8, 4), vec![0..5, 5..10]);
        assert_eq!(chunk_ranges(3, 8, 4), vec![0..3]);
    }

    #[test]
    fn test_more_chunks_than_elements() {
        assert_eq!(chunk_ranges(2, 8, 1), vec![0..1, 1..2]);
        assert!(chunk_ranges(0, 8, 1).is_empty());
    }

    #[test]
    fn test_split_mut_writes_through() {
        let mut data = vec![0u8; 7];
        let ranges = chunk_ranges(data.len(), 3, 1);
        for (i, part) in split_mut(&mut data, &ranges).into_iter().enumerate() {
            part.fill(i as u8);
        }
        assert_eq!(data, vec![0, 0, 0, 1, 1, 2, 2]);
    }

    proptest! {
        #[test]
        fn test_ranges_cover_exactly(len in 0usize..2000, chunks in 0usize..32, min in 0usize..64) {
            let ranges = chunk_ranges(len, chunks, min);
            prop_assert!(ranges.len() <= chunks.max(1));
            let mut next = 0;
            for range in &ranges {
                prop_assert_eq!(range.start, next);
                prop_assert!(!range.is_empty());
                next = range.end;
            }
            prop_assert_eq!(next, len);
        }
    }
}
