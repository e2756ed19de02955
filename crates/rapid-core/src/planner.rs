// Segmentation planner: how many chunks, and which byte range each one owns.

const MIB: u64 = 1024 * 1024;

/// Decide how many chunks to split a resource of `size` bytes into.
///
/// Unknown or small resources are never split. For larger resources the
/// part size grows with the order of magnitude of the resource, so a
/// multi-gigabyte file doesn't explode into thousands of range requests:
/// with `t` the number of decimal digits of the size in MiB minus one,
/// the part size is `min_chunk_size * (t+1)^t`.
pub fn chunk_count(size: Option<u64>, min_chunk_size: u64) -> usize {
    let Some(size) = size else {
        return 1;
    };
    if min_chunk_size == 0 || size < min_chunk_size {
        return 1;
    }

    let mut t = 0u32;
    let mut mib = size / MIB;
    while mib >= 10 {
        mib /= 10;
        t += 1;
    }

    let part_size = min_chunk_size.saturating_mul((t as u64 + 1).pow(t));
    (size / part_size).max(1) as usize
}

/// Inclusive byte range of chunk `index` out of `chunk_count` for a
/// resource of `size` bytes (`size` must be positive). Every chunk but the
/// last spans `size / chunk_count` bytes; the last one absorbs the
/// remainder and ends at `size - 1`.
pub fn range_of(index: usize, chunk_count: usize, size: u64) -> (u64, u64) {
    debug_assert!(size > 0 && chunk_count > 0 && index < chunk_count);

    let base = size / chunk_count as u64;
    let start = index as u64 * base;
    let end = if index == chunk_count - 1 {
        size - 1
    } else {
        start + base - 1
    };

    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_size_is_single_chunk() {
        assert_eq!(chunk_count(None, 5 * MIB), 1);
    }

    #[test]
    fn test_small_size_is_single_chunk() {
        assert_eq!(chunk_count(Some(MIB), 5 * MIB), 1);
        assert_eq!(chunk_count(Some(5 * MIB - 1), 5 * MIB), 1);
    }

    #[test]
    fn test_50_mib_splits() {
        // 50 MiB: t = 1, part size = 5 MiB * 2 = 10 MiB → 5 chunks
        assert_eq!(chunk_count(Some(50 * MIB), 5 * MIB), 5);
    }

    #[test]
    fn test_1_gib_dampened() {
        // 1024 MiB: t = 3, part size = 5 MiB * 4^3 = 320 MiB → 3 chunks
        assert_eq!(chunk_count(Some(1024 * MIB), 5 * MIB), 3);
    }

    #[test]
    fn test_sub_mib_sizes_with_tiny_threshold() {
        // size under 1 MiB: t = 0, part size equals the threshold
        assert_eq!(chunk_count(Some(4096), 1024), 4);
    }

    #[test]
    fn test_zero_threshold_is_single_chunk() {
        assert_eq!(chunk_count(Some(10 * MIB), 0), 1);
    }

    #[test]
    fn test_ranges_cover_exactly_once() {
        for (size, count) in [(10u64, 3usize), (4096, 4), (50 * MIB, 5), (7, 1)] {
            let mut expected_start = 0u64;
            for index in 0..count {
                let (start, end) = range_of(index, count, size);
                assert_eq!(start, expected_start, "gap or overlap at chunk {index}");
                assert!(start <= end);
                expected_start = end + 1;
            }
            assert_eq!(expected_start, size, "chunks must cover [0, size-1]");
        }
    }

    #[test]
    fn test_last_chunk_absorbs_remainder() {
        // size 10, 3 chunks: base 3 → [0,2] [3,5] [6,9]
        assert_eq!(range_of(0, 3, 10), (0, 2));
        assert_eq!(range_of(1, 3, 10), (3, 5));
        assert_eq!(range_of(2, 3, 10), (6, 9));
    }

    #[test]
    fn test_intermediate_chunks_share_base_size() {
        let size = 50 * MIB;
        let count = chunk_count(Some(size), 5 * MIB);
        let base = size / count as u64;
        for index in 0..count - 1 {
            let (start, end) = range_of(index, count, size);
            assert_eq!(end - start + 1, base);
        }
    }

    #[test]
    fn test_single_chunk_spans_everything() {
        assert_eq!(range_of(0, 1, 1234), (0, 1233));
    }
}
