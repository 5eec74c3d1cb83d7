//! Partition view: the (item → leaf) mapping a built R-tree exposes.

/// A two-column view over a built tree's leaf packing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartitionView {
    /// Original input positions, in leaf-packing order.
    pub indices: Vec<u32>,
    /// For each entry of `indices`, the leaf it belongs to. Values form a
    /// contiguous range starting at zero.
    pub partition_id: Vec<u32>,
}

impl PartitionView {
    /// Number of distinct partitions represented, i.e. `max(partition_id) + 1`.
    #[must_use]
    pub fn num_partitions(&self) -> usize {
        self.partition_id.iter().max().map_or(0, |m| *m as usize + 1)
    }
}

/// Computes `partition_id` by chunking `num_items` positions into groups of
/// `capacity`, left to right; the last group absorbs whatever remains.
#[must_use]
pub fn chunk_partition_ids(num_items: usize, capacity: usize) -> Vec<u32> {
    let capacity = capacity.max(1);
    (0..num_items).map(|i| (i / capacity) as u32).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remainder_goes_to_last_partition() {
        // N = 5, capacity = 2: groups of 2, 2, 1.
        let ids = chunk_partition_ids(5, 2);
        assert_eq!(ids, vec![0, 0, 1, 1, 2]);
        let view = PartitionView { indices: (0..5).collect(), partition_id: ids };
        assert_eq!(view.num_partitions(), 3);
    }

    #[test]
    fn empty_input_has_no_partitions() {
        let view = PartitionView { indices: Vec::new(), partition_id: chunk_partition_ids(0, 4) };
        assert_eq!(view.num_partitions(), 0);
    }
}
