//! Transfer geometry planning.
//!
//! Once the transport reports its negotiated per-write byte budget, the
//! image is carved into blocks of chunks. Blocks exist for progress
//! granularity only; chunks are the unit of flow control.

use std::ops::Range;

use thiserror::Error;

use crate::protocol::constants::{CIPHER_GROUP_SIZE, MAX_CHUNK_LEN};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// The budget cannot carry even one cipher group.
    #[error("byte budget {budget} cannot carry a single cipher group")]
    InvalidBudget { budget: usize },
    /// There is nothing to transfer.
    #[error("firmware image is empty")]
    EmptyImage,
}

/// Chunk and block geometry for one transfer. Immutable once computed;
/// a new connection gets a fresh plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPlan {
    image_len: usize,
    block_size: usize,
    chunk_size: usize,
    chunks_per_block: usize,
    number_of_blocks: usize,
}

impl TransferPlan {
    /// Compute the geometry for an image under a negotiated byte budget.
    ///
    /// The chunk size is the budget rounded down to a whole number of
    /// cipher groups, capped at [`MAX_CHUNK_LEN`] so the plaintext length
    /// always fits the one-byte wire header. The block size is the larger
    /// of the requested size and the chunk size, clamped to the image when
    /// the image is smaller than either.
    pub fn compute(
        image_len: usize,
        requested_block_size: usize,
        byte_budget: usize,
    ) -> Result<Self, PlanError> {
        if image_len == 0 {
            return Err(PlanError::EmptyImage);
        }

        let mut chunk_size = (byte_budget / CIPHER_GROUP_SIZE * CIPHER_GROUP_SIZE).min(MAX_CHUNK_LEN);
        if chunk_size == 0 {
            return Err(PlanError::InvalidBudget {
                budget: byte_budget,
            });
        }

        let mut block_size = requested_block_size.max(chunk_size);
        if block_size > image_len {
            block_size = image_len;
            if chunk_size > block_size {
                chunk_size = block_size;
            }
        }

        Ok(Self {
            image_len,
            block_size,
            chunk_size,
            chunks_per_block: block_size.div_ceil(chunk_size),
            number_of_blocks: image_len.div_ceil(block_size),
        })
    }

    pub fn image_len(&self) -> usize {
        self.image_len
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Chunks in a full-size block. The final block may hold fewer; see
    /// [`Self::chunks_in_block`].
    pub fn chunks_per_block(&self) -> usize {
        self.chunks_per_block
    }

    pub fn number_of_blocks(&self) -> usize {
        self.number_of_blocks
    }

    /// Byte range of a block. The final block may be short.
    pub fn block_range(&self, block: usize) -> Range<usize> {
        let start = block * self.block_size;
        start..(start + self.block_size).min(self.image_len)
    }

    /// Number of chunks carried by the given block.
    pub fn chunks_in_block(&self, block: usize) -> usize {
        self.block_range(block).len().div_ceil(self.chunk_size)
    }

    /// Byte range of a chunk within a block. The final chunk of a block
    /// may be short, possibly shorter than one cipher group.
    pub fn chunk_range(&self, block: usize, chunk: usize) -> Range<usize> {
        let block_range = self.block_range(block);
        let start = block_range.start + chunk * self.chunk_size;
        start..(start + self.chunk_size).min(block_range.end)
    }

    pub fn is_last_block(&self, block: usize) -> bool {
        block + 1 == self.number_of_blocks
    }

    pub fn is_last_chunk_in_block(&self, block: usize, chunk: usize) -> bool {
        chunk + 1 == self.chunks_in_block(block)
    }

    /// True for the final chunk of the final block.
    pub fn is_final_chunk(&self, block: usize, chunk: usize) -> bool {
        self.is_last_block(block) && self.is_last_chunk_in_block(block, chunk)
    }
}
