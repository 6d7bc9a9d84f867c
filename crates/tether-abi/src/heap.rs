//! BoundaryHeap — the flat addressable byte space behind the native boundary
//!
//! Native memory is modeled as one contiguous byte buffer accessed only as
//! aligned 8/16/32/64-bit reads and writes at explicit numeric offsets; every
//! "pointer" in the bridge is such an offset. Offset 0 is reserved so a zero
//! word always means null.
//!
//! The buffer is partitioned into three regions:
//!
//! - **data** — permanent allocations (class instances, registration-time
//!   storage), bump-allocated upward, never reclaimed
//! - **pool** — checkpoint/restore scratch, bump-allocated upward
//! - **stack** — save/restore scratch for per-call temporaries (marshalled
//!   strings, vectors, buffer descriptors), bump-allocated downward
//!
//! Stack and pool tops are the state captured and restored by the scoped
//! resources in `tether-bridge`; a save/restore pair must nest per call so
//! an inner call's scratch never corrupts an outer call's.

use crate::error::HeapError;

/// Result type for raw heap access
pub type HeapResult<T> = Result<T, HeapError>;

/// All scratch and permanent allocations are 8-byte aligned.
const ALLOC_ALIGN: u32 = 8;

/// Offset 0..8 is reserved; a zero offset is the null sentinel.
const DATA_BASE: u32 = 8;

/// Flat byte space with aligned typed access and three bump regions.
pub struct BoundaryHeap {
    bytes: Vec<u8>,
    data_top: u32,
    data_limit: u32,
    pool_base: u32,
    pool_top: u32,
    pool_limit: u32,
    stack_base: u32,
    stack_top: u32,
}

impl BoundaryHeap {
    /// Create a heap with the given capacity in bytes.
    ///
    /// Half the capacity goes to the data region, a quarter to the pool and
    /// a quarter to the stack. Capacity is rounded down to an 8-byte multiple.
    pub fn new(capacity: u32) -> Self {
        let capacity = (capacity & !(ALLOC_ALIGN - 1)).max(64);
        let data_limit = capacity / 2;
        let pool_limit = data_limit + capacity / 4;
        Self {
            bytes: vec![0; capacity as usize],
            data_top: DATA_BASE,
            data_limit,
            pool_base: data_limit,
            pool_top: data_limit,
            pool_limit,
            stack_base: pool_limit,
            stack_top: capacity,
        }
    }

    /// Heap capacity in bytes
    pub fn capacity(&self) -> u32 {
        self.bytes.len() as u32
    }

    #[inline]
    fn check(&self, offset: u32, len: u32) -> HeapResult<()> {
        let capacity = self.capacity();
        if offset == 0 || offset.checked_add(len).map_or(true, |end| end > capacity) {
            return Err(HeapError::OutOfBounds {
                offset,
                len,
                capacity,
            });
        }
        if offset % len != 0 {
            return Err(HeapError::Misaligned { offset, align: len });
        }
        Ok(())
    }

    // ========================================================================
    // Typed access
    // ========================================================================

    /// Read an 8-bit value
    pub fn read_u8(&self, offset: u32) -> HeapResult<u8> {
        self.check(offset, 1)?;
        Ok(self.bytes[offset as usize])
    }

    /// Read a 16-bit value (little-endian, 2-byte aligned)
    pub fn read_u16(&self, offset: u32) -> HeapResult<u16> {
        self.check(offset, 2)?;
        let o = offset as usize;
        Ok(u16::from_le_bytes([self.bytes[o], self.bytes[o + 1]]))
    }

    /// Read a 32-bit value (little-endian, 4-byte aligned)
    pub fn read_u32(&self, offset: u32) -> HeapResult<u32> {
        self.check(offset, 4)?;
        let o = offset as usize;
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&self.bytes[o..o + 4]);
        Ok(u32::from_le_bytes(buf))
    }

    /// Read a 64-bit value (little-endian, 8-byte aligned)
    pub fn read_u64(&self, offset: u32) -> HeapResult<u64> {
        self.check(offset, 8)?;
        let o = offset as usize;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.bytes[o..o + 8]);
        Ok(u64::from_le_bytes(buf))
    }

    /// Read an f64 (8-byte aligned)
    pub fn read_f64(&self, offset: u32) -> HeapResult<f64> {
        Ok(f64::from_bits(self.read_u64(offset)?))
    }

    /// Read an f32 (4-byte aligned)
    pub fn read_f32(&self, offset: u32) -> HeapResult<f32> {
        Ok(f32::from_bits(self.read_u32(offset)?))
    }

    /// Write an 8-bit value
    pub fn write_u8(&mut self, offset: u32, value: u8) -> HeapResult<()> {
        self.check(offset, 1)?;
        self.bytes[offset as usize] = value;
        Ok(())
    }

    /// Write a 16-bit value (little-endian, 2-byte aligned)
    pub fn write_u16(&mut self, offset: u32, value: u16) -> HeapResult<()> {
        self.check(offset, 2)?;
        self.bytes[offset as usize..offset as usize + 2].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Write a 32-bit value (little-endian, 4-byte aligned)
    pub fn write_u32(&mut self, offset: u32, value: u32) -> HeapResult<()> {
        self.check(offset, 4)?;
        self.bytes[offset as usize..offset as usize + 4].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Write a 64-bit value (little-endian, 8-byte aligned)
    pub fn write_u64(&mut self, offset: u32, value: u64) -> HeapResult<()> {
        self.check(offset, 8)?;
        self.bytes[offset as usize..offset as usize + 8].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Write an f64 (8-byte aligned)
    pub fn write_f64(&mut self, offset: u32, value: f64) -> HeapResult<()> {
        self.write_u64(offset, value.to_bits())
    }

    /// Write an f32 (4-byte aligned)
    pub fn write_f32(&mut self, offset: u32, value: f32) -> HeapResult<()> {
        self.write_u32(offset, value.to_bits())
    }

    /// Read `len` raw bytes
    pub fn read_bytes(&self, offset: u32, len: u32) -> HeapResult<&[u8]> {
        let capacity = self.capacity();
        if offset == 0 || offset.checked_add(len).map_or(true, |end| end > capacity) {
            return Err(HeapError::OutOfBounds {
                offset,
                len,
                capacity,
            });
        }
        Ok(&self.bytes[offset as usize..(offset + len) as usize])
    }

    /// Write raw bytes
    pub fn write_bytes(&mut self, offset: u32, data: &[u8]) -> HeapResult<()> {
        let len = data.len() as u32;
        let capacity = self.capacity();
        if offset == 0 || offset.checked_add(len).map_or(true, |end| end > capacity) {
            return Err(HeapError::OutOfBounds {
                offset,
                len,
                capacity,
            });
        }
        self.bytes[offset as usize..(offset + len) as usize].copy_from_slice(data);
        Ok(())
    }

    // ========================================================================
    // Regions
    // ========================================================================

    /// Permanently allocate `size` bytes in the data region (8-byte aligned).
    pub fn alloc(&mut self, size: u32) -> HeapResult<u32> {
        let size = align_up(size);
        if self.data_top + size > self.data_limit {
            return Err(HeapError::RegionExhausted {
                region: "data",
                requested: size,
            });
        }
        let offset = self.data_top;
        self.data_top += size;
        Ok(offset)
    }

    /// Allocate `size` bytes of per-call scratch on the stack region.
    ///
    /// The stack grows downward; a `stack_save`/`stack_restore` pair reclaims
    /// everything allocated in between.
    pub fn stack_alloc(&mut self, size: u32) -> HeapResult<u32> {
        let size = align_up(size);
        if self.stack_top < self.stack_base + size {
            return Err(HeapError::RegionExhausted {
                region: "stack",
                requested: size,
            });
        }
        self.stack_top -= size;
        Ok(self.stack_top)
    }

    /// Capture the stack top for later restore
    pub fn stack_save(&self) -> u32 {
        self.stack_top
    }

    /// Restore a previously captured stack top
    pub fn stack_restore(&mut self, saved: u32) {
        debug_assert!(saved >= self.stack_top && saved <= self.capacity());
        self.stack_top = saved;
    }

    /// Allocate `size` bytes of scratch in the pool region.
    pub fn pool_alloc(&mut self, size: u32) -> HeapResult<u32> {
        let size = align_up(size);
        if self.pool_top + size > self.pool_limit {
            return Err(HeapError::RegionExhausted {
                region: "pool",
                requested: size,
            });
        }
        let offset = self.pool_top;
        self.pool_top += size;
        Ok(offset)
    }

    /// Capture the pool checkpoint for later restore
    pub fn pool_save(&self) -> u32 {
        self.pool_top
    }

    /// Restore a previously captured pool checkpoint
    pub fn pool_restore(&mut self, saved: u32) {
        debug_assert!(saved >= self.pool_base && saved <= self.pool_top);
        self.pool_top = saved;
    }

    // ========================================================================
    // Boundary string/cstring codecs
    // ========================================================================

    /// Push a length-prefixed UTF-8 string onto the stack region.
    ///
    /// Layout: 4-byte LE byte length, raw bytes, one NUL terminator that is
    /// not counted in the length. Returns the offset of the length word.
    pub fn stack_push_string(&mut self, s: &str) -> HeapResult<u32> {
        let bytes = s.as_bytes();
        let offset = self.stack_alloc(4 + bytes.len() as u32 + 1)?;
        self.write_u32(offset, bytes.len() as u32)?;
        self.write_bytes(offset + 4, bytes)?;
        self.write_u8(offset + 4 + bytes.len() as u32, 0)?;
        Ok(offset)
    }

    /// Read a length-prefixed UTF-8 string written by `stack_push_string`
    /// (or by native code using the same layout).
    pub fn read_string(&self, offset: u32) -> HeapResult<String> {
        let len = self.read_u32(offset)?;
        let bytes = self.read_bytes(offset + 4, len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| HeapError::InvalidUtf8(offset))
    }

    /// Push a bare zero-terminated UTF-8 buffer onto the stack region.
    pub fn stack_push_cstring(&mut self, s: &str) -> HeapResult<u32> {
        let bytes = s.as_bytes();
        let offset = self.stack_alloc(bytes.len() as u32 + 1)?;
        self.write_bytes(offset, bytes)?;
        self.write_u8(offset + bytes.len() as u32, 0)?;
        Ok(offset)
    }

    /// Read a zero-terminated UTF-8 buffer.
    pub fn read_cstring(&self, offset: u32) -> HeapResult<String> {
        let capacity = self.capacity();
        if offset == 0 || offset >= capacity {
            return Err(HeapError::OutOfBounds {
                offset,
                len: 1,
                capacity,
            });
        }
        let start = offset as usize;
        let end = self.bytes[start..]
            .iter()
            .position(|&b| b == 0)
            .map(|p| start + p)
            .ok_or(HeapError::OutOfBounds {
                offset,
                len: capacity - offset,
                capacity,
            })?;
        String::from_utf8(self.bytes[start..end].to_vec()).map_err(|_| HeapError::InvalidUtf8(offset))
    }
}

#[inline]
fn align_up(size: u32) -> u32 {
    size.max(1).div_ceil(ALLOC_ALIGN) * ALLOC_ALIGN
}
