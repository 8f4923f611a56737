// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Segmented byte buffer backing PDU data segments.
//!
//! Appends copy into fixed-capacity segments; received data is adopted as
//! whole segments without copying. The chain never reorders bytes.

use bytes::{BufMut, Bytes, BytesMut};
use crc32c::crc32c_append;

/// Capacity of a freshly allocated segment.
pub const SEGMENT_CAPACITY: usize = 16 * 1024;

#[derive(Debug, Default, Clone)]
pub struct BufChain {
    segs: Vec<BytesMut>,
    len: usize,
}

/// Allocation for an append could not be reserved.
#[derive(Debug, thiserror::Error)]
#[error("failed to allocate {0} bytes for buffer chain")]
pub struct ChainAllocError(pub usize);

impl BufChain {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn segments(&self) -> impl Iterator<Item = &[u8]> {
        self.segs.iter().map(|s| &s[..])
    }

    /// Copies `data` to the tail, filling the last segment before
    /// allocating new ones. Only the segment slots are reserved fallibly;
    /// when that reservation fails the chain is left untouched. The
    /// segment buffers themselves come from `BytesMut::with_capacity`.
    pub fn append(&mut self, mut data: &[u8]) -> Result<(), ChainAllocError> {
        if data.is_empty() {
            return Ok(());
        }
        let tail_room = self
            .segs
            .last()
            .map(|s| s.capacity() - s.len())
            .unwrap_or(0);
        let new_segs = data.len().saturating_sub(tail_room).div_ceil(SEGMENT_CAPACITY);
        self.segs
            .try_reserve(new_segs)
            .map_err(|_| ChainAllocError(data.len()))?;

        self.len += data.len();
        if let Some(tail) = self.segs.last_mut() {
            let n = tail_room.min(data.len());
            tail.put_slice(&data[..n]);
            data = &data[n..];
        }
        while !data.is_empty() {
            let n = data.len().min(SEGMENT_CAPACITY);
            let mut seg = BytesMut::with_capacity(SEGMENT_CAPACITY);
            seg.put_slice(&data[..n]);
            self.segs.push(seg);
            data = &data[n..];
        }
        Ok(())
    }

    /// Appends `n` zero bytes.
    pub fn append_zeroes(&mut self, n: usize) -> Result<(), ChainAllocError> {
        const ZEROES: [u8; 4] = [0; 4];
        let mut left = n;
        while left > 0 {
            let step = left.min(ZEROES.len());
            self.append(&ZEROES[..step])?;
            left -= step;
        }
        Ok(())
    }

    /// Adopts a received buffer as the new tail segment.
    pub fn push_segment(&mut self, seg: BytesMut) {
        if seg.is_empty() {
            return;
        }
        self.len += seg.len();
        self.segs.push(seg);
    }

    /// Copies `dst.len()` bytes starting at `off` into `dst`.
    ///
    /// Returns the number of bytes copied, short if the chain ends first.
    pub fn copy_out(&self, mut off: usize, dst: &mut [u8]) -> usize {
        let mut copied = 0;
        for seg in &self.segs {
            if copied == dst.len() {
                break;
            }
            if off >= seg.len() {
                off -= seg.len();
                continue;
            }
            let n = (seg.len() - off).min(dst.len() - copied);
            dst[copied..copied + n].copy_from_slice(&seg[off..off + n]);
            copied += n;
            off = 0;
        }
        copied
    }

    /// CRC32C (Castagnoli) over the whole chain.
    pub fn crc32c(&self) -> u32 {
        self.segments().fold(0u32, crc32c_append)
    }

    /// Concatenates the chain into `out`.
    pub fn write_to(&self, out: &mut BytesMut) {
        out.reserve(self.len);
        for seg in &self.segs {
            out.put_slice(seg);
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(self.len);
        self.write_to(&mut out);
        out.freeze()
    }
}
