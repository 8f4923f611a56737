// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::{Context, Result};
use bytes::{BufMut, Bytes, BytesMut};
use crc32c::crc32c_append;

use crate::{
    icl::buf_chain::{BufChain, ChainAllocError},
    models::{
        common::{HEADER_LEN, MAX_DATA_SEGMENT_LENGTH, ZeroCopyType},
        opcode::{Opcode, RawBhsOpcode},
    },
    utils::pad_len,
};

#[derive(Debug, thiserror::Error)]
pub enum PduError {
    #[error("data segment of {0} bytes exceeds the 24-bit length field")]
    SegmentTooLong(usize),
    #[error(transparent)]
    Alloc(#[from] ChainAllocError),
}

/// One iSCSI PDU: BHS, optional AHS and a data segment.
///
/// `data_len` is the payload length without padding. A received PDU keeps
/// its padding at the tail of `data`, a PDU built for sending gets it in
/// [`IclPdu::finalize`].
#[derive(Debug, Clone)]
pub struct IclPdu {
    pub bhs: [u8; HEADER_LEN],
    pub ahs: BufChain,
    pub data: BufChain,
    pub data_len: usize,
    /// PDUs received in the same batch and accounted to this one's CmdSN.
    pub additional_pdus: u32,
}

impl Default for IclPdu {
    fn default() -> Self {
        Self::new_bhs()
    }
}

impl IclPdu {
    /// A PDU with a zeroed 48-byte BHS and no data.
    pub fn new_bhs() -> Self {
        Self {
            bhs: [0u8; HEADER_LEN],
            ahs: BufChain::new(),
            data: BufChain::new(),
            data_len: 0,
            additional_pdus: 0,
        }
    }

    /// A PDU whose BHS is copied from a typed header.
    pub fn from_header<T: ZeroCopyType>(header: &T) -> Self {
        let mut pdu = Self::new_bhs();
        pdu.bhs.copy_from_slice(header.as_bytes());
        pdu
    }

    #[inline]
    pub fn raw_opcode(&self) -> RawBhsOpcode {
        RawBhsOpcode::from_raw(self.bhs[0])
    }

    #[inline]
    pub fn opcode(&self) -> Option<Opcode> {
        self.raw_opcode().opcode_known()
    }

    #[inline]
    pub fn is_immediate(&self) -> bool {
        self.raw_opcode().i()
    }

    /// Typed read-only view over the BHS.
    pub fn header_view<T: ZeroCopyType>(&self) -> Result<&T> {
        T::ref_from_bytes(&self.bhs[..])
            .map_err(|e| anyhow::anyhow!("failed to view BHS: {e}"))
            .context("header_view")
    }

    /// Typed mutable view over the BHS.
    pub fn header_view_mut<T: ZeroCopyType>(&mut self) -> Result<&mut T> {
        T::mut_from_bytes(&mut self.bhs[..])
            .map_err(|e| anyhow::anyhow!("failed to view BHS: {e}"))
            .context("header_view_mut")
    }

    /// TotalAHSLength in bytes.
    #[inline]
    pub fn ahs_length(&self) -> usize {
        self.bhs[4] as usize * 4
    }

    /// The 24-bit DataSegmentLength stored in bytes 5..8.
    #[inline]
    pub fn data_segment_length(&self) -> usize {
        ((self.bhs[5] as usize) << 16) | ((self.bhs[6] as usize) << 8) | self.bhs[7] as usize
    }

    #[inline]
    pub fn set_data_segment_length(&mut self, len: usize) {
        self.bhs[5] = ((len >> 16) & 0xff) as u8;
        self.bhs[6] = ((len >> 8) & 0xff) as u8;
        self.bhs[7] = (len & 0xff) as u8;
    }

    /// Appends payload bytes. Nothing changes when the append fails.
    pub fn append_data(&mut self, buf: &[u8]) -> Result<(), PduError> {
        let new_len = self.data_len + buf.len();
        if new_len > MAX_DATA_SEGMENT_LENGTH {
            return Err(PduError::SegmentTooLong(new_len));
        }
        self.data.append(buf)?;
        self.data_len = new_len;
        Ok(())
    }

    /// Copies payload bytes starting at `off` into `dst`.
    pub fn get_data(&self, off: usize, dst: &mut [u8]) -> usize {
        let end = self.data_len.min(off + dst.len());
        if off >= end {
            return 0;
        }
        self.data.copy_out(off, &mut dst[..end - off])
    }

    /// Whole payload, without padding.
    pub fn data_bytes(&self) -> Vec<u8> {
        let mut out = vec![0u8; self.data_len];
        self.get_data(0, &mut out);
        out
    }

    /// Zero bytes needed to align the data segment to 4 bytes.
    #[inline]
    pub fn padding(&self) -> usize {
        pad_len(self.data_len)
    }

    /// CRC32C over BHS and AHS.
    pub fn header_digest(&self) -> u32 {
        self.ahs.segments().fold(crc32c_append(0, &self.bhs), crc32c_append)
    }

    /// CRC32C over the data segment including its padding.
    pub fn data_digest(&self) -> u32 {
        let padded = self.data_len + self.padding();
        let crc = self.data.crc32c();
        match padded.checked_sub(self.data.len()) {
            Some(missing) if missing > 0 => crc32c_append(crc, &[0u8; 4][..missing]),
            _ => crc,
        }
    }

    /// Serializes the PDU for the wire: BHS, AHS, optional header digest,
    /// data, padding and optional data digest.
    pub fn finalize(
        &mut self,
        header_crc: bool,
        data_crc: bool,
        out: &mut BytesMut,
    ) -> Result<(), PduError> {
        self.set_data_segment_length(self.data_len);
        let pad = self.padding();
        if self.data.len() < self.data_len + pad {
            self.data.append_zeroes(self.data_len + pad - self.data.len())?;
        }

        out.reserve(self.wire_len(header_crc, data_crc));
        out.put_slice(&self.bhs);
        self.ahs.write_to(out);
        if header_crc {
            out.put_u32_le(self.header_digest());
        }
        if self.data_len > 0 {
            self.data.write_to(out);
            if data_crc {
                out.put_u32_le(self.data_digest());
            }
        }
        Ok(())
    }

    /// Convenience form of [`IclPdu::finalize`] producing a standalone buffer.
    pub fn to_wire(&mut self, header_crc: bool, data_crc: bool) -> Result<Bytes, PduError> {
        let mut out = BytesMut::new();
        self.finalize(header_crc, data_crc, &mut out)?;
        Ok(out.freeze())
    }

    /// Number of bytes [`IclPdu::finalize`] emits.
    pub fn wire_len(&self, header_crc: bool, data_crc: bool) -> usize {
        let mut len = HEADER_LEN + self.ahs.len();
        if header_crc {
            len += 4;
        }
        if self.data_len > 0 {
            len += self.data_len + self.padding();
            if data_crc {
                len += 4;
            }
        }
        len
    }
}
