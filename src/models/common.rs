// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::{Result, anyhow};
use zerocopy::{
    BigEndian, FromBytes as ZFromBytes, Immutable, IntoBytes, KnownLayout, U32,
};

use crate::models::opcode::{Opcode, RawBhsOpcode};

/// Size of every iSCSI Basic Header Segment.
pub const HEADER_LEN: usize = 48;

/// Reserved value of the Initiator / Target Transfer Tag fields.
pub const RESERVED_TAG: u32 = 0xffff_ffff;

/// Largest value the 24-bit DataSegmentLength field can carry.
pub const MAX_DATA_SEGMENT_LENGTH: usize = 0x00ff_ffff;

/// Any header struct that can be viewed in place over the 48 BHS bytes.
pub trait ZeroCopyType: KnownLayout + Immutable + IntoBytes + ZFromBytes {}

/// Read-only accessors shared by every BHS the target parses.
pub trait BasicHeaderSegment {
    /// first u8 of BHS
    fn get_opcode(&self) -> Result<Opcode>;

    fn is_immediate(&self) -> bool;

    fn get_initiator_task_tag(&self) -> u32;

    /// Number of extra AHS bytes (always a multiple of 4).
    fn get_ahs_length_bytes(&self) -> usize;

    /// Number of actual payload bytes in the DataSegment.
    fn get_data_length_bytes(&self) -> usize;

    /// CmdSN carried by the PDU, `None` for PDUs without one (Data-Out).
    fn get_cmd_sn(&self) -> Option<u32>;
}

/// PDUs that carry the Final bit in byte 1.
pub trait SendingData {
    fn get_final_bit(&self) -> bool;

    fn set_final_bit(&mut self);
}

#[inline]
pub fn get_u24(b: &[u8; 3]) -> u32 {
    ((b[0] as u32) << 16) | ((b[1] as u32) << 8) | b[2] as u32
}

#[inline]
pub fn set_u24(b: &mut [u8; 3], v: u32) {
    b[0] = ((v >> 16) & 0xff) as u8;
    b[1] = ((v >> 8) & 0xff) as u8;
    b[2] = (v & 0xff) as u8;
}

/// Bytes 24..36 of every target PDU: StatSN, ExpCmdSN, MaxCmdSN.
///
/// SCSI Response, Task Response, Data-In, R2T, NOP-In, Logout Response and
/// Async Message all share this placement, so sequence numbers are stamped
/// through this view regardless of opcode.
#[repr(C)]
#[derive(Debug, Default, PartialEq, ZFromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct TargetSeqHeader {
    pub opcode: RawBhsOpcode,       // 0
    pub flags: u8,                  // 1
    reserved0: [u8; 14],            // 2..16
    pub initiator_task_tag: U32<BigEndian>, // 16..20
    reserved1: [u8; 4],             // 20..24
    pub stat_sn: U32<BigEndian>,    // 24..28
    pub exp_cmd_sn: U32<BigEndian>, // 28..32
    pub max_cmd_sn: U32<BigEndian>, // 32..36
    reserved2: [u8; 12],            // 36..48
}

impl ZeroCopyType for TargetSeqHeader {}

impl TargetSeqHeader {
    pub fn from_bhs_bytes(buf: &mut [u8]) -> Result<&mut Self> {
        <Self as ZFromBytes>::mut_from_bytes(buf)
            .map_err(|e| anyhow!("failed convert buffer TargetSeqHeader: {e}"))
    }
}

/// Shared `from_bhs_bytes` / `ref_from_bhs_bytes` for BHS views with a fixed
/// opcode.
macro_rules! impl_bhs_view {
    ($ty:ty, $opcode:expr) => {
        impl $crate::models::common::ZeroCopyType for $ty {}

        impl $ty {
            pub const OPCODE: $crate::models::opcode::Opcode = $opcode;

            pub fn from_bhs_bytes(buf: &mut [u8]) -> anyhow::Result<&mut Self> {
                let hdr = <Self as zerocopy::FromBytes>::mut_from_bytes(buf).map_err(
                    |e| anyhow::anyhow!("failed convert buffer {}: {e}", stringify!($ty)),
                )?;
                if hdr.opcode.opcode_known() != Some(Self::OPCODE) {
                    anyhow::bail!(
                        "{}: invalid opcode 0x{:02x}",
                        stringify!($ty),
                        hdr.opcode.opcode_raw()
                    );
                }
                Ok(hdr)
            }

            pub fn ref_from_bhs_bytes(buf: &[u8]) -> anyhow::Result<&Self> {
                let hdr = <Self as zerocopy::FromBytes>::ref_from_bytes(buf).map_err(
                    |e| anyhow::anyhow!("failed convert buffer {}: {e}", stringify!($ty)),
                )?;
                if hdr.opcode.opcode_known() != Some(Self::OPCODE) {
                    anyhow::bail!(
                        "{}: invalid opcode 0x{:02x}",
                        stringify!($ty),
                        hdr.opcode.opcode_raw()
                    );
                }
                Ok(hdr)
            }

            pub fn to_bhs_bytes(&self) -> [u8; $crate::models::common::HEADER_LEN] {
                let mut out = [0u8; $crate::models::common::HEADER_LEN];
                out.copy_from_slice(zerocopy::IntoBytes::as_bytes(self));
                out
            }
        }
    };
}

pub(crate) use impl_bhs_view;
