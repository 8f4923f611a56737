// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use zerocopy::{BigEndian, FromBytes as ZFromBytes, Immutable, IntoBytes, KnownLayout, U32};

use crate::models::{
    common::{RESERVED_TAG, get_u24, impl_bhs_view},
    data::common::{DataInFlags, RawDataInFlags},
    opcode::{Opcode, RawBhsOpcode},
};

/// BHS for **SCSI Data-In** (opcode `0x25`).
///
/// The status-carrying variant (S bit) is never produced; status always
/// travels in a separate SCSI Response, so bytes 24..28 keep the current
/// StatSN without consuming it.
#[repr(C)]
#[derive(Debug, Default, PartialEq, ZFromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct ScsiDataIn {
    pub opcode: RawBhsOpcode,                // 0
    pub flags: RawDataInFlags,               // 1
    reserved1: u8,                           // 2
    pub status_or_rsvd: u8,                  // 3
    pub total_ahs_length: u8,                // 4
    pub data_segment_length: [u8; 3],        // 5..8
    pub lun: [u8; 8],                        // 8..16
    pub initiator_task_tag: U32<BigEndian>,  // 16..20
    pub target_transfer_tag: U32<BigEndian>, // 20..24
    pub stat_sn: U32<BigEndian>,             // 24..28
    pub exp_cmd_sn: U32<BigEndian>,          // 28..32
    pub max_cmd_sn: U32<BigEndian>,          // 32..36
    pub data_sn: U32<BigEndian>,             // 36..40
    pub buffer_offset: U32<BigEndian>,       // 40..44
    pub residual_count: U32<BigEndian>,      // 44..48
}

impl_bhs_view!(ScsiDataIn, Opcode::ScsiDataIn);

impl ScsiDataIn {
    #[inline]
    pub fn data_length(&self) -> usize {
        get_u24(&self.data_segment_length) as usize
    }
}

#[derive(Debug)]
pub struct ScsiDataInBuilder {
    pub header: ScsiDataIn,
}

impl Default for ScsiDataInBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ScsiDataInBuilder {
    pub fn new() -> Self {
        let mut header = ScsiDataIn {
            opcode: RawBhsOpcode::from(Opcode::ScsiDataIn),
            ..Default::default()
        };
        header.target_transfer_tag.set(RESERVED_TAG);
        Self { header }
    }

    pub fn final_bit(mut self) -> Self {
        self.header.flags.insert(DataInFlags::FINAL);
        self
    }

    pub fn lun(mut self, lun: [u8; 8]) -> Self {
        self.header.lun = lun;
        self
    }

    pub fn initiator_task_tag(mut self, tag: u32) -> Self {
        self.header.initiator_task_tag.set(tag);
        self
    }

    pub fn data_sn(mut self, sn: u32) -> Self {
        self.header.data_sn.set(sn);
        self
    }

    pub fn buffer_offset(mut self, off: u32) -> Self {
        self.header.buffer_offset.set(off);
        self
    }
}
