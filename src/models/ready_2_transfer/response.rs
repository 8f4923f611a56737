// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use zerocopy::{BigEndian, FromBytes as ZFromBytes, Immutable, IntoBytes, KnownLayout, U32};

use crate::models::{
    common::impl_bhs_view,
    opcode::{Opcode, RawBhsOpcode},
};

/// BHS for **Ready To Transfer** (opcode `0x31`).
#[repr(C)]
#[derive(Debug, Default, PartialEq, ZFromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct ReadyToTransfer {
    pub opcode: RawBhsOpcode,                         // 0
    pub flags: u8,                                    // 1, F always set
    reserved1: [u8; 2],                               // 2..4
    pub total_ahs_length: u8,                         // 4
    pub data_segment_length: [u8; 3],                 // 5..8
    pub lun: [u8; 8],                                 // 8..16
    pub initiator_task_tag: U32<BigEndian>,           // 16..20
    pub target_transfer_tag: U32<BigEndian>,          // 20..24
    pub stat_sn: U32<BigEndian>,                      // 24..28
    pub exp_cmd_sn: U32<BigEndian>,                   // 28..32
    pub max_cmd_sn: U32<BigEndian>,                   // 32..36
    pub r2t_sn: U32<BigEndian>,                       // 36..40
    pub buffer_offset: U32<BigEndian>,                // 40..44
    pub desired_data_transfer_length: U32<BigEndian>, // 44..48
}

impl_bhs_view!(ReadyToTransfer, Opcode::ReadyToTransfer);

#[derive(Debug)]
pub struct ReadyToTransferBuilder {
    pub header: ReadyToTransfer,
}

impl Default for ReadyToTransferBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadyToTransferBuilder {
    pub fn new() -> Self {
        Self {
            header: ReadyToTransfer {
                opcode: RawBhsOpcode::from(Opcode::ReadyToTransfer),
                flags: 0x80,
                ..Default::default()
            },
        }
    }

    pub fn lun(mut self, lun: [u8; 8]) -> Self {
        self.header.lun = lun;
        self
    }

    pub fn initiator_task_tag(mut self, tag: u32) -> Self {
        self.header.initiator_task_tag.set(tag);
        self
    }

    pub fn target_transfer_tag(mut self, tag: u32) -> Self {
        self.header.target_transfer_tag.set(tag);
        self
    }

    pub fn r2t_sn(mut self, sn: u32) -> Self {
        self.header.r2t_sn.set(sn);
        self
    }

    pub fn buffer_offset(mut self, off: u32) -> Self {
        self.header.buffer_offset.set(off);
        self
    }

    pub fn desired_data_transfer_length(mut self, len: u32) -> Self {
        self.header.desired_data_transfer_length.set(len);
        self
    }
}
