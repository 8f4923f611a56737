// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use zerocopy::{BigEndian, FromBytes as ZFromBytes, Immutable, IntoBytes, KnownLayout, U32};

use crate::models::{
    common::{RESERVED_TAG, get_u24, impl_bhs_view},
    opcode::{Opcode, RawBhsOpcode},
};

/// BHS for **NOP-In** (opcode `0x20`).
#[repr(C)]
#[derive(Debug, Default, PartialEq, ZFromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct NopInResponse {
    pub opcode: RawBhsOpcode,                // 0
    pub flags: u8,                           // 1
    reserved1: [u8; 2],                      // 2..4
    pub total_ahs_length: u8,                // 4
    pub data_segment_length: [u8; 3],        // 5..8
    pub lun: [u8; 8],                        // 8..16
    pub initiator_task_tag: U32<BigEndian>,  // 16..20
    pub target_transfer_tag: U32<BigEndian>, // 20..24
    pub stat_sn: U32<BigEndian>,             // 24..28
    pub exp_cmd_sn: U32<BigEndian>,          // 28..32
    pub max_cmd_sn: U32<BigEndian>,          // 32..36
    reserved2: [u8; 12],                     // 36..48
}

impl_bhs_view!(NopInResponse, Opcode::NopIn);

impl NopInResponse {
    /// Target-initiated ping: reserved ITT, consumes no StatSN.
    #[inline]
    pub fn is_unsolicited(&self) -> bool {
        self.initiator_task_tag.get() == RESERVED_TAG
    }

    #[inline]
    pub fn data_length(&self) -> usize {
        get_u24(&self.data_segment_length) as usize
    }
}

#[derive(Debug)]
pub struct NopInResponseBuilder {
    pub header: NopInResponse,
}

impl Default for NopInResponseBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NopInResponseBuilder {
    pub fn new() -> Self {
        let mut header = NopInResponse {
            opcode: RawBhsOpcode::from(Opcode::NopIn),
            flags: 0x80,
            ..Default::default()
        };
        header.initiator_task_tag.set(RESERVED_TAG);
        header.target_transfer_tag.set(RESERVED_TAG);
        Self { header }
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
}
