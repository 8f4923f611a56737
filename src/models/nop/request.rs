// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use zerocopy::{BigEndian, FromBytes as ZFromBytes, Immutable, IntoBytes, KnownLayout, U32};

use crate::models::{
    common::{BasicHeaderSegment, RESERVED_TAG, get_u24, impl_bhs_view},
    opcode::{Opcode, RawBhsOpcode},
};

/// BHS for **NOP-Out** (opcode `0x00`).
#[repr(C)]
#[derive(Debug, Default, PartialEq, ZFromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct NopOutRequest {
    pub opcode: RawBhsOpcode,                // 0
    pub flags: u8,                           // 1
    reserved1: [u8; 2],                      // 2..4
    pub total_ahs_length: u8,                // 4
    pub data_segment_length: [u8; 3],        // 5..8
    pub lun: [u8; 8],                        // 8..16
    pub initiator_task_tag: U32<BigEndian>,  // 16..20
    pub target_transfer_tag: U32<BigEndian>, // 20..24
    pub cmd_sn: U32<BigEndian>,              // 24..28
    pub exp_stat_sn: U32<BigEndian>,         // 28..32
    reserved2: [u8; 16],                     // 32..48
}

impl_bhs_view!(NopOutRequest, Opcode::NopOut);

impl NopOutRequest {
    /// NOP-Out answering a target ping uses the reserved ITT and expects no
    /// reply.
    #[inline]
    pub fn is_ping_reply(&self) -> bool {
        self.initiator_task_tag.get() == RESERVED_TAG
    }
}

impl BasicHeaderSegment for NopOutRequest {
    #[inline]
    fn get_opcode(&self) -> Result<Opcode> {
        Ok(Self::OPCODE)
    }

    #[inline]
    fn is_immediate(&self) -> bool {
        self.opcode.i()
    }

    #[inline]
    fn get_initiator_task_tag(&self) -> u32 {
        self.initiator_task_tag.get()
    }

    #[inline]
    fn get_ahs_length_bytes(&self) -> usize {
        self.total_ahs_length as usize * 4
    }

    #[inline]
    fn get_data_length_bytes(&self) -> usize {
        get_u24(&self.data_segment_length) as usize
    }

    #[inline]
    fn get_cmd_sn(&self) -> Option<u32> {
        Some(self.cmd_sn.get())
    }
}

/// Builder for NOP-Out, used for initiator emulation.
#[derive(Debug)]
pub struct NopOutRequestBuilder {
    pub header: NopOutRequest,
}

impl Default for NopOutRequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NopOutRequestBuilder {
    pub fn new() -> Self {
        let mut header = NopOutRequest {
            opcode: RawBhsOpcode::from(Opcode::NopOut),
            flags: 0x80,
            ..Default::default()
        };
        header.target_transfer_tag.set(RESERVED_TAG);
        Self { header }
    }

    pub fn immediate(mut self) -> Self {
        self.header.opcode.set_i(true);
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

    pub fn target_transfer_tag(mut self, tag: u32) -> Self {
        self.header.target_transfer_tag.set(tag);
        self
    }

    pub fn cmd_sn(mut self, sn: u32) -> Self {
        self.header.cmd_sn.set(sn);
        self
    }

    pub fn exp_stat_sn(mut self, sn: u32) -> Self {
        self.header.exp_stat_sn.set(sn);
        self
    }
}
