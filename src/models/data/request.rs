// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use zerocopy::{BigEndian, FromBytes as ZFromBytes, Immutable, IntoBytes, KnownLayout, U32};

use crate::models::{
    common::{BasicHeaderSegment, RESERVED_TAG, SendingData, get_u24, impl_bhs_view},
    data::common::RawDataOutFlags,
    opcode::{Opcode, RawBhsOpcode},
};

/// BHS for **SCSI Data-Out** (opcode `0x05`).
#[repr(C)]
#[derive(Debug, Default, PartialEq, ZFromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct ScsiDataOut {
    pub opcode: RawBhsOpcode,               // 0
    pub flags: RawDataOutFlags,             // 1
    reserved1: [u8; 2],                     // 2..4
    pub total_ahs_length: u8,               // 4
    pub data_segment_length: [u8; 3],       // 5..8
    pub lun: [u8; 8],                       // 8..16
    pub initiator_task_tag: U32<BigEndian>, // 16..20
    pub target_transfer_tag: U32<BigEndian>, // 20..24
    reserved2: [u8; 4],                     // 24..28
    pub exp_stat_sn: U32<BigEndian>,        // 28..32
    reserved3: [u8; 4],                     // 32..36
    pub data_sn: U32<BigEndian>,            // 36..40
    pub buffer_offset: U32<BigEndian>,      // 40..44
    reserved4: [u8; 4],                     // 44..48
}

impl_bhs_view!(ScsiDataOut, Opcode::ScsiDataOut);

impl BasicHeaderSegment for ScsiDataOut {
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

    /// Data-Out PDUs carry no CmdSN.
    #[inline]
    fn get_cmd_sn(&self) -> Option<u32> {
        None
    }
}

impl SendingData for ScsiDataOut {
    fn get_final_bit(&self) -> bool {
        self.flags.fin()
    }

    fn set_final_bit(&mut self) {
        self.flags.set_fin(true);
    }
}

/// Builder for Data-Out PDUs, used for initiator emulation.
#[derive(Debug)]
pub struct ScsiDataOutBuilder {
    pub header: ScsiDataOut,
}

impl Default for ScsiDataOutBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ScsiDataOutBuilder {
    pub fn new() -> Self {
        let mut header = ScsiDataOut {
            opcode: RawBhsOpcode::from(Opcode::ScsiDataOut),
            ..Default::default()
        };
        header.target_transfer_tag.set(RESERVED_TAG);
        Self { header }
    }

    pub fn final_bit(mut self) -> Self {
        self.header.set_final_bit();
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

    pub fn exp_stat_sn(mut self, sn: u32) -> Self {
        self.header.exp_stat_sn.set(sn);
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
