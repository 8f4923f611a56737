// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use zerocopy::{BigEndian, FromBytes as ZFromBytes, Immutable, IntoBytes, KnownLayout, U32};

use crate::models::{
    command::{
        common::{ScsiCommandRequestFlags, TaskAttribute},
        zero_copy::RawScsiCmdReqFlags,
    },
    common::{BasicHeaderSegment, SendingData, get_u24, impl_bhs_view},
    opcode::{Opcode, RawBhsOpcode},
};

/// BHS for ScsiCommandRequest PDU
#[repr(C)]
#[derive(Debug, Default, PartialEq, ZFromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct ScsiCommandRequest {
    pub opcode: RawBhsOpcode,                          // 0
    pub flags: RawScsiCmdReqFlags,                     // 1
    reserved1: [u8; 2],                                // 2..4
    pub total_ahs_length: u8,                          // 4
    pub data_segment_length: [u8; 3],                  // 5..8
    pub lun: [u8; 8],                                  // 8..16
    pub initiator_task_tag: U32<BigEndian>,            // 16..20
    pub expected_data_transfer_length: U32<BigEndian>, // 20..24
    pub cmd_sn: U32<BigEndian>,                        // 24..28
    pub exp_stat_sn: U32<BigEndian>,                   // 28..32
    pub scsi_descriptor_block: [u8; 16],               // 32..48
}

impl_bhs_view!(ScsiCommandRequest, Opcode::ScsiCommandReq);

impl BasicHeaderSegment for ScsiCommandRequest {
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

impl SendingData for ScsiCommandRequest {
    fn get_final_bit(&self) -> bool {
        self.flags.fin()
    }

    fn set_final_bit(&mut self) {
        self.flags = RawScsiCmdReqFlags::from(self.flags.flags() | ScsiCommandRequestFlags::FINAL);
    }
}

/// Builder for **SCSI Command** PDUs (opcode `0x01`).
///
/// The target never sends this PDU; the builder exists for initiator
/// emulation in tests and tools. The 16-byte CDB is copied verbatim, so
/// 10-byte CDBs are zero padded.
#[derive(Debug)]
pub struct ScsiCommandRequestBuilder {
    pub header: ScsiCommandRequest,
}

impl Default for ScsiCommandRequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ScsiCommandRequestBuilder {
    pub fn new() -> Self {
        let mut header = ScsiCommandRequest {
            opcode: RawBhsOpcode::from(Opcode::ScsiCommandReq),
            flags: RawScsiCmdReqFlags::from(ScsiCommandRequestFlags::FINAL),
            ..Default::default()
        };
        header.flags.set_task_attr(TaskAttribute::Simple);
        Self { header }
    }

    pub fn immediate(mut self) -> Self {
        self.header.opcode.set_i(true);
        self
    }

    pub fn read(mut self) -> Self {
        self.header.flags =
            RawScsiCmdReqFlags::from(self.header.flags.flags() | ScsiCommandRequestFlags::READ);
        self
    }

    pub fn write(mut self) -> Self {
        self.header.flags =
            RawScsiCmdReqFlags::from(self.header.flags.flags() | ScsiCommandRequestFlags::WRITE);
        self
    }

    /// Clears F: more unsolicited Data-Out PDUs follow the command.
    pub fn not_final(mut self) -> Self {
        self.header.flags =
            RawScsiCmdReqFlags::from(self.header.flags.flags() - ScsiCommandRequestFlags::FINAL);
        self
    }

    pub fn task_attribute(mut self, attr: TaskAttribute) -> Self {
        self.header.flags.set_task_attr(attr);
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

    pub fn expected_data_transfer_length(mut self, len: u32) -> Self {
        self.header.expected_data_transfer_length.set(len);
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

    pub fn scsi_descriptor_block(mut self, cdb: &[u8; 16]) -> Self {
        self.header.scsi_descriptor_block.copy_from_slice(cdb);
        self
    }
}
