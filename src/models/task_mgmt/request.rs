// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use zerocopy::{BigEndian, FromBytes as ZFromBytes, Immutable, IntoBytes, KnownLayout, U32};

use crate::models::{
    common::{BasicHeaderSegment, RESERVED_TAG, get_u24, impl_bhs_view},
    opcode::{Opcode, RawBhsOpcode},
    task_mgmt::common::TaskFunction,
};

/// BHS for **Task Management Function Request** (opcode `0x02`).
#[repr(C)]
#[derive(Debug, Default, PartialEq, ZFromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct TaskManagementRequest {
    pub opcode: RawBhsOpcode,                   // 0
    pub function: u8,                           // 1, F | function
    reserved1: [u8; 2],                         // 2..4
    pub total_ahs_length: u8,                   // 4
    pub data_segment_length: [u8; 3],           // 5..8
    pub lun: [u8; 8],                           // 8..16
    pub initiator_task_tag: U32<BigEndian>,     // 16..20
    pub referenced_task_tag: U32<BigEndian>,    // 20..24
    pub cmd_sn: U32<BigEndian>,                 // 24..28
    pub exp_stat_sn: U32<BigEndian>,            // 28..32
    pub ref_cmd_sn: U32<BigEndian>,             // 32..36
    pub exp_data_sn: U32<BigEndian>,            // 36..40
    reserved2: [u8; 8],                         // 40..48
}

impl_bhs_view!(TaskManagementRequest, Opcode::ScsiTaskMgmtReq);

impl TaskManagementRequest {
    #[inline]
    pub fn task_function(&self) -> TaskFunction {
        TaskFunction::from(self.function)
    }
}

impl BasicHeaderSegment for TaskManagementRequest {
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

/// Builder for task management requests, used for initiator emulation.
#[derive(Debug)]
pub struct TaskManagementRequestBuilder {
    pub header: TaskManagementRequest,
}

impl TaskManagementRequestBuilder {
    pub fn new(function: TaskFunction) -> Self {
        let mut header = TaskManagementRequest {
            opcode: RawBhsOpcode::from(Opcode::ScsiTaskMgmtReq),
            function: 0x80 | u8::from(function),
            ..Default::default()
        };
        header.opcode.set_i(true);
        header.referenced_task_tag.set(RESERVED_TAG);
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

    pub fn referenced_task_tag(mut self, tag: u32) -> Self {
        self.header.referenced_task_tag.set(tag);
        self
    }

    pub fn cmd_sn(mut self, sn: u32) -> Self {
        self.header.cmd_sn.set(sn);
        self
    }
}
