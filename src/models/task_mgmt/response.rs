// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use zerocopy::{BigEndian, FromBytes as ZFromBytes, Immutable, IntoBytes, KnownLayout, U32};

use crate::models::{
    common::impl_bhs_view,
    opcode::{Opcode, RawBhsOpcode},
    task_mgmt::common::TaskResponseCode,
};

/// BHS for **Task Management Function Response** (opcode `0x22`).
#[repr(C)]
#[derive(Debug, Default, PartialEq, ZFromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct TaskManagementResponse {
    pub opcode: RawBhsOpcode,               // 0
    pub flags: u8,                          // 1
    pub response: u8,                       // 2
    reserved1: u8,                          // 3
    pub total_ahs_length: u8,               // 4
    pub data_segment_length: [u8; 3],       // 5..8
    reserved2: [u8; 8],                     // 8..16
    pub initiator_task_tag: U32<BigEndian>, // 16..20
    reserved3: [u8; 4],                     // 20..24
    pub stat_sn: U32<BigEndian>,            // 24..28
    pub exp_cmd_sn: U32<BigEndian>,         // 28..32
    pub max_cmd_sn: U32<BigEndian>,         // 32..36
    reserved4: [u8; 12],                    // 36..48
}

impl_bhs_view!(TaskManagementResponse, Opcode::ScsiTaskMgmtResp);

impl TaskManagementResponse {
    #[inline]
    pub fn response_code(&self) -> TaskResponseCode {
        TaskResponseCode::from(self.response)
    }
}

#[derive(Debug)]
pub struct TaskManagementResponseBuilder {
    pub header: TaskManagementResponse,
}

impl TaskManagementResponseBuilder {
    pub fn new(code: TaskResponseCode) -> Self {
        Self {
            header: TaskManagementResponse {
                opcode: RawBhsOpcode::from(Opcode::ScsiTaskMgmtResp),
                flags: 0x80,
                response: code.into(),
                ..Default::default()
            },
        }
    }

    pub fn initiator_task_tag(mut self, tag: u32) -> Self {
        self.header.initiator_task_tag.set(tag);
        self
    }
}
