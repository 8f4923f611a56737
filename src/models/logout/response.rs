// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use zerocopy::{
    BigEndian, FromBytes as ZFromBytes, Immutable, IntoBytes, KnownLayout, U16, U32,
};

use crate::models::{
    common::impl_bhs_view,
    logout::common::LogoutResponseCode,
    opcode::{Opcode, RawBhsOpcode},
};

/// BHS for **Logout Response** (opcode `0x26`).
#[repr(C)]
#[derive(Debug, Default, PartialEq, ZFromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct LogoutResponse {
    pub opcode: RawBhsOpcode,               // 0
    pub flags: u8,                          // 1
    pub response: u8,                       // 2
    reserved0: u8,                          // 3
    pub total_ahs_length: u8,               // 4
    pub data_segment_length: [u8; 3],       // 5..8
    reserved1: [u8; 8],                     // 8..16
    pub initiator_task_tag: U32<BigEndian>, // 16..20
    reserved2: [u8; 4],                     // 20..24
    pub stat_sn: U32<BigEndian>,            // 24..28
    pub exp_cmd_sn: U32<BigEndian>,         // 28..32
    pub max_cmd_sn: U32<BigEndian>,         // 32..36
    reserved3: [u8; 4],                     // 36..40
    pub time2wait: U16<BigEndian>,          // 40..42
    pub time2retain: U16<BigEndian>,        // 42..44
    reserved4: [u8; 4],                     // 44..48
}

impl_bhs_view!(LogoutResponse, Opcode::LogoutResp);

impl LogoutResponse {
    #[inline]
    pub fn response_code(&self) -> LogoutResponseCode {
        LogoutResponseCode::from(self.response)
    }
}

#[derive(Debug)]
pub struct LogoutResponseBuilder {
    pub header: LogoutResponse,
}

impl LogoutResponseBuilder {
    pub fn new(code: LogoutResponseCode) -> Self {
        Self {
            header: LogoutResponse {
                opcode: RawBhsOpcode::from(Opcode::LogoutResp),
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

    pub fn time2wait(mut self, secs: u16) -> Self {
        self.header.time2wait.set(secs);
        self
    }

    pub fn time2retain(mut self, secs: u16) -> Self {
        self.header.time2retain.set(secs);
        self
    }
}
