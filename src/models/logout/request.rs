// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use zerocopy::{
    BigEndian, FromBytes as ZFromBytes, Immutable, IntoBytes, KnownLayout, U16, U32,
};

use crate::models::{
    common::{BasicHeaderSegment, get_u24, impl_bhs_view},
    logout::common::LogoutReason,
    opcode::{Opcode, RawBhsOpcode},
};

/// BHS for **Logout Request** (opcode `0x06`).
#[repr(C)]
#[derive(Debug, Default, PartialEq, ZFromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct LogoutRequest {
    pub opcode: RawBhsOpcode,               // 0
    pub reason: u8,                         // 1, F | reason
    reserved1: [u8; 2],                     // 2..4
    pub total_ahs_length: u8,               // 4
    pub data_segment_length: [u8; 3],       // 5..8
    reserved2: [u8; 8],                     // 8..16
    pub initiator_task_tag: U32<BigEndian>, // 16..20
    pub cid: U16<BigEndian>,                // 20..22
    reserved3: [u8; 2],                     // 22..24
    pub cmd_sn: U32<BigEndian>,             // 24..28
    pub exp_stat_sn: U32<BigEndian>,        // 28..32
    reserved4: [u8; 16],                    // 32..48
}

impl_bhs_view!(LogoutRequest, Opcode::LogoutReq);

impl LogoutRequest {
    #[inline]
    pub fn logout_reason(&self) -> LogoutReason {
        LogoutReason::from(self.reason)
    }
}

impl BasicHeaderSegment for LogoutRequest {
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

/// Builder for logout requests, used for initiator emulation.
#[derive(Debug)]
pub struct LogoutRequestBuilder {
    pub header: LogoutRequest,
}

impl LogoutRequestBuilder {
    pub fn new(reason: LogoutReason) -> Self {
        let mut header = LogoutRequest {
            opcode: RawBhsOpcode::from(Opcode::LogoutReq),
            reason: 0x80 | u8::from(reason),
            ..Default::default()
        };
        header.opcode.set_i(true);
        Self { header }
    }

    pub fn initiator_task_tag(mut self, tag: u32) -> Self {
        self.header.initiator_task_tag.set(tag);
        self
    }

    pub fn cid(mut self, cid: u16) -> Self {
        self.header.cid.set(cid);
        self
    }

    pub fn cmd_sn(mut self, sn: u32) -> Self {
        self.header.cmd_sn.set(sn);
        self
    }
}
