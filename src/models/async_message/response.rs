// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use zerocopy::{
    BigEndian, FromBytes as ZFromBytes, Immutable, IntoBytes, KnownLayout, U16, U32,
};

use crate::models::{
    common::{RESERVED_TAG, impl_bhs_view},
    opcode::{Opcode, RawBhsOpcode},
};

/// AsyncEvent codes the target emits (RFC 7143 § 11.9.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AsyncEvent {
    ScsiAsyncEvent = 0,
    /// Target requests Logout; Parameter3 carries the time to do it.
    LogoutRequest = 1,
    /// Target will drop this connection.
    DropConnection = 2,
    /// Target will drop all connections of the session.
    DropAllConnections = 3,
    RequestNegotiation = 4,
}

/// BHS for **Asynchronous Message** (opcode `0x32`).
#[repr(C)]
#[derive(Debug, Default, PartialEq, ZFromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct AsyncMessage {
    pub opcode: RawBhsOpcode,               // 0
    pub flags: u8,                          // 1
    reserved1: [u8; 2],                     // 2..4
    pub total_ahs_length: u8,               // 4
    pub data_segment_length: [u8; 3],       // 5..8
    pub lun: [u8; 8],                       // 8..16
    pub initiator_task_tag: U32<BigEndian>, // 16..20
    reserved2: [u8; 4],                     // 20..24
    pub stat_sn: U32<BigEndian>,            // 24..28
    pub exp_cmd_sn: U32<BigEndian>,         // 28..32
    pub max_cmd_sn: U32<BigEndian>,         // 32..36
    pub async_event: u8,                    // 36
    pub async_vcode: u8,                    // 37
    pub parameter1: U16<BigEndian>,         // 38..40
    pub parameter2: U16<BigEndian>,         // 40..42
    pub parameter3: U16<BigEndian>,         // 42..44
    reserved3: [u8; 4],                     // 44..48
}

impl_bhs_view!(AsyncMessage, Opcode::AsyncMessage);

#[derive(Debug)]
pub struct AsyncMessageBuilder {
    pub header: AsyncMessage,
}

impl AsyncMessageBuilder {
    pub fn new(event: AsyncEvent) -> Self {
        let mut header = AsyncMessage {
            opcode: RawBhsOpcode::from(Opcode::AsyncMessage),
            flags: 0x80,
            async_event: event as u8,
            ..Default::default()
        };
        header.initiator_task_tag.set(RESERVED_TAG);
        Self { header }
    }

    pub fn parameter3(mut self, v: u16) -> Self {
        self.header.parameter3.set(v);
        self
    }
}
