// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use zerocopy::{BigEndian, FromBytes as ZFromBytes, Immutable, IntoBytes, KnownLayout, U32};

use crate::models::{
    command::{
        common::{ResponseCode, ScsiCommandResponseFlags, ScsiStatus},
        zero_copy::RawScsiCmdRespFlags,
    },
    common::{get_u24, impl_bhs_view},
    opcode::{Opcode, RawBhsOpcode},
};

/// BHS for ScsiCommandResponse PDU
#[repr(C)]
#[derive(Debug, Default, PartialEq, ZFromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct ScsiCommandResponse {
    pub opcode: RawBhsOpcode,                              // 0
    pub flags: RawScsiCmdRespFlags,                        // 1
    pub response: u8,                                      // 2
    pub status: u8,                                        // 3
    pub total_ahs_length: u8,                              // 4
    pub data_segment_length: [u8; 3],                      // 5..8
    reserved: [u8; 8],                                     // 8..16
    pub initiator_task_tag: U32<BigEndian>,                // 16..20
    pub snack_tag: U32<BigEndian>,                         // 20..24
    pub stat_sn: U32<BigEndian>,                           // 24..28
    pub exp_cmd_sn: U32<BigEndian>,                        // 28..32
    pub max_cmd_sn: U32<BigEndian>,                        // 32..36
    pub exp_data_sn: U32<BigEndian>,                       // 36..40
    pub bidirectional_read_residual_count: U32<BigEndian>, // 40..44
    pub residual_count: U32<BigEndian>,                    // 44..48
}

impl_bhs_view!(ScsiCommandResponse, Opcode::ScsiCommandResp);

impl ScsiCommandResponse {
    #[inline]
    pub fn scsi_status(&self) -> ScsiStatus {
        ScsiStatus::from(self.status)
    }

    #[inline]
    pub fn response_code(&self) -> ResponseCode {
        ResponseCode::from(self.response)
    }

    #[inline]
    pub fn data_length(&self) -> usize {
        get_u24(&self.data_segment_length) as usize
    }
}

/// Builder for the SCSI Response sent when a command completes.
#[derive(Debug)]
pub struct ScsiCommandResponseBuilder {
    pub header: ScsiCommandResponse,
}

impl Default for ScsiCommandResponseBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ScsiCommandResponseBuilder {
    pub fn new() -> Self {
        Self {
            header: ScsiCommandResponse {
                opcode: RawBhsOpcode::from(Opcode::ScsiCommandResp),
                ..Default::default()
            },
        }
    }

    pub fn initiator_task_tag(mut self, tag: u32) -> Self {
        self.header.initiator_task_tag.set(tag);
        self
    }

    pub fn response(mut self, code: ResponseCode) -> Self {
        self.header.response = code.into();
        self
    }

    pub fn status(mut self, status: ScsiStatus) -> Self {
        self.header.status = status.into();
        self
    }

    pub fn exp_data_sn(mut self, sn: u32) -> Self {
        self.header.exp_data_sn.set(sn);
        self
    }

    /// Residual against the initiator's ExpectedDataTransferLength.
    ///
    /// `transferred > expected` is an overflow, `transferred < expected` an
    /// underflow; both set the matching flag and the residual count.
    pub fn residual(mut self, expected: u32, transferred: u32) -> Self {
        if transferred < expected {
            self.header.flags.insert(ScsiCommandResponseFlags::U_BIG);
            self.header.residual_count.set(expected - transferred);
        } else if transferred > expected {
            self.header.flags.insert(ScsiCommandResponseFlags::O_BIG);
            self.header.residual_count.set(transferred - expected);
        }
        self
    }
}
