// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;

use crate::models::{
    command::request::ScsiCommandRequest,
    common::BasicHeaderSegment,
    data::request::ScsiDataOut,
    logout::request::LogoutRequest,
    nop::request::NopOutRequest,
    opcode::{Opcode, RawBhsOpcode, UnknownOpcode},
    task_mgmt::request::TaskManagementRequest,
};

/// Typed view over the BHS of a PDU received from an initiator.
#[derive(Debug)]
pub enum Pdu<'a> {
    NopOutRequest(&'a NopOutRequest),
    ScsiCommandRequest(&'a ScsiCommandRequest),
    TaskManagementRequest(&'a TaskManagementRequest),
    ScsiDataOut(&'a ScsiDataOut),
    LogoutRequest(&'a LogoutRequest),
}

/// Why a received BHS could not be turned into a [`Pdu`].
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error(transparent)]
    UnknownOpcode(#[from] UnknownOpcode),
    #[error("opcode {0:?} is not accepted by a target")]
    Unsupported(Opcode),
    #[error("malformed header: {0}")]
    Malformed(#[from] anyhow::Error),
}

impl<'a> Pdu<'a> {
    pub fn from_bhs_bytes(bytes: &'a [u8]) -> Result<Self, ParseError> {
        let raw = RawBhsOpcode::from_raw(bytes.first().copied().unwrap_or_default());
        let opcode = raw
            .opcode_known()
            .ok_or(UnknownOpcode(raw.opcode_raw()))?;
        Ok(match opcode {
            Opcode::NopOut => Pdu::NopOutRequest(NopOutRequest::ref_from_bhs_bytes(bytes)?),
            Opcode::ScsiCommandReq => {
                Pdu::ScsiCommandRequest(ScsiCommandRequest::ref_from_bhs_bytes(bytes)?)
            },
            Opcode::ScsiTaskMgmtReq => Pdu::TaskManagementRequest(
                TaskManagementRequest::ref_from_bhs_bytes(bytes)?,
            ),
            Opcode::ScsiDataOut => Pdu::ScsiDataOut(ScsiDataOut::ref_from_bhs_bytes(bytes)?),
            Opcode::LogoutReq => Pdu::LogoutRequest(LogoutRequest::ref_from_bhs_bytes(bytes)?),
            other => return Err(ParseError::Unsupported(other)),
        })
    }

    pub fn get_initiator_task_tag(&self) -> u32 {
        match self {
            Pdu::NopOutRequest(h) => h.get_initiator_task_tag(),
            Pdu::ScsiCommandRequest(h) => h.get_initiator_task_tag(),
            Pdu::TaskManagementRequest(h) => h.get_initiator_task_tag(),
            Pdu::ScsiDataOut(h) => h.get_initiator_task_tag(),
            Pdu::LogoutRequest(h) => h.get_initiator_task_tag(),
        }
    }

    /// CmdSN of the PDU, `None` for Data-Out.
    pub fn get_cmd_sn(&self) -> Option<u32> {
        match self {
            Pdu::NopOutRequest(h) => h.get_cmd_sn(),
            Pdu::ScsiCommandRequest(h) => h.get_cmd_sn(),
            Pdu::TaskManagementRequest(h) => h.get_cmd_sn(),
            Pdu::ScsiDataOut(h) => h.get_cmd_sn(),
            Pdu::LogoutRequest(h) => h.get_cmd_sn(),
        }
    }
}
