// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use crate::{frontend::session::Session, icl::pdu::IclPdu};

/// Frontend bookkeeping carried inside a backend descriptor.
#[derive(Debug)]
pub struct RequestPriv {
    pub session: Arc<Session>,
    /// The SCSI Command or Task Management request that started the task.
    pub request: IclPdu,
    /// ExpectedDataTransferLength of the command.
    pub exp_data_len: u32,
    /// Next R2TSN for this task.
    pub r2t_sn: u32,
    /// Next DataSN for this task; ends up as ExpDataSN in the response.
    pub data_sn: u32,
}

impl RequestPriv {
    pub fn new(session: Arc<Session>, request: IclPdu, exp_data_len: u32) -> Self {
        Self {
            session,
            request,
            exp_data_len,
            r2t_sn: 0,
            data_sn: 0,
        }
    }

    /// Initiator task tag of the request.
    #[inline]
    pub fn initiator_task_tag(&self) -> u32 {
        u32::from_be_bytes([
            self.request.bhs[16],
            self.request.bhs[17],
            self.request.bhs[18],
            self.request.bhs[19],
        ])
    }

    /// Raw LUN field of the request.
    #[inline]
    pub fn lun(&self) -> [u8; 8] {
        let mut lun = [0u8; 8];
        lun.copy_from_slice(&self.request.bhs[8..16]);
        lun
    }
}
