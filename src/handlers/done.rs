// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use tracing::{debug, trace, warn};

use crate::{
    backend::{CtlIo, IoKind, ScsiIo, TaskIo, TaskStatus},
    frontend::request::RequestPriv,
    icl::pdu::IclPdu,
    models::{
        command::{common::ResponseCode, response::ScsiCommandResponseBuilder},
        task_mgmt::{common::TaskResponseCode, response::TaskManagementResponseBuilder},
    },
};

/// Terminal completion of a backend descriptor.
pub(crate) fn done(mut io: Box<CtlIo>) {
    let Some(req) = io.fe_private.take() else {
        // internal aborts issued during teardown
        trace!(nexus = ?io.nexus, "completion without a request");
        return;
    };
    let session = std::sync::Arc::clone(&req.session);

    match &io.kind {
        IoKind::Scsi(_) if io.aborted => {
            debug!(session = session.id, itt = req.initiator_task_tag(), "task aborted; no response");
        },
        IoKind::Scsi(scsi) => scsi_response(&req, scsi),
        IoKind::Task(task) => task_response(&req, task),
    }
    session.release();
}

fn scsi_response(req: &RequestPriv, scsi: &ScsiIo) {
    let session = &req.session;
    let itt = req.initiator_task_tag();
    let rsp = ScsiCommandResponseBuilder::new()
        .initiator_task_tag(itt)
        .response(ResponseCode::CommandCompleted)
        .status(scsi.scsi_status)
        .exp_data_sn(req.data_sn)
        .residual(req.exp_data_len, scsi.kern_total_len);
    let mut pdu = IclPdu::from_header(&rsp.header);

    if let Some(sense) = &scsi.sense {
        let bytes = sense.to_fixed_bytes();
        let mut data = Vec::with_capacity(2 + bytes.len());
        data.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
        data.extend_from_slice(&bytes);
        if let Err(e) = pdu.append_data(&data) {
            warn!(session = session.id, itt, "cannot attach sense data: {e}; dropping connection");
            session.terminate();
            return;
        }
    }
    trace!(session = session.id, itt, status = ?scsi.scsi_status, "SCSI response");
    session.pdu_queue(pdu);
}

fn task_response(req: &RequestPriv, task: &TaskIo) {
    let code = match task.status {
        TaskStatus::Complete => TaskResponseCode::FunctionComplete,
        TaskStatus::LunDoesNotExist => TaskResponseCode::LunDoesNotExist,
        TaskStatus::FunctionNotSupported => TaskResponseCode::FunctionNotSupported,
        TaskStatus::Rejected => TaskResponseCode::FunctionRejected,
    };
    let rsp = TaskManagementResponseBuilder::new(code).initiator_task_tag(req.initiator_task_tag());
    req.session.pdu_queue(IclPdu::from_header(&rsp.header));
}
