// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{collections::VecDeque, sync::Arc};

use tracing::{debug, warn};

use crate::{
    backend::{CtlIo, Nexus, PORT_STATUS_ABORTED, TaskAction, TaskIo, TaskStatus},
    frontend::{request::RequestPriv, session::Session},
    icl::pdu::IclPdu,
    models::{
        lun::{LUN_INVALID, decode_lun},
        task_mgmt::{
            common::{TaskFunction, TaskResponseCode},
            request::TaskManagementRequest,
            response::TaskManagementResponseBuilder,
        },
    },
};

pub(crate) fn handle_task_request(session: &Arc<Session>, request: IclPdu) {
    let (function, itt, referenced, raw_lun) =
        match TaskManagementRequest::ref_from_bhs_bytes(&request.bhs) {
            Ok(hdr) => (
                hdr.task_function(),
                hdr.initiator_task_tag.get(),
                hdr.referenced_task_tag.get(),
                hdr.lun,
            ),
            Err(e) => {
                warn!(session = session.id, "{e}; dropping connection");
                session.terminate();
                return;
            },
        };

    let action = match function {
        TaskFunction::AbortTask => TaskAction::AbortTask,
        TaskFunction::LogicalUnitReset => TaskAction::LunReset,
        TaskFunction::TargetWarmReset => TaskAction::TargetReset,
        other => {
            debug!(session = session.id, itt, function = ?other, "unsupported task management function");
            let rsp = TaskManagementResponseBuilder::new(TaskResponseCode::FunctionNotSupported)
                .initiator_task_tag(itt);
            session.pdu_queue(IclPdu::from_header(&rsp.header));
            return;
        },
    };

    if action == TaskAction::AbortTask {
        let purged: VecDeque<_> = {
            let mut seq = session.lock_seq();
            let (hit, keep): (VecDeque<_>, VecDeque<_>) = std::mem::take(&mut seq.waits)
                .into_iter()
                .partition(|w| w.initiator_task_tag == referenced);
            seq.waits = keep;
            hit
        };
        for wait in purged {
            debug!(session = session.id, itt = referenced, ttt = wait.target_transfer_tag, "removing pending transfer");
            wait.io.move_aborted(PORT_STATUS_ABORTED);
        }
    }

    let lun = decode_lun(&raw_lun);
    let nexus = Nexus {
        initiator_id: session.initiator_id,
        targ_port: session.target.targ_port,
        targ_lun: lun,
        mapped_lun: (lun != LUN_INVALID)
            .then(|| session.target.lookup(lun))
            .flatten(),
    };
    let task = TaskIo {
        action,
        tag_num: referenced,
        status: TaskStatus::Complete,
    };

    let request = RequestPriv::new(Arc::clone(session), request, 0);
    session.hold();
    if let Err(e) = session
        .backend
        .submit(CtlIo::new_task(nexus, task, Some(request)))
    {
        session.release();
        warn!(session = session.id, itt, "backend refused task management: {e}; dropping connection");
        session.terminate();
    }
}
