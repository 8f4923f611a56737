// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::{
    backend::{CtlIo, Nexus, ScsiIo, TagType},
    frontend::{request::RequestPriv, session::Session},
    icl::pdu::IclPdu,
    models::{
        command::{common::TaskAttribute, request::ScsiCommandRequest},
        lun::{LUN_INVALID, decode_lun},
    },
};

fn tag_type(session: &Session, attr: TaskAttribute) -> TagType {
    match attr {
        TaskAttribute::Untagged => TagType::Untagged,
        TaskAttribute::Simple => TagType::Simple,
        TaskAttribute::Ordered => TagType::Ordered,
        TaskAttribute::HeadOfQueue => TagType::HeadOfQueue,
        TaskAttribute::ACA => TagType::Aca,
        TaskAttribute::Reserved(v) => {
            warn!(session = session.id, attr = v, "unrecognized task attribute; assuming untagged");
            TagType::Untagged
        },
    }
}

/// Turns a SCSI Command into a backend descriptor and queues it.
pub(crate) fn handle_scsi_command(session: &Arc<Session>, request: IclPdu) {
    let (itt, exp_len, raw_lun, attr, cdb) =
        match ScsiCommandRequest::ref_from_bhs_bytes(&request.bhs) {
            Ok(hdr) => (
                hdr.initiator_task_tag.get(),
                hdr.expected_data_transfer_length.get(),
                hdr.lun,
                hdr.flags.task_attr(),
                hdr.scsi_descriptor_block,
            ),
            Err(e) => {
                warn!(session = session.id, "{e}; dropping connection");
                session.terminate();
                return;
            },
        };

    if request.data_len > 0 && !session.params.immediate_data {
        warn!(
            session = session.id,
            itt,
            len = request.data_len,
            "unsolicited data with ImmediateData=No; dropping connection"
        );
        session.terminate();
        return;
    }

    let lun = decode_lun(&raw_lun);
    let mapped_lun = if lun == LUN_INVALID {
        debug!(session = session.id, itt, lun = ?raw_lun, "undecodable LUN");
        None
    } else {
        session.target.lookup(lun)
    };
    let nexus = Nexus {
        initiator_id: session.initiator_id,
        targ_port: session.target.targ_port,
        targ_lun: lun,
        mapped_lun,
    };
    let scsi = ScsiIo {
        tag_num: itt,
        tag_type: tag_type(session, attr),
        cdb,
        ..Default::default()
    };
    trace!(session = session.id, itt, opcode = cdb[0], lun, exp_len, "SCSI command");

    let request = RequestPriv::new(Arc::clone(session), request, exp_len);
    session.hold();
    if let Err(e) = session
        .backend
        .submit(CtlIo::new_scsi(nexus, scsi, Some(request)))
    {
        session.release();
        warn!(session = session.id, itt, "backend refused command: {e}; dropping connection");
        session.terminate();
    }
}
