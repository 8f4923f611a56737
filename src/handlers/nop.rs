// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use tracing::{trace, warn};

use crate::{
    frontend::session::Session,
    icl::pdu::IclPdu,
    models::nop::{request::NopOutRequest, response::NopInResponseBuilder},
};

/// Answers an initiator ping with a NOP-In echoing its data. A NOP-Out
/// with the reserved ITT answers our own ping and gets no reply.
pub(crate) fn handle_nop_out(session: &Arc<Session>, request: IclPdu) {
    let (itt, lun) = match NopOutRequest::ref_from_bhs_bytes(&request.bhs) {
        Ok(hdr) if hdr.is_ping_reply() => {
            trace!(session = session.id, "ping reply");
            return;
        },
        Ok(hdr) => (hdr.initiator_task_tag.get(), hdr.lun),
        Err(e) => {
            warn!(session = session.id, "{e}; dropping connection");
            session.terminate();
            return;
        },
    };

    let builder = NopInResponseBuilder::new().lun(lun).initiator_task_tag(itt);
    let mut response = IclPdu::from_header(&builder.header);
    if request.data_len > 0
        && let Err(e) = response.append_data(&request.data_bytes())
    {
        warn!(session = session.id, itt, "cannot echo ping data: {e}; dropping connection");
        session.terminate();
        return;
    }
    session.pdu_queue(response);
}
