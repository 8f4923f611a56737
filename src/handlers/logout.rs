// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    frontend::session::Session,
    icl::pdu::IclPdu,
    models::logout::{
        common::{LogoutReason, LogoutResponseCode},
        request::LogoutRequest,
        response::LogoutResponseBuilder,
    },
};

pub(crate) fn handle_logout(session: &Arc<Session>, request: IclPdu) {
    let (reason, itt) = match LogoutRequest::ref_from_bhs_bytes(&request.bhs) {
        Ok(hdr) => (hdr.logout_reason(), hdr.initiator_task_tag.get()),
        Err(e) => {
            warn!(session = session.id, "{e}; dropping connection");
            session.terminate();
            return;
        },
    };

    match reason {
        LogoutReason::CloseSession | LogoutReason::CloseConnection => {
            debug!(session = session.id, %reason, "logout");
            let rsp = LogoutResponseBuilder::new(LogoutResponseCode::Success)
                .initiator_task_tag(itt)
                .time2wait(session.fe.time2wait)
                .time2retain(session.fe.time2retain);
            session.pdu_queue(IclPdu::from_header(&rsp.header));
            // the queued response is flushed when the connection closes
            session.terminate();
        },
        LogoutReason::RemoveConnectionForRecovery => {
            debug!(session = session.id, "connection recovery is not supported");
            let rsp = LogoutResponseBuilder::new(LogoutResponseCode::RecoveryNotSupported)
                .initiator_task_tag(itt);
            session.pdu_queue(IclPdu::from_header(&rsp.header));
        },
        LogoutReason::Other(code) => {
            warn!(session = session.id, code, "invalid logout reason; dropping connection");
            session.terminate();
        },
    }
}
