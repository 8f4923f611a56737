//! Handlers for the PDUs a target receives and for the backend callbacks.

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    frontend::session::Session,
    icl::pdu::IclPdu,
    models::{opcode::Opcode, parse::Pdu},
};

/// Data-Out PDUs, including the immediate data of a SCSI Command.
pub mod data_out;
/// Backend datamove: R2T for writes, Data-In for reads.
pub mod datamove;
/// Backend completion: SCSI Response and Task Management Response.
pub mod done;
/// Logout Request PDUs.
pub mod logout;
/// NOP-Out PDUs.
pub mod nop;
/// SCSI Command PDUs.
pub mod scsi_command;
/// Task Management Function Request PDUs.
pub mod task_mgmt;

/// Routes one received PDU. Runs on the connection's receiver task, so
/// PDUs of a session are handled in wire order.
pub(crate) fn dispatch(session: &Arc<Session>, pdu: IclPdu) {
    if session.is_terminating() {
        debug!(session = session.id, opcode = ?pdu.opcode(), "session terminating; dropping PDU");
        return;
    }

    let cmd_sn = match Pdu::from_bhs_bytes(&pdu.bhs) {
        Ok(view) => view.get_cmd_sn(),
        Err(e) => {
            warn!(session = session.id, "received invalid PDU: {e}; dropping connection");
            session.terminate();
            return;
        },
    };

    let opcode = pdu.opcode();
    if opcode != Some(Opcode::ScsiDataOut) {
        session.reset_timeout();
    }
    if let Some(sn) = cmd_sn
        && !session.update_cmdsn(&pdu, sn)
    {
        return;
    }

    match opcode {
        Some(Opcode::NopOut) => nop::handle_nop_out(session, pdu),
        Some(Opcode::ScsiCommandReq) => scsi_command::handle_scsi_command(session, pdu),
        Some(Opcode::ScsiTaskMgmtReq) => task_mgmt::handle_task_request(session, pdu),
        Some(Opcode::ScsiDataOut) => data_out::handle_data_out(session, pdu),
        Some(Opcode::LogoutReq) => logout::handle_logout(session, pdu),
        other => {
            warn!(session = session.id, ?other, "received unsupported opcode; dropping connection");
            session.terminate();
        },
    }
}
