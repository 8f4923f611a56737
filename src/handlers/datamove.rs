// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use tracing::{trace, warn};

use crate::{
    backend::{CtlIo, IoKind, PORT_STATUS_DATA_PHASE, PORT_STATUS_TERMINATING, ScsiIo},
    frontend::{
        request::RequestPriv,
        session::{DataWait, Session, SgCursor},
    },
    handlers::data_out::{Segment, handle_data_segment},
    icl::pdu::{IclPdu, PduError},
    models::{data::response::ScsiDataInBuilder, ready_2_transfer::response::ReadyToTransferBuilder},
};

/// Solicits the current move from the initiator: consumes whatever
/// immediate data covers it, then sends one R2T of at most MaxBurstLength
/// and parks the descriptor on the session's wait queue.
pub(crate) fn datamove_out(io: Box<CtlIo>) {
    let Some(req) = io.fe_private.as_ref() else {
        warn!("datamove for a descriptor without a request");
        io.move_aborted(PORT_STATUS_TERMINATING);
        return;
    };
    let session = Arc::clone(&req.session);
    let (exp_len, itt, lun) = (req.exp_data_len, req.initiator_task_tag(), req.lun());
    let Some((rel, len, filled, cursor)) = io.scsi().map(|s| {
        (
            s.kern_rel_offset,
            s.kern_data_len,
            s.ext_data_filled,
            SgCursor::at(&s.kern_sg, s.ext_data_filled as usize),
        )
    }) else {
        io.move_done();
        return;
    };

    if rel >= exp_len || rel.saturating_add(len) > exp_len {
        warn!(
            session = session.id,
            itt,
            rel,
            len,
            exp_len,
            "backend requested data beyond the expected transfer length"
        );
        io.move_aborted(PORT_STATUS_DATA_PHASE);
        return;
    }

    let mut wait = DataWait {
        target_transfer_tag: session.next_transfer_tag(),
        initiator_task_tag: itt,
        io,
        cursor,
        r2t_end: len,
    };

    let CtlIo { kind, fe_private, .. } = &mut *wait.io;
    let (IoKind::Scsi(scsi), Some(req)) = (kind, fe_private.as_mut()) else {
        wait.io.move_done();
        return;
    };
    if rel + filled < req.request.data_len as u32 {
        let seg = Segment {
            buffer_offset: 0,
            final_bit: false,
            immediate: true,
        };
        if let Err(e) = handle_data_segment(&req.request, seg, scsi, &mut wait.cursor, len) {
            warn!(session = session.id, itt, "immediate data: {e}; dropping connection");
            session.terminate();
            wait.io.move_aborted(PORT_STATUS_DATA_PHASE);
            return;
        }
    }

    let filled = scsi.ext_data_filled;
    if filled >= len {
        trace!(session = session.id, itt, len, "move satisfied by immediate data");
        wait.io.move_done();
        return;
    }

    let r2t_len = (len - filled).min(session.params.max_burst_length.max(1));
    wait.r2t_end = filled + r2t_len;
    let r2t_sn = req.r2t_sn;
    req.r2t_sn = req.r2t_sn.wrapping_add(1);
    let r2t = ReadyToTransferBuilder::new()
        .lun(lun)
        .initiator_task_tag(itt)
        .target_transfer_tag(wait.target_transfer_tag)
        .r2t_sn(r2t_sn)
        .buffer_offset(rel + filled)
        .desired_data_transfer_length(r2t_len);
    trace!(
        session = session.id,
        itt,
        ttt = wait.target_transfer_tag,
        offset = rel + filled,
        len = r2t_len,
        "R2T"
    );

    {
        let mut seq = session.lock_seq();
        if seq.terminating_tasks {
            drop(seq);
            wait.io.move_aborted(PORT_STATUS_TERMINATING);
            return;
        }
        seq.waits.push_back(wait);
    }
    session.pdu_queue(IclPdu::from_header(&r2t.header));
}

/// Sends the current move to the initiator as Data-In PDUs.
pub(crate) fn datamove_in(mut io: Box<CtlIo>) {
    let CtlIo { kind, fe_private, .. } = &mut *io;
    let (IoKind::Scsi(scsi), Some(req)) = (kind, fe_private.as_mut()) else {
        io.move_done();
        return;
    };
    let session = Arc::clone(&req.session);
    if let Err(e) = send_data_in(&session, scsi, req) {
        warn!(session = session.id, "cannot build Data-In: {e}; dropping connection");
        session.terminate();
        io.move_aborted(PORT_STATUS_TERMINATING);
        return;
    }
    io.move_done();
}

fn send_data_in(session: &Session, scsi: &mut ScsiIo, req: &mut RequestPriv) -> Result<(), PduError> {
    let max = (session.params.max_send_data_segment_length as usize).max(1);
    let exp_len = req.exp_data_len;
    let total = scsi.kern_total_len;
    let (itt, lun) = (req.initiator_task_tag(), req.lun());

    let emit = |data: IclPdu, start: u32, end: u32, data_sn: u32| {
        let mut hdr = ScsiDataInBuilder::new()
            .lun(lun)
            .initiator_task_tag(itt)
            .data_sn(data_sn)
            .buffer_offset(start);
        if end == total || end == exp_len {
            hdr = hdr.final_bit();
        }
        let mut pdu = data;
        pdu.bhs = hdr.header.to_bhs_bytes();
        session.pdu_queue(pdu);
    };

    let mut offset = scsi.kern_rel_offset;
    let mut pending: Option<(IclPdu, u32)> = None;
    'sg: for seg in &scsi.kern_sg {
        let mut pos = 0usize;
        while pos < seg.len() {
            if offset >= exp_len {
                break 'sg;
            }
            let (pdu, _) = pending.get_or_insert_with(|| (IclPdu::new_bhs(), offset));
            let n = (max - pdu.data_len)
                .min(seg.len() - pos)
                .min((exp_len - offset) as usize);
            pdu.append_data(&seg[pos..pos + n])?;
            pos += n;
            offset += n as u32;
            if pdu.data_len == max
                && let Some((full, start)) = pending.take()
            {
                emit(full, start, offset, req.data_sn);
                req.data_sn = req.data_sn.wrapping_add(1);
            }
        }
    }
    if let Some((last, start)) = pending.take() {
        emit(last, start, offset, req.data_sn);
        req.data_sn = req.data_sn.wrapping_add(1);
    }
    scsi.ext_data_filled = offset.saturating_sub(scsi.kern_rel_offset);
    Ok(())
}
