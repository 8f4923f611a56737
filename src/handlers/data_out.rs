// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::{
    backend::{PORT_STATUS_ABORTED, PORT_STATUS_DATA_PHASE, ScsiIo},
    frontend::session::{DataWait, Session, SgCursor},
    handlers::datamove,
    icl::pdu::IclPdu,
    models::data::{request::ScsiDataOut, sense_data::SenseData},
};

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum DataError {
    #[error("received Data-Out at offset {got}, expected {expected}")]
    Offset { got: u32, expected: u32 },
    #[error("received {extra} bytes beyond the solicited burst")]
    TooMuch { extra: usize },
    #[error("Final flag set with {missing} bytes of the burst outstanding")]
    EarlyFinal { missing: u32 },
    #[error("burst complete without the Final flag")]
    MissingFinal,
}

/// Where a data segment sits in the transfer.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Segment {
    pub buffer_offset: u32,
    pub final_bit: bool,
    /// Immediate data of the SCSI Command rather than a Data-Out.
    pub immediate: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Progress {
    More,
    /// `ext_data_filled` reached the end of the burst.
    Burst,
}

/// Copies `len` payload bytes starting at `from` into the scatter/gather
/// list, one segment at a time.
fn copy_to_sg(pdu: &IclPdu, mut from: usize, mut len: usize, scsi: &mut ScsiIo, cursor: &mut SgCursor) {
    while len > 0 {
        let Some(seg) = scsi.kern_sg.get_mut(cursor.sg_index) else {
            break;
        };
        let n = (seg.len() - cursor.sg_offset).min(len);
        let copied = pdu.get_data(from, &mut seg[cursor.sg_offset..cursor.sg_offset + n]);
        from += copied;
        len -= copied;
        cursor.sg_offset += copied;
        scsi.ext_data_filled += copied as u32;
        if cursor.sg_offset == seg.len() {
            cursor.sg_index += 1;
            cursor.sg_offset = 0;
        }
        if copied < n {
            break;
        }
    }
}

/// Consumes the data segment of `pdu` into the current move.
pub(crate) fn handle_data_segment(
    pdu: &IclPdu,
    seg: Segment,
    scsi: &mut ScsiIo,
    cursor: &mut SgCursor,
    r2t_end: u32,
) -> Result<Progress, DataError> {
    let expected = scsi.kern_rel_offset + scsi.ext_data_filled;
    let skip = if seg.immediate {
        // bytes before `expected` were consumed by an earlier move
        expected.saturating_sub(seg.buffer_offset) as usize
    } else if seg.buffer_offset != expected {
        return Err(DataError::Offset {
            got: seg.buffer_offset,
            expected,
        });
    } else {
        0
    };

    let available = pdu.data_len.saturating_sub(skip);
    let room = r2t_end.saturating_sub(scsi.ext_data_filled) as usize;
    if available > room {
        if !seg.immediate {
            return Err(DataError::TooMuch {
                extra: available - room,
            });
        }
        debug!(
            extra = available - room,
            "ignoring immediate data beyond the backend buffer"
        );
    }
    copy_to_sg(pdu, skip, available.min(room), scsi, cursor);

    let complete = scsi.ext_data_filled >= r2t_end;
    if !seg.immediate {
        if complete && !seg.final_bit {
            return Err(DataError::MissingFinal);
        }
        if !complete && seg.final_bit {
            return Err(DataError::EarlyFinal {
                missing: r2t_end - scsi.ext_data_filled,
            });
        }
    }
    Ok(if complete {
        Progress::Burst
    } else {
        Progress::More
    })
}

/// Puts a wait back on the session queue, or aborts it when teardown has
/// already drained the queue.
fn requeue(session: &Session, wait: DataWait) {
    let mut seq = session.lock_seq();
    if seq.terminating_tasks {
        drop(seq);
        session.abort_wait(wait, PORT_STATUS_ABORTED);
        return;
    }
    seq.waits.push_back(wait);
}

pub(crate) fn handle_data_out(session: &Arc<Session>, pdu: IclPdu) {
    let (ttt, itt, seg) = match ScsiDataOut::ref_from_bhs_bytes(&pdu.bhs) {
        Ok(hdr) => (
            hdr.target_transfer_tag.get(),
            hdr.initiator_task_tag.get(),
            Segment {
                buffer_offset: hdr.buffer_offset.get(),
                final_bit: hdr.flags.fin(),
                immediate: false,
            },
        ),
        Err(e) => {
            warn!(session = session.id, "{e}; dropping connection");
            session.terminate();
            return;
        },
    };

    let wait = {
        let mut seq = session.lock_seq();
        seq.waits
            .iter()
            .position(|w| w.target_transfer_tag == ttt)
            .and_then(|i| seq.waits.remove(i))
    };
    let Some(mut wait) = wait else {
        warn!(
            session = session.id,
            ttt,
            itt,
            "data transfer tag not found; dropping connection"
        );
        session.terminate();
        return;
    };

    let Some(scsi) = wait.io.scsi_mut() else {
        requeue(session, wait);
        session.terminate();
        return;
    };
    match handle_data_segment(&pdu, seg, scsi, &mut wait.cursor, wait.r2t_end) {
        Ok(Progress::More) => {
            trace!(session = session.id, ttt, filled = scsi.ext_data_filled, "Data-Out");
            requeue(session, wait);
        },
        Ok(Progress::Burst) => {
            if scsi.ext_data_filled >= scsi.kern_data_len {
                wait.io.move_done();
            } else {
                // next burst of the same move
                datamove::datamove_out(wait.io);
            }
        },
        Err(e) => {
            warn!(session = session.id, itt, ttt, "{e}; dropping connection");
            scsi.set_check_condition(SenseData::data_phase_error());
            wait.io.move_aborted(PORT_STATUS_DATA_PHASE);
            session.terminate();
        },
    }
}
