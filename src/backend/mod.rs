// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Contract between the iSCSI frontend and the SCSI execution engine.
//!
//! The frontend hands a [`CtlIo`] to [`Backend::submit`]. The backend then
//! calls [`FrontendPort::datamove`] zero or more times and
//! [`FrontendPort::done`] exactly once. Every datamove is answered by the
//! frontend with [`CtlIo::move_done`] or [`CtlIo::move_aborted`], which hands
//! the descriptor back to the waiting backend task.

pub mod ramdisk;

use std::sync::Weak;

use bytes::BytesMut;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::warn;

use crate::{
    frontend::request::RequestPriv,
    models::{command::common::ScsiStatus, data::sense_data::SenseData},
};

/// `port_status` set when the frontend gave up on a move because the task
/// or session is being terminated.
pub const PORT_STATUS_TERMINATING: u32 = 42;
/// `port_status` set on moves cancelled by session teardown.
pub const PORT_STATUS_ABORTED: u32 = 43;
/// `port_status` set when the requested move does not fit the transfer the
/// initiator announced, or the initiator sent malformed Data-Out for it.
pub const PORT_STATUS_DATA_PHASE: u32 = 44;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("no frontend port attached to the backend")]
    NoPort,
    #[error("backend is shutting down")]
    ShuttingDown,
}

/// Who is talking to which logical unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Nexus {
    pub initiator_id: u32,
    /// Backend port (one per target).
    pub targ_port: u32,
    /// LUN as the initiator addressed it.
    pub targ_lun: u32,
    /// Backend LUN id, `None` when the target slot is unmapped.
    pub mapped_lun: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TagType {
    #[default]
    Untagged,
    Simple,
    Ordered,
    HeadOfQueue,
    Aca,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataDirection {
    #[default]
    None,
    /// Target to initiator (READ).
    In,
    /// Initiator to target (WRITE).
    Out,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IoStatus {
    #[default]
    Pending,
    Success,
    /// Finished with a non-GOOD SCSI status.
    ScsiError,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskAction {
    AbortTask,
    LunReset,
    TargetReset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskStatus {
    #[default]
    Complete,
    LunDoesNotExist,
    FunctionNotSupported,
    Rejected,
}

/// SCSI command state shared by frontend and backend.
#[derive(Debug, Default)]
pub struct ScsiIo {
    pub tag_num: u32,
    pub tag_type: TagType,
    pub cdb: [u8; 16],
    pub direction: DataDirection,
    /// Scatter/gather list of the current move.
    pub kern_sg: Vec<BytesMut>,
    /// Bytes covered by the current move.
    pub kern_data_len: u32,
    /// Bytes the whole command moves.
    pub kern_total_len: u32,
    /// Offset of the current move within the whole transfer.
    pub kern_rel_offset: u32,
    /// Bytes of the current move the frontend has produced or consumed.
    pub ext_data_filled: u32,
    pub scsi_status: ScsiStatus,
    pub sense: Option<SenseData>,
}

impl ScsiIo {
    /// Places `data` into a scatter/gather list of `seg_len`-sized segments.
    pub fn fill_sg(&mut self, data: &[u8], seg_len: usize) {
        self.kern_sg = data
            .chunks(seg_len.max(1))
            .map(BytesMut::from)
            .collect();
        self.kern_data_len = data.len() as u32;
        self.ext_data_filled = 0;
    }

    /// Zeroed scatter/gather list for `len` bytes to be filled by the
    /// frontend.
    pub fn alloc_sg(&mut self, len: usize, seg_len: usize) {
        let seg_len = seg_len.max(1);
        self.kern_sg = (0..len.div_ceil(seg_len))
            .map(|i| BytesMut::zeroed(seg_len.min(len - i * seg_len)))
            .collect();
        self.kern_data_len = len as u32;
        self.ext_data_filled = 0;
    }

    /// Concatenated contents of the scatter/gather list.
    pub fn sg_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.kern_data_len as usize);
        for seg in &self.kern_sg {
            out.extend_from_slice(seg);
        }
        out
    }

    pub fn set_check_condition(&mut self, sense: SenseData) {
        self.scsi_status = ScsiStatus::CheckCondition;
        self.sense = Some(sense);
    }
}

#[derive(Debug)]
pub struct TaskIo {
    pub action: TaskAction,
    /// Task referenced by ABORT TASK.
    pub tag_num: u32,
    pub status: TaskStatus,
}

#[derive(Debug)]
pub enum IoKind {
    Scsi(Box<ScsiIo>),
    Task(TaskIo),
}

/// Result of handing a datamove to the frontend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Done,
    /// The frontend could not complete the move; see `port_status`.
    Aborted,
}

type MoveReply = oneshot::Sender<(Box<CtlIo>, MoveOutcome)>;

/// One backend I/O descriptor.
#[derive(Debug)]
pub struct CtlIo {
    pub nexus: Nexus,
    pub kind: IoKind,
    pub status: IoStatus,
    pub port_status: u32,
    /// Set by the backend when the task was aborted by task management.
    pub aborted: bool,
    /// Frontend bookkeeping; `None` for I/O the frontend does not answer.
    pub fe_private: Option<RequestPriv>,
    move_reply: Option<MoveReply>,
}

impl CtlIo {
    pub fn new_scsi(nexus: Nexus, scsi: ScsiIo, fe_private: Option<RequestPriv>) -> Box<Self> {
        Box::new(Self {
            nexus,
            kind: IoKind::Scsi(Box::new(scsi)),
            status: IoStatus::Pending,
            port_status: 0,
            aborted: false,
            fe_private,
            move_reply: None,
        })
    }

    pub fn new_task(nexus: Nexus, task: TaskIo, fe_private: Option<RequestPriv>) -> Box<Self> {
        Box::new(Self {
            nexus,
            kind: IoKind::Task(task),
            status: IoStatus::Pending,
            port_status: 0,
            aborted: false,
            fe_private,
            move_reply: None,
        })
    }

    #[inline]
    pub fn scsi(&self) -> Option<&ScsiIo> {
        match &self.kind {
            IoKind::Scsi(s) => Some(s),
            IoKind::Task(_) => None,
        }
    }

    #[inline]
    pub fn scsi_mut(&mut self) -> Option<&mut ScsiIo> {
        match &mut self.kind {
            IoKind::Scsi(s) => Some(s),
            IoKind::Task(_) => None,
        }
    }

    #[inline]
    pub fn task(&self) -> Option<&TaskIo> {
        match &self.kind {
            IoKind::Task(t) => Some(t),
            IoKind::Scsi(_) => None,
        }
    }

    #[inline]
    pub fn task_mut(&mut self) -> Option<&mut TaskIo> {
        match &mut self.kind {
            IoKind::Task(t) => Some(t),
            IoKind::Scsi(_) => None,
        }
    }

    /// Arms the move continuation; the backend awaits the returned
    /// receiver after passing the descriptor to [`FrontendPort::datamove`].
    pub fn begin_move(&mut self) -> oneshot::Receiver<(Box<CtlIo>, MoveOutcome)> {
        let (tx, rx) = oneshot::channel();
        self.move_reply = Some(tx);
        rx
    }

    /// Whether a datamove is in progress for this descriptor.
    #[inline]
    pub fn move_in_progress(&self) -> bool {
        self.move_reply.is_some()
    }

    /// Reports the current move as complete.
    pub fn move_done(self: Box<Self>) {
        self.finish_move(MoveOutcome::Done);
    }

    /// Reports the current move as failed with `port_status`.
    pub fn move_aborted(mut self: Box<Self>, port_status: u32) {
        self.port_status = port_status;
        self.finish_move(MoveOutcome::Aborted);
    }

    fn finish_move(mut self: Box<Self>, outcome: MoveOutcome) {
        match self.move_reply.take() {
            Some(tx) => {
                if tx.send((self, outcome)).is_err() {
                    warn!("backend stopped waiting for a datamove");
                }
            },
            None => warn!("move completion without a datamove in progress"),
        }
    }
}

/// Callbacks the backend invokes on the frontend.
pub trait FrontendPort: Send + Sync {
    /// Move data for the current scatter/gather list; answer with
    /// [`CtlIo::move_done`] or [`CtlIo::move_aborted`].
    fn datamove(&self, io: Box<CtlIo>);

    /// Terminal completion, exactly once per submitted descriptor.
    fn done(&self, io: Box<CtlIo>);

    /// LUNs currently mapped on `targ_port`, as initiators address them.
    fn port_luns(&self, targ_port: u32) -> Vec<u32>;
}

/// The SCSI execution engine.
pub trait Backend: Send + Sync {
    fn attach_port(&self, port: Weak<dyn FrontendPort>);

    /// Queues `io`; completion is reported through the attached port.
    fn submit(&self, io: Box<CtlIo>) -> Result<(), SubmitError>;
}
