// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    collections::VecDeque,
    fmt,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError, Weak,
        atomic::{AtomicU32, Ordering},
    },
};

use anyhow::Result;
use bytes::BytesMut;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::Notify,
    task::JoinHandle,
    time::{MissedTickBehavior, interval, timeout},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    backend::{Backend, CtlIo, Nexus, PORT_STATUS_ABORTED, TaskAction, TaskIo, TaskStatus},
    frontend::{Frontend, FrontendParams, HandoffParams, target::Target},
    handlers,
    icl::{
        conn::{ConnError, ConnParams, IclConn, IclHandler},
        pdu::IclPdu,
    },
    models::{
        common::{RESERVED_TAG, TargetSeqHeader},
        nop::response::NopInResponseBuilder,
        opcode::Opcode,
    },
    state_machine::session_states::{AtomicSessionState, SessionState},
    utils::{initial_transfer_tag, next_transfer_tag, sn_in_window},
};

/// Position inside a scatter/gather list.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SgCursor {
    pub sg_index: usize,
    pub sg_offset: usize,
}

impl SgCursor {
    /// Cursor pointing `filled` bytes into `sg`.
    pub fn at(sg: &[BytesMut], filled: usize) -> Self {
        let mut left = filled;
        for (i, seg) in sg.iter().enumerate() {
            if left < seg.len() {
                return Self {
                    sg_index: i,
                    sg_offset: left,
                };
            }
            left -= seg.len();
        }
        Self {
            sg_index: sg.len(),
            sg_offset: 0,
        }
    }
}

/// A solicited transfer waiting for Data-Out PDUs.
#[derive(Debug)]
pub struct DataWait {
    pub target_transfer_tag: u32,
    pub initiator_task_tag: u32,
    pub io: Box<CtlIo>,
    pub cursor: SgCursor,
    /// `ext_data_filled` value at which the current burst is complete.
    pub r2t_end: u32,
}

/// State guarded by the per-session lock.
#[derive(Debug)]
pub(crate) struct SessionSeq {
    /// Next expected CmdSN.
    pub cmdsn: u32,
    /// StatSN for the next response.
    pub statsn: u32,
    pub waits: VecDeque<DataWait>,
    /// Set once teardown started aborting tasks; no new waits are queued.
    pub terminating_tasks: bool,
}

/// One iSCSI session with its single connection.
pub struct Session {
    pub id: u32,
    pub initiator_id: u32,
    pub target: Arc<Target>,
    pub(crate) params: HandoffParams,
    pub(crate) fe: FrontendParams,
    frontend: Weak<Frontend>,
    pub(crate) backend: Arc<dyn Backend>,
    pub(crate) conn: Arc<IclConn>,
    seq: Mutex<SessionSeq>,
    /// Callout ticks since the last PDU other than Data-Out.
    timeout: AtomicU32,
    outstanding: AtomicU32,
    drained: Notify,
    ttt: Mutex<u32>,
    state: AtomicSessionState,
    terminate: CancellationToken,
    callout_stop: CancellationToken,
    torn_down: CancellationToken,
    callout: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("initiator", &self.params.initiator_name)
            .field("target", &self.target.name)
            .field("state", &self.state.load())
            .finish()
    }
}

impl Session {
    pub(crate) fn new(
        id: u32,
        initiator_id: u32,
        params: HandoffParams,
        target: Arc<Target>,
        fe: FrontendParams,
        frontend: Weak<Frontend>,
        backend: Arc<dyn Backend>,
    ) -> Arc<Self> {
        let conn = IclConn::new(ConnParams {
            max_recv_data_segment_length: params.max_recv_data_segment_length as usize,
            max_send_data_segment_length: params.max_send_data_segment_length as usize,
            header_crc32c: params.header_crc32c,
            data_crc32c: params.data_crc32c,
            partial_receive_len: fe.partial_receive_len,
            send_coalesce_limit: fe.send_coalesce_limit,
            close_timeout: fe.close_timeout,
        });
        let seq = SessionSeq {
            cmdsn: params.cmd_sn,
            statsn: params.stat_sn,
            waits: VecDeque::new(),
            terminating_tasks: false,
        };
        let state = AtomicSessionState::default();
        state.advance(SessionState::Registered);
        Arc::new(Self {
            id,
            initiator_id,
            target,
            params,
            fe,
            frontend,
            backend,
            conn,
            seq: Mutex::new(seq),
            timeout: AtomicU32::new(0),
            outstanding: AtomicU32::new(0),
            drained: Notify::new(),
            ttt: Mutex::new(initial_transfer_tag()),
            state,
            terminate: CancellationToken::new(),
            callout_stop: CancellationToken::new(),
            torn_down: CancellationToken::new(),
            callout: Mutex::new(None),
        })
    }

    #[inline]
    pub fn initiator_name(&self) -> &str {
        &self.params.initiator_name
    }

    #[inline]
    pub fn initiator_addr(&self) -> &str {
        &self.params.initiator_addr
    }

    #[inline]
    pub fn isid(&self) -> [u8; 6] {
        self.params.isid
    }

    #[inline]
    pub fn params(&self) -> &HandoffParams {
        &self.params
    }

    #[inline]
    pub fn state(&self) -> SessionState {
        self.state.load()
    }

    #[inline]
    pub fn is_terminating(&self) -> bool {
        self.state.load() >= SessionState::Terminating
    }

    /// Number of backend descriptors not yet completed.
    #[inline]
    pub fn outstanding(&self) -> u32 {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Current (ExpCmdSN, StatSN) pair.
    pub fn sequence(&self) -> (u32, u32) {
        let seq = self.lock_seq();
        (seq.cmdsn, seq.statsn)
    }

    pub(crate) fn lock_seq(&self) -> MutexGuard<'_, SessionSeq> {
        self.seq.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts the connection, the ping callout and the maintenance task.
    pub(crate) fn start<S>(self: &Arc<Self>, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        tokio::spawn(Arc::clone(self).maintenance());

        let handler: Arc<dyn IclHandler> = Arc::clone(self) as Arc<dyn IclHandler>;
        if let Err(e) = self.conn.handoff(stream, handler) {
            self.terminate();
            return Err(e);
        }
        self.state.advance(SessionState::Active);

        if !self.fe.callout_interval.is_zero() {
            let handle = tokio::spawn(callout(
                Arc::downgrade(self),
                self.fe.callout_interval,
                self.callout_stop.clone(),
            ));
            *self.callout.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        }
        info!(
            session = self.id,
            initiator = %self.params.initiator_name,
            target = %self.target.name,
            "session active"
        );
        Ok(())
    }

    /// Stamps StatSN / ExpCmdSN / MaxCmdSN and queues `pdu` on the
    /// connection.
    ///
    /// R2T, Data-In and NOP-In pings carry the current StatSN without
    /// consuming it.
    pub fn pdu_queue(&self, mut pdu: IclPdu) {
        let opcode = pdu.opcode();
        let mut seq = self.lock_seq();
        match TargetSeqHeader::from_bhs_bytes(&mut pdu.bhs) {
            Ok(hdr) => {
                let keeps_statsn = match opcode {
                    Some(Opcode::NopIn) => hdr.initiator_task_tag.get() == RESERVED_TAG,
                    Some(op) => op.keeps_stat_sn(),
                    None => false,
                };
                hdr.stat_sn.set(seq.statsn);
                if !keeps_statsn {
                    seq.statsn = seq.statsn.wrapping_add(1);
                }
                hdr.exp_cmd_sn.set(seq.cmdsn);
                hdr.max_cmd_sn
                    .set(seq.cmdsn.wrapping_add(self.fe.max_cmdsn_delta));
            },
            Err(e) => warn!(session = self.id, "cannot stamp PDU: {e}"),
        }
        self.conn.pdu_queue(pdu);
    }

    /// Applies the CmdSN window to a received PDU. Returns `false` when the
    /// PDU is outside the window and must be dropped.
    pub(crate) fn update_cmdsn(&self, pdu: &IclPdu, cmdsn: u32) -> bool {
        let mut seq = self.lock_seq();
        if !sn_in_window(cmdsn, seq.cmdsn, self.fe.max_cmdsn_delta) {
            debug!(
                session = self.id,
                cmdsn,
                expected = seq.cmdsn,
                max = seq.cmdsn.wrapping_add(self.fe.max_cmdsn_delta),
                "received PDU outside of the CmdSN window; dropping"
            );
            return false;
        }
        if !pdu.is_immediate() {
            seq.cmdsn = seq.cmdsn.wrapping_add(1 + pdu.additional_pdus);
        }
        true
    }

    #[inline]
    pub(crate) fn reset_timeout(&self) {
        self.timeout.store(0, Ordering::Release);
    }

    pub(crate) fn next_transfer_tag(&self) -> u32 {
        let mut ttt = self.ttt.lock().unwrap_or_else(PoisonError::into_inner);
        *ttt = next_transfer_tag(*ttt);
        *ttt
    }

    pub(crate) fn hold(&self) {
        self.outstanding.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn release(&self) {
        if self.outstanding.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.drained.notify_one();
        }
    }

    /// Requests asynchronous teardown. Calls after the first are no-ops.
    pub fn terminate(&self) {
        if self.state.advance(SessionState::Terminating) {
            info!(session = self.id, initiator = %self.params.initiator_name, "terminating session");
            self.terminate.cancel();
        }
    }

    /// Resolves once the session is fully torn down.
    pub async fn wait_torn_down(&self) {
        self.torn_down.cancelled().await;
    }

    /// Aborts a pending solicited transfer: ABORT TASK to the backend and
    /// a failed move for the waiting descriptor.
    pub(crate) fn abort_wait(&self, wait: DataWait, port_status: u32) {
        let task = TaskIo {
            action: TaskAction::AbortTask,
            tag_num: wait.initiator_task_tag,
            status: TaskStatus::Complete,
        };
        let nexus: Nexus = wait.io.nexus;
        if let Err(e) = self.backend.submit(CtlIo::new_task(nexus, task, None)) {
            warn!(session = self.id, itt = wait.initiator_task_tag, "cannot queue ABORT TASK: {e}");
        }
        wait.io.move_aborted(port_status);
    }

    fn send_ping(&self) {
        let nop = NopInResponseBuilder::new().target_transfer_tag(0);
        self.pdu_queue(IclPdu::from_header(&nop.header));
    }

    async fn maintenance(self: Arc<Self>) {
        self.terminate.cancelled().await;

        // stop accepting transfers and fail the ones still waiting
        let waits = {
            let mut seq = self.lock_seq();
            seq.terminating_tasks = true;
            std::mem::take(&mut seq.waits)
        };
        for wait in waits {
            self.abort_wait(wait, PORT_STATUS_ABORTED);
        }

        loop {
            let drained = self.drained.notified();
            let left = self.outstanding();
            if left == 0 {
                break;
            }
            if timeout(self.fe.terminate_wait, drained).await.is_err() {
                info!(session = self.id, outstanding = left, "waiting for tasks to finish");
            }
        }

        self.callout_stop.cancel();
        let callout = self
            .callout
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = callout
            && let Err(e) = handle.await
        {
            warn!(session = self.id, "callout ended abnormally: {e}");
        }

        self.conn.close().await;

        if let Some(frontend) = self.frontend.upgrade() {
            frontend.release_session(self.id, self.initiator_id);
        }
        self.state.advance(SessionState::TornDown);
        debug!(session = self.id, "session torn down");
        self.torn_down.cancel();
    }
}

impl IclHandler for Session {
    fn receive(self: Arc<Self>, pdu: IclPdu) {
        handlers::dispatch(&self, pdu);
    }

    fn error(self: Arc<Self>, err: ConnError) {
        match err {
            ConnError::PeerClosed => {
                debug!(session = self.id, "connection closed by initiator")
            },
            err => warn!(session = self.id, "connection error: {err}; dropping connection"),
        }
        self.terminate();
    }
}

async fn callout(session: Weak<Session>, every: std::time::Duration, stop: CancellationToken) {
    let mut tick = interval(every);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tick.tick().await;
    loop {
        tokio::select! {
            _ = stop.cancelled() => return,
            _ = tick.tick() => {},
        }
        let Some(session) = session.upgrade() else {
            return;
        };
        if session.is_terminating() {
            continue;
        }

        let limit = session.fe.ping_timeout;
        if limit == 0 {
            // pings disabled
            session.reset_timeout();
            continue;
        }
        let idle = session.timeout.fetch_add(1, Ordering::AcqRel) + 1;
        if idle >= limit {
            warn!(
                session = session.id,
                "no ping reply (NOP-Out) after {idle} ticks; dropping connection"
            );
            session.terminate();
            continue;
        }
        if idle >= 2 {
            session.send_ping();
        }
    }
}
