// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The iSCSI frontend: session and target registry, socket handoff and the
//! administrative operations.

pub mod request;
pub mod session;
pub mod target;

use std::{
    collections::BTreeMap,
    fmt::Write as _,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError, Weak,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use once_cell::sync::OnceCell;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::{
    backend::{Backend, CtlIo, DataDirection, FrontendPort},
    cfg::enums::Digest,
    frontend::{session::Session, target::Target},
    handlers::{datamove, done},
    icl::pdu::IclPdu,
    models::async_message::response::{AsyncEvent, AsyncMessageBuilder},
    utils::xml_escape,
};

/// Seconds the initiator is given to log out after an administrative
/// logout request.
const LOGOUT_REQUEST_WINDOW: u16 = 10;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("no session matches the selection")]
    NoMatch,
    #[error("target {0} already exists")]
    TargetExists(String),
    #[error("target {0} not found")]
    TargetNotFound(String),
    #[error("LUN {0} is out of range")]
    LunOutOfRange(u32),
    #[error("LUN {0} is already mapped")]
    LunBusy(u32),
    #[error("LUN {0} is not mapped")]
    LunNotMapped(u32),
}

#[derive(Debug, Error)]
pub enum HandoffError {
    #[error("frontend is shutting down")]
    Closed,
    #[error("target {0} not found")]
    TargetNotFound(String),
    #[error("no free initiator ids")]
    InitiatorIdsExhausted,
    #[error("cannot start connection: {0}")]
    Conn(#[from] anyhow::Error),
}

/// Frontend-wide tunables.
#[derive(Debug, Clone)]
pub struct FrontendParams {
    /// Callout ticks without traffic before the session is dropped; 0
    /// disables both the check and the pings.
    pub ping_timeout: u32,
    pub callout_interval: Duration,
    pub max_cmdsn_delta: u32,
    pub partial_receive_len: usize,
    pub send_coalesce_limit: usize,
    pub max_initiators: u32,
    /// How long teardown waits between progress reports.
    pub terminate_wait: Duration,
    pub time2wait: u16,
    pub time2retain: u16,
    pub portal_group_tag: u16,
    pub close_timeout: Duration,
}

impl Default for FrontendParams {
    fn default() -> Self {
        Self {
            ping_timeout: 5,
            callout_interval: Duration::from_secs(1),
            max_cmdsn_delta: 256,
            partial_receive_len: 128 * 1024,
            send_coalesce_limit: 256 * 1024,
            max_initiators: 2048,
            terminate_wait: Duration::from_secs(5),
            time2wait: 0,
            time2retain: 0,
            portal_group_tag: 1,
            close_timeout: Duration::from_secs(5),
        }
    }
}

/// Parameters negotiated during login, handed over with the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffParams {
    pub initiator_name: String,
    pub initiator_addr: String,
    pub initiator_alias: Option<String>,
    pub isid: [u8; 6],
    pub target_name: String,
    pub cmd_sn: u32,
    pub stat_sn: u32,
    pub max_recv_data_segment_length: u32,
    pub max_send_data_segment_length: u32,
    pub max_burst_length: u32,
    pub first_burst_length: u32,
    pub immediate_data: bool,
    pub header_crc32c: bool,
    pub data_crc32c: bool,
}

/// Which sessions an administrative request applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionSelector {
    All,
    SessionId(u32),
    /// Sessions matching every given field.
    Initiator {
        name: Option<String>,
        addr: Option<String>,
    },
}

impl SessionSelector {
    fn matches(&self, s: &Session) -> bool {
        match self {
            Self::All => true,
            Self::SessionId(id) => s.id == *id,
            Self::Initiator { name, addr } => {
                name.as_deref().is_none_or(|n| n == s.initiator_name())
                    && addr.as_deref().is_none_or(|a| a == s.initiator_addr())
            },
        }
    }
}

#[derive(Debug, Default)]
struct Registry {
    sessions: BTreeMap<u32, Arc<Session>>,
    targets: BTreeMap<String, Arc<Target>>,
    next_port: u32,
    initiator_ids: Vec<bool>,
    last_session_id: u32,
}

impl Registry {
    fn alloc_initiator_id(&mut self, max: u32) -> Option<u32> {
        if let Some(i) = self.initiator_ids.iter().position(|used| !used) {
            self.initiator_ids[i] = true;
            return Some(i as u32);
        }
        if self.initiator_ids.len() as u32 >= max {
            return None;
        }
        self.initiator_ids.push(true);
        Some(self.initiator_ids.len() as u32 - 1)
    }

    fn next_session_id(&mut self) -> u32 {
        loop {
            self.last_session_id = self.last_session_id.wrapping_add(1);
            if self.last_session_id != 0 && !self.sessions.contains_key(&self.last_session_id) {
                return self.last_session_id;
            }
        }
    }
}

pub struct Frontend {
    params: FrontendParams,
    backend: Arc<dyn Backend>,
    registry: Mutex<Registry>,
    closed: AtomicBool,
    self_weak: OnceCell<Weak<Frontend>>,
}

impl std::fmt::Debug for Frontend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reg = self.lock();
        f.debug_struct("Frontend")
            .field("sessions", &reg.sessions.len())
            .field("targets", &reg.targets.len())
            .finish()
    }
}

impl Frontend {
    /// Creates the frontend and registers it as the backend's port.
    pub fn new(params: FrontendParams, backend: Arc<dyn Backend>) -> Arc<Self> {
        let fe = Arc::new(Self {
            params,
            backend,
            registry: Mutex::new(Registry::default()),
            closed: AtomicBool::new(false),
            self_weak: OnceCell::new(),
        });
        fe.attach_self();
        let port: Weak<dyn FrontendPort> = Arc::downgrade(&fe) as Weak<dyn FrontendPort>;
        fe.backend.attach_port(port);
        fe
    }

    fn attach_self(self: &Arc<Self>) {
        let _ = self.self_weak.set(Arc::downgrade(self));
    }

    fn weak(&self) -> Weak<Frontend> {
        self.self_weak.get().cloned().unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    pub fn params(&self) -> &FrontendParams {
        &self.params
    }

    pub fn add_target(&self, name: &str, alias: Option<&str>) -> Result<Arc<Target>, AdminError> {
        let mut reg = self.lock();
        if reg.targets.contains_key(name) {
            return Err(AdminError::TargetExists(name.to_string()));
        }
        reg.next_port += 1;
        let target = Arc::new(Target::new(
            name.to_string(),
            alias.map(str::to_string),
            reg.next_port,
        ));
        reg.targets.insert(name.to_string(), Arc::clone(&target));
        info!(target = name, port = target.targ_port, "added target");
        Ok(target)
    }

    /// Detaches a target. Sessions already bound to it keep running.
    pub fn remove_target(&self, name: &str) -> Result<(), AdminError> {
        let target = self
            .lock()
            .targets
            .remove(name)
            .ok_or_else(|| AdminError::TargetNotFound(name.to_string()))?;
        target.mark_removed();
        info!(target = name, "removed target");
        Ok(())
    }

    pub fn find_target(&self, name: &str) -> Option<Arc<Target>> {
        self.lock().targets.get(name).cloned()
    }

    pub fn map_lun(&self, target: &str, lun: u32, backend_lun: u32) -> Result<(), AdminError> {
        let reg = self.lock();
        let t = reg
            .targets
            .get(target)
            .ok_or_else(|| AdminError::TargetNotFound(target.to_string()))?;
        t.map_lun(lun, backend_lun)?;
        debug!(target, lun, backend_lun, "mapped LUN");
        Ok(())
    }

    /// Frees a LUN slot and returns the backend LUN it pointed at.
    pub fn unmap_lun(&self, target: &str, lun: u32) -> Result<u32, AdminError> {
        let reg = self.lock();
        let t = reg
            .targets
            .get(target)
            .ok_or_else(|| AdminError::TargetNotFound(target.to_string()))?;
        let backend_lun = t.unmap_lun(lun)?;
        debug!(target, lun, backend_lun, "unmapped LUN");
        Ok(backend_lun)
    }

    /// Takes over a logged-in connection. Returns the new session id.
    ///
    /// A session of the same initiator (name and ISID) on the same target
    /// is terminated first and the new one starts after its teardown.
    pub async fn handoff<S>(&self, params: HandoffParams, stream: S) -> Result<u32, HandoffError>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        if self.closed.load(Ordering::Acquire) {
            return Err(HandoffError::Closed);
        }
        let target = self
            .find_target(&params.target_name)
            .ok_or_else(|| HandoffError::TargetNotFound(params.target_name.clone()))?;

        let stale: Vec<Arc<Session>> = self
            .lock()
            .sessions
            .values()
            .filter(|s| {
                s.initiator_name() == params.initiator_name
                    && s.isid() == params.isid
                    && Arc::ptr_eq(&s.target, &target)
            })
            .cloned()
            .collect();
        for old in stale {
            info!(
                session = old.id,
                initiator = %params.initiator_name,
                "reinstating session"
            );
            old.terminate();
            old.wait_torn_down().await;
        }

        let session = {
            let mut reg = self.lock();
            if self.closed.load(Ordering::Acquire) {
                return Err(HandoffError::Closed);
            }
            let initiator_id = reg
                .alloc_initiator_id(self.params.max_initiators)
                .ok_or(HandoffError::InitiatorIdsExhausted)?;
            let id = reg.next_session_id();
            let session = Session::new(
                id,
                initiator_id,
                params,
                target,
                self.params.clone(),
                self.weak(),
                Arc::clone(&self.backend),
            );
            reg.sessions.insert(id, Arc::clone(&session));
            session
        };

        session.start(stream)?;
        Ok(session.id)
    }

    pub fn session(&self, id: u32) -> Option<Arc<Session>> {
        self.lock().sessions.get(&id).cloned()
    }

    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.lock().sessions.values().cloned().collect()
    }

    /// XML description of every session.
    pub fn list(&self) -> String {
        let sessions = self.sessions();
        let mut out = String::from("<ctlislist>\n");
        for s in sessions {
            let p = s.params();
            let _ = write!(
                out,
                "<connection id=\"{}\">\
                 <initiator>{}</initiator>\
                 <initiator_addr>{}</initiator_addr>\
                 <initiator_alias>{}</initiator_alias>\
                 <target>{}</target>\
                 <target_alias>{}</target_alias>\
                 <target_portal_group_tag>{}</target_portal_group_tag>\
                 <header_digest>{}</header_digest>\
                 <data_digest>{}</data_digest>\
                 <max_recv_data_segment_length>{}</max_recv_data_segment_length>\
                 <max_send_data_segment_length>{}</max_send_data_segment_length>\
                 <max_burst_length>{}</max_burst_length>\
                 <first_burst_length>{}</first_burst_length>\
                 <immediate_data>{}</immediate_data>\
                 <iser>0</iser>\
                 <offload>None</offload>\
                 <state>{}</state>\
                 </connection>\n",
                s.id,
                xml_escape(&p.initiator_name),
                xml_escape(&p.initiator_addr),
                xml_escape(p.initiator_alias.as_deref().unwrap_or_default()),
                xml_escape(&s.target.name),
                xml_escape(s.target.alias.as_deref().unwrap_or_default()),
                self.params.portal_group_tag,
                Digest::from(p.header_crc32c),
                Digest::from(p.data_crc32c),
                p.max_recv_data_segment_length,
                p.max_send_data_segment_length,
                p.max_burst_length,
                p.first_burst_length,
                u8::from(p.immediate_data),
                s.state(),
            );
        }
        out.push_str("</ctlislist>\n");
        out
    }

    fn select(&self, sel: &SessionSelector) -> Result<Vec<Arc<Session>>, AdminError> {
        let matched: Vec<Arc<Session>> = self
            .lock()
            .sessions
            .values()
            .filter(|s| sel.matches(s))
            .cloned()
            .collect();
        if matched.is_empty() {
            return Err(AdminError::NoMatch);
        }
        Ok(matched)
    }

    /// Drops the selected sessions. Returns how many were hit.
    pub fn terminate(&self, sel: &SessionSelector) -> Result<usize, AdminError> {
        let matched = self.select(sel)?;
        for s in &matched {
            let msg = AsyncMessageBuilder::new(AsyncEvent::DropAllConnections);
            s.pdu_queue(IclPdu::from_header(&msg.header));
            s.terminate();
        }
        Ok(matched.len())
    }

    /// Asks the initiators of the selected sessions to log out.
    pub fn logout(&self, sel: &SessionSelector) -> Result<usize, AdminError> {
        let matched = self.select(sel)?;
        for s in &matched {
            let msg = AsyncMessageBuilder::new(AsyncEvent::LogoutRequest)
                .parameter3(LOGOUT_REQUEST_WINDOW);
            s.pdu_queue(IclPdu::from_header(&msg.header));
        }
        Ok(matched.len())
    }

    /// Refuses new connections, terminates every session and waits for
    /// them to go away.
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        let sessions = self.sessions();
        info!(sessions = sessions.len(), "shutting down frontend");
        for s in &sessions {
            s.terminate();
        }
        for s in sessions {
            s.wait_torn_down().await;
        }
    }

    pub(crate) fn release_session(&self, id: u32, initiator_id: u32) {
        let mut reg = self.lock();
        reg.sessions.remove(&id);
        match reg.initiator_ids.get_mut(initiator_id as usize) {
            Some(slot) => *slot = false,
            None => warn!(session = id, initiator_id, "releasing unknown initiator id"),
        }
    }
}

impl FrontendPort for Frontend {
    fn datamove(&self, io: Box<CtlIo>) {
        match io.scsi().map(|s| s.direction) {
            Some(DataDirection::In) => datamove::datamove_in(io),
            Some(DataDirection::Out) => datamove::datamove_out(io),
            _ => io.move_done(),
        }
    }

    fn done(&self, io: Box<CtlIo>) {
        done::done(io);
    }

    fn port_luns(&self, targ_port: u32) -> Vec<u32> {
        self.lock()
            .targets
            .values()
            .find(|t| t.targ_port == targ_port)
            .map(|t| t.luns())
            .unwrap_or_default()
    }
}
