// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! In-memory block backend.
//!
//! Every submitted descriptor runs on its own tokio task. Transfers larger
//! than `max_io_chunk` are moved in several datamove rounds.

use std::sync::{Arc, RwLock, Weak};

use anyhow::{Result, anyhow, ensure};
use dashmap::{DashMap, mapref::entry::Entry};
use once_cell::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use zerocopy::IntoBytes;

use crate::{
    backend::{
        Backend, CtlIo, DataDirection, FrontendPort, IoKind, IoStatus, MoveOutcome,
        PORT_STATUS_ABORTED, PORT_STATUS_TERMINATING, SubmitError, TaskAction, TaskStatus,
    },
    control_block::{
        ASC_INVALID_FIELD_IN_CDB, ASC_LBA_OUT_OF_RANGE, ASC_LUN_NOT_SUPPORTED,
        CdbCommand, decode_cdb,
        inquiry::{standard_inquiry_data, supported_vpd_pages},
        read_capacity::{Rc10Raw, read_capacity16_data},
        report_luns::report_luns_data,
    },
    models::{
        command::common::ScsiStatus,
        data::sense_data::{SenseData, sense_key},
    },
};

#[derive(Debug, Clone)]
pub struct RamDiskParams {
    pub vendor: String,
    pub product: String,
    pub revision: String,
    /// Largest number of bytes moved by one datamove call.
    pub max_io_chunk: usize,
    /// Size of each scatter/gather segment.
    pub sg_segment_len: usize,
}

impl Default for RamDiskParams {
    fn default() -> Self {
        Self {
            vendor: "RUST".to_string(),
            product: "RAMDISK".to_string(),
            revision: "0001".to_string(),
            max_io_chunk: 128 * 1024,
            sg_segment_len: 64 * 1024,
        }
    }
}

#[derive(Debug)]
struct RamLun {
    block_size: u32,
    blocks: u64,
    store: RwLock<Vec<u8>>,
}

#[derive(Debug)]
struct InFlight {
    targ_port: u32,
    lun: Option<u32>,
    cancel: CancellationToken,
}

pub struct RamDisk {
    params: RamDiskParams,
    luns: DashMap<u32, Arc<RamLun>>,
    inflight: DashMap<(u32, u32), InFlight>,
    port: OnceCell<Weak<dyn FrontendPort>>,
    shutdown: CancellationToken,
    self_weak: Weak<RamDisk>,
}

impl std::fmt::Debug for RamDisk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RamDisk")
            .field("luns", &self.luns.len())
            .field("inflight", &self.inflight.len())
            .finish()
    }
}

impl RamDisk {
    pub fn new(params: RamDiskParams) -> Arc<Self> {
        Arc::new_cyclic(|w| Self {
            params,
            luns: DashMap::new(),
            inflight: DashMap::new(),
            port: OnceCell::new(),
            shutdown: CancellationToken::new(),
            self_weak: w.clone(),
        })
    }

    /// Creates a zero-filled LUN with backend id `id`.
    pub fn create_lun(&self, id: u32, block_size: u32, blocks: u64) -> Result<()> {
        ensure!(
            block_size >= 512 && block_size.is_power_of_two(),
            "block size {block_size} must be a power of two >= 512"
        );
        let bytes = usize::try_from(blocks.saturating_mul(block_size as u64))
            .map_err(|_| anyhow!("LUN {id} too large"))?;
        let mut store = Vec::new();
        store
            .try_reserve_exact(bytes)
            .map_err(|_| anyhow!("cannot allocate {bytes} bytes for LUN {id}"))?;
        store.resize(bytes, 0);

        match self.luns.entry(id) {
            Entry::Occupied(_) => Err(anyhow!("LUN {id} already exists")),
            Entry::Vacant(v) => {
                v.insert(Arc::new(RamLun {
                    block_size,
                    blocks,
                    store: RwLock::new(store),
                }));
                debug!(lun = id, block_size, blocks, "created ramdisk LUN");
                Ok(())
            },
        }
    }

    pub fn remove_lun(&self, id: u32) -> bool {
        self.luns.remove(&id).is_some()
    }

    pub fn has_lun(&self, id: u32) -> bool {
        self.luns.contains_key(&id)
    }

    /// Stops accepting new descriptors.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    fn port(&self) -> Option<Arc<dyn FrontendPort>> {
        self.port.get().and_then(Weak::upgrade)
    }

    async fn run(self: Arc<Self>, port: Arc<dyn FrontendPort>, io: Box<CtlIo>) {
        match io.kind {
            IoKind::Scsi(_) => self.run_scsi(port, io).await,
            IoKind::Task(_) => self.run_task(port, io),
        }
    }

    async fn run_scsi(self: Arc<Self>, port: Arc<dyn FrontendPort>, io: Box<CtlIo>) {
        let tag = io.scsi().map_or(0, |s| s.tag_num);
        let key = (io.nexus.initiator_id, tag);
        let cancel = CancellationToken::new();
        self.inflight.insert(key, InFlight {
            targ_port: io.nexus.targ_port,
            lun: io.nexus.mapped_lun,
            cancel: cancel.clone(),
        });

        let io = self.execute(&port, io, &cancel).await;
        self.inflight.remove(&key);

        if let Some(mut io) = io {
            if cancel.is_cancelled() || io.aborted {
                io.aborted = true;
                io.status = IoStatus::Aborted;
            } else if io.status == IoStatus::Pending {
                io.status = match io.scsi().map(|s| s.scsi_status) {
                    Some(ScsiStatus::Good) => IoStatus::Success,
                    _ => IoStatus::ScsiError,
                };
            }
            port.done(io);
        }
    }

    /// Runs one SCSI command. `None` means the descriptor was lost in a
    /// datamove the frontend never answered.
    async fn execute(
        &self,
        port: &Arc<dyn FrontendPort>,
        io: Box<CtlIo>,
        cancel: &CancellationToken,
    ) -> Option<Box<CtlIo>> {
        let Some(cdb) = io.scsi().map(|s| s.cdb) else {
            return Some(io);
        };
        let lun = io
            .nexus
            .mapped_lun
            .and_then(|id| self.luns.get(&id).map(|l| Arc::clone(l.value())));

        let cmd = match decode_cdb(&cdb) {
            Ok(cmd) => cmd,
            Err(sense) => {
                trace!(opcode = cdb[0], "unsupported CDB");
                return Some(check_condition(io, sense));
            },
        };

        // these need no mapped LUN
        let lun = match (cmd, lun) {
            (CdbCommand::ReportLuns { alloc_len }, _) => {
                let mut luns = port.port_luns(io.nexus.targ_port);
                luns.sort_unstable();
                let mut data = report_luns_data(&luns);
                data.truncate(alloc_len as usize);
                return self.send_in(port, io, data, cancel).await;
            },
            (CdbCommand::Inquiry { evpd, page, alloc_len }, lun) => {
                let mut data = match (evpd, page) {
                    (false, _) => standard_inquiry_data(
                        &self.params.vendor,
                        &self.params.product,
                        &self.params.revision,
                    ),
                    (true, 0x00) => supported_vpd_pages(),
                    _ => {
                        return Some(check_condition(
                            io,
                            SenseData::illegal_request(ASC_INVALID_FIELD_IN_CDB, 0),
                        ));
                    },
                };
                if lun.is_none() {
                    // peripheral qualifier 011b: no logical unit
                    data[0] = 0x7f;
                }
                data.truncate(alloc_len as usize);
                return self.send_in(port, io, data, cancel).await;
            },
            (CdbCommand::RequestSense { alloc_len }, _) => {
                let mut data = SenseData::new(sense_key::NO_SENSE, 0, 0).to_fixed_bytes();
                data.truncate(alloc_len as usize);
                return self.send_in(port, io, data, cancel).await;
            },
            (_, Some(lun)) => lun,
            (_, None) => {
                return Some(check_condition(
                    io,
                    SenseData::illegal_request(ASC_LUN_NOT_SUPPORTED, 0),
                ));
            },
        };

        match cmd {
            CdbCommand::TestUnitReady | CdbCommand::SynchronizeCache => Some(io),
            CdbCommand::ReadCapacity10 => {
                let data = Rc10Raw::new(lun.blocks, lun.block_size).as_bytes().to_vec();
                self.send_in(port, io, data, cancel).await
            },
            CdbCommand::ReadCapacity16 { alloc_len } => {
                let mut data = read_capacity16_data(lun.blocks, lun.block_size).to_vec();
                data.truncate(alloc_len as usize);
                self.send_in(port, io, data, cancel).await
            },
            CdbCommand::Read { lba, blocks } => {
                let Some(range) = lun.byte_range(lba, blocks) else {
                    return Some(check_condition(
                        io,
                        SenseData::illegal_request(ASC_LBA_OUT_OF_RANGE, 0),
                    ));
                };
                let data = match lun.store.read() {
                    Ok(store) => store[range].to_vec(),
                    Err(_) => return Some(check_condition(io, medium_error())),
                };
                self.send_in(port, io, data, cancel).await
            },
            CdbCommand::Write { lba, blocks } => {
                let Some(range) = lun.byte_range(lba, blocks) else {
                    return Some(check_condition(
                        io,
                        SenseData::illegal_request(ASC_LBA_OUT_OF_RANGE, 0),
                    ));
                };
                let start = range.start;
                let (io, data) = self.receive_out(port, io, range.len(), cancel).await?;
                let Some(data) = data else {
                    return Some(io);
                };
                match lun.store.write() {
                    Ok(mut store) => {
                        store[start..start + data.len()].copy_from_slice(&data);
                        Some(io)
                    },
                    Err(_) => Some(check_condition(io, medium_error())),
                }
            },
            CdbCommand::Inquiry { .. }
            | CdbCommand::ReportLuns { .. }
            | CdbCommand::RequestSense { .. } => Some(io),
        }
    }

    /// Moves `data` to the initiator in `max_io_chunk` rounds.
    async fn send_in(
        &self,
        port: &Arc<dyn FrontendPort>,
        mut io: Box<CtlIo>,
        data: Vec<u8>,
        cancel: &CancellationToken,
    ) -> Option<Box<CtlIo>> {
        let chunk = self.params.max_io_chunk.max(1);
        let mut offset = 0usize;
        while offset < data.len() {
            if cancel.is_cancelled() {
                return Some(io);
            }
            let end = data.len().min(offset + chunk);
            if let Some(scsi) = io.scsi_mut() {
                scsi.direction = DataDirection::In;
                scsi.kern_total_len = data.len() as u32;
                scsi.kern_rel_offset = offset as u32;
                scsi.fill_sg(&data[offset..end], self.params.sg_segment_len);
            }
            io = match self.datamove(port, io).await {
                Some((io, MoveOutcome::Done)) if io.port_status == 0 => io,
                Some((io, _)) => return Some(failed_move(io)),
                None => return None,
            };
            offset = end;
        }
        Some(io)
    }

    /// Collects `len` bytes from the initiator in `max_io_chunk` rounds.
    async fn receive_out(
        &self,
        port: &Arc<dyn FrontendPort>,
        mut io: Box<CtlIo>,
        len: usize,
        cancel: &CancellationToken,
    ) -> Option<(Box<CtlIo>, Option<Vec<u8>>)> {
        let chunk = self.params.max_io_chunk.max(1);
        let mut out = Vec::with_capacity(len);
        while out.len() < len {
            if cancel.is_cancelled() {
                return Some((io, None));
            }
            let this = chunk.min(len - out.len());
            if let Some(scsi) = io.scsi_mut() {
                scsi.direction = DataDirection::Out;
                scsi.kern_total_len = len as u32;
                scsi.kern_rel_offset = out.len() as u32;
                scsi.alloc_sg(this, self.params.sg_segment_len);
            }
            io = match self.datamove(port, io).await {
                Some((io, MoveOutcome::Done)) if io.port_status == 0 => io,
                Some((io, _)) => return Some((failed_move(io), None)),
                None => return None,
            };
            let Some(scsi) = io.scsi() else {
                return Some((io, None));
            };
            if scsi.ext_data_filled < scsi.kern_data_len {
                return Some((phase_failure(io), None));
            }
            out.extend_from_slice(&scsi.sg_bytes());
        }
        Some((io, Some(out)))
    }

    async fn datamove(
        &self,
        port: &Arc<dyn FrontendPort>,
        mut io: Box<CtlIo>,
    ) -> Option<(Box<CtlIo>, MoveOutcome)> {
        let reply = io.begin_move();
        port.datamove(io);
        match reply.await {
            Ok(r) => Some(r),
            Err(_) => {
                warn!("frontend dropped a descriptor during datamove");
                None
            },
        }
    }

    fn run_task(&self, port: Arc<dyn FrontendPort>, mut io: Box<CtlIo>) {
        let nexus = io.nexus;
        let Some(task) = io.task_mut() else {
            return;
        };
        task.status = match task.action {
            TaskAction::AbortTask => {
                if let Some(f) = self.inflight.get(&(nexus.initiator_id, task.tag_num)) {
                    debug!(itt = task.tag_num, "aborting task");
                    f.cancel.cancel();
                }
                TaskStatus::Complete
            },
            TaskAction::LunReset => match nexus.mapped_lun {
                Some(lun) if self.luns.contains_key(&lun) => {
                    self.cancel_where(|f| f.targ_port == nexus.targ_port && f.lun == Some(lun));
                    TaskStatus::Complete
                },
                _ => TaskStatus::LunDoesNotExist,
            },
            TaskAction::TargetReset => {
                self.cancel_where(|f| f.targ_port == nexus.targ_port);
                TaskStatus::Complete
            },
        };
        io.status = IoStatus::Success;
        port.done(io);
    }

    fn cancel_where(&self, pred: impl Fn(&InFlight) -> bool) {
        for f in self.inflight.iter().filter(|f| pred(f.value())) {
            f.cancel.cancel();
        }
    }
}

impl RamLun {
    fn byte_range(&self, lba: u64, blocks: u32) -> Option<std::ops::Range<usize>> {
        let end = lba.checked_add(blocks as u64)?;
        if end > self.blocks {
            return None;
        }
        let bs = self.block_size as u64;
        Some(usize::try_from(lba * bs).ok()?..usize::try_from(end * bs).ok()?)
    }
}

fn check_condition(mut io: Box<CtlIo>, sense: SenseData) -> Box<CtlIo> {
    if let Some(scsi) = io.scsi_mut() {
        scsi.set_check_condition(sense);
    }
    io.status = IoStatus::ScsiError;
    io
}

fn medium_error() -> SenseData {
    SenseData::new(sense_key::MEDIUM_ERROR, 0x11, 0)
}

/// A move the frontend refused. Teardown aborts end the task silently,
/// anything else is a data phase error.
fn failed_move(mut io: Box<CtlIo>) -> Box<CtlIo> {
    match io.port_status {
        PORT_STATUS_ABORTED | PORT_STATUS_TERMINATING => {
            io.aborted = true;
            io
        },
        _ => phase_failure(io),
    }
}

fn phase_failure(io: Box<CtlIo>) -> Box<CtlIo> {
    check_condition(io, SenseData::data_phase_error())
}

impl Backend for RamDisk {
    fn attach_port(&self, port: Weak<dyn FrontendPort>) {
        if self.port.set(port).is_err() {
            warn!("ramdisk already has a frontend port attached");
        }
    }

    fn submit(&self, io: Box<CtlIo>) -> Result<(), SubmitError> {
        if self.shutdown.is_cancelled() {
            return Err(SubmitError::ShuttingDown);
        }
        let port = self.port().ok_or(SubmitError::NoPort)?;
        let this = self.self_weak.upgrade().ok_or(SubmitError::ShuttingDown)?;
        tokio::spawn(this.run(port, io));
        Ok(())
    }
}
