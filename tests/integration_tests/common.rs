// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result, bail};
use iscsi_target_rs::{
    backend::{
        Backend,
        ramdisk::{RamDisk, RamDiskParams},
    },
    frontend::{Frontend, FrontendParams, HandoffParams},
    icl::pdu::IclPdu,
    models::{
        command::{request::ScsiCommandRequestBuilder, response::ScsiCommandResponse},
        common::{HEADER_LEN, get_u24},
        lun::encode_lun,
        opcode::Opcode,
    },
    utils::pad_len,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt, DuplexStream, duplex},
    time::timeout,
};

pub const TARGET: &str = "iqn.2025-01.rs.iscsi-target:ram0";
pub const INITIATOR: &str = "iqn.2025-01.rs.iscsi-target:host";
pub const BLOCK: u32 = 512;
pub const BLOCKS: u64 = 256;

const IO_TIMEOUT: Duration = Duration::from_secs(5);

pub struct TestTarget {
    pub frontend: Arc<Frontend>,
    pub ramdisk: Arc<RamDisk>,
}

/// Frontend parameters without the ping callout, so tests see no
/// unsolicited NOP-In.
pub fn quiet_params() -> FrontendParams {
    FrontendParams {
        callout_interval: Duration::ZERO,
        terminate_wait: Duration::from_millis(200),
        ..FrontendParams::default()
    }
}

/// One target with LUN 0 backed by a RAM disk.
pub fn setup(params: FrontendParams, disk: RamDiskParams) -> Result<TestTarget> {
    let ramdisk = RamDisk::new(disk);
    let frontend = Frontend::new(params, Arc::clone(&ramdisk) as Arc<dyn Backend>);
    frontend.add_target(TARGET, Some("ram0"))?;
    ramdisk.create_lun(0, BLOCK, BLOCKS)?;
    frontend.map_lun(TARGET, 0, 0)?;
    Ok(TestTarget { frontend, ramdisk })
}

pub fn handoff_params(isid: [u8; 6]) -> HandoffParams {
    HandoffParams {
        initiator_name: INITIATOR.to_string(),
        initiator_addr: "192.0.2.10".to_string(),
        initiator_alias: Some("tester".to_string()),
        isid,
        target_name: TARGET.to_string(),
        cmd_sn: 1,
        stat_sn: 100,
        max_recv_data_segment_length: 8192,
        max_send_data_segment_length: 4096,
        max_burst_length: 4096,
        first_burst_length: 4096,
        immediate_data: true,
        header_crc32c: false,
        data_crc32c: false,
    }
}

pub fn lun0() -> [u8; 8] {
    encode_lun(0).unwrap_or_default()
}

/// Initiator end of a handed-off connection.
pub struct Initiator {
    stream: DuplexStream,
    header_crc: bool,
    data_crc: bool,
    pub session_id: u32,
    pub cmd_sn: u32,
    next_itt: u32,
}

impl Initiator {
    pub async fn connect(t: &TestTarget, params: HandoffParams) -> Result<Self> {
        Self::connect_to(&t.frontend, params).await
    }

    /// Hands a connection to a frontend built around any backend.
    pub async fn connect_to(frontend: &Arc<Frontend>, params: HandoffParams) -> Result<Self> {
        let (ours, theirs) = duplex(1 << 20);
        let (header_crc, data_crc, cmd_sn) =
            (params.header_crc32c, params.data_crc32c, params.cmd_sn);
        let session_id = frontend.handoff(params, theirs).await?;
        Ok(Self {
            stream: ours,
            header_crc,
            data_crc,
            session_id,
            cmd_sn,
            next_itt: 1,
        })
    }

    pub fn itt(&mut self) -> u32 {
        let itt = self.next_itt;
        self.next_itt += 1;
        itt
    }

    /// CmdSN for the next non-immediate command.
    pub fn take_cmd_sn(&mut self) -> u32 {
        let sn = self.cmd_sn;
        self.cmd_sn = self.cmd_sn.wrapping_add(1);
        sn
    }

    pub async fn send(&mut self, mut pdu: IclPdu) -> Result<()> {
        let wire = pdu.to_wire(self.header_crc, self.data_crc)?;
        self.stream.write_all(&wire).await?;
        Ok(())
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes).await?;
        Ok(())
    }

    async fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        timeout(IO_TIMEOUT, self.stream.read_exact(buf))
            .await
            .context("timed out waiting for the target")??;
        Ok(())
    }

    pub async fn recv(&mut self) -> Result<IclPdu> {
        let mut pdu = IclPdu::new_bhs();
        let mut bhs = [0u8; HEADER_LEN];
        self.read_exact(&mut bhs).await?;
        pdu.bhs = bhs;
        if self.header_crc {
            let mut crc = [0u8; 4];
            self.read_exact(&mut crc).await?;
            if u32::from_le_bytes(crc) != pdu.header_digest() {
                bail!("header digest mismatch from target");
            }
        }
        let len = get_u24(&[bhs[5], bhs[6], bhs[7]]) as usize;
        if len > 0 {
            let mut data = vec![0u8; len + pad_len(len)];
            self.read_exact(&mut data).await?;
            pdu.append_data(&data[..len])?;
            if self.data_crc {
                let mut crc = [0u8; 4];
                self.read_exact(&mut crc).await?;
                if u32::from_le_bytes(crc) != pdu.data_digest() {
                    bail!("data digest mismatch from target");
                }
            }
        }
        Ok(pdu)
    }

    /// Receives the next PDU and checks its opcode.
    pub async fn expect(&mut self, op: Opcode) -> Result<IclPdu> {
        let pdu = self.recv().await?;
        if pdu.opcode() != Some(op) {
            bail!("expected {op:?}, got {:?}", pdu.opcode());
        }
        Ok(pdu)
    }

    /// Drains the stream until the target closes it.
    pub async fn expect_closed(&mut self) -> Result<()> {
        let mut sink = [0u8; 4096];
        loop {
            let n = timeout(IO_TIMEOUT, self.stream.read(&mut sink))
                .await
                .context("connection still open")??;
            if n == 0 {
                return Ok(());
            }
        }
    }

    /// Sends a SCSI command with optional immediate data.
    pub async fn command(
        &mut self,
        cdb: &[u8; 16],
        exp_len: u32,
        write: bool,
        immediate: &[u8],
    ) -> Result<u32> {
        let itt = self.itt();
        let mut b = ScsiCommandRequestBuilder::new()
            .lun(lun0())
            .initiator_task_tag(itt)
            .expected_data_transfer_length(exp_len)
            .cmd_sn(self.take_cmd_sn())
            .scsi_descriptor_block(cdb);
        b = if write { b.write() } else if exp_len > 0 { b.read() } else { b };
        let mut pdu = IclPdu::from_header(&b.header);
        if !immediate.is_empty() {
            pdu.append_data(immediate)?;
        }
        self.send(pdu).await?;
        Ok(itt)
    }

    /// Reads Data-In PDUs up to and including the SCSI Response.
    pub async fn collect_read(&mut self) -> Result<(Vec<IclPdu>, IclPdu)> {
        let mut data_in = Vec::new();
        loop {
            let pdu = self.recv().await?;
            match pdu.opcode() {
                Some(Opcode::ScsiDataIn) => data_in.push(pdu),
                Some(Opcode::ScsiCommandResp) => return Ok((data_in, pdu)),
                other => bail!("unexpected {other:?} during read"),
            }
        }
    }
}

pub fn response(pdu: &IclPdu) -> Result<&ScsiCommandResponse> {
    ScsiCommandResponse::ref_from_bhs_bytes(&pdu.bhs)
}

/// Waits until `cond` holds, polling the frontend.
pub async fn eventually<F: Fn() -> bool>(cond: F) -> Result<()> {
    for _ in 0..100 {
        if cond() {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    bail!("condition not reached")
}
