// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{collections::BTreeSet, fs, path::Path, time::Duration};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::{
    backend::ramdisk::RamDiskParams,
    cfg::enums::{Digest, YesNo},
    frontend::{FrontendParams, HandoffParams, target::MAX_LUNS},
};

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Config {
    /// Frontend-wide tunables.
    #[serde(default)]
    pub frontend: FrontendConfig,
    /// Listening portal.
    pub portal: PortalConfig,
    /// Targets served by the RAM-disk backend.
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
    /// Values each accepted connection is handed off with.
    pub session: SessionDefaults,
    #[serde(default)]
    pub backend: BackendConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct FrontendConfig {
    #[serde(rename = "PingTimeout", default = "default_ping_timeout")]
    /// Idle callout ticks before a session is dropped; 0 disables.
    pub ping_timeout: u32,
    #[serde(rename = "CalloutIntervalMs", with = "serde_millis", default = "default_callout")]
    pub callout_interval: Duration,
    #[serde(rename = "MaxCmdSnDelta", default = "default_cmdsn_delta")]
    pub max_cmdsn_delta: u32,
    #[serde(rename = "PartialReceiveLen", default = "default_partial_receive")]
    pub partial_receive_len: usize,
    #[serde(rename = "SendCoalesceLimit", default = "default_coalesce")]
    /// Bytes handed to one socket write.
    pub send_coalesce_limit: usize,
    #[serde(rename = "MaxInitiators", default = "default_max_initiators")]
    pub max_initiators: u32,
    #[serde(rename = "TerminateWaitSecs", with = "serde_secs", default = "default_terminate_wait")]
    pub terminate_wait: Duration,
    #[serde(rename = "Time2Wait", default)]
    pub time2wait: u16,
    #[serde(rename = "Time2Retain", default)]
    pub time2retain: u16,
}

fn default_ping_timeout() -> u32 {
    5
}
fn default_callout() -> Duration {
    Duration::from_millis(1000)
}
fn default_cmdsn_delta() -> u32 {
    256
}
fn default_partial_receive() -> usize {
    128 * 1024
}
fn default_coalesce() -> usize {
    256 * 1024
}
fn default_max_initiators() -> u32 {
    2048
}
fn default_terminate_wait() -> Duration {
    Duration::from_secs(5)
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            ping_timeout: default_ping_timeout(),
            callout_interval: default_callout(),
            max_cmdsn_delta: default_cmdsn_delta(),
            partial_receive_len: default_partial_receive(),
            send_coalesce_limit: default_coalesce(),
            max_initiators: default_max_initiators(),
            terminate_wait: default_terminate_wait(),
            time2wait: 0,
            time2retain: 0,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PortalConfig {
    #[serde(rename = "Listen")]
    /// `host:port` the daemon accepts connections on.
    pub listen: String,
    #[serde(rename = "PortalGroupTag", default = "default_tpgt")]
    pub portal_group_tag: u16,
}

fn default_tpgt() -> u16 {
    1
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TargetConfig {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Alias", default)]
    pub alias: Option<String>,
    #[serde(rename = "Luns", default)]
    pub luns: Vec<LunConfig>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy)]
pub struct LunConfig {
    #[serde(rename = "Lun")]
    pub lun: u32,
    #[serde(rename = "BlockSize", default = "default_block_size")]
    pub block_size: u32,
    #[serde(rename = "Blocks")]
    pub blocks: u64,
}

fn default_block_size() -> u32 {
    512
}

/// Operational values a login phase would have negotiated.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SessionDefaults {
    #[serde(rename = "InitiatorName")]
    pub initiator_name: String,
    #[serde(rename = "TargetName")]
    pub target_name: String,
    #[serde(rename = "MaxRecvDataSegmentLength")]
    pub max_recv_data_segment_length: u32,
    #[serde(rename = "MaxSendDataSegmentLength")]
    pub max_send_data_segment_length: u32,
    #[serde(rename = "MaxBurstLength")]
    pub max_burst_length: u32,
    #[serde(rename = "FirstBurstLength")]
    pub first_burst_length: u32,
    #[serde(rename = "ImmediateData")]
    pub immediate_data: YesNo,
    #[serde(rename = "HeaderDigest")]
    pub header_digest: Digest,
    #[serde(rename = "DataDigest")]
    pub data_digest: Digest,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct BackendConfig {
    #[serde(rename = "Vendor", default = "default_vendor")]
    pub vendor: String,
    #[serde(rename = "Product", default = "default_product")]
    pub product: String,
    #[serde(rename = "Revision", default = "default_revision")]
    pub revision: String,
    #[serde(rename = "MaxIoChunk", default = "default_io_chunk")]
    /// Largest transfer handed to one datamove.
    pub max_io_chunk: usize,
    #[serde(rename = "SgSegmentLen", default = "default_sg_segment")]
    pub sg_segment_len: usize,
}

fn default_vendor() -> String {
    RamDiskParams::default().vendor
}
fn default_product() -> String {
    RamDiskParams::default().product
}
fn default_revision() -> String {
    RamDiskParams::default().revision
}
fn default_io_chunk() -> usize {
    RamDiskParams::default().max_io_chunk
}
fn default_sg_segment() -> usize {
    RamDiskParams::default().sg_segment_len
}

impl Default for BackendConfig {
    fn default() -> Self {
        let p = RamDiskParams::default();
        Self {
            vendor: p.vendor,
            product: p.product,
            revision: p.revision,
            max_io_chunk: p.max_io_chunk,
            sg_segment_len: p.sg_segment_len,
        }
    }
}

impl Config {
    /// Loads the configuration from YAML, validates it, and returns the
    /// ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        let mut cfg: Config = serde_yaml::from_str(&s).context("failed to parse config YAML")?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    /// Validates invariants and normalizes derived fields.
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        let s = &mut self.session;
        ensure!(!s.initiator_name.is_empty(), "InitiatorName must not be empty");
        ensure!(!s.target_name.is_empty(), "TargetName must not be empty");
        for (key, v) in [
            ("MaxRecvDataSegmentLength", s.max_recv_data_segment_length),
            ("MaxSendDataSegmentLength", s.max_send_data_segment_length),
        ] {
            ensure!(
                (512..=0x00ff_ffff).contains(&v),
                "{key} must be within 512..=16777215"
            );
        }
        ensure!(s.max_burst_length >= 512, "MaxBurstLength must be >= 512");
        // FirstBurstLength never exceeds MaxBurstLength
        s.first_burst_length = s.first_burst_length.min(s.max_burst_length);

        let f = &mut self.frontend;
        ensure!(f.max_cmdsn_delta >= 1, "MaxCmdSnDelta must be >= 1");
        ensure!(f.max_initiators >= 1, "MaxInitiators must be >= 1");
        ensure!(f.partial_receive_len >= 48, "PartialReceiveLen must be >= 48");
        f.send_coalesce_limit = f.send_coalesce_limit.max(48);

        let b = &self.backend;
        ensure!(b.max_io_chunk > 0, "MaxIoChunk must be > 0");
        ensure!(b.sg_segment_len > 0, "SgSegmentLen must be > 0");

        let mut names = BTreeSet::new();
        for t in &self.targets {
            ensure!(!t.name.is_empty(), "target Name must not be empty");
            ensure!(names.insert(t.name.as_str()), "target {} declared twice", t.name);
            let mut luns = BTreeSet::new();
            for l in &t.luns {
                ensure!(l.lun < MAX_LUNS, "{}: LUN {} out of range", t.name, l.lun);
                ensure!(luns.insert(l.lun), "{}: LUN {} declared twice", t.name, l.lun);
                ensure!(
                    l.block_size >= 512 && l.block_size.is_power_of_two(),
                    "{}: BlockSize must be a power of two >= 512",
                    t.name
                );
                ensure!(l.blocks > 0, "{}: LUN {} has no blocks", t.name, l.lun);
            }
        }
        Ok(())
    }

    pub fn frontend_params(&self) -> FrontendParams {
        let f = &self.frontend;
        FrontendParams {
            ping_timeout: f.ping_timeout,
            callout_interval: f.callout_interval,
            max_cmdsn_delta: f.max_cmdsn_delta,
            partial_receive_len: f.partial_receive_len,
            send_coalesce_limit: f.send_coalesce_limit,
            max_initiators: f.max_initiators,
            terminate_wait: f.terminate_wait,
            time2wait: f.time2wait,
            time2retain: f.time2retain,
            portal_group_tag: self.portal.portal_group_tag,
            ..FrontendParams::default()
        }
    }

    pub fn ramdisk_params(&self) -> RamDiskParams {
        let b = &self.backend;
        RamDiskParams {
            vendor: b.vendor.clone(),
            product: b.product.clone(),
            revision: b.revision.clone(),
            max_io_chunk: b.max_io_chunk,
            sg_segment_len: b.sg_segment_len,
        }
    }

    /// Handoff parameters for a connection from `initiator_addr`.
    pub fn handoff_params(&self, initiator_addr: &str, isid: [u8; 6]) -> HandoffParams {
        let s = &self.session;
        HandoffParams {
            initiator_name: s.initiator_name.clone(),
            initiator_addr: initiator_addr.to_string(),
            initiator_alias: None,
            isid,
            target_name: s.target_name.clone(),
            cmd_sn: 0,
            stat_sn: 0,
            max_recv_data_segment_length: s.max_recv_data_segment_length,
            max_send_data_segment_length: s.max_send_data_segment_length,
            max_burst_length: s.max_burst_length,
            first_burst_length: s.first_burst_length,
            immediate_data: s.immediate_data.as_bool(),
            header_crc32c: s.header_digest.is_crc32c(),
            data_crc32c: s.data_digest.is_crc32c(),
        }
    }
}

/// Serde helpers for representing `Duration` as a number of seconds.
mod serde_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

mod serde_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
