// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::{Result, anyhow};
use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout,
    byteorder::{BigEndian, U32, U64},
};

pub const READ_CAPACITY10: u8 = 0x25;
pub const SERVICE_ACTION_IN16: u8 = 0x9e;
pub const SA_READ_CAPACITY16: u8 = 0x10;

/// Build a padded 16-byte **SCSI READ CAPACITY(10)** CDB (opcode 0x25).
#[inline]
pub fn build_read_capacity10(cdb: &mut [u8; 16], control: u8) {
    cdb.fill(0);
    cdb[0] = READ_CAPACITY10;
    cdb[9] = control;
}

/// Build a 16-byte **SCSI READ CAPACITY(16)** CDB via SERVICE ACTION IN(16).
#[inline]
pub fn build_read_capacity16(cdb: &mut [u8; 16], alloc_len: u32, control: u8) {
    cdb.fill(0);
    cdb[0] = SERVICE_ACTION_IN16;
    cdb[1] = SA_READ_CAPACITY16;
    cdb[10..14].copy_from_slice(&alloc_len.to_be_bytes());
    cdb[15] = control;
}

/// READ CAPACITY(10) parameter data.
#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Debug)]
pub struct Rc10Raw {
    /// Last LBA, `0xffff_ffff` when READ CAPACITY(16) is needed
    pub max_lba: U32<BigEndian>,
    pub block_len: U32<BigEndian>,
}

/// First 12 bytes of READ CAPACITY(16) parameter data.
#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Debug)]
pub struct Rc16Raw {
    pub max_lba: U64<BigEndian>,
    pub block_len: U32<BigEndian>,
}

impl Rc10Raw {
    pub fn new(blocks: u64, block_len: u32) -> Self {
        let last = blocks.saturating_sub(1);
        Self {
            max_lba: U32::new(u32::try_from(last).unwrap_or(u32::MAX)),
            block_len: U32::new(block_len),
        }
    }
}

/// Full 32-byte READ CAPACITY(16) parameter data.
pub fn read_capacity16_data(blocks: u64, block_len: u32) -> [u8; 32] {
    let head = Rc16Raw {
        max_lba: U64::new(blocks.saturating_sub(1)),
        block_len: U32::new(block_len),
    };
    let mut out = [0u8; 32];
    out[..12].copy_from_slice(head.as_bytes());
    out
}

/// Parse READ CAPACITY(10) parameter data (needs ≥ 8 bytes).
#[inline]
pub fn parse_read_capacity10_zerocopy(buf: &[u8]) -> Result<&Rc10Raw> {
    let (raw, _rest) = Rc10Raw::ref_from_prefix(buf)
        .map_err(|_| anyhow!("READ CAPACITY(10): need ≥ 8 bytes, got {}", buf.len()))?;
    Ok(raw)
}

/// Parse READ CAPACITY(16) parameter data head (needs ≥ 12 bytes).
#[inline]
pub fn parse_read_capacity16_zerocopy(buf: &[u8]) -> Result<&Rc16Raw> {
    let (raw, _rest) = Rc16Raw::ref_from_prefix(buf)
        .map_err(|_| anyhow!("READ CAPACITY(16): need ≥ 12 bytes, got {}", buf.len()))?;
    Ok(raw)
}
