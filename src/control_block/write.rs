// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

pub const WRITE10: u8 = 0x2a;
pub const WRITE16: u8 = 0x8a;

/// Build a padded 16-byte SCSI WRITE(10) CDB.
///
/// * `lba`     – 32-bit Logical-Block Address
/// * `blocks`  – number of blocks (u16)
/// * `flags`   – WRPROTECT/DPO/FUA (bits 7:5, 4, 3)
/// * `control` – control byte
#[inline]
pub fn build_write10(cdb: &mut [u8; 16], lba: u32, blocks: u16, flags: u8, control: u8) {
    cdb.fill(0);
    cdb[0] = WRITE10;
    cdb[1] = flags & 0b1111_1000;
    cdb[2..6].copy_from_slice(&lba.to_be_bytes());
    cdb[7..9].copy_from_slice(&blocks.to_be_bytes());
    cdb[9] = control;
}

/// Build a 16-byte SCSI WRITE(16) CDB.
#[inline]
pub fn build_write16(cdb: &mut [u8; 16], lba: u64, blocks: u32, flags: u8, control: u8) {
    cdb.fill(0);
    cdb[0] = WRITE16;
    cdb[1] = flags & 0b1111_1000;
    cdb[2..10].copy_from_slice(&lba.to_be_bytes());
    cdb[10..14].copy_from_slice(&blocks.to_be_bytes());
    cdb[15] = control;
}
