// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

pub const READ10: u8 = 0x28;
pub const READ16: u8 = 0x88;

/// Build a padded 16-byte **SCSI READ(10)** CDB.
///
/// Layout (SBC):
/// - byte 0      : OPERATION CODE = 0x28
/// - byte 1      : RDPROTECT[7:5] | DPO[4] | FUA[3]
/// - bytes 2..5  : LBA (big-endian, 32-bit)
/// - bytes 7..8  : TRANSFER LENGTH (big-endian, 16-bit)
/// - byte 9      : CONTROL
#[inline]
pub fn build_read10(cdb: &mut [u8; 16], lba: u32, blocks: u16, flags: u8, control: u8) {
    cdb.fill(0);
    cdb[0] = READ10;
    cdb[1] = flags & 0b1111_1000;
    cdb[2..6].copy_from_slice(&lba.to_be_bytes());
    cdb[7..9].copy_from_slice(&blocks.to_be_bytes());
    cdb[9] = control;
}

/// Build a 16-byte **SCSI READ(16)** CDB.
///
/// Layout (SBC):
/// - byte  0      : OPERATION CODE = 0x88
/// - bytes 2..9   : LBA (big-endian, 64-bit)
/// - bytes 10..13 : TRANSFER LENGTH (big-endian, 32-bit)
/// - byte  15     : CONTROL
#[inline]
pub fn build_read16(cdb: &mut [u8; 16], lba: u64, blocks: u32, flags: u8, control: u8) {
    cdb.fill(0);
    cdb[0] = READ16;
    cdb[1] = flags & 0b1111_1000;
    cdb[2..10].copy_from_slice(&lba.to_be_bytes());
    cdb[10..14].copy_from_slice(&blocks.to_be_bytes());
    cdb[15] = control;
}

/// LBA and transfer length of a READ/WRITE (10) or (16) CDB.
///
/// The 10-byte form and the 16-byte form share the opcode group bits, so
/// bit 7 of the opcode selects the layout.
#[inline]
pub fn parse_lba_blocks(cdb: &[u8; 16]) -> (u64, u32) {
    if cdb[0] & 0x80 != 0 {
        let mut lba = [0u8; 8];
        lba.copy_from_slice(&cdb[2..10]);
        (
            u64::from_be_bytes(lba),
            u32::from_be_bytes([cdb[10], cdb[11], cdb[12], cdb[13]]),
        )
    } else {
        (
            u32::from_be_bytes([cdb[2], cdb[3], cdb[4], cdb[5]]) as u64,
            u16::from_be_bytes([cdb[7], cdb[8]]) as u32,
        )
    }
}
