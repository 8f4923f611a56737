// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! INQUIRY (6).
//!
//! CDB layout (SPC):
//!   [0] = 0x12 (INQUIRY)
//!   [1] = EVPD (bit 0)
//!   [2] = Page Code (only when EVPD=1)
//!   [3..4] = Allocation Length (big-endian u16)
//!   [5] = Control

pub const INQUIRY_OPCODE: u8 = 0x12;

/// Length of the standard INQUIRY data this target returns.
pub const STANDARD_INQUIRY_LEN: usize = 36;

/// Fill a **Standard INQUIRY (EVPD=0)** CDB.
#[inline]
pub fn fill_inquiry_standard(cdb: &mut [u8; 16], allocation_len: u16, control: u8) {
    cdb.fill(0);
    cdb[0] = INQUIRY_OPCODE;
    cdb[3..5].copy_from_slice(&allocation_len.to_be_bytes());
    cdb[5] = control;
}

fn put_padded(dst: &mut [u8], s: &str) {
    dst.fill(b' ');
    for (d, b) in dst.iter_mut().zip(s.bytes()) {
        *d = b;
    }
}

/// Standard INQUIRY data for a direct-access block device.
pub fn standard_inquiry_data(vendor: &str, product: &str, revision: &str) -> Vec<u8> {
    let mut data = vec![0u8; STANDARD_INQUIRY_LEN];
    // peripheral qualifier 0, device type 0 (disk)
    data[0] = 0x00;
    // SPC-4
    data[2] = 0x06;
    // HiSup | response data format 2
    data[3] = 0x12;
    data[4] = (STANDARD_INQUIRY_LEN - 5) as u8;
    // CmdQue
    data[7] = 0x02;
    put_padded(&mut data[8..16], vendor);
    put_padded(&mut data[16..32], product);
    put_padded(&mut data[32..36], revision);
    data
}

/// Supported VPD pages list (page 0x00); only that page is served.
pub fn supported_vpd_pages() -> Vec<u8> {
    vec![0x00, 0x00, 0x00, 0x01, 0x00]
}
