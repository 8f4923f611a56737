// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! REPORT LUNS.
//!
//! Response starts with:
//!   [0..3] = LUN LIST LENGTH (big-endian u32, multiple of 8)
//!   [4..7] = reserved
//!   [8..]  = LUN entries (8 bytes each)

use crate::models::lun::encode_lun;

pub const REPORT_LUNS: u8 = 0xA0;

/// Fill a REPORT LUNS CDB into `cdb[0..12]`.
#[inline]
pub fn fill_report_luns(cdb: &mut [u8; 16], select: u8, allocation_len: u32, control: u8) {
    cdb.fill(0);
    cdb[0] = REPORT_LUNS;
    cdb[2] = select;
    cdb[6..10].copy_from_slice(&allocation_len.to_be_bytes());
    cdb[11] = control;
}

/// REPORT LUNS parameter data for `luns`.
pub fn report_luns_data(luns: &[u32]) -> Vec<u8> {
    let entries: Vec<[u8; 8]> = luns.iter().filter_map(|l| encode_lun(*l)).collect();
    let mut data = Vec::with_capacity(8 + entries.len() * 8);
    data.extend_from_slice(&((entries.len() * 8) as u32).to_be_bytes());
    data.extend_from_slice(&[0u8; 4]);
    for e in entries {
        data.extend_from_slice(&e);
    }
    data
}
