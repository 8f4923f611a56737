// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::fmt;

use anyhow::{Result, ensure};

/// Sense data must be ≥ 18 bytes for fixed format.
pub const FIXED_LEN: usize = 18;

/// Current error, fixed format.
pub const RESPONSE_CODE_CURRENT_FIXED: u8 = 0x70;

pub mod sense_key {
    pub const NO_SENSE: u8 = 0x00;
    pub const NOT_READY: u8 = 0x02;
    pub const MEDIUM_ERROR: u8 = 0x03;
    pub const HARDWARE_ERROR: u8 = 0x04;
    pub const ILLEGAL_REQUEST: u8 = 0x05;
    pub const UNIT_ATTENTION: u8 = 0x06;
    pub const ABORTED_COMMAND: u8 = 0x0b;
}

/// ASC of DATA PHASE ERROR, reported with ABORTED COMMAND.
pub const ASC_DATA_PHASE_ERROR: u8 = 0x4b;

/// SPC-4 Table 43: fixed format sense-data byte layout
#[derive(Default, Clone, PartialEq, Eq)]
pub struct SenseData {
    pub sense_key: u8,
    pub asc: u8,
    pub ascq: u8,
    /// bytes 3..7, only meaningful when VALID is set
    pub information: Option<u32>,
}

impl SenseData {
    pub fn new(sense_key: u8, asc: u8, ascq: u8) -> Self {
        Self {
            sense_key,
            asc,
            ascq,
            information: None,
        }
    }

    pub fn illegal_request(asc: u8, ascq: u8) -> Self {
        Self::new(sense_key::ILLEGAL_REQUEST, asc, ascq)
    }

    pub fn data_phase_error() -> Self {
        Self::new(sense_key::ABORTED_COMMAND, ASC_DATA_PHASE_ERROR, 0)
    }

    /// Serialize as *fixed-format* sense data (SPC-4 § 4.5.3).
    pub fn to_fixed_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; FIXED_LEN];
        buf[0] = RESPONSE_CODE_CURRENT_FIXED;
        if let Some(info) = self.information {
            buf[0] |= 0x80;
            buf[3..7].copy_from_slice(&info.to_be_bytes());
        }
        buf[2] = self.sense_key & 0x0f;
        buf[7] = (FIXED_LEN - 8) as u8;
        buf[12] = self.asc;
        buf[13] = self.ascq;
        buf
    }

    /// Parse *fixed-format* sense data.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        ensure!(
            buf.len() >= FIXED_LEN,
            "sense buffer too small: {} < {FIXED_LEN}",
            buf.len()
        );
        ensure!(
            buf[0] & 0x7f == RESPONSE_CODE_CURRENT_FIXED
                || buf[0] & 0x7f == RESPONSE_CODE_CURRENT_FIXED + 1,
            "not fixed-format sense data: response code {:#04x}",
            buf[0] & 0x7f
        );

        let information = if buf[0] & 0x80 != 0 {
            Some(u32::from_be_bytes([buf[3], buf[4], buf[5], buf[6]]))
        } else {
            None
        };

        Ok(Self {
            sense_key: buf[2] & 0x0f,
            asc: buf[12],
            ascq: buf[13],
            information,
        })
    }
}

impl fmt::Debug for SenseData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SenseData")
            .field("sense_key", &format_args!("{:#x}", self.sense_key))
            .field("asc", &format_args!("{:#04x}", self.asc))
            .field("ascq", &format_args!("{:#04x}", self.ascq))
            .field("information", &self.information)
            .field("description", &asc_ascq_to_str(self.asc, self.ascq))
            .finish()
    }
}

/// SPC-4 description for the ASC/ASCQ pairs this target reports.
#[inline]
pub fn asc_ascq_to_str(asc: u8, ascq: u8) -> &'static str {
    match (asc, ascq) {
        (0x00, 0x00) => "No additional sense information",
        (0x20, 0x00) => "Invalid command operation code",
        (0x21, 0x00) => "Logical block address out of range",
        (0x24, 0x00) => "Invalid field in CDB",
        (0x25, 0x00) => "Logical unit not supported",
        (0x29, 0x00) => "Power on, reset, or bus device reset occurred",
        (0x4b, 0x00) => "Data phase error",
        _ => "UNSPECIFIED / vendor specific",
    }
}
