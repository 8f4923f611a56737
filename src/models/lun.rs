// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! SAM-5 LUN field codec (8 bytes, big-endian on the wire).
//!
//! Only the single-level encodings a target frontend needs are decoded:
//!
//! | byte 0 bits 7..6 | method                         | LUN bits          |
//! |------------------|--------------------------------|-------------------|
//! | `00`             | peripheral device, bus 0       | byte 1            |
//! | `01`             | flat space                     | bytes 0..2, 14bit |
//! | `11` / `0xD2`    | extended flat space            | bytes 1..4, 24bit |
//!
//! Everything else, and every encoding whose unused bytes are non-zero,
//! decodes to [`LUN_INVALID`].

/// Sentinel for a LUN field that cannot be decoded.
pub const LUN_INVALID: u32 = u32::MAX;

const METHOD_PERIPHERAL: u64 = 0x00;
const METHOD_FLAT: u64 = 0x01;
const METHOD_EXTENDED: u64 = 0x03;
const EXTENDED_FLAT_HEADER: u64 = 0xd2;

/// Decodes a raw 8-byte LUN field into a LUN number.
pub fn decode_lun(raw: &[u8; 8]) -> u32 {
    let lun = u64::from_be_bytes(*raw);

    match lun >> 62 {
        METHOD_PERIPHERAL => {
            // bus identifier must be 0 and levels 2..4 empty
            if (lun & 0x3f00_0000_0000_0000) != 0 || (lun & 0x0000_ffff_ffff_ffff) != 0 {
                return LUN_INVALID;
            }
            ((lun >> 48) & 0xff) as u32
        },
        METHOD_FLAT => {
            if (lun & 0x0000_ffff_ffff_ffff) != 0 {
                return LUN_INVALID;
            }
            ((lun >> 48) & 0x3fff) as u32
        },
        METHOD_EXTENDED => {
            if (lun >> 56) != EXTENDED_FLAT_HEADER || (lun & 0xffff_ffff) != 0 {
                return LUN_INVALID;
            }
            ((lun >> 32) & 0x00ff_ffff) as u32
        },
        _ => LUN_INVALID,
    }
}

/// Encodes `lun` with the narrowest addressing method that fits.
///
/// LUNs that do not fit in 24 bits are not representable and yield `None`.
pub fn encode_lun(lun: u32) -> Option<[u8; 8]> {
    let raw: u64 = if lun < 256 {
        (lun as u64) << 48
    } else if lun < 16384 {
        (METHOD_FLAT << 62) | ((lun as u64) << 48)
    } else if lun <= 0x00ff_ffff {
        (EXTENDED_FLAT_HEADER << 56) | ((lun as u64) << 32)
    } else {
        return None;
    };
    Some(raw.to_be_bytes())
}
