// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use rand::RngExt;

use crate::models::common::RESERVED_TAG;

/// Zero bytes needed to pad `n` up to a 4-byte boundary.
#[inline]
pub fn pad_len(n: usize) -> usize {
    (4 - (n % 4)) % 4
}

/// RFC 1982 serial number comparison, `a < b`.
#[inline]
pub fn sn_lt(a: u32, b: u32) -> bool {
    a != b && b.wrapping_sub(a) < 0x8000_0000
}

/// RFC 1982 serial number comparison, `a > b`.
#[inline]
pub fn sn_gt(a: u32, b: u32) -> bool {
    sn_lt(b, a)
}

/// Whether `sn` lies in the closed serial window `[low, low + delta]`.
#[inline]
pub fn sn_in_window(sn: u32, low: u32, delta: u32) -> bool {
    !sn_lt(sn, low) && !sn_gt(sn, low.wrapping_add(delta))
}

/// Random starting point for per-session target transfer tags.
pub fn initial_transfer_tag() -> u32 {
    let mut raw = [0u8; 4];
    rand::rng().fill(&mut raw);
    let tag = u32::from_be_bytes(raw);
    if tag == RESERVED_TAG { 0 } else { tag }
}

/// Random ISID for connections handed off without a login phase.
pub fn random_isid() -> [u8; 6] {
    let mut isid = [0u8; 6];
    rand::rng().fill(&mut isid);
    // OUI-format qualifier
    isid[0] &= 0x3f;
    isid
}

/// Next target transfer tag after `prev`, skipping the reserved value.
#[inline]
pub fn next_transfer_tag(prev: u32) -> u32 {
    match prev.wrapping_add(1) {
        RESERVED_TAG => 0,
        tag => tag,
    }
}

/// Escapes text for inclusion in XML element content.
pub fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}
