// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::fs;

use anyhow::Result;
use hex::FromHex;
use iscsi_target_rs::models::{
    common::{BasicHeaderSegment, HEADER_LEN},
    logout::{
        common::{LogoutReason, LogoutResponseCode},
        response::{LogoutResponse, LogoutResponseBuilder},
    },
    opcode::{BhsOpcode, Opcode},
    parse::Pdu,
};

fn load_fixture(path: &str) -> Result<Vec<u8>> {
    let s = fs::read_to_string(path)?;
    let cleaned = s.trim().replace(|c: char| c.is_whitespace(), "");
    Ok(Vec::from_hex(&cleaned)?)
}

#[test]
fn test_close_session_request() -> Result<()> {
    let bytes = load_fixture("tests/unit_tests/fixtures/logout/close_session.hex")?;
    assert_eq!(bytes.len(), HEADER_LEN);

    let Pdu::LogoutRequest(hdr) = Pdu::from_bhs_bytes(&bytes)? else {
        panic!("expected a Logout Request");
    };
    assert!(hdr.is_immediate());
    assert_eq!(hdr.logout_reason(), LogoutReason::CloseSession);
    assert_eq!(hdr.get_initiator_task_tag(), 0x0a);
    assert_eq!(hdr.cid.get(), 0);
    assert_eq!(hdr.get_cmd_sn(), Some(7));
    assert_eq!(hdr.exp_stat_sn.get(), 100);
    Ok(())
}

#[test]
fn test_reason_keeps_low_seven_bits() -> Result<()> {
    let mut bytes = load_fixture("tests/unit_tests/fixtures/logout/close_session.hex")?;
    bytes[1] = 0x82;
    let Pdu::LogoutRequest(hdr) = Pdu::from_bhs_bytes(&bytes)? else {
        panic!("expected a Logout Request");
    };
    assert_eq!(hdr.logout_reason(), LogoutReason::RemoveConnectionForRecovery);

    bytes[1] = 0x91;
    let Pdu::LogoutRequest(hdr) = Pdu::from_bhs_bytes(&bytes)? else {
        panic!("expected a Logout Request");
    };
    assert_eq!(hdr.logout_reason(), LogoutReason::Other(0x11));
    Ok(())
}

#[test]
fn test_response_timers() -> Result<()> {
    let bhs = LogoutResponseBuilder::new(LogoutResponseCode::Success)
        .initiator_task_tag(0x0a)
        .time2wait(2)
        .time2retain(20)
        .header
        .to_bhs_bytes();

    assert_eq!(BhsOpcode::try_from(bhs[0])?.opcode, Opcode::LogoutResp);
    assert_eq!(&bhs[40..44], &[0, 2, 0, 20]);

    let parsed = LogoutResponse::ref_from_bhs_bytes(&bhs)?;
    assert_eq!(parsed.response_code(), LogoutResponseCode::Success);
    assert_eq!(parsed.flags, 0x80);
    assert_eq!(parsed.time2wait.get(), 2);
    assert_eq!(parsed.time2retain.get(), 20);
    Ok(())
}
