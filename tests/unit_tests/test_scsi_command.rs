// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::fs;

use anyhow::Result;
use hex::FromHex;
use iscsi_target_rs::models::{
    command::{
        common::{ResponseCode, ScsiStatus, TaskAttribute},
        request::ScsiCommandRequest,
        response::{ScsiCommandResponse, ScsiCommandResponseBuilder},
    },
    common::{BasicHeaderSegment, HEADER_LEN},
    lun::decode_lun,
    parse::Pdu,
};

fn load_fixture(path: &str) -> Result<Vec<u8>> {
    let s = fs::read_to_string(path)?;
    let cleaned = s.trim().replace(|c: char| c.is_whitespace(), "");
    Ok(Vec::from_hex(&cleaned)?)
}

#[test]
fn test_read10_request_parse() -> Result<()> {
    let bytes = load_fixture("tests/unit_tests/fixtures/scsi_command/read10_request.hex")?;
    assert_eq!(bytes.len(), HEADER_LEN);

    let Pdu::ScsiCommandRequest(hdr) = Pdu::from_bhs_bytes(&bytes)? else {
        panic!("expected a SCSI Command");
    };
    assert!(!hdr.is_immediate());
    assert!(hdr.flags.fin());
    assert!(hdr.flags.read());
    assert!(!hdr.flags.write());
    assert_eq!(hdr.flags.task_attr(), TaskAttribute::Simple);
    assert_eq!(decode_lun(&hdr.lun), 0);
    assert_eq!(hdr.get_initiator_task_tag(), 1);
    assert_eq!(hdr.expected_data_transfer_length.get(), 4096);
    assert_eq!(hdr.get_cmd_sn(), Some(5));
    assert_eq!(hdr.exp_stat_sn.get(), 100);
    assert_eq!(hdr.get_data_length_bytes(), 0);

    let cdb = &hdr.scsi_descriptor_block;
    assert_eq!(cdb[0], 0x28);
    assert_eq!(u32::from_be_bytes([cdb[2], cdb[3], cdb[4], cdb[5]]), 16);
    assert_eq!(u16::from_be_bytes([cdb[7], cdb[8]]), 8);
    Ok(())
}

#[test]
fn test_response_with_underflow_matches_fixture() -> Result<()> {
    let expected = load_fixture("tests/unit_tests/fixtures/scsi_command/response_underflow.hex")?;

    let builder = ScsiCommandResponseBuilder::new()
        .initiator_task_tag(1)
        .response(ResponseCode::CommandCompleted)
        .status(ScsiStatus::Good)
        .exp_data_sn(2)
        .residual(4096, 3584);
    assert_eq!(&builder.header.to_bhs_bytes()[..], &expected[..]);

    let parsed = ScsiCommandResponse::ref_from_bhs_bytes(&expected)?;
    assert!(parsed.flags.underflow());
    assert!(!parsed.flags.overflow());
    assert_eq!(parsed.residual_count.get(), 512);
    assert_eq!(parsed.response_code(), ResponseCode::CommandCompleted);
    assert_eq!(parsed.scsi_status(), ScsiStatus::Good);
    Ok(())
}

#[test]
fn test_command_view_rejects_other_opcodes() -> Result<()> {
    let bytes = load_fixture("tests/unit_tests/fixtures/scsi_command/response_underflow.hex")?;
    assert!(ScsiCommandRequest::ref_from_bhs_bytes(&bytes).is_err());
    // a SCSI Response is target-to-initiator only
    assert!(Pdu::from_bhs_bytes(&bytes).is_err());
    Ok(())
}
