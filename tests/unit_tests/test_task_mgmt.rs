// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::fs;

use anyhow::Result;
use hex::FromHex;
use iscsi_target_rs::models::{
    common::BasicHeaderSegment,
    parse::Pdu,
    task_mgmt::{
        common::{TaskFunction, TaskResponseCode},
        request::TaskManagementRequestBuilder,
        response::{TaskManagementResponse, TaskManagementResponseBuilder},
    },
};

fn load_fixture(path: &str) -> Result<Vec<u8>> {
    let s = fs::read_to_string(path)?;
    let cleaned = s.trim().replace(|c: char| c.is_whitespace(), "");
    Ok(Vec::from_hex(&cleaned)?)
}

#[test]
fn test_abort_task_parse() -> Result<()> {
    let bytes = load_fixture("tests/unit_tests/fixtures/task_mgmt/abort_task.hex")?;

    let Pdu::TaskManagementRequest(hdr) = Pdu::from_bhs_bytes(&bytes)? else {
        panic!("expected a Task Management Request");
    };
    assert!(hdr.is_immediate());
    assert_eq!(hdr.task_function(), TaskFunction::AbortTask);
    assert_eq!(hdr.get_initiator_task_tag(), 9);
    assert_eq!(hdr.referenced_task_tag.get(), 4);
    assert_eq!(hdr.get_cmd_sn(), Some(6));
    assert_eq!(hdr.ref_cmd_sn.get(), 4);
    Ok(())
}

#[test]
fn test_builder_sets_function_and_final() -> Result<()> {
    let bytes = load_fixture("tests/unit_tests/fixtures/task_mgmt/abort_task.hex")?;
    let built = TaskManagementRequestBuilder::new(TaskFunction::AbortTask)
        .initiator_task_tag(9)
        .referenced_task_tag(4)
        .cmd_sn(6);
    let out = built.header.to_bhs_bytes();
    assert_eq!(&out[..24], &bytes[..24]);
    Ok(())
}

#[test]
fn test_response_codes_on_wire() -> Result<()> {
    for (code, raw) in [
        (TaskResponseCode::FunctionComplete, 0u8),
        (TaskResponseCode::LunDoesNotExist, 2),
        (TaskResponseCode::FunctionNotSupported, 5),
        (TaskResponseCode::FunctionRejected, 255),
    ] {
        let bhs = TaskManagementResponseBuilder::new(code)
            .initiator_task_tag(9)
            .header
            .to_bhs_bytes();
        assert_eq!(bhs[0], 0x22);
        assert_eq!(bhs[1], 0x80);
        assert_eq!(bhs[2], raw);
        let parsed = TaskManagementResponse::ref_from_bhs_bytes(&bhs)?;
        assert_eq!(parsed.response_code(), code);
        assert_eq!(parsed.initiator_task_tag.get(), 9);
    }
    Ok(())
}
