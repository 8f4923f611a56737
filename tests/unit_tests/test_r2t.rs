// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::fs;

use anyhow::Result;
use hex::FromHex;
use iscsi_target_rs::{
    icl::pdu::IclPdu,
    models::{
        common::{HEADER_LEN, TargetSeqHeader},
        data::response::{ScsiDataIn, ScsiDataInBuilder},
        lun::encode_lun,
        ready_2_transfer::response::{ReadyToTransfer, ReadyToTransferBuilder},
    },
};

fn load_fixture(path: &str) -> Result<Vec<u8>> {
    let s = fs::read_to_string(path)?;
    let cleaned = s.trim().replace(|c: char| c.is_whitespace(), "");
    Ok(Vec::from_hex(&cleaned)?)
}

#[test]
fn test_r2t_layout() -> Result<()> {
    let expected = load_fixture("tests/unit_tests/fixtures/r2t/r2t.hex")?;

    let r2t = ReadyToTransferBuilder::new()
        .lun(encode_lun(0).expect("lun 0"))
        .initiator_task_tag(0x10)
        .target_transfer_tag(0x20)
        .r2t_sn(1)
        .buffer_offset(0x400)
        .desired_data_transfer_length(0xc00);
    assert_eq!(&r2t.header.to_bhs_bytes()[..], &expected[..]);
    Ok(())
}

#[test]
fn test_stamping_keeps_r2t_fields() -> Result<()> {
    let expected = load_fixture("tests/unit_tests/fixtures/r2t/r2t.hex")?;
    let mut bhs = [0u8; HEADER_LEN];
    bhs.copy_from_slice(&expected);

    let seq = TargetSeqHeader::from_bhs_bytes(&mut bhs)?;
    seq.stat_sn.set(0x11);
    seq.exp_cmd_sn.set(0x22);
    seq.max_cmd_sn.set(0x121);

    let r2t = ReadyToTransfer::ref_from_bhs_bytes(&bhs)?;
    assert_eq!(r2t.stat_sn.get(), 0x11);
    assert_eq!(r2t.exp_cmd_sn.get(), 0x22);
    assert_eq!(r2t.max_cmd_sn.get(), 0x121);
    assert_eq!(r2t.target_transfer_tag.get(), 0x20);
    assert_eq!(r2t.r2t_sn.get(), 1);
    assert_eq!(r2t.buffer_offset.get(), 0x400);
    assert_eq!(r2t.desired_data_transfer_length.get(), 0xc00);
    Ok(())
}

#[test]
fn test_data_in_final_segment() -> Result<()> {
    let hdr = ScsiDataInBuilder::new()
        .lun(encode_lun(3).expect("lun 3"))
        .initiator_task_tag(0x10)
        .data_sn(2)
        .buffer_offset(8192)
        .final_bit();
    let mut pdu = IclPdu::from_header(&hdr.header);
    pdu.append_data(&[0xa5; 1000])?;
    let wire = pdu.to_wire(false, false)?;
    assert_eq!(wire.len(), HEADER_LEN + 1000);

    let parsed = ScsiDataIn::ref_from_bhs_bytes(&wire[..HEADER_LEN])?;
    assert!(parsed.flags.fin());
    assert_eq!(parsed.data_length(), 1000);
    assert_eq!(parsed.lun, [0, 3, 0, 0, 0, 0, 0, 0]);
    assert_eq!(parsed.data_sn.get(), 2);
    assert_eq!(parsed.buffer_offset.get(), 8192);
    assert_eq!(parsed.target_transfer_tag.get(), 0xffff_ffff);
    Ok(())
}
