// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::fs;

use anyhow::Result;
use bytes::BytesMut;
use hex::FromHex;
use iscsi_target_rs::{
    icl::pdu::IclPdu,
    models::{
        common::{BasicHeaderSegment, HEADER_LEN, RESERVED_TAG, TargetSeqHeader},
        nop::{
            request::NopOutRequest,
            response::{NopInResponse, NopInResponseBuilder},
        },
        opcode::Opcode,
        parse::Pdu,
    },
    state_machine::receive_states::{RecvMachine, RecvParams, RecvState},
};

fn load_fixture(path: &str) -> Result<Vec<u8>> {
    let s = fs::read_to_string(path)?;
    let cleaned = s.trim().replace(|c: char| c.is_whitespace(), "");
    Ok(Vec::from_hex(&cleaned)?)
}

fn receive(wire: &[u8], header_crc32c: bool, data_crc32c: bool) -> Result<IclPdu> {
    let mut rx = RecvMachine::new(RecvParams {
        max_recv_data_segment_length: 8192,
        header_crc32c,
        data_crc32c,
        partial_receive_len: 128 * 1024,
    });
    let mut off = 0;
    loop {
        let n = rx.wanted();
        let chunk = BytesMut::from(&wire[off..off + n]);
        off += n;
        if let Some(pdu) = rx.feed(chunk)? {
            assert_eq!(off, wire.len(), "trailing bytes after the PDU");
            assert_eq!(rx.state(), RecvState::Bhs);
            return Ok(pdu);
        }
    }
}

#[test]
fn test_nop_out_ping_from_wire() -> Result<()> {
    let wire = load_fixture("tests/unit_tests/fixtures/nop/nop_out_ping.hex")?;
    assert_eq!(wire.len(), HEADER_LEN + 8);

    let pdu = receive(&wire, false, false)?;
    assert_eq!(pdu.opcode(), Some(Opcode::NopOut));
    assert!(pdu.is_immediate());
    assert_eq!(pdu.data_len, 5);
    assert_eq!(pdu.padding(), 3);
    assert_eq!(pdu.data_bytes(), b"hello");

    let Pdu::NopOutRequest(hdr) = Pdu::from_bhs_bytes(&pdu.bhs)? else {
        panic!("expected a NOP-Out");
    };
    assert_eq!(hdr.get_initiator_task_tag(), 7);
    assert_eq!(hdr.target_transfer_tag.get(), RESERVED_TAG);
    assert_eq!(hdr.get_cmd_sn(), Some(3));
    assert!(!hdr.is_ping_reply());
    Ok(())
}

#[test]
fn test_nop_out_with_digests_from_wire() -> Result<()> {
    let plain = load_fixture("tests/unit_tests/fixtures/nop/nop_out_ping.hex")?;
    let mut pdu = IclPdu::new_bhs();
    pdu.bhs.copy_from_slice(&plain[..HEADER_LEN]);
    pdu.append_data(b"hello")?;
    let wire = pdu.to_wire(true, true)?;
    assert_eq!(wire.len(), HEADER_LEN + 4 + 8 + 4);
    assert_eq!(&wire[..HEADER_LEN], &plain[..HEADER_LEN]);
    assert_eq!(&wire[HEADER_LEN + 4..HEADER_LEN + 12], &plain[HEADER_LEN..]);

    let crc = crc32c::crc32c(&plain[..HEADER_LEN]);
    assert_eq!(&wire[HEADER_LEN..HEADER_LEN + 4], &crc.to_le_bytes());

    let received = receive(&wire, true, true)?;
    assert_eq!(received.data_bytes(), b"hello");
    Ok(())
}

#[test]
fn test_nop_in_echo_header() -> Result<()> {
    let wire = load_fixture("tests/unit_tests/fixtures/nop/nop_out_ping.hex")?;
    let out = NopOutRequest::ref_from_bhs_bytes(&wire[..HEADER_LEN])?;

    let reply = NopInResponseBuilder::new()
        .lun(out.lun)
        .initiator_task_tag(out.initiator_task_tag.get());
    let mut pdu = IclPdu::from_header(&reply.header);
    pdu.append_data(b"hello")?;

    {
        let seq = TargetSeqHeader::from_bhs_bytes(&mut pdu.bhs)?;
        seq.stat_sn.set(100);
        seq.exp_cmd_sn.set(4);
        seq.max_cmd_sn.set(259);
    }
    let wire = pdu.to_wire(false, false)?;

    let hdr = NopInResponse::ref_from_bhs_bytes(&wire[..HEADER_LEN])?;
    assert_eq!(hdr.initiator_task_tag.get(), 7);
    assert_eq!(hdr.target_transfer_tag.get(), RESERVED_TAG);
    assert!(!hdr.is_unsolicited());
    assert_eq!(hdr.data_length(), 5);
    assert_eq!(hdr.stat_sn.get(), 100);
    assert_eq!(hdr.exp_cmd_sn.get(), 4);
    assert_eq!(hdr.max_cmd_sn.get(), 259);
    assert_eq!(&wire[HEADER_LEN..], b"hello\0\0\0");
    Ok(())
}
