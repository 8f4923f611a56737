// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use anyhow::Result;
use iscsi_target_rs::{
    backend::ramdisk::RamDiskParams,
    frontend::FrontendParams,
    icl::pdu::IclPdu,
    models::{
        common::RESERVED_TAG,
        nop::{request::NopOutRequestBuilder, response::NopInResponse},
        opcode::Opcode,
    },
};

use tokio::time::timeout;

use super::common::*;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn nop_out_is_echoed_with_data() -> Result<()> {
    let t = setup(quiet_params(), RamDiskParams::default())?;
    let mut ini = Initiator::connect(&t, handoff_params([0x00, 0x02, 0x3d, 0, 2, 1])).await?;

    let nop = NopOutRequestBuilder::new()
        .lun(lun0())
        .initiator_task_tag(7)
        .cmd_sn(ini.take_cmd_sn());
    let mut pdu = IclPdu::from_header(&nop.header);
    pdu.append_data(b"hello")?;
    ini.send(pdu).await?;

    let rsp = ini.expect(Opcode::NopIn).await?;
    let hdr = NopInResponse::ref_from_bhs_bytes(&rsp.bhs)?;
    assert_eq!(hdr.initiator_task_tag.get(), 7);
    assert_eq!(hdr.target_transfer_tag.get(), RESERVED_TAG);
    assert_eq!(hdr.stat_sn.get(), 100);
    assert_eq!(hdr.exp_cmd_sn.get(), 2);
    assert_eq!(rsp.data_bytes(), b"hello");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn only_non_immediate_nop_out_advances_exp_cmd_sn() -> Result<()> {
    let t = setup(quiet_params(), RamDiskParams::default())?;
    let mut ini = Initiator::connect(&t, handoff_params([0x00, 0x02, 0x3d, 0, 2, 5])).await?;
    let start = ini.cmd_sn;

    let nop = NopOutRequestBuilder::new()
        .immediate()
        .initiator_task_tag(ini.itt())
        .cmd_sn(ini.cmd_sn);
    ini.send(IclPdu::from_header(&nop.header)).await?;
    let rsp = ini.expect(Opcode::NopIn).await?;
    let hdr = NopInResponse::ref_from_bhs_bytes(&rsp.bhs)?;
    assert_eq!(hdr.exp_cmd_sn.get(), start);

    let nop = NopOutRequestBuilder::new()
        .initiator_task_tag(ini.itt())
        .cmd_sn(ini.take_cmd_sn());
    ini.send(IclPdu::from_header(&nop.header)).await?;
    let rsp = ini.expect(Opcode::NopIn).await?;
    let hdr = NopInResponse::ref_from_bhs_bytes(&rsp.bhs)?;
    assert_eq!(hdr.exp_cmd_sn.get(), start.wrapping_add(1));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn idle_session_is_pinged_without_consuming_stat_sn() -> Result<()> {
    let params = FrontendParams {
        ping_timeout: 20,
        callout_interval: Duration::from_millis(50),
        ..quiet_params()
    };
    let t = setup(params, RamDiskParams::default())?;
    let mut ini = Initiator::connect(&t, handoff_params([0x00, 0x02, 0x3d, 0, 2, 2])).await?;

    for _ in 0..2 {
        let ping = ini.expect(Opcode::NopIn).await?;
        let hdr = NopInResponse::ref_from_bhs_bytes(&ping.bhs)?;
        assert!(hdr.is_unsolicited());
        assert_eq!(hdr.target_transfer_tag.get(), 0);
        assert_eq!(hdr.stat_sn.get(), 100);
    }

    // reply with the reserved ITT; no NOP-In answers it
    let reply = NopOutRequestBuilder::new()
        .immediate()
        .initiator_task_tag(RESERVED_TAG)
        .target_transfer_tag(0)
        .cmd_sn(ini.cmd_sn);
    ini.send(IclPdu::from_header(&reply.header)).await?;

    let session = t.frontend.session(ini.session_id);
    assert!(session.is_some_and(|s| !s.is_terminating()));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn zero_ping_timeout_sends_no_pings() -> Result<()> {
    let params = FrontendParams {
        ping_timeout: 0,
        callout_interval: Duration::from_millis(20),
        ..quiet_params()
    };
    let t = setup(params, RamDiskParams::default())?;
    let mut ini = Initiator::connect(&t, handoff_params([0x00, 0x02, 0x3d, 0, 2, 4])).await?;

    // a dozen ticks of silence
    let idle = timeout(Duration::from_millis(250), ini.recv()).await;
    assert!(idle.is_err(), "unexpected PDU: {:?}", idle.ok());

    let session = t.frontend.session(ini.session_id);
    assert!(session.is_some_and(|s| !s.is_terminating()));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unanswered_pings_drop_the_session() -> Result<()> {
    let params = FrontendParams {
        ping_timeout: 4,
        callout_interval: Duration::from_millis(50),
        ..quiet_params()
    };
    let t = setup(params, RamDiskParams::default())?;
    let mut ini = Initiator::connect(&t, handoff_params([0x00, 0x02, 0x3d, 0, 2, 3])).await?;

    ini.expect_closed().await?;
    let fe = t.frontend.clone();
    eventually(move || fe.sessions().is_empty()).await?;
    Ok(())
}
