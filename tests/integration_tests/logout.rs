// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use iscsi_target_rs::{
    backend::ramdisk::RamDiskParams,
    frontend::FrontendParams,
    icl::pdu::IclPdu,
    models::{
        logout::{
            common::{LogoutReason, LogoutResponseCode},
            request::LogoutRequestBuilder,
            response::LogoutResponse,
        },
        nop::request::NopOutRequestBuilder,
        opcode::Opcode,
    },
};

use super::common::*;

async fn logout(ini: &mut Initiator, reason: LogoutReason) -> Result<IclPdu> {
    let req = LogoutRequestBuilder::new(reason)
        .initiator_task_tag(0x4000)
        .cmd_sn(ini.cmd_sn);
    ini.send(IclPdu::from_header(&req.header)).await?;
    ini.expect(Opcode::LogoutResp).await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn close_session_answers_then_disconnects() -> Result<()> {
    let params = FrontendParams {
        time2wait: 2,
        time2retain: 20,
        ..quiet_params()
    };
    let t = setup(params, RamDiskParams::default())?;
    let mut ini = Initiator::connect(&t, handoff_params([0x00, 0x02, 0x3d, 0, 3, 1])).await?;

    let rsp = logout(&mut ini, LogoutReason::CloseSession).await?;
    let hdr = LogoutResponse::ref_from_bhs_bytes(&rsp.bhs)?;
    assert_eq!(hdr.response_code(), LogoutResponseCode::Success);
    assert_eq!(hdr.initiator_task_tag.get(), 0x4000);
    assert_eq!(hdr.time2wait.get(), 2);
    assert_eq!(hdr.time2retain.get(), 20);
    assert_eq!(hdr.stat_sn.get(), 100);

    ini.expect_closed().await?;
    let fe = t.frontend.clone();
    eventually(move || fe.sessions().is_empty()).await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn connection_recovery_is_refused_and_session_stays() -> Result<()> {
    let t = setup(quiet_params(), RamDiskParams::default())?;
    let mut ini = Initiator::connect(&t, handoff_params([0x00, 0x02, 0x3d, 0, 3, 2])).await?;

    let rsp = logout(&mut ini, LogoutReason::RemoveConnectionForRecovery).await?;
    assert_eq!(
        LogoutResponse::ref_from_bhs_bytes(&rsp.bhs)?.response_code(),
        LogoutResponseCode::RecoveryNotSupported
    );

    let nop = NopOutRequestBuilder::new()
        .immediate()
        .initiator_task_tag(9)
        .cmd_sn(ini.cmd_sn);
    ini.send(IclPdu::from_header(&nop.header)).await?;
    ini.expect(Opcode::NopIn).await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unknown_logout_reason_drops_the_connection() -> Result<()> {
    let t = setup(quiet_params(), RamDiskParams::default())?;
    let mut ini = Initiator::connect(&t, handoff_params([0x00, 0x02, 0x3d, 0, 3, 3])).await?;

    let req = LogoutRequestBuilder::new(LogoutReason::Other(0x11)).cmd_sn(ini.cmd_sn);
    ini.send(IclPdu::from_header(&req.header)).await?;
    ini.expect_closed().await?;
    Ok(())
}
