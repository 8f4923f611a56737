// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use iscsi_target_rs::{
    backend::ramdisk::RamDiskParams,
    control_block::write::build_write10,
    icl::pdu::IclPdu,
    models::{
        lun::encode_lun,
        nop::{request::NopOutRequestBuilder, response::NopInResponse},
        opcode::Opcode,
        ready_2_transfer::response::ReadyToTransfer,
        task_mgmt::{
            common::{TaskFunction, TaskResponseCode},
            request::TaskManagementRequestBuilder,
            response::TaskManagementResponse,
        },
    },
};

use super::common::*;

async fn task_request(ini: &mut Initiator, b: TaskManagementRequestBuilder) -> Result<TaskResponseCode> {
    let itt = ini.itt();
    let b = b.initiator_task_tag(itt).cmd_sn(ini.cmd_sn);
    ini.send(IclPdu::from_header(&b.header)).await?;
    let rsp = ini.expect(Opcode::ScsiTaskMgmtResp).await?;
    let hdr = TaskManagementResponse::ref_from_bhs_bytes(&rsp.bhs)?;
    assert_eq!(hdr.initiator_task_tag.get(), itt);
    Ok(hdr.response_code())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn abort_task_cancels_a_write_waiting_for_data() -> Result<()> {
    let t = setup(quiet_params(), RamDiskParams::default())?;
    let mut ini = Initiator::connect(&t, handoff_params([0x00, 0x02, 0x3d, 0, 1, 1])).await?;

    let mut cdb = [0u8; 16];
    build_write10(&mut cdb, 0, 8, 0, 0);
    let itt = ini.command(&cdb, 4096, true, &[]).await?;
    let r2t = ini.expect(Opcode::ReadyToTransfer).await?;
    assert_eq!(
        ReadyToTransfer::ref_from_bhs_bytes(&r2t.bhs)?.initiator_task_tag.get(),
        itt
    );

    let abort = TaskManagementRequestBuilder::new(TaskFunction::AbortTask)
        .lun(lun0())
        .referenced_task_tag(itt);
    assert_eq!(task_request(&mut ini, abort).await?, TaskResponseCode::FunctionComplete);

    // the aborted write answers nothing; the next PDU is the NOP-In
    let nop = NopOutRequestBuilder::new()
        .immediate()
        .initiator_task_tag(0x55)
        .cmd_sn(ini.cmd_sn);
    ini.send(IclPdu::from_header(&nop.header)).await?;
    let rsp = ini.expect(Opcode::NopIn).await?;
    assert_eq!(
        NopInResponse::ref_from_bhs_bytes(&rsp.bhs)?.initiator_task_tag.get(),
        0x55
    );

    let fe = t.frontend.clone();
    let id = ini.session_id;
    eventually(move || fe.session(id).is_some_and(|s| s.outstanding() == 0)).await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unsupported_function_is_answered_without_the_backend() -> Result<()> {
    let t = setup(quiet_params(), RamDiskParams::default())?;
    let mut ini = Initiator::connect(&t, handoff_params([0x00, 0x02, 0x3d, 0, 1, 2])).await?;

    let req = TaskManagementRequestBuilder::new(TaskFunction::ClearAca).lun(lun0());
    assert_eq!(
        task_request(&mut ini, req).await?,
        TaskResponseCode::FunctionNotSupported
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn lun_reset_reports_missing_lun() -> Result<()> {
    let t = setup(quiet_params(), RamDiskParams::default())?;
    let mut ini = Initiator::connect(&t, handoff_params([0x00, 0x02, 0x3d, 0, 1, 3])).await?;

    let missing = TaskManagementRequestBuilder::new(TaskFunction::LogicalUnitReset)
        .lun(encode_lun(9).unwrap_or_default());
    assert_eq!(
        task_request(&mut ini, missing).await?,
        TaskResponseCode::LunDoesNotExist
    );

    let present = TaskManagementRequestBuilder::new(TaskFunction::LogicalUnitReset).lun(lun0());
    assert_eq!(
        task_request(&mut ini, present).await?,
        TaskResponseCode::FunctionComplete
    );

    let target = TaskManagementRequestBuilder::new(TaskFunction::TargetWarmReset);
    assert_eq!(
        task_request(&mut ini, target).await?,
        TaskResponseCode::FunctionComplete
    );
    Ok(())
}
