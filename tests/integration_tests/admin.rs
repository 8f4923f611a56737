// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use iscsi_target_rs::{
    backend::ramdisk::RamDiskParams,
    frontend::{AdminError, HandoffError, SessionSelector},
    models::{async_message::response::AsyncMessage, opcode::Opcode},
};
use tokio::io::duplex;

use super::common::*;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn list_describes_each_session() -> Result<()> {
    let t = setup(quiet_params(), RamDiskParams::default())?;
    let ini = Initiator::connect(&t, handoff_params([0x00, 0x02, 0x3d, 0, 4, 1])).await?;

    let xml = t.frontend.list();
    assert!(xml.starts_with("<ctlislist>"));
    assert!(xml.contains(&format!("<connection id=\"{}\">", ini.session_id)));
    assert!(xml.contains(&format!("<initiator>{INITIATOR}</initiator>")));
    assert!(xml.contains("<initiator_addr>192.0.2.10</initiator_addr>"));
    assert!(xml.contains("<target_alias>ram0</target_alias>"));
    assert!(xml.contains("<header_digest>None</header_digest>"));
    assert!(xml.contains("<max_send_data_segment_length>4096</max_send_data_segment_length>"));
    assert!(xml.contains("<immediate_data>1</immediate_data>"));
    assert!(xml.contains("<state>active</state>"));
    assert!(xml.trim_end().ends_with("</ctlislist>"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn terminate_by_initiator_sends_async_message_and_closes() -> Result<()> {
    let t = setup(quiet_params(), RamDiskParams::default())?;
    let mut ini = Initiator::connect(&t, handoff_params([0x00, 0x02, 0x3d, 0, 4, 2])).await?;

    let sel = SessionSelector::Initiator {
        name: Some(INITIATOR.to_string()),
        addr: None,
    };
    assert_eq!(t.frontend.terminate(&sel)?, 1);

    let msg = ini.expect(Opcode::AsyncMessage).await?;
    assert_eq!(AsyncMessage::ref_from_bhs_bytes(&msg.bhs)?.async_event, 3);
    ini.expect_closed().await?;

    let fe = t.frontend.clone();
    eventually(move || fe.sessions().is_empty()).await?;
    assert!(matches!(
        t.frontend.terminate(&SessionSelector::SessionId(ini.session_id)),
        Err(AdminError::NoMatch)
    ));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn logout_request_gives_the_initiator_a_window() -> Result<()> {
    let t = setup(quiet_params(), RamDiskParams::default())?;
    let mut ini = Initiator::connect(&t, handoff_params([0x00, 0x02, 0x3d, 0, 4, 3])).await?;

    assert_eq!(t.frontend.logout(&SessionSelector::All)?, 1);
    let msg = ini.expect(Opcode::AsyncMessage).await?;
    let hdr = AsyncMessage::ref_from_bhs_bytes(&msg.bhs)?;
    assert_eq!(hdr.async_event, 1);
    assert_eq!(hdr.parameter3.get(), 10);
    assert_eq!(hdr.stat_sn.get(), 100);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn same_initiator_and_isid_reinstates_the_session() -> Result<()> {
    let t = setup(quiet_params(), RamDiskParams::default())?;
    let isid = [0x00, 0x02, 0x3d, 0, 4, 4];
    let mut first = Initiator::connect(&t, handoff_params(isid)).await?;
    let second = Initiator::connect(&t, handoff_params(isid)).await?;

    assert_ne!(first.session_id, second.session_id);
    first.expect_closed().await?;
    let ids: Vec<u32> = t.frontend.sessions().iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![second.session_id]);

    // a different ISID is a separate session
    let third = Initiator::connect(&t, handoff_params([0x00, 0x02, 0x3d, 0, 4, 5])).await?;
    assert_eq!(t.frontend.sessions().len(), 2);
    drop(third);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn target_administration() -> Result<()> {
    let t = setup(quiet_params(), RamDiskParams::default())?;

    assert!(matches!(
        t.frontend.add_target(TARGET, None),
        Err(AdminError::TargetExists(_))
    ));
    assert!(matches!(
        t.frontend.map_lun(TARGET, 0, 5),
        Err(AdminError::LunBusy(0))
    ));
    assert_eq!(t.frontend.unmap_lun(TARGET, 0)?, 0);
    assert!(matches!(
        t.frontend.unmap_lun(TARGET, 0),
        Err(AdminError::LunNotMapped(0))
    ));

    let mut params = handoff_params([0x00, 0x02, 0x3d, 0, 4, 6]);
    params.target_name = "iqn.2025-01.rs.iscsi-target:none".to_string();
    let (_ours, theirs) = duplex(4096);
    assert!(matches!(
        t.frontend.handoff(params, theirs).await,
        Err(HandoffError::TargetNotFound(_))
    ));

    t.frontend.remove_target(TARGET)?;
    assert!(t.frontend.find_target(TARGET).is_none());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_closes_sessions_and_refuses_handoff() -> Result<()> {
    let t = setup(quiet_params(), RamDiskParams::default())?;
    let mut ini = Initiator::connect(&t, handoff_params([0x00, 0x02, 0x3d, 0, 4, 7])).await?;

    t.frontend.shutdown().await;
    assert!(t.frontend.sessions().is_empty());
    ini.expect_closed().await?;

    let (_ours, theirs) = duplex(4096);
    assert!(matches!(
        t.frontend
            .handoff(handoff_params([0x00, 0x02, 0x3d, 0, 4, 8]), theirs)
            .await,
        Err(HandoffError::Closed)
    ));
    Ok(())
}
