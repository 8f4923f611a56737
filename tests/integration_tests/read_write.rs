// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use iscsi_target_rs::{
    backend::ramdisk::RamDiskParams,
    control_block::{read::build_read10, test_unit_ready::build_test_unit_ready, write::build_write10},
    icl::pdu::IclPdu,
    models::{
        command::{common::ScsiStatus, request::ScsiCommandRequestBuilder},
        data::{request::ScsiDataOutBuilder, response::ScsiDataIn, sense_data::SenseData},
        lun::encode_lun,
        opcode::Opcode,
        ready_2_transfer::response::ReadyToTransfer,
    },
};

use super::common::*;

fn read10(lba: u32, blocks: u16) -> [u8; 16] {
    let mut cdb = [0u8; 16];
    build_read10(&mut cdb, lba, blocks, 0, 0);
    cdb
}

fn write10(lba: u32, blocks: u16) -> [u8; 16] {
    let mut cdb = [0u8; 16];
    build_write10(&mut cdb, lba, blocks, 0, 0);
    cdb
}

async fn data_out(
    ini: &mut Initiator,
    itt: u32,
    ttt: u32,
    offset: u32,
    data: &[u8],
    data_sn: u32,
    last: bool,
) -> Result<()> {
    let mut b = ScsiDataOutBuilder::new()
        .lun(lun0())
        .initiator_task_tag(itt)
        .target_transfer_tag(ttt)
        .data_sn(data_sn)
        .buffer_offset(offset);
    if last {
        b = b.final_bit();
    }
    let mut pdu = IclPdu::from_header(&b.header);
    pdu.append_data(data)?;
    ini.send(pdu).await
}

/// Answers every R2T until the SCSI Response arrives.
async fn serve_r2ts(ini: &mut Initiator, itt: u32, payload: &[u8]) -> Result<(Vec<(u32, u32, u32)>, IclPdu)> {
    let mut seen = Vec::new();
    loop {
        let pdu = ini.recv().await?;
        match pdu.opcode() {
            Some(Opcode::ReadyToTransfer) => {
                let r2t = ReadyToTransfer::ref_from_bhs_bytes(&pdu.bhs)?;
                let (off, len) = (
                    r2t.buffer_offset.get(),
                    r2t.desired_data_transfer_length.get(),
                );
                seen.push((r2t.r2t_sn.get(), off, len));
                let ttt = r2t.target_transfer_tag.get();
                let burst = &payload[off as usize..(off + len) as usize];
                // two PDUs per burst
                let half = burst.len() / 2;
                data_out(ini, itt, ttt, off, &burst[..half], 0, false).await?;
                data_out(ini, itt, ttt, off + half as u32, &burst[half..], 1, true).await?;
            },
            Some(Opcode::ScsiCommandResp) => return Ok((seen, pdu)),
            other => anyhow::bail!("unexpected {other:?}"),
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn read_is_split_by_max_send_segment_length() -> Result<()> {
    let t = setup(quiet_params(), RamDiskParams::default())?;
    let mut ini = Initiator::connect(&t, handoff_params([0x00, 0x02, 0x3d, 0, 0, 1])).await?;

    let itt = ini.command(&read10(0, 16), 8192, false, &[]).await?;
    let (data_in, rsp) = ini.collect_read().await?;

    assert_eq!(data_in.len(), 2);
    for (i, pdu) in data_in.iter().enumerate() {
        let hdr = ScsiDataIn::ref_from_bhs_bytes(&pdu.bhs)?;
        assert_eq!(hdr.initiator_task_tag.get(), itt);
        assert_eq!(hdr.data_sn.get(), i as u32);
        assert_eq!(hdr.buffer_offset.get(), 4096 * i as u32);
        assert_eq!(hdr.stat_sn.get(), 100, "Data-In does not consume StatSN");
        assert_eq!(hdr.flags.fin(), i == 1);
        assert_eq!(pdu.data_len, 4096);
    }

    let r = response(&rsp)?;
    assert_eq!(r.initiator_task_tag.get(), itt);
    assert_eq!(r.scsi_status(), ScsiStatus::Good);
    assert_eq!(r.stat_sn.get(), 100);
    assert_eq!(r.exp_cmd_sn.get(), 2);
    assert_eq!(r.max_cmd_sn.get(), 2 + 256);
    assert_eq!(r.exp_data_sn.get(), 2);
    assert!(!r.flags.underflow() && !r.flags.overflow());

    // the next status PDU carries the advanced StatSN
    let mut tur = [0u8; 16];
    build_test_unit_ready(&mut tur, 0);
    ini.command(&tur, 0, false, &[]).await?;
    let rsp = ini.expect(Opcode::ScsiCommandResp).await?;
    assert_eq!(response(&rsp)?.stat_sn.get(), 101);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn write_uses_immediate_data_then_r2t_bursts() -> Result<()> {
    let t = setup(quiet_params(), RamDiskParams::default())?;
    let mut ini = Initiator::connect(&t, handoff_params([0x00, 0x02, 0x3d, 0, 0, 2])).await?;

    let payload: Vec<u8> = (0..8192u32).map(|i| (i % 251) as u8).collect();
    let itt = ini
        .command(&write10(8, 16), 8192, true, &payload[..1024])
        .await?;
    let (r2ts, rsp) = serve_r2ts(&mut ini, itt, &payload).await?;

    assert_eq!(r2ts, vec![(0, 1024, 4096), (1, 5120, 3072)]);
    let r = response(&rsp)?;
    assert_eq!(r.scsi_status(), ScsiStatus::Good);
    assert_eq!(r.residual_count.get(), 0);

    ini.command(&read10(8, 16), 8192, false, &[]).await?;
    let (data_in, rsp) = ini.collect_read().await?;
    assert_eq!(response(&rsp)?.scsi_status(), ScsiStatus::Good);
    let read_back: Vec<u8> = data_in.iter().flat_map(|p| p.data_bytes()).collect();
    assert_eq!(read_back, payload);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn write_larger_than_io_chunk_takes_several_moves() -> Result<()> {
    let disk = RamDiskParams {
        max_io_chunk: 2048,
        sg_segment_len: 1000,
        ..RamDiskParams::default()
    };
    let t = setup(quiet_params(), disk)?;
    let mut ini = Initiator::connect(&t, handoff_params([0x00, 0x02, 0x3d, 0, 0, 3])).await?;

    let payload: Vec<u8> = (0..4096u32).map(|i| (i * 7) as u8).collect();
    let itt = ini.command(&write10(0, 8), 4096, true, &[]).await?;
    let (r2ts, rsp) = serve_r2ts(&mut ini, itt, &payload).await?;
    assert_eq!(r2ts, vec![(0, 0, 2048), (1, 2048, 2048)]);
    assert_eq!(response(&rsp)?.scsi_status(), ScsiStatus::Good);

    ini.command(&read10(0, 8), 4096, false, &[]).await?;
    let (data_in, _) = ini.collect_read().await?;
    let read_back: Vec<u8> = data_in.iter().flat_map(|p| p.data_bytes()).collect();
    assert_eq!(read_back, payload);
    // DataSN keeps counting across moves
    let sns: Vec<u32> = data_in
        .iter()
        .map(|p| ScsiDataIn::ref_from_bhs_bytes(&p.bhs).map(|h| h.data_sn.get()))
        .collect::<Result<_>>()?;
    assert_eq!(sns, (0..sns.len() as u32).collect::<Vec<_>>());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn short_expected_length_reports_overflow() -> Result<()> {
    let t = setup(quiet_params(), RamDiskParams::default())?;
    let mut ini = Initiator::connect(&t, handoff_params([0x00, 0x02, 0x3d, 0, 0, 4])).await?;

    ini.command(&read10(0, 2), 512, false, &[]).await?;
    let (data_in, rsp) = ini.collect_read().await?;
    assert_eq!(data_in.len(), 1);
    assert_eq!(data_in[0].data_len, 512);
    assert!(ScsiDataIn::ref_from_bhs_bytes(&data_in[0].bhs)?.flags.fin());

    let r = response(&rsp)?;
    assert!(r.flags.overflow());
    assert_eq!(r.residual_count.get(), 512);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unmapped_lun_returns_sense() -> Result<()> {
    let t = setup(quiet_params(), RamDiskParams::default())?;
    let mut ini = Initiator::connect(&t, handoff_params([0x00, 0x02, 0x3d, 0, 0, 5])).await?;

    let mut tur = [0u8; 16];
    build_test_unit_ready(&mut tur, 0);
    let b = ScsiCommandRequestBuilder::new()
        .lun(encode_lun(7).unwrap_or_default())
        .initiator_task_tag(ini.itt())
        .cmd_sn(ini.take_cmd_sn())
        .scsi_descriptor_block(&tur);
    ini.send(IclPdu::from_header(&b.header)).await?;

    let rsp = ini.expect(Opcode::ScsiCommandResp).await?;
    assert_eq!(response(&rsp)?.scsi_status(), ScsiStatus::CheckCondition);
    let data = rsp.data_bytes();
    let sense_len = u16::from_be_bytes([data[0], data[1]]) as usize;
    assert_eq!(sense_len, data.len() - 2);
    let sense = SenseData::parse(&data[2..])?;
    assert_eq!(sense.sense_key, 0x05);
    assert_eq!(sense.asc, 0x25);
    Ok(())
}
