// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use anyhow::Result;
use iscsi_target_rs::cfg::{
    cli::{CliPaths, resolve_config_path},
    config::Config,
    enums::{Digest, YesNo},
    logger::init_logger,
};
use serial_test::serial;

fn load() -> Result<Config> {
    resolve_config_path(CliPaths::DEFAULT_CONFIG).and_then(Config::load_from_file)
}

#[test]
#[serial]
fn test_shipped_config_loads() -> Result<()> {
    let cfg = load()?;

    assert_eq!(cfg.portal.listen, "127.0.0.1:3260");
    assert_eq!(cfg.session.immediate_data, YesNo::Yes);
    assert_eq!(cfg.session.header_digest, Digest::None);
    assert_eq!(cfg.targets.len(), 1);
    assert_eq!(cfg.targets[0].alias.as_deref(), Some("ram0"));
    assert_eq!(cfg.targets[0].luns.len(), 2);
    assert_eq!(cfg.targets[0].luns[1].block_size, 4096);

    let fp = cfg.frontend_params();
    assert_eq!(fp.ping_timeout, 5);
    assert_eq!(fp.callout_interval, Duration::from_secs(1));
    assert_eq!(fp.terminate_wait, Duration::from_secs(5));
    assert_eq!(fp.max_cmdsn_delta, 256);
    assert_eq!(fp.time2wait, 2);
    assert_eq!(fp.time2retain, 20);
    assert_eq!(fp.portal_group_tag, 1);

    let rp = cfg.ramdisk_params();
    assert_eq!(rp.vendor, "RUST");
    assert_eq!(rp.max_io_chunk, 128 * 1024);
    Ok(())
}

#[test]
#[serial]
fn test_handoff_params_from_session_section() -> Result<()> {
    let cfg = load()?;
    let hp = cfg.handoff_params("198.51.100.7", [0x00, 0x02, 0x3d, 0x00, 0x00, 0x01]);

    assert_eq!(hp.initiator_name, cfg.session.initiator_name);
    assert_eq!(hp.target_name, "iqn.2025-01.rs.iscsi-target:ram0");
    assert_eq!(hp.initiator_addr, "198.51.100.7");
    assert_eq!(hp.isid, [0x00, 0x02, 0x3d, 0x00, 0x00, 0x01]);
    assert_eq!(hp.max_burst_length, 1024 * 1024);
    assert_eq!(hp.first_burst_length, 256 * 1024);
    assert!(hp.immediate_data);
    assert!(!hp.header_crc32c);
    assert!(!hp.data_crc32c);
    Ok(())
}

#[test]
#[serial]
fn test_logger_installs_once() -> Result<()> {
    let path = resolve_config_path(CliPaths::DEFAULT_LOGGER)?;
    let path = path.to_string_lossy();
    let _guard = init_logger(&path)?;
    tracing::info!(target: "unit", session = 1u64, "logger ready");

    assert!(init_logger(&path).is_err());
    Ok(())
}

#[test]
fn test_missing_config_is_an_error() {
    assert!(resolve_config_path("tests/does-not-exist.yaml").is_err());
}
