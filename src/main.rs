// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use anyhow::{Context, Result};
use iscsi_target_rs::{
    backend::{Backend, ramdisk::RamDisk},
    cfg::{
        cli::{CliPaths, resolve_config_path},
        config::Config,
        logger::init_logger,
    },
    frontend::Frontend,
    utils::random_isid,
};
use tokio::{main, net::TcpListener, signal};
use tracing::{error, info, warn};

/// Creates the RAM-disk LUNs and the targets they are mapped into.
fn build_targets(cfg: &Config, ramdisk: &RamDisk, frontend: &Frontend) -> Result<()> {
    let mut backend_lun = 0u32;
    for t in &cfg.targets {
        frontend.add_target(&t.name, t.alias.as_deref())?;
        for l in &t.luns {
            ramdisk
                .create_lun(backend_lun, l.block_size, l.blocks)
                .with_context(|| format!("{}: LUN {}", t.name, l.lun))?;
            frontend.map_lun(&t.name, l.lun, backend_lun)?;
            info!(target = %t.name, lun = l.lun, blocks = l.blocks, "LUN ready");
            backend_lun += 1;
        }
    }
    Ok(())
}

#[main]
async fn main() -> Result<()> {
    let paths = CliPaths::from_args(std::env::args());
    let _logger_guard = init_logger(&paths.logger)?;

    let config = resolve_config_path(&paths.config)
        .and_then(Config::load_from_file)
        .context("failed to resolve or load config")?;

    let ramdisk = RamDisk::new(config.ramdisk_params());
    let frontend = Frontend::new(
        config.frontend_params(),
        Arc::clone(&ramdisk) as Arc<dyn Backend>,
    );
    build_targets(&config, &ramdisk, &frontend)?;

    let listener = TcpListener::bind(&config.portal.listen)
        .await
        .with_context(|| format!("cannot listen on {}", config.portal.listen))?;
    info!(portal = %config.portal.listen, "accepting connections");

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(a) => a,
                    Err(e) => {
                        warn!("accept failed: {e}");
                        continue;
                    },
                };
                if let Err(e) = stream.set_nodelay(true) {
                    warn!(%peer, "cannot set TCP_NODELAY: {e}");
                }
                let params = config.handoff_params(&peer.ip().to_string(), random_isid());
                match frontend.handoff(params, stream).await {
                    Ok(id) => info!(session = id, %peer, "connection handed off"),
                    Err(e) => error!(%peer, "handoff failed: {e}"),
                }
            }
        }
    }

    frontend.shutdown().await;
    ramdisk.shutdown();
    Ok(())
}
