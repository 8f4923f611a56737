//! This crate provides a target-side implementation of the iSCSI protocol:
//! the connection layer, sessions, and the SCSI frontend that feeds a
//! backend execution engine.
// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Backend contract and the RAM-disk backend.
pub mod backend;
/// Handles configuration, command-line parsing, and logging.
pub mod cfg;
/// SCSI command descriptor blocks.
pub mod control_block;
/// Targets, sessions and the session registry.
pub mod frontend;
/// Contains handlers for different iSCSI PDU types.
pub mod handlers;
/// iSCSI Common Layer: PDU buffers and per-connection transport.
pub mod icl;
/// Defines the data structures for iSCSI PDUs and SCSI commands.
pub mod models;
/// Receive and session lifecycle state machines.
pub mod state_machine;
/// Provides utility functions used throughout the crate.
pub mod utils;
