//! This module defines the wire structures for iSCSI PDUs handled by the
//! target.

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Defines common structures and traits for iSCSI models.
pub mod common;

/// Asynchronous Message PDU.
pub mod async_message;
/// SCSI Command and SCSI Response PDUs.
pub mod command;
/// Data-In and Data-Out PDUs, sense data.
pub mod data;
/// Logout Request / Response PDUs.
pub mod logout;
/// SAM-5 LUN encoding.
pub mod lun;
/// NOP-Out / NOP-In PDUs.
pub mod nop;
/// Defines the iSCSI opcode enumeration.
pub mod opcode;
/// Typed dispatch over received headers.
pub mod parse;
/// Ready To Transfer (R2T) PDU.
pub mod ready_2_transfer;
/// Task Management Function Request / Response PDUs.
pub mod task_mgmt;
