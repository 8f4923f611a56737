// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Flag bytes shared by Data-In and Data-Out.
pub mod common;
/// BHS for the SCSI Data-Out PDU.
pub mod request;
/// BHS for the SCSI Data-In PDU.
pub mod response;
/// Fixed-format SCSI sense data.
pub mod sense_data;
