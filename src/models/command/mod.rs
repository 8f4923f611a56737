// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Task attributes, SCSI status and response codes.
pub mod common;
/// BHS for the SCSI Command PDU (initiator → target).
pub mod request;
/// BHS for the SCSI Response PDU (target → initiator).
pub mod response;
/// Wire-level wrappers for command flag bytes.
pub mod zero_copy;
