// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! iSCSI Common Layer: PDU buffers and the per-connection transport.

pub mod buf_chain;
pub mod conn;
pub mod pdu;
