// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// BHS for the Asynchronous Message PDU.
pub mod response;
