// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// BHS for NOP-Out (initiator ping or ping reply).
pub mod request;
/// BHS for NOP-In (target ping or ping reply).
pub mod response;
