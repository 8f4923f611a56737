// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Logout reason and response codes.
pub mod common;
/// BHS for the Logout Request.
pub mod request;
/// BHS for the Logout Response.
pub mod response;
