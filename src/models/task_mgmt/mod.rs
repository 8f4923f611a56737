// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Task management function and response codes.
pub mod common;
/// BHS for the Task Management Function Request.
pub mod request;
/// BHS for the Task Management Function Response.
pub mod response;
