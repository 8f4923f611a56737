// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::fmt;

/// iSCSI Logout Reason Code (byte 1, bits 6..0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
    CloseSession,
    CloseConnection,
    RemoveConnectionForRecovery,
    Other(u8),
}

impl From<u8> for LogoutReason {
    fn from(v: u8) -> Self {
        match v & 0x7f {
            0 => Self::CloseSession,
            1 => Self::CloseConnection,
            2 => Self::RemoveConnectionForRecovery,
            other => Self::Other(other),
        }
    }
}

impl From<LogoutReason> for u8 {
    fn from(r: LogoutReason) -> u8 {
        match r {
            LogoutReason::CloseSession => 0,
            LogoutReason::CloseConnection => 1,
            LogoutReason::RemoveConnectionForRecovery => 2,
            LogoutReason::Other(v) => v & 0x7f,
        }
    }
}

impl fmt::Display for LogoutReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CloseSession => f.write_str("CloseSession"),
            Self::CloseConnection => f.write_str("CloseConnection"),
            Self::RemoveConnectionForRecovery => f.write_str("RemoveConnectionForRecovery"),
            Self::Other(v) => write!(f, "Other({v})"),
        }
    }
}

/// Logout Response code (byte 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutResponseCode {
    Success,
    CidNotFound,
    RecoveryNotSupported,
    CleanupFailed,
    Other(u8),
}

impl From<LogoutResponseCode> for u8 {
    fn from(c: LogoutResponseCode) -> u8 {
        match c {
            LogoutResponseCode::Success => 0,
            LogoutResponseCode::CidNotFound => 1,
            LogoutResponseCode::RecoveryNotSupported => 2,
            LogoutResponseCode::CleanupFailed => 3,
            LogoutResponseCode::Other(v) => v,
        }
    }
}

impl From<u8> for LogoutResponseCode {
    fn from(v: u8) -> Self {
        match v {
            0 => Self::Success,
            1 => Self::CidNotFound,
            2 => Self::RecoveryNotSupported,
            3 => Self::CleanupFailed,
            other => Self::Other(other),
        }
    }
}
