// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use core::fmt;

/// Function field of the Task Management Request (byte 1, bits 6..0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskFunction {
    AbortTask,
    AbortTaskSet,
    ClearAca,
    ClearTaskSet,
    LogicalUnitReset,
    TargetWarmReset,
    TargetColdReset,
    TaskReassign,
    Other(u8),
}

impl From<u8> for TaskFunction {
    fn from(v: u8) -> Self {
        match v & 0x7f {
            1 => Self::AbortTask,
            2 => Self::AbortTaskSet,
            3 => Self::ClearAca,
            4 => Self::ClearTaskSet,
            5 => Self::LogicalUnitReset,
            6 => Self::TargetWarmReset,
            7 => Self::TargetColdReset,
            8 => Self::TaskReassign,
            other => Self::Other(other),
        }
    }
}

impl From<TaskFunction> for u8 {
    fn from(f: TaskFunction) -> u8 {
        match f {
            TaskFunction::AbortTask => 1,
            TaskFunction::AbortTaskSet => 2,
            TaskFunction::ClearAca => 3,
            TaskFunction::ClearTaskSet => 4,
            TaskFunction::LogicalUnitReset => 5,
            TaskFunction::TargetWarmReset => 6,
            TaskFunction::TargetColdReset => 7,
            TaskFunction::TaskReassign => 8,
            TaskFunction::Other(v) => v & 0x7f,
        }
    }
}

/// Response field of the Task Management Response (RFC 7143 § 11.6.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskResponseCode {
    FunctionComplete,
    TaskDoesNotExist,
    LunDoesNotExist,
    TaskStillAllegiant,
    ReassignmentNotSupported,
    FunctionNotSupported,
    AuthorizationFailed,
    FunctionRejected,
    Other(u8),
}

impl From<TaskResponseCode> for u8 {
    fn from(c: TaskResponseCode) -> u8 {
        match c {
            TaskResponseCode::FunctionComplete => 0,
            TaskResponseCode::TaskDoesNotExist => 1,
            TaskResponseCode::LunDoesNotExist => 2,
            TaskResponseCode::TaskStillAllegiant => 3,
            TaskResponseCode::ReassignmentNotSupported => 4,
            TaskResponseCode::FunctionNotSupported => 5,
            TaskResponseCode::AuthorizationFailed => 6,
            TaskResponseCode::FunctionRejected => 255,
            TaskResponseCode::Other(v) => v,
        }
    }
}

impl From<u8> for TaskResponseCode {
    fn from(v: u8) -> Self {
        match v {
            0 => Self::FunctionComplete,
            1 => Self::TaskDoesNotExist,
            2 => Self::LunDoesNotExist,
            3 => Self::TaskStillAllegiant,
            4 => Self::ReassignmentNotSupported,
            5 => Self::FunctionNotSupported,
            6 => Self::AuthorizationFailed,
            255 => Self::FunctionRejected,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for TaskResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}({})", u8::from(*self))
    }
}
