// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::fmt;

bitflags::bitflags! {
    #[derive(Default, Clone, Copy, PartialEq, Eq)]
    /// iSCSI SCSI Command PDU flags
    pub struct ScsiCommandRequestFlags: u8 {
        const FINAL     = 0x80;
        const READ      = 0x40;
        const WRITE     = 0x20;
        /// lowest 3 bits represent the TaskAttribute
        const ATTR_MASK = 0b0000_0111;
    }
}

impl fmt::Debug for ScsiCommandRequestFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ScsiCommandRequestFlags as F;

        write!(f, "ScsiCommandRequestFlags(")?;
        let mut sep = "";
        for (bit, name) in [(F::FINAL, "FINAL"), (F::READ, "READ"), (F::WRITE, "WRITE")] {
            if self.contains(bit) {
                write!(f, "{sep}{name}")?;
                sep = "|";
            }
        }
        let attr = TaskAttribute::from(self.bits() & F::ATTR_MASK.bits());
        write!(f, "{sep}ATTR={attr:?})")
    }
}

bitflags::bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    /// Byte 1 of the SCSI Response PDU
    pub struct ScsiCommandResponseFlags: u8 {
        const FINAL   = 0b1000_0000;
        /// Bidir Read Residual Overflow (o)
        const O_SMALL = 0b0001_0000;
        /// Bidir Read Residual Underflow (u)
        const U_SMALL = 0b0000_1000;
        /// Residual Overflow (O)
        const O_BIG   = 0b0000_0100;
        /// Residual Underflow (U)
        const U_BIG   = 0b0000_0010;
    }
}

/// SCSI Task Attributes, including reserved values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskAttribute {
    Untagged,     // 0
    Simple,       // 1
    Ordered,      // 2
    HeadOfQueue,  // 3
    ACA,          // 4
    Reserved(u8), // 5..=7
}

impl From<u8> for TaskAttribute {
    fn from(value: u8) -> Self {
        match value & ScsiCommandRequestFlags::ATTR_MASK.bits() {
            0 => TaskAttribute::Untagged,
            1 => TaskAttribute::Simple,
            2 => TaskAttribute::Ordered,
            3 => TaskAttribute::HeadOfQueue,
            4 => TaskAttribute::ACA,
            r => TaskAttribute::Reserved(r),
        }
    }
}

impl From<TaskAttribute> for u8 {
    fn from(value: TaskAttribute) -> Self {
        match value {
            TaskAttribute::Untagged => 0,
            TaskAttribute::Simple => 1,
            TaskAttribute::Ordered => 2,
            TaskAttribute::HeadOfQueue => 3,
            TaskAttribute::ACA => 4,
            TaskAttribute::Reserved(v) => v & ScsiCommandRequestFlags::ATTR_MASK.bits(),
        }
    }
}

/// The 1-byte “Response” field in a SCSI Response PDU (RFC 7143 § 11.4.3)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    /// 0x00 – Command Completed at Target
    CommandCompleted,
    /// 0x01 – Target Failure
    TargetFailure,
    /// anything else
    Other(u8),
}

impl From<ResponseCode> for u8 {
    fn from(value: ResponseCode) -> Self {
        match value {
            ResponseCode::CommandCompleted => 0x00,
            ResponseCode::TargetFailure => 0x01,
            ResponseCode::Other(v) => v,
        }
    }
}

impl From<u8> for ResponseCode {
    fn from(b: u8) -> Self {
        match b {
            0x00 => ResponseCode::CommandCompleted,
            0x01 => ResponseCode::TargetFailure,
            other => ResponseCode::Other(other),
        }
    }
}

/// The 1-byte SCSI status (SAM-5 § 5.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScsiStatus {
    #[default]
    Good,
    CheckCondition,
    Busy,
    ReservationConflict,
    TaskSetFull,
    AcaActive,
    TaskAborted,
    Other(u8),
}

impl From<ScsiStatus> for u8 {
    fn from(value: ScsiStatus) -> Self {
        match value {
            ScsiStatus::Good => 0x00,
            ScsiStatus::CheckCondition => 0x02,
            ScsiStatus::Busy => 0x08,
            ScsiStatus::ReservationConflict => 0x18,
            ScsiStatus::TaskSetFull => 0x28,
            ScsiStatus::AcaActive => 0x30,
            ScsiStatus::TaskAborted => 0x40,
            ScsiStatus::Other(v) => v,
        }
    }
}

impl From<u8> for ScsiStatus {
    fn from(b: u8) -> Self {
        match b {
            0x00 => ScsiStatus::Good,
            0x02 => ScsiStatus::CheckCondition,
            0x08 => ScsiStatus::Busy,
            0x18 => ScsiStatus::ReservationConflict,
            0x28 => ScsiStatus::TaskSetFull,
            0x30 => ScsiStatus::AcaActive,
            0x40 => ScsiStatus::TaskAborted,
            other => ScsiStatus::Other(other),
        }
    }
}
