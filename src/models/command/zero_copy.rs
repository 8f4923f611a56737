// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use core::fmt;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::models::command::common::{
    ScsiCommandRequestFlags, ScsiCommandResponseFlags, TaskAttribute,
};

/// Wire view for **SCSI Command Request** flags (byte 1 of the PDU).
#[repr(transparent)]
#[derive(Default, Clone, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct RawScsiCmdReqFlags(u8);

impl RawScsiCmdReqFlags {
    #[inline]
    pub const fn raw(&self) -> u8 {
        self.0
    }

    #[inline]
    pub fn flags(&self) -> ScsiCommandRequestFlags {
        ScsiCommandRequestFlags::from_bits_truncate(self.0)
    }

    #[inline]
    pub fn fin(&self) -> bool {
        self.flags().contains(ScsiCommandRequestFlags::FINAL)
    }

    #[inline]
    pub fn read(&self) -> bool {
        self.flags().contains(ScsiCommandRequestFlags::READ)
    }

    #[inline]
    pub fn write(&self) -> bool {
        self.flags().contains(ScsiCommandRequestFlags::WRITE)
    }

    #[inline]
    pub fn task_attr(&self) -> TaskAttribute {
        TaskAttribute::from(self.0)
    }

    #[inline]
    pub fn set_task_attr(&mut self, attr: TaskAttribute) {
        let mask = ScsiCommandRequestFlags::ATTR_MASK.bits();
        self.0 = (self.0 & !mask) | (u8::from(attr) & mask);
    }
}

impl From<ScsiCommandRequestFlags> for RawScsiCmdReqFlags {
    #[inline]
    fn from(f: ScsiCommandRequestFlags) -> Self {
        Self(f.bits())
    }
}

impl fmt::Debug for RawScsiCmdReqFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.flags())
    }
}

/// Wire view for **SCSI Response** flags (byte 1 of the PDU).
#[repr(transparent)]
#[derive(Clone, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct RawScsiCmdRespFlags(u8);

impl Default for RawScsiCmdRespFlags {
    fn default() -> Self {
        Self(ScsiCommandResponseFlags::FINAL.bits())
    }
}

impl RawScsiCmdRespFlags {
    #[inline]
    pub const fn raw(&self) -> u8 {
        self.0
    }

    #[inline]
    pub fn flags(&self) -> ScsiCommandResponseFlags {
        ScsiCommandResponseFlags::from_bits_truncate(self.0)
    }

    #[inline]
    pub fn insert(&mut self, f: ScsiCommandResponseFlags) {
        self.0 |= f.bits();
    }

    #[inline]
    pub fn underflow(&self) -> bool {
        self.flags().contains(ScsiCommandResponseFlags::U_BIG)
    }

    #[inline]
    pub fn overflow(&self) -> bool {
        self.flags().contains(ScsiCommandResponseFlags::O_BIG)
    }
}

impl fmt::Debug for RawScsiCmdRespFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.flags())
    }
}
