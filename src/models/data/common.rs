// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use core::fmt;

use bitflags::bitflags;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

bitflags! {
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DataOutFlags: u8 {
        const FINAL = 0b1000_0000;
    }
}

bitflags! {
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DataInFlags: u8 {
        const FINAL = 1 << 7;
        /// Acknowledge request (ERL > 0 only)
        const A = 1 << 6;
        /// Residual overflow, valid with S
        const O = 1 << 2;
        /// Residual underflow, valid with S
        const U = 1 << 1;
        /// Status present
        const S = 1 << 0;
    }
}

/// Wire view of byte 1 of a Data-Out PDU.
#[repr(transparent)]
#[derive(Default, Clone, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct RawDataOutFlags(u8);

impl RawDataOutFlags {
    #[inline]
    pub const fn raw(&self) -> u8 {
        self.0
    }

    #[inline]
    pub fn fin(&self) -> bool {
        DataOutFlags::from_bits_truncate(self.0).contains(DataOutFlags::FINAL)
    }

    #[inline]
    pub fn set_fin(&mut self, on: bool) {
        if on {
            self.0 |= DataOutFlags::FINAL.bits();
        } else {
            self.0 &= !DataOutFlags::FINAL.bits();
        }
    }
}

impl fmt::Debug for RawDataOutFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", DataOutFlags::from_bits_truncate(self.0))
    }
}

/// Wire view of byte 1 of a Data-In PDU.
#[repr(transparent)]
#[derive(Default, Clone, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct RawDataInFlags(u8);

impl RawDataInFlags {
    #[inline]
    pub fn flags(&self) -> DataInFlags {
        DataInFlags::from_bits_truncate(self.0)
    }

    #[inline]
    pub fn insert(&mut self, f: DataInFlags) {
        self.0 |= f.bits();
    }

    #[inline]
    pub fn fin(&self) -> bool {
        self.flags().contains(DataInFlags::FINAL)
    }
}

impl fmt::Debug for RawDataInFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.flags())
    }
}
