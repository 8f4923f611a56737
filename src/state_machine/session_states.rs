// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Session lifecycle.
//!
//! ```text
//!   New ─► Registered ─► Active ─► Terminating ─► TornDown
//!    └──────────┴───────────────────────┘
//! ```
//!
//! Any state before `Terminating` may jump straight to it; nothing leaves
//! `TornDown`.

use std::{
    fmt,
    sync::atomic::{AtomicU8, Ordering},
};

use crate::state_machine::common::Transition;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionState {
    /// Allocated, not yet known to the backend.
    New = 0,
    /// Initiator id allocated.
    Registered = 1,
    /// Bound to a target and servicing PDUs.
    Active = 2,
    Terminating = 3,
    TornDown = 4,
}

impl SessionState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::New,
            1 => Self::Registered,
            2 => Self::Active,
            3 => Self::Terminating,
            _ => Self::TornDown,
        }
    }

    /// Checks whether `self -> to` is a legal step.
    pub fn step(self, to: SessionState) -> Transition<SessionState, bool> {
        use SessionState::*;
        match (self, to) {
            (New, Registered) | (Registered, Active) | (Terminating, TornDown) => {
                Transition::Next(to, true)
            },
            (New | Registered | Active, Terminating) => Transition::Next(to, true),
            (from, to) if from == to => Transition::Stay(false),
            _ => Transition::Done(false),
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::New => "new",
            Self::Registered => "registered",
            Self::Active => "active",
            Self::Terminating => "terminating",
            Self::TornDown => "torn down",
        };
        f.write_str(s)
    }
}

/// Lock-free holder for a [`SessionState`].
#[derive(Debug)]
pub struct AtomicSessionState(AtomicU8);

impl Default for AtomicSessionState {
    fn default() -> Self {
        Self(AtomicU8::new(SessionState::New as u8))
    }
}

impl AtomicSessionState {
    #[inline]
    pub fn load(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Moves to `to` if the step is legal from the current state.
    /// Returns `false` when the state was left unchanged.
    pub fn advance(&self, to: SessionState) -> bool {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| {
                match SessionState::from_u8(cur).step(to) {
                    Transition::Next(next, _) => Some(next as u8),
                    Transition::Stay(_) | Transition::Done(_) => None,
                }
            })
            .is_ok()
    }
}
