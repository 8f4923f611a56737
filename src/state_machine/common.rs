// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Outcome of feeding one step into a state machine.
#[derive(Debug)]
pub enum Transition<S, R> {
    /// Move to state `S`, yielding `R`.
    Next(S, R),
    /// Remain in the current state.
    Stay(R),
    /// The machine produced its final value and restarts.
    Done(R),
}
