// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Per-connection receive state machine.
//!
//! ```text
//!   BHS ─► AHS ─► HEADER_DIGEST ─► DATA ⟲ ─► DATA_DIGEST ─► (deliver) ─► BHS
//! ```
//!
//! States with nothing to read are skipped. The caller reads exactly
//! [`RecvMachine::wanted`] bytes and hands them to [`RecvMachine::feed`].

use bytes::BytesMut;
use thiserror::Error;
use tracing::trace;

use crate::{
    icl::{buf_chain::ChainAllocError, pdu::IclPdu},
    models::common::HEADER_LEN,
    state_machine::common::Transition,
    utils::pad_len,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("data segment length {len} exceeds MaxRecvDataSegmentLength {max}")]
    DataSegmentTooLong { len: usize, max: usize },
    #[error("header digest mismatch: received 0x{received:08x}, computed 0x{computed:08x}")]
    HeaderDigest { received: u32, computed: u32 },
    #[error("data digest mismatch: received 0x{received:08x}, computed 0x{computed:08x}")]
    DataDigest { received: u32, computed: u32 },
    #[error("expected {expected} bytes in state {state:?}, got {got}")]
    ShortRead {
        state: RecvState,
        expected: usize,
        got: usize,
    },
    #[error("receive buffer allocation failed")]
    Alloc,
}

impl From<ChainAllocError> for ProtocolError {
    fn from(_: ChainAllocError) -> Self {
        Self::Alloc
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RecvState {
    Bhs,
    Ahs,
    HeaderDigest,
    Data,
    DataDigest,
}

/// Negotiated values the receive side depends on.
#[derive(Debug, Clone, Copy)]
pub struct RecvParams {
    pub max_recv_data_segment_length: usize,
    pub header_crc32c: bool,
    pub data_crc32c: bool,
    /// Largest chunk of data requested in one pass of the DATA state.
    pub partial_receive_len: usize,
}

#[derive(Debug)]
pub struct RecvMachine {
    params: RecvParams,
    state: RecvState,
    pdu: IclPdu,
    /// Data segment bytes received so far, padding included.
    received: usize,
}

impl RecvMachine {
    pub fn new(params: RecvParams) -> Self {
        Self {
            params,
            state: RecvState::Bhs,
            pdu: IclPdu::new_bhs(),
            received: 0,
        }
    }

    #[inline]
    pub fn state(&self) -> RecvState {
        self.state
    }

    /// Number of bytes the current state needs before it can fire.
    pub fn wanted(&self) -> usize {
        match self.state {
            RecvState::Bhs => HEADER_LEN,
            RecvState::Ahs => self.pdu.ahs_length(),
            RecvState::HeaderDigest | RecvState::DataDigest => 4,
            RecvState::Data => {
                let remaining = self.pdu.data_len.saturating_sub(self.received);
                if remaining > self.params.partial_receive_len {
                    self.params.partial_receive_len
                } else {
                    // the tail of the payload is requested together with its padding
                    self.pdu.data_len + self.pdu.padding() - self.received
                }
            },
        }
    }

    /// Consumes exactly [`RecvMachine::wanted`] bytes. Returns the assembled
    /// PDU once its last piece arrived.
    pub fn feed(&mut self, buf: BytesMut) -> Result<Option<IclPdu>, ProtocolError> {
        let expected = self.wanted();
        if buf.len() != expected {
            return Err(ProtocolError::ShortRead {
                state: self.state,
                expected,
                got: buf.len(),
            });
        }

        let step = match self.state {
            RecvState::Bhs => self.on_bhs(&buf)?,
            RecvState::Ahs => {
                self.pdu.ahs.push_segment(buf);
                self.advance_from(RecvState::Ahs)
            },
            RecvState::HeaderDigest => self.on_header_digest(&buf)?,
            RecvState::Data => self.on_data(buf),
            RecvState::DataDigest => self.on_data_digest(&buf)?,
        };

        match step {
            Transition::Next(next, ()) => {
                trace!(from = ?self.state, to = ?next, "receive state");
                self.state = next;
                Ok(None)
            },
            Transition::Stay(()) => Ok(None),
            Transition::Done(()) => {
                self.state = RecvState::Bhs;
                self.received = 0;
                Ok(Some(std::mem::take(&mut self.pdu)))
            },
        }
    }

    fn on_bhs(&mut self, buf: &[u8]) -> Result<Transition<RecvState, ()>, ProtocolError> {
        self.pdu = IclPdu::new_bhs();
        self.pdu.bhs.copy_from_slice(buf);
        self.received = 0;

        let len = self.pdu.data_segment_length();
        if len > self.params.max_recv_data_segment_length {
            return Err(ProtocolError::DataSegmentTooLong {
                len,
                max: self.params.max_recv_data_segment_length,
            });
        }
        self.pdu.data_len = len;
        Ok(self.advance_from(RecvState::Bhs))
    }

    fn on_header_digest(
        &mut self,
        buf: &[u8],
    ) -> Result<Transition<RecvState, ()>, ProtocolError> {
        let received = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let computed = self.pdu.header_digest();
        if received != computed {
            return Err(ProtocolError::HeaderDigest { received, computed });
        }
        Ok(self.advance_from(RecvState::HeaderDigest))
    }

    fn on_data(&mut self, buf: BytesMut) -> Transition<RecvState, ()> {
        self.received += buf.len();
        self.pdu.data.push_segment(buf);
        if self.received < self.pdu.data_len + pad_len(self.pdu.data_len) {
            return Transition::Stay(());
        }
        self.advance_from(RecvState::Data)
    }

    fn on_data_digest(
        &mut self,
        buf: &[u8],
    ) -> Result<Transition<RecvState, ()>, ProtocolError> {
        let received = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let computed = self.pdu.data_digest();
        if received != computed {
            return Err(ProtocolError::DataDigest { received, computed });
        }
        Ok(Transition::Done(()))
    }

    /// First state after `from` that has something to read.
    fn advance_from(&self, from: RecvState) -> Transition<RecvState, ()> {
        let has_data = self.pdu.data_len > 0;
        let order = [
            (RecvState::Ahs, self.pdu.ahs_length() > 0),
            (RecvState::HeaderDigest, self.params.header_crc32c),
            (RecvState::Data, has_data),
            (RecvState::DataDigest, has_data && self.params.data_crc32c),
        ];
        order
            .into_iter()
            .filter(|(s, _)| *s > from)
            .find(|(_, wanted)| *wanted)
            .map_or(Transition::Done(()), |(s, _)| Transition::Next(s, ()))
    }
}
