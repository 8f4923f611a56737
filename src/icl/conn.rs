// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! One iSCSI connection: a receiver task driving [`RecvMachine`] and a
//! sender task draining a FIFO of PDUs.

use std::{
    io,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use anyhow::anyhow;
use bytes::BytesMut;
use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    sync::mpsc,
    task::JoinHandle,
    time::timeout,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::{
    icl::pdu::{IclPdu, PduError},
    state_machine::receive_states::{ProtocolError, RecvMachine, RecvParams},
};

#[derive(Debug, Error)]
pub enum ConnError {
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
    #[error("connection closed by peer")]
    PeerClosed,
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("failed to serialize PDU: {0}")]
    Pdu(#[from] PduError),
}

/// Upper-layer callbacks.
///
/// `receive` is invoked from the receiver task in wire order. `error` fires
/// at most once per connection; implementations must not tear the
/// connection down inline.
pub trait IclHandler: Send + Sync + 'static {
    fn receive(self: Arc<Self>, pdu: IclPdu);

    fn error(self: Arc<Self>, err: ConnError);
}

#[derive(Debug, Clone)]
pub struct ConnParams {
    pub max_recv_data_segment_length: usize,
    pub max_send_data_segment_length: usize,
    pub header_crc32c: bool,
    pub data_crc32c: bool,
    pub partial_receive_len: usize,
    /// Upper bound on bytes gathered into one transport write.
    pub send_coalesce_limit: usize,
    /// Time allowed to flush queued PDUs when the connection is closed.
    pub close_timeout: Duration,
}

impl ConnParams {
    fn recv_params(&self) -> RecvParams {
        RecvParams {
            max_recv_data_segment_length: self.max_recv_data_segment_length,
            header_crc32c: self.header_crc32c,
            data_crc32c: self.data_crc32c,
            partial_receive_len: self.partial_receive_len.max(1),
        }
    }
}

pub struct IclConn {
    params: ConnParams,
    tx: mpsc::UnboundedSender<IclPdu>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<IclPdu>>>,
    cancel: CancellationToken,
    failed: Arc<AtomicBool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for IclConn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IclConn")
            .field("params", &self.params)
            .field("closed", &self.cancel.is_cancelled())
            .finish()
    }
}

impl IclConn {
    pub fn new(params: ConnParams) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            params,
            tx,
            rx: Mutex::new(Some(rx)),
            cancel: CancellationToken::new(),
            failed: Arc::new(AtomicBool::new(false)),
            tasks: Mutex::new(Vec::with_capacity(2)),
        })
    }

    #[inline]
    pub fn params(&self) -> &ConnParams {
        &self.params
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Takes ownership of an established, logged-in transport and starts the
    /// receiver and sender tasks. Can only be done once.
    pub fn handoff<S>(&self, stream: S, handler: Arc<dyn IclHandler>) -> anyhow::Result<()>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let rx = self
            .rx
            .lock()
            .map_err(|_| anyhow!("connection lock poisoned"))?
            .take()
            .ok_or_else(|| anyhow!("connection already handed off"))?;
        let (rd, wr) = tokio::io::split(stream);

        let receiver = tokio::spawn(receive_loop(
            rd,
            RecvMachine::new(self.params.recv_params()),
            handler.clone(),
            self.cancel.clone(),
            self.failed.clone(),
        ));
        let sender = tokio::spawn(send_loop(
            wr,
            rx,
            self.params.clone(),
            handler,
            self.cancel.clone(),
            self.failed.clone(),
        ));

        let mut tasks = self
            .tasks
            .lock()
            .map_err(|_| anyhow!("connection lock poisoned"))?;
        tasks.push(receiver);
        tasks.push(sender);
        Ok(())
    }

    /// Queues a fully built PDU for transmission. PDUs leave in queue order.
    pub fn pdu_queue(&self, pdu: IclPdu) {
        if self.tx.send(pdu).is_err() {
            debug!("dropping PDU queued on a closed connection");
        }
    }

    /// Stops receiving, flushes what is queued and shuts the transport down.
    pub async fn close(&self) {
        self.cancel.cancel();
        let tasks = match self.tasks.lock() {
            Ok(mut t) => std::mem::take(&mut *t),
            Err(_) => return,
        };
        for t in tasks {
            if let Err(e) = t.await {
                warn!("connection task ended abnormally: {e}");
            }
        }
    }
}

fn report(handler: &Arc<dyn IclHandler>, failed: &AtomicBool, err: ConnError) {
    if !failed.swap(true, Ordering::AcqRel) {
        handler.clone().error(err);
    }
}

async fn receive_loop<R>(
    mut rd: R,
    mut machine: RecvMachine,
    handler: Arc<dyn IclHandler>,
    cancel: CancellationToken,
    failed: Arc<AtomicBool>,
) where
    R: AsyncRead + Unpin,
{
    loop {
        let mut buf = BytesMut::zeroed(machine.wanted());
        let res = tokio::select! {
            _ = cancel.cancelled() => return,
            r = rd.read_exact(&mut buf) => r,
        };
        if let Err(e) = res {
            if !cancel.is_cancelled() {
                let err = if e.kind() == io::ErrorKind::UnexpectedEof {
                    ConnError::PeerClosed
                } else {
                    ConnError::Io(e)
                };
                debug!("receive: {err}");
                report(&handler, &failed, err);
            }
            return;
        }

        match machine.feed(buf) {
            Ok(Some(pdu)) => {
                trace!(opcode = ?pdu.opcode(), len = pdu.data_len, "received PDU");
                handler.clone().receive(pdu);
            },
            Ok(None) => {},
            Err(e) => {
                warn!("receive: {e}; dropping connection");
                report(&handler, &failed, e.into());
                return;
            },
        }
    }
}

/// Finalizes `first` and as many queued PDUs as fit under the coalesce limit
/// into `out`.
fn coalesce(
    first: IclPdu,
    rx: &mut mpsc::UnboundedReceiver<IclPdu>,
    out: &mut BytesMut,
    params: &ConnParams,
) -> Result<usize, PduError> {
    let mut pdu = first;
    let mut count = 0;
    loop {
        pdu.finalize(params.header_crc32c, params.data_crc32c, out)?;
        count += 1;
        if out.len() >= params.send_coalesce_limit {
            break;
        }
        match rx.try_recv() {
            Ok(next) => pdu = next,
            Err(_) => break,
        }
    }
    Ok(count)
}

async fn io_with_timeout<F, T>(label: &'static str, fut: F, io_timeout: Duration) -> io::Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    match timeout(io_timeout, fut).await {
        Ok(res) => res,
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("{label} timeout"),
        )),
    }
}

async fn send_loop<W>(
    mut wr: W,
    mut rx: mpsc::UnboundedReceiver<IclPdu>,
    params: ConnParams,
    handler: Arc<dyn IclHandler>,
    cancel: CancellationToken,
    failed: Arc<AtomicBool>,
) where
    W: AsyncWrite + Unpin,
{
    let mut out = BytesMut::with_capacity(params.send_coalesce_limit);
    loop {
        let first = tokio::select! {
            biased;
            pdu = rx.recv() => match pdu {
                Some(p) => p,
                None => break,
            },
            _ = cancel.cancelled() => break,
        };

        out.clear();
        let count = match coalesce(first, &mut rx, &mut out, &params) {
            Ok(n) => n,
            Err(e) => {
                warn!("send: {e}; dropping connection");
                report(&handler, &failed, e.into());
                return;
            },
        };
        trace!(pdus = count, bytes = out.len(), "send");
        if let Err(e) = wr.write_all(&out).await {
            if !cancel.is_cancelled() {
                debug!("send: {e}");
                report(&handler, &failed, e.into());
            }
            return;
        }
    }

    rx.close();
    out.clear();
    while let Ok(mut pdu) = rx.try_recv() {
        if pdu
            .finalize(params.header_crc32c, params.data_crc32c, &mut out)
            .is_err()
        {
            break;
        }
    }
    let flushed = io_with_timeout(
        "flush",
        async {
            wr.write_all(&out).await?;
            wr.flush().await?;
            wr.shutdown().await
        },
        params.close_timeout,
    )
    .await;
    if let Err(e) = flushed {
        debug!("close: {e}");
    }
}
