//! Per-connection write task
//!
//! A [`StreamTransport`] owns the writable half of one client's connection.
//! It is the only code that writes to it: events arrive over the stream's
//! delivery queue, so publishers never wait on network I/O.

use std::sync::Weak;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::event::Event;
use crate::registry::ClientStream;

use super::config::TransportConfig;
use super::error::TransportError;
use super::frame;

/// Why a transport stopped
#[derive(Debug)]
pub enum TransportExit {
    /// Closed by the engine (explicit close, replacement or shutdown)
    Cancelled,
    /// Every sender of the delivery queue was dropped
    QueueClosed,
    /// Write failed; the peer is gone or stalled
    Failed(TransportError),
}

impl TransportExit {
    /// Whether the stream ended because of a transport failure
    pub fn is_failure(&self) -> bool {
        matches!(self, TransportExit::Failed(_))
    }
}

/// Write side of one event stream
pub struct StreamTransport<W> {
    writer: W,
    rx: mpsc::Receiver<Event>,
    cancel: CancellationToken,

    /// Registry entry, for activity tracking only
    stream: Weak<ClientStream>,

    config: TransportConfig,
}

impl<W> StreamTransport<W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// Create a transport for a registered stream
    pub fn new(
        writer: W,
        rx: mpsc::Receiver<Event>,
        cancel: CancellationToken,
        stream: Weak<ClientStream>,
        config: TransportConfig,
    ) -> Self {
        Self {
            writer,
            rx,
            cancel,
            stream,
            config,
        }
    }

    /// Run until cancelled, the queue closes, or a write fails
    ///
    /// Errors are returned as a [`TransportExit`], never propagated.
    pub async fn run(mut self) -> TransportExit {
        let cancel = self.cancel.clone();

        let preamble = frame::encode_preamble(self.config.retry);
        if let Some(exit) = self.send(&cancel, preamble).await {
            return exit;
        }

        let period = self.config.keepalive_interval;
        let mut keepalive = time::interval_at(Instant::now() + period, period);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let frame = tokio::select! {
                biased;
                _ = cancel.cancelled() => return TransportExit::Cancelled,
                event = self.rx.recv() => match event {
                    Some(event) => frame::encode_event(&event),
                    None => return TransportExit::QueueClosed,
                },
                _ = keepalive.tick() => frame::encode_comment("ping"),
            };

            if let Some(exit) = self.send(&cancel, frame).await {
                return exit;
            }
        }
    }

    // Returns the exit reason if the stream must stop
    async fn send(&mut self, cancel: &CancellationToken, frame: Bytes) -> Option<TransportExit> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Some(TransportExit::Cancelled),
            result = self.write(frame) => match result {
                Ok(()) => None,
                Err(e) => Some(TransportExit::Failed(e)),
            },
        }
    }

    async fn write(&mut self, frame: Bytes) -> Result<(), TransportError> {
        let limit = self.config.write_timeout;
        let writer = &mut self.writer;

        let write = async {
            writer.write_all(&frame).await?;
            writer.flush().await
        };

        match time::timeout(limit, write).await {
            Ok(Ok(())) => {
                if let Some(stream) = self.stream.upgrade() {
                    stream.touch();
                }
                Ok(())
            }
            Ok(Err(e)) => Err(TransportError::Io(e)),
            Err(_) => Err(TransportError::WriteTimeout(limit)),
        }
    }
}
