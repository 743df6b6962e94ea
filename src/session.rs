//! Transfer driver: filename handshake → data streaming → termination.
//!
//! [`FileSender`] paces segments through the send window and drives each one
//! through the per-segment transmission loop: transmit, then suspend on a
//! single wait with two wake sources — an acknowledgment arrives or the
//! retransmission timer fires — whichever occurs first.  Window/base/
//! duplicate-counter state is mutated only by this one control loop, so no
//! synchronization is needed.
//!
//! [`FileReceiver`] runs the single-threaded receive → process → acknowledge
//! loop and returns the assembled file once End is accepted.
//!
//! Abandoning a transfer (dropping the future mid-way) releases the timer
//! and window immediately; the socket is released with its owner.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::receiver::{ReceivedFile, Reply, TransferReceiver, FALLBACK_FILENAME};
use crate::sender::{AckOutcome, SendWindow};
use crate::socket::{DatagramChannel, SocketError};
use crate::timer::{RetransmitTimer, DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT};
use crate::wire::{AckNum, Frame, Segment, SegmentKind};

// ---------------------------------------------------------------------------
// Configuration and errors
// ---------------------------------------------------------------------------

/// Tunables for one transfer.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Maximum number of unacknowledged segments in flight (W).
    pub window_size: usize,
    /// Payload bytes per data segment.
    pub chunk_size: usize,
    /// Fixed retransmission timeout.
    pub retransmit_timeout: Duration,
    /// Retransmissions per segment before the transfer is abandoned.
    pub max_retries: u32,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            window_size: 5,
            chunk_size: 1024,
            retransmit_timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// Errors that end a transfer.
///
/// Receiver-side anomalies (duplicates, reordering, malformed datagrams) are
/// absorbed locally and never appear here; timeouts only surface once the
/// retry budget is exhausted.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Transport-level failure; fatal for this transfer.
    #[error("transport failure: {0}")]
    Socket(#[from] SocketError),
    /// A segment stayed unacknowledged through the whole retry budget.
    #[error("transfer abandoned: segment {seq} unacknowledged after {retries} retransmissions")]
    Abandoned { seq: u64, retries: u32 },
    /// Reading or writing the file failed.
    #[error("storage failure: {0}")]
    Storage(#[from] std::io::Error),
}

/// Session-level phase of an outbound transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderPhase {
    SendingFilename,
    SendingData,
    SendingEnd,
    Done,
}

// ---------------------------------------------------------------------------
// FileSender
// ---------------------------------------------------------------------------

/// Outbound endpoint: streams one file to a peer over a datagram channel.
pub struct FileSender<C> {
    channel: C,
    peer: SocketAddr,
    window: SendWindow,
    config: TransferConfig,
    phase: SenderPhase,
}

impl<C: DatagramChannel> FileSender<C> {
    pub fn new(channel: C, peer: SocketAddr, config: TransferConfig) -> Self {
        Self {
            channel,
            peer,
            window: SendWindow::new(config.window_size),
            config,
            phase: SenderPhase::SendingFilename,
        }
    }

    pub fn phase(&self) -> SenderPhase {
        self.phase
    }

    /// Transfer `contents` to the peer under `name`.
    ///
    /// Sequence: the filename segment (sequence 0) is sent and acknowledged
    /// first, then the content in fixed-size chunks through the sliding
    /// window, then the End segment until the `-1` sentinel is observed.
    pub async fn send_file(&mut self, name: &str, contents: &[u8]) -> Result<(), TransferError> {
        log::info!(
            "[send] transferring \"{name}\" ({} bytes) to {}",
            contents.len(),
            self.peer
        );

        self.phase = SenderPhase::SendingFilename;
        let seg = self.window.admit(SegmentKind::Filename, name.as_bytes().to_vec());
        log::debug!("[send] → FILENAME seq={}", seg.seq);
        self.transmit(&seg).await?;
        self.drive().await?;

        self.phase = SenderPhase::SendingData;
        for chunk in contents.chunks(self.config.chunk_size.max(1)) {
            // Window admission control: suspend segment production until an
            // acknowledgment advances the window (no busy-wait).
            while !self.window.can_admit() {
                self.drive().await?;
            }
            let seg = self.window.admit(SegmentKind::Data, chunk.to_vec());
            log::debug!(
                "[send] → DATA seq={} len={} in_flight={}",
                seg.seq,
                chunk.len(),
                self.window.in_flight()
            );
            self.transmit(&seg).await?;
            self.drive().await?;
        }

        self.phase = SenderPhase::SendingEnd;
        while !self.window.can_admit() {
            self.drive().await?;
        }
        let seg = self.window.admit(SegmentKind::End, Vec::new());
        log::debug!("[send] → END seq={}", seg.seq);
        self.transmit(&seg).await?;
        while self.phase != SenderPhase::Done {
            self.drive().await?;
        }

        log::info!(
            "[send] transfer complete ({} segments)",
            self.window.next_seq()
        );
        Ok(())
    }

    /// Per-segment transmission loop.
    ///
    /// Waits until the window advances (or the End sentinel is accepted),
    /// retransmitting the active segment on timeout and the segment at
    /// `base` on the third duplicate acknowledgment.  Stale and malformed
    /// inbound datagrams are ignored without resetting the timer.
    async fn drive(&mut self) -> Result<(), TransferError> {
        let active = match self.window.newest() {
            Some(seg) => seg.clone(),
            None => return Ok(()),
        };
        let mut timer =
            RetransmitTimer::new(self.config.retransmit_timeout, self.config.max_retries);

        'armed: loop {
            let sleep = tokio::time::sleep(timer.timeout());
            tokio::pin!(sleep);

            loop {
                tokio::select! {
                    result = self.channel.recv_from() => {
                        let (buf, addr) = result?;
                        if addr != self.peer {
                            continue;
                        }
                        let ack = match Frame::decode(&buf, false) {
                            Ok(Frame::Ack(ack)) => ack,
                            // Keep waiting; never fatal.
                            _ => {
                                log::debug!("[send] ignoring unrecognized datagram from {addr}");
                                continue;
                            }
                        };
                        match self.window.on_ack(ack) {
                            AckOutcome::Advanced { newly_acked } => {
                                log::debug!(
                                    "[send] ← ACK {ack} — {newly_acked} segment(s) acked, base={}",
                                    self.window.base()
                                );
                                return Ok(());
                            }
                            AckOutcome::EndAccepted => {
                                log::debug!("[send] ← ACK -1 — End accepted");
                                self.phase = SenderPhase::Done;
                                return Ok(());
                            }
                            AckOutcome::FastRetransmit => {
                                if let Some(seg) = self.window.oldest().cloned() {
                                    log::debug!(
                                        "[send] 3 duplicate ACKs — fast retransmit of seq={}",
                                        seg.seq
                                    );
                                    self.retransmit(&seg).await?;
                                }
                            }
                            AckOutcome::Duplicate => {
                                log::debug!("[send] ← duplicate ACK {ack}");
                            }
                            AckOutcome::Ignored => {
                                log::debug!("[send] ← stale ACK {ack} ignored");
                            }
                        }
                    }
                    _ = &mut sleep => {
                        if !timer.record_retry() {
                            let retries = timer.attempts() - 1;
                            log::warn!(
                                "[send] seq={} unacknowledged after {retries} retransmissions — abandoning",
                                active.seq
                            );
                            return Err(TransferError::Abandoned { seq: active.seq, retries });
                        }
                        log::debug!(
                            "[send] timeout — retransmitting seq={} (retry {})",
                            active.seq,
                            timer.attempts()
                        );
                        self.retransmit(&active).await?;
                        continue 'armed; // rearm the timer for the retransmission
                    }
                }
            }
        }
    }

    async fn transmit(&self, seg: &Segment) -> Result<(), TransferError> {
        self.channel.send_to(&seg.encode(), self.peer).await?;
        Ok(())
    }

    async fn retransmit(&mut self, seg: &Segment) -> Result<(), TransferError> {
        self.channel.send_to(&seg.encode(), self.peer).await?;
        self.window.mark_retransmitted(seg.seq);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FileReceiver
// ---------------------------------------------------------------------------

/// Inbound endpoint: reassembles one file from a datagram channel.
pub struct FileReceiver<C> {
    channel: C,
    state: TransferReceiver,
}

impl<C: DatagramChannel> FileReceiver<C> {
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            state: TransferReceiver::new(),
        }
    }

    /// Run the receive → process → acknowledge loop until an End segment is
    /// accepted, then return the assembled file.
    ///
    /// Acknowledgments are fire-and-forget: a failed ACK send is logged and
    /// the loop keeps going — the sender's retransmission covers the gap.
    pub async fn receive_file(&mut self) -> Result<ReceivedFile, TransferError> {
        loop {
            let (buf, addr) = self.channel.recv_from().await?;
            match self.state.on_datagram(&buf) {
                Reply::Ack { ack, accepted } => {
                    if accepted {
                        log::debug!("[recv] ← segment accepted ({} bytes); → ACK {ack}", buf.len());
                    } else {
                        log::debug!("[recv] ← segment discarded; → ACK {ack} (resync)");
                    }
                    if let Err(e) = self.channel.send_to(&ack.encode(), addr).await {
                        log::warn!("[recv] failed to send ACK {ack}: {e}");
                    }
                }
                Reply::Complete(file) => {
                    let sentinel = AckNum::EndOfTransfer;
                    if let Err(e) = self.channel.send_to(&sentinel.encode(), addr).await {
                        log::warn!("[recv] failed to send ACK {sentinel}: {e}");
                    }
                    log::info!(
                        "[recv] transfer complete: \"{}\" ({} bytes)",
                        file.name,
                        file.contents.len()
                    );
                    return Ok(file);
                }
                Reply::None => {
                    log::debug!("[recv] discarded unrecognized datagram from {addr}");
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Storage collaborator
// ---------------------------------------------------------------------------

/// Write a received file into `dir` under its transmitted name and return
/// the path written.
///
/// Only the final path component of the transmitted name is used, so a
/// hostile filename cannot escape `dir`.
pub async fn persist(file: &ReceivedFile, dir: &Path) -> Result<PathBuf, TransferError> {
    let name = Path::new(&file.name)
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(FALLBACK_FILENAME));
    let path = dir.join(name);
    tokio::fs::write(&path, &file.contents).await?;
    Ok(path)
}
