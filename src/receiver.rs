//! Receive-side in-order delivery and acknowledgment state machine.
//!
//! [`TransferReceiver`] consumes raw inbound datagrams in arrival order and
//! enforces go-back-N semantics:
//!
//! - Only the **next expected** sequence number is accepted; its payload is
//!   buffered and the new number is acknowledged.
//! - Everything else — duplicates, future segments, reordered segments — is
//!   discarded and the last in-order number is re-acknowledged, telling the
//!   sender to resynchronize.  Out-of-order payload is never buffered.
//! - Malformed datagrams are discarded without any acknowledgment.
//! - An End segment acknowledges the `-1` sentinel, assembles the buffered
//!   payloads into the output file, and moves to `Complete`.
//!
//! This module only manages state; all socket I/O is the transfer driver's
//! responsibility ([`crate::session`]), and writing the assembled file to
//! disk belongs to the storage collaborator.

use std::collections::BTreeMap;

use crate::wire::{AckNum, Frame};

/// Output name used when End arrives before any filename segment.
pub const FALLBACK_FILENAME: &str = "received_file-copy";

/// Phases of one inbound transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing received yet; the next untagged datagram is the file name.
    AwaitingFilename,
    /// Filename recorded; accepting data segments in strict order.
    ReceivingData,
    /// End accepted and the file emitted; only re-acks happen from here.
    Complete,
}

/// The assembled output of a completed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFile {
    /// Name carried by the filename segment, or [`FALLBACK_FILENAME`].
    pub name: String,
    /// The full ordered byte stream.
    pub contents: Vec<u8>,
}

/// What the driver must do after one datagram has been processed.
#[derive(Debug, PartialEq, Eq)]
pub enum Reply {
    /// Send this acknowledgment back to the peer (fire-and-forget).
    /// `accepted` is false for the re-ack of a discarded segment.
    Ack { ack: AckNum, accepted: bool },
    /// End was accepted: send the sentinel ack and emit the file.  Happens
    /// exactly once per transfer.
    Complete(ReceivedFile),
    /// Nothing to send (malformed or ignorable datagram).
    None,
}

// ---------------------------------------------------------------------------
// TransferReceiver
// ---------------------------------------------------------------------------

/// Go-back-N receive-side state for one transfer.
#[derive(Debug)]
pub struct TransferReceiver {
    phase: Phase,
    /// Next sequence number accepted in order.
    expected_seq: u64,
    /// Recorded file name, also kept raw so a retransmitted filename
    /// segment (which carries no tag) can be recognized by value.
    filename: Option<String>,
    filename_bytes: Vec<u8>,
    /// Payloads accepted so far, keyed by sequence number.  Holds exactly
    /// one entry for every number in `[1, expected_seq)` while receiving.
    buffer: BTreeMap<u64, Vec<u8>>,
}

impl Default for TransferReceiver {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferReceiver {
    pub fn new() -> Self {
        Self {
            phase: Phase::AwaitingFilename,
            expected_seq: 0,
            filename: None,
            filename_bytes: Vec::new(),
            buffer: BTreeMap::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The last in-order sequence number, i.e. what a re-ack carries.
    fn last_in_order(&self) -> AckNum {
        AckNum::Seq(self.expected_seq - 1)
    }

    /// Process one raw inbound datagram and report the acknowledgment (if
    /// any) the driver must send.
    ///
    /// Never fails: every receiver-side anomaly is absorbed locally and only
    /// the acknowledgment content changes.
    pub fn on_datagram(&mut self, buf: &[u8]) -> Reply {
        // A retransmitted filename segment is untagged; recognize it by
        // value before attempting to parse it as a data segment.
        if self.phase == Phase::ReceivingData && !self.filename_bytes.is_empty()
            && buf == self.filename_bytes
        {
            return Reply::Ack {
                ack: self.last_in_order(),
                accepted: false,
            };
        }

        let frame = match Frame::decode(buf, self.phase == Phase::AwaitingFilename) {
            Ok(frame) => frame,
            // Discard, do not acknowledge.
            Err(_) => return Reply::None,
        };

        match (self.phase, frame) {
            (Phase::AwaitingFilename, Frame::Filename(bytes)) => {
                self.filename = Some(String::from_utf8_lossy(&bytes).into_owned());
                self.filename_bytes = bytes;
                self.expected_seq = 1;
                self.phase = Phase::ReceivingData;
                Reply::Ack {
                    ack: AckNum::Seq(0),
                    accepted: true,
                }
            }
            // End with no filename ever seen: emit an empty file under the
            // fallback name.
            (Phase::AwaitingFilename, Frame::End) => Reply::Complete(self.complete()),
            (Phase::ReceivingData, Frame::Data { seq, payload }) => {
                if seq == self.expected_seq {
                    self.buffer.insert(seq, payload);
                    self.expected_seq += 1;
                    Reply::Ack {
                        ack: self.last_in_order(),
                        accepted: true,
                    }
                } else {
                    Reply::Ack {
                        ack: self.last_in_order(),
                        accepted: false,
                    }
                }
            }
            (Phase::ReceivingData, Frame::End) => Reply::Complete(self.complete()),
            // A retransmitted End after completion: re-ack the sentinel but
            // never emit the file twice.
            (Phase::Complete, Frame::End) => Reply::Ack {
                ack: AckNum::EndOfTransfer,
                accepted: false,
            },
            // Stray acks or anything else out of phase.
            _ => Reply::None,
        }
    }

    /// Assemble the output file and transition to `Complete`, draining the
    /// receive buffer.
    fn complete(&mut self) -> ReceivedFile {
        self.phase = Phase::Complete;
        let contents: Vec<u8> = std::mem::take(&mut self.buffer)
            .into_values()
            .flatten()
            .collect();
        ReceivedFile {
            name: self
                .filename
                .take()
                .unwrap_or_else(|| FALLBACK_FILENAME.to_string()),
            contents,
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{Segment, SegmentKind};

    fn data(seq: u64, payload: &[u8]) -> Vec<u8> {
        Segment {
            seq,
            kind: SegmentKind::Data,
            payload: payload.to_vec(),
        }
        .encode()
    }

    fn accepted_ack(n: u64) -> Reply {
        Reply::Ack {
            ack: AckNum::Seq(n),
            accepted: true,
        }
    }

    fn reack(n: u64) -> Reply {
        Reply::Ack {
            ack: AckNum::Seq(n),
            accepted: false,
        }
    }

    #[test]
    fn filename_then_ordered_data_then_end() {
        let mut r = TransferReceiver::new();

        assert_eq!(r.on_datagram(b"f.txt"), accepted_ack(0));
        assert_eq!(r.phase(), Phase::ReceivingData);

        assert_eq!(r.on_datagram(&data(1, b"abc")), accepted_ack(1));
        assert_eq!(r.on_datagram(&data(2, b"defg")), accepted_ack(2));
        assert_eq!(r.on_datagram(&data(3, b"hi")), accepted_ack(3));

        let Reply::Complete(file) = r.on_datagram(b"END") else {
            panic!("END must complete the transfer");
        };
        assert_eq!(file.name, "f.txt");
        assert_eq!(file.contents, b"abcdefghi");
        assert_eq!(r.phase(), Phase::Complete);
    }

    #[test]
    fn out_of_order_segment_is_discarded_and_reacked() {
        let mut r = TransferReceiver::new();
        r.on_datagram(b"f.txt");
        r.on_datagram(&data(1, b"abc"));

        // Segment 2 was lost; 3 arrives early and must be discarded.
        assert_eq!(r.on_datagram(&data(3, b"hi")), reack(1));
        assert_eq!(r.on_datagram(&data(3, b"hi")), reack(1));

        // 2 finally arrives, then 3 again: no gap, no duplication.
        assert_eq!(r.on_datagram(&data(2, b"defg")), accepted_ack(2));
        assert_eq!(r.on_datagram(&data(3, b"hi")), accepted_ack(3));

        let Reply::Complete(file) = r.on_datagram(b"END") else {
            panic!("END must complete the transfer");
        };
        assert_eq!(file.contents, b"abcdefghi");
    }

    #[test]
    fn redelivered_segment_is_idempotent() {
        let mut r = TransferReceiver::new();
        r.on_datagram(b"f.txt");
        r.on_datagram(&data(1, b"abc"));

        // Same segment again: state unchanged, same ack re-emitted.
        assert_eq!(r.on_datagram(&data(1, b"abc")), reack(1));
        assert_eq!(r.on_datagram(&data(1, b"abc")), reack(1));

        assert_eq!(r.on_datagram(&data(2, b"x")), accepted_ack(2));
        let Reply::Complete(file) = r.on_datagram(b"END") else {
            panic!("END must complete the transfer");
        };
        assert_eq!(file.contents, b"abcx");
    }

    #[test]
    fn redelivered_filename_is_reacked_not_misparsed() {
        let mut r = TransferReceiver::new();
        r.on_datagram(b"notes.md");

        // The filename ack was lost; the sender retransmits the untagged
        // name.  It must be recognized and re-acked, not treated as data.
        assert_eq!(r.on_datagram(b"notes.md"), reack(0));
        assert_eq!(r.on_datagram(&data(1, b"abc")), accepted_ack(1));
    }

    #[test]
    fn malformed_datagram_gets_no_ack() {
        let mut r = TransferReceiver::new();
        r.on_datagram(b"f.txt");

        assert_eq!(r.on_datagram(b"garbage without seq"), Reply::None);
        assert_eq!(r.on_datagram(b""), Reply::None);
        // State untouched.
        assert_eq!(r.on_datagram(&data(1, b"abc")), accepted_ack(1));
    }

    #[test]
    fn end_before_filename_uses_fallback_name() {
        let mut r = TransferReceiver::new();
        let Reply::Complete(file) = r.on_datagram(b"END") else {
            panic!("END must complete the transfer");
        };
        assert_eq!(file.name, FALLBACK_FILENAME);
        assert!(file.contents.is_empty());
    }

    #[test]
    fn retransmitted_end_is_reacked_without_second_file() {
        let mut r = TransferReceiver::new();
        r.on_datagram(b"f.txt");
        r.on_datagram(&data(1, b"abc"));
        assert!(matches!(r.on_datagram(b"END"), Reply::Complete(_)));

        // The sentinel ack was lost; the sender retransmits END.
        assert_eq!(
            r.on_datagram(b"END"),
            Reply::Ack {
                ack: AckNum::EndOfTransfer,
                accepted: false,
            }
        );
    }

    #[test]
    fn empty_file_transfer() {
        let mut r = TransferReceiver::new();
        assert_eq!(r.on_datagram(b"empty.bin"), accepted_ack(0));
        let Reply::Complete(file) = r.on_datagram(b"END") else {
            panic!("END must complete the transfer");
        };
        assert_eq!(file.name, "empty.bin");
        assert!(file.contents.is_empty());
    }

    #[test]
    fn stray_ack_is_ignored() {
        let mut r = TransferReceiver::new();
        r.on_datagram(b"f.txt");
        assert_eq!(r.on_datagram(b"ACK 0"), Reply::None);
    }
}
