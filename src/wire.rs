//! Wire-format definitions for protocol segments and acknowledgments.
//!
//! Every datagram exchanged between peers is one of four shapes:
//!
//! | Shape    | On the wire                                            |
//! |----------|--------------------------------------------------------|
//! | Filename | the raw file name bytes (implicitly sequence 0)        |
//! | Data     | `"<seq> <payload>"` — decimal sequence number, one     |
//! |          | space, then the chunk payload verbatim                 |
//! | End      | the literal control token `"END"`                      |
//! | Ack      | `"ACK <n>"` where `n = -1` means "End segment accepted"|
//!
//! No I/O happens here — this is pure data transformation.  The state
//! machines in [`crate::sender`] and [`crate::receiver`] operate on the typed
//! values defined below, never on raw text.
//!
//! The filename segment carries no tag of its own, so decoding an untagged
//! datagram depends on the receiver's phase: [`Frame::decode`] takes an
//! `awaiting_filename` flag for exactly that reason.

use std::fmt;

use thiserror::Error;

/// The literal control token that terminates a transfer.
pub const END_TOKEN: &[u8] = b"END";

/// Prefix distinguishing acknowledgment messages from segments.
pub const ACK_PREFIX: &[u8] = b"ACK ";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can arise when decoding a raw datagram.
///
/// A decode failure is never fatal: the receiver discards the datagram
/// without acknowledging it, and the sender ignores it and keeps waiting.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    /// The sequence-number field is not a valid integer.
    #[error("sequence-number field is not a valid integer")]
    BadSeqNumber,
    /// The datagram does not match any recognized message shape.
    #[error("datagram does not match any recognized message shape")]
    MalformedSegment,
}

// ---------------------------------------------------------------------------
// Segments (sender side)
// ---------------------------------------------------------------------------

/// The three kinds of segment a sender produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    /// First segment of a transfer; payload is the raw file name.
    Filename,
    /// One chunk of file content.
    Data,
    /// Terminator; carries no payload.
    End,
}

/// A logical segment, immutable once created.
///
/// Owned by the sender until acknowledged: it sits in the send window for
/// possible retransmission and is discarded once covered by a cumulative ACK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Sequence number, assigned once, strictly increasing per sender.
    pub seq: u64,
    pub kind: SegmentKind,
    pub payload: Vec<u8>,
}

impl Segment {
    /// Serialise this segment into the bytes that go on the wire.
    pub fn encode(&self) -> Vec<u8> {
        match self.kind {
            // The filename travels untagged; sequence 0 is implicit.
            SegmentKind::Filename => self.payload.clone(),
            SegmentKind::Data => {
                let mut buf = format!("{} ", self.seq).into_bytes();
                buf.extend_from_slice(&self.payload);
                buf
            }
            SegmentKind::End => END_TOKEN.to_vec(),
        }
    }
}

// ---------------------------------------------------------------------------
// Acknowledgments
// ---------------------------------------------------------------------------

/// A cumulative acknowledgment number.
///
/// `Seq(n)` means "all segments with sequence number ≤ n are correctly
/// received"; `EndOfTransfer` (wire form `-1`) means the End segment has been
/// accepted and the transfer is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckNum {
    Seq(u64),
    EndOfTransfer,
}

impl AckNum {
    /// Serialise into the `"ACK <n>"` wire form.
    pub fn encode(self) -> Vec<u8> {
        format!("ACK {self}").into_bytes()
    }
}

impl fmt::Display for AckNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AckNum::Seq(n) => write!(f, "{n}"),
            AckNum::EndOfTransfer => write!(f, "-1"),
        }
    }
}

// ---------------------------------------------------------------------------
// Frame — the decoded view of one inbound datagram
// ---------------------------------------------------------------------------

/// One decoded inbound datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Raw file name bytes (implicit sequence 0).
    Filename(Vec<u8>),
    /// One data chunk.
    Data { seq: u64, payload: Vec<u8> },
    /// Transfer terminator.
    End,
    /// Acknowledgment from the peer.
    Ack(AckNum),
}

impl Frame {
    /// Parse a raw datagram.
    ///
    /// `awaiting_filename` selects how an untagged datagram is interpreted:
    /// the receiver's first application segment is the bare file name, which
    /// carries no sequence-number prefix.  Once past that phase an untagged
    /// datagram must parse as `"<seq> <payload>"` or it is malformed.
    pub fn decode(buf: &[u8], awaiting_filename: bool) -> Result<Frame, WireError> {
        if buf.is_empty() {
            return Err(WireError::MalformedSegment);
        }
        if buf == END_TOKEN {
            return Ok(Frame::End);
        }
        if let Some(rest) = buf.strip_prefix(ACK_PREFIX) {
            return decode_ack_number(rest).map(Frame::Ack);
        }
        if awaiting_filename {
            return Ok(Frame::Filename(buf.to_vec()));
        }

        // "<seq> <payload>" — the payload may contain arbitrary bytes after
        // the first space.
        let space = buf
            .iter()
            .position(|&b| b == b' ')
            .ok_or(WireError::MalformedSegment)?;
        let seq = parse_decimal(&buf[..space]).ok_or(WireError::BadSeqNumber)?;
        Ok(Frame::Data {
            seq,
            payload: buf[space + 1..].to_vec(),
        })
    }
}

/// Parse the numeric part of an `"ACK <n>"` message.
fn decode_ack_number(buf: &[u8]) -> Result<AckNum, WireError> {
    if buf == b"-1" {
        return Ok(AckNum::EndOfTransfer);
    }
    parse_decimal(buf)
        .map(AckNum::Seq)
        .ok_or(WireError::BadSeqNumber)
}

/// Parse a non-negative decimal integer from raw bytes.
fn parse_decimal(buf: &[u8]) -> Option<u64> {
    std::str::from_utf8(buf).ok()?.parse().ok()
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_encodes_as_raw_name() {
        let seg = Segment {
            seq: 0,
            kind: SegmentKind::Filename,
            payload: b"report.txt".to_vec(),
        };
        assert_eq!(seg.encode(), b"report.txt");
    }

    #[test]
    fn data_encodes_seq_space_payload() {
        let seg = Segment {
            seq: 3,
            kind: SegmentKind::Data,
            payload: b"hello world".to_vec(),
        };
        assert_eq!(seg.encode(), b"3 hello world");
    }

    #[test]
    fn end_encodes_as_literal_token() {
        let seg = Segment {
            seq: 7,
            kind: SegmentKind::End,
            payload: Vec::new(),
        };
        assert_eq!(seg.encode(), b"END");
    }

    #[test]
    fn ack_wire_forms() {
        assert_eq!(AckNum::Seq(12).encode(), b"ACK 12");
        assert_eq!(AckNum::EndOfTransfer.encode(), b"ACK -1");
    }

    #[test]
    fn decode_end_token() {
        assert_eq!(Frame::decode(b"END", false), Ok(Frame::End));
        assert_eq!(Frame::decode(b"END", true), Ok(Frame::End));
    }

    #[test]
    fn decode_ack_and_sentinel() {
        assert_eq!(Frame::decode(b"ACK 5", false), Ok(Frame::Ack(AckNum::Seq(5))));
        assert_eq!(
            Frame::decode(b"ACK -1", false),
            Ok(Frame::Ack(AckNum::EndOfTransfer))
        );
    }

    #[test]
    fn decode_ack_with_garbage_number_fails() {
        assert_eq!(Frame::decode(b"ACK x", false), Err(WireError::BadSeqNumber));
        assert_eq!(Frame::decode(b"ACK -2", false), Err(WireError::BadSeqNumber));
    }

    #[test]
    fn decode_data_segment() {
        assert_eq!(
            Frame::decode(b"4 some bytes", false),
            Ok(Frame::Data {
                seq: 4,
                payload: b"some bytes".to_vec(),
            })
        );
    }

    #[test]
    fn data_payload_keeps_bytes_after_first_space() {
        let Frame::Data { seq, payload } = Frame::decode(b"1 a b c", false).unwrap() else {
            panic!("expected data frame");
        };
        assert_eq!(seq, 1);
        assert_eq!(payload, b"a b c");
    }

    #[test]
    fn decode_empty_data_payload() {
        assert_eq!(
            Frame::decode(b"9 ", false),
            Ok(Frame::Data {
                seq: 9,
                payload: Vec::new(),
            })
        );
    }

    #[test]
    fn untagged_datagram_is_filename_only_in_first_phase() {
        assert_eq!(
            Frame::decode(b"notes.md", true),
            Ok(Frame::Filename(b"notes.md".to_vec()))
        );
        assert_eq!(
            Frame::decode(b"notes.md", false),
            Err(WireError::MalformedSegment)
        );
    }

    #[test]
    fn non_integer_seq_is_rejected() {
        assert_eq!(Frame::decode(b"abc def", false), Err(WireError::BadSeqNumber));
    }

    #[test]
    fn empty_datagram_is_malformed_in_every_phase() {
        assert_eq!(Frame::decode(b"", false), Err(WireError::MalformedSegment));
        assert_eq!(Frame::decode(b"", true), Err(WireError::MalformedSegment));
    }

    #[test]
    fn segment_roundtrips_through_decode() {
        let seg = Segment {
            seq: 2,
            kind: SegmentKind::Data,
            payload: b"defg".to_vec(),
        };
        assert_eq!(
            Frame::decode(&seg.encode(), false),
            Ok(Frame::Data {
                seq: 2,
                payload: b"defg".to_vec(),
            })
        );
    }
}
