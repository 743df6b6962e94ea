//! Send-side sliding-window state machine.
//!
//! [`SendWindow`] maintains a bounded window of up to `W` in-flight segments
//! keyed by sequence number.
//!
//! # Protocol contract
//!
//! - Segments occupy `[base, next_seq)`; `base ≤ next_seq ≤ base + W` always.
//! - A new segment may be admitted only while `next_seq < base + W`.
//! - ACKs are **cumulative**: `ACK n` means every segment with sequence
//!   number ≤ `n` has been accepted.  Any valid in-window, non-duplicate ack
//!   advances `base` to `n + 1`.
//! - An ack equal to the last-seen ack number is a duplicate even though it
//!   now lies below `base`; the third consecutive duplicate triggers an
//!   immediate retransmission of the segment at `base` (fast retransmit).
//! - The `-1` sentinel acknowledges the End segment and empties the window.
//!
//! This module only manages state; all socket I/O and timer handling is the
//! transfer driver's responsibility ([`crate::session`]).

use std::collections::VecDeque;
use std::time::Instant;

use crate::wire::{AckNum, Segment, SegmentKind};

/// Number of consecutive identical duplicate acks that triggers a fast
/// retransmission of the segment at `base`.
pub const DUP_ACK_THRESHOLD: u32 = 3;

// ---------------------------------------------------------------------------
// WindowEntry
// ---------------------------------------------------------------------------

/// A single in-flight segment occupying one slot in the send window.
#[derive(Debug, Clone)]
pub struct WindowEntry {
    /// The segment, retained for possible retransmission.
    pub segment: Segment,
    /// Total number of times this segment has been transmitted.
    pub tx_count: u32,
    /// Wall-clock time of the most recent transmission.
    pub sent_at: Instant,
}

// ---------------------------------------------------------------------------
// AckOutcome
// ---------------------------------------------------------------------------

/// What the driver must do after feeding one acknowledgment to the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// A new in-window ack arrived; `base` advanced past `newly_acked`
    /// segment(s).  The driver may admit more segments.
    Advanced { newly_acked: usize },
    /// Same ack number as last time; below the fast-retransmit threshold.
    Duplicate,
    /// Third consecutive duplicate: immediately retransmit the segment at
    /// `base` (available via [`SendWindow::oldest`]).  The counter has been
    /// reset.
    FastRetransmit,
    /// The End sentinel arrived while the End segment was in flight; the
    /// window is now empty and the session is done.
    EndAccepted,
    /// Stale or invalid ack; no state changed.
    Ignored,
}

// ---------------------------------------------------------------------------
// SendWindow
// ---------------------------------------------------------------------------

/// Go-back-N send-side state for one transfer.
///
/// # Sequence-number layout
///
/// ```text
///     base             next_seq
///      │                  │
///  ────┼──────────────────┼──────────────────▶ seq space
///      │ ◀── in flight ──▶│ ◀── admissible ──▶
/// ```
#[derive(Debug)]
pub struct SendWindow {
    /// Sequence number of the oldest unacked segment (left window edge).
    base: u64,
    /// Sequence number assigned to the next admitted segment.
    next_seq: u64,
    /// Maximum number of segments that may be in flight simultaneously (W).
    window_size: usize,
    /// In-flight segments ordered by sequence number (front = oldest).
    window: VecDeque<WindowEntry>,
    /// Most recent non-duplicate ack number seen.
    last_ack: Option<u64>,
    /// Consecutive duplicates of `last_ack`.
    dup_acks: u32,
}

impl SendWindow {
    /// Create an empty window.  `window_size` is the bound W (≥ 1).
    pub fn new(window_size: usize) -> Self {
        assert!(window_size >= 1, "window_size must be at least 1");
        Self {
            base: 0,
            next_seq: 0,
            window_size,
            window: VecDeque::with_capacity(window_size),
            last_ack: None,
            dup_acks: 0,
        }
    }

    /// Left edge of the window: the oldest unacknowledged sequence number.
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Sequence number the next admitted segment will receive.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Number of segments currently awaiting acknowledgment.
    pub fn in_flight(&self) -> usize {
        self.window.len()
    }

    /// `true` when there is room for at least one more in-flight segment.
    pub fn can_admit(&self) -> bool {
        self.next_seq < self.base + self.window_size as u64
    }

    /// `true` when at least one segment is awaiting acknowledgment.
    pub fn has_unacked(&self) -> bool {
        !self.window.is_empty()
    }

    /// Admit a new segment: assign it the next sequence number, place it in
    /// the window, and return a copy ready to hand to the socket.
    ///
    /// # Panics
    ///
    /// Panics in debug mode if the window is full.  Check [`can_admit`]
    /// before calling.
    ///
    /// [`can_admit`]: SendWindow::can_admit
    pub fn admit(&mut self, kind: SegmentKind, payload: Vec<u8>) -> Segment {
        debug_assert!(
            self.can_admit(),
            "admit called on a full send window ({} / {})",
            self.window.len(),
            self.window_size
        );
        let segment = Segment {
            seq: self.next_seq,
            kind,
            payload,
        };
        self.window.push_back(WindowEntry {
            segment: segment.clone(),
            tx_count: 1,
            sent_at: Instant::now(),
        });
        self.next_seq += 1;
        segment
    }

    /// Process one acknowledgment and report what the driver must do next.
    pub fn on_ack(&mut self, ack: AckNum) -> AckOutcome {
        match ack {
            AckNum::EndOfTransfer => {
                // The sentinel is only meaningful while the End segment is
                // actually in flight; otherwise it is stale.
                let end_in_flight = self
                    .window
                    .iter()
                    .any(|e| e.segment.kind == SegmentKind::End);
                if !end_in_flight {
                    return AckOutcome::Ignored;
                }
                self.base = self.next_seq;
                self.window.clear();
                self.dup_acks = 0;
                AckOutcome::EndAccepted
            }
            AckNum::Seq(n) => {
                if self.last_ack == Some(n) {
                    // Tie-break rule: a repeat of the last-seen ack counts as
                    // a duplicate even though base has advanced past it.
                    self.dup_acks += 1;
                    if self.dup_acks >= DUP_ACK_THRESHOLD {
                        self.dup_acks = 0;
                        return AckOutcome::FastRetransmit;
                    }
                    return AckOutcome::Duplicate;
                }
                if n < self.base || n >= self.next_seq {
                    return AckOutcome::Ignored;
                }

                let mut newly_acked = 0usize;
                while let Some(front) = self.window.front() {
                    if front.segment.seq > n {
                        break;
                    }
                    self.window.pop_front();
                    newly_acked += 1;
                }
                self.base = n + 1;
                self.last_ack = Some(n);
                self.dup_acks = 0;
                AckOutcome::Advanced { newly_acked }
            }
        }
    }

    /// The segment at `base` — the fast-retransmit target.
    pub fn oldest(&self) -> Option<&Segment> {
        self.window.front().map(|e| &e.segment)
    }

    /// The most recently admitted in-flight segment — the segment the driver
    /// is actively retrying on timeout.
    pub fn newest(&self) -> Option<&Segment> {
        self.window.back().map(|e| &e.segment)
    }

    /// Record a retransmission of the in-flight segment `seq`.
    pub fn mark_retransmitted(&mut self, seq: u64) {
        if let Some(entry) = self.window.iter_mut().find(|e| e.segment.seq == seq) {
            entry.tx_count += 1;
            entry.sent_at = Instant::now();
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state() {
        let w = SendWindow::new(5);
        assert_eq!(w.base(), 0);
        assert_eq!(w.next_seq(), 0);
        assert!(w.can_admit());
        assert!(!w.has_unacked());
    }

    #[test]
    fn admit_assigns_increasing_sequence_numbers() {
        let mut w = SendWindow::new(5);
        let fname = w.admit(SegmentKind::Filename, b"f.txt".to_vec());
        let d1 = w.admit(SegmentKind::Data, b"abc".to_vec());
        let d2 = w.admit(SegmentKind::Data, b"defg".to_vec());

        assert_eq!(fname.seq, 0);
        assert_eq!(d1.seq, 1);
        assert_eq!(d2.seq, 2);
        assert_eq!(w.in_flight(), 3);
    }

    #[test]
    fn window_bound_blocks_admission() {
        let mut w = SendWindow::new(2);
        w.admit(SegmentKind::Data, vec![0]);
        w.admit(SegmentKind::Data, vec![1]);
        assert!(!w.can_admit());
        assert!(w.next_seq() - w.base() <= 2);
    }

    #[test]
    fn in_window_ack_advances_base_past_it() {
        let mut w = SendWindow::new(5);
        for i in 0..3u8 {
            w.admit(SegmentKind::Data, vec![i]);
        }

        // Cumulative: ack 1 covers segments 0 and 1 at once.
        assert_eq!(w.on_ack(AckNum::Seq(1)), AckOutcome::Advanced { newly_acked: 2 });
        assert_eq!(w.base(), 2);
        assert_eq!(w.in_flight(), 1);
    }

    #[test]
    fn out_of_window_ack_is_ignored() {
        let mut w = SendWindow::new(5);
        w.admit(SegmentKind::Data, vec![0]);

        assert_eq!(w.on_ack(AckNum::Seq(40)), AckOutcome::Ignored);
        assert_eq!(w.base(), 0);
        assert_eq!(w.in_flight(), 1);
    }

    #[test]
    fn third_duplicate_triggers_fast_retransmit() {
        let mut w = SendWindow::new(5);
        w.admit(SegmentKind::Data, vec![0]); // seq 0
        w.admit(SegmentKind::Data, vec![1]); // seq 1
        assert_eq!(w.on_ack(AckNum::Seq(0)), AckOutcome::Advanced { newly_acked: 1 });

        // Receiver keeps re-acking 0 because segment 1 was lost.
        assert_eq!(w.on_ack(AckNum::Seq(0)), AckOutcome::Duplicate);
        assert_eq!(w.on_ack(AckNum::Seq(0)), AckOutcome::Duplicate);
        assert_eq!(w.on_ack(AckNum::Seq(0)), AckOutcome::FastRetransmit);
        assert_eq!(w.oldest().unwrap().seq, 1);

        // Counter was reset: the count starts over.
        assert_eq!(w.on_ack(AckNum::Seq(0)), AckOutcome::Duplicate);
    }

    #[test]
    fn advance_resets_duplicate_counter() {
        let mut w = SendWindow::new(5);
        w.admit(SegmentKind::Data, vec![0]);
        w.admit(SegmentKind::Data, vec![1]);
        w.admit(SegmentKind::Data, vec![2]);
        w.on_ack(AckNum::Seq(0));

        assert_eq!(w.on_ack(AckNum::Seq(0)), AckOutcome::Duplicate);
        assert_eq!(w.on_ack(AckNum::Seq(0)), AckOutcome::Duplicate);
        // Segment 1 finally got through; the window advances.
        assert_eq!(w.on_ack(AckNum::Seq(1)), AckOutcome::Advanced { newly_acked: 1 });
        // Two more repeats of the new ack stay below the threshold.
        assert_eq!(w.on_ack(AckNum::Seq(1)), AckOutcome::Duplicate);
        assert_eq!(w.on_ack(AckNum::Seq(1)), AckOutcome::Duplicate);
    }

    #[test]
    fn end_sentinel_empties_window() {
        let mut w = SendWindow::new(5);
        w.admit(SegmentKind::Filename, b"f".to_vec());
        w.on_ack(AckNum::Seq(0));
        w.admit(SegmentKind::End, Vec::new());

        assert_eq!(w.on_ack(AckNum::EndOfTransfer), AckOutcome::EndAccepted);
        assert!(!w.has_unacked());
        assert_eq!(w.base(), w.next_seq());
    }

    #[test]
    fn stale_end_sentinel_is_ignored() {
        let mut w = SendWindow::new(5);
        w.admit(SegmentKind::Data, vec![0]);
        assert_eq!(w.on_ack(AckNum::EndOfTransfer), AckOutcome::Ignored);
        assert_eq!(w.in_flight(), 1);
    }

    #[test]
    fn mark_retransmitted_bumps_tx_count() {
        let mut w = SendWindow::new(5);
        let seg = w.admit(SegmentKind::Data, vec![0]);
        w.mark_retransmitted(seg.seq);
        assert_eq!(w.window.front().unwrap().tx_count, 2);
    }

    #[test]
    fn window_invariant_holds_across_a_transfer() {
        let mut w = SendWindow::new(3);
        let mut next_ack = 0u64;
        for _ in 0..10 {
            while w.can_admit() {
                w.admit(SegmentKind::Data, vec![0]);
                assert!(w.next_seq() - w.base() <= 3);
            }
            w.on_ack(AckNum::Seq(next_ack));
            next_ack += 1;
            assert!(w.base() <= w.next_seq());
        }
    }
}
