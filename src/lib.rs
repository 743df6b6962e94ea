//! `rudp-transfer` — reliable file transfer over an unreliable datagram
//! transport.
//!
//! A sender and a receiver cooperate to move one file end-to-end despite
//! packet loss, reordering, and delay, using sequence numbers, cumulative
//! acknowledgments, a bounded send window, and timeout/duplicate-ack driven
//! retransmission (go-back-N ARQ).
//!
//! # Architecture
//!
//! ```text
//!  ┌────────────┐   segments    ┌──────────────┐
//!  │ FileSender │──────────────▶│ FileReceiver │
//!  └─────┬──────┘               └──────┬───────┘
//!        │            ACKs             │
//!        │◀─────────────────────────────
//!        │
//!  ┌─────▼─────────────────────────────┐
//!  │            session                │
//!  │ (transfer driver: window pacing,  │
//!  │  retransmit timers, termination)  │
//!  └─────┬─────────────────────────────┘
//!        │ raw UDP datagrams
//!  ┌─────▼──────┐
//!  │ RudpSocket │ (thin async wrapper around tokio UdpSocket)
//!  └────────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`wire`]     — wire format (encode / decode segments and ACKs)
//! - [`sender`]   — outbound sliding-window state machine
//! - [`receiver`] — inbound in-order delivery / acknowledgment state machine
//! - [`session`]  — transfer driver: filename handshake → data → termination
//! - [`timer`]    — retransmission timer bookkeeping
//! - [`socket`]   — async UDP datagram channel abstraction
//! - [`faults`]   — optional lossy/delaying inbound decorator for testing

pub mod faults;
pub mod receiver;
pub mod sender;
pub mod session;
pub mod socket;
pub mod timer;
pub mod wire;
