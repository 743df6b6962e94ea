//! Async UDP datagram channel abstraction.
//!
//! [`DatagramChannel`] is the narrow interface the protocol core calls
//! through: send/receive of opaque byte messages to/from a peer address,
//! unreliable, unordered, possibly duplicating.  [`RudpSocket`] is the real
//! implementation — a thin wrapper around `tokio::net::UdpSocket` — and
//! [`crate::faults::FaultChannel`] is a test-only decorator over any channel.
//!
//! All protocol logic lives elsewhere; this module owns only byte I/O.

use std::future::Future;
use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::UdpSocket;

/// Maximum UDP payload size (theoretical limit; in practice kept much smaller).
const MAX_DATAGRAM: usize = 65_535;

/// Errors that can arise from channel operations.
///
/// Transport failures are fatal for the transfer; the driver surfaces them
/// to the caller.
#[derive(Debug, Error)]
pub enum SocketError {
    /// Underlying I/O error from the OS.
    #[error("socket I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// DatagramChannel
// ---------------------------------------------------------------------------

/// An unreliable datagram transport, consumed (never implemented) by the
/// protocol state machines.
pub trait DatagramChannel {
    /// Receive the next datagram: `(bytes, sender_address)`.
    fn recv_from(
        &self,
    ) -> impl Future<Output = Result<(Vec<u8>, SocketAddr), SocketError>> + Send;

    /// Send one datagram to `dest`.
    fn send_to(
        &self,
        buf: &[u8],
        dest: SocketAddr,
    ) -> impl Future<Output = Result<(), SocketError>> + Send;
}

// ---------------------------------------------------------------------------
// RudpSocket
// ---------------------------------------------------------------------------

/// An async, datagram-oriented UDP socket.
///
/// All methods are `&self` so the socket can be shared across tasks if needed.
#[derive(Debug)]
pub struct RudpSocket {
    /// Address this socket is bound to (filled in after the OS assigns an
    /// ephemeral port).
    pub local_addr: SocketAddr,
    inner: UdpSocket,
}

impl RudpSocket {
    /// Bind a new socket to `local_addr`.
    ///
    /// Passing `0.0.0.0:0` lets the OS choose an ephemeral port — the sender
    /// side does exactly that, while the receiver binds its fixed port.
    pub async fn bind(local_addr: SocketAddr) -> Result<Self, SocketError> {
        let inner = UdpSocket::bind(local_addr).await?;
        let local_addr = inner.local_addr()?;
        Ok(Self { local_addr, inner })
    }
}

impl DatagramChannel for RudpSocket {
    async fn recv_from(&self) -> Result<(Vec<u8>, SocketAddr), SocketError> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        let (n, addr) = self.inner.recv_from(&mut buf).await?;
        buf.truncate(n);
        Ok((buf, addr))
    }

    async fn send_to(&self, buf: &[u8], dest: SocketAddr) -> Result<(), SocketError> {
        self.inner.send_to(buf, dest).await?;
        Ok(())
    }
}
