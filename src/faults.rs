//! Optional network-emulation decorator for deterministic testing.
//!
//! Real networks drop and delay packets.  To exercise the retransmission
//! machinery without depending on actual network conditions, [`FaultChannel`]
//! wraps any [`DatagramChannel`] and perturbs its **inbound** path: before a
//! datagram is handed to the caller it is independently
//!
//! 1. dropped with probability [`FaultConfig::loss_rate`], or else
//! 2. held for a uniformly random delay up to [`FaultConfig::max_delay`].
//!
//! Protocol logic is never altered — the state machines see exactly what a
//! lossy, slow network would deliver.  The RNG is seedable so failing test
//! runs are reproducible.

use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::socket::{DatagramChannel, SocketError};

/// Configuration for the fault model.
#[derive(Debug, Clone)]
pub struct FaultConfig {
    /// Probability in `[0.0, 1.0]` that an inbound datagram is dropped.
    pub loss_rate: f64,
    /// Upper bound for the random hold applied to delivered datagrams.
    pub max_delay: Duration,
}

impl Default for FaultConfig {
    fn default() -> Self {
        // No faults by default: a transparent pass-through.
        Self {
            loss_rate: 0.0,
            max_delay: Duration::ZERO,
        }
    }
}

/// A fault-injecting decorator around a [`DatagramChannel`].
#[derive(Debug)]
pub struct FaultChannel<C> {
    inner: C,
    config: FaultConfig,
    rng: Mutex<StdRng>,
}

impl<C> FaultChannel<C> {
    /// Wrap `inner` with an entropy-seeded RNG.
    pub fn new(inner: C, config: FaultConfig) -> Self {
        Self {
            inner,
            config,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Wrap `inner` with a fixed seed for reproducible runs.
    pub fn with_seed(inner: C, config: FaultConfig, seed: u64) -> Self {
        Self {
            inner,
            config,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Roll the dice for one inbound datagram: `(drop_it, hold_for)`.
    fn next_fault(&self) -> (bool, Duration) {
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let drop_it = self.config.loss_rate > 0.0 && rng.gen::<f64>() < self.config.loss_rate;
        let hold = if !drop_it && !self.config.max_delay.is_zero() {
            Duration::from_millis(rng.gen_range(0..=self.config.max_delay.as_millis() as u64))
        } else {
            Duration::ZERO
        };
        (drop_it, hold)
    }
}

impl<C: DatagramChannel + Sync> DatagramChannel for FaultChannel<C> {
    async fn recv_from(&self) -> Result<(Vec<u8>, SocketAddr), SocketError> {
        loop {
            let (buf, addr) = self.inner.recv_from().await?;
            let (drop_it, hold) = self.next_fault();
            if drop_it {
                log::debug!("[faults] dropped {}-byte datagram from {addr}", buf.len());
                continue;
            }
            if !hold.is_zero() {
                log::debug!("[faults] holding datagram from {addr} for {hold:?}");
                tokio::time::sleep(hold).await;
            }
            return Ok((buf, addr));
        }
    }

    // Outbound datagrams pass through untouched.
    async fn send_to(&self, buf: &[u8], dest: SocketAddr) -> Result<(), SocketError> {
        self.inner.send_to(buf, dest).await
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
