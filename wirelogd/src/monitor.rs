// Activity monitor for WireGuard peers

//! Edge-triggered peer activity tracking
//!
//! WireGuard has no connection state, so a peer is considered active while
//! its latest handshake is younger than the configured timeout. The monitor
//! records the state of every peer it has seen and reports a
//! [`TransitionEvent`] only when that state flips.

use crate::types::{PeerIdentity, PeerSnapshot, PeerState, TransitionEvent};
use std::collections::HashMap;
use std::time::Duration;

/// Tracks the activity state of every peer observed since startup
#[derive(Debug)]
pub struct ActivityMonitor {
    timeout: Duration,
    states: HashMap<PeerIdentity, PeerState>,
}

impl ActivityMonitor {
    /// Create a monitor with an inactivity timeout in seconds
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_secs),
            states: HashMap::new(),
        }
    }

    /// Process one batch of snapshots taken at `now` (Unix seconds).
    ///
    /// Returns the transitions in batch order. Peers never seen before start
    /// out inactive, so an unseen peer that is already timed out is recorded
    /// silently while an unseen peer with a fresh handshake reports `active`.
    /// Peers missing from the batch keep their recorded state.
    pub fn observe(&mut self, batch: &[PeerSnapshot], now: i64) -> Vec<TransitionEvent> {
        let mut events = Vec::new();

        for peer in batch {
            let timed_out = self.is_timed_out(peer.latest_handshake, now);
            let previous = self.states.get(&peer.identity).copied();
            let was_active = previous.is_some_and(|state| state.is_active());

            let transition = match (was_active, timed_out) {
                (true, true) => Some(PeerState::Inactive),
                (false, false) => Some(PeerState::Active),
                // Steady state
                (true, false) | (false, true) => None,
            };

            match transition {
                Some(next) => {
                    self.states.insert(peer.identity.clone(), next);
                    events.push(TransitionEvent {
                        peer: peer.clone(),
                        state: next,
                    });
                }
                None if previous.is_none() => {
                    // First sight of a peer that is already timed out
                    self.states.insert(peer.identity.clone(), PeerState::Inactive);
                }
                None => {}
            }
        }

        events
    }

    /// Elapsed time since the handshake strictly exceeds the timeout.
    /// A handshake stamped in the future never times out.
    fn is_timed_out(&self, latest_handshake: i64, now: i64) -> bool {
        let elapsed = now.saturating_sub(latest_handshake);
        u64::try_from(elapsed).is_ok_and(|secs| secs > self.timeout.as_secs())
    }

    /// Recorded state of a peer, `None` if it was never observed
    pub fn state(&self, identity: &PeerIdentity) -> Option<PeerState> {
        self.states.get(identity).copied()
    }

    /// Number of peers observed since startup
    pub fn tracked(&self) -> usize {
        self.states.len()
    }

    /// Get the inactivity timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}
