//! Connection finite-state machine (FSM) types.
//!
//! One enum covers both roles; each role only ever visits its own subset.
//! Transitions are implemented in [`crate::initiator`] and
//! [`crate::responder`], which keep separate transition logic.
//!
//! ```text
//!  Initiator:  INIT ──SYN──▶ SYN_SENT ──SYN+ACK / ACK──▶ ESTABLISHED
//!                                                           │ FIN
//!              CLOSED ◀──ACK, FIN / ACK── FIN_WAIT ◀────────┘
//!
//!  Responder:  LISTENING ──SYN / SYN+ACK──▶ SYN_RCVD ──ACK──▶ ESTABLISHED
//!                                                                 │ FIN
//!              CLOSED ◀──ACK── FIN_RCVD (ACK, FIN sent) ◀─────────┘
//! ```

use std::fmt;

/// All states either endpoint can occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Initiator before anything was sent.
    #[default]
    Init,
    /// Responder waiting for the SYN.
    Listening,
    /// SYN has been sent; waiting for SYN+ACK.
    SynSent,
    /// SYN received; SYN+ACK sent; waiting for ACK.
    SynReceived,
    /// Three-way handshake complete.
    Established,
    /// Initiator sent FIN; waiting for the peer's ACK and FIN.
    FinWait,
    /// Responder received FIN; ACK and FIN sent, waiting for the final ACK.
    FinReceived,
    /// Terminal state.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionState::Init => "INIT",
            ConnectionState::Listening => "LISTENING",
            ConnectionState::SynSent => "SYN_SENT",
            ConnectionState::SynReceived => "SYN_RCVD",
            ConnectionState::Established => "ESTABLISHED",
            ConnectionState::FinWait => "FIN_WAIT",
            ConnectionState::FinReceived => "FIN_RCVD",
            ConnectionState::Closed => "CLOSED",
        })
    }
}
