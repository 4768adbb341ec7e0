//! Per-connection plumbing shared by both roles.
//!
//! A [`Connection`] owns the segment socket, the journal and the current
//! [`ConnectionState`].  It knows how to put a segment on the wire and record
//! it, and how to take one off the wire, verify its checksum and check its
//! control kind.  Which segments to send, and when, is decided by
//! [`crate::initiator`] and [`crate::responder`].

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::journal::{Direction, Journal};
use crate::segment::{Control, Segment};
use crate::socket::{SegmentSocket, SocketError};
use crate::state::ConnectionState;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors an endpoint can run into.  All of them end the connection except a
/// [`ConnError::Protocol`] seen by the responder while established.
#[derive(Debug, Error)]
pub enum ConnError {
    /// Recomputed checksum over a received segment was not zero.
    #[error("checksum error: recomputed 0x{residue:04X} != 0 (seq={seq}, flags=0x{flags:04X})")]
    Checksum { residue: u16, seq: u32, flags: u16 },

    /// A segment arrived whose flags do not fit the current state.
    #[error("protocol error in {state}: expected {expected}, got flags 0x{got:04X}")]
    Protocol {
        state: ConnectionState,
        expected: Control,
        got: u16,
    },

    /// A step was invoked from a state it does not start from.
    #[error("operation not valid in state {0}")]
    BadState(ConnectionState),

    /// Send or receive failed at the stream boundary.
    #[error("transport error")]
    Transport(#[from] SocketError),
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

pub struct Connection<S, J> {
    socket: SegmentSocket<S>,
    journal: J,
    state: ConnectionState,
}

impl<S, J> Connection<S, J> {
    pub fn new(socket: SegmentSocket<S>, journal: J, state: ConnectionState) -> Self {
        Self {
            socket,
            journal,
            state,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn set_state(&mut self, next: ConnectionState) {
        log::info!("{} -> {}", self.state, next);
        self.state = next;
    }

    /// Fail with [`ConnError::BadState`] unless in `expected`.
    pub fn require(&self, expected: ConnectionState) -> Result<(), ConnError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(ConnError::BadState(self.state))
        }
    }

    pub fn journal(&self) -> &J {
        &self.journal
    }

    pub fn journal_mut(&mut self) -> &mut J {
        &mut self.journal
    }
}

impl<S, J> Connection<S, J>
where
    S: AsyncRead + AsyncWrite + Unpin,
    J: Journal,
{
    /// Write `segment` to the peer, then journal it.
    pub async fn transmit(&mut self, segment: &Segment) -> Result<(), ConnError> {
        self.socket.send(segment).await?;
        log::debug!(
            "→ {} seq={} ack={}",
            describe(segment.flags),
            segment.seq,
            segment.ack
        );
        self.journal.record(Direction::Sent, segment);
        Ok(())
    }

    /// Read the next segment and verify its checksum.
    ///
    /// The segment is not journaled; call [`Connection::accept`] once the
    /// caller has decided to act on it.
    pub async fn receive(&mut self) -> Result<Segment, ConnError> {
        let segment = self.socket.recv().await?;
        let residue = segment.checksum_residue();
        if residue != 0 {
            return Err(ConnError::Checksum {
                residue,
                seq: segment.seq,
                flags: segment.flags,
            });
        }
        log::debug!(
            "← {} seq={} ack={}",
            describe(segment.flags),
            segment.seq,
            segment.ack
        );
        Ok(segment)
    }

    pub fn accept(&mut self, segment: &Segment) {
        self.journal.record(Direction::Received, segment);
    }

    /// Receive one segment that must carry exactly `expected`.
    pub async fn expect(&mut self, expected: Control) -> Result<Segment, ConnError> {
        let segment = self.receive().await?;
        if segment.flags != expected.word() {
            return Err(ConnError::Protocol {
                state: self.state,
                expected,
                got: segment.flags,
            });
        }
        self.accept(&segment);
        Ok(segment)
    }
}

/// Control name for known flags words, hex otherwise.
fn describe(flags: u16) -> String {
    Control::from_word(flags).map_or_else(|| format!("0x{flags:04X}"), |c| c.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::MemoryJournal;
    use crate::segment::SEGMENT_LEN;
    use tokio::io::{AsyncWriteExt, DuplexStream};

    fn pair(
        state: ConnectionState,
    ) -> (
        Connection<DuplexStream, MemoryJournal>,
        SegmentSocket<DuplexStream>,
    ) {
        let (a, b) = tokio::io::duplex(8 * SEGMENT_LEN);
        (
            Connection::new(SegmentSocket::new(a), MemoryJournal::default(), state),
            SegmentSocket::new(b),
        )
    }

    #[tokio::test]
    async fn transmit_journals_sent_segment() {
        let (mut conn, mut peer) = pair(ConnectionState::Init);
        let seg = Segment::new_syn(1, 2, 3);
        conn.transmit(&seg).await.unwrap();

        assert_eq!(peer.recv().await.unwrap(), seg);
        assert_eq!(conn.journal().segments(Direction::Sent), vec![&seg]);
    }

    #[tokio::test]
    async fn expect_accepts_matching_control() {
        let (mut conn, mut peer) = pair(ConnectionState::SynSent);
        let seg = Segment::new_syn_ack(2, 1, 50, 4);
        peer.send(&seg).await.unwrap();

        assert_eq!(conn.expect(Control::SynAck).await.unwrap(), seg);
        assert_eq!(conn.journal().segments(Direction::Received), vec![&seg]);
    }

    #[tokio::test]
    async fn expect_rejects_other_control_without_journaling() {
        let (mut conn, mut peer) = pair(ConnectionState::SynReceived);
        peer.send(&Segment::new_fin(1, 2, 1024, 512)).await.unwrap();

        match conn.expect(Control::Ack).await {
            Err(ConnError::Protocol {
                state,
                expected,
                got,
            }) => {
                assert_eq!(state, ConnectionState::SynReceived);
                assert_eq!(expected, Control::Ack);
                assert_eq!(got, 0x6001);
            }
            other => panic!("expected protocol error, got {other:?}"),
        }
        assert!(conn.journal().entries.is_empty());
    }

    #[tokio::test]
    async fn receive_reports_checksum_residue() {
        let (mut conn, mut peer) = pair(ConnectionState::Listening);
        let seg = Segment::new_syn(1, 2, 3);
        let mut bytes = seg.encode();
        bytes[100] ^= 0x01;
        peer.get_mut().write_all(&bytes).await.unwrap();

        match conn.receive().await {
            Err(ConnError::Checksum { residue, seq, flags }) => {
                assert_ne!(residue, 0);
                assert_eq!(seq, 3);
                assert_eq!(flags, 0x6002);
            }
            other => panic!("expected checksum error, got {other:?}"),
        }
    }

    #[test]
    fn require_reports_current_state() {
        let (a, _b) = tokio::io::duplex(SEGMENT_LEN);
        let conn = Connection::new(
            SegmentSocket::new(a),
            MemoryJournal::default(),
            ConnectionState::Established,
        );
        assert!(conn.require(ConnectionState::Established).is_ok());
        assert!(matches!(
            conn.require(ConnectionState::Init),
            Err(ConnError::BadState(ConnectionState::Established))
        ));
    }

    #[test]
    fn checksum_error_message_names_residue() {
        let err = ConnError::Checksum {
            residue: 0x00ab,
            seq: 7,
            flags: 0x6010,
        };
        assert_eq!(
            err.to_string(),
            "checksum error: recomputed 0x00AB != 0 (seq=7, flags=0x6010)"
        );
    }
}
