//! Responder (passive open / passive close) state machine.
//!
//! ```text
//!  LISTENING ──recv SYN, send SYN+ACK──▶ SYN_RCVD ──recv ACK──▶ ESTABLISHED
//!                                                                   │
//!                                                recv FIN, send ACK, send FIN
//!                                                                   ▼
//!  CLOSED ◀──recv ACK──────────────────────────────────────────── FIN_RCVD
//! ```
//!
//! Checksum failures are always fatal.  A wrong control kind is fatal during
//! the handshake and the final ACK; while established, anything other than a
//! FIN is reported to the journal and discarded.

use tokio::io::{AsyncRead, AsyncWrite};

use crate::connection::{ConnError, Connection};
use crate::journal::{Journal, CLOSED_NOTE, ESTABLISHED_NOTE};
use crate::segment::{random_isn, Control, Segment, RESPONDER_TEARDOWN_SEQ};
use crate::socket::SegmentSocket;
use crate::state::ConnectionState;

/// The side that accepts the connection and answers the teardown.
pub struct Responder<S, J> {
    conn: Connection<S, J>,
    /// Port we listen on; sent as the source port of every reply.
    local_port: u16,
    /// Source port taken from the peer's SYN.
    peer_port: Option<u16>,
    isn: Option<u32>,
}

impl<S, J> Responder<S, J> {
    /// Wrap an already-accepted stream.  Starts in `LISTENING`.
    pub fn new(socket: SegmentSocket<S>, journal: J, local_port: u16) -> Self {
        Self {
            conn: Connection::new(socket, journal, ConnectionState::Listening),
            local_port,
            peer_port: None,
            isn: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.conn.state()
    }

    /// Sequence number carried by our SYN+ACK, once sent.
    pub fn initial_seq(&self) -> Option<u32> {
        self.isn
    }

    pub fn peer_port(&self) -> Option<u16> {
        self.peer_port
    }

    pub fn journal(&self) -> &J {
        self.conn.journal()
    }
}

impl<S, J> Responder<S, J>
where
    S: AsyncRead + AsyncWrite + Unpin,
    J: Journal,
{
    /// Serve one connection from SYN to the final ACK.
    pub async fn run(&mut self) -> Result<(), ConnError> {
        self.accept_syn().await?;
        self.confirm_established().await?;
        self.serve().await
    }

    /// `LISTENING → SYN_RCVD`.  Returns our initial sequence number.
    pub async fn accept_syn(&mut self) -> Result<u32, ConnError> {
        self.conn.require(ConnectionState::Listening)?;

        let syn = self.conn.expect(Control::Syn).await?;
        let isn = random_isn();
        let syn_ack = Segment::new_syn_ack(
            self.local_port,
            syn.src_port,
            isn,
            syn.seq.wrapping_add(1),
        );
        self.conn.transmit(&syn_ack).await?;

        self.peer_port = Some(syn.src_port);
        self.isn = Some(isn);
        self.conn.set_state(ConnectionState::SynReceived);
        Ok(isn)
    }

    /// `SYN_RCVD → ESTABLISHED` on the handshake's closing ACK.
    pub async fn confirm_established(&mut self) -> Result<(), ConnError> {
        self.conn.require(ConnectionState::SynReceived)?;

        self.conn.expect(Control::Ack).await?;
        self.conn.journal_mut().note(ESTABLISHED_NOTE);
        log::info!("connection established with port {:?}", self.peer_port);

        self.conn.set_state(ConnectionState::Established);
        Ok(())
    }

    /// Wait for the peer's FIN, answer with ACK then FIN, and take the final
    /// ACK.  Ends in `CLOSED`.
    pub async fn serve(&mut self) -> Result<(), ConnError> {
        self.conn.require(ConnectionState::Established)?;

        let fin = loop {
            let segment = self.conn.receive().await?;
            if segment.control() == Some(Control::Fin) {
                self.conn.accept(&segment);
                break segment;
            }
            let err = ConnError::Protocol {
                state: self.conn.state(),
                expected: Control::Fin,
                got: segment.flags,
            };
            let report = format!("Error: {err}; segment discarded");
            log::warn!("{report}");
            self.conn.journal_mut().note(&report);
        };
        self.conn.set_state(ConnectionState::FinReceived);

        let ack = Segment::new_ack(
            self.local_port,
            fin.src_port,
            RESPONDER_TEARDOWN_SEQ,
            fin.seq.wrapping_add(1),
        );
        self.conn.transmit(&ack).await?;
        self.conn.transmit(&ack.with_control(Control::Fin)).await?;

        self.conn.expect(Control::Ack).await?;
        self.conn.journal_mut().note(CLOSED_NOTE);
        log::info!("connection closed");

        self.conn.set_state(ConnectionState::Closed);
        Ok(())
    }
}
