//! Initiator (active open / active close) state machine.
//!
//! ```text
//!  INIT ──send SYN──▶ SYN_SENT ──recv SYN+ACK, send ACK──▶ ESTABLISHED
//!                                                              │
//!                                                       send FIN
//!                                                              ▼
//!  CLOSED ◀──recv ACK, recv FIN, send ACK──────────────── FIN_WAIT
//! ```
//!
//! There is no data phase: the FIN follows the handshake directly.  Every
//! checksum failure or unexpected control kind is fatal; there is no retry.

use tokio::io::{AsyncRead, AsyncWrite};

use crate::connection::{ConnError, Connection};
use crate::journal::Journal;
use crate::segment::{
    random_isn, Control, Segment, INITIATOR_FINAL_SEQ, INITIATOR_FIN_ACK, INITIATOR_FIN_SEQ,
};
use crate::socket::SegmentSocket;
use crate::state::ConnectionState;

/// The side that opens and later closes the connection.
pub struct Initiator<S, J> {
    conn: Connection<S, J>,
    /// Our end of the stream, reported in the SYN and FIN.
    local_port: u16,
    /// The responder's listening port.
    remote_port: u16,
    isn: Option<u32>,
}

impl<S, J> Initiator<S, J> {
    pub fn new(socket: SegmentSocket<S>, journal: J, local_port: u16, remote_port: u16) -> Self {
        Self {
            conn: Connection::new(socket, journal, ConnectionState::Init),
            local_port,
            remote_port,
            isn: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.conn.state()
    }

    /// Sequence number carried by our SYN, once sent.
    pub fn initial_seq(&self) -> Option<u32> {
        self.isn
    }

    pub fn journal(&self) -> &J {
        self.conn.journal()
    }
}

impl<S, J> Initiator<S, J>
where
    S: AsyncRead + AsyncWrite + Unpin,
    J: Journal,
{
    /// Run the whole exchange: handshake, then teardown.
    pub async fn run(&mut self) -> Result<(), ConnError> {
        self.open().await?;
        self.close().await
    }

    /// Three-way handshake.
    pub async fn open(&mut self) -> Result<(), ConnError> {
        self.send_syn().await?;
        self.complete_handshake().await
    }

    /// Four-way teardown, initiated from our side.
    pub async fn close(&mut self) -> Result<(), ConnError> {
        self.send_fin().await?;
        self.finish_teardown().await
    }

    /// `INIT → SYN_SENT`.  Returns the chosen initial sequence number.
    pub async fn send_syn(&mut self) -> Result<u32, ConnError> {
        self.conn.require(ConnectionState::Init)?;

        let isn = random_isn();
        let syn = Segment::new_syn(self.local_port, self.remote_port, isn);
        self.conn.transmit(&syn).await?;

        self.isn = Some(isn);
        self.conn.set_state(ConnectionState::SynSent);
        Ok(isn)
    }

    /// `SYN_SENT → ESTABLISHED`: accept the SYN+ACK and acknowledge it.
    pub async fn complete_handshake(&mut self) -> Result<(), ConnError> {
        self.conn.require(ConnectionState::SynSent)?;

        let syn_ack = self.conn.expect(Control::SynAck).await?;
        let ack = Segment::new_ack(
            syn_ack.dst_port,
            self.remote_port,
            random_isn(),
            syn_ack.seq.wrapping_add(1),
        );
        self.conn.transmit(&ack).await?;

        self.conn.set_state(ConnectionState::Established);
        Ok(())
    }

    /// `ESTABLISHED → FIN_WAIT`.
    pub async fn send_fin(&mut self) -> Result<(), ConnError> {
        self.conn.require(ConnectionState::Established)?;

        let fin = Segment::new_fin(
            self.local_port,
            self.remote_port,
            INITIATOR_FIN_SEQ,
            INITIATOR_FIN_ACK,
        );
        self.conn.transmit(&fin).await?;

        self.conn.set_state(ConnectionState::FinWait);
        Ok(())
    }

    /// `FIN_WAIT → CLOSED`: the peer's ACK, then its FIN, then our last ACK.
    pub async fn finish_teardown(&mut self) -> Result<(), ConnError> {
        self.conn.require(ConnectionState::FinWait)?;

        self.conn.expect(Control::Ack).await?;
        let fin = self.conn.expect(Control::Fin).await?;

        let last_ack = Segment::new_ack(
            fin.dst_port,
            self.remote_port,
            INITIATOR_FINAL_SEQ,
            fin.seq.wrapping_add(1),
        );
        self.conn.transmit(&last_ack).await?;

        self.conn.set_state(ConnectionState::Closed);
        Ok(())
    }
}
