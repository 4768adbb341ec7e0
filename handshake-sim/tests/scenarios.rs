//! Scripted-peer scenarios over in-memory pipes.
//!
//! One side is a real state machine; the other is the test, writing and
//! reading segments by hand so it can send corrupted or out-of-place ones.
//! The pipe buffers several segments, so the test can drive both sides from
//! a single task.

use tokio::io::{AsyncWriteExt, DuplexStream};

use tcp_handshake_sim::{
    initiator::Initiator,
    journal::{Direction, MemoryJournal, CLOSED_NOTE, ESTABLISHED_NOTE},
    responder::Responder,
    segment::SEGMENT_LEN,
    socket::{SegmentSocket, SocketError},
    ConnError, ConnectionState, Control, Segment,
};

const RESPONDER_PORT: u16 = 9000;
const INITIATOR_PORT: u16 = 41_000;

fn pipe() -> (SegmentSocket<DuplexStream>, SegmentSocket<DuplexStream>) {
    let (a, b) = tokio::io::duplex(16 * SEGMENT_LEN);
    (SegmentSocket::new(a), SegmentSocket::new(b))
}

fn responder() -> (Responder<DuplexStream, MemoryJournal>, SegmentSocket<DuplexStream>) {
    let (a, peer) = pipe();
    (Responder::new(a, MemoryJournal::default(), RESPONDER_PORT), peer)
}

fn initiator() -> (Initiator<DuplexStream, MemoryJournal>, SegmentSocket<DuplexStream>) {
    let (a, peer) = pipe();
    (
        Initiator::new(a, MemoryJournal::default(), INITIATOR_PORT, RESPONDER_PORT),
        peer,
    )
}

/// Encode `segment` and flip one payload bit so the checksum no longer holds.
fn corrupted(segment: &Segment) -> Vec<u8> {
    let mut bytes = segment.encode();
    bytes[500] ^= 0x04;
    bytes
}

/// After the endpoint is gone, the peer must find nothing left to read.
async fn assert_nothing_sent(peer: &mut SegmentSocket<DuplexStream>) {
    match peer.recv().await {
        Err(SocketError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof),
        other => panic!("expected no further segment, got {other:?}"),
    }
}

/// Drive a responder through the handshake; returns its SYN+ACK.
async fn establish(
    resp: &mut Responder<DuplexStream, MemoryJournal>,
    peer: &mut SegmentSocket<DuplexStream>,
) -> Segment {
    peer.send(&Segment::new_syn(INITIATOR_PORT, RESPONDER_PORT, 300))
        .await
        .unwrap();
    resp.accept_syn().await.unwrap();
    let syn_ack = peer.recv().await.unwrap();
    peer.send(&Segment::new_ack(
        INITIATOR_PORT,
        RESPONDER_PORT,
        301,
        syn_ack.seq + 1,
    ))
    .await
    .unwrap();
    resp.confirm_established().await.unwrap();
    syn_ack
}

// ---------------------------------------------------------------------------
// Both machines against each other
// ---------------------------------------------------------------------------

#[tokio::test]
async fn initiator_and_responder_over_pipe() {
    let (a, b) = pipe();
    let mut init = Initiator::new(a, MemoryJournal::default(), INITIATOR_PORT, RESPONDER_PORT);
    let mut resp = Responder::new(b, MemoryJournal::default(), RESPONDER_PORT);

    let (opened, accepted) = tokio::join!(init.open(), async {
        resp.accept_syn().await?;
        resp.confirm_established().await
    });
    opened.unwrap();
    accepted.unwrap();
    assert_eq!(init.state(), ConnectionState::Established);
    assert_eq!(resp.state(), ConnectionState::Established);

    let (closed, served) = tokio::join!(init.close(), resp.serve());
    closed.unwrap();
    served.unwrap();
    assert_eq!(init.state(), ConnectionState::Closed);
    assert_eq!(resp.state(), ConnectionState::Closed);

    // Teardown numbers: FIN(1024, 512), ACK(512, 1025), FIN(512, 1025),
    // ACK(1025, 513).
    let init_sent = init.journal().segments(Direction::Sent);
    let resp_sent = resp.journal().segments(Direction::Sent);

    let fin = init_sent[2];
    assert_eq!((fin.control(), fin.seq, fin.ack), (Some(Control::Fin), 1024, 512));

    let ack = resp_sent[1];
    assert_eq!((ack.control(), ack.seq, ack.ack), (Some(Control::Ack), 512, 1025));
    let resp_fin = resp_sent[2];
    assert_eq!(
        (resp_fin.control(), resp_fin.seq, resp_fin.ack),
        (Some(Control::Fin), 512, 1025)
    );
    assert_eq!(
        (resp_fin.src_port, resp_fin.dst_port),
        (RESPONDER_PORT, INITIATOR_PORT)
    );

    let last = init_sent[3];
    assert_eq!((last.control(), last.seq, last.ack), (Some(Control::Ack), 1025, 513));

    assert_eq!(resp.journal().notes(), vec![ESTABLISHED_NOTE, CLOSED_NOTE]);
}

// ---------------------------------------------------------------------------
// Checksum failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn corrupted_syn_stops_responder_silently() {
    let (mut resp, mut peer) = responder();
    let syn = Segment::new_syn(INITIATOR_PORT, RESPONDER_PORT, 42);
    peer.get_mut().write_all(&corrupted(&syn)).await.unwrap();

    let err = resp.run().await.unwrap_err();
    assert!(matches!(err, ConnError::Checksum { seq: 42, flags: 0x6002, .. }), "got {err:?}");
    assert!(err.to_string().starts_with("checksum error"));
    assert_eq!(resp.state(), ConnectionState::Listening);
    assert!(resp.journal().entries.is_empty());

    drop(resp);
    assert_nothing_sent(&mut peer).await;
}

#[tokio::test]
async fn corrupted_syn_ack_stops_initiator_silently() {
    let (mut init, mut peer) = initiator();
    init.send_syn().await.unwrap();
    let syn = peer.recv().await.unwrap();

    let syn_ack = Segment::new_syn_ack(RESPONDER_PORT, INITIATOR_PORT, 800, syn.seq + 1);
    peer.get_mut().write_all(&corrupted(&syn_ack)).await.unwrap();

    let err = init.complete_handshake().await.unwrap_err();
    assert!(matches!(err, ConnError::Checksum { .. }), "got {err:?}");
    assert_eq!(init.state(), ConnectionState::SynSent);

    drop(init);
    assert_nothing_sent(&mut peer).await;
}

#[tokio::test]
async fn corrupted_segment_while_established_is_fatal() {
    let (mut resp, mut peer) = responder();
    establish(&mut resp, &mut peer).await;

    let fin = Segment::new_fin(INITIATOR_PORT, RESPONDER_PORT, 1024, 512);
    peer.get_mut().write_all(&corrupted(&fin)).await.unwrap();

    let err = resp.serve().await.unwrap_err();
    assert!(matches!(err, ConnError::Checksum { .. }), "got {err:?}");
    assert_eq!(resp.state(), ConnectionState::Established);
    assert_eq!(resp.journal().note_count(CLOSED_NOTE), 0);

    drop(resp);
    assert_nothing_sent(&mut peer).await;
}

// ---------------------------------------------------------------------------
// Flag mismatches
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fin_instead_of_ack_in_syn_rcvd() {
    let (mut resp, mut peer) = responder();
    peer.send(&Segment::new_syn(INITIATOR_PORT, RESPONDER_PORT, 10))
        .await
        .unwrap();
    resp.accept_syn().await.unwrap();
    peer.recv().await.unwrap();

    peer.send(&Segment::new_fin(INITIATOR_PORT, RESPONDER_PORT, 1024, 512))
        .await
        .unwrap();
    let err = resp.confirm_established().await.unwrap_err();

    assert!(
        matches!(
            err,
            ConnError::Protocol {
                state: ConnectionState::SynReceived,
                expected: Control::Ack,
                got: 0x6001,
            }
        ),
        "got {err:?}"
    );
    assert_eq!(resp.state(), ConnectionState::SynReceived);
    assert_eq!(resp.journal().note_count(ESTABLISHED_NOTE), 0);
}

#[tokio::test]
async fn established_loop_discards_unexpected_segments() {
    let (mut resp, mut peer) = responder();
    establish(&mut resp, &mut peer).await;

    // A stray ACK, a SYN and an unknown flags word are reported and dropped.
    peer.send(&Segment::new_ack(INITIATOR_PORT, RESPONDER_PORT, 1, 1))
        .await
        .unwrap();
    peer.send(&Segment::new_syn(INITIATOR_PORT, RESPONDER_PORT, 2))
        .await
        .unwrap();
    let mut odd = Segment::new_ack(INITIATOR_PORT, RESPONDER_PORT, 3, 3);
    odd.flags = 0x6011;
    odd.checksum = odd.compute_checksum();
    peer.send(&odd).await.unwrap();

    peer.send(&Segment::new_fin(INITIATOR_PORT, RESPONDER_PORT, 1024, 512))
        .await
        .unwrap();
    peer.send(&Segment::new_ack(INITIATOR_PORT, RESPONDER_PORT, 1025, 513))
        .await
        .unwrap();

    resp.serve().await.unwrap();
    assert_eq!(resp.state(), ConnectionState::Closed);

    let ack = peer.recv().await.unwrap();
    let fin = peer.recv().await.unwrap();
    assert_eq!((ack.control(), ack.ack), (Some(Control::Ack), 1025));
    assert_eq!((fin.control(), fin.ack), (Some(Control::Fin), 1025));

    // SYN, handshake ACK, FIN and final ACK; none of the noise.
    assert_eq!(resp.journal().segments(Direction::Received).len(), 4);
    assert_eq!(resp.journal().note_count(ESTABLISHED_NOTE), 1);
    assert_eq!(resp.journal().note_count(CLOSED_NOTE), 1);

    // Each discarded segment is also reported through the journal.
    let reports: Vec<&str> = resp
        .journal()
        .notes()
        .into_iter()
        .filter(|n| n.starts_with("Error: protocol error in ESTABLISHED"))
        .collect();
    assert_eq!(reports.len(), 3);
    assert!(reports[0].contains("got flags 0x6010"));
    assert!(reports[1].contains("got flags 0x6002"));
    assert!(reports[2].contains("got flags 0x6011"));
}

#[tokio::test]
async fn wrong_final_segment_fails_teardown() {
    let (mut resp, mut peer) = responder();
    establish(&mut resp, &mut peer).await;

    peer.send(&Segment::new_fin(INITIATOR_PORT, RESPONDER_PORT, 1024, 512))
        .await
        .unwrap();
    peer.send(&Segment::new_fin(INITIATOR_PORT, RESPONDER_PORT, 1025, 513))
        .await
        .unwrap();

    let err = resp.serve().await.unwrap_err();
    assert!(
        matches!(
            err,
            ConnError::Protocol {
                state: ConnectionState::FinReceived,
                expected: Control::Ack,
                ..
            }
        ),
        "got {err:?}"
    );
    assert_eq!(resp.journal().note_count(CLOSED_NOTE), 0);
}

#[tokio::test]
async fn initiator_requires_ack_before_fin() {
    let (mut init, mut peer) = initiator();
    init.send_syn().await.unwrap();
    let syn = peer.recv().await.unwrap();
    peer.send(&Segment::new_syn_ack(RESPONDER_PORT, INITIATOR_PORT, 70, syn.seq + 1))
        .await
        .unwrap();
    init.complete_handshake().await.unwrap();
    init.send_fin().await.unwrap();
    peer.recv().await.unwrap();
    peer.recv().await.unwrap();

    peer.send(&Segment::new_fin(RESPONDER_PORT, INITIATOR_PORT, 512, 1025))
        .await
        .unwrap();
    let err = init.finish_teardown().await.unwrap_err();
    assert!(
        matches!(
            err,
            ConnError::Protocol {
                state: ConnectionState::FinWait,
                expected: Control::Ack,
                got: 0x6001,
            }
        ),
        "got {err:?}"
    );
    assert_eq!(init.state(), ConnectionState::FinWait);
}

#[tokio::test]
async fn initiator_reports_truncated_reply_as_transport_error() {
    let (mut init, mut peer) = initiator();
    init.send_syn().await.unwrap();
    peer.recv().await.unwrap();

    let mut raw = peer.into_inner();
    raw.write_all(&[0u8; 100]).await.unwrap();
    drop(raw);

    let err = init.complete_handshake().await.unwrap_err();
    assert!(matches!(err, ConnError::Transport(SocketError::Io(_))), "got {err:?}");
}
