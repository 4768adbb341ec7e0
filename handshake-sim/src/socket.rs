//! Segment-framed stream socket.
//!
//! [`SegmentSocket`] is a thin wrapper around an ordered byte stream that
//! speaks [`crate::segment::Segment`] instead of raw bytes.  All protocol
//! logic lives elsewhere; this module owns only byte I/O and TCP setup.
//!
//! Any `AsyncRead + AsyncWrite` stream works, so the same endpoints run over
//! `tokio::net::TcpStream` in production and over `tokio::io::duplex` pipes
//! in tests.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{lookup_host, TcpListener, TcpSocket, TcpStream};

use crate::segment::{Segment, SegmentError, SEGMENT_LEN};

/// Pending-connection queue length for the responder's listener.
pub const LISTEN_BACKLOG: u32 = 10;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can arise from socket operations.
#[derive(Debug, Error)]
pub enum SocketError {
    /// Underlying I/O error from the OS, including a peer that hung up
    /// mid-segment.
    #[error("socket I/O error")]
    Io(#[from] io::Error),
    /// The received bytes could not be decoded as a segment.
    #[error("segment decode error")]
    Segment(#[from] SegmentError),
}

// ---------------------------------------------------------------------------
// SegmentSocket
// ---------------------------------------------------------------------------

/// A segment-oriented view of a byte stream.
#[derive(Debug)]
pub struct SegmentSocket<S = TcpStream> {
    inner: S,
}

impl SegmentSocket<TcpStream> {
    /// Open a TCP connection to `host:port`.
    pub async fn connect(host: &str, port: u16) -> Result<Self, SocketError> {
        let stream = TcpStream::connect((host, port)).await?;
        Ok(Self::new(stream))
    }

    /// Local address of the underlying TCP stream.
    pub fn local_addr(&self) -> Result<SocketAddr, SocketError> {
        Ok(self.inner.local_addr()?)
    }
}

impl<S> SegmentSocket<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    /// Direct access to the stream, e.g. to inject raw bytes.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> SegmentSocket<S> {
    /// Encode `segment` and write all [`SEGMENT_LEN`] bytes.
    pub async fn send(&mut self, segment: &Segment) -> Result<(), SocketError> {
        self.inner.write_all(&segment.encode()).await?;
        self.inner.flush().await?;
        Ok(())
    }

    /// Block until a full segment has arrived and decode it.
    ///
    /// The checksum is not checked here; that is the caller's decision.
    /// There is no timeout: a silent peer blocks this call indefinitely.
    pub async fn recv(&mut self) -> Result<Segment, SocketError> {
        let mut buf = vec![0u8; SEGMENT_LEN];
        self.inner.read_exact(&mut buf).await?;
        Ok(Segment::decode(&buf)?)
    }
}

// ---------------------------------------------------------------------------
// Listener setup
// ---------------------------------------------------------------------------

/// Bind a listening TCP socket on `host:port` with address reuse enabled.
///
/// Passing port `0` lets the OS choose; read it back from
/// [`TcpListener::local_addr`].
pub async fn listen(host: &str, port: u16) -> Result<TcpListener, SocketError> {
    let addr = lookup_host((host, port)).await?.next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("no address for {host}:{port}"),
        )
    })?;

    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    Ok(socket.listen(LISTEN_BACKLOG)?)
}

/// Accept exactly one inbound connection.
pub async fn accept(listener: &TcpListener) -> Result<(SegmentSocket, SocketAddr), SocketError> {
    let (stream, peer) = listener.accept().await?;
    Ok((SegmentSocket::new(stream), peer))
}
