//! `tcp-handshake-sim` — the TCP three-way handshake and four-way teardown,
//! acted out by two endpoints exchanging fixed-layout segments over a
//! reliable byte stream.
//!
//! Only the control-flag transitions and a checksum are modelled: no data
//! phase, no retransmission, no windowing.
//!
//! # Architecture
//!
//! ```text
//!  ┌───────────┐                         ┌───────────┐
//!  │ Initiator │                         │ Responder │
//!  └─────┬─────┘                         └─────┬─────┘
//!        │        (state machines)             │
//!  ┌─────▼─────────────────────────────────────▼─────┐
//!  │   Connection (transmit / receive / expect)      │──▶ Journal
//!  └─────┬─────────────────────────────────────┬─────┘
//!        │ Segment encode / decode / checksum  │
//!  ┌─────▼─────┐      byte stream        ┌─────▼─────┐
//!  │  Socket   │◀───────────────────────▶│  Socket   │
//!  └───────────┘                         └───────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`segment`]    — wire format, checksum, protocol constants
//! - [`state`]      — finite-state-machine types
//! - [`connection`] — per-connection plumbing and error type
//! - [`initiator`]  — active-open / active-close state machine
//! - [`responder`]  — passive-open / passive-close state machine
//! - [`journal`]    — segment record sink (console + file, or memory)
//! - [`socket`]     — segment-framed stream socket, TCP setup
//! - [`config`]     — per-endpoint runtime configuration

pub mod config;
pub mod connection;
pub mod initiator;
pub mod journal;
pub mod responder;
pub mod segment;
pub mod socket;
pub mod state;

pub use connection::ConnError;
pub use segment::{Control, Segment};
pub use state::ConnectionState;
