//! Wire-format definitions for handshake segments.
//!
//! Every unit exchanged between initiator and responder is a [`Segment`].
//! This module is responsible for:
//! - Defining the fixed on-wire layout, the flags word and the protocol
//!   constants both endpoints share.
//! - Serialising a [`Segment`] into a [`SEGMENT_LEN`]-byte buffer.
//! - Deserialising a raw byte slice back into a [`Segment`].
//! - Computing and verifying the 16-bit one's-complement checksum.
//!
//! No I/O happens here — this is pure data transformation.
//!
//! # Wire format
//!
//! All multi-byte integers use [`WIRE_ORDER`].  Both endpoints must agree on
//! it; it is never negotiated.
//!
//! ```text
//!  0               1               2               3
//!  0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |          Source Port          |       Destination Port        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                        Sequence Number                        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                    Acknowledgment Number                      |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |    Header length / flags      |            Window             |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |           Checksum            |        Urgent Pointer         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                            Options                            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                 Payload ([`PAYLOAD_LEN`] bytes)               |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Total size: [`SEGMENT_LEN`] = 24-byte header + 1024-byte payload.

use std::fmt;

use rand::Rng;
use thiserror::Error;

/// Byte order of multi-byte fields and checksum words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    fn u16_bytes(self, v: u16) -> [u8; 2] {
        match self {
            ByteOrder::Little => v.to_le_bytes(),
            ByteOrder::Big => v.to_be_bytes(),
        }
    }

    fn u32_bytes(self, v: u32) -> [u8; 4] {
        match self {
            ByteOrder::Little => v.to_le_bytes(),
            ByteOrder::Big => v.to_be_bytes(),
        }
    }

    fn read_u16(self, b: [u8; 2]) -> u16 {
        match self {
            ByteOrder::Little => u16::from_le_bytes(b),
            ByteOrder::Big => u16::from_be_bytes(b),
        }
    }

    fn read_u32(self, b: [u8; 4]) -> u32 {
        match self {
            ByteOrder::Little => u32::from_le_bytes(b),
            ByteOrder::Big => u32::from_be_bytes(b),
        }
    }
}

/// Wire byte order shared by both endpoints.
///
/// Little-endian, matching the x86 hosts the paired C programs exchanged
/// raw structs between.
pub const WIRE_ORDER: ByteOrder = ByteOrder::Little;

/// Bit constants for the 16-bit header-length/flags word.
pub mod flags {
    /// Header length of 6 in the top nibble; present in every flags word.
    pub const HEADER_LEN: u16 = 0x6000;
    /// Finish — sender has no more data to send.
    pub const FIN: u16 = 0x0001;
    /// Synchronise sequence numbers (handshake initiation).
    pub const SYN: u16 = 0x0002;
    /// Acknowledgement field is valid.
    pub const ACK: u16 = 0x0010;
}

/// Byte length of the fixed payload block.
pub const PAYLOAD_LEN: usize = 1024;

/// Byte length of a serialised segment.
pub const SEGMENT_LEN: usize = OFF_PAYLOAD + PAYLOAD_LEN;

/// Number of 16-bit words covered by the checksum.
pub const CHECKSUM_WORDS: usize = 524;

/// Leading bytes of the serialised segment that participate in the checksum.
/// Anything past this prefix is outside integrity checking.
pub const CHECKSUM_PREFIX_LEN: usize = CHECKSUM_WORDS * 2;

/// Inclusive range initial sequence numbers are drawn from.
pub const ISN_MIN: u32 = 10;
pub const ISN_MAX: u32 = 60_009;

// Teardown numbers are fixed, not derived from the exchange.  The paired
// implementation expects exactly these values.

/// Sequence number of the initiator's FIN.
pub const INITIATOR_FIN_SEQ: u32 = 1024;
/// Acknowledgement number carried by the initiator's FIN.
pub const INITIATOR_FIN_ACK: u32 = 512;
/// Sequence number of the responder's teardown ACK and FIN.
pub const RESPONDER_TEARDOWN_SEQ: u32 = 512;
/// Sequence number of the initiator's final ACK ("client FIN + 1").
pub const INITIATOR_FINAL_SEQ: u32 = INITIATOR_FIN_SEQ + 1;

// Byte offsets of each field within the serialised segment.
const OFF_SRC_PORT: usize = 0;
const OFF_DST_PORT: usize = 2;
const OFF_SEQ: usize = 4;
const OFF_ACK: usize = 8;
const OFF_FLAGS: usize = 12;
const OFF_WINDOW: usize = 14;
const OFF_CHECKSUM: usize = 16;
const OFF_URGENT: usize = 18;
const OFF_OPTIONS: usize = 20;
const OFF_PAYLOAD: usize = 24;

const _: () = assert!(CHECKSUM_PREFIX_LEN <= SEGMENT_LEN);

/// The control-flag combinations this protocol uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    Syn,
    SynAck,
    Ack,
    Fin,
}

impl Control {
    /// Full flags word (header length included) for this control kind.
    pub const fn word(self) -> u16 {
        flags::HEADER_LEN
            | match self {
                Control::Syn => flags::SYN,
                Control::SynAck => flags::SYN | flags::ACK,
                Control::Ack => flags::ACK,
                Control::Fin => flags::FIN,
            }
    }

    /// Classify a flags word.  Only exact matches count; any other
    /// combination returns `None`.
    pub fn from_word(word: u16) -> Option<Self> {
        [Control::Syn, Control::SynAck, Control::Ack, Control::Fin]
            .into_iter()
            .find(|c| c.word() == word)
    }
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Control::Syn => "SYN",
            Control::SynAck => "SYN+ACK",
            Control::Ack => "ACK",
            Control::Fin => "FIN",
        })
    }
}

/// Errors that can arise when parsing a raw segment.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SegmentError {
    /// Buffer shorter than [`SEGMENT_LEN`].
    #[error("segment truncated: got {len} bytes, need {}", SEGMENT_LEN)]
    Truncated { len: usize },
}

/// One fixed-layout segment.
///
/// Build segments with the `new_*` constructors, which leave the checksum
/// already computed.  Fields stay public so received segments can be
/// inspected as-is.
#[derive(Clone, PartialEq, Eq)]
pub struct Segment {
    pub src_port: u16,
    pub dst_port: u16,
    pub seq: u32,
    pub ack: u32,
    /// Header length nibble OR-ed with the control bits.
    pub flags: u16,
    /// Reserved, always zero.
    pub window: u16,
    pub checksum: u16,
    /// Reserved, always zero.
    pub urgent: u16,
    /// Reserved, always zero.
    pub options: u32,
    /// Reserved capacity, zero-filled.
    pub payload: [u8; PAYLOAD_LEN],
}

impl Segment {
    /// Build a segment carrying `control` with a freshly computed checksum.
    pub fn new(control: Control, src_port: u16, dst_port: u16, seq: u32, ack: u32) -> Self {
        Segment {
            src_port,
            dst_port,
            seq,
            ack,
            flags: control.word(),
            window: 0,
            checksum: 0,
            urgent: 0,
            options: 0,
            payload: [0u8; PAYLOAD_LEN],
        }
        .sealed()
    }

    /// Connection request.  The acknowledgement number is zero.
    pub fn new_syn(src_port: u16, dst_port: u16, seq: u32) -> Self {
        Self::new(Control::Syn, src_port, dst_port, seq, 0)
    }

    pub fn new_syn_ack(src_port: u16, dst_port: u16, seq: u32, ack: u32) -> Self {
        Self::new(Control::SynAck, src_port, dst_port, seq, ack)
    }

    pub fn new_ack(src_port: u16, dst_port: u16, seq: u32, ack: u32) -> Self {
        Self::new(Control::Ack, src_port, dst_port, seq, ack)
    }

    pub fn new_fin(src_port: u16, dst_port: u16, seq: u32, ack: u32) -> Self {
        Self::new(Control::Fin, src_port, dst_port, seq, ack)
    }

    /// Same header values with a different control kind and a recomputed
    /// checksum.
    pub fn with_control(&self, control: Control) -> Self {
        let mut next = self.clone();
        next.flags = control.word();
        next.sealed()
    }

    /// Control kind of this segment, if its flags word is one the protocol
    /// knows.
    pub fn control(&self) -> Option<Control> {
        Control::from_word(self.flags)
    }

    /// Serialise this segment into a newly allocated [`SEGMENT_LEN`]-byte
    /// vector.  The stored checksum is written as-is.
    pub fn encode(&self) -> Vec<u8> {
        let o = WIRE_ORDER;
        let mut buf = vec![0u8; SEGMENT_LEN];

        buf[OFF_SRC_PORT..OFF_SRC_PORT + 2].copy_from_slice(&o.u16_bytes(self.src_port));
        buf[OFF_DST_PORT..OFF_DST_PORT + 2].copy_from_slice(&o.u16_bytes(self.dst_port));
        buf[OFF_SEQ..OFF_SEQ + 4].copy_from_slice(&o.u32_bytes(self.seq));
        buf[OFF_ACK..OFF_ACK + 4].copy_from_slice(&o.u32_bytes(self.ack));
        buf[OFF_FLAGS..OFF_FLAGS + 2].copy_from_slice(&o.u16_bytes(self.flags));
        buf[OFF_WINDOW..OFF_WINDOW + 2].copy_from_slice(&o.u16_bytes(self.window));
        buf[OFF_CHECKSUM..OFF_CHECKSUM + 2].copy_from_slice(&o.u16_bytes(self.checksum));
        buf[OFF_URGENT..OFF_URGENT + 2].copy_from_slice(&o.u16_bytes(self.urgent));
        buf[OFF_OPTIONS..OFF_OPTIONS + 4].copy_from_slice(&o.u32_bytes(self.options));
        buf[OFF_PAYLOAD..].copy_from_slice(&self.payload);

        buf
    }

    /// Parse a [`Segment`] from the front of `buf`.
    ///
    /// Bytes past [`SEGMENT_LEN`] are ignored.  The checksum is *not*
    /// verified here; see [`Segment::verify_checksum`].
    pub fn decode(buf: &[u8]) -> Result<Self, SegmentError> {
        if buf.len() < SEGMENT_LEN {
            return Err(SegmentError::Truncated { len: buf.len() });
        }
        let o = WIRE_ORDER;

        let mut payload = [0u8; PAYLOAD_LEN];
        payload.copy_from_slice(&buf[OFF_PAYLOAD..SEGMENT_LEN]);

        Ok(Segment {
            src_port: o.read_u16(field(buf, OFF_SRC_PORT)),
            dst_port: o.read_u16(field(buf, OFF_DST_PORT)),
            seq: o.read_u32(field(buf, OFF_SEQ)),
            ack: o.read_u32(field(buf, OFF_ACK)),
            flags: o.read_u16(field(buf, OFF_FLAGS)),
            window: o.read_u16(field(buf, OFF_WINDOW)),
            checksum: o.read_u16(field(buf, OFF_CHECKSUM)),
            urgent: o.read_u16(field(buf, OFF_URGENT)),
            options: o.read_u32(field(buf, OFF_OPTIONS)),
            payload,
        })
    }

    /// Checksum over the segment with its checksum field taken as zero.
    pub fn compute_checksum(&self) -> u16 {
        let mut bytes = self.encode();
        bytes[OFF_CHECKSUM..OFF_CHECKSUM + 2].fill(0);
        ones_complement_sum(&bytes)
    }

    /// The same word sum over the segment as it stands, stored checksum
    /// included.  Zero for an intact segment.
    pub fn checksum_residue(&self) -> u16 {
        ones_complement_sum(&self.encode())
    }

    /// `true` when [`Segment::checksum_residue`] is zero.
    pub fn verify_checksum(&self) -> bool {
        self.checksum_residue() == 0
    }

    fn sealed(mut self) -> Self {
        self.checksum = self.compute_checksum();
        self
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segment")
            .field("src_port", &self.src_port)
            .field("dst_port", &self.dst_port)
            .field("seq", &self.seq)
            .field("ack", &self.ack)
            .field("flags", &format_args!("{:#06x}", self.flags))
            .field("window", &self.window)
            .field("checksum", &format_args!("{:#06x}", self.checksum))
            .field("urgent", &self.urgent)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// The journal record for a segment.
impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Source Port: {}", self.src_port)?;
        writeln!(f, "Destination Port: {}", self.dst_port)?;
        writeln!(f, "Sequence Number: {}", self.seq)?;
        writeln!(f, "Acknowledgement Number: {}", self.ack)?;
        writeln!(f, "Header length/flags: 0x{:04X}", self.flags)?;
        write!(f, "Checksum: 0x{:04X}", self.checksum)
    }
}

/// Draw an initial sequence number from `ISN_MIN..=ISN_MAX`.
pub fn random_isn() -> u32 {
    rand::rng().random_range(ISN_MIN..=ISN_MAX)
}

fn field<const N: usize>(buf: &[u8], off: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&buf[off..off + N]);
    out
}

/// One's-complement checksum over the first [`CHECKSUM_PREFIX_LEN`] bytes.
///
/// Words are summed into a 32-bit accumulator, the carry is folded back
/// twice (the first fold can itself carry), and the complement returned.
fn ones_complement_sum(data: &[u8]) -> u16 {
    let mut sum: u32 = data[..CHECKSUM_PREFIX_LEN]
        .chunks_exact(2)
        .map(|w| u32::from(WIRE_ORDER.read_u16([w[0], w[1]])))
        .sum();

    sum = (sum & 0xffff) + (sum >> 16);
    sum = (sum & 0xffff) + (sum >> 16);

    !(sum as u16)
}
