//! Segment journal.
//!
//! Every segment an endpoint transmits, and every received segment it
//! accepts, is handed to a [`Journal`] as a formatted record.  Lifecycle
//! milestones go through [`Journal::note`].  The journal is a pure sink:
//! nothing it does feeds back into the protocol, and write failures are
//! logged rather than propagated.
//!
//! [`OutputJournal`] echoes records to standard output and appends them to a
//! file.  [`MemoryJournal`] keeps them in a `Vec` for inspection.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::segment::Segment;

/// Written once by the responder when the handshake completes.
pub const ESTABLISHED_NOTE: &str = "Connection established";

/// Written by the responder after the final ACK of the teardown.
pub const CLOSED_NOTE: &str = "The connection is now closed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Sent,
    Received,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Sent => "Sent",
            Direction::Received => "Received",
        })
    }
}

/// Sink for segment records and lifecycle notes.
pub trait Journal {
    fn record(&mut self, direction: Direction, segment: &Segment);
    fn note(&mut self, message: &str);
}

/// The text written for one segment.
pub fn format_record(direction: Direction, segment: &Segment) -> String {
    format!("{direction} segment:\n{segment}\n")
}

// ---------------------------------------------------------------------------
// OutputJournal
// ---------------------------------------------------------------------------

/// Console plus append-only file.
#[derive(Debug)]
pub struct OutputJournal {
    path: PathBuf,
    file: File,
    echo_console: bool,
}

impl OutputJournal {
    /// Open (or create) `path` for appending.
    pub fn open(path: impl AsRef<Path>, echo_console: bool) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file,
            echo_console,
        })
    }

    fn emit(&mut self, text: &str) {
        if self.echo_console {
            println!("{text}");
        }
        if let Err(e) = writeln!(self.file, "{text}") {
            log::warn!("journal write to {} failed: {e}", self.path.display());
        }
    }
}

impl Journal for OutputJournal {
    fn record(&mut self, direction: Direction, segment: &Segment) {
        self.emit(&format_record(direction, segment));
    }

    fn note(&mut self, message: &str) {
        self.emit(&format!("{message}\n"));
    }
}

// ---------------------------------------------------------------------------
// MemoryJournal
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Segment(Direction, Segment),
    Note(String),
}

/// Keeps every entry in order of arrival.
#[derive(Debug, Default, Clone)]
pub struct MemoryJournal {
    pub entries: Vec<Entry>,
}

impl MemoryJournal {
    /// Segments recorded in `direction`, oldest first.
    pub fn segments(&self, direction: Direction) -> Vec<&Segment> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                Entry::Segment(d, s) if *d == direction => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn notes(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                Entry::Note(n) => Some(n.as_str()),
                _ => None,
            })
            .collect()
    }

    /// How many times `message` was noted.
    pub fn note_count(&self, message: &str) -> usize {
        self.notes().into_iter().filter(|n| *n == message).count()
    }
}

impl Journal for MemoryJournal {
    fn record(&mut self, direction: Direction, segment: &Segment) {
        self.entries.push(Entry::Segment(direction, segment.clone()));
    }

    fn note(&mut self, message: &str) {
        self.entries.push(Entry::Note(message.to_string()));
    }
}
