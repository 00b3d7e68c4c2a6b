//! Command extension protocol.
//!
//! Custom G/M-codes are owned through two chained events that share one
//! per-line claim:
//!
//! ```text
//!   line ──▶ PARSE (once per G/M word) ──▶ claim set? ──no──▶ host built-ins
//!                                              │yes
//!                                              ▼
//!                                 EXEC (listener owning the tag)
//! ```
//!
//! A PARSE listener whose letter/code (and mantissa, for decimal codes)
//! matches calls [`ParseRequest::claim`].  The first claim on a line wins;
//! any later attempt on the same line fails with
//! [`Status::ModalGroupViolation`] and leaves the original tag in place.

pub mod line;

use core::fmt;

use log::{debug, warn};

use crate::app::ports::Host;
use crate::events::{Dispatch, Event, EventBus};
use crate::status::Status;

pub use line::{Line, Word};

// ---------------------------------------------------------------------------
// Claim
// ---------------------------------------------------------------------------

/// Ownership tag for the current line's custom command.  Zero = unclaimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Claim(u16);

/// Returned by [`Claim::claim_if_unclaimed`] with the tag already present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlreadyClaimed(pub Claim);

impl Claim {
    pub const NONE: Self = Self(0);

    const MCODE_BASE: u16 = 1000;

    /// Tag for an integer M-code: `1000 + code`.
    pub const fn mcode(code: u16) -> Self {
        Self(Self::MCODE_BASE + code)
    }

    /// Tag for a decimal sub-code such as G28.1: `code * 100 + mantissa`.
    pub const fn sub_code(code: u16, mantissa: u16) -> Self {
        Self(code * 100 + mantissa)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }

    pub const fn is_claimed(self) -> bool {
        self.0 != 0
    }

    /// Single-assignment transition from unclaimed to `tag`.
    pub fn claim_if_unclaimed(&mut self, tag: Claim) -> Result<(), AlreadyClaimed> {
        if self.is_claimed() {
            return Err(AlreadyClaimed(*self));
        }
        *self = tag;
        Ok(())
    }
}

impl fmt::Display for Claim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Two-digit fractional part of a code value: 28.1 → 10, 28.0 → 0.
pub fn mantissa(value: f32) -> u16 {
    ((value - value.floor()) * 100.0).round() as u16
}

// ---------------------------------------------------------------------------
// PARSE payload
// ---------------------------------------------------------------------------

/// Payload of the command-parse event, one per G/M word.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseRequest {
    /// Upper-case word letter (`G` or `M`).
    pub letter: char,
    /// Value as written, e.g. `28.1`.
    pub value: f32,
    /// Integer part of `value`.
    pub code: u16,
    /// Line-wide claim, carried between words.
    pub claim: Claim,
    pub status: Status,
}

impl ParseRequest {
    pub fn new(word: Word, claim: Claim) -> Self {
        Self {
            letter: word.letter,
            value: word.value,
            code: word.value.floor().max(0.0) as u16,
            claim,
            status: Status::Ok,
        }
    }

    pub fn mantissa(&self) -> u16 {
        mantissa(self.value)
    }

    /// Letter and integer code match (any mantissa).
    pub fn is(&self, letter: char, code: u16) -> bool {
        self.letter == letter && self.code == code
    }

    /// Integer M-code with no fractional part.
    pub fn is_mcode(&self, code: u16) -> bool {
        self.is('M', code) && self.mantissa() == 0
    }

    /// Take ownership of the line.  Always answers `Handled`: either the
    /// claim is recorded with `Ok`, or the line is already owned and the
    /// status becomes `ModalGroupViolation`.
    pub fn claim(&mut self, tag: Claim) -> Dispatch {
        match self.claim.claim_if_unclaimed(tag) {
            Ok(()) => self.status = Status::Ok,
            Err(AlreadyClaimed(existing)) => {
                warn!(
                    "Command: {}{} wants {} but line already owned by {}",
                    self.letter, self.value, tag, existing
                );
                self.status = Status::ModalGroupViolation;
            }
        }
        Dispatch::Handled
    }
}

// ---------------------------------------------------------------------------
// EXEC payload
// ---------------------------------------------------------------------------

/// Parameter words of a line, indexed by letter.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Words([Option<f32>; 26]);

impl Words {
    fn slot(letter: char) -> Option<usize> {
        letter
            .is_ascii_alphabetic()
            .then(|| (letter.to_ascii_uppercase() as u8 - b'A') as usize)
    }

    pub fn get(&self, letter: char) -> Option<f32> {
        Self::slot(letter).and_then(|i| self.0[i])
    }

    pub fn has(&self, letter: char) -> bool {
        self.get(letter).is_some()
    }

    /// Store a word.  Returns `false` if the letter was already present.
    pub fn insert(&mut self, letter: char, value: f32) -> bool {
        match Self::slot(letter) {
            Some(i) if self.0[i].is_none() => {
                self.0[i] = Some(value);
                true
            }
            _ => false,
        }
    }

    /// Required word, or `ValueWordMissing`.
    pub fn require(&self, letter: char) -> Result<f32, Status> {
        self.get(letter).ok_or(Status::ValueWordMissing)
    }

    /// Required non-negative word.
    pub fn require_unsigned(&self, letter: char) -> Result<f32, Status> {
        let value = self.require(letter)?;
        if value < 0.0 {
            return Err(Status::NegativeValue);
        }
        Ok(value)
    }
}

/// Payload of the command-exec event.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecRequest {
    pub claim: Claim,
    pub words: Words,
    pub status: Status,
}

impl ExecRequest {
    pub fn new(claim: Claim, words: Words) -> Self {
        Self {
            claim,
            words,
            status: Status::ExtendedUnsupported,
        }
    }

    /// Record the outcome of an owned command and stop the chain.
    pub fn complete(&mut self, result: Result<(), Status>) -> Dispatch {
        self.status = result.err().unwrap_or(Status::Ok);
        Dispatch::Handled
    }
}

// ---------------------------------------------------------------------------
// Line processing
// ---------------------------------------------------------------------------

/// Run one parsed line through PARSE and EXEC.
///
/// * `Ok(None)`: no extension claimed the line; the host handles it.
/// * `Ok(Some(claim))`: the owning extension executed it.
/// * `Err(status)`: rejected (ownership, validation, or unsupported tag).
pub fn process_line(
    bus: &mut EventBus,
    host: &mut dyn Host,
    line: &Line,
) -> Result<Option<Claim>, Status> {
    let mut claim = Claim::NONE;

    for word in line.commands() {
        let mut req = ParseRequest::new(*word, claim);
        bus.publish(Event::CommandParse(&mut req), host);
        req.status.into_result()?;
        claim = req.claim;
    }

    if !claim.is_claimed() {
        return Ok(None);
    }

    let mut req = ExecRequest::new(claim, *line.params());
    if !bus.publish(Event::CommandExec(&mut req), host).is_handled() {
        warn!("Command: no extension executed claim {}", claim);
    }
    debug!("Command: claim {} finished with {}", claim, req.status);
    req.status.into_result().map(|()| Some(claim))
}
