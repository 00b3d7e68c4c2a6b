//! Status codes crossing the host boundary.
//!
//! Every listener reports its outcome by writing one of these into the
//! payload it was handed.  The numeric values follow the grbl family of
//! firmwares so that a sender's error table keeps working.  Codes this
//! layer does not name are carried as [`Status::Other`] and returned to
//! the host unchanged.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Status {
    #[default]
    Ok,
    /// Unknown or malformed `$` statement; also the CHANGE result when no
    /// extension owns the setting id.
    InvalidStatement,
    /// A value that must be unsigned was negative.
    NegativeValue,
    /// Persisted storage could not be read.
    SettingReadFail,
    /// EXEC reached a claim tag no listener recognises.
    ExtendedUnsupported,
    /// A second extension tried to claim an already-claimed line.
    ModalGroupViolation,
    /// A required parameter word is missing.
    ValueWordMissing,
    /// Any other host code, passed through verbatim.
    Other(u8),
}

impl Status {
    pub const OK_CODE: u8 = 0;

    /// Numeric code as reported on the wire (`error:<code>`).
    pub const fn code(self) -> u8 {
        match self {
            Self::Ok => Self::OK_CODE,
            Self::InvalidStatement => 3,
            Self::NegativeValue => 4,
            Self::SettingReadFail => 7,
            Self::ExtendedUnsupported => 20,
            Self::ModalGroupViolation => 21,
            Self::ValueWordMissing => 28,
            Self::Other(code) => code,
        }
    }

    /// Inverse of [`code`](Self::code).  Unrecognised values survive as
    /// `Other(code)`.
    pub const fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Ok,
            3 => Self::InvalidStatement,
            4 => Self::NegativeValue,
            7 => Self::SettingReadFail,
            20 => Self::ExtendedUnsupported,
            21 => Self::ModalGroupViolation,
            28 => Self::ValueWordMissing,
            other => Self::Other(other),
        }
    }

    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }

    /// `Ok(())` for [`Status::Ok`], otherwise the status as an error.
    pub fn into_result(self) -> Result<(), Status> {
        if self.is_ok() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::InvalidStatement => write!(f, "invalid statement"),
            Self::NegativeValue => write!(f, "negative value"),
            Self::SettingReadFail => write!(f, "setting read fail"),
            Self::ExtendedUnsupported => write!(f, "unsupported extended command"),
            Self::ModalGroupViolation => write!(f, "modal group violation"),
            Self::ValueWordMissing => write!(f, "value word missing"),
            Self::Other(code) => write!(f, "status {code}"),
        }
    }
}
