//! Inbound commands to the extension host.
//!
//! These represent console input (serial, script file, test harness)
//! that the [`ExtensionHost`](super::service::ExtensionHost) interprets:
//! `$` statements addressed to the settings registry, everything else a
//! G-code line for the command protocol.

use crate::command::line::BAD_NUMBER_FORMAT;
use crate::status::Status;

/// Commands that external adapters can send into the extension host.
#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    /// `$$`: report every extension setting.
    ReportSettings,

    /// `$<id>`: report one setting.
    ReportSetting(u16),

    /// `$RST=$`: reset every block to defaults and write it back.
    RestoreDefaults,

    /// `$<id>=<value>`: live change, persisted immediately.
    ChangeSetting { id: u16, value: f32 },

    /// Anything else: a G-code line.
    ExecuteLine(String),
}

impl AppCommand {
    pub fn parse(input: &str) -> Result<Self, Status> {
        let input = input.trim();
        let Some(statement) = input.strip_prefix('$') else {
            return Ok(Self::ExecuteLine(input.to_string()));
        };

        if statement == "$" {
            return Ok(Self::ReportSettings);
        }
        if statement.eq_ignore_ascii_case("RST=$") {
            return Ok(Self::RestoreDefaults);
        }

        match statement.split_once('=') {
            Some((id, value)) => {
                let id = parse_id(id)?;
                let value = value
                    .trim()
                    .parse::<f32>()
                    .map_err(|_| BAD_NUMBER_FORMAT)?;
                if !value.is_finite() {
                    return Err(BAD_NUMBER_FORMAT);
                }
                Ok(Self::ChangeSetting { id, value })
            }
            None => Ok(Self::ReportSetting(parse_id(statement)?)),
        }
    }
}

fn parse_id(text: &str) -> Result<u16, Status> {
    text.trim()
        .parse::<u16>()
        .map_err(|_| Status::InvalidStatement)
}

/// Output of one console command: zero or more report lines followed by
/// a terminating status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub lines: Vec<String>,
    pub status: Status,
}

impl Reply {
    pub fn status(status: Status) -> Self {
        Self {
            lines: Vec::new(),
            status,
        }
    }

    pub fn ok_with(lines: Vec<String>) -> Self {
        Self {
            lines,
            status: Status::Ok,
        }
    }

    /// `ok` or `error:<code>`.
    pub fn terminator(&self) -> String {
        if self.status.is_ok() {
            "ok".to_string()
        } else {
            format!("error:{}", self.status.code())
        }
    }
}

impl From<Result<(), Status>> for Reply {
    fn from(result: Result<(), Status>) -> Self {
        Self::status(result.err().unwrap_or(Status::Ok))
    }
}
