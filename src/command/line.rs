//! Minimal G-code line tokenizer.
//!
//! Splits a block into command words (`G`, `M`) and parameter words.
//! Comments in parentheses and after `;` are dropped, whitespace is
//! ignored anywhere, letters are case-insensitive and `N` line numbers are
//! discarded.  This is only enough to feed the extension protocol; the
//! host's own parser remains the authority on built-in semantics.

use heapless::Vec;

use super::Words;
use crate::status::Status;

/// `error:1`: a word letter was expected.
pub const EXPECTED_COMMAND_LETTER: Status = Status::Other(1);
/// `error:2`: missing or malformed number.
pub const BAD_NUMBER_FORMAT: Status = Status::Other(2);
/// `error:11`: too many command words on one line.
pub const OVERFLOW: Status = Status::Other(11);
/// `error:25`: the same parameter letter appears twice.
pub const WORD_REPEATED: Status = Status::Other(25);

/// Maximum command words per line.
const MAX_COMMAND_WORDS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Word {
    pub letter: char,
    pub value: f32,
}

/// A tokenized line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Line {
    commands: Vec<Word, MAX_COMMAND_WORDS>,
    params: Words,
}

impl Line {
    pub fn parse(text: &str) -> Result<Self, Status> {
        let mut line = Self::default();
        let mut chars = text.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                c if c.is_whitespace() => {}
                '(' => {
                    for c in chars.by_ref() {
                        if c == ')' {
                            break;
                        }
                    }
                }
                ';' => break,
                c if c.is_ascii_alphabetic() => {
                    let letter = c.to_ascii_uppercase();
                    let mut number = heapless::String::<24>::new();
                    while let Some(&d) = chars.peek() {
                        if d.is_whitespace() {
                            chars.next();
                        } else if d.is_ascii_digit() || d == '.' || d == '-' || d == '+' {
                            number.push(d).map_err(|()| BAD_NUMBER_FORMAT)?;
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    let value: f32 = number.parse().map_err(|_| BAD_NUMBER_FORMAT)?;
                    line.push(Word { letter, value })?;
                }
                _ => return Err(EXPECTED_COMMAND_LETTER),
            }
        }

        Ok(line)
    }

    fn push(&mut self, word: Word) -> Result<(), Status> {
        match word.letter {
            'G' | 'M' => self.commands.push(word).map_err(|_| OVERFLOW),
            'N' => Ok(()),
            letter => {
                if self.params.insert(letter, word.value) {
                    Ok(())
                } else {
                    Err(WORD_REPEATED)
                }
            }
        }
    }

    /// G and M words in the order written.
    pub fn commands(&self) -> &[Word] {
        &self.commands
    }

    pub fn params(&self) -> &Words {
        &self.params
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty() && self.params == Words::default()
    }
}
