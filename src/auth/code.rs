//! Six-digit one-time-code input. Digits are collected cell by cell with
//! auto-advancing focus; anything that is not an ASCII digit is rejected at the
//! point of entry, never at submit time.

use super::AuthError;
use std::fmt;

pub const CODE_LENGTH: usize = 6;

/// A validated code: exactly six ASCII digits. `Debug` is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct OtpCode(String);

impl OtpCode {
    /// # Errors
    /// Returns `AuthError::Invalid` unless `code` is exactly six ASCII digits.
    pub fn parse(code: &str) -> Result<Self, AuthError> {
        let code = code.trim();
        if code.len() == CODE_LENGTH && code.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(code.to_string()))
        } else {
            Err(AuthError::Invalid(
                "Enter the 6-digit code we sent you.".to_string(),
            ))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for OtpCode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("OtpCode(******)")
    }
}

/// Why a keystroke was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputRejected {
    NotADigit,
    OutOfRange,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CodeInput {
    cells: [Option<char>; CODE_LENGTH],
    focus: usize,
}

impl CodeInput {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an input from per-cell strings; empty strings leave the cell blank.
    ///
    /// # Errors
    /// Returns the first rejected cell.
    pub fn from_cells(cells: &[&str]) -> Result<Self, InputRejected> {
        let mut input = Self::new();
        for (index, cell) in cells.iter().enumerate() {
            if let Some(ch) = cell.chars().next() {
                input.enter(index, ch)?;
            }
        }
        Ok(input)
    }

    /// Cell that currently holds focus.
    #[must_use]
    pub fn focus(&self) -> usize {
        self.focus
    }

    /// Writes a digit into `index` and advances focus to the next cell.
    ///
    /// # Errors
    /// Rejects non-digits and indices beyond the last cell; the input is unchanged.
    pub fn enter(&mut self, index: usize, ch: char) -> Result<usize, InputRejected> {
        if index >= CODE_LENGTH {
            return Err(InputRejected::OutOfRange);
        }
        if !ch.is_ascii_digit() {
            return Err(InputRejected::NotADigit);
        }
        self.cells[index] = Some(ch);
        self.focus = (index + 1).min(CODE_LENGTH - 1);
        Ok(self.focus)
    }

    /// Backspace: clears the focused cell, or moves back and clears the previous
    /// one when the focused cell is already empty.
    pub fn backspace(&mut self) -> usize {
        if self.cells[self.focus].is_some() {
            self.cells[self.focus] = None;
        } else if self.focus > 0 {
            self.focus -= 1;
            self.cells[self.focus] = None;
        }
        self.focus
    }

    /// Fills cells from the first one with a pasted code.
    ///
    /// # Errors
    /// Rejects the paste as a whole when it contains a non-digit.
    pub fn paste(&mut self, text: &str) -> Result<usize, InputRejected> {
        let text = text.trim();
        if !text.chars().all(|c| c.is_ascii_digit()) {
            return Err(InputRejected::NotADigit);
        }
        for (index, ch) in text.chars().take(CODE_LENGTH).enumerate() {
            self.enter(index, ch)?;
        }
        Ok(self.focus)
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }

    /// The verify action is enabled only when every cell holds a digit.
    #[must_use]
    pub fn can_submit(&self) -> bool {
        self.is_complete()
    }

    #[must_use]
    pub fn code(&self) -> Option<OtpCode> {
        if !self.is_complete() {
            return None;
        }
        let code: String = self.cells.iter().flatten().collect();
        OtpCode::parse(&code).ok()
    }
}
