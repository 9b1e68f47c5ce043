use std::error::Error;
use std::fmt::{Display, Formatter};

/// Failure to parse a formula, pointing at the offending position in the input.
///
/// The display rendering repeats the formula text with a caret under the character at which
/// parsing stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    input: String,
    position: usize,
}

impl ParseError {
    pub(crate) fn new(input: &str, position: usize) -> Self {
        Self {
            input: input.to_string(),
            position,
        }
    }

    /// Character offset into the formula text at which parsing stopped.
    pub fn position(&self) -> usize {
        self.position
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "cannot parse formula at position {}", self.position)?;
        writeln!(f, "  {}", self.input)?;
        write!(f, "  {}^", "-".repeat(self.position))
    }
}

impl Error for ParseError {}
