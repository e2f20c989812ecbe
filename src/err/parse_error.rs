use crate::span::Span;

/// Error for one failing instruction.
///
/// Carries a copy of the instruction text and the span of the first
/// offending byte, so the rendered diagnostic can show a caret under
/// the exact position:
///
/// ```text
/// eth(dmac=11:22:33:44:55:66, foo=1, payload=aa)
///                             ^
/// Unexpected parameter
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParseError {
    /// The complete instruction that failed.
    pub instruction: String,
    /// Headline of the diagnostic (e.g. "Syntax error").
    pub message: String,
    /// Optional second line (e.g. the name of a missing parameter).
    pub details: Option<String>,
    /// First offending byte within `instruction`.
    pub span: Span,
}

impl ParseError {
    /// New error with no detail line.
    pub fn new(instruction: &str, message: &str, span: Span) -> ParseError {
        ParseError {
            instruction: instruction.to_string(),
            message: message.to_string(),
            details: None,
            span,
        }
    }

    /// New error with a detail line.
    pub fn with_details(
        instruction: &str,
        message: &str,
        details: &str,
        span: Span,
    ) -> ParseError {
        ParseError {
            instruction: instruction.to_string(),
            message: message.to_string(),
            details: Some(details.to_string()),
            span,
        }
    }

    /// Column (0-based) of the caret within the instruction.
    pub fn column(&self) -> usize {
        self.span.start.min(self.instruction.len())
    }
}

impl core::fmt::Display for ParseError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        writeln!(f, "{}", self.instruction)?;
        for _ in 0..self.column() {
            write!(f, " ")?;
        }
        writeln!(f, "^")?;
        write!(f, "{}", self.message)?;
        if let Some(details) = &self.details {
            write!(f, ": {details}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caret_position() {
        let e = ParseError::new("eth(foo)", "Syntax error", Span::at(4));
        assert_eq!(format!("{e}"), "eth(foo)\n    ^\nSyntax error");
    }

    #[test]
    fn details_line() {
        let e = ParseError::with_details(
            "udp(dip=1.2.3.4)",
            "Missing parameter",
            "sport",
            Span::at(0),
        );
        assert_eq!(
            format!("{e}"),
            "udp(dip=1.2.3.4)\n^\nMissing parameter: sport"
        );
    }

    #[test]
    fn caret_clamped_to_instruction() {
        let e = ParseError::new("ab", "Syntax error", Span::at(10));
        assert_eq!(e.column(), 2);
    }
}
