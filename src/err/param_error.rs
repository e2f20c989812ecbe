use crate::span::Span;

/// Error when a script parameter cannot be resolved to the value an
/// encoder asked for.
///
/// The variants map one-to-one onto the user-visible failure kinds:
/// a parameter the encoder needs but the script does not supply, a
/// value outside the allowed numeric range, a value that cannot be
/// parsed as its declared type, and a supplied parameter that no
/// encoder consumed (usually a typo).
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ParamError {
    /// A required parameter is missing from the list.
    UnknownParameter {
        /// Name the encoder looked for.
        name: String,
    },

    /// The value parsed, but lies outside the expected range.
    RangeViolation {
        /// Offending value text.
        value: String,
        /// Where the value sits in the instruction.
        span: Span,
    },

    /// The value cannot be parsed as its declared type
    /// (e.g. `12:34:5g` as a MAC address).
    BadFormat {
        /// Offending value text.
        value: String,
        /// Where the value sits in the instruction.
        span: Span,
    },

    /// A parameter was supplied but never consumed by the encoder.
    UnusedParameter {
        /// Name of the leftover parameter.
        name: String,
        /// Where the name sits in the instruction.
        span: Span,
    },
}

impl ParamError {
    /// Short description of the failure kind (matches the diagnostic
    /// headline printed for the user).
    pub fn headline(&self) -> &'static str {
        use ParamError::*;
        match self {
            UnknownParameter { .. } => "Unknown or missing parameter",
            RangeViolation { .. } => "Range of parameter violated",
            BadFormat { .. } => "Invalid parameter value",
            UnusedParameter { .. } => "Unexpected parameter",
        }
    }

    /// Span of the offending bytes, if the error points into the
    /// instruction text.
    pub fn span(&self) -> Option<Span> {
        use ParamError::*;
        match self {
            UnknownParameter { .. } => None,
            RangeViolation { span, .. } => Some(*span),
            BadFormat { span, .. } => Some(*span),
            UnusedParameter { span, .. } => Some(*span),
        }
    }
}

impl core::fmt::Display for ParamError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        use ParamError::*;
        match self {
            UnknownParameter { name } => {
                write!(f, "{} '{}'", self.headline(), name)
            }
            RangeViolation { value, .. } | BadFormat { value, .. } => {
                write!(f, "{} '{}'", self.headline(), value)
            }
            UnusedParameter { name, .. } => {
                write!(f, "{} '{}'", self.headline(), name)
            }
        }
    }
}

impl std::error::Error for ParamError {}
