use std::path::PathBuf;

use crate::err::ParseError;
use crate::val::Micros;

/// Error from the script driver and compiler.
///
/// Wraps instruction-level errors with the file path and line number
/// they occurred on and adds the failures only the driver can detect
/// (I/O, reserved control blocks, time regressions).
#[derive(Debug)]
pub enum ScriptError {
    /// The source file could not be opened or read.
    Io {
        /// Path of the file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// An instruction failed to compile.
    Parse {
        /// Origin of the script text (file path or a synthetic name).
        path: PathBuf,
        /// Line number (1-based) the instruction ended on.
        line: u64,
        /// The instruction-level diagnostic.
        source: ParseError,
    },

    /// `{ ... }` control blocks are reserved syntax.
    ControlBlock {
        /// Origin of the script text.
        path: PathBuf,
        /// Line the brace was found on.
        line: u64,
    },

    /// A `}` without a matching `{`.
    UnbalancedBlock {
        /// Origin of the script text.
        path: PathBuf,
        /// Line the brace was found on.
        line: u64,
    },

    /// An absolute timestamp precedes the current virtual clock.
    TimeRegression {
        /// The offending absolute timestamp.
        timestamp: Micros,
        /// Virtual clock at the time of the instruction.
        clock: Micros,
    },
}

impl core::fmt::Display for ScriptError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        use ScriptError::*;
        match self {
            Io { path, source } => {
                write!(f, "{}: {}", path.display(), source)
            }
            Parse { path, line, source } => {
                write!(f, "{}:{}: {}", path.display(), line, source)
            }
            ControlBlock { path, line } => write!(
                f,
                "{}:{}: control blocks '{{ ... }}' are reserved syntax and not yet supported",
                path.display(),
                line
            ),
            UnbalancedBlock { path, line } => write!(
                f,
                "{}:{}: '}}' without matching '{{'",
                path.display(),
                line
            ),
            TimeRegression { timestamp, clock } => write!(
                f,
                "absolute timestamp {} us lies before the current virtual clock {} us",
                timestamp.as_us(),
                clock.as_us()
            ),
        }
    }
}

impl std::error::Error for ScriptError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScriptError::Io { source, .. } => Some(source),
            ScriptError::Parse { source, .. } => Some(source),
            _ => None,
        }
    }
}
