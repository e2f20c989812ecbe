use std::borrow::Cow;
use std::path::{Path, PathBuf};

use tracing::trace;

use crate::err::ScriptError;

/// Splits script text into instructions.
///
/// `#` starts a comment running to the end of the line; instructions
/// terminate at `;`; line numbers are tracked for diagnostics.
/// `{`/`}` control blocks are recognized lexically but are reserved
/// syntax: they are rejected with a dedicated diagnostic until their
/// semantics are defined.
pub struct ScriptSource<'a> {
    text: &'a str,
    path: PathBuf,
    pos: usize,
    line: u64,
}

/// One raw instruction plus the line its terminating `;` was found on.
#[derive(Debug, Eq, PartialEq)]
pub struct RawInstruction<'a> {
    /// The instruction text (without the `;`). Borrowed from the
    /// script except when a comment had to be cut out of the middle.
    pub text: Cow<'a, str>,
    /// Line number (1-based).
    pub line: u64,
}

impl<'a> ScriptSource<'a> {
    /// New scanner over `text`; `path` labels diagnostics.
    pub fn new(text: &'a str, path: &Path) -> ScriptSource<'a> {
        ScriptSource {
            text,
            path: path.to_path_buf(),
            pos: 0,
            line: 1,
        }
    }

    /// Current line number.
    pub fn line(&self) -> u64 {
        self.line
    }

    /// Next instruction, or `None` at the end of input.
    ///
    /// Comments are stripped; an instruction may span multiple lines.
    pub fn next_instruction(&mut self) -> Result<Option<RawInstruction<'a>>, ScriptError> {
        let bytes = self.text.as_bytes();
        let mut start = self.pos;
        let mut comment = false;
        // spans with comments inside are collected piecewise
        let mut pieces: Option<String> = None;

        while self.pos < bytes.len() {
            let c = bytes[self.pos];
            match c {
                b'#' if !comment => {
                    if self.pos > start {
                        pieces
                            .get_or_insert_with(String::new)
                            .push_str(&self.text[start..self.pos]);
                    }
                    comment = true;
                }
                b'\n' => {
                    self.line += 1;
                    if comment {
                        comment = false;
                        start = self.pos + 1;
                    }
                }
                b';' if !comment => {
                    let line = self.line;
                    let piece = &self.text[start..self.pos];
                    self.pos += 1;
                    trace!(line, "instruction scanned");
                    let text = match pieces {
                        None => Cow::Borrowed(piece),
                        Some(mut joined) => {
                            joined.push_str(piece);
                            Cow::Owned(joined)
                        }
                    };
                    return Ok(Some(RawInstruction { text, line }));
                }
                b'{' if !comment => {
                    return Err(ScriptError::ControlBlock {
                        path: self.path.clone(),
                        line: self.line,
                    });
                }
                b'}' if !comment => {
                    return Err(ScriptError::UnbalancedBlock {
                        path: self.path.clone(),
                        line: self.line,
                    });
                }
                _ => {}
            }
            self.pos += 1;
        }
        Ok(None)
    }

    /// Origin label for diagnostics.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
