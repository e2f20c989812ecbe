//! Error types that can be triggered while compiling a packet script.
//!
//! The types mirror the stages of the pipeline: [`ParamError`] for typed
//! parameter access, [`EncodeError`] for wire-format assembly,
//! [`ParseError`] for a whole instruction (carries the instruction text
//! and a caret position) and [`ScriptError`] for the file driver
//! (adds path and line number).

mod encode_error;
mod param_error;
mod parse_error;
mod script_error;

pub use encode_error::*;
pub use param_error::*;
pub use parse_error::*;
pub use script_error::*;
