//! Script compilation: instruction parsing, protocol dispatch, the
//! file driver and the virtual-clock compiler.

mod compiler;
mod instruction;
mod lldp_args;
mod source;

pub use compiler::*;
pub use instruction::*;
pub use source::*;
