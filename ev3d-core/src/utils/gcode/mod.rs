//! G-code support: parsing programs into instructions and running them on a
//! print head.

pub mod parser;
pub mod runner;

pub use parser::{parse_gcode, parse_gcode_file, parse_line, GCodeError, Instruction, ParseError};
pub use runner::run_gcode;
