//! Linux `/proc` readers: pure parsers plus filesystem-backed read passes.

pub mod parser;
pub mod process;
pub mod system;
