//! Command implementations

pub mod listen;
pub mod send;
pub mod sign;
pub mod verify;

use crate::error::CliResult;
use std::io::Read;
use std::path::Path;

/// Read a body from `file`, or from stdin when absent. Bytes are kept
/// exactly as read, trailing newline included.
pub fn read_body(file: Option<&Path>) -> CliResult<Vec<u8>> {
    match file {
        Some(path) => Ok(std::fs::read(path)?),
        None => {
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf)?;
            Ok(buf)
        }
    }
}
