//! JSON I/O handling for the query command
//!
//! - Input: one request envelope on stdin (may span several lines)
//! - Output: one response envelope line on stdout
//! - UTF-8 only

use std::io::{Read, Write};

use super::errors::{CliError, CliResult};

/// Read the whole request from a reader
pub fn read_request<R: Read>(reader: &mut R) -> CliResult<Vec<u8>> {
    let mut buffer = Vec::new();
    reader.read_to_end(&mut buffer)?;

    if buffer.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(CliError::io_error("Empty input"));
    }

    Ok(buffer)
}

/// Write a raw JSON string followed by a newline
pub fn write_json<W: Write>(writer: &mut W, json_str: &str) -> CliResult<()> {
    writeln!(writer, "{}", json_str)?;
    writer.flush()?;

    Ok(())
}
