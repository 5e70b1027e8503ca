//! Numbered connection picker shown when no database is given on the command
//! line.

use std::io::{BufRead, Write};

use dbc_config::DatabaseConfig;

/// Lists `entries` and reads a 1-based choice from `input`.
///
/// Invalid answers are reported and asked again. Returns `Ok(None)` when the
/// input ends before a valid choice.
pub fn pick_database(
    entries: &[DatabaseConfig],
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> Result<Option<usize>, String> {
    let io_err = |err: std::io::Error| err.to_string();

    writeln!(out, "Databases:").map_err(io_err)?;
    for (i, entry) in entries.iter().enumerate() {
        writeln!(out, "  {}. {} ({})", i + 1, entry.name, entry.path).map_err(io_err)?;
    }

    loop {
        write!(out, "Select database [1-{}]: ", entries.len()).map_err(io_err)?;
        out.flush().map_err(io_err)?;

        let mut line = String::new();
        if input.read_line(&mut line).map_err(io_err)? == 0 {
            writeln!(out).map_err(io_err)?;
            return Ok(None);
        }
        match line.trim().parse::<usize>() {
            Ok(n) if (1..=entries.len()).contains(&n) => return Ok(Some(n - 1)),
            _ => writeln!(out, "Enter a number between 1 and {}.", entries.len())
                .map_err(io_err)?,
        }
    }
}
