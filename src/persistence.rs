//! Line-oriented text format for correlation matrices.
//!
//! ```text
//! <N>
//! <i> <j> <correlation>
//! ...
//! ```
//!
//! The first line holds the entity count N. Each following line holds one
//! non-zero off-diagonal cell with `i < j` on write; any `i, j < N` is accepted
//! on read. Zero cells are omitted and read back as 0. The diagonal is not
//! written; [`DiagonalPolicy`] decides what it holds after a read.
//!
//! Reading is all-or-nothing: a malformed line aborts the load and no
//! partially filled matrix is returned.

use std::io::{BufRead, Write};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::core::CorrelationMatrix;
use crate::error::{CorrError, Result};

/// Diagonal contents of a loaded matrix.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagonalPolicy {
    /// Self-correlation 1.0 on every diagonal cell.
    #[default]
    One,
    /// Leave the diagonal at the store default of 0.
    Zero,
}

fn parse_token<T: std::str::FromStr>(token: &str, line: usize, what: &str) -> Result<T> {
    token
        .parse::<T>()
        .map_err(|_| CorrError::parse(line, format!("invalid {} '{}'", what, token)))
}

impl CorrelationMatrix {
    /// Writes the matrix size followed by every non-zero `i < j` cell.
    pub fn write<W: Write>(&self, mut writer: W) -> Result<()> {
        writeln!(writer, "{}", self.dim())?;
        let mut written = 0usize;
        for (i, j, value) in self.upper_triangle().filter(|&(_, _, v)| v != 0.0) {
            writeln!(writer, "{} {} {}", i, j, value)?;
            written += 1;
        }
        writer.flush()?;
        info!(
            "Wrote {}x{} correlation matrix ({} non-zero pairs)",
            self.dim(),
            self.dim(),
            written
        );
        Ok(())
    }

    /// Reads a matrix written by [`write`](Self::write).
    ///
    /// Tokens may be separated by any ASCII whitespace and blank lines are
    /// skipped.
    ///
    /// # Errors
    ///
    /// - [`CorrError::Parse`] for a missing or non-integer header, a line
    ///   without exactly three tokens, a non-numeric or non-finite value, or
    ///   an entity ID `>= N`.
    /// - [`CorrError::Capacity`] if the header declares an unallocatable N.
    /// - [`CorrError::Io`] on read failure.
    pub fn read<R: BufRead>(reader: R, diagonal: DiagonalPolicy) -> Result<Self> {
        let mut lines = reader
            .lines()
            .enumerate()
            .map(|(idx, line)| (idx + 1, line));

        let (header_line, header) = loop {
            match lines.next() {
                Some((n, line)) => {
                    let line = line?;
                    if !line.trim().is_empty() {
                        break (n, line);
                    }
                }
                None => return Err(CorrError::parse(1, "missing entity count")),
            }
        };
        let dim: usize = parse_token(header.trim(), header_line, "entity count")?;
        debug!("Reading {}x{} correlation matrix", dim, dim);

        let mut matrix = CorrelationMatrix::new(dim)?;
        if diagonal == DiagonalPolicy::One {
            matrix.set_diagonal(1.0);
        }

        let mut cells = 0usize;
        for (n, line) in lines {
            let line = line?;
            let tokens: Vec<&str> = line.split_ascii_whitespace().collect();
            if tokens.is_empty() {
                continue;
            }
            if tokens.len() != 3 {
                return Err(CorrError::parse(
                    n,
                    format!("expected 3 tokens, found {}", tokens.len()),
                ));
            }
            let i: usize = parse_token(tokens[0], n, "entity ID")?;
            let j: usize = parse_token(tokens[1], n, "entity ID")?;
            let value: f32 = parse_token(tokens[2], n, "correlation")?;
            if !value.is_finite() {
                return Err(CorrError::parse(n, format!("non-finite correlation {}", value)));
            }
            if i >= dim {
                return Err(CorrError::parse(n, format!("entity ID is too big: i = {}", i)));
            }
            if j >= dim {
                return Err(CorrError::parse(n, format!("entity ID is too big: j = {}", j)));
            }
            matrix.set(i, j, value)?;
            cells += 1;
        }

        info!("Read {}x{} correlation matrix ({} cells)", dim, dim, cells);
        Ok(matrix)
    }
}
