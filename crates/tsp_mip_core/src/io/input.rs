use std::{fs, io::Read};

use tsp_mip_derive::KvDisplay;

use crate::{Error, Result, io::options::SolverOptions, matrix::CostMatrix};

const STDIN_NAME: &str = "stdin";

/// A named instance: the identifier used in result lines plus the
/// parsed cost matrix.
#[derive(Clone, Debug, KvDisplay)]
pub struct TspInstance {
    pub name: String,
    #[kv(name = "cities", fmt = "len")]
    pub matrix: CostMatrix,
}

impl TspInstance {
    pub fn new(name: impl Into<String>, matrix: CostMatrix) -> Self {
        Self {
            name: name.into(),
            matrix,
        }
    }

    /// Read the instance selected by `--input`, or stdin when no path
    /// is given. The instance name is the path as passed.
    pub fn from_options(options: &SolverOptions) -> Result<Self> {
        let (name, raw) = match options.input_path() {
            Some(path) => (options.input.trim().to_string(), fs::read_to_string(path)?),
            None => {
                let mut raw = String::new();
                std::io::stdin().read_to_string(&mut raw)?;
                (STDIN_NAME.to_string(), raw)
            }
        };
        let matrix = parse_matrix(&raw, options.header_lines)?;
        log::info!(
            "input: instance={name} cities={} header_lines={}",
            matrix.n(),
            options.header_lines
        );
        Ok(Self::new(name, matrix))
    }

    pub fn n(&self) -> usize {
        self.matrix.n()
    }
}

/// Parse cost rows after the skipped header: one row per non-blank
/// line, whitespace or comma separated integers.
pub fn parse_matrix(raw: &str, header_lines: usize) -> Result<CostMatrix> {
    let mut rows = Vec::new();
    for (line_index, line) in raw.lines().enumerate().skip(header_lines) {
        if line.trim().is_empty() {
            continue;
        }
        let mut row = Vec::new();
        for token in line
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|token| !token.is_empty())
        {
            let value: i64 = token.parse().map_err(|_| {
                Error::invalid_input(format!(
                    "Line {}: invalid cost value: {token}",
                    line_index + 1
                ))
            })?;
            row.push(value);
        }
        rows.push(row);
    }
    if rows.is_empty() {
        return Err(Error::invalid_input(
            "No cost-matrix rows found after the header.",
        ));
    }
    CostMatrix::from_rows(rows)
}
