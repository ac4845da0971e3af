//! Delimited text reader for component data files.

use std::path::Path;

use anyhow::{Context, Result, bail};
use ndarray::Array2;
use tracing::{debug, info};

/// Field separator of a data file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    /// Detected from the first data line: tab, then semicolon, then comma,
    /// otherwise whitespace.
    Auto,
    /// A single separator character.
    Char(char),
    /// Runs of spaces or tabs.
    Whitespace,
}

/// Cells read as missing values, compared case-insensitively.
const MISSING_TOKENS: &[&str] = &["", "na", "nan", "."];

/// Reads a numeric table from `path`. Missing cells become `NaN`.
pub fn read_table(path: &Path, delimiter: Delimiter, header: bool) -> Result<Array2<f64>> {
    info!(path = %path.display(), "reading data");
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read data file: {}", path.display()))?;
    let table = parse_table(&text, delimiter, header)
        .with_context(|| format!("failed to parse data file: {}", path.display()))?;
    info!(
        n_sample = table.nrows(),
        n_variable = table.ncols(),
        "data loaded"
    );
    Ok(table)
}

/// Parses delimited text. Blank lines and lines starting with `#` are
/// skipped; the first remaining line is dropped when `header` is set.
pub fn parse_table(text: &str, delimiter: Delimiter, header: bool) -> Result<Array2<f64>> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty() && !l.starts_with('#'))
        .peekable();

    let delimiter = match (delimiter, lines.peek()) {
        (Delimiter::Auto, Some((_, first))) => detect(first),
        (d, _) => d,
    };
    debug!(?delimiter, header, "parsing table");
    if header {
        lines.next();
    }

    let mut values = Vec::new();
    let mut n_col = None;
    let mut n_row = 0;
    for (line_no, line) in lines {
        let fields = split(line, delimiter);
        match n_col {
            None => n_col = Some(fields.len()),
            Some(n) if n != fields.len() => {
                bail!("line {line_no}: expected {n} fields, found {}", fields.len())
            }
            Some(_) => {}
        }
        for (col, field) in fields.iter().enumerate() {
            values.push(parse_cell(field).with_context(|| format!("line {line_no}, column {}", col + 1))?);
        }
        n_row += 1;
    }

    let Some(n_col) = n_col else {
        bail!("no data rows");
    };
    Array2::from_shape_vec((n_row, n_col), values).context("inconsistent table shape")
}

fn detect(line: &str) -> Delimiter {
    ['\t', ';', ',']
        .into_iter()
        .find(|&c| line.contains(c))
        .map_or(Delimiter::Whitespace, Delimiter::Char)
}

fn split(line: &str, delimiter: Delimiter) -> Vec<&str> {
    match delimiter {
        Delimiter::Char(c) => line.split(c).map(str::trim).collect(),
        Delimiter::Whitespace | Delimiter::Auto => line.split_whitespace().collect(),
    }
}

fn parse_cell(field: &str) -> Result<f64> {
    let field = field.trim_matches('"');
    if MISSING_TOKENS.iter().any(|t| field.eq_ignore_ascii_case(t)) {
        return Ok(f64::NAN);
    }
    let value: f64 = field
        .parse()
        .with_context(|| format!("not a number: {field:?}"))?;
    if value.is_infinite() {
        bail!("infinite value: {field:?}");
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_with_header() {
        let t = parse_table("x,y\n1,2\n3,4\n", Delimiter::Auto, true).unwrap();
        assert_eq!(t.dim(), (2, 2));
        assert_eq!(t[[1, 0]], 3.0);
    }

    #[test]
    fn detects_delimiters() {
        assert_eq!(detect("1;2;3"), Delimiter::Char(';'));
        assert_eq!(detect("1\t2"), Delimiter::Char('\t'));
        assert_eq!(detect("1,5;2,5"), Delimiter::Char(';'));
        assert_eq!(detect("1 2  3"), Delimiter::Whitespace);
    }

    #[test]
    fn missing_tokens_become_nan() {
        let t = parse_table("1,NA\n.,2\n,nan\n", Delimiter::Char(','), false).unwrap();
        assert!(t[[0, 1]].is_nan());
        assert!(t[[1, 0]].is_nan());
        assert!(t[[2, 0]].is_nan());
        assert!(t[[2, 1]].is_nan());
        assert_eq!(t[[1, 1]], 2.0);
    }

    #[test]
    fn whitespace_and_comments() {
        let t = parse_table("# counts\n1   2\n\n3\t4\n", Delimiter::Whitespace, false).unwrap();
        assert_eq!(t.dim(), (2, 2));
        assert_eq!(t[[1, 1]], 4.0);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let err = parse_table("1,2\n3\n", Delimiter::Auto, false).unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
    }

    #[test]
    fn bad_cells_are_rejected() {
        let err = parse_table("1,abc\n", Delimiter::Auto, false).unwrap_err();
        assert!(format!("{err:#}").contains("column 2"));
        assert!(parse_table("1,inf\n", Delimiter::Auto, false).is_err());
        assert!(parse_table("# only a comment\n", Delimiter::Auto, false).is_err());
    }
}
