//! Tabular region detection over extracted page text, plus the canonical
//! row serialization used for embedding table content.

use regex::Regex;
use std::sync::OnceLock;

fn cell_separator() -> &'static Regex {
    static SEPARATOR: OnceLock<Regex> = OnceLock::new();
    SEPARATOR.get_or_init(|| Regex::new(r"\t+| {2,}").expect("static regex"))
}

/// A run of consecutive page lines that look tabular. Parsing into rows is
/// a separate, fallible step so a malformed region can surface a
/// diagnostic without aborting the page.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRegion {
    pub lines: Vec<String>,
}

/// Scans page text for tabular regions: two or more consecutive lines that
/// each split into two or more cells on tabs or runs of two-plus spaces.
pub fn detect_tables(page_text: &str) -> Vec<TableRegion> {
    let mut regions = Vec::new();
    let mut current: Vec<String> = Vec::new();

    for line in page_text.lines() {
        let trimmed = line.trim();
        if !trimmed.is_empty() && split_cells(trimmed).len() >= 2 {
            current.push(trimmed.to_string());
            continue;
        }

        if current.len() >= 2 {
            regions.push(TableRegion {
                lines: std::mem::take(&mut current),
            });
        } else {
            current.clear();
        }
    }

    if current.len() >= 2 {
        regions.push(TableRegion { lines: current });
    }

    regions
}

/// Parses a detected region into rows of cells. Rows whose cell count
/// disagrees with the first row are treated as a parse failure; the caller
/// emits an error-tagged block instead of dropping the table silently.
pub fn parse_table(region: &TableRegion) -> Result<Vec<Vec<Option<String>>>, String> {
    let mut rows = Vec::with_capacity(region.lines.len());
    let mut expected_cells = None;

    for (line_no, line) in region.lines.iter().enumerate() {
        let cells: Vec<Option<String>> = split_cells(line)
            .into_iter()
            .map(|cell| {
                let cell = cell.trim();
                if cell.is_empty() {
                    None
                } else {
                    Some(cell.to_string())
                }
            })
            .collect();

        match expected_cells {
            None => expected_cells = Some(cells.len()),
            Some(expected) if cells.len() != expected => {
                return Err(format!(
                    "row {} has {} cells, expected {}",
                    line_no + 1,
                    cells.len(),
                    expected
                ));
            }
            Some(_) => {}
        }

        rows.push(cells);
    }

    Ok(rows)
}

fn split_cells(line: &str) -> Vec<&str> {
    cell_separator().split(line).collect()
}

/// Serializes table rows into a single text blob: the first row becomes a
/// `Headers:` line, every following row a 1-based `Row i:` line, all
/// joined with trailing-period separators. `None` cells are skipped.
pub fn format_table_content(rows: &[Vec<Option<String>>]) -> String {
    if rows.is_empty() {
        return String::new();
    }

    let mut formatted = String::new();
    let headers = &rows[0];
    let data_rows = &rows[1..];

    if !headers.is_empty() {
        formatted.push_str("Headers: ");
        formatted.push_str(&join_cells(headers));
        formatted.push_str(". ");
    }

    for (index, row) in data_rows.iter().enumerate() {
        formatted.push_str(&format!("Row {}: ", index + 1));
        formatted.push_str(&join_cells(row));
        formatted.push_str(". ");
    }

    formatted.trim().to_string()
}

fn join_cells(cells: &[Option<String>]) -> String {
    cells
        .iter()
        .flatten()
        .map(|cell| cell.trim())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::{detect_tables, format_table_content, parse_table, TableRegion};

    fn owned(rows: &[&[&str]]) -> Vec<Vec<Option<String>>> {
        rows.iter()
            .map(|row| row.iter().map(|cell| Some(cell.to_string())).collect())
            .collect()
    }

    #[test]
    fn serialization_is_deterministic() {
        let rows = owned(&[&["a", "b"], &["1", "2"], &["3", "4"]]);
        assert_eq!(
            format_table_content(&rows),
            "Headers: a, b. Row 1: 1, 2. Row 2: 3, 4."
        );
    }

    #[test]
    fn null_cells_are_skipped() {
        let rows = vec![
            vec![Some("a".to_string()), None, Some("b".to_string())],
            vec![None, Some("1".to_string()), Some("2".to_string())],
        ];
        assert_eq!(format_table_content(&rows), "Headers: a, b. Row 1: 1, 2.");
    }

    #[test]
    fn empty_table_serializes_to_empty_string() {
        assert_eq!(format_table_content(&[]), "");
    }

    #[test]
    fn empty_header_row_emits_no_headers_prefix() {
        let rows = vec![vec![], vec![Some("1".to_string()), Some("2".to_string())]];
        assert_eq!(format_table_content(&rows), "Row 1: 1, 2.");
    }

    #[test]
    fn detects_consecutive_multi_cell_lines() {
        let page = "Introduction paragraph.\nName  Age\nAlice  30\nBob  34\n\nClosing text.";
        let regions = detect_tables(page);
        assert_eq!(regions.len(), 1);
        assert_eq!(
            regions[0].lines,
            vec!["Name  Age", "Alice  30", "Bob  34"]
        );
    }

    #[test]
    fn a_single_tabular_line_is_not_a_table() {
        let regions = detect_tables("just one line with  two cells\nplain prose follows");
        assert!(regions.is_empty());
    }

    #[test]
    fn tab_separated_rows_are_detected() {
        let regions = detect_tables("h1\th2\nv1\tv2");
        assert_eq!(regions.len(), 1);
        let rows = parse_table(&regions[0]).unwrap();
        assert_eq!(format_table_content(&rows), "Headers: h1, h2. Row 1: v1, v2.");
    }

    #[test]
    fn ragged_rows_fail_to_parse() {
        let region = TableRegion {
            lines: vec!["a  b  c".to_string(), "1  2".to_string()],
        };
        let error = parse_table(&region).unwrap_err();
        assert!(error.contains("row 2"), "unexpected message: {error}");
    }
}
