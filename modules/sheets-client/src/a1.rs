//! A1 notation helpers.

use crate::error::{Result, SheetsError};

/// 0-based column index for a column letter ("A" -> 0, "AA" -> 26).
pub fn column_index(letters: &str) -> Result<usize> {
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(SheetsError::Range(format!("not a column letter: {letters:?}")));
    }
    let n = letters
        .chars()
        .map(|c| (c.to_ascii_uppercase() as u8 - b'A') as usize + 1)
        .fold(0usize, |acc, d| acc * 26 + d);
    Ok(n - 1)
}

/// Column letter for a 0-based index (0 -> "A", 26 -> "AA").
pub fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut out = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        out.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Sheet-qualified range, quoting the sheet name as the API expects.
pub fn qualified(sheet: &str, range: &str) -> String {
    format!("'{}'!{}", sheet.replace('\'', "''"), range)
}

/// Range covering `width` adjacent cells of one row, starting at `first_column`.
pub fn row_span(first_column: usize, width: usize, row: u32) -> String {
    let last = first_column + width.max(1) - 1;
    format!(
        "{}{row}:{}{row}",
        column_letter(first_column),
        column_letter(last)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_and_indices_agree() {
        assert_eq!(column_index("A").unwrap(), 0);
        assert_eq!(column_index("g").unwrap(), 6);
        assert_eq!(column_index("Z").unwrap(), 25);
        assert_eq!(column_index("AA").unwrap(), 26);
        for i in [0, 6, 25, 26, 51, 52, 701, 702] {
            assert_eq!(column_index(&column_letter(i)).unwrap(), i);
        }
    }

    #[test]
    fn rejects_non_letters() {
        assert!(column_index("").is_err());
        assert!(column_index("G7").is_err());
    }

    #[test]
    fn row_span_covers_adjacent_result_columns() {
        assert_eq!(row_span(6, 3, 12), "G12:I12");
        assert_eq!(row_span(25, 3, 2), "Z2:AB2");
    }

    #[test]
    fn sheet_names_are_quoted() {
        assert_eq!(qualified("Sheet1", "A1:P"), "'Sheet1'!A1:P");
        assert_eq!(qualified("Bob's list", "G2"), "'Bob''s list'!G2");
    }
}
