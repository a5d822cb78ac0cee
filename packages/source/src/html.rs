//! HTML table helpers for the statistics pages.

use scraper::{Html, Selector};

/// Extracts the text of every `<tr>` in `html` as a list of cell strings.
///
/// Both `<td>` and `<th>` cells are collected, trimmed. Rows with fewer than
/// `min_cells` cells or an empty first cell are skipped.
#[must_use]
pub fn table_rows(html: &str, min_cells: usize) -> Vec<Vec<String>> {
    let document = Html::parse_document(html);
    let row_sel = Selector::parse("tr").unwrap_or_else(|_| unreachable!());
    let cell_sel = Selector::parse("td, th").unwrap_or_else(|_| unreachable!());

    document
        .select(&row_sel)
        .map(|row| {
            row.select(&cell_sel)
                .map(|cell| {
                    cell.text()
                        .collect::<String>()
                        .replace('\u{a0}', " ")
                        .trim()
                        .to_string()
                })
                .collect::<Vec<_>>()
        })
        .filter(|cells| cells.len() >= min_cells && cells.first().is_some_and(|c| !c.is_empty()))
        .collect()
}

/// Parses a formatted count such as `"1,234명"`, ignoring every non-digit.
///
/// Empty or digit-free input yields `0`.
#[must_use]
pub fn parse_count(value: &str) -> u64 {
    let digits: String = value.chars().filter(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_rows_and_cells() {
        let html = r"
            <table>
              <thead><tr><th>코드</th><th>이름</th></tr></thead>
              <tbody>
                <tr><td> 1111051500 </td><td><span>청운효자동</span></td></tr>
                <tr><td></td><td>빈 코드</td></tr>
                <tr><td>only</td></tr>
              </tbody>
            </table>";
        let rows = table_rows(html, 2);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec!["코드", "이름"]);
        assert_eq!(rows[1], vec!["1111051500", "청운효자동"]);
    }

    #[test]
    fn parses_formatted_counts() {
        assert_eq!(parse_count("1,234"), 1234);
        assert_eq!(parse_count(" 9,876명 "), 9876);
        assert_eq!(parse_count(""), 0);
        assert_eq!(parse_count("-"), 0);
    }
}
