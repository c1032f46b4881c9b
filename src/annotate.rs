//! SQL Annotator
//!
//! Prepends short explanatory comments for well-known constructs. Purely
//! textual: nothing is parsed or validated.

/// Marker (matched case-insensitively) and the comment emitted for it, in
/// output order
const NOTES: [(&str, &str); 10] = [
    ("SELECT", "-- SELECT: which columns are returned"),
    ("FROM", "-- FROM: which table the rows come from"),
    ("JOIN", "-- JOIN: combines tables (LEFT JOIN keeps every row on the left)"),
    ("WHERE", "-- WHERE: filters rows by a condition"),
    ("GROUP BY", "-- GROUP BY: groups rows"),
    ("HAVING", "-- HAVING: filters groups after GROUP BY"),
    ("ORDER BY", "-- ORDER BY: sorts the result"),
    ("COALESCE(", "-- COALESCE: substitutes a default when the value is NULL"),
    ("EXTRACT(", "-- EXTRACT: pulls a part out of a date/time (YEAR, MONTH, ...)"),
    ("COUNT(", "-- COUNT: COUNT(*) counts rows; COUNT(col) skips NULLs"),
];

const HEADER_OPEN: &str = "/* Query notes:\n";
const HEADER_CLOSE: &str = "\n*/\n";

pub struct SqlAnnotator;

impl SqlAnnotator {
    /// Comment lines that apply to `sql`, in fixed order
    pub fn notes(sql: &str) -> Vec<&'static str> {
        let upper = sql.to_uppercase();
        NOTES
            .iter()
            .filter(|(marker, _)| upper.contains(marker))
            .map(|(_, note)| *note)
            .collect()
    }

    pub fn annotate(sql: &str) -> String {
        let notes = Self::notes(sql);
        if notes.is_empty() {
            return sql.to_string();
        }

        format!("{}{}{}{}", HEADER_OPEN, notes.join("\n"), HEADER_CLOSE, sql)
    }
}
